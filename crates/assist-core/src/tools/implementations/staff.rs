//! Staff lookup tool - search the bundled staff directory

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::tools::registry::Tool;
use crate::tools::{parse_params, ToolResult};

const STAFF_DIRECTORY_JSON: &str = include_str!("../../../data/staff_directory.json");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaffMember {
    pub name: String,
    pub role: String,
    pub department: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

pub struct StaffLookupTool {
    directory: Vec<StaffMember>,
}

impl StaffLookupTool {
    /// Tool backed by the directory compiled into the binary
    pub fn new() -> anyhow::Result<Self> {
        let directory: Vec<StaffMember> = serde_json::from_str(STAFF_DIRECTORY_JSON)?;
        Ok(Self::from_entries(directory))
    }

    pub fn from_entries(directory: Vec<StaffMember>) -> Self {
        Self { directory }
    }

    fn search(&self, params: &Params) -> Vec<&StaffMember> {
        let name = lowered(&params.name);
        let department = lowered(&params.department);
        let role = lowered(&params.role);

        self.directory
            .iter()
            .filter(|m| contains(&m.name, name.as_deref()))
            .filter(|m| contains(&m.department, department.as_deref()))
            .filter(|m| contains(&m.role, role.as_deref()))
            .collect()
    }
}

#[derive(Deserialize)]
struct Params {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    department: Option<String>,
    #[serde(default)]
    role: Option<String>,
}

impl Params {
    fn is_empty(&self) -> bool {
        [&self.name, &self.department, &self.role]
            .iter()
            .all(|v| v.as_deref().map(str::trim).unwrap_or("").is_empty())
    }
}

fn lowered(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_lowercase)
}

fn contains(field: &str, needle: Option<&str>) -> bool {
    match needle {
        Some(needle) => field.to_lowercase().contains(needle),
        None => true,
    }
}

#[async_trait]
impl Tool for StaffLookupTool {
    fn name(&self) -> &str {
        "staff_lookup"
    }

    fn description(&self) -> &str {
        "Look up staff members in the company directory by name, department, or role. Matching is case-insensitive and partial; every provided field must match. Returns contact details for each match."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "name": {
                    "type": "string",
                    "description": "Full or partial name of the staff member"
                },
                "department": {
                    "type": "string",
                    "description": "Department, e.g. Finance or Clinical"
                },
                "role": {
                    "type": "string",
                    "description": "Job title or role, e.g. Physician"
                }
            },
            "additionalProperties": false
        })
    }

    async fn execute(&self, params: Value) -> ToolResult {
        let params = match parse_params::<Params>(params) {
            Ok(p) => p,
            Err(e) => return e,
        };

        if params.is_empty() {
            return ToolResult::invalid_parameters(
                "Provide at least one of: name, department, role",
            );
        }

        let matches = self.search(&params);
        ToolResult::success_data(json!({
            "matches_found": matches.len(),
            "staff": matches,
        }))
    }
}
