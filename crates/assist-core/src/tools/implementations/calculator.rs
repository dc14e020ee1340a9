//! Business calculator tool - common financial formulas

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::tools::registry::Tool;
use crate::tools::{parse_params, ToolResult};

pub struct BusinessCalculatorTool;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
enum Operation {
    Percentage,
    ProfitMargin,
    Roi,
    GrowthRate,
    BreakEven,
    CompoundInterest,
}

impl Operation {
    fn as_str(self) -> &'static str {
        match self {
            Operation::Percentage => "percentage",
            Operation::ProfitMargin => "profit_margin",
            Operation::Roi => "roi",
            Operation::GrowthRate => "growth_rate",
            Operation::BreakEven => "break_even",
            Operation::CompoundInterest => "compound_interest",
        }
    }
}

#[derive(Deserialize)]
struct Params {
    operation: Operation,
    #[serde(default)]
    values: Map<String, Value>,
}

struct Calculation {
    inputs: Value,
    result: f64,
    formatted: String,
}

/// Named numeric inputs; numeric strings such as "50,000" are accepted
struct Values<'a>(&'a Map<String, Value>);

impl Values<'_> {
    fn required(&self, key: &str) -> Result<f64, String> {
        self.optional(key)?
            .ok_or_else(|| format!("Missing value: {}", key))
    }

    fn optional(&self, key: &str) -> Result<Option<f64>, String> {
        let Some(raw) = self.0.get(key) else {
            return Ok(None);
        };
        let number = match raw {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().replace(',', "").parse::<f64>().ok(),
            Value::Null => return Ok(None),
            _ => None,
        };
        match number {
            Some(n) if n.is_finite() => Ok(Some(n)),
            _ => Err(format!("Value '{}' must be a number", key)),
        }
    }
}

fn calculate(operation: Operation, values: &Values) -> Result<Calculation, String> {
    match operation {
        Operation::Percentage => {
            let amount = values.required("amount")?;
            let percentage = values.required("percentage")?;
            let result = amount * percentage / 100.0;
            Ok(Calculation {
                inputs: json!({"amount": amount, "percentage": percentage}),
                result,
                formatted: format!(
                    "{}% of {} is {}",
                    format_number(percentage),
                    format_number(amount),
                    format_number(result)
                ),
            })
        }
        Operation::ProfitMargin => {
            let revenue = values.required("revenue")?;
            let cost = values.required("cost")?;
            if revenue == 0.0 {
                return Err("Division by zero: revenue must be non-zero".to_string());
            }
            let result = (revenue - cost) / revenue * 100.0;
            Ok(Calculation {
                inputs: json!({"revenue": revenue, "cost": cost}),
                result,
                formatted: format!("Profit margin is {}%", format_number(result)),
            })
        }
        Operation::Roi => {
            let gain = values.required("gain")?;
            let cost = values.required("cost")?;
            if cost == 0.0 {
                return Err("Division by zero: cost must be non-zero".to_string());
            }
            let result = (gain - cost) / cost * 100.0;
            Ok(Calculation {
                inputs: json!({"gain": gain, "cost": cost}),
                result,
                formatted: format!("Return on investment is {}%", format_number(result)),
            })
        }
        Operation::GrowthRate => {
            let initial = values.required("initial")?;
            let final_value = values.required("final")?;
            if initial == 0.0 {
                return Err("Division by zero: initial must be non-zero".to_string());
            }
            let result = (final_value - initial) / initial * 100.0;
            Ok(Calculation {
                inputs: json!({"initial": initial, "final": final_value}),
                result,
                formatted: format!("Growth rate is {}%", format_number(result)),
            })
        }
        Operation::BreakEven => {
            let fixed_costs = values.required("fixed_costs")?;
            let price = values.required("price_per_unit")?;
            let variable = values.required("variable_cost_per_unit")?;
            let contribution = price - variable;
            if contribution <= 0.0 {
                return Err(
                    "price_per_unit must be greater than variable_cost_per_unit".to_string(),
                );
            }
            let result = fixed_costs / contribution;
            Ok(Calculation {
                inputs: json!({
                    "fixed_costs": fixed_costs,
                    "price_per_unit": price,
                    "variable_cost_per_unit": variable
                }),
                result,
                formatted: format!("Break-even point is {} units", format_number(result)),
            })
        }
        Operation::CompoundInterest => {
            let principal = values.required("principal")?;
            let rate = values.required("rate")?;
            let years = values.required("years")?;
            let periods = values.optional("compounds_per_year")?.unwrap_or(1.0);
            if periods <= 0.0 {
                return Err("compounds_per_year must be positive".to_string());
            }
            let result = principal * (1.0 + rate / 100.0 / periods).powf(periods * years);
            Ok(Calculation {
                inputs: json!({
                    "principal": principal,
                    "rate": rate,
                    "years": years,
                    "compounds_per_year": periods
                }),
                result,
                formatted: format!(
                    "{} at {}% for {} years grows to {}",
                    format_number(principal),
                    format_number(rate),
                    format_number(years),
                    format_number(result)
                ),
            })
        }
    }
}

/// Two decimals with thousands separators, trailing ".00" dropped
fn format_number(value: f64) -> String {
    let rounded = format!("{:.2}", value.abs());
    let (whole, frac) = rounded.split_once('.').unwrap_or((rounded.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if value < 0.0 && rounded != "0.00" { "-" } else { "" };
    if frac == "00" {
        format!("{}{}", sign, grouped)
    } else {
        format!("{}{}.{}", sign, grouped, frac)
    }
}

#[async_trait]
impl Tool for BusinessCalculatorTool {
    fn name(&self) -> &str {
        "business_calculator"
    }

    fn description(&self) -> &str {
        "Perform business calculations. Operations and their values: percentage {amount, percentage}; profit_margin {revenue, cost}; roi {gain, cost}; growth_rate {initial, final}; break_even {fixed_costs, price_per_unit, variable_cost_per_unit}; compound_interest {principal, rate, years, compounds_per_year?}. Rates are percentages."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "operation": {
                    "type": "string",
                    "enum": [
                        "percentage",
                        "profit_margin",
                        "roi",
                        "growth_rate",
                        "break_even",
                        "compound_interest"
                    ],
                    "description": "The calculation to perform"
                },
                "values": {
                    "type": "object",
                    "description": "Named numeric inputs for the operation",
                    "additionalProperties": {"type": "number"}
                }
            },
            "required": ["operation", "values"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, params: Value) -> ToolResult {
        let params = match parse_params::<Params>(params) {
            Ok(p) => p,
            Err(e) => return e,
        };

        match calculate(params.operation, &Values(&params.values)) {
            Ok(calc) => ToolResult::success_data(json!({
                "operation": params.operation.as_str(),
                "inputs": calc.inputs,
                "result": calc.result,
                "formatted": calc.formatted,
            })),
            Err(message) => ToolResult::error(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn run(params: Value) -> (bool, Value) {
        let result = BusinessCalculatorTool.execute(params).await;
        (result.is_error, serde_json::from_str(&result.output).unwrap())
    }

    #[tokio::test]
    async fn fifteen_percent_of_fifty_thousand() {
        let (is_error, value) = run(json!({
            "operation": "percentage",
            "values": {"amount": 50000, "percentage": 15}
        }))
        .await;

        assert!(!is_error);
        assert_eq!(value["operation"], "percentage");
        assert_eq!(value["result"].as_f64(), Some(7500.0));
        assert_eq!(value["formatted"], "15% of 50,000 is 7,500");
    }

    #[tokio::test]
    async fn profit_margin_and_break_even() {
        let (_, margin) = run(json!({
            "operation": "profit_margin",
            "values": {"revenue": 200000, "cost": 150000}
        }))
        .await;
        assert_eq!(margin["result"].as_f64(), Some(25.0));

        let (_, units) = run(json!({
            "operation": "break_even",
            "values": {"fixed_costs": 10000, "price_per_unit": 50, "variable_cost_per_unit": 30}
        }))
        .await;
        assert_eq!(units["result"].as_f64(), Some(500.0));
    }

    #[tokio::test]
    async fn compound_interest_defaults_to_annual() {
        let (_, value) = run(json!({
            "operation": "compound_interest",
            "values": {"principal": 1000, "rate": 10, "years": 2}
        }))
        .await;
        let result = value["result"].as_f64().unwrap();
        assert!((result - 1210.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn numeric_strings_are_accepted() {
        let (is_error, value) = run(json!({
            "operation": "growth_rate",
            "values": {"initial": "1,000", "final": "1,500"}
        }))
        .await;
        assert!(!is_error);
        assert_eq!(value["result"].as_f64(), Some(50.0));
    }

    #[tokio::test]
    async fn division_by_zero_is_a_tool_error() {
        let (is_error, value) = run(json!({
            "operation": "roi",
            "values": {"gain": 500, "cost": 0}
        }))
        .await;
        assert!(is_error);
        assert_eq!(value["error"]["code"], "invalid_input");
    }

    #[tokio::test]
    async fn missing_value_and_unknown_operation_fail() {
        let (is_error, value) = run(json!({
            "operation": "percentage",
            "values": {"amount": 100}
        }))
        .await;
        assert!(is_error);
        assert!(value["error"]["message"]
            .as_str()
            .unwrap()
            .contains("percentage"));

        let (is_error, value) = run(json!({"operation": "sqrt", "values": {}})).await;
        assert!(is_error);
        assert_eq!(value["error"]["code"], "invalid_parameters");
    }

    #[test]
    fn format_number_groups_thousands() {
        assert_eq!(format_number(1234567.891), "1,234,567.89");
        assert_eq!(format_number(-2500.0), "-2,500");
        assert_eq!(format_number(0.5), "0.50");
    }
}
