//! Runtime settings
//!
//! Everything is read once at startup from the process environment (after
//! loading `.env` if present). Missing credentials do not fail startup:
//! the affected capability is recorded as unavailable and the server
//! answers requests that need it with a 503.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};

use crate::ai::client::AiClientConfig;
use crate::constants;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// A feature is unavailable because its configuration is missing
#[derive(Debug, Error)]
#[error("{feature} is unavailable: {reason}")]
pub struct UnavailableError {
    pub feature: &'static str,
    pub reason: String,
}

/// A configured collaborator, or the reason it cannot be used
#[derive(Debug, Clone)]
pub enum Capability<T> {
    Available(T),
    Unavailable(String),
}

impl<T> Capability<T> {
    pub fn is_available(&self) -> bool {
        matches!(self, Capability::Available(_))
    }

    pub fn as_option(&self) -> Option<&T> {
        match self {
            Capability::Available(value) => Some(value),
            Capability::Unavailable(_) => None,
        }
    }

    pub fn require(&self, feature: &'static str) -> Result<&T, UnavailableError> {
        match self {
            Capability::Available(value) => Ok(value),
            Capability::Unavailable(reason) => Err(UnavailableError {
                feature,
                reason: reason.clone(),
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChatSettings {
    pub api_key: String,
    pub client: AiClientConfig,
}

#[derive(Debug, Clone)]
pub struct EmbeddingSettings {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

#[derive(Debug, Clone)]
pub struct VectorStoreSettings {
    pub api_key: String,
    pub control_url: String,
}

#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub system_prompt: String,
    pub max_tool_rounds: usize,
    pub stream_idle_timeout: Duration,
    pub tool_timeout: Duration,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            system_prompt: constants::ai::DEFAULT_SYSTEM_PROMPT.to_string(),
            max_tool_rounds: constants::tools::MAX_TOOL_ROUNDS,
            stream_idle_timeout: Duration::from_secs(constants::ai::STREAM_IDLE_TIMEOUT_SECS),
            tool_timeout: Duration::from_secs(constants::tools::DEFAULT_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub port: u16,
    pub static_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub chat: Capability<ChatSettings>,
    pub embeddings: Capability<EmbeddingSettings>,
    pub vector_store: Capability<VectorStoreSettings>,
    pub agent: AgentSettings,
    pub server: ServerSettings,
}

impl Settings {
    /// Load `.env` (if any) and read the process environment
    pub fn from_env() -> Result<Self, SettingsError> {
        if let Ok(path) = dotenv::dotenv() {
            info!("Loaded environment from {}", path.display());
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let request_timeout: u64 = parse_or(
            &get,
            "ASSIST_REQUEST_TIMEOUT_SECS",
            constants::ai::REQUEST_TIMEOUT_SECS,
        )?;

        let chat = match get("ANTHROPIC_API_KEY") {
            Some(api_key) => Capability::Available(ChatSettings {
                api_key,
                client: AiClientConfig {
                    model: get("ASSIST_MODEL")
                        .unwrap_or_else(|| constants::ai::DEFAULT_MODEL.to_string()),
                    max_tokens: parse_or(
                        &get,
                        "ASSIST_MAX_TOKENS",
                        constants::ai::MAX_OUTPUT_TOKENS,
                    )?,
                    base_url: get("ANTHROPIC_BASE_URL")
                        .unwrap_or_else(|| constants::ai::ANTHROPIC_BASE_URL.to_string()),
                    request_timeout: Duration::from_secs(request_timeout),
                    ..Default::default()
                },
            }),
            None => {
                warn!("ANTHROPIC_API_KEY not set - chat API will be unavailable");
                Capability::Unavailable("ANTHROPIC_API_KEY is not set".to_string())
            }
        };

        let embeddings = match get("OPENAI_API_KEY") {
            Some(api_key) => Capability::Available(EmbeddingSettings {
                api_key,
                base_url: get("OPENAI_BASE_URL")
                    .unwrap_or_else(|| constants::retrieval::OPENAI_BASE_URL.to_string()),
                model: get("ASSIST_EMBEDDING_MODEL")
                    .unwrap_or_else(|| constants::retrieval::EMBEDDING_MODEL.to_string()),
            }),
            None => {
                warn!("OPENAI_API_KEY not set - document search will be unavailable");
                Capability::Unavailable("OPENAI_API_KEY is not set".to_string())
            }
        };

        let vector_store = match get("PINECONE_API_KEY") {
            Some(api_key) => Capability::Available(VectorStoreSettings {
                api_key,
                control_url: get("PINECONE_CONTROL_URL")
                    .unwrap_or_else(|| constants::retrieval::PINECONE_CONTROL_URL.to_string()),
            }),
            None => {
                warn!("PINECONE_API_KEY not set - document search will be unavailable");
                Capability::Unavailable("PINECONE_API_KEY is not set".to_string())
            }
        };

        let agent = AgentSettings {
            system_prompt: get("ASSIST_SYSTEM_PROMPT")
                .unwrap_or_else(|| constants::ai::DEFAULT_SYSTEM_PROMPT.to_string()),
            max_tool_rounds: parse_or(
                &get,
                "ASSIST_MAX_TOOL_ROUNDS",
                constants::tools::MAX_TOOL_ROUNDS,
            )?,
            stream_idle_timeout: Duration::from_secs(parse_or(
                &get,
                "ASSIST_STREAM_IDLE_TIMEOUT_SECS",
                constants::ai::STREAM_IDLE_TIMEOUT_SECS,
            )?),
            tool_timeout: Duration::from_secs(parse_or(
                &get,
                "ASSIST_TOOL_TIMEOUT_SECS",
                constants::tools::DEFAULT_TIMEOUT_SECS,
            )?),
        };

        let server = ServerSettings {
            port: parse_or(&get, "PORT", constants::server::DEFAULT_PORT)?,
            static_dir: PathBuf::from(
                get("ASSIST_STATIC_DIR")
                    .unwrap_or_else(|| constants::server::DEFAULT_STATIC_DIR.to_string()),
            ),
        };

        Ok(Self {
            chat,
            embeddings,
            vector_store,
            agent,
            server,
        })
    }

    /// Document search needs both an embedder and a vector store
    pub fn retrieval_available(&self) -> bool {
        self.embeddings.is_available() && self.vector_store.is_available()
    }
}

fn parse_or<T, G>(get: &G, key: &'static str, default: T) -> Result<T, SettingsError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| SettingsError::Invalid {
            key,
            value: raw.clone(),
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}
