//! Shared defaults

pub mod ai {
    pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
    pub const MAX_OUTPUT_TOKENS: usize = 4096;
    pub const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
    pub const ANTHROPIC_API_VERSION: &str = "2023-06-01";
    pub const REQUEST_TIMEOUT_SECS: u64 = 120;
    pub const CONNECT_TIMEOUT_SECS: u64 = 10;
    pub const STREAM_IDLE_TIMEOUT_SECS: u64 = 120;

    pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful business assistant. \
Use the staff_lookup tool to answer questions about colleagues, the \
business_calculator tool for any arithmetic on business figures, and the \
search_documents tool when the answer depends on indexed documents. \
Report tool results accurately and say so when a tool returns no match.";
}

pub mod tools {
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
    pub const MAX_TOOL_ROUNDS: usize = 1;
    /// Tool output beyond this many bytes is truncated before it reaches the model
    pub const MAX_OUTPUT_BYTES: usize = 30_000;
    pub const SEARCH_DEFAULT_TOP_K: u64 = 5;
    pub const SEARCH_MAX_TOP_K: u64 = 20;
}

pub mod retrieval {
    pub const OPENAI_BASE_URL: &str = "https://api.openai.com";
    pub const EMBEDDING_MODEL: &str = "text-embedding-3-small";
    pub const EMBEDDING_DIMENSION: usize = 1536;
    pub const PINECONE_CONTROL_URL: &str = "https://api.pinecone.io";
    pub const PINECONE_CLOUD: &str = "aws";
    pub const PINECONE_REGION: &str = "us-east-1";
}

pub mod ingest {
    pub const DEFAULT_CHUNK_SIZE: usize = 3000;
    pub const DEFAULT_CHUNK_OVERLAP: usize = 200;
    pub const UPSERT_BATCH_SIZE: usize = 100;
    pub const PREVIEW_CHARS: usize = 300;
    /// Pause after creating an index before the first upsert
    pub const INDEX_READY_WAIT_SECS: u64 = 5;
}

pub mod server {
    pub const DEFAULT_PORT: u16 = 3000;
    pub const DEFAULT_STATIC_DIR: &str = "static";
    pub const SSE_CHANNEL_BUFFER: usize = 256;
}
