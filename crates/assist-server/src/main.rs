//! Assist Server
//!
//! Standalone binary; `assist serve` runs the same server with a banner
//! and Ctrl+C handling.

use assist_core::Settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let settings = Settings::from_env()?;
    tracing::info!(
        "Starting assist-server on http://0.0.0.0:{}",
        settings.server.port
    );
    assist_server::start_server(settings).await
}
