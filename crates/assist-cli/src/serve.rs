//! `assist serve` - run the chat server until Ctrl+C

use anyhow::Result;

use assist_core::Settings;

/// Run the serve command.
pub async fn run(port: Option<u16>) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let mut settings = Settings::from_env()?;
    if let Some(port) = port {
        settings.server.port = port;
    }

    print_banner(&settings);

    let server = assist_server::start_server(settings);

    tokio::select! {
        result = server => {
            result?;
        }
        signal = tokio::signal::ctrl_c() => {
            signal?;
            println!("\n  Shutting down...");
        }
    }

    Ok(())
}

fn print_banner(settings: &Settings) {
    let status = |enabled: bool| if enabled { "enabled" } else { "disabled" };

    println!();
    println!("  \x1b[1;36mAssist\x1b[0m server starting");
    println!("  ─────────────────────────────────────");
    println!("  Local:     http://localhost:{}", settings.server.port);
    println!("  Chat:      {}", status(settings.chat.is_available()));
    println!("  Search:    {}", status(settings.retrieval_available()));
    println!("  Static:    {}", settings.server.static_dir.display());
    println!();
}
