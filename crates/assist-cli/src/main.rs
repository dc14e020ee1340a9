//! Assist - chat backend and document ingestion
//!
//! - `assist serve` - HTTP chat server
//! - `assist ingest` - chunk, embed, and upload markdown documents
//! - `assist tokens` - token counts for a folder of markdown files

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use assist_core::constants::ingest::{DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};

mod ingest;
mod serve;

/// Assist - business chat assistant backend
#[derive(Parser)]
#[command(name = "assist")]
#[command(about = "Chat assistant server and document ingestion", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the chat server
    ///
    /// Reads credentials from the environment (or `.env`). Missing keys
    /// disable the matching feature instead of failing startup.
    Serve {
        /// Port to listen on (defaults to $PORT, then 3000)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Chunk markdown files and upsert them into a vector index
    ///
    /// Needs OPENAI_API_KEY and PINECONE_API_KEY.
    Ingest {
        /// Folder containing `*.md` files
        #[arg(short, long)]
        folder: PathBuf,

        /// Vector index name, created if missing
        #[arg(short, long)]
        index: String,

        /// Namespace to write into (defaults to the first chunk's patient id)
        #[arg(short, long)]
        namespace: Option<String>,

        /// Patient id for every chunk instead of deriving it from filenames
        #[arg(long)]
        patient_id: Option<String>,

        #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
        chunk_size: usize,

        #[arg(long, default_value_t = DEFAULT_CHUNK_OVERLAP)]
        chunk_overlap: usize,

        /// Review report path (defaults to a timestamped file in the current directory)
        #[arg(long)]
        report: Option<PathBuf>,

        /// Skip writing the review report
        #[arg(long, conflicts_with = "report")]
        no_report: bool,
    },

    /// Print token counts for every markdown file in a folder
    Tokens {
        #[arg(short, long)]
        folder: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { port } => serve::run(port).await,
        Commands::Ingest {
            folder,
            index,
            namespace,
            patient_id,
            chunk_size,
            chunk_overlap,
            report,
            no_report,
        } => {
            init_logging();
            ingest::run(ingest::IngestArgs {
                folder,
                index,
                namespace,
                patient_id,
                chunk_size,
                chunk_overlap,
                report: if no_report {
                    None
                } else {
                    Some(report.unwrap_or_else(ingest::default_report_path))
                },
            })
            .await
        }
        Commands::Tokens { folder } => {
            init_logging();
            ingest::print_token_counts(&folder)
        }
    }
}

/// Logs go to stderr so command output stays clean on stdout
fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();
}
