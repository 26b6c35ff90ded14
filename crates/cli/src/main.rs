//! # docextract: Document Field Extraction CLI
//!
//! Thin entrypoint for the `docextract` binary. All logic lives in the
//! `docextract_cli` library crate.

use anyhow::Result;
use clap::Parser;
use docextract_cli::{load_dotenv, run, Cli};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    load_dotenv();

    // Logs go to stderr so that stdout only carries results.
    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(EnvFilter::from_default_env().add_directive("docextract=info".parse()?))
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("[docextract error] {:?}", e);
        std::process::exit(1);
    }

    Ok(())
}
