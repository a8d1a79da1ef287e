use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use ragchat_cli::{App, AppConfig};
use tokio::io::BufReader;
use tracing::warn;

/// Ask questions about a document corpus, answered by a local language model.
#[derive(Parser)]
#[command(name = "ragchat", version, about)]
struct Cli {
    /// Configuration file
    #[arg(short, long, env = "RAGCHAT_CONFIG", default_value = "config.yaml")]
    config: PathBuf,

    /// Override the language model from the config file
    #[arg(long, env = "RAGCHAT_MODEL")]
    model: Option<String>,

    /// Wait for the whole answer instead of streaming it
    #[arg(long)]
    no_stream: bool,

    /// Answer a single question and exit
    #[arg(short, long)]
    query: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(&cli.config)?;
    if let Some(model) = cli.model {
        config.llm.model_name = model;
    }
    ragchat_telemetry::init_logging(config.logging.format, &config.logging.level)
        .context("failed to initialise logging")?;

    let app = App::from_config(&config, !cli.no_stream).await?;
    let mut stdout = std::io::stdout();

    let outcome = match cli.query {
        Some(question) => app.answer(&question, &mut stdout).await,
        None => app.interactive(BufReader::new(tokio::io::stdin()), &mut stdout).await,
    };

    let report = app.shutdown().await;
    if report.abandoned > 0 {
        warn!(abandoned = report.abandoned, "exited before all telemetry was written");
    }
    outcome
}
