use anyhow::Result;
use bidwatch::core::log::init_logging;
use clap::Parser;
use tracing::level_filters::LevelFilter;

#[derive(Parser)]
#[command(version, about = "Serves the latest USD-BRL bid on GET /quote")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long)]
    config_path: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose, LevelFilter::INFO);

    let result = bidwatch::run_server(cli.config_path.as_deref()).await;

    if let Err(e) = &result {
        tracing::error!(error = %e, "Server failed");
    }
    result
}
