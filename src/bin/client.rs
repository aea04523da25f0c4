use anyhow::Result;
use bidwatch::client::{ARTIFACT_PATH, QuoteClient};
use bidwatch::core::log::init_logging;
use clap::Parser;
use std::path::Path;
use tracing::level_filters::LevelFilter;

#[derive(Parser)]
#[command(
    version,
    about = "Fetches the current bid from the quote server and saves it to quote.txt"
)]
struct Cli {}

#[tokio::main]
async fn main() -> Result<()> {
    Cli::parse();

    init_logging(false, LevelFilter::WARN);

    let client = QuoteClient::from_env()?;
    match client.run(Path::new(ARTIFACT_PATH)).await {
        Ok(line) => {
            println!("{line}");
            Ok(())
        }
        Err(e) => {
            tracing::error!(error = %e, "Quote client failed");
            Err(e.into())
        }
    }
}
