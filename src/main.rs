use anyhow::Result;
use clap::Parser;
use divvy::cli::Cli;
use divvy::logging::init_tracing;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    cli.run().await
}
