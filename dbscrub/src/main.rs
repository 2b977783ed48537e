//! dbscrub entry point.

use clap::Parser;
use dbscrub::{build_config, Cli};
use dbscrub_core::{logging, transfer};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(error) = run(cli).await {
        eprintln!("Error: {}", error);
        let mut source = std::error::Error::source(&error);
        while let Some(cause) = source {
            eprintln!("  caused by: {}", cause);
            source = cause.source();
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> dbscrub_core::Result<()> {
    logging::init_logging(cli.debug)?;

    let config = build_config(cli)?;
    let summary = transfer::run(config).await?;

    println!(
        "All {} tables processed in {:.1}s ({} rows written, {} rows deleted, {} write errors)",
        summary.tables,
        summary.elapsed.as_secs_f64(),
        summary.rows_written,
        summary.rows_deleted,
        summary.write_errors
    );

    Ok(())
}
