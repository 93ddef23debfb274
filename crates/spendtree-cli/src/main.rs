//! Spendtree CLI - Personal expense breakdown
//!
//! Usage:
//!   spendtree summary                    Category → tag breakdown
//!   spendtree month 2024-02              Named-category spending for a month
//!   spendtree reclassify 42 courses      Move a transaction to another tag
//!   spendtree browse                     Interactive drill-down

mod cli;
mod commands;

#[cfg(test)]
mod tests;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    run(cli).await
}

async fn run(cli: Cli) -> Result<()> {
    let period = commands::resolve_period(cli.from.as_deref(), cli.to.as_deref())?;
    let config = cli.config.as_deref();

    match cli.command {
        Commands::Map { tag, category } => {
            commands::cmd_map(&cli.file, config, period, &tag, &category).await
        }
        Commands::Categories => commands::cmd_categories(config),
        Commands::Summary { json } => {
            let session = commands::open_session(&cli.file, config, period).await?;
            commands::cmd_summary(&session, json)
        }
        Commands::Months => {
            let session = commands::open_session(&cli.file, config, period).await?;
            commands::cmd_months(&session)
        }
        Commands::Month { month } => {
            let session = commands::open_session(&cli.file, config, period).await?;
            commands::cmd_month(&session, &month)
        }
        Commands::Tag {
            category,
            tag,
            month,
        } => {
            let session = commands::open_session(&cli.file, config, period).await?;
            commands::cmd_tag(&session, &category, &tag, month.as_deref())
        }
        Commands::Reclassify { id, tag } => {
            let session = commands::open_session(&cli.file, config, period).await?;
            commands::cmd_reclassify(&session, id, &tag).await
        }
        Commands::Browse => {
            let session = commands::open_session(&cli.file, config, period).await?;
            commands::cmd_browse(&session).await
        }
    }
}
