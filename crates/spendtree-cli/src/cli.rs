//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Spendtree - See where the money goes, category by category
#[derive(Parser)]
#[command(name = "spendtree")]
#[command(about = "Personal expense breakdown by category, tag and month", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Transactions CSV file (id,date,amount,label,tags[,month])
    #[arg(short, long, default_value = "transactions.csv", global = true)]
    pub file: PathBuf,

    /// Engine config with categories and tag mapping
    ///
    /// Defaults to ~/.local/share/spendtree/config.toml, then to the
    /// built-in categories.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// First month to include (YYYY-MM)
    #[arg(long, global = true)]
    pub from: Option<String>,

    /// Last month to include (YYYY-MM)
    #[arg(long, global = true)]
    pub to: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Category → tag breakdown
    Summary {
        /// Print the full tree as JSON
        #[arg(long)]
        json: bool,
    },

    /// Named-category spending per month
    Months,

    /// Tags with spending in one month (named categories only)
    Month {
        /// Month (YYYY-MM)
        month: String,
    },

    /// Transactions under one tag of a category
    Tag {
        /// Category id
        category: String,

        /// Tag name
        tag: String,

        /// Only this month (YYYY-MM)
        #[arg(short, long)]
        month: Option<String>,
    },

    /// Move a transaction to another tag
    Reclassify {
        /// Transaction id
        id: i64,

        /// New tag
        tag: String,
    },

    /// Map a tag to a category (saved in the config file)
    Map {
        /// Tag name
        tag: String,

        /// Category id
        category: String,
    },

    /// List categories and the tag mapping
    Categories,

    /// Interactive drill-down browser
    Browse,
}
