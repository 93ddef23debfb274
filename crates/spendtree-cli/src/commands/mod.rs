//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `browse` - Interactive drill-down browser
//! - `common` - Shared utilities (open_session, resolve_period, config paths)
//! - `reports` - Summary, month and transaction listings
//! - `tags` - Reclassify and tag mapping commands

pub mod browse;
pub mod common;
pub mod reports;
pub mod tags;

// Re-export command functions for main.rs
pub use browse::*;
pub use common::*;
pub use reports::*;
pub use tags::*;

/// Truncate a string to a maximum number of characters, adding "..." if
/// truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
