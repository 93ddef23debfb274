//! Shared utilities for opening a session
//!
//! - `resolve_period` - Turn `--from/--to` into a month range
//! - `open_session` - Load config, wire the CSV and mapping sources

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use spendtree_core::config::{default_config_path, ensure_config_file};
use spendtree_core::sources::ClassificationSource;
use spendtree_core::{
    CsvSource, EngineConfig, MonthRange, Session, StaticClassification, TomlClassificationFile,
};
use tracing::debug;

pub fn resolve_period(from: Option<&str>, to: Option<&str>) -> Result<MonthRange> {
    MonthRange::new(from, to).context("Invalid --from/--to month (use YYYY-MM)")
}

pub fn load_config(config_path: Option<&Path>) -> Result<EngineConfig> {
    EngineConfig::load(config_path).context("Failed to load config")
}

/// Open a session over a CSV file
///
/// The tag mapping is read from the config file when there is one, otherwise
/// from the built-in defaults.
pub async fn open_session(
    file: &Path,
    config_path: Option<&Path>,
    period: MonthRange,
) -> Result<Session> {
    let config = load_config(config_path)?;
    let classification: Arc<dyn ClassificationSource> = match &config.path {
        Some(path) => Arc::new(TomlClassificationFile::new(path)),
        None => Arc::new(StaticClassification::new(config.mapping.clone())),
    };

    debug!(file = %file.display(), mapping = ?config.path, "Opening session");
    let source = Arc::new(CsvSource::new(file));
    Session::open(source, classification, &config, period)
        .await
        .with_context(|| format!("Failed to load transactions from {}", file.display()))
}

/// Config file that mapping changes are written to, created from the
/// built-in defaults if needed
pub fn writable_config_path(config_path: Option<&Path>) -> Result<PathBuf> {
    let path = match config_path {
        Some(path) => path.to_path_buf(),
        None => default_config_path().context("No location for the config file; pass --config")?,
    };
    ensure_config_file(&path)
        .with_context(|| format!("Failed to create config at {}", path.display()))?;
    Ok(path)
}
