//! Engine configuration
//!
//! Holds the refresh guard window, the category catalog and the initial
//! classification map.
//!
//! ## Resolution
//!
//! 1. Explicit path, if given and present
//! 2. Override in the data dir (~/.local/share/spendtree/config.toml)
//! 3. Embedded defaults (compiled into binary)

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::classification::{Category, CategoryCatalog, ClassificationMap, OTHER_CATEGORY_ID};
use crate::error::{Error, Result};
use crate::sources::mapping_from_table;

/// Embedded default config (compiled into binary)
pub const DEFAULT_CONFIG: &str = include_str!("../../../config/spendtree.toml");

pub const DEFAULT_GUARD_WINDOW: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// How long after a local edit full refreshes are discarded
    pub guard_window: Duration,
    pub catalog: CategoryCatalog,
    pub mapping: ClassificationMap,
    /// File the config was read from; None for the embedded defaults
    pub path: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            guard_window: DEFAULT_GUARD_WINDOW,
            catalog: CategoryCatalog::default(),
            mapping: ClassificationMap::new(),
            path: None,
        }
    }
}

impl EngineConfig {
    /// Load with layered resolution
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let candidates = explicit
            .map(Path::to_path_buf)
            .into_iter()
            .chain(default_config_path());

        for path in candidates {
            if path.exists() {
                let content = fs::read_to_string(&path).map_err(|e| {
                    Error::Config(format!("Failed to read {}: {}", path.display(), e))
                })?;
                let mut config = parse_config(&content)?;
                debug!(path = %path.display(), "Loaded config");
                config.path = Some(path);
                return Ok(config);
            }
        }

        debug!("Using embedded default config");
        parse_config(DEFAULT_CONFIG)
    }

    /// Parse a TOML document over the defaults
    pub fn from_toml(content: &str) -> Result<Self> {
        parse_config(content)
    }
}

/// Default config override path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("spendtree").join("config.toml"))
}

/// Write the embedded defaults to `path` unless a file is already there
pub fn ensure_config_file(path: &Path) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    fs::write(path, DEFAULT_CONFIG)?;
    Ok(())
}

/// Raw config structure for TOML parsing
#[derive(Debug, Deserialize)]
struct RawConfig {
    engine: Option<RawEngine>,
    other: Option<RawCategory>,
    categories: Option<Vec<RawCategory>>,
}

#[derive(Debug, Deserialize)]
struct RawEngine {
    guard_window_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawCategory {
    id: Option<String>,
    name: Option<String>,
    icon: Option<String>,
    color: Option<String>,
}

impl RawCategory {
    fn into_category(self, default_id: Option<&str>) -> Result<Category> {
        let id = self
            .id
            .or_else(|| default_id.map(String::from))
            .ok_or_else(|| Error::Config("Category is missing an id".into()))?;
        let name = self.name.unwrap_or_else(|| id.clone());
        Ok(Category {
            id,
            name,
            icon: self.icon,
            color: self.color,
        })
    }
}

fn parse_config(content: &str) -> Result<EngineConfig> {
    let raw: RawConfig = toml::from_str(content)
        .map_err(|e| Error::Config(format!("Invalid config TOML: {}", e)))?;
    let table: toml::Table = content
        .parse()
        .map_err(|e| Error::Config(format!("Invalid config TOML: {}", e)))?;

    let mut config = EngineConfig::default();

    if let Some(window) = raw.engine.and_then(|e| e.guard_window_ms) {
        config.guard_window = Duration::from_millis(window);
    }

    let other = match raw.other {
        Some(other) => other.into_category(Some(OTHER_CATEGORY_ID))?,
        None => config.catalog.other().clone(),
    };
    let categories = raw
        .categories
        .unwrap_or_default()
        .into_iter()
        .map(|c| c.into_category(None))
        .collect::<Result<Vec<_>>>()?;
    config.catalog =
        CategoryCatalog::new(categories, other).map_err(|e| Error::Config(e.to_string()))?;

    config.mapping = mapping_from_table(&table)?;

    Ok(config)
}
