//! Classification map stored in the `[mapping]` table of a TOML file
//!
//! The rest of the file (engine settings, categories) is preserved when a
//! mapping is written back.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::classification::ClassificationMap;
use crate::error::{Error, Result};

use super::ClassificationSource;

const MAPPING_TABLE: &str = "mapping";

pub struct TomlClassificationFile {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl TomlClassificationFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The whole document; a missing file reads as empty
    fn read_table(&self) -> Result<toml::Table> {
        if !self.path.exists() {
            return Ok(toml::Table::new());
        }
        let content = std::fs::read_to_string(&self.path)?;
        content
            .parse::<toml::Table>()
            .map_err(|e| Error::Config(format!("{}: {}", self.path.display(), e)))
    }

    fn write_table(&self, table: &toml::Table) -> Result<()> {
        let content = toml::to_string_pretty(table)
            .map_err(|e| Error::Config(format!("Failed to serialize mapping: {}", e)))?;

        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir)?;
        let tmp = tempfile::NamedTempFile::new_in(dir)?;
        std::fs::write(tmp.path(), content)?;
        tmp.persist(&self.path).map_err(|e| Error::Io(e.error))?;
        Ok(())
    }
}

/// Read the `[mapping]` table of a parsed document
pub(crate) fn mapping_from_table(table: &toml::Table) -> Result<ClassificationMap> {
    let Some(value) = table.get(MAPPING_TABLE) else {
        return Ok(ClassificationMap::new());
    };
    let mapping = value
        .as_table()
        .ok_or_else(|| Error::Config("[mapping] must be a table".into()))?;

    let mut map = ClassificationMap::new();
    for (tag, category) in mapping {
        let category = category.as_str().ok_or_else(|| {
            Error::Config(format!("Mapping for tag '{}' must be a string", tag))
        })?;
        map.set(tag, category)?;
    }
    Ok(map)
}

#[async_trait]
impl ClassificationSource for TomlClassificationFile {
    async fn get_mapping(&self) -> Result<ClassificationMap> {
        let table = self.read_table()?;
        mapping_from_table(&table)
    }

    async fn set_mapping(&self, tag: &str, category_id: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        // Validates both sides before touching the file
        let mut check = ClassificationMap::new();
        check.set(tag, category_id)?;

        let mut table = self.read_table()?;
        let mapping = table
            .entry(MAPPING_TABLE)
            .or_insert_with(|| toml::Value::Table(toml::Table::new()));
        let mapping = mapping
            .as_table_mut()
            .ok_or_else(|| Error::Config("[mapping] must be a table".into()))?;
        mapping.insert(
            tag.trim().to_string(),
            toml::Value::String(category_id.trim().to_string()),
        );

        self.write_table(&table)?;
        debug!(tag, category_id, path = %self.path.display(), "Saved tag mapping");
        Ok(())
    }
}
