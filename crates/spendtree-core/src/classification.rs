//! Tag → category classification and the category catalog
//!
//! The classification map is a plain lookup: a tag either has an explicit
//! category or falls into the catalog's "other" bucket. The catalog carries
//! display metadata and the tie-break order for categories with equal totals.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default identifier of the catch-all bucket
pub const OTHER_CATEGORY_ID: &str = "other";

/// A declared category with its (opaque) display metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

impl Category {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            icon: None,
            color: None,
        }
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    /// Metadata for a category id the catalog does not declare
    fn ad_hoc(id: &str) -> Self {
        Self::new(id, id)
    }
}

/// Ordered list of known categories plus the catch-all bucket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryCatalog {
    categories: Vec<Category>,
    other: Category,
}

impl Default for CategoryCatalog {
    fn default() -> Self {
        Self {
            categories: Vec::new(),
            other: Category::new(OTHER_CATEGORY_ID, "Other"),
        }
    }
}

impl CategoryCatalog {
    pub fn new(categories: Vec<Category>, other: Category) -> Result<Self> {
        let mut seen = HashSet::new();
        seen.insert(other.id.clone());
        for category in &categories {
            if category.id.trim().is_empty() {
                return Err(Error::InvalidData("Category id cannot be empty".into()));
            }
            if !seen.insert(category.id.clone()) {
                return Err(Error::InvalidData(format!(
                    "Category '{}' is declared more than once",
                    category.id
                )));
            }
        }
        Ok(Self { categories, other })
    }

    /// Catalog with the default "other" bucket
    pub fn with_categories(categories: Vec<Category>) -> Result<Self> {
        Self::new(categories, Category::new(OTHER_CATEGORY_ID, "Other"))
    }

    pub fn other_id(&self) -> &str {
        &self.other.id
    }

    pub fn other(&self) -> &Category {
        &self.other
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn get(&self, id: &str) -> Option<&Category> {
        if id == self.other.id {
            return Some(&self.other);
        }
        self.categories.iter().find(|c| c.id == id)
    }

    /// Whether spending under this category shows up in the month view
    pub fn is_named(&self, id: &str) -> bool {
        id != self.other.id && self.categories.iter().any(|c| c.id == id)
    }

    /// Tie-break rank: declared order, then the other bucket, then ad-hoc ids
    pub fn rank(&self, id: &str) -> usize {
        if let Some(pos) = self.categories.iter().position(|c| c.id == id) {
            pos
        } else if id == self.other.id {
            self.categories.len()
        } else {
            self.categories.len() + 1
        }
    }

    /// Display metadata, falling back to an ad-hoc entry for unknown ids
    pub fn metadata_for(&self, id: &str) -> Category {
        self.get(id)
            .cloned()
            .unwrap_or_else(|| Category::ad_hoc(id))
    }
}

/// Tag name → category id lookup
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassificationMap {
    mapping: BTreeMap<String, String>,
}

impl ClassificationMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a tag's category, using `default` for unmapped tags
    pub fn category_for<'a>(&'a self, tag: &str, default: &'a str) -> &'a str {
        match self.mapping.get(tag) {
            Some(category) if !category.trim().is_empty() => category,
            _ => default,
        }
    }

    /// Map a tag to a category, replacing any previous mapping
    pub fn set(&mut self, tag: &str, category_id: &str) -> Result<()> {
        let tag = tag.trim();
        let category_id = category_id.trim();
        if tag.is_empty() || category_id.is_empty() {
            return Err(Error::InvalidData(
                "Tag and category must both be non-empty".into(),
            ));
        }
        self.mapping
            .insert(tag.to_string(), category_id.to_string());
        Ok(())
    }

    pub fn remove(&mut self, tag: &str) -> Option<String> {
        self.mapping.remove(tag)
    }

    pub fn get(&self, tag: &str) -> Option<&str> {
        self.mapping.get(tag).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.mapping.iter().map(|(t, c)| (t.as_str(), c.as_str()))
    }

    pub fn len(&self) -> usize {
        self.mapping.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }
}

impl<T: Into<String>, C: Into<String>> FromIterator<(T, C)> for ClassificationMap {
    fn from_iter<I: IntoIterator<Item = (T, C)>>(iter: I) -> Self {
        Self {
            mapping: iter
                .into_iter()
                .map(|(t, c)| (t.into(), c.into()))
                .collect(),
        }
    }
}
