//! Spendtree Core Library
//!
//! Aggregation engine for a personal expense tracker:
//! - Tag → category classification with a catch-all bucket
//! - Category → tag → transaction aggregation with monthly statistics
//! - Month view of named-category spending
//! - Drill-down navigation that stays consistent with the tree
//! - Optimistic reclassification reconciled with a slow transaction service
//! - CSV and TOML backed sources, layered engine configuration

pub mod aggregate;
pub mod analysis;
pub mod classification;
pub mod config;
pub mod error;
pub mod models;
pub mod month;
pub mod navigator;
pub mod reconcile;
pub mod session;
pub mod sources;

pub use aggregate::{aggregate, verify_tree};
pub use analysis::Analysis;
pub use classification::{Category, CategoryCatalog, ClassificationMap, OTHER_CATEGORY_ID};
pub use config::EngineConfig;
pub use error::{Error, Result};
pub use models::{
    format_cents, CategoryAggregate, MonthAggregate, MonthBar, MonthRange, MonthlyAmount,
    Snapshot, TagAggregate, Transaction, TxId, UNCLASSIFIED_TAG,
};
pub use month::{aggregate_month, month_bars};
pub use navigator::{Navigator, Selection, ViewState};
pub use reconcile::{reclassify, Reclassification};
pub use session::{ReclassifyOutcome, RefreshOutcome, Session};
pub use sources::{
    ClassificationSource, CsvSource, InMemorySource, StaticClassification,
    TomlClassificationFile, TransactionSource,
};
