//! A computed analysis: the snapshot, the inputs used to aggregate it, and the
//! resulting category tree
//!
//! An `Analysis` is immutable. Rebuilds and reconciliations produce a new one,
//! which the session swaps in behind an `Arc`.

use std::sync::Arc;

use crate::aggregate::{aggregate, verify_tree};
use crate::classification::{CategoryCatalog, ClassificationMap};
use crate::error::Result;
use crate::models::{CategoryAggregate, MonthAggregate, MonthBar, MonthRange, Snapshot};
use crate::month::{aggregate_month, month_bars};

#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    pub snapshot: Arc<Snapshot>,
    pub classification: Arc<ClassificationMap>,
    pub catalog: Arc<CategoryCatalog>,
    pub period: MonthRange,
    pub categories: Vec<CategoryAggregate>,
}

impl Analysis {
    /// Aggregate a snapshot from scratch and check the result
    pub fn build(
        snapshot: Arc<Snapshot>,
        classification: Arc<ClassificationMap>,
        catalog: Arc<CategoryCatalog>,
        period: MonthRange,
    ) -> Result<Self> {
        let categories = aggregate(
            snapshot.transactions(),
            &classification,
            &catalog,
            Some(&period),
        );
        verify_tree(&categories)?;
        Ok(Self {
            snapshot,
            classification,
            catalog,
            period,
            categories,
        })
    }

    pub fn category(&self, id: &str) -> Option<&CategoryAggregate> {
        self.categories.iter().find(|c| c.id == id)
    }

    /// Month view for a month; empty when the month is outside the period
    pub fn month(&self, month: &str) -> MonthAggregate {
        if !self.period.contains(month) {
            return MonthAggregate {
                month: month.to_string(),
                total: 0,
                count: 0,
                tags: Vec::new(),
            };
        }
        aggregate_month(
            self.snapshot.transactions(),
            month,
            &self.classification,
            &self.catalog,
        )
    }

    pub fn month_bars(&self) -> Vec<MonthBar> {
        month_bars(
            self.snapshot.transactions(),
            &self.classification,
            &self.catalog,
            Some(&self.period),
        )
    }

    /// Total spending across every category
    pub fn total(&self) -> i64 {
        self.categories.iter().map(|c| c.total).sum()
    }

    /// Same inputs, recomputed over a different snapshot
    pub(crate) fn with_tree(
        &self,
        snapshot: Arc<Snapshot>,
        categories: Vec<CategoryAggregate>,
    ) -> Self {
        Self {
            snapshot,
            classification: Arc::clone(&self.classification),
            catalog: Arc::clone(&self.catalog),
            period: self.period.clone(),
            categories,
        }
    }
}
