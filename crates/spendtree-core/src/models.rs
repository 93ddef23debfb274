//! Domain models for spendtree
//!
//! Transactions are owned by the external transaction service; the engine keeps
//! them behind `Arc` so aggregates can hold back-references without copying.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Sentinel tag meaning "not classified yet"
pub const UNCLASSIFIED_TAG: &str = "unclassified";

/// Transaction identifier (stable, assigned by the transaction service)
pub type TxId = i64;

/// A dated financial transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TxId,
    /// Signed amount in cents; negative is an expense
    pub amount_cents: i64,
    pub date: NaiveDate,
    /// `YYYY-MM`, derived from `date` unless supplied
    pub month: String,
    pub label: String,
    /// Ordered tag names; index 0 is the primary tag
    pub tags: Vec<String>,
}

impl Transaction {
    /// Create a transaction whose month is derived from its date
    pub fn new(
        id: TxId,
        date: NaiveDate,
        amount_cents: i64,
        label: impl Into<String>,
        tags: Vec<String>,
    ) -> Self {
        Self {
            id,
            amount_cents,
            date,
            month: month_key(date),
            label: label.into(),
            tags,
        }
    }

    /// Override the derived month (e.g. when the service books a transaction
    /// into a different period than its date)
    pub fn with_month(mut self, month: &str) -> Result<Self> {
        self.month = parse_month(month)?;
        Ok(self)
    }

    pub fn is_expense(&self) -> bool {
        self.amount_cents < 0
    }

    /// The primary tag, or None when the transaction is unclassified
    pub fn primary_tag(&self) -> Option<&str> {
        let tag = self.tags.first()?.as_str();
        if tag.trim().is_empty() || tag.eq_ignore_ascii_case(UNCLASSIFIED_TAG) {
            None
        } else {
            Some(tag)
        }
    }

    /// The tag this transaction contributes to, if it participates in
    /// aggregation at all
    pub fn contributing_tag(&self) -> Option<&str> {
        if self.is_expense() {
            self.primary_tag()
        } else {
            None
        }
    }
}

/// Format a date as its `YYYY-MM` month key
pub fn month_key(date: NaiveDate) -> String {
    format!("{:04}-{:02}", date.year(), date.month())
}

/// Validate a `YYYY-MM` month key
pub fn parse_month(s: &str) -> Result<String> {
    let s = s.trim();
    NaiveDate::parse_from_str(&format!("{}-01", s), "%Y-%m-%d")
        .map(month_key)
        .map_err(|_| Error::InvalidData(format!("Invalid month '{}' (use YYYY-MM)", s)))
}

/// Inclusive month range used to restrict an analysis period
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthRange {
    pub from: Option<String>,
    pub to: Option<String>,
}

impl MonthRange {
    /// Unbounded range
    pub fn all() -> Self {
        Self::default()
    }

    pub fn new(from: Option<&str>, to: Option<&str>) -> Result<Self> {
        let from = from.map(parse_month).transpose()?;
        let to = to.map(parse_month).transpose()?;
        if let (Some(f), Some(t)) = (&from, &to) {
            if f > t {
                return Err(Error::InvalidData(format!(
                    "Month range start {} is after end {}",
                    f, t
                )));
            }
        }
        Ok(Self { from, to })
    }

    pub fn contains(&self, month: &str) -> bool {
        let after_start = self.from.as_deref().map_or(true, |f| month >= f);
        let before_end = self.to.as_deref().map_or(true, |t| month <= t);
        after_start && before_end
    }
}

/// Immutable, id-indexed set of transactions
///
/// Mutation always produces a new snapshot that shares unchanged transactions
/// with the old one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    transactions: Vec<Arc<Transaction>>,
    index: HashMap<TxId, usize>,
}

impl Snapshot {
    pub fn new(transactions: Vec<Transaction>) -> Result<Self> {
        Self::from_shared(transactions.into_iter().map(Arc::new).collect())
    }

    pub fn from_shared(transactions: Vec<Arc<Transaction>>) -> Result<Self> {
        let mut index = HashMap::with_capacity(transactions.len());
        for (pos, tx) in transactions.iter().enumerate() {
            if index.insert(tx.id, pos).is_some() {
                return Err(Error::InvalidData(format!(
                    "Duplicate transaction id {} in snapshot",
                    tx.id
                )));
            }
        }
        Ok(Self {
            transactions,
            index,
        })
    }

    pub fn transactions(&self) -> &[Arc<Transaction>] {
        &self.transactions
    }

    pub fn get(&self, id: TxId) -> Option<&Arc<Transaction>> {
        self.index.get(&id).map(|&pos| &self.transactions[pos])
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    /// Copy of this snapshot with one transaction's tags replaced
    pub fn with_tags(&self, id: TxId, tags: Vec<String>) -> Result<Self> {
        let pos = *self
            .index
            .get(&id)
            .ok_or_else(|| Error::NotFound(format!("Transaction {}", id)))?;

        let mut updated = Transaction::clone(&self.transactions[pos]);
        updated.tags = tags;

        let mut transactions = self.transactions.clone();
        transactions[pos] = Arc::new(updated);
        Ok(Self {
            transactions,
            index: self.index.clone(),
        })
    }
}

/// Spending rolled up under one tag name
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TagAggregate {
    pub name: String,
    pub category_id: String,
    /// Sum of absolute amounts, in cents
    pub total: i64,
    pub count: usize,
    /// Month key → cents
    pub monthly: BTreeMap<String, i64>,
    /// Back-references into the snapshot, newest first
    pub transactions: Vec<Arc<Transaction>>,
}

impl TagAggregate {
    pub(crate) fn empty(name: &str, category_id: &str) -> Self {
        Self {
            name: name.to_string(),
            category_id: category_id.to_string(),
            total: 0,
            count: 0,
            monthly: BTreeMap::new(),
            transactions: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, tx: &Arc<Transaction>) {
        let amount = tx.amount_cents.abs();
        self.total += amount;
        self.count += 1;
        *self.monthly.entry(tx.month.clone()).or_insert(0) += amount;
        self.transactions.push(Arc::clone(tx));
    }

    pub(crate) fn sort_transactions(&mut self) {
        self.transactions
            .sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.id.cmp(&b.id)));
    }

    /// The same tag restricted to the transactions of one month
    pub fn restricted_to_month(&self, month: &str) -> TagAggregate {
        let mut restricted = TagAggregate::empty(&self.name, &self.category_id);
        for tx in self.transactions.iter().filter(|tx| tx.month == month) {
            restricted.push(tx);
        }
        restricted
    }

    pub fn contains(&self, id: TxId) -> bool {
        self.transactions.iter().any(|tx| tx.id == id)
    }
}

/// One month of a category's spending
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyAmount {
    pub month: String,
    pub amount: i64,
    pub count: usize,
}

/// Spending rolled up under one category
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryAggregate {
    pub id: String,
    pub name: String,
    pub icon: Option<String>,
    pub color: Option<String>,
    pub total: i64,
    pub count: usize,
    pub tags: Vec<TagAggregate>,
    /// Months with activity, ascending
    pub monthly_data: Vec<MonthlyAmount>,
    /// Mean over months with activity, in cents
    pub avg_monthly: f64,
    /// Percentage deviation of the most recent month from the average
    pub variation: f64,
}

impl CategoryAggregate {
    pub fn tag(&self, name: &str) -> Option<&TagAggregate> {
        self.tags.iter().find(|t| t.name == name)
    }
}

/// Named-category spending for a single month
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthAggregate {
    pub month: String,
    pub total: i64,
    pub count: usize,
    pub tags: Vec<TagAggregate>,
}

impl MonthAggregate {
    pub fn tag(&self, name: &str) -> Option<&TagAggregate> {
        self.tags.iter().find(|t| t.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

/// Root-view bar for one month
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthBar {
    pub month: String,
    pub total: i64,
    pub count: usize,
}

/// Format cents as a decimal amount
pub fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}
