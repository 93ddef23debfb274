//! Process-local sources
//!
//! Useful for unit tests and development without a transaction service.
//! Write failures and latency can be injected to exercise rollback and the
//! refresh guard window.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;

use crate::classification::ClassificationMap;
use crate::error::{Error, Result};
use crate::models::{MonthRange, Transaction, TxId};

use super::{ClassificationSource, TransactionSource};

/// In-memory transaction service
#[derive(Debug, Default)]
pub struct InMemorySource {
    transactions: Mutex<Vec<Transaction>>,
    fail_writes: AtomicBool,
    latency_ms: AtomicU64,
    writes: AtomicUsize,
}

impl InMemorySource {
    pub fn new(transactions: Vec<Transaction>) -> Self {
        Self {
            transactions: Mutex::new(transactions),
            ..Self::default()
        }
    }

    /// Delay applied to every call
    pub fn with_latency(self, latency: Duration) -> Self {
        self.set_latency(latency);
        self
    }

    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    /// Make subsequent reclassify calls fail
    pub fn set_failing(&self, failing: bool) {
        self.fail_writes.store(failing, Ordering::SeqCst);
    }

    /// Number of successful durable writes
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Current stored transactions
    pub fn transactions(&self) -> Result<Vec<Transaction>> {
        Ok(self.lock()?.clone())
    }

    /// Replace the stored data, as another client of the service would
    pub fn replace(&self, transactions: Vec<Transaction>) -> Result<()> {
        *self.lock()? = transactions;
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<Transaction>>> {
        self.transactions
            .lock()
            .map_err(|_| Error::Internal("in-memory source lock poisoned".into()))
    }

    async fn simulate_latency(&self) {
        let ms = self.latency_ms.load(Ordering::SeqCst);
        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }
}

#[async_trait]
impl TransactionSource for InMemorySource {
    async fn list_transactions(&self, range: &MonthRange) -> Result<Vec<Transaction>> {
        self.simulate_latency().await;
        Ok(self
            .lock()?
            .iter()
            .filter(|tx| range.contains(&tx.month))
            .cloned()
            .collect())
    }

    async fn reclassify(&self, tx_id: TxId, new_tag: &str) -> Result<()> {
        self.simulate_latency().await;
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::Source(format!(
                "write rejected for transaction {}",
                tx_id
            )));
        }

        let mut transactions = self.lock()?;
        let tx = transactions
            .iter_mut()
            .find(|tx| tx.id == tx_id)
            .ok_or_else(|| Error::NotFound(format!("Transaction {}", tx_id)))?;
        tx.tags = vec![new_tag.to_string()];
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// In-memory classification map
#[derive(Debug, Default)]
pub struct StaticClassification {
    mapping: RwLock<ClassificationMap>,
}

impl StaticClassification {
    pub fn new(mapping: ClassificationMap) -> Self {
        Self {
            mapping: RwLock::new(mapping),
        }
    }
}

#[async_trait]
impl ClassificationSource for StaticClassification {
    async fn get_mapping(&self) -> Result<ClassificationMap> {
        self.mapping
            .read()
            .map(|m| m.clone())
            .map_err(|_| Error::Internal("classification lock poisoned".into()))
    }

    async fn set_mapping(&self, tag: &str, category_id: &str) -> Result<()> {
        self.mapping
            .write()
            .map_err(|_| Error::Internal("classification lock poisoned".into()))?
            .set(tag, category_id)
    }
}
