//! External collaborators the engine consumes
//!
//! The engine never owns persistence. It reads transactions and the
//! classification map through these traits and sends durable reclassifications
//! back through them. All calls are treated as slow and fallible.
//!
//! # Implementations
//!
//! - `InMemorySource` / `StaticClassification`: process-local, with failure and
//!   latency injection for tests and demos
//! - `CsvSource`: a CSV transaction file, rewritten atomically on reclassify
//! - `TomlClassificationFile`: the `[mapping]` table of a TOML file

mod csv_file;
mod mapping_file;
mod memory;

pub use csv_file::{parse_transactions, write_transactions, CsvSource};
pub use mapping_file::TomlClassificationFile;
pub(crate) use mapping_file::mapping_from_table;
pub use memory::{InMemorySource, StaticClassification};

use async_trait::async_trait;

use crate::classification::ClassificationMap;
use crate::error::Result;
use crate::models::{MonthRange, Transaction, TxId};

/// The transaction service: listing plus the durable reclassify write
#[async_trait]
pub trait TransactionSource: Send + Sync {
    /// All transactions whose month falls in `range`
    async fn list_transactions(&self, range: &MonthRange) -> Result<Vec<Transaction>>;

    /// Durably replace a transaction's tags with `[new_tag]`
    async fn reclassify(&self, tx_id: TxId, new_tag: &str) -> Result<()>;
}

/// Where tag → category mappings live
#[async_trait]
pub trait ClassificationSource: Send + Sync {
    async fn get_mapping(&self) -> Result<ClassificationMap>;

    async fn set_mapping(&self, tag: &str, category_id: &str) -> Result<()>;
}
