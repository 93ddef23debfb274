//! CSV transaction file
//!
//! Format: `id,date,amount,label,tags[,month]`
//! - `date`: `YYYY-MM-DD` or `MM/DD/YYYY`
//! - `amount`: decimal, optional `$` and thousands separators, `(12.50)` for
//!   negatives
//! - `tags`: `;`-separated, first one is the primary tag
//! - `month`: optional `YYYY-MM` override of the month derived from `date`

use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::{format_cents, MonthRange, Transaction, TxId};

use super::TransactionSource;

const HEADER: [&str; 6] = ["id", "date", "amount", "label", "tags", "month"];

/// Transaction source backed by a CSV file on disk
pub struct CsvSource {
    path: PathBuf,
    // Serializes read-modify-write cycles on the file
    write_lock: Mutex<()>,
}

impl CsvSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Vec<Transaction>> {
        let file = std::fs::File::open(&self.path).map_err(|e| {
            Error::Source(format!("Cannot open {}: {}", self.path.display(), e))
        })?;
        parse_transactions(file)
    }

    fn store(&self, transactions: &[Transaction]) -> Result<()> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        write_transactions(&mut tmp, transactions)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| Error::Io(e.error))?;
        Ok(())
    }
}

#[async_trait]
impl TransactionSource for CsvSource {
    async fn list_transactions(&self, range: &MonthRange) -> Result<Vec<Transaction>> {
        let transactions = self.load()?;
        debug!(path = %self.path.display(), count = transactions.len(), "Loaded CSV transactions");
        Ok(transactions
            .into_iter()
            .filter(|tx| range.contains(&tx.month))
            .collect())
    }

    async fn reclassify(&self, tx_id: TxId, new_tag: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let mut transactions = self.load()?;
        let tx = transactions
            .iter_mut()
            .find(|tx| tx.id == tx_id)
            .ok_or_else(|| Error::NotFound(format!("Transaction {}", tx_id)))?;
        tx.tags = vec![new_tag.to_string()];

        self.store(&transactions)?;
        debug!(tx_id, new_tag, path = %self.path.display(), "Persisted reclassification");
        Ok(())
    }
}

/// Parse transactions from CSV data
pub fn parse_transactions<R: Read>(reader: R) -> Result<Vec<Transaction>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h.eq_ignore_ascii_case(name))
    };
    let required = |name: &str| {
        column(name).ok_or_else(|| Error::InvalidData(format!("Missing '{}' column", name)))
    };
    let id_col = required("id")?;
    let date_col = required("date")?;
    let amount_col = required("amount")?;
    let label_col = column("label");
    let tags_col = column("tags");
    let month_col = column("month");

    let mut transactions = Vec::new();
    for result in rdr.records() {
        let record = result?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        let field = |col: usize| record.get(col).unwrap_or("");
        let optional = |col: Option<usize>| col.and_then(|c| record.get(c)).unwrap_or("");

        let row = parse_row(
            field(id_col),
            field(date_col),
            field(amount_col),
            optional(label_col),
            optional(tags_col),
            optional(month_col),
        )
        .map_err(|e| Error::InvalidData(format!("line {}: {}", line, e)))?;
        transactions.push(row);
    }

    Ok(transactions)
}

fn parse_row(
    id: &str,
    date: &str,
    amount: &str,
    label: &str,
    tags: &str,
    month: &str,
) -> std::result::Result<Transaction, String> {
    let id: TxId = id
        .parse()
        .map_err(|_| format!("invalid id '{}'", id))?;
    let date = parse_date(date).ok_or_else(|| format!("invalid date '{}'", date))?;
    let amount = parse_amount_cents(amount).ok_or_else(|| format!("invalid amount '{}'", amount))?;
    let tags = tags
        .split(';')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect();

    let tx = Transaction::new(id, date, amount, label, tags);
    if month.is_empty() {
        Ok(tx)
    } else {
        tx.with_month(month).map_err(|e| e.to_string())
    }
}

/// Write transactions as CSV (always including the month column)
pub fn write_transactions<W: Write>(writer: W, transactions: &[Transaction]) -> Result<()> {
    let mut wtr = WriterBuilder::new().from_writer(writer);
    wtr.write_record(HEADER)?;
    for tx in transactions {
        let record = StringRecord::from(vec![
            tx.id.to_string(),
            tx.date.format("%Y-%m-%d").to_string(),
            format_cents(tx.amount_cents),
            tx.label.clone(),
            tx.tags.join(";"),
            tx.month.clone(),
        ]);
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(s, "%m/%d/%Y"))
        .ok()
}

/// Parse a decimal amount into cents without going through floating point
fn parse_amount_cents(s: &str) -> Option<i64> {
    let s = s.trim();
    let (negative, s) = if let Some(inner) = s.strip_prefix('(').and_then(|s| s.strip_suffix(')')) {
        (true, inner)
    } else if let Some(rest) = s.strip_prefix('-') {
        (true, rest)
    } else {
        (false, s.strip_prefix('+').unwrap_or(s))
    };
    let cleaned: String = s.chars().filter(|c| *c != '$' && *c != ',').collect();
    if cleaned.is_empty() {
        return None;
    }

    let (whole, frac) = match cleaned.split_once('.') {
        Some((w, f)) => (w, f),
        None => (cleaned.as_str(), ""),
    };
    if frac.len() > 2 || !frac.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let whole: i64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    if whole < 0 {
        return None;
    }
    let frac: i64 = format!("{:0<2}", frac).parse().ok()?;
    let cents = whole.checked_mul(100)?.checked_add(frac)?;
    Some(if negative { -cents } else { cents })
}
