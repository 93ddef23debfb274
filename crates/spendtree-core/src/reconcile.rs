//! Reclassification of a single transaction and incremental recompute
//!
//! Reclassifying replaces a transaction's tags with a single new tag and
//! recomputes only the categories that can have changed: the one the old tag
//! belonged to and the one the new tag belongs to. Every other category is
//! carried over untouched. Tags are identified by name only, so moving a
//! transaction onto an existing tag name merges it into that tag for free.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::debug;

use crate::aggregate::{aggregate_categories, sort_categories, verify_tree};
use crate::analysis::Analysis;
use crate::classification::{CategoryCatalog, ClassificationMap};
use crate::error::{Error, Result};
use crate::models::{CategoryAggregate, MonthRange, Snapshot, Transaction, TxId};

/// A snapshot with one transaction reclassified
#[derive(Debug, Clone)]
pub struct Reclassification {
    pub snapshot: Arc<Snapshot>,
    /// Categories whose aggregates may differ from the previous tree
    pub affected_categories: BTreeSet<String>,
    /// Tags the transaction carried before, for rollback
    pub previous_tags: Vec<String>,
}

/// Produce a new snapshot where `tx_id` carries exactly `[new_tag]`
pub fn reclassify(
    snapshot: &Snapshot,
    tx_id: TxId,
    new_tag: &str,
    classification: &ClassificationMap,
    catalog: &CategoryCatalog,
) -> Result<Reclassification> {
    let new_tag = new_tag.trim();
    if new_tag.is_empty() {
        return Err(Error::InvalidData("New tag cannot be empty".into()));
    }
    let current = snapshot
        .get(tx_id)
        .ok_or_else(|| Error::NotFound(format!("Transaction {}", tx_id)))?;
    let previous_tags = current.tags.clone();

    let updated = snapshot.with_tags(tx_id, vec![new_tag.to_string()])?;
    let affected_categories = affected_between(
        current,
        updated.get(tx_id).map(Arc::as_ref),
        classification,
        catalog,
    );

    debug!(
        tx_id,
        from = current.primary_tag().unwrap_or("-"),
        to = new_tag,
        affected = ?affected_categories,
        "Reclassified transaction in snapshot"
    );

    Ok(Reclassification {
        snapshot: Arc::new(updated),
        affected_categories,
        previous_tags,
    })
}

/// Put a transaction's previous tags back, returning the new snapshot and the
/// categories it touches
pub fn restore_tags(
    snapshot: &Snapshot,
    tx_id: TxId,
    tags: Vec<String>,
    classification: &ClassificationMap,
    catalog: &CategoryCatalog,
) -> Result<(Arc<Snapshot>, BTreeSet<String>)> {
    let current = snapshot
        .get(tx_id)
        .ok_or_else(|| Error::NotFound(format!("Transaction {}", tx_id)))?;
    let restored = snapshot.with_tags(tx_id, tags)?;
    let affected = affected_between(
        current,
        restored.get(tx_id).map(Arc::as_ref),
        classification,
        catalog,
    );
    Ok((Arc::new(restored), affected))
}

fn affected_between(
    before: &Transaction,
    after: Option<&Transaction>,
    classification: &ClassificationMap,
    catalog: &CategoryCatalog,
) -> BTreeSet<String> {
    let other = catalog.other_id();
    let category = |tx: &Transaction| {
        tx.contributing_tag()
            .map(|tag| classification.category_for(tag, other).to_string())
    };
    category(before)
        .into_iter()
        .chain(after.and_then(category))
        .collect()
}

/// Recompute the affected categories of `analysis` over a new snapshot
///
/// The result equals a full aggregation of `snapshot`. It is checked against
/// the sum invariants before being returned; on failure the caller keeps its
/// previous tree.
pub fn recompute(
    analysis: &Analysis,
    snapshot: &Snapshot,
    affected: &BTreeSet<String>,
) -> Result<Vec<CategoryAggregate>> {
    recompute_tree(
        &analysis.categories,
        snapshot,
        affected,
        &analysis.classification,
        &analysis.catalog,
        &analysis.period,
    )
}

pub fn recompute_tree(
    current: &[CategoryAggregate],
    snapshot: &Snapshot,
    affected: &BTreeSet<String>,
    classification: &ClassificationMap,
    catalog: &CategoryCatalog,
    period: &MonthRange,
) -> Result<Vec<CategoryAggregate>> {
    let mut categories: Vec<CategoryAggregate> = current
        .iter()
        .filter(|c| !affected.contains(&c.id))
        .cloned()
        .collect();

    if !affected.is_empty() {
        let fresh = aggregate_categories(
            snapshot.transactions(),
            classification,
            catalog,
            Some(period),
            affected,
        );
        categories.extend(fresh);
        sort_categories(&mut categories, catalog);
    }

    verify_tree(&categories)?;
    debug!(
        affected = ?affected,
        categories = categories.len(),
        "Recomputed affected categories"
    );
    Ok(categories)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::aggregate;
    use crate::classification::Category;
    use chrono::NaiveDate;

    fn tx(id: i64, month: u32, cents: i64, tag: &str) -> Transaction {
        let date = NaiveDate::from_ymd_opt(2024, month, 10).unwrap();
        let tags = if tag.is_empty() {
            vec![]
        } else {
            vec![tag.to_string()]
        };
        Transaction::new(id, date, cents, format!("tx {}", id), tags)
    }

    fn analysis(transactions: Vec<Transaction>) -> Analysis {
        let catalog = CategoryCatalog::with_categories(vec![
            Category::new("groceries", "Groceries"),
            Category::new("leisure", "Leisure"),
            Category::new("home", "Home"),
        ])
        .unwrap();
        let map: ClassificationMap = [
            ("courses", "groceries"),
            ("resto", "leisure"),
            ("cinema", "leisure"),
            ("rent", "home"),
        ]
        .into_iter()
        .collect();
        Analysis::build(
            Arc::new(Snapshot::new(transactions).unwrap()),
            Arc::new(map),
            Arc::new(catalog),
            MonthRange::all(),
        )
        .unwrap()
    }

    fn apply(analysis: &Analysis, tx_id: i64, tag: &str) -> Analysis {
        let change = reclassify(
            &analysis.snapshot,
            tx_id,
            tag,
            &analysis.classification,
            &analysis.catalog,
        )
        .unwrap();
        let tree = recompute(analysis, &change.snapshot, &change.affected_categories).unwrap();
        analysis.with_tree(change.snapshot, tree)
    }

    fn full(analysis: &Analysis) -> Vec<CategoryAggregate> {
        aggregate(
            analysis.snapshot.transactions(),
            &analysis.classification,
            &analysis.catalog,
            Some(&analysis.period),
        )
    }

    fn sample() -> Vec<Transaction> {
        vec![
            tx(1, 1, -5000, "resto"),
            tx(2, 1, -1500, "cinema"),
            tx(3, 2, -3000, "courses"),
            tx(4, 2, -90000, "rent"),
            tx(5, 2, -700, ""),
        ]
    }

    #[test]
    fn test_reclassify_moves_amount_between_categories() {
        let before = analysis(sample());
        let after = apply(&before, 1, "courses");

        let leisure_before = before.category("leisure").unwrap().total;
        let groceries_before = before.category("groceries").unwrap().total;
        assert_eq!(after.category("leisure").unwrap().total, leisure_before - 5000);
        assert_eq!(
            after.category("groceries").unwrap().total,
            groceries_before + 5000
        );
        assert_eq!(after.category("home"), before.category("home"));

        let courses = after.category("groceries").unwrap().tag("courses").unwrap();
        assert!(courses.contains(1));
        assert!(after.category("leisure").unwrap().tag("resto").is_none());
    }

    #[test]
    fn test_affected_categories() {
        let before = analysis(sample());
        let change = reclassify(
            &before.snapshot,
            1,
            "courses",
            &before.classification,
            &before.catalog,
        )
        .unwrap();
        let expected: BTreeSet<String> =
            ["groceries".to_string(), "leisure".to_string()].into_iter().collect();
        assert_eq!(change.affected_categories, expected);
        assert_eq!(change.previous_tags, vec!["resto".to_string()]);
    }

    #[test]
    fn test_reclassify_within_same_category() {
        let before = analysis(sample());
        let after = apply(&before, 2, "resto");
        let leisure = after.category("leisure").unwrap();
        assert_eq!(leisure.total, 6500);
        assert_eq!(leisure.tags.len(), 1);
        assert_eq!(leisure.tags[0].count, 2);
    }

    #[test]
    fn test_reclassify_unclassified_into_category() {
        let before = analysis(sample());
        let after = apply(&before, 5, "cinema");
        assert_eq!(after.category("leisure").unwrap().total, 7200);
        assert_eq!(after.categories, full(&after));
    }

    #[test]
    fn test_emptied_category_is_pruned() {
        let before = analysis(sample());
        let after = apply(&before, 4, "resto");
        assert!(after.category("home").is_none());
        assert_eq!(after.categories, full(&after));
    }

    #[test]
    fn test_reclassify_replaces_tags() {
        let mut txs = sample();
        txs[0].tags = vec!["resto".into(), "cinema".into()];
        let before = analysis(txs);
        let after = apply(&before, 1, "courses");
        assert_eq!(after.snapshot.get(1).unwrap().tags, vec!["courses".to_string()]);
    }

    #[test]
    fn test_incremental_matches_full_after_sequence() {
        let mut current = analysis(sample());
        for (id, tag) in [
            (1, "courses"),
            (2, "rent"),
            (3, "gifts"),
            (1, "resto"),
            (4, "cinema"),
            (5, "unclassified"),
            (2, "gifts"),
        ] {
            current = apply(&current, id, tag);
            assert_eq!(current.categories, full(&current), "after {} -> {}", id, tag);
            verify_tree(&current.categories).unwrap();
        }
    }

    #[test]
    fn test_restore_tags_undoes_reclassify() {
        let before = analysis(sample());
        let after = apply(&before, 1, "courses");

        let (snapshot, affected) = restore_tags(
            &after.snapshot,
            1,
            vec!["resto".into()],
            &after.classification,
            &after.catalog,
        )
        .unwrap();
        let tree = recompute(&after, &snapshot, &affected).unwrap();
        assert_eq!(tree, before.categories);
    }

    #[test]
    fn test_preconditions() {
        let before = analysis(sample());
        assert!(matches!(
            reclassify(&before.snapshot, 99, "x", &before.classification, &before.catalog),
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            reclassify(&before.snapshot, 1, "  ", &before.classification, &before.catalog),
            Err(Error::InvalidData(_))
        ));
    }

    #[test]
    fn test_recompute_rejects_broken_tree() {
        let before = analysis(sample());
        let mut broken = before.categories.clone();
        broken[0].total += 1;
        let untouched = broken[0].id.clone();
        let affected: BTreeSet<String> = before
            .categories
            .iter()
            .map(|c| c.id.clone())
            .filter(|id| id != &untouched)
            .collect();

        let result = recompute_tree(
            &broken,
            &before.snapshot,
            &affected,
            &before.classification,
            &before.catalog,
            &before.period,
        );
        assert!(matches!(result, Err(Error::InconsistentSnapshot(_))));
    }
}
