//! Category → tag rollups
//!
//! Everything here is a pure function of its inputs: the same snapshot,
//! classification and catalog always yield an equal tree. The reconciler relies
//! on that to recompute single categories and splice them into an existing tree.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

use crate::classification::{CategoryCatalog, ClassificationMap};
use crate::error::{Error, Result};
use crate::models::{CategoryAggregate, MonthRange, MonthlyAmount, TagAggregate, Transaction};

/// Build the full category tree for a set of transactions
///
/// Only expenses with a primary tag participate. Unmapped tags land in the
/// catalog's "other" bucket; category ids the catalog does not declare still
/// get their own (ad-hoc) aggregate.
pub fn aggregate(
    transactions: &[Arc<Transaction>],
    classification: &ClassificationMap,
    catalog: &CategoryCatalog,
    period: Option<&MonthRange>,
) -> Vec<CategoryAggregate> {
    build(transactions, classification, catalog, period, |_| true)
}

/// Same as [`aggregate`], restricted to a set of category ids
pub fn aggregate_categories(
    transactions: &[Arc<Transaction>],
    classification: &ClassificationMap,
    catalog: &CategoryCatalog,
    period: Option<&MonthRange>,
    only: &BTreeSet<String>,
) -> Vec<CategoryAggregate> {
    build(transactions, classification, catalog, period, |id| {
        only.contains(id)
    })
}

fn build(
    transactions: &[Arc<Transaction>],
    classification: &ClassificationMap,
    catalog: &CategoryCatalog,
    period: Option<&MonthRange>,
    include: impl Fn(&str) -> bool,
) -> Vec<CategoryAggregate> {
    let other = catalog.other_id();
    let tags = group_by_tag(transactions, |tx| {
        let category = classification.category_for(tx.contributing_tag()?, other);
        let in_period = period.map_or(true, |range| range.contains(&tx.month));
        (in_period && include(category)).then_some(category)
    });

    let mut grouped: BTreeMap<String, Vec<TagAggregate>> = BTreeMap::new();
    for tag in tags {
        grouped.entry(tag.category_id.clone()).or_default().push(tag);
    }

    let mut categories: Vec<CategoryAggregate> = grouped
        .into_iter()
        .map(|(id, tags)| build_category(&id, tags, catalog))
        .collect();
    sort_categories(&mut categories, catalog);

    tracing::debug!(
        transactions = transactions.len(),
        categories = categories.len(),
        "Aggregated category tree"
    );
    categories
}

/// Group contributing transactions by primary tag name
///
/// `category_of` returns the category a transaction's tag belongs to, or None
/// to leave the transaction out.
pub(crate) fn group_by_tag<'a>(
    transactions: &'a [Arc<Transaction>],
    category_of: impl Fn(&'a Transaction) -> Option<&'a str>,
) -> Vec<TagAggregate> {
    let mut tags: BTreeMap<&str, TagAggregate> = BTreeMap::new();
    for tx in transactions {
        let Some(tag) = tx.contributing_tag() else {
            continue;
        };
        let Some(category) = category_of(tx) else {
            continue;
        };
        tags.entry(tag)
            .or_insert_with(|| TagAggregate::empty(tag, category))
            .push(tx);
    }

    tags.into_values()
        .map(|mut tag| {
            tag.sort_transactions();
            tag
        })
        .collect()
}

fn build_category(id: &str, mut tags: Vec<TagAggregate>, catalog: &CategoryCatalog) -> CategoryAggregate {
    sort_tags(&mut tags);

    let mut months: BTreeMap<&str, (i64, usize)> = BTreeMap::new();
    for tx in tags.iter().flat_map(|t| t.transactions.iter()) {
        let entry = months.entry(tx.month.as_str()).or_insert((0, 0));
        entry.0 += tx.amount_cents.abs();
        entry.1 += 1;
    }
    let monthly_data: Vec<MonthlyAmount> = months
        .into_iter()
        .map(|(month, (amount, count))| MonthlyAmount {
            month: month.to_string(),
            amount,
            count,
        })
        .collect();

    let total: i64 = tags.iter().map(|t| t.total).sum();
    let count: usize = tags.iter().map(|t| t.count).sum();
    let (avg_monthly, variation) = monthly_stats(&monthly_data);
    let meta = catalog.metadata_for(id);

    CategoryAggregate {
        id: id.to_string(),
        name: meta.name,
        icon: meta.icon,
        color: meta.color,
        total,
        count,
        tags,
        monthly_data,
        avg_monthly,
        variation,
    }
}

/// Average over active months and the latest month's deviation from it
fn monthly_stats(monthly: &[MonthlyAmount]) -> (f64, f64) {
    if monthly.is_empty() {
        return (0.0, 0.0);
    }
    let sum: i64 = monthly.iter().map(|m| m.amount).sum();
    let avg = sum as f64 / monthly.len() as f64;

    // A single month has no baseline to compare against
    if monthly.len() < 2 || avg == 0.0 {
        return (avg, 0.0);
    }
    let last = monthly[monthly.len() - 1].amount as f64;
    (avg, (last - avg) / avg * 100.0)
}

/// Tags by total descending, then name
pub(crate) fn sort_tags(tags: &mut [TagAggregate]) {
    tags.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.name.cmp(&b.name)));
}

/// Categories by total descending, then catalog order, then id
pub(crate) fn sort_categories(categories: &mut [CategoryAggregate], catalog: &CategoryCatalog) {
    categories.sort_by(|a, b| {
        b.total
            .cmp(&a.total)
            .then_with(|| catalog.rank(&a.id).cmp(&catalog.rank(&b.id)))
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// Check the sum-of-children invariants over a category tree
pub fn verify_tree(categories: &[CategoryAggregate]) -> Result<()> {
    let mut seen_categories = HashSet::new();
    let mut seen_transactions = HashSet::new();

    for category in categories {
        if !seen_categories.insert(category.id.as_str()) {
            return Err(inconsistent(format!(
                "category '{}' appears twice",
                category.id
            )));
        }
        if category.total <= 0 {
            return Err(inconsistent(format!(
                "category '{}' has non-positive total {}",
                category.id, category.total
            )));
        }

        let tag_total: i64 = category.tags.iter().map(|t| t.total).sum();
        let tag_count: usize = category.tags.iter().map(|t| t.count).sum();
        if tag_total != category.total || tag_count != category.count {
            return Err(inconsistent(format!(
                "category '{}' total {} / count {} != tags {} / {}",
                category.id, category.total, category.count, tag_total, tag_count
            )));
        }
        let monthly_total: i64 = category.monthly_data.iter().map(|m| m.amount).sum();
        if monthly_total != category.total {
            return Err(inconsistent(format!(
                "category '{}' monthly sum {} != total {}",
                category.id, monthly_total, category.total
            )));
        }

        for tag in &category.tags {
            verify_tag(tag, &category.id, &mut seen_transactions)?;
        }
    }
    Ok(())
}

pub(crate) fn verify_tag(
    tag: &TagAggregate,
    category_id: &str,
    seen_transactions: &mut HashSet<i64>,
) -> Result<()> {
    if tag.count == 0 || tag.transactions.len() != tag.count {
        return Err(inconsistent(format!(
            "tag '{}' in '{}' has count {} with {} transactions",
            tag.name,
            category_id,
            tag.count,
            tag.transactions.len()
        )));
    }
    let tx_total: i64 = tag.transactions.iter().map(|tx| tx.amount_cents.abs()).sum();
    let monthly_total: i64 = tag.monthly.values().sum();
    if tx_total != tag.total || monthly_total != tag.total {
        return Err(inconsistent(format!(
            "tag '{}' in '{}' total {} != transactions {} / monthly {}",
            tag.name, category_id, tag.total, tx_total, monthly_total
        )));
    }
    for tx in &tag.transactions {
        if !seen_transactions.insert(tx.id) {
            return Err(inconsistent(format!(
                "transaction {} contributes to more than one tag",
                tx.id
            )));
        }
    }
    Ok(())
}

fn inconsistent(message: String) -> Error {
    Error::InconsistentSnapshot(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classification::{Category, OTHER_CATEGORY_ID};
    use chrono::NaiveDate;

    fn tx(id: i64, ymd: (i32, u32, u32), cents: i64, tags: &[&str]) -> Arc<Transaction> {
        let date = NaiveDate::from_ymd_opt(ymd.0, ymd.1, ymd.2).unwrap();
        Arc::new(Transaction::new(
            id,
            date,
            cents,
            format!("tx {}", id),
            tags.iter().map(|t| t.to_string()).collect(),
        ))
    }

    fn catalog() -> CategoryCatalog {
        CategoryCatalog::with_categories(vec![
            Category::new("groceries", "Groceries"),
            Category::new("leisure", "Leisure"),
        ])
        .unwrap()
    }

    fn classification() -> ClassificationMap {
        [
            ("courses", "groceries"),
            ("marche", "groceries"),
            ("resto", "leisure"),
            ("cinema", "leisure"),
        ]
        .into_iter()
        .collect()
    }

    fn sample() -> Vec<Arc<Transaction>> {
        vec![
            tx(1, (2024, 1, 5), -5000, &["resto"]),
            tx(2, (2024, 1, 9), -3000, &["courses"]),
            tx(3, (2024, 2, 3), -2000, &["courses"]),
            tx(4, (2024, 2, 14), -1500, &["cinema"]),
            tx(5, (2024, 2, 20), 250000, &["salary"]),
            tx(6, (2024, 2, 21), -700, &[]),
            tx(7, (2024, 2, 22), -900, &["unclassified"]),
            tx(8, (2024, 3, 1), -1200, &["gifts"]),
        ]
    }

    #[test]
    fn test_aggregate_builds_sorted_tree() {
        let tree = aggregate(&sample(), &classification(), &catalog(), None);

        let ids: Vec<&str> = tree.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["leisure", "groceries", "other"]);

        let leisure = &tree[0];
        assert_eq!(leisure.total, 6500);
        assert_eq!(leisure.count, 2);
        assert_eq!(leisure.tags[0].name, "resto");
        assert_eq!(leisure.tags[1].name, "cinema");

        let groceries = &tree[1];
        assert_eq!(groceries.total, 5000);
        assert_eq!(groceries.tags.len(), 1);
        assert_eq!(groceries.tags[0].count, 2);

        // Unmapped tag goes to the catch-all bucket
        assert_eq!(tree[2].id, OTHER_CATEGORY_ID);
        assert_eq!(tree[2].tags[0].name, "gifts");

        verify_tree(&tree).unwrap();
    }

    #[test]
    fn test_income_and_unclassified_excluded() {
        let tree = aggregate(&sample(), &classification(), &catalog(), None);
        let ids: HashSet<i64> = tree
            .iter()
            .flat_map(|c| c.tags.iter())
            .flat_map(|t| t.transactions.iter().map(|tx| tx.id))
            .collect();
        assert!(!ids.contains(&5));
        assert!(!ids.contains(&6));
        assert!(!ids.contains(&7));
        assert_eq!(ids.len(), 5);
    }

    #[test]
    fn test_aggregate_is_idempotent() {
        let txs = sample();
        let first = aggregate(&txs, &classification(), &catalog(), None);
        let second = aggregate(&txs, &classification(), &catalog(), None);
        assert_eq!(first, second);
    }

    #[test]
    fn test_ties_follow_catalog_order() {
        let txs = vec![
            tx(1, (2024, 1, 1), -1000, &["resto"]),
            tx(2, (2024, 1, 1), -1000, &["courses"]),
        ];
        let tree = aggregate(&txs, &classification(), &catalog(), None);
        assert_eq!(tree[0].id, "groceries");
        assert_eq!(tree[1].id, "leisure");
    }

    #[test]
    fn test_undeclared_category_materializes() {
        let mut map = classification();
        map.set("train", "travel").unwrap();
        let txs = vec![tx(1, (2024, 1, 1), -4200, &["train"])];

        let tree = aggregate(&txs, &map, &catalog(), None);
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].id, "travel");
        assert_eq!(tree[0].name, "travel");
    }

    #[test]
    fn test_monthly_average_and_variation() {
        let txs = vec![
            tx(1, (2024, 1, 5), -1000, &["resto"]),
            tx(2, (2024, 3, 5), -3000, &["resto"]),
        ];
        let tree = aggregate(&txs, &classification(), &catalog(), None);
        let leisure = &tree[0];

        // February has no activity and is not averaged in as zero
        assert_eq!(leisure.monthly_data.len(), 2);
        assert_eq!(leisure.avg_monthly, 2000.0);
        assert_eq!(leisure.variation, 50.0);
    }

    #[test]
    fn test_single_month_has_zero_variation() {
        let txs = vec![
            tx(1, (2024, 1, 5), -1000, &["resto"]),
            tx(2, (2024, 1, 7), -3000, &["cinema"]),
        ];
        let tree = aggregate(&txs, &classification(), &catalog(), None);
        assert_eq!(tree[0].avg_monthly, 4000.0);
        assert_eq!(tree[0].variation, 0.0);
    }

    #[test]
    fn test_zero_average_never_divides() {
        assert_eq!(monthly_stats(&[]), (0.0, 0.0));
        let zero = vec![
            MonthlyAmount {
                month: "2024-01".into(),
                amount: 0,
                count: 1,
            },
            MonthlyAmount {
                month: "2024-02".into(),
                amount: 0,
                count: 1,
            },
        ];
        let (avg, variation) = monthly_stats(&zero);
        assert_eq!(avg, 0.0);
        assert_eq!(variation, 0.0);
        assert!(variation.is_finite());
    }

    #[test]
    fn test_period_filter() {
        let range = MonthRange::new(Some("2024-02"), Some("2024-02")).unwrap();
        let tree = aggregate(&sample(), &classification(), &catalog(), Some(&range));
        let total: i64 = tree.iter().map(|c| c.total).sum();
        assert_eq!(total, 3500);
    }

    #[test]
    fn test_aggregate_categories_restricts() {
        let only: BTreeSet<String> = ["groceries".to_string()].into_iter().collect();
        let tree =
            aggregate_categories(&sample(), &classification(), &catalog(), None, &only);
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].id, "groceries");
        assert_eq!(tree[0].total, 5000);
    }

    #[test]
    fn test_transactions_newest_first() {
        let tree = aggregate(&sample(), &classification(), &catalog(), None);
        let courses = tree[1].tag("courses").unwrap();
        let ids: Vec<i64> = courses.transactions.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![3, 2]);
    }

    #[test]
    fn test_verify_tree_detects_broken_sum() {
        let mut tree = aggregate(&sample(), &classification(), &catalog(), None);
        tree[0].total += 1;
        assert!(matches!(
            verify_tree(&tree),
            Err(Error::InconsistentSnapshot(_))
        ));
    }

    #[test]
    fn test_verify_tree_detects_double_counting() {
        let mut tree = aggregate(&sample(), &classification(), &catalog(), None);
        let stolen = tree[0].tags[0].clone();
        let groceries = &mut tree[1];
        groceries.total += stolen.total;
        groceries.count += stolen.count;
        for (month, amount) in &stolen.monthly {
            match groceries.monthly_data.iter_mut().find(|m| &m.month == month) {
                Some(m) => m.amount += amount,
                None => groceries.monthly_data.push(MonthlyAmount {
                    month: month.clone(),
                    amount: *amount,
                    count: 1,
                }),
            }
        }
        groceries.tags.push(stolen);
        assert!(verify_tree(&tree).is_err());
    }
}
