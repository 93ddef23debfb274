//! Calendar drill path: month → tag rollups
//!
//! Uses the same grouping as the category tree but only surfaces tags that map
//! to a named category. Spending in the "other" bucket (or in categories the
//! catalog does not declare) stays reachable through the category path only.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::aggregate::{group_by_tag, sort_tags};
use crate::classification::{CategoryCatalog, ClassificationMap};
use crate::models::{MonthAggregate, MonthBar, MonthRange, Transaction};

/// Named-category spending for one month
pub fn aggregate_month(
    transactions: &[Arc<Transaction>],
    month: &str,
    classification: &ClassificationMap,
    catalog: &CategoryCatalog,
) -> MonthAggregate {
    let mut tags = group_by_tag(transactions, |tx| {
        if tx.month != month {
            return None;
        }
        named_category(tx, classification, catalog)
    });
    sort_tags(&mut tags);

    MonthAggregate {
        month: month.to_string(),
        total: tags.iter().map(|t| t.total).sum(),
        count: tags.iter().map(|t| t.count).sum(),
        tags,
    }
}

/// One bar per month with named-category spending, oldest first
///
/// Each bar's total equals the total of the matching [`aggregate_month`].
pub fn month_bars(
    transactions: &[Arc<Transaction>],
    classification: &ClassificationMap,
    catalog: &CategoryCatalog,
    period: Option<&MonthRange>,
) -> Vec<MonthBar> {
    let mut months: BTreeMap<&str, (i64, usize)> = BTreeMap::new();
    for tx in transactions {
        if period.is_some_and(|range| !range.contains(&tx.month)) {
            continue;
        }
        if named_category(tx, classification, catalog).is_none() {
            continue;
        }
        let entry = months.entry(tx.month.as_str()).or_insert((0, 0));
        entry.0 += tx.amount_cents.abs();
        entry.1 += 1;
    }

    months
        .into_iter()
        .map(|(month, (total, count))| MonthBar {
            month: month.to_string(),
            total,
            count,
        })
        .collect()
}

fn named_category<'a>(
    tx: &'a Transaction,
    classification: &'a ClassificationMap,
    catalog: &'a CategoryCatalog,
) -> Option<&'a str> {
    let category = classification.category_for(tx.contributing_tag()?, catalog.other_id());
    catalog.is_named(category).then_some(category)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::aggregate;
    use crate::classification::Category;
    use chrono::NaiveDate;

    fn tx(id: i64, day: (i32, u32, u32), cents: i64, tag: &str) -> Arc<Transaction> {
        let date = NaiveDate::from_ymd_opt(day.0, day.1, day.2).unwrap();
        Arc::new(Transaction::new(id, date, cents, "x", vec![tag.to_string()]))
    }

    fn catalog() -> CategoryCatalog {
        CategoryCatalog::with_categories(vec![
            Category::new("groceries", "Groceries"),
            Category::new("leisure", "Leisure"),
        ])
        .unwrap()
    }

    fn classification() -> ClassificationMap {
        [("courses", "groceries"), ("resto", "leisure"), ("train", "travel")]
            .into_iter()
            .collect()
    }

    fn sample() -> Vec<Arc<Transaction>> {
        vec![
            tx(1, (2024, 3, 2), -5000, "resto"),
            tx(2, (2024, 3, 4), -2500, "courses"),
            tx(3, (2024, 3, 6), -1000, "courses"),
            tx(4, (2024, 3, 8), -800, "gifts"),
            tx(5, (2024, 3, 9), -3000, "train"),
            tx(6, (2024, 4, 1), -400, "courses"),
            tx(7, (2024, 3, 10), 9000, "resto"),
        ]
    }

    #[test]
    fn test_month_aggregate_groups_named_tags() {
        let month = aggregate_month(&sample(), "2024-03", &classification(), &catalog());
        assert_eq!(month.total, 8500);
        assert_eq!(month.count, 3);

        let names: Vec<&str> = month.tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["resto", "courses"]);
        assert_eq!(month.tag("courses").unwrap().total, 3500);
    }

    #[test]
    fn test_other_bucket_absent_from_month_view() {
        let txs = sample();
        let month = aggregate_month(&txs, "2024-03", &classification(), &catalog());
        assert!(month.tag("gifts").is_none());
        assert!(month.tag("train").is_none());

        // ...but still visible through the category path
        let tree = aggregate(&txs, &classification(), &catalog(), None);
        let other = tree.iter().find(|c| c.id == "other").unwrap();
        assert!(other.tag("gifts").is_some());
        assert!(tree.iter().any(|c| c.id == "travel"));
    }

    #[test]
    fn test_month_without_named_spend_is_empty() {
        let txs = vec![tx(1, (2024, 5, 1), -800, "gifts")];
        let month = aggregate_month(&txs, "2024-05", &classification(), &catalog());
        assert!(month.is_empty());
        assert_eq!(month.total, 0);
    }

    #[test]
    fn test_month_bars_match_month_aggregates() {
        let txs = sample();
        let bars = month_bars(&txs, &classification(), &catalog(), None);
        assert_eq!(bars.len(), 2);
        for bar in &bars {
            let month = aggregate_month(&txs, &bar.month, &classification(), &catalog());
            assert_eq!(bar.total, month.total);
            assert_eq!(bar.count, month.count);
        }
    }

    #[test]
    fn test_month_bars_respect_period() {
        let range = MonthRange::new(Some("2024-04"), None).unwrap();
        let bars = month_bars(&sample(), &classification(), &catalog(), Some(&range));
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].month, "2024-04");
        assert_eq!(bars[0].total, 400);
    }
}
