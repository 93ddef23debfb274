//! Reclassify and mapping command implementations

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Context, Result};
use spendtree_core::{format_cents, Analysis, MonthRange, Session};

use super::{open_session, writable_config_path};

pub async fn cmd_reclassify(session: &Session, id: i64, tag: &str) -> Result<()> {
    let before = session.analysis()?;
    let previous = before
        .snapshot
        .get(id)
        .and_then(|tx| tx.primary_tag().map(String::from))
        .unwrap_or_else(|| "(unclassified)".to_string());

    let outcome = session
        .reclassify(id, tag)
        .await
        .with_context(|| format!("Failed to reclassify transaction {}", id))?;

    println!("✅ Transaction {}: {} → {}", id, previous, tag.trim());
    print_affected(session, &before, &outcome.affected_categories)?;
    Ok(())
}

pub async fn cmd_map(
    file: &Path,
    config_path: Option<&Path>,
    period: MonthRange,
    tag: &str,
    category: &str,
) -> Result<()> {
    let target = writable_config_path(config_path)?;
    let session = open_session(file, Some(target.as_path()), period).await?;
    let before = session.analysis()?;

    session
        .set_mapping(tag, category)
        .await
        .with_context(|| format!("Failed to save mapping to {}", target.display()))?;

    println!("✅ Mapped '{}' → '{}' in {}", tag.trim(), category.trim(), target.display());

    let mut affected = BTreeSet::new();
    affected.insert(category.trim().to_string());
    let other = before.catalog.other_id().to_string();
    let old = before
        .classification
        .get(tag.trim())
        .map(String::from)
        .unwrap_or(other);
    affected.insert(old);
    print_affected(&session, &before, &affected)?;
    Ok(())
}

fn print_affected(
    session: &Session,
    before: &Analysis,
    affected: &BTreeSet<String>,
) -> Result<()> {
    let after = session.analysis()?;
    for id in affected {
        let old = before.category(id).map(|c| c.total).unwrap_or(0);
        let new = after.category(id).map(|c| c.total).unwrap_or(0);
        if old == new {
            continue;
        }
        let name = after
            .category(id)
            .or_else(|| before.category(id))
            .map(|c| c.name.as_str())
            .unwrap_or(id.as_str());
        println!(
            "   {:20} {:>10} → {:>10}",
            name,
            format_cents(old),
            format_cents(new)
        );
    }
    Ok(())
}
