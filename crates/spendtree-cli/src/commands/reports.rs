//! Report command implementations

use anyhow::{Context, Result};
use spendtree_core::{
    format_cents, Analysis, CategoryAggregate, MonthAggregate, MonthBar, Selection, Session,
    TagAggregate, ViewState,
};

use super::{load_config, truncate};

pub fn cmd_summary(session: &Session, json: bool) -> Result<()> {
    let analysis = session.analysis()?;

    if json {
        let out = serde_json::to_string_pretty(&analysis.categories)
            .context("Failed to serialize summary")?;
        println!("{}", out);
        return Ok(());
    }

    print_categories(&analysis);
    Ok(())
}

pub fn cmd_months(session: &Session) -> Result<()> {
    let analysis = session.analysis()?;
    print_month_bars(&analysis.month_bars());
    Ok(())
}

pub fn cmd_month(session: &Session, month: &str) -> Result<()> {
    match session.select_month(month)? {
        Selection::Entered => {
            if let ViewState::MonthTags { month } = session.view()? {
                print_month(&month);
            }
        }
        Selection::Empty => {
            println!();
            println!("   No named-category spending in {}.", month);
        }
    }
    Ok(())
}

pub fn cmd_tag(session: &Session, category: &str, tag: &str, month: Option<&str>) -> Result<()> {
    if session.select_category(category)? == Selection::Empty {
        println!("   No spending in '{}'.", category);
        return Ok(());
    }

    let selection = match month {
        Some(month) => session.select_tag_month(tag, month)?,
        None => session.select_tag(tag)?,
    };
    if selection == Selection::Empty {
        println!("   No spending under '{}' for that period.", tag);
        return Ok(());
    }

    print_view(&session.view()?);
    Ok(())
}

pub fn cmd_categories(config_path: Option<&std::path::Path>) -> Result<()> {
    let config = load_config(config_path)?;

    println!();
    println!("🗂  Categories");
    match &config.path {
        Some(path) => println!("   Config: {}", path.display()),
        None => println!("   Config: built-in defaults"),
    }
    println!("   ─────────────────────────────────────────");

    let catalog = &config.catalog;
    for category in catalog.categories().iter().chain(Some(catalog.other())) {
        let tags: Vec<&str> = config
            .mapping
            .iter()
            .filter(|(_, c)| *c == category.id)
            .map(|(t, _)| t)
            .collect();
        println!(
            "   {} {:20} {}",
            category.icon.as_deref().unwrap_or("•"),
            format!("{} ({})", category.name, category.id),
            tags.join(", ")
        );
    }

    let unknown: Vec<String> = config
        .mapping
        .iter()
        .filter(|(_, c)| catalog.get(c).is_none())
        .map(|(t, c)| format!("{} → {}", t, c))
        .collect();
    if !unknown.is_empty() {
        println!();
        println!("   Mapped to undeclared categories: {}", unknown.join(", "));
    }
    println!();
    println!("   Unmapped tags fall into '{}'.", catalog.other().name);

    Ok(())
}

/// Print whatever view the navigator is on
pub fn print_view(view: &ViewState) {
    match view {
        ViewState::Categories => {}
        ViewState::Tags { category } => print_tags(category),
        ViewState::MonthTags { month } => print_month(month),
        ViewState::Transactions { category, tag } => {
            print_transactions(&format!("{} › {}", category.name, tag.name), tag)
        }
        ViewState::MonthTransactions { month, tag } => {
            print_transactions(&format!("{} › {}", month.month, tag.name), tag)
        }
        ViewState::CategoryMonthTransactions {
            category,
            month,
            tag,
        } => print_transactions(&format!("{} › {} · {}", category.name, tag.name, month), tag),
    }
}

pub fn print_categories(analysis: &Analysis) {
    println!();
    println!("📊 Spending by Category");
    println!("   ─────────────────────────────────────────────────────────────");

    if analysis.categories.is_empty() {
        println!("   No spending found in this period.");
        return;
    }

    println!("   Total: {}", format_cents(analysis.total()));
    println!();
    println!(
        "   {:22} │ {:>10} │ {:>5} │ {:>10} │ {:>7}",
        "Category", "Amount", "Count", "Avg/month", "Trend"
    );
    println!("   ───────────────────────┼────────────┼───────┼────────────┼────────");
    for category in &analysis.categories {
        println!(
            "   {:22} │ {:>10} │ {:>5} │ {:>10} │ {:>+6.1}%",
            truncate(&format!("{} ({})", category.name, category.id), 22),
            format_cents(category.total),
            category.count,
            format_cents(category.avg_monthly.round() as i64),
            category.variation
        );
        for tag in &category.tags {
            println!(
                "   {:22} │ {:>10} │ {:>5} │            │",
                truncate(&format!("  {}", tag.name), 22),
                format_cents(tag.total),
                tag.count
            );
        }
    }
}

pub fn print_month_bars(bars: &[MonthBar]) {
    println!();
    println!("📅 Spending by Month (named categories)");
    println!("   ─────────────────────────────────────────");

    let Some(max) = bars.iter().map(|b| b.total).max().filter(|m| *m > 0) else {
        println!("   No spending found in this period.");
        return;
    };
    for bar in bars {
        let width = (bar.total * 30 / max) as usize;
        println!(
            "   {} {:>10} {}",
            bar.month,
            format_cents(bar.total),
            "█".repeat(width.max(1))
        );
    }
}

pub fn print_tags(category: &CategoryAggregate) {
    println!();
    println!(
        "{} {} · {} ({} transactions)",
        category.icon.as_deref().unwrap_or("📂"),
        category.name,
        format_cents(category.total),
        category.count
    );
    println!("   ─────────────────────────────────────────");
    for tag in &category.tags {
        let months: Vec<String> = tag
            .monthly
            .iter()
            .map(|(m, amount)| format!("{} {}", m, format_cents(*amount)))
            .collect();
        println!(
            "   {:20} {:>10} {:>4}   {}",
            truncate(&tag.name, 20),
            format_cents(tag.total),
            tag.count,
            months.join(" · ")
        );
    }
}

pub fn print_month(month: &MonthAggregate) {
    println!();
    println!(
        "📅 {} · {} ({} transactions)",
        month.month,
        format_cents(month.total),
        month.count
    );
    println!("   ─────────────────────────────────────────");
    for tag in &month.tags {
        println!(
            "   {:20} {:>10} {:>4}",
            truncate(&tag.name, 20),
            format_cents(tag.total),
            tag.count
        );
    }
}

pub fn print_transactions(title: &str, tag: &TagAggregate) {
    println!();
    println!("🧾 {} · {}", title, format_cents(tag.total));
    println!("   ─────────────────────────────────────────────────────────────");
    println!("   {:>6}  {:10}  {:>10}  Label", "ID", "Date", "Amount");
    for tx in &tag.transactions {
        println!(
            "   {:>6}  {}  {:>10}  {}",
            tx.id,
            tx.date,
            format_cents(tx.amount_cents),
            truncate(&tx.label, 40)
        );
    }
}
