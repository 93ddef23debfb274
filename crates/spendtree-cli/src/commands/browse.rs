//! Interactive drill-down browser
//!
//! Reads one command per line:
//!   c <category>      open a category
//!   t <tag>           open a tag
//!   m <YYYY-MM>       open a month (from the root)
//!   tm <tag> <month>  a tag's transactions for one month
//!   b                 back
//!   mv <id> <tag>     move a transaction to another tag
//!   r                 reload from the file
//!   q                 quit

use std::io::{self, Write};

use anyhow::{bail, Result};
use spendtree_core::{Error, RefreshOutcome, Selection, Session, ViewState};

use super::{print_categories, print_month_bars, print_view};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowseCommand {
    Category(String),
    Tag(String),
    Month(String),
    TagMonth(String, String),
    Back,
    Move(i64, String),
    Refresh,
    Quit,
}

pub fn parse_browse_command(line: &str) -> Result<BrowseCommand> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    let command = match parts.as_slice() {
        ["c", id] => BrowseCommand::Category(id.to_string()),
        ["t", tag] => BrowseCommand::Tag(tag.to_string()),
        ["m", month] => BrowseCommand::Month(month.to_string()),
        ["tm", tag, month] => BrowseCommand::TagMonth(tag.to_string(), month.to_string()),
        ["b"] => BrowseCommand::Back,
        ["mv", id, tag] => {
            let Ok(id) = id.parse() else {
                bail!("Invalid transaction id '{}'", id);
            };
            BrowseCommand::Move(id, tag.to_string())
        }
        ["r"] => BrowseCommand::Refresh,
        ["q"] | ["quit"] | ["exit"] => BrowseCommand::Quit,
        _ => bail!("Unknown command. Try: c <category>, t <tag>, m <month>, tm <tag> <month>, b, mv <id> <tag>, r, q"),
    };
    Ok(command)
}

/// Run one command against the session; returns false to quit
pub async fn run_browse_command(session: &Session, command: BrowseCommand) -> Result<bool> {
    let selection = match command {
        BrowseCommand::Quit => return Ok(false),
        BrowseCommand::Category(id) => session.select_category(&id),
        BrowseCommand::Tag(tag) => session.select_tag(&tag),
        BrowseCommand::Month(month) => session.select_month(&month),
        BrowseCommand::TagMonth(tag, month) => session.select_tag_month(&tag, &month),
        BrowseCommand::Back => {
            if !session.back()? {
                println!("   Already at the top.");
            }
            Ok(Selection::Entered)
        }
        BrowseCommand::Move(id, tag) => {
            let outcome = session.reclassify(id, &tag).await?;
            println!("✅ Moved transaction {} to '{}'", id, tag);
            if outcome.levels_popped > 0 {
                println!("   View emptied, went up {} level(s).", outcome.levels_popped);
            }
            Ok(Selection::Entered)
        }
        BrowseCommand::Refresh => {
            if session.refresh().await? == RefreshOutcome::Suppressed {
                println!("   Recent edit still settling, refresh skipped.");
            }
            Ok(Selection::Entered)
        }
    };

    match selection {
        Ok(Selection::Entered) => {}
        Ok(Selection::Empty) => println!("   Nothing to show there."),
        // A stale or misplaced selection is not fatal; the view is already
        // back on something valid
        Err(e @ (Error::InvalidSelection(_) | Error::InvalidTransition { .. })) => {
            println!("   {}", e)
        }
        Err(e) => return Err(e.into()),
    }
    Ok(true)
}

fn render(session: &Session) -> Result<()> {
    let view = session.view()?;
    if let ViewState::Categories = view {
        let analysis = session.analysis()?;
        print_categories(&analysis);
        print_month_bars(&analysis.month_bars());
    } else {
        print_view(&view);
    }
    println!();
    println!("   {}", session.breadcrumbs()?.join(" › "));
    Ok(())
}

pub async fn cmd_browse(session: &Session) -> Result<()> {
    render(session)?;

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            break;
        }
        if input.trim().is_empty() {
            continue;
        }

        let command = match parse_browse_command(&input) {
            Ok(command) => command,
            Err(e) => {
                println!("   {}", e);
                continue;
            }
        };
        match run_browse_command(session, command).await {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => println!("❌ {:#}", e),
        }
        render(session)?;
    }

    Ok(())
}
