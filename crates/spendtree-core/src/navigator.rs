//! Drill-down navigation state machine
//!
//! The navigator holds exactly one [`ViewState`] together with the aggregate
//! objects needed to render it. Those objects are always re-derived from the
//! current [`Analysis`]: `back()` rebuilds the parent instead of restoring a
//! stored copy, and `resync()` refreshes the current state after the tree
//! changes, popping levels whose tag, category or month disappeared.
//!
//! ```text
//! Categories ──category──▶ Tags ──tag──▶ Transactions
//!     │                      └──tag+month──▶ CategoryMonthTransactions
//!     └──month──▶ MonthTags ──tag──▶ MonthTransactions
//! ```

use std::sync::Arc;

use serde::Serialize;

use crate::analysis::Analysis;
use crate::error::{Error, Result};
use crate::models::{parse_month, CategoryAggregate, MonthAggregate, TagAggregate, Transaction};

/// What the user is currently looking at
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum ViewState {
    #[default]
    Categories,
    Tags {
        category: CategoryAggregate,
    },
    Transactions {
        category: CategoryAggregate,
        tag: TagAggregate,
    },
    MonthTags {
        month: MonthAggregate,
    },
    MonthTransactions {
        month: MonthAggregate,
        tag: TagAggregate,
    },
    /// `tag` holds only the transactions of `month`
    CategoryMonthTransactions {
        category: CategoryAggregate,
        month: String,
        tag: TagAggregate,
    },
}

impl ViewState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Categories => "categories",
            Self::Tags { .. } => "tags",
            Self::Transactions { .. } => "transactions",
            Self::MonthTags { .. } => "month tags",
            Self::MonthTransactions { .. } => "month transactions",
            Self::CategoryMonthTransactions { .. } => "category month transactions",
        }
    }

    pub fn is_root(&self) -> bool {
        matches!(self, Self::Categories)
    }

    /// Transactions listed by a leaf view
    pub fn transactions(&self) -> Option<&[Arc<Transaction>]> {
        match self {
            Self::Transactions { tag, .. }
            | Self::MonthTransactions { tag, .. }
            | Self::CategoryMonthTransactions { tag, .. } => Some(&tag.transactions),
            _ => None,
        }
    }

    /// Immediate parent, still carrying this state's (possibly stale) objects
    fn parent_shell(&self) -> Option<ViewState> {
        match self {
            Self::Categories => None,
            Self::Tags { .. } | Self::MonthTags { .. } => Some(Self::Categories),
            Self::Transactions { category, .. }
            | Self::CategoryMonthTransactions { category, .. } => Some(Self::Tags {
                category: category.clone(),
            }),
            Self::MonthTransactions { month, .. } => Some(Self::MonthTags {
                month: month.clone(),
            }),
        }
    }

    /// Re-derive this state from an analysis, or None if it no longer has
    /// anything to show
    fn rebuild(&self, analysis: &Analysis) -> Option<ViewState> {
        match self {
            Self::Categories => Some(Self::Categories),
            Self::Tags { category } => {
                let category = analysis.category(&category.id)?;
                Some(Self::Tags {
                    category: category.clone(),
                })
            }
            Self::Transactions { category, tag } => {
                let category = analysis.category(&category.id)?;
                let tag = category.tag(&tag.name)?;
                Some(Self::Transactions {
                    category: category.clone(),
                    tag: tag.clone(),
                })
            }
            Self::MonthTags { month } => {
                let month = analysis.month(&month.month);
                (!month.is_empty()).then_some(Self::MonthTags { month })
            }
            Self::MonthTransactions { month, tag } => {
                let month = analysis.month(&month.month);
                let tag = month.tag(&tag.name)?.clone();
                Some(Self::MonthTransactions { month, tag })
            }
            Self::CategoryMonthTransactions {
                category,
                month,
                tag,
            } => {
                let category = analysis.category(&category.id)?;
                let tag = category.tag(&tag.name)?.restricted_to_month(month);
                (tag.count > 0).then(|| Self::CategoryMonthTransactions {
                    category: category.clone(),
                    month: month.clone(),
                    tag,
                })
            }
        }
    }
}

/// Result of a selection that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// The navigator moved to the selected node
    Entered,
    /// The node has nothing to drill into; the state is unchanged
    Empty,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Navigator {
    state: ViewState,
}

impl Navigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    /// `Categories → Tags(category)`
    pub fn select_category(&mut self, analysis: &Analysis, id: &str) -> Result<Selection> {
        self.ensure_current(analysis)?;
        if !self.state.is_root() {
            return Err(self.invalid_transition("select a category"));
        }

        let category = analysis
            .category(id)
            .ok_or_else(|| stale(format!("category '{}' is not in the current view", id)))?;
        if category.tags.is_empty() {
            return Ok(Selection::Empty);
        }

        self.state = ViewState::Tags {
            category: category.clone(),
        };
        Ok(Selection::Entered)
    }

    /// `Tags(category) → Transactions(category, tag)` or
    /// `MonthTags(month) → MonthTransactions(month, tag)`
    pub fn select_tag(&mut self, analysis: &Analysis, name: &str) -> Result<Selection> {
        self.ensure_current(analysis)?;

        let next = match &self.state {
            ViewState::Tags { category } => {
                let tag = category.tag(name).ok_or_else(|| {
                    stale(format!("tag '{}' is not in category '{}'", name, category.id))
                })?;
                if tag.count == 0 {
                    return Ok(Selection::Empty);
                }
                ViewState::Transactions {
                    category: category.clone(),
                    tag: tag.clone(),
                }
            }
            ViewState::MonthTags { month } => {
                let tag = month.tag(name).ok_or_else(|| {
                    stale(format!("tag '{}' has no spending in {}", name, month.month))
                })?;
                if tag.count == 0 {
                    return Ok(Selection::Empty);
                }
                ViewState::MonthTransactions {
                    month: month.clone(),
                    tag: tag.clone(),
                }
            }
            _ => return Err(self.invalid_transition("select a tag")),
        };

        self.state = next;
        Ok(Selection::Entered)
    }

    /// `Categories → MonthTags(month)`
    pub fn select_month(&mut self, analysis: &Analysis, month: &str) -> Result<Selection> {
        let month = parse_month(month)?;
        self.ensure_current(analysis)?;
        if !self.state.is_root() {
            return Err(self.invalid_transition("select a month"));
        }

        let month = analysis.month(&month);
        if month.is_empty() {
            return Ok(Selection::Empty);
        }
        self.state = ViewState::MonthTags { month };
        Ok(Selection::Entered)
    }

    /// `Tags(category) → CategoryMonthTransactions(category, month, tag)`
    pub fn select_tag_month(
        &mut self,
        analysis: &Analysis,
        tag: &str,
        month: &str,
    ) -> Result<Selection> {
        let month = parse_month(month)?;
        self.ensure_current(analysis)?;

        let ViewState::Tags { category } = &self.state else {
            return Err(self.invalid_transition("select a tag month"));
        };
        let full = category.tag(tag).ok_or_else(|| {
            stale(format!("tag '{}' is not in category '{}'", tag, category.id))
        })?;

        let restricted = full.restricted_to_month(&month);
        if restricted.count == 0 {
            return Ok(Selection::Empty);
        }

        self.state = ViewState::CategoryMonthTransactions {
            category: category.clone(),
            month,
            tag: restricted,
        };
        Ok(Selection::Entered)
    }

    /// Return to the parent view, rebuilt from the current analysis
    ///
    /// Returns false at the root. If the parent has nothing left to show, keeps
    /// climbing to the nearest ancestor that does.
    pub fn back(&mut self, analysis: &Analysis) -> bool {
        let Some(parent) = self.state.parent_shell() else {
            return false;
        };
        self.state = parent;
        self.resync(analysis);
        true
    }

    /// Re-derive the current state from an analysis
    ///
    /// Returns how many levels were popped because the state referred to a
    /// tag, category or month that is gone or empty.
    pub fn resync(&mut self, analysis: &Analysis) -> usize {
        let mut popped = 0;
        loop {
            if let Some(fresh) = self.state.rebuild(analysis) {
                self.state = fresh;
                return popped;
            }
            match self.state.parent_shell() {
                Some(parent) => {
                    self.state = parent;
                    popped += 1;
                }
                None => {
                    self.state = ViewState::Categories;
                    return popped;
                }
            }
        }
    }

    /// Return to a view left earlier, re-derived from the analysis; pops like
    /// `resync` if it no longer has anything to show
    pub(crate) fn reopen(&mut self, analysis: &Analysis, view: ViewState) -> usize {
        self.state = view;
        self.resync(analysis)
    }

    /// Labels from the root to the current view
    pub fn breadcrumbs(&self) -> Vec<String> {
        let mut crumbs = vec!["Categories".to_string()];
        match &self.state {
            ViewState::Categories => {}
            ViewState::Tags { category } => crumbs.push(category.name.clone()),
            ViewState::Transactions { category, tag } => {
                crumbs.push(category.name.clone());
                crumbs.push(tag.name.clone());
            }
            ViewState::MonthTags { month } => crumbs.push(month.month.clone()),
            ViewState::MonthTransactions { month, tag } => {
                crumbs.push(month.month.clone());
                crumbs.push(tag.name.clone());
            }
            ViewState::CategoryMonthTransactions {
                category,
                month,
                tag,
            } => {
                crumbs.push(category.name.clone());
                crumbs.push(format!("{} · {}", tag.name, month));
            }
        }
        crumbs
    }

    /// Bring the state up to date before acting on a selection; a selection
    /// made against a view that has since lost its subject is stale
    fn ensure_current(&mut self, analysis: &Analysis) -> Result<()> {
        let popped = self.resync(analysis);
        if popped > 0 {
            tracing::warn!(popped, view = self.state.name(), "Selection made on a stale view");
            return Err(stale(format!(
                "view changed underneath the selection, returned to {}",
                self.state.name()
            )));
        }
        Ok(())
    }

    fn invalid_transition(&self, action: &'static str) -> Error {
        Error::InvalidTransition {
            state: self.state.name(),
            action,
        }
    }
}

fn stale(message: String) -> Error {
    Error::InvalidSelection(message)
}
