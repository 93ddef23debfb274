//! A live browsing session over a transaction source
//!
//! The session owns the current [`Analysis`] and the [`Navigator`], and
//! reconciles local edits with the slow external sources:
//!
//! - `reclassify` applies the edit to the in-memory tree immediately, then
//!   sends the durable write on a spawned task. A failed write is rolled back.
//! - Full refreshes that arrive shortly after a local edit (within the guard
//!   window) or while a write is still in flight are discarded, since they may
//!   predate the edit.
//!
//! State sits behind a `std::sync::RwLock` that is never held across an
//! `.await`; readers get `Arc<Analysis>` clones.

use std::collections::{BTreeSet, HashSet};
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::analysis::Analysis;
use crate::classification::{CategoryCatalog, ClassificationMap};
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::models::{MonthRange, Snapshot, Transaction, TxId};
use crate::navigator::{Navigator, Selection, ViewState};
use crate::reconcile;
use crate::sources::{ClassificationSource, TransactionSource};

/// Result of a successful reclassification
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReclassifyOutcome {
    pub tx_id: TxId,
    pub affected_categories: BTreeSet<String>,
    /// Drill-down levels popped because the shown tag or category emptied
    pub levels_popped: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshOutcome {
    Applied { levels_popped: usize },
    /// Discarded because a local edit is recent or still being written
    Suppressed,
}

#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

struct Inner {
    transactions: Arc<dyn TransactionSource>,
    classification: Arc<dyn ClassificationSource>,
    catalog: Arc<CategoryCatalog>,
    period: MonthRange,
    guard_window: Duration,
    state: RwLock<State>,
    in_flight: Mutex<HashSet<TxId>>,
}

struct State {
    analysis: Arc<Analysis>,
    navigator: Navigator,
    last_mutation_at: Option<Instant>,
}

/// The optimistic half of a reclassification, kept until the write settles
struct LocalEdit {
    outcome: ReclassifyOutcome,
    previous_tags: Vec<String>,
    /// Set when the edit emptied the shown view and the navigator climbed
    reopen: Option<Reopen>,
}

/// View to return to if the edit is rolled back, as long as the user has not
/// navigated away from where the edit left them
struct Reopen {
    view: ViewState,
    landed_on: Vec<String>,
}

/// Marks a transaction as having a durable write in flight until dropped
struct InFlight {
    inner: Arc<Inner>,
    tx_id: TxId,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if let Ok(mut in_flight) = self.inner.in_flight.lock() {
            in_flight.remove(&self.tx_id);
        }
    }
}

impl Session {
    /// Load transactions and the classification map, then aggregate
    pub async fn open(
        transactions: Arc<dyn TransactionSource>,
        classification: Arc<dyn ClassificationSource>,
        config: &EngineConfig,
        period: MonthRange,
    ) -> Result<Self> {
        let listed = transactions.list_transactions(&period).await?;
        let mapping = classification.get_mapping().await?;
        let catalog = Arc::new(config.catalog.clone());

        let analysis = Analysis::build(
            Arc::new(Snapshot::new(listed)?),
            Arc::new(mapping),
            Arc::clone(&catalog),
            period.clone(),
        )?;
        debug!(
            transactions = analysis.snapshot.len(),
            categories = analysis.categories.len(),
            "Opened session"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                transactions,
                classification,
                catalog,
                period,
                guard_window: config.guard_window,
                state: RwLock::new(State {
                    analysis: Arc::new(analysis),
                    navigator: Navigator::new(),
                    last_mutation_at: None,
                }),
                in_flight: Mutex::new(HashSet::new()),
            }),
        })
    }

    pub fn analysis(&self) -> Result<Arc<Analysis>> {
        Ok(Arc::clone(&self.inner.read_state()?.analysis))
    }

    pub fn view(&self) -> Result<ViewState> {
        Ok(self.inner.read_state()?.navigator.state().clone())
    }

    pub fn breadcrumbs(&self) -> Result<Vec<String>> {
        Ok(self.inner.read_state()?.navigator.breadcrumbs())
    }

    pub fn guard_window(&self) -> Duration {
        self.inner.guard_window
    }

    /// Number of durable writes not yet acknowledged
    pub fn writes_in_flight(&self) -> usize {
        self.inner.in_flight.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn select_category(&self, id: &str) -> Result<Selection> {
        self.inner
            .navigate(|nav, analysis| nav.select_category(analysis, id))
    }

    pub fn select_tag(&self, name: &str) -> Result<Selection> {
        self.inner
            .navigate(|nav, analysis| nav.select_tag(analysis, name))
    }

    pub fn select_month(&self, month: &str) -> Result<Selection> {
        self.inner
            .navigate(|nav, analysis| nav.select_month(analysis, month))
    }

    pub fn select_tag_month(&self, tag: &str, month: &str) -> Result<Selection> {
        self.inner
            .navigate(|nav, analysis| nav.select_tag_month(analysis, tag, month))
    }

    /// Go up one level; false when already at the root
    pub fn back(&self) -> Result<bool> {
        self.inner.navigate(|nav, analysis| Ok(nav.back(analysis)))
    }

    /// Move a transaction to `new_tag`
    ///
    /// The tree and the current view reflect the edit as soon as this is
    /// called. The durable write runs on its own task: dropping the returned
    /// future does not cancel it, and its result (or rollback) still applies.
    pub async fn reclassify(&self, tx_id: TxId, new_tag: &str) -> Result<ReclassifyOutcome> {
        let guard = self.inner.begin_write(tx_id)?;
        let edit = self.inner.apply_local(tx_id, new_tag)?;

        let inner = Arc::clone(&self.inner);
        let new_tag = new_tag.trim().to_string();
        let task = tokio::spawn(async move {
            let _guard = guard;
            let written = inner.transactions.reclassify(tx_id, &new_tag).await;
            inner.finish_write(edit, written)
        });

        task.await
            .map_err(|e| Error::Internal(format!("Reclassify task failed: {}", e)))?
    }

    /// Fetch transactions and the classification map from the sources and
    /// apply them
    pub async fn refresh(&self) -> Result<RefreshOutcome> {
        if self.inner.is_guarded()? {
            info!("Skipping refresh, local edit is recent or in flight");
            return Ok(RefreshOutcome::Suppressed);
        }
        let transactions = self
            .inner
            .transactions
            .list_transactions(&self.inner.period)
            .await?;
        let mapping = self.inner.classification.get_mapping().await?;
        self.inner.apply_full(transactions, Some(mapping))
    }

    /// Replace the whole snapshot with externally fetched data, unless a
    /// local edit is recent enough that the data may predate it
    pub fn apply_refresh(&self, transactions: Vec<Transaction>) -> Result<RefreshOutcome> {
        self.inner.apply_full(transactions, None)
    }

    /// Persist a tag → category mapping and re-aggregate with it
    pub async fn set_mapping(&self, tag: &str, category_id: &str) -> Result<usize> {
        self.inner
            .classification
            .set_mapping(tag, category_id)
            .await?;
        self.reload_mapping().await
    }

    /// Re-read the classification map and re-aggregate the current snapshot;
    /// returns the number of drill-down levels popped
    pub async fn reload_mapping(&self) -> Result<usize> {
        let mapping = self.inner.classification.get_mapping().await?;
        self.inner.apply_mapping(mapping)
    }
}

impl Inner {
    fn read_state(&self) -> Result<RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|_| Error::Internal("session state lock poisoned".into()))
    }

    fn write_state(&self) -> Result<RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|_| Error::Internal("session state lock poisoned".into()))
    }

    fn navigate<T>(&self, action: impl FnOnce(&mut Navigator, &Analysis) -> Result<T>) -> Result<T> {
        let mut guard = self.write_state()?;
        let state = &mut *guard;
        action(&mut state.navigator, &state.analysis)
    }

    fn is_guarded(&self) -> Result<bool> {
        let state = self.read_state()?;
        self.guarded(&state)
    }

    fn guarded(&self, state: &State) -> Result<bool> {
        let writing = !self
            .in_flight
            .lock()
            .map_err(|_| Error::Internal("in-flight set lock poisoned".into()))?
            .is_empty();
        let recent = state
            .last_mutation_at
            .is_some_and(|at| at.elapsed() < self.guard_window);
        Ok(writing || recent)
    }

    fn begin_write(self: &Arc<Self>, tx_id: TxId) -> Result<InFlight> {
        let mut in_flight = self
            .in_flight
            .lock()
            .map_err(|_| Error::Internal("in-flight set lock poisoned".into()))?;
        if !in_flight.insert(tx_id) {
            return Err(Error::ReclassifyInFlight(tx_id));
        }
        Ok(InFlight {
            inner: Arc::clone(self),
            tx_id,
        })
    }

    /// Rebuild from a full fetch; keeps the current mapping when `mapping` is
    /// None
    fn apply_full(
        &self,
        transactions: Vec<Transaction>,
        mapping: Option<ClassificationMap>,
    ) -> Result<RefreshOutcome> {
        let mut guard = self.write_state()?;
        if self.guarded(&guard)? {
            info!(
                transactions = transactions.len(),
                "Suppressed refresh inside the guard window"
            );
            return Ok(RefreshOutcome::Suppressed);
        }

        let state = &mut *guard;
        let classification = match mapping {
            Some(mapping) => Arc::new(mapping),
            None => Arc::clone(&state.analysis.classification),
        };
        let analysis = Analysis::build(
            Arc::new(Snapshot::new(transactions)?),
            classification,
            Arc::clone(&self.catalog),
            self.period.clone(),
        )
        .inspect_err(|e| error!(error = %e, "Refresh rebuild failed, keeping previous tree"))?;
        state.analysis = Arc::new(analysis);
        let levels_popped = state.navigator.resync(&state.analysis);

        info!(
            transactions = state.analysis.snapshot.len(),
            levels_popped, "Applied refresh"
        );
        Ok(RefreshOutcome::Applied { levels_popped })
    }

    /// Optimistic half of a reclassification
    fn apply_local(&self, tx_id: TxId, new_tag: &str) -> Result<LocalEdit> {
        let mut guard = self.write_state()?;
        let state = &mut *guard;
        let current = Arc::clone(&state.analysis);
        let view_before = state.navigator.state().clone();

        let change = reconcile::reclassify(
            &current.snapshot,
            tx_id,
            new_tag,
            &current.classification,
            &current.catalog,
        )?;
        let tree = reconcile::recompute(&current, &change.snapshot, &change.affected_categories)
            .inspect_err(|e| error!(tx_id, error = %e, "Recompute failed, keeping previous tree"))?;

        state.analysis = Arc::new(current.with_tree(change.snapshot, tree));
        let levels_popped = state.navigator.resync(&state.analysis);
        state.last_mutation_at = Some(Instant::now());

        let reopen = (levels_popped > 0).then(|| Reopen {
            view: view_before,
            landed_on: state.navigator.breadcrumbs(),
        });

        debug!(tx_id, new_tag, levels_popped, "Applied reclassification locally");
        Ok(LocalEdit {
            outcome: ReclassifyOutcome {
                tx_id,
                affected_categories: change.affected_categories,
                levels_popped,
            },
            previous_tags: change.previous_tags,
            reopen,
        })
    }

    /// Settle a durable write: keep the edit, or roll it back
    fn finish_write(&self, edit: LocalEdit, written: Result<()>) -> Result<ReclassifyOutcome> {
        let tx_id = edit.outcome.tx_id;
        let mut guard = self.write_state()?;
        let state = &mut *guard;
        state.last_mutation_at = Some(Instant::now());

        let reason = match written {
            Ok(()) => {
                debug!(tx_id, "Reclassification persisted");
                return Ok(edit.outcome);
            }
            Err(e) => e.to_string(),
        };
        warn!(tx_id, reason = %reason, "Reclassification write failed, rolling back");

        if let Err(e) = rollback(state, tx_id, edit.previous_tags, edit.reopen) {
            error!(tx_id, error = %e, "Rollback failed");
        }
        Err(Error::ReclassifyFailed { tx_id, reason })
    }

    fn apply_mapping(&self, mapping: ClassificationMap) -> Result<usize> {
        let mut guard = self.write_state()?;
        let state = &mut *guard;
        let analysis = Analysis::build(
            Arc::clone(&state.analysis.snapshot),
            Arc::new(mapping),
            Arc::clone(&self.catalog),
            self.period.clone(),
        )
        .inspect_err(|e| error!(error = %e, "Mapping rebuild failed, keeping previous tree"))?;
        state.analysis = Arc::new(analysis);
        let popped = state.navigator.resync(&state.analysis);
        debug!(
            categories = state.analysis.categories.len(),
            popped, "Re-aggregated with new mapping"
        );
        Ok(popped)
    }
}

fn rollback(
    state: &mut State,
    tx_id: TxId,
    previous_tags: Vec<String>,
    reopen: Option<Reopen>,
) -> Result<()> {
    let current = Arc::clone(&state.analysis);
    let (snapshot, affected) = reconcile::restore_tags(
        &current.snapshot,
        tx_id,
        previous_tags,
        &current.classification,
        &current.catalog,
    )?;
    let tree = reconcile::recompute(&current, &snapshot, &affected)?;
    state.analysis = Arc::new(current.with_tree(snapshot, tree));
    let popped = match reopen {
        Some(reopen) if state.navigator.breadcrumbs() == reopen.landed_on => {
            state.navigator.reopen(&state.analysis, reopen.view)
        }
        _ => state.navigator.resync(&state.analysis),
    };
    debug!(tx_id, popped, "Rolled back reclassification");
    Ok(())
}
