//! Collaborator seams: catalog provider, history ledger, and plan store.
//!
//! The engine is protocol-agnostic; it consumes and produces value objects
//! through these traits. `MemoryStore` backs the test suite and doubles as
//! a reference implementation of the atomic replace contract.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use chrono::NaiveDate;

use cadence_core::{
    HistoryRecord, ModuleCatalog, PlanSnapshot, PlanSummary, PlannedTask, PlanningKey,
};

/// Returns validated catalog snapshots. Implementations must reject
/// malformed entries with a descriptive error before the engine sees them.
pub trait CatalogProvider {
    fn load(&self) -> Result<Vec<ModuleCatalog>>;
    fn load_module(&self, module_id: &str) -> Result<ModuleCatalog>;
}

/// Append-only completion/feedback ledger with date-range reads.
pub trait HistoryStore {
    fn append(&self, record: HistoryRecord) -> Result<()>;
    /// All records with `date >= since`.
    fn window(&self, since: NaiveDate) -> Result<Vec<HistoryRecord>>;
    fn window_for_module(&self, module_id: &str, since: NaiveDate) -> Result<Vec<HistoryRecord>>;
}

/// Plan batches keyed by `(date, module_id?)`.
pub trait PlanStore {
    fn tasks_for(&self, key: &PlanningKey) -> Result<Vec<PlannedTask>>;
    fn summary_for(&self, key: &PlanningKey) -> Result<Option<PlanSummary>>;
    /// Snapshots of every task planned on or after `since`, for the
    /// anti-repetition context.
    fn recent_snapshots(&self, since: NaiveDate) -> Result<Vec<PlanSnapshot>>;
    /// Atomically replace the batch for `key`: the old tasks and summary go
    /// away and the new batch lands together, or nothing changes.
    fn replace(
        &self,
        key: &PlanningKey,
        tasks: &[PlannedTask],
        summary: &PlanSummary,
    ) -> Result<()>;
}

#[derive(Debug, Default)]
struct MemoryInner {
    history: Vec<HistoryRecord>,
    plans: HashMap<PlanningKey, (Vec<PlannedTask>, PlanSummary)>,
}

/// In-memory store for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batch_count(&self) -> usize {
        self.inner.lock().expect("memory store lock").plans.len()
    }
}

impl HistoryStore for MemoryStore {
    fn append(&self, record: HistoryRecord) -> Result<()> {
        self.inner
            .lock()
            .expect("memory store lock")
            .history
            .push(record);
        Ok(())
    }

    fn window(&self, since: NaiveDate) -> Result<Vec<HistoryRecord>> {
        let inner = self.inner.lock().expect("memory store lock");
        Ok(inner
            .history
            .iter()
            .filter(|r| r.date >= since)
            .cloned()
            .collect())
    }

    fn window_for_module(&self, module_id: &str, since: NaiveDate) -> Result<Vec<HistoryRecord>> {
        let inner = self.inner.lock().expect("memory store lock");
        Ok(inner
            .history
            .iter()
            .filter(|r| r.date >= since && r.module_id.as_deref() == Some(module_id))
            .cloned()
            .collect())
    }
}

impl PlanStore for MemoryStore {
    fn tasks_for(&self, key: &PlanningKey) -> Result<Vec<PlannedTask>> {
        let inner = self.inner.lock().expect("memory store lock");
        Ok(inner
            .plans
            .get(key)
            .map(|(tasks, _)| tasks.clone())
            .unwrap_or_default())
    }

    fn summary_for(&self, key: &PlanningKey) -> Result<Option<PlanSummary>> {
        let inner = self.inner.lock().expect("memory store lock");
        Ok(inner.plans.get(key).map(|(_, summary)| summary.clone()))
    }

    fn recent_snapshots(&self, since: NaiveDate) -> Result<Vec<PlanSnapshot>> {
        let inner = self.inner.lock().expect("memory store lock");
        let mut out = Vec::new();
        for (key, (tasks, _)) in &inner.plans {
            if key.date < since {
                continue;
            }
            for task in tasks {
                out.push(task.snapshot(key.date));
            }
        }
        out.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.name.cmp(&b.name)));
        Ok(out)
    }

    fn replace(
        &self,
        key: &PlanningKey,
        tasks: &[PlannedTask],
        summary: &PlanSummary,
    ) -> Result<()> {
        let mut inner = self.inner.lock().expect("memory store lock");
        inner
            .plans
            .insert(key.clone(), (tasks.to_vec(), summary.clone()));
        Ok(())
    }
}
