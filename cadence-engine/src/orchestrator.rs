//! Regeneration orchestration: per-key wipe-and-replace planning runs.
//!
//! One run per planning key moves through LOADING_CONTEXT -> SELECTING ->
//! COMMITTING. The commit is all-or-nothing: the plan store either swaps
//! the whole batch or leaves the old one untouched. A per-key guard keeps
//! two runs for the same key from interleaving their delete-then-insert.

use std::collections::HashSet;
use std::sync::Mutex;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use tracing::{info, warn};

use cadence_core::{
    CatalogGroup, ContextRecord, HistoryRecord, PlanSummary, PlannedTask, PlannerError,
    PlanningKey, PolicySettings, local_today, select_fallback,
};

use crate::selector::{
    FALLBACK_DISABLED_SUMMARY, FALLBACK_FAILURE_SUMMARY, GeneratedPlan, GenerativeSelector,
};
use crate::store::{CatalogProvider, HistoryStore, PlanStore};

/// In-process single-writer discipline, keyed by planning key. Different
/// keys regenerate concurrently; a second run for the same key is refused.
#[derive(Debug, Default)]
struct KeyLocks {
    held: Mutex<HashSet<PlanningKey>>,
}

impl KeyLocks {
    fn acquire(&self, key: &PlanningKey) -> Option<KeyGuard<'_>> {
        let mut held = self.held.lock().expect("key lock set poisoned");
        if !held.insert(key.clone()) {
            return None;
        }
        Some(KeyGuard { locks: self, key: key.clone() })
    }
}

struct KeyGuard<'a> {
    locks: &'a KeyLocks,
    key: PlanningKey,
}

impl Drop for KeyGuard<'_> {
    fn drop(&mut self) {
        self.locks
            .held
            .lock()
            .expect("key lock set poisoned")
            .remove(&self.key);
    }
}

pub struct Orchestrator<C, H, P>
where
    C: CatalogProvider,
    H: HistoryStore,
    P: PlanStore,
{
    catalog: C,
    history: H,
    plans: P,
    selector: GenerativeSelector,
    policy: PolicySettings,
    locks: KeyLocks,
}

impl<C, H, P> Orchestrator<C, H, P>
where
    C: CatalogProvider,
    H: HistoryStore,
    P: PlanStore,
{
    pub fn new(
        catalog: C,
        history: H,
        plans: P,
        selector: GenerativeSelector,
        policy: PolicySettings,
    ) -> Self {
        Self {
            catalog,
            history,
            plans,
            selector,
            policy,
            locks: KeyLocks::default(),
        }
    }

    pub fn policy(&self) -> &PolicySettings {
        &self.policy
    }

    fn planning_day(&self, now_utc: DateTime<Utc>) -> Result<NaiveDate, PlannerError> {
        Ok(local_today(self.policy.tz()?, now_utc))
    }

    fn window_start(&self, today: NaiveDate) -> NaiveDate {
        today - Duration::days(i64::from(self.policy.history_window_days))
    }

    /// Startup trigger: regenerate only when no plan exists for today's
    /// daily key. Returns the created batch, or None when one already
    /// exists.
    pub fn ensure_today(
        &self,
        now_utc: DateTime<Utc>,
    ) -> Result<Option<Vec<PlannedTask>>, PlannerError> {
        let today = self.planning_day(now_utc)?;
        let key = PlanningKey::daily(today);
        let existing = self.plans.tasks_for(&key).map_err(PlannerError::Persistence)?;
        if !existing.is_empty() {
            return Ok(None);
        }
        self.regenerate_daily(now_utc).map(Some)
    }

    /// Re-plan the daily key `(today, -)`, replacing any existing batch.
    pub fn regenerate_daily(
        &self,
        now_utc: DateTime<Utc>,
    ) -> Result<Vec<PlannedTask>, PlannerError> {
        let today = self.planning_day(now_utc)?;
        let key = PlanningKey::daily(today);
        let _guard = self
            .locks
            .acquire(&key)
            .ok_or_else(|| PlannerError::AlreadyRunning(key.to_string()))?;

        let modules = self
            .catalog
            .load()
            .map_err(|e| PlannerError::CatalogValidation(e.to_string()))?;
        let groups: Vec<CatalogGroup> = modules.into_iter().flat_map(|m| m.groups).collect();

        let since = self.window_start(today);
        let history = self.history.window(since).map_err(PlannerError::Persistence)?;
        let snapshots = self
            .plans
            .recent_snapshots(since)
            .map_err(PlannerError::Persistence)?;

        let recent: Vec<ContextRecord> = history
            .iter()
            .cloned()
            .map(ContextRecord::History)
            .chain(snapshots.into_iter().map(ContextRecord::Planned))
            .collect();

        let plan = self.selector.select_or_fallback(
            &groups,
            &history,
            &recent,
            today,
            &mut rand::thread_rng(),
        );

        self.commit(&key, plan)
    }

    /// Re-plan one module's key `(today, module_id)`, leaving every other
    /// key's current batch untouched. This path sees the selector's raised
    /// failures and substitutes the fallback scorer explicitly.
    pub fn regenerate_module(
        &self,
        module_id: &str,
        now_utc: DateTime<Utc>,
    ) -> Result<Vec<PlannedTask>, PlannerError> {
        let today = self.planning_day(now_utc)?;
        let key = PlanningKey::module(today, module_id);
        let _guard = self
            .locks
            .acquire(&key)
            .ok_or_else(|| PlannerError::AlreadyRunning(key.to_string()))?;

        let module = self
            .catalog
            .load_module(module_id)
            .map_err(|e| PlannerError::CatalogValidation(e.to_string()))?;

        let since = self.window_start(today);
        let history = self
            .history
            .window_for_module(module_id, since)
            .map_err(PlannerError::Persistence)?;

        let plan = match self
            .selector
            .select_for_module(module_id, &module.groups, &history, today)
        {
            Ok(plan) => plan,
            Err(e) => {
                let summary_text = match &e {
                    PlannerError::CapabilityUnavailable(_) => FALLBACK_DISABLED_SUMMARY,
                    _ => FALLBACK_FAILURE_SUMMARY,
                };
                warn!(module_id, error = %e, "module generation failed; using fallback scorer");
                GeneratedPlan {
                    tasks: select_fallback(&module.groups, &history, today, &mut rand::thread_rng()),
                    summary_text: summary_text.to_string(),
                    raw_response: "{}".to_string(),
                }
            }
        };

        let mut plan = plan;
        for task in &mut plan.tasks {
            task.module_id = Some(module_id.to_string());
        }

        self.commit(&key, plan)
    }

    /// COMMITTING: swap the batch and its summary in one store call. A
    /// store failure propagates and leaves the previous batch in place.
    fn commit(
        &self,
        key: &PlanningKey,
        plan: GeneratedPlan,
    ) -> Result<Vec<PlannedTask>, PlannerError> {
        let summary = PlanSummary {
            date: key.date,
            module_id: key.module_id.clone(),
            summary_text: plan.summary_text,
            raw_response: plan.raw_response,
        };

        self.plans
            .replace(key, &plan.tasks, &summary)
            .map_err(PlannerError::Persistence)?;

        info!(key = %key, tasks = plan.tasks.len(), "committed plan batch");
        Ok(plan.tasks)
    }

    /// Append a completion (or feedback) record to the ledger.
    pub fn record_history(&self, record: HistoryRecord) -> Result<(), PlannerError> {
        self.history.append(record).map_err(PlannerError::Persistence)
    }
}
