//! End-to-end regeneration cycles against the in-memory store.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Result, bail};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};

use cadence_core::{
    CatalogGroup, CatalogItem, FALLBACK_REASON, HistoryRecord, ModuleCatalog, PlanSnapshot,
    PlanSummary, PlannedTask, PlannerError, PlanningKey, PolicySettings,
};
use cadence_engine::{
    ChatCapability, ChatTurn, FALLBACK_DISABLED_SUMMARY, GenerativeSelector, HistoryStore,
    MemoryStore, Orchestrator, PlanStore,
};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap()
}

fn today() -> NaiveDate {
    now().date_naive()
}

/// Catalog provider serving a fixed snapshot.
struct FixedCatalog {
    modules: Vec<ModuleCatalog>,
}

impl FixedCatalog {
    fn single(module_id: &str, groups: Vec<CatalogGroup>) -> Self {
        Self {
            modules: vec![ModuleCatalog {
                module_id: module_id.to_string(),
                groups,
            }],
        }
    }
}

impl cadence_engine::CatalogProvider for FixedCatalog {
    fn load(&self) -> Result<Vec<ModuleCatalog>> {
        Ok(self.modules.clone())
    }

    fn load_module(&self, module_id: &str) -> Result<ModuleCatalog> {
        self.modules
            .iter()
            .find(|m| m.module_id == module_id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("unknown module: {module_id}"))
    }
}

struct CountingCapability {
    reply: String,
    calls: AtomicUsize,
}

impl CountingCapability {
    fn always(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.to_string(),
            calls: AtomicUsize::new(0),
        })
    }
}

impl ChatCapability for CountingCapability {
    fn complete(&self, _system: &str, _turns: &[ChatTurn]) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.reply.clone())
    }
}

/// Plan store whose `replace` always fails, on top of a working MemoryStore.
#[derive(Clone)]
struct FailingPlanStore {
    inner: MemoryStore,
}

impl PlanStore for FailingPlanStore {
    fn tasks_for(&self, key: &PlanningKey) -> Result<Vec<PlannedTask>> {
        self.inner.tasks_for(key)
    }

    fn summary_for(&self, key: &PlanningKey) -> Result<Option<PlanSummary>> {
        self.inner.summary_for(key)
    }

    fn recent_snapshots(&self, since: NaiveDate) -> Result<Vec<PlanSnapshot>> {
        self.inner.recent_snapshots(since)
    }

    fn replace(
        &self,
        _key: &PlanningKey,
        _tasks: &[PlannedTask],
        _summary: &PlanSummary,
    ) -> Result<()> {
        bail!("disk full")
    }
}

fn habits_groups() -> Vec<CatalogGroup> {
    vec![CatalogGroup::new(
        "Habits",
        vec![CatalogItem::new("Walk", 2.0), CatalogItem::new("Read", 1.0)],
    )]
}

fn orchestrator_without_capability(
    store: MemoryStore,
) -> Orchestrator<FixedCatalog, MemoryStore, MemoryStore> {
    let policy = PolicySettings::default();
    Orchestrator::new(
        FixedCatalog::single("wellness", habits_groups()),
        store.clone(),
        store,
        GenerativeSelector::new(None, policy.clone()),
        policy,
    )
}

#[test]
fn test_disabled_capability_end_to_end() {
    // Catalog: Habits { Walk(2), Read(1) }, empty history, no capability.
    let store = MemoryStore::new();
    let orch = orchestrator_without_capability(store.clone());

    let tasks = orch.regenerate_daily(now()).unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].name, "Walk");
    assert_eq!(tasks[0].reason.as_deref(), Some(FALLBACK_REASON));

    let key = PlanningKey::daily(today());
    let summary = store.summary_for(&key).unwrap().unwrap();
    assert_eq!(summary.summary_text, FALLBACK_DISABLED_SUMMARY);
    assert_eq!(summary.raw_response, "{}");
}

#[test]
fn test_regeneration_is_idempotent_per_key() {
    let store = MemoryStore::new();
    let orch = orchestrator_without_capability(store.clone());

    let first = orch.regenerate_daily(now()).unwrap();
    let second = orch.regenerate_daily(now()).unwrap();

    // The second run replaces, never appends.
    let key = PlanningKey::daily(today());
    assert_eq!(store.tasks_for(&key).unwrap().len(), first.len());
    assert_eq!(store.tasks_for(&key).unwrap().len(), second.len());
    assert_eq!(store.batch_count(), 1);
}

#[test]
fn test_ensure_today_only_plans_when_missing() {
    let store = MemoryStore::new();
    let orch = orchestrator_without_capability(store.clone());

    let created = orch.ensure_today(now()).unwrap();
    assert!(created.is_some());

    // A plan now exists; the startup check leaves it alone.
    let again = orch.ensure_today(now()).unwrap();
    assert!(again.is_none());
    assert_eq!(store.batch_count(), 1);
}

#[test]
fn test_generative_reply_drop_rule_end_to_end() {
    // 3 entries, one lacking a name: exactly 2 survive.
    let reply = r#"{
        "tasks": [
            {"name": "Walk", "group": "Habits", "reason": "streak break"},
            {"group": "Habits"},
            {"name": "Read", "group": "Habits", "task_type": "todo"}
        ],
        "summary_notes": "balanced day"
    }"#;
    let capability = CountingCapability::always(reply);
    let policy = PolicySettings::default();
    let store = MemoryStore::new();
    let orch = Orchestrator::new(
        FixedCatalog::single("wellness", habits_groups()),
        store.clone(),
        store.clone(),
        GenerativeSelector::new(Some(capability.clone()), policy.clone()),
        policy,
    );

    let tasks = orch.regenerate_daily(now()).unwrap();
    assert_eq!(capability.calls.load(Ordering::SeqCst), 1);
    assert_eq!(tasks.len(), 2);

    let summary = store
        .summary_for(&PlanningKey::daily(today()))
        .unwrap()
        .unwrap();
    assert_eq!(summary.summary_text, "balanced day");
    assert!(summary.raw_response.contains("tasks"));
}

#[test]
fn test_always_malformed_capability_falls_back_after_retries() {
    let capability = CountingCapability::always("definitely not json");
    let policy = PolicySettings::default();
    let store = MemoryStore::new();
    let orch = Orchestrator::new(
        FixedCatalog::single("wellness", habits_groups()),
        store.clone(),
        store.clone(),
        GenerativeSelector::new(Some(capability.clone()), policy.clone()),
        policy,
    );

    let tasks = orch.regenerate_daily(now()).unwrap();

    // retries = 2 => exactly 3 calls, then the fallback scorer's pick.
    assert_eq!(capability.calls.load(Ordering::SeqCst), 3);
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].name, "Walk");
}

#[test]
fn test_module_refresh_leaves_daily_key_untouched() {
    let store = MemoryStore::new();
    let orch = orchestrator_without_capability(store.clone());

    orch.regenerate_daily(now()).unwrap();
    let daily_before = store.tasks_for(&PlanningKey::daily(today())).unwrap();

    // Module path has no capability: the orchestrator substitutes the
    // fallback scorer itself and still commits under the module key.
    let module_tasks = orch.regenerate_module("wellness", now()).unwrap();
    assert!(!module_tasks.is_empty());
    assert!(module_tasks.iter().all(|t| t.module_id.as_deref() == Some("wellness")));

    let module_key = PlanningKey::module(today(), "wellness");
    let summary = store.summary_for(&module_key).unwrap().unwrap();
    assert_eq!(summary.summary_text, FALLBACK_DISABLED_SUMMARY);

    let daily_after = store.tasks_for(&PlanningKey::daily(today())).unwrap();
    assert_eq!(daily_before, daily_after);
    assert_eq!(store.batch_count(), 2);
}

#[test]
fn test_unknown_module_aborts_without_commit() {
    let store = MemoryStore::new();
    let orch = orchestrator_without_capability(store.clone());

    let err = orch.regenerate_module("nope", now()).unwrap_err();
    assert!(matches!(err, PlannerError::CatalogValidation(_)));
    assert_eq!(store.batch_count(), 0);
}

#[test]
fn test_persistence_failure_leaves_no_partial_batch() {
    let history = MemoryStore::new();
    let failing = FailingPlanStore {
        inner: MemoryStore::new(),
    };
    let policy = PolicySettings::default();
    let orch = Orchestrator::new(
        FixedCatalog::single("wellness", habits_groups()),
        history,
        failing.clone(),
        GenerativeSelector::new(None, policy.clone()),
        policy,
    );

    let err = orch.regenerate_daily(now()).unwrap_err();
    assert!(matches!(err, PlannerError::Persistence(_)));
    assert_eq!(
        failing.tasks_for(&PlanningKey::daily(today())).unwrap().len(),
        0
    );
}

#[test]
fn test_history_feeds_fallback_rotation_away_from_streaks() {
    let store = MemoryStore::new();
    let orch = orchestrator_without_capability(store.clone());

    // Walk completed three days running: an active streak should hand the
    // slot to Read despite Walk's higher importance.
    for days_ago in 0..3 {
        let date = today() - chrono::Duration::days(days_ago);
        let ts = now() - chrono::Duration::days(days_ago);
        store
            .append(
                HistoryRecord::new(date, ts, "Habits", "Walk")
                    .completed(true)
                    .with_difficulty(2),
            )
            .unwrap();
    }

    let tasks = orch.regenerate_daily(now()).unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].name, "Read");
}
