//! JSON-file-backed history ledger and plan store.
//!
//! Storage stays file-backed and human-inspectable. Writes serialize the
//! whole file to a sibling temp path and rename over the original, so a
//! failed write never leaves a partial batch behind.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use cadence_core::{
    HistoryRecord, PlanSnapshot, PlanSummary, PlannedTask, PlanningKey,
};
use cadence_engine::{HistoryStore, PlanStore};

#[derive(Debug, Default, Serialize, Deserialize)]
struct PlansFile {
    batches: Vec<PlanBatch>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PlanBatch {
    key: PlanningKey,
    tasks: Vec<PlannedTask>,
    summary: PlanSummary,
}

/// File-backed store implementing both ledger and plan seams. Cloning
/// shares the same files and write lock.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    history_path: PathBuf,
    plans_path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl JsonFileStore {
    pub fn new(history_path: impl Into<PathBuf>, plans_path: impl Into<PathBuf>) -> Self {
        Self {
            history_path: history_path.into(),
            plans_path: plans_path.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    fn read_or_default<T: DeserializeOwned + Default>(path: &Path) -> Result<T> {
        if !path.exists() {
            return Ok(T::default());
        }
        let s = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        serde_json::from_str(&s).with_context(|| format!("parse {}", path.display()))
    }

    fn write_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(value).context("serialize store file")?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).with_context(|| format!("write {}", tmp.display()))?;
        fs::rename(&tmp, path).with_context(|| format!("rename into {}", path.display()))?;
        Ok(())
    }
}

impl HistoryStore for JsonFileStore {
    fn append(&self, record: HistoryRecord) -> Result<()> {
        let _guard = self.write_lock.lock().expect("store write lock");
        let mut records: Vec<HistoryRecord> = Self::read_or_default(&self.history_path)?;
        records.push(record);
        Self::write_atomic(&self.history_path, &records)
    }

    fn window(&self, since: NaiveDate) -> Result<Vec<HistoryRecord>> {
        let records: Vec<HistoryRecord> = Self::read_or_default(&self.history_path)?;
        Ok(records.into_iter().filter(|r| r.date >= since).collect())
    }

    fn window_for_module(&self, module_id: &str, since: NaiveDate) -> Result<Vec<HistoryRecord>> {
        Ok(self
            .window(since)?
            .into_iter()
            .filter(|r| r.module_id.as_deref() == Some(module_id))
            .collect())
    }
}

impl PlanStore for JsonFileStore {
    fn tasks_for(&self, key: &PlanningKey) -> Result<Vec<PlannedTask>> {
        let file: PlansFile = Self::read_or_default(&self.plans_path)?;
        Ok(file
            .batches
            .into_iter()
            .find(|b| &b.key == key)
            .map(|b| b.tasks)
            .unwrap_or_default())
    }

    fn summary_for(&self, key: &PlanningKey) -> Result<Option<PlanSummary>> {
        let file: PlansFile = Self::read_or_default(&self.plans_path)?;
        Ok(file
            .batches
            .into_iter()
            .find(|b| &b.key == key)
            .map(|b| b.summary))
    }

    fn recent_snapshots(&self, since: NaiveDate) -> Result<Vec<PlanSnapshot>> {
        let file: PlansFile = Self::read_or_default(&self.plans_path)?;
        let mut out = Vec::new();
        for batch in &file.batches {
            if batch.key.date < since {
                continue;
            }
            for task in &batch.tasks {
                out.push(task.snapshot(batch.key.date));
            }
        }
        Ok(out)
    }

    fn replace(
        &self,
        key: &PlanningKey,
        tasks: &[PlannedTask],
        summary: &PlanSummary,
    ) -> Result<()> {
        let _guard = self.write_lock.lock().expect("store write lock");
        let mut file: PlansFile = Self::read_or_default(&self.plans_path)?;
        file.batches.retain(|b| &b.key != key);
        file.batches.push(PlanBatch {
            key: key.clone(),
            tasks: tasks.to_vec(),
            summary: summary.clone(),
        });
        file.batches.sort_by(|a, b| a.key.cmp(&b.key));
        Self::write_atomic(&self.plans_path, &file)
    }
}
