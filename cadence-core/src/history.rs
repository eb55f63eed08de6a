//! History ledger records and recent-plan snapshots.
//!
//! The ledger is append-only and owned by the caller that records
//! completions; the engine only reads it. A ledger row and a prior-plan row
//! have different shapes, so the request context uses an explicit sum type
//! instead of probing optional attributes.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::TaskType;

/// One completion or feedback event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub date: NaiveDate,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_id: Option<String>,
    pub name: String,
    pub group: String,
    #[serde(default)]
    pub task_type: TaskType,
    pub completed: bool,
    /// 1..=5 when the user rated the attempt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl HistoryRecord {
    pub fn new(
        date: NaiveDate,
        timestamp: DateTime<Utc>,
        group: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            date,
            timestamp,
            module_id: None,
            name: name.into(),
            group: group.into(),
            task_type: TaskType::Todo,
            completed: false,
            difficulty: None,
            notes: None,
        }
    }

    pub fn completed(mut self, completed: bool) -> Self {
        self.completed = completed;
        self
    }

    pub fn with_difficulty(mut self, difficulty: u8) -> Self {
        self.difficulty = Some(difficulty);
        self
    }

    pub fn with_module(mut self, module_id: impl Into<String>) -> Self {
        self.module_id = Some(module_id.into());
        self
    }
}

/// A row from a previously committed plan batch, as seen by the selector
/// when it builds the anti-repetition context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanSnapshot {
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_id: Option<String>,
    pub name: String,
    pub group: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// One row of request context. The two shapes stay distinct; consumers
/// pattern-match instead of reflecting over optional fields.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContextRecord {
    History(HistoryRecord),
    Planned(PlanSnapshot),
}

impl ContextRecord {
    pub fn date(&self) -> NaiveDate {
        match self {
            ContextRecord::History(r) => r.date,
            ContextRecord::Planned(p) => p.date,
        }
    }
}
