//! Planned task batches: the engine's output unit.
//!
//! One planning run for a `(date, module_id?)` key produces a batch of
//! tasks plus a summary; the batch atomically replaces any prior batch for
//! that key.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::catalog::TaskType;
use crate::history::PlanSnapshot;

/// The tuple scoping one regeneration run and its resulting batch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlanningKey {
    pub date: NaiveDate,
    pub module_id: Option<String>,
}

impl PlanningKey {
    pub fn daily(date: NaiveDate) -> Self {
        Self {
            date,
            module_id: None,
        }
    }

    pub fn module(date: NaiveDate, module_id: impl Into<String>) -> Self {
        Self {
            date,
            module_id: Some(module_id.into()),
        }
    }
}

impl fmt::Display for PlanningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.module_id {
            Some(m) => write!(f, "{}/{}", self.date, m),
            None => write!(f, "{}", self.date),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedTask {
    pub name: String,
    pub group: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_id: Option<String>,
    #[serde(default)]
    pub task_type: TaskType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub problem_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_template: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub todo_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty_estimate: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub importance: Option<f64>,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl PlannedTask {
    pub fn new(group: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            group: group.into(),
            module_id: None,
            task_type: TaskType::Todo,
            problem_text: None,
            code_template: None,
            todo_text: None,
            url: None,
            reason: None,
            difficulty_estimate: None,
            importance: None,
            metadata: serde_json::Map::new(),
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_task_type(mut self, task_type: TaskType) -> Self {
        self.task_type = task_type;
        self
    }

    pub fn snapshot(&self, date: NaiveDate) -> PlanSnapshot {
        PlanSnapshot {
            date,
            module_id: self.module_id.clone(),
            name: self.name.clone(),
            group: self.group.clone(),
            url: self.url.clone(),
        }
    }
}

/// Explanatory summary paired 1:1 with a task batch. At most one live
/// summary per planning key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanSummary {
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_id: Option<String>,
    pub summary_text: String,
    pub raw_response: String,
}
