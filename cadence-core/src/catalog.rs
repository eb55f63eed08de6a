//! Task catalog: declarative groups of candidate tasks.
//!
//! Catalogs are loaded from config by the caller and immutable within a
//! planning run. The engine only ever sees validated value objects.

use serde::{Deserialize, Serialize};

use crate::error::PlannerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    Coding,
    #[default]
    Todo,
}

/// One selectable task in a catalog group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub name: String,
    pub importance: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default)]
    pub task_type: TaskType,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl CatalogItem {
    pub fn new(name: impl Into<String>, importance: f64) -> Self {
        Self {
            name: name.into(),
            importance,
            url: None,
            task_type: TaskType::Todo,
            metadata: serde_json::Map::new(),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_task_type(mut self, task_type: TaskType) -> Self {
        self.task_type = task_type;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogGroup {
    pub name: String,
    pub items: Vec<CatalogItem>,
}

impl CatalogGroup {
    pub fn new(name: impl Into<String>, items: Vec<CatalogItem>) -> Self {
        Self {
            name: name.into(),
            items,
        }
    }
}

/// All groups declared for one module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleCatalog {
    pub module_id: String,
    pub groups: Vec<CatalogGroup>,
}

/// Validate a catalog snapshot before it reaches the selection engine.
///
/// Rejects empty group/item names, duplicate group names, and items without
/// a positive importance. Catalog providers call this at load time so the
/// orchestrator can abort regeneration instead of committing a garbage plan.
pub fn validate_groups(groups: &[CatalogGroup]) -> Result<(), PlannerError> {
    let mut seen: Vec<&str> = Vec::new();
    for group in groups {
        if group.name.trim().is_empty() {
            return Err(PlannerError::CatalogValidation(
                "group with empty name".to_string(),
            ));
        }
        if seen.iter().any(|s| *s == group.name) {
            return Err(PlannerError::CatalogValidation(format!(
                "duplicate group name: {}",
                group.name
            )));
        }
        seen.push(&group.name);

        for item in &group.items {
            if item.name.trim().is_empty() {
                return Err(PlannerError::CatalogValidation(format!(
                    "item with empty name in group {}",
                    group.name
                )));
            }
            if !item.importance.is_finite() || item.importance <= 0.0 {
                return Err(PlannerError::CatalogValidation(format!(
                    "item {} in group {} needs a positive importance",
                    item.name, group.name
                )));
            }
        }
    }
    Ok(())
}
