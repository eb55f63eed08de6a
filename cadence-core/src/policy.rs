//! Policy settings consumed by the selection engine.

use std::collections::BTreeMap;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::PlannerError;

/// Flat planner configuration. Every field has a default so a partial
/// `[policy]` section in config.toml works.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicySettings {
    pub use_generative: bool,
    pub history_window_days: u32,
    pub daily_time_budget_minutes: u32,
    pub anti_repetition_days: u32,
    /// IANA timezone the planning day and the daily tick are computed in.
    pub timezone: String,
    pub max_items_total: usize,
    /// Corrective retries after the first generative attempt.
    pub retries: u32,
    /// Forwarded to the generative payload as task limits. The fallback
    /// scorer keeps its fixed keyword quotas. Keep last: serializes as a
    /// TOML table.
    pub per_group_quotas: BTreeMap<String, usize>,
}

impl Default for PolicySettings {
    fn default() -> Self {
        let mut quotas = BTreeMap::new();
        quotas.insert("fundamentals".to_string(), 3);
        quotas.insert("leetcode".to_string(), 1);
        quotas.insert("habits".to_string(), 1);
        quotas.insert("study".to_string(), 1);

        Self {
            use_generative: true,
            history_window_days: 14,
            daily_time_budget_minutes: 120,
            anti_repetition_days: 3,
            timezone: "UTC".to_string(),
            max_items_total: 8,
            retries: 2,
            per_group_quotas: quotas,
        }
    }
}

impl PolicySettings {
    pub fn tz(&self) -> Result<Tz, PlannerError> {
        self.timezone
            .parse()
            .map_err(|_| PlannerError::Policy(format!("invalid timezone: {}", self.timezone)))
    }
}
