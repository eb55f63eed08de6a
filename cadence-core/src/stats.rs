//! History aggregation: per-(group, name) statistics derived from the ledger.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::history::HistoryRecord;

/// Key identifying one task identity across the ledger.
pub type StatKey = (String, String);

/// Derived statistics for one (group, name) key. Recomputed from the ledger
/// on every planning run; never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedStat {
    pub group: String,
    pub name: String,
    pub last_seen_date: Option<NaiveDate>,
    pub days_since_last_completed: Option<i64>,
    /// Consecutive completions scanning from most recent backward, stopping
    /// at the first non-completion.
    pub completion_streak: u32,
    pub average_difficulty: Option<f64>,
    pub completed_today: bool,
    pub sample_count: usize,
}

impl AggregatedStat {
    /// Days since the key was last seen at all, floored at 1. Keys with no
    /// history report 999 so the recency term vanishes.
    pub fn last_seen_days(&self, as_of: NaiveDate) -> i64 {
        match self.last_seen_date {
            Some(d) => (as_of - d).num_days().max(1),
            None => 999,
        }
    }
}

/// Aggregate raw ledger records into per-key statistics.
///
/// Pure function. Caller-provided ordering does not matter: records are
/// sorted by timestamp descending per key before the streak scan.
pub fn aggregate(
    records: &[HistoryRecord],
    as_of: NaiveDate,
) -> BTreeMap<StatKey, AggregatedStat> {
    let mut by_key: BTreeMap<StatKey, Vec<&HistoryRecord>> = BTreeMap::new();
    for record in records {
        by_key
            .entry((record.group.clone(), record.name.clone()))
            .or_default()
            .push(record);
    }

    let mut out = BTreeMap::new();
    for ((group, name), mut rows) in by_key {
        rows.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        let last_seen_date = rows.first().map(|r| r.date);

        let days_since_last_completed = rows
            .iter()
            .find(|r| r.completed)
            .map(|r| (as_of - r.date).num_days());

        let mut completion_streak = 0u32;
        for row in &rows {
            if row.completed {
                completion_streak += 1;
            } else {
                break;
            }
        }

        let difficulties: Vec<f64> = rows
            .iter()
            .filter_map(|r| r.difficulty.map(f64::from))
            .collect();
        let average_difficulty = if difficulties.is_empty() {
            None
        } else {
            Some(difficulties.iter().sum::<f64>() / difficulties.len() as f64)
        };

        let completed_today = rows.iter().any(|r| r.date == as_of && r.completed);

        out.insert(
            (group.clone(), name.clone()),
            AggregatedStat {
                group,
                name,
                last_seen_date,
                days_since_last_completed,
                completion_streak,
                average_difficulty,
                completed_today,
                sample_count: rows.len(),
            },
        );
    }

    out
}
