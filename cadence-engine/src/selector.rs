//! Generative selector: model-backed task selection with schema validation,
//! bounded corrective retries, and deterministic fallback.
//!
//! The base path never surfaces an error; failure is a tagged outcome the
//! caller resolves with the fallback scorer. The module-scoped path raises
//! instead, and its caller substitutes the fallback explicitly.

use std::sync::Arc;

use chrono::NaiveDate;
use rand::Rng;
use serde_json::Value;
use tracing::{debug, warn};

use cadence_core::{
    AggregatedStat, CatalogGroup, ContextRecord, HistoryRecord, PlannedTask, PlannerError,
    PolicySettings, TaskType, aggregate, select_fallback,
};

use crate::llm::{ChatCapability, ChatTurn};

pub const FALLBACK_DISABLED_SUMMARY: &str = "Fallback selector used (AI disabled or unavailable).";
pub const FALLBACK_FAILURE_SUMMARY: &str = "Fallback selector used after AI failure.";

const CORRECTION_NOTE: &str =
    "Your last reply was invalid JSON. Reply again with ONLY valid JSON conforming to the schema.";

const SCHEMA_SPEC: &str = r#"Required JSON schema:
{
  "date": "YYYY-MM-DD",
  "tasks": [
    {
      "name": "string, required",
      "group": "string, must match a group from the catalog",
      "task_type": "coding | todo",
      "problem_text": "string, optional but required for coding",
      "code_template": "string, required for coding tasks; full runnable file with starter code + tests",
      "todo_text": "string, optional; fallback if problem_text is not present",
      "difficulty_estimate": "1-5 integer, optional",
      "importance": "optional",
      "reason": "string explaining why this task was chosen",
      "url": "optional, for leetcode tasks",
      "metadata": { "arbitrary additional structured data" }
    }
  ],
  "summary_notes": "string explanation for the daily summary"
}
Reply with only JSON."#;

const CODING_TEMPLATE_SNIPPET: &str = r#"Example coding task format (runnable file with tests):

# Problem: <name>
# Group: <group>

class Solution:
    def solve(self, *args, **kwargs):
        # TODO: implement your solution here
        pass

def run_tests():
    tests = [
        {"input": [...], "expected": ...},
    ]
    for i, t in enumerate(tests):
        result = Solution().solve(*t["input"])
        print(f"Test {i}: expected {t['expected']}, got {result}")

if __name__ == "__main__":
    run_tests()"#;

/// A validated generative (or substituted fallback) selection.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedPlan {
    pub tasks: Vec<PlannedTask>,
    pub summary_text: String,
    pub raw_response: String,
}

/// Result of one base-path selection attempt, visible to the orchestrator.
#[derive(Debug)]
pub enum SelectionOutcome {
    Generated(GeneratedPlan),
    /// Disabled by policy or no client configured.
    CapabilityUnavailable,
    /// Assembly, transport, or validation failed after all retries.
    Failed(PlannerError),
}

pub struct GenerativeSelector {
    capability: Option<Arc<dyn ChatCapability>>,
    policy: PolicySettings,
}

impl GenerativeSelector {
    pub fn new(capability: Option<Arc<dyn ChatCapability>>, policy: PolicySettings) -> Self {
        Self { capability, policy }
    }

    fn enabled_capability(&self) -> Option<&Arc<dyn ChatCapability>> {
        if !self.policy.use_generative {
            return None;
        }
        self.capability.as_ref()
    }

    /// Base path. Builds the full-catalog request and returns a tagged
    /// outcome; never panics, never raises.
    pub fn select(
        &self,
        groups: &[CatalogGroup],
        stats: &[&AggregatedStat],
        recent: &[ContextRecord],
        today: NaiveDate,
    ) -> SelectionOutcome {
        let Some(capability) = self.enabled_capability() else {
            return SelectionOutcome::CapabilityUnavailable;
        };

        let system = build_system_prompt(None);
        let payload = serde_json::json!({
            "today_date": today.to_string(),
            "task_groups": groups,
            "history_stats": stats,
            "recent_activity": recent,
            "user_settings": self.user_settings(),
        });

        match self.request_with_retries(capability.as_ref(), &system, payload.to_string()) {
            Ok(plan) => SelectionOutcome::Generated(plan),
            Err(e) => SelectionOutcome::Failed(e),
        }
    }

    /// Base-path contract: the caller never sees an error. A missing
    /// capability or an exhausted retry budget substitutes the fallback
    /// scorer with the matching summary string and `raw_response = "{}"`.
    pub fn select_or_fallback<R: Rng>(
        &self,
        groups: &[CatalogGroup],
        history: &[HistoryRecord],
        recent: &[ContextRecord],
        today: NaiveDate,
        rng: &mut R,
    ) -> GeneratedPlan {
        let stats = aggregate(history, today);
        let stat_refs: Vec<&AggregatedStat> = stats.values().collect();

        match self.select(groups, &stat_refs, recent, today) {
            SelectionOutcome::Generated(plan) => plan,
            SelectionOutcome::CapabilityUnavailable => GeneratedPlan {
                tasks: select_fallback(groups, history, today, rng),
                summary_text: FALLBACK_DISABLED_SUMMARY.to_string(),
                raw_response: "{}".to_string(),
            },
            SelectionOutcome::Failed(e) => {
                warn!(error = %e, "generative selection failed; substituting fallback scorer");
                GeneratedPlan {
                    tasks: select_fallback(groups, history, today, rng),
                    summary_text: FALLBACK_FAILURE_SUMMARY.to_string(),
                    raw_response: "{}".to_string(),
                }
            }
        }
    }

    /// Module-scoped variant. Catalog and history are already scoped to one
    /// module. Unlike the base path this raises on capability absence; the
    /// caller decides whether to substitute the fallback scorer.
    pub fn select_for_module(
        &self,
        module_id: &str,
        groups: &[CatalogGroup],
        history: &[HistoryRecord],
        today: NaiveDate,
    ) -> Result<GeneratedPlan, PlannerError> {
        let capability = self.enabled_capability().ok_or_else(|| {
            PlannerError::CapabilityUnavailable(format!(
                "module generation for {module_id} requires the generative capability"
            ))
        })?;

        let module_title = format_module_title(module_id);
        let system = build_system_prompt(Some((module_id, &module_title)));
        let stats = aggregate(history, today);
        let stat_refs: Vec<&AggregatedStat> = stats.values().collect();
        let payload = serde_json::json!({
            "today_date": today.to_string(),
            "module_id": module_id,
            "module_title": module_title,
            "module_config": groups,
            "history_for_module": stat_refs,
            "user_settings": self.user_settings(),
            "task_schema_description": "Use the provided schema exactly. coding tasks must include problem_text and code_template. todo tasks may include todo_text.",
        });

        self.request_with_retries(capability.as_ref(), &system, payload.to_string())
    }

    fn user_settings(&self) -> Value {
        serde_json::json!({
            "daily_time_budget_minutes": self.policy.daily_time_budget_minutes,
            "task_limits": self.policy.per_group_quotas,
            "avoid_repetition_days": self.policy.anti_repetition_days,
            "performance_window_days": self.policy.history_window_days,
            "difficulty_scale_definition": "1=very easy, 5=very hard",
            "timezone": self.policy.timezone,
            "max_items_total": self.policy.max_items_total,
        })
    }

    /// One call plus up to `retries` corrective resubmissions. Any failure
    /// (transport, JSON parse, validation contract) appends the correction
    /// note and tries again; exhaustion returns the last error.
    fn request_with_retries(
        &self,
        capability: &dyn ChatCapability,
        system: &str,
        user_payload: String,
    ) -> Result<GeneratedPlan, PlannerError> {
        let mut turns = vec![ChatTurn::user(user_payload)];
        let mut last_error = PlannerError::RequestFailed("no attempts made".to_string());

        for attempt in 0..=self.policy.retries {
            match attempt_once(capability, system, &turns) {
                Ok(plan) => return Ok(plan),
                Err(e) => {
                    debug!(attempt, error = %e, "generative attempt rejected");
                    last_error = e;
                    turns.push(ChatTurn::user(CORRECTION_NOTE));
                }
            }
        }

        Err(last_error)
    }
}

fn attempt_once(
    capability: &dyn ChatCapability,
    system: &str,
    turns: &[ChatTurn],
) -> Result<GeneratedPlan, PlannerError> {
    let raw = capability
        .complete(system, turns)
        .map_err(|e| PlannerError::RequestFailed(e.to_string()))?;

    let value: Value = serde_json::from_str(&raw)
        .map_err(|e| PlannerError::MalformedResponse(format!("not valid JSON: {e}")))?;

    let (tasks, summary_text) = validate_reply(&value)?;

    Ok(GeneratedPlan {
        tasks,
        summary_text,
        raw_response: value.to_string(),
    })
}

/// Validation contract for the structured reply.
///
/// The reply must be an object with a `tasks` array. Entries missing a
/// non-empty `name` or `group` are dropped, not errors; `task_type`
/// defaults to todo; coding tasks fall back to `todo_text` for the problem
/// statement. Zero surviving tasks fails validation.
pub fn validate_reply(value: &Value) -> Result<(Vec<PlannedTask>, String), PlannerError> {
    let Some(object) = value.as_object() else {
        return Err(PlannerError::MalformedResponse(
            "reply must be a JSON object".to_string(),
        ));
    };

    let Some(entries) = object.get("tasks").and_then(Value::as_array) else {
        return Err(PlannerError::MalformedResponse(
            "reply missing tasks array".to_string(),
        ));
    };

    let mut cleaned = Vec::new();
    for entry in entries {
        let Some(task) = entry.as_object() else {
            continue;
        };
        let Some(name) = non_empty_str(task.get("name")) else {
            continue;
        };
        let Some(group) = non_empty_str(task.get("group")) else {
            continue;
        };

        let task_type = match task.get("task_type").and_then(Value::as_str) {
            Some("coding") => TaskType::Coding,
            _ => TaskType::Todo,
        };

        let todo_text = owned_str(task.get("todo_text"));
        let mut problem_text = owned_str(task.get("problem_text"));
        // An empty problem statement counts as absent for the fallback.
        if task_type == TaskType::Coding && problem_text.as_deref().is_none_or(str::is_empty) {
            problem_text = todo_text.clone();
        }

        let mut out = PlannedTask::new(group, name).with_task_type(task_type);
        out.problem_text = problem_text;
        out.code_template = owned_str(task.get("code_template"));
        out.todo_text = todo_text;
        out.url = owned_str(task.get("url"));
        out.reason = owned_str(task.get("reason"));
        out.importance = task.get("importance").and_then(Value::as_f64);
        out.difficulty_estimate = task
            .get("difficulty_estimate")
            .and_then(Value::as_u64)
            .filter(|d| (1..=5).contains(d))
            .map(|d| d as u8);
        if let Some(Value::Object(meta)) = task.get("metadata") {
            out.metadata = meta.clone();
        }

        cleaned.push(out);
    }

    if cleaned.is_empty() {
        return Err(PlannerError::MalformedResponse(
            "reply had no valid tasks".to_string(),
        ));
    }

    let summary = match object.get("summary_notes") {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    };

    Ok((cleaned, summary))
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value.and_then(Value::as_str).filter(|s| !s.is_empty())
}

fn owned_str(value: Option<&Value>) -> Option<String> {
    value.and_then(Value::as_str).map(str::to_string)
}

fn build_system_prompt(module: Option<(&str, &str)>) -> String {
    let header = match module {
        Some((module_id, module_title)) => format!(
            "You are generating tasks for the module: {module_title} ({module_id}). \
             Produce tasks strictly following the JSON schema. \
             The output must be a standalone set of tasks for this module only."
        ),
        None => "You are selecting today's tasks from the provided catalog, balancing \
                 importance, recency, and the user's recorded difficulty. Produce tasks \
                 strictly following the JSON schema."
            .to_string(),
    };

    format!(
        "{header}\n\nCoding task template guidance:\n{CODING_TEMPLATE_SNIPPET}\n\n{SCHEMA_SPEC}"
    )
}

/// "dsa_fundamentals" -> "Dsa Fundamentals".
fn format_module_title(module_id: &str) -> String {
    module_id
        .replace(['-', '_'], " ")
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
