//! cadence-core: Core types and deterministic selection logic for the
//! Cadence daily planner.

pub mod catalog;
pub mod error;
pub mod history;
pub mod plan;
pub mod policy;
pub mod scorer;
pub mod stats;
pub mod time;

pub use catalog::{CatalogGroup, CatalogItem, ModuleCatalog, TaskType, validate_groups};
pub use error::PlannerError;
pub use history::{ContextRecord, HistoryRecord, PlanSnapshot};
pub use plan::{PlanSummary, PlannedTask, PlanningKey};
pub use policy::PolicySettings;
pub use scorer::{FALLBACK_REASON, ROTATION_REASON, score_item, select_fallback};
pub use stats::{AggregatedStat, StatKey, aggregate};
pub use time::{local_today, next_local_tick};
