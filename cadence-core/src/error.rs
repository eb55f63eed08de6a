//! Error taxonomy for planning and regeneration.
//!
//! The selector's failure paths are tagged variants rather than suppressed
//! exceptions: the orchestrator pattern-matches on them to decide when the
//! fallback scorer substitutes for the generative path.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlannerError {
    /// Malformed catalog entry. Fatal for the load: regeneration for the key
    /// aborts rather than committing a partial plan.
    #[error("invalid catalog: {0}")]
    CatalogValidation(String),

    /// Policy settings that cannot be applied (bad timezone, etc.).
    #[error("invalid policy: {0}")]
    Policy(String),

    /// Generative capability disabled by policy or no client configured.
    #[error("generative capability unavailable: {0}")]
    CapabilityUnavailable(String),

    /// Reply was not parseable JSON or failed the validation contract.
    /// Retried up to the configured bound before surfacing.
    #[error("malformed generative reply: {0}")]
    MalformedResponse(String),

    /// Transport-level failure talking to the generative capability,
    /// including timeouts. Retryable.
    #[error("generative request failed: {0}")]
    RequestFailed(String),

    /// Another regeneration already holds this planning key.
    #[error("regeneration already in progress for {0}")]
    AlreadyRunning(String),

    /// Failure during COMMITTING. The old batch for the key remains.
    #[error("persistence failure: {0}")]
    Persistence(anyhow::Error),
}
