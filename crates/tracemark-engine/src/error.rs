use uuid::Uuid;

/// Errors surfaced to callers of the engine.
///
/// Dependency failures in the publish path never appear here: they fail open.
/// Attempts to move a claim out of a terminal state are reported as
/// `NotFound`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Malformed request, rejected before anything is written
    #[error("validation failed: {0}")]
    Validation(String),
    /// Referenced record missing, or no longer actionable
    #[error("not found: {0}")]
    NotFound(String),
    /// Caller lacks the role for this operation
    #[error("not authorized: {0}")]
    Unauthorized(String),
    /// Persistence failure
    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl EngineError {
    pub(crate) fn claim_not_actionable(id: Uuid) -> Self {
        Self::NotFound(format!("claim {} not found or already reviewed", id))
    }

    pub(crate) fn application_not_actionable(id: Uuid) -> Self {
        Self::NotFound(format!("application {} not found or already reviewed", id))
    }
}
