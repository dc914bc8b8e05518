use objmon_storage::StorageError;

/// Errors surfaced by rule-builder and lifecycle operations.
///
/// # Examples
///
/// ```rust
/// use objmon_alert::RuleError;
///
/// let err = RuleError::PreconditionFailed("rule must be tested before activation".into());
/// assert!(err.to_string().contains("tested before activation"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    /// Malformed rule input; the store is not touched.
    #[error("Rule: validation failed: {0}")]
    Validation(String),

    /// The referenced rule does not exist.
    #[error("Rule: not found (id={0})")]
    NotFound(String),

    /// The rule is not in a state that allows the transition.
    #[error("Rule: precondition failed: {0}")]
    PreconditionFailed(String),

    /// Durable store failure, propagated unchanged.
    #[error(transparent)]
    Store(#[from] StorageError),
}

pub type Result<T> = std::result::Result<T, RuleError>;
