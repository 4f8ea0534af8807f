//! Error taxonomy for the orchestration core.
//!
//! Three kinds, handled differently by callers:
//! - caller errors surface immediately with no committed side effects
//! - transient resource errors are retried with bounded backoff inside the
//!   affected component and surface only on exhaustion
//! - invariant violations are fatal to the operation; partial effects are
//!   rolled back and the error is logged for reconciliation

use serde::Serialize;

/// Classification of a [`CoreError`], stable across releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    /// Bad input or bad call ordering; nothing was written.
    Caller,
    /// Resource contention or temporary I/O; safe to retry.
    Transient,
    /// A core invariant was violated; manual reconciliation may be needed.
    Invariant,
}

/// Core error type
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Empty or whitespace-only content on a write
    #[error("content is required: supply non-empty memory content")]
    ContentRequired,

    /// Empty query on retrieval
    #[error("query is required: supply a non-empty search query")]
    QueryRequired,

    /// A supplied canonical key could not be sanitized into a Subject-Aspect-Qualifier triple
    #[error("invalid canonical key '{0}': must sanitize to Subject-Aspect-Qualifier, ASCII and '-' only, at most 30 chars")]
    InvalidCanonicalKey(String),

    /// A forced namespace outside the allowed set
    #[error("invalid namespace '{0}': allowed values are prod, test, ephemeral")]
    InvalidNamespace(String),

    /// Ephemeral memories must carry an expiry
    #[error("expires_at is required for namespace '{0}'")]
    ExpiresAtRequired(String),

    /// A retrieval filter referenced an unknown field
    #[error("invalid filter: unknown field '{0}'")]
    InvalidFilter(String),

    /// Write attempted without a valid, unconsumed search token
    #[error("compliance gate closed for session '{0}': call search_memories before writing")]
    ComplianceGateClosed(String),

    /// A candidate reached scoring without an embedding
    #[error("embedding missing for memory '{0}'")]
    EmbeddingMissing(String),

    /// Referenced memory/entity does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Write lock could not be acquired within the configured timeout
    #[error("write lock unavailable after {waited_ms} ms (held by pid {holder_pid} for '{operation}')")]
    WriteLockUnavailable {
        /// Total time spent waiting
        waited_ms: u64,
        /// PID recorded in the lock file
        holder_pid: u32,
        /// Operation recorded in the lock file
        operation: String,
    },

    /// Another process holds the store open for mutation
    #[error("store busy: another process (pid {0}) holds the writer")]
    StoreBusy(u32),

    /// Underlying SQLite error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Embedding provider failure
    #[error("embedding failed: {0}")]
    Embedding(String),

    /// Dual-store inconsistency, rollback failure, or lock file corruption
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// Store or component failed to initialize
    #[error("initialization error: {0}")]
    Init(String),
}

impl CoreError {
    /// Stable kind tag for this error (spec'd recovery class).
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::ContentRequired
            | CoreError::QueryRequired
            | CoreError::InvalidCanonicalKey(_)
            | CoreError::InvalidNamespace(_)
            | CoreError::ExpiresAtRequired(_)
            | CoreError::InvalidFilter(_)
            | CoreError::ComplianceGateClosed(_)
            | CoreError::EmbeddingMissing(_)
            | CoreError::NotFound(_) => ErrorKind::Caller,
            CoreError::WriteLockUnavailable { .. }
            | CoreError::StoreBusy(_)
            | CoreError::Database(_)
            | CoreError::Io(_)
            | CoreError::Serialization(_)
            | CoreError::Embedding(_) => ErrorKind::Transient,
            CoreError::InvariantViolation(_) | CoreError::Init(_) => ErrorKind::Invariant,
        }
    }

    /// Short machine-readable tag (stable, snake_case).
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::ContentRequired => "content_required",
            CoreError::QueryRequired => "query_required",
            CoreError::InvalidCanonicalKey(_) => "invalid_canonical_key",
            CoreError::InvalidNamespace(_) => "invalid_namespace",
            CoreError::ExpiresAtRequired(_) => "expires_at_required",
            CoreError::InvalidFilter(_) => "invalid_filter",
            CoreError::ComplianceGateClosed(_) => "compliance_gate_closed",
            CoreError::EmbeddingMissing(_) => "embedding_missing",
            CoreError::NotFound(_) => "not_found",
            CoreError::WriteLockUnavailable { .. } => "write_lock_unavailable",
            CoreError::StoreBusy(_) => "store_busy",
            CoreError::Database(_) => "database",
            CoreError::Io(_) => "io",
            CoreError::Serialization(_) => "serialization",
            CoreError::Embedding(_) => "embedding",
            CoreError::InvariantViolation(_) => "invariant_violation",
            CoreError::Init(_) => "init",
        }
    }
}

/// Core result type
pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(CoreError::ContentRequired.kind(), ErrorKind::Caller);
        assert_eq!(
            CoreError::ComplianceGateClosed("s".into()).kind(),
            ErrorKind::Caller
        );
        assert_eq!(CoreError::StoreBusy(42).kind(), ErrorKind::Transient);
        assert_eq!(
            CoreError::WriteLockUnavailable {
                waited_ms: 5000,
                holder_pid: 1,
                operation: "add_memory".into()
            }
            .kind(),
            ErrorKind::Transient
        );
        assert_eq!(
            CoreError::InvariantViolation("x".into()).kind(),
            ErrorKind::Invariant
        );
    }

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(CoreError::ContentRequired.code(), "content_required");
        assert_eq!(
            CoreError::InvalidCanonicalKey("??".into()).code(),
            "invalid_canonical_key"
        );
        assert_eq!(CoreError::StoreBusy(1).code(), "store_busy");
    }
}
