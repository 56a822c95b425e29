//! Synchronization error taxonomy.
//!
//! The disposition of each kind is decided by the caller: connection and
//! referral failures abort the current cycle or paging session and are
//! retried next cycle; schema violations are permanent and eligible for
//! failure memoization; attribute conflicts are transient and never
//! memoized. Nothing here terminates the process — only configuration
//! errors surfaced at startup are fatal.

use thiserror::Error;

/// Errors raised while synchronizing directories.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Invalid or incomplete configuration. Fatal at startup.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Endpoint unreachable or authentication failed.
    #[error("connection failure: {0}")]
    Connection(String),

    /// The directory returned a referral the client will not follow.
    #[error("referral not followed: {0}")]
    Referral(String),

    /// A create or modify violated a structural schema rule. Permanent.
    #[error("schema violation: {0}")]
    SchemaViolation(String),

    /// An added attribute value is already in use. Transient.
    #[error("attribute conflict: {0}")]
    AttributeConflict(String),

    /// A value could not be extracted or represented for one attribute.
    #[error("attribute extraction failed for {attribute}: {message}")]
    AttributeExtraction {
        /// Attribute whose value could not be extracted.
        attribute: String,
        /// What went wrong.
        message: String,
    },

    /// A conversion rule failed to evaluate.
    #[error("rule evaluation failed: {0}")]
    Evaluation(String),

    /// Any other protocol-level failure.
    #[error("directory protocol error: {0}")]
    Protocol(String),
}

impl SyncError {
    /// Creates a configuration error.
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Creates a rule evaluation error.
    #[must_use]
    pub fn evaluation(msg: impl Into<String>) -> Self {
        Self::Evaluation(msg.into())
    }

    /// True for failures that will keep failing on every retry.
    ///
    /// Permanent failures are eligible for failure memoization; everything
    /// else is retried on the next cycle.
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        matches!(self, Self::SchemaViolation(_))
    }
}

/// Result type for synchronization operations.
pub type SyncResult<T> = Result<T, SyncError>;
