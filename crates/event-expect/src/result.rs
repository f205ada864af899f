//! Result and error types for event-expect.

use thiserror::Error;

/// Result type for event-expect operations
pub type ExpectResult<T> = Result<T, ExpectError>;

/// Errors that can occur while configuring or driving an expectation engine
#[derive(Debug, Error)]
pub enum ExpectError {
    /// Malformed expectation set (duplicate labels, unknown references)
    #[error("Configuration error: {message}")]
    Configuration {
        /// Error message
        message: String,
    },

    /// Observed event contradicts the expected event it was matched against
    #[error("Event mismatch at '{label}': {reason}")]
    MatchMismatch {
        /// Label of the expected event that was contradicted
        label: String,
        /// What differed
        reason: String,
    },

    /// A relation between matched events evaluated false
    #[error("Relation {relation} violated: {reason}")]
    RelationViolation {
        /// Description of the violated relation
        relation: String,
        /// What differed
        reason: String,
    },

    /// Expected events were never observed before the deadline
    #[error("Timed out after {ms}ms waiting for {unmatched:?}")]
    Timeout {
        /// Timeout in milliseconds
        ms: u64,
        /// Labels still unmatched when the deadline passed
        unmatched: Vec<String>,
    },

    /// `submit` called while the engine is not accepting events
    #[error("Engine is not accepting events in state {state}")]
    NotAccepting {
        /// State the engine was in
        state: String,
    },

    /// Listener registered twice with the same event source
    #[error("Listener already added")]
    DuplicateListener,

    /// Listener removed from a source it was never added to
    #[error("Listener does not exist")]
    UnknownListener,

    /// Engine was torn down before reaching a terminal state
    #[error("Expectation cancelled: {reason}")]
    Cancelled {
        /// Why the engine was torn down
        reason: String,
    },

    /// Expectation script could not be parsed or is invalid
    #[error("Script error: {message}")]
    Script {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ExpectError {
    /// Create a configuration error
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a match mismatch error
    #[must_use]
    pub fn mismatch(label: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MatchMismatch {
            label: label.into(),
            reason: reason.into(),
        }
    }

    /// Create a relation violation error
    #[must_use]
    pub fn relation_violation(relation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::RelationViolation {
            relation: relation.into(),
            reason: reason.into(),
        }
    }

    /// Create a script error
    #[must_use]
    pub fn script(message: impl Into<String>) -> Self {
        Self::Script {
            message: message.into(),
        }
    }

    /// Whether this error means an expected event never arrived, as opposed
    /// to a wrong event arriving
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
