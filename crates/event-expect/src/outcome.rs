//! Terminal outcome of an expectation engine.

use crate::result::{ExpectError, ExpectResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why an engine failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// An observed event contradicted an expected event
    Mismatch,
    /// A relation between matched events was false
    RelationViolation,
    /// The engine was torn down before finishing
    Cancelled,
}

/// Result delivered once through the completion signal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum Outcome {
    /// Every expected event matched and every relation held
    Satisfied,
    /// First violation
    Failed {
        /// Failure category
        kind: FailureKind,
        /// Expected event the failure refers to
        #[serde(default, skip_serializing_if = "Option::is_none")]
        label: Option<String>,
        /// Relation that was violated
        #[serde(default, skip_serializing_if = "Option::is_none")]
        relation: Option<String>,
        /// Human-readable diagnostic
        reason: String,
    },
    /// Deadline passed with expected events still missing
    TimedOut {
        /// Labels never observed
        unmatched: Vec<String>,
        /// Timeout in milliseconds
        timeout_ms: u64,
    },
}

impl Outcome {
    /// Mismatch failure citing `label`
    #[must_use]
    pub fn mismatch(label: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Failed {
            kind: FailureKind::Mismatch,
            label: Some(label.into()),
            relation: None,
            reason: reason.into(),
        }
    }

    /// Relation failure citing `relation`
    #[must_use]
    pub fn relation_violation(relation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Failed {
            kind: FailureKind::RelationViolation,
            label: None,
            relation: Some(relation.into()),
            reason: reason.into(),
        }
    }

    /// Teardown before a terminal state
    #[must_use]
    pub fn cancelled(reason: impl Into<String>) -> Self {
        Self::Failed {
            kind: FailureKind::Cancelled,
            label: None,
            relation: None,
            reason: reason.into(),
        }
    }

    /// Check if satisfied
    #[must_use]
    pub const fn is_satisfied(&self) -> bool {
        matches!(self, Self::Satisfied)
    }

    /// Check if failed (mismatch, relation or cancellation)
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// Check if timed out
    #[must_use]
    pub const fn is_timed_out(&self) -> bool {
        matches!(self, Self::TimedOut { .. })
    }

    /// Map onto the error taxonomy so drivers can use `?`.
    ///
    /// # Errors
    ///
    /// Returns the error matching the failure kind, or
    /// [`ExpectError::Timeout`] for a timed-out engine.
    pub fn into_result(self) -> ExpectResult<()> {
        match self {
            Self::Satisfied => Ok(()),
            Self::Failed {
                kind: FailureKind::Mismatch,
                label,
                reason,
                ..
            } => Err(ExpectError::mismatch(label.unwrap_or_default(), reason)),
            Self::Failed {
                kind: FailureKind::RelationViolation,
                relation,
                reason,
                ..
            } => Err(ExpectError::relation_violation(
                relation.unwrap_or_default(),
                reason,
            )),
            Self::Failed {
                kind: FailureKind::Cancelled,
                reason,
                ..
            } => Err(ExpectError::Cancelled { reason }),
            Self::TimedOut {
                unmatched,
                timeout_ms,
            } => Err(ExpectError::Timeout {
                ms: timeout_ms,
                unmatched,
            }),
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Satisfied => f.write_str("satisfied"),
            Self::Failed {
                label: Some(label),
                reason,
                ..
            } => write!(f, "failed at '{label}': {reason}"),
            Self::Failed {
                relation: Some(relation),
                reason,
                ..
            } => write!(f, "failed {relation}: {reason}"),
            Self::Failed { reason, .. } => write!(f, "failed: {reason}"),
            Self::TimedOut {
                unmatched,
                timeout_ms,
            } => write!(f, "timed out after {timeout_ms}ms, missing {unmatched:?}"),
        }
    }
}
