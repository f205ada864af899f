//! Engine configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default time to wait for the expectation set to complete (30 seconds)
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// How an observed event picks the expected event it is matched against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPolicy {
    /// First unmatched expected event, in declaration order, with the same
    /// event name. Cross-label ordering is left to relations.
    #[default]
    ByEventName,
    /// First unmatched expected event, regardless of name. Declaration
    /// order is the required arrival order.
    Sequential,
}

/// How undeclared observed fields are treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldPolicy {
    /// Every observed field must be declared
    #[default]
    Exact,
    /// Undeclared observed fields are ignored
    Subset,
}

/// Options for an expectation engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Timeout in milliseconds
    pub timeout_ms: u64,
    /// Candidate selection policy
    pub match_policy: MatchPolicy,
    /// Undeclared field handling
    pub field_policy: FieldPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            match_policy: MatchPolicy::default(),
            field_policy: FieldPolicy::default(),
        }
    }
}

impl EngineConfig {
    /// Create new options with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set timeout in milliseconds
    #[must_use]
    pub const fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Set the match policy
    #[must_use]
    pub const fn with_match_policy(mut self, policy: MatchPolicy) -> Self {
        self.match_policy = policy;
        self
    }

    /// Set the field policy
    #[must_use]
    pub const fn with_field_policy(mut self, policy: FieldPolicy) -> Self {
        self.field_policy = policy;
        self
    }

    /// Get timeout as Duration
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
