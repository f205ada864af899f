//! Declarative expectation scripts.
//!
//! A script bundles the expected events, the relations between them and the
//! engine options in one YAML or JSON document:
//!
//! ```yaml
//! name: iframe
//! config:
//!   timeout_ms: 5000
//! events:
//!   - label: a-onCommitted
//!     event: onCommitted
//!     details: { frameId: 0, url: a.html, timeStamp: "<any>" }
//! relations:
//!   - { type: ordered_by_label_prefix, prefix: "a-" }
//! ```

use crate::config::EngineConfig;
use crate::event::ExpectedEvent;
use crate::expectation::ExpectationSet;
use crate::relation::Relation;
use crate::result::{ExpectError, ExpectResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Expected events, relations and options loaded from a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpectationScript {
    /// Script name
    #[serde(default)]
    pub name: String,
    /// Free-form description
    #[serde(default)]
    pub description: String,
    /// Engine options
    #[serde(default)]
    pub config: EngineConfig,
    /// Expected events in declaration order
    pub events: Vec<ExpectedEvent>,
    /// Relations between labels
    #[serde(default)]
    pub relations: Vec<Relation>,
}

impl ExpectationScript {
    /// Parse a script from YAML.
    ///
    /// # Errors
    /// Returns error if YAML is invalid or the expectation set is malformed.
    pub fn from_yaml(yaml: &str) -> ExpectResult<Self> {
        let script: Self = serde_yaml_ng::from_str(yaml).map_err(|e| ExpectError::script(e.to_string()))?;
        script.validate()?;
        Ok(script)
    }

    /// Parse a script from JSON.
    ///
    /// # Errors
    /// Returns error if JSON is invalid or the expectation set is malformed.
    pub fn from_json(json: &str) -> ExpectResult<Self> {
        let script: Self = serde_json::from_str(json)?;
        script.validate()?;
        Ok(script)
    }

    /// Load a script file; `.json` files are parsed as JSON, anything else
    /// as YAML.
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed.
    pub fn from_path(path: impl AsRef<Path>) -> ExpectResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json(&text)
        } else {
            Self::from_yaml(&text)
        }
    }

    /// Serialize to YAML.
    ///
    /// # Errors
    /// Returns error if serialization fails.
    pub fn to_yaml(&self) -> ExpectResult<String> {
        serde_yaml_ng::to_string(self).map_err(|e| ExpectError::script(e.to_string()))
    }

    /// Build the validated expectation set.
    ///
    /// # Errors
    /// Returns a configuration error if labels or relations are malformed.
    pub fn expectation_set(&self) -> ExpectResult<ExpectationSet> {
        ExpectationSet::new(self.events.clone(), self.relations.clone())
    }

    fn validate(&self) -> ExpectResult<()> {
        self.expectation_set().map(|_| ())
    }
}
