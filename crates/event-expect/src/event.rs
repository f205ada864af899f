//! Expected and observed event types.
//!
//! An [`ExpectedEvent`] is a labeled template; an [`ObservedEvent`] is what
//! the system under test actually emitted, stamped with its arrival sequence
//! number by the engine.

use crate::config::FieldPolicy;
use crate::result::{ExpectError, ExpectResult};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Event payload: field name to JSON value
pub type Details = serde_json::Map<String, Value>;

/// Script representation of a wildcard field
pub const WILDCARD: &str = "<any>";

/// Script key marking a regex field matcher (`{"$regex": "..."}`)
pub const PATTERN_KEY: &str = "$regex";

/// Convert a JSON object into event details.
///
/// # Errors
///
/// Returns a configuration error if `value` is not a JSON object.
pub fn details(value: Value) -> ExpectResult<Details> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(ExpectError::configuration(format!(
            "event details must be an object, got {other}"
        ))),
    }
}

// =============================================================================
// FIELD MATCHER
// =============================================================================

/// Constraint on a single detail field
#[derive(Debug, Clone)]
pub enum FieldMatcher {
    /// Field must equal this value
    Exact(Value),
    /// Field must be present with any value
    Any,
    /// Field must be a string matching this regex
    Pattern(Regex),
}

impl FieldMatcher {
    /// Exact-value matcher
    #[must_use]
    pub fn exact(value: impl Into<Value>) -> Self {
        Self::Exact(value.into())
    }

    /// Regex matcher
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the pattern does not compile.
    pub fn pattern(pattern: &str) -> ExpectResult<Self> {
        Regex::new(pattern)
            .map(Self::Pattern)
            .map_err(|e| ExpectError::configuration(format!("invalid pattern '{pattern}': {e}")))
    }

    /// Check an observed value against this matcher
    #[must_use]
    pub fn matches(&self, actual: &Value) -> bool {
        match self {
            Self::Exact(expected) => expected == actual,
            Self::Any => true,
            Self::Pattern(re) => actual.as_str().is_some_and(|s| re.is_match(s)),
        }
    }

    /// Whether this matcher constrains the value at all
    #[must_use]
    pub const fn is_wildcard(&self) -> bool {
        matches!(self, Self::Any)
    }

    fn to_value(&self) -> Value {
        match self {
            Self::Exact(value) => value.clone(),
            Self::Any => Value::String(WILDCARD.to_string()),
            Self::Pattern(re) => {
                let mut map = serde_json::Map::new();
                let _ = map.insert(PATTERN_KEY.to_string(), Value::String(re.as_str().to_string()));
                Value::Object(map)
            }
        }
    }

    fn from_value(value: Value) -> Result<Self, String> {
        match value {
            Value::String(s) if s == WILDCARD => Ok(Self::Any),
            Value::Object(map) if map.len() == 1 && map.contains_key(PATTERN_KEY) => {
                match map.get(PATTERN_KEY) {
                    Some(Value::String(pattern)) => Regex::new(pattern)
                        .map(Self::Pattern)
                        .map_err(|e| format!("invalid pattern '{pattern}': {e}")),
                    _ => Err(format!("{PATTERN_KEY} must be a string")),
                }
            }
            other => Ok(Self::Exact(other)),
        }
    }
}

impl PartialEq for FieldMatcher {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Exact(a), Self::Exact(b)) => a == b,
            (Self::Any, Self::Any) => true,
            (Self::Pattern(a), Self::Pattern(b)) => a.as_str() == b.as_str(),
            _ => false,
        }
    }
}

impl From<Value> for FieldMatcher {
    fn from(value: Value) -> Self {
        Self::Exact(value)
    }
}

impl fmt::Display for FieldMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(value) => write!(f, "{value}"),
            Self::Any => f.write_str(WILDCARD),
            Self::Pattern(re) => write!(f, "/{}/", re.as_str()),
        }
    }
}

impl Serialize for FieldMatcher {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for FieldMatcher {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(value).map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// EXPECTED EVENT
// =============================================================================

/// A declared, labeled template an observed event must satisfy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpectedEvent {
    /// Unique key within an expectation set
    pub label: String,
    /// Event name the observed event must carry
    #[serde(rename = "event")]
    pub event_name: String,
    /// Per-field constraints
    #[serde(default)]
    pub details: BTreeMap<String, FieldMatcher>,
}

impl ExpectedEvent {
    /// Create an expected event with no detail constraints
    #[must_use]
    pub fn new(label: impl Into<String>, event_name: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            event_name: event_name.into(),
            details: BTreeMap::new(),
        }
    }

    /// Require `field` to equal `value`
    #[must_use]
    pub fn with_detail(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        let _ = self
            .details
            .insert(field.into(), FieldMatcher::Exact(value.into()));
        self
    }

    /// Require `field` to be present with any value
    #[must_use]
    pub fn with_any(mut self, field: impl Into<String>) -> Self {
        let _ = self.details.insert(field.into(), FieldMatcher::Any);
        self
    }

    /// Constrain `field` with an arbitrary matcher
    #[must_use]
    pub fn with_matcher(mut self, field: impl Into<String>, matcher: FieldMatcher) -> Self {
        let _ = self.details.insert(field.into(), matcher);
        self
    }

    /// Whether this event's label starts with `prefix`
    #[must_use]
    pub fn has_prefix(&self, prefix: &str) -> bool {
        self.label.starts_with(prefix)
    }

    /// Compare observed details against this template.
    ///
    /// Returns a description of the first difference, walking declared
    /// fields in name order and then (under [`FieldPolicy::Exact`]) the
    /// undeclared observed fields.
    pub fn compare(&self, observed: &Details, policy: FieldPolicy) -> Result<(), String> {
        for (field, matcher) in &self.details {
            match observed.get(field) {
                None => return Err(format!("missing field `{field}` (expected {matcher})")),
                Some(actual) if !matcher.matches(actual) => {
                    return Err(format!("field `{field}`: expected {matcher}, got {actual}"));
                }
                Some(_) => {}
            }
        }
        if policy == FieldPolicy::Exact {
            if let Some((field, value)) = observed
                .iter()
                .find(|(field, _)| !self.details.contains_key(*field))
            {
                return Err(format!("unexpected field `{field}` = {value}"));
            }
        }
        Ok(())
    }
}

// =============================================================================
// OBSERVED EVENT
// =============================================================================

/// An actual event instance delivered by the system under test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservedEvent {
    /// Event name
    pub event_name: String,
    /// Event payload
    pub details: Details,
    /// Arrival sequence number, assigned on submit
    pub sequence: u64,
}

impl ObservedEvent {
    /// Create an observed event
    #[must_use]
    pub fn new(event_name: impl Into<String>, details: Details, sequence: u64) -> Self {
        Self {
            event_name: event_name.into(),
            details,
            sequence,
        }
    }

    /// Look up a detail field
    #[must_use]
    pub fn detail(&self, field: &str) -> Option<&Value> {
        self.details.get(field)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    mod field_matcher_tests {
        use super::*;

        #[test]
        fn test_exact_matches_equal_value() {
            let m = FieldMatcher::exact(0);
            assert!(m.matches(&json!(0)));
            assert!(!m.matches(&json!(1)));
            assert!(!m.matches(&json!("0")));
        }

        #[test]
        fn test_any_matches_everything() {
            assert!(FieldMatcher::Any.matches(&json!(null)));
            assert!(FieldMatcher::Any.matches(&json!({"nested": [1, 2]})));
            assert!(FieldMatcher::Any.is_wildcard());
        }

        #[test]
        fn test_pattern_matches_strings_only() {
            let m = FieldMatcher::pattern(r"^chrome-extension://[a-z]+/a\.html$").unwrap();
            assert!(m.matches(&json!("chrome-extension://abc/a.html")));
            assert!(!m.matches(&json!("chrome-extension://abc/b.html")));
            assert!(!m.matches(&json!(42)));
        }

        #[test]
        fn test_invalid_pattern_is_configuration_error() {
            let err = FieldMatcher::pattern("(").unwrap_err();
            assert!(matches!(err, ExpectError::Configuration { .. }));
        }

        #[test]
        fn test_deserialize_sentinels() {
            let any: FieldMatcher = serde_json::from_value(json!("<any>")).unwrap();
            assert_eq!(any, FieldMatcher::Any);

            let pattern: FieldMatcher = serde_json::from_value(json!({"$regex": "^a"})).unwrap();
            assert!(pattern.matches(&json!("abc")));

            let exact: FieldMatcher = serde_json::from_value(json!({"frameId": 0})).unwrap();
            assert_eq!(exact, FieldMatcher::exact(json!({"frameId": 0})));
        }

        #[test]
        fn test_deserialize_non_string_pattern_fails() {
            let result = serde_json::from_value::<FieldMatcher>(json!({"$regex": 3}));
            assert!(result.is_err());
        }

        #[test]
        fn test_serialize_wildcard_as_sentinel() {
            let value = serde_json::to_value(FieldMatcher::Any).unwrap();
            assert_eq!(value, json!("<any>"));
        }

        #[test]
        fn test_display() {
            assert_eq!(FieldMatcher::exact("x").to_string(), "\"x\"");
            assert_eq!(FieldMatcher::Any.to_string(), "<any>");
            assert_eq!(FieldMatcher::pattern("a+").unwrap().to_string(), "/a+/");
        }
    }

    mod expected_event_tests {
        use super::*;

        fn committed() -> ExpectedEvent {
            ExpectedEvent::new("a-onCommitted", "onCommitted")
                .with_detail("frameId", 0)
                .with_detail("url", "a.html")
                .with_any("timeStamp")
        }

        #[test]
        fn test_compare_accepts_matching_details() {
            let observed = details(json!({"frameId": 0, "url": "a.html", "timeStamp": 1234.5})).unwrap();
            assert!(committed().compare(&observed, FieldPolicy::Exact).is_ok());
        }

        #[test]
        fn test_compare_reports_differing_field() {
            let observed = details(json!({"frameId": 0, "url": "b.html", "timeStamp": 1})).unwrap();
            let reason = committed().compare(&observed, FieldPolicy::Exact).unwrap_err();
            assert!(reason.contains("`url`"));
            assert!(reason.contains("b.html"));
        }

        #[test]
        fn test_compare_wildcard_requires_presence() {
            let observed = details(json!({"frameId": 0, "url": "a.html"})).unwrap();
            let reason = committed().compare(&observed, FieldPolicy::Exact).unwrap_err();
            assert!(reason.contains("missing field `timeStamp`"));
        }

        #[test]
        fn test_field_policy_controls_extra_fields() {
            let observed = details(json!({
                "frameId": 0, "url": "a.html", "timeStamp": 1, "tabId": 7
            }))
            .unwrap();
            let reason = committed().compare(&observed, FieldPolicy::Exact).unwrap_err();
            assert!(reason.contains("unexpected field `tabId`"));
            assert!(committed().compare(&observed, FieldPolicy::Subset).is_ok());
        }

        #[test]
        fn test_has_prefix() {
            assert!(committed().has_prefix("a-"));
            assert!(!committed().has_prefix("b-"));
        }

        #[test]
        fn test_deserialize_uses_event_key() {
            let event: ExpectedEvent = serde_json::from_value(json!({
                "label": "b-onCompleted",
                "event": "onCompleted",
                "details": {"frameId": 1, "timeStamp": "<any>"}
            }))
            .unwrap();
            assert_eq!(event.event_name, "onCompleted");
            assert_eq!(event.details["timeStamp"], FieldMatcher::Any);
        }
    }

    #[test]
    fn test_details_rejects_non_objects() {
        assert!(details(json!([1, 2])).is_err());
        assert!(details(json!({})).unwrap().is_empty());
    }

    #[test]
    fn test_observed_detail_lookup() {
        let observed = ObservedEvent::new("onCompleted", details(json!({"frameId": 2})).unwrap(), 4);
        assert_eq!(observed.detail("frameId"), Some(&json!(2)));
        assert_eq!(observed.detail("url"), None);
        assert_eq!(observed.sequence, 4);
    }
}
