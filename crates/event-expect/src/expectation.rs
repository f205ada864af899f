//! Validated expectation sets.

use crate::event::ExpectedEvent;
use crate::relation::{Relation, ResolvedRelation};
use crate::result::{ExpectError, ExpectResult};
use std::collections::HashMap;

/// Ordered expected events plus the relations between them.
///
/// Construction validates the set: labels are non-empty and unique, and
/// every relation resolves against the declared labels. Once built the set
/// is immutable.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpectationSet {
    events: Vec<ExpectedEvent>,
    relations: Vec<ResolvedRelation>,
    index: HashMap<String, usize>,
}

impl ExpectationSet {
    /// Validate and build an expectation set.
    ///
    /// # Errors
    ///
    /// Returns [`ExpectError::Configuration`] for an empty event list, an
    /// empty or duplicate label, or a relation that does not resolve.
    pub fn new(events: Vec<ExpectedEvent>, relations: Vec<Relation>) -> ExpectResult<Self> {
        if events.is_empty() {
            return Err(ExpectError::configuration("no expected events"));
        }

        let mut index = HashMap::with_capacity(events.len());
        for (i, event) in events.iter().enumerate() {
            if event.label.is_empty() {
                return Err(ExpectError::configuration(format!(
                    "expected event #{i} ({}) has an empty label",
                    event.event_name
                )));
            }
            if index.insert(event.label.clone(), i).is_some() {
                return Err(ExpectError::configuration(format!(
                    "duplicate label '{}'",
                    event.label
                )));
            }
        }

        let relations = relations
            .iter()
            .map(|relation| ResolvedRelation::resolve(relation, &events))
            .collect::<ExpectResult<Vec<_>>>()?;

        Ok(Self {
            events,
            relations,
            index,
        })
    }

    /// Expected events in declaration order
    #[must_use]
    pub fn events(&self) -> &[ExpectedEvent] {
        &self.events
    }

    /// Resolved relations in declaration order
    #[must_use]
    pub fn relations(&self) -> &[ResolvedRelation] {
        &self.relations
    }

    /// Declaration index of `label`
    #[must_use]
    pub fn position(&self, label: &str) -> Option<usize> {
        self.index.get(label).copied()
    }

    /// Look up an expected event by label
    #[must_use]
    pub fn get(&self, label: &str) -> Option<&ExpectedEvent> {
        self.position(label).map(|i| &self.events[i])
    }

    /// Number of expected events
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the set has no expected events
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
