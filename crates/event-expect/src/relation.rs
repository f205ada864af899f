//! Relations between labeled events.
//!
//! A [`Relation`] is declared in terms of labels or label prefixes. When an
//! expectation set is configured every relation is resolved against the
//! declared events into a [`ResolvedRelation`], which knows exactly which
//! events it references and can be evaluated once all of them are matched.

use crate::event::{ExpectedEvent, ObservedEvent};
use crate::result::{ExpectError, ExpectResult};
use crate::webnavigation::{ON_COMPLETED, ON_DOM_CONTENT_LOADED};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Fields linking a child event to its parent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChildKey {
    /// Field on child events holding the parent's identifier
    pub child_field: String,
    /// Field on parent events holding the identifier
    pub parent_field: String,
}

impl Default for ChildKey {
    fn default() -> Self {
        Self {
            child_field: "parentFrameId".to_string(),
            parent_field: "frameId".to_string(),
        }
    }
}

impl ChildKey {
    /// Create a child key
    #[must_use]
    pub fn new(child_field: impl Into<String>, parent_field: impl Into<String>) -> Self {
        Self {
            child_field: child_field.into(),
            parent_field: parent_field.into(),
        }
    }
}

/// Event names bracketing the window in which a nested load may start
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadMarkers {
    /// Caller event after which the callee may start
    pub loaded: String,
    /// Caller event before which the callee must have started
    pub completed: String,
}

impl Default for LoadMarkers {
    fn default() -> Self {
        Self {
            loaded: ON_DOM_CONTENT_LOADED.to_string(),
            completed: ON_COMPLETED.to_string(),
        }
    }
}

/// A predicate over two or more labeled events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Relation {
    /// Events whose labels share the prefix arrive in declaration order
    OrderedByLabelPrefix {
        /// Label prefix
        prefix: String,
    },
    /// Events under `child` reference the identifier of events under `parent`
    IsChildOf {
        /// Child label prefix
        child: String,
        /// Parent label prefix
        parent: String,
        /// Linking fields
        #[serde(default)]
        key: ChildKey,
    },
    /// The first `callee` event arrives strictly between the caller's
    /// loaded and completed markers
    LoadedBy {
        /// Callee label prefix
        callee: String,
        /// Caller label prefix
        caller: String,
        /// Marker event names
        #[serde(default)]
        markers: LoadMarkers,
    },
    /// The listed labels arrive in exactly this order
    ExplicitSequence {
        /// Labels in required arrival order
        labels: Vec<String>,
    },
}

impl Relation {
    /// Order all events under `prefix` by declaration
    #[must_use]
    pub fn ordered_by_label_prefix(prefix: impl Into<String>) -> Self {
        Self::OrderedByLabelPrefix {
            prefix: prefix.into(),
        }
    }

    /// Link `child` events to `parent` through `parentFrameId` / `frameId`
    #[must_use]
    pub fn is_child_of(child: impl Into<String>, parent: impl Into<String>) -> Self {
        Self::is_child_of_by(child, parent, ChildKey::default())
    }

    /// Link `child` events to `parent` through caller-supplied fields
    #[must_use]
    pub fn is_child_of_by(
        child: impl Into<String>,
        parent: impl Into<String>,
        key: ChildKey,
    ) -> Self {
        Self::IsChildOf {
            child: child.into(),
            parent: parent.into(),
            key,
        }
    }

    /// `callee` starts while `caller` is between its navigation markers
    #[must_use]
    pub fn loaded_by(callee: impl Into<String>, caller: impl Into<String>) -> Self {
        Self::LoadedBy {
            callee: callee.into(),
            caller: caller.into(),
            markers: LoadMarkers::default(),
        }
    }

    /// Literal arrival order of labels
    #[must_use]
    pub fn explicit_sequence<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::ExplicitSequence {
            labels: labels.into_iter().map(Into::into).collect(),
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OrderedByLabelPrefix { prefix } => write!(f, "ordered_by_label_prefix({prefix:?})"),
            Self::IsChildOf { child, parent, .. } => write!(f, "is_child_of({child:?}, {parent:?})"),
            Self::LoadedBy { callee, caller, .. } => write!(f, "loaded_by({callee:?}, {caller:?})"),
            Self::ExplicitSequence { labels } => write!(f, "explicit_sequence[{}]", labels.join(", ")),
        }
    }
}

// =============================================================================
// RESOLUTION
// =============================================================================

/// Relation check expressed over event indices
#[derive(Debug, Clone, PartialEq, Eq)]
enum Check {
    /// Arrival sequence strictly increases along the listed events
    Ascending(Vec<usize>),
    /// Every child carries the parent's identifier
    SharedIdentifier {
        parents: Vec<usize>,
        children: Vec<usize>,
        key: ChildKey,
    },
    /// `callee` arrives strictly between `loaded` and `completed`
    Between {
        callee: usize,
        loaded: usize,
        completed: usize,
    },
}

/// A relation bound to the events of one expectation set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRelation {
    relation: Relation,
    check: Check,
    references: Vec<usize>,
}

fn with_prefix(events: &[ExpectedEvent], prefix: &str) -> Vec<usize> {
    events
        .iter()
        .enumerate()
        .filter(|(_, e)| e.has_prefix(prefix))
        .map(|(i, _)| i)
        .collect()
}

fn first_named(events: &[ExpectedEvent], within: &[usize], name: &str) -> Option<usize> {
    within
        .iter()
        .copied()
        .find(|&i| events[i].event_name == name)
}

impl ResolvedRelation {
    /// Resolve `relation` against declared events.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a referenced label or prefix does
    /// not resolve to declared events.
    pub fn resolve(relation: &Relation, events: &[ExpectedEvent]) -> ExpectResult<Self> {
        let fail = |why: String| ExpectError::configuration(format!("{relation}: {why}"));
        let nonempty_prefix = |prefix: &str| {
            let found = with_prefix(events, prefix);
            if found.is_empty() {
                Err(fail(format!("no labels with prefix '{prefix}'")))
            } else {
                Ok(found)
            }
        };

        let check = match relation {
            Relation::OrderedByLabelPrefix { prefix } => Check::Ascending(nonempty_prefix(prefix)?),
            Relation::IsChildOf { child, parent, key } => {
                let children = nonempty_prefix(child)?;
                let parents = nonempty_prefix(parent)?;
                if children.iter().any(|i| parents.contains(i)) {
                    return Err(fail(format!(
                        "prefixes '{child}' and '{parent}' select the same labels"
                    )));
                }
                Check::SharedIdentifier {
                    parents,
                    children,
                    key: key.clone(),
                }
            }
            Relation::LoadedBy {
                callee,
                caller,
                markers,
            } => {
                let callee_events = nonempty_prefix(callee)?;
                let caller_events = nonempty_prefix(caller)?;
                let marker = |name: &str| {
                    first_named(events, &caller_events, name)
                        .ok_or_else(|| fail(format!("caller '{caller}' has no {name} event")))
                };
                let loaded = marker(&markers.loaded)?;
                let completed = marker(&markers.completed)?;
                let callee_first = callee_events[0];
                if callee_first == loaded || callee_first == completed {
                    return Err(fail(format!(
                        "callee '{callee}' overlaps caller '{caller}' markers"
                    )));
                }
                Check::Between {
                    callee: callee_first,
                    loaded,
                    completed,
                }
            }
            Relation::ExplicitSequence { labels } => {
                if labels.len() < 2 {
                    return Err(fail("needs at least two labels".to_string()));
                }
                let mut seen = HashSet::new();
                let mut indices = Vec::with_capacity(labels.len());
                for label in labels {
                    if !seen.insert(label.as_str()) {
                        return Err(fail(format!("label '{label}' listed twice")));
                    }
                    let index = events
                        .iter()
                        .position(|e| &e.label == label)
                        .ok_or_else(|| fail(format!("unknown label '{label}'")))?;
                    indices.push(index);
                }
                Check::Ascending(indices)
            }
        };

        let mut references = match &check {
            Check::Ascending(indices) => indices.clone(),
            Check::SharedIdentifier {
                parents, children, ..
            } => parents.iter().chain(children).copied().collect(),
            Check::Between {
                callee,
                loaded,
                completed,
            } => vec![*callee, *loaded, *completed],
        };
        references.sort_unstable();
        references.dedup();

        Ok(Self {
            relation: relation.clone(),
            check,
            references,
        })
    }

    /// The declared relation
    #[must_use]
    pub const fn relation(&self) -> &Relation {
        &self.relation
    }

    /// Indices of every event this relation reads
    #[must_use]
    pub fn references(&self) -> &[usize] {
        &self.references
    }

    /// Whether every referenced event is matched
    #[must_use]
    pub fn is_ready(&self, matched: &[Option<ObservedEvent>]) -> bool {
        self.references
            .iter()
            .all(|&i| matched.get(i).is_some_and(Option::is_some))
    }

    /// Evaluate against matched events; `matched` is parallel to `events`.
    ///
    /// Returns a description of the first violation. Callers must only
    /// evaluate once [`Self::is_ready`] holds.
    pub fn evaluate(
        &self,
        events: &[ExpectedEvent],
        matched: &[Option<ObservedEvent>],
    ) -> Result<(), String> {
        let observed = |i: usize| {
            matched
                .get(i)
                .and_then(Option::as_ref)
                .ok_or_else(|| format!("`{}` is not matched", events[i].label))
        };

        match &self.check {
            Check::Ascending(indices) => {
                for pair in indices.windows(2) {
                    let (prev, next) = (observed(pair[0])?, observed(pair[1])?);
                    if next.sequence <= prev.sequence {
                        return Err(format!(
                            "`{}` (#{}) did not arrive after `{}` (#{})",
                            events[pair[1]].label,
                            next.sequence,
                            events[pair[0]].label,
                            prev.sequence
                        ));
                    }
                }
                Ok(())
            }
            Check::SharedIdentifier {
                parents,
                children,
                key,
            } => {
                let mut parent_id = None;
                for &i in parents {
                    if let Some(value) = observed(i)?.detail(&key.parent_field) {
                        parent_id = Some(value);
                        break;
                    }
                }
                let parent_id =
                    parent_id.ok_or_else(|| format!("no parent event carries `{}`", key.parent_field))?;
                for &i in children {
                    match observed(i)?.detail(&key.child_field) {
                        None => {
                            return Err(format!(
                                "`{}` has no `{}`",
                                events[i].label, key.child_field
                            ));
                        }
                        Some(value) if value != parent_id => {
                            return Err(format!(
                                "`{}` {}={} does not reference parent {}={}",
                                events[i].label, key.child_field, value, key.parent_field, parent_id
                            ));
                        }
                        Some(_) => {}
                    }
                }
                Ok(())
            }
            Check::Between {
                callee,
                loaded,
                completed,
            } => {
                let start = observed(*callee)?.sequence;
                let after = observed(*loaded)?.sequence;
                let before = observed(*completed)?.sequence;
                if after < start && start < before {
                    Ok(())
                } else {
                    Err(format!(
                        "`{}` (#{start}) is not between `{}` (#{after}) and `{}` (#{before})",
                        events[*callee].label, events[*loaded].label, events[*completed].label
                    ))
                }
            }
        }
    }
}
