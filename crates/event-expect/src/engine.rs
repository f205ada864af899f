//! Event Expectation Engine
//!
//! Matches a live stream of observed events against a static
//! [`ExpectationSet`] and reports the first violation.
//!
//! ```text
//! Unconfigured ──configure──► Configured ──submit──► Matching ─┬─► Satisfied
//!                                                      ▲   │   ├─► Failed
//!                                                      └───┘   └─► TimedOut
//! ```
//!
//! `submit` never suspends and never blocks, so it can be called from inside
//! an event-source callback. Termination is observed through a
//! single-resolution [`Completion`] future.

use crate::config::{EngineConfig, MatchPolicy};
use crate::event::{Details, ExpectedEvent, ObservedEvent};
use crate::expectation::ExpectationSet;
use crate::outcome::Outcome;
use crate::relation::Relation;
use crate::result::{ExpectError, ExpectResult};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use uuid::Uuid;

// =============================================================================
// ENGINE STATE
// =============================================================================

/// Lifecycle state of an engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineState {
    /// No expectation set yet
    Unconfigured,
    /// Expectation set installed, nothing observed
    Configured,
    /// At least one event accepted
    Matching,
    /// Every expectation met
    Satisfied,
    /// Mismatch, relation violation or cancellation
    Failed,
    /// Deadline passed
    TimedOut,
}

impl EngineState {
    /// Whether no further transitions are possible
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Satisfied | Self::Failed | Self::TimedOut)
    }

    /// Whether `submit` is allowed
    #[must_use]
    pub const fn accepts_events(&self) -> bool {
        matches!(self, Self::Configured | Self::Matching)
    }

    /// Get the state name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Unconfigured => "unconfigured",
            Self::Configured => "configured",
            Self::Matching => "matching",
            Self::Satisfied => "satisfied",
            Self::Failed => "failed",
            Self::TimedOut => "timed_out",
        }
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// COMPLETION
// =============================================================================

/// Single-resolution completion signal.
///
/// Resolves with the engine's terminal [`Outcome`]. If the engine is dropped
/// before reaching a terminal state, resolves with a cancellation failure.
#[derive(Debug)]
pub struct Completion {
    receiver: oneshot::Receiver<Outcome>,
}

impl Completion {
    /// Non-blocking check; `Some` once the engine has finished
    pub fn try_outcome(&mut self) -> Option<Outcome> {
        match self.receiver.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(dropped()),
        }
    }
}

fn dropped() -> Outcome {
    Outcome::cancelled("engine dropped before reaching a terminal state")
}

impl Future for Completion {
    type Output = Outcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map(|received| received.unwrap_or_else(|_| dropped()))
    }
}

// =============================================================================
// ENGINE
// =============================================================================

/// Expectation engine for one test case
#[derive(Debug)]
pub struct ExpectationEngine {
    id: Uuid,
    config: EngineConfig,
    state: EngineState,
    set: Option<ExpectationSet>,
    /// Match state, parallel to the set's events
    matched: Vec<Option<ObservedEvent>>,
    /// Relations already evaluated, parallel to the set's relations
    evaluated: Vec<bool>,
    next_sequence: u64,
    outcome: Option<Outcome>,
    notify: Option<oneshot::Sender<Outcome>>,
    completion: Option<Completion>,
}

impl Default for ExpectationEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl ExpectationEngine {
    /// Create an unconfigured engine
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        let (sender, receiver) = oneshot::channel();
        Self {
            id: Uuid::new_v4(),
            config,
            state: EngineState::Unconfigured,
            set: None,
            matched: Vec::new(),
            evaluated: Vec::new(),
            next_sequence: 0,
            outcome: None,
            notify: Some(sender),
            completion: Some(Completion { receiver }),
        }
    }

    /// Instance id, attached to every log line
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Engine options
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Current lifecycle state
    #[must_use]
    pub const fn state(&self) -> EngineState {
        self.state
    }

    /// Installed expectation set
    #[must_use]
    pub const fn expectations(&self) -> Option<&ExpectationSet> {
        self.set.as_ref()
    }

    /// Take the completion signal. Handed out once; later calls return `None`.
    pub fn completion(&mut self) -> Option<Completion> {
        self.completion.take()
    }

    /// Validate and install expected events and relations.
    ///
    /// # Errors
    ///
    /// Returns [`ExpectError::Configuration`] if the set is malformed or the
    /// engine is already configured.
    pub fn configure(
        &mut self,
        events: Vec<ExpectedEvent>,
        relations: Vec<Relation>,
    ) -> ExpectResult<()> {
        let set = ExpectationSet::new(events, relations)?;
        self.configure_set(set)
    }

    /// Install a pre-validated expectation set.
    ///
    /// # Errors
    ///
    /// Returns [`ExpectError::Configuration`] if the engine is already
    /// configured.
    pub fn configure_set(&mut self, set: ExpectationSet) -> ExpectResult<()> {
        if self.state != EngineState::Unconfigured {
            return Err(ExpectError::configuration(format!(
                "engine already {}",
                self.state
            )));
        }
        self.matched = vec![None; set.len()];
        self.evaluated = vec![false; set.relations().len()];
        debug!(
            engine = %self.id,
            events = set.len(),
            relations = set.relations().len(),
            "configured expectations"
        );
        self.set = Some(set);
        self.state = EngineState::Configured;
        Ok(())
    }

    /// Match one observed event.
    ///
    /// Assigns the next arrival sequence number, selects the candidate
    /// expectation per [`MatchPolicy`], records the match and evaluates every
    /// relation that just became fully matched. Any mismatch or violation is
    /// terminal. Returns the state after the transition.
    ///
    /// # Errors
    ///
    /// Returns [`ExpectError::NotAccepting`] if the engine is unconfigured or
    /// already terminal; the event is discarded.
    pub fn submit(&mut self, event_name: &str, details: Details) -> ExpectResult<EngineState> {
        if !self.state.accepts_events() {
            return Err(ExpectError::NotAccepting {
                state: self.state.to_string(),
            });
        }
        let Some(set) = self.set.as_ref() else {
            return Err(ExpectError::NotAccepting {
                state: self.state.to_string(),
            });
        };

        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.state = EngineState::Matching;
        let observed = ObservedEvent::new(event_name, details, sequence);

        let index = match select(set, &self.matched, &self.config, &observed) {
            Ok(index) => index,
            Err(outcome) => return Ok(self.finish(outcome)),
        };
        debug!(
            engine = %self.id,
            label = %set.events()[index].label,
            sequence,
            "matched event"
        );
        self.matched[index] = Some(observed);

        let mut violation = None;
        for (i, relation) in set.relations().iter().enumerate() {
            if self.evaluated[i]
                || !relation.references().contains(&index)
                || !relation.is_ready(&self.matched)
            {
                continue;
            }
            self.evaluated[i] = true;
            if let Err(reason) = relation.evaluate(set.events(), &self.matched) {
                violation = Some(Outcome::relation_violation(
                    relation.relation().to_string(),
                    reason,
                ));
                break;
            }
        }

        if let Some(outcome) = violation {
            return Ok(self.finish(outcome));
        }
        if self.matched.iter().all(Option::is_some) {
            return Ok(self.finish(Outcome::Satisfied));
        }
        Ok(self.state)
    }

    /// Every label matched and every relation held
    #[must_use]
    pub fn is_satisfied(&self) -> bool {
        self.state == EngineState::Satisfied
    }

    /// Terminal outcome; `None` while still matching. Stable once set.
    #[must_use]
    pub const fn result(&self) -> Option<&Outcome> {
        self.outcome.as_ref()
    }

    /// Labels with no observed event yet, in declaration order
    #[must_use]
    pub fn unmatched_labels(&self) -> Vec<String> {
        self.set.as_ref().map_or_else(Vec::new, |set| {
            set.events()
                .iter()
                .zip(&self.matched)
                .filter(|(_, observed)| observed.is_none())
                .map(|(event, _)| event.label.clone())
                .collect()
        })
    }

    /// Observed event matched to `label`
    #[must_use]
    pub fn observed(&self, label: &str) -> Option<&ObservedEvent> {
        let index = self.set.as_ref()?.position(label)?;
        self.matched.get(index)?.as_ref()
    }

    /// Number of matched labels
    #[must_use]
    pub fn matched_count(&self) -> usize {
        self.matched.iter().filter(|m| m.is_some()).count()
    }

    /// Give up waiting; terminal `TimedOut` unless already terminal
    pub fn time_out(&mut self) -> EngineState {
        let outcome = Outcome::TimedOut {
            unmatched: self.unmatched_labels(),
            timeout_ms: self.config.timeout_ms,
        };
        self.finish(outcome)
    }

    /// Tear down; terminal `Failed` (cancelled) unless already terminal
    pub fn cancel(&mut self, reason: &str) -> EngineState {
        self.finish(Outcome::cancelled(reason))
    }

    fn finish(&mut self, outcome: Outcome) -> EngineState {
        if self.state.is_terminal() {
            return self.state;
        }
        self.state = match outcome {
            Outcome::Satisfied => EngineState::Satisfied,
            Outcome::Failed { .. } => EngineState::Failed,
            Outcome::TimedOut { .. } => EngineState::TimedOut,
        };
        if outcome.is_satisfied() {
            info!(engine = %self.id, events = self.matched.len(), "expectations satisfied");
        } else {
            warn!(engine = %self.id, %outcome, "expectations not met");
        }
        if let Some(sender) = self.notify.take() {
            let _ = sender.send(outcome.clone());
        }
        self.outcome = Some(outcome);
        self.state
    }
}

/// Pick the expected event `observed` must match, or the mismatch it causes.
fn select(
    set: &ExpectationSet,
    matched: &[Option<ObservedEvent>],
    config: &EngineConfig,
    observed: &ObservedEvent,
) -> Result<usize, Outcome> {
    let events = set.events();
    let unmatched = move || (0..events.len()).filter(move |&i| matched[i].is_none());
    let Some(first) = unmatched().next() else {
        return Err(Outcome::mismatch(
            observed.event_name.clone(),
            "no expectations left to match",
        ));
    };

    let candidate = match config.match_policy {
        MatchPolicy::Sequential => {
            if events[first].event_name != observed.event_name {
                return Err(Outcome::mismatch(
                    events[first].label.clone(),
                    format!(
                        "expected {}, got {}",
                        events[first].event_name, observed.event_name
                    ),
                ));
            }
            first
        }
        MatchPolicy::ByEventName => unmatched()
            .find(|&i| events[i].event_name == observed.event_name)
            .ok_or_else(|| {
                Outcome::mismatch(
                    events[first].label.clone(),
                    format!(
                        "unexpected {}; no unmatched expectation has that name (next is {})",
                        observed.event_name, events[first].event_name
                    ),
                )
            })?,
    };

    events[candidate]
        .compare(&observed.details, config.field_policy)
        .map_err(|reason| {
            Outcome::mismatch(
                events[candidate].label.clone(),
                format!("{}: {reason}", observed.event_name),
            )
        })?;
    Ok(candidate)
}
