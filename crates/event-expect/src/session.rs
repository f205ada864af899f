//! Expectation sessions: an engine bound to an event source.
//!
//! A session subscribes to the source when it starts and releases the
//! subscription as soon as the engine reaches a terminal state, when the
//! wait times out, on [`ExpectationSession::cancel`], or when the session is
//! dropped.

use crate::config::EngineConfig;
use crate::engine::{Completion, EngineState, ExpectationEngine};
use crate::event::{Details, ExpectedEvent};
use crate::expectation::ExpectationSet;
use crate::outcome::Outcome;
use crate::relation::Relation;
use crate::result::ExpectResult;
use crate::source::{EventSource, Listener, Subscription};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;
use tracing::{debug, warn};

struct SessionCore {
    engine: ExpectationEngine,
    subscription: Option<Subscription>,
}

impl SessionCore {
    /// Submit and hand back the subscription if it must be released.
    ///
    /// The caller drops the returned subscription after releasing its borrow
    /// of the core, since releasing touches the source.
    fn submit(&mut self, event_name: &str, details: Details) -> (ExpectResult<EngineState>, Option<Subscription>) {
        let result = self.engine.submit(event_name, details);
        let release = match &result {
            Ok(state) if state.is_terminal() => self.subscription.take(),
            _ => None,
        };
        (result, release)
    }
}

/// One test case's engine plus its event-source subscription
pub struct ExpectationSession {
    core: Rc<RefCell<SessionCore>>,
    completion: Option<Completion>,
    timeout: Duration,
}

impl std::fmt::Debug for ExpectationSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let core = self.core.borrow();
        f.debug_struct("ExpectationSession")
            .field("engine", &core.engine.id())
            .field("state", &core.engine.state())
            .field("subscribed", &core.subscription.is_some())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ExpectationSession {
    /// Validate `events` and `relations`, then subscribe to `source`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for a malformed set, or the source's
    /// error if the subscription fails.
    pub fn configure<S>(
        source: &S,
        events: Vec<ExpectedEvent>,
        relations: Vec<Relation>,
        config: EngineConfig,
    ) -> ExpectResult<Self>
    where
        S: EventSource + ?Sized,
    {
        let set = ExpectationSet::new(events, relations)?;
        Self::start(source, set, config)
    }

    /// Subscribe an engine for `set` to `source`.
    ///
    /// # Errors
    ///
    /// Returns the source's error if the subscription fails.
    pub fn start<S>(source: &S, set: ExpectationSet, config: EngineConfig) -> ExpectResult<Self>
    where
        S: EventSource + ?Sized,
    {
        let timeout = config.timeout();
        let mut engine = ExpectationEngine::new(config);
        engine.configure_set(set)?;
        let completion = engine.completion();
        let core = Rc::new(RefCell::new(SessionCore {
            engine,
            subscription: None,
        }));

        let weak = Rc::downgrade(&core);
        let listener: Listener = Rc::new(RefCell::new(move |event_name: &str, details: &Details| {
            let Some(core) = weak.upgrade() else {
                return;
            };
            let Ok(mut guard) = core.try_borrow_mut() else {
                warn!(event = event_name, "session busy; event dropped");
                return;
            };
            let (result, release) = guard.submit(event_name, details.clone());
            drop(guard);
            if let Err(err) = result {
                debug!(event = event_name, %err, "event not accepted");
            }
            drop(release);
        }));

        let subscription = source.add_listener(listener)?;
        core.borrow_mut().subscription = Some(subscription);

        Ok(Self {
            core,
            completion,
            timeout,
        })
    }

    /// Submit an event directly, bypassing the source.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ExpectError::NotAccepting`] once the session has
    /// finished.
    pub fn submit(&self, event_name: &str, details: Details) -> ExpectResult<EngineState> {
        let (result, release) = self.core.borrow_mut().submit(event_name, details);
        drop(release);
        result
    }

    /// Current engine state
    #[must_use]
    pub fn state(&self) -> EngineState {
        self.core.borrow().engine.state()
    }

    /// Terminal outcome, if reached
    #[must_use]
    pub fn result(&self) -> Option<Outcome> {
        self.core.borrow().engine.result().cloned()
    }

    /// Labels still waiting for an event
    #[must_use]
    pub fn unmatched_labels(&self) -> Vec<String> {
        self.core.borrow().engine.unmatched_labels()
    }

    /// Whether the source subscription is still held
    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.core.borrow().subscription.is_some()
    }

    /// Configured timeout
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Await the terminal outcome, giving up after the configured timeout.
    pub async fn wait(mut self) -> Outcome {
        let Some(completion) = self.completion.take() else {
            return self.finish_now(ExpectationEngine::time_out);
        };
        match tokio::time::timeout(self.timeout, completion).await {
            Ok(outcome) => outcome,
            Err(_) => self.finish_now(ExpectationEngine::time_out),
        }
    }

    /// Tear down: stop accepting events and release the subscription
    pub fn cancel(&self, reason: &str) -> EngineState {
        let (state, release) = {
            let mut core = self.core.borrow_mut();
            let state = core.engine.cancel(reason);
            (state, core.subscription.take())
        };
        drop(release);
        state
    }

    fn finish_now(&self, finish: fn(&mut ExpectationEngine) -> EngineState) -> Outcome {
        let (outcome, release) = {
            let mut core = self.core.borrow_mut();
            let _ = finish(&mut core.engine);
            let outcome = core
                .engine
                .result()
                .cloned()
                .unwrap_or_else(|| Outcome::cancelled("engine did not finish"));
            (outcome, core.subscription.take())
        };
        drop(release);
        outcome
    }
}

impl Drop for ExpectationSession {
    fn drop(&mut self) {
        let release = match self.core.try_borrow_mut() {
            Ok(mut core) => {
                let _ = core.engine.cancel("session dropped");
                core.subscription.take()
            }
            Err(_) => None,
        };
        drop(release);
    }
}
