//! event-expect: asynchronous expectation matching for labeled event streams
//!
//! A test declares which events it expects, labeled and in order, plus the
//! relations that must hold between them (ordering within a label prefix,
//! parent/child identity, nested-load timing, explicit sequences). The
//! engine then consumes the events the system under test actually emits and
//! resolves a single completion signal: satisfied, failed at the first
//! violation, or timed out.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  emit   ┌──────────┐ listener ┌──────────────────────┐
//! │ Driver /     │────────►│ EventHub │─────────►│ ExpectationSession   │
//! │ system under │         │ (source) │          │  ┌────────────────┐  │
//! │ test         │         └──────────┘          │  │ Expectation    │  │
//! └──────────────┘                               │  │ Engine         │  │
//!                                                │  └───────┬────────┘  │
//!                                                └──────────┼───────────┘
//!                                                           ▼
//!                                                   Completion → Outcome
//! ```
//!
//! # Example
//!
//! ```
//! use event_expect::{EngineConfig, EventHub, ExpectationSession, ExpectedEvent, Outcome, Relation};
//! use serde_json::json;
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let hub = EventHub::new();
//! let session = ExpectationSession::configure(
//!     &hub,
//!     vec![
//!         ExpectedEvent::new("a-begin", "onBeforeNavigate").with_detail("url", "a.html"),
//!         ExpectedEvent::new("a-commit", "onCommitted").with_detail("url", "a.html"),
//!     ],
//!     vec![Relation::explicit_sequence(["a-begin", "a-commit"])],
//!     EngineConfig::new().with_timeout(1_000),
//! )?;
//!
//! hub.emit_json("onBeforeNavigate", json!({"url": "a.html"}))?;
//! hub.emit_json("onCommitted", json!({"url": "a.html"}))?;
//!
//! assert_eq!(session.wait().await, Outcome::Satisfied);
//! # Ok::<(), event_expect::ExpectError>(())
//! # }).unwrap();
//! ```

#![warn(missing_docs)]

mod config;
mod engine;
mod event;
mod expectation;
mod outcome;
mod relation;
mod result;
mod script;
mod session;
mod source;

/// Suite runner for expectation cases
pub mod harness;

/// Log output helpers
pub mod logging;

/// Navigation-event presets
pub mod webnavigation;

pub use config::{EngineConfig, FieldPolicy, MatchPolicy, DEFAULT_TIMEOUT_MS};
pub use engine::{Completion, EngineState, ExpectationEngine};
pub use event::{details, Details, ExpectedEvent, FieldMatcher, ObservedEvent, PATTERN_KEY, WILDCARD};
pub use expectation::ExpectationSet;
pub use harness::{SuiteResults, TestCase, TestHarness, TestResult, TestSuite};
pub use outcome::{FailureKind, Outcome};
pub use relation::{ChildKey, LoadMarkers, Relation, ResolvedRelation};
pub use result::{ExpectError, ExpectResult};
pub use script::ExpectationScript;
pub use session::ExpectationSession;
pub use source::{listener, EventHub, EventSource, Listener, Subscription};
