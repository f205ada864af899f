//! Test harness for running suites of expectation cases.
//!
//! Each [`TestCase`] is an explicit configuration value: expected events,
//! relations, engine options and a driver that makes the system under test
//! emit events into a fresh [`EventHub`].

use crate::config::EngineConfig;
use crate::event::ExpectedEvent;
use crate::outcome::Outcome;
use crate::relation::Relation;
use crate::result::ExpectResult;
use crate::script::ExpectationScript;
use crate::session::ExpectationSession;
use crate::source::EventHub;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::info;

/// Triggers the system under test for one case
pub type Driver = Box<dyn Fn(&EventHub)>;

/// A test suite containing multiple cases
#[derive(Debug, Default)]
pub struct TestSuite {
    /// Suite name
    pub name: String,
    /// Cases in this suite
    pub tests: Vec<TestCase>,
}

impl TestSuite {
    /// Create a new test suite
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tests: Vec::new(),
        }
    }

    /// Add a test case
    pub fn add_test(&mut self, test: TestCase) {
        self.tests.push(test);
    }

    /// Get the number of tests
    #[must_use]
    pub fn test_count(&self) -> usize {
        self.tests.len()
    }
}

/// A single expectation case
pub struct TestCase {
    /// Test name
    pub name: String,
    /// Expected events
    pub events: Vec<ExpectedEvent>,
    /// Relations between labels
    pub relations: Vec<Relation>,
    /// Engine options
    pub config: EngineConfig,
    driver: Driver,
}

impl fmt::Debug for TestCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestCase")
            .field("name", &self.name)
            .field("events", &self.events.len())
            .field("relations", &self.relations.len())
            .field("config", &self.config)
            .finish()
    }
}

impl TestCase {
    /// Create a case with a no-op driver
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        events: Vec<ExpectedEvent>,
        relations: Vec<Relation>,
    ) -> Self {
        Self {
            name: name.into(),
            events,
            relations,
            config: EngineConfig::default(),
            driver: Box::new(|_| {}),
        }
    }

    /// Create a case from a loaded script
    #[must_use]
    pub fn from_script(script: ExpectationScript) -> Self {
        Self {
            config: script.config,
            ..Self::new(script.name, script.events, script.relations)
        }
    }

    /// Set engine options
    #[must_use]
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Set timeout
    #[must_use]
    pub fn with_timeout(mut self, ms: u64) -> Self {
        self.config.timeout_ms = ms;
        self
    }

    /// Set the driver
    #[must_use]
    pub fn with_driver(mut self, driver: impl Fn(&EventHub) + 'static) -> Self {
        self.driver = Box::new(driver);
        self
    }

    /// Run this case against a fresh hub
    pub async fn run(&self) -> TestResult {
        let start = Instant::now();
        let result = match self.start() {
            Ok((hub, session)) => {
                (self.driver)(&hub);
                TestResult::from_outcome(&self.name, session.wait().await)
            }
            Err(err) => TestResult::fail(&self.name, err.to_string()),
        };
        result.with_duration(start.elapsed())
    }

    fn start(&self) -> ExpectResult<(EventHub, ExpectationSession)> {
        let hub = EventHub::new();
        let session = ExpectationSession::configure(
            &hub,
            self.events.clone(),
            self.relations.clone(),
            self.config.clone(),
        )?;
        Ok((hub, session))
    }
}

/// Result of running a single case
#[derive(Debug, Clone)]
pub struct TestResult {
    /// Test name
    pub name: String,
    /// Whether the case was satisfied
    pub passed: bool,
    /// Error message if failed
    pub error: Option<String>,
    /// Engine outcome; `None` if the case never started
    pub outcome: Option<Outcome>,
    /// Test duration
    pub duration: Duration,
}

impl TestResult {
    /// Create a passing test result
    #[must_use]
    pub fn pass(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: true,
            error: None,
            outcome: Some(Outcome::Satisfied),
            duration: Duration::ZERO,
        }
    }

    /// Create a failing test result
    #[must_use]
    pub fn fail(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: false,
            error: Some(error.into()),
            outcome: None,
            duration: Duration::ZERO,
        }
    }

    /// Create a result from an engine outcome
    #[must_use]
    pub fn from_outcome(name: impl Into<String>, outcome: Outcome) -> Self {
        if outcome.is_satisfied() {
            return Self::pass(name);
        }
        Self {
            error: Some(outcome.to_string()),
            outcome: Some(outcome),
            ..Self::fail(name, String::new())
        }
    }

    /// Set duration
    #[must_use]
    pub const fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }
}

/// Results from running a test suite
#[derive(Debug, Clone)]
pub struct SuiteResults {
    /// Suite name
    pub suite_name: String,
    /// Individual test results
    pub results: Vec<TestResult>,
    /// Total duration
    pub duration: Duration,
}

impl SuiteResults {
    /// Check if all tests passed
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.results.iter().all(|r| r.passed)
    }

    /// Count passed tests
    #[must_use]
    pub fn passed_count(&self) -> usize {
        self.results.iter().filter(|r| r.passed).count()
    }

    /// Count failed tests
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.results.iter().filter(|r| !r.passed).count()
    }

    /// Get total test count
    #[must_use]
    pub fn total(&self) -> usize {
        self.results.len()
    }

    /// Get failed tests
    #[must_use]
    pub fn failures(&self) -> Vec<&TestResult> {
        self.results.iter().filter(|r| !r.passed).collect()
    }
}

/// Test harness for running suites
#[derive(Debug, Default)]
pub struct TestHarness {
    /// Whether to stop on first failure
    pub fail_fast: bool,
}

impl TestHarness {
    /// Create a new test harness
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable fail-fast mode
    #[must_use]
    pub const fn with_fail_fast(mut self) -> Self {
        self.fail_fast = true;
        self
    }

    /// Run a test suite, one case at a time
    pub async fn run(&self, suite: &TestSuite) -> SuiteResults {
        let start = Instant::now();
        let mut results = Vec::with_capacity(suite.tests.len());

        for test in &suite.tests {
            let result = test.run().await;
            let stop = self.fail_fast && !result.passed;
            results.push(result);
            if stop {
                break;
            }
        }

        let suite_results = SuiteResults {
            suite_name: suite.name.clone(),
            results,
            duration: start.elapsed(),
        };
        info!(
            suite = %suite_results.suite_name,
            passed = suite_results.passed_count(),
            failed = suite_results.failed_count(),
            "suite finished"
        );
        suite_results
    }
}
