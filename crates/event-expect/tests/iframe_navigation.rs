//! Nested-frame navigation scenarios replayed through a hub and a session.
//!
//! Each scenario is a timeline of lifecycle events. The expected events are
//! declared in the same order the timeline delivers them, so same-named
//! events from different frames line up with their arrivals.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use event_expect::webnavigation::{
    is_iframe_of, is_loaded_by, navigation_order, FrameNavigation, ON_BEFORE_NAVIGATE,
    ON_COMMITTED, ON_COMPLETED, ON_DOM_CONTENT_LOADED, ON_ERROR_OCCURRED,
};
use event_expect::{
    EngineConfig, EventHub, ExpectError, ExpectationSession, ExpectedEvent, FailureKind, Outcome,
    Relation, SuiteResults, TestCase, TestHarness, TestSuite,
};
use serde_json::json;
use std::rc::Rc;

struct Frame {
    nav: FrameNavigation,
    frame_id: i64,
    parent_frame_id: i64,
    url: &'static str,
}

impl Frame {
    fn main(prefix: &str, url: &'static str) -> Rc<Self> {
        Rc::new(Self {
            nav: FrameNavigation::main_frame(prefix, url),
            frame_id: 0,
            parent_frame_id: -1,
            url,
        })
    }

    fn sub(prefix: &str, url: &'static str, frame_id: i64, parent_frame_id: i64) -> Rc<Self> {
        Rc::new(Self {
            nav: FrameNavigation::sub_frame(prefix, url, frame_id, parent_frame_id),
            frame_id,
            parent_frame_id,
            url,
        })
    }

    fn emit(&self, hub: &EventHub, event_name: &str, time_stamp: usize) {
        let mut details = json!({
            "frameId": self.frame_id,
            "parentFrameId": self.parent_frame_id,
            "url": self.url,
            "processId": 7,
            "timeStamp": 1_000.5 + time_stamp as f64,
        });
        if event_name != ON_BEFORE_NAVIGATE {
            details["documentId"] = json!(format!("doc-{}", self.frame_id));
        }
        hub.emit_json(event_name, details).unwrap();
    }
}

type Timeline = Vec<(Rc<Frame>, &'static str)>;

fn declared(timeline: &[(Rc<Frame>, &'static str)]) -> Vec<ExpectedEvent> {
    timeline
        .iter()
        .map(|(frame, name)| {
            let label = frame.nav.label(name);
            frame
                .nav
                .events()
                .into_iter()
                .find(|e| e.label == label)
                .unwrap()
        })
        .collect()
}

fn replay(hub: &EventHub, timeline: &[(Rc<Frame>, &'static str)]) {
    for (time_stamp, (frame, name)) in timeline.iter().enumerate() {
        frame.emit(hub, name, time_stamp);
    }
}

/// a.html embeds b.html; the subframe finishes before its parent
fn iframe_timeline() -> Timeline {
    let a = Frame::main("a-", "a.html");
    let b = Frame::sub("b-", "b.html", 1, 0);
    vec![
        (a.clone(), ON_BEFORE_NAVIGATE),
        (a.clone(), ON_COMMITTED),
        (b.clone(), ON_BEFORE_NAVIGATE),
        (b.clone(), ON_COMMITTED),
        (b.clone(), ON_DOM_CONTENT_LOADED),
        (a.clone(), ON_DOM_CONTENT_LOADED),
        (b, ON_COMPLETED),
        (a, ON_COMPLETED),
    ]
}

/// a.html finishes parsing, then its script adds an iframe to c.html
fn scripted_iframe_timeline(c_starts_early: bool) -> Timeline {
    let a = Frame::main("a-", "a.html");
    let c = Frame::sub("c-", "c.html", 1, 0);
    let mut timeline = vec![(a.clone(), ON_BEFORE_NAVIGATE), (a.clone(), ON_COMMITTED)];
    if c_starts_early {
        timeline.push((c.clone(), ON_BEFORE_NAVIGATE));
        timeline.push((a.clone(), ON_DOM_CONTENT_LOADED));
    } else {
        timeline.push((a.clone(), ON_DOM_CONTENT_LOADED));
        timeline.push((c.clone(), ON_BEFORE_NAVIGATE));
    }
    timeline.extend([
        (c.clone(), ON_COMMITTED),
        (c.clone(), ON_DOM_CONTENT_LOADED),
        (c, ON_COMPLETED),
        (a, ON_COMPLETED),
    ]);
    timeline
}

fn iframe_relations() -> Vec<Relation> {
    vec![
        navigation_order("a-"),
        navigation_order("b-"),
        is_iframe_of("b-", "a-"),
    ]
}

fn scripted_iframe_relations() -> Vec<Relation> {
    vec![
        navigation_order("a-"),
        navigation_order("c-"),
        is_iframe_of("c-", "a-"),
        is_loaded_by("c-", "a-"),
    ]
}

fn start(
    hub: &EventHub,
    timeline: &[(Rc<Frame>, &'static str)],
    relations: Vec<Relation>,
) -> ExpectationSession {
    ExpectationSession::configure(
        hub,
        declared(timeline),
        relations,
        EngineConfig::new().with_timeout(2_000),
    )
    .unwrap()
}

#[tokio::test]
async fn test_iframe_navigation_is_satisfied() {
    event_expect::logging::init_for_tests();
    let hub = EventHub::new();
    let timeline = iframe_timeline();
    let session = start(&hub, &timeline, iframe_relations());

    replay(&hub, &timeline);

    assert_eq!(session.wait().await, Outcome::Satisfied);
    assert_eq!(hub.listener_count(), 0);
}

#[tokio::test]
async fn test_multiple_iframes_with_explicit_sequence() {
    let a = Frame::main("a-", "a.html");
    let b = Frame::sub("b-", "b.html", 1, 0);
    let c = Frame::sub("c-", "c.html", 2, 0);
    let mut timeline: Timeline = vec![(a.clone(), ON_BEFORE_NAVIGATE), (a.clone(), ON_COMMITTED)];
    for child in [&b, &c] {
        for name in [ON_BEFORE_NAVIGATE, ON_COMMITTED, ON_DOM_CONTENT_LOADED, ON_COMPLETED] {
            timeline.push((Rc::clone(child), name));
        }
    }
    timeline.push((a.clone(), ON_DOM_CONTENT_LOADED));
    timeline.push((a, ON_COMPLETED));

    let relations = vec![
        navigation_order("a-"),
        navigation_order("b-"),
        navigation_order("c-"),
        is_iframe_of("b-", "a-"),
        is_iframe_of("c-", "a-"),
        Relation::explicit_sequence(["b-onCompleted", "c-onBeforeNavigate"]),
    ];

    let hub = EventHub::new();
    let session = start(&hub, &timeline, relations);
    replay(&hub, &timeline);
    assert_eq!(session.wait().await, Outcome::Satisfied);
}

#[tokio::test]
async fn test_script_inserted_iframe_is_loaded_by_parent() {
    let hub = EventHub::new();
    let timeline = scripted_iframe_timeline(false);
    let session = start(&hub, &timeline, scripted_iframe_relations());
    replay(&hub, &timeline);
    assert_eq!(session.wait().await, Outcome::Satisfied);
}

#[tokio::test]
async fn test_iframe_starting_before_parent_dom_is_violation() {
    let hub = EventHub::new();
    let timeline = scripted_iframe_timeline(true);
    let session = start(&hub, &timeline, scripted_iframe_relations());
    replay(&hub, &timeline);

    let outcome = session.wait().await;
    let Outcome::Failed {
        kind,
        relation,
        reason,
        ..
    } = &outcome
    else {
        panic!("expected a failure, got {outcome}");
    };
    assert_eq!(*kind, FailureKind::RelationViolation);
    assert_eq!(relation.as_deref(), Some(r#"loaded_by("c-", "a-")"#));
    assert!(reason.contains("c-onBeforeNavigate"), "{reason}");

    let err = outcome.into_result().unwrap_err();
    assert!(matches!(err, ExpectError::RelationViolation { .. }));
}

#[tokio::test]
async fn test_wrong_parent_frame_is_mismatch() {
    let a = Frame::main("a-", "a.html");
    let b = Frame::sub("b-", "b.html", 1, 0);
    let stray = Frame::sub("b-", "b.html", 1, 5);
    let timeline: Timeline = vec![
        (a.clone(), ON_BEFORE_NAVIGATE),
        (a.clone(), ON_COMMITTED),
        (a.clone(), ON_DOM_CONTENT_LOADED),
        (a, ON_COMPLETED),
        (b, ON_BEFORE_NAVIGATE),
    ];
    let events = declared(&timeline);

    let hub = EventHub::new();
    let session = ExpectationSession::configure(
        &hub,
        events,
        vec![is_iframe_of("b-", "a-")],
        EngineConfig::new().with_timeout(2_000),
    )
    .unwrap();

    for (time_stamp, (frame, name)) in timeline.iter().take(4).enumerate() {
        frame.emit(&hub, name, time_stamp);
    }
    // The declared template pins parentFrameId, so the stray frame is a
    // detail mismatch before any relation runs.
    stray.emit(&hub, ON_BEFORE_NAVIGATE, 4);

    let outcome = session.wait().await;
    assert!(matches!(
        outcome,
        Outcome::Failed {
            kind: FailureKind::Mismatch,
            ref label,
            ..
        } if label.as_deref() == Some("b-onBeforeNavigate")
    ));
}

#[tokio::test(start_paused = true)]
async fn test_parent_never_completes_times_out() {
    let hub = EventHub::new();
    let timeline = iframe_timeline();
    let session = start(&hub, &timeline, iframe_relations());

    replay(&hub, &timeline[..timeline.len() - 1]);

    assert_eq!(
        session.wait().await,
        Outcome::TimedOut {
            unmatched: vec!["a-onCompleted".to_string()],
            timeout_ms: 2_000,
        }
    );
    assert_eq!(hub.listener_count(), 0);
}

fn case(name: &str, timeline: Timeline, relations: Vec<Relation>) -> TestCase {
    let events = declared(&timeline);
    TestCase::new(name, events, relations)
        .with_timeout(500)
        .with_driver(move |hub| replay(hub, &timeline))
}

#[tokio::test]
async fn test_navigation_suite() {
    let mut suite = TestSuite::new("webnavigation");
    suite.add_test(case("iframe", iframe_timeline(), iframe_relations()));
    suite.add_test(case(
        "iframe loaded by script",
        scripted_iframe_timeline(false),
        scripted_iframe_relations(),
    ));
    suite.add_test(case(
        "iframe started too early",
        scripted_iframe_timeline(true),
        scripted_iframe_relations(),
    ));

    let results: SuiteResults = TestHarness::new().run(&suite).await;
    assert_eq!(results.total(), 3);
    assert_eq!(results.passed_count(), 2);
    let failures = results.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].name, "iframe started too early");
    assert!(failures[0]
        .error
        .as_deref()
        .is_some_and(|e| e.contains("loaded_by")));
}

fn browser_frame(
    prefix: &str,
    url: &str,
    frame_id: i64,
    parent_frame_id: i64,
) -> FrameNavigation {
    let (nav, frame_type, transition) = if parent_frame_id < 0 {
        (FrameNavigation::main_frame(prefix, url), "outermost_frame", "link")
    } else {
        (
            FrameNavigation::sub_frame(prefix, url, frame_id, parent_frame_id)
                .with_detail("parentDocumentId", 1),
            "sub_frame",
            "auto_subframe",
        )
    };
    nav.with_tab(0)
        .with_detail("documentLifecycle", "active")
        .with_detail("frameType", frame_type)
        .with_event_detail(ON_COMMITTED, "transitionType", transition)
        .with_event_detail(ON_COMMITTED, "transitionQualifiers", json!([]))
}

fn browser_payload(
    event_name: &str,
    url: &str,
    frame_id: i64,
    parent_frame_id: i64,
) -> serde_json::Value {
    let committed = event_name != ON_BEFORE_NAVIGATE;
    let mut details = json!({
        "documentLifecycle": "active",
        "frameId": frame_id,
        "frameType": if parent_frame_id < 0 { "outermost_frame" } else { "sub_frame" },
        "parentFrameId": parent_frame_id,
        "processId": if committed { 0 } else { -1 },
        "tabId": 0,
        "timeStamp": 1_712_345_678.25,
        "url": url,
    });
    if committed {
        details["documentId"] = json!(frame_id + 1);
    }
    if parent_frame_id >= 0 {
        details["parentDocumentId"] = json!(1);
    }
    if event_name == ON_COMMITTED {
        details["transitionQualifiers"] = json!([]);
        details["transitionType"] = json!(if parent_frame_id < 0 { "link" } else { "auto_subframe" });
    }
    details
}

#[tokio::test]
async fn test_browser_shaped_payloads_match_presets() {
    let a = browser_frame("a-", "a.html", 0, -1);
    let b = browser_frame("b-", "b.html", 1, 0);
    let arrivals = [
        ("a-", ON_BEFORE_NAVIGATE),
        ("a-", ON_COMMITTED),
        ("b-", ON_BEFORE_NAVIGATE),
        ("b-", ON_COMMITTED),
        ("b-", ON_DOM_CONTENT_LOADED),
        ("a-", ON_DOM_CONTENT_LOADED),
        ("b-", ON_COMPLETED),
        ("a-", ON_COMPLETED),
    ];
    let frame = |prefix: &str| {
        if prefix == "a-" {
            (&a, "a.html", 0, -1)
        } else {
            (&b, "b.html", 1, 0)
        }
    };

    let events = arrivals
        .iter()
        .map(|(prefix, name)| {
            let (nav, ..) = frame(*prefix);
            let label = nav.label(name);
            nav.events().into_iter().find(|e| e.label == label).unwrap()
        })
        .collect();

    let hub = EventHub::new();
    let session = ExpectationSession::configure(
        &hub,
        events,
        iframe_relations(),
        EngineConfig::new().with_timeout(2_000),
    )
    .unwrap();

    for (prefix, name) in arrivals {
        let (_, url, frame_id, parent_frame_id) = frame(prefix);
        hub.emit_json(name, browser_payload(name, url, frame_id, parent_frame_id))
            .unwrap();
    }

    assert_eq!(session.wait().await, Outcome::Satisfied);
}

#[tokio::test]
async fn test_transition_type_checked_on_commit_only() {
    let nav = browser_frame("a-", "a.html", 0, -1);
    let hub = EventHub::new();
    let session = ExpectationSession::configure(
        &hub,
        nav.events(),
        vec![navigation_order("a-")],
        EngineConfig::new().with_timeout(2_000),
    )
    .unwrap();

    hub.emit_json(ON_BEFORE_NAVIGATE, browser_payload(ON_BEFORE_NAVIGATE, "a.html", 0, -1))
        .unwrap();
    let mut commit = browser_payload(ON_COMMITTED, "a.html", 0, -1);
    commit["transitionType"] = json!("typed");
    hub.emit_json(ON_COMMITTED, commit).unwrap();

    let outcome = session.wait().await;
    assert!(matches!(
        outcome,
        Outcome::Failed {
            kind: FailureKind::Mismatch,
            ref label,
            ref reason,
            ..
        } if label.as_deref() == Some("a-onCommitted") && reason.contains("transitionType")
    ));
}

#[tokio::test]
async fn test_failed_subframe_navigation() {
    let a = FrameNavigation::main_frame("a-", "a.html");
    let d = FrameNavigation::sub_frame("d-", "d.html", 1, 0);
    let mut events = a.events();
    events.extend(d.failure_events("net::ERR_ABORTED"));

    let hub = EventHub::new();
    let session = ExpectationSession::configure(
        &hub,
        events,
        vec![navigation_order("d-"), is_iframe_of("d-", "a-")],
        EngineConfig::new().with_timeout(2_000),
    )
    .unwrap();

    let a_frame = Frame::main("a-", "a.html");
    for (time_stamp, name) in [ON_BEFORE_NAVIGATE, ON_COMMITTED, ON_DOM_CONTENT_LOADED, ON_COMPLETED]
        .into_iter()
        .enumerate()
    {
        a_frame.emit(&hub, name, time_stamp);
    }
    Frame::sub("d-", "d.html", 1, 0).emit(&hub, ON_BEFORE_NAVIGATE, 4);
    hub.emit_json(
        ON_ERROR_OCCURRED,
        json!({
            "error": "net::ERR_ABORTED",
            "frameId": 1,
            "parentFrameId": 0,
            "processId": 7,
            "timeStamp": 1_005.5,
            "url": "d.html",
        }),
    )
    .unwrap();

    assert_eq!(session.wait().await, Outcome::Satisfied);
}
