//! Navigation-event presets.
//!
//! Builders for the four-event lifecycle a frame goes through when it
//! navigates (`onBeforeNavigate`, `onCommitted`, `onDOMContentLoaded`,
//! `onCompleted`), labeled `<prefix><eventName>` so that the prefix-based
//! relations can group them.

use crate::event::{ExpectedEvent, FieldMatcher};
use crate::relation::Relation;
use serde_json::Value;

/// Navigation is about to start
pub const ON_BEFORE_NAVIGATE: &str = "onBeforeNavigate";
/// Navigation committed
pub const ON_COMMITTED: &str = "onCommitted";
/// Document finished parsing
pub const ON_DOM_CONTENT_LOADED: &str = "onDOMContentLoaded";
/// Document and its resources finished loading
pub const ON_COMPLETED: &str = "onCompleted";
/// Navigation failed
pub const ON_ERROR_OCCURRED: &str = "onErrorOccurred";

/// Lifecycle events of a successful navigation, in arrival order
pub const LIFECYCLE: [&str; 4] = [
    ON_BEFORE_NAVIGATE,
    ON_COMMITTED,
    ON_DOM_CONTENT_LOADED,
    ON_COMPLETED,
];

/// Fields whose values differ between runs
const VOLATILE_FIELDS: [&str; 2] = ["timeStamp", "processId"];

/// Navigation of one frame, expanded into labeled expected events
#[derive(Debug, Clone)]
pub struct FrameNavigation {
    prefix: String,
    url: String,
    frame_id: i64,
    parent_frame_id: i64,
    tab_id: Option<i64>,
    /// Extra fields; `None` applies to every lifecycle event
    extra: Vec<(Option<String>, String, FieldMatcher)>,
}

impl FrameNavigation {
    /// Top-level frame navigation to `url`
    #[must_use]
    pub fn main_frame(prefix: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            url: url.into(),
            frame_id: 0,
            parent_frame_id: -1,
            tab_id: None,
            extra: Vec::new(),
        }
    }

    /// Subframe navigation to `url` inside `parent_frame_id`
    #[must_use]
    pub fn sub_frame(
        prefix: impl Into<String>,
        url: impl Into<String>,
        frame_id: i64,
        parent_frame_id: i64,
    ) -> Self {
        Self {
            frame_id,
            parent_frame_id,
            ..Self::main_frame(prefix, url)
        }
    }

    /// Also require `tabId`
    #[must_use]
    pub const fn with_tab(mut self, tab_id: i64) -> Self {
        self.tab_id = Some(tab_id);
        self
    }

    /// Require an extra field on every lifecycle event
    #[must_use]
    pub fn with_detail(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra
            .push((None, field.into(), FieldMatcher::exact(value)));
        self
    }

    /// Require an extra field on one lifecycle event only, e.g.
    /// `transitionType` on `onCommitted`
    #[must_use]
    pub fn with_event_detail(
        self,
        event_name: &str,
        field: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        self.with_event_matcher(event_name, field, FieldMatcher::exact(value))
    }

    /// Match an extra field of one lifecycle event with `matcher`
    #[must_use]
    pub fn with_event_matcher(
        mut self,
        event_name: &str,
        field: impl Into<String>,
        matcher: FieldMatcher,
    ) -> Self {
        self.extra
            .push((Some(event_name.to_string()), field.into(), matcher));
        self
    }

    /// Label of one lifecycle event of this frame
    #[must_use]
    pub fn label(&self, event_name: &str) -> String {
        format!("{}{event_name}", self.prefix)
    }

    /// Expand into the four lifecycle expectations
    #[must_use]
    pub fn events(&self) -> Vec<ExpectedEvent> {
        LIFECYCLE.iter().map(|name| self.event(name)).collect()
    }

    /// Expand into a navigation that fails: `onBeforeNavigate` followed by
    /// `onErrorOccurred` carrying `error`
    #[must_use]
    pub fn failure_events(&self, error: &str) -> Vec<ExpectedEvent> {
        vec![
            self.event(ON_BEFORE_NAVIGATE),
            self.event(ON_ERROR_OCCURRED).with_detail("error", error),
        ]
    }

    fn event(&self, name: &str) -> ExpectedEvent {
        let mut event = ExpectedEvent::new(self.label(name), name)
            .with_detail("frameId", self.frame_id)
            .with_detail("parentFrameId", self.parent_frame_id)
            .with_detail("url", self.url.as_str());
        if let Some(tab_id) = self.tab_id {
            event = event.with_detail("tabId", tab_id);
        }
        for field in VOLATILE_FIELDS {
            event = event.with_any(field);
        }
        if name != ON_BEFORE_NAVIGATE && name != ON_ERROR_OCCURRED {
            event = event.with_any("documentId");
        }
        for (only, field, matcher) in &self.extra {
            if only.as_deref().map_or(true, |only| only == name) {
                event = event.with_matcher(field.clone(), matcher.clone());
            }
        }
        event
    }
}

/// All lifecycle events of `prefix` arrive in order
#[must_use]
pub fn navigation_order(prefix: &str) -> Relation {
    Relation::ordered_by_label_prefix(prefix)
}

/// `child` navigations happen in a subframe of `parent`
#[must_use]
pub fn is_iframe_of(child: &str, parent: &str) -> Relation {
    Relation::is_child_of(child, parent)
}

/// `target` was started by `source` after its DOM was loaded
#[must_use]
pub fn is_loaded_by(target: &str, source: &str) -> Relation {
    Relation::loaded_by(target, source)
}
