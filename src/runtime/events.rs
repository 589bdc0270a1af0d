//! Event filtering

use super::RuntimeEvent;

/// Event statuses that trigger a reconciliation pass by default
pub const DEFAULT_EVENTS: &[&str] = &["start", "stop", "die", "health_status: .*"];

const WILDCARD_SUFFIX: &str = ": .*";

/// Selects the container events that should trigger work
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventFilter {
    names: Vec<String>,
}

impl EventFilter {
    /// Build a filter from `--events` values
    ///
    /// A name ending in `: .*` matches every status with that prefix, so
    /// `health_status: .*` covers `health_status: healthy`.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Container event whose status is watched
    pub fn matches(&self, event: &RuntimeEvent) -> bool {
        event.kind == "container" && self.matches_status(&event.status)
    }

    pub fn matches_status(&self, status: &str) -> bool {
        self.names.iter().any(|name| match name.strip_suffix(WILDCARD_SUFFIX) {
            Some(prefix) => status
                .strip_prefix(prefix)
                .map_or(false, |rest| rest.starts_with(": ")),
            None => name == status,
        })
    }
}

impl Default for EventFilter {
    fn default() -> Self {
        Self::new(DEFAULT_EVENTS.iter().copied())
    }
}
