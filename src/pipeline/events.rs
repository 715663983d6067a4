//! Event logging for the removal pipeline.
//!
//! Every structural change made by a pass is recorded as an [`Event`] in an [`EventLog`],
//! next to the `log` output. The log is the audit trail of a run: it can be inspected,
//! summarized or serialized by the caller, or simply ignored.
//!
//! # Example
//!
//! ```rust
//! use coderemover::pipeline::events::{EventKind, EventLog};
//!
//! let mut log = EventLog::new();
//! log.record(EventKind::FieldRemoved)
//!     .class("demo/Config")
//!     .member("debug:Z")
//!     .message("Removed field: demo.Config.debug");
//! log.info("Decision pass complete");
//!
//! assert_eq!(log.count(EventKind::FieldRemoved), 1);
//! assert_eq!(log.transformation_count(), 1);
//! ```

use std::{collections::HashMap, fmt};

/// Categories of events that can be logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    /// A marked class was removed.
    ClassRemoved,
    /// A marked interface was removed.
    InterfaceRemoved,
    /// A marked annotation type, enum or module descriptor was removed.
    TypeRemoved,
    /// A nested class was removed together with its enclosing class.
    NestedClassRemoved,
    /// A class entry kept as a resource was dropped because its class was removed.
    EntryDropped,
    /// A `remove=false` marker was stripped.
    MarkerStripped,
    /// A removed interface was dropped from an interface list.
    InterfaceDropped,
    /// A superclass pointer was moved to the nearest surviving ancestor.
    SuperclassChanged,
    /// Instruction operands naming a removed ancestor were retargeted.
    OperandsRetargeted,
    /// A marked field was removed.
    FieldRemoved,
    /// A marked method was removed.
    MethodRemoved,
    /// A store to a removed field was deleted together with its operands.
    StoreDeleted,
    /// A store to a removed field was replaced by stack pops.
    StoreReplaced,

    /// A pass started.
    PassStarted,
    /// A pass completed.
    PassCompleted,

    /// Informational message.
    Info,
    /// Warning (something unexpected but recoverable).
    Warning,
}

impl EventKind {
    /// Returns a human-readable description of this event kind.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            // Removals
            Self::ClassRemoved => "class removed",
            Self::InterfaceRemoved => "interface removed",
            Self::TypeRemoved => "type removed",
            Self::NestedClassRemoved => "nested class removed",
            Self::EntryDropped => "class entry dropped",
            Self::FieldRemoved => "field removed",
            Self::MethodRemoved => "method removed",
            // Repairs
            Self::MarkerStripped => "marker stripped",
            Self::InterfaceDropped => "interface dropped",
            Self::SuperclassChanged => "superclass changed",
            Self::OperandsRetargeted => "operands retargeted",
            Self::StoreDeleted => "store deleted",
            Self::StoreReplaced => "store replaced",
            // Engine
            Self::PassStarted => "pass started",
            Self::PassCompleted => "pass completed",
            // Diagnostic
            Self::Info => "info",
            Self::Warning => "warning",
        }
    }

    /// Returns true if this event represents a change to the archive.
    #[must_use]
    pub fn is_transformation(&self) -> bool {
        !matches!(
            self,
            Self::PassStarted | Self::PassCompleted | Self::Info | Self::Warning
        )
    }

    /// Returns true if this is a diagnostic event (info/warning).
    #[must_use]
    pub fn is_diagnostic(&self) -> bool {
        matches!(self, Self::Info | Self::Warning)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// A single logged event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// The type of event.
    pub kind: EventKind,
    /// Internal name of the class the event concerns (if applicable).
    pub class: Option<String>,
    /// Field or method within the class, as `name:descriptor` or `name(descriptor)`.
    pub member: Option<String>,
    /// Instruction index within the member's body.
    pub location: Option<usize>,
    /// Human-readable description.
    pub message: String,
    /// Associated pass name (if from a pass).
    pub pass: Option<String>,
}

impl Event {
    fn new(kind: EventKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            class: None,
            member: None,
            location: None,
            message: message.into(),
            pass: None,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

/// Builder for creating events with a fluent API.
///
/// Created by [`EventLog::record`]. The event is added to the log when the builder is dropped.
pub struct EventBuilder<'a> {
    log: &'a mut EventLog,
    event: Event,
}

impl EventBuilder<'_> {
    /// Sets the class the event concerns.
    pub fn class(mut self, class: impl Into<String>) -> Self {
        self.event.class = Some(class.into());
        self
    }

    /// Sets the field or method the event concerns.
    pub fn member(mut self, member: impl Into<String>) -> Self {
        self.event.member = Some(member.into());
        self
    }

    /// Sets the instruction index.
    pub fn location(mut self, location: usize) -> Self {
        self.event.location = Some(location);
        self
    }

    /// Sets a custom message describing the event.
    pub fn message(mut self, msg: impl Into<String>) -> Self {
        self.event.message = msg.into();
        self
    }

    /// Associates this event with a specific pass.
    pub fn pass(mut self, pass_name: impl Into<String>) -> Self {
        self.event.pass = Some(pass_name.into());
        self
    }
}

impl Drop for EventBuilder<'_> {
    fn drop(&mut self) {
        let kind = self.event.kind;
        let mut event = std::mem::replace(&mut self.event, Event::new(kind, ""));
        if event.message.is_empty() {
            event.message = event.kind.description().to_string();
        }
        self.log.events.push(event);
    }
}

/// Collection of events from one pipeline run.
///
/// Statistics are derived from the events rather than tracked separately.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Vec<Event>,
}

impl EventLog {
    /// Creates an empty event log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if no events have been logged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Returns the total number of events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Starts building a new event of the given kind.
    ///
    /// The event is added when the builder is dropped.
    pub fn record(&mut self, kind: EventKind) -> EventBuilder<'_> {
        EventBuilder {
            log: self,
            event: Event::new(kind, String::new()),
        }
    }

    /// Records an informational message.
    pub fn info(&mut self, message: impl Into<String>) {
        self.events.push(Event::new(EventKind::Info, message));
    }

    /// Records a warning message.
    pub fn warn(&mut self, message: impl Into<String>) {
        self.events.push(Event::new(EventKind::Warning, message));
    }

    /// Appends all events of another log.
    pub fn merge(&mut self, other: EventLog) {
        self.events.extend(other.events);
    }

    /// Iterates over all events in recording order.
    pub fn iter(&self) -> std::slice::Iter<'_, Event> {
        self.events.iter()
    }

    /// Events of one kind.
    pub fn of_kind(&self, kind: EventKind) -> impl Iterator<Item = &Event> {
        self.events.iter().filter(move |e| e.kind == kind)
    }

    /// Returns true if at least one event of `kind` was recorded.
    #[must_use]
    pub fn has(&self, kind: EventKind) -> bool {
        self.events.iter().any(|e| e.kind == kind)
    }

    /// Number of events of `kind`.
    #[must_use]
    pub fn count(&self, kind: EventKind) -> usize {
        self.of_kind(kind).count()
    }

    /// Number of events per kind.
    #[must_use]
    pub fn count_by_kind(&self) -> HashMap<EventKind, usize> {
        let mut counts = HashMap::new();
        for event in &self.events {
            *counts.entry(event.kind).or_insert(0) += 1;
        }
        counts
    }

    /// Number of events that changed the archive.
    #[must_use]
    pub fn transformation_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| e.kind.is_transformation())
            .count()
    }

    /// Returns a one-line summary of the transformations, e.g.
    /// `2 class removed, 1 superclass changed`.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut counts: Vec<_> = self
            .count_by_kind()
            .into_iter()
            .filter(|(kind, _)| kind.is_transformation())
            .collect();
        if counts.is_empty() {
            return "no changes".to_string();
        }
        counts.sort();
        counts
            .iter()
            .map(|(kind, count)| format!("{} {}", count, kind))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl<'a> IntoIterator for &'a EventLog {
    type Item = &'a Event;
    type IntoIter = std::slice::Iter<'a, Event>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_fills_defaults() {
        let mut log = EventLog::new();
        log.record(EventKind::SuperclassChanged).class("p/B");
        log.record(EventKind::StoreDeleted)
            .class("p/C")
            .member("<init>()V")
            .location(3)
            .pass("members");
        log.warn("odd");

        let events: Vec<_> = log.iter().collect();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].message, "superclass changed");
        assert_eq!(events[1].location, Some(3));
        assert_eq!(events[1].pass.as_deref(), Some("members"));
        assert_eq!(events[2].to_string(), "[warning] odd");
    }

    #[test]
    fn summary_counts_transformations() {
        let mut log = EventLog::new();
        assert_eq!(log.summary(), "no changes");

        log.record(EventKind::ClassRemoved);
        log.record(EventKind::ClassRemoved);
        log.record(EventKind::FieldRemoved);
        log.info("not counted");

        assert_eq!(log.transformation_count(), 3);
        assert_eq!(log.summary(), "2 class removed, 1 field removed");

        let mut other = EventLog::new();
        other.record(EventKind::MethodRemoved);
        log.merge(other);
        assert!(log.has(EventKind::MethodRemoved));
        assert_eq!(log.len(), 5);
    }
}
