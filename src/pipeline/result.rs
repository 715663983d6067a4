//! Removal result types.
//!
//! This module contains the [`RemovalResult`] struct which encapsulates the outcome of running
//! the [`crate::pipeline::CodeRemover`] on a registry.

use std::{fmt, time::Duration};

use crate::pipeline::{events::EventLog, records::RemovalRecords};

/// Result of a removal run.
///
/// Holds the event log of the run and the removal records of the decision pass. Counts are
/// derived from the event log on demand.
///
/// # Example
///
/// ```rust,ignore
/// use coderemover::pipeline::CodeRemover;
///
/// let result = CodeRemover::default().process(&mut registry)?;
/// println!("{}", result.summary());
/// ```
#[derive(Debug, Clone)]
pub struct RemovalResult {
    /// All events from the run.
    pub events: EventLog,
    /// What the decision pass removed.
    pub records: RemovalRecords,
    /// Number of classes the per-class passes ran on.
    pub classes_processed: usize,
    /// Number of surviving classes a pass changed.
    pub classes_changed: usize,
    /// Total processing time.
    pub total_time: Duration,
}

impl RemovalResult {
    /// Creates a new removal result.
    #[must_use]
    pub fn new(records: RemovalRecords, events: EventLog) -> Self {
        Self {
            events,
            records,
            classes_processed: 0,
            classes_changed: 0,
            total_time: Duration::ZERO,
        }
    }

    /// Sets the per-class counters.
    #[must_use]
    pub fn with_counts(mut self, processed: usize, changed: usize) -> Self {
        self.classes_processed = processed;
        self.classes_changed = changed;
        self
    }

    /// Sets timing info.
    #[must_use]
    pub fn with_timing(mut self, time: Duration) -> Self {
        self.total_time = time;
        self
    }

    /// True if the run changed nothing.
    #[must_use]
    pub fn is_unchanged(&self) -> bool {
        self.events.transformation_count() == 0
    }

    /// Generates a human-readable summary of the run.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "{} removed, {} of {} remaining classes changed ({}) in {:.2?}",
            self.records.len(),
            self.classes_changed,
            self.classes_processed,
            self.events.summary(),
            self.total_time
        )
    }
}

impl fmt::Display for RemovalResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary())
    }
}
