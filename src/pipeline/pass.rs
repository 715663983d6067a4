//! Pass traits and infrastructure for the per-class part of the pipeline.
//!
//! The decision pass runs once over the whole registry. Everything after it operates on one
//! surviving class at a time through the [`ClassPass`] trait, reading the removal records the
//! decision pass produced.

use std::collections::HashSet;

use crate::{
    pipeline::{config::RemovalMode, events::EventLog, records::RemovalRecords},
    registry::record::ClassRecord,
    Result,
};

/// Shared input of the per-class passes.
pub struct PassContext<'a> {
    /// What the decision pass removed.
    pub records: &'a RemovalRecords,
    /// Internal names of every class that survived the decision pass.
    pub survivors: &'a HashSet<String>,
    /// Descriptor of the marker annotation.
    pub marker: &'a str,
    /// Pipeline mode.
    pub mode: RemovalMode,
    /// Event log of the run.
    pub events: &'a mut EventLog,
}

impl PassContext<'_> {
    /// True if `name` is a class of the archive that survived the decision pass
    #[must_use]
    pub fn is_survivor(&self, name: &str) -> bool {
        self.survivors.contains(name)
    }
}

/// A pass that transforms one class at a time.
///
/// Passes never see removed classes, and the removal records are complete before the first
/// call, so the classes may be processed in any order.
pub trait ClassPass {
    /// Unique name for logging and debugging.
    fn name(&self) -> &'static str;

    /// Should this pass run on a specific class?
    ///
    /// Called before `run_on_class`.
    fn should_run(&self, _class: &ClassRecord, _ctx: &PassContext) -> bool {
        true
    }

    /// Run the pass on a single class.
    ///
    /// Returns `true` if any changes were made, `false` otherwise.
    /// Events should be recorded directly to `ctx.events`.
    ///
    /// # Errors
    ///
    /// Returns an error if the class cannot be transformed safely; the run is aborted.
    fn run_on_class(&self, class: &mut ClassRecord, ctx: &mut PassContext) -> Result<bool>;

    /// Get a description of what this pass does.
    fn description(&self) -> &'static str {
        "No description available"
    }
}
