//! The removal pipeline.
//!
//! [`CodeRemover`] runs the passes over a [`Registry`] in a fixed order:
//!
//! 1. [`decision::DecisionPass`] removes every marked class and interface together with its
//!    nested classes, and strips `remove=false` class markers. It sees the whole registry and
//!    completes before anything else runs.
//! 2. [`hierarchy::HierarchyPass`] drops removed interfaces from the survivors and re-parents
//!    subclasses of removed classes, retargeting instruction operands.
//! 3. [`members::MemberPass`] removes marked fields and methods and patches the initializers
//!    that stored to removed fields.
//!
//! In [`config::RemovalMode::RemoveOnly`] the hierarchy pass does not run and the member pass
//! leaves instructions alone.
//!
//! # Example
//!
//! ```rust,no_run
//! use coderemover::pipeline::{config::RemoverConfig, CodeRemover};
//!
//! let remover = CodeRemover::new(RemoverConfig::default());
//! let result = remover.process_file("app.jar", "app-stripped.jar")?;
//! println!("{}", result.summary());
//! # Ok::<(), coderemover::Error>(())
//! ```

pub mod config;
pub mod decision;
pub mod events;
pub mod hierarchy;
pub mod members;
pub mod pass;
pub mod records;
pub mod result;

use std::{collections::HashSet, path::Path, time::Instant};

use log::{debug, info};

use crate::{
    archive,
    pipeline::{
        config::RemoverConfig,
        decision::DecisionPass,
        events::{EventKind, EventLog},
        hierarchy::HierarchyPass,
        members::MemberPass,
        pass::{ClassPass, PassContext},
        result::RemovalResult,
    },
    registry::Registry,
    Result,
};

/// Main entry point of the removal pipeline.
pub struct CodeRemover {
    config: RemoverConfig,
    passes: Vec<Box<dyn ClassPass>>,
}

impl Default for CodeRemover {
    fn default() -> Self {
        Self::new(RemoverConfig::default())
    }
}

impl CodeRemover {
    /// Creates a pipeline for `config`.
    #[must_use]
    pub fn new(config: RemoverConfig) -> Self {
        let mut passes: Vec<Box<dyn ClassPass>> = Vec::new();
        if config.mode.repairs() {
            passes.push(Box::new(HierarchyPass::new()));
        }
        passes.push(Box::new(MemberPass::new()));

        CodeRemover { config, passes }
    }

    /// The configuration of this pipeline.
    #[must_use]
    pub fn config(&self) -> &RemoverConfig {
        &self.config
    }

    /// Names of the per-class passes in execution order.
    pub fn pass_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.passes.iter().map(|pass| pass.name())
    }

    /// Run the pipeline over `registry` in place.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::MalformedMarker`] or [`crate::Error::UnexpectedShape`] if the
    /// removal cannot be carried out safely. The registry may be partially transformed
    /// afterwards and must not be written.
    pub fn process(&self, registry: &mut Registry) -> Result<RemovalResult> {
        let start = Instant::now();
        let mut events = EventLog::new();

        events.record(EventKind::PassStarted).pass("decision");
        let records = DecisionPass::new().run(registry, &self.config.marker, &mut events)?;
        events.record(EventKind::PassCompleted).pass("decision");
        info!(
            "Removed {} type(s), {} class(es) remaining",
            records.len(),
            registry.len()
        );

        let survivors: HashSet<String> = registry.names().map(str::to_string).collect();
        let mut changed = HashSet::new();

        for pass in &self.passes {
            debug!("Running pass {}: {}", pass.name(), pass.description());
            let mut ctx = PassContext {
                records: &records,
                survivors: &survivors,
                marker: &self.config.marker,
                mode: self.config.mode,
                events: &mut events,
            };
            ctx.events
                .record(EventKind::PassStarted)
                .message(pass.description())
                .pass(pass.name());

            for class in registry.classes_mut() {
                if !pass.should_run(class, &ctx) {
                    continue;
                }
                if pass.run_on_class(class, &mut ctx)? {
                    class.mark_modified();
                    changed.insert(class.name.clone());
                }
            }

            ctx.events.record(EventKind::PassCompleted).pass(pass.name());
        }

        Ok(RemovalResult::new(records, events)
            .with_counts(survivors.len(), changed.len())
            .with_timing(start.elapsed()))
    }

    /// Load an archive, run the pipeline and write the result to `output`.
    ///
    /// Nothing is written if any step fails.
    ///
    /// # Errors
    ///
    /// Returns an error if the input cannot be read, the pipeline fails, or the output cannot be
    /// written.
    pub fn process_file(
        &self,
        input: impl AsRef<Path>,
        output: impl AsRef<Path>,
    ) -> Result<RemovalResult> {
        let mut registry = archive::load(input, &self.config.load_options())?;
        let result = self.process(&mut registry)?;
        archive::store(output, &registry)?;
        Ok(result)
    }

    /// Run the pipeline over an in-memory archive and return the transformed archive.
    ///
    /// # Errors
    ///
    /// Returns an error if the archive cannot be read or written, or the pipeline fails.
    pub fn process_bytes(&self, bytes: &[u8]) -> Result<(Vec<u8>, RemovalResult)> {
        let mut registry = archive::load_from_mem(bytes, &self.config.load_options())?;
        let result = self.process(&mut registry)?;
        Ok((archive::store_to_mem(&registry)?, result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        classfile::{builder::ClassBuilder, writer::write_class},
        pipeline::config::RemovalMode,
        registry::{LoadOptions, DEFAULT_MARKER},
    };

    fn registry(builders: Vec<ClassBuilder>) -> Registry {
        let entries = builders.into_iter().map(|builder| {
            let record = builder.into_record(DEFAULT_MARKER).unwrap();
            (format!("{}.class", record.name), write_class(&record).unwrap())
        });
        Registry::build(entries, &LoadOptions::default()).unwrap()
    }

    fn classes() -> Vec<ClassBuilder> {
        vec![
            ClassBuilder::new("p/A").marked(true),
            ClassBuilder::new("p/B")
                .super_name("p/A")
                .field("f", "I")
                .marked(true)
                .done(),
        ]
    }

    #[test]
    fn pass_order_follows_mode() {
        let full: Vec<_> = CodeRemover::default().pass_names().collect();
        assert_eq!(full, ["hierarchy", "members"]);

        let remove_only =
            CodeRemover::new(RemoverConfig::default().with_mode(RemovalMode::RemoveOnly));
        assert_eq!(remove_only.pass_names().collect::<Vec<_>>(), ["members"]);
    }

    #[test]
    fn full_run() {
        let mut registry = registry(classes());
        let result = CodeRemover::default().process(&mut registry).unwrap();

        let b = registry.get("p/B").unwrap();
        assert!(registry.get("p/A").is_none());
        assert_eq!(b.super_name.as_deref(), Some("java/lang/Object"));
        assert!(b.fields.is_empty());
        assert_eq!(result.classes_processed, 1);
        assert_eq!(result.classes_changed, 1);
        assert_eq!(result.events.count(EventKind::PassStarted), 3);
    }

    #[test]
    fn remove_only_keeps_superclass() {
        let mut registry = registry(classes());
        let remover = CodeRemover::new(RemoverConfig::default().with_mode(RemovalMode::RemoveOnly));
        remover.process(&mut registry).unwrap();

        let b = registry.get("p/B").unwrap();
        assert_eq!(b.super_name.as_deref(), Some("p/A"));
        assert!(b.fields.is_empty());
    }
}
