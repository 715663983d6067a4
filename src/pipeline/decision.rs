//! Whole-class removal.
//!
//! The decision pass is the only pass that sees the entire registry at once. It removes every
//! class carrying a `remove=true` marker, strips `remove=false` markers from the classes that
//! stay, and then cascades to nested classes of everything removed. The resulting
//! [`RemovalRecords`] drive all later passes.

use std::collections::HashSet;

use log::{info, warn};

use crate::{
    pipeline::{
        events::{EventKind, EventLog},
        records::RemovalRecords,
    },
    registry::{
        names::{display_name, enclosing_class_names, entry_class_name},
        record::{ClassKind, ClassRecord},
        Registry,
    },
    Result,
};

const PASS_NAME: &str = "decision";

/// Removes marked classes and their nested classes from a registry
#[derive(Debug, Clone, Copy, Default)]
pub struct DecisionPass;

impl DecisionPass {
    /// Create the pass
    #[must_use]
    pub fn new() -> Self {
        DecisionPass
    }

    /// Run the pass over every class of `registry`.
    ///
    /// # Errors
    /// Returns [`crate::Error::MalformedMarker`] for a class marker without exactly one boolean
    /// `remove` value; nothing is removed in that case.
    pub fn run(
        &self,
        registry: &mut Registry,
        marker: &str,
        events: &mut EventLog,
    ) -> Result<RemovalRecords> {
        let mut records = RemovalRecords::new();

        let mut marked = Vec::new();
        for class in registry.classes() {
            if let Some(found) = &class.marker {
                if found.remove_flag(&display_name(&class.name))? {
                    marked.push(class.name.clone());
                }
            }
        }

        let marked_set: HashSet<&str> = marked.iter().map(String::as_str).collect();
        for class in registry.classes_mut() {
            if class.marker.is_some() && !marked_set.contains(class.name.as_str()) {
                class.strip_marker(marker)?;
                events
                    .record(EventKind::MarkerStripped)
                    .class(class.name.as_str())
                    .pass(PASS_NAME);
            }
        }

        for name in &marked {
            if let Some(class) = registry.get(name) {
                records.record(class);
                log_removal(class, events);
            }
        }

        // a nested class is removed if any of its enclosing classes was
        let nested: Vec<String> = registry
            .classes()
            .filter(|class| {
                !records.is_removed(&class.name)
                    && enclosing_class_names(&class.name).any(|outer| records.is_removed(outer))
            })
            .map(|class| class.name.clone())
            .collect();
        for name in &nested {
            if let Some(class) = registry.get(name) {
                records.record(class);
                info!("Removed nested {}: {}", class.kind, display_name(name));
                events
                    .record(EventKind::NestedClassRemoved)
                    .class(name.as_str())
                    .message(format!(
                        "Removed nested {}: {}",
                        class.kind,
                        display_name(name)
                    ))
                    .pass(PASS_NAME);
            }
        }

        registry.retain(|class| !records.is_removed(&class.name));

        // unparsed and multi-release class entries follow the class their path names
        let mut dropped = Vec::new();
        registry.retain_resources(|entry, _| {
            let removed = entry_class_name(entry).is_some_and(|name| {
                records.is_removed(name)
                    || enclosing_class_names(name).any(|outer| records.is_removed(outer))
            });
            if removed {
                dropped.push(entry.to_string());
            }
            !removed
        });
        for entry in dropped {
            warn!("Dropped class entry {} of a removed type", entry);
            events
                .record(EventKind::EntryDropped)
                .message(format!("Dropped class entry {entry}"))
                .pass(PASS_NAME);
        }

        Ok(records)
    }
}

fn log_removal(class: &ClassRecord, events: &mut EventLog) {
    let kind = match class.kind {
        ClassKind::Class => EventKind::ClassRemoved,
        ClassKind::Interface => EventKind::InterfaceRemoved,
        ClassKind::Annotation | ClassKind::Enum | ClassKind::Module => EventKind::TypeRemoved,
    };
    let message = format!("Removed {}: {}", class.kind, display_name(&class.name));
    info!("{}", message);
    events
        .record(kind)
        .class(class.name.as_str())
        .message(message)
        .pass(PASS_NAME);
}
