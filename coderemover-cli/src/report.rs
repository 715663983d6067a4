use std::{collections::BTreeMap, path::Path};

use coderemover::{
    pipeline::{config::RemoverConfig, events::EventKind, result::RemovalResult},
    registry::names::display_name,
};
use serde::Serialize;

/// Machine readable summary of one run.
#[derive(Debug, Serialize)]
pub struct RemovalReport {
    input: String,
    output: String,
    mode: String,
    marker: String,
    removed_classes: Vec<String>,
    removed_interfaces: Vec<String>,
    removed_other: Vec<String>,
    classes_processed: usize,
    classes_changed: usize,
    changes: BTreeMap<String, usize>,
    warnings: Vec<String>,
    time_ms: u128,
}

impl RemovalReport {
    pub fn new(input: &Path, output: &Path, config: &RemoverConfig, result: &RemovalResult) -> Self {
        let records = &result.records;
        let removed_classes: Vec<String> = records
            .removed_classes()
            .into_iter()
            .map(|(name, _)| display_name(name))
            .collect();
        let removed_interfaces: Vec<String> = records
            .removed_interfaces()
            .into_iter()
            .map(display_name)
            .collect();
        let removed_other = records
            .removed_types()
            .into_iter()
            .map(display_name)
            .filter(|name| !removed_classes.contains(name) && !removed_interfaces.contains(name))
            .collect();

        let changes = result
            .events
            .count_by_kind()
            .into_iter()
            .filter(|(kind, _)| kind.is_transformation())
            .map(|(kind, count)| (kind.to_string(), count))
            .collect();

        RemovalReport {
            input: input.display().to_string(),
            output: output.display().to_string(),
            mode: config.mode.to_string(),
            marker: config.marker.clone(),
            removed_classes,
            removed_interfaces,
            removed_other,
            classes_processed: result.classes_processed,
            classes_changed: result.classes_changed,
            changes,
            warnings: result
                .events
                .of_kind(EventKind::Warning)
                .map(|event| event.message.clone())
                .collect(),
            time_ms: result.total_time.as_millis(),
        }
    }

    /// Print the human readable form to stderr.
    pub fn display(&self) {
        eprintln!("Removal complete: {} -> {}", self.input, self.output);
        eprintln!("  Mode:        {}", self.mode);
        eprintln!("  Classes:     {} removed", self.removed_classes.len());
        eprintln!("  Interfaces:  {} removed", self.removed_interfaces.len());
        if !self.removed_other.is_empty() {
            eprintln!("  Other types: {} removed", self.removed_other.len());
        }
        eprintln!(
            "  Survivors:   {} changed of {}",
            self.classes_changed, self.classes_processed
        );
        for (kind, count) in &self.changes {
            eprintln!("    {count:>5} {kind}");
        }
        #[allow(clippy::cast_precision_loss)]
        let time_secs = self.time_ms as f64 / 1000.0;
        eprintln!("  Time:        {time_secs:.1}s");

        if !self.warnings.is_empty() {
            eprintln!("  Warnings:    {}", self.warnings.len());
            for w in &self.warnings {
                eprintln!("    - {w}");
            }
        }
    }
}
