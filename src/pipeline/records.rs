//! State handed from the decision pass to the per-class passes.

use std::collections::{HashMap, HashSet};

use crate::{
    registry::record::{ClassKind, ClassRecord, FieldKey},
    Result,
};

/// What the decision pass removed.
///
/// Built once by [`crate::pipeline::decision::DecisionPass`] and read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemovalRecords {
    removed_interfaces: HashSet<String>,
    removed_classes: HashMap<String, String>,
    removed_types: HashSet<String>,
}

impl RemovalRecords {
    /// Create empty records
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a removed class according to its kind.
    ///
    /// Interfaces go to the removed interface set and ordinary classes map to their original
    /// superclass; every kind is remembered as a removed type.
    pub fn record(&mut self, class: &ClassRecord) {
        match class.kind {
            ClassKind::Interface => {
                self.removed_interfaces.insert(class.name.clone());
            }
            ClassKind::Class => {
                if let Some(super_name) = &class.super_name {
                    self.removed_classes
                        .insert(class.name.clone(), super_name.clone());
                }
            }
            ClassKind::Annotation | ClassKind::Enum | ClassKind::Module => {}
        }
        self.removed_types.insert(class.name.clone());
    }

    /// True if `name` was a removed interface
    #[must_use]
    pub fn is_removed_interface(&self, name: &str) -> bool {
        self.removed_interfaces.contains(name)
    }

    /// The original superclass of a removed class
    #[must_use]
    pub fn original_superclass(&self, name: &str) -> Option<&str> {
        self.removed_classes.get(name).map(String::as_str)
    }

    /// True if a type of any kind named `name` was removed
    #[must_use]
    pub fn is_removed(&self, name: &str) -> bool {
        self.removed_types.contains(name)
    }

    /// Number of removed types of any kind
    #[must_use]
    pub fn len(&self) -> usize {
        self.removed_types.len()
    }

    /// True if nothing was removed
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.removed_types.is_empty()
    }

    /// Removed interfaces, sorted
    #[must_use]
    pub fn removed_interfaces(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.removed_interfaces.iter().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Removed classes with their original superclass, sorted by name
    #[must_use]
    pub fn removed_classes(&self) -> Vec<(&str, &str)> {
        let mut pairs: Vec<_> = self
            .removed_classes
            .iter()
            .map(|(name, super_name)| (name.as_str(), super_name.as_str()))
            .collect();
        pairs.sort_unstable();
        pairs
    }

    /// All removed types, sorted
    #[must_use]
    pub fn removed_types(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.removed_types.iter().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Follow the removed class mapping from `name` to the nearest class that was not removed.
    ///
    /// Names outside the mapping, including classes that are not part of the archive, resolve
    /// to themselves. Each hop follows one recorded superclass, so a chain longer than the
    /// mapping can only be a cycle.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the recorded superclasses form a cycle.
    pub fn resolve_superclass<'a>(&'a self, name: &'a str) -> Result<&'a str> {
        let mut current = name;
        for _ in 0..=self.removed_classes.len() {
            match self.removed_classes.get(current) {
                Some(super_name) => current = super_name,
                None => return Ok(current),
            }
        }
        Err(malformed_error!("Superclass chain of {} is cyclic", name))
    }
}

/// Keys of the fields removed from the class currently being patched.
///
/// A fresh set is created for every class.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldKeySet {
    descriptors_by_name: HashMap<String, HashSet<String>>,
}

impl FieldKeySet {
    /// Create an empty set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a key; returns false if it was already present
    pub fn insert(&mut self, key: FieldKey) -> bool {
        self.descriptors_by_name
            .entry(key.name)
            .or_default()
            .insert(key.descriptor)
    }

    /// True if a field with `name` and `descriptor` was removed
    #[must_use]
    pub fn contains(&self, name: &str, descriptor: &str) -> bool {
        self.descriptors_by_name
            .get(name)
            .is_some_and(|descriptors| descriptors.contains(descriptor))
    }

    /// Number of removed fields
    #[must_use]
    pub fn len(&self) -> usize {
        self.descriptors_by_name.values().map(HashSet::len).sum()
    }

    /// True if no field was removed
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.descriptors_by_name.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{classfile::builder::ClassBuilder, registry::DEFAULT_MARKER, Error};

    fn class(name: &str, super_name: &str) -> ClassRecord {
        ClassBuilder::new(name)
            .super_name(super_name)
            .into_record(DEFAULT_MARKER)
            .unwrap()
    }

    #[test]
    fn records_by_kind() {
        let mut records = RemovalRecords::new();
        records.record(&class("p/A", "java/lang/Object"));
        records.record(
            &ClassBuilder::new("p/I")
                .as_interface()
                .into_record(DEFAULT_MARKER)
                .unwrap(),
        );
        records.record(
            &ClassBuilder::new("p/E")
                .as_enum()
                .into_record(DEFAULT_MARKER)
                .unwrap(),
        );

        assert!(records.is_removed_interface("p/I"));
        assert!(!records.is_removed_interface("p/A"));
        assert_eq!(records.original_superclass("p/A"), Some("java/lang/Object"));
        assert_eq!(records.original_superclass("p/E"), None);
        assert!(records.is_removed("p/E"));
        assert_eq!(records.removed_types(), ["p/A", "p/E", "p/I"]);
    }

    #[test]
    fn multi_hop_resolution() {
        let mut records = RemovalRecords::new();
        records.record(&class("p/C", "p/B"));
        records.record(&class("p/B", "p/A"));
        records.record(&class("p/A", "lib/External"));

        assert_eq!(records.resolve_superclass("p/C").unwrap(), "lib/External");
        assert_eq!(records.resolve_superclass("p/B").unwrap(), "lib/External");
        assert_eq!(records.resolve_superclass("p/Kept").unwrap(), "p/Kept");
        assert_eq!(
            records.resolve_superclass("java/lang/Object").unwrap(),
            "java/lang/Object"
        );
    }

    #[test]
    fn cycle_is_malformed() {
        let mut records = RemovalRecords::new();
        records.record(&class("p/A", "p/B"));
        records.record(&class("p/B", "p/A"));
        assert!(matches!(
            records.resolve_superclass("p/A"),
            Err(Error::Malformed { .. })
        ));
    }

    #[test]
    fn field_keys() {
        let mut keys = FieldKeySet::new();
        assert!(keys.insert(FieldKey::new("f", "I")));
        assert!(!keys.insert(FieldKey::new("f", "I")));
        assert!(keys.contains("f", "I"));
        assert!(!keys.contains("f", "J"));
        assert_eq!(keys.len(), 1);
    }
}
