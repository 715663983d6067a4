//! The in-memory class graph of an archive.
//!
//! A [`Registry`] holds every class of an archive as a [`ClassRecord`], keyed by internal name
//! and kept in archive order, next to the entries that are not classes: the manifest and opaque
//! resources that are written back byte for byte.
//!
//! # Examples
//!
//! ```rust
//! use coderemover::{
//!     classfile::builder::ClassBuilder,
//!     registry::{LoadOptions, Registry},
//! };
//!
//! let options = LoadOptions::default();
//! let class = ClassBuilder::new("demo/Main").build(&options.marker)?;
//! let entries = vec![
//!     ("META-INF/MANIFEST.MF".to_string(), b"Manifest-Version: 1.0\r\n".to_vec()),
//!     ("demo/Main.class".to_string(), class),
//!     ("demo/app.properties".to_string(), b"debug=false".to_vec()),
//! ];
//!
//! let registry = Registry::build(entries, &options)?;
//! assert!(registry.contains("demo/Main"));
//! assert_eq!(registry.resources().len(), 1);
//! assert!(registry.manifest().is_some());
//! # Ok::<(), coderemover::Error>(())
//! ```

pub mod names;
pub mod record;

use std::collections::HashMap;

use log::{debug, warn};

use crate::{
    classfile::reader::parse_class,
    registry::record::ClassRecord,
    Error, Result,
};

/// Descriptor of the default removal marker
pub const DEFAULT_MARKER: &str = "Lcoderemover/Removable;";

/// Archive path of the manifest
pub const MANIFEST_PATH: &str = "META-INF/MANIFEST.MF";

/// Prefix of multi-release class trees, which are passed through as resources
pub const VERSIONS_PREFIX: &str = "META-INF/versions/";

/// Suffix of class entries
pub const CLASS_SUFFIX: &str = ".class";

/// Options for building a registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOptions {
    /// Descriptor of the removal marker annotation
    pub marker: String,
    /// Fail on class entries that cannot be parsed instead of keeping them as resources
    pub strict: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        LoadOptions {
            marker: DEFAULT_MARKER.to_string(),
            strict: false,
        }
    }
}

impl LoadOptions {
    /// Use a different marker, given as dotted name, internal name or descriptor
    #[must_use]
    pub fn with_marker(mut self, marker: &str) -> Self {
        self.marker = names::marker_descriptor(marker);
        self
    }

    /// Treat unparsable classes as fatal
    #[must_use]
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }
}

/// All classes and resources of one archive
#[derive(Debug, Clone, Default)]
pub struct Registry {
    classes: Vec<ClassRecord>,
    index: HashMap<String, usize>,
    resources: Vec<(String, Vec<u8>)>,
    manifest: Option<Vec<u8>>,
}

impl Registry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from archive entries in container order.
    ///
    /// Directory entries must already be filtered out by the caller.
    ///
    /// # Errors
    /// Returns [`Error::ClassParse`] for an unparsable class entry if `options.strict` is set.
    pub fn build<I>(entries: I, options: &LoadOptions) -> Result<Self>
    where
        I: IntoIterator<Item = (String, Vec<u8>)>,
    {
        let mut registry = Registry::new();

        for (entry, data) in entries {
            if entry == MANIFEST_PATH {
                registry.manifest = Some(data);
                continue;
            }
            if !entry.ends_with(CLASS_SUFFIX) || entry.starts_with(VERSIONS_PREFIX) {
                registry.resources.push((entry, data));
                continue;
            }

            let class = match parse_class(&data, &options.marker) {
                Ok(class) => class,
                Err(error) if options.strict => {
                    return Err(Error::ClassParse {
                        entry,
                        source: Box::new(error),
                    })
                }
                Err(error) => {
                    warn!("Keeping unparsable class {} as resource: {}", entry, error);
                    registry.resources.push((entry, data));
                    continue;
                }
            };

            if registry.contains(&class.name) {
                warn!(
                    "Duplicate class {} in entry {}, keeping it as resource",
                    class.name, entry
                );
                registry.resources.push((entry, data));
                continue;
            }

            debug!("Loaded {} {} from {}", class.kind, class.name, entry);
            registry.insert(class);
        }

        Ok(registry)
    }

    /// Number of classes
    #[must_use]
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// True if the registry holds no classes
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// True if a class with the internal name `name` exists
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// The class with the internal name `name`
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ClassRecord> {
        self.index.get(name).map(|&i| &self.classes[i])
    }

    /// The class with the internal name `name`, for modification
    pub fn get_mut(&mut self, name: &str) -> Option<&mut ClassRecord> {
        match self.index.get(name) {
            Some(&i) => self.classes.get_mut(i),
            None => None,
        }
    }

    /// Add a class at the end, or replace the class with the same name in place.
    ///
    /// Returns the replaced class.
    pub fn insert(&mut self, class: ClassRecord) -> Option<ClassRecord> {
        if let Some(&i) = self.index.get(&class.name) {
            return Some(std::mem::replace(&mut self.classes[i], class));
        }
        self.index.insert(class.name.clone(), self.classes.len());
        self.classes.push(class);
        None
    }

    /// Remove a class by name, keeping the order of the others
    pub fn remove(&mut self, name: &str) -> Option<ClassRecord> {
        let i = self.index.remove(name)?;
        let class = self.classes.remove(i);
        for position in self.index.values_mut() {
            if *position > i {
                *position -= 1;
            }
        }
        Some(class)
    }

    /// Keep only the classes for which `keep` returns true
    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&ClassRecord) -> bool,
    {
        self.classes.retain(|class| keep(class));
        self.reindex();
    }

    fn reindex(&mut self) {
        self.index.clear();
        for (i, class) in self.classes.iter().enumerate() {
            self.index.insert(class.name.clone(), i);
        }
    }

    /// All classes in archive order
    pub fn classes(&self) -> std::slice::Iter<'_, ClassRecord> {
        self.classes.iter()
    }

    /// All classes in archive order, for modification
    pub fn classes_mut(&mut self) -> std::slice::IterMut<'_, ClassRecord> {
        self.classes.iter_mut()
    }

    /// Internal names of all classes in archive order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.classes.iter().map(|class| class.name.as_str())
    }

    /// Entries that are neither classes nor the manifest, in archive order
    #[must_use]
    pub fn resources(&self) -> &[(String, Vec<u8>)] {
        &self.resources
    }

    /// Keep only the resources for which `keep` returns true
    pub fn retain_resources<F>(&mut self, mut keep: F)
    where
        F: FnMut(&str, &[u8]) -> bool,
    {
        self.resources.retain(|(entry, data)| keep(entry, data));
    }

    /// Append an opaque resource
    pub fn add_resource(&mut self, entry: impl Into<String>, data: Vec<u8>) {
        self.resources.push((entry.into(), data));
    }

    /// The manifest, if the archive has one
    #[must_use]
    pub fn manifest(&self) -> Option<&[u8]> {
        self.manifest.as_deref()
    }

    /// Replace the manifest
    pub fn set_manifest(&mut self, manifest: Option<Vec<u8>>) {
        self.manifest = manifest;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classfile::builder::ClassBuilder;

    fn class(name: &str) -> Vec<u8> {
        ClassBuilder::new(name).build(DEFAULT_MARKER).unwrap()
    }

    fn entries() -> Vec<(String, Vec<u8>)> {
        vec![
            ("a/One.class".into(), class("a/One")),
            ("a/Two.class".into(), class("a/Two")),
            ("copy/One.class".into(), class("a/One")),
            ("broken/Bad.class".into(), vec![0xCA, 0xFE]),
            ("META-INF/versions/11/a/One.class".into(), class("a/One")),
            ("a/Three.class".into(), class("a/Three")),
        ]
    }

    #[test]
    fn lenient_build() {
        let registry = Registry::build(entries(), &LoadOptions::default()).unwrap();
        assert_eq!(registry.names().collect::<Vec<_>>(), ["a/One", "a/Two", "a/Three"]);

        let resources: Vec<_> = registry.resources().iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(
            resources,
            ["copy/One.class", "broken/Bad.class", "META-INF/versions/11/a/One.class"]
        );
        assert!(registry.manifest().is_none());
    }

    #[test]
    fn strict_build() {
        let options = LoadOptions::default().with_strict(true);
        match Registry::build(entries(), &options) {
            Err(Error::ClassParse { entry, .. }) => assert_eq!(entry, "broken/Bad.class"),
            other => panic!("expected parse failure, got {:?}", other.map(|r| r.len())),
        }
    }

    #[test]
    fn remove_keeps_order_and_index() {
        let mut registry = Registry::build(entries(), &LoadOptions::default()).unwrap();
        assert!(registry.remove("a/Two").is_some());
        assert!(registry.remove("a/Two").is_none());
        assert_eq!(registry.get("a/Three").unwrap().name, "a/Three");

        registry.retain(|class| class.name != "a/One");
        assert_eq!(registry.len(), 1);
        assert!(registry.get_mut("a/Three").is_some());
        assert!(!registry.contains("a/One"));

        let replaced = registry.insert(registry.get("a/Three").unwrap().clone());
        assert!(replaced.is_some());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn marker_option() {
        let options = LoadOptions::default().with_marker("org.example.Strip");
        assert_eq!(options.marker, "Lorg/example/Strip;");
    }
}
