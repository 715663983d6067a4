//! Configuration for the removal pipeline.

use strum::{Display, EnumIter, EnumString};

use crate::registry::{names::marker_descriptor, LoadOptions, DEFAULT_MARKER};

/// Which parts of the pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, EnumIter)]
#[strum(serialize_all = "kebab-case")]
pub enum RemovalMode {
    /// Remove marked elements and repair hierarchies and initializers.
    #[default]
    Full,
    /// Remove marked elements only; superclasses, interface lists of survivors and
    /// instructions are left as they are.
    RemoveOnly,
}

impl RemovalMode {
    /// True if the hierarchy repair and initializer patching run.
    #[must_use]
    pub fn repairs(self) -> bool {
        self == RemovalMode::Full
    }
}

/// Configuration for [`crate::pipeline::CodeRemover`].
///
/// ```rust
/// use coderemover::pipeline::config::{RemovalMode, RemoverConfig};
///
/// let config = RemoverConfig::default()
///     .with_mode(RemovalMode::RemoveOnly)
///     .with_marker("org.example.Strip");
/// assert_eq!(config.marker, "Lorg/example/Strip;");
/// assert!(!config.mode.repairs());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoverConfig {
    /// Pipeline mode (default: [`RemovalMode::Full`]).
    pub mode: RemovalMode,

    /// Descriptor of the marker annotation (default: `Lcoderemover/Removable;`).
    pub marker: String,

    /// Abort on class entries that cannot be parsed (default: false).
    ///
    /// Lenient runs keep such entries unchanged as resources.
    pub strict: bool,
}

impl Default for RemoverConfig {
    fn default() -> Self {
        Self {
            mode: RemovalMode::default(),
            marker: DEFAULT_MARKER.to_string(),
            strict: false,
        }
    }
}

impl RemoverConfig {
    /// Set the pipeline mode.
    #[must_use]
    pub fn with_mode(mut self, mode: RemovalMode) -> Self {
        self.mode = mode;
        self
    }

    /// Use a different marker, given as dotted name, internal name or descriptor.
    #[must_use]
    pub fn with_marker(mut self, marker: &str) -> Self {
        self.marker = marker_descriptor(marker);
        self
    }

    /// Treat unparsable classes as fatal.
    #[must_use]
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Registry options matching this configuration.
    #[must_use]
    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            marker: self.marker.clone(),
            strict: self.strict,
        }
    }
}
