//! In-memory records for classes, fields and methods.
//!
//! Records are produced by [`crate::classfile::reader::parse_class`] and serialized again by
//! [`crate::classfile::writer::write_class`]. Names are stored in internal form
//! (`java/lang/Object`) and descriptors verbatim. Attributes the passes never look at stay raw
//! and are written back unchanged.

use std::fmt;

use strum::Display;

use crate::{
    classfile::{
        annotation::{strip_marker, Marker},
        attribute::Attribute,
        constpool::ConstantPool,
        flags::{ClassAccessFlags, FieldAccessFlags, MethodAccessFlags},
    },
    instruction::code::CodeBody,
    Result,
};

/// Internal name of the universal root type
pub const OBJECT: &str = "java/lang/Object";

/// Internal name of the implicit enum superclass
pub const ENUM: &str = "java/lang/Enum";

/// Name of instance initializers
pub const INIT: &str = "<init>";

/// Name of the static initializer
pub const CLINIT: &str = "<clinit>";

/// Classification of a class file.
///
/// Derived once from the access flags and the declared superclass when the class is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum ClassKind {
    /// An ordinary or abstract class
    #[strum(serialize = "class")]
    Class,
    /// An interface that is not an annotation type
    #[strum(serialize = "interface")]
    Interface,
    /// An annotation type
    #[strum(serialize = "annotation")]
    Annotation,
    /// An enum class
    #[strum(serialize = "enum")]
    Enum,
    /// A `module-info` class
    #[strum(serialize = "module")]
    Module,
}

impl ClassKind {
    /// Classify a class from its flags and superclass
    #[must_use]
    pub fn classify(access: ClassAccessFlags, super_name: Option<&str>) -> Self {
        if access.contains(ClassAccessFlags::MODULE) {
            ClassKind::Module
        } else if access.contains(ClassAccessFlags::ANNOTATION) {
            ClassKind::Annotation
        } else if access.contains(ClassAccessFlags::INTERFACE) {
            ClassKind::Interface
        } else if access.contains(ClassAccessFlags::ENUM) || super_name == Some(ENUM) {
            ClassKind::Enum
        } else {
            ClassKind::Class
        }
    }

    /// True for types a removed class can be re-parented away from
    #[must_use]
    pub fn is_reparentable(self) -> bool {
        self == ClassKind::Class
    }
}

/// Identity of a field for cross referencing: name and descriptor
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldKey {
    /// Field name
    pub name: String,
    /// Field descriptor
    pub descriptor: String,
}

impl FieldKey {
    /// Create a key
    pub fn new(name: impl Into<String>, descriptor: impl Into<String>) -> Self {
        FieldKey {
            name: name.into(),
            descriptor: descriptor.into(),
        }
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.descriptor)
    }
}

/// A field declared by a class
#[derive(Debug, Clone)]
pub struct FieldRecord {
    /// Access flags
    pub access: FieldAccessFlags,
    /// Field name
    pub name: String,
    /// Field descriptor
    pub descriptor: String,
    /// The removal marker, while it is still attached
    pub marker: Option<Marker>,
    /// Field attributes, marker annotations included until stripped
    pub attributes: Vec<Attribute>,
}

impl FieldRecord {
    /// The cross-reference key of this field
    #[must_use]
    pub fn key(&self) -> FieldKey {
        FieldKey::new(&self.name, &self.descriptor)
    }

    /// Detach the marker `descriptor` from the field's attributes
    ///
    /// # Errors
    /// Returns an error if an annotation table is malformed.
    pub fn strip_marker(&mut self, pool: &ConstantPool, descriptor: &str) -> Result<bool> {
        self.marker = None;
        strip_marker(&mut self.attributes, pool, descriptor)
    }
}

/// A method declared by a class
#[derive(Debug, Clone)]
pub struct MethodRecord {
    /// Access flags
    pub access: MethodAccessFlags,
    /// Method name
    pub name: String,
    /// Method descriptor
    pub descriptor: String,
    /// The removal marker, while it is still attached
    pub marker: Option<Marker>,
    /// Method attributes in file order, including the raw `Code` attribute
    pub attributes: Vec<Attribute>,
    /// The decoded `Code` attribute; replaces the raw one on write once modified
    pub code: Option<CodeBody>,
}

impl MethodRecord {
    /// True for `<init>` and `<clinit>`
    #[must_use]
    pub fn is_initializer(&self) -> bool {
        self.name == INIT || self.name == CLINIT
    }

    /// Name and descriptor, e.g. `run(I)V`
    #[must_use]
    pub fn signature(&self) -> String {
        format!("{}{}", self.name, self.descriptor)
    }

    /// Detach the marker `descriptor` from the method's attributes
    ///
    /// # Errors
    /// Returns an error if an annotation table is malformed.
    pub fn strip_marker(&mut self, pool: &ConstantPool, descriptor: &str) -> Result<bool> {
        self.marker = None;
        strip_marker(&mut self.attributes, pool, descriptor)
    }
}

/// A parsed class file
#[derive(Debug, Clone)]
pub struct ClassRecord {
    /// Internal name, unique within a registry
    pub name: String,
    /// Internal name of the superclass; `None` only for `java/lang/Object` and modules
    pub super_name: Option<String>,
    /// Implemented interfaces in declaration order
    pub interfaces: Vec<String>,
    /// Declared fields in file order
    pub fields: Vec<FieldRecord>,
    /// Declared methods in file order
    pub methods: Vec<MethodRecord>,
    /// Classification derived on read
    pub kind: ClassKind,
    /// Access flags
    pub access: ClassAccessFlags,
    /// Class file minor version
    pub minor_version: u16,
    /// Class file major version
    pub major_version: u16,
    /// The removal marker, while it is still attached
    pub marker: Option<Marker>,
    /// Class attributes in file order
    pub attributes: Vec<Attribute>,
    /// The constant pool the class was read with; grows on write
    pub pool: ConstantPool,
    /// Set once a pass changed the class; only changed classes get a compacted pool on write
    pub(crate) modified: bool,
}

impl ClassRecord {
    /// Detach the marker `descriptor` from the class attributes
    ///
    /// # Errors
    /// Returns an error if an annotation table is malformed.
    pub fn strip_marker(&mut self, descriptor: &str) -> Result<bool> {
        self.marker = None;
        let stripped = strip_marker(&mut self.attributes, &self.pool, descriptor)?;
        self.modified |= stripped;
        Ok(stripped)
    }

    /// Flag the class as changed, so the writer drops constant pool entries nothing refers to
    pub fn mark_modified(&mut self) {
        self.modified = true;
    }

    /// True if a pass changed the class since it was read
    #[must_use]
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Look up a declared field by name and descriptor
    #[must_use]
    pub fn field(&self, name: &str, descriptor: &str) -> Option<&FieldRecord> {
        self.fields
            .iter()
            .find(|f| f.name == name && f.descriptor == descriptor)
    }

    /// Look up a declared method by name and descriptor
    #[must_use]
    pub fn method(&self, name: &str, descriptor: &str) -> Option<&MethodRecord> {
        self.methods
            .iter()
            .find(|m| m.name == name && m.descriptor == descriptor)
    }

    /// Look up a declared method by name and descriptor for modification
    pub fn method_mut(&mut self, name: &str, descriptor: &str) -> Option<&mut MethodRecord> {
        self.methods
            .iter_mut()
            .find(|m| m.name == name && m.descriptor == descriptor)
    }

    /// True if the class is the archive-level entry point of a nesting chain, i.e. its simple
    /// name has no `$` suffix
    #[must_use]
    pub fn is_top_level(&self) -> bool {
        super::names::enclosing_class_name(&self.name).is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        let cases = [
            (ClassAccessFlags::PUBLIC, Some(OBJECT), ClassKind::Class),
            (
                ClassAccessFlags::INTERFACE | ClassAccessFlags::ABSTRACT,
                Some(OBJECT),
                ClassKind::Interface,
            ),
            (
                ClassAccessFlags::INTERFACE | ClassAccessFlags::ANNOTATION,
                Some(OBJECT),
                ClassKind::Annotation,
            ),
            (ClassAccessFlags::FINAL | ClassAccessFlags::ENUM, Some(ENUM), ClassKind::Enum),
            (ClassAccessFlags::FINAL, Some(ENUM), ClassKind::Enum),
            (ClassAccessFlags::MODULE, None, ClassKind::Module),
        ];

        for (access, super_name, expected) in cases {
            assert_eq!(ClassKind::classify(access, super_name), expected);
        }
        assert!(ClassKind::Class.is_reparentable());
        assert!(!ClassKind::Enum.is_reparentable());
        assert_eq!(ClassKind::Annotation.to_string(), "annotation");
    }

    #[test]
    fn field_key_display() {
        assert_eq!(FieldKey::new("count", "I").to_string(), "count:I");
    }
}
