//! Raw attributes of classes, fields, methods and code.
//!
//! Attributes are kept as opaque payloads unless one of the decoders needs to look inside
//! (`Code`, the annotation tables and the code sub-attributes). The name is resolved on read and
//! interned again on write, which maps back to the original pool entry.

use crate::{
    classfile::constpool::ConstantPool,
    file::{
        io::{write_be, write_len_u16, write_len_u32},
        parser::Parser,
    },
    Result,
};

/// Well known attribute names
#[allow(missing_docs)]
pub mod names {
    pub const CODE: &str = "Code";
    pub const STACK_MAP_TABLE: &str = "StackMapTable";
    pub const LINE_NUMBER_TABLE: &str = "LineNumberTable";
    pub const LOCAL_VARIABLE_TABLE: &str = "LocalVariableTable";
    pub const LOCAL_VARIABLE_TYPE_TABLE: &str = "LocalVariableTypeTable";
    pub const RUNTIME_INVISIBLE_ANNOTATIONS: &str = "RuntimeInvisibleAnnotations";
    pub const RUNTIME_VISIBLE_ANNOTATIONS: &str = "RuntimeVisibleAnnotations";
    pub const RUNTIME_INVISIBLE_PARAMETER_ANNOTATIONS: &str =
        "RuntimeInvisibleParameterAnnotations";
    pub const RUNTIME_VISIBLE_PARAMETER_ANNOTATIONS: &str = "RuntimeVisibleParameterAnnotations";
    pub const RUNTIME_INVISIBLE_TYPE_ANNOTATIONS: &str = "RuntimeInvisibleTypeAnnotations";
    pub const RUNTIME_VISIBLE_TYPE_ANNOTATIONS: &str = "RuntimeVisibleTypeAnnotations";
    pub const ANNOTATION_DEFAULT: &str = "AnnotationDefault";
    pub const SOURCE_FILE: &str = "SourceFile";
    pub const SOURCE_DEBUG_EXTENSION: &str = "SourceDebugExtension";
    pub const SIGNATURE: &str = "Signature";
    pub const CONSTANT_VALUE: &str = "ConstantValue";
    pub const EXCEPTIONS: &str = "Exceptions";
    pub const INNER_CLASSES: &str = "InnerClasses";
    pub const ENCLOSING_METHOD: &str = "EnclosingMethod";
    pub const BOOTSTRAP_METHODS: &str = "BootstrapMethods";
    pub const METHOD_PARAMETERS: &str = "MethodParameters";
    pub const NEST_HOST: &str = "NestHost";
    pub const NEST_MEMBERS: &str = "NestMembers";
    pub const PERMITTED_SUBCLASSES: &str = "PermittedSubclasses";
    pub const RECORD: &str = "Record";
    pub const MODULE: &str = "Module";
    pub const MODULE_PACKAGES: &str = "ModulePackages";
    pub const MODULE_MAIN_CLASS: &str = "ModuleMainClass";
    pub const DEPRECATED: &str = "Deprecated";
    pub const SYNTHETIC: &str = "Synthetic";
}

/// An attribute with its name resolved and its payload kept verbatim
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Attribute name, e.g. `Signature`
    pub name: String,
    /// Attribute payload without the six byte header
    pub data: Vec<u8>,
}

impl Attribute {
    /// Create an attribute from a name and payload
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        Attribute {
            name: name.into(),
            data,
        }
    }

    /// Parse a single attribute.
    ///
    /// # Errors
    /// Returns an error if the header is truncated, the name index is invalid or the declared
    /// length runs past the end of the data.
    pub fn parse(parser: &mut Parser, pool: &ConstantPool) -> Result<Self> {
        let name = pool.utf8(parser.read_be::<u16>()?)?;
        let len = parser.read_be::<u32>()? as usize;
        let data = parser.read_bytes(len)?.to_vec();
        Ok(Attribute { name, data })
    }

    /// Parse a `u16` counted attribute table.
    ///
    /// # Errors
    /// See [`Attribute::parse`].
    pub fn parse_table(parser: &mut Parser, pool: &ConstantPool) -> Result<Vec<Self>> {
        let count = parser.read_be::<u16>()?;
        let mut attributes = Vec::with_capacity(usize::from(count));
        for _ in 0..count {
            attributes.push(Self::parse(parser, pool)?);
        }
        Ok(attributes)
    }

    /// Serialize the attribute, interning its name.
    ///
    /// # Errors
    /// Returns an error if the pool overflows or the payload exceeds 4 GiB.
    pub fn write(&self, out: &mut Vec<u8>, pool: &mut ConstantPool) -> Result<()> {
        write_be(out, pool.intern_utf8(&self.name)?);
        write_len_u32(out, self.data.len(), &self.name)?;
        out.extend_from_slice(&self.data);
        Ok(())
    }

    /// Serialize a counted attribute table.
    ///
    /// # Errors
    /// See [`Attribute::write`].
    pub fn write_table(
        attributes: &[Attribute],
        out: &mut Vec<u8>,
        pool: &mut ConstantPool,
    ) -> Result<()> {
        write_len_u16(out, attributes.len(), "attributes")?;
        for attribute in attributes {
            attribute.write(out, pool)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_keeps_name_index() {
        let mut pool = ConstantPool::new();
        let name = pool.intern_utf8("SourceFile").unwrap();

        let mut data = Vec::new();
        write_be(&mut data, name);
        write_be(&mut data, 2_u32);
        data.extend_from_slice(&[0x00, 0x07]);

        let attribute = Attribute::parse(&mut Parser::new(&data), &pool).unwrap();
        assert_eq!(attribute.name, "SourceFile");
        assert_eq!(attribute.data, [0x00, 0x07]);

        let mut out = Vec::new();
        attribute.write(&mut out, &mut pool).unwrap();
        assert_eq!(out, data);
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn truncated_payload() {
        let mut pool = ConstantPool::new();
        let name = pool.intern_utf8("Deprecated").unwrap();

        let mut data = Vec::new();
        write_be(&mut data, name);
        write_be(&mut data, 4_u32);
        data.push(0);

        assert!(Attribute::parse(&mut Parser::new(&data), &pool).is_err());
    }
}
