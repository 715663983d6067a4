//! JVM class file format.
//!
//! The reader produces [`crate::registry::record::ClassRecord`] values and the writer turns them
//! back into bytes. The constant pool is append-only, so a class that was read and is written
//! again keeps every index its raw attributes refer to; classes the passes changed have their
//! pool compacted once serialized.
//!
//! # Module layout
//!
//! - [`constpool`] - constant pool parsing, lookup and interning
//! - [`compact`] - dropping unreferenced pool entries from rewritten classes
//! - [`mutf8`] - modified UTF-8 used by `CONSTANT_Utf8`
//! - [`flags`] - access flags
//! - [`attribute`] - raw attributes
//! - [`annotation`] - the removal marker inside annotation tables
//! - [`descriptor`] - field and method descriptors
//! - [`reader`] / [`writer`] - class file I/O
//! - [`builder`] - fluent class synthesis

pub mod annotation;
pub mod attribute;
pub mod builder;
pub mod compact;
pub mod constpool;
pub mod descriptor;
pub mod flags;
pub mod mutf8;
pub mod reader;
pub mod writer;

/// Magic number at the start of every class file
pub const MAGIC: u32 = 0xCAFE_BABE;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn rejects_non_class_data() {
        assert!(matches!(reader::parse_class(&[], "LM;"), Err(Error::Empty)));
        assert!(matches!(
            reader::parse_class(b"PK\x03\x04rest", "LM;"),
            Err(Error::NotSupported)
        ));
        assert!(matches!(
            reader::parse_class(&[0xCA, 0xFE, 0xBA, 0xBE, 0, 0], "LM;"),
            Err(Error::OutOfBounds)
        ));
    }
}
