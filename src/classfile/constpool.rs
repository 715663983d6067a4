//! The constant pool of a class file.
//!
//! Entries keep their original indices for the lifetime of a [`ConstantPool`]. Everything that
//! is not decoded symbolically (raw attributes such as `Signature`, `InnerClasses` or
//! `BootstrapMethods`) still points into the pool by index, so edits only ever append: a name
//! that is needed after a rewrite is interned, which reuses an existing equal entry or adds a
//! new one at the end. Entries that become unreferenced stay in place until the class is
//! written; [`crate::classfile::compact`] then drops them from changed classes through
//! [`ConstantPool::retain_slots`].
//!
//! # Examples
//!
//! ```rust
//! use coderemover::classfile::constpool::ConstantPool;
//!
//! let mut pool = ConstantPool::new();
//! let field = pool.intern_field_ref("com/example/Config", "enabled", "Z")?;
//!
//! // Interning the same reference again yields the same index
//! assert_eq!(pool.intern_field_ref("com/example/Config", "enabled", "Z")?, field);
//!
//! let member = pool.member_ref(field)?;
//! assert_eq!(member.owner, "com/example/Config");
//! # Ok::<(), coderemover::Error>(())
//! ```

use std::collections::HashMap;

use crate::{
    classfile::mutf8,
    file::{io::write_be, parser::Parser},
    Result,
};

/// Tag bytes of constant pool entries
#[allow(missing_docs)]
pub mod tag {
    pub const UTF8: u8 = 1;
    pub const INTEGER: u8 = 3;
    pub const FLOAT: u8 = 4;
    pub const LONG: u8 = 5;
    pub const DOUBLE: u8 = 6;
    pub const CLASS: u8 = 7;
    pub const STRING: u8 = 8;
    pub const FIELDREF: u8 = 9;
    pub const METHODREF: u8 = 10;
    pub const INTERFACE_METHODREF: u8 = 11;
    pub const NAME_AND_TYPE: u8 = 12;
    pub const METHOD_HANDLE: u8 = 15;
    pub const METHOD_TYPE: u8 = 16;
    pub const DYNAMIC: u8 = 17;
    pub const INVOKE_DYNAMIC: u8 = 18;
    pub const MODULE: u8 = 19;
    pub const PACKAGE: u8 = 20;
}

/// A single constant pool entry.
///
/// Index operands refer to other entries of the same pool. Floating point constants are stored
/// as their raw bit patterns so entries can be hashed and compared exactly.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum PoolEntry {
    /// Raw modified UTF-8 bytes
    Utf8(Vec<u8>),
    Integer(i32),
    Float(u32),
    Long(i64),
    Double(u64),
    Class(u16),
    String(u16),
    Fieldref { class: u16, name_and_type: u16 },
    Methodref { class: u16, name_and_type: u16 },
    InterfaceMethodref { class: u16, name_and_type: u16 },
    NameAndType { name: u16, descriptor: u16 },
    MethodHandle { kind: u8, reference: u16 },
    MethodType(u16),
    Dynamic { bootstrap: u16, name_and_type: u16 },
    InvokeDynamic { bootstrap: u16, name_and_type: u16 },
    Module(u16),
    Package(u16),
}

impl PoolEntry {
    /// Long and double constants occupy two pool slots
    #[must_use]
    pub fn is_wide(&self) -> bool {
        matches!(self, PoolEntry::Long(_) | PoolEntry::Double(_))
    }

    /// Pool indices this entry refers to.
    ///
    /// The bootstrap operand of `Dynamic` and `InvokeDynamic` indexes the `BootstrapMethods`
    /// attribute and is not included.
    pub fn references(&self) -> impl Iterator<Item = u16> {
        let references = match *self {
            PoolEntry::Class(index)
            | PoolEntry::String(index)
            | PoolEntry::MethodType(index)
            | PoolEntry::Module(index)
            | PoolEntry::Package(index)
            | PoolEntry::MethodHandle {
                reference: index, ..
            }
            | PoolEntry::Dynamic {
                name_and_type: index,
                ..
            }
            | PoolEntry::InvokeDynamic {
                name_and_type: index,
                ..
            } => [Some(index), None],
            PoolEntry::Fieldref {
                class,
                name_and_type,
            }
            | PoolEntry::Methodref {
                class,
                name_and_type,
            }
            | PoolEntry::InterfaceMethodref {
                class,
                name_and_type,
            } => [Some(class), Some(name_and_type)],
            PoolEntry::NameAndType { name, descriptor } => [Some(name), Some(descriptor)],
            PoolEntry::Utf8(_)
            | PoolEntry::Integer(_)
            | PoolEntry::Float(_)
            | PoolEntry::Long(_)
            | PoolEntry::Double(_) => [None, None],
        };
        references.into_iter().flatten()
    }

    /// A copy of this entry with every pool index passed through `map`
    #[must_use]
    pub fn map_references(&self, mut map: impl FnMut(u16) -> u16) -> PoolEntry {
        match *self {
            PoolEntry::Class(index) => PoolEntry::Class(map(index)),
            PoolEntry::String(index) => PoolEntry::String(map(index)),
            PoolEntry::MethodType(index) => PoolEntry::MethodType(map(index)),
            PoolEntry::Module(index) => PoolEntry::Module(map(index)),
            PoolEntry::Package(index) => PoolEntry::Package(map(index)),
            PoolEntry::Fieldref {
                class,
                name_and_type,
            } => PoolEntry::Fieldref {
                class: map(class),
                name_and_type: map(name_and_type),
            },
            PoolEntry::Methodref {
                class,
                name_and_type,
            } => PoolEntry::Methodref {
                class: map(class),
                name_and_type: map(name_and_type),
            },
            PoolEntry::InterfaceMethodref {
                class,
                name_and_type,
            } => PoolEntry::InterfaceMethodref {
                class: map(class),
                name_and_type: map(name_and_type),
            },
            PoolEntry::NameAndType { name, descriptor } => PoolEntry::NameAndType {
                name: map(name),
                descriptor: map(descriptor),
            },
            PoolEntry::MethodHandle { kind, reference } => PoolEntry::MethodHandle {
                kind,
                reference: map(reference),
            },
            PoolEntry::Dynamic {
                bootstrap,
                name_and_type,
            } => PoolEntry::Dynamic {
                bootstrap,
                name_and_type: map(name_and_type),
            },
            PoolEntry::InvokeDynamic {
                bootstrap,
                name_and_type,
            } => PoolEntry::InvokeDynamic {
                bootstrap,
                name_and_type: map(name_and_type),
            },
            PoolEntry::Utf8(_)
            | PoolEntry::Integer(_)
            | PoolEntry::Float(_)
            | PoolEntry::Long(_)
            | PoolEntry::Double(_) => self.clone(),
        }
    }
}

/// Which kind of member a resolved reference names
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefKind {
    /// `CONSTANT_Fieldref`
    Field,
    /// `CONSTANT_Methodref`
    Method,
    /// `CONSTANT_InterfaceMethodref`
    InterfaceMethod,
}

/// A field or method reference with all indices resolved to names
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberRef {
    /// Entry kind the reference was read from
    pub kind: RefKind,
    /// Internal name of the declaring class
    pub owner: String,
    /// Member name
    pub name: String,
    /// Member descriptor
    pub descriptor: String,
}

/// An indexed, append-only constant pool
#[derive(Debug, Clone)]
pub struct ConstantPool {
    /// Slot 0 and the upper halves of long/double entries are `None`
    entries: Vec<Option<PoolEntry>>,
    index: HashMap<PoolEntry, u16>,
}

impl Default for ConstantPool {
    fn default() -> Self {
        Self::new()
    }
}

impl ConstantPool {
    /// Create an empty pool containing only the unusable slot 0
    #[must_use]
    pub fn new() -> Self {
        ConstantPool {
            entries: vec![None],
            index: HashMap::new(),
        }
    }

    /// Parse a constant pool, starting at its `constant_pool_count`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for unknown tags and [`crate::Error::OutOfBounds`]
    /// for truncated data.
    pub fn parse(parser: &mut Parser) -> Result<Self> {
        let count = parser.read_be::<u16>()?;
        let mut pool = ConstantPool {
            entries: Vec::with_capacity(usize::from(count)),
            index: HashMap::new(),
        };
        pool.entries.push(None);

        let mut slot = 1_u16;
        while slot < count {
            let entry = Self::parse_entry(parser)?;
            let wide = entry.is_wide();
            pool.index.entry(entry.clone()).or_insert(slot);
            pool.entries.push(Some(entry));
            slot += 1;
            if wide {
                if slot >= count {
                    return Err(malformed_error!(
                        "Wide constant at slot {} overruns a pool of {} entries",
                        slot - 1,
                        count
                    ));
                }
                pool.entries.push(None);
                slot += 1;
            }
        }

        Ok(pool)
    }

    fn parse_entry(parser: &mut Parser) -> Result<PoolEntry> {
        let tag = parser.read_be::<u8>()?;
        let entry = match tag {
            tag::UTF8 => {
                let len = parser.read_be::<u16>()?;
                PoolEntry::Utf8(parser.read_bytes(usize::from(len))?.to_vec())
            }
            tag::INTEGER => PoolEntry::Integer(parser.read_be()?),
            tag::FLOAT => PoolEntry::Float(parser.read_be()?),
            tag::LONG => PoolEntry::Long(parser.read_be()?),
            tag::DOUBLE => PoolEntry::Double(parser.read_be()?),
            tag::CLASS => PoolEntry::Class(parser.read_be()?),
            tag::STRING => PoolEntry::String(parser.read_be()?),
            tag::FIELDREF => PoolEntry::Fieldref {
                class: parser.read_be()?,
                name_and_type: parser.read_be()?,
            },
            tag::METHODREF => PoolEntry::Methodref {
                class: parser.read_be()?,
                name_and_type: parser.read_be()?,
            },
            tag::INTERFACE_METHODREF => PoolEntry::InterfaceMethodref {
                class: parser.read_be()?,
                name_and_type: parser.read_be()?,
            },
            tag::NAME_AND_TYPE => PoolEntry::NameAndType {
                name: parser.read_be()?,
                descriptor: parser.read_be()?,
            },
            tag::METHOD_HANDLE => PoolEntry::MethodHandle {
                kind: parser.read_be()?,
                reference: parser.read_be()?,
            },
            tag::METHOD_TYPE => PoolEntry::MethodType(parser.read_be()?),
            tag::DYNAMIC => PoolEntry::Dynamic {
                bootstrap: parser.read_be()?,
                name_and_type: parser.read_be()?,
            },
            tag::INVOKE_DYNAMIC => PoolEntry::InvokeDynamic {
                bootstrap: parser.read_be()?,
                name_and_type: parser.read_be()?,
            },
            tag::MODULE => PoolEntry::Module(parser.read_be()?),
            tag::PACKAGE => PoolEntry::Package(parser.read_be()?),
            _ => {
                return Err(malformed_error!(
                    "Unknown constant pool tag {} at offset {}",
                    tag,
                    parser.pos() - 1
                ))
            }
        };
        Ok(entry)
    }

    /// Serialize the pool, including its `constant_pool_count`.
    pub fn write(&self, out: &mut Vec<u8>) {
        // intern() keeps entries.len() within u16 range
        write_be(out, self.entries.len() as u16);
        for entry in self.entries.iter().flatten() {
            match entry {
                PoolEntry::Utf8(bytes) => {
                    write_be(out, tag::UTF8);
                    write_be(out, bytes.len() as u16);
                    out.extend_from_slice(bytes);
                }
                PoolEntry::Integer(v) => {
                    write_be(out, tag::INTEGER);
                    write_be(out, *v);
                }
                PoolEntry::Float(bits) => {
                    write_be(out, tag::FLOAT);
                    write_be(out, *bits);
                }
                PoolEntry::Long(v) => {
                    write_be(out, tag::LONG);
                    write_be(out, *v);
                }
                PoolEntry::Double(bits) => {
                    write_be(out, tag::DOUBLE);
                    write_be(out, *bits);
                }
                PoolEntry::Class(i) => Self::write_single(out, tag::CLASS, *i),
                PoolEntry::String(i) => Self::write_single(out, tag::STRING, *i),
                PoolEntry::MethodType(i) => Self::write_single(out, tag::METHOD_TYPE, *i),
                PoolEntry::Module(i) => Self::write_single(out, tag::MODULE, *i),
                PoolEntry::Package(i) => Self::write_single(out, tag::PACKAGE, *i),
                PoolEntry::Fieldref {
                    class,
                    name_and_type,
                } => Self::write_pair(out, tag::FIELDREF, *class, *name_and_type),
                PoolEntry::Methodref {
                    class,
                    name_and_type,
                } => Self::write_pair(out, tag::METHODREF, *class, *name_and_type),
                PoolEntry::InterfaceMethodref {
                    class,
                    name_and_type,
                } => Self::write_pair(out, tag::INTERFACE_METHODREF, *class, *name_and_type),
                PoolEntry::NameAndType { name, descriptor } => {
                    Self::write_pair(out, tag::NAME_AND_TYPE, *name, *descriptor);
                }
                PoolEntry::Dynamic {
                    bootstrap,
                    name_and_type,
                } => Self::write_pair(out, tag::DYNAMIC, *bootstrap, *name_and_type),
                PoolEntry::InvokeDynamic {
                    bootstrap,
                    name_and_type,
                } => Self::write_pair(out, tag::INVOKE_DYNAMIC, *bootstrap, *name_and_type),
                PoolEntry::MethodHandle { kind, reference } => {
                    write_be(out, tag::METHOD_HANDLE);
                    write_be(out, *kind);
                    write_be(out, *reference);
                }
            }
        }
    }

    fn write_single(out: &mut Vec<u8>, tag: u8, index: u16) {
        write_be(out, tag);
        write_be(out, index);
    }

    fn write_pair(out: &mut Vec<u8>, tag: u8, first: u16, second: u16) {
        write_be(out, tag);
        write_be(out, first);
        write_be(out, second);
    }

    /// Number of slots, including slot 0 and the unusable upper halves of wide entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if the pool holds no entries besides slot 0
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.len() <= 1
    }

    /// Fetch the entry at `index`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for slot 0, unusable slots and out of range indices.
    pub fn get(&self, index: u16) -> Result<&PoolEntry> {
        match self.entries.get(usize::from(index)) {
            Some(Some(entry)) => Ok(entry),
            _ => Err(malformed_error!("Invalid constant pool index {}", index)),
        }
    }

    /// Resolve a `CONSTANT_Utf8` entry to a string.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the index does not name a valid Utf8 entry.
    pub fn utf8(&self, index: u16) -> Result<String> {
        match self.get(index)? {
            PoolEntry::Utf8(bytes) => mutf8::decode(bytes),
            other => Err(malformed_error!(
                "Expected Utf8 at constant pool index {}, found {:?}",
                index,
                other
            )),
        }
    }

    /// Resolve a `CONSTANT_Class` entry to the internal class name.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the index does not name a class entry.
    pub fn class_name(&self, index: u16) -> Result<String> {
        match self.get(index)? {
            PoolEntry::Class(name) => self.utf8(*name),
            other => Err(malformed_error!(
                "Expected Class at constant pool index {}, found {:?}",
                index,
                other
            )),
        }
    }

    /// Resolve a `CONSTANT_NameAndType` entry to its name and descriptor.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the index does not name a NameAndType entry.
    pub fn name_and_type(&self, index: u16) -> Result<(String, String)> {
        match self.get(index)? {
            PoolEntry::NameAndType { name, descriptor } => {
                Ok((self.utf8(*name)?, self.utf8(*descriptor)?))
            }
            other => Err(malformed_error!(
                "Expected NameAndType at constant pool index {}, found {:?}",
                index,
                other
            )),
        }
    }

    /// Resolve a field, method or interface method reference.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the index does not name a member reference.
    pub fn member_ref(&self, index: u16) -> Result<MemberRef> {
        let (kind, class, name_and_type) = match self.get(index)? {
            PoolEntry::Fieldref {
                class,
                name_and_type,
            } => (RefKind::Field, *class, *name_and_type),
            PoolEntry::Methodref {
                class,
                name_and_type,
            } => (RefKind::Method, *class, *name_and_type),
            PoolEntry::InterfaceMethodref {
                class,
                name_and_type,
            } => (RefKind::InterfaceMethod, *class, *name_and_type),
            other => {
                return Err(malformed_error!(
                    "Expected member reference at constant pool index {}, found {:?}",
                    index,
                    other
                ))
            }
        };

        let (name, descriptor) = self.name_and_type(name_and_type)?;
        Ok(MemberRef {
            kind,
            owner: self.class_name(class)?,
            name,
            descriptor,
        })
    }

    /// A pool holding only the slots `keep` selects, in their original order.
    ///
    /// Returns the new pool and a table mapping every old slot to its new index, 0 for dropped
    /// slots. References inside the kept entries are remapped, so every entry a kept entry
    /// refers to must be kept as well.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if a kept entry refers to a dropped or invalid slot.
    pub fn retain_slots(&self, keep: &[bool]) -> Result<(ConstantPool, Vec<u16>)> {
        let mut remap = vec![0_u16; self.entries.len()];
        let mut next = 1_u16;
        for (slot, entry) in self.entries.iter().enumerate() {
            if let Some(entry) = entry {
                if keep.get(slot).copied().unwrap_or(false) {
                    remap[slot] = next;
                    next += if entry.is_wide() { 2 } else { 1 };
                }
            }
        }

        let mut pool = ConstantPool {
            entries: Vec::with_capacity(usize::from(next)),
            index: HashMap::new(),
        };
        pool.entries.push(None);
        let mut dangling = None;
        for (slot, entry) in self.entries.iter().enumerate() {
            let Some(entry) = entry else { continue };
            if remap[slot] == 0 {
                continue;
            }
            let mapped = entry.map_references(|index| {
                let new = remap.get(usize::from(index)).copied().unwrap_or(0);
                if new == 0 {
                    dangling.get_or_insert(index);
                }
                new
            });
            let wide = mapped.is_wide();
            pool.index.entry(mapped.clone()).or_insert(remap[slot]);
            pool.entries.push(Some(mapped));
            if wide {
                pool.entries.push(None);
            }
        }

        if let Some(index) = dangling {
            return Err(malformed_error!(
                "Kept constant pool entry refers to dropped slot {}",
                index
            ));
        }
        Ok((pool, remap))
    }

    /// Add `entry` unless an equal entry already exists, returning its index.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the pool would exceed 65535 slots.
    pub fn intern(&mut self, entry: PoolEntry) -> Result<u16> {
        if let Some(&index) = self.index.get(&entry) {
            return Ok(index);
        }

        let needed = if entry.is_wide() { 2 } else { 1 };
        let Ok(index) = u16::try_from(self.entries.len()) else {
            return Err(malformed_error!("Constant pool overflow"));
        };
        if self.entries.len() + needed > usize::from(u16::MAX) {
            return Err(malformed_error!("Constant pool overflow"));
        }

        let wide = entry.is_wide();
        self.index.insert(entry.clone(), index);
        self.entries.push(Some(entry));
        if wide {
            self.entries.push(None);
        }
        Ok(index)
    }

    /// Intern a string as `CONSTANT_Utf8`.
    ///
    /// # Errors
    /// See [`ConstantPool::intern`]; additionally fails if the encoded string exceeds 65535 bytes.
    pub fn intern_utf8(&mut self, value: &str) -> Result<u16> {
        let bytes = mutf8::encode(value);
        if bytes.len() > usize::from(u16::MAX) {
            return Err(malformed_error!(
                "String constant of {} bytes is too long",
                bytes.len()
            ));
        }
        self.intern(PoolEntry::Utf8(bytes))
    }

    /// Intern a `CONSTANT_Class` for an internal name.
    ///
    /// # Errors
    /// See [`ConstantPool::intern`].
    pub fn intern_class(&mut self, name: &str) -> Result<u16> {
        let name = self.intern_utf8(name)?;
        self.intern(PoolEntry::Class(name))
    }

    /// Intern a `CONSTANT_String` literal.
    ///
    /// # Errors
    /// See [`ConstantPool::intern`].
    pub fn intern_string(&mut self, value: &str) -> Result<u16> {
        let value = self.intern_utf8(value)?;
        self.intern(PoolEntry::String(value))
    }

    /// Intern a `CONSTANT_NameAndType`.
    ///
    /// # Errors
    /// See [`ConstantPool::intern`].
    pub fn intern_name_and_type(&mut self, name: &str, descriptor: &str) -> Result<u16> {
        let name = self.intern_utf8(name)?;
        let descriptor = self.intern_utf8(descriptor)?;
        self.intern(PoolEntry::NameAndType { name, descriptor })
    }

    /// Intern a `CONSTANT_Fieldref`.
    ///
    /// # Errors
    /// See [`ConstantPool::intern`].
    pub fn intern_field_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> Result<u16> {
        let class = self.intern_class(owner)?;
        let name_and_type = self.intern_name_and_type(name, descriptor)?;
        self.intern(PoolEntry::Fieldref {
            class,
            name_and_type,
        })
    }

    /// Intern a `CONSTANT_Methodref`, or a `CONSTANT_InterfaceMethodref` if `interface` is set.
    ///
    /// # Errors
    /// See [`ConstantPool::intern`].
    pub fn intern_method_ref(
        &mut self,
        owner: &str,
        name: &str,
        descriptor: &str,
        interface: bool,
    ) -> Result<u16> {
        let class = self.intern_class(owner)?;
        let name_and_type = self.intern_name_and_type(name, descriptor)?;
        if interface {
            self.intern(PoolEntry::InterfaceMethodref {
                class,
                name_and_type,
            })
        } else {
            self.intern(PoolEntry::Methodref {
                class,
                name_and_type,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_pool_bytes() -> Vec<u8> {
        let mut data = Vec::new();
        write_be(&mut data, 6_u16);
        // #1 Utf8 "A"
        data.extend_from_slice(&[tag::UTF8, 0x00, 0x01, b'A']);
        // #2 Class #1
        data.extend_from_slice(&[tag::CLASS, 0x00, 0x01]);
        // #3 Long, occupies #3 and #4
        data.push(tag::LONG);
        write_be(&mut data, 7_i64);
        // #5 Integer
        data.push(tag::INTEGER);
        write_be(&mut data, -3_i32);
        data
    }

    #[test]
    fn parse_with_wide_entries() {
        let data = sample_pool_bytes();
        let pool = ConstantPool::parse(&mut Parser::new(&data)).unwrap();

        assert_eq!(pool.len(), 6);
        assert_eq!(pool.class_name(2).unwrap(), "A");
        assert_eq!(pool.get(3).unwrap(), &PoolEntry::Long(7));
        assert!(pool.get(4).is_err());
        assert_eq!(pool.get(5).unwrap(), &PoolEntry::Integer(-3));
        assert!(pool.get(0).is_err());
    }

    #[test]
    fn write_is_byte_identical() {
        let data = sample_pool_bytes();
        let pool = ConstantPool::parse(&mut Parser::new(&data)).unwrap();

        let mut out = Vec::new();
        pool.write(&mut out);
        assert_eq!(out, data);
    }

    #[test]
    fn interning_reuses_parsed_entries() {
        let data = sample_pool_bytes();
        let mut pool = ConstantPool::parse(&mut Parser::new(&data)).unwrap();

        assert_eq!(pool.intern_class("A").unwrap(), 2);
        assert_eq!(pool.intern_class("B").unwrap(), 7);
        assert_eq!(pool.len(), 8);
        assert_eq!(pool.intern(PoolEntry::Double(0)).unwrap(), 8);
        assert_eq!(pool.len(), 10);
    }

    #[test]
    fn member_refs_resolve() {
        let mut pool = ConstantPool::new();
        let field = pool.intern_field_ref("p/C", "f", "I").unwrap();
        let method = pool.intern_method_ref("p/I", "run", "()V", true).unwrap();

        let field = pool.member_ref(field).unwrap();
        assert_eq!(field.kind, RefKind::Field);
        assert_eq!((field.name.as_str(), field.descriptor.as_str()), ("f", "I"));

        let method = pool.member_ref(method).unwrap();
        assert_eq!(method.kind, RefKind::InterfaceMethod);
        assert_eq!(method.owner, "p/I");
    }

    #[test]
    fn wrong_entry_kind_is_malformed() {
        let mut pool = ConstantPool::new();
        let utf8 = pool.intern_utf8("x").unwrap();
        assert!(pool.class_name(utf8).is_err());
        assert!(pool.member_ref(utf8).is_err());
        assert!(pool.get(99).is_err());
    }

    #[test]
    fn retain_slots_remaps_references() {
        let mut pool = ConstantPool::new();
        let dropped = pool.intern_class("p/Gone").unwrap();
        let wide = pool.intern(PoolEntry::Long(9)).unwrap();
        let field = pool.intern_field_ref("p/C", "f", "I").unwrap();

        let mut keep = vec![false; pool.len()];
        keep[usize::from(wide)] = true;
        let mut pending = vec![field];
        while let Some(index) = pending.pop() {
            keep[usize::from(index)] = true;
            pending.extend(pool.get(index).unwrap().references());
        }

        let (mut compacted, remap) = pool.retain_slots(&keep).unwrap();
        assert_eq!(remap[usize::from(dropped)], 0);
        assert_eq!(remap[usize::from(wide)], 1);
        assert_eq!(compacted.get(1).unwrap(), &PoolEntry::Long(9));
        assert!(compacted.get(2).is_err());

        let member = compacted.member_ref(remap[usize::from(field)]).unwrap();
        assert_eq!(
            (member.owner.as_str(), member.name.as_str(), member.descriptor.as_str()),
            ("p/C", "f", "I")
        );
        assert_eq!(compacted.len(), pool.len() - 2);
        // the lookup index follows the new slots
        assert_eq!(compacted.intern_utf8("f").unwrap(), 5);
        assert_eq!(compacted.len(), pool.len() - 2);

        keep[usize::from(field) - 1] = false;
        assert!(pool.retain_slots(&keep).is_err());
    }

    #[test]
    fn unknown_tag() {
        let data = [0x00, 0x02, 0x02, 0x00];
        assert!(ConstantPool::parse(&mut Parser::new(&data)).is_err());
    }
}
