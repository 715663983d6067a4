//! Constant pool compaction for rewritten classes.
//!
//! A class that went through the removal passes still carries the pool it was read with,
//! including the names of everything that was removed. Compaction walks the serialized class,
//! records every position that holds a pool index, keeps the entries reachable from those
//! positions in their original order and patches the indices in place. Entries only ever move
//! to lower indices, so `ldc` operands keep their width and no code offset changes.
//!
//! A class carrying an attribute with an unknown layout is left alone, since the indices inside
//! it cannot be located.

use log::debug;

use crate::{
    classfile::{attribute::names, constpool::ConstantPool, MAGIC},
    file::parser::Parser,
    instruction::opcodes::{self, *},
    Error, Result,
};

/// Offset of the constant pool in a class file
const POOL_OFFSET: usize = 8;

/// A position in the class file holding a pool index
#[derive(Debug, Clone, Copy)]
enum Site {
    /// A `u2` index
    Index(usize),
    /// The `u1` index of `ldc`
    Narrow(usize),
}

struct Scanner<'a> {
    parser: Parser<'a>,
    pool: &'a ConstantPool,
    sites: Vec<Site>,
    unknown: Option<String>,
}

/// Drop every constant pool entry the serialized class `data` no longer refers to.
///
/// Returns `None` if nothing can be dropped, or if the class has an attribute whose layout is
/// unknown.
///
/// # Errors
/// Returns [`Error::NotSupported`] if `data` is not a class file, and
/// [`crate::Error::Malformed`] or [`crate::Error::OutOfBounds`] if a structure that holds pool
/// indices is damaged.
pub fn compact_pool(data: &[u8]) -> Result<Option<Vec<u8>>> {
    let mut parser = Parser::new(data);
    if parser.read_be::<u32>()? != MAGIC {
        return Err(Error::NotSupported);
    }
    parser.seek(POOL_OFFSET)?;
    let pool = ConstantPool::parse(&mut parser)?;
    let body_start = parser.pos();

    let mut scanner = Scanner {
        parser,
        pool: &pool,
        sites: Vec::new(),
        unknown: None,
    };
    scanner.class_body()?;
    if scanner.parser.has_more_data() {
        return Err(malformed_error!(
            "{} trailing bytes after class body",
            scanner.parser.remaining()
        ));
    }
    if let Some(name) = scanner.unknown {
        debug!("Keeping the full constant pool, attribute {} is opaque", name);
        return Ok(None);
    }
    let sites = scanner.sites;

    let mut keep = vec![false; pool.len()];
    let mut pending: Vec<u16> = sites.iter().map(|site| site_value(data, *site)).collect();
    while let Some(index) = pending.pop() {
        if index == 0 || keep.get(usize::from(index)).copied().unwrap_or(false) {
            continue;
        }
        let entry = pool.get(index)?;
        keep[usize::from(index)] = true;
        pending.extend(entry.references());
    }

    let live = (1..pool.len()).filter(|&slot| pool.get(slot as u16).is_ok());
    let dropped = live.filter(|&slot| !keep[slot]).count();
    if dropped == 0 {
        return Ok(None);
    }

    let (compacted, remap) = pool.retain_slots(&keep)?;
    let mut body = data[body_start..].to_vec();
    for site in sites {
        match site {
            Site::Index(at) => {
                let at = at - body_start;
                let old = u16::from_be_bytes([body[at], body[at + 1]]);
                body[at..at + 2].copy_from_slice(&remap[usize::from(old)].to_be_bytes());
            }
            Site::Narrow(at) => {
                let at = at - body_start;
                let Ok(new) = u8::try_from(remap[usize::from(body[at])]) else {
                    return Err(malformed_error!("ldc index no longer fits at {}", at));
                };
                body[at] = new;
            }
        }
    }

    debug!(
        "Dropped {} of {} constant pool slots",
        pool.len() - compacted.len(),
        pool.len()
    );

    let mut out = Vec::with_capacity(data.len());
    out.extend_from_slice(&data[..POOL_OFFSET]);
    compacted.write(&mut out);
    out.extend_from_slice(&body);
    Ok(Some(out))
}

fn site_value(data: &[u8], site: Site) -> u16 {
    match site {
        Site::Index(at) => u16::from_be_bytes([data[at], data[at + 1]]),
        Site::Narrow(at) => u16::from(data[at]),
    }
}

impl Scanner<'_> {
    fn count(&mut self) -> Result<u16> {
        self.parser.read_be()
    }

    fn skip(&mut self, len: usize) -> Result<()> {
        self.parser.advance_by(len)
    }

    fn index(&mut self) -> Result<u16> {
        self.sites.push(Site::Index(self.parser.pos()));
        self.parser.read_be()
    }

    fn index_table(&mut self) -> Result<()> {
        for _ in 0..self.count()? {
            self.index()?;
        }
        Ok(())
    }

    fn class_body(&mut self) -> Result<()> {
        self.skip(2)?;
        self.index()?;
        self.index()?;
        self.index_table()?;
        // fields, then methods
        for _ in 0..2 {
            for _ in 0..self.count()? {
                self.skip(2)?;
                self.index()?;
                self.index()?;
                self.attributes()?;
            }
        }
        self.attributes()
    }

    fn attributes(&mut self) -> Result<()> {
        for _ in 0..self.count()? {
            self.attribute()?;
        }
        Ok(())
    }

    fn attribute(&mut self) -> Result<()> {
        let name = self.pool.utf8(self.index()?)?;
        let len = self.parser.read_be::<u32>()? as usize;
        let start = self.parser.pos();
        if len > self.parser.remaining() {
            return Err(out_of_bounds_error!());
        }
        let end = start + len;

        match name.as_str() {
            names::CODE => self.code()?,
            names::SOURCE_FILE
            | names::SIGNATURE
            | names::CONSTANT_VALUE
            | names::NEST_HOST
            | names::MODULE_MAIN_CLASS => {
                self.index()?;
            }
            names::EXCEPTIONS
            | names::NEST_MEMBERS
            | names::PERMITTED_SUBCLASSES
            | names::MODULE_PACKAGES => self.index_table()?,
            names::INNER_CLASSES => {
                for _ in 0..self.count()? {
                    self.index()?;
                    self.index()?;
                    self.index()?;
                    self.skip(2)?;
                }
            }
            names::ENCLOSING_METHOD => {
                self.index()?;
                self.index()?;
            }
            names::BOOTSTRAP_METHODS => {
                for _ in 0..self.count()? {
                    self.index()?;
                    self.index_table()?;
                }
            }
            names::RECORD => {
                for _ in 0..self.count()? {
                    self.index()?;
                    self.index()?;
                    self.attributes()?;
                }
            }
            names::MODULE => self.module()?,
            names::METHOD_PARAMETERS => {
                for _ in 0..self.parser.read_be::<u8>()? {
                    self.index()?;
                    self.skip(2)?;
                }
            }
            names::RUNTIME_VISIBLE_ANNOTATIONS | names::RUNTIME_INVISIBLE_ANNOTATIONS => {
                self.annotations()?;
            }
            names::RUNTIME_VISIBLE_PARAMETER_ANNOTATIONS
            | names::RUNTIME_INVISIBLE_PARAMETER_ANNOTATIONS => {
                for _ in 0..self.parser.read_be::<u8>()? {
                    self.annotations()?;
                }
            }
            names::RUNTIME_VISIBLE_TYPE_ANNOTATIONS | names::RUNTIME_INVISIBLE_TYPE_ANNOTATIONS => {
                for _ in 0..self.count()? {
                    self.type_annotation()?;
                }
            }
            names::ANNOTATION_DEFAULT => self.element_value()?,
            names::LOCAL_VARIABLE_TABLE | names::LOCAL_VARIABLE_TYPE_TABLE => {
                for _ in 0..self.count()? {
                    self.skip(4)?;
                    self.index()?;
                    self.index()?;
                    self.skip(2)?;
                }
            }
            names::STACK_MAP_TABLE => self.stack_map()?,
            names::LINE_NUMBER_TABLE
            | names::SOURCE_DEBUG_EXTENSION
            | names::DEPRECATED
            | names::SYNTHETIC => self.parser.seek(end)?,
            _ => {
                self.unknown.get_or_insert(name.clone());
                self.parser.seek(end)?;
            }
        }

        if self.parser.pos() != end {
            return Err(malformed_error!(
                "Attribute {} declares {} bytes but its content spans {}",
                name,
                len,
                self.parser.pos() - start
            ));
        }
        Ok(())
    }

    fn code(&mut self) -> Result<()> {
        self.skip(4)?;
        let len = self.parser.read_be::<u32>()? as usize;
        let code_start = self.parser.pos();
        if len > self.parser.remaining() {
            return Err(out_of_bounds_error!());
        }
        let code_end = code_start + len;
        while self.parser.pos() < code_end {
            self.instruction(code_start)?;
        }
        if self.parser.pos() != code_end {
            return Err(malformed_error!("Last instruction overruns the code"));
        }

        for _ in 0..self.count()? {
            self.skip(6)?;
            self.index()?;
        }
        self.attributes()
    }

    fn instruction(&mut self, code_start: usize) -> Result<()> {
        let opcode = self.parser.read_be::<u8>()?;
        match opcode {
            LDC => {
                self.sites.push(Site::Narrow(self.parser.pos()));
                self.skip(1)?;
            }
            LDC_W | LDC2_W | GETSTATIC..=INVOKESTATIC | NEW | ANEWARRAY | CHECKCAST
            | INSTANCEOF => {
                self.index()?;
            }
            INVOKEINTERFACE | INVOKEDYNAMIC => {
                self.index()?;
                self.skip(2)?;
            }
            MULTIANEWARRAY => {
                self.index()?;
                self.skip(1)?;
            }
            BIPUSH | ILOAD..=ALOAD => self.skip(1)?,
            SIPUSH => self.skip(2)?,
            ILOAD_0..=ALOAD_3 => {}
            _ if opcodes::is_short_branch(opcode) => self.skip(2)?,
            GOTO_W | JSR_W => self.skip(4)?,
            WIDE => {
                let inner = self.parser.read_be::<u8>()?;
                self.skip(if inner == IINC { 4 } else { 2 })?;
            }
            TABLESWITCH => {
                self.parser.align(code_start, 4)?;
                self.skip(4)?;
                let low = self.parser.read_be::<i32>()?;
                let high = self.parser.read_be::<i32>()?;
                if low > high {
                    return Err(malformed_error!("tableswitch low {} above high {}", low, high));
                }
                let count = (i64::from(high) - i64::from(low) + 1) as usize;
                self.skip(count * 4)?;
            }
            LOOKUPSWITCH => {
                self.parser.align(code_start, 4)?;
                self.skip(4)?;
                let Ok(count) = usize::try_from(self.parser.read_be::<i32>()?) else {
                    return Err(malformed_error!("lookupswitch with negative pair count"));
                };
                self.skip(count * 8)?;
            }
            _ => match opcodes::plain_operand_len(opcode) {
                Some(len) => self.skip(len)?,
                None => return Err(malformed_error!("Unknown opcode 0x{:02X}", opcode)),
            },
        }
        Ok(())
    }

    fn stack_map(&mut self) -> Result<()> {
        for _ in 0..self.count()? {
            let frame = self.parser.read_be::<u8>()?;
            match frame {
                0..=63 => {}
                64..=127 => self.verification_types(1)?,
                247 => {
                    self.skip(2)?;
                    self.verification_types(1)?;
                }
                248..=251 => self.skip(2)?,
                252..=254 => {
                    self.skip(2)?;
                    self.verification_types(u16::from(frame - 251))?;
                }
                255 => {
                    self.skip(2)?;
                    let locals = self.count()?;
                    self.verification_types(locals)?;
                    let stack = self.count()?;
                    self.verification_types(stack)?;
                }
                _ => return Err(malformed_error!("Reserved stack map frame type {}", frame)),
            }
        }
        Ok(())
    }

    fn verification_types(&mut self, count: u16) -> Result<()> {
        for _ in 0..count {
            match self.parser.read_be::<u8>()? {
                0..=6 => {}
                // Object
                7 => {
                    self.index()?;
                }
                // Uninitialized
                8 => self.skip(2)?,
                tag => return Err(malformed_error!("Invalid verification type {}", tag)),
            }
        }
        Ok(())
    }

    fn module(&mut self) -> Result<()> {
        self.index()?;
        self.skip(2)?;
        self.index()?;
        for _ in 0..self.count()? {
            self.index()?;
            self.skip(2)?;
            self.index()?;
        }
        // exports, then opens
        for _ in 0..2 {
            for _ in 0..self.count()? {
                self.index()?;
                self.skip(2)?;
                self.index_table()?;
            }
        }
        self.index_table()?;
        for _ in 0..self.count()? {
            self.index()?;
            self.index_table()?;
        }
        Ok(())
    }

    fn annotations(&mut self) -> Result<()> {
        for _ in 0..self.count()? {
            self.annotation()?;
        }
        Ok(())
    }

    fn annotation(&mut self) -> Result<()> {
        self.index()?;
        for _ in 0..self.count()? {
            self.index()?;
            self.element_value()?;
        }
        Ok(())
    }

    fn element_value(&mut self) -> Result<()> {
        match self.parser.read_be::<u8>()? {
            b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z' | b's' | b'c' => {
                self.index()?;
            }
            b'e' => {
                self.index()?;
                self.index()?;
            }
            b'@' => self.annotation()?,
            b'[' => {
                for _ in 0..self.count()? {
                    self.element_value()?;
                }
            }
            tag => {
                return Err(malformed_error!(
                    "Invalid element value tag {:?}",
                    char::from(tag)
                ))
            }
        }
        Ok(())
    }

    fn type_annotation(&mut self) -> Result<()> {
        let target = self.parser.read_be::<u8>()?;
        match target {
            0x13..=0x15 => {}
            0x00 | 0x01 | 0x16 => self.skip(1)?,
            0x10..=0x12 | 0x17 | 0x42..=0x46 => self.skip(2)?,
            0x47..=0x4B => self.skip(3)?,
            0x40 | 0x41 => {
                let ranges = self.count()?;
                self.skip(usize::from(ranges) * 6)?;
            }
            _ => return Err(malformed_error!("Invalid type annotation target 0x{:02X}", target)),
        }
        let path = self.parser.read_be::<u8>()?;
        self.skip(usize::from(path) * 2)?;
        self.annotation()
    }
}
