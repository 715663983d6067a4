//! Fluent construction of class files.
//!
//! [`ClassBuilder`] assembles a [`ClassRecord`] from names and instructions and serializes it
//! with the regular writer, so the produced bytes read back exactly like compiler output would.
//! It is used to synthesize classes for tests and benchmarks; stack map frames are not
//! generated.
//!
//! # Examples
//!
//! ```rust
//! use coderemover::classfile::{builder::ClassBuilder, reader::parse_class};
//!
//! let marker = "Lcoderemover/Removable;";
//! let bytes = ClassBuilder::new("demo/Config")
//!     .field("debug", "Z")
//!     .marked(true)
//!     .done()
//!     .method("<init>", "()V")
//!     .aload(0)
//!     .invoke_special("java/lang/Object", "<init>", "()V")
//!     .aload(0)
//!     .iconst(1)
//!     .put_field("demo/Config", "debug", "Z")
//!     .vreturn()
//!     .done()
//!     .build(marker)?;
//!
//! let class = parse_class(&bytes, marker)?;
//! assert!(class.fields[0].marker.is_some());
//! # Ok::<(), coderemover::Error>(())
//! ```

use crate::{
    classfile::{
        annotation::marker_table,
        attribute::{names, Attribute},
        constpool::ConstantPool,
        descriptor,
        flags::{ClassAccessFlags, FieldAccessFlags, MethodAccessFlags},
        writer::write_class,
    },
    instruction::{
        code::CodeBody, list::InsnList, opcodes, Constant, FieldInsn, FieldOp, Instruction,
        InvokeKind, Label, LdcWidth, MethodInsn, PopKind, SlotEncoding, TypeInsn, TypeOp,
        ValueKind,
    },
    registry::record::{ClassKind, ClassRecord, FieldRecord, MethodRecord, OBJECT},
    Error, Result,
};

/// Class file version written by default (Java 8)
pub const DEFAULT_MAJOR_VERSION: u16 = 52;

/// Builds a class file
#[derive(Debug)]
pub struct ClassBuilder {
    name: String,
    super_name: Option<String>,
    interfaces: Vec<String>,
    access: ClassAccessFlags,
    major_version: u16,
    marker: Option<bool>,
    fields: Vec<(FieldRecord, Option<bool>)>,
    methods: Vec<(MethodRecord, Option<bool>)>,
    pool: ConstantPool,
    error: Option<Error>,
}

impl ClassBuilder {
    /// Start a public class extending `java/lang/Object`
    pub fn new(name: impl Into<String>) -> Self {
        ClassBuilder {
            name: name.into(),
            super_name: Some(OBJECT.to_string()),
            interfaces: Vec::new(),
            access: ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER,
            major_version: DEFAULT_MAJOR_VERSION,
            marker: None,
            fields: Vec::new(),
            methods: Vec::new(),
            pool: ConstantPool::new(),
            error: None,
        }
    }

    /// Set the superclass
    #[must_use]
    pub fn super_name(mut self, name: impl Into<String>) -> Self {
        self.super_name = Some(name.into());
        self
    }

    /// Add an implemented interface
    #[must_use]
    pub fn interface(mut self, name: impl Into<String>) -> Self {
        self.interfaces.push(name.into());
        self
    }

    /// Replace the access flags
    #[must_use]
    pub fn access(mut self, access: ClassAccessFlags) -> Self {
        self.access = access;
        self
    }

    /// Declare the class as an interface
    #[must_use]
    pub fn as_interface(self) -> Self {
        self.access(
            ClassAccessFlags::PUBLIC | ClassAccessFlags::INTERFACE | ClassAccessFlags::ABSTRACT,
        )
    }

    /// Declare the class as an annotation type
    #[must_use]
    pub fn as_annotation(self) -> Self {
        self.access(
            ClassAccessFlags::PUBLIC
                | ClassAccessFlags::INTERFACE
                | ClassAccessFlags::ABSTRACT
                | ClassAccessFlags::ANNOTATION,
        )
    }

    /// Declare the class as an enum extending `java/lang/Enum`
    #[must_use]
    pub fn as_enum(self) -> Self {
        self.access(ClassAccessFlags::PUBLIC | ClassAccessFlags::FINAL | ClassAccessFlags::ENUM)
            .super_name(crate::registry::record::ENUM)
    }

    /// Set the class file major version
    #[must_use]
    pub fn major_version(mut self, version: u16) -> Self {
        self.major_version = version;
        self
    }

    /// Attach the removal marker with the given `remove` value
    #[must_use]
    pub fn marked(mut self, remove: bool) -> Self {
        self.marker = Some(remove);
        self
    }

    /// Start declaring a field
    pub fn field(self, name: impl Into<String>, descriptor: impl Into<String>) -> FieldBuilder {
        FieldBuilder {
            class: self,
            field: FieldRecord {
                access: FieldAccessFlags::PRIVATE,
                name: name.into(),
                descriptor: descriptor.into(),
                marker: None,
                attributes: Vec::new(),
            },
            remove: None,
        }
    }

    /// Start declaring a method with a body
    pub fn method(self, name: impl Into<String>, descriptor: impl Into<String>) -> MethodBuilder {
        let name = name.into();
        let access = if name == crate::registry::record::CLINIT {
            MethodAccessFlags::STATIC
        } else {
            MethodAccessFlags::PUBLIC
        };
        MethodBuilder {
            class: self,
            method: MethodRecord {
                access,
                name,
                descriptor: descriptor.into(),
                marker: None,
                attributes: Vec::new(),
                code: None,
            },
            insns: InsnList::new(),
            remove: None,
            has_body: true,
        }
    }

    fn record_error(&mut self, error: Error) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    /// Assemble the class record.
    ///
    /// Markers are only attached as annotation attributes and method bodies are not encoded yet;
    /// use [`ClassBuilder::build`] and the reader for a record as it comes out of an archive.
    ///
    /// # Errors
    /// Returns the first error raised while adding content, or a pool overflow.
    pub fn into_record(self, marker: &str) -> Result<ClassRecord> {
        if let Some(error) = self.error {
            return Err(error);
        }

        let mut pool = self.pool;
        let mut attributes = Vec::new();
        if let Some(remove) = self.marker {
            attributes.push(Attribute::new(
                names::RUNTIME_INVISIBLE_ANNOTATIONS,
                marker_table(&mut pool, marker, remove)?,
            ));
        }

        let mut fields = Vec::with_capacity(self.fields.len());
        for (mut field, remove) in self.fields {
            if let Some(remove) = remove {
                field.attributes.push(Attribute::new(
                    names::RUNTIME_INVISIBLE_ANNOTATIONS,
                    marker_table(&mut pool, marker, remove)?,
                ));
            }
            fields.push(field);
        }

        let mut methods = Vec::with_capacity(self.methods.len());
        for (mut method, remove) in self.methods {
            if let Some(remove) = remove {
                method.attributes.push(Attribute::new(
                    names::RUNTIME_INVISIBLE_ANNOTATIONS,
                    marker_table(&mut pool, marker, remove)?,
                ));
            }
            methods.push(method);
        }

        Ok(ClassRecord {
            kind: ClassKind::classify(self.access, self.super_name.as_deref()),
            name: self.name,
            super_name: self.super_name,
            interfaces: self.interfaces,
            fields,
            methods,
            access: self.access,
            minor_version: 0,
            major_version: self.major_version,
            marker: None,
            attributes,
            pool,
            modified: false,
        })
    }

    /// Serialize the class.
    ///
    /// # Errors
    /// Returns the first error raised while adding content, or an encoding failure.
    pub fn build(self, marker: &str) -> Result<Vec<u8>> {
        write_class(&self.into_record(marker)?)
    }
}

/// Builds one field of a [`ClassBuilder`]
#[derive(Debug)]
pub struct FieldBuilder {
    class: ClassBuilder,
    field: FieldRecord,
    remove: Option<bool>,
}

impl FieldBuilder {
    /// Replace the access flags
    #[must_use]
    pub fn access(mut self, access: FieldAccessFlags) -> Self {
        self.field.access = access;
        self
    }

    /// Make the field static
    #[must_use]
    pub fn static_(mut self) -> Self {
        self.field.access |= FieldAccessFlags::STATIC;
        self
    }

    /// Attach the removal marker with the given `remove` value
    #[must_use]
    pub fn marked(mut self, remove: bool) -> Self {
        self.remove = Some(remove);
        self
    }

    /// Finish the field
    pub fn done(mut self) -> ClassBuilder {
        self.class.fields.push((self.field, self.remove));
        self.class
    }
}

/// Builds one method of a [`ClassBuilder`]
#[derive(Debug)]
pub struct MethodBuilder {
    class: ClassBuilder,
    method: MethodRecord,
    insns: InsnList,
    remove: Option<bool>,
    has_body: bool,
}

impl MethodBuilder {
    /// Replace the access flags
    #[must_use]
    pub fn access(mut self, access: MethodAccessFlags) -> Self {
        self.method.access = access;
        self
    }

    /// Declare the method abstract; it gets no `Code` attribute
    #[must_use]
    pub fn abstract_(mut self) -> Self {
        self.method.access = MethodAccessFlags::PUBLIC | MethodAccessFlags::ABSTRACT;
        self.has_body = false;
        self
    }

    /// Attach the removal marker with the given `remove` value
    #[must_use]
    pub fn marked(mut self, remove: bool) -> Self {
        self.remove = Some(remove);
        self
    }

    /// Append any instruction
    #[must_use]
    pub fn insn(mut self, insn: Instruction) -> Self {
        self.insns.push(insn);
        self
    }

    fn other(self, opcode: u8) -> Self {
        self.insn(Instruction::Other {
            opcode,
            operands: Vec::new(),
        })
    }

    /// Allocate a label to be placed later with [`MethodBuilder::label`]
    pub fn new_label(&mut self) -> Label {
        self.insns.new_label()
    }

    /// Place a label
    #[must_use]
    pub fn label(self, label: Label) -> Self {
        self.insn(Instruction::Label(label))
    }

    /// A branch instruction with `opcode` to `target`
    #[must_use]
    pub fn branch(self, opcode: u8, target: Label) -> Self {
        self.insn(Instruction::Branch { opcode, target })
    }

    /// Load a reference local
    #[must_use]
    pub fn aload(self, slot: u16) -> Self {
        self.load(ValueKind::Reference, slot)
    }

    /// Load an int local
    #[must_use]
    pub fn iload(self, slot: u16) -> Self {
        self.load(ValueKind::Int, slot)
    }

    /// Load a local of the given kind with the shortest encoding
    #[must_use]
    pub fn load(self, kind: ValueKind, slot: u16) -> Self {
        self.insn(Instruction::LocalLoad {
            kind,
            slot,
            encoding: SlotEncoding::Implicit,
        })
    }

    /// Push an int constant with the shortest encoding
    #[must_use]
    pub fn iconst(mut self, value: i32) -> Self {
        let constant = if (-1..=5).contains(&value) {
            Constant::Int(value as i8)
        } else if let Ok(byte) = i8::try_from(value) {
            Constant::Byte(byte)
        } else if let Ok(short) = i16::try_from(value) {
            Constant::Short(short)
        } else {
            match self
                .class
                .pool
                .intern(crate::classfile::constpool::PoolEntry::Integer(value))
            {
                Ok(index) => Self::ldc_constant(index),
                Err(error) => {
                    self.class.record_error(error);
                    return self;
                }
            }
        };
        self.insn(Instruction::ConstantPush(constant))
    }

    /// Push a long constant
    #[must_use]
    pub fn lconst(mut self, value: i64) -> Self {
        if value == 0 || value == 1 {
            return self.insn(Instruction::ConstantPush(Constant::Long(value as u8)));
        }
        match self
            .class
            .pool
            .intern(crate::classfile::constpool::PoolEntry::Long(value))
        {
            Ok(index) => self.insn(Instruction::ConstantPush(Constant::Ldc {
                index,
                width: LdcWidth::Double,
            })),
            Err(error) => {
                self.class.record_error(error);
                self
            }
        }
    }

    /// Push a string constant
    #[must_use]
    pub fn ldc_string(mut self, value: &str) -> Self {
        match self.class.pool.intern_string(value) {
            Ok(index) => self.insn(Instruction::ConstantPush(Self::ldc_constant(index))),
            Err(error) => {
                self.class.record_error(error);
                self
            }
        }
    }

    fn ldc_constant(index: u16) -> Constant {
        Constant::Ldc {
            index,
            width: if index <= 255 {
                LdcWidth::Narrow
            } else {
                LdcWidth::Wide
            },
        }
    }

    /// Push `null`
    #[must_use]
    pub fn aconst_null(self) -> Self {
        self.insn(Instruction::ConstantPush(Constant::Null))
    }

    fn field_access(self, op: FieldOp, owner: &str, name: &str, descriptor: &str) -> Self {
        self.insn(Instruction::FieldAccess(FieldInsn {
            op,
            owner: owner.to_string(),
            name: name.to_string(),
            descriptor: descriptor.to_string(),
        }))
    }

    /// `getfield`
    #[must_use]
    pub fn get_field(self, owner: &str, name: &str, descriptor: &str) -> Self {
        self.field_access(FieldOp::GetField, owner, name, descriptor)
    }

    /// `putfield`
    #[must_use]
    pub fn put_field(self, owner: &str, name: &str, descriptor: &str) -> Self {
        self.field_access(FieldOp::PutField, owner, name, descriptor)
    }

    /// `getstatic`
    #[must_use]
    pub fn get_static(self, owner: &str, name: &str, descriptor: &str) -> Self {
        self.field_access(FieldOp::GetStatic, owner, name, descriptor)
    }

    /// `putstatic`
    #[must_use]
    pub fn put_static(self, owner: &str, name: &str, descriptor: &str) -> Self {
        self.field_access(FieldOp::PutStatic, owner, name, descriptor)
    }

    fn invoke(self, op: InvokeKind, owner: &str, name: &str, descriptor: &str) -> Self {
        self.insn(Instruction::MethodCall(MethodInsn {
            op,
            owner: owner.to_string(),
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            interface: op == InvokeKind::Interface,
        }))
    }

    /// `invokevirtual`
    #[must_use]
    pub fn invoke_virtual(self, owner: &str, name: &str, descriptor: &str) -> Self {
        self.invoke(InvokeKind::Virtual, owner, name, descriptor)
    }

    /// `invokespecial`
    #[must_use]
    pub fn invoke_special(self, owner: &str, name: &str, descriptor: &str) -> Self {
        self.invoke(InvokeKind::Special, owner, name, descriptor)
    }

    /// `invokestatic`
    #[must_use]
    pub fn invoke_static(self, owner: &str, name: &str, descriptor: &str) -> Self {
        self.invoke(InvokeKind::Static, owner, name, descriptor)
    }

    /// `invokeinterface`
    #[must_use]
    pub fn invoke_interface(self, owner: &str, name: &str, descriptor: &str) -> Self {
        self.invoke(InvokeKind::Interface, owner, name, descriptor)
    }

    /// `new`
    #[must_use]
    pub fn new_object(self, class: &str) -> Self {
        self.type_insn(TypeOp::New, class)
    }

    /// `checkcast`
    #[must_use]
    pub fn checkcast(self, class: &str) -> Self {
        self.type_insn(TypeOp::CheckCast, class)
    }

    fn type_insn(self, op: TypeOp, name: &str) -> Self {
        self.insn(Instruction::TypeReference(TypeInsn {
            op,
            name: name.to_string(),
        }))
    }

    /// `dup`
    #[must_use]
    pub fn dup(self) -> Self {
        self.other(opcodes::DUP)
    }

    /// `pop`
    #[must_use]
    pub fn pop(self) -> Self {
        self.insn(Instruction::StackPop(PopKind::Single))
    }

    /// `return`
    #[must_use]
    pub fn vreturn(self) -> Self {
        self.other(opcodes::RETURN)
    }

    /// `areturn`
    #[must_use]
    pub fn areturn(self) -> Self {
        self.other(opcodes::ARETURN)
    }

    /// `ireturn`
    #[must_use]
    pub fn ireturn(self) -> Self {
        self.other(opcodes::IRETURN)
    }

    fn limits(&self) -> Result<(u16, u16)> {
        let mut depth = 0_i32;
        let mut max_stack = 0_i32;
        for insn in self.insns.iter() {
            // unknown effects are rare in synthesized code; assume a push of two slots
            depth = (depth + insn.stack_effect().unwrap_or(2)).max(0);
            max_stack = max_stack.max(depth);
        }

        let is_static = self.method.access.contains(MethodAccessFlags::STATIC);
        let mut max_locals =
            i32::from(descriptor::argument_slots(&self.method.descriptor)?) + i32::from(!is_static);
        for insn in self.insns.iter() {
            if let Instruction::LocalLoad { kind, slot, .. } = insn {
                max_locals = max_locals.max(i32::from(*slot) + kind.slots());
            }
        }

        Ok((
            u16::try_from(max_stack).unwrap_or(u16::MAX),
            u16::try_from(max_locals).unwrap_or(u16::MAX),
        ))
    }

    /// Finish the method
    pub fn done(mut self) -> ClassBuilder {
        if self.has_body {
            match self.limits() {
                Ok((max_stack, max_locals)) => {
                    let mut body = CodeBody::new(
                        max_stack,
                        max_locals,
                        std::mem::take(&mut self.insns),
                        Vec::new(),
                        Vec::new(),
                        Vec::new(),
                    );
                    body.mark_modified();
                    self.method.code = Some(body);
                    // placeholder, replaced by the encoded body on write
                    self.method
                        .attributes
                        .push(Attribute::new(names::CODE, Vec::new()));
                }
                Err(error) => self.class.record_error(error),
            }
        }
        self.class.methods.push((self.method, self.remove));
        self.class
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classfile::reader::parse_class;

    const MARKER: &str = "Lcoderemover/Removable;";

    #[test]
    fn marked_interface() {
        let bytes = ClassBuilder::new("p/Api")
            .as_interface()
            .marked(true)
            .method("run", "()V")
            .abstract_()
            .done()
            .build(MARKER)
            .unwrap();

        let class = parse_class(&bytes, MARKER).unwrap();
        assert_eq!(class.kind, ClassKind::Interface);
        assert!(class.marker.unwrap().remove_flag("p/Api").unwrap());
        assert!(class.methods[0].code.is_none());
    }

    #[test]
    fn computed_limits() {
        let bytes = ClassBuilder::new("p/Wide")
            .method("<clinit>", "()V")
            .lconst(1_000_000)
            .put_static("p/Wide", "big", "J")
            .iconst(1000)
            .pop()
            .vreturn()
            .done()
            .build(MARKER)
            .unwrap();

        let class = parse_class(&bytes, MARKER).unwrap();
        let code = class.methods[0].code.as_ref().unwrap();
        assert_eq!((code.max_stack, code.max_locals), (2, 0));
        assert!(class.methods[0].is_initializer());
        assert!(matches!(
            code.instructions().next(),
            Some(Instruction::ConstantPush(Constant::Ldc {
                width: LdcWidth::Double,
                ..
            }))
        ));
    }

    #[test]
    fn enum_kind() {
        let class = ClassBuilder::new("p/Color")
            .as_enum()
            .into_record(MARKER)
            .unwrap();
        assert_eq!(class.kind, ClassKind::Enum);
    }
}
