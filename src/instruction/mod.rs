//! The instruction model of a method body.
//!
//! A method's `Code` attribute is decoded into a [`code::CodeBody`] whose instructions live in an
//! [`list::InsnList`]: an ordered, editable sequence with a cursor. Each [`Instruction`] is tagged
//! by the kind of work it does, and carries its operands symbolically where the removal passes
//! need to read or rewrite them:
//!
//! - field, method and type operands are resolved to names, and re-interned into the constant
//!   pool when the body is encoded again
//! - branch, switch, exception range, debug table and stack map frame offsets are replaced by
//!   [`Label`] pseudo-instructions, so inserting or deleting instructions never leaves a stale
//!   offset behind
//! - everything else is kept as an opcode with its raw operand bytes
//!
//! # Key Components
//!
//! - [`Instruction`] - the tagged instruction variant
//! - [`list::InsnList`] - the editable sequence with its cursor
//! - [`code::CodeBody`] - instructions plus exception handlers, debug tables and frames
//! - [`decoder::decode_code`] / [`encoder::encode_code`] - conversion from and to the binary form
//!
//! # Examples
//!
//! ```rust
//! use coderemover::instruction::{Constant, FieldInsn, FieldOp, Instruction};
//!
//! let push = Instruction::ConstantPush(Constant::Int(5));
//! let store = Instruction::FieldAccess(FieldInsn {
//!     op: FieldOp::PutField,
//!     owner: "com/example/Config".into(),
//!     name: "limit".into(),
//!     descriptor: "I".into(),
//! });
//!
//! assert!(push.is_side_effect_free_push());
//! assert_eq!(push.stack_effect(), Some(1));
//! assert_eq!(store.stack_effect(), Some(-2));
//! ```

pub mod code;
pub mod decoder;
pub mod encoder;
pub mod frames;
pub mod list;
pub mod opcodes;

use std::fmt;

use strum::{Display, EnumIter};

use crate::classfile::descriptor;

/// A position marker inside an [`list::InsnList`].
///
/// Labels are pseudo-instructions: they occupy no bytes in the encoded code and resolve to the
/// offset of the next real instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label(pub u32);

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// The four field access instructions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum FieldOp {
    /// `getstatic`
    #[strum(serialize = "getstatic")]
    GetStatic,
    /// `putstatic`
    #[strum(serialize = "putstatic")]
    PutStatic,
    /// `getfield`
    #[strum(serialize = "getfield")]
    GetField,
    /// `putfield`
    #[strum(serialize = "putfield")]
    PutField,
}

impl FieldOp {
    /// Opcode of this access
    #[must_use]
    pub fn opcode(self) -> u8 {
        match self {
            FieldOp::GetStatic => opcodes::GETSTATIC,
            FieldOp::PutStatic => opcodes::PUTSTATIC,
            FieldOp::GetField => opcodes::GETFIELD,
            FieldOp::PutField => opcodes::PUTFIELD,
        }
    }

    /// True for `putfield` and `putstatic`
    #[must_use]
    pub fn is_store(self) -> bool {
        matches!(self, FieldOp::PutStatic | FieldOp::PutField)
    }

    /// True for `getstatic` and `putstatic`
    #[must_use]
    pub fn is_static(self) -> bool {
        matches!(self, FieldOp::GetStatic | FieldOp::PutStatic)
    }
}

/// The four statically bound invocation instructions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum InvokeKind {
    /// `invokevirtual`
    #[strum(serialize = "invokevirtual")]
    Virtual,
    /// `invokespecial`
    #[strum(serialize = "invokespecial")]
    Special,
    /// `invokestatic`
    #[strum(serialize = "invokestatic")]
    Static,
    /// `invokeinterface`
    #[strum(serialize = "invokeinterface")]
    Interface,
}

impl InvokeKind {
    /// Opcode of this invocation
    #[must_use]
    pub fn opcode(self) -> u8 {
        match self {
            InvokeKind::Virtual => opcodes::INVOKEVIRTUAL,
            InvokeKind::Special => opcodes::INVOKESPECIAL,
            InvokeKind::Static => opcodes::INVOKESTATIC,
            InvokeKind::Interface => opcodes::INVOKEINTERFACE,
        }
    }
}

/// Instructions with a single class operand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum TypeOp {
    /// `new`
    #[strum(serialize = "new")]
    New,
    /// `anewarray`
    #[strum(serialize = "anewarray")]
    ANewArray,
    /// `checkcast`
    #[strum(serialize = "checkcast")]
    CheckCast,
    /// `instanceof`
    #[strum(serialize = "instanceof")]
    InstanceOf,
    /// `multianewarray` with its dimension count
    #[strum(serialize = "multianewarray")]
    MultiANewArray(u8),
}

impl TypeOp {
    /// Opcode of this instruction
    #[must_use]
    pub fn opcode(self) -> u8 {
        match self {
            TypeOp::New => opcodes::NEW,
            TypeOp::ANewArray => opcodes::ANEWARRAY,
            TypeOp::CheckCast => opcodes::CHECKCAST,
            TypeOp::InstanceOf => opcodes::INSTANCEOF,
            TypeOp::MultiANewArray(_) => opcodes::MULTIANEWARRAY,
        }
    }
}

/// A field access with a resolved operand
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldInsn {
    /// Which access
    pub op: FieldOp,
    /// Internal name of the class named by the reference
    pub owner: String,
    /// Field name
    pub name: String,
    /// Field descriptor
    pub descriptor: String,
}

/// A method invocation with a resolved operand
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodInsn {
    /// Which invocation
    pub op: InvokeKind,
    /// Internal name of the class named by the reference
    pub owner: String,
    /// Method name
    pub name: String,
    /// Method descriptor
    pub descriptor: String,
    /// True if the reference is a `CONSTANT_InterfaceMethodref`
    pub interface: bool,
}

/// A type instruction with a resolved operand
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeInsn {
    /// Which instruction
    pub op: TypeOp,
    /// Internal class name, or an array descriptor
    pub name: String,
}

/// How an `ldc` family instruction was encoded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LdcWidth {
    /// `ldc` with a one byte index
    Narrow,
    /// `ldc_w`
    Wide,
    /// `ldc2_w`, for long and double constants
    Double,
}

/// Constant push instructions that have no observable side effect.
///
/// `ldc` is only decoded into this form for numeric and string literals; loading a class,
/// method handle, method type or dynamic constant can trigger resolution and is kept as
/// [`Instruction::Other`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Constant {
    /// `aconst_null`
    Null,
    /// `iconst_m1` to `iconst_5`
    Int(i8),
    /// `lconst_0` and `lconst_1`
    Long(u8),
    /// `fconst_0` to `fconst_2`
    Float(u8),
    /// `dconst_0` and `dconst_1`
    Double(u8),
    /// `bipush`
    Byte(i8),
    /// `sipush`
    Short(i16),
    /// `ldc`, `ldc_w` or `ldc2_w` of a literal pool entry
    Ldc {
        /// Constant pool index
        index: u16,
        /// Original encoding
        width: LdcWidth,
    },
}

impl Constant {
    /// Operand stack slots the pushed value occupies
    #[must_use]
    pub fn slots(&self) -> i32 {
        match self {
            Constant::Long(_) | Constant::Double(_) => 2,
            Constant::Ldc {
                width: LdcWidth::Double,
                ..
            } => 2,
            _ => 1,
        }
    }
}

/// Value category of a local variable load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum ValueKind {
    /// `iload`
    Int,
    /// `lload`
    Long,
    /// `fload`
    Float,
    /// `dload`
    Double,
    /// `aload`
    Reference,
}

impl ValueKind {
    /// Index of the kind in the opcode tables (`iload`, `lload`, `fload`, `dload`, `aload`)
    #[must_use]
    pub fn ordinal(self) -> u8 {
        match self {
            ValueKind::Int => 0,
            ValueKind::Long => 1,
            ValueKind::Float => 2,
            ValueKind::Double => 3,
            ValueKind::Reference => 4,
        }
    }

    /// Inverse of [`ValueKind::ordinal`]
    #[must_use]
    pub fn from_ordinal(ordinal: u8) -> Option<Self> {
        match ordinal {
            0 => Some(ValueKind::Int),
            1 => Some(ValueKind::Long),
            2 => Some(ValueKind::Float),
            3 => Some(ValueKind::Double),
            4 => Some(ValueKind::Reference),
            _ => None,
        }
    }

    /// Operand stack slots of a value of this kind
    #[must_use]
    pub fn slots(self) -> i32 {
        match self {
            ValueKind::Long | ValueKind::Double => 2,
            _ => 1,
        }
    }
}

/// How a local variable slot operand was encoded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotEncoding {
    /// Slot folded into the opcode, e.g. `aload_0`
    Implicit,
    /// One byte slot operand
    Byte,
    /// `wide` prefix with a two byte slot operand
    Wide,
}

/// Size of the value removed by a stack pop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PopKind {
    /// `pop`
    Single,
    /// `pop2`
    Double,
}

impl PopKind {
    /// The pop that discards one value of the given field descriptor
    #[must_use]
    pub fn for_descriptor(descriptor: &str) -> Self {
        if descriptor::is_wide(descriptor) {
            PopKind::Double
        } else {
            PopKind::Single
        }
    }
}

/// A single instruction, or a label, of a method body
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    /// `getstatic`, `putstatic`, `getfield`, `putfield`
    FieldAccess(FieldInsn),
    /// `invokevirtual`, `invokespecial`, `invokestatic`, `invokeinterface`
    MethodCall(MethodInsn),
    /// `new`, `anewarray`, `checkcast`, `instanceof`, `multianewarray`
    TypeReference(TypeInsn),
    /// A side effect free constant push
    ConstantPush(Constant),
    /// A local variable load
    LocalLoad {
        /// Category of the loaded value
        kind: ValueKind,
        /// Local variable slot
        slot: u16,
        /// Original operand encoding
        encoding: SlotEncoding,
    },
    /// `pop` or `pop2`
    StackPop(PopKind),
    /// Conditional or unconditional jump, including `jsr`
    Branch {
        /// Branch opcode
        opcode: u8,
        /// Jump target
        target: Label,
    },
    /// `tableswitch`
    TableSwitch {
        /// Target for keys outside `low..=high`
        default: Label,
        /// Lowest key
        low: i32,
        /// Highest key
        high: i32,
        /// One target per key from `low` to `high`
        targets: Vec<Label>,
    },
    /// `lookupswitch`
    LookupSwitch {
        /// Target for unmatched keys
        default: Label,
        /// Sorted key/target pairs
        pairs: Vec<(i32, Label)>,
    },
    /// A position marker, not an instruction
    Label(Label),
    /// Any other instruction, kept as its opcode and raw operand bytes
    Other {
        /// Opcode, `wide` for wide-prefixed stores, `iinc` and `ret`
        opcode: u8,
        /// Operand bytes following the opcode
        operands: Vec<u8>,
    },
}

impl Instruction {
    /// True if this instruction pushes a constant without any observable side effect
    #[must_use]
    pub fn is_side_effect_free_push(&self) -> bool {
        matches!(self, Instruction::ConstantPush(_))
    }

    /// True for a load of the receiver, `aload_0` or any encoding of `aload 0`
    #[must_use]
    pub fn is_this_load(&self) -> bool {
        matches!(
            self,
            Instruction::LocalLoad {
                kind: ValueKind::Reference,
                slot: 0,
                ..
            }
        )
    }

    /// True for labels
    #[must_use]
    pub fn is_label(&self) -> bool {
        matches!(self, Instruction::Label(_))
    }

    /// Net operand stack change in slots, if it can be derived from the instruction alone.
    ///
    /// Returns `None` for `invokedynamic`, whose signature lives in the constant pool, and for
    /// unknown opcodes. Labels have an effect of zero.
    #[must_use]
    pub fn stack_effect(&self) -> Option<i32> {
        match self {
            Instruction::FieldAccess(field) => {
                let size = i32::from(descriptor::value_slots(&field.descriptor));
                Some(match field.op {
                    FieldOp::GetStatic => size,
                    FieldOp::PutStatic => -size,
                    FieldOp::GetField => size - 1,
                    FieldOp::PutField => -size - 1,
                })
            }
            Instruction::MethodCall(call) => {
                let (params, ret) = descriptor::parse_method(&call.descriptor).ok()?;
                let args: i32 = params
                    .into_iter()
                    .map(|p| i32::from(descriptor::value_slots(p)))
                    .sum();
                let receiver = i32::from(call.op != InvokeKind::Static);
                Some(i32::from(descriptor::value_slots(ret)) - args - receiver)
            }
            Instruction::TypeReference(insn) => Some(match insn.op {
                TypeOp::New => 1,
                TypeOp::ANewArray | TypeOp::CheckCast | TypeOp::InstanceOf => 0,
                TypeOp::MultiANewArray(dims) => 1 - i32::from(dims),
            }),
            Instruction::ConstantPush(constant) => Some(constant.slots()),
            Instruction::LocalLoad { kind, .. } => Some(kind.slots()),
            Instruction::StackPop(PopKind::Single) => Some(-1),
            Instruction::StackPop(PopKind::Double) => Some(-2),
            Instruction::Branch { opcode, .. } => branch_effect(*opcode),
            Instruction::TableSwitch { .. } | Instruction::LookupSwitch { .. } => Some(-1),
            Instruction::Label(_) => Some(0),
            Instruction::Other { opcode, operands } => other_effect(*opcode, operands),
        }
    }
}

/// Sum of [`Instruction::stack_effect`] over a straight-line run of instructions.
///
/// Returns `None` if any instruction's effect is unknown.
pub fn net_stack_effect<'a>(insns: impl IntoIterator<Item = &'a Instruction>) -> Option<i32> {
    insns
        .into_iter()
        .try_fold(0_i32, |acc, insn| Some(acc + insn.stack_effect()?))
}

fn branch_effect(opcode: u8) -> Option<i32> {
    use opcodes::*;
    match opcode {
        IFEQ..=IFLE | IFNULL | IFNONNULL => Some(-1),
        IF_ICMPEQ..=IF_ACMPNE => Some(-2),
        GOTO | GOTO_W => Some(0),
        JSR | JSR_W => Some(1),
        _ => None,
    }
}

fn store_effect(opcode: u8) -> i32 {
    // istore, lstore, fstore, dstore, astore
    match opcode {
        0x37 | 0x39 => -2,
        _ => -1,
    }
}

fn other_effect(opcode: u8, operands: &[u8]) -> Option<i32> {
    use opcodes::*;
    let effect = match opcode {
        NOP => 0,
        // Constant pushes that are not side effect free: class, method handle, method type
        // and dynamic constants
        LDC | LDC_W => 1,
        LDC2_W => 2,
        // iaload, laload, faload, daload, aaload, baload, caload, saload
        0x2F | 0x31 => 0,
        IALOAD..=SALOAD => -1,
        ISTORE..=ASTORE => store_effect(opcode),
        ISTORE_0..=ASTORE_3 => store_effect(ISTORE + (opcode - ISTORE_0) / 4),
        // lastore, dastore
        0x50 | 0x52 => -4,
        IASTORE..=SASTORE => -3,
        POP => -1,
        POP2 => -2,
        DUP | 0x5A | 0x5B => 1,
        0x5C..=0x5E => 2,
        SWAP => 0,
        // Binary arithmetic: int and float variants pop one slot, long and double pop two
        IADD..=0x73 => {
            if (opcode - IADD) % 2 == 0 {
                -1
            } else {
                -2
            }
        }
        // ineg, lneg, fneg, dneg
        0x74..=0x77 => 0,
        // Shifts take an int shift distance for either width
        0x78..=0x7D => -1,
        // iand, land, ior, lor, ixor, lxor
        0x7E..=LXOR => {
            if (opcode - 0x7E) % 2 == 0 {
                -1
            } else {
                -2
            }
        }
        IINC => 0,
        // i2l, i2f, i2d, l2i, l2f, l2d, f2i, f2l, f2d, d2i, d2l, d2f
        I2L => 1,
        0x86 => 0,
        0x87 => 1,
        0x88 | 0x89 => -1,
        0x8A | 0x8B => 0,
        0x8C | 0x8D => 1,
        0x8E => -1,
        0x8F => 0,
        0x90 => -1,
        0x91..=I2S => 0,
        // lcmp, fcmpl, fcmpg, dcmpl, dcmpg
        LCMP => -3,
        0x95 | 0x96 => -1,
        0x97 | DCMPG => -3,
        RET => 0,
        // ireturn, lreturn, freturn, dreturn, areturn, return
        IRETURN | 0xAE | ARETURN => -1,
        0xAD | 0xAF => -2,
        RETURN => 0,
        NEWARRAY | ARRAYLENGTH => 0,
        ATHROW | MONITORENTER | MONITOREXIT => -1,
        WIDE => match operands.first() {
            Some(&inner @ ISTORE..=ASTORE) => store_effect(inner),
            Some(&IINC) | Some(&RET) => 0,
            _ => return None,
        },
        _ => return None,
    };
    Some(effect)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(op: InvokeKind, descriptor: &str) -> Instruction {
        Instruction::MethodCall(MethodInsn {
            op,
            owner: "p/A".into(),
            name: "m".into(),
            descriptor: descriptor.into(),
            interface: false,
        })
    }

    #[test]
    fn field_effects() {
        let field = |op, descriptor: &str| {
            Instruction::FieldAccess(FieldInsn {
                op,
                owner: "p/A".into(),
                name: "f".into(),
                descriptor: descriptor.into(),
            })
        };

        assert_eq!(field(FieldOp::GetStatic, "J").stack_effect(), Some(2));
        assert_eq!(field(FieldOp::PutStatic, "I").stack_effect(), Some(-1));
        assert_eq!(field(FieldOp::GetField, "D").stack_effect(), Some(1));
        assert_eq!(field(FieldOp::PutField, "J").stack_effect(), Some(-3));
    }

    #[test]
    fn call_effects() {
        assert_eq!(call(InvokeKind::Static, "()I").stack_effect(), Some(1));
        assert_eq!(call(InvokeKind::Virtual, "(JI)V").stack_effect(), Some(-4));
        assert_eq!(call(InvokeKind::Special, "()V").stack_effect(), Some(-1));
        assert_eq!(call(InvokeKind::Static, "(").stack_effect(), None);
    }

    #[test]
    fn other_effects() {
        let other = |opcode, operands: Vec<u8>| Instruction::Other { opcode, operands };

        assert_eq!(other(opcodes::IADD, vec![]).stack_effect(), Some(-1));
        assert_eq!(other(0x61, vec![]).stack_effect(), Some(-2));
        assert_eq!(other(0x79, vec![]).stack_effect(), Some(-1));
        assert_eq!(other(0x3F, vec![]).stack_effect(), Some(-2)); // lstore_0
        assert_eq!(other(0x4B, vec![]).stack_effect(), Some(-1)); // astore_0
        assert_eq!(other(opcodes::DUP, vec![]).stack_effect(), Some(1));
        assert_eq!(other(opcodes::RETURN, vec![]).stack_effect(), Some(0));
        assert_eq!(
            other(opcodes::WIDE, vec![0x39, 0x01, 0x00]).stack_effect(),
            Some(-2)
        );
        assert_eq!(
            other(opcodes::INVOKEDYNAMIC, vec![0, 1, 0, 0]).stack_effect(),
            None
        );
    }

    #[test]
    fn net_effect() {
        let insns = vec![
            Instruction::LocalLoad {
                kind: ValueKind::Reference,
                slot: 0,
                encoding: SlotEncoding::Implicit,
            },
            Instruction::ConstantPush(Constant::Long(1)),
            Instruction::Label(Label(0)),
            Instruction::StackPop(PopKind::Double),
            Instruction::StackPop(PopKind::Single),
        ];
        assert_eq!(net_stack_effect(&insns), Some(0));
    }

    #[test]
    fn pop_kind_from_descriptor() {
        assert_eq!(PopKind::for_descriptor("J"), PopKind::Double);
        assert_eq!(PopKind::for_descriptor("D"), PopKind::Double);
        assert_eq!(PopKind::for_descriptor("Ljava/lang/Object;"), PopKind::Single);
    }

    #[test]
    fn this_load() {
        let load = |kind, slot| Instruction::LocalLoad {
            kind,
            slot,
            encoding: SlotEncoding::Byte,
        };
        assert!(load(ValueKind::Reference, 0).is_this_load());
        assert!(!load(ValueKind::Reference, 1).is_this_load());
        assert!(!load(ValueKind::Int, 0).is_this_load());
    }
}
