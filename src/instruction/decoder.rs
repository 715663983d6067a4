//! Decoding of `Code` attributes into [`CodeBody`] values.
//!
//! Decoding runs in two steps. The bytecode is first walked linearly, turning every instruction
//! into an [`Instruction`] and every referenced code offset into a [`Label`]. The exception
//! table and the code sub-attributes then request labels for their own offsets. Finally the
//! labels are merged into the instruction stream in front of the instruction they denote; a
//! label that does not land on an instruction boundary (or the end of the code) means the code
//! is malformed.

use std::collections::BTreeMap;

use crate::{
    classfile::{
        attribute::{names, Attribute},
        constpool::{ConstantPool, PoolEntry, RefKind},
    },
    file::parser::Parser,
    instruction::{
        code::{CodeAttr, CodeBody, ExceptionHandler, LineNumber, LocalVariable},
        frames::{decode_frames, initial_locals},
        list::InsnList,
        opcodes::{self, *},
        Constant, FieldInsn, FieldOp, Instruction, InvokeKind, Label, LdcWidth, MethodInsn,
        PopKind, SlotEncoding, TypeInsn, TypeOp, ValueKind,
    },
    Result,
};

/// Largest code array the class file format allows
pub const MAX_CODE_LENGTH: u32 = 65535;

/// Allocates one label per distinct code offset
#[derive(Debug, Default)]
pub(crate) struct LabelMap {
    by_offset: BTreeMap<u32, Label>,
    next: u32,
}

impl LabelMap {
    /// The label for `offset`, created on first use
    pub(crate) fn at(&mut self, offset: u32) -> Label {
        let next = &mut self.next;
        *self.by_offset.entry(offset).or_insert_with(|| {
            let label = Label(*next);
            *next += 1;
            label
        })
    }

    #[cfg(test)]
    pub(crate) fn offset_of(&self, label: Label) -> Option<u32> {
        self.by_offset
            .iter()
            .find(|(_, l)| **l == label)
            .map(|(offset, _)| *offset)
    }
}

/// The method a `Code` attribute belongs to; needed for the entry frame
#[derive(Debug, Clone, Copy)]
pub struct MethodContext<'a> {
    /// Internal name of the declaring class
    pub class_name: &'a str,
    /// Method name
    pub name: &'a str,
    /// Method descriptor
    pub descriptor: &'a str,
    /// True for static methods
    pub is_static: bool,
}

/// Decode the payload of a `Code` attribute.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] or [`crate::Error::OutOfBounds`] if the attribute,
/// the bytecode or one of the understood sub-attributes is invalid.
pub fn decode_code(data: &[u8], pool: &ConstantPool, method: MethodContext) -> Result<CodeBody> {
    let mut parser = Parser::new(data);
    let max_stack = parser.read_be::<u16>()?;
    let max_locals = parser.read_be::<u16>()?;
    let code_len = parser.read_be::<u32>()?;
    if code_len == 0 || code_len > MAX_CODE_LENGTH {
        return Err(malformed_error!(
            "Invalid code length {} in {}.{}{}",
            code_len,
            method.class_name,
            method.name,
            method.descriptor
        ));
    }
    let code = parser.read_bytes(code_len as usize)?;

    let mut labels = LabelMap::default();
    let decoded = decode_instructions(code, pool, &mut labels)?;

    let handler_count = parser.read_be::<u16>()?;
    let mut handlers = Vec::with_capacity(usize::from(handler_count));
    for _ in 0..handler_count {
        let start = parser.read_be::<u16>()?;
        let end = parser.read_be::<u16>()?;
        let handler = parser.read_be::<u16>()?;
        let catch_type = parser.read_be::<u16>()?;
        handlers.push(ExceptionHandler {
            start: labels.at(u32::from(start)),
            end: labels.at(u32::from(end)),
            handler: labels.at(u32::from(handler)),
            catch_type,
        });
    }

    let raw_attributes = Attribute::parse_table(&mut parser, pool)?;
    if parser.has_more_data() {
        return Err(malformed_error!(
            "{} trailing bytes after Code attribute",
            parser.remaining()
        ));
    }

    let initial = initial_locals(
        method.class_name,
        method.name,
        method.descriptor,
        method.is_static,
    )?;

    let mut attributes = Vec::with_capacity(raw_attributes.len());
    for attribute in raw_attributes {
        let decoded = match attribute.name.as_str() {
            names::LINE_NUMBER_TABLE => {
                CodeAttr::LineNumbers(decode_line_numbers(&attribute.data, &mut labels)?)
            }
            names::LOCAL_VARIABLE_TABLE => {
                CodeAttr::LocalVariables(decode_local_variables(&attribute.data, &mut labels)?)
            }
            names::LOCAL_VARIABLE_TYPE_TABLE => CodeAttr::LocalVariableTypes(
                decode_local_variables(&attribute.data, &mut labels)?,
            ),
            names::STACK_MAP_TABLE => {
                CodeAttr::StackMap(decode_frames(&attribute.data, pool, &initial, &mut labels)?)
            }
            _ => CodeAttr::Raw(attribute),
        };
        attributes.push(decoded);
    }

    let insns = place_labels(decoded, labels, code_len)?;
    Ok(CodeBody::new(
        max_stack,
        max_locals,
        insns,
        handlers,
        attributes,
        initial,
    ))
}

fn place_labels(
    decoded: Vec<(u32, Instruction)>,
    labels: LabelMap,
    code_len: u32,
) -> Result<InsnList> {
    let mut insns = Vec::with_capacity(decoded.len() + labels.by_offset.len());
    let mut pending = labels.by_offset.into_iter().peekable();

    for (offset, insn) in decoded {
        while let Some(&(label_offset, label)) = pending.peek() {
            if label_offset > offset {
                break;
            }
            if label_offset < offset {
                return Err(malformed_error!(
                    "Code offset {} is inside an instruction",
                    label_offset
                ));
            }
            insns.push(Instruction::Label(label));
            pending.next();
        }
        insns.push(insn);
    }

    for (label_offset, label) in pending {
        if label_offset != code_len {
            return Err(malformed_error!(
                "Code offset {} is outside the code ({} bytes)",
                label_offset,
                code_len
            ));
        }
        insns.push(Instruction::Label(label));
    }

    Ok(InsnList::from(insns))
}

fn decode_line_numbers(data: &[u8], labels: &mut LabelMap) -> Result<Vec<LineNumber>> {
    let mut parser = Parser::new(data);
    let count = parser.read_be::<u16>()?;
    let mut entries = Vec::with_capacity(usize::from(count));
    for _ in 0..count {
        let start = parser.read_be::<u16>()?;
        let line = parser.read_be::<u16>()?;
        entries.push(LineNumber {
            start: labels.at(u32::from(start)),
            line,
        });
    }
    Ok(entries)
}

fn decode_local_variables(data: &[u8], labels: &mut LabelMap) -> Result<Vec<LocalVariable>> {
    let mut parser = Parser::new(data);
    let count = parser.read_be::<u16>()?;
    let mut entries = Vec::with_capacity(usize::from(count));
    for _ in 0..count {
        let start = u32::from(parser.read_be::<u16>()?);
        let length = u32::from(parser.read_be::<u16>()?);
        entries.push(LocalVariable {
            start: labels.at(start),
            end: labels.at(start + length),
            name_index: parser.read_be()?,
            descriptor_index: parser.read_be()?,
            slot: parser.read_be()?,
        });
    }
    Ok(entries)
}

fn is_literal(entry: &PoolEntry, opcode: u8) -> bool {
    if opcode == LDC2_W {
        matches!(entry, PoolEntry::Long(_) | PoolEntry::Double(_))
    } else {
        matches!(
            entry,
            PoolEntry::Integer(_) | PoolEntry::Float(_) | PoolEntry::String(_)
        )
    }
}

fn branch_target(labels: &mut LabelMap, offset: u32, relative: i32, code_len: usize) -> Result<Label> {
    let target = i64::from(offset) + i64::from(relative);
    if target < 0 || target >= code_len as i64 {
        return Err(malformed_error!(
            "Branch at {} targets {} outside the code",
            offset,
            target
        ));
    }
    Ok(labels.at(target as u32))
}

fn decode_instructions(
    code: &[u8],
    pool: &ConstantPool,
    labels: &mut LabelMap,
) -> Result<Vec<(u32, Instruction)>> {
    let mut parser = Parser::new(code);
    let mut decoded = Vec::with_capacity(code.len() / 2);

    while parser.has_more_data() {
        // code length is bounded by MAX_CODE_LENGTH
        let offset = parser.pos() as u32;
        let opcode = parser.read_be::<u8>()?;

        let insn = match opcode {
            ACONST_NULL => Instruction::ConstantPush(Constant::Null),
            ICONST_M1..=ICONST_5 => {
                Instruction::ConstantPush(Constant::Int(opcode as i8 - ICONST_M1 as i8 - 1))
            }
            LCONST_0 | LCONST_1 => Instruction::ConstantPush(Constant::Long(opcode - LCONST_0)),
            FCONST_0..=FCONST_2 => Instruction::ConstantPush(Constant::Float(opcode - FCONST_0)),
            DCONST_0 | DCONST_1 => {
                Instruction::ConstantPush(Constant::Double(opcode - DCONST_0))
            }
            BIPUSH => Instruction::ConstantPush(Constant::Byte(parser.read_be()?)),
            SIPUSH => Instruction::ConstantPush(Constant::Short(parser.read_be()?)),
            LDC | LDC_W | LDC2_W => {
                let start = parser.pos();
                let (index, width) = match opcode {
                    LDC => (u16::from(parser.read_be::<u8>()?), LdcWidth::Narrow),
                    LDC_W => (parser.read_be::<u16>()?, LdcWidth::Wide),
                    _ => (parser.read_be::<u16>()?, LdcWidth::Double),
                };
                if is_literal(pool.get(index)?, opcode) {
                    Instruction::ConstantPush(Constant::Ldc { index, width })
                } else {
                    Instruction::Other {
                        opcode,
                        operands: code[start..parser.pos()].to_vec(),
                    }
                }
            }
            ILOAD..=ALOAD => Instruction::LocalLoad {
                kind: value_kind(opcode - ILOAD)?,
                slot: u16::from(parser.read_be::<u8>()?),
                encoding: SlotEncoding::Byte,
            },
            ILOAD_0..=ALOAD_3 => {
                let n = opcode - ILOAD_0;
                Instruction::LocalLoad {
                    kind: value_kind(n / 4)?,
                    slot: u16::from(n % 4),
                    encoding: SlotEncoding::Implicit,
                }
            }
            POP => Instruction::StackPop(PopKind::Single),
            POP2 => Instruction::StackPop(PopKind::Double),
            _ if opcodes::is_short_branch(opcode) => {
                let relative = i32::from(parser.read_be::<i16>()?);
                Instruction::Branch {
                    opcode,
                    target: branch_target(labels, offset, relative, code.len())?,
                }
            }
            GOTO_W | JSR_W => {
                let relative = parser.read_be::<i32>()?;
                Instruction::Branch {
                    opcode,
                    target: branch_target(labels, offset, relative, code.len())?,
                }
            }
            TABLESWITCH => {
                parser.align(0, 4)?;
                let default = branch_target(labels, offset, parser.read_be()?, code.len())?;
                let low = parser.read_be::<i32>()?;
                let high = parser.read_be::<i32>()?;
                if low > high {
                    return Err(malformed_error!(
                        "tableswitch at {} has low {} above high {}",
                        offset,
                        low,
                        high
                    ));
                }
                let count = i64::from(high) - i64::from(low) + 1;
                if count * 4 > parser.remaining() as i64 {
                    return Err(out_of_bounds_error!());
                }
                let mut targets = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    targets.push(branch_target(labels, offset, parser.read_be()?, code.len())?);
                }
                Instruction::TableSwitch {
                    default,
                    low,
                    high,
                    targets,
                }
            }
            LOOKUPSWITCH => {
                parser.align(0, 4)?;
                let default = branch_target(labels, offset, parser.read_be()?, code.len())?;
                let count = parser.read_be::<i32>()?;
                if count < 0 || i64::from(count) * 8 > parser.remaining() as i64 {
                    return Err(malformed_error!(
                        "lookupswitch at {} has invalid pair count {}",
                        offset,
                        count
                    ));
                }
                let mut pairs = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    let key = parser.read_be::<i32>()?;
                    let target = branch_target(labels, offset, parser.read_be()?, code.len())?;
                    pairs.push((key, target));
                }
                Instruction::LookupSwitch { default, pairs }
            }
            GETSTATIC..=PUTFIELD => {
                let member = pool.member_ref(parser.read_be()?)?;
                if member.kind != RefKind::Field {
                    return Err(malformed_error!(
                        "Field instruction at {} references method {}.{}",
                        offset,
                        member.owner,
                        member.name
                    ));
                }
                let op = match opcode {
                    GETSTATIC => FieldOp::GetStatic,
                    PUTSTATIC => FieldOp::PutStatic,
                    GETFIELD => FieldOp::GetField,
                    _ => FieldOp::PutField,
                };
                Instruction::FieldAccess(FieldInsn {
                    op,
                    owner: member.owner,
                    name: member.name,
                    descriptor: member.descriptor,
                })
            }
            INVOKEVIRTUAL..=INVOKEINTERFACE => {
                let member = pool.member_ref(parser.read_be()?)?;
                if member.kind == RefKind::Field {
                    return Err(malformed_error!(
                        "Invoke instruction at {} references field {}.{}",
                        offset,
                        member.owner,
                        member.name
                    ));
                }
                let op = match opcode {
                    INVOKEVIRTUAL => InvokeKind::Virtual,
                    INVOKESPECIAL => InvokeKind::Special,
                    INVOKESTATIC => InvokeKind::Static,
                    _ => {
                        // argument count and the reserved zero byte are derived on encode
                        parser.advance_by(2)?;
                        InvokeKind::Interface
                    }
                };
                Instruction::MethodCall(MethodInsn {
                    op,
                    owner: member.owner,
                    name: member.name,
                    descriptor: member.descriptor,
                    interface: member.kind == RefKind::InterfaceMethod,
                })
            }
            NEW | ANEWARRAY | CHECKCAST | INSTANCEOF => {
                let op = match opcode {
                    NEW => TypeOp::New,
                    ANEWARRAY => TypeOp::ANewArray,
                    CHECKCAST => TypeOp::CheckCast,
                    _ => TypeOp::InstanceOf,
                };
                Instruction::TypeReference(TypeInsn {
                    op,
                    name: pool.class_name(parser.read_be()?)?,
                })
            }
            MULTIANEWARRAY => {
                let name = pool.class_name(parser.read_be()?)?;
                let dims = parser.read_be::<u8>()?;
                Instruction::TypeReference(TypeInsn {
                    op: TypeOp::MultiANewArray(dims),
                    name,
                })
            }
            WIDE => decode_wide(&mut parser, offset)?,
            _ => match opcodes::plain_operand_len(opcode) {
                Some(len) => Instruction::Other {
                    opcode,
                    operands: parser.read_bytes(len)?.to_vec(),
                },
                None => {
                    return Err(malformed_error!(
                        "Unknown opcode 0x{:02X} at {}",
                        opcode,
                        offset
                    ))
                }
            },
        };

        decoded.push((offset, insn));
    }

    Ok(decoded)
}

fn value_kind(ordinal: u8) -> Result<ValueKind> {
    ValueKind::from_ordinal(ordinal)
        .ok_or_else(|| malformed_error!("Invalid load kind {}", ordinal))
}

fn decode_wide(parser: &mut Parser, offset: u32) -> Result<Instruction> {
    let inner = parser.read_be::<u8>()?;
    match inner {
        ILOAD..=ALOAD => Ok(Instruction::LocalLoad {
            kind: value_kind(inner - ILOAD)?,
            slot: parser.read_be()?,
            encoding: SlotEncoding::Wide,
        }),
        ISTORE..=ASTORE | RET => {
            let mut operands = vec![inner];
            operands.extend_from_slice(parser.read_bytes(2)?);
            Ok(Instruction::Other {
                opcode: WIDE,
                operands,
            })
        }
        IINC => {
            let mut operands = vec![inner];
            operands.extend_from_slice(parser.read_bytes(4)?);
            Ok(Instruction::Other {
                opcode: WIDE,
                operands,
            })
        }
        _ => Err(malformed_error!(
            "Invalid wide-prefixed opcode 0x{:02X} at {}",
            inner,
            offset
        )),
    }
}
