//! Encoding of [`CodeBody`] values back into `Code` attributes.
//!
//! Offsets are assigned in a single forward pass: every instruction's size depends only on its
//! own encoding and, for switches, on the alignment padding at its position. Labels take the
//! offset of the instruction that follows them. A second pass emits the bytes, interning
//! symbolic operands into the class constant pool.
//!
//! Local variable loads keep their original encoding where possible; a slot that no longer fits
//! the original form falls back to the next wider one.

use std::collections::HashMap;

use log::debug;

use crate::{
    classfile::{
        attribute::{names, Attribute},
        constpool::ConstantPool,
        descriptor,
    },
    file::io::{write_be, write_len_u16},
    instruction::{
        code::{CodeAttr, CodeBody, LocalVariable},
        decoder::MAX_CODE_LENGTH,
        frames::encode_frames,
        opcodes, Constant, Instruction, InvokeKind, Label, LdcWidth, PopKind, SlotEncoding, TypeOp,
    },
    Result,
};

fn switch_padding(offset: u32) -> u32 {
    (4 - ((offset + 1) % 4)) % 4
}

fn slot_encoding(requested: SlotEncoding, slot: u16) -> SlotEncoding {
    match requested {
        SlotEncoding::Implicit if slot <= 3 => SlotEncoding::Implicit,
        SlotEncoding::Implicit | SlotEncoding::Byte if slot <= 255 => SlotEncoding::Byte,
        _ => SlotEncoding::Wide,
    }
}

fn insn_size(insn: &Instruction, offset: u32) -> u32 {
    match insn {
        Instruction::FieldAccess(_) => 3,
        Instruction::MethodCall(call) => {
            if call.op == InvokeKind::Interface {
                5
            } else {
                3
            }
        }
        Instruction::TypeReference(insn) => match insn.op {
            TypeOp::MultiANewArray(_) => 4,
            _ => 3,
        },
        Instruction::ConstantPush(constant) => match constant {
            Constant::Byte(_) => 2,
            Constant::Short(_) => 3,
            Constant::Ldc {
                width: LdcWidth::Narrow,
                ..
            } => 2,
            Constant::Ldc { .. } => 3,
            _ => 1,
        },
        Instruction::LocalLoad { slot, encoding, .. } => match slot_encoding(*encoding, *slot) {
            SlotEncoding::Implicit => 1,
            SlotEncoding::Byte => 2,
            SlotEncoding::Wide => 4,
        },
        Instruction::StackPop(_) => 1,
        Instruction::Branch { opcode, .. } => {
            if opcodes::is_wide_branch(*opcode) {
                5
            } else {
                3
            }
        }
        Instruction::TableSwitch { targets, .. } => {
            1 + switch_padding(offset) + 12 + 4 * targets.len() as u32
        }
        Instruction::LookupSwitch { pairs, .. } => {
            1 + switch_padding(offset) + 8 + 8 * pairs.len() as u32
        }
        Instruction::Label(_) => 0,
        Instruction::Other { operands, .. } => 1 + operands.len() as u32,
    }
}

struct Emitter<'a> {
    code: Vec<u8>,
    offsets: &'a HashMap<Label, u32>,
}

impl Emitter<'_> {
    fn offset(&self) -> u32 {
        self.code.len() as u32
    }

    fn target(&self, label: Label) -> Result<u32> {
        self.offsets
            .get(&label)
            .copied()
            .ok_or_else(|| malformed_error!("Branch to unplaced label {}", label))
    }

    fn relative(&self, from: u32, label: Label) -> Result<i32> {
        Ok(self.target(label)? as i32 - from as i32)
    }

    fn emit(&mut self, insn: &Instruction, pool: &mut ConstantPool) -> Result<()> {
        let at = self.offset();
        match insn {
            Instruction::Label(_) => {}
            Instruction::FieldAccess(field) => {
                let index = pool.intern_field_ref(&field.owner, &field.name, &field.descriptor)?;
                write_be(&mut self.code, field.op.opcode());
                write_be(&mut self.code, index);
            }
            Instruction::MethodCall(call) => {
                let index =
                    pool.intern_method_ref(&call.owner, &call.name, &call.descriptor, call.interface)?;
                write_be(&mut self.code, call.op.opcode());
                write_be(&mut self.code, index);
                if call.op == InvokeKind::Interface {
                    let Ok(count) = u8::try_from(descriptor::argument_slots(&call.descriptor)? + 1)
                    else {
                        return Err(malformed_error!(
                            "Too many arguments for invokeinterface {}.{}",
                            call.owner,
                            call.name
                        ));
                    };
                    write_be(&mut self.code, count);
                    write_be(&mut self.code, 0_u8);
                }
            }
            Instruction::TypeReference(insn) => {
                let index = pool.intern_class(&insn.name)?;
                write_be(&mut self.code, insn.op.opcode());
                write_be(&mut self.code, index);
                if let TypeOp::MultiANewArray(dims) = insn.op {
                    write_be(&mut self.code, dims);
                }
            }
            Instruction::ConstantPush(constant) => self.emit_constant(constant)?,
            Instruction::LocalLoad {
                kind,
                slot,
                encoding,
            } => match slot_encoding(*encoding, *slot) {
                SlotEncoding::Implicit => {
                    // slot <= 3 checked by slot_encoding
                    write_be(
                        &mut self.code,
                        opcodes::ILOAD_0 + kind.ordinal() * 4 + *slot as u8,
                    );
                }
                SlotEncoding::Byte => {
                    write_be(&mut self.code, opcodes::ILOAD + kind.ordinal());
                    write_be(&mut self.code, *slot as u8);
                }
                SlotEncoding::Wide => {
                    write_be(&mut self.code, opcodes::WIDE);
                    write_be(&mut self.code, opcodes::ILOAD + kind.ordinal());
                    write_be(&mut self.code, *slot);
                }
            },
            Instruction::StackPop(PopKind::Single) => write_be(&mut self.code, opcodes::POP),
            Instruction::StackPop(PopKind::Double) => write_be(&mut self.code, opcodes::POP2),
            Instruction::Branch { opcode, target } => {
                let relative = self.relative(at, *target)?;
                write_be(&mut self.code, *opcode);
                if opcodes::is_wide_branch(*opcode) {
                    write_be(&mut self.code, relative);
                } else {
                    let Ok(relative) = i16::try_from(relative) else {
                        return Err(malformed_error!(
                            "Branch offset {} at {} does not fit opcode 0x{:02X}",
                            relative,
                            at,
                            opcode
                        ));
                    };
                    write_be(&mut self.code, relative);
                }
            }
            Instruction::TableSwitch {
                default,
                low,
                high,
                targets,
            } => {
                let default = self.relative(at, *default)?;
                let targets = targets
                    .iter()
                    .map(|target| self.relative(at, *target))
                    .collect::<Result<Vec<_>>>()?;
                write_be(&mut self.code, opcodes::TABLESWITCH);
                self.pad(at);
                write_be(&mut self.code, default);
                write_be(&mut self.code, *low);
                write_be(&mut self.code, *high);
                for target in targets {
                    write_be(&mut self.code, target);
                }
            }
            Instruction::LookupSwitch { default, pairs } => {
                let default = self.relative(at, *default)?;
                let pairs = pairs
                    .iter()
                    .map(|(key, target)| Ok((*key, self.relative(at, *target)?)))
                    .collect::<Result<Vec<_>>>()?;
                write_be(&mut self.code, opcodes::LOOKUPSWITCH);
                self.pad(at);
                write_be(&mut self.code, default);
                write_be(&mut self.code, pairs.len() as i32);
                for (key, target) in pairs {
                    write_be(&mut self.code, key);
                    write_be(&mut self.code, target);
                }
            }
            Instruction::Other { opcode, operands } => {
                write_be(&mut self.code, *opcode);
                self.code.extend_from_slice(operands);
            }
        }
        Ok(())
    }

    fn pad(&mut self, at: u32) {
        for _ in 0..switch_padding(at) {
            self.code.push(0);
        }
    }

    fn emit_constant(&mut self, constant: &Constant) -> Result<()> {
        let code = &mut self.code;
        match constant {
            Constant::Null => write_be(code, opcodes::ACONST_NULL),
            Constant::Int(value) => {
                if !(-1..=5).contains(value) {
                    return Err(malformed_error!("iconst value {} out of range", value));
                }
                write_be(code, (opcodes::ICONST_M1 as i8 + 1 + *value) as u8);
            }
            Constant::Long(value) => write_be(code, opcodes::LCONST_0 + (*value).min(1)),
            Constant::Float(value) => write_be(code, opcodes::FCONST_0 + (*value).min(2)),
            Constant::Double(value) => write_be(code, opcodes::DCONST_0 + (*value).min(1)),
            Constant::Byte(value) => {
                write_be(code, opcodes::BIPUSH);
                write_be(code, *value);
            }
            Constant::Short(value) => {
                write_be(code, opcodes::SIPUSH);
                write_be(code, *value);
            }
            Constant::Ldc { index, width } => match width {
                LdcWidth::Narrow => {
                    let Ok(index) = u8::try_from(*index) else {
                        return Err(malformed_error!("ldc index {} needs ldc_w", index));
                    };
                    write_be(code, opcodes::LDC);
                    write_be(code, index);
                }
                LdcWidth::Wide => {
                    write_be(code, opcodes::LDC_W);
                    write_be(code, *index);
                }
                LdcWidth::Double => {
                    write_be(code, opcodes::LDC2_W);
                    write_be(code, *index);
                }
            },
        }
        Ok(())
    }
}

/// Encode a method body into the payload of a `Code` attribute.
///
/// Exception ranges that became empty are dropped, as are debug table entries and frames that
/// now point at the end of the code. Unrecognized sub-attributes are only kept while the
/// instruction sequence is structurally unchanged, since their offsets cannot be updated.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] if the code is empty or too long, a branch no longer fits
/// its encoding, a label was never placed, or the constant pool overflows.
pub fn encode_code(body: &CodeBody, pool: &mut ConstantPool) -> Result<Vec<u8>> {
    let mut offsets = HashMap::new();
    let mut code_len: u32 = 0;
    for insn in body.insns.iter() {
        if let Instruction::Label(label) = insn {
            offsets.insert(*label, code_len);
        } else {
            code_len += insn_size(insn, code_len);
        }
        if code_len > MAX_CODE_LENGTH {
            return Err(malformed_error!("Code exceeds {} bytes", MAX_CODE_LENGTH));
        }
    }
    if code_len == 0 {
        return Err(malformed_error!("Method body has no instructions"));
    }

    let mut emitter = Emitter {
        code: Vec::with_capacity(code_len as usize),
        offsets: &offsets,
    };
    for insn in body.insns.iter() {
        emitter.emit(insn, pool)?;
    }
    let code = emitter.code;
    if code.len() != code_len as usize {
        return Err(malformed_error!(
            "Encoded {} code bytes, expected {}",
            code.len(),
            code_len
        ));
    }

    let offset_of = |label: &Label| -> Result<u32> {
        offsets
            .get(label)
            .copied()
            .ok_or_else(|| malformed_error!("Label {} was not placed", label))
    };

    let mut out = Vec::with_capacity(code.len() + 64);
    write_be(&mut out, body.max_stack);
    write_be(&mut out, body.max_locals);
    write_be(&mut out, code_len);
    out.extend_from_slice(&code);

    let mut handlers = Vec::with_capacity(body.handlers.len());
    for handler in &body.handlers {
        let start = offset_of(&handler.start)?;
        let end = offset_of(&handler.end)?;
        if start >= end {
            debug!("Dropping empty exception range at {}", start);
            continue;
        }
        handlers.push([start, end, offset_of(&handler.handler)?, u32::from(handler.catch_type)]);
    }
    write_len_u16(&mut out, handlers.len(), "exception handlers")?;
    for entry in handlers {
        for value in entry {
            // offsets are bounded by MAX_CODE_LENGTH
            write_be(&mut out, value as u16);
        }
    }

    let mut attributes = Vec::with_capacity(body.attributes.len());
    for attribute in &body.attributes {
        match attribute {
            CodeAttr::LineNumbers(entries) => {
                let mut data = Vec::new();
                let mut kept = Vec::with_capacity(entries.len());
                for entry in entries {
                    let start = offset_of(&entry.start)?;
                    if start < code_len {
                        kept.push((start as u16, entry.line));
                    }
                }
                write_len_u16(&mut data, kept.len(), "line numbers")?;
                for (start, line) in kept {
                    write_be(&mut data, start);
                    write_be(&mut data, line);
                }
                attributes.push(Attribute::new(names::LINE_NUMBER_TABLE, data));
            }
            CodeAttr::LocalVariables(entries) => attributes.push(Attribute::new(
                names::LOCAL_VARIABLE_TABLE,
                encode_local_variables(entries, code_len, &offset_of)?,
            )),
            CodeAttr::LocalVariableTypes(entries) => attributes.push(Attribute::new(
                names::LOCAL_VARIABLE_TYPE_TABLE,
                encode_local_variables(entries, code_len, &offset_of)?,
            )),
            CodeAttr::StackMap(frames) => attributes.push(Attribute::new(
                names::STACK_MAP_TABLE,
                encode_frames(frames, &body.initial_locals, &offsets, code_len, pool)?,
            )),
            CodeAttr::Raw(raw) => {
                if body.insns.is_dirty() {
                    debug!("Dropping {} attribute of rewritten code", raw.name);
                } else {
                    attributes.push(raw.clone());
                }
            }
        }
    }
    Attribute::write_table(&attributes, &mut out, pool)?;

    Ok(out)
}

fn encode_local_variables(
    entries: &[LocalVariable],
    code_len: u32,
    offset_of: &dyn Fn(&Label) -> Result<u32>,
) -> Result<Vec<u8>> {
    let mut kept = Vec::with_capacity(entries.len());
    for entry in entries {
        let start = offset_of(&entry.start)?;
        let end = offset_of(&entry.end)?;
        if start >= code_len || end < start {
            continue;
        }
        kept.push((start as u16, (end - start) as u16, entry));
    }

    let mut data = Vec::with_capacity(2 + kept.len() * 10);
    write_len_u16(&mut data, kept.len(), "local variables")?;
    for (start, length, entry) in kept {
        write_be(&mut data, start);
        write_be(&mut data, length);
        write_be(&mut data, entry.name_index);
        write_be(&mut data, entry.descriptor_index);
        write_be(&mut data, entry.slot);
    }
    Ok(data)
}
