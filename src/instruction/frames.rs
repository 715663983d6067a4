//! Expansion and recompression of `StackMapTable` frames.
//!
//! On read, every compressed frame is expanded into the complete local variable and operand
//! stack state it describes, relative to its predecessor (the first frame is relative to the
//! implicit entry frame). On write, frames are compressed again against their predecessor,
//! choosing the smallest form that describes the difference: `same`, `same_locals_1_stack_item`,
//! `chop`, `append` or `full`.
//!
//! Frames whose labels end up on the same offset after an edit collapse into the last one.

use std::collections::HashMap;

use crate::{
    classfile::{constpool::ConstantPool, descriptor},
    file::{
        io::{write_be, write_len_u16},
        parser::Parser,
    },
    instruction::{
        code::{Frame, VType},
        decoder::LabelMap,
        Label,
    },
    Result,
};

const SAME_MAX: u8 = 63;
const SAME_LOCALS_1_STACK_ITEM: u8 = 64;
const SAME_LOCALS_1_STACK_ITEM_MAX: u8 = 127;
const SAME_LOCALS_1_STACK_ITEM_EXTENDED: u8 = 247;
const CHOP_MIN: u8 = 248;
const SAME_FRAME_EXTENDED: u8 = 251;
const APPEND_MAX: u8 = 254;
const FULL_FRAME: u8 = 255;

mod vtag {
    pub const TOP: u8 = 0;
    pub const INTEGER: u8 = 1;
    pub const FLOAT: u8 = 2;
    pub const DOUBLE: u8 = 3;
    pub const LONG: u8 = 4;
    pub const NULL: u8 = 5;
    pub const UNINITIALIZED_THIS: u8 = 6;
    pub const OBJECT: u8 = 7;
    pub const UNINITIALIZED: u8 = 8;
}

/// The local variable types on method entry.
///
/// Instance methods start with the receiver, which is `UninitializedThis` in every constructor
/// except the one of `java/lang/Object`. Parameters follow, one entry each.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] if `method_descriptor` cannot be parsed.
pub fn initial_locals(
    class_name: &str,
    method_name: &str,
    method_descriptor: &str,
    is_static: bool,
) -> Result<Vec<VType>> {
    let (params, _) = descriptor::parse_method(method_descriptor)?;
    let mut locals = Vec::with_capacity(params.len() + 1);

    if !is_static {
        if method_name == "<init>" && class_name != "java/lang/Object" {
            locals.push(VType::UninitializedThis);
        } else {
            locals.push(VType::Object(class_name.to_string()));
        }
    }

    for param in params {
        locals.push(match param.as_bytes().first() {
            Some(b'B' | b'C' | b'I' | b'S' | b'Z') => VType::Integer,
            Some(b'F') => VType::Float,
            Some(b'J') => VType::Long,
            Some(b'D') => VType::Double,
            _ => VType::Object(descriptor::reference_name(param).to_string()),
        });
    }

    Ok(locals)
}

/// Expand a `StackMapTable` payload into full frames.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] for reserved frame types, chops past the entry frame and
/// invalid verification types.
pub(crate) fn decode_frames(
    data: &[u8],
    pool: &ConstantPool,
    initial: &[VType],
    labels: &mut LabelMap,
) -> Result<Vec<Frame>> {
    let mut parser = Parser::new(data);
    let count = parser.read_be::<u16>()?;
    let mut frames = Vec::with_capacity(usize::from(count));
    let mut locals = initial.to_vec();
    let mut previous: Option<u32> = None;

    for _ in 0..count {
        let frame_type = parser.read_be::<u8>()?;
        let (delta, stack) = match frame_type {
            0..=SAME_MAX => (u16::from(frame_type), Vec::new()),
            SAME_LOCALS_1_STACK_ITEM..=SAME_LOCALS_1_STACK_ITEM_MAX => {
                let item = read_vtype(&mut parser, pool, labels)?;
                (u16::from(frame_type - SAME_LOCALS_1_STACK_ITEM), vec![item])
            }
            SAME_LOCALS_1_STACK_ITEM_EXTENDED => {
                let delta = parser.read_be::<u16>()?;
                (delta, vec![read_vtype(&mut parser, pool, labels)?])
            }
            CHOP_MIN..=250 => {
                let delta = parser.read_be::<u16>()?;
                let chop = usize::from(SAME_FRAME_EXTENDED - frame_type);
                if chop > locals.len() {
                    return Err(malformed_error!(
                        "Chop frame removes {} locals from a frame with {}",
                        chop,
                        locals.len()
                    ));
                }
                locals.truncate(locals.len() - chop);
                (delta, Vec::new())
            }
            SAME_FRAME_EXTENDED => (parser.read_be::<u16>()?, Vec::new()),
            252..=APPEND_MAX => {
                let delta = parser.read_be::<u16>()?;
                for _ in 0..(frame_type - SAME_FRAME_EXTENDED) {
                    locals.push(read_vtype(&mut parser, pool, labels)?);
                }
                (delta, Vec::new())
            }
            FULL_FRAME => {
                let delta = parser.read_be::<u16>()?;
                locals = read_vtypes(&mut parser, pool, labels)?;
                let stack = read_vtypes(&mut parser, pool, labels)?;
                (delta, stack)
            }
            _ => {
                return Err(malformed_error!(
                    "Reserved stack map frame type {}",
                    frame_type
                ))
            }
        };

        let offset = match previous {
            None => u32::from(delta),
            Some(prev) => prev + u32::from(delta) + 1,
        };
        previous = Some(offset);

        frames.push(Frame {
            label: labels.at(offset),
            locals: locals.clone(),
            stack,
        });
    }

    if parser.has_more_data() {
        return Err(malformed_error!(
            "{} trailing bytes in StackMapTable",
            parser.remaining()
        ));
    }
    Ok(frames)
}

fn read_vtypes(
    parser: &mut Parser,
    pool: &ConstantPool,
    labels: &mut LabelMap,
) -> Result<Vec<VType>> {
    let count = parser.read_be::<u16>()?;
    let mut types = Vec::with_capacity(usize::from(count));
    for _ in 0..count {
        types.push(read_vtype(parser, pool, labels)?);
    }
    Ok(types)
}

fn read_vtype(parser: &mut Parser, pool: &ConstantPool, labels: &mut LabelMap) -> Result<VType> {
    let tag = parser.read_be::<u8>()?;
    Ok(match tag {
        vtag::TOP => VType::Top,
        vtag::INTEGER => VType::Integer,
        vtag::FLOAT => VType::Float,
        vtag::DOUBLE => VType::Double,
        vtag::LONG => VType::Long,
        vtag::NULL => VType::Null,
        vtag::UNINITIALIZED_THIS => VType::UninitializedThis,
        vtag::OBJECT => VType::Object(pool.class_name(parser.read_be::<u16>()?)?),
        vtag::UNINITIALIZED => {
            VType::Uninitialized(labels.at(u32::from(parser.read_be::<u16>()?)))
        }
        _ => return Err(malformed_error!("Invalid verification type tag {}", tag)),
    })
}

/// Compress frames back into a `StackMapTable` payload.
///
/// Frames at or past `code_len` are dropped; they can only appear when the code they described
/// was removed.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] if a label has no offset, frames are out of order, or a
/// class name cannot be interned.
pub(crate) fn encode_frames(
    frames: &[Frame],
    initial: &[VType],
    offsets: &HashMap<Label, u32>,
    code_len: u32,
    pool: &mut ConstantPool,
) -> Result<Vec<u8>> {
    let mut placed: Vec<(u32, &Frame)> = Vec::with_capacity(frames.len());
    for frame in frames {
        let Some(&offset) = offsets.get(&frame.label) else {
            return Err(malformed_error!("Frame label {} was not placed", frame.label));
        };
        if offset >= code_len {
            continue;
        }
        match placed.last_mut() {
            Some(last) if last.0 == offset => *last = (offset, frame),
            Some(last) if last.0 > offset => {
                return Err(malformed_error!(
                    "Stack map frame at {} follows frame at {}",
                    offset,
                    last.0
                ))
            }
            _ => placed.push((offset, frame)),
        }
    }

    let mut out = Vec::new();
    write_len_u16(&mut out, placed.len(), "stack map frames")?;

    let mut previous_locals = initial;
    let mut previous_offset: Option<u32> = None;
    for (offset, frame) in placed {
        let delta = match previous_offset {
            None => offset,
            Some(prev) => offset - prev - 1,
        };
        let Ok(delta) = u16::try_from(delta) else {
            return Err(malformed_error!("Frame offset delta {} out of range", delta));
        };
        previous_offset = Some(offset);

        write_frame(
            &mut out,
            delta,
            previous_locals,
            frame,
            offsets,
            pool,
        )?;
        previous_locals = frame.locals.as_slice();
    }

    Ok(out)
}

fn write_frame(
    out: &mut Vec<u8>,
    delta: u16,
    previous: &[VType],
    frame: &Frame,
    offsets: &HashMap<Label, u32>,
    pool: &mut ConstantPool,
) -> Result<()> {
    let locals = &frame.locals;
    let same_locals = locals.as_slice() == previous;

    if same_locals && frame.stack.is_empty() {
        if delta <= u16::from(SAME_MAX) {
            write_be(out, delta as u8);
        } else {
            write_be(out, SAME_FRAME_EXTENDED);
            write_be(out, delta);
        }
        return Ok(());
    }

    if same_locals && frame.stack.len() == 1 {
        if delta <= u16::from(SAME_MAX) {
            write_be(out, SAME_LOCALS_1_STACK_ITEM + delta as u8);
        } else {
            write_be(out, SAME_LOCALS_1_STACK_ITEM_EXTENDED);
            write_be(out, delta);
        }
        return write_vtype(out, &frame.stack[0], offsets, pool);
    }

    if frame.stack.is_empty() {
        if locals.len() < previous.len()
            && previous.len() - locals.len() <= 3
            && previous.starts_with(locals)
        {
            let chop = (previous.len() - locals.len()) as u8;
            write_be(out, SAME_FRAME_EXTENDED - chop);
            write_be(out, delta);
            return Ok(());
        }

        if locals.len() > previous.len()
            && locals.len() - previous.len() <= 3
            && locals.starts_with(previous)
        {
            let added = &locals[previous.len()..];
            write_be(out, SAME_FRAME_EXTENDED + added.len() as u8);
            write_be(out, delta);
            for vtype in added {
                write_vtype(out, vtype, offsets, pool)?;
            }
            return Ok(());
        }
    }

    write_be(out, FULL_FRAME);
    write_be(out, delta);
    write_len_u16(out, locals.len(), "frame locals")?;
    for vtype in locals {
        write_vtype(out, vtype, offsets, pool)?;
    }
    write_len_u16(out, frame.stack.len(), "frame stack")?;
    for vtype in &frame.stack {
        write_vtype(out, vtype, offsets, pool)?;
    }
    Ok(())
}

fn write_vtype(
    out: &mut Vec<u8>,
    vtype: &VType,
    offsets: &HashMap<Label, u32>,
    pool: &mut ConstantPool,
) -> Result<()> {
    match vtype {
        VType::Top => write_be(out, vtag::TOP),
        VType::Integer => write_be(out, vtag::INTEGER),
        VType::Float => write_be(out, vtag::FLOAT),
        VType::Double => write_be(out, vtag::DOUBLE),
        VType::Long => write_be(out, vtag::LONG),
        VType::Null => write_be(out, vtag::NULL),
        VType::UninitializedThis => write_be(out, vtag::UNINITIALIZED_THIS),
        VType::Object(name) => {
            write_be(out, vtag::OBJECT);
            write_be(out, pool.intern_class(name)?);
        }
        VType::Uninitialized(label) => {
            let Some(&offset) = offsets.get(label) else {
                return Err(malformed_error!(
                    "Uninitialized type refers to unplaced label {}",
                    label
                ));
            };
            write_be(out, vtag::UNINITIALIZED);
            // code offsets are bounded by the 65535 byte code limit
            write_be(out, offset as u16);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(label: u32, locals: Vec<VType>, stack: Vec<VType>) -> Frame {
        Frame {
            label: Label(label),
            locals,
            stack,
        }
    }

    #[test]
    fn entry_frame() {
        let locals = initial_locals("p/A", "<init>", "(IJLp/B;[I)V", false).unwrap();
        assert_eq!(
            locals,
            vec![
                VType::UninitializedThis,
                VType::Integer,
                VType::Long,
                VType::Object("p/B".into()),
                VType::Object("[I".into()),
            ]
        );

        let locals = initial_locals("java/lang/Object", "<init>", "()V", false).unwrap();
        assert_eq!(locals, vec![VType::Object("java/lang/Object".into())]);

        let locals = initial_locals("p/A", "<clinit>", "()V", true).unwrap();
        assert!(locals.is_empty());
    }

    #[test]
    fn compress_then_expand() {
        let mut pool = ConstantPool::new();
        let initial = vec![VType::Object("p/A".into())];
        let frames = vec![
            // append one int local
            frame(0, vec![initial[0].clone(), VType::Integer], vec![]),
            // same locals, one stack item
            frame(1, vec![initial[0].clone(), VType::Integer], vec![VType::Null]),
            // chop back to the entry frame, far away
            frame(2, initial.clone(), vec![]),
            // full frame
            frame(3, vec![VType::Long], vec![VType::Integer, VType::Float]),
        ];
        let offsets: HashMap<Label, u32> =
            [(Label(0), 4), (Label(1), 9), (Label(2), 200), (Label(3), 300)]
                .into_iter()
                .collect();

        let data = encode_frames(&frames, &initial, &offsets, 400, &mut pool).unwrap();
        assert_eq!(&data[..2], &[0, 4]);
        // append_frame(252), delta 4, int
        assert_eq!(&data[2..6], &[252, 0, 4, 1]);
        // same_locals_1_stack_item with delta 4, null
        assert_eq!(&data[6..8], &[64 + 4, 5]);
        // chop 1 with extended delta
        assert_eq!(&data[8..11], &[250, 0, 190]);

        let mut labels = LabelMap::default();
        let decoded = decode_frames(&data, &pool, &initial, &mut labels).unwrap();
        assert_eq!(decoded.len(), 4);
        for (decoded, original) in decoded.iter().zip(&frames) {
            assert_eq!(decoded.locals, original.locals);
            assert_eq!(decoded.stack, original.stack);
        }
        assert_eq!(labels.offset_of(decoded[3].label), Some(300));
    }

    #[test]
    fn frames_on_one_offset_collapse_to_last() {
        let mut pool = ConstantPool::new();
        let initial = vec![];
        let frames = vec![
            frame(0, vec![VType::Integer], vec![]),
            frame(1, vec![VType::Float], vec![]),
            frame(2, vec![VType::Float], vec![]),
        ];
        let offsets: HashMap<Label, u32> = [(Label(0), 3), (Label(1), 3), (Label(2), 5)]
            .into_iter()
            .collect();

        let data = encode_frames(&frames, &initial, &offsets, 6, &mut pool).unwrap();
        assert_eq!(data, vec![0, 2, 252, 0, 3, 2, 1]);
    }

    #[test]
    fn frames_past_code_end_are_dropped() {
        let mut pool = ConstantPool::new();
        let frames = vec![frame(0, vec![], vec![])];
        let offsets: HashMap<Label, u32> = [(Label(0), 8)].into_iter().collect();

        let data = encode_frames(&frames, &[], &offsets, 8, &mut pool).unwrap();
        assert_eq!(data, vec![0, 0]);
    }

    #[test]
    fn reserved_type_is_malformed() {
        let pool = ConstantPool::new();
        let mut labels = LabelMap::default();
        assert!(decode_frames(&[0, 1, 200], &pool, &[], &mut labels).is_err());
        assert!(decode_frames(&[0, 1, 248, 0, 0], &pool, &[], &mut labels).is_err());
    }
}
