//! Locating and stripping the removal marker inside annotation attributes.
//!
//! The marker is an ordinary annotation, normally with class retention so it lands in
//! `RuntimeInvisibleAnnotations`; runtime retained markers in `RuntimeVisibleAnnotations` are
//! accepted as well. Only the marker itself is decoded. All other annotations in the same table
//! are skipped structurally and copied back byte for byte when the marker is stripped.

use std::ops::Range;

use crate::{
    classfile::{
        attribute::{names, Attribute},
        constpool::{ConstantPool, PoolEntry},
    },
    file::{io::write_be, parser::Parser},
    Error, Result,
};

/// Name of the single element the marker must carry
pub const REMOVE_ELEMENT: &str = "remove";

/// Decoded value of one marker element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerValue {
    /// A `boolean` constant
    Boolean(bool),
    /// Any other element value, identified by its tag character
    Other(char),
}

/// A removal marker found on a class, field or method
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marker {
    /// True if the marker was read from `RuntimeVisibleAnnotations`
    pub visible: bool,
    /// Element name/value pairs in declaration order
    pub elements: Vec<(String, MarkerValue)>,
}

impl Marker {
    /// The value of the `remove` element.
    ///
    /// Elements with other names are ignored.
    ///
    /// # Errors
    /// Returns [`Error::MalformedMarker`] if `remove` is missing, repeated, or not a boolean.
    /// `element` names the annotated class or member for the error message.
    pub fn remove_flag(&self, element: &str) -> Result<bool> {
        let mut values = self
            .elements
            .iter()
            .filter(|(name, _)| name == REMOVE_ELEMENT)
            .map(|(_, value)| *value);

        let malformed = |message: String| Error::MalformedMarker {
            element: element.to_string(),
            message,
        };

        let value = match (values.next(), values.next()) {
            (Some(value), None) => value,
            (None, _) => {
                return Err(malformed(format!(
                    "missing '{}' value ({} elements)",
                    REMOVE_ELEMENT,
                    self.elements.len()
                )))
            }
            (Some(_), Some(_)) => {
                return Err(malformed(format!("repeated '{}' value", REMOVE_ELEMENT)))
            }
        };

        match value {
            MarkerValue::Boolean(remove) => Ok(remove),
            MarkerValue::Other(tag) => Err(malformed(format!(
                "'{}' must be a boolean, found element tag '{}'",
                REMOVE_ELEMENT, tag
            ))),
        }
    }
}

fn is_annotation_table(name: &str) -> bool {
    name == names::RUNTIME_INVISIBLE_ANNOTATIONS || name == names::RUNTIME_VISIBLE_ANNOTATIONS
}

/// Find the marker with `descriptor` in an element's attributes without modifying them.
///
/// # Errors
/// Returns an error if an annotation table is malformed.
pub fn find_marker(
    attributes: &[Attribute],
    pool: &ConstantPool,
    descriptor: &str,
) -> Result<Option<Marker>> {
    for attribute in attributes.iter().filter(|a| is_annotation_table(&a.name)) {
        let visible = attribute.name == names::RUNTIME_VISIBLE_ANNOTATIONS;
        for span in annotation_spans(&attribute.data)? {
            if pool.utf8(span.type_index)? != descriptor {
                continue;
            }
            let mut parser = Parser::new(&attribute.data[span.range.clone()]);
            return Ok(Some(parse_marker(&mut parser, pool, visible)?));
        }
    }
    Ok(None)
}

/// Remove every annotation with `descriptor` from the annotation tables in `attributes`.
///
/// A table left without annotations is dropped entirely. Returns true if anything was removed.
///
/// # Errors
/// Returns an error if an annotation table is malformed.
pub fn strip_marker(
    attributes: &mut Vec<Attribute>,
    pool: &ConstantPool,
    descriptor: &str,
) -> Result<bool> {
    let mut stripped = false;
    let mut emptied = Vec::new();

    for (position, attribute) in attributes.iter_mut().enumerate() {
        if !is_annotation_table(&attribute.name) {
            continue;
        }

        let spans = annotation_spans(&attribute.data)?;
        let total = spans.len();
        let mut kept = Vec::with_capacity(total);
        for span in spans {
            if pool.utf8(span.type_index)? != descriptor {
                kept.push(span.range);
            }
        }

        if kept.len() == total {
            continue;
        }
        stripped = true;
        if kept.is_empty() {
            emptied.push(position);
            continue;
        }

        let mut data = Vec::with_capacity(attribute.data.len());
        // kept.len() is bounded by the parsed u16 count
        write_be(&mut data, kept.len() as u16);
        for range in kept {
            data.extend_from_slice(&attribute.data[range]);
        }
        attribute.data = data;
    }

    for position in emptied.into_iter().rev() {
        attributes.remove(position);
    }

    Ok(stripped)
}

struct AnnotationSpan {
    type_index: u16,
    range: Range<usize>,
}

fn annotation_spans(data: &[u8]) -> Result<Vec<AnnotationSpan>> {
    let mut parser = Parser::new(data);
    let count = parser.read_be::<u16>()?;
    let mut spans = Vec::with_capacity(usize::from(count));

    for _ in 0..count {
        let start = parser.pos();
        let type_index = skip_annotation(&mut parser)?;
        spans.push(AnnotationSpan {
            type_index,
            range: start..parser.pos(),
        });
    }

    if parser.has_more_data() {
        return Err(malformed_error!(
            "{} trailing bytes after annotation table",
            parser.remaining()
        ));
    }
    Ok(spans)
}

fn skip_annotation(parser: &mut Parser) -> Result<u16> {
    let type_index = parser.read_be::<u16>()?;
    let pairs = parser.read_be::<u16>()?;
    for _ in 0..pairs {
        parser.read_be::<u16>()?;
        skip_element_value(parser)?;
    }
    Ok(type_index)
}

fn skip_element_value(parser: &mut Parser) -> Result<()> {
    let tag = parser.read_be::<u8>()?;
    match tag {
        b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z' | b's' | b'c' => {
            parser.advance_by(2)
        }
        b'e' => parser.advance_by(4),
        b'@' => skip_annotation(parser).map(|_| ()),
        b'[' => {
            let count = parser.read_be::<u16>()?;
            for _ in 0..count {
                skip_element_value(parser)?;
            }
            Ok(())
        }
        _ => Err(malformed_error!(
            "Unknown annotation element tag 0x{:02X}",
            tag
        )),
    }
}

fn parse_marker(parser: &mut Parser, pool: &ConstantPool, visible: bool) -> Result<Marker> {
    parser.read_be::<u16>()?;
    let pairs = parser.read_be::<u16>()?;
    let mut elements = Vec::with_capacity(usize::from(pairs));

    for _ in 0..pairs {
        let name = pool.utf8(parser.read_be::<u16>()?)?;
        let tag = parser.peek_byte()?;
        let value = if tag == b'Z' {
            parser.advance_by(1)?;
            match pool.get(parser.read_be::<u16>()?)? {
                PoolEntry::Integer(v) => MarkerValue::Boolean(*v != 0),
                other => {
                    return Err(malformed_error!(
                        "Boolean element '{}' points at {:?}",
                        name,
                        other
                    ))
                }
            }
        } else {
            skip_element_value(parser)?;
            MarkerValue::Other(char::from(tag))
        };
        elements.push((name, value));
    }

    Ok(Marker { visible, elements })
}

/// Build an annotation table payload holding one marker with a `remove` value.
///
/// Used by [`crate::classfile::builder`] to synthesize marked classes.
///
/// # Errors
/// Returns an error if the pool overflows.
pub fn marker_table(pool: &mut ConstantPool, descriptor: &str, remove: bool) -> Result<Vec<u8>> {
    let mut data = Vec::with_capacity(13);
    write_be(&mut data, 1_u16);
    write_be(&mut data, pool.intern_utf8(descriptor)?);
    write_be(&mut data, 1_u16);
    write_be(&mut data, pool.intern_utf8(REMOVE_ELEMENT)?);
    write_be(&mut data, b'Z');
    write_be(&mut data, pool.intern(PoolEntry::Integer(i32::from(remove)))?);
    Ok(data)
}
