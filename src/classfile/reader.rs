//! Class file parsing into [`ClassRecord`] values.
//!
//! The whole class is parsed eagerly: names are resolved through the constant pool, method
//! bodies are decoded into instruction lists and markers are located. Attributes without
//! meaning to the removal passes are kept raw.

use crate::{
    classfile::{
        annotation::find_marker,
        attribute::{names, Attribute},
        constpool::ConstantPool,
        flags::{ClassAccessFlags, FieldAccessFlags, MethodAccessFlags},
        MAGIC,
    },
    file::parser::Parser,
    instruction::decoder::{decode_code, MethodContext},
    registry::record::{ClassKind, ClassRecord, FieldRecord, MethodRecord},
    Error, Result,
};

/// Parse a class file.
///
/// `marker` is the descriptor of the removal marker annotation, e.g.
/// `Lcoderemover/Removable;`.
///
/// # Errors
/// Returns [`Error::Empty`] for empty input, [`Error::NotSupported`] if the magic number is
/// missing and [`Error::Malformed`] or [`Error::OutOfBounds`] for damaged class files.
///
/// # Examples
///
/// ```rust,no_run
/// use coderemover::classfile::reader::parse_class;
///
/// let bytes = std::fs::read("Example.class")?;
/// let class = parse_class(&bytes, "Lcoderemover/Removable;")?;
/// println!("{} extends {:?}", class.name, class.super_name);
/// # Ok::<(), coderemover::Error>(())
/// ```
pub fn parse_class(data: &[u8], marker: &str) -> Result<ClassRecord> {
    if data.is_empty() {
        return Err(Error::Empty);
    }

    let mut parser = Parser::new(data);
    if parser.read_be::<u32>()? != MAGIC {
        return Err(Error::NotSupported);
    }
    let minor_version = parser.read_be::<u16>()?;
    let major_version = parser.read_be::<u16>()?;
    let pool = ConstantPool::parse(&mut parser)?;

    let access = ClassAccessFlags::from_bits_retain(parser.read_be()?);
    let name = pool.class_name(parser.read_be()?)?;
    let super_name = match parser.read_be::<u16>()? {
        0 => None,
        index => Some(pool.class_name(index)?),
    };
    let interfaces = parser
        .read_u16_table()?
        .into_iter()
        .map(|index| pool.class_name(index))
        .collect::<Result<Vec<_>>>()?;

    let field_count = parser.read_be::<u16>()?;
    let mut fields = Vec::with_capacity(usize::from(field_count));
    for _ in 0..field_count {
        let access = FieldAccessFlags::from_bits_retain(parser.read_be()?);
        let field_name = pool.utf8(parser.read_be()?)?;
        let descriptor = pool.utf8(parser.read_be()?)?;
        let attributes = Attribute::parse_table(&mut parser, &pool)?;
        fields.push(FieldRecord {
            access,
            marker: find_marker(&attributes, &pool, marker)?,
            name: field_name,
            descriptor,
            attributes,
        });
    }

    let method_count = parser.read_be::<u16>()?;
    let mut methods = Vec::with_capacity(usize::from(method_count));
    for _ in 0..method_count {
        let access = MethodAccessFlags::from_bits_retain(parser.read_be()?);
        let method_name = pool.utf8(parser.read_be()?)?;
        let descriptor = pool.utf8(parser.read_be()?)?;
        let attributes = Attribute::parse_table(&mut parser, &pool)?;

        let code = match attributes.iter().find(|a| a.name == names::CODE) {
            Some(attribute) => Some(decode_code(
                &attribute.data,
                &pool,
                MethodContext {
                    class_name: &name,
                    name: &method_name,
                    descriptor: &descriptor,
                    is_static: access.contains(MethodAccessFlags::STATIC),
                },
            )?),
            None => None,
        };

        methods.push(MethodRecord {
            access,
            marker: find_marker(&attributes, &pool, marker)?,
            name: method_name,
            descriptor,
            attributes,
            code,
        });
    }

    let attributes = Attribute::parse_table(&mut parser, &pool)?;
    if parser.has_more_data() {
        return Err(malformed_error!(
            "{} trailing bytes after class {}",
            parser.remaining(),
            name
        ));
    }

    Ok(ClassRecord {
        kind: ClassKind::classify(access, super_name.as_deref()),
        marker: find_marker(&attributes, &pool, marker)?,
        name,
        super_name,
        interfaces,
        fields,
        methods,
        access,
        minor_version,
        major_version,
        attributes,
        pool,
        modified: false,
    })
}
