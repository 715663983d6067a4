//! Serialization of [`ClassRecord`] values back into class files.
//!
//! The record's constant pool is cloned and extended with whatever the new content needs; the
//! original entries keep their indices, so raw attributes stay valid. Method bodies are encoded
//! again only if they were modified, otherwise the original `Code` attribute is copied.
//!
//! A class flagged as modified is compacted afterwards: pool entries nothing refers to any more,
//! such as the names of removed members and stripped markers, are dropped. Unmodified classes
//! keep their pool as read and round-trip byte for byte.

use log::warn;

use crate::{
    classfile::{
        attribute::{names, Attribute},
        compact::compact_pool,
        constpool::ConstantPool,
        MAGIC,
    },
    file::io::{write_be, write_len_u16},
    instruction::encoder::encode_code,
    registry::record::{ClassRecord, MethodRecord},
    Result,
};

/// Serialize a class.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] if a modified method body cannot be encoded or the
/// constant pool overflows.
pub fn write_class(class: &ClassRecord) -> Result<Vec<u8>> {
    let mut pool = class.pool.clone();
    let mut body = Vec::with_capacity(1024);

    write_be(&mut body, class.access.bits());
    write_be(&mut body, pool.intern_class(&class.name)?);
    match &class.super_name {
        Some(super_name) => write_be(&mut body, pool.intern_class(super_name)?),
        None => write_be(&mut body, 0_u16),
    }

    write_len_u16(&mut body, class.interfaces.len(), "interfaces")?;
    for interface in &class.interfaces {
        write_be(&mut body, pool.intern_class(interface)?);
    }

    write_len_u16(&mut body, class.fields.len(), "fields")?;
    for field in &class.fields {
        write_be(&mut body, field.access.bits());
        write_be(&mut body, pool.intern_utf8(&field.name)?);
        write_be(&mut body, pool.intern_utf8(&field.descriptor)?);
        Attribute::write_table(&field.attributes, &mut body, &mut pool)?;
    }

    write_len_u16(&mut body, class.methods.len(), "methods")?;
    for method in &class.methods {
        write_method(method, &mut body, &mut pool)?;
    }

    Attribute::write_table(&class.attributes, &mut body, &mut pool)?;

    let mut out = Vec::with_capacity(body.len() + pool.len() * 8 + 10);
    write_be(&mut out, MAGIC);
    write_be(&mut out, class.minor_version);
    write_be(&mut out, class.major_version);
    pool.write(&mut out);
    out.extend_from_slice(&body);

    if !class.is_modified() {
        return Ok(out);
    }
    match compact_pool(&out) {
        Ok(Some(compacted)) => Ok(compacted),
        Ok(None) => Ok(out),
        Err(error) => {
            warn!(
                "Keeping the full constant pool of {}: {}",
                class.name, error
            );
            Ok(out)
        }
    }
}

fn write_method(method: &MethodRecord, out: &mut Vec<u8>, pool: &mut ConstantPool) -> Result<()> {
    write_be(out, method.access.bits());
    write_be(out, pool.intern_utf8(&method.name)?);
    write_be(out, pool.intern_utf8(&method.descriptor)?);

    write_len_u16(out, method.attributes.len(), "method attributes")?;
    for attribute in &method.attributes {
        match &method.code {
            Some(code) if attribute.name == names::CODE && code.is_modified() => {
                let encoded = Attribute::new(names::CODE, encode_code(code, pool)?);
                encoded.write(out, pool)?;
            }
            _ => attribute.write(out, pool)?,
        }
    }
    Ok(())
}
