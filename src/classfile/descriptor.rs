//! Field and method descriptor helpers.

use crate::Result;

/// True for the two descriptors that take two operand stack and local variable slots
#[must_use]
pub fn is_wide(descriptor: &str) -> bool {
    matches!(descriptor.as_bytes().first(), Some(b'J' | b'D'))
}

/// Number of operand stack slots a value of this field descriptor occupies
#[must_use]
pub fn value_slots(descriptor: &str) -> u16 {
    match descriptor.as_bytes().first() {
        Some(b'V') | None => 0,
        Some(b'J' | b'D') => 2,
        Some(_) => 1,
    }
}

/// Split a method descriptor into its parameter descriptors and return descriptor.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] if `descriptor` is not a well formed method descriptor.
///
/// # Examples
///
/// ```rust
/// use coderemover::classfile::descriptor::parse_method;
///
/// let (params, ret) = parse_method("(I[Ljava/lang/String;J)V")?;
/// assert_eq!(params, ["I", "[Ljava/lang/String;", "J"]);
/// assert_eq!(ret, "V");
/// # Ok::<(), coderemover::Error>(())
/// ```
pub fn parse_method(descriptor: &str) -> Result<(Vec<&str>, &str)> {
    let Some(rest) = descriptor.strip_prefix('(') else {
        return Err(malformed_error!("Method descriptor '{}' lacks '('", descriptor));
    };

    let mut params = Vec::new();
    let mut remaining = rest;
    loop {
        if let Some(ret) = remaining.strip_prefix(')') {
            let (ret_type, tail) = split_field_type(ret, descriptor)?;
            if !tail.is_empty() {
                return Err(malformed_error!(
                    "Trailing characters in method descriptor '{}'",
                    descriptor
                ));
            }
            return Ok((params, ret_type));
        }
        let (param, tail) = split_field_type(remaining, descriptor)?;
        if param == "V" {
            return Err(malformed_error!(
                "void parameter in method descriptor '{}'",
                descriptor
            ));
        }
        params.push(param);
        remaining = tail;
    }
}

fn split_field_type<'a>(input: &'a str, whole: &str) -> Result<(&'a str, &'a str)> {
    let bytes = input.as_bytes();
    let mut end = 0;
    while bytes.get(end) == Some(&b'[') {
        end += 1;
    }
    match bytes.get(end) {
        Some(b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z' | b'V') => {
            Ok(input.split_at(end + 1))
        }
        Some(b'L') => match input[end..].find(';') {
            Some(semi) => Ok(input.split_at(end + semi + 1)),
            None => Err(malformed_error!("Unterminated class type in '{}'", whole)),
        },
        _ => Err(malformed_error!("Invalid descriptor '{}'", whole)),
    }
}

/// Total local variable slots taken by the parameters of a method descriptor
///
/// # Errors
/// Returns [`crate::Error::Malformed`] if `descriptor` is not a well formed method descriptor.
pub fn argument_slots(descriptor: &str) -> Result<u16> {
    let (params, _) = parse_method(descriptor)?;
    Ok(params.into_iter().map(value_slots).sum())
}

/// The name a verification type uses for a reference descriptor: the internal name for class
/// types and the descriptor itself for arrays.
#[must_use]
pub fn reference_name(descriptor: &str) -> &str {
    descriptor
        .strip_prefix('L')
        .and_then(|d| d.strip_suffix(';'))
        .unwrap_or(descriptor)
}
