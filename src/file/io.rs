//! Big-endian, bounds-checked reading and writing of primitive values.
//!
//! Everything inside a class file is stored in big-endian byte order, so unlike a general purpose
//! binary toolkit this module only exposes the big-endian direction. Reads are bounds-checked and
//! report [`crate::Error::OutOfBounds`] instead of panicking; writes append to a growable buffer,
//! since class files are always produced front to back.
//!
//! # Key Components
//!
//! - [`crate::file::io::ByteIO`] - Conversion between primitive types and their byte arrays
//! - [`crate::file::io::read_be`] - Read a value from the start of a buffer
//! - [`crate::file::io::read_be_at`] - Read a value at an offset and advance the offset
//! - [`crate::file::io::write_be`] - Append a value to a buffer
//! - [`crate::file::io::write_be_at`] - Overwrite a value at an offset and advance the offset
//!
//! # Examples
//!
//! ```rust,ignore
//! use coderemover::file::io::{read_be_at, write_be};
//!
//! let mut out = Vec::new();
//! write_be(&mut out, 0xCAFE_BABE_u32);
//! write_be(&mut out, 52_u16);
//!
//! let mut offset = 0;
//! let magic: u32 = read_be_at(&out, &mut offset)?;
//! let major: u16 = read_be_at(&out, &mut offset)?;
//! assert_eq!((magic, major, offset), (0xCAFE_BABE, 52, 6));
//! # Ok::<(), coderemover::Error>(())
//! ```

use crate::{Error::OutOfBounds, Result};

/// Conversion between a primitive type and its fixed-size big-endian byte representation.
///
/// Implemented for all integer and floating point types that occur in class files.
pub trait ByteIO: Sized {
    /// Byte array holding the encoded value
    type Bytes: Sized + AsRef<[u8]> + for<'a> TryFrom<&'a [u8]>;

    /// Decode from a big-endian byte array
    fn from_be_bytes(bytes: Self::Bytes) -> Self;

    /// Encode into a big-endian byte array
    fn to_be_bytes(self) -> Self::Bytes;
}

macro_rules! impl_byte_io {
    ($($ty:ty),* $(,)?) => {
        $(
            impl ByteIO for $ty {
                type Bytes = [u8; std::mem::size_of::<$ty>()];

                fn from_be_bytes(bytes: Self::Bytes) -> Self {
                    <$ty>::from_be_bytes(bytes)
                }

                fn to_be_bytes(self) -> Self::Bytes {
                    <$ty>::to_be_bytes(self)
                }
            }
        )*
    };
}

impl_byte_io!(u8, i8, u16, i16, u32, i32, u64, i64, f32, f64);

/// Reads a value of type `T` from the start of `data`.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if `data` is too short.
pub fn read_be<T: ByteIO>(data: &[u8]) -> Result<T> {
    let mut offset = 0_usize;
    read_be_at(data, &mut offset)
}

/// Reads a value of type `T` at `offset` and advances `offset` past it.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if fewer than `size_of::<T>()` bytes remain.
pub fn read_be_at<T: ByteIO>(data: &[u8], offset: &mut usize) -> Result<T> {
    let type_len = std::mem::size_of::<T>();
    let Some(end) = offset.checked_add(type_len) else {
        return Err(OutOfBounds);
    };
    if end > data.len() {
        return Err(OutOfBounds);
    }

    let Ok(read) = data[*offset..end].try_into() else {
        return Err(OutOfBounds);
    };

    *offset = end;
    Ok(T::from_be_bytes(read))
}

/// Appends `value` to `data` in big-endian byte order.
pub fn write_be<T: ByteIO>(data: &mut Vec<u8>, value: T) {
    data.extend_from_slice(value.to_be_bytes().as_ref());
}

/// Overwrites the bytes at `offset` with `value` and advances `offset` past it.
///
/// Used to back-patch lengths and branch offsets once they are known.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if the value does not fit at `offset`.
pub fn write_be_at<T: ByteIO>(data: &mut [u8], offset: &mut usize, value: T) -> Result<()> {
    let bytes = value.to_be_bytes();
    let bytes = bytes.as_ref();
    let Some(end) = offset.checked_add(bytes.len()) else {
        return Err(OutOfBounds);
    };
    if end > data.len() {
        return Err(OutOfBounds);
    }

    data[*offset..end].copy_from_slice(bytes);
    *offset = end;
    Ok(())
}

/// Appends a `u16` length prefix for `len`.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] if `len` exceeds the `u16` range.
pub fn write_len_u16(data: &mut Vec<u8>, len: usize, what: &str) -> Result<()> {
    let Ok(len) = u16::try_from(len) else {
        return Err(malformed_error!("Too many {} ({}) for a u16 count", what, len));
    };
    write_be(data, len);
    Ok(())
}

/// Appends a `u32` length prefix for `len`.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] if `len` exceeds the `u32` range.
pub fn write_len_u32(data: &mut Vec<u8>, len: usize, what: &str) -> Result<()> {
    let Ok(len) = u32::try_from(len) else {
        return Err(malformed_error!("{} too large ({} bytes)", what, len));
    };
    write_be(data, len);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_BUFFER: [u8; 8] = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];

    #[test]
    fn read_be_u8() {
        let result = read_be::<u8>(&TEST_BUFFER).unwrap();
        assert_eq!(result, 0x01);
    }

    #[test]
    fn read_be_u16() {
        let result = read_be::<u16>(&TEST_BUFFER).unwrap();
        assert_eq!(result, 0x0102);
    }

    #[test]
    fn read_be_i16_negative() {
        let result = read_be::<i16>(&[0xFF, 0xFE]).unwrap();
        assert_eq!(result, -2);
    }

    #[test]
    fn read_be_u32() {
        let result = read_be::<u32>(&TEST_BUFFER).unwrap();
        assert_eq!(result, 0x0102_0304);
    }

    #[test]
    fn read_be_u64() {
        let result = read_be::<u64>(&TEST_BUFFER).unwrap();
        assert_eq!(result, 0x0102_0304_0506_0708);
    }

    #[test]
    fn read_be_f32() {
        let result = read_be::<f32>(&1.5_f32.to_be_bytes()).unwrap();
        assert_eq!(result, 1.5);
    }

    #[test]
    fn read_be_at_advances() {
        let mut offset = 2;
        let value: u16 = read_be_at(&TEST_BUFFER, &mut offset).unwrap();
        assert_eq!(value, 0x0304);
        assert_eq!(offset, 4);
    }

    #[test]
    fn read_out_of_bounds() {
        let mut offset = 6;
        assert!(matches!(
            read_be_at::<u32>(&TEST_BUFFER, &mut offset),
            Err(OutOfBounds)
        ));
        assert_eq!(offset, 6);

        let mut offset = usize::MAX;
        assert!(read_be_at::<u8>(&TEST_BUFFER, &mut offset).is_err());
    }

    #[test]
    fn write_appends() {
        let mut data = vec![0xAA];
        write_be(&mut data, 0x0102_u16);
        write_be(&mut data, -1_i32);
        assert_eq!(data, [0xAA, 0x01, 0x02, 0xFF, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn write_at_patches() {
        let mut data = vec![0u8; 6];
        let mut offset = 2;
        write_be_at(&mut data, &mut offset, 0xCAFE_BABE_u32).unwrap();
        assert_eq!(data, [0, 0, 0xCA, 0xFE, 0xBA, 0xBE]);
        assert_eq!(offset, 6);

        assert!(write_be_at(&mut data, &mut offset, 1_u8).is_err());
    }

    #[test]
    fn length_prefixes() {
        let mut data = Vec::new();
        write_len_u16(&mut data, 3, "entries").unwrap();
        write_len_u32(&mut data, 70_000, "attribute").unwrap();
        assert_eq!(data, [0x00, 0x03, 0x00, 0x01, 0x11, 0x70]);

        assert!(write_len_u16(&mut data, 65_536, "entries").is_err());
    }
}
