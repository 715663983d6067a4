//! Cursor-based binary parser for class file structures.
//!
//! [`Parser`] walks a byte slice front to back, reading big-endian primitives and raw byte runs
//! with bounds checking. It is used for the class file itself as well as for the nested
//! structures stored inside attributes (code, stack map frames, annotations), each of which is
//! parsed with its own `Parser` over the attribute payload.
//!
//! # Examples
//!
//! ```rust
//! use coderemover::Parser;
//!
//! let data = [0xCA, 0xFE, 0xBA, 0xBE, 0x00, 0x00, 0x00, 0x34];
//! let mut parser = Parser::new(&data);
//!
//! assert_eq!(parser.read_be::<u32>()?, 0xCAFE_BABE);
//! assert_eq!(parser.read_be::<u16>()?, 0);
//! assert_eq!(parser.read_be::<u16>()?, 52);
//! assert!(!parser.has_more_data());
//! # Ok::<(), coderemover::Error>(())
//! ```

use crate::{
    file::io::{read_be_at, ByteIO},
    Result,
};

/// A bounds-checked reading cursor over a byte slice.
pub struct Parser<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> Parser<'a> {
    /// Create a new parser positioned at the start of `data`.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Parser { data, position: 0 }
    }

    /// Total length of the underlying data
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the underlying data is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns true if the cursor has not yet reached the end of the data
    #[must_use]
    pub fn has_more_data(&self) -> bool {
        self.position < self.data.len()
    }

    /// Number of bytes left after the cursor
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.position)
    }

    /// Move the cursor to an absolute position.
    ///
    /// Seeking to `len()` is allowed and leaves the parser exhausted.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if `pos` lies past the end of the data.
    pub fn seek(&mut self, pos: usize) -> Result<()> {
        if pos > self.data.len() {
            return Err(out_of_bounds_error!());
        }

        self.position = pos;
        Ok(())
    }

    /// Skip `step` bytes.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if fewer than `step` bytes remain.
    pub fn advance_by(&mut self, step: usize) -> Result<()> {
        if step > self.remaining() {
            return Err(out_of_bounds_error!());
        }

        self.position += step;
        Ok(())
    }

    /// Current cursor position
    #[must_use]
    pub fn pos(&self) -> usize {
        self.position
    }

    /// The full underlying data, independent of the cursor
    #[must_use]
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Look at the next byte without consuming it.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] at the end of the data.
    pub fn peek_byte(&self) -> Result<u8> {
        if self.position >= self.data.len() {
            return Err(out_of_bounds_error!());
        }
        Ok(self.data[self.position])
    }

    /// Skip padding so the cursor lands on a multiple of `alignment`, measured from `base`.
    ///
    /// The `tableswitch` and `lookupswitch` operands are aligned relative to the start of the
    /// method's code, which is not necessarily offset 0 of the slice being parsed.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the padding runs past the end of the data.
    pub fn align(&mut self, base: usize, alignment: usize) -> Result<()> {
        let relative = self.position.saturating_sub(base);
        let padding = (alignment - (relative % alignment)) % alignment;
        self.advance_by(padding)
    }

    /// Read a big-endian value and advance the cursor.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the value does not fit in the remaining data.
    pub fn read_be<T: ByteIO>(&mut self) -> Result<T> {
        read_be_at::<T>(self.data, &mut self.position)
    }

    /// Read `len` raw bytes and advance the cursor.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if fewer than `len` bytes remain.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        if len > self.remaining() {
            return Err(out_of_bounds_error!());
        }

        let slice = &self.data[self.position..self.position + len];
        self.position += len;
        Ok(slice)
    }

    /// Read a `u16` count and then that many `u16` values, the layout used by interface tables
    /// and several attribute bodies.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the table is truncated.
    pub fn read_u16_table(&mut self) -> Result<Vec<u16>> {
        let count = self.read_be::<u16>()?;
        let mut values = Vec::with_capacity(usize::from(count));
        for _ in 0..count {
            values.push(self.read_be::<u16>()?);
        }
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn sequential_reads() {
        let data = [0x00, 0x2A, 0xFF, 0xFF, 0xFF, 0xFE, 0x07];
        let mut parser = Parser::new(&data);

        assert_eq!(parser.read_be::<u16>().unwrap(), 42);
        assert_eq!(parser.read_be::<i32>().unwrap(), -2);
        assert_eq!(parser.peek_byte().unwrap(), 7);
        assert_eq!(parser.remaining(), 1);
        assert_eq!(parser.read_be::<u8>().unwrap(), 7);
        assert!(!parser.has_more_data());
        assert!(matches!(parser.read_be::<u8>(), Err(Error::OutOfBounds)));
    }

    #[test]
    fn read_bytes_and_seek() {
        let data = [1, 2, 3, 4, 5];
        let mut parser = Parser::new(&data);

        parser.seek(1).unwrap();
        assert_eq!(parser.read_bytes(3).unwrap(), &[2, 3, 4]);
        assert!(parser.read_bytes(2).is_err());

        parser.seek(5).unwrap();
        assert!(!parser.has_more_data());
        assert!(parser.seek(6).is_err());
    }

    #[test]
    fn align_relative_to_base() {
        let data = [0u8; 16];
        let mut parser = Parser::new(&data);

        // code starts at 2, switch opcode at code offset 0 -> operands at code offset 4
        parser.seek(3).unwrap();
        parser.align(2, 4).unwrap();
        assert_eq!(parser.pos(), 6);

        parser.align(2, 4).unwrap();
        assert_eq!(parser.pos(), 6);
    }

    #[test]
    fn u16_table() {
        let data = [0x00, 0x02, 0x00, 0x05, 0x00, 0x09];
        let mut parser = Parser::new(&data);
        assert_eq!(parser.read_u16_table().unwrap(), vec![5, 9]);

        let truncated = [0x00, 0x02, 0x00, 0x05];
        assert!(Parser::new(&truncated).read_u16_table().is_err());
    }
}
