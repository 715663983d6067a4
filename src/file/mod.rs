//! Low-level binary access shared by the class file reader and writer.
//!
//! - [`io`] - big-endian primitive encoding with bounds checks
//! - [`parser`] - the [`parser::Parser`] reading cursor

pub mod io;
pub mod parser;
