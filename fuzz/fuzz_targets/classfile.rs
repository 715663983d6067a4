#![no_main]

use coderemover::classfile::{reader::parse_class, writer::write_class};
use coderemover::registry::DEFAULT_MARKER;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(class) = parse_class(data, DEFAULT_MARKER) {
        let _ = write_class(&class);
    }
});
