#![no_main]

use coderemover::pipeline::CodeRemover;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = CodeRemover::default().process_bytes(data);
});
