//! Fuzz target for the tabula schema compiler.
//!
//! This target feeds arbitrary byte sequences through every compilation
//! phase to find crashes, panics, and other unexpected behavior.
//!
//! Run with:
//! ```bash
//! cargo +nightly fuzz run fuzz_schema_parser
//! ```

#![no_main]

use libfuzzer_sys::fuzz_target;
use tabula_schema::{Compiler, write_model};

fuzz_target!(|data: &[u8]| {
    // Convert bytes to string, ignoring invalid UTF-8
    if let Ok(input) = std::str::from_utf8(data) {
        let mut compiler = Compiler::new();
        compiler.parse_str("fuzz.ort", input);

        // Problems must surface as messages, never as panics
        let comp = compiler.compile();
        if comp.ok {
            let _ = write_model(&comp.model);
        }
    }
});
