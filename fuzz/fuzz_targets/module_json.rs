#![no_main]

use libfuzzer_sys::fuzz_target;
use scil::{assembly::ModuleBody, Analyzer};

fuzz_target!(|data: &[u8]| {
    if let Ok(module) = ModuleBody::from_reader(data) {
        let _ = Analyzer::default().analyze_module(&module);
    }
});
