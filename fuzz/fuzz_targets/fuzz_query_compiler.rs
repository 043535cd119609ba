#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 8192 { return; }
    if let Ok(s) = std::str::from_utf8(data) {
        // Compiling arbitrary JSON must either succeed or return a caller error, never panic
        let compiler = docstore::QueryCompiler::default();
        if let Ok(first) = compiler.compile_json(s) {
            assert_eq!(compiler.compile_json(s).ok(), Some(first));
        }
    }
});
