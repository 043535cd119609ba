#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 8192 { return; }
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(exprs) = docstore::QueryCompiler::default().compile_json(s) {
            // A few documents to exercise nested, array and missing-field paths
            let docs = [
                bson::doc!{"a": 1, "b": 2, "name": "x"},
                bson::doc!{"a": 10, "b": -5, "name": "y", "nested": {"z": 3}},
                bson::doc!{"active": true, "tags": ["p", "q"], "cast": [{"n": 1}, {"n": 2}]},
            ];
            for d in &docs {
                let _ = docstore::memory::matches_document(d, &exprs);
            }
        }
    }
});
