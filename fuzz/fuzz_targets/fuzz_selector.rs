#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 8192 { return; }
    let Ok(s) = std::str::from_utf8(data) else { return };
    let Ok(raw) = serde_json::from_str::<bson::Bson>(s) else { return };
    if let Ok(selector) = docstore::AttributeSelector::normalize(&raw) {
        let doc = bson::doc!{"id": 1, "a": {"b": 2, "c": [{"d": 3}, 4]}, "e": "f"};
        let projected = docstore::build_projection(&selector).with_paths(["id"]).apply(&doc);
        let picked = docstore::pick(&projected, &selector, &["id".to_string()]);
        assert!(picked.contains_key("id"));
    }
});
