#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(value) = cbor_visitor::decode(data) else {
        return;
    };

    // Canonical output must decode back to an equal value, and is a fixed point
    let encoded = cbor_visitor::encode(&value);
    let decoded = cbor_visitor::decode(&encoded).expect("canonical output failed to decode");
    if !contains_nan(&value) {
        assert_eq!(value, decoded);
    }
    assert_eq!(encoded, cbor_visitor::encode(&decoded));
    assert!(encoded.len() <= data.len());
});

fn contains_nan(value: &cbor_visitor::Value) -> bool {
    match value {
        cbor_visitor::Value::Float(f) => f.is_nan(),
        cbor_visitor::Value::Array(items) => items.iter().any(contains_nan),
        cbor_visitor::Value::Map(map) => {
            map.iter().any(|(k, v)| contains_nan(k) || contains_nan(v))
        }
        _ => false,
    }
}
