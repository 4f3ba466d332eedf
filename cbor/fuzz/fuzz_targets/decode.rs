#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok((value, len)) = cbor_visitor::decode_prefix(data) {
        assert!(len <= data.len());
        _ = format!("{value:?}");
    }
});
