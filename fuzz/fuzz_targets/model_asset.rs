#![no_main]

use kohi_core::codec::ModelAsset;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = ModelAsset::deserialize(data);
});
