//! Fuzz target for NVM record decoding
//!
//! Feeds arbitrary bytes to every record decoder. Decoding must never
//! panic, and anything that decodes must survive an encode/decode cycle
//! unchanged.

#![no_main]

use libfuzzer_sys::fuzz_target;
use meshpae_nvm::{
    FrameCounterSet, KeyStorageIndex, KeyStorageRecord, NetworkInfo, NvmRecord, SecurityKeys,
};

fn check<R: NvmRecord>(data: &[u8]) {
    if let Ok(record) = R::decode(data) {
        let canonical = record.encode();
        let again = R::decode(&canonical).expect("re-encoded record must decode");
        assert_eq!(again.encode(), canonical, "encoding is not stable");
    }
}

fuzz_target!(|data: &[u8]| {
    check::<NetworkInfo>(data);
    check::<SecurityKeys>(data);
    check::<FrameCounterSet>(data);
    check::<KeyStorageIndex>(data);
    check::<KeyStorageRecord>(data);
});
