#![no_main]

use libfuzzer_sys::fuzz_target;

use tide_pool::PoolSnapshot;
use tide_rebase::WrapperSnapshot;

// Decoding arbitrary bytes must fail cleanly, and anything that decodes
// must re-encode to a snapshot that decodes to the same state.
fuzz_target!(|data: &[u8]| {
    if let Ok(snapshot) = PoolSnapshot::from_bytes(data) {
        let bytes = snapshot.to_bytes().expect("decoded snapshot re-encodes");
        let again = PoolSnapshot::from_bytes(&bytes).expect("re-encoded snapshot decodes");
        assert_eq!(again.to_bytes().expect("stable encoding"), bytes);
    }

    if let Ok(snapshot) = WrapperSnapshot::from_bytes(data) {
        let bytes = snapshot.to_bytes().expect("decoded snapshot re-encodes");
        let again = WrapperSnapshot::from_bytes(&bytes).expect("re-encoded snapshot decodes");
        assert_eq!(again.into_wrapper(), snapshot.into_wrapper());
    }
});
