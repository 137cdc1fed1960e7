//! Fuzz target for request URL splitting

#![no_main]

use libfuzzer_sys::fuzz_target;
use oauth_shr::RequestTarget;

fuzz_target!(|data: &[u8]| {
    if let Ok(url) = std::str::from_utf8(data) {
        if let Ok(target) = RequestTarget::parse(url) {
            // Authority and path are slices of the input, never invented
            assert!(!target.authority().is_empty());
            assert!(url.contains(target.authority()));
            if let Some(path) = target.path() {
                assert!(path.starts_with('/'));
                assert!(url.contains(path));
            }
        }
    }
});
