//! Fuzz target for signed request parsing and validation
//!
//! Validation runs on attacker-supplied tokens and must never panic,
//! whatever the header, claims or embedded key look like.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use oauth_shr::{decode_shr, validate_shr_at, ShrValidation};

#[derive(Arbitrary, Debug)]
struct FuzzShrInput {
    token: String,
    method: Option<String>,
    authority: Option<String>,
    path: Option<String>,
    nonce: Option<String>,
    access_token: Option<String>,
    max_age_secs: u64,
    now: i64,
}

fuzz_target!(|input: FuzzShrInput| {
    let _ = decode_shr(&input.token);

    let config = ShrValidation {
        max_age_secs: input.max_age_secs,
        expected_method: input.method,
        expected_authority: input.authority,
        expected_path: input.path,
        require_nonce: input.nonce.is_some(),
        expected_nonce: input.nonce,
        expected_access_token: input.access_token,
    };
    let _ = validate_shr_at(&input.token, &config, input.now);
});
