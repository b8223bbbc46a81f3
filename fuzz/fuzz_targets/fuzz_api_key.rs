//! Fuzz target: `ApiKey::verify`
//!
//! Splits the input into a configured key and a presented key and checks
//! that verification agrees with plain byte equality.
//!
//! Invariants checked:
//! - No panics under any byte sequence
//! - `verify` is true exactly when the keys are equal, non-empty and
//!   within the length limit
//!
//! cargo fuzz run fuzz_api_key

#![no_main]

use critical_section as _;
use libfuzzer_sys::fuzz_target;

use aquacontrol::api::ApiKey;
use aquacontrol::api::auth::MAX_KEY_LEN;

fuzz_target!(|data: &[u8]| {
    let Some((&split, rest)) = data.split_first() else {
        return;
    };
    let mid = (split as usize).min(rest.len());
    let (secret, presented) = rest.split_at(mid);

    let key = ApiKey::new(secret);
    let expected = !presented.is_empty() && presented.len() <= MAX_KEY_LEN && presented == secret;
    assert_eq!(key.verify(presented), expected);
    assert!(key.verify(secret) == (!secret.is_empty() && secret.len() <= MAX_KEY_LEN));
});
