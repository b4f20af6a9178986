//! Tape key derivation
//!
//! A tape is addressed by a key derived from the request method and the
//! request target (path plus query string, exactly as received). The same
//! derivation runs on the record path (to name the tape being written) and
//! on the replay path (to name the tape being looked up), so a recorded
//! exchange is found by any structurally identical later request.

use xxhash_rust::xxh3::xxh3_128;

/// Separator between method and path in the pre-hash input. '|' cannot
/// appear in an HTTP method or request target.
const KEY_SEPARATOR: char = '|';

/// Derive the tape key for a request
///
/// Hashes `{method}|{path}` with xxh3-128 and formats the digest as 32
/// lowercase hex characters. The result is deterministic, collision
/// resistant, and safe to use as a filesystem entry name.
///
/// Matching is by method and path only; request bodies and headers do not
/// participate in the key.
pub fn derive_key(method: &str, path: &str) -> String {
    let input = format!("{}{}{}", method, KEY_SEPARATOR, path);
    format!("{:032x}", xxh3_128(input.as_bytes()))
}
