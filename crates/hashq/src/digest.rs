use base64::{Engine as _, engine::general_purpose::STANDARD};
use sha2::{Digest as _, Sha512};

/// Length of an encoded digest: 64 bytes of SHA-512 in padded base64.
pub const DIGEST_LEN: usize = 88;

/// Hashes `value` with SHA-512 and encodes the result as standard, padded
/// base64.
///
/// The output is deterministic, printable and JSON-safe. Empty input is valid
/// and yields the digest of the empty string.
///
/// # Example
///
/// ```
/// use hashq::{digest, DIGEST_LEN};
///
/// let encoded = digest(b"angryMonkey");
/// assert_eq!(encoded.len(), DIGEST_LEN);
/// assert!(encoded.ends_with("=="));
/// ```
pub fn digest(value: impl AsRef<[u8]>) -> String {
    let hash = Sha512::digest(value.as_ref());
    STANDARD.encode(hash)
}
