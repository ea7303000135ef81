use crate::shortcode::ShortCode;

/// Digits, then upper case, then lower case: the `base62` crate's standard
/// ordering. It is ascending ASCII, so equal-length codes sort the same way
/// as their numbers.
pub const ALPHABET: &[u8; 62] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Longest encoding of a `u64` (`62^10 < u64::MAX < 62^11`).
pub const MAX_ENCODED_LEN: usize = 11;

/// Maps allocated integers to short codes.
///
/// Implementations must be pure, total and injective.
pub trait ShortCodeEncoder: Send + Sync + 'static {
    fn encode(&self, n: u64) -> ShortCode;
}

/// Positional base-62 encoding, most significant digit first, no padding.
#[derive(Debug, Clone, Copy, Default)]
pub struct Base62;

impl ShortCodeEncoder for Base62 {
    fn encode(&self, n: u64) -> ShortCode {
        ShortCode::generated(n)
    }
}

/// Encodes `n` in base 62. `0` encodes to `"0"`.
pub fn encode(n: u64) -> String {
    base62::encode(n)
}

/// Decodes a base-62 string back to its number.
///
/// Returns `None` for empty input, characters outside the alphabet,
/// non-canonical leading zeros, or values that do not fit in a `u64`.
pub fn decode(s: &str) -> Option<u64> {
    if s.is_empty() || s.len() > MAX_ENCODED_LEN {
        return None;
    }
    if s.len() > 1 && s.as_bytes()[0] == ALPHABET[0] {
        return None;
    }

    let n = base62::decode(s).ok()?;
    u64::try_from(n).ok()
}
