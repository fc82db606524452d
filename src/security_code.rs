// Security code generation for challenge/response confirmation

use rand::Rng;

/// Alphabet the codes are drawn from. 36 symbols, upper-case only so the
/// validator can compare against an upper-cased reply byte-for-byte.
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Default code length. 36^6 possible codes is enough to deter guessing
/// within the one-minute validity window; this is not a cryptographic token.
pub const DEFAULT_CODE_LENGTH: usize = 6;

/// Generate a random security code of `length` characters.
///
/// Each character is an independent uniform draw from [`CODE_ALPHABET`].
/// Codes are not guaranteed unique across calls.
pub fn generate_security_code(length: usize) -> String {
    let mut rng = rand::rng();
    (0..length)
        .map(|_| CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}
