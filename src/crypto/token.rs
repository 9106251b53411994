use base64::{Engine as _, engine::general_purpose};
use rand::Rng;
use rand::distributions::Alphanumeric;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Hashes the input with SHA-256 and encodes the digest as URL-safe,
/// unpadded base64 (`+`→`-`, `/`→`_`, no trailing `=`).
///
/// # Arguments
///
/// * `input` - The bytes to hash.
///
/// # Returns
///
/// The URL-safe base64-encoded digest.
pub fn hash(input: &[u8]) -> String {
    general_purpose::URL_SAFE_NO_PAD.encode(Sha256::digest(input))
}

/// Generates a random URL-safe string of exactly `length` characters.
///
/// The alphabet is alphanumeric only, so the output never contains the
/// `-` used as the salt/hash separator in tokens. Drawn from the
/// operating system's CSPRNG.
///
/// # Arguments
///
/// * `length` - The number of characters to generate.
///
/// # Returns
///
/// A random alphanumeric string of `length` characters.
pub fn random_string(length: usize) -> String {
    OsRng
        .sample_iter(Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// Derives a token from a secret and a salt.
///
/// The token layout is `{salt}-{hash(salt + "-" + secret)}`. Verification
/// recomputes this exact byte layout, so it must never change.
///
/// # Arguments
///
/// * `secret` - The client secret.
/// * `salt` - The per-token salt.
///
/// # Returns
///
/// The derived token string.
pub fn tokenize(secret: &str, salt: &str) -> String {
    format!("{}-{}", salt, hash(format!("{}-{}", salt, secret).as_bytes()))
}

/// Verifies a presented token against a secret.
///
/// The salt is everything before the first `-` (the salt alphabet
/// excludes `-`, so the first occurrence is always the separator). The
/// expected token is recomputed in full and compared to the presented
/// one in constant time. Malformed input is rejected, never a panic.
///
/// # Arguments
///
/// * `secret` - The client secret.
/// * `token` - The presented token.
///
/// # Returns
///
/// `true` if the token was derived from `secret`, `false` otherwise.
pub fn verify_token(secret: &str, token: &str) -> bool {
    if secret.is_empty() || token.is_empty() {
        return false;
    }

    let Some(separator) = token.find('-') else {
        return false;
    };

    let expected = tokenize(secret, &token[..separator]);

    if expected.len() != token.len() {
        return false;
    }

    expected.as_bytes().ct_eq(token.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_is_salted() {
        let token1 = tokenize("secret", "salt1");
        let token2 = tokenize("secret", "salt2");
        assert_ne!(token1, token2);
        assert!(verify_token("secret", &token1));
        assert!(verify_token("secret", &token2));
    }

    #[test]
    fn verify_accepts_derived_token() {
        let salt = random_string(8);
        let token = tokenize("secret", &salt);
        assert!(verify_token("secret", &token));
    }

    #[test]
    fn verify_rejects_foreign_secret() {
        let token = tokenize("secret-one", "abcd1234");
        assert!(!verify_token("secret-two", &token));
    }

    #[test]
    fn verify_rejects_malformed_input() {
        let token = tokenize("secret", "abcd1234");
        assert!(!verify_token("", &token));
        assert!(!verify_token("secret", ""));
        assert!(!verify_token("secret", "noseparator"));
        assert!(!verify_token("secret", "abcd1234-tooshort"));
        assert!(!verify_token("secret", &format!("{}x", token)));
    }

    #[test]
    fn verify_rejects_tampered_salt() {
        let token = tokenize("secret", "abcd1234");
        let tampered = format!("dcba4321-{}", &token["abcd1234-".len()..]);
        assert!(!verify_token("secret", &tampered));
    }

    #[test]
    fn hash_output_is_url_safe() {
        for input in [&b""[..], b"hello", b"\xff\xfe\xfd\x00\x01"] {
            let digest = hash(input);
            assert!(!digest.contains('+'));
            assert!(!digest.contains('/'));
            assert!(!digest.contains('='));
        }
    }

    #[test]
    fn random_string_has_exact_length_and_no_separator() {
        for length in [1, 8, 24, 64] {
            let s = random_string(length);
            assert_eq!(s.len(), length);
            assert!(!s.contains('-'));
        }
    }
}
