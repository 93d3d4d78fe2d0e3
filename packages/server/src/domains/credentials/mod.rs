//! Credential store - password hashing and verification.
//!
//! Stored format is `salt:derivedKeyHex`. The derived key comes from
//! PBKDF2-HMAC-SHA512 so existing rows stay verifiable across deploys;
//! comparison is constant-time.

use pbkdf2::pbkdf2_hmac;
use rand::rngs::OsRng;
use rand::{Rng, RngCore};
use sha2::Sha512;
use subtle::ConstantTimeEq;
use tracing::warn;

const KDF_ITERATIONS: u32 = 10_000;
const KDF_OUTPUT_LEN: usize = 64;
const SALT_LEN: usize = 16;

/// Alphabet for generated passwords (84 characters).
const PASSWORD_ALPHABET: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789!@#$%^&*()-_=+[]{}<>?~";

/// Default length for passwords generated for federated accounts.
pub const GENERATED_PASSWORD_LEN: usize = 16;

/// Hash a password into `salt:derivedKeyHex` form.
///
/// A fresh random 16-byte salt (hex-encoded) is generated when none is
/// supplied; passing an explicit salt is only useful for re-deriving.
pub fn hash_password(password: &str, salt: Option<&str>) -> String {
    let salt = match salt {
        Some(s) => s.to_string(),
        None => generate_salt(),
    };
    let derived = derive_key(password, &salt);
    format!("{}:{}", salt, hex::encode(derived))
}

/// Verify a password against a stored `salt:derivedKeyHex` value.
///
/// Never errors: malformed stored values verify as `false` and are logged.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let Some((salt, expected_hex)) = stored.split_once(':') else {
        warn!("stored credential is not in salt:hash form");
        return false;
    };
    let Ok(expected) = hex::decode(expected_hex) else {
        warn!("stored credential hash is not valid hex");
        return false;
    };
    if expected.len() != KDF_OUTPUT_LEN {
        warn!(len = expected.len(), "stored credential hash has wrong length");
        return false;
    }
    let derived = derive_key(password, salt);
    derived[..].ct_eq(&expected[..]).into()
}

/// Generate a random password for federated accounts.
///
/// These accounts can never log in with a password they know - they must
/// always arrive via the one-time-token path.
pub fn generate_random_password(length: usize) -> String {
    let mut rng = OsRng;
    (0..length)
        .map(|_| {
            let idx = rng.gen_range(0..PASSWORD_ALPHABET.len());
            PASSWORD_ALPHABET[idx] as char
        })
        .collect()
}

fn generate_salt() -> String {
    let mut bytes = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn derive_key(password: &str, salt: &str) -> [u8; KDF_OUTPUT_LEN] {
    let mut out = [0u8; KDF_OUTPUT_LEN];
    pbkdf2_hmac::<Sha512>(
        password.as_bytes(),
        salt.as_bytes(),
        KDF_ITERATIONS,
        &mut out,
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_roundtrip() {
        let stored = hash_password("hunter2", None);
        assert!(verify_password("hunter2", &stored));
        assert!(!verify_password("hunter3", &stored));
    }

    #[test]
    fn test_hashing_twice_yields_different_salts() {
        let a = hash_password("same password", None);
        let b = hash_password("same password", None);
        assert_ne!(a, b, "fresh salts must produce different stored values");
        assert!(verify_password("same password", &a));
        assert!(verify_password("same password", &b));
    }

    #[test]
    fn test_stored_format() {
        let stored = hash_password("pw", None);
        let (salt, hash) = stored.split_once(':').expect("salt:hash form");
        assert_eq!(salt.len(), SALT_LEN * 2, "salt is hex-encoded 16 bytes");
        assert_eq!(hash.len(), KDF_OUTPUT_LEN * 2, "hash is hex-encoded 64 bytes");
    }

    #[test]
    fn test_explicit_salt_is_deterministic() {
        let a = hash_password("pw", Some("0011223344556677"));
        let b = hash_password("pw", Some("0011223344556677"));
        assert_eq!(a, b);
    }

    #[test]
    fn test_malformed_stored_values_never_verify() {
        assert!(!verify_password("pw", ""));
        assert!(!verify_password("pw", "no-separator"));
        assert!(!verify_password("pw", "salt:not-hex!"));
        assert!(!verify_password("pw", "salt:abcd")); // wrong length
    }

    #[test]
    fn test_generated_password_shape() {
        let pw = generate_random_password(GENERATED_PASSWORD_LEN);
        assert_eq!(pw.len(), GENERATED_PASSWORD_LEN);
        assert!(pw.bytes().all(|b| PASSWORD_ALPHABET.contains(&b)));
    }

    #[test]
    fn test_generated_passwords_differ() {
        let a = generate_random_password(16);
        let b = generate_random_password(16);
        assert_ne!(a, b);
    }
}
