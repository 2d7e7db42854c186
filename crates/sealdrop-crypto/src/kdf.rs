//! Key derivation: PBKDF2-HMAC-SHA512 password → key

use pbkdf2::pbkdf2_hmac;
use rand::{rngs::OsRng, RngCore};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha512;
use zeroize::Zeroizing;

use crate::error::{CryptoError, CryptoResult};

/// Default PBKDF2 iteration count, per current OWASP guidance for
/// PBKDF2-HMAC-SHA512. Earlier revisions of this scheme used 120,000 (and a
/// legacy 1,000-iteration SHA-1 variant that is not supported here).
pub const PBKDF2_ITERATIONS: u32 = 210_000;

/// Salt length in bytes. One fresh salt per encrypted file; the salt is stored
/// alongside the ciphertext's metadata, not inside the ciphertext.
pub const SALT_LENGTH: usize = 64;

/// PBKDF2 parameters
#[derive(Debug, Clone)]
pub struct KdfParams {
    /// Iteration count (default: [`PBKDF2_ITERATIONS`])
    pub iterations: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            iterations: PBKDF2_ITERATIONS,
        }
    }
}

/// Generate a fresh random salt from the OS CSPRNG.
pub fn generate_salt() -> [u8; SALT_LENGTH] {
    let mut salt = [0u8; SALT_LENGTH];
    OsRng.fill_bytes(&mut salt);
    salt
}

/// Derive a key of `key_len` bytes from a password and salt.
///
/// Deterministic: the same (password, salt, key_len, iterations) always yields
/// the same key, which is what lets decryption with the stored salt recover
/// the encryption key. Pure function; neither the password nor the derived
/// key is ever logged or stored.
pub fn derive_key(
    password: &SecretString,
    salt: &[u8],
    key_len: usize,
    params: &KdfParams,
) -> CryptoResult<Zeroizing<Vec<u8>>> {
    if key_len == 0 {
        return Err(CryptoError::InvalidParameter(
            "key length must be positive".into(),
        ));
    }
    if params.iterations == 0 {
        return Err(CryptoError::InvalidParameter(
            "PBKDF2 iteration count must be positive".into(),
        ));
    }

    let mut key = Zeroizing::new(vec![0u8; key_len]);
    pbkdf2_hmac::<Sha512>(
        password.expose_secret().as_bytes(),
        salt,
        params.iterations,
        &mut key,
    );
    Ok(key)
}
