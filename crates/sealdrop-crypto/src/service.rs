//! Encryption orchestration: password and key-share entry points
//!
//! Composes key derivation, secret splitting, and the file cipher into the
//! operations the upload/download layers call. The caller persists what comes
//! back (ciphertext to the repository, salt to the verification-record
//! service, share files offered to the user); nothing is stored here.

use std::io::{Read, Seek, Write};
use std::time::Instant;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::engine::FileCipher;
use crate::error::{CryptoError, CryptoResult};
use crate::kdf::{derive_key, generate_salt, KdfParams};
use crate::key::SymmetricKey;
use crate::keysplit::{rebuild_key, split_key};
use crate::KEY_SIZE;

/// One key-share file to offer to the user: base64 share bytes under a
/// deterministic name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyShareFile {
    pub filename: String,
    pub contents_b64: String,
}

/// Everything the caller must persist after an encryption, besides the
/// ciphertext itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptReceipt {
    /// Base64 salt, stored with the file's verification record
    pub salt_b64: String,
    /// Present only when share generation was requested
    pub key_shares: Option<Vec<KeyShareFile>>,
}

/// Deterministic share filename: dots in the original name become
/// underscores, then `_key-<n>.txt` with a 1-based share number.
pub fn share_filename(original: &str, index: usize) -> String {
    format!("{}_key-{}.txt", original.replace('.', "_"), index + 1)
}

/// Encrypt a buffer under a password-derived key.
///
/// Generates a fresh salt, derives the key, optionally splits it into two
/// share files named after `share_basename`, and returns the
/// `[nonce][ciphertext][tag]` blob plus the receipt.
pub fn encrypt_with_password(
    plaintext: &[u8],
    password: &SecretString,
    share_basename: Option<&str>,
) -> CryptoResult<(Vec<u8>, EncryptReceipt)> {
    let start = Instant::now();

    let salt = generate_salt();
    let key = password_key(password, &salt)?;
    let key_shares = share_basename.map(|name| make_share_files(key.as_bytes(), name));

    let mut cipher = FileCipher::new(key);
    let ciphertext = cipher.encrypt(plaintext)?;

    tracing::debug!(
        bytes = ciphertext.len() as u64,
        elapsed_ms = start.elapsed().as_millis() as u64,
        shares = key_shares.is_some(),
        "file encrypted with password-derived key"
    );

    Ok((
        ciphertext,
        EncryptReceipt {
            salt_b64: BASE64.encode(salt),
            key_shares,
        },
    ))
}

/// Streaming variant of [`encrypt_with_password`]: reads plaintext from
/// `reader` in chunks and writes the ciphertext blob to `writer`.
pub fn encrypt_stream_with_password<R: Read, W: Write>(
    reader: R,
    writer: W,
    password: &SecretString,
    share_basename: Option<&str>,
) -> CryptoResult<EncryptReceipt> {
    let start = Instant::now();

    let salt = generate_salt();
    let key = password_key(password, &salt)?;
    let key_shares = share_basename.map(|name| make_share_files(key.as_bytes(), name));

    let mut cipher = FileCipher::new(key);
    let written = cipher.encrypt_stream(reader, writer)?;

    tracing::debug!(
        bytes = written,
        elapsed_ms = start.elapsed().as_millis() as u64,
        shares = key_shares.is_some(),
        "file encrypted with password-derived key"
    );

    Ok(EncryptReceipt {
        salt_b64: BASE64.encode(salt),
        key_shares,
    })
}

/// Decrypt a blob with the password and the salt stored at encryption time.
pub fn decrypt_with_password(
    blob: &[u8],
    password: &SecretString,
    salt_b64: &str,
) -> CryptoResult<Vec<u8>> {
    let salt = decode_b64(salt_b64, "salt")?;
    let key = password_key(password, &salt)?;
    FileCipher::new(key).decrypt(blob)
}

/// Streaming variant of [`decrypt_with_password`]. Same caveat as
/// [`FileCipher::decrypt_stream`]: output is unverified until `Ok` returns.
pub fn decrypt_stream_with_password<R: Read + Seek, W: Write>(
    reader: R,
    writer: W,
    password: &SecretString,
    salt_b64: &str,
) -> CryptoResult<u64> {
    let salt = decode_b64(salt_b64, "salt")?;
    let key = password_key(password, &salt)?;
    FileCipher::new(key).decrypt_stream(reader, writer)
}

/// Decrypt a blob by rebuilding the key from base64 key shares.
///
/// Requires the full set of shares produced at encryption time, in any order.
pub fn decrypt_with_shares(blob: &[u8], shares_b64: &[impl AsRef<str>]) -> CryptoResult<Vec<u8>> {
    let key = shares_key(shares_b64)?;
    FileCipher::new(key).decrypt(blob)
}

/// Streaming variant of [`decrypt_with_shares`].
pub fn decrypt_stream_with_shares<R: Read + Seek, W: Write>(
    reader: R,
    writer: W,
    shares_b64: &[impl AsRef<str>],
) -> CryptoResult<u64> {
    let key = shares_key(shares_b64)?;
    FileCipher::new(key).decrypt_stream(reader, writer)
}

/// Re-derive the key from a password and stored salt and split it again.
///
/// Lets a user who still knows the password regenerate lost share files
/// without re-uploading. The new shares are a fresh random split; they do not
/// match the originals byte-for-byte but rebuild the same key.
pub fn regenerate_key_shares(
    password: &SecretString,
    salt_b64: &str,
    share_basename: &str,
) -> CryptoResult<Vec<KeyShareFile>> {
    let salt = decode_b64(salt_b64, "salt")?;
    let key = password_key(password, &salt)?;
    Ok(make_share_files(key.as_bytes(), share_basename))
}

fn password_key(password: &SecretString, salt: &[u8]) -> CryptoResult<SymmetricKey> {
    let bytes = derive_key(password, salt, KEY_SIZE, &KdfParams::default())?;
    SymmetricKey::from_slice(&bytes)
}

fn shares_key(shares_b64: &[impl AsRef<str>]) -> CryptoResult<SymmetricKey> {
    // Decoded shares are key material; wipe them once the key is rebuilt
    let mut shares: Vec<Zeroizing<Vec<u8>>> = Vec::with_capacity(shares_b64.len());
    for share in shares_b64 {
        shares.push(Zeroizing::new(decode_b64(share.as_ref(), "key share")?));
    }
    let key = rebuild_key(&shares)?;
    SymmetricKey::from_slice(&key)
}

fn make_share_files(key: &[u8], basename: &str) -> Vec<KeyShareFile> {
    split_key(key)
        .iter()
        .enumerate()
        .map(|(idx, share)| KeyShareFile {
            filename: share_filename(basename, idx),
            contents_b64: BASE64.encode(share.as_slice()),
        })
        .collect()
}

fn decode_b64(value: &str, what: &str) -> CryptoResult<Vec<u8>> {
    BASE64
        .decode(value)
        .map_err(|e| CryptoError::InvalidParameter(format!("{what} is not valid base64: {e}")))
}
