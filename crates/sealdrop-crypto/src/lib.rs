//! sealdrop-crypto: client-side encryption for confidential repository uploads
//!
//! Files are encrypted before they leave the machine; the repository operator
//! only ever sees ciphertext. The decryption key is derived from a user
//! password or rebuilt from a pair of key-share files, never stored remotely.
//!
//! Ciphertext wire format (binary):
//! ```text
//! [12 bytes: nonce][N bytes: AES-256-GCM ciphertext][16 bytes: GHASH tag]
//! ```
//!
//! Key flow:
//! ```text
//! password + random salt --PBKDF2-HMAC-SHA512--> 256-bit key
//!   ├── AES-256-GCM over the file (64 KiB chunks, single nonce + tag)
//!   └── optional XOR split: share0 ^ share1 == key (one-time-pad pair)
//! ```
//!
//! The salt and key-share files are handed back to the caller; persisting them
//! (verification-record service, user download) is the caller's concern.

pub mod engine;
pub mod error;
mod gcm;
pub mod kdf;
pub mod key;
pub mod keysplit;
pub mod service;

pub use engine::FileCipher;
pub use error::{CryptoError, CryptoResult};
pub use kdf::{derive_key, generate_salt, KdfParams, PBKDF2_ITERATIONS, SALT_LENGTH};
pub use key::SymmetricKey;
pub use keysplit::{rebuild_key, split_key, split_key_n};
pub use service::{
    decrypt_stream_with_password, decrypt_stream_with_shares, decrypt_with_password,
    decrypt_with_shares, encrypt_stream_with_password, encrypt_with_password,
    regenerate_key_shares, share_filename, EncryptReceipt, KeyShareFile,
};

/// Size of a symmetric key in bytes (AES-256)
pub const KEY_SIZE: usize = 32;

/// Size of a GCM nonce (96-bit)
pub const NONCE_SIZE: usize = 12;

/// Size of a GCM authentication tag
pub const TAG_SIZE: usize = 16;

/// Plaintext chunk size for the streaming paths. Internal tuning parameter,
/// not part of the wire format.
pub const CHUNK_SIZE: usize = 64 * 1024;
