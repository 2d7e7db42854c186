//! File encryption engine: one AEAD instance bound to a single key
//!
//! Produces and consumes the `[nonce][ciphertext][tag]` wire format. Buffered
//! calls go through the `aes-gcm` one-shot API; the streaming calls run the
//! incremental state machine in [`crate::gcm`] so a multi-gigabyte file never
//! has to fit in memory.

use std::collections::HashSet;
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::time::Instant;

use aes::cipher::generic_array::GenericArray;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::Aes256Gcm;
use rand::{rngs::OsRng, RngCore};

use crate::error::{CryptoError, CryptoResult};
use crate::gcm::GcmStream;
use crate::key::SymmetricKey;
use crate::{CHUNK_SIZE, NONCE_SIZE, TAG_SIZE};

/// AES-256-GCM cipher bound to one key, usable for several files.
///
/// Tracks every nonce it has handed out and redraws on collision, so the same
/// (key, nonce) pair is never used twice within one instance's lifetime. The
/// set lives only in memory and is owned exclusively by this instance: do not
/// share one `FileCipher` across unsynchronized concurrent encryptions —
/// give each pipeline its own instance (or its own key) instead.
pub struct FileCipher {
    key: SymmetricKey,
    used_nonces: HashSet<[u8; NONCE_SIZE]>,
}

impl FileCipher {
    pub fn new(key: SymmetricKey) -> Self {
        Self {
            key,
            used_nonces: HashSet::new(),
        }
    }

    /// Construct with a freshly generated random key.
    pub fn generate() -> Self {
        Self::new(SymmetricKey::generate())
    }

    /// Construct from raw key bytes, rejecting any length other than 32.
    pub fn from_key_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        Ok(Self::new(SymmetricKey::from_slice(bytes)?))
    }

    pub fn key(&self) -> &SymmetricKey {
        &self.key
    }

    /// Encrypt a whole buffer, returning `[nonce][ciphertext][tag]`.
    pub fn encrypt(&mut self, plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
        let nonce = self.next_nonce();
        let cipher = Aes256Gcm::new(GenericArray::from_slice(self.key.as_bytes()));
        let sealed = cipher
            .encrypt(GenericArray::from_slice(&nonce), plaintext)
            .map_err(|_| {
                CryptoError::InvalidParameter("plaintext exceeds AES-GCM length limit".into())
            })?;

        let mut blob = Vec::with_capacity(NONCE_SIZE + sealed.len());
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(&sealed);
        Ok(blob)
    }

    /// Decrypt a whole `[nonce][ciphertext][tag]` blob.
    ///
    /// Verify-then-release: no plaintext is returned unless the tag checks
    /// out. Truncated blobs and authentication failures both surface as
    /// [`CryptoError::Decryption`].
    pub fn decrypt(&self, blob: &[u8]) -> CryptoResult<Vec<u8>> {
        if blob.len() < NONCE_SIZE + TAG_SIZE {
            return Err(CryptoError::Decryption);
        }
        let (nonce, sealed) = blob.split_at(NONCE_SIZE);
        let cipher = Aes256Gcm::new(GenericArray::from_slice(self.key.as_bytes()));
        cipher
            .decrypt(GenericArray::from_slice(nonce), sealed)
            .map_err(|_| CryptoError::Decryption)
    }

    /// Encrypt a byte stream in 64 KiB chunks, writing `[nonce][ciphertext]
    /// [tag]` in that order. Memory use is bounded by the chunk size.
    ///
    /// Returns the total number of bytes written (plaintext length + 28).
    /// Inputs past AES-GCM's per-message limit (just under 64 GiB) fail with
    /// [`CryptoError::InvalidParameter`] rather than reusing keystream.
    pub fn encrypt_stream<R: Read, W: Write>(
        &mut self,
        mut reader: R,
        mut writer: W,
    ) -> CryptoResult<u64> {
        let start = Instant::now();

        let nonce = self.next_nonce();
        writer.write_all(&nonce)?;

        let mut gcm = GcmStream::new(self.key.as_bytes(), &nonce);
        let mut buf = vec![0u8; CHUNK_SIZE];
        let mut written = NONCE_SIZE as u64;
        loop {
            let n = match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            gcm.encrypt_chunk(&mut buf[..n])?;
            writer.write_all(&buf[..n])?;
            written += n as u64;
        }

        let tag = gcm.finalize();
        writer.write_all(&tag)?;
        written += TAG_SIZE as u64;

        tracing::debug!(
            bytes = written,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "stream encryption complete"
        );
        Ok(written)
    }

    /// Decrypt a seekable `[nonce][ciphertext][tag]` source in 64 KiB chunks.
    ///
    /// The tag is read from the tail before any ciphertext is processed, but
    /// plaintext chunks are written out as they are produced and are
    /// unverified until the final tag check: if this returns an error, the
    /// caller must discard everything written to `writer`.
    ///
    /// Returns the number of plaintext bytes written.
    pub fn decrypt_stream<R: Read + Seek, W: Write>(
        &self,
        mut reader: R,
        mut writer: W,
    ) -> CryptoResult<u64> {
        let start = Instant::now();

        let total = reader.seek(SeekFrom::End(0))?;
        if total < (NONCE_SIZE + TAG_SIZE) as u64 {
            return Err(CryptoError::Decryption);
        }
        let body_len = total - (NONCE_SIZE + TAG_SIZE) as u64;

        reader.seek(SeekFrom::End(-(TAG_SIZE as i64)))?;
        let mut tag = [0u8; TAG_SIZE];
        reader.read_exact(&mut tag)?;

        reader.seek(SeekFrom::Start(0))?;
        let mut nonce = [0u8; NONCE_SIZE];
        reader.read_exact(&mut nonce)?;

        let mut gcm = GcmStream::new(self.key.as_bytes(), &nonce);
        let mut body = reader.take(body_len);
        let mut buf = vec![0u8; CHUNK_SIZE];
        let mut written = 0u64;
        loop {
            let n = match body.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            gcm.decrypt_chunk(&mut buf[..n])?;
            writer.write_all(&buf[..n])?;
            written += n as u64;
        }

        gcm.verify(&tag)?;

        tracing::debug!(
            bytes = written,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "stream decryption complete"
        );
        Ok(written)
    }

    fn next_nonce(&mut self) -> [u8; NONCE_SIZE] {
        let mut nonce = [0u8; NONCE_SIZE];
        loop {
            OsRng.fill_bytes(&mut nonce);
            // insert() is false if this nonce was already drawn for this key
            if self.used_nonces.insert(nonce) {
                return nonce;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Cursor;

    fn make_data(size: usize) -> Vec<u8> {
        (0..size)
            .map(|i| (i.wrapping_mul(7) ^ (i >> 3)) as u8)
            .collect()
    }

    fn test_cipher() -> FileCipher {
        FileCipher::new(SymmetricKey::from_bytes([0x42u8; 32]))
    }

    #[test]
    fn test_buffered_roundtrip() {
        let mut cipher = test_cipher();
        let plaintext = b"hello, encrypted world!";

        let blob = cipher.encrypt(plaintext).unwrap();
        let decrypted = cipher.decrypt(&blob).unwrap();

        assert_eq!(&decrypted, plaintext);
    }

    #[test]
    fn test_blob_layout() {
        let mut cipher = test_cipher();
        let plaintext = make_data(1000);

        let blob = cipher.encrypt(&plaintext).unwrap();

        // nonce (12) + ciphertext (1000) + tag (16)
        assert_eq!(blob.len(), NONCE_SIZE + 1000 + TAG_SIZE);
    }

    #[test]
    fn test_empty_plaintext() {
        let mut cipher = test_cipher();
        let blob = cipher.encrypt(b"").unwrap();
        assert_eq!(blob.len(), NONCE_SIZE + TAG_SIZE);
        assert_eq!(cipher.decrypt(&blob).unwrap(), b"");
    }

    #[test]
    fn test_stream_and_buffered_interoperate() {
        // The streaming encryptor and the aes-gcm one-shot must produce and
        // accept the same wire format.
        for size in [0, 1, CHUNK_SIZE - 1, CHUNK_SIZE, CHUNK_SIZE + 1, 3 * CHUNK_SIZE + 17] {
            let plaintext = make_data(size);
            let mut cipher = test_cipher();

            let mut streamed = Vec::new();
            cipher
                .encrypt_stream(Cursor::new(&plaintext), &mut streamed)
                .unwrap();
            assert_eq!(streamed.len(), plaintext.len() + NONCE_SIZE + TAG_SIZE);
            assert_eq!(cipher.decrypt(&streamed).unwrap(), plaintext, "size {size}");

            let buffered = cipher.encrypt(&plaintext).unwrap();
            let mut out = Vec::new();
            cipher
                .decrypt_stream(Cursor::new(&buffered), &mut out)
                .unwrap();
            assert_eq!(out, plaintext, "size {size}");
        }
    }

    #[test]
    fn test_stream_roundtrip_multi_chunk() {
        let plaintext = make_data(200_000);
        let mut cipher = test_cipher();

        let mut sealed = Vec::new();
        let written = cipher
            .encrypt_stream(Cursor::new(&plaintext), &mut sealed)
            .unwrap();
        assert_eq!(written, sealed.len() as u64);

        let mut out = Vec::new();
        let read = cipher.decrypt_stream(Cursor::new(&sealed), &mut out).unwrap();
        assert_eq!(read, plaintext.len() as u64);
        assert_eq!(out, plaintext);
    }

    #[test]
    fn test_nonce_uniqueness() {
        let mut cipher = test_cipher();
        let plaintext = b"same plaintext";

        let blob1 = cipher.encrypt(plaintext).unwrap();
        let blob2 = cipher.encrypt(plaintext).unwrap();

        assert_ne!(&blob1[..NONCE_SIZE], &blob2[..NONCE_SIZE], "nonces must differ");
        assert_ne!(blob1, blob2, "ciphertexts must differ");
    }

    #[test]
    fn test_tampered_ciphertext_rejected() {
        let mut cipher = test_cipher();
        let blob = cipher.encrypt(b"secret data").unwrap();

        for idx in [NONCE_SIZE, blob.len() / 2, blob.len() - TAG_SIZE] {
            let mut tampered = blob.clone();
            tampered[idx] ^= 0x01;
            assert!(
                matches!(cipher.decrypt(&tampered), Err(CryptoError::Decryption)),
                "flip at byte {idx} must fail authentication"
            );
        }
    }

    #[test]
    fn test_tampered_tag_rejected() {
        let mut cipher = test_cipher();
        let mut blob = cipher.encrypt(b"secret data").unwrap();
        let last = blob.len() - 1;
        blob[last] ^= 0x80;

        assert!(matches!(cipher.decrypt(&blob), Err(CryptoError::Decryption)));
    }

    #[test]
    fn test_wrong_key_rejected() {
        let mut cipher1 = FileCipher::new(SymmetricKey::from_bytes([1u8; 32]));
        let cipher2 = FileCipher::new(SymmetricKey::from_bytes([2u8; 32]));

        let blob = cipher1.encrypt(b"secret data").unwrap();
        assert!(matches!(cipher2.decrypt(&blob), Err(CryptoError::Decryption)));
    }

    #[test]
    fn test_truncated_blob_rejected() {
        let cipher = test_cipher();
        assert!(matches!(
            cipher.decrypt(&[0u8; NONCE_SIZE + TAG_SIZE - 1]),
            Err(CryptoError::Decryption)
        ));
        assert!(matches!(cipher.decrypt(b""), Err(CryptoError::Decryption)));
    }

    #[test]
    fn test_truncated_stream_rejected() {
        let cipher = test_cipher();
        let mut out = Vec::new();
        let result = cipher.decrypt_stream(Cursor::new(vec![0u8; 10]), &mut out);
        assert!(matches!(result, Err(CryptoError::Decryption)));
    }

    #[test]
    fn test_from_key_bytes_validates_length() {
        assert!(FileCipher::from_key_bytes(&[0u8; 32]).is_ok());
        assert!(matches!(
            FileCipher::from_key_bytes(&[0u8; 31]),
            Err(CryptoError::InvalidKey { expected: 32, actual: 31 })
        ));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_stream_roundtrip(plaintext in proptest::collection::vec(any::<u8>(), 0..4096)) {
            let mut cipher = test_cipher();
            let mut sealed = Vec::new();
            cipher.encrypt_stream(Cursor::new(&plaintext), &mut sealed).unwrap();

            let mut out = Vec::new();
            cipher.decrypt_stream(Cursor::new(&sealed), &mut out).unwrap();
            prop_assert_eq!(out, plaintext);
        }
    }
}
