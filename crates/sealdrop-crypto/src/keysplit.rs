//! XOR secret splitting for key shares
//!
//! A key k is split into shares `k ^ x0, x0 ^ x1, ..., x_{n-1}` for
//! independent random `x_i`; XOR-ing all shares back together recovers k.
//! With two shares this is a one-time pad: either share alone is
//! indistinguishable from random and leaks nothing about the key.
//!
//! All n shares are required to rebuild. This is NOT a k-of-n threshold
//! scheme (no subset smaller than n suffices, and the n > 2 chaining has not
//! been analysed as one); two shares is the verified baseline.

use rand::{rngs::OsRng, RngCore};
use zeroize::Zeroizing;

use crate::error::{CryptoError, CryptoResult};

/// Split a key into exactly two shares such that
/// `share0 ^ share1 == key` byte-wise.
///
/// Shares are key material; they come back in [`Zeroizing`] buffers and are
/// wiped on drop. Encoding them for delivery is the caller's concern.
pub fn split_key(key: &[u8]) -> [Zeroizing<Vec<u8>>; 2] {
    let mut share1 = Zeroizing::new(vec![0u8; key.len()]);
    OsRng.fill_bytes(&mut share1);

    let share0 = Zeroizing::new(xor(key, &share1));
    [share0, share1]
}

/// Split a key into `n >= 2` shares by chained pairwise XOR.
///
/// Every share must be presented to [`rebuild_key`]; missing any one of them
/// makes the key unrecoverable.
pub fn split_key_n(key: &[u8], n: usize) -> CryptoResult<Vec<Zeroizing<Vec<u8>>>> {
    if n < 2 {
        return Err(CryptoError::InvalidParameter(format!(
            "share count must be at least 2, got {n}"
        )));
    }

    let mut shares = Vec::with_capacity(n);
    let mut carry = Zeroizing::new(key.to_vec());
    for _ in 1..n {
        let mut rand_bytes = Zeroizing::new(vec![0u8; key.len()]);
        OsRng.fill_bytes(&mut rand_bytes);
        shares.push(Zeroizing::new(xor(&carry, &rand_bytes)));
        carry = rand_bytes;
    }
    shares.push(carry);
    Ok(shares)
}

/// Rebuild a key by XOR-ing all shares together.
///
/// Order-independent (XOR is associative and commutative). Requires at least
/// two shares and identical share lengths.
pub fn rebuild_key(shares: &[impl AsRef<[u8]>]) -> CryptoResult<Zeroizing<Vec<u8>>> {
    if shares.len() < 2 {
        return Err(CryptoError::InsufficientShares { got: shares.len() });
    }

    let len = shares[0].as_ref().len();
    let mut key = Zeroizing::new(shares[0].as_ref().to_vec());
    for share in &shares[1..] {
        let share = share.as_ref();
        if share.len() != len {
            return Err(CryptoError::InvalidParameter(format!(
                "share length mismatch: expected {len} bytes, got {}",
                share.len()
            )));
        }
        for (k, s) in key.iter_mut().zip(share) {
            *k ^= s;
        }
    }
    Ok(key)
}

fn xor(a: &[u8], b: &[u8]) -> Vec<u8> {
    a.iter().zip(b).map(|(x, y)| x ^ y).collect()
}
