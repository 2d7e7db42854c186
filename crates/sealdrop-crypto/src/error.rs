use thiserror::Error;

pub type CryptoResult<T> = Result<T, CryptoError>;

/// Error taxonomy for the crypto core.
///
/// The core performs no recovery itself: there is no fallback to a weaker
/// scheme and no partial-result return on authentication failure. Callers
/// decide what is user-facing; they must never log key material or passwords
/// under any error path.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Precondition violation (bad key length request, share count < 2, malformed
    /// base64 input). A caller programming error, not retriable.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Supplied key does not match the AEAD scheme's required length.
    #[error("invalid key: expected {expected} bytes, got {actual}")]
    InvalidKey { expected: usize, actual: usize },

    /// AEAD tag verification failed: wrong key or password, corrupted
    /// ciphertext, or tampering. Never retried automatically.
    #[error("file could not be decrypted: authentication failed")]
    Decryption,

    /// Fewer than two key shares supplied for key reconstruction.
    #[error("not enough key shares: need at least 2, got {got}")]
    InsufficientShares { got: usize },

    /// I/O failure on the streaming paths.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
