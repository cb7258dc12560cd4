use thiserror::Error;

/// Cryptographic operation errors.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("system randomness unavailable: {0}")]
    Entropy(String),

    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    /// AEAD tag mismatch. Carries no detail: the only cause a caller can act
    /// on is a wrong password or a tampered record.
    #[error("decryption failed")]
    DecryptionFailed,

    #[error("key derivation failed: {0}")]
    KdfFailed(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_entropy() {
        let err = CryptoError::Entropy("getrandom: ENOSYS".into());
        assert_eq!(err.to_string(), "system randomness unavailable: getrandom: ENOSYS");
    }

    #[test]
    fn display_decryption_failed_has_no_detail() {
        assert_eq!(CryptoError::DecryptionFailed.to_string(), "decryption failed");
    }

    #[test]
    fn display_kdf_failed() {
        let err = CryptoError::KdfFailed("log_n out of range".into());
        assert_eq!(err.to_string(), "key derivation failed: log_n out of range");
    }

    #[test]
    fn display_invalid_input() {
        let err = CryptoError::InvalidInput("empty salt".into());
        assert_eq!(err.to_string(), "invalid input: empty salt");
    }
}
