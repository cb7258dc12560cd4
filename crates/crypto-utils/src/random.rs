use rand_core::{OsRng, RngCore};

use crate::error::CryptoError;

/// Fills a fixed-size array from the operating system's CSPRNG.
///
/// Unlike `fill_bytes`, a failing randomness source is reported instead of
/// panicking, so key generation can surface it as an error.
pub fn try_random_bytes<const N: usize>() -> Result<[u8; N], CryptoError> {
    let mut buf = [0u8; N];
    OsRng
        .try_fill_bytes(&mut buf)
        .map_err(|e| CryptoError::Entropy(e.to_string()))?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_bytes_correct_size() {
        let buf: [u8; 16] = try_random_bytes().unwrap();
        assert_eq!(buf.len(), 16);

        let buf: [u8; 32] = try_random_bytes().unwrap();
        assert_eq!(buf.len(), 32);
    }

    #[test]
    fn random_bytes_not_all_zero() {
        // 2^-256 chance of a false failure.
        let buf: [u8; 32] = try_random_bytes().unwrap();
        assert!(buf.iter().any(|&b| b != 0));
    }

    #[test]
    fn random_bytes_differ_between_calls() {
        let a: [u8; 32] = try_random_bytes().unwrap();
        let b: [u8; 32] = try_random_bytes().unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn zero_length_is_fine() {
        let buf: [u8; 0] = try_random_bytes().unwrap();
        assert!(buf.is_empty());
    }
}
