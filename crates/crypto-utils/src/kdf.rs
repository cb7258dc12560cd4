use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::error::CryptoError;
use crate::random::try_random_bytes;

/// Derived key length in bytes (AES-256).
pub const KEY_LEN: usize = 32;

/// Salt length in bytes.
pub const SALT_LEN: usize = 32;

/// Largest accepted `log_n`.
pub const MAX_LOG_N: u8 = 20;

/// Bound on `128 * r * N`, the memory one derivation allocates.
pub const MAX_MEMORY_BYTES: u64 = 1 << 30;

/// Bound on `r * p * N`, which derivation time is proportional to.
/// [`KdfParams::STANDARD`] costs `2^21`.
pub const MAX_WORK: u64 = 1 << 24;

/// scrypt work-factor parameters, stored alongside every encrypted record so
/// a record can always be reopened with the parameters it was sealed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// log2 of the CPU/memory cost `N`.
    pub log_n: u8,
    /// Block size.
    pub r: u32,
    /// Parallelisation.
    pub p: u32,
}

impl KdfParams {
    /// `N = 2^18, r = 8, p = 1`: ~256 MiB and on the order of a second per
    /// derivation. This is what new records are sealed with.
    pub const STANDARD: KdfParams = KdfParams { log_n: 18, r: 8, p: 1 };

    /// `N = 2^12, r = 8, p = 6`: ~4 MiB. For tests and memory-constrained
    /// hosts only.
    pub const LIGHT: KdfParams = KdfParams { log_n: 12, r: 8, p: 6 };

    pub fn standard() -> Self {
        Self::STANDARD
    }

    pub fn light() -> Self {
        Self::LIGHT
    }

    /// Fails when deriving with these parameters would cost more memory or
    /// time than the bounds above. Parameters read back from disk are
    /// untrusted and must pass this before [`derive_key`] sees them.
    pub fn check_cost(&self) -> Result<(), CryptoError> {
        if self.log_n == 0 || self.log_n > MAX_LOG_N {
            return Err(CryptoError::InvalidInput(format!(
                "scrypt log_n {} outside 1..={MAX_LOG_N}",
                self.log_n
            )));
        }
        if self.r == 0 || self.p == 0 {
            return Err(CryptoError::InvalidInput("scrypt r and p must be non-zero".into()));
        }

        let n = 1u64 << self.log_n;
        let memory = 128u64.saturating_mul(u64::from(self.r)).saturating_mul(n);
        if memory > MAX_MEMORY_BYTES {
            return Err(CryptoError::InvalidInput(format!(
                "scrypt params need {memory} bytes, limit is {MAX_MEMORY_BYTES}"
            )));
        }
        let work = u64::from(self.r)
            .saturating_mul(u64::from(self.p))
            .saturating_mul(n);
        if work > MAX_WORK {
            return Err(CryptoError::InvalidInput(format!(
                "scrypt work factor r*p*N = {work} exceeds {MAX_WORK}"
            )));
        }
        Ok(())
    }

    fn to_scrypt(self) -> Result<scrypt::Params, CryptoError> {
        scrypt::Params::new(self.log_n, self.r, self.p, KEY_LEN)
            .map_err(|e| CryptoError::KdfFailed(format!("invalid scrypt params: {e}")))
    }
}

impl Default for KdfParams {
    fn default() -> Self {
        Self::STANDARD
    }
}

/// Derives a 32-byte key from `password` and `salt` with scrypt.
///
/// The returned key is wiped when dropped.
pub fn derive_key(
    password: &[u8],
    salt: &[u8],
    params: &KdfParams,
) -> Result<Zeroizing<[u8; KEY_LEN]>, CryptoError> {
    if salt.is_empty() {
        return Err(CryptoError::InvalidInput("empty salt".into()));
    }

    let scrypt_params = params.to_scrypt()?;
    let mut output = Zeroizing::new([0u8; KEY_LEN]);
    scrypt::scrypt(password, salt, &scrypt_params, output.as_mut_slice())
        .map_err(|e| CryptoError::KdfFailed(format!("scrypt failed: {e}")))?;

    Ok(output)
}

/// Generates a random salt.
pub fn generate_salt() -> Result<[u8; SALT_LEN], CryptoError> {
    try_random_bytes::<SALT_LEN>()
}
