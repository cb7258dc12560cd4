use std::fmt;

use alloy_primitives::Address;
use chain_eth::address::{address_from_verifying_key, checksum};
use crypto_utils::random::try_random_bytes;
use k256::ecdsa::SigningKey;
use secrecy::{ExposeSecret, SecretBox};
use zeroize::Zeroizing;

use crate::error::WalletError;

/// A validated secp256k1 private key and the address it controls.
///
/// The scalar sits in a [`SecretBox`], so it is wiped when the key is
/// dropped, on every path including unwinding.
pub struct PrivateKey {
    secret: SecretBox<[u8; 32]>,
    address: Address,
}

impl PrivateKey {
    /// Accepts any scalar in `[1, n)`.
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self, WalletError> {
        let signing_key = SigningKey::from_bytes(bytes.into())
            .map_err(|_| WalletError::InvalidKeyFormat("not a valid secp256k1 scalar".into()))?;
        let address = address_from_verifying_key(signing_key.verifying_key());

        Ok(Self {
            secret: SecretBox::new(Box::new(*bytes)),
            address,
        })
    }

    /// Parses 64 hex characters, with or without a `0x` prefix.
    pub fn from_hex(input: &str) -> Result<Self, WalletError> {
        let trimmed = input.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);

        if digits.len() != 64 {
            return Err(WalletError::InvalidKeyFormat(format!(
                "expected 64 hex characters, got {}",
                digits.len()
            )));
        }

        let mut bytes = Zeroizing::new([0u8; 32]);
        hex::decode_to_slice(digits, bytes.as_mut_slice())
            .map_err(|_| WalletError::InvalidKeyFormat("key is not valid hex".into()))?;

        Self::from_bytes(&bytes)
    }

    /// Fresh key from OS randomness.
    pub fn generate() -> Result<Self, WalletError> {
        loop {
            let bytes = Zeroizing::new(try_random_bytes::<32>()?);
            // Out-of-range scalars occur with probability ~2^-128.
            if let Ok(key) = Self::from_bytes(&bytes) {
                return Ok(key);
            }
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub(crate) fn expose(&self) -> &[u8; 32] {
        self.secret.expose_secret()
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("address", &checksum(&self.address))
            .field("secret", &"[REDACTED]")
            .finish()
    }
}
