use alloy_primitives::Address;
use chain_eth::address::{checksum, lower_hex, parse_address};
use crypto_utils::{encryption, kdf, KdfParams};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::error::WalletError;
use crate::keys::PrivateKey;

/// Format version written into every record.
pub const RECORD_VERSION: u32 = 1;

const CIPHER: &str = "aes-256-gcm";
const KDF: &str = "scrypt";

/// A private key wrapped under a password, as stored on disk.
///
/// Key: scrypt(password, salt). Cipher: AES-256-GCM with the lowercase
/// address as associated data, so a record cannot be relabelled to another
/// address without failing authentication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptedKeyRecord {
    pub version: u32,
    /// Checksummed address. Public.
    pub address: String,
    pub crypto: CryptoSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CryptoSection {
    pub cipher: String,
    /// Hex of `nonce || ciphertext || tag`.
    pub ciphertext: String,
    pub kdf: String,
    pub kdfparams: ScryptParams,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScryptParams {
    pub log_n: u8,
    pub r: u32,
    pub p: u32,
    pub dklen: usize,
    /// Hex.
    pub salt: String,
}

impl EncryptedKeyRecord {
    /// Encrypts `key` under `password`.
    pub fn seal(key: &PrivateKey, password: &[u8], params: KdfParams) -> Result<Self, WalletError> {
        let salt = kdf::generate_salt()?;
        let derived = kdf::derive_key(password, &salt, &params)?;
        let address = key.address();

        let ciphertext = encryption::encrypt(key.expose(), &derived, aad(&address).as_bytes())?;

        Ok(Self {
            version: RECORD_VERSION,
            address: checksum(&address),
            crypto: CryptoSection {
                cipher: CIPHER.into(),
                ciphertext: hex::encode(ciphertext),
                kdf: KDF.into(),
                kdfparams: ScryptParams {
                    log_n: params.log_n,
                    r: params.r,
                    p: params.p,
                    dklen: kdf::KEY_LEN,
                    salt: hex::encode(salt),
                },
            },
        })
    }

    /// Decrypts the key. A wrong password and a tampered record both give
    /// [`WalletError::Authentication`].
    pub fn open(&self, password: &[u8]) -> Result<PrivateKey, WalletError> {
        self.check_format()?;
        let address = self.address()?;

        let params = &self.crypto.kdfparams;
        let salt = hex::decode(&params.salt)
            .map_err(|_| WalletError::Storage("record salt is not hex".into()))?;
        let ciphertext = hex::decode(&self.crypto.ciphertext)
            .map_err(|_| WalletError::Storage("record ciphertext is not hex".into()))?;

        let derived = kdf::derive_key(password, &salt, &self.kdf_params())?;

        let plaintext = encryption::decrypt(&ciphertext, &derived, aad(&address).as_bytes())
            .map_err(|_| WalletError::Authentication)?;

        let bytes: Zeroizing<[u8; 32]> = Zeroizing::new(
            plaintext
                .as_slice()
                .try_into()
                .map_err(|_| WalletError::Storage("record holds a key of the wrong size".into()))?,
        );
        let key = PrivateKey::from_bytes(&bytes)?;

        if key.address() != address {
            return Err(WalletError::Storage(
                "record key does not match its address".into(),
            ));
        }
        Ok(key)
    }

    /// The public address, parsed.
    pub fn address(&self) -> Result<Address, WalletError> {
        parse_address(&self.address)
            .map_err(|e| WalletError::Storage(format!("record address: {e}")))
    }

    pub fn to_json(&self) -> Result<String, WalletError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| WalletError::Storage(format!("serialization failed: {e}")))
    }

    pub fn from_json(json: &str) -> Result<Self, WalletError> {
        serde_json::from_str(json)
            .map_err(|e| WalletError::Storage(format!("deserialization failed: {e}")))
    }

    fn check_format(&self) -> Result<(), WalletError> {
        if self.version != RECORD_VERSION {
            return Err(WalletError::Storage(format!(
                "unsupported record version {}",
                self.version
            )));
        }
        if self.crypto.cipher != CIPHER || self.crypto.kdf != KDF {
            return Err(WalletError::Storage(format!(
                "unsupported record scheme {}/{}",
                self.crypto.kdf, self.crypto.cipher
            )));
        }
        if self.crypto.kdfparams.dklen != kdf::KEY_LEN {
            return Err(WalletError::Storage(format!(
                "unsupported derived key length {}",
                self.crypto.kdfparams.dklen
            )));
        }
        self.kdf_params()
            .check_cost()
            .map_err(|e| WalletError::Storage(format!("record kdf params rejected: {e}")))
    }

    fn kdf_params(&self) -> KdfParams {
        let params = &self.crypto.kdfparams;
        KdfParams {
            log_n: params.log_n,
            r: params.r,
            p: params.p,
        }
    }
}

fn aad(address: &Address) -> String {
    lower_hex(address)
}
