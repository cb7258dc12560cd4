//! Web3 Secret Storage (version 3) key files, the format geth and most other
//! Ethereum wallets export. Only decryption lives here: imported keys are
//! re-sealed as [`EncryptedKeyRecord`](crate::key_record::EncryptedKeyRecord)s.
//!
//! Supported: `aes-128-ctr` with an `scrypt` or `pbkdf2` (`hmac-sha256`) key,
//! MAC = `keccak256(derived[16..32] || ciphertext)`.

use chain_eth::address::lower_hex;
use ctr::cipher::{KeyIvInit, StreamCipher};
use crypto_utils::{kdf, KdfParams};
use hmac::Hmac;
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;
use sha3::{Digest, Keccak256};
use zeroize::Zeroizing;

use crate::error::WalletError;
use crate::keys::PrivateKey;

type Aes128Ctr = ctr::Ctr128BE<aes::Aes128>;

/// File name prefix geth and friends give v3 key files.
pub const FILE_PREFIX: &str = "UTC--";

/// Largest PBKDF2 iteration count accepted. geth writes 262,144.
pub const MAX_PBKDF2_ROUNDS: u32 = 5_000_000;

const VERSION: u32 = 3;
const CIPHER: &str = "aes-128-ctr";
const DKLEN: usize = 32;

#[derive(Deserialize)]
struct KeyFile {
    version: u32,
    #[serde(default)]
    address: Option<String>,
    #[serde(alias = "Crypto")]
    crypto: CryptoJson,
}

#[derive(Deserialize)]
struct CryptoJson {
    cipher: String,
    cipherparams: CipherParams,
    ciphertext: String,
    kdf: String,
    kdfparams: Value,
    mac: String,
}

#[derive(Deserialize)]
struct CipherParams {
    iv: String,
}

#[derive(Deserialize)]
struct ScryptJson {
    dklen: usize,
    n: u64,
    r: u32,
    p: u32,
    salt: String,
}

#[derive(Deserialize)]
struct Pbkdf2Json {
    c: u32,
    dklen: usize,
    prf: String,
    salt: String,
}

/// Decrypts a v3 key file with `password`.
///
/// A MAC mismatch (wrong password or an edited file) is
/// [`WalletError::Authentication`]; unreadable or unsupported files, and
/// files whose stated address does not match the decrypted key, are
/// [`WalletError::InvalidKeyFormat`].
pub fn decrypt_key_file(json: &str, password: &[u8]) -> Result<PrivateKey, WalletError> {
    let file: KeyFile =
        serde_json::from_str(json).map_err(|e| invalid(format!("not a v3 key file: {e}")))?;
    if file.version != VERSION {
        return Err(invalid(format!("unsupported key file version {}", file.version)));
    }

    let crypto = &file.crypto;
    if crypto.cipher != CIPHER {
        return Err(invalid(format!("unsupported cipher {}", crypto.cipher)));
    }
    let ciphertext = decode_hex("ciphertext", &crypto.ciphertext)?;
    let iv = decode_hex("iv", &crypto.cipherparams.iv)?;
    let mac = decode_hex("mac", &crypto.mac)?;

    let derived = derive(&crypto.kdf, &crypto.kdfparams, password)?;

    let expected_mac = Keccak256::new()
        .chain_update(&derived[16..32])
        .chain_update(&ciphertext)
        .finalize();
    if expected_mac.as_slice() != mac.as_slice() {
        return Err(WalletError::Authentication);
    }

    let mut plaintext = Zeroizing::new(ciphertext);
    Aes128Ctr::new_from_slices(&derived[..16], &iv)
        .map_err(|_| invalid("iv must be 16 bytes".into()))?
        .apply_keystream(plaintext.as_mut_slice());

    let bytes: Zeroizing<[u8; 32]> = Zeroizing::new(
        plaintext
            .as_slice()
            .try_into()
            .map_err(|_| invalid("key file holds a key of the wrong size".into()))?,
    );
    let key = PrivateKey::from_bytes(&bytes)?;

    if let Some(stated) = &file.address {
        let stated = stated.trim_start_matches("0x").to_ascii_lowercase();
        if stated != lower_hex(&key.address()) {
            return Err(invalid("key file address does not match its key".into()));
        }
    }
    Ok(key)
}

fn derive(
    kdf_name: &str,
    params: &Value,
    password: &[u8],
) -> Result<Zeroizing<[u8; DKLEN]>, WalletError> {
    match kdf_name {
        "scrypt" => {
            let params: ScryptJson = serde_json::from_value(params.clone())
                .map_err(|e| invalid(format!("scrypt params: {e}")))?;
            check_dklen(params.dklen)?;
            if params.n < 2 || !params.n.is_power_of_two() {
                return Err(invalid(format!("scrypt n {} is not a power of two", params.n)));
            }

            let cost = KdfParams {
                log_n: params.n.trailing_zeros() as u8,
                r: params.r,
                p: params.p,
            };
            cost.check_cost()
                .map_err(|e| invalid(format!("key file kdf params rejected: {e}")))?;
            let salt = decode_hex("salt", &params.salt)?;
            Ok(kdf::derive_key(password, &salt, &cost)?)
        }
        "pbkdf2" => {
            let params: Pbkdf2Json = serde_json::from_value(params.clone())
                .map_err(|e| invalid(format!("pbkdf2 params: {e}")))?;
            check_dklen(params.dklen)?;
            if params.prf != "hmac-sha256" {
                return Err(invalid(format!("unsupported pbkdf2 prf {}", params.prf)));
            }
            if params.c == 0 || params.c > MAX_PBKDF2_ROUNDS {
                return Err(invalid(format!(
                    "pbkdf2 rounds {} outside 1..={MAX_PBKDF2_ROUNDS}",
                    params.c
                )));
            }

            let salt = decode_hex("salt", &params.salt)?;
            let mut derived = Zeroizing::new([0u8; DKLEN]);
            pbkdf2::pbkdf2::<Hmac<Sha256>>(password, &salt, params.c, derived.as_mut_slice())
                .map_err(|e| WalletError::Crypto(format!("pbkdf2 failed: {e}")))?;
            Ok(derived)
        }
        other => Err(invalid(format!("unsupported kdf {other}"))),
    }
}

fn check_dklen(dklen: usize) -> Result<(), WalletError> {
    if dklen == DKLEN {
        Ok(())
    } else {
        Err(invalid(format!("unsupported derived key length {dklen}")))
    }
}

fn decode_hex(field: &str, value: &str) -> Result<Vec<u8>, WalletError> {
    hex::decode(value.trim_start_matches("0x")).map_err(|_| invalid(format!("{field} is not hex")))
}

fn invalid(reason: String) -> WalletError {
    WalletError::InvalidKeyFormat(reason)
}
