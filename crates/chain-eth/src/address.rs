use alloy_primitives::Address;
use k256::ecdsa::VerifyingKey;
use sha3::{Digest, Keccak256};

use crate::error::EthError;

/// Derives the account address from an uncompressed secp256k1 public key
/// (65 bytes, starting with 0x04): the last 20 bytes of keccak256 over the
/// 64-byte point without its prefix.
pub fn pubkey_to_address(uncompressed_pubkey: &[u8; 65]) -> Result<Address, EthError> {
    if uncompressed_pubkey[0] != 0x04 {
        return Err(EthError::InvalidPublicKey(
            "uncompressed key must start with 0x04".into(),
        ));
    }

    let hash = Keccak256::digest(&uncompressed_pubkey[1..]);
    Ok(Address::from_slice(&hash[12..]))
}

/// Derives the account address for a verifying key.
pub fn address_from_verifying_key(key: &VerifyingKey) -> Address {
    let point = key.to_encoded_point(false);
    let hash = Keccak256::digest(&point.as_bytes()[1..]);
    Address::from_slice(&hash[12..])
}

/// Parses a user-supplied address.
///
/// The input must be `0x` followed by exactly 40 hex characters. All-lower
/// and all-upper inputs are accepted as-is; mixed case must carry a valid
/// EIP-55 checksum.
pub fn parse_address(address: &str) -> Result<Address, EthError> {
    let hex_part = address
        .strip_prefix("0x")
        .or_else(|| address.strip_prefix("0X"))
        .ok_or_else(|| EthError::InvalidAddress("address must start with 0x".into()))?;

    if hex_part.len() != 40 {
        return Err(EthError::InvalidAddress(format!(
            "expected 40 hex characters, got {}",
            hex_part.len()
        )));
    }

    if !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(EthError::InvalidAddress(
            "address contains non-hex characters".into(),
        ));
    }

    let bytes = hex::decode(hex_part)
        .map_err(|e| EthError::InvalidAddress(format!("invalid hex: {e}")))?;
    let parsed = Address::from_slice(&bytes);

    let is_all_lower = hex_part.chars().all(|c| !c.is_ascii_uppercase());
    let is_all_upper = hex_part.chars().all(|c| !c.is_ascii_lowercase());
    if is_all_lower || is_all_upper {
        return Ok(parsed);
    }

    if checksum(&parsed)[2..] != *hex_part {
        return Err(EthError::InvalidAddress("EIP-55 checksum mismatch".into()));
    }
    Ok(parsed)
}

/// EIP-55 mixed-case rendering of `address`, `0x`-prefixed.
pub fn checksum(address: &Address) -> String {
    address.to_checksum(None)
}

/// Lowercase hex without the `0x` prefix. Used as the keystore file stem.
pub fn lower_hex(address: &Address) -> String {
    hex::encode(address.as_slice())
}

#[cfg(test)]
mod tests {
    use super::*;
    use k256::ecdsa::SigningKey;

    const KEY_ONE_ADDRESS: &str = "0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf";

    fn key_one() -> SigningKey {
        let mut privkey = [0u8; 32];
        privkey[31] = 1;
        SigningKey::from_bytes((&privkey).into()).unwrap()
    }

    #[test]
    fn eip55_checksum_known_addresses() {
        let cases = [
            "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed",
            "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359",
            "0xdbF03B407c01E7cD3CBea99509d93f8DDDC8C6FB",
            "0xD1220A0cf47c7B9Be7A2E6BA89F429762e7b9aDb",
        ];

        for expected in &cases {
            let lower = format!("0x{}", expected[2..].to_lowercase());
            let parsed = parse_address(&lower).unwrap();
            assert_eq!(&checksum(&parsed), expected, "checksum mismatch for {expected}");
        }
    }

    #[test]
    fn accepts_checksummed_lower_and_upper() {
        let a = parse_address("0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed").unwrap();
        let b = parse_address("0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed").unwrap();
        let c = parse_address("0x5AAEB6053F3E94C9B9A09F33669435E7EF1BEAED").unwrap();
        assert_eq!(a, b);
        assert_eq!(b, c);
    }

    #[test]
    fn rejects_bad_checksum() {
        let result = parse_address("0x5AAEB6053F3E94C9b9A09f33669435E7Ef1BeAed");
        assert!(matches!(result, Err(EthError::InvalidAddress(msg)) if msg.contains("checksum")));
    }

    #[test]
    fn rejects_short_address() {
        assert!(parse_address("0x5aAeb6053F").is_err());
    }

    #[test]
    fn rejects_missing_prefix() {
        assert!(parse_address("5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed").is_err());
    }

    #[test]
    fn rejects_non_hex() {
        assert!(parse_address("0xGGGGb6053F3E94C9b9A09f33669435E7Ef1BeAed").is_err());
    }

    #[test]
    fn pubkey_to_address_known_vector() {
        let uncompressed = key_one().verifying_key().to_encoded_point(false);
        let mut key_65 = [0u8; 65];
        key_65.copy_from_slice(uncompressed.as_bytes());

        let address = pubkey_to_address(&key_65).unwrap();
        assert_eq!(checksum(&address), KEY_ONE_ADDRESS);
    }

    #[test]
    fn verifying_key_to_address_known_vector() {
        let address = address_from_verifying_key(key_one().verifying_key());
        assert_eq!(checksum(&address), KEY_ONE_ADDRESS);
    }

    #[test]
    fn invalid_uncompressed_prefix_errors() {
        let mut key = [0u8; 65];
        key[0] = 0x03;
        assert!(pubkey_to_address(&key).is_err());
    }

    #[test]
    fn lower_hex_has_no_prefix() {
        let address = parse_address(KEY_ONE_ADDRESS).unwrap();
        assert_eq!(lower_hex(&address), "7e5f4552091a69125d5dfcb7b8c2659029395bdf");
    }
}
