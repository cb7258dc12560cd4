use alloy_primitives::{Address, U256};

use crate::abi::{encode_function_call, AbiParam};

/// Function selector for `transfer(address,uint256)`: `0xa9059cbb`.
pub const TRANSFER_SELECTOR: [u8; 4] = [0xa9, 0x05, 0x9c, 0xbb];

/// Function selector for `balanceOf(address)`: `0x70a08231`.
pub const BALANCE_OF_SELECTOR: [u8; 4] = [0x70, 0xa0, 0x82, 0x31];

/// Calldata for `transfer(to, amount)`: 4-byte selector plus two words.
pub fn encode_transfer(to: Address, amount: U256) -> Vec<u8> {
    encode_function_call(
        TRANSFER_SELECTOR,
        &[AbiParam::Address(to), AbiParam::Uint256(amount)],
    )
}

/// Calldata for `balanceOf(owner)`: 4-byte selector plus one word.
pub fn encode_balance_of(owner: Address) -> Vec<u8> {
    encode_function_call(BALANCE_OF_SELECTOR, &[AbiParam::Address(owner)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    const DEAD: Address = address!("000000000000000000000000000000000000dEaD");

    #[test]
    fn encode_transfer_layout() {
        let data = encode_transfer(DEAD, U256::from(1_000_000u64));

        assert_eq!(data.len(), 68);
        assert_eq!(&data[..4], &TRANSFER_SELECTOR);
        assert_eq!(&data[4..16], &[0u8; 12]);
        assert_eq!(&data[16..36], DEAD.as_slice());

        let amount = U256::from_be_slice(&data[36..68]);
        assert_eq!(amount, U256::from(1_000_000u64));
    }

    #[test]
    fn encode_transfer_hex_matches_known_calldata() {
        let data = encode_transfer(DEAD, U256::from(1u8));
        assert_eq!(
            hex::encode(&data),
            concat!(
                "a9059cbb",
                "000000000000000000000000000000000000000000000000000000000000dead",
                "0000000000000000000000000000000000000000000000000000000000000001",
            )
        );
    }

    #[test]
    fn encode_balance_of_layout() {
        let data = encode_balance_of(DEAD);

        assert_eq!(data.len(), 36);
        assert_eq!(&data[..4], &BALANCE_OF_SELECTOR);
        assert_eq!(&data[16..36], DEAD.as_slice());
    }

    #[test]
    fn selectors_match_keccak_of_signature() {
        use sha3::{Digest, Keccak256};

        let transfer = Keccak256::digest(b"transfer(address,uint256)");
        let balance_of = Keccak256::digest(b"balanceOf(address)");
        assert_eq!(&transfer[..4], &TRANSFER_SELECTOR);
        assert_eq!(&balance_of[..4], &BALANCE_OF_SELECTOR);
    }

    #[test]
    fn max_amount_fills_word() {
        let data = encode_transfer(DEAD, U256::MAX);
        assert_eq!(&data[36..68], &[0xff; 32]);
    }
}
