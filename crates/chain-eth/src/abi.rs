//! Fixed-width ABI words for the two ERC-20 calls the wallet makes.
//!
//! Only static 32-byte parameters are supported; there is no dynamic-type
//! encoding and no ABI parser.

use alloy_primitives::{Address, U256};

use crate::error::EthError;

/// A single static ABI parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbiParam {
    /// Left-padded to 32 bytes.
    Address(Address),
    /// Big-endian, 32 bytes.
    Uint256(U256),
}

/// `selector || word(params[0]) || word(params[1]) || ...`
pub fn encode_function_call(selector: [u8; 4], params: &[AbiParam]) -> Vec<u8> {
    let mut data = Vec::with_capacity(4 + params.len() * 32);
    data.extend_from_slice(&selector);

    for param in params {
        data.extend_from_slice(&encode_param(param));
    }

    data
}

fn encode_param(param: &AbiParam) -> [u8; 32] {
    match param {
        AbiParam::Address(addr) => {
            let mut word = [0u8; 32];
            word[12..].copy_from_slice(addr.as_slice());
            word
        }
        AbiParam::Uint256(value) => value.to_be_bytes::<32>(),
    }
}

/// Decodes the first 32-byte word of a return payload as a uint256.
pub fn decode_uint256(data: &[u8]) -> Result<U256, EthError> {
    if data.len() < 32 {
        return Err(EthError::EncodingError(format!(
            "expected at least 32 bytes for uint256, got {}",
            data.len()
        )));
    }

    Ok(U256::from_be_slice(&data[..32]))
}
