use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_rlp::{Encodable, RlpEncodable};
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use sha3::{Digest, Keccak256};

use crate::address::address_from_verifying_key;
use crate::erc20;
use crate::error::EthError;

/// EIP-2718 type byte for EIP-1559 transactions.
pub const EIP1559_TX_TYPE: u8 = 0x02;

/// Fee and gas fields shared by every intent on a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasSettings {
    pub max_priority_fee_per_gas: u128,
    pub max_fee_per_gas: u128,
    pub gas_limit: u64,
}

/// An unsigned EIP-1559 (type 2) transaction.
///
/// Intentionally not `Clone`: signing takes it by value so one intent (and
/// therefore one nonce) produces at most one signed transaction.
#[derive(Debug, PartialEq, Eq)]
pub struct EthTransaction {
    pub chain_id: u64,
    pub nonce: u64,
    pub max_priority_fee_per_gas: u128,
    pub max_fee_per_gas: u128,
    pub gas_limit: u64,
    pub to: Address,
    /// Value in wei.
    pub value: U256,
    /// Calldata, empty for native transfers.
    pub data: Bytes,
}

/// A signed EIP-1559 transaction ready for broadcast.
#[derive(Debug)]
pub struct SignedEthTransaction {
    tx: EthTransaction,
    y_parity: bool,
    r: U256,
    s: U256,
    raw_tx: Vec<u8>,
    tx_hash: B256,
}

impl SignedEthTransaction {
    /// The intent that was signed.
    pub fn tx(&self) -> &EthTransaction {
        &self.tx
    }

    /// `0x02 || rlp(fields ++ [y_parity, r, s])`.
    pub fn raw_tx(&self) -> &[u8] {
        &self.raw_tx
    }

    /// `0x`-prefixed hex of [`Self::raw_tx`], as `eth_sendRawTransaction` expects.
    pub fn raw_tx_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.raw_tx))
    }

    /// keccak256 of the raw bytes.
    pub fn tx_hash(&self) -> B256 {
        self.tx_hash
    }

    pub fn signature(&self) -> (bool, U256, U256) {
        (self.y_parity, self.r, self.s)
    }

    /// Recovers the sender address from the signature and the signing hash.
    pub fn recover_signer(&self) -> Result<Address, EthError> {
        let prehash = signing_hash(&self.tx);

        let mut rs = [0u8; 64];
        rs[..32].copy_from_slice(&self.r.to_be_bytes::<32>());
        rs[32..].copy_from_slice(&self.s.to_be_bytes::<32>());
        let signature = Signature::from_slice(&rs)
            .map_err(|e| EthError::SigningError(format!("malformed signature: {e}")))?;
        let recovery_id = RecoveryId::new(self.y_parity, false);

        let key = VerifyingKey::recover_from_prehash(prehash.as_slice(), &signature, recovery_id)
            .map_err(|e| EthError::SigningError(format!("signer recovery failed: {e}")))?;
        Ok(address_from_verifying_key(&key))
    }
}

/// Builds an unsigned native-currency transfer.
pub fn build_transfer(
    chain_id: u64,
    nonce: u64,
    to: Address,
    value_wei: U256,
    gas: GasSettings,
) -> EthTransaction {
    EthTransaction {
        chain_id,
        nonce,
        max_priority_fee_per_gas: gas.max_priority_fee_per_gas,
        max_fee_per_gas: gas.max_fee_per_gas,
        gas_limit: gas.gas_limit,
        to,
        value: value_wei,
        data: Bytes::new(),
    }
}

/// Builds an unsigned ERC-20 `transfer(to, amount)` call against `token`.
pub fn build_erc20_transfer(
    chain_id: u64,
    nonce: u64,
    token: Address,
    to: Address,
    amount: U256,
    gas: GasSettings,
) -> EthTransaction {
    EthTransaction {
        chain_id,
        nonce,
        max_priority_fee_per_gas: gas.max_priority_fee_per_gas,
        max_fee_per_gas: gas.max_fee_per_gas,
        gas_limit: gas.gas_limit,
        to: token,
        value: U256::ZERO,
        data: erc20::encode_transfer(to, amount).into(),
    }
}

/// Signs an EIP-1559 transaction with a secp256k1 private key.
///
/// 1. `payload = 0x02 || rlp(unsigned fields)`
/// 2. `hash = keccak256(payload)`
/// 3. recoverable low-s ECDSA over `hash`
/// 4. `raw = 0x02 || rlp(unsigned fields ++ [y_parity, r, s])`
///
/// The chain id is part of the signed payload, so the result is only valid
/// on `tx.chain_id`.
pub fn sign_transaction(
    tx: EthTransaction,
    private_key: &[u8; 32],
) -> Result<SignedEthTransaction, EthError> {
    let prehash = signing_hash(&tx);

    // SigningKey zeroizes its scalar on drop.
    let signing_key = SigningKey::from_bytes(private_key.into())
        .map_err(|e| EthError::InvalidPrivateKey(e.to_string()))?;

    let (signature, recovery_id) = signing_key
        .sign_prehash_recoverable(prehash.as_slice())
        .map_err(|e| EthError::SigningError(e.to_string()))?;

    let y_parity = recovery_id.is_y_odd();
    let r = U256::from_be_slice(&signature.r().to_bytes());
    let s = U256::from_be_slice(&signature.s().to_bytes());

    let signed_fields = SignedTxFields {
        chain_id: tx.chain_id,
        nonce: tx.nonce,
        max_priority_fee_per_gas: tx.max_priority_fee_per_gas,
        max_fee_per_gas: tx.max_fee_per_gas,
        gas_limit: tx.gas_limit,
        to: tx.to,
        value: tx.value,
        data: tx.data.clone(),
        access_list: Vec::new(),
        signature_y_parity: y_parity,
        signature_r: r,
        signature_s: s,
    };

    let raw_tx = typed_envelope(&signed_fields);
    let tx_hash = B256::from_slice(&Keccak256::digest(&raw_tx));

    Ok(SignedEthTransaction {
        tx,
        y_parity,
        r,
        s,
        raw_tx,
        tx_hash,
    })
}

/// Encodes the unsigned transaction as `0x02 || rlp(fields)`.
///
/// Fields: `[chain_id, nonce, max_priority_fee_per_gas, max_fee_per_gas,
/// gas_limit, to, value, data, access_list]`.
pub fn encode_unsigned_tx(tx: &EthTransaction) -> Vec<u8> {
    let unsigned_fields = UnsignedTxFields {
        chain_id: tx.chain_id,
        nonce: tx.nonce,
        max_priority_fee_per_gas: tx.max_priority_fee_per_gas,
        max_fee_per_gas: tx.max_fee_per_gas,
        gas_limit: tx.gas_limit,
        to: tx.to,
        value: tx.value,
        data: tx.data.clone(),
        access_list: Vec::new(),
    };

    typed_envelope(&unsigned_fields)
}

/// keccak256 of [`encode_unsigned_tx`]; the digest that gets signed.
pub fn signing_hash(tx: &EthTransaction) -> B256 {
    B256::from_slice(&Keccak256::digest(encode_unsigned_tx(tx)))
}

fn typed_envelope<T: Encodable>(fields: &T) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + fields.length());
    out.push(EIP1559_TX_TYPE);
    fields.encode(&mut out);
    out
}

// ---------------------------------------------------------------------------
// RLP-encodable structures
// ---------------------------------------------------------------------------

#[derive(RlpEncodable)]
struct UnsignedTxFields {
    chain_id: u64,
    nonce: u64,
    max_priority_fee_per_gas: u128,
    max_fee_per_gas: u128,
    gas_limit: u64,
    to: Address,
    value: U256,
    data: Bytes,
    access_list: Vec<AccessListItem>,
}

#[derive(RlpEncodable)]
struct SignedTxFields {
    chain_id: u64,
    nonce: u64,
    max_priority_fee_per_gas: u128,
    max_fee_per_gas: u128,
    gas_limit: u64,
    to: Address,
    value: U256,
    data: Bytes,
    access_list: Vec<AccessListItem>,
    signature_y_parity: bool,
    signature_r: U256,
    signature_s: U256,
}

/// EIP-2930 access list entry. Always empty here.
#[derive(Debug, Clone, RlpEncodable)]
struct AccessListItem {
    address: Address,
    storage_keys: Vec<B256>,
}
