use chain_eth::error::EthError;
use crypto_utils::error::CryptoError;
use thiserror::Error;

use crate::types::TransferStage;

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("system randomness unavailable: {0}")]
    Entropy(String),

    #[error("invalid mnemonic: {0}")]
    InvalidMnemonic(String),

    #[error("key derivation failed: {0}")]
    Derivation(String),

    #[error("invalid private key: {0}")]
    InvalidKeyFormat(String),

    /// Wrong password or tampered record. Deliberately carries nothing that
    /// would distinguish the two.
    #[error("authentication failed")]
    Authentication,

    #[error("no account for address {0}")]
    AccountNotFound(String),

    #[error("account {0} already exists")]
    DuplicateAccount(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("unknown network: {0}")]
    UnknownNetwork(String),

    #[error("unsupported chain: {0}")]
    UnsupportedChain(String),

    #[error("chain id mismatch on {network}: configured {expected}, remote reports {actual}")]
    ChainMismatch {
        network: String,
        expected: u64,
        actual: u64,
    },

    #[error("connection error on {chain}: {reason}")]
    Connection { chain: String, reason: String },

    #[error("contract call failed on {chain}: {reason}")]
    ContractCall { chain: String, reason: String },

    #[error("nonce fetch failed on {chain}: {reason}")]
    NonceFetch { chain: String, reason: String },

    #[error("fee estimation failed on {chain}: {reason}")]
    FeeEstimation { chain: String, reason: String },

    #[error("gas estimation failed on {chain}: {reason}")]
    GasEstimation { chain: String, reason: String },

    #[error("signing failed: {0}")]
    Signing(String),

    #[error("broadcast rejected on {chain}: {reason}")]
    Broadcast { chain: String, reason: String },

    #[error("{method} timed out on {chain}")]
    Timeout { chain: String, method: String },

    #[error("key store error: {0}")]
    Storage(String),

    #[error("crypto error: {0}")]
    Crypto(String),

    #[error("config error: {0}")]
    Config(String),
}

impl WalletError {
    /// The transfer stage that could not be reached because of this error,
    /// or `None` for errors outside the transfer pipeline.
    pub fn failed_stage(&self) -> Option<TransferStage> {
        match self {
            WalletError::NonceFetch { .. } => Some(TransferStage::NonceFetched),
            WalletError::FeeEstimation { .. } => Some(TransferStage::FeesFetched),
            WalletError::GasEstimation { .. } => Some(TransferStage::GasEstimated),
            WalletError::Authentication
            | WalletError::Signing(_)
            | WalletError::AccountNotFound(_) => Some(TransferStage::Signed),
            WalletError::Broadcast { .. } => Some(TransferStage::Submitted),
            WalletError::Timeout { method, .. } => match method.as_str() {
                "eth_getTransactionCount" => Some(TransferStage::NonceFetched),
                "eth_maxPriorityFeePerGas" | "eth_getBlockByNumber" => {
                    Some(TransferStage::FeesFetched)
                }
                "eth_estimateGas" => Some(TransferStage::GasEstimated),
                "eth_sendRawTransaction" => Some(TransferStage::Submitted),
                _ => None,
            },
            _ => None,
        }
    }

    /// Whether re-running the whole transfer (starting from a fresh nonce)
    /// may succeed. Nothing is retried automatically.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WalletError::Connection { .. }
                | WalletError::NonceFetch { .. }
                | WalletError::FeeEstimation { .. }
                | WalletError::GasEstimation { .. }
                | WalletError::Timeout { .. }
        )
    }
}

impl From<CryptoError> for WalletError {
    fn from(e: CryptoError) -> Self {
        match e {
            CryptoError::Entropy(msg) => WalletError::Entropy(msg),
            CryptoError::DecryptionFailed => WalletError::Authentication,
            other => WalletError::Crypto(other.to_string()),
        }
    }
}

impl From<EthError> for WalletError {
    fn from(e: EthError) -> Self {
        match e {
            EthError::InvalidPrivateKey(msg) => WalletError::InvalidKeyFormat(msg),
            EthError::InvalidPublicKey(msg) => WalletError::Derivation(msg),
            EthError::InvalidAddress(msg) => WalletError::InvalidAddress(msg),
            EthError::InvalidAmount(msg) => WalletError::InvalidAmount(msg),
            EthError::SigningError(msg) | EthError::EncodingError(msg) => {
                WalletError::Signing(msg)
            }
            EthError::UnsupportedChain(msg) => WalletError::UnsupportedChain(msg),
            EthError::UnknownNetwork(name) => WalletError::UnknownNetwork(name),
            EthError::Config(msg) => WalletError::Config(msg),
            EthError::ChainMismatch {
                network,
                expected,
                actual,
            } => WalletError::ChainMismatch {
                network,
                expected,
                actual,
            },
            EthError::Connection { chain, reason } => WalletError::Connection { chain, reason },
            EthError::ContractCall { chain, reason } => WalletError::ContractCall { chain, reason },
            EthError::NonceFetch { chain, reason } => WalletError::NonceFetch { chain, reason },
            EthError::FeeEstimation { chain, reason } => {
                WalletError::FeeEstimation { chain, reason }
            }
            EthError::GasEstimation { chain, reason } => {
                WalletError::GasEstimation { chain, reason }
            }
            EthError::Broadcast { chain, reason } => WalletError::Broadcast { chain, reason },
            EthError::Timeout { chain, method } => WalletError::Timeout { chain, method },
        }
    }
}

impl From<std::io::Error> for WalletError {
    fn from(e: std::io::Error) -> Self {
        WalletError::Storage(e.to_string())
    }
}
