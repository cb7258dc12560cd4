use thiserror::Error;

/// EVM chain errors: offline encoding/signing failures and the network steps
/// of a transfer. Network variants name the chain they happened on.
#[derive(Debug, Error)]
pub enum EthError {
    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("signing error: {0}")]
    SigningError(String),

    #[error("encoding error: {0}")]
    EncodingError(String),

    #[error("unsupported chain: {0}")]
    UnsupportedChain(String),

    #[error("unknown network: {0}")]
    UnknownNetwork(String),

    #[error("network config error: {0}")]
    Config(String),

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

    #[error("broadcast rejected on {chain}: {reason}")]
    Broadcast { chain: String, reason: String },

    #[error("{method} timed out on {chain}")]
    Timeout { chain: String, method: String },
}
