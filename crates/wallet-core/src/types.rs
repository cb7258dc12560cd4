use std::fmt;
use std::path::PathBuf;

use alloy_primitives::{Address, B256, U256};
use chain_eth::address::checksum;
use chain_eth::units::format_amount;

/// A stored key, identified by its address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub address: Address,
    /// Location of the encrypted record.
    pub path: PathBuf,
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&checksum(&self.address))
    }
}

/// A balance in base units plus what is needed to render it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Balance {
    pub amount: U256,
    pub symbol: String,
    pub decimals: u8,
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", format_amount(self.amount, self.decimals), self.symbol)
    }
}

/// What was handed to the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReceipt {
    pub chain: String,
    pub from: Address,
    pub to: Address,
    /// Token contract for ERC-20 transfers.
    pub token: Option<Address>,
    pub amount: U256,
    pub nonce: u64,
    pub tx_hash: B256,
    pub explorer_url: String,
}

/// Progress of a single transfer.
///
/// `Submitted` and `Rejected` are terminal. Confirmation is not tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStage {
    Pending,
    NonceFetched,
    FeesFetched,
    GasEstimated,
    Assembled,
    Signed,
    Submitted,
    Rejected,
}

impl TransferStage {
    pub fn is_terminal(self) -> bool {
        matches!(self, TransferStage::Submitted | TransferStage::Rejected)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TransferStage::Pending => "pending",
            TransferStage::NonceFetched => "nonce_fetched",
            TransferStage::FeesFetched => "fees_fetched",
            TransferStage::GasEstimated => "gas_estimated",
            TransferStage::Assembled => "assembled",
            TransferStage::Signed => "signed",
            TransferStage::Submitted => "submitted",
            TransferStage::Rejected => "rejected",
        }
    }
}

impl fmt::Display for TransferStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
