//! EVM chain support for the wallet.
//!
//! This crate provides:
//! - Account addresses from secp256k1 public keys, with EIP-55 checksums
//! - EIP-1559 transaction building, signing and signer recovery
//! - ERC-20 `transfer` and `balanceOf` calldata
//! - A network registry and a JSON-RPC chain client
//! - The fee, nonce and gas oracle used by transfers

pub mod abi;
pub mod address;
pub mod chains;
pub mod client;
pub mod erc20;
pub mod error;
pub mod fees;
pub mod rpc;
pub mod transaction;
pub mod units;

pub use alloy_primitives::{Address, Bytes, B256, U256};
pub use chains::{ChainFamily, NetworkDescriptor, NetworkRegistry};
pub use client::{ChainClient, ClientOptions};
pub use error::EthError;
pub use fees::FeeOracle;
pub use transaction::{EthTransaction, GasSettings, SignedEthTransaction};
