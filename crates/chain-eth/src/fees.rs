use alloy_primitives::{Address, Bytes, U256};
use alloy_provider::Provider;
use alloy_rpc_types_eth::{BlockNumberOrTag, TransactionRequest};
use tracing::{debug, warn};

use crate::client::ChainClient;
use crate::error::EthError;
use crate::transaction::GasSettings;

/// Gas limit used for an ERC-20 transfer when estimation fails.
pub const TOKEN_TRANSFER_FALLBACK_GAS: u64 = 100_000;

/// `max_fee_per_gas = base_fee * 2 + priority_fee`, or `None` on overflow.
pub fn fee_cap(priority_fee: u128, base_fee: u128) -> Option<u128> {
    base_fee.checked_mul(2)?.checked_add(priority_fee)
}

/// `gas + gas / 10` (integer division), or `None` on overflow.
pub fn with_gas_margin(gas: u64) -> Option<u64> {
    gas.checked_add(gas / 10)
}

/// Current EIP-1559 fee inputs and the cap derived from them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeSuggestion {
    pub priority_fee: u128,
    pub base_fee: u128,
    pub max_fee: u128,
}

impl FeeSuggestion {
    pub fn gas_settings(&self, gas_limit: u64) -> GasSettings {
        GasSettings {
            max_priority_fee_per_gas: self.priority_fee,
            max_fee_per_gas: self.max_fee,
            gas_limit,
        }
    }
}

/// Fee, nonce and gas queries for one connected chain.
///
/// Nothing is cached: every transfer asks again. Two transfers from the same
/// account that overlap can observe the same pending nonce; callers that need
/// ordering must serialize transfers per account.
#[derive(Debug, Clone, Copy)]
pub struct FeeOracle<'a> {
    client: &'a ChainClient,
}

impl<'a> FeeOracle<'a> {
    pub fn new(client: &'a ChainClient) -> Self {
        Self { client }
    }

    /// `eth_getTransactionCount(address, "pending")`.
    pub async fn next_nonce(&self, address: Address) -> Result<u64, EthError> {
        let provider = self.client.provider()?;
        let nonce = self
            .client
            .call(
                "eth_getTransactionCount",
                provider.get_transaction_count(address).pending(),
                |chain, reason| EthError::NonceFetch { chain, reason },
            )
            .await?;
        debug!(chain = %self.client.chain_name(), address = %address, nonce, "fetched nonce");
        Ok(nonce)
    }

    /// Priority fee from `eth_maxPriorityFeePerGas`, base fee from the latest
    /// block, and `fee_cap` of the two.
    pub async fn suggest_fees(&self) -> Result<FeeSuggestion, EthError> {
        let provider = self.client.provider()?;
        let fee_error = |reason: String| {
            self.client
                .step_error(reason, |chain, reason| EthError::FeeEstimation { chain, reason })
        };

        let priority_fee = self
            .client
            .call(
                "eth_maxPriorityFeePerGas",
                provider.get_max_priority_fee_per_gas(),
                |chain, reason| EthError::FeeEstimation { chain, reason },
            )
            .await?;

        let block = self
            .client
            .call(
                "eth_getBlockByNumber",
                provider.get_block_by_number(BlockNumberOrTag::Latest),
                |chain, reason| EthError::FeeEstimation { chain, reason },
            )
            .await?
            .ok_or_else(|| fee_error("node returned no latest block".into()))?;
        let base_fee = block
            .header
            .inner
            .base_fee_per_gas
            .map(u128::from)
            .ok_or_else(|| fee_error("latest block has no baseFeePerGas".into()))?;

        let max_fee = fee_cap(priority_fee, base_fee)
            .ok_or_else(|| fee_error("fee cap overflows u128".into()))?;

        debug!(
            chain = %self.client.chain_name(),
            priority_fee,
            base_fee,
            max_fee,
            "fee suggestion"
        );
        Ok(FeeSuggestion {
            priority_fee,
            base_fee,
            max_fee,
        })
    }

    /// `eth_estimateGas` plus a 10% margin.
    pub async fn estimate_gas(
        &self,
        from: Address,
        to: Address,
        value: U256,
        data: &Bytes,
    ) -> Result<u64, EthError> {
        let provider = self.client.provider()?;
        let mut call = TransactionRequest::default().from(from).to(to).value(value);
        if !data.is_empty() {
            call = call.input(data.clone().into());
        }

        let estimate = self
            .client
            .call("eth_estimateGas", provider.estimate_gas(call), |chain, reason| {
                EthError::GasEstimation { chain, reason }
            })
            .await?;
        let gas_limit = with_gas_margin(estimate).ok_or_else(|| {
            self.client.step_error("gas limit overflows u64".into(), |chain, reason| {
                EthError::GasEstimation { chain, reason }
            })
        })?;

        debug!(chain = %self.client.chain_name(), estimate, gas_limit, "estimated gas");
        Ok(gas_limit)
    }

    /// [`Self::estimate_gas`], falling back to `fallback` when the node cannot
    /// estimate. Deadlines and closed clients still fail.
    pub async fn estimate_gas_or(
        &self,
        from: Address,
        to: Address,
        value: U256,
        data: &Bytes,
        fallback: u64,
    ) -> Result<u64, EthError> {
        match self.estimate_gas(from, to, value, data).await {
            Ok(gas) => Ok(gas),
            Err(EthError::GasEstimation { chain, reason }) => {
                warn!(%chain, %reason, fallback, "gas estimation failed, using fallback limit");
                Ok(fallback)
            }
            Err(other) => Err(other),
        }
    }
}
