use std::future::IntoFuture;
use std::time::Duration;

use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_provider::{DynProvider, Provider};
use alloy_rpc_types_eth::{BlockId, TransactionRequest};
use alloy_transport::TransportResult;
use tracing::{debug, info, warn};

use crate::abi::decode_uint256;
use crate::address::checksum;
use crate::chains::NetworkDescriptor;
use crate::erc20;
use crate::error::EthError;
use crate::rpc;
use crate::transaction::SignedEthTransaction;

/// Deadline applied to each RPC call when none is configured.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Per-client tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientOptions {
    /// Bound on every individual RPC call. `None` waits forever.
    pub request_timeout: Option<Duration>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            request_timeout: Some(DEFAULT_REQUEST_TIMEOUT),
        }
    }
}

/// A transaction as reported by a history lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRecord {
    pub hash: B256,
    pub from: Address,
    pub to: Option<Address>,
    pub value: U256,
    pub block_number: Option<u64>,
}

/// Connection to one EVM network, parameterized by its descriptor.
///
/// The remote chain id is checked once at connect time; every later call
/// goes through the same provider and deadline.
pub struct ChainClient {
    descriptor: NetworkDescriptor,
    provider: Option<DynProvider>,
    options: ClientOptions,
}

impl std::fmt::Debug for ChainClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainClient")
            .field("network", &self.descriptor.name)
            .field("chain_id", &self.descriptor.chain_id)
            .field("closed", &self.provider.is_none())
            .finish()
    }
}

impl ChainClient {
    /// Connects over HTTP to `descriptor.rpc_url` with default options.
    pub async fn connect(descriptor: NetworkDescriptor) -> Result<Self, EthError> {
        Self::connect_with_options(descriptor, ClientOptions::default()).await
    }

    pub async fn connect_with_options(
        descriptor: NetworkDescriptor,
        options: ClientOptions,
    ) -> Result<Self, EthError> {
        ensure_evm(&descriptor)?;
        let provider =
            rpc::http_provider(&descriptor.rpc_url).map_err(|reason| EthError::Connection {
                chain: descriptor.name.clone(),
                reason,
            })?;
        Self::connect_with(descriptor, provider, options).await
    }

    /// Connects through an already-built provider.
    ///
    /// Fails with `ChainMismatch` when the node's `eth_chainId` differs from
    /// the descriptor, and with `UnsupportedChain` for non-EVM descriptors.
    #[tracing::instrument(skip_all, fields(chain = %descriptor.name))]
    pub async fn connect_with(
        descriptor: NetworkDescriptor,
        provider: DynProvider,
        options: ClientOptions,
    ) -> Result<Self, EthError> {
        ensure_evm(&descriptor)?;

        let client = Self {
            descriptor,
            provider: Some(provider),
            options,
        };

        let remote = client.remote_chain_id().await?;
        if remote != client.descriptor.chain_id {
            warn!(
                expected = client.descriptor.chain_id,
                actual = remote,
                "refusing connection: chain id mismatch"
            );
            return Err(EthError::ChainMismatch {
                network: client.descriptor.name.clone(),
                expected: client.descriptor.chain_id,
                actual: remote,
            });
        }

        info!(chain_id = remote, "connected");
        Ok(client)
    }

    pub fn descriptor(&self) -> &NetworkDescriptor {
        &self.descriptor
    }

    pub fn chain_name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn chain_id(&self) -> u64 {
        self.descriptor.chain_id
    }

    /// Releases the provider. Safe to call more than once; every call made
    /// afterwards fails with `Connection`.
    pub fn close(&mut self) {
        if self.provider.take().is_some() {
            debug!(chain = %self.descriptor.name, "client closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.provider.is_none()
    }

    /// `eth_chainId` as reported by the node.
    pub async fn remote_chain_id(&self) -> Result<u64, EthError> {
        let provider = self.provider()?;
        self.call("eth_chainId", provider.get_chain_id(), |chain, reason| {
            EthError::Connection { chain, reason }
        })
        .await
    }

    /// Native balance in wei at the latest block.
    pub async fn get_native_balance(&self, address: Address) -> Result<U256, EthError> {
        let provider = self.provider()?;
        self.call(
            "eth_getBalance",
            provider.get_balance(address).latest(),
            |chain, reason| EthError::Connection { chain, reason },
        )
        .await
    }

    /// `balanceOf(owner)` on `token` at the latest block.
    ///
    /// A revert, an RPC error, or an empty return payload (no contract at
    /// `token`) are all `ContractCall` errors.
    pub async fn get_token_balance(&self, token: Address, owner: Address) -> Result<U256, EthError> {
        let provider = self.provider()?;
        let call = TransactionRequest::default()
            .to(token)
            .input(Bytes::from(erc20::encode_balance_of(owner)).into());

        let output = self
            .call(
                "eth_call",
                provider.call(call).block(BlockId::latest()),
                |chain, reason| EthError::ContractCall { chain, reason },
            )
            .await?;

        let contract_error = |reason: String| EthError::ContractCall {
            chain: self.descriptor.name.clone(),
            reason,
        };
        if output.is_empty() {
            return Err(contract_error(format!(
                "balanceOf returned no data; is {} a token contract?",
                checksum(&token)
            )));
        }
        decode_uint256(&output).map_err(|e| contract_error(e.to_string()))
    }

    /// Submits a signed transaction. Consumes it: a signed transaction is
    /// broadcast at most once.
    ///
    /// Returns the hash reported by the node.
    pub async fn send_raw_transaction(&self, signed: SignedEthTransaction) -> Result<B256, EthError> {
        let provider = self.provider()?;
        let local_hash = signed.tx_hash();
        let pending = self
            .call(
                "eth_sendRawTransaction",
                provider.send_raw_transaction(signed.raw_tx()),
                |chain, reason| EthError::Broadcast { chain, reason },
            )
            .await?;

        let reported = *pending.tx_hash();
        if reported != local_hash {
            warn!(
                chain = %self.descriptor.name,
                local = %local_hash,
                reported = %reported,
                "node reported a different transaction hash"
            );
        }
        Ok(reported)
    }

    /// Past transactions of `address`. History is not indexed, so this is
    /// always empty.
    pub async fn transaction_history(
        &self,
        address: Address,
    ) -> Result<Vec<TransactionRecord>, EthError> {
        self.provider()?;
        debug!(chain = %self.descriptor.name, address = %address, "transaction history is not indexed");
        Ok(Vec::new())
    }

    /// Block explorer link for a transaction hash.
    pub fn explorer_tx_url(&self, tx_hash: &B256) -> String {
        self.descriptor.explorer_tx_url(&tx_hash.to_string())
    }

    /// Awaits one RPC call under the client's deadline.
    ///
    /// `on_error` turns an RPC failure into the error of the step the call
    /// belongs to. Expired deadlines are always `Timeout`.
    pub(crate) async fn call<T, R, F>(
        &self,
        method: &str,
        request: R,
        on_error: F,
    ) -> Result<T, EthError>
    where
        R: IntoFuture<Output = TransportResult<T>>,
        F: FnOnce(String, String) -> EthError,
    {
        debug!(chain = %self.descriptor.name, method, "rpc call");

        let outcome = match self.options.request_timeout {
            Some(deadline) => tokio::time::timeout(deadline, request)
                .await
                .map_err(|_| EthError::Timeout {
                    chain: self.descriptor.name.clone(),
                    method: method.to_string(),
                })?,
            None => request.await,
        };

        outcome.map_err(|e| on_error(self.descriptor.name.clone(), e.to_string()))
    }

    /// The live provider, or `Connection` once the client is closed.
    pub(crate) fn provider(&self) -> Result<&DynProvider, EthError> {
        self.provider.as_ref().ok_or_else(|| EthError::Connection {
            chain: self.descriptor.name.clone(),
            reason: "client is closed".into(),
        })
    }

    pub(crate) fn step_error<F>(&self, reason: String, make: F) -> EthError
    where
        F: FnOnce(String, String) -> EthError,
    {
        make(self.descriptor.name.clone(), reason)
    }
}

fn ensure_evm(descriptor: &NetworkDescriptor) -> Result<(), EthError> {
    if descriptor.is_evm() {
        Ok(())
    } else {
        Err(EthError::UnsupportedChain(format!(
            "{} ({:?} family is not implemented)",
            descriptor.name, descriptor.family
        )))
    }
}
