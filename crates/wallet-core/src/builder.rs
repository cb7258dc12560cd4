use alloy_primitives::{Address, Bytes, U256};
use chain_eth::client::ChainClient;
use chain_eth::erc20;
use chain_eth::fees::{FeeOracle, TOKEN_TRANSFER_FALLBACK_GAS};
use chain_eth::transaction::{build_erc20_transfer, build_transfer};
use crypto_utils::ZeroizingString;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::error::WalletError;
use crate::keystore::AccountStore;
use crate::types::{Account, TransferReceipt, TransferStage};

/// What is being moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferAsset {
    /// The chain's native currency.
    Native,
    /// An ERC-20 token at this contract address.
    Token(Address),
}

/// A fully validated transfer, amounts already in base units.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub from: Account,
    pub to: Address,
    pub amount: U256,
    pub asset: TransferAsset,
}

/// Drives one transfer from nonce fetch to submission.
///
/// Steps run strictly in order and the first failure ends the transfer in
/// [`TransferStage::Rejected`]; nothing is signed or submitted after a
/// failed step.
pub struct TransactionBuilder<'a> {
    client: &'a ChainClient,
    store: &'a AccountStore,
    stage: TransferStage,
}

impl<'a> TransactionBuilder<'a> {
    pub fn new(client: &'a ChainClient, store: &'a AccountStore) -> Self {
        Self {
            client,
            store,
            stage: TransferStage::Pending,
        }
    }

    /// Last stage reached.
    pub fn stage(&self) -> TransferStage {
        self.stage
    }

    pub async fn execute(
        &mut self,
        request: TransferRequest,
        password: &ZeroizingString,
    ) -> Result<TransferReceipt, WalletError> {
        let span = info_span!(
            "transfer",
            chain = %self.client.chain_name(),
            from = %request.from,
            to = %request.to,
        );
        self.stage = TransferStage::Pending;

        match self.run(&request, password).instrument(span.clone()).await {
            Ok(receipt) => Ok(receipt),
            Err(err) => {
                span.in_scope(|| {
                    warn!(stage = %self.stage, error = %err, "transfer rejected");
                });
                self.stage = TransferStage::Rejected;
                Err(err)
            }
        }
    }

    async fn run(
        &mut self,
        request: &TransferRequest,
        password: &ZeroizingString,
    ) -> Result<TransferReceipt, WalletError> {
        let client = self.client;
        let oracle = FeeOracle::new(client);
        let from = request.from.address;
        let chain_id = client.chain_id();

        let nonce = oracle.next_nonce(from).await?;
        self.advance(TransferStage::NonceFetched);

        let fees = oracle.suggest_fees().await?;
        self.advance(TransferStage::FeesFetched);

        let gas_limit = match request.asset {
            TransferAsset::Native => {
                oracle
                    .estimate_gas(from, request.to, request.amount, &Bytes::new())
                    .await?
            }
            TransferAsset::Token(token) => {
                let data = Bytes::from(erc20::encode_transfer(request.to, request.amount));
                oracle
                    .estimate_gas_or(from, token, U256::ZERO, &data, TOKEN_TRANSFER_FALLBACK_GAS)
                    .await?
            }
        };
        self.advance(TransferStage::GasEstimated);

        let gas = fees.gas_settings(gas_limit);
        let intent = match request.asset {
            TransferAsset::Native => build_transfer(chain_id, nonce, request.to, request.amount, gas),
            TransferAsset::Token(token) => {
                build_erc20_transfer(chain_id, nonce, token, request.to, request.amount, gas)
            }
        };
        self.advance(TransferStage::Assembled);

        let signed = self
            .store
            .sign_transaction_async(&request.from, intent, chain_id, password)
            .await?;
        self.advance(TransferStage::Signed);

        let tx_hash = client.send_raw_transaction(signed).await?;
        self.advance(TransferStage::Submitted);

        let receipt = TransferReceipt {
            chain: client.chain_name().to_string(),
            from,
            to: request.to,
            token: match request.asset {
                TransferAsset::Native => None,
                TransferAsset::Token(token) => Some(token),
            },
            amount: request.amount,
            nonce,
            tx_hash,
            explorer_url: client.explorer_tx_url(&tx_hash),
        };
        info!(nonce, tx_hash = %tx_hash, "transfer submitted");
        Ok(receipt)
    }

    fn advance(&mut self, next: TransferStage) {
        debug!(from = %self.stage, to = %next, "stage transition");
        self.stage = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;
    use chain_eth::chains::NetworkRegistry;
    use chain_eth::client::ClientOptions;
    use chain_eth::rpc::mock::{block_with_base_fee, RpcError, ScriptedTransport};
    use crypto_utils::KdfParams;
    use serde_json::json;

    const KEY_ONE: &str = "0x0000000000000000000000000000000000000000000000000000000000000001";
    const TO: Address = address!("000000000000000000000000000000000000dEaD");
    const TOKEN: Address = address!("A0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48");

    fn secret(s: &str) -> ZeroizingString {
        ZeroizingString::new(s.to_string())
    }

    fn scripted() -> ScriptedTransport {
        let transport = ScriptedTransport::default();
        transport
            .on("eth_chainId", json!("0x1"))
            .on("eth_getTransactionCount", json!("0x7"))
            .on("eth_maxPriorityFeePerGas", json!("0x3b9aca00"))
            .on("eth_getBlockByNumber", block_with_base_fee(Some(2_000_000_000)))
            .on("eth_estimateGas", json!("0x5208"));
        transport
    }

    async fn client(transport: &ScriptedTransport) -> ChainClient {
        let ethereum = NetworkRegistry::builtin().get("ethereum").unwrap().clone();
        ChainClient::connect_with(ethereum, transport.provider(), ClientOptions::default())
            .await
            .unwrap()
    }

    fn store(dir: &tempfile::TempDir) -> (AccountStore, Account) {
        let store = AccountStore::open(dir.path())
            .unwrap()
            .with_kdf_params(KdfParams::light());
        let account = store.import_raw_key(&secret(KEY_ONE), &secret("pw")).unwrap();
        (store, account)
    }

    #[tokio::test]
    async fn native_transfer_reaches_submitted() {
        let transport = scripted();
        let client = client(&transport).await;
        let dir = tempfile::tempdir().unwrap();
        let (store, account) = store(&dir);

        let tx_hash = "0x".to_string() + &"ab".repeat(32);
        transport.on("eth_sendRawTransaction", json!(tx_hash));

        let mut builder = TransactionBuilder::new(&client, &store);
        let receipt = builder
            .execute(
                TransferRequest {
                    from: account.clone(),
                    to: TO,
                    amount: U256::from(10u64).pow(U256::from(18u64)),
                    asset: TransferAsset::Native,
                },
                &secret("pw"),
            )
            .await
            .unwrap();

        assert_eq!(builder.stage(), TransferStage::Submitted);
        assert_eq!(receipt.nonce, 7);
        assert_eq!(receipt.from, account.address);
        assert!(receipt.token.is_none());
        assert_eq!(format!("{:#x}", receipt.tx_hash), tx_hash);
        assert!(receipt.explorer_url.ends_with(&format!("/tx/{tx_hash}")));
        assert_eq!(transport.call_count("eth_sendRawTransaction"), 1);
    }

    #[tokio::test]
    async fn token_transfer_uses_fallback_gas() {
        let transport = scripted();
        transport.fail(
            "eth_estimateGas",
            RpcError::Rpc {
                code: -32000,
                message: "execution reverted".into(),
            },
        );
        transport.on("eth_sendRawTransaction", json!("0x".to_string() + &"cd".repeat(32)));
        let client = client(&transport).await;
        let dir = tempfile::tempdir().unwrap();
        let (store, account) = store(&dir);

        let mut builder = TransactionBuilder::new(&client, &store);
        let receipt = builder
            .execute(
                TransferRequest {
                    from: account,
                    to: TO,
                    amount: U256::from(5u64),
                    asset: TransferAsset::Token(TOKEN),
                },
                &secret("pw"),
            )
            .await
            .unwrap();

        assert_eq!(receipt.token, Some(TOKEN));
        assert_eq!(builder.stage(), TransferStage::Submitted);
    }

    #[tokio::test]
    async fn native_gas_failure_is_rejected_before_signing() {
        let transport = scripted();
        transport.fail(
            "eth_estimateGas",
            RpcError::Rpc {
                code: -32000,
                message: "insufficient funds".into(),
            },
        );
        let client = client(&transport).await;
        let dir = tempfile::tempdir().unwrap();
        let (store, account) = store(&dir);

        let mut builder = TransactionBuilder::new(&client, &store);
        let err = builder
            .execute(
                TransferRequest {
                    from: account,
                    to: TO,
                    amount: U256::from(1u64),
                    asset: TransferAsset::Native,
                },
                &secret("pw"),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, WalletError::GasEstimation { .. }));
        assert_eq!(err.failed_stage(), Some(TransferStage::GasEstimated));
        assert_eq!(builder.stage(), TransferStage::Rejected);
        assert_eq!(transport.call_count("eth_sendRawTransaction"), 0);
    }

    #[tokio::test]
    async fn wrong_password_stops_before_submission() {
        let transport = scripted();
        let client = client(&transport).await;
        let dir = tempfile::tempdir().unwrap();
        let (store, account) = store(&dir);

        let mut builder = TransactionBuilder::new(&client, &store);
        let err = builder
            .execute(
                TransferRequest {
                    from: account,
                    to: TO,
                    amount: U256::from(1u64),
                    asset: TransferAsset::Native,
                },
                &secret("nope"),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, WalletError::Authentication));
        assert_eq!(builder.stage(), TransferStage::Rejected);
        assert_eq!(transport.call_count("eth_sendRawTransaction"), 0);
    }
}
