//! # wallet-core
//!
//! Account management and the transfer pipeline for EVM networks: mnemonic
//! derivation, the encrypted account store, and the stage-by-stage
//! transaction builder. [`Wallet`] is the surface callers (a CLI, a service)
//! drive; everything it needs is passed in explicitly.

pub mod builder;
pub mod error;
pub mod hd_derivation;
pub mod key_record;
pub mod keys;
pub mod keystore;
pub mod mnemonic;
pub mod types;
pub mod web3_keystore;

use alloy_primitives::Address;
use chain_eth::address::{checksum, parse_address};
use chain_eth::client::{ChainClient, ClientOptions, TransactionRecord};
use chain_eth::rpc::DynProvider;
use chain_eth::units::{parse_amount, ASSUMED_DECIMALS};
use chain_eth::NetworkRegistry;
use crypto_utils::ZeroizingString;
use tracing::debug;

pub use builder::{TransactionBuilder, TransferAsset, TransferRequest};
pub use crypto_utils::KdfParams;
pub use error::WalletError;
pub use keystore::AccountStore;
pub use mnemonic::Mnemonic;
pub use types::{Account, Balance, TransferReceipt, TransferStage};

/// Accounts plus the networks they can transact on.
pub struct Wallet {
    store: AccountStore,
    networks: NetworkRegistry,
    options: ClientOptions,
    provider: Option<DynProvider>,
}

impl std::fmt::Debug for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wallet")
            .field("store", &self.store)
            .field("networks", &self.networks.len())
            .field("options", &self.options)
            .field("custom_provider", &self.provider.is_some())
            .finish()
    }
}

impl Wallet {
    pub fn new(store: AccountStore, networks: NetworkRegistry) -> Self {
        Self {
            store,
            networks,
            options: ClientOptions::default(),
            provider: None,
        }
    }

    /// Options applied to every chain client this wallet opens.
    pub fn with_client_options(mut self, options: ClientOptions) -> Self {
        self.options = options;
        self
    }

    /// Routes every network through `provider` instead of HTTP to the
    /// descriptor's `rpc_url`.
    pub fn with_provider(mut self, provider: DynProvider) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn store(&self) -> &AccountStore {
        &self.store
    }

    pub fn networks(&self) -> &NetworkRegistry {
        &self.networks
    }

    // ─── Accounts ───────────────────────────────────────────────────────

    /// New 12-word phrase. Not stored.
    pub fn generate_mnemonic(&self) -> Result<Mnemonic, WalletError> {
        mnemonic::generate_mnemonic()
    }

    pub fn import_mnemonic(
        &self,
        mnemonic: &ZeroizingString,
        password: &ZeroizingString,
    ) -> Result<Account, WalletError> {
        self.store.import_mnemonic(mnemonic, password)
    }

    pub fn import_raw_key(
        &self,
        hex_key: &ZeroizingString,
        password: &ZeroizingString,
    ) -> Result<Account, WalletError> {
        self.store.import_raw_key(hex_key, password)
    }

    /// Imports a Web3 v3 key file, re-sealed under `new_password`.
    pub fn import_keystore_json(
        &self,
        json: &str,
        password: &ZeroizingString,
        new_password: &ZeroizingString,
    ) -> Result<Account, WalletError> {
        self.store.import_keystore_json(json, password, new_password)
    }

    pub fn create_account(&self, password: &ZeroizingString) -> Result<Account, WalletError> {
        self.store.create_account(password)
    }

    pub fn list_accounts(&self) -> Result<Vec<Account>, WalletError> {
        self.store.list_accounts()
    }

    pub fn find_account(&self, address: &str) -> Result<Account, WalletError> {
        self.store.find_account(address)
    }

    // ─── Chain queries ──────────────────────────────────────────────────

    /// Opens a client for `chain`, verifying its chain id.
    pub async fn connect(&self, chain: &str) -> Result<ChainClient, WalletError> {
        let descriptor = self.networks.get(chain)?.clone();
        let client = match &self.provider {
            Some(provider) => {
                ChainClient::connect_with(descriptor, provider.clone(), self.options).await?
            }
            None => ChainClient::connect_with_options(descriptor, self.options).await?,
        };
        Ok(client)
    }

    /// Native balance of `address` on `chain`.
    pub async fn get_native_balance(
        &self,
        chain: &str,
        address: &str,
    ) -> Result<Balance, WalletError> {
        let address = parse_address(address)?;
        let mut client = self.connect(chain).await?;
        let amount = client.get_native_balance(address).await;
        client.close();

        let descriptor = client.descriptor();
        Ok(Balance {
            amount: amount?,
            symbol: descriptor.symbol.clone(),
            decimals: descriptor.decimals,
        })
    }

    /// ERC-20 balance of `address` at `token`. The token's own decimals are
    /// not queried, and its address stands in for a symbol.
    pub async fn get_token_balance(
        &self,
        chain: &str,
        token: &str,
        address: &str,
    ) -> Result<Balance, WalletError> {
        let token = parse_address(token)?;
        let owner = parse_address(address)?;
        let mut client = self.connect(chain).await?;
        let amount = client.get_token_balance(token, owner).await;
        client.close();

        Ok(Balance {
            amount: amount?,
            symbol: checksum(&token),
            decimals: ASSUMED_DECIMALS,
        })
    }

    /// Always empty; history is not indexed.
    pub async fn transaction_history(
        &self,
        chain: &str,
        address: &str,
    ) -> Result<Vec<TransactionRecord>, WalletError> {
        let address = parse_address(address)?;
        let mut client = self.connect(chain).await?;
        let history = client.transaction_history(address).await;
        client.close();
        Ok(history?)
    }

    // ─── Transfers ──────────────────────────────────────────────────────

    /// Sends `amount` (decimal, in whole coins) of the native currency.
    pub async fn transfer(
        &self,
        chain: &str,
        from: &str,
        to: &str,
        amount: &str,
        password: &ZeroizingString,
    ) -> Result<TransferReceipt, WalletError> {
        let request = self.request(from, to, amount, builder::TransferAsset::Native)?;
        self.submit(chain, request, password).await
    }

    /// Sends `amount` (decimal, 18 decimals assumed) of the ERC-20 at `token`.
    pub async fn token_transfer(
        &self,
        chain: &str,
        from: &str,
        token: &str,
        to: &str,
        amount: &str,
        password: &ZeroizingString,
    ) -> Result<TransferReceipt, WalletError> {
        let token = parse_address(token)?;
        let request = self.request(from, to, amount, builder::TransferAsset::Token(token))?;
        self.submit(chain, request, password).await
    }

    /// Validates every input before any network traffic.
    fn request(
        &self,
        from: &str,
        to: &str,
        amount: &str,
        asset: TransferAsset,
    ) -> Result<TransferRequest, WalletError> {
        let from = self.store.find_account(from)?;
        let to: Address = parse_address(to)?;
        let amount = parse_amount(amount)?;
        Ok(TransferRequest {
            from,
            to,
            amount,
            asset,
        })
    }

    async fn submit(
        &self,
        chain: &str,
        request: TransferRequest,
        password: &ZeroizingString,
    ) -> Result<TransferReceipt, WalletError> {
        let mut client = self.connect(chain).await?;
        debug!(chain = %client.chain_name(), asset = ?request.asset, "starting transfer");

        let result = TransactionBuilder::new(&client, &self.store)
            .execute(request, password)
            .await;
        client.close();
        result
    }
}
