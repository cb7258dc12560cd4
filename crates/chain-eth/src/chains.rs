//! Network descriptors and the registry they are looked up in.
//!
//! The registry starts from built-in presets, can be replaced by a JSON
//! document, and lets `<NAME>_RPC_URL` environment variables override the
//! endpoint of any network (for example `ETHEREUM_RPC_URL`, `BASE_RPC_URL`).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::EthError;

/// Ledger family a network belongs to. Only [`ChainFamily::Evm`] can be
/// connected to; the others are recognised so configs naming them load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainFamily {
    #[default]
    Evm,
    Bitcoin,
    Eos,
}

/// Everything needed to talk to one network. Immutable once a client holds it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkDescriptor {
    pub name: String,
    pub rpc_url: String,
    pub chain_id: u64,
    pub symbol: String,
    pub explorer_url: String,
    pub family: ChainFamily,
    /// Informational; transfers always scale by 18.
    pub decimals: u8,
}

impl NetworkDescriptor {
    /// `<explorer>/tx/<hash>`.
    pub fn explorer_tx_url(&self, tx_hash: &str) -> String {
        format!("{}/tx/{}", self.explorer_url.trim_end_matches('/'), tx_hash)
    }

    pub fn is_evm(&self) -> bool {
        self.family == ChainFamily::Evm
    }

    /// Environment variable that overrides this network's RPC URL.
    pub fn rpc_env_var(&self) -> String {
        let name: String = self
            .name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect();
        format!("{name}_RPC_URL")
    }
}

// ---------------------------------------------------------------------------
// Built-in presets
// ---------------------------------------------------------------------------

struct Preset {
    name: &'static str,
    chain_id: u64,
    symbol: &'static str,
    rpc_url: &'static str,
    explorer_url: &'static str,
}

/// Ethereum Mainnet (chain ID 1).
const ETHEREUM: Preset = Preset {
    name: "ethereum",
    chain_id: 1,
    symbol: "ETH",
    rpc_url: "https://eth.llamarpc.com",
    explorer_url: "https://etherscan.io",
};

/// Arbitrum One (chain ID 42161).
const ARBITRUM: Preset = Preset {
    name: "arbitrum",
    chain_id: 42161,
    symbol: "ETH",
    rpc_url: "https://arb1.arbitrum.io/rpc",
    explorer_url: "https://arbiscan.io",
};

/// Optimism (chain ID 10).
const OPTIMISM: Preset = Preset {
    name: "optimism",
    chain_id: 10,
    symbol: "ETH",
    rpc_url: "https://mainnet.optimism.io",
    explorer_url: "https://optimistic.etherscan.io",
};

/// Base (chain ID 8453).
const BASE: Preset = Preset {
    name: "base",
    chain_id: 8453,
    symbol: "ETH",
    rpc_url: "https://mainnet.base.org",
    explorer_url: "https://basescan.org",
};

/// Polygon PoS (chain ID 137).
const POLYGON: Preset = Preset {
    name: "polygon",
    chain_id: 137,
    symbol: "MATIC",
    rpc_url: "https://polygon-rpc.com",
    explorer_url: "https://polygonscan.com",
};

/// BNB Smart Chain (chain ID 56).
const BSC: Preset = Preset {
    name: "bsc",
    chain_id: 56,
    symbol: "BNB",
    rpc_url: "https://bsc-dataseed.binance.org",
    explorer_url: "https://bscscan.com",
};

/// Avalanche C-Chain (chain ID 43114).
const AVALANCHE: Preset = Preset {
    name: "avalanche",
    chain_id: 43114,
    symbol: "AVAX",
    rpc_url: "https://api.avax.network/ext/bc/C/rpc",
    explorer_url: "https://snowtrace.io",
};

/// Sepolia Testnet (chain ID 11155111).
const SEPOLIA: Preset = Preset {
    name: "sepolia",
    chain_id: 11155111,
    symbol: "ETH",
    rpc_url: "https://rpc.sepolia.org",
    explorer_url: "https://sepolia.etherscan.io",
};

const PRESETS: &[&Preset] = &[
    &ETHEREUM, &ARBITRUM, &OPTIMISM, &BASE, &POLYGON, &BSC, &AVALANCHE, &SEPOLIA,
];

/// Network selected when the caller names none.
pub const DEFAULT_NETWORK: &str = "ethereum";

impl From<&Preset> for NetworkDescriptor {
    fn from(preset: &Preset) -> Self {
        Self {
            name: preset.name.to_string(),
            rpc_url: preset.rpc_url.to_string(),
            chain_id: preset.chain_id,
            symbol: preset.symbol.to_string(),
            explorer_url: preset.explorer_url.to_string(),
            family: ChainFamily::Evm,
            decimals: 18,
        }
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// On-disk shape of one network entry.
#[derive(Debug, Deserialize)]
struct NetworkEntry {
    rpc_url: String,
    #[serde(default)]
    chain_id: u64,
    #[serde(default)]
    symbol: String,
    #[serde(default, alias = "explorer_url")]
    explorer: String,
    #[serde(default)]
    family: ChainFamily,
    #[serde(default = "default_decimals")]
    decimals: u8,
}

fn default_decimals() -> u8 {
    18
}

#[derive(Debug, Deserialize)]
struct RegistryFile {
    #[serde(default = "default_network_name")]
    default_network: String,
    networks: BTreeMap<String, NetworkEntry>,
}

fn default_network_name() -> String {
    DEFAULT_NETWORK.to_string()
}

/// Named network descriptors plus the default selection.
#[derive(Debug, Clone)]
pub struct NetworkRegistry {
    default_network: String,
    networks: BTreeMap<String, NetworkDescriptor>,
}

impl NetworkRegistry {
    /// The built-in presets, defaulting to `ethereum`.
    pub fn builtin() -> Self {
        let networks = PRESETS
            .iter()
            .map(|preset| (preset.name.to_string(), NetworkDescriptor::from(*preset)))
            .collect();

        Self {
            default_network: DEFAULT_NETWORK.to_string(),
            networks,
        }
    }

    /// Parses a registry document:
    ///
    /// ```json
    /// {
    ///   "default_network": "base",
    ///   "networks": {
    ///     "base": {"rpc_url": "https://mainnet.base.org", "chain_id": 8453,
    ///              "symbol": "ETH", "explorer": "https://basescan.org"}
    ///   }
    /// }
    /// ```
    ///
    /// Network names are case-insensitive. EVM entries need a non-zero
    /// `chain_id`, and `default_network` must name one of the entries.
    pub fn from_json(document: &str) -> Result<Self, EthError> {
        let file: RegistryFile = serde_json::from_str(document)
            .map_err(|e| EthError::Config(format!("invalid network config: {e}")))?;

        let mut networks = BTreeMap::new();
        for (name, entry) in file.networks {
            let name = name.to_ascii_lowercase();
            if entry.rpc_url.trim().is_empty() {
                return Err(EthError::Config(format!("network {name}: empty rpc_url")));
            }
            if entry.family == ChainFamily::Evm && entry.chain_id == 0 {
                return Err(EthError::Config(format!("network {name}: missing chain_id")));
            }

            let descriptor = NetworkDescriptor {
                name: name.clone(),
                rpc_url: entry.rpc_url,
                chain_id: entry.chain_id,
                symbol: entry.symbol,
                explorer_url: entry.explorer,
                family: entry.family,
                decimals: entry.decimals,
            };
            networks.insert(name, descriptor);
        }

        let default_network = file.default_network.to_ascii_lowercase();
        if !networks.contains_key(&default_network) {
            return Err(EthError::Config(format!(
                "default network {default_network} is not configured"
            )));
        }

        Ok(Self {
            default_network,
            networks,
        })
    }

    /// Applies `<NAME>_RPC_URL` overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_with(|key| std::env::var(key).ok());
    }

    /// Applies RPC URL overrides looked up through `lookup`.
    pub fn apply_overrides_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        for descriptor in self.networks.values_mut() {
            let key = descriptor.rpc_env_var();
            if let Some(url) = lookup(&key).filter(|url| !url.trim().is_empty()) {
                tracing::debug!(network = %descriptor.name, env = %key, "using RPC URL override");
                descriptor.rpc_url = url;
            }
        }
    }

    /// Looks up a network by name (case-insensitive).
    pub fn get(&self, name: &str) -> Result<&NetworkDescriptor, EthError> {
        self.networks
            .get(&name.to_ascii_lowercase())
            .ok_or_else(|| EthError::UnknownNetwork(name.to_string()))
    }

    pub fn default_network(&self) -> Result<&NetworkDescriptor, EthError> {
        self.get(&self.default_network)
    }

    /// Adds or replaces a network.
    pub fn insert(&mut self, descriptor: NetworkDescriptor) {
        let name = descriptor.name.to_ascii_lowercase();
        self.networks.insert(name, descriptor);
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.networks.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.networks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.networks.is_empty()
    }
}

impl Default for NetworkRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
