use alloy_primitives::Address;
use bip32::{ChildNumber, XPrv};
use zeroize::Zeroizing;

use crate::error::WalletError;
use crate::keys::PrivateKey;
use crate::mnemonic::Mnemonic;

/// BIP-44 path for the first EVM account: m/purpose'/coin_type'/account'/change/address_index
pub const ETH_DERIVATION_PATH: &str = "m/44'/60'/0'/0/0";

/// [`ETH_DERIVATION_PATH`] as `(index, hardened)` steps.
const ETH_PATH_STEPS: [(u32, bool); 5] = [(44, true), (60, true), (0, true), (0, false), (0, false)];

/// Derives the account key at `m/44'/60'/0'/0/0` from a mnemonic.
///
/// The seed and every intermediate extended key are wiped on drop. Only
/// address index 0 is reachable.
pub fn derive_key(mnemonic: &Mnemonic, passphrase: &str) -> Result<PrivateKey, WalletError> {
    let seed = mnemonic.to_seed(passphrase)?;

    let mut xprv = XPrv::new(seed.as_slice())
        .map_err(|e| WalletError::Derivation(format!("master key: {e}")))?;

    for (index, hardened) in ETH_PATH_STEPS {
        let child = ChildNumber::new(index, hardened)
            .map_err(|e| WalletError::Derivation(format!("child number {index}: {e}")))?;
        xprv = xprv
            .derive_child(child)
            .map_err(|e| WalletError::Derivation(format!("child {child}: {e}")))?;
    }

    let key_bytes = Zeroizing::new(xprv.to_bytes());
    PrivateKey::from_bytes(&key_bytes)
        .map_err(|e| WalletError::Derivation(e.to_string()))
}

/// The address a mnemonic controls, without handing out key material.
pub fn derive_address(mnemonic: &Mnemonic, passphrase: &str) -> Result<Address, WalletError> {
    derive_key(mnemonic, passphrase).map(|key| key.address())
}
