//! # crypto-utils
//!
//! Authenticated encryption, password key derivation, secret buffers, and
//! secure random generation for the account store.

pub mod encryption;
pub mod error;
pub mod kdf;
pub mod random;
pub mod zeroizing;

pub use error::CryptoError;
pub use kdf::KdfParams;
pub use zeroizing::ZeroizingString;
