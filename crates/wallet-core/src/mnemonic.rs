use std::fmt;

use bip39::Language;
use crypto_utils::ZeroizingString;
use rand::RngCore;
use zeroize::Zeroizing;

use crate::error::WalletError;

/// Words in a generated phrase.
pub const WORD_COUNT: usize = 12;

/// Entropy behind a generated phrase (128 bits).
pub const ENTROPY_BYTES: usize = 16;

/// A checksum-valid BIP-39 English phrase.
///
/// The phrase lives only in memory, is wiped on drop, and never appears in
/// `Debug` output.
pub struct Mnemonic {
    phrase: ZeroizingString,
}

impl Mnemonic {
    /// Generates a 12-word phrase from OS entropy.
    pub fn generate() -> Result<Self, WalletError> {
        let mut entropy = Zeroizing::new([0u8; ENTROPY_BYTES]);
        rand::rngs::OsRng
            .try_fill_bytes(entropy.as_mut_slice())
            .map_err(|e| WalletError::Entropy(e.to_string()))?;

        let mnemonic = bip39::Mnemonic::from_entropy_in(Language::English, entropy.as_slice())
            .map_err(|e| WalletError::InvalidMnemonic(e.to_string()))?;

        Ok(Self {
            phrase: ZeroizingString::new(mnemonic.to_string()),
        })
    }

    /// Validates and normalizes a phrase (whitespace collapsed, lowercase).
    ///
    /// Rejects unknown words, bad word counts and bad checksums.
    pub fn parse(phrase: &str) -> Result<Self, WalletError> {
        // Sized up front so the buffer never reallocates and leaves copies behind.
        let mut buffer = String::with_capacity(phrase.len());
        for word in phrase.split_whitespace() {
            if !buffer.is_empty() {
                buffer.push(' ');
            }
            buffer.extend(word.chars().map(|c| c.to_ascii_lowercase()));
        }
        let normalized = ZeroizingString::new(buffer);

        bip39::Mnemonic::parse_in_normalized(Language::English, normalized.expose())
            .map_err(|e| WalletError::InvalidMnemonic(e.to_string()))?;

        Ok(Self { phrase: normalized })
    }

    pub fn phrase(&self) -> &str {
        self.phrase.expose()
    }

    pub fn words(&self) -> impl Iterator<Item = &str> {
        self.phrase.expose().split(' ')
    }

    pub fn word_count(&self) -> usize {
        self.words().count()
    }

    /// BIP-39 seed (PBKDF2-HMAC-SHA512, 2048 rounds).
    pub fn to_seed(&self, passphrase: &str) -> Result<Zeroizing<[u8; 64]>, WalletError> {
        let mnemonic = bip39::Mnemonic::parse_in_normalized(Language::English, self.phrase())
            .map_err(|e| WalletError::InvalidMnemonic(e.to_string()))?;
        Ok(Zeroizing::new(mnemonic.to_seed(passphrase)))
    }
}

impl fmt::Debug for Mnemonic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Mnemonic([REDACTED; {} words])", self.word_count())
    }
}

/// Generates a new 12-word mnemonic.
pub fn generate_mnemonic() -> Result<Mnemonic, WalletError> {
    Mnemonic::generate()
}

/// Whether `phrase` is a valid BIP-39 English mnemonic.
pub fn validate(phrase: &str) -> bool {
    Mnemonic::parse(phrase).is_ok()
}

/// Validate a single word against the BIP-39 word list
pub fn is_valid_word(word: &str) -> bool {
    Language::English.find_word(word).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_MNEMONIC: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    #[test]
    fn generate_has_12_valid_words() {
        let mnemonic = generate_mnemonic().unwrap();
        assert_eq!(mnemonic.word_count(), WORD_COUNT);
        assert!(validate(mnemonic.phrase()));
    }

    #[test]
    fn generated_phrases_differ() {
        let a = generate_mnemonic().unwrap();
        let b = generate_mnemonic().unwrap();
        assert_ne!(a.phrase(), b.phrase());
    }

    #[test]
    fn validate_rejects_garbage() {
        assert!(!validate("invalid mnemonic phrase here"));
        assert!(!validate(""));
    }

    #[test]
    fn validate_rejects_bad_checksum() {
        // Last word swapped: every word is valid, the checksum is not.
        let phrase = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon";
        assert!(!validate(phrase));
    }

    #[test]
    fn accepts_24_words() {
        let phrase = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon art";
        assert_eq!(Mnemonic::parse(phrase).unwrap().word_count(), 24);
    }

    #[test]
    fn parse_normalizes_whitespace_and_case() {
        let messy = "  Abandon abandon\tabandon abandon abandon abandon abandon abandon abandon abandon abandon ABOUT ";
        let mnemonic = Mnemonic::parse(messy).unwrap();
        assert_eq!(mnemonic.phrase(), TEST_MNEMONIC);
    }

    #[test]
    fn bip39_seed_vector() {
        let seed = Mnemonic::parse(TEST_MNEMONIC).unwrap().to_seed("").unwrap();
        assert_eq!(
            hex::encode(seed.as_slice()),
            "5eb00bbddcf069084889a8ab9155568165f5c453ccb85e70811aaed6f6da5fc1\
             9a5ac40b389cd370d086206dec8aa6c43daea6690f20ad3d8d48b2d2ce9e38e4"
        );
    }

    #[test]
    fn passphrase_changes_seed() {
        let mnemonic = Mnemonic::parse(TEST_MNEMONIC).unwrap();
        assert_ne!(
            *mnemonic.to_seed("").unwrap(),
            *mnemonic.to_seed("mypassphrase").unwrap()
        );
    }

    #[test]
    fn invalid_mnemonic_error_does_not_echo_words() {
        let err = Mnemonic::parse("zebra secret wallet words").unwrap_err();
        assert!(matches!(err, WalletError::InvalidMnemonic(_)));
        assert!(!err.to_string().contains("secret"));
    }

    #[test]
    fn debug_is_redacted() {
        let mnemonic = Mnemonic::parse(TEST_MNEMONIC).unwrap();
        let debug = format!("{mnemonic:?}");
        assert!(!debug.contains("abandon"));
        assert!(debug.contains("12 words"));
    }

    #[test]
    fn is_valid_word_checks_list() {
        assert!(is_valid_word("abandon"));
        assert!(is_valid_word("zoo"));
        assert!(!is_valid_word("notaword"));
        assert!(!is_valid_word(""));
    }
}
