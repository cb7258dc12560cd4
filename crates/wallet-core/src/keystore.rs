use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use alloy_primitives::Address;
use chain_eth::address::{checksum, lower_hex, parse_address};
use chain_eth::transaction::{sign_transaction, EthTransaction, SignedEthTransaction};
use crypto_utils::{KdfParams, ZeroizingString};
use tracing::{debug, info, warn};

use crate::error::WalletError;
use crate::hd_derivation;
use crate::key_record::EncryptedKeyRecord;
use crate::keys::PrivateKey;
use crate::mnemonic::Mnemonic;
use crate::types::Account;
use crate::web3_keystore;

const RECORD_EXTENSION: &str = "json";

/// Directory of encrypted key records, one file per account.
///
/// Layout: `<root>/<lowercase hex address>.json`. Records are only ever
/// written sealed; plaintext keys exist for the duration of one import or
/// one signature.
#[derive(Debug, Clone)]
pub struct AccountStore {
    root: PathBuf,
    kdf: KdfParams,
}

impl AccountStore {
    /// Opens (creating if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, WalletError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        restrict_dir(&root)?;
        debug!(root = %root.display(), "opened account store");
        Ok(Self {
            root,
            kdf: KdfParams::standard(),
        })
    }

    /// Work factor for records sealed from now on. Existing records keep
    /// the parameters they were written with.
    pub fn with_kdf_params(mut self, kdf: KdfParams) -> Self {
        self.kdf = kdf;
        self
    }

    /// `$HOME/.tokit/keystore`.
    pub fn default_root() -> Result<PathBuf, WalletError> {
        let home = std::env::var_os("HOME")
            .ok_or_else(|| WalletError::Config("HOME is not set".into()))?;
        Ok(PathBuf::from(home).join(".tokit").join("keystore"))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Derives the first account of `mnemonic` and stores it under `password`.
    pub fn import_mnemonic(
        &self,
        mnemonic: &ZeroizingString,
        password: &ZeroizingString,
    ) -> Result<Account, WalletError> {
        let mnemonic = Mnemonic::parse(mnemonic.expose())?;
        let key = hd_derivation::derive_key(&mnemonic, "")?;
        self.persist(&key, password)
    }

    /// Stores a hex private key (optional `0x` prefix) under `password`.
    pub fn import_raw_key(
        &self,
        hex_key: &ZeroizingString,
        password: &ZeroizingString,
    ) -> Result<Account, WalletError> {
        let key = PrivateKey::from_hex(hex_key.expose())?;
        self.persist(&key, password)
    }

    /// Generates a fresh random key and stores it under `password`.
    pub fn create_account(&self, password: &ZeroizingString) -> Result<Account, WalletError> {
        let key = PrivateKey::generate()?;
        self.persist(&key, password)
    }

    /// Every readable record, in directory order.
    pub fn list_accounts(&self) -> Result<Vec<Account>, WalletError> {
        let mut accounts = Vec::new();

        for entry in fs::read_dir(&self.root)? {
            let path = match entry {
                Ok(entry) => entry.path(),
                Err(e) => {
                    warn!(error = %e, "skipping unreadable directory entry");
                    continue;
                }
            };
            let name = file_name(&path);
            if name.starts_with('.') {
                debug!(path = %path.display(), "skipping hidden file in key store");
                continue;
            }
            if name.starts_with(web3_keystore::FILE_PREFIX) {
                warn!(
                    path = %path.display(),
                    "skipping Web3 key file; import it with import_keystore_json"
                );
                continue;
            }
            if path.extension().and_then(|ext| ext.to_str()) != Some(RECORD_EXTENSION) {
                warn!(path = %path.display(), "skipping unrecognised file in key store");
                continue;
            }

            match read_record(&path).and_then(|record| record.address()) {
                Ok(address) if record_file_name(&address) == file_name(&path) => {
                    accounts.push(Account { address, path });
                }
                Ok(address) => {
                    warn!(path = %path.display(), address = %address, "skipping misnamed key record");
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unreadable key record");
                }
            }
        }

        Ok(accounts)
    }

    /// Looks up the account for `address`.
    pub fn find_account(&self, address: &str) -> Result<Account, WalletError> {
        let address = parse_address(address)?;
        let path = self.record_path(&address);
        if !path.is_file() {
            return Err(WalletError::AccountNotFound(checksum(&address)));
        }
        Ok(Account { address, path })
    }

    /// Decrypts `account`, signs `intent` and drops the key before returning.
    ///
    /// `chain_id` must equal the intent's chain id; the signature is only
    /// valid on that chain. Blocks for the whole key derivation; async
    /// callers use [`sign_transaction_async`](Self::sign_transaction_async).
    pub fn sign_transaction(
        &self,
        account: &Account,
        intent: EthTransaction,
        chain_id: u64,
        password: &ZeroizingString,
    ) -> Result<SignedEthTransaction, WalletError> {
        let record = self.signing_record(account, &intent, chain_id)?;
        let signed = open_and_sign(&record, intent, password)?;
        log_signed(account, chain_id, &signed);
        Ok(signed)
    }

    /// [`sign_transaction`](Self::sign_transaction) with the key derivation
    /// and signature on tokio's blocking pool, so the calling runtime thread
    /// stays free (and the future stays cancellable) while scrypt runs.
    pub async fn sign_transaction_async(
        &self,
        account: &Account,
        intent: EthTransaction,
        chain_id: u64,
        password: &ZeroizingString,
    ) -> Result<SignedEthTransaction, WalletError> {
        let record = self.signing_record(account, &intent, chain_id)?;
        let password = ZeroizingString::new(password.expose().to_owned());

        let signed = tokio::task::spawn_blocking(move || open_and_sign(&record, intent, &password))
            .await
            .map_err(|e| WalletError::Signing(format!("signing task failed: {e}")))??;
        log_signed(account, chain_id, &signed);
        Ok(signed)
    }

    /// Imports a Web3 v3 key file (geth's `UTC--…` files), re-sealing the
    /// key under `new_password` with this store's scrypt parameters.
    pub fn import_keystore_json(
        &self,
        json: &str,
        password: &ZeroizingString,
        new_password: &ZeroizingString,
    ) -> Result<Account, WalletError> {
        let key = web3_keystore::decrypt_key_file(json, password.as_bytes())?;
        self.persist(&key, new_password)
    }

    fn signing_record(
        &self,
        account: &Account,
        intent: &EthTransaction,
        chain_id: u64,
    ) -> Result<EncryptedKeyRecord, WalletError> {
        if intent.chain_id != chain_id {
            return Err(WalletError::Signing(format!(
                "transaction targets chain {} but signing was requested for chain {chain_id}",
                intent.chain_id
            )));
        }

        let path = self.record_path(&account.address);
        if !path.is_file() {
            return Err(WalletError::AccountNotFound(checksum(&account.address)));
        }
        read_record(&path)
    }

    fn record_path(&self, address: &Address) -> PathBuf {
        self.root.join(record_file_name(address))
    }

    fn persist(&self, key: &PrivateKey, password: &ZeroizingString) -> Result<Account, WalletError> {
        let address = key.address();
        let path = self.record_path(&address);
        if path.exists() {
            return Err(WalletError::DuplicateAccount(checksum(&address)));
        }

        let record = EncryptedKeyRecord::seal(key, password.as_bytes(), self.kdf)?;
        let json = record.to_json()?;

        let tmp = self.root.join(format!(".{}.tmp", lower_hex(&address)));
        write_private(&tmp, json.as_bytes())?;
        if let Err(e) = fs::rename(&tmp, &path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }

        let account = Account { address, path };
        info!(address = %account, "stored account");
        Ok(account)
    }
}

fn open_and_sign(
    record: &EncryptedKeyRecord,
    intent: EthTransaction,
    password: &ZeroizingString,
) -> Result<SignedEthTransaction, WalletError> {
    let key = record.open(password.as_bytes())?;
    Ok(sign_transaction(intent, key.expose())?)
}

fn log_signed(account: &Account, chain_id: u64, signed: &SignedEthTransaction) {
    debug!(
        address = %account,
        chain_id,
        tx_hash = %signed.tx_hash(),
        "signed transaction"
    );
}

fn record_file_name(address: &Address) -> String {
    format!("{}.{RECORD_EXTENSION}", lower_hex(address))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn read_record(path: &Path) -> Result<EncryptedKeyRecord, WalletError> {
    let json = fs::read_to_string(path)?;
    EncryptedKeyRecord::from_json(&json)
}

/// Creates `path` (failing if it exists) readable only by the owner.
fn write_private(path: &Path, contents: &[u8]) -> Result<(), WalletError> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    let written = file.write_all(contents).and_then(|()| file.sync_all());
    if let Err(e) = written {
        drop(file);
        let _ = fs::remove_file(path);
        return Err(e.into());
    }
    Ok(())
}

#[cfg(unix)]
fn restrict_dir(path: &Path) -> Result<(), WalletError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o700))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_dir(_path: &Path) -> Result<(), WalletError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{address, U256};
    use chain_eth::transaction::{build_transfer, GasSettings};
    use std::sync::{Arc, Mutex};

    use crate::web3_keystore::vectors::{
        PBKDF2_REFERENCE, PBKDF2_REFERENCE_ADDRESS, SCRYPT_LIGHT,
    };

    const TEST_MNEMONIC: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";
    const TEST_ADDRESS: &str = "0x9858EfFD232B4033E47d90003D41EC34EcaEda94";
    const KEY_ONE: &str = "0x0000000000000000000000000000000000000000000000000000000000000001";

    fn secret(s: &str) -> ZeroizingString {
        ZeroizingString::new(s.to_string())
    }

    fn store(dir: &tempfile::TempDir) -> AccountStore {
        AccountStore::open(dir.path().join("keystore"))
            .unwrap()
            .with_kdf_params(KdfParams::light())
    }

    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn with_captured_logs<T>(f: impl FnOnce() -> T) -> (T, String) {
        let buffer = LogBuffer::default();
        let writer = buffer.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let out = tracing::subscriber::with_default(subscriber, f);
        let logs = String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
        (out, logs)
    }

    fn intent(chain_id: u64) -> EthTransaction {
        build_transfer(
            chain_id,
            0,
            address!("000000000000000000000000000000000000dEaD"),
            U256::from(1u64),
            GasSettings {
                max_priority_fee_per_gas: 1,
                max_fee_per_gas: 3,
                gas_limit: 21_000,
            },
        )
    }

    #[test]
    fn import_mnemonic_stores_derived_account() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        let account = store
            .import_mnemonic(&secret(TEST_MNEMONIC), &secret("pw"))
            .unwrap();

        assert_eq!(account.to_string(), TEST_ADDRESS);
        assert_eq!(
            account.path.file_name().unwrap().to_str().unwrap(),
            "9858effd232b4033e47d90003d41ec34ecaeda94.json"
        );
        assert!(account.path.is_file());
    }

    #[test]
    fn record_on_disk_holds_no_secret() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        let account = store.import_raw_key(&secret(KEY_ONE), &secret("pw")).unwrap();

        let contents = fs::read_to_string(&account.path).unwrap();
        assert!(!contents.contains(&KEY_ONE[2..]));
        assert!(contents.contains("scrypt"));
    }

    #[cfg(unix)]
    #[test]
    fn record_and_root_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        let account = store.import_raw_key(&secret(KEY_ONE), &secret("pw")).unwrap();

        let file_mode = fs::metadata(&account.path).unwrap().permissions().mode();
        let dir_mode = fs::metadata(store.root()).unwrap().permissions().mode();
        assert_eq!(file_mode & 0o777, 0o600);
        assert_eq!(dir_mode & 0o777, 0o700);
    }

    #[test]
    fn duplicate_import_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        store.import_raw_key(&secret(KEY_ONE), &secret("pw")).unwrap();
        assert!(matches!(
            store.import_raw_key(&secret(KEY_ONE), &secret("other")),
            Err(WalletError::DuplicateAccount(_))
        ));
    }

    #[test]
    fn invalid_inputs_are_rejected_before_storage() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        assert!(matches!(
            store.import_raw_key(&secret("0x1234"), &secret("pw")),
            Err(WalletError::InvalidKeyFormat(_))
        ));
        assert!(matches!(
            store.import_mnemonic(&secret("not a mnemonic"), &secret("pw")),
            Err(WalletError::InvalidMnemonic(_))
        ));
        assert!(store.list_accounts().unwrap().is_empty());
    }

    #[test]
    fn list_skips_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        store.import_raw_key(&secret(KEY_ONE), &secret("pw")).unwrap();
        store.create_account(&secret("pw")).unwrap();

        fs::write(store.root().join("notes.txt"), "hello").unwrap();
        fs::write(store.root().join("garbage.json"), "{not json").unwrap();
        fs::write(
            store.root().join("UTC--2024-01-01T00-00-00.0Z--7e5f4552"),
            SCRYPT_LIGHT,
        )
        .unwrap();

        let (accounts, logs) = with_captured_logs(|| store.list_accounts().unwrap());
        assert_eq!(accounts.len(), 2);
        assert!(logs.contains("notes.txt"), "{logs}");
        assert!(logs.contains("unrecognised file"), "{logs}");
        assert!(logs.contains("UTC--2024-01-01T00-00-00.0Z--7e5f4552"), "{logs}");
        assert!(logs.contains("import_keystore_json"), "{logs}");
    }

    #[test]
    fn imports_reference_v3_file_under_new_password() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        let account = store
            .import_keystore_json(PBKDF2_REFERENCE, &secret("testpassword"), &secret("new"))
            .unwrap();

        assert_eq!(lower_hex(&account.address), PBKDF2_REFERENCE_ADDRESS);
        assert_eq!(store.list_accounts().unwrap(), vec![account.clone()]);

        let signed = store
            .sign_transaction(&account, intent(1), 1, &secret("new"))
            .unwrap();
        assert_eq!(signed.recover_signer().unwrap(), account.address);
        assert!(matches!(
            store.sign_transaction(&account, intent(1), 1, &secret("testpassword")),
            Err(WalletError::Authentication)
        ));
    }

    #[test]
    fn imports_scrypt_v3_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        let account = store
            .import_keystore_json(SCRYPT_LIGHT, &secret("testpassword"), &secret("pw"))
            .unwrap();
        assert_eq!(account.to_string(), "0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf");

        assert!(matches!(
            store.import_keystore_json(SCRYPT_LIGHT, &secret("testpassword"), &secret("pw")),
            Err(WalletError::DuplicateAccount(_))
        ));
    }

    #[test]
    fn v3_import_with_wrong_password_stores_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        assert!(matches!(
            store.import_keystore_json(SCRYPT_LIGHT, &secret("nope"), &secret("pw")),
            Err(WalletError::Authentication)
        ));
        assert!(store.list_accounts().unwrap().is_empty());
    }

    #[test]
    fn find_account_distinguishes_missing_and_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        let account = store.import_raw_key(&secret(KEY_ONE), &secret("pw")).unwrap();

        let found = store
            .find_account("0x7e5f4552091a69125d5dfcb7b8c2659029395bdf")
            .unwrap();
        assert_eq!(found, account);

        assert!(matches!(
            store.find_account("0x000000000000000000000000000000000000dEaD"),
            Err(WalletError::AccountNotFound(_))
        ));
        assert!(matches!(
            store.find_account("0x1234"),
            Err(WalletError::InvalidAddress(_))
        ));
    }

    #[test]
    fn sign_recovers_to_account() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        let account = store.import_raw_key(&secret(KEY_ONE), &secret("pw")).unwrap();

        let signed = store
            .sign_transaction(&account, intent(1), 1, &secret("pw"))
            .unwrap();
        assert_eq!(signed.recover_signer().unwrap(), account.address);
    }

    #[tokio::test]
    async fn async_sign_recovers_to_account() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        let account = store.import_raw_key(&secret(KEY_ONE), &secret("pw")).unwrap();

        let signed = store
            .sign_transaction_async(&account, intent(1), 1, &secret("pw"))
            .await
            .unwrap();
        assert_eq!(signed.recover_signer().unwrap(), account.address);

        assert!(matches!(
            store
                .sign_transaction_async(&account, intent(1), 1, &secret("wrong"))
                .await,
            Err(WalletError::Authentication)
        ));
        assert!(matches!(
            store
                .sign_transaction_async(&account, intent(1), 8453, &secret("pw"))
                .await,
            Err(WalletError::Signing(_))
        ));
    }

    #[test]
    fn wrong_password_is_authentication_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        let account = store.import_raw_key(&secret(KEY_ONE), &secret("pw")).unwrap();

        let err = store
            .sign_transaction(&account, intent(1), 1, &secret("wrong"))
            .unwrap_err();
        assert!(matches!(err, WalletError::Authentication));
        assert!(!err.to_string().contains("7E5F"));
    }

    #[test]
    fn chain_id_mismatch_is_signing_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        let account = store.import_raw_key(&secret(KEY_ONE), &secret("pw")).unwrap();

        assert!(matches!(
            store.sign_transaction(&account, intent(1), 8453, &secret("pw")),
            Err(WalletError::Signing(_))
        ));
    }

    #[test]
    fn signing_for_deleted_record_is_account_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        let account = store.import_raw_key(&secret(KEY_ONE), &secret("pw")).unwrap();
        fs::remove_file(&account.path).unwrap();

        assert!(matches!(
            store.sign_transaction(&account, intent(1), 1, &secret("pw")),
            Err(WalletError::AccountNotFound(_))
        ));
    }
}
