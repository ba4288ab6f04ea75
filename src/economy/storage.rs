use std::path::{Path, PathBuf};

use sled::IVec;
use uuid::Uuid;

use crate::economy::errors::EconomyError;
use crate::economy::types::{
    AccountRecord, TransactionRecord, ACCOUNT_SCHEMA_VERSION, TRANSACTION_SCHEMA_VERSION,
};

const TREE_ACCOUNTS: &str = "granary_accounts";
const TREE_LEDGER: &str = "granary_ledger";

/// Helper builder so tests can easily create throwaway stores with custom paths.
pub struct EconomyStoreBuilder {
    path: PathBuf,
}

impl EconomyStoreBuilder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn open(self) -> Result<EconomyStore, EconomyError> {
        EconomyStore::open(self.path)
    }
}

/// Sled-backed persistence for account records and their transaction logs.
///
/// Account records live under `accounts:{uuid}`. Transaction entries live in
/// a separate tree under `tx:{uuid}:{seq:010}` where `seq` is the entry's
/// index in the account's history, so a prefix scan yields the log in
/// chronological order.
pub struct EconomyStore {
    db: sled::Db,
    accounts: sled::Tree,
    ledger: sled::Tree,
}

impl EconomyStore {
    /// Open (or create) the economy store rooted at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, EconomyError> {
        let path_ref = path.as_ref();
        std::fs::create_dir_all(path_ref)?;
        let db = sled::open(path_ref)?;
        let accounts = db.open_tree(TREE_ACCOUNTS)?;
        let ledger = db.open_tree(TREE_LEDGER)?;
        Ok(Self {
            db,
            accounts,
            ledger,
        })
    }

    fn account_key(id: Uuid) -> Vec<u8> {
        format!("accounts:{}", id).into_bytes()
    }

    fn tx_key(account_id: Uuid, seq: u64) -> Vec<u8> {
        format!("tx:{}:{:010}", account_id, seq).into_bytes()
    }

    fn tx_prefix(account_id: Uuid) -> Vec<u8> {
        format!("tx:{}:", account_id).into_bytes()
    }

    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, EconomyError> {
        Ok(bincode::serialize(value)?)
    }

    fn deserialize<T: serde::de::DeserializeOwned>(bytes: IVec) -> Result<T, EconomyError> {
        Ok(bincode::deserialize::<T>(&bytes)?)
    }

    fn check_account_schema(record: &AccountRecord) -> Result<(), EconomyError> {
        if record.schema_version != ACCOUNT_SCHEMA_VERSION {
            return Err(EconomyError::SchemaMismatch {
                entity: "account",
                expected: ACCOUNT_SCHEMA_VERSION,
                found: record.schema_version,
            });
        }
        Ok(())
    }

    /// Insert or update an account record.
    pub fn put_account(&self, mut record: AccountRecord) -> Result<(), EconomyError> {
        record.schema_version = ACCOUNT_SCHEMA_VERSION;
        record.touch();
        let key = Self::account_key(record.id);
        let bytes = Self::serialize(&record)?;
        self.accounts.insert(key, bytes)?;
        self.accounts.flush()?;
        Ok(())
    }

    /// Fetch an account record by id.
    pub fn get_account(&self, id: Uuid) -> Result<AccountRecord, EconomyError> {
        let key = Self::account_key(id);
        let Some(bytes) = self.accounts.get(&key)? else {
            return Err(EconomyError::NotFound(format!("account: {}", id)));
        };
        let record: AccountRecord = Self::deserialize(bytes)?;
        Self::check_account_schema(&record)?;
        Ok(record)
    }

    /// List all account ids currently stored.
    pub fn list_account_ids(&self) -> Result<Vec<Uuid>, EconomyError> {
        let mut ids = Vec::new();
        for entry in self.accounts.scan_prefix(b"accounts:") {
            let (key, _) = entry?;
            let text = String::from_utf8_lossy(&key);
            if let Some(id) = text.strip_prefix("accounts:") {
                if let Ok(id) = Uuid::parse_str(id) {
                    ids.push(id);
                }
            }
        }
        Ok(ids)
    }

    /// Load every stored account record.
    pub fn all_accounts(&self) -> Result<Vec<AccountRecord>, EconomyError> {
        let mut records = Vec::new();
        for entry in self.accounts.scan_prefix(b"accounts:") {
            let (_, bytes) = entry?;
            let record: AccountRecord = Self::deserialize(bytes)?;
            Self::check_account_schema(&record)?;
            records.push(record);
        }
        Ok(records)
    }

    /// Case-insensitive lookup of an account by display name.
    pub fn find_account_by_name(&self, name: &str) -> Result<Option<AccountRecord>, EconomyError> {
        let wanted = name.trim().to_lowercase();
        for entry in self.accounts.scan_prefix(b"accounts:") {
            let (_, bytes) = entry?;
            let record: AccountRecord = Self::deserialize(bytes)?;
            if record.display_name.to_lowercase() == wanted {
                Self::check_account_schema(&record)?;
                return Ok(Some(record));
            }
        }
        Ok(None)
    }

    /// Append transaction entries starting at `base_seq`. Sequence numbers
    /// are the entries' indices in the account history; callers must pass
    /// the persisted length as the base so keys never collide.
    pub fn append_transactions(
        &self,
        base_seq: u64,
        entries: &[TransactionRecord],
    ) -> Result<(), EconomyError> {
        for (offset, entry) in entries.iter().enumerate() {
            let mut entry = entry.clone();
            entry.schema_version = TRANSACTION_SCHEMA_VERSION;
            let key = Self::tx_key(entry.account_id, base_seq + offset as u64);
            let bytes = Self::serialize(&entry)?;
            self.ledger.insert(key, bytes)?;
        }
        self.ledger.flush()?;
        Ok(())
    }

    /// Load an account's transaction log in chronological order. With a
    /// limit, only the most recent entries are returned (still oldest
    /// first).
    pub fn transactions_for(
        &self,
        account_id: Uuid,
        limit: Option<usize>,
    ) -> Result<Vec<TransactionRecord>, EconomyError> {
        let prefix = Self::tx_prefix(account_id);
        let mut entries = Vec::new();
        match limit {
            None => {
                for entry in self.ledger.scan_prefix(&prefix) {
                    let (_, bytes) = entry?;
                    entries.push(Self::deserialize::<TransactionRecord>(bytes)?);
                }
            }
            Some(n) => {
                for entry in self.ledger.scan_prefix(&prefix).rev().take(n) {
                    let (_, bytes) = entry?;
                    entries.push(Self::deserialize::<TransactionRecord>(bytes)?);
                }
                entries.reverse();
            }
        }
        Ok(entries)
    }

    /// Number of persisted transaction entries for an account.
    pub fn count_transactions(&self, account_id: Uuid) -> Result<usize, EconomyError> {
        let mut count = 0;
        for entry in self.ledger.scan_prefix(Self::tx_prefix(account_id)) {
            entry?;
            count += 1;
        }
        Ok(count)
    }

    /// Number of stored accounts.
    pub fn account_count(&self) -> Result<usize, EconomyError> {
        let mut count = 0;
        for entry in self.accounts.scan_prefix(b"accounts:") {
            entry?;
            count += 1;
        }
        Ok(count)
    }

    /// On-disk footprint of the database files.
    pub fn size_on_disk(&self) -> Result<u64, EconomyError> {
        Ok(self.db.size_on_disk()?)
    }

    pub fn flush(&self) -> Result<(), EconomyError> {
        self.db.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::economy::types::{TransactionKind, SYSTEM_ACCOUNT};
    use tempfile::TempDir;

    fn open_store() -> (TempDir, EconomyStore) {
        let dir = TempDir::new().expect("tempdir");
        let store = EconomyStoreBuilder::new(dir.path())
            .open()
            .expect("open store");
        (dir, store)
    }

    fn sample_tx(account_id: Uuid, amount: f64, balance_after: f64) -> TransactionRecord {
        TransactionRecord::new(
            account_id,
            SYSTEM_ACCOUNT,
            amount,
            TransactionKind::AdminGrant,
            "test",
            balance_after,
        )
    }

    #[test]
    fn account_round_trip() {
        let (_dir, store) = open_store();
        let id = Uuid::new_v4();
        let record = AccountRecord::new(id, "Rye").with_balance(125.0);
        store.put_account(record.clone()).unwrap();

        let loaded = store.get_account(id).unwrap();
        assert_eq!(loaded.id, id);
        assert_eq!(loaded.display_name, "Rye");
        assert_eq!(loaded.balance, 125.0);
    }

    #[test]
    fn missing_account_is_not_found() {
        let (_dir, store) = open_store();
        let err = store.get_account(Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, EconomyError::NotFound(_)));
    }

    #[test]
    fn schema_mismatch_is_rejected_on_read() {
        let (_dir, store) = open_store();
        let id = Uuid::new_v4();
        let mut record = AccountRecord::new(id, "Sprout");
        record.schema_version = 99;
        // Bypass put_account, which would correct the version.
        let bytes = bincode::serialize(&record).unwrap();
        store
            .accounts
            .insert(EconomyStore::account_key(id), bytes)
            .unwrap();

        let err = store.get_account(id).unwrap_err();
        assert!(matches!(
            err,
            EconomyError::SchemaMismatch {
                entity: "account",
                expected: ACCOUNT_SCHEMA_VERSION,
                found: 99,
            }
        ));
    }

    #[test]
    fn transactions_scan_in_sequence_order() {
        let (_dir, store) = open_store();
        let id = Uuid::new_v4();
        let entries: Vec<TransactionRecord> = (0..5)
            .map(|i| sample_tx(id, 10.0, 10.0 * (i + 1) as f64))
            .collect();
        store.append_transactions(0, &entries).unwrap();

        let loaded = store.transactions_for(id, None).unwrap();
        assert_eq!(loaded.len(), 5);
        for (i, tx) in loaded.iter().enumerate() {
            assert_eq!(tx.balance_after, 10.0 * (i + 1) as f64);
        }

        // Limit keeps the most recent entries, oldest first.
        let tail = store.transactions_for(id, Some(2)).unwrap();
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].balance_after, 40.0);
        assert_eq!(tail[1].balance_after, 50.0);

        assert_eq!(store.count_transactions(id).unwrap(), 5);
    }

    #[test]
    fn transaction_logs_are_isolated_per_account() {
        let (_dir, store) = open_store();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        store.append_transactions(0, &[sample_tx(a, 5.0, 5.0)]).unwrap();
        store
            .append_transactions(0, &[sample_tx(b, 7.0, 7.0), sample_tx(b, 7.0, 14.0)])
            .unwrap();

        assert_eq!(store.transactions_for(a, None).unwrap().len(), 1);
        assert_eq!(store.transactions_for(b, None).unwrap().len(), 2);
    }

    #[test]
    fn find_by_name_is_case_insensitive() {
        let (_dir, store) = open_store();
        let id = Uuid::new_v4();
        store
            .put_account(AccountRecord::new(id, "BarleyMow"))
            .unwrap();

        let found = store.find_account_by_name("barleymow").unwrap();
        assert_eq!(found.map(|r| r.id), Some(id));
        assert!(store.find_account_by_name("nobody").unwrap().is_none());
    }

    #[test]
    fn listing_and_counting_accounts() {
        let (_dir, store) = open_store();
        let ids: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
        for (i, id) in ids.iter().enumerate() {
            store
                .put_account(AccountRecord::new(*id, format!("player{}", i)))
                .unwrap();
        }

        let mut listed = store.list_account_ids().unwrap();
        listed.sort();
        let mut expected = ids.clone();
        expected.sort();
        assert_eq!(listed, expected);
        assert_eq!(store.account_count().unwrap(), 3);
        assert_eq!(store.all_accounts().unwrap().len(), 3);
    }

    #[test]
    fn store_survives_reopen() {
        let dir = TempDir::new().expect("tempdir");
        let id = Uuid::new_v4();
        {
            let store = EconomyStoreBuilder::new(dir.path()).open().unwrap();
            store
                .put_account(AccountRecord::new(id, "Hazel").with_balance(42.0))
                .unwrap();
            store
                .append_transactions(0, &[sample_tx(id, 42.0, 42.0)])
                .unwrap();
        }
        let store = EconomyStoreBuilder::new(dir.path()).open().unwrap();
        assert_eq!(store.get_account(id).unwrap().balance, 42.0);
        assert_eq!(store.count_transactions(id).unwrap(), 1);
    }
}
