//! Persistence round trips, tamper detection, and backup archives.

use std::sync::Arc;
use std::thread;

use tempfile::TempDir;
use uuid::Uuid;

use granary::economy::{
    AccountRegistry, BackupType, EconomyError, EconomyStoreBuilder, LedgerBackups, Rank,
    RankLadder, RebirthRules, RetentionPolicy, TransactionKind,
};

fn registry_at(path: &std::path::Path, starting_balance: f64) -> AccountRegistry {
    let store = EconomyStoreBuilder::new(path).open().expect("open store");
    AccountRegistry::new(
        store,
        RankLadder::default(),
        RebirthRules::default(),
        starting_balance,
    )
}

#[test]
fn state_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let a = Uuid::from_u128(1);
    let b = Uuid::from_u128(2);

    {
        let registry = registry_at(dir.path(), 100.0);
        registry
            .credit(a, "Rye", 250.0, TransactionKind::VillageEarnings, "harvest")
            .unwrap();
        assert!(registry
            .debit(a, "Rye", 50.0, TransactionKind::ShopPurchase, "seeds")
            .unwrap()
            .is_applied());
        registry.add_experience(a, "Rye", 5_000).unwrap();
        let _ = registry
            .transfer(a, "Rye", b, "Oat", 100.0)
            .unwrap()
            .applied()
            .expect("transfer should apply");
        registry.save_all().unwrap();
    }

    let registry = registry_at(dir.path(), 100.0);
    assert_eq!(registry.load_all().unwrap(), 2);

    let a_view = registry.overview(a).unwrap();
    assert_eq!(a_view.balance, 200.0);
    assert_eq!(a_view.rank, Rank::Farmer);
    assert_eq!(a_view.experience, 5_000);
    // starting balance, credit, debit, transfer out
    assert_eq!(registry.recent_transactions(a, "Rye", 10).unwrap().len(), 4);

    let b_view = registry.overview(b).unwrap();
    assert_eq!(b_view.balance, 200.0);
    assert_eq!(registry.recent_transactions(b, "Oat", 10).unwrap().len(), 2);

    assert_eq!(registry.verify_all().unwrap(), 2);
}

#[test]
fn repeated_save_does_not_duplicate_history() {
    let dir = TempDir::new().unwrap();
    let id = Uuid::new_v4();

    let registry = registry_at(dir.path(), 0.0);
    registry
        .credit(id, "Rye", 40.0, TransactionKind::VillageEarnings, "harvest")
        .unwrap();
    registry.save_all().unwrap();
    registry.save_all().unwrap();
    assert_eq!(registry.store().count_transactions(id).unwrap(), 1);

    // New activity after a save lands exactly once too
    assert!(registry
        .debit(id, "Rye", 10.0, TransactionKind::ShopPurchase, "seeds")
        .unwrap()
        .is_applied());
    registry.save_all().unwrap();
    registry.save_all().unwrap();
    assert_eq!(registry.store().count_transactions(id).unwrap(), 2);
    assert_eq!(registry.verify_all().unwrap(), 1);
}

#[test]
fn tampered_stored_balance_is_rejected_on_load() {
    let dir = TempDir::new().unwrap();
    let id = Uuid::new_v4();

    {
        let registry = registry_at(dir.path(), 0.0);
        registry
            .credit(id, "Rye", 300.0, TransactionKind::VillageEarnings, "harvest")
            .unwrap();
        registry.save_all().unwrap();
    }

    // Rewrite the stored balance behind the registry's back
    {
        let store = EconomyStoreBuilder::new(dir.path()).open().unwrap();
        let mut record = store.get_account(id).unwrap();
        record.balance = 9_999.0;
        store.put_account(record).unwrap();
    }

    let registry = registry_at(dir.path(), 0.0);
    assert!(matches!(
        registry.load_all(),
        Err(EconomyError::LedgerMismatch { .. })
    ));
    assert!(matches!(
        registry.lookup(id),
        Err(EconomyError::LedgerMismatch { .. })
    ));
}

#[test]
fn concurrent_first_touch_persists_one_account() {
    let dir = TempDir::new().unwrap();
    let registry = Arc::new(registry_at(dir.path(), 100.0));
    let id = Uuid::new_v4();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let registry = registry.clone();
            thread::spawn(move || {
                registry
                    .credit(id, "Rye", 10.0, TransactionKind::VillageEarnings, "harvest")
                    .unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    registry.save_all().unwrap();
    assert_eq!(registry.store().account_count().unwrap(), 1);
    // one starting-balance entry plus eight credits
    assert_eq!(registry.store().count_transactions(id).unwrap(), 9);
    assert_eq!(registry.overview(id).unwrap().balance, 180.0);
    assert_eq!(registry.verify_all().unwrap(), 1);
}

#[test]
fn backup_restore_round_trip() {
    let dir = TempDir::new().unwrap();
    let data_dir = dir.path().join("economy");
    let backup_dir = dir.path().join("backups");
    let restore_dir = dir.path().join("restored");
    let id = Uuid::new_v4();

    {
        let registry = registry_at(&data_dir, 0.0);
        registry
            .credit(id, "Rye", 400.0, TransactionKind::VillageEarnings, "harvest")
            .unwrap();
        registry.save_all().unwrap();
    }

    let mut backups = LedgerBackups::new(
        data_dir.clone(),
        backup_dir.clone(),
        RetentionPolicy::default(),
    )
    .unwrap();
    let metadata = backups
        .create(Some("pre-wipe".to_string()), BackupType::Manual)
        .unwrap();
    assert!(backups.verify(&metadata.id).unwrap());

    backups.restore(&metadata.id, &restore_dir).unwrap();

    // The archive carries the database under a `ledger/` root
    let registry = registry_at(&restore_dir.join("ledger"), 0.0);
    assert_eq!(registry.load_all().unwrap(), 1);
    assert_eq!(registry.overview(id).unwrap().balance, 400.0);
    assert_eq!(registry.verify_all().unwrap(), 1);
}

#[test]
fn backup_metadata_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let data_dir = dir.path().join("economy");
    let backup_dir = dir.path().join("backups");

    {
        let registry = registry_at(&data_dir, 0.0);
        registry.save_all().unwrap();
    }

    let first_id = {
        let mut backups = LedgerBackups::new(
            data_dir.clone(),
            backup_dir.clone(),
            RetentionPolicy::default(),
        )
        .unwrap();
        backups
            .create(Some("nightly".to_string()), BackupType::Automatic)
            .unwrap()
            .id
    };

    let backups =
        LedgerBackups::new(data_dir, backup_dir, RetentionPolicy::default()).unwrap();
    let listed = backups.list();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, first_id);
    assert_eq!(listed[0].backup_type, BackupType::Automatic);
    assert_eq!(listed[0].name.as_deref(), Some("nightly"));
}
