//! Transfer semantics through the account registry: conservation, declines,
//! and lock ordering under opposite-direction concurrent traffic.

use std::sync::Arc;
use std::thread;

use tempfile::TempDir;
use uuid::Uuid;

use granary::economy::{
    transfer, AccountRegistry, DeclineReason, EconomyStoreBuilder, Ledger, RankLadder,
    RebirthRules, TransactionKind, SYSTEM_ACCOUNT,
};

fn open_registry(dir: &TempDir) -> AccountRegistry {
    let store = EconomyStoreBuilder::new(dir.path())
        .open()
        .expect("open store");
    AccountRegistry::new(store, RankLadder::default(), RebirthRules::default(), 0.0)
}

#[test]
fn transfer_moves_funds_and_conserves_total() {
    let dir = TempDir::new().unwrap();
    let registry = open_registry(&dir);
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();

    registry
        .credit(a, "Alfalfa", 50.0, TransactionKind::AdminGrant, "seed")
        .unwrap();

    let receipt = registry
        .transfer(a, "Alfalfa", b, "Barley", 30.0)
        .unwrap()
        .applied()
        .expect("transfer should apply");
    assert_eq!(receipt.from_balance, 20.0);
    assert_eq!(receipt.to_balance, 30.0);

    let a_view = registry.overview(a).unwrap();
    let b_view = registry.overview(b).unwrap();
    assert_eq!(a_view.balance + b_view.balance, 50.0);

    // Both sides record a PlayerTransfer naming the other account
    let a_tx = registry.recent_transactions(a, "Alfalfa", 1).unwrap();
    let b_tx = registry.recent_transactions(b, "Barley", 1).unwrap();
    assert_eq!(a_tx[0].kind, TransactionKind::PlayerTransfer);
    assert_eq!(a_tx[0].amount, -30.0);
    assert_eq!(a_tx[0].counterparty_id, b);
    assert_eq!(a_tx[0].note, "Payment to Barley");
    assert_eq!(b_tx[0].kind, TransactionKind::PlayerTransfer);
    assert_eq!(b_tx[0].amount, 30.0);
    assert_eq!(b_tx[0].counterparty_id, a);
    assert_eq!(b_tx[0].note, "Payment from Alfalfa");
}

#[test]
fn self_transfer_always_declined() {
    let dir = TempDir::new().unwrap();
    let registry = open_registry(&dir);
    let a = Uuid::new_v4();

    registry
        .credit(a, "Alfalfa", 500.0, TransactionKind::AdminGrant, "seed")
        .unwrap();

    let outcome = registry.transfer(a, "Alfalfa", a, "Alfalfa", 10.0).unwrap();
    assert_eq!(outcome.declined(), Some(DeclineReason::SelfTransfer));

    let history = registry.recent_transactions(a, "Alfalfa", 10).unwrap();
    assert_eq!(history.len(), 1, "only the seed credit should exist");
}

#[test]
fn insufficient_funds_leaves_both_untouched() {
    let dir = TempDir::new().unwrap();
    let registry = open_registry(&dir);
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();

    registry
        .credit(a, "Alfalfa", 10.0, TransactionKind::AdminGrant, "seed")
        .unwrap();

    let outcome = registry.transfer(a, "Alfalfa", b, "Barley", 25.0).unwrap();
    assert_eq!(
        outcome.declined(),
        Some(DeclineReason::InsufficientFunds {
            required: 25.0,
            available: 10.0
        })
    );
    assert_eq!(registry.overview(a).unwrap().balance, 10.0);
    assert_eq!(registry.overview(b).unwrap().balance, 0.0);
    assert_eq!(registry.recent_transactions(b, "Barley", 10).unwrap().len(), 0);
}

#[test]
fn ledger_level_transfer_pairs_entries() {
    let mut from = Ledger::new(Uuid::from_u128(1));
    let mut to = Ledger::new(Uuid::from_u128(2));
    from.credit(50.0, SYSTEM_ACCOUNT, TransactionKind::AdminGrant, "seed")
        .unwrap();

    let receipt = transfer(&mut from, &mut to, 30.0, "to B", "from A")
        .unwrap()
        .applied()
        .expect("transfer should apply");
    assert_eq!(receipt.amount, 30.0);
    assert_eq!(from.balance(), 20.0);
    assert_eq!(to.balance(), 30.0);

    from.verify().unwrap();
    to.verify().unwrap();
}

#[test]
fn opposite_direction_storm_finishes_and_conserves() {
    let dir = TempDir::new().unwrap();
    let registry = Arc::new(open_registry(&dir));
    let a = Uuid::from_u128(10);
    let b = Uuid::from_u128(20);

    registry
        .credit(a, "Alfalfa", 500.0, TransactionKind::AdminGrant, "seed")
        .unwrap();
    registry
        .credit(b, "Barley", 500.0, TransactionKind::AdminGrant, "seed")
        .unwrap();

    // A hung pair of threads here means lock ordering regressed.
    let forward = {
        let registry = registry.clone();
        thread::spawn(move || {
            for _ in 0..200 {
                let _ = registry.transfer(a, "Alfalfa", b, "Barley", 3.0).unwrap();
            }
        })
    };
    let backward = {
        let registry = registry.clone();
        thread::spawn(move || {
            for _ in 0..200 {
                let _ = registry.transfer(b, "Barley", a, "Alfalfa", 5.0).unwrap();
            }
        })
    };
    forward.join().unwrap();
    backward.join().unwrap();

    let a_balance = registry.overview(a).unwrap().balance;
    let b_balance = registry.overview(b).unwrap().balance;
    assert_eq!(a_balance + b_balance, 1000.0);

    registry.save_all().unwrap();
    assert_eq!(registry.verify_all().unwrap(), 2);
}
