//! Replay and overdraw properties of the append-only ledger.

use uuid::Uuid;

use granary::economy::{
    DeclineReason, EconomyError, Ledger, TransactionKind, REPLAY_EPSILON, SYSTEM_ACCOUNT,
};

#[test]
fn history_replays_to_the_balance() {
    let mut ledger = Ledger::new(Uuid::new_v4());

    ledger
        .credit(100.0, SYSTEM_ACCOUNT, TransactionKind::VillageEarnings, "harvest")
        .unwrap();
    assert!(ledger
        .debit(40.0, SYSTEM_ACCOUNT, TransactionKind::ShopPurchase, "seeds")
        .unwrap()
        .is_applied());
    ledger
        .credit(15.5, SYSTEM_ACCOUNT, TransactionKind::Other, "found change")
        .unwrap();
    ledger
        .set_balance(60.0, SYSTEM_ACCOUNT, "audit correction")
        .unwrap();

    let mut running = 0.0_f64;
    for tx in ledger.history() {
        running += tx.amount;
        assert!(
            (tx.balance_after - running).abs() <= REPLAY_EPSILON,
            "entry {} drifted from replay",
            tx.id
        );
    }
    assert!((running - ledger.balance()).abs() <= REPLAY_EPSILON);
    ledger.verify().unwrap();
}

#[test]
fn overdraw_scenario_keeps_state() {
    let mut ledger = Ledger::new(Uuid::new_v4());

    let balance = ledger
        .credit(100.0, SYSTEM_ACCOUNT, TransactionKind::AdminGrant, "grant")
        .unwrap();
    assert_eq!(balance, 100.0);
    assert_eq!(ledger.history()[0].balance_after, 100.0);

    // Overdraw declines without touching balance or history
    let outcome = ledger
        .debit(150.0, SYSTEM_ACCOUNT, TransactionKind::ShopPurchase, "plow")
        .unwrap();
    assert_eq!(
        outcome.declined(),
        Some(DeclineReason::InsufficientFunds {
            required: 150.0,
            available: 100.0
        })
    );
    assert_eq!(ledger.balance(), 100.0);
    assert_eq!(ledger.history().len(), 1);

    let outcome = ledger
        .debit(50.0, SYSTEM_ACCOUNT, TransactionKind::ShopPurchase, "plow")
        .unwrap();
    assert_eq!(outcome.applied(), Some(50.0));
    assert_eq!(ledger.balance(), 50.0);
    ledger.verify().unwrap();
}

#[test]
fn non_positive_amounts_fail_fast() {
    let mut ledger = Ledger::new(Uuid::new_v4());

    for bad in [0.0, -5.0, f64::NAN, f64::INFINITY] {
        assert!(matches!(
            ledger.credit(bad, SYSTEM_ACCOUNT, TransactionKind::Other, "bad"),
            Err(EconomyError::InvalidAmount(_))
        ));
        assert!(matches!(
            ledger.debit(bad, SYSTEM_ACCOUNT, TransactionKind::Other, "bad"),
            Err(EconomyError::InvalidAmount(_))
        ));
    }
    assert!(matches!(
        ledger.set_balance(-1.0, SYSTEM_ACCOUNT, "bad"),
        Err(EconomyError::InvalidAmount(_))
    ));
    assert!(ledger.history().is_empty());
    assert_eq!(ledger.balance(), 0.0);
}

#[test]
fn set_balance_records_the_delta() {
    let mut ledger = Ledger::new(Uuid::new_v4());
    ledger
        .credit(100.0, SYSTEM_ACCOUNT, TransactionKind::AdminGrant, "seed")
        .unwrap();
    ledger.set_balance(250.0, SYSTEM_ACCOUNT, "raise").unwrap();
    ledger.set_balance(50.0, SYSTEM_ACCOUNT, "cut").unwrap();

    let history = ledger.history();
    assert_eq!(history[1].amount, 150.0);
    assert_eq!(history[1].kind, TransactionKind::AdminGrant);
    assert_eq!(history[2].amount, -200.0);
    assert_eq!(history[2].kind, TransactionKind::AdminTake);
    assert_eq!(ledger.balance(), 50.0);
    ledger.verify().unwrap();
}

#[test]
fn tampered_history_is_detected() {
    let id = Uuid::new_v4();
    let mut ledger = Ledger::new(id);
    ledger
        .credit(100.0, SYSTEM_ACCOUNT, TransactionKind::AdminGrant, "seed")
        .unwrap();

    // A rewritten entry no longer matches the replay
    let mut history = ledger.history().to_vec();
    history[0].balance_after = 999.0;
    let forged = Ledger::from_parts(id, 100.0, history);
    assert!(matches!(
        forged.verify(),
        Err(EconomyError::LedgerMismatch { .. })
    ));

    // A stored balance that drifted from the log is equally fatal
    let drifted = Ledger::from_parts(id, 250.0, ledger.history().to_vec());
    assert!(matches!(
        drifted.verify(),
        Err(EconomyError::LedgerMismatch { .. })
    ));
}

#[test]
fn recent_transactions_returns_the_tail() {
    let mut ledger = Ledger::new(Uuid::new_v4());
    for i in 1..=5 {
        ledger
            .credit(
                i as f64,
                SYSTEM_ACCOUNT,
                TransactionKind::VillageEarnings,
                format!("day {}", i),
            )
            .unwrap();
    }

    let recent = ledger.recent_transactions(2);
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].amount, 4.0);
    assert_eq!(recent[1].amount, 5.0);

    // Larger than the history returns everything
    assert_eq!(ledger.recent_transactions(50).len(), 5);
}
