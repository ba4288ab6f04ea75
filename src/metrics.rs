//! Minimal metrics scaffolding.
//! Counters only for now; an exposition endpoint can read `snapshot()` later.
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};

static CREDITS_APPLIED: AtomicU64 = AtomicU64::new(0);
static DEBITS_APPLIED: AtomicU64 = AtomicU64::new(0);
static OPERATIONS_DECLINED: AtomicU64 = AtomicU64::new(0);
static TRANSFERS_APPLIED: AtomicU64 = AtomicU64::new(0);
static REBIRTHS_PERFORMED: AtomicU64 = AtomicU64::new(0);
static RANK_ADVANCES: AtomicU64 = AtomicU64::new(0);
static ACCOUNTS_CREATED: AtomicU64 = AtomicU64::new(0);
static INTEGRITY_FAILURES: AtomicU64 = AtomicU64::new(0);

static TX_COUNTERS: OnceLock<Mutex<HashMap<String, TxCounter>>> = OnceLock::new();

pub fn inc_credits_applied() {
    CREDITS_APPLIED.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_debits_applied() {
    DEBITS_APPLIED.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_operations_declined() {
    OPERATIONS_DECLINED.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_transfers_applied() {
    TRANSFERS_APPLIED.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_rebirths_performed() {
    REBIRTHS_PERFORMED.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_rank_advances() {
    RANK_ADVANCES.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_accounts_created() {
    ACCOUNTS_CREATED.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_integrity_failures() {
    INTEGRITY_FAILURES.fetch_add(1, Ordering::Relaxed);
}

/// Per-transaction-kind tally, keyed by the kind's display name.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TxCounter {
    pub applied: u64,
    pub declined: u64,
}

fn tx_counter_lock() -> &'static Mutex<HashMap<String, TxCounter>> {
    TX_COUNTERS.get_or_init(|| Mutex::new(HashMap::new()))
}

pub fn record_transaction(kind: &str, applied: bool) -> TxCounter {
    let mut guard = tx_counter_lock().lock().expect("tx counter mutex poisoned");
    let counter = guard.entry(kind.to_string()).or_default();
    if applied {
        counter.applied = counter.applied.saturating_add(1);
    } else {
        counter.declined = counter.declined.saturating_add(1);
    }
    *counter
}

pub fn tx_counters_snapshot() -> HashMap<String, TxCounter> {
    tx_counter_lock()
        .lock()
        .expect("tx counter mutex poisoned")
        .clone()
}

#[cfg(test)]
pub(crate) fn reset_tx_counters_for_tests() {
    if let Some(lock) = TX_COUNTERS.get() {
        let mut guard = lock.lock().expect("tx counter mutex poisoned");
        guard.clear();
    }
}

#[derive(Debug, Default, Clone)]
pub struct Snapshot {
    pub credits_applied: u64,
    pub debits_applied: u64,
    pub operations_declined: u64,
    pub transfers_applied: u64,
    pub rebirths_performed: u64,
    pub rank_advances: u64,
    pub accounts_created: u64,
    pub integrity_failures: u64,
}

pub fn snapshot() -> Snapshot {
    Snapshot {
        credits_applied: CREDITS_APPLIED.load(Ordering::Relaxed),
        debits_applied: DEBITS_APPLIED.load(Ordering::Relaxed),
        operations_declined: OPERATIONS_DECLINED.load(Ordering::Relaxed),
        transfers_applied: TRANSFERS_APPLIED.load(Ordering::Relaxed),
        rebirths_performed: REBIRTHS_PERFORMED.load(Ordering::Relaxed),
        rank_advances: RANK_ADVANCES.load(Ordering::Relaxed),
        accounts_created: ACCOUNTS_CREATED.load(Ordering::Relaxed),
        integrity_failures: INTEGRITY_FAILURES.load(Ordering::Relaxed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transaction_tallies_split_applied_and_declined() {
        reset_tx_counters_for_tests();
        assert!(tx_counters_snapshot().is_empty());

        let stats = record_transaction("Player Payment", true);
        assert_eq!(stats.applied, 1);
        assert_eq!(stats.declined, 0);

        let stats = record_transaction("Player Payment", false);
        assert_eq!(stats.applied, 1);
        assert_eq!(stats.declined, 1);

        let snapshot = tx_counters_snapshot();
        let payment = snapshot.get("Player Payment").expect("payment counter");
        assert_eq!(payment.applied, 1);
        assert_eq!(payment.declined, 1);
    }

    #[test]
    fn global_counters_are_monotonic() {
        let before = snapshot();
        inc_credits_applied();
        inc_transfers_applied();
        let after = snapshot();
        // Other tests may bump these concurrently, so only assert growth.
        assert!(after.credits_applied > before.credits_applied);
        assert!(after.transfers_applied > before.transfers_applied);
    }
}
