//! Balance and append-only transaction history for one account.
//!
//! Every balance mutation flows through this module so the audit invariant
//! holds: replaying the history's signed amounts from zero always
//! reconstructs the current balance, and each entry's `balance_after`
//! matches the running sum at that point.
//!
//! Business refusals (insufficient funds) come back as
//! [`Outcome::Declined`]; a non-positive amount is a caller bug and fails
//! fast with [`EconomyError::InvalidAmount`].

use log::{debug, error};
use uuid::Uuid;

use crate::economy::errors::EconomyError;
use crate::economy::types::{DeclineReason, Outcome, TransactionKind, TransactionRecord};

/// Tolerance for replay comparisons. Balances are f64 and `set_balance`
/// introduces one subtraction per entry, so replay is equal only to within
/// rounding.
pub const REPLAY_EPSILON: f64 = 1e-6;

/// One account's balance plus its full transaction history, with a watermark
/// tracking how much of the history has already been persisted.
#[derive(Debug, Clone)]
pub struct Ledger {
    account_id: Uuid,
    balance: f64,
    history: Vec<TransactionRecord>,
    persisted: usize,
}

/// Receipt for a completed transfer between two ledgers.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferReceipt {
    pub amount: f64,
    pub from_balance: f64,
    pub to_balance: f64,
}

impl Ledger {
    /// Empty ledger for a freshly created account.
    pub fn new(account_id: Uuid) -> Self {
        Self {
            account_id,
            balance: 0.0,
            history: Vec::new(),
            persisted: 0,
        }
    }

    /// Rehydrate from persisted state. The whole history counts as saved.
    pub fn from_parts(account_id: Uuid, balance: f64, history: Vec<TransactionRecord>) -> Self {
        let persisted = history.len();
        Self {
            account_id,
            balance,
            history,
            persisted,
        }
    }

    pub fn account_id(&self) -> Uuid {
        self.account_id
    }

    pub fn balance(&self) -> f64 {
        self.balance
    }

    pub fn history(&self) -> &[TransactionRecord] {
        &self.history
    }

    /// Add funds. `amount` must be positive and finite. Returns the new
    /// balance.
    pub fn credit(
        &mut self,
        amount: f64,
        counterparty: Uuid,
        kind: TransactionKind,
        note: impl Into<String>,
    ) -> Result<f64, EconomyError> {
        require_positive(amount, "credit")?;
        self.balance += amount;
        self.append(amount, counterparty, kind, note.into());
        debug!(
            "account {} credited {:.2}, balance now {:.2}",
            self.account_id, amount, self.balance
        );
        Ok(self.balance)
    }

    /// Remove funds. `amount` must be positive and finite. An uncovered
    /// amount is declined without touching any state.
    pub fn debit(
        &mut self,
        amount: f64,
        counterparty: Uuid,
        kind: TransactionKind,
        note: impl Into<String>,
    ) -> Result<Outcome<f64>, EconomyError> {
        require_positive(amount, "debit")?;
        if self.balance < amount {
            debug!(
                "account {} debit {:.2} declined, balance {:.2}",
                self.account_id, amount, self.balance
            );
            return Ok(Outcome::Declined(DeclineReason::InsufficientFunds {
                required: amount,
                available: self.balance,
            }));
        }
        self.balance -= amount;
        self.append(-amount, counterparty, kind, note.into());
        debug!(
            "account {} debited {:.2}, balance now {:.2}",
            self.account_id, amount, self.balance
        );
        Ok(Outcome::Applied(self.balance))
    }

    /// Force the balance to an exact non-negative value, recording the delta
    /// as an admin grant or removal. A zero delta still records an audit
    /// entry: admins overwriting a balance with itself leave a trace.
    pub fn set_balance(
        &mut self,
        new_amount: f64,
        counterparty: Uuid,
        note: impl Into<String>,
    ) -> Result<f64, EconomyError> {
        if !new_amount.is_finite() || new_amount < 0.0 {
            return Err(EconomyError::InvalidAmount(format!(
                "set_balance requires a non-negative amount, got {}",
                new_amount
            )));
        }
        let delta = new_amount - self.balance;
        let kind = if delta > 0.0 {
            TransactionKind::AdminGrant
        } else {
            TransactionKind::AdminTake
        };
        self.balance = new_amount;
        self.append(delta, counterparty, kind, note.into());
        debug!(
            "account {} balance set to {:.2} (delta {:+.2})",
            self.account_id, new_amount, delta
        );
        Ok(self.balance)
    }

    /// The most recent `limit` transactions in chronological order: the last
    /// entries of the history, oldest of the returned window first.
    pub fn recent_transactions(&self, limit: usize) -> &[TransactionRecord] {
        let start = self.history.len().saturating_sub(limit);
        &self.history[start..]
    }

    /// Replay the full history and check it against the stored balance.
    /// A mismatch means corruption or an out-of-band write; it is logged
    /// loudly and returned as a fatal error, never repaired.
    pub fn verify(&self) -> Result<(), EconomyError> {
        let mut running = 0.0_f64;
        for tx in &self.history {
            running += tx.amount;
            if (tx.balance_after - running).abs() > REPLAY_EPSILON {
                error!(
                    "ledger integrity violation for {}: transaction {} records balance_after {:.6} but replay gives {:.6}",
                    self.account_id, tx.id, tx.balance_after, running
                );
                return Err(EconomyError::LedgerMismatch {
                    account: self.account_id,
                    replayed: running,
                    stored: tx.balance_after,
                });
            }
        }
        if (running - self.balance).abs() > REPLAY_EPSILON {
            error!(
                "ledger integrity violation for {}: replayed {:.6}, stored balance {:.6}",
                self.account_id, running, self.balance
            );
            return Err(EconomyError::LedgerMismatch {
                account: self.account_id,
                replayed: running,
                stored: self.balance,
            });
        }
        Ok(())
    }

    /// History entries not yet written to the store.
    pub(crate) fn unsaved(&self) -> &[TransactionRecord] {
        &self.history[self.persisted..]
    }

    /// Index of the first unsaved history entry.
    pub(crate) fn persisted_len(&self) -> usize {
        self.persisted
    }

    /// Advance the persistence watermark after a successful store write.
    /// `len` is the history length captured when the snapshot was taken;
    /// entries appended since then stay unsaved.
    pub(crate) fn mark_saved_through(&mut self, len: usize) {
        self.persisted = self.persisted.max(len.min(self.history.len()));
    }

    fn append(&mut self, amount: f64, counterparty: Uuid, kind: TransactionKind, note: String) {
        self.history.push(TransactionRecord::new(
            self.account_id,
            counterparty,
            amount,
            kind,
            note,
            self.balance,
        ));
    }
}

/// Move funds between two distinct accounts. The caller is responsible for
/// rejecting same-account transfers before reaching this point (two `&mut`
/// borrows make it unrepresentable here) and for holding both account locks
/// so the pair of mutations is observed atomically.
pub fn transfer(
    from: &mut Ledger,
    to: &mut Ledger,
    amount: f64,
    from_note: impl Into<String>,
    to_note: impl Into<String>,
) -> Result<Outcome<TransferReceipt>, EconomyError> {
    require_positive(amount, "transfer")?;
    if from.balance < amount {
        debug!(
            "transfer {:.2} from {} declined, balance {:.2}",
            amount, from.account_id, from.balance
        );
        return Ok(Outcome::Declined(DeclineReason::InsufficientFunds {
            required: amount,
            available: from.balance,
        }));
    }
    let from_id = from.account_id;
    let to_id = to.account_id;
    from.balance -= amount;
    from.append(-amount, to_id, TransactionKind::PlayerTransfer, from_note.into());
    to.balance += amount;
    to.append(amount, from_id, TransactionKind::PlayerTransfer, to_note.into());
    debug!(
        "transfer {:.2} from {} to {} complete",
        amount, from_id, to_id
    );
    Ok(Outcome::Applied(TransferReceipt {
        amount,
        from_balance: from.balance,
        to_balance: to.balance,
    }))
}

fn require_positive(amount: f64, op: &str) -> Result<(), EconomyError> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(EconomyError::InvalidAmount(format!(
            "{} requires a positive amount, got {}",
            op, amount
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::economy::types::SYSTEM_ACCOUNT;

    fn ledger() -> Ledger {
        Ledger::new(Uuid::new_v4())
    }

    #[test]
    fn credit_appends_and_updates_balance() {
        let mut l = ledger();
        let balance = l
            .credit(100.0, SYSTEM_ACCOUNT, TransactionKind::AdminGrant, "test")
            .unwrap();
        assert_eq!(balance, 100.0);
        assert_eq!(l.history().len(), 1);
        let tx = &l.history()[0];
        assert_eq!(tx.amount, 100.0);
        assert_eq!(tx.balance_after, 100.0);
        assert_eq!(tx.counterparty_id, SYSTEM_ACCOUNT);
    }

    #[test]
    fn credit_rejects_non_positive_amounts() {
        let mut l = ledger();
        assert!(matches!(
            l.credit(0.0, SYSTEM_ACCOUNT, TransactionKind::AdminGrant, ""),
            Err(EconomyError::InvalidAmount(_))
        ));
        assert!(matches!(
            l.credit(-5.0, SYSTEM_ACCOUNT, TransactionKind::AdminGrant, ""),
            Err(EconomyError::InvalidAmount(_))
        ));
        assert!(matches!(
            l.credit(f64::NAN, SYSTEM_ACCOUNT, TransactionKind::AdminGrant, ""),
            Err(EconomyError::InvalidAmount(_))
        ));
        assert!(l.history().is_empty());
    }

    #[test]
    fn debit_declines_instead_of_overdrawing() {
        let mut l = ledger();
        l.credit(100.0, SYSTEM_ACCOUNT, TransactionKind::AdminGrant, "seed")
            .unwrap();
        let outcome = l
            .debit(150.0, SYSTEM_ACCOUNT, TransactionKind::AdminTake, "too much")
            .unwrap();
        assert_eq!(
            outcome,
            Outcome::Declined(DeclineReason::InsufficientFunds {
                required: 150.0,
                available: 100.0,
            })
        );
        assert_eq!(l.balance(), 100.0);
        assert_eq!(l.history().len(), 1);

        let outcome = l
            .debit(50.0, SYSTEM_ACCOUNT, TransactionKind::AdminTake, "ok")
            .unwrap();
        assert_eq!(outcome, Outcome::Applied(50.0));
        assert_eq!(l.history().len(), 2);
        assert_eq!(l.history()[1].amount, -50.0);
        assert_eq!(l.history()[1].balance_after, 50.0);
    }

    #[test]
    fn set_balance_records_delta_including_zero() {
        let mut l = ledger();
        l.set_balance(200.0, SYSTEM_ACCOUNT, "grant").unwrap();
        assert_eq!(l.history()[0].kind, TransactionKind::AdminGrant);
        assert_eq!(l.history()[0].amount, 200.0);

        l.set_balance(80.0, SYSTEM_ACCOUNT, "take").unwrap();
        assert_eq!(l.history()[1].kind, TransactionKind::AdminTake);
        assert_eq!(l.history()[1].amount, -120.0);

        // Overwriting with the same value still leaves an audit entry.
        l.set_balance(80.0, SYSTEM_ACCOUNT, "noop").unwrap();
        assert_eq!(l.history().len(), 3);
        assert_eq!(l.history()[2].amount, 0.0);
        assert_eq!(l.history()[2].kind, TransactionKind::AdminTake);
        assert_eq!(l.balance(), 80.0);

        assert!(l.set_balance(-1.0, SYSTEM_ACCOUNT, "bad").is_err());
    }

    #[test]
    fn recent_transactions_keeps_chronological_order() {
        let mut l = ledger();
        for i in 1..=5 {
            l.credit(i as f64, SYSTEM_ACCOUNT, TransactionKind::Other, format!("tx {}", i))
                .unwrap();
        }
        let recent = l.recent_transactions(3);
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].amount, 3.0);
        assert_eq!(recent[2].amount, 5.0);

        assert_eq!(l.recent_transactions(99).len(), 5);
        assert!(l.recent_transactions(0).is_empty());
    }

    #[test]
    fn verify_accepts_consistent_history() {
        let mut l = ledger();
        l.credit(100.0, SYSTEM_ACCOUNT, TransactionKind::AdminGrant, "a")
            .unwrap();
        let _ = l
            .debit(30.0, SYSTEM_ACCOUNT, TransactionKind::ShopPurchase, "b")
            .unwrap();
        l.set_balance(500.0, SYSTEM_ACCOUNT, "c").unwrap();
        l.verify().unwrap();
    }

    #[test]
    fn verify_detects_tampering() {
        let mut l = ledger();
        l.credit(100.0, SYSTEM_ACCOUNT, TransactionKind::AdminGrant, "a")
            .unwrap();
        l.balance += 1.0; // out-of-band mutation
        assert!(matches!(
            l.verify(),
            Err(EconomyError::LedgerMismatch { .. })
        ));
    }

    #[test]
    fn transfer_moves_funds_and_crosses_counterparties() {
        let mut a = ledger();
        let mut b = ledger();
        a.credit(50.0, SYSTEM_ACCOUNT, TransactionKind::AdminGrant, "seed")
            .unwrap();

        let outcome = transfer(&mut a, &mut b, 30.0, "to b", "from a").unwrap();
        let receipt = outcome.applied().expect("transfer applied");
        assert_eq!(receipt.from_balance, 20.0);
        assert_eq!(receipt.to_balance, 30.0);

        let a_tx = a.history().last().unwrap();
        let b_tx = b.history().last().unwrap();
        assert_eq!(a_tx.kind, TransactionKind::PlayerTransfer);
        assert_eq!(b_tx.kind, TransactionKind::PlayerTransfer);
        assert_eq!(a_tx.counterparty_id, b.account_id());
        assert_eq!(b_tx.counterparty_id, a.account_id());
        assert_eq!(a_tx.amount, -30.0);
        assert_eq!(b_tx.amount, 30.0);

        a.verify().unwrap();
        b.verify().unwrap();
    }

    #[test]
    fn transfer_declines_when_uncovered() {
        let mut a = ledger();
        let mut b = ledger();
        a.credit(10.0, SYSTEM_ACCOUNT, TransactionKind::AdminGrant, "seed")
            .unwrap();
        let outcome = transfer(&mut a, &mut b, 30.0, "to b", "from a").unwrap();
        assert!(outcome.is_declined());
        assert_eq!(a.balance(), 10.0);
        assert_eq!(b.balance(), 0.0);
        assert_eq!(a.history().len(), 1);
        assert!(b.history().is_empty());
    }

    #[test]
    fn persistence_watermark_tracks_unsaved_suffix() {
        let mut l = ledger();
        l.credit(10.0, SYSTEM_ACCOUNT, TransactionKind::AdminGrant, "a")
            .unwrap();
        l.credit(10.0, SYSTEM_ACCOUNT, TransactionKind::AdminGrant, "b")
            .unwrap();
        assert_eq!(l.unsaved().len(), 2);
        assert_eq!(l.persisted_len(), 0);

        l.mark_saved_through(2);
        assert!(l.unsaved().is_empty());

        l.credit(10.0, SYSTEM_ACCOUNT, TransactionKind::AdminGrant, "c")
            .unwrap();
        assert_eq!(l.unsaved().len(), 1);

        // A stale watermark can never regress.
        l.mark_saved_through(1);
        assert_eq!(l.unsaved().len(), 1);
    }
}
