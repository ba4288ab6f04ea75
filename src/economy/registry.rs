//! Account registry: the in-memory working set over the sled store.
//!
//! The map is guarded by an `RwLock`; each account sits behind its own
//! `Mutex` covering balance, progression, and rebirth state together, so an
//! operation sees one consistent account. Two-account operations (transfers,
//! blessings) always lock in ascending id order. No disk I/O happens while
//! an account lock is held except on first creation, where the account is
//! not yet shared.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Duration, Utc};
use log::{debug, info};
use uuid::Uuid;

use crate::economy::errors::EconomyError;
use crate::economy::ledger::{self, Ledger, TransferReceipt};
use crate::economy::progression::{ExperienceGain, Progression, Rank, RankLadder};
use crate::economy::rebirth::{self, BlessReceipt, RebirthReceipt, RebirthRules, RebirthState};
use crate::economy::storage::EconomyStore;
use crate::economy::types::{
    AccountRecord, DeclineReason, Outcome, TransactionKind, TransactionRecord,
    ACCOUNT_SCHEMA_VERSION, SYSTEM_ACCOUNT,
};
use crate::metrics;
use crate::validation::{self, sanitize_note, validate_display_name, NameRules};

type AccountMap = HashMap<Uuid, Arc<Mutex<Account>>>;

/// One player's full economic state, held behind a per-account mutex.
#[derive(Debug)]
pub struct Account {
    pub id: Uuid,
    pub display_name: String,
    pub ledger: Ledger,
    pub progression: Progression,
    pub rebirth: RebirthState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    fn from_parts(record: AccountRecord, history: Vec<TransactionRecord>) -> Self {
        Self {
            id: record.id,
            display_name: record.display_name,
            ledger: Ledger::from_parts(record.id, record.balance, history),
            progression: Progression::from_parts(record.rank, record.experience),
            rebirth: RebirthState {
                level: record.rebirth_level,
                last_rebirth_at: record.last_rebirth_at,
                aura_enabled: record.aura_enabled,
                blessing_expires_at: record.blessing_expires_at,
                exp_boost: record.exp_boost,
                last_bless_given_at: record.last_bless_given_at,
                trade_count: record.trade_count,
            },
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }

    fn to_record(&self) -> AccountRecord {
        AccountRecord {
            schema_version: ACCOUNT_SCHEMA_VERSION,
            id: self.id,
            display_name: self.display_name.clone(),
            balance: self.ledger.balance(),
            rank: self.progression.rank,
            experience: self.progression.experience,
            rebirth_level: self.rebirth.level,
            last_rebirth_at: self.rebirth.last_rebirth_at,
            aura_enabled: self.rebirth.aura_enabled,
            blessing_expires_at: self.rebirth.blessing_expires_at,
            exp_boost: self.rebirth.exp_boost,
            last_bless_given_at: self.rebirth.last_bless_given_at,
            trade_count: self.rebirth.trade_count,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Read-only snapshot of an account for status displays.
#[derive(Debug, Clone)]
pub struct AccountOverview {
    pub id: Uuid,
    pub display_name: String,
    pub balance: f64,
    pub rank: Rank,
    pub experience: u64,
    pub progress_percentage: f64,
    pub transactions: usize,
    pub rebirth_level: u32,
    pub tier_name: Option<String>,
    pub total_bonus: f64,
    pub blessing_active: bool,
    pub exp_boost_multiplier: Option<f64>,
    pub aura_enabled: bool,
    pub trade_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One row of a leaderboard.
#[derive(Debug, Clone, PartialEq)]
pub struct LeaderboardEntry {
    pub id: Uuid,
    pub display_name: String,
    pub balance: f64,
    pub rank: Rank,
    pub rebirth_level: u32,
}

/// The registry owns the store and hands out per-account handles. There is
/// exactly one registry per server; it is constructed explicitly and shared
/// behind an `Arc`.
pub struct AccountRegistry {
    store: EconomyStore,
    accounts: RwLock<AccountMap>,
    ladder: RankLadder,
    rules: RebirthRules,
    starting_balance: f64,
    note_limit: usize,
}

impl AccountRegistry {
    pub fn new(
        store: EconomyStore,
        ladder: RankLadder,
        rules: RebirthRules,
        starting_balance: f64,
    ) -> Self {
        Self {
            store,
            accounts: RwLock::new(HashMap::new()),
            ladder,
            rules,
            starting_balance,
            note_limit: validation::DEFAULT_NOTE_MAX_BYTES,
        }
    }

    /// Override the byte limit applied to caller-supplied transaction notes.
    pub fn with_note_limit(mut self, max_bytes: usize) -> Self {
        self.note_limit = max_bytes;
        self
    }

    pub fn ladder(&self) -> &RankLadder {
        &self.ladder
    }

    pub fn rules(&self) -> &RebirthRules {
        &self.rules
    }

    pub fn store(&self) -> &EconomyStore {
        &self.store
    }

    /// Number of accounts currently resident in memory.
    pub fn loaded_count(&self) -> Result<usize, EconomyError> {
        Ok(self.read_accounts()?.len())
    }

    fn read_accounts(&self) -> Result<RwLockReadGuard<'_, AccountMap>, EconomyError> {
        self.accounts
            .read()
            .map_err(|_| EconomyError::Internal("account map lock poisoned".to_string()))
    }

    fn write_accounts(&self) -> Result<RwLockWriteGuard<'_, AccountMap>, EconomyError> {
        self.accounts
            .write()
            .map_err(|_| EconomyError::Internal("account map lock poisoned".to_string()))
    }

    fn lock_account(account: &Arc<Mutex<Account>>) -> Result<MutexGuard<'_, Account>, EconomyError> {
        account
            .lock()
            .map_err(|_| EconomyError::Internal("account lock poisoned".to_string()))
    }

    /// Fetch an account, loading it from disk or creating it on first
    /// sight. Creation is atomic under the map's write lock: concurrent
    /// callers converge on a single entry, and new accounts are persisted
    /// before they become visible.
    pub fn get_or_create(
        &self,
        id: Uuid,
        display_name: &str,
    ) -> Result<Arc<Mutex<Account>>, EconomyError> {
        if let Some(account) = self.read_accounts()?.get(&id).cloned() {
            return Ok(account);
        }
        let mut map = self.write_accounts()?;
        if let Some(account) = map.get(&id) {
            return Ok(account.clone());
        }
        let account = match self.store.get_account(id) {
            Ok(record) => self.load_verified(record)?,
            Err(EconomyError::NotFound(_)) => self.create_account(id, display_name)?,
            Err(err) => return Err(err),
        };
        let account = Arc::new(Mutex::new(account));
        map.insert(id, account.clone());
        Ok(account)
    }

    /// Fetch an existing account without creating one.
    pub fn lookup(&self, id: Uuid) -> Result<Arc<Mutex<Account>>, EconomyError> {
        if let Some(account) = self.read_accounts()?.get(&id).cloned() {
            return Ok(account);
        }
        let mut map = self.write_accounts()?;
        if let Some(account) = map.get(&id) {
            return Ok(account.clone());
        }
        let record = self.store.get_account(id)?;
        let account = Arc::new(Mutex::new(self.load_verified(record)?));
        map.insert(id, account.clone());
        Ok(account)
    }

    fn load_verified(&self, record: AccountRecord) -> Result<Account, EconomyError> {
        let history = self.store.transactions_for(record.id, None)?;
        let account = Account::from_parts(record, history);
        if let Err(err) = account.ledger.verify() {
            metrics::inc_integrity_failures();
            return Err(err);
        }
        Ok(account)
    }

    fn create_account(&self, id: Uuid, display_name: &str) -> Result<Account, EconomyError> {
        let name = validate_display_name(display_name, &NameRules::player())?;
        let now = Utc::now();
        let mut account = Account {
            id,
            display_name: name,
            ledger: Ledger::new(id),
            progression: Progression::new(),
            rebirth: RebirthState::new(),
            created_at: now,
            updated_at: now,
        };
        if self.starting_balance > 0.0 {
            // Recorded as a transaction so the log replays to the balance.
            account.ledger.credit(
                self.starting_balance,
                SYSTEM_ACCOUNT,
                TransactionKind::AdminGrant,
                "starting balance",
            )?;
        }
        self.persist(&mut account)?;
        metrics::inc_accounts_created();
        info!("created account {} for {}", id, account.display_name);
        Ok(account)
    }

    fn persist(&self, account: &mut Account) -> Result<(), EconomyError> {
        let base = account.ledger.persisted_len() as u64;
        let unsaved = account.ledger.unsaved().to_vec();
        if !unsaved.is_empty() {
            self.store.append_transactions(base, &unsaved)?;
        }
        self.store.put_account(account.to_record())?;
        let total = account.ledger.history().len();
        account.ledger.mark_saved_through(total);
        account.updated_at = Utc::now();
        Ok(())
    }

    fn with_account<T>(
        &self,
        id: Uuid,
        display_name: &str,
        f: impl FnOnce(&mut Account) -> Result<T, EconomyError>,
    ) -> Result<T, EconomyError> {
        let account = self.get_or_create(id, display_name)?;
        let mut guard = Self::lock_account(&account)?;
        f(&mut guard)
    }

    /// Load every persisted account into memory, verifying each transaction
    /// log against its stored balance. Accounts already resident are left
    /// untouched. A single integrity failure aborts the load.
    pub fn load_all(&self) -> Result<usize, EconomyError> {
        let records = self.store.all_accounts()?;
        let mut map = self.write_accounts()?;
        let mut loaded = 0usize;
        for record in records {
            if map.contains_key(&record.id) {
                continue;
            }
            let id = record.id;
            let account = self.load_verified(record)?;
            map.insert(id, Arc::new(Mutex::new(account)));
            loaded += 1;
        }
        info!("loaded {} accounts from disk", loaded);
        Ok(loaded)
    }

    /// Persist every resident account. State is snapshotted under a brief
    /// per-account lock and written to disk with no lock held, so gameplay
    /// is never blocked on I/O.
    pub fn save_all(&self) -> Result<usize, EconomyError> {
        let resident: Vec<Arc<Mutex<Account>>> = self.read_accounts()?.values().cloned().collect();
        let mut saved = 0usize;
        for account in resident {
            let (record, unsaved, base, total) = {
                let guard = Self::lock_account(&account)?;
                (
                    guard.to_record(),
                    guard.ledger.unsaved().to_vec(),
                    guard.ledger.persisted_len() as u64,
                    guard.ledger.history().len(),
                )
            };
            if !unsaved.is_empty() {
                self.store.append_transactions(base, &unsaved)?;
            }
            self.store.put_account(record)?;
            Self::lock_account(&account)?.ledger.mark_saved_through(total);
            saved += 1;
        }
        self.store.flush()?;
        debug!("saved {} accounts", saved);
        Ok(saved)
    }

    /// Replay every persisted transaction log against its stored balance
    /// without touching resident state. Returns the number of clean
    /// accounts; the first mismatch aborts with the integrity error.
    pub fn verify_all(&self) -> Result<usize, EconomyError> {
        let records = self.store.all_accounts()?;
        let mut checked = 0usize;
        for record in records {
            let history = self.store.transactions_for(record.id, None)?;
            let ledger = Ledger::from_parts(record.id, record.balance, history);
            if let Err(err) = ledger.verify() {
                metrics::inc_integrity_failures();
                return Err(err);
            }
            checked += 1;
        }
        Ok(checked)
    }

    /// Add funds to an account. Returns the new balance.
    pub fn credit(
        &self,
        id: Uuid,
        display_name: &str,
        amount: f64,
        kind: TransactionKind,
        note: impl Into<String>,
    ) -> Result<f64, EconomyError> {
        let note = sanitize_note(&note.into(), self.note_limit);
        self.with_account(id, display_name, |account| {
            let balance = account.ledger.credit(amount, SYSTEM_ACCOUNT, kind, note)?;
            metrics::inc_credits_applied();
            metrics::record_transaction(kind.display_name(), true);
            Ok(balance)
        })
    }

    /// Remove funds from an account. Declines when the balance is short.
    pub fn debit(
        &self,
        id: Uuid,
        display_name: &str,
        amount: f64,
        kind: TransactionKind,
        note: impl Into<String>,
    ) -> Result<Outcome<f64>, EconomyError> {
        let note = sanitize_note(&note.into(), self.note_limit);
        self.with_account(id, display_name, |account| {
            let outcome = account.ledger.debit(amount, SYSTEM_ACCOUNT, kind, note)?;
            match &outcome {
                Outcome::Applied(_) => {
                    metrics::inc_debits_applied();
                    metrics::record_transaction(kind.display_name(), true);
                }
                Outcome::Declined(_) => {
                    metrics::inc_operations_declined();
                    metrics::record_transaction(kind.display_name(), false);
                }
            }
            Ok(outcome)
        })
    }

    /// Force a balance to an exact value, recording the delta as an admin
    /// adjustment. Returns the new balance.
    pub fn set_balance(
        &self,
        id: Uuid,
        display_name: &str,
        amount: f64,
        note: impl Into<String>,
    ) -> Result<f64, EconomyError> {
        let note = sanitize_note(&note.into(), self.note_limit);
        self.with_account(id, display_name, |account| {
            let before = account.ledger.balance();
            let balance = account.ledger.set_balance(amount, SYSTEM_ACCOUNT, note)?;
            let kind = if balance > before {
                TransactionKind::AdminGrant
            } else {
                TransactionKind::AdminTake
            };
            metrics::record_transaction(kind.display_name(), true);
            Ok(balance)
        })
    }

    /// Move funds between two players. Self-transfers are declined before
    /// any account is touched; otherwise both accounts are locked in
    /// ascending id order and the two ledger entries land together.
    pub fn transfer(
        &self,
        from: Uuid,
        from_name: &str,
        to: Uuid,
        to_name: &str,
        amount: f64,
    ) -> Result<Outcome<TransferReceipt>, EconomyError> {
        if from == to {
            metrics::inc_operations_declined();
            return Ok(Outcome::Declined(DeclineReason::SelfTransfer));
        }
        let from_arc = self.get_or_create(from, from_name)?;
        let to_arc = self.get_or_create(to, to_name)?;
        let (first, second) = if from < to {
            (&from_arc, &to_arc)
        } else {
            (&to_arc, &from_arc)
        };
        let mut first_guard = Self::lock_account(first)?;
        let mut second_guard = Self::lock_account(second)?;
        let (from_account, to_account) = if from < to {
            (&mut *first_guard, &mut *second_guard)
        } else {
            (&mut *second_guard, &mut *first_guard)
        };

        let from_note = format!("Payment to {}", to_account.display_name);
        let to_note = format!("Payment from {}", from_account.display_name);
        let outcome = ledger::transfer(
            &mut from_account.ledger,
            &mut to_account.ledger,
            amount,
            from_note,
            to_note,
        )?;
        match &outcome {
            Outcome::Applied(receipt) => {
                metrics::inc_transfers_applied();
                metrics::record_transaction(TransactionKind::PlayerTransfer.display_name(), true);
                debug!(
                    "{} paid {} {:.0} (balances {:.0}/{:.0})",
                    from_account.display_name,
                    to_account.display_name,
                    amount,
                    receipt.from_balance,
                    receipt.to_balance
                );
            }
            Outcome::Declined(_) => {
                metrics::inc_operations_declined();
                metrics::record_transaction(TransactionKind::PlayerTransfer.display_name(), false);
            }
        }
        Ok(outcome)
    }

    /// Grant experience with the account's current rebirth bonus applied.
    pub fn add_experience(
        &self,
        id: Uuid,
        display_name: &str,
        amount: u64,
    ) -> Result<ExperienceGain, EconomyError> {
        self.with_account(id, display_name, |account| {
            let bonus = account.rebirth.total_bonus(&self.rules, Utc::now());
            let gain = account.progression.add_experience(amount, bonus, &self.ladder);
            if let Some(rank) = gain.advanced_to {
                metrics::inc_rank_advances();
                info!(
                    "{} advanced to {}",
                    account.display_name,
                    rank.display_name()
                );
            }
            Ok(gain)
        })
    }

    /// Attempt a rebirth for the account.
    pub fn perform_rebirth(
        &self,
        id: Uuid,
        display_name: &str,
    ) -> Result<Outcome<RebirthReceipt>, EconomyError> {
        self.with_account(id, display_name, |account| {
            let outcome = rebirth::perform_rebirth(
                &mut account.ledger,
                &mut account.progression,
                &mut account.rebirth,
                &self.rules,
                Utc::now(),
            )?;
            match &outcome {
                Outcome::Applied(_) => metrics::inc_rebirths_performed(),
                Outcome::Declined(reason) => {
                    metrics::inc_operations_declined();
                    debug!("rebirth declined for {}: {}", account.display_name, reason);
                }
            }
            Ok(outcome)
        })
    }

    /// Report the first unmet rebirth requirement for the account, or
    /// `None` when a rebirth would go through right now. Mutates nothing.
    pub fn rebirth_eligibility(
        &self,
        id: Uuid,
        display_name: &str,
    ) -> Result<Option<DeclineReason>, EconomyError> {
        self.with_account(id, display_name, |account| {
            Ok(rebirth::rebirth_eligibility(
                &account.progression,
                &account.rebirth,
                &self.rules,
                account.ledger.balance(),
                Utc::now(),
            ))
        })
    }

    /// Grant a blessing from one player to another. Blessing yourself is
    /// allowed and takes the single-lock path.
    pub fn bless(
        &self,
        blesser: Uuid,
        blesser_name: &str,
        target: Uuid,
        target_name: &str,
    ) -> Result<Outcome<BlessReceipt>, EconomyError> {
        let now = Utc::now();
        if blesser == target {
            return self.with_account(blesser, blesser_name, |account| {
                if let Some(reason) = rebirth::check_bless_gates(&account.rebirth, &self.rules, now)
                {
                    metrics::inc_operations_declined();
                    return Ok(Outcome::Declined(reason));
                }
                let level = account.rebirth.level;
                let receipt = rebirth::grant_blessing(level, &mut account.rebirth, &self.rules, now);
                account.rebirth.last_bless_given_at = Some(now);
                Ok(Outcome::Applied(receipt))
            });
        }
        let blesser_arc = self.get_or_create(blesser, blesser_name)?;
        let target_arc = self.get_or_create(target, target_name)?;
        let (first, second) = if blesser < target {
            (&blesser_arc, &target_arc)
        } else {
            (&target_arc, &blesser_arc)
        };
        let mut first_guard = Self::lock_account(first)?;
        let mut second_guard = Self::lock_account(second)?;
        let (blesser_account, target_account) = if blesser < target {
            (&mut *first_guard, &mut *second_guard)
        } else {
            (&mut *second_guard, &mut *first_guard)
        };
        let outcome = rebirth::bless(
            &mut blesser_account.rebirth,
            &mut target_account.rebirth,
            &self.rules,
            now,
        )?;
        if outcome.is_declined() {
            metrics::inc_operations_declined();
        } else {
            info!(
                "{} blessed {}",
                blesser_account.display_name, target_account.display_name
            );
        }
        Ok(outcome)
    }

    /// Install a timed experience boost on an account.
    pub fn set_exp_boost(
        &self,
        id: Uuid,
        display_name: &str,
        multiplier: f64,
        duration: Duration,
    ) -> Result<(), EconomyError> {
        self.with_account(id, display_name, |account| {
            account.rebirth.set_exp_boost(multiplier, duration, Utc::now())
        })
    }

    /// Flip the abundance aura for a reborn player. Returns the new state.
    pub fn toggle_aura(&self, id: Uuid, display_name: &str) -> Result<bool, EconomyError> {
        self.with_account(id, display_name, |account| Ok(account.rebirth.toggle_aura()))
    }

    /// Tally one villager trade for the account.
    pub fn record_trade(&self, id: Uuid, display_name: &str) -> Result<u32, EconomyError> {
        self.with_account(id, display_name, |account| Ok(account.rebirth.record_trade()))
    }

    /// The account's most recent transactions, oldest first.
    pub fn recent_transactions(
        &self,
        id: Uuid,
        display_name: &str,
        limit: usize,
    ) -> Result<Vec<TransactionRecord>, EconomyError> {
        self.with_account(id, display_name, |account| {
            Ok(account.ledger.recent_transactions(limit).to_vec())
        })
    }

    /// Snapshot an existing account for display.
    pub fn overview(&self, id: Uuid) -> Result<AccountOverview, EconomyError> {
        let account = self.lookup(id)?;
        let mut guard = Self::lock_account(&account)?;
        let now = Utc::now();
        let tier_name = if guard.rebirth.level > 0 {
            Some(self.rules.tier_for(guard.rebirth.level).name)
        } else {
            None
        };
        let blessing_active = guard.rebirth.has_active_blessing(now);
        let exp_boost_multiplier = guard.rebirth.active_exp_boost(now);
        let total_bonus = guard.rebirth.total_bonus(&self.rules, now);
        Ok(AccountOverview {
            id: guard.id,
            display_name: guard.display_name.clone(),
            balance: guard.ledger.balance(),
            rank: guard.progression.rank,
            experience: guard.progression.experience,
            progress_percentage: guard.progression.progress_percentage(&self.ladder),
            transactions: guard.ledger.history().len(),
            rebirth_level: guard.rebirth.level,
            tier_name,
            total_bonus,
            blessing_active,
            exp_boost_multiplier,
            aura_enabled: guard.rebirth.aura_enabled,
            trade_count: guard.rebirth.trade_count,
            created_at: guard.created_at,
            updated_at: guard.updated_at,
        })
    }

    /// Resolve a display name to an account id, preferring resident state
    /// over disk. Case-insensitive.
    pub fn find_by_name(&self, name: &str) -> Result<Option<Uuid>, EconomyError> {
        let wanted = name.trim().to_lowercase();
        let resident: Vec<Arc<Mutex<Account>>> =
            self.read_accounts()?.values().cloned().collect();
        for account in resident {
            let guard = Self::lock_account(&account)?;
            if guard.display_name.to_lowercase() == wanted {
                return Ok(Some(guard.id));
            }
        }
        let found = self.store.find_account_by_name(name)?.map(|record| record.id);
        if found.is_none() {
            debug!("no account matches name '{}'", crate::logutil::escape_log(name));
        }
        Ok(found)
    }

    /// Change an account's display name. Permissive nickname rules apply.
    pub fn set_display_name(&self, id: Uuid, new_name: &str) -> Result<(), EconomyError> {
        let name = validate_display_name(new_name, &NameRules::display())?;
        let account = self.lookup(id)?;
        let mut guard = Self::lock_account(&account)?;
        guard.display_name = name;
        guard.updated_at = Utc::now();
        Ok(())
    }

    /// Drop expired blessings and boosts across all resident accounts.
    /// Returns how many effects were purged.
    pub fn cleanup_expired_effects(&self) -> Result<usize, EconomyError> {
        let now = Utc::now();
        let resident: Vec<Arc<Mutex<Account>>> =
            self.read_accounts()?.values().cloned().collect();
        let mut purged = 0usize;
        for account in resident {
            purged += Self::lock_account(&account)?.rebirth.cleanup_expired(now);
        }
        if purged > 0 {
            debug!("purged {} expired effects", purged);
        }
        Ok(purged)
    }

    /// Richest accounts first, ids breaking ties so equal balances order
    /// deterministically. Covers persisted accounts, overlaid with any
    /// fresher resident state.
    pub fn top_by_balance(&self, limit: usize) -> Result<Vec<LeaderboardEntry>, EconomyError> {
        let mut entries = self.leaderboard_entries()?;
        entries.sort_by(|a, b| {
            b.balance
                .partial_cmp(&a.balance)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        entries.truncate(limit);
        Ok(entries)
    }

    /// Most-reborn accounts first, balance then id breaking ties.
    pub fn top_by_rebirth(&self, limit: usize) -> Result<Vec<LeaderboardEntry>, EconomyError> {
        let mut entries = self.leaderboard_entries()?;
        entries.sort_by(|a, b| {
            b.rebirth_level
                .cmp(&a.rebirth_level)
                .then_with(|| {
                    b.balance
                        .partial_cmp(&a.balance)
                        .unwrap_or(Ordering::Equal)
                })
                .then_with(|| a.id.cmp(&b.id))
        });
        entries.truncate(limit);
        Ok(entries)
    }

    fn leaderboard_entries(&self) -> Result<Vec<LeaderboardEntry>, EconomyError> {
        let mut by_id: HashMap<Uuid, LeaderboardEntry> = HashMap::new();
        for record in self.store.all_accounts()? {
            by_id.insert(
                record.id,
                LeaderboardEntry {
                    id: record.id,
                    display_name: record.display_name,
                    balance: record.balance,
                    rank: record.rank,
                    rebirth_level: record.rebirth_level,
                },
            );
        }
        let resident: Vec<Arc<Mutex<Account>>> =
            self.read_accounts()?.values().cloned().collect();
        for account in resident {
            let guard = Self::lock_account(&account)?;
            by_id.insert(
                guard.id,
                LeaderboardEntry {
                    id: guard.id,
                    display_name: guard.display_name.clone(),
                    balance: guard.ledger.balance(),
                    rank: guard.progression.rank,
                    rebirth_level: guard.rebirth.level,
                },
            );
        }
        Ok(by_id.into_values().collect())
    }
}
