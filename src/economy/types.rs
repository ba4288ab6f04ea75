//! Core record types for the economy: accounts, transactions, and the
//! outcome/decline vocabulary shared by every balance-affecting operation.
//!
//! Records are persisted with bincode and carry a `schema_version` byte that
//! the storage layer checks on read, mirroring the rest of the data model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::economy::progression::Rank;

/// Bump when `AccountRecord` changes incompatibly.
pub const ACCOUNT_SCHEMA_VERSION: u8 = 1;
/// Bump when `TransactionRecord` changes incompatibly.
pub const TRANSACTION_SCHEMA_VERSION: u8 = 1;

/// Sentinel counterparty id for admin and system-initiated transactions.
pub const SYSTEM_ACCOUNT: Uuid = Uuid::nil();

/// Reason attached to every ledger transaction. Closed set; display names
/// match what players see in their transaction history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    PlayerTransfer,
    ShopPurchase,
    ShopSale,
    RankPurchase,
    AuctionFee,
    AuctionSale,
    AuctionPurchase,
    AdminGrant,
    AdminTake,
    VillageEarnings,
    VillageTax,
    VillagerTrade,
    CollectorEarnings,
    SpecialItemPurchase,
    Other,
}

impl TransactionKind {
    /// Human-readable label used when rendering history entries.
    pub fn display_name(&self) -> &'static str {
        match self {
            TransactionKind::PlayerTransfer => "Player Payment",
            TransactionKind::ShopPurchase => "Shop Purchase",
            TransactionKind::ShopSale => "Shop Sale",
            TransactionKind::RankPurchase => "Rank Purchase",
            TransactionKind::AuctionFee => "Auction Fee",
            TransactionKind::AuctionSale => "Auction Sale",
            TransactionKind::AuctionPurchase => "Auction Purchase",
            TransactionKind::AdminGrant => "Admin Credit Grant",
            TransactionKind::AdminTake => "Admin Credit Removal",
            TransactionKind::VillageEarnings => "Village Earnings",
            TransactionKind::VillageTax => "Village Tax",
            TransactionKind::VillagerTrade => "Villager Trade",
            TransactionKind::CollectorEarnings => "Collector Earnings",
            TransactionKind::SpecialItemPurchase => "Special Item Purchase",
            TransactionKind::Other => "Other Transaction",
        }
    }
}

/// One immutable audit entry. `balance_after` snapshots the account balance
/// immediately after this delta was applied; the replay invariant in the
/// ledger module depends on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    #[serde(default)]
    pub schema_version: u8,
    pub id: Uuid,
    pub account_id: Uuid,
    pub counterparty_id: Uuid,
    pub amount: f64,
    pub kind: TransactionKind,
    pub note: String,
    pub created_at: DateTime<Utc>,
    pub balance_after: f64,
}

impl TransactionRecord {
    pub fn new(
        account_id: Uuid,
        counterparty_id: Uuid,
        amount: f64,
        kind: TransactionKind,
        note: impl Into<String>,
        balance_after: f64,
    ) -> Self {
        Self {
            schema_version: TRANSACTION_SCHEMA_VERSION,
            id: Uuid::new_v4(),
            account_id,
            counterparty_id,
            amount,
            kind,
            note: note.into(),
            created_at: Utc::now(),
            balance_after,
        }
    }
}

/// A timed experience boost. Expired boosts are purged lazily on read.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExpBoost {
    /// Multiplier relative to 1.0 (1.25 means +25% experience).
    pub multiplier: f64,
    pub expires_at: DateTime<Utc>,
}

impl ExpBoost {
    pub fn active_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// Persisted shape of one player account: balance, progression, and rebirth
/// state together. The transaction log is stored separately, keyed by the
/// account id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountRecord {
    #[serde(default)]
    pub schema_version: u8,
    pub id: Uuid,
    pub display_name: String,
    pub balance: f64,
    pub rank: Rank,
    pub experience: u64,
    #[serde(default)]
    pub rebirth_level: u32,
    #[serde(default)]
    pub last_rebirth_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub aura_enabled: bool,
    #[serde(default)]
    pub blessing_expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub exp_boost: Option<ExpBoost>,
    #[serde(default)]
    pub last_bless_given_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub trade_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AccountRecord {
    /// Fresh account with default state: zero balance, Newcomer, no rebirths.
    pub fn new(id: Uuid, display_name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            schema_version: ACCOUNT_SCHEMA_VERSION,
            id,
            display_name: display_name.into(),
            balance: 0.0,
            rank: Rank::Newcomer,
            experience: 0,
            rebirth_level: 0,
            last_rebirth_at: None,
            aura_enabled: false,
            blessing_expires_at: None,
            exp_boost: None,
            last_bless_given_at: None,
            trade_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_balance(mut self, balance: f64) -> Self {
        self.balance = balance;
        self
    }

    pub fn with_rebirth_level(mut self, level: u32) -> Self {
        self.rebirth_level = level;
        self
    }

    /// Refresh the modification timestamp. Called by the storage layer on
    /// every write.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Business-rule refusal. Expected and frequent; carried as a value inside
/// [`Outcome::Declined`], never raised as an error or panic.
#[derive(Debug, Clone, PartialEq)]
pub enum DeclineReason {
    InsufficientFunds { required: f64, available: f64 },
    SelfTransfer,
    CooldownActive { remaining_secs: i64 },
    RankTooLow { required: Rank, current: Rank },
    RebirthCapReached { max: u32 },
    RebirthLevelTooLow { required: u32, current: u32 },
    NotEnoughTrades { required: u32, current: u32 },
}

impl std::fmt::Display for DeclineReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeclineReason::InsufficientFunds {
                required,
                available,
            } => write!(
                f,
                "insufficient funds (required {:.0}, available {:.0})",
                required, available
            ),
            DeclineReason::SelfTransfer => write!(f, "cannot transfer to the same account"),
            DeclineReason::CooldownActive { remaining_secs } => {
                write!(f, "cooldown active ({}s remaining)", remaining_secs)
            }
            DeclineReason::RankTooLow { required, current } => write!(
                f,
                "rank too low (requires {}, currently {})",
                required.display_name(),
                current.display_name()
            ),
            DeclineReason::RebirthCapReached { max } => {
                write!(f, "maximum rebirth level {} reached", max)
            }
            DeclineReason::RebirthLevelTooLow { required, current } => write!(
                f,
                "rebirth level too low (requires {}, currently {})",
                required, current
            ),
            DeclineReason::NotEnoughTrades { required, current } => write!(
                f,
                "not enough trades (requires {}, currently {})",
                required, current
            ),
        }
    }
}

/// Result of a balance- or progression-affecting operation that business
/// rules may refuse. `Applied` carries the operation's receipt; `Declined`
/// carries the reason without any state having changed.
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub enum Outcome<T> {
    Applied(T),
    Declined(DeclineReason),
}

impl<T> Outcome<T> {
    pub fn is_applied(&self) -> bool {
        matches!(self, Outcome::Applied(_))
    }

    pub fn is_declined(&self) -> bool {
        matches!(self, Outcome::Declined(_))
    }

    pub fn applied(self) -> Option<T> {
        match self {
            Outcome::Applied(value) => Some(value),
            Outcome::Declined(_) => None,
        }
    }

    pub fn declined(self) -> Option<DeclineReason> {
        match self {
            Outcome::Applied(_) => None,
            Outcome::Declined(reason) => Some(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_account_starts_with_defaults() {
        let id = Uuid::new_v4();
        let record = AccountRecord::new(id, "Mika");
        assert_eq!(record.id, id);
        assert_eq!(record.balance, 0.0);
        assert_eq!(record.rank, Rank::Newcomer);
        assert_eq!(record.experience, 0);
        assert_eq!(record.rebirth_level, 0);
        assert!(record.last_rebirth_at.is_none());
        assert!(!record.aura_enabled);
        assert_eq!(record.trade_count, 0);
        assert_eq!(record.schema_version, ACCOUNT_SCHEMA_VERSION);
    }

    #[test]
    fn touch_refreshes_updated_at() {
        let mut record = AccountRecord::new(Uuid::new_v4(), "Mika");
        let before = record.updated_at;
        std::thread::sleep(std::time::Duration::from_millis(5));
        record.touch();
        assert!(record.updated_at > before);
        assert_eq!(record.created_at, before);
    }

    #[test]
    fn kind_display_names_match_history_labels() {
        assert_eq!(TransactionKind::PlayerTransfer.display_name(), "Player Payment");
        assert_eq!(TransactionKind::AdminGrant.display_name(), "Admin Credit Grant");
        assert_eq!(TransactionKind::AdminTake.display_name(), "Admin Credit Removal");
        assert_eq!(TransactionKind::Other.display_name(), "Other Transaction");
    }

    #[test]
    fn outcome_accessors() {
        let applied: Outcome<u32> = Outcome::Applied(7);
        assert!(applied.is_applied());
        assert_eq!(applied.applied(), Some(7));

        let declined: Outcome<u32> = Outcome::Declined(DeclineReason::SelfTransfer);
        assert!(declined.is_declined());
        assert_eq!(declined.declined(), Some(DeclineReason::SelfTransfer));
    }

    #[test]
    fn exp_boost_activity_window() {
        let now = Utc::now();
        let boost = ExpBoost {
            multiplier: 1.25,
            expires_at: now + chrono::Duration::minutes(20),
        };
        assert!(boost.active_at(now));
        assert!(!boost.active_at(now + chrono::Duration::minutes(21)));
    }
}
