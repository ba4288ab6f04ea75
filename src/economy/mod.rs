//! Player economy data model and persistence.
//! The ledger keeps an append-only transaction log per account and treats
//! the balance as derived state; progression and rebirth layer rank and
//! prestige mechanics on top. The registry is the concurrent entry point
//! the server and CLI both drive.

pub mod backup;
pub mod currency;
pub mod errors;
pub mod ledger;
pub mod progression;
pub mod rebirth;
pub mod registry;
pub mod storage;
pub mod tasks;
pub mod types;

pub use backup::{BackupMetadata, BackupStats, BackupType, LedgerBackups, RetentionPolicy};
pub use currency::CurrencySpec;
pub use errors::EconomyError;
pub use ledger::{transfer, Ledger, TransferReceipt, REPLAY_EPSILON};
pub use progression::{
    format_progress_bar, ExperienceGain, Progression, Rank, RankLadder, RANK_COUNT,
};
pub use rebirth::{
    bless, format_rebirth_stars, format_remaining, perform_rebirth, rebirth_eligibility,
    BlessReceipt, RebirthReceipt, RebirthRules, RebirthState, RebirthTier, DEITY_LEVEL,
    SEASONAL_INSIGHT_LEVEL,
};
pub use registry::{Account, AccountOverview, AccountRegistry, LeaderboardEntry};
pub use storage::{EconomyStore, EconomyStoreBuilder};
pub use tasks::spawn_autosave;
pub use types::*;
