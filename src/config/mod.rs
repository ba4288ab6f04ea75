//! # Configuration Management Module
//!
//! Central configuration for the granary economy backend: storage paths,
//! currency naming, rank thresholds, rebirth rules, and logging, loaded from
//! a TOML file with sensible defaults for every section.
//!
//! ## Features
//!
//! - **Structured Configuration**: Type-safe sections with serde serialization
//! - **Validation on Conversion**: Thresholds and tiers are checked when the
//!   runtime rule objects are built, so a bad file fails at startup
//! - **Defaults**: Every section can be omitted and falls back to defaults
//!
//! ## Usage
//!
//! ```rust,no_run
//! use granary::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("granary.toml").await?;
//!     println!("Data dir: {}", config.storage.data_dir);
//!
//!     Config::create_default("granary.toml").await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration File Format
//!
//! ```toml
//! [economy]
//! starting_balance = 100.0
//! autosave_minutes = 5
//!
//! [storage]
//! data_dir = "./data/economy"
//! backup_dir = "./data/backups"
//!
//! [currency]
//! singular = "emerald"
//! plural = "emeralds"
//! symbol = "◆"
//!
//! [ranks]
//! thresholds = [0, 5000, 15000, 30000, 60000]
//!
//! [rebirth]
//! max_level = 100
//! cooldown_minutes = 60
//!
//! [[rebirth.tiers]]
//! level = 1
//! name = "Reborn"
//! color = "gray"
//! xp_multiplier = 0.1
//! min_rank = "agricultural_expert"
//! cost = 100.0
//! ```

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::economy::{
    CurrencySpec, EconomyError, Rank, RankLadder, RebirthRules, RebirthTier, RetentionPolicy,
};

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub economy: EconomyConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub currency: CurrencyConfig,
    #[serde(default)]
    pub ranks: RanksConfig,
    #[serde(default)]
    pub rebirth: RebirthConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EconomyConfig {
    /// Balance credited to brand-new accounts, recorded as a transaction.
    pub starting_balance: f64,
    /// Interval between automatic save-all sweeps. Zero disables autosave.
    pub autosave_minutes: u64,
    /// Longest transaction note kept after sanitization.
    pub note_max_bytes: usize,
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            starting_balance: 100.0,
            autosave_minutes: 5,
            note_max_bytes: crate::validation::DEFAULT_NOTE_MAX_BYTES,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: String,
    pub backup_dir: String,
    /// Automatic backups kept before retention trims the oldest.
    pub backup_keep: usize,
    /// Protect manual backups from deletion.
    pub backup_keep_manual: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: "./data/economy".to_string(),
            backup_dir: "./data/backups".to_string(),
            backup_keep: 10,
            backup_keep_manual: true,
        }
    }
}

impl StorageConfig {
    pub fn retention(&self) -> RetentionPolicy {
        RetentionPolicy {
            automatic_count: self.backup_keep,
            keep_manual: self.backup_keep_manual,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrencyConfig {
    pub singular: String,
    pub plural: String,
    pub symbol: String,
}

impl Default for CurrencyConfig {
    fn default() -> Self {
        let spec = CurrencySpec::default();
        Self {
            singular: spec.singular,
            plural: spec.plural,
            symbol: spec.symbol,
        }
    }
}

impl CurrencyConfig {
    pub fn to_spec(&self) -> CurrencySpec {
        CurrencySpec {
            singular: self.singular.clone(),
            plural: self.plural.clone(),
            symbol: self.symbol.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RanksConfig {
    /// Cumulative experience required for each rank, lowest first. The
    /// first entry must be zero and the list must be non-decreasing.
    pub thresholds: Vec<u64>,
}

impl Default for RanksConfig {
    fn default() -> Self {
        Self {
            thresholds: RankLadder::DEFAULT_THRESHOLDS.to_vec(),
        }
    }
}

impl RanksConfig {
    pub fn to_ladder(&self) -> Result<RankLadder, EconomyError> {
        RankLadder::new(&self.thresholds)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RebirthConfig {
    pub max_level: u32,
    pub cooldown_minutes: u64,
    pub bonus_per_level: f64,
    pub base_cost: f64,
    pub base_multiplier_per_level: f64,
    pub default_min_rank: Rank,
    pub keep_rank_on_rebirth: bool,
    pub required_trades: u32,
    pub min_bless_level: u32,
    pub bless_cooldown_hours: u64,
    pub blessing_duration_minutes: u64,
    pub blessing_bonus: f64,
    #[serde(default)]
    pub tiers: Vec<RebirthTierConfig>,
}

impl Default for RebirthConfig {
    fn default() -> Self {
        Self {
            max_level: 100,
            cooldown_minutes: 60,
            bonus_per_level: 0.05,
            base_cost: 100.0,
            base_multiplier_per_level: 0.1,
            default_min_rank: Rank::AgriculturalExpert,
            keep_rank_on_rebirth: false,
            required_trades: 0,
            min_bless_level: 3,
            bless_cooldown_hours: 24,
            blessing_duration_minutes: 20,
            blessing_bonus: 0.1,
            tiers: vec![
                RebirthTierConfig {
                    level: 1,
                    name: "Reborn".to_string(),
                    color: "gray".to_string(),
                    xp_multiplier: 0.1,
                    min_rank: Rank::AgriculturalExpert,
                    cost: 100.0,
                },
                RebirthTierConfig {
                    level: 5,
                    name: "Harvest Sage".to_string(),
                    color: "gold".to_string(),
                    xp_multiplier: 0.5,
                    min_rank: Rank::AgriculturalExpert,
                    cost: 500.0,
                },
                RebirthTierConfig {
                    level: 10,
                    name: "Field Deity".to_string(),
                    color: "aqua".to_string(),
                    xp_multiplier: 1.0,
                    min_rank: Rank::AgriculturalExpert,
                    cost: 1000.0,
                },
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RebirthTierConfig {
    pub level: u32,
    pub name: String,
    pub color: String,
    pub xp_multiplier: f64,
    pub min_rank: Rank,
    pub cost: f64,
}

impl RebirthConfig {
    pub fn to_rules(&self) -> Result<RebirthRules, EconomyError> {
        let tiers = self
            .tiers
            .iter()
            .map(|t| RebirthTier {
                level: t.level,
                name: t.name.clone(),
                color: t.color.clone(),
                xp_multiplier: t.xp_multiplier,
                min_rank: t.min_rank,
                cost: t.cost,
            })
            .collect();
        let mut rules = RebirthRules::default();
        rules.max_level = self.max_level;
        rules.cooldown = chrono::Duration::minutes(self.cooldown_minutes as i64);
        rules.bonus_per_level = self.bonus_per_level;
        rules.base_cost = self.base_cost;
        rules.base_multiplier_per_level = self.base_multiplier_per_level;
        rules.default_min_rank = self.default_min_rank;
        rules.keep_rank_on_rebirth = self.keep_rank_on_rebirth;
        rules.required_trades = self.required_trades;
        rules.min_bless_level = self.min_bless_level;
        rules.bless_cooldown = chrono::Duration::hours(self.bless_cooldown_hours as i64);
        rules.blessing_duration = chrono::Duration::minutes(self.blessing_duration_minutes as i64);
        rules.blessing_bonus = self.blessing_bonus;
        rules.with_tiers(tiers)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: Some("granary.log".to_string()),
        }
    }
}

impl Config {
    /// Load configuration from a file.
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;

        Ok(config)
    }

    /// Create a default configuration file.
    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }
}
