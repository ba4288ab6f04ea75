//! # Granary - Player Economy Backend for Farm Game Servers
//!
//! Granary is a persistent economy and progression backend for farm-themed game
//! servers. It keeps every player's currency balance, farming rank, and rebirth
//! prestige in an embedded database with a full, replayable transaction log.
//!
//! ## Features
//!
//! - **Append-Only Ledger**: Every balance change is a transaction record; an
//!   account's balance can always be replayed from its log and verified.
//! - **Declines Are Not Errors**: Insufficient funds, cooldowns, and rank gates
//!   come back as typed decline reasons so callers can show players a message
//!   instead of handling a failure.
//! - **Rank Progression**: Five farming ranks driven by cumulative experience
//!   with configurable thresholds and single-step advancement.
//! - **Rebirth Prestige**: Players reset their rank for permanent experience
//!   multipliers, named tiers, blessings, and cosmetic auras.
//! - **Concurrent Access**: Per-account locking lets the game server thread,
//!   autosave sweep, and admin CLI work the same registry safely.
//! - **Backups**: Compressed tar archives of the ledger database with checksum
//!   verification and retention trimming.
//! - **Async Design**: Built with Tokio for config and CLI plumbing while the
//!   economy core stays synchronous and lock-based.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use granary::config::Config;
//! use granary::economy::{AccountRegistry, EconomyStoreBuilder};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // Load configuration
//!     let config = Config::load("granary.toml").await?;
//!
//!     // Open the store and bring every account into memory
//!     let store = EconomyStoreBuilder::new(&config.storage.data_dir).open()?;
//!     let registry = AccountRegistry::new(
//!         store,
//!         config.ranks.to_ladder()?,
//!         config.rebirth.to_rules()?,
//!         config.economy.starting_balance,
//!     );
//!     registry.load_all()?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`economy`] - Accounts, ledger, progression, rebirth, storage, and backups
//! - [`config`] - Configuration management and validation
//! - [`validation`] - Display-name validation and note sanitization
//! - [`metrics`] - Process-wide operation counters
//! - [`logutil`] - Escaping helpers for player-supplied strings in logs
//!
//! ## Architecture
//!
//! Granary uses a modular architecture with clear separation of concerns:
//!
//! ```text
//! ┌─────────────────┐
//! │ Account         │ ← Locking, account lifecycle,
//! │ Registry        │   operations, leaderboards
//! └─────────────────┘
//!          │
//! ┌─────────────────┐
//! │ Ledger /        │ ← Balance changes as transactions,
//! │ Progression     │   ranks, rebirth rules
//! └─────────────────┘
//!          │
//! ┌─────────────────┐
//! │ Economy Store   │ ← Sled-backed persistence
//! └─────────────────┘
//! ```
//!
//! ## Examples
//!
//! See the admin CLI in `src/main.rs` for a full application example.

pub mod config;
pub mod economy;
pub mod logutil;
pub mod metrics;
pub mod validation;
