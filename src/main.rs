//! Binary entrypoint for the granary admin CLI.
//!
//! Commands:
//! - `init` - write a starter `granary.toml` and create the data directories
//! - `status` - account totals, store size, and operation counters
//! - `top [--limit N] [--rebirth]` - leaderboards
//! - `grant | take | set-balance <account> <amount>` - admin ledger operations
//! - `history <account> [--limit N]` - recent transactions
//! - `audit` - replay every ledger against its stored balance
//! - `backup [--name ...]` / `backups` / `restore <id> --to <path>` - archives
//! - `export [--out FILE]` - JSON dump of account records
//!
//! Accounts are addressed by UUID or display name. See the library crate docs
//! for module-level details: `granary::`.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use log::{error, info};
use uuid::Uuid;

use granary::config::Config;
use granary::economy::{
    format_rebirth_stars, AccountRegistry, BackupType, CurrencySpec, EconomyStoreBuilder,
    LedgerBackups, Outcome, TransactionKind,
};
use granary::logutil::escape_log;
use granary::metrics;

#[derive(Parser)]
#[command(name = "granary")]
#[command(about = "Admin CLI for the granary player-economy backend")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "granary.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a starter configuration file and the data directories
    Init,
    /// Show account totals, store size, and operation counters
    Status,
    /// Show a leaderboard
    Top {
        /// Number of rows
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
        /// Order by rebirth level instead of balance
        #[arg(long)]
        rebirth: bool,
    },
    /// Credit an account
    Grant {
        account: String,
        amount: f64,
        /// Note recorded on the transaction
        #[arg(short, long)]
        note: Option<String>,
    },
    /// Debit an account; fails when the balance is short
    Take {
        account: String,
        amount: f64,
        /// Note recorded on the transaction
        #[arg(short, long)]
        note: Option<String>,
    },
    /// Overwrite an account balance, recording the delta as an adjustment
    SetBalance {
        account: String,
        amount: f64,
        /// Note recorded on the transaction
        #[arg(short, long)]
        note: Option<String>,
    },
    /// Show an account's most recent transactions
    History {
        account: String,
        /// Number of transactions
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
    /// Replay every account's transaction log against its stored balance
    Audit,
    /// Create a compressed backup of the ledger database
    Backup {
        /// Friendly name recorded in the backup metadata
        #[arg(short, long)]
        name: Option<String>,
    },
    /// List existing backups
    Backups,
    /// Restore a backup archive into a directory
    Restore {
        /// Backup id as shown by `backups`
        id: String,
        /// Directory the archive is unpacked into
        #[arg(long)]
        to: String,
    },
    /// Dump every account record as JSON
    Export {
        /// Output file; stdout when omitted
        #[arg(short, long)]
        out: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load config early to configure logging (except for Init which writes it)
    let pre_config = match cli.command {
        Commands::Init => None,
        _ => Config::load(&cli.config).await.ok(),
    };
    init_logging(&pre_config, cli.verbose);

    match cli.command {
        Commands::Init => {
            info!("initializing granary configuration");
            Config::create_default(&cli.config).await?;
            info!("configuration file created at {}", cli.config);

            let config = Config::load(&cli.config).await?;
            let store = EconomyStoreBuilder::new(&config.storage.data_dir).open()?;
            store.flush()?;
            tokio::fs::create_dir_all(&config.storage.backup_dir).await?;
            info!("data directory initialized at {}", config.storage.data_dir);
        }
        Commands::Status => {
            let config = require_config(pre_config, &cli.config).await?;
            let (registry, currency) = open_runtime(&config)?;

            let records = registry.store().all_accounts()?;
            let circulating: f64 = records.iter().map(|r| r.balance).sum();
            let mut transactions = 0usize;
            for record in &records {
                transactions += registry.store().count_transactions(record.id)?;
            }
            let size = registry.store().size_on_disk()?;

            println!("accounts:      {}", records.len());
            println!("circulating:   {}", currency.format_amount(circulating));
            println!("transactions:  {}", transactions);
            println!("store size:    {} KiB", size / 1024);

            let snap = metrics::snapshot();
            println!(
                "this run:      {} credits, {} debits, {} declined, {} integrity failures",
                snap.credits_applied,
                snap.debits_applied,
                snap.operations_declined,
                snap.integrity_failures
            );
        }
        Commands::Top { limit, rebirth } => {
            let config = require_config(pre_config, &cli.config).await?;
            let (registry, currency) = open_runtime(&config)?;

            let entries = if rebirth {
                registry.top_by_rebirth(limit)?
            } else {
                registry.top_by_balance(limit)?
            };
            if entries.is_empty() {
                println!("no accounts");
            }
            for (i, entry) in entries.iter().enumerate() {
                if rebirth {
                    println!(
                        "{:>3}. {:<24} {:<7} {}",
                        i + 1,
                        entry.display_name,
                        format_rebirth_stars(entry.rebirth_level),
                        currency.format_amount(entry.balance)
                    );
                } else {
                    println!(
                        "{:>3}. {:<24} {:>16}  {}",
                        i + 1,
                        entry.display_name,
                        currency.format_amount(entry.balance),
                        entry.rank.display_name()
                    );
                }
            }
        }
        Commands::Grant {
            account,
            amount,
            note,
        } => {
            let config = require_config(pre_config, &cli.config).await?;
            let (registry, currency) = open_runtime(&config)?;
            let (id, name) = resolve_account(&registry, &account)?;

            let note = note.unwrap_or_else(|| "admin grant".to_string());
            let balance = registry.credit(id, &name, amount, TransactionKind::AdminGrant, note)?;
            registry.save_all()?;
            println!(
                "{}: {} (balance {})",
                name,
                currency.format_signed(amount),
                currency.format_amount(balance)
            );
        }
        Commands::Take {
            account,
            amount,
            note,
        } => {
            let config = require_config(pre_config, &cli.config).await?;
            let (registry, currency) = open_runtime(&config)?;
            let (id, name) = resolve_account(&registry, &account)?;

            let note = note.unwrap_or_else(|| "admin take".to_string());
            match registry.debit(id, &name, amount, TransactionKind::AdminTake, note)? {
                Outcome::Applied(balance) => {
                    registry.save_all()?;
                    println!(
                        "{}: {} (balance {})",
                        name,
                        currency.format_signed(-amount),
                        currency.format_amount(balance)
                    );
                }
                Outcome::Declined(reason) => {
                    println!("declined: {}", reason);
                    std::process::exit(1);
                }
            }
        }
        Commands::SetBalance {
            account,
            amount,
            note,
        } => {
            let config = require_config(pre_config, &cli.config).await?;
            let (registry, currency) = open_runtime(&config)?;
            let (id, name) = resolve_account(&registry, &account)?;

            let note = note.unwrap_or_else(|| "admin adjustment".to_string());
            let balance = registry.set_balance(id, &name, amount, note)?;
            registry.save_all()?;
            println!("{}: balance set to {}", name, currency.format_amount(balance));
        }
        Commands::History { account, limit } => {
            let config = require_config(pre_config, &cli.config).await?;
            let (registry, currency) = open_runtime(&config)?;
            let (id, name) = resolve_account(&registry, &account)?;

            let transactions = registry.recent_transactions(id, &name, limit)?;
            if transactions.is_empty() {
                println!("no transactions for {}", name);
            }
            for tx in transactions {
                println!(
                    "{}  {:<16} {:>16}  balance {:>12}  {}",
                    tx.created_at.format("%Y-%m-%d %H:%M:%S"),
                    tx.kind.display_name(),
                    currency.format_signed(tx.amount),
                    currency.format_amount(tx.balance_after),
                    tx.note
                );
            }
        }
        Commands::Audit => {
            let config = require_config(pre_config, &cli.config).await?;
            // No load_all here: audit replays the persisted state as-is.
            let store = EconomyStoreBuilder::new(&config.storage.data_dir).open()?;
            let registry = AccountRegistry::new(
                store,
                config.ranks.to_ladder()?,
                config.rebirth.to_rules()?,
                config.economy.starting_balance,
            );
            match registry.verify_all() {
                Ok(checked) => println!("audit clean: {} accounts verified", checked),
                Err(err) => {
                    error!("audit failed: {}", err);
                    eprintln!("audit failed: {}", err);
                    std::process::exit(1);
                }
            }
        }
        Commands::Backup { name } => {
            let config = require_config(pre_config, &cli.config).await?;
            let mut backups = open_backups(&config)?;

            let metadata = backups.create(name, BackupType::Manual)?;
            let trimmed = backups.apply_retention()?;
            println!(
                "created backup {} ({} KiB)",
                metadata.id,
                metadata.size_bytes / 1024
            );
            if !trimmed.is_empty() {
                println!("retention removed {} old automatic backups", trimmed.len());
            }
        }
        Commands::Backups => {
            let config = require_config(pre_config, &cli.config).await?;
            let backups = open_backups(&config)?;

            let list = backups.list();
            if list.is_empty() {
                println!("no backups");
            }
            for backup in &list {
                let kind = match backup.backup_type {
                    BackupType::Manual => "manual",
                    BackupType::Automatic => "auto",
                };
                println!(
                    "{}  {}  {:<6} {:>10} KiB  {}",
                    backup.id,
                    backup.created_at.format("%Y-%m-%d %H:%M:%S"),
                    kind,
                    backup.size_bytes / 1024,
                    backup.name.as_deref().unwrap_or("-")
                );
            }
            let stats = backups.stats();
            println!(
                "{} backups ({} manual, {} automatic), {} KiB total",
                stats.total_backups,
                stats.manual_count,
                stats.automatic_count,
                stats.total_size_bytes / 1024
            );
        }
        Commands::Restore { id, to } => {
            let config = require_config(pre_config, &cli.config).await?;
            let mut backups = open_backups(&config)?;

            if !backups.verify(&id)? {
                eprintln!("backup {} failed checksum verification; not restoring", id);
                std::process::exit(1);
            }
            backups.restore(&id, Path::new(&to))?;
            println!("restored backup {} into {}", id, to);
        }
        Commands::Export { out } => {
            let config = require_config(pre_config, &cli.config).await?;
            let store = EconomyStoreBuilder::new(&config.storage.data_dir).open()?;

            let records = store.all_accounts()?;
            let json = serde_json::to_string_pretty(&records)?;
            match out {
                Some(path) => {
                    tokio::fs::write(&path, &json).await?;
                    println!("exported {} accounts to {}", records.len(), path);
                }
                None => println!("{}", json),
            }
        }
    }

    Ok(())
}

/// Use the config loaded for logging setup, or load it now and fail loudly.
async fn require_config(pre_config: Option<Config>, path: &str) -> Result<Config> {
    match pre_config {
        Some(config) => Ok(config),
        None => Config::load(path).await,
    }
}

/// Open the store and build the registry, then bring every account into
/// memory so each ledger is verified before the command touches anything.
fn open_runtime(config: &Config) -> Result<(AccountRegistry, CurrencySpec)> {
    let store = EconomyStoreBuilder::new(&config.storage.data_dir).open()?;
    let registry = AccountRegistry::new(
        store,
        config.ranks.to_ladder()?,
        config.rebirth.to_rules()?,
        config.economy.starting_balance,
    )
    .with_note_limit(config.economy.note_max_bytes);
    registry.load_all()?;
    Ok((registry, config.currency.to_spec()))
}

fn open_backups(config: &Config) -> Result<LedgerBackups> {
    Ok(LedgerBackups::new(
        PathBuf::from(&config.storage.data_dir),
        PathBuf::from(&config.storage.backup_dir),
        config.storage.retention(),
    )?)
}

/// Resolve a CLI account argument (UUID or display name) to an existing
/// account. Admin commands never create accounts.
fn resolve_account(registry: &AccountRegistry, key: &str) -> Result<(Uuid, String)> {
    let id = match Uuid::parse_str(key) {
        Ok(id) => id,
        Err(_) => registry
            .find_by_name(key)?
            .ok_or_else(|| anyhow!("no account matches '{}'", escape_log(key)))?,
    };
    let overview = registry.overview(id)?;
    Ok((id, overview.display_name))
}

fn init_logging(config: &Option<Config>, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    // CLI verbosity overrides the configured level
    let base_level = match verbosity {
        0 => config
            .as_ref()
            .and_then(|c| c.logging.level.parse().ok())
            .unwrap_or(log::LevelFilter::Info),
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(base_level);

    let log_file = config.as_ref().and_then(|c| c.logging.file.clone());
    match log_file.and_then(|file| {
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(file)
            .ok()
    }) {
        Some(f) => {
            let write_mutex = std::sync::Arc::new(std::sync::Mutex::new(f));
            // When stdout is a terminal, mirror log lines to the console too
            let is_tty = atty::is(atty::Stream::Stdout);
            builder.format(move |fmt, record| {
                let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
                let line = format!("{} [{}] {}", ts, record.level(), record.args());
                if let Ok(mut guard) = write_mutex.lock() {
                    let _ = writeln!(guard, "{}", line);
                }
                if is_tty {
                    writeln!(fmt, "{}", line)
                } else {
                    Ok(())
                }
            });
        }
        None => {
            builder.format(|fmt, record| {
                writeln!(
                    fmt,
                    "{} [{}] {}",
                    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ"),
                    record.level(),
                    record.args()
                )
            });
        }
    }
    let _ = builder.try_init();
}
