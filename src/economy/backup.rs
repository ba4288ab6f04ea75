//! Backup and recovery for the ledger database.
//!
//! Snapshots the sled directory into checksummed tar.gz archives with a
//! retention policy, verification, and restore into a fresh directory.
//! Callers should quiesce writes (or run `save_all` first) before taking a
//! snapshot.

use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use tar::{Archive, Builder};

use crate::economy::errors::EconomyError;

/// Directory name inside each archive holding the database files.
const ARCHIVE_ROOT: &str = "ledger";

/// Metadata for one archived snapshot, kept in `backups.json` next to the
/// archives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupMetadata {
    /// Unique backup identifier (timestamp-based).
    pub id: String,
    /// Human-readable label (optional).
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub size_bytes: u64,
    pub backup_type: BackupType,
    /// SHA256 checksum of the archive.
    pub checksum: String,
    /// Whether the checksum has been re-verified since creation.
    pub verified: bool,
    /// Archive filename, relative to the backup directory.
    pub path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackupType {
    Manual,
    Automatic,
}

/// Retention policy for old snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionPolicy {
    /// Keep the last N automatic backups.
    pub automatic_count: usize,
    /// Manual backups are kept forever.
    pub keep_manual: bool,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            automatic_count: 10,
            keep_manual: true,
        }
    }
}

/// Manages snapshot archives of the ledger database directory.
pub struct LedgerBackups {
    data_path: PathBuf,
    backup_path: PathBuf,
    retention: RetentionPolicy,
    backups: HashMap<String, BackupMetadata>,
}

impl LedgerBackups {
    pub fn new(
        data_path: PathBuf,
        backup_path: PathBuf,
        retention: RetentionPolicy,
    ) -> Result<Self, EconomyError> {
        fs::create_dir_all(&backup_path)?;
        let mut manager = Self {
            data_path,
            backup_path,
            retention,
            backups: HashMap::new(),
        };
        manager.load_metadata()?;
        Ok(manager)
    }

    fn metadata_path(&self) -> PathBuf {
        self.backup_path.join("backups.json")
    }

    fn load_metadata(&mut self) -> Result<(), EconomyError> {
        let path = self.metadata_path();
        if path.exists() {
            let contents = fs::read_to_string(&path)?;
            self.backups = serde_json::from_str(&contents)?;
        }
        Ok(())
    }

    fn save_metadata(&self) -> Result<(), EconomyError> {
        let contents = serde_json::to_string_pretty(&self.backups)?;
        fs::write(self.metadata_path(), contents)?;
        Ok(())
    }

    /// Archive the database directory into a new snapshot.
    pub fn create(
        &mut self,
        name: Option<String>,
        backup_type: BackupType,
    ) -> Result<BackupMetadata, EconomyError> {
        let timestamp = Utc::now();
        // Milliseconds keep ids unique for back-to-back snapshots.
        let id = format!("ledger_{}", timestamp.format("%Y%m%d_%H%M%S_%3f"));
        let filename = format!("{}.tar.gz", id);
        let archive_file = self.backup_path.join(&filename);

        log::info!("creating backup {} ({:?})", id, backup_type);

        let tar_gz = File::create(&archive_file)?;
        let enc = GzEncoder::new(tar_gz, Compression::default());
        let mut tar = Builder::new(enc);
        tar.append_dir_all(ARCHIVE_ROOT, &self.data_path)?;
        // Finish the archive before hashing it.
        let enc = tar.into_inner()?;
        enc.finish()?;

        let checksum = file_checksum(&archive_file)?;
        let size_bytes = fs::metadata(&archive_file)?.len();

        let metadata = BackupMetadata {
            id: id.clone(),
            name,
            created_at: timestamp,
            size_bytes,
            backup_type,
            checksum,
            verified: false,
            path: PathBuf::from(&filename),
        };
        self.backups.insert(id.clone(), metadata.clone());
        self.save_metadata()?;

        log::info!("backup {} written ({} bytes)", id, size_bytes);
        Ok(metadata)
    }

    /// Re-hash an archive and compare against the recorded checksum.
    pub fn verify(&mut self, backup_id: &str) -> Result<bool, EconomyError> {
        let metadata = self
            .backups
            .get(backup_id)
            .ok_or_else(|| EconomyError::NotFound(format!("backup: {}", backup_id)))?;
        let archive_file = self.backup_path.join(&metadata.path);
        if !archive_file.exists() {
            return Err(EconomyError::NotFound(format!(
                "backup archive: {}",
                archive_file.display()
            )));
        }

        let valid = file_checksum(&archive_file)? == metadata.checksum;
        if valid {
            log::info!("backup verification passed: {}", backup_id);
            if let Some(meta) = self.backups.get_mut(backup_id) {
                meta.verified = true;
            }
            self.save_metadata()?;
        } else {
            log::error!("backup verification FAILED: {} (checksum mismatch)", backup_id);
        }
        Ok(valid)
    }

    /// Unpack an archive into `restore_path` after re-checking its checksum.
    /// The database lands under `restore_path/ledger`.
    pub fn restore(&self, backup_id: &str, restore_path: &Path) -> Result<(), EconomyError> {
        let metadata = self
            .backups
            .get(backup_id)
            .ok_or_else(|| EconomyError::NotFound(format!("backup: {}", backup_id)))?;
        let archive_file = self.backup_path.join(&metadata.path);
        if !archive_file.exists() {
            return Err(EconomyError::NotFound(format!(
                "backup archive: {}",
                archive_file.display()
            )));
        }

        log::info!("restoring backup {} to {}", backup_id, restore_path.display());

        if file_checksum(&archive_file)? != metadata.checksum {
            return Err(EconomyError::Internal(format!(
                "backup {} failed checksum before restore",
                backup_id
            )));
        }

        fs::create_dir_all(restore_path)?;
        let tar_gz = File::open(&archive_file)?;
        let dec = GzDecoder::new(tar_gz);
        let mut archive = Archive::new(dec);
        archive.unpack(restore_path)?;

        log::info!("backup restored: {}", backup_id);
        Ok(())
    }

    /// Delete automatic backups beyond the retention count. Returns the
    /// deleted ids.
    pub fn apply_retention(&mut self) -> Result<Vec<String>, EconomyError> {
        let mut automatic: Vec<_> = self
            .backups
            .values()
            .filter(|b| b.backup_type == BackupType::Automatic)
            .collect();
        automatic.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let deleted: Vec<String> = automatic
            .iter()
            .skip(self.retention.automatic_count)
            .map(|b| b.id.clone())
            .collect();

        for backup_id in &deleted {
            if let Some(metadata) = self.backups.remove(backup_id) {
                let archive_file = self.backup_path.join(&metadata.path);
                if archive_file.exists() {
                    fs::remove_file(&archive_file)?;
                    log::info!("deleted old backup: {}", backup_id);
                }
            }
        }
        if !deleted.is_empty() {
            self.save_metadata()?;
        }
        Ok(deleted)
    }

    /// All known backups, newest first.
    pub fn list(&self) -> Vec<BackupMetadata> {
        let mut backups: Vec<_> = self.backups.values().cloned().collect();
        backups.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        backups
    }

    pub fn get(&self, backup_id: &str) -> Option<&BackupMetadata> {
        self.backups.get(backup_id)
    }

    /// Delete one backup. Manual backups are refused while the policy
    /// protects them.
    pub fn delete(&mut self, backup_id: &str) -> Result<(), EconomyError> {
        let metadata = self
            .backups
            .remove(backup_id)
            .ok_or_else(|| EconomyError::NotFound(format!("backup: {}", backup_id)))?;

        if metadata.backup_type == BackupType::Manual && self.retention.keep_manual {
            self.backups.insert(backup_id.to_string(), metadata);
            return Err(EconomyError::InvalidConfig(
                "manual backups are protected by the retention policy".to_string(),
            ));
        }

        let archive_file = self.backup_path.join(&metadata.path);
        if archive_file.exists() {
            fs::remove_file(&archive_file)?;
        }
        self.save_metadata()?;
        log::info!("deleted backup: {}", backup_id);
        Ok(())
    }

    pub fn stats(&self) -> BackupStats {
        let mut stats = BackupStats {
            total_backups: self.backups.len(),
            ..BackupStats::default()
        };
        for backup in self.backups.values() {
            stats.total_size_bytes += backup.size_bytes;
            match backup.backup_type {
                BackupType::Manual => stats.manual_count += 1,
                BackupType::Automatic => stats.automatic_count += 1,
            }
            if backup.verified {
                stats.verified_count += 1;
            }
        }
        stats.latest_backup = self
            .backups
            .values()
            .map(|b| b.created_at)
            .max();
        stats
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct BackupStats {
    pub total_backups: usize,
    pub total_size_bytes: u64,
    pub manual_count: usize,
    pub automatic_count: usize,
    pub verified_count: usize,
    pub latest_backup: Option<DateTime<Utc>>,
}

fn file_checksum(path: &Path) -> Result<String, EconomyError> {
    use sha2::{Digest, Sha256};

    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0; 8192];
    loop {
        let n = file.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}
