//! Backups of originals taken before they are overwritten
//!
//! Each run that overwrites files gets its own directory under
//! `~/.swapx/backups/<id>/` holding copies of the originals and an
//! `operation.json` describing them.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

const MAX_BACKUPS: usize = 50;
const METADATA_FILE: &str = "operation.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupMetadata {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    /// Human-readable description of the run (profile and mode)
    pub label: String,
    pub rule_count: usize,
    pub files: Vec<FileBackup>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileBackup {
    pub original_path: PathBuf,
    pub backup_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct BackupManager {
    backups_dir: PathBuf,
}

/// An open backup directory for one batch run.
///
/// `store` only touches paths derived from the input index, so a session can
/// be shared by parallel workers.
#[derive(Debug)]
pub struct BackupSession {
    id: String,
    dir: PathBuf,
    label: String,
    rule_count: usize,
    started: DateTime<Utc>,
}

impl BackupSession {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Copy `path` into the session, returning the copy's location.
    ///
    /// The input index prefixes the file name so two inputs with the same
    /// name from different folders do not collide.
    pub fn store(&self, index: usize, path: &Path) -> Result<PathBuf> {
        let file_name = path
            .file_name()
            .ok_or_else(|| anyhow::anyhow!("Invalid file name: {}", path.display()))?;

        let mut backup_name = std::ffi::OsString::from(format!("{:04}-", index));
        backup_name.push(file_name);
        let backup_path = self.dir.join(backup_name);

        fs::copy(path, &backup_path)
            .with_context(|| format!("Failed to backup file: {}", path.display()))?;

        tracing::debug!(file = %path.display(), backup = %backup_path.display(), "backed up");
        Ok(backup_path)
    }
}

impl BackupManager {
    pub fn new() -> Result<Self> {
        let backups_dir = crate::config::config_dir()?.join("backups");
        Self::with_directory(backups_dir)
    }

    /// Create a BackupManager with a custom backup directory
    pub fn with_directory(dir: impl Into<PathBuf>) -> Result<Self> {
        let backups_dir = dir.into();

        fs::create_dir_all(&backups_dir).with_context(|| {
            format!(
                "Failed to create backups directory: {}",
                backups_dir.display()
            )
        })?;

        Ok(Self { backups_dir })
    }

    pub fn backups_dir(&self) -> &Path {
        &self.backups_dir
    }

    /// Open a new backup directory
    pub fn begin(&self, label: &str, rule_count: usize) -> Result<BackupSession> {
        // Millisecond timestamp first so IDs sort chronologically
        let started = Utc::now();
        let id = format!(
            "{}-{}",
            started.format("%Y%m%d-%H%M%S%3f"),
            Uuid::new_v4().to_string().split_at(8).0
        );
        let dir = self.backups_dir.join(&id);

        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create backup directory: {}", dir.display()))?;

        Ok(BackupSession {
            id,
            dir,
            label: label.to_string(),
            rule_count,
            started,
        })
    }

    /// Write the session's metadata, or drop the session if nothing was stored.
    ///
    /// Returns the backup ID when a backup was kept.
    pub fn finish(&self, session: BackupSession, files: Vec<FileBackup>) -> Result<Option<String>> {
        if files.is_empty() {
            fs::remove_dir_all(&session.dir).with_context(|| {
                format!("Failed to remove empty backup: {}", session.dir.display())
            })?;
            return Ok(None);
        }

        let metadata = BackupMetadata {
            id: session.id.clone(),
            timestamp: session.started,
            label: session.label,
            rule_count: session.rule_count,
            files,
        };

        let metadata_path = session.dir.join(METADATA_FILE);
        let metadata_json =
            serde_json::to_string_pretty(&metadata).context("Failed to serialize metadata")?;

        fs::write(&metadata_path, metadata_json)
            .with_context(|| format!("Failed to write metadata: {}", metadata_path.display()))?;

        tracing::info!(id = %session.id, files = metadata.files.len(), "backup created");

        self.cleanup_old_backups()?;

        Ok(Some(session.id))
    }

    /// Copy every backed-up file back to its original location, then remove
    /// the backup. Returns the restored paths.
    pub fn restore_backup(&self, id: &str) -> Result<Vec<PathBuf>> {
        let backup_dir = self.backups_dir.join(id);
        let metadata_path = backup_dir.join(METADATA_FILE);

        if !backup_dir.exists() {
            anyhow::bail!("Backup not found: {}", id);
        }

        let metadata_json = fs::read_to_string(&metadata_path)
            .with_context(|| format!("Failed to read metadata: {}", metadata_path.display()))?;

        let metadata = Self::parse_backup_metadata(&metadata_json)?;

        let mut restored = Vec::new();
        for file_backup in &metadata.files {
            if !file_backup.backup_path.exists() {
                tracing::warn!(
                    backup = %file_backup.backup_path.display(),
                    "backup file missing, skipping"
                );
                continue;
            }

            fs::copy(&file_backup.backup_path, &file_backup.original_path).with_context(|| {
                format!(
                    "Failed to restore file: {}",
                    file_backup.original_path.display()
                )
            })?;

            restored.push(file_backup.original_path.clone());
        }

        fs::remove_dir_all(&backup_dir).with_context(|| {
            format!(
                "Failed to remove backup directory: {}",
                backup_dir.display()
            )
        })?;

        tracing::info!(id, restored = restored.len(), "backup restored");
        Ok(restored)
    }

    pub fn get_last_backup_id(&self) -> Result<Option<String>> {
        let backups = self.list_backups()?;
        Ok(backups.last().map(|b| b.id.clone()))
    }

    /// All readable backups, oldest first
    pub fn list_backups(&self) -> Result<Vec<BackupMetadata>> {
        let mut backups = Vec::new();

        for entry in fs::read_dir(&self.backups_dir).with_context(|| {
            format!(
                "Failed to read backups directory: {}",
                self.backups_dir.display()
            )
        })? {
            let entry = entry?;
            let metadata_path = entry.path().join(METADATA_FILE);

            if !metadata_path.exists() {
                continue;
            }

            let metadata_json = fs::read_to_string(&metadata_path)?;
            if let Ok(metadata) = serde_json::from_str::<BackupMetadata>(&metadata_json) {
                backups.push(metadata);
            }
        }

        // ID breaks timestamp ties
        backups.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
        Ok(backups)
    }

    fn cleanup_old_backups(&self) -> Result<()> {
        self.prune_backups(MAX_BACKUPS).map(|_| ())
    }

    /// Prune backups keeping only the N most recent ones
    pub fn prune_backups(&self, keep_count: usize) -> Result<usize> {
        let backups = self.list_backups()?;

        if backups.len() <= keep_count {
            return Ok(0);
        }

        let to_remove = backups.len() - keep_count;
        for backup in backups.iter().take(to_remove) {
            let backup_dir = self.backups_dir.join(&backup.id);
            fs::remove_dir_all(&backup_dir)
                .with_context(|| format!("Failed to remove backup: {}", backup_dir.display()))?;
        }

        Ok(to_remove)
    }

    /// Parse backup metadata from JSON string
    pub fn parse_backup_metadata(json: &str) -> Result<BackupMetadata> {
        let metadata: BackupMetadata =
            serde_json::from_str(json).context("Failed to parse backup metadata")?;
        Ok(metadata)
    }
}
