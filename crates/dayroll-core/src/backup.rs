//! Local database backups: file copy, metadata rows, retention.
//!
//! A backup is a plain copy of the database file named
//! `backup_<kind>_<timestamp>.db`; the store only keeps the metadata
//! record. Failures here are isolated: they never affect the day
//! lifecycle.

use chrono::NaiveDateTime;
use std::fs;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::error::{BackupError, CoreError, Result};
use crate::ledger::{BackupKind, BackupRecord};
use crate::storage::{data_dir, Store};

/// Creates, prunes, and deletes local backups.
pub struct BackupManager<'a> {
    store: &'a Store,
    backup_dir: PathBuf,
}

impl<'a> BackupManager<'a> {
    pub fn new(store: &'a Store, backup_dir: PathBuf) -> Self {
        Self { store, backup_dir }
    }

    /// Manager writing to `~/.dayroll/backups/`.
    pub fn with_default_dir(store: &'a Store) -> Self {
        Self::new(store, data_dir().join("backups"))
    }

    pub fn backup_dir(&self) -> &PathBuf {
        &self.backup_dir
    }

    /// Copy the database file and record the backup.
    ///
    /// Auto backups advance `last_backup_date` (the scheduler's interval
    /// token); manual backups do not, so they never delay the next
    /// scheduled one. Old backups beyond `backup_keep_local_count` are
    /// pruned afterwards.
    pub fn create(&self, kind: BackupKind, now: NaiveDateTime) -> Result<BackupRecord> {
        let db_path = self
            .store
            .path()
            .ok_or_else(|| BackupError::DatabaseMissing(PathBuf::from(":memory:")))?
            .to_path_buf();
        if !db_path.exists() {
            return Err(BackupError::DatabaseMissing(db_path).into());
        }

        fs::create_dir_all(&self.backup_dir).map_err(BackupError::Io)?;
        let filename = format!(
            "backup_{}_{}.db",
            kind.as_str(),
            now.format("%Y-%m-%d_%H-%M-%S")
        );
        let dest = self.backup_dir.join(&filename);
        fs::copy(&db_path, &dest).map_err(BackupError::Io)?;
        let size_bytes = fs::metadata(&dest).map_err(BackupError::Io)?.len() as i64;

        let mut record = BackupRecord {
            id: 0,
            filename,
            created_at: now,
            size_bytes,
            kind,
            uploaded_offsite: false,
        };
        record.id = self.store.tx(|tx| {
            let id = tx.insert_backup(&record)?;
            if kind == BackupKind::Auto {
                let mut settings = tx.settings()?;
                settings.last_backup_date = Some(now);
                tx.update_settings(&settings)?;
            }
            Ok(id)
        })?;
        info!(filename = %record.filename, size_bytes, "backup created");

        self.prune()?;
        Ok(record)
    }

    /// Remove backups beyond `backup_keep_local_count`, oldest first.
    pub fn prune(&self) -> Result<()> {
        let view = self.store.view();
        let keep = view.settings()?.backup_keep_local_count.max(0) as usize;
        let backups = view.list_backups()?; // newest first
        for stale in backups.iter().skip(keep) {
            let path = self.backup_dir.join(&stale.filename);
            if path.exists() {
                if let Err(e) = fs::remove_file(&path) {
                    warn!(filename = %stale.filename, error = %e, "failed to remove backup file");
                    continue;
                }
            }
            view.delete_backup(stale.id)?;
            info!(filename = %stale.filename, "old backup pruned");
        }
        Ok(())
    }

    /// Delete one backup (file and record).
    pub fn delete(&self, id: i64) -> Result<()> {
        let view = self.store.view();
        let record = view
            .get_backup(id)?
            .ok_or(CoreError::NotFound { kind: "backup", id })?;
        let path = self.backup_dir.join(&record.filename);
        if path.exists() {
            fs::remove_file(&path).map_err(BackupError::Io)?;
        }
        view.delete_backup(id)
    }

    /// Path of a backup file, for download-style access.
    pub fn file_path(&self, id: i64) -> Result<PathBuf> {
        let record = self
            .store
            .view()
            .get_backup(id)?
            .ok_or(CoreError::NotFound { kind: "backup", id })?;
        Ok(self.backup_dir.join(record.filename))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn file_store(dir: &TempDir) -> Store {
        Store::open(dir.path().join("dayroll.db")).unwrap()
    }

    #[test]
    fn create_copies_file_and_records_metadata() {
        let dir = TempDir::new().unwrap();
        let store = file_store(&dir);
        let manager = BackupManager::new(&store, dir.path().join("backups"));

        let record = manager
            .create(BackupKind::Manual, at("2025-03-10 03:00:00"))
            .unwrap();
        assert!(record.id > 0);
        assert!(record.size_bytes > 0);
        assert!(manager.backup_dir().join(&record.filename).exists());
        assert_eq!(record.filename, "backup_manual_2025-03-10_03-00-00.db");

        // Manual backups do not advance the auto-backup token.
        assert!(store.view().settings().unwrap().last_backup_date.is_none());
    }

    #[test]
    fn auto_backup_advances_token() {
        let dir = TempDir::new().unwrap();
        let store = file_store(&dir);
        let manager = BackupManager::new(&store, dir.path().join("backups"));
        manager
            .create(BackupKind::Auto, at("2025-03-10 03:00:00"))
            .unwrap();
        assert_eq!(
            store.view().settings().unwrap().last_backup_date,
            Some(at("2025-03-10 03:00:00"))
        );
    }

    #[test]
    fn prune_keeps_newest_n() {
        let dir = TempDir::new().unwrap();
        let store = file_store(&dir);
        let mut settings = store.view().settings().unwrap();
        settings.backup_keep_local_count = 2;
        store.view().update_settings(&settings).unwrap();

        let manager = BackupManager::new(&store, dir.path().join("backups"));
        let base = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        for hour in 1..=4 {
            let now = base.and_hms_opt(hour, 0, 0).unwrap();
            manager.create(BackupKind::Auto, now).unwrap();
        }

        let remaining = store.view().list_backups().unwrap();
        assert_eq!(remaining.len(), 2);
        assert_eq!(remaining[0].filename, "backup_auto_2025-03-10_04-00-00.db");
        // Pruned files are gone from disk too.
        assert!(!manager
            .backup_dir()
            .join("backup_auto_2025-03-10_01-00-00.db")
            .exists());
    }

    #[test]
    fn delete_removes_file_and_record() {
        let dir = TempDir::new().unwrap();
        let store = file_store(&dir);
        let manager = BackupManager::new(&store, dir.path().join("backups"));
        let record = manager
            .create(BackupKind::Manual, at("2025-03-10 03:00:00"))
            .unwrap();
        manager.delete(record.id).unwrap();
        assert!(store.view().list_backups().unwrap().is_empty());
        assert!(!manager.backup_dir().join(&record.filename).exists());
        assert!(manager.delete(record.id).is_err());
    }

    #[test]
    fn memory_store_cannot_back_up() {
        let store = Store::open_memory().unwrap();
        let dir = TempDir::new().unwrap();
        let manager = BackupManager::new(&store, dir.path().join("backups"));
        let err = manager
            .create(BackupKind::Auto, at("2025-03-10 03:00:00"))
            .unwrap_err();
        assert!(matches!(err, CoreError::Backup(_)));
    }
}
