//! Backup commands.

use clap::Subcommand;
use dayroll_core::{BackupKind, BackupManager};

use super::common::{now, open_store};

#[derive(Subcommand)]
pub enum BackupAction {
    /// Create a manual backup now
    Create,
    /// List backups
    List,
    /// Delete a backup (file and record)
    Delete {
        /// Backup id
        id: i64,
    },
    /// Print the path of a backup file
    Path {
        /// Backup id
        id: i64,
    },
}

pub fn run(action: BackupAction) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store()?;
    let manager = BackupManager::with_default_dir(&store);

    match action {
        BackupAction::Create => {
            let record = manager.create(BackupKind::Manual, now())?;
            println!("{} ({} bytes)", record.filename, record.size_bytes);
        }
        BackupAction::List => {
            let backups = store.view().list_backups()?;
            println!("{}", serde_json::to_string_pretty(&backups)?);
        }
        BackupAction::Delete { id } => {
            manager.delete(id)?;
            println!("deleted backup {id}");
        }
        BackupAction::Path { id } => {
            println!("{}", manager.file_path(id)?.display());
        }
    }
    Ok(())
}
