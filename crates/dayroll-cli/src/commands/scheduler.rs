//! Scheduler commands.

use clap::Subcommand;
use dayroll_core::{BackupManager, Scheduler};
use std::sync::atomic::AtomicBool;

use super::common::{now, open_store};

#[derive(Subcommand)]
pub enum SchedulerAction {
    /// Run the scheduler in the foreground (Ctrl-C to stop)
    Run,
    /// One-shot: evaluate all jobs once and report
    Tick,
    /// Show scheduler configuration and next fire times
    Status,
}

pub fn run(action: SchedulerAction) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store()?;
    let backups = BackupManager::with_default_dir(&store);
    let mut scheduler = Scheduler::new(&store, backups);

    match action {
        SchedulerAction::Run => {
            let shutdown = AtomicBool::new(false);
            scheduler.run(&shutdown);
        }
        SchedulerAction::Tick => {
            scheduler.tick(now());
            let status = scheduler.status(now())?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        SchedulerAction::Status => {
            let status = scheduler.status(now())?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
    }
    Ok(())
}
