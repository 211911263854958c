//! Wall-clock driver for the day lifecycle.
//!
//! The scheduler owns no threads: the caller invokes [`Scheduler::tick`]
//! periodically (at least once a minute, up to once a second) and each
//! tick evaluates the three jobs against their persisted idempotence
//! tokens. A convenience [`Scheduler::run`] loop drives ticks off the
//! local clock until a shutdown flag is raised; an in-flight tick always
//! finishes before the loop returns.
//!
//! Job failures never advance a token, so the next tick retries.

use chrono::{Days, NaiveDate, NaiveDateTime};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{error, info};

use crate::backup::BackupManager;
use crate::dates::parse_hhmm;
use crate::error::{CoreError, Result};
use crate::ledger::BackupKind;
use crate::planner::Planner;
use crate::scoring::ScoringEngine;
use crate::settings::Settings;
use crate::storage::Store;

/// In-memory heartbeat counters for one job. Reset on process restart.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct JobStats {
    pub total_checks: u64,
    pub total_executions: u64,
    pub last_check: Option<NaiveDateTime>,
    pub last_execution: Option<NaiveDateTime>,
    pub last_error: Option<String>,
    /// How many identical errors arrived back to back.
    pub consecutive_identical_errors: u32,
}

impl JobStats {
    fn checked(&mut self, now: NaiveDateTime) {
        self.total_checks += 1;
        self.last_check = Some(now);
    }

    fn executed(&mut self, now: NaiveDateTime) {
        self.total_executions += 1;
        self.last_execution = Some(now);
        self.last_error = None;
        self.consecutive_identical_errors = 0;
    }

    fn failed(&mut self, message: String) {
        if self.last_error.as_deref() == Some(message.as_str()) {
            self.consecutive_identical_errors += 1;
        } else {
            self.consecutive_identical_errors = 1;
        }
        self.last_error = Some(message);
    }

    /// The UI-visible ERROR state: the same failure twice in a row.
    pub fn in_error_state(&self) -> bool {
        self.consecutive_identical_errors >= 2
    }
}

/// Status snapshot of one job.
#[derive(Debug, Clone, serde::Serialize)]
pub struct JobStatus {
    pub name: &'static str,
    pub enabled: bool,
    pub next_fire: Option<NaiveDateTime>,
    pub error_state: bool,
    #[serde(flatten)]
    pub stats: JobStats,
}

/// Full scheduler status report.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SchedulerStatus {
    pub started_at: Option<NaiveDateTime>,
    pub uptime_seconds: Option<i64>,
    pub current_time: NaiveDateTime,
    pub jobs: Vec<JobStatus>,
}

/// Drives auto-penalty, auto-roll, and auto-backup off the wall clock.
pub struct Scheduler<'a> {
    store: &'a Store,
    backups: BackupManager<'a>,
    started_at: Option<NaiveDateTime>,
    penalty_stats: JobStats,
    roll_stats: JobStats,
    backup_stats: JobStats,
}

impl<'a> Scheduler<'a> {
    pub fn new(store: &'a Store, backups: BackupManager<'a>) -> Self {
        Self {
            store,
            backups,
            started_at: None,
            penalty_stats: JobStats::default(),
            roll_stats: JobStats::default(),
            backup_stats: JobStats::default(),
        }
    }

    /// Evaluate all jobs once. Each job catches its own error; a failed
    /// job leaves its token alone and retries next tick.
    pub fn tick(&mut self, now: NaiveDateTime) {
        if self.started_at.is_none() {
            self.started_at = Some(now);
        }

        self.penalty_stats.checked(now);
        match self.check_auto_penalty(now) {
            Ok(true) => self.penalty_stats.executed(now),
            Ok(false) => {}
            Err(e) => {
                error!(job = "auto_penalty", error = %e, "job failed");
                self.penalty_stats.failed(e.to_string());
            }
        }

        self.roll_stats.checked(now);
        match self.check_auto_roll(now) {
            Ok(true) => self.roll_stats.executed(now),
            Ok(false) => {}
            Err(e) => {
                error!(job = "auto_roll", error = %e, "job failed");
                self.roll_stats.failed(e.to_string());
            }
        }

        self.backup_stats.checked(now);
        match self.check_auto_backup(now) {
            Ok(true) => self.backup_stats.executed(now),
            Ok(false) => {}
            Err(e) => {
                error!(job = "auto_backup", error = %e, "job failed");
                self.backup_stats.failed(e.to_string());
            }
        }
    }

    /// Tick once a second until `shutdown` is raised. The tick in
    /// progress when the flag flips completes before this returns.
    pub fn run(&mut self, shutdown: &AtomicBool) {
        info!("scheduler started");
        while !shutdown.load(Ordering::SeqCst) {
            let now = chrono::Local::now().naive_local();
            self.tick(now);
            std::thread::sleep(Duration::from_secs(1));
        }
        info!("scheduler stopped");
    }

    fn check_auto_penalty(&mut self, now: NaiveDateTime) -> Result<bool> {
        let settings = self.store.view().settings()?;
        if !settings.auto_penalties_enabled {
            return Ok(false);
        }
        let today = settings.date_context()?.effective_date(now);
        if now.time() < parse_hhmm(&settings.penalty_time)? {
            return Ok(false);
        }
        // Caught up when everything through yesterday is finalized.
        let caught_up = settings
            .last_penalty_date
            .is_some_and(|d| d + Days::new(1) >= today);
        if caught_up {
            return Ok(false);
        }

        let finalized = self
            .store
            .tx(|tx| ScoringEngine::finalize_pending(tx, today))?;
        for summary in &finalized {
            info!(date = %summary.date, penalty = summary.penalty, "penalties applied");
        }
        Ok(true)
    }

    fn check_auto_roll(&mut self, now: NaiveDateTime) -> Result<bool> {
        let settings = self.store.view().settings()?;
        if !settings.auto_roll_enabled {
            return Ok(false);
        }
        let today = settings.date_context()?.effective_date(now);
        if settings.last_roll_date.is_some_and(|d| d >= today) {
            return Ok(false);
        }
        // With a shifted day the effective-date change is the gate;
        // otherwise wait for the configured time.
        if !settings.day_start_enabled && now.time() < parse_hhmm(&settings.auto_roll_time)? {
            return Ok(false);
        }

        // Mark the roll as owed before attempting it, so a failure
        // leaves a visible prompt for the operator.
        self.store.tx(|tx| {
            let mut settings = tx.settings()?;
            settings.pending_roll = true;
            tx.update_settings(&settings)
        })?;

        let outcome = match Planner::new(self.store).roll(None, now) {
            Ok(outcome) => outcome,
            // Lost the race to an operator roll; the token says done.
            Err(CoreError::RollAlreadyDone { .. }) => {
                self.store.tx(|tx| {
                    let mut settings = tx.settings()?;
                    settings.pending_roll = false;
                    tx.update_settings(&settings)
                })?;
                return Ok(false);
            }
            Err(e) => return Err(e),
        };
        info!(
            date = %outcome.date,
            tasks = outcome.tasks.len(),
            habits = outcome.habits.len(),
            "auto-roll executed"
        );
        Ok(true)
    }

    fn check_auto_backup(&mut self, now: NaiveDateTime) -> Result<bool> {
        let settings = self.store.view().settings()?;
        if !settings.auto_backup_enabled {
            return Ok(false);
        }
        if now.time() < parse_hhmm(&settings.backup_time)? {
            return Ok(false);
        }
        let due = match settings.last_backup_date {
            None => true,
            Some(last) => {
                (now.date() - last.date()).num_days() >= settings.backup_interval_days.max(1)
            }
        };
        if !due {
            return Ok(false);
        }

        let record = self.backups.create(BackupKind::Auto, now)?;
        info!(filename = %record.filename, "auto-backup executed");
        Ok(true)
    }

    /// Status snapshot: per-job counters, next fire times, error states.
    pub fn status(&self, now: NaiveDateTime) -> Result<SchedulerStatus> {
        let settings = self.store.view().settings()?;
        let jobs = vec![
            JobStatus {
                name: "auto_penalty",
                enabled: settings.auto_penalties_enabled,
                next_fire: next_fire(now, &settings.penalty_time),
                error_state: self.penalty_stats.in_error_state(),
                stats: self.penalty_stats.clone(),
            },
            JobStatus {
                name: "auto_roll",
                enabled: settings.auto_roll_enabled,
                next_fire: next_fire(now, &settings.auto_roll_time),
                error_state: self.roll_stats.in_error_state(),
                stats: self.roll_stats.clone(),
            },
            JobStatus {
                name: "auto_backup",
                enabled: settings.auto_backup_enabled,
                next_fire: next_fire(now, &settings.backup_time),
                error_state: self.backup_stats.in_error_state(),
                stats: self.backup_stats.clone(),
            },
        ];
        Ok(SchedulerStatus {
            started_at: self.started_at,
            uptime_seconds: self.started_at.map(|s| (now - s).num_seconds()),
            current_time: now,
            jobs,
        })
    }
}

/// The next wall-clock instant a daily `HH:MM` job fires after `now`.
fn next_fire(now: NaiveDateTime, hhmm: &str) -> Option<NaiveDateTime> {
    let time = parse_hhmm(hhmm).ok()?;
    let today_fire = now.date().and_time(time);
    if now < today_fire {
        Some(today_fire)
    } else {
        Some((now.date() + Days::new(1)).and_time(time))
    }
}

/// Settings-driven helper used by status consumers: whether a roll is
/// currently owed to the operator.
pub fn roll_owed(settings: &Settings, today: NaiveDate) -> bool {
    settings.pending_roll || settings.last_roll_date.map_or(true, |d| d < today)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::WorkItem;
    use tempfile::TempDir;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn scheduler_over<'a>(store: &'a Store, dir: &TempDir) -> Scheduler<'a> {
        let backups = BackupManager::new(store, dir.path().join("backups"));
        Scheduler::new(store, backups)
    }

    fn seed_tokens(store: &Store, penalty: &str, roll: &str) {
        let view = store.view();
        let mut settings = view.settings().unwrap();
        settings.last_penalty_date = Some(d(penalty));
        settings.last_roll_date = Some(d(roll));
        view.update_settings(&settings).unwrap();
    }

    #[test]
    fn penalty_job_fires_once_per_day() {
        let dir = TempDir::new().unwrap();
        let store = Store::open(dir.path().join("dayroll.db")).unwrap();
        seed_tokens(&store, "2025-03-08", "2025-03-10");
        let mut scheduler = scheduler_over(&store, &dir);

        // Before the configured minute: nothing.
        scheduler.tick(at("2025-03-10 00:00:30"));
        assert_eq!(scheduler.penalty_stats.total_executions, 0);

        // At 00:01 the gap (the 9th) is finalized.
        scheduler.tick(at("2025-03-10 00:01:30"));
        assert_eq!(scheduler.penalty_stats.total_executions, 1);
        let settings = store.view().settings().unwrap();
        assert_eq!(settings.last_penalty_date, Some(d("2025-03-09")));
        assert!(store.view().ledger(d("2025-03-09")).unwrap().unwrap().finalized);

        // Later ticks the same day are no-ops.
        scheduler.tick(at("2025-03-10 12:00:00"));
        scheduler.tick(at("2025-03-10 18:00:00"));
        assert_eq!(scheduler.penalty_stats.total_executions, 1);
        assert_eq!(scheduler.penalty_stats.total_checks, 4);

        // The next day it fires again.
        scheduler.tick(at("2025-03-11 00:02:00"));
        assert_eq!(scheduler.penalty_stats.total_executions, 2);
    }

    #[test]
    fn auto_roll_fires_at_configured_time() {
        let dir = TempDir::new().unwrap();
        let store = Store::open(dir.path().join("dayroll.db")).unwrap();
        store
            .view()
            .insert_item(&WorkItem::new("task", at("2025-03-09 08:00:00")))
            .unwrap();
        let view = store.view();
        let mut settings = view.settings().unwrap();
        settings.auto_roll_enabled = true;
        settings.last_penalty_date = Some(d("2025-03-09"));
        view.update_settings(&settings).unwrap();

        let mut scheduler = scheduler_over(&store, &dir);
        scheduler.tick(at("2025-03-10 05:59:00"));
        assert_eq!(scheduler.roll_stats.total_executions, 0);

        scheduler.tick(at("2025-03-10 06:00:30"));
        assert_eq!(scheduler.roll_stats.total_executions, 1);
        let settings = store.view().settings().unwrap();
        assert_eq!(settings.last_roll_date, Some(d("2025-03-10")));
        assert!(!settings.pending_roll);

        // Idempotent within the day.
        scheduler.tick(at("2025-03-10 06:01:30"));
        assert_eq!(scheduler.roll_stats.total_executions, 1);
    }

    #[test]
    fn auto_backup_respects_interval() {
        let dir = TempDir::new().unwrap();
        let store = Store::open(dir.path().join("dayroll.db")).unwrap();
        seed_tokens(&store, "2025-03-09", "2025-03-10");
        let mut scheduler = scheduler_over(&store, &dir);

        scheduler.tick(at("2025-03-10 03:00:30"));
        assert_eq!(scheduler.backup_stats.total_executions, 1);
        assert_eq!(store.view().list_backups().unwrap().len(), 1);

        // Same day again: interval of 1 day not yet elapsed.
        scheduler.tick(at("2025-03-10 04:00:00"));
        assert_eq!(scheduler.backup_stats.total_executions, 1);

        scheduler.tick(at("2025-03-11 03:01:00"));
        assert_eq!(scheduler.backup_stats.total_executions, 2);
    }

    #[test]
    fn failed_job_reports_error_and_keeps_retrying() {
        // A memory store has no file to back up, so the backup job fails
        // identically every tick: the ERROR state after two in a row.
        let store = Store::open_memory().unwrap();
        seed_tokens(&store, "2025-03-09", "2025-03-10");
        let dir = TempDir::new().unwrap();
        let mut scheduler = scheduler_over(&store, &dir);

        scheduler.tick(at("2025-03-10 03:00:30"));
        assert!(scheduler.backup_stats.last_error.is_some());
        assert!(!scheduler.backup_stats.in_error_state());

        scheduler.tick(at("2025-03-10 03:01:30"));
        assert!(scheduler.backup_stats.in_error_state());
        // Token never advanced.
        assert!(store.view().settings().unwrap().last_backup_date.is_none());
    }

    #[test]
    fn disabled_jobs_never_fire() {
        let dir = TempDir::new().unwrap();
        let store = Store::open(dir.path().join("dayroll.db")).unwrap();
        let view = store.view();
        let mut settings = view.settings().unwrap();
        settings.auto_penalties_enabled = false;
        settings.auto_backup_enabled = false;
        settings.auto_roll_enabled = false;
        view.update_settings(&settings).unwrap();

        let mut scheduler = scheduler_over(&store, &dir);
        scheduler.tick(at("2025-03-10 12:00:00"));
        assert_eq!(scheduler.penalty_stats.total_executions, 0);
        assert_eq!(scheduler.roll_stats.total_executions, 0);
        assert_eq!(scheduler.backup_stats.total_executions, 0);
        assert_eq!(scheduler.penalty_stats.total_checks, 1);
    }

    #[test]
    fn status_reports_next_fire_times() {
        let dir = TempDir::new().unwrap();
        let store = Store::open(dir.path().join("dayroll.db")).unwrap();
        let mut scheduler = scheduler_over(&store, &dir);
        scheduler.tick(at("2025-03-10 12:00:00"));

        let status = scheduler.status(at("2025-03-10 12:00:05")).unwrap();
        assert_eq!(status.jobs.len(), 3);
        let penalty = &status.jobs[0];
        assert_eq!(penalty.name, "auto_penalty");
        // 00:01 has passed today: next fire is tomorrow.
        assert_eq!(penalty.next_fire, Some(at("2025-03-11 00:01:00")));
        let backup = &status.jobs[2];
        // 03:00 has passed: tomorrow as well.
        assert_eq!(backup.next_fire, Some(at("2025-03-11 03:00:00")));
        assert_eq!(status.uptime_seconds, Some(5));
    }

    #[test]
    fn crash_restart_does_not_duplicate_penalties() {
        let dir = TempDir::new().unwrap();
        let store = Store::open(dir.path().join("dayroll.db")).unwrap();
        seed_tokens(&store, "2025-03-08", "2025-03-10");

        let mut scheduler = scheduler_over(&store, &dir);
        scheduler.tick(at("2025-03-10 00:02:00"));
        let penalty_after_first = store
            .view()
            .ledger(d("2025-03-09"))
            .unwrap()
            .unwrap()
            .points_penalty;

        // "Restart": fresh scheduler, same store. In-memory counters are
        // gone but the persisted token prevents double finalize.
        let mut scheduler = scheduler_over(&store, &dir);
        scheduler.tick(at("2025-03-10 00:03:00"));
        assert_eq!(scheduler.penalty_stats.total_executions, 0);
        let penalty_after_second = store
            .view()
            .ledger(d("2025-03-09"))
            .unwrap()
            .unwrap()
            .points_penalty;
        assert_eq!(penalty_after_first, penalty_after_second);
    }

    #[test]
    fn next_fire_rolls_to_tomorrow() {
        assert_eq!(
            next_fire(at("2025-03-10 02:59:00"), "03:00"),
            Some(at("2025-03-10 03:00:00"))
        );
        assert_eq!(
            next_fire(at("2025-03-10 03:00:00"), "03:00"),
            Some(at("2025-03-11 03:00:00"))
        );
        assert!(next_fire(at("2025-03-10 03:00:00"), "bogus").is_none());
    }
}
