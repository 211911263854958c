//! # Dayroll Core Library
//!
//! Core business logic for dayroll, a single-operator productivity
//! engine that rewards and punishes sustained task and habit completion.
//! It follows a CLI-first philosophy: every operation is available
//! through the library API, with the CLI binary being a thin surface
//! over it.
//!
//! ## Architecture
//!
//! - **DateContext**: maps wall-clock instants to the operator's
//!   effective date, honoring a configurable day boundary
//! - **Store**: transactional SQLite persistence with automatic
//!   additive schema migrations
//! - **WorkTracker**: the start/stop/complete state machine with a
//!   single-active-item invariant and time accumulation
//! - **Scoring**: Balanced Progress v2.0 rewards, day-finalize
//!   penalties, progressive penalty streaks, goal checks
//! - **Planner**: the once-per-day Roll that selects the agenda
//! - **Scheduler**: a tick-driven wall-clock loop firing auto-penalty,
//!   auto-roll, and auto-backup with per-day idempotence
//!
//! Everything clock-dependent takes an explicit `now`
//! (`NaiveDateTime`); production callers pass
//! `Local::now().naive_local()`.

pub mod backup;
pub mod dates;
pub mod error;
pub mod item;
pub mod ledger;
pub mod planner;
pub mod scheduler;
pub mod scoring;
pub mod settings;
pub mod storage;
pub mod tracker;

pub use backup::BackupManager;
pub use dates::{parse_hhmm, DateContext};
pub use error::{BackupError, CoreError, Result, StoreError};
pub use item::{HabitType, ItemStatus, Recurrence, WorkItem};
pub use ledger::{
    BackupKind, BackupRecord, CompletionEntry, DayDetails, DayLedger, Goal, GoalKind, MissedHabit,
    PenaltyBreakdown, RestDay,
};
pub use planner::{Planner, RollOutcome};
pub use scheduler::{JobStats, JobStatus, Scheduler, SchedulerStatus};
pub use scoring::{FinalizeSummary, Projection, ScoringEngine};
pub use settings::Settings;
pub use storage::{data_dir, Store, Tx};
pub use tracker::{CompletionOutcome, WorkStats, WorkTracker};
