//! Daily point ledger, goals, rest days, and backup metadata.
//!
//! The ledger is the source of truth for the total score: there is no
//! separately stored running total, only the sum of `daily_total` across
//! rows. Each row also carries a JSON breakdown (`DayDetails`) so a day
//! can be explained after the fact.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::item::HabitType;

/// One row per effective date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayLedger {
    pub date: NaiveDate,
    pub points_earned: i64,
    pub points_penalty: i64,
    /// `points_earned - points_penalty`, recomputed on every mutation.
    pub daily_total: i64,
    pub tasks_completed: i64,
    /// Size of the agenda chosen at Roll time. Never touched by rewards.
    pub tasks_planned: i64,
    pub habits_completed: i64,
    pub habits_total: i64,
    /// Set at finalize: `min(tasks_completed / tasks_planned, 1.0)`.
    pub completion_rate: f64,
    /// Consecutive penalized days as of this date.
    pub penalty_streak: i64,
    /// True once day-finalization has run for this date.
    pub finalized: bool,
    /// JSON `DayDetails` breakdown.
    pub details: Option<String>,
}

impl DayLedger {
    pub fn new(date: NaiveDate) -> Self {
        DayLedger {
            date,
            points_earned: 0,
            points_penalty: 0,
            daily_total: 0,
            tasks_completed: 0,
            tasks_planned: 0,
            habits_completed: 0,
            habits_total: 0,
            completion_rate: 0.0,
            penalty_streak: 0,
            finalized: false,
            details: None,
        }
    }

    pub fn recompute_total(&mut self) {
        self.daily_total = self.points_earned - self.points_penalty;
    }

    /// Decode the JSON breakdown, tolerating absent or corrupt payloads.
    pub fn day_details(&self) -> DayDetails {
        self.details
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok())
            .unwrap_or_default()
    }

    pub fn set_day_details(&mut self, details: &DayDetails) {
        self.details = serde_json::to_string(details).ok();
    }
}

/// Per-day breakdown stored as JSON on the ledger row.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DayDetails {
    #[serde(default)]
    pub completions: Vec<CompletionEntry>,
    #[serde(default)]
    pub penalty_breakdown: Option<PenaltyBreakdown>,
}

/// One completion event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionEntry {
    pub item_id: i64,
    pub description: String,
    pub is_habit: bool,
    pub points: i64,
    pub at: NaiveDateTime,
}

/// How a day's penalty total was assembled.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PenaltyBreakdown {
    pub idle_penalty: i64,
    pub incomplete_penalty: i64,
    pub missed_habits_penalty: i64,
    pub progressive_multiplier: f64,
    pub total_penalty: i64,
    #[serde(default)]
    pub missed_habits: Vec<MissedHabit>,
}

/// A habit occurrence that went unfinished on its due date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissedHabit {
    pub item_id: i64,
    pub description: String,
    pub habit_type: HabitType,
    pub penalty: i64,
}

/// Goal kinds: a points target or completing every task in a project.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GoalKind {
    Points { target_points: i64 },
    ProjectCompletion { project_name: String },
}

/// An operator-defined reward goal. `achieved` is monotonic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Goal {
    pub id: i64,
    pub kind: GoalKind,
    pub reward_description: String,
    pub deadline: Option<NaiveDate>,
    pub achieved: bool,
    pub achieved_date: Option<NaiveDate>,
    pub reward_claimed: bool,
    pub reward_claimed_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

/// A date exempt from every penalty rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestDay {
    pub id: i64,
    pub date: NaiveDate,
    pub description: Option<String>,
}

/// auto = scheduler-driven, manual = operator-requested.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackupKind {
    Auto,
    Manual,
}

impl BackupKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackupKind::Auto => "auto",
            BackupKind::Manual => "manual",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "auto" => Some(BackupKind::Auto),
            "manual" => Some(BackupKind::Manual),
            _ => None,
        }
    }
}

/// Metadata for one backup file; the file itself lives on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupRecord {
    pub id: i64,
    pub filename: String,
    pub created_at: NaiveDateTime,
    pub size_bytes: i64,
    pub kind: BackupKind,
    pub uploaded_offsite: bool,
}
