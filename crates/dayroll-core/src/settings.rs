//! Persisted settings: every tunable coefficient and schedule knob,
//! plus the idempotence tokens the scheduler keys off.
//!
//! The settings row is a lazily-created singleton. Defaults below are the
//! documented defaults; the store backfills them when new columns appear.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::dates::{parse_hhmm, DateContext};
use crate::error::Result;

/// Application settings singleton.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    // Planning
    #[serde(default = "default_max_tasks_per_day")]
    pub max_tasks_per_day: i64,
    #[serde(default = "default_critical_days")]
    pub critical_days: i64,

    // Reward coefficients
    #[serde(default = "default_points_per_task_base")]
    pub points_per_task_base: i64,
    #[serde(default = "default_points_per_habit_base")]
    pub points_per_habit_base: i64,
    #[serde(default = "default_routine_points_fixed")]
    pub routine_points_fixed: i64,
    #[serde(default = "default_energy_mult_base")]
    pub energy_mult_base: f64,
    #[serde(default = "default_energy_mult_step")]
    pub energy_mult_step: f64,
    #[serde(default = "default_streak_log_factor")]
    pub streak_log_factor: f64,
    #[serde(default = "default_max_streak_bonus_days")]
    pub max_streak_bonus_days: i64,
    #[serde(default = "default_minutes_per_energy_unit")]
    pub minutes_per_energy_unit: i64,
    #[serde(default = "default_min_work_time_seconds")]
    pub min_work_time_seconds: i64,
    #[serde(default = "default_time_efficiency_weight")]
    pub time_efficiency_weight: f64,
    #[serde(default = "default_completion_bonus_full")]
    pub completion_bonus_full: f64,
    #[serde(default = "default_completion_bonus_good")]
    pub completion_bonus_good: f64,

    // Penalties
    #[serde(default = "default_idle_penalty")]
    pub idle_penalty: i64,
    #[serde(default = "default_incomplete_day_penalty")]
    pub incomplete_day_penalty: i64,
    #[serde(default = "default_incomplete_day_threshold")]
    pub incomplete_day_threshold: f64,
    #[serde(default = "default_incomplete_threshold_severe")]
    pub incomplete_threshold_severe: f64,
    #[serde(default = "default_incomplete_penalty_severe")]
    pub incomplete_penalty_severe: i64,
    #[serde(default = "default_missed_habit_penalty_base")]
    pub missed_habit_penalty_base: i64,
    #[serde(default = "default_progressive_penalty_factor")]
    pub progressive_penalty_factor: f64,
    #[serde(default = "default_progressive_penalty_max")]
    pub progressive_penalty_max: f64,
    #[serde(default = "default_penalty_streak_reset_days")]
    pub penalty_streak_reset_days: i64,

    // Day boundary
    #[serde(default)]
    pub day_start_enabled: bool,
    #[serde(default = "default_day_start_time")]
    pub day_start_time: String,

    // Schedule
    #[serde(default = "default_roll_available_time")]
    pub roll_available_time: String,
    #[serde(default = "default_true")]
    pub auto_penalties_enabled: bool,
    #[serde(default = "default_penalty_time")]
    pub penalty_time: String,
    #[serde(default)]
    pub auto_roll_enabled: bool,
    #[serde(default = "default_auto_roll_time")]
    pub auto_roll_time: String,
    #[serde(default = "default_true")]
    pub auto_backup_enabled: bool,
    #[serde(default = "default_backup_time")]
    pub backup_time: String,
    #[serde(default = "default_backup_interval_days")]
    pub backup_interval_days: i64,
    #[serde(default = "default_backup_keep_local_count")]
    pub backup_keep_local_count: i64,

    // State (idempotence tokens and tracker bookkeeping)
    #[serde(default)]
    pub last_roll_date: Option<NaiveDate>,
    #[serde(default)]
    pub last_penalty_date: Option<NaiveDate>,
    #[serde(default)]
    pub last_backup_date: Option<NaiveDateTime>,
    #[serde(default)]
    pub pending_roll: bool,
    /// Id of the single active item, if any. Maintained by the tracker
    /// in the same transaction as the item rows.
    #[serde(default)]
    pub active_item_id: Option<i64>,
}

fn default_max_tasks_per_day() -> i64 {
    10
}
fn default_critical_days() -> i64 {
    2
}
fn default_points_per_task_base() -> i64 {
    10
}
fn default_points_per_habit_base() -> i64 {
    10
}
fn default_routine_points_fixed() -> i64 {
    6
}
fn default_energy_mult_base() -> f64 {
    0.6
}
fn default_energy_mult_step() -> f64 {
    0.2
}
fn default_streak_log_factor() -> f64 {
    0.15
}
fn default_max_streak_bonus_days() -> i64 {
    100
}
fn default_minutes_per_energy_unit() -> i64 {
    20
}
fn default_min_work_time_seconds() -> i64 {
    120
}
fn default_time_efficiency_weight() -> f64 {
    0.5
}
fn default_completion_bonus_full() -> f64 {
    0.10
}
fn default_completion_bonus_good() -> f64 {
    0.05
}
fn default_idle_penalty() -> i64 {
    30
}
fn default_incomplete_day_penalty() -> i64 {
    10
}
fn default_incomplete_day_threshold() -> f64 {
    0.6
}
fn default_incomplete_threshold_severe() -> f64 {
    0.4
}
fn default_incomplete_penalty_severe() -> i64 {
    15
}
fn default_missed_habit_penalty_base() -> i64 {
    15
}
fn default_progressive_penalty_factor() -> f64 {
    0.1
}
fn default_progressive_penalty_max() -> f64 {
    1.5
}
fn default_penalty_streak_reset_days() -> i64 {
    2
}
fn default_day_start_time() -> String {
    "06:00".into()
}
fn default_roll_available_time() -> String {
    "00:00".into()
}
fn default_penalty_time() -> String {
    "00:01".into()
}
fn default_auto_roll_time() -> String {
    "06:00".into()
}
fn default_backup_time() -> String {
    "03:00".into()
}
fn default_backup_interval_days() -> i64 {
    1
}
fn default_backup_keep_local_count() -> i64 {
    10
}
fn default_true() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_tasks_per_day: default_max_tasks_per_day(),
            critical_days: default_critical_days(),
            points_per_task_base: default_points_per_task_base(),
            points_per_habit_base: default_points_per_habit_base(),
            routine_points_fixed: default_routine_points_fixed(),
            energy_mult_base: default_energy_mult_base(),
            energy_mult_step: default_energy_mult_step(),
            streak_log_factor: default_streak_log_factor(),
            max_streak_bonus_days: default_max_streak_bonus_days(),
            minutes_per_energy_unit: default_minutes_per_energy_unit(),
            min_work_time_seconds: default_min_work_time_seconds(),
            time_efficiency_weight: default_time_efficiency_weight(),
            completion_bonus_full: default_completion_bonus_full(),
            completion_bonus_good: default_completion_bonus_good(),
            idle_penalty: default_idle_penalty(),
            incomplete_day_penalty: default_incomplete_day_penalty(),
            incomplete_day_threshold: default_incomplete_day_threshold(),
            incomplete_threshold_severe: default_incomplete_threshold_severe(),
            incomplete_penalty_severe: default_incomplete_penalty_severe(),
            missed_habit_penalty_base: default_missed_habit_penalty_base(),
            progressive_penalty_factor: default_progressive_penalty_factor(),
            progressive_penalty_max: default_progressive_penalty_max(),
            penalty_streak_reset_days: default_penalty_streak_reset_days(),
            day_start_enabled: false,
            day_start_time: default_day_start_time(),
            roll_available_time: default_roll_available_time(),
            auto_penalties_enabled: true,
            penalty_time: default_penalty_time(),
            auto_roll_enabled: false,
            auto_roll_time: default_auto_roll_time(),
            auto_backup_enabled: true,
            backup_time: default_backup_time(),
            backup_interval_days: default_backup_interval_days(),
            backup_keep_local_count: default_backup_keep_local_count(),
            last_roll_date: None,
            last_penalty_date: None,
            last_backup_date: None,
            pending_roll: false,
            active_item_id: None,
        }
    }
}

impl Settings {
    /// Date context derived from the day-boundary settings.
    pub fn date_context(&self) -> Result<DateContext> {
        DateContext::from_settings(self.day_start_enabled, &self.day_start_time)
    }

    /// Validate every time-string field. Called on settings update so a
    /// bad `HH:MM` never reaches the scheduler.
    pub fn validate(&self) -> Result<()> {
        for s in [
            &self.day_start_time,
            &self.roll_available_time,
            &self.penalty_time,
            &self.auto_roll_time,
            &self.backup_time,
        ] {
            parse_hhmm(s)?;
        }
        Ok(())
    }
}
