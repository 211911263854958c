//! SQLite-backed store for items, settings, ledgers, goals, rest days,
//! and backup metadata.
//!
//! The store owns every entity; other components only touch rows through
//! it. Simple reads go through [`Store::view`]; every compound operation
//! (start, complete, roll, finalize) runs inside [`Store::tx`] so it is
//! atomic and rolls back in full on error.

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::error::{CoreError, Result, StoreError};
use crate::item::{HabitType, ItemStatus, Recurrence, WorkItem};
use crate::ledger::{BackupKind, BackupRecord, DayLedger, Goal, GoalKind, RestDay};
use crate::settings::Settings;

use super::migrations;

const DATE_FMT: &str = "%Y-%m-%d";
const DATETIME_FMT: &str = "%Y-%m-%dT%H:%M:%S";

/// SQLite store. One connection, exclusive ownership of the schema.
pub struct Store {
    conn: Connection,
    path: Option<PathBuf>,
}

impl Store {
    /// Open (and migrate) the database at `path`.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path).map_err(|source| StoreError::OpenFailed {
            path: path.clone(),
            source,
        })?;
        let store = Self {
            conn,
            path: Some(path),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Open the database at `~/.dayroll/dayroll.db`.
    pub fn open_default() -> Result<Self> {
        Self::open(super::data_dir().join("dayroll.db"))
    }

    /// Open an in-memory database (tests and dry runs).
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(StoreError::from)?;
        let store = Self { conn, path: None };
        store.init_schema()?;
        Ok(store)
    }

    /// Path of the database file, if file-backed.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Raw connection access for migrations and schema tests.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Autocommit view for simple reads and single-row writes.
    pub fn view(&self) -> Tx<'_> {
        Tx { conn: &self.conn }
    }

    /// Run `f` inside one transaction. Commits on `Ok`, rolls back on
    /// `Err`. This is the unit of atomicity for every compound core
    /// operation.
    pub fn tx<T>(&self, f: impl FnOnce(&Tx<'_>) -> Result<T>) -> Result<T> {
        let tx = self.conn.unchecked_transaction().map_err(StoreError::from)?;
        let view = Tx { conn: &*tx };
        let out = f(&view)?;
        tx.commit().map_err(StoreError::from)?;
        Ok(out)
    }

    fn init_schema(&self) -> Result<()> {
        // Baseline (v1) schema; later columns and tables are added by
        // the migration chain so old databases upgrade in place.
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS items (
                    id                  INTEGER PRIMARY KEY AUTOINCREMENT,
                    description         TEXT NOT NULL,
                    project             TEXT,
                    priority            INTEGER NOT NULL DEFAULT 5,
                    energy              INTEGER NOT NULL DEFAULT 3,
                    status              TEXT NOT NULL DEFAULT 'pending',
                    is_habit            INTEGER NOT NULL DEFAULT 0,
                    is_today            INTEGER NOT NULL DEFAULT 0,
                    due_date            TEXT,
                    created_at          TEXT NOT NULL,
                    started_at          TEXT,
                    completed_at        TEXT,
                    time_spent          INTEGER NOT NULL DEFAULT 0,
                    depends_on          INTEGER REFERENCES items(id) ON DELETE SET NULL,
                    habit_type          TEXT,
                    recurrence_type     TEXT NOT NULL DEFAULT 'none',
                    recurrence_interval INTEGER NOT NULL DEFAULT 1,
                    recurrence_days     TEXT,
                    streak              INTEGER NOT NULL DEFAULT 0,
                    last_completed_date TEXT,
                    daily_target        INTEGER NOT NULL DEFAULT 1,
                    daily_completed     INTEGER NOT NULL DEFAULT 0
                );
                CREATE INDEX IF NOT EXISTS idx_items_status ON items(status);
                CREATE INDEX IF NOT EXISTS idx_items_habit_due ON items(is_habit, due_date);

                CREATE TABLE IF NOT EXISTS settings (
                    id                          INTEGER PRIMARY KEY CHECK (id = 1),
                    max_tasks_per_day           INTEGER NOT NULL,
                    critical_days               INTEGER NOT NULL,
                    points_per_task_base        INTEGER NOT NULL,
                    points_per_habit_base       INTEGER NOT NULL,
                    routine_points_fixed        INTEGER NOT NULL,
                    energy_mult_base            REAL NOT NULL,
                    energy_mult_step            REAL NOT NULL,
                    streak_log_factor           REAL NOT NULL,
                    max_streak_bonus_days       INTEGER NOT NULL,
                    minutes_per_energy_unit     INTEGER NOT NULL,
                    min_work_time_seconds       INTEGER NOT NULL,
                    time_efficiency_weight      REAL NOT NULL,
                    completion_bonus_full       REAL NOT NULL,
                    completion_bonus_good       REAL NOT NULL,
                    idle_penalty                INTEGER NOT NULL,
                    incomplete_day_penalty      INTEGER NOT NULL,
                    incomplete_day_threshold    REAL NOT NULL,
                    incomplete_threshold_severe REAL NOT NULL,
                    incomplete_penalty_severe   INTEGER NOT NULL,
                    missed_habit_penalty_base   INTEGER NOT NULL,
                    progressive_penalty_factor  REAL NOT NULL,
                    progressive_penalty_max     REAL NOT NULL,
                    penalty_streak_reset_days   INTEGER NOT NULL,
                    day_start_enabled           INTEGER NOT NULL,
                    day_start_time              TEXT NOT NULL,
                    roll_available_time         TEXT NOT NULL,
                    auto_penalties_enabled      INTEGER NOT NULL,
                    penalty_time                TEXT NOT NULL,
                    auto_roll_enabled           INTEGER NOT NULL,
                    auto_roll_time              TEXT NOT NULL,
                    auto_backup_enabled         INTEGER NOT NULL,
                    backup_time                 TEXT NOT NULL,
                    backup_interval_days        INTEGER NOT NULL,
                    backup_keep_local_count     INTEGER NOT NULL,
                    last_roll_date              TEXT,
                    last_penalty_date           TEXT,
                    last_backup_date            TEXT
                );

                CREATE TABLE IF NOT EXISTS day_ledger (
                    date             TEXT PRIMARY KEY,
                    points_earned    INTEGER NOT NULL DEFAULT 0,
                    points_penalty   INTEGER NOT NULL DEFAULT 0,
                    daily_total      INTEGER NOT NULL DEFAULT 0,
                    tasks_completed  INTEGER NOT NULL DEFAULT 0,
                    tasks_planned    INTEGER NOT NULL DEFAULT 0,
                    habits_completed INTEGER NOT NULL DEFAULT 0,
                    habits_total     INTEGER NOT NULL DEFAULT 0,
                    completion_rate  REAL NOT NULL DEFAULT 0,
                    penalty_streak   INTEGER NOT NULL DEFAULT 0
                );

                CREATE TABLE IF NOT EXISTS goals (
                    id                 INTEGER PRIMARY KEY AUTOINCREMENT,
                    kind               TEXT NOT NULL,
                    target_points      INTEGER,
                    project_name       TEXT,
                    reward_description TEXT NOT NULL,
                    deadline           TEXT,
                    achieved           INTEGER NOT NULL DEFAULT 0,
                    achieved_date      TEXT,
                    reward_claimed     INTEGER NOT NULL DEFAULT 0,
                    reward_claimed_at  TEXT,
                    created_at         TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS rest_days (
                    id          INTEGER PRIMARY KEY AUTOINCREMENT,
                    date        TEXT NOT NULL UNIQUE,
                    description TEXT
                );

                CREATE TABLE IF NOT EXISTS backups (
                    id               INTEGER PRIMARY KEY AUTOINCREMENT,
                    filename         TEXT NOT NULL,
                    created_at       TEXT NOT NULL,
                    size_bytes       INTEGER NOT NULL DEFAULT 0,
                    kind             TEXT NOT NULL DEFAULT 'auto',
                    uploaded_offsite INTEGER NOT NULL DEFAULT 0
                );",
            )
            .map_err(StoreError::from)?;

        migrations::migrate(&self.conn).map_err(|e| StoreError::MigrationFailed(e.to_string()))?;
        Ok(())
    }
}

/// A view over one connection or transaction. All typed queries live here
/// so the same code serves autocommit reads and transactional writes.
pub struct Tx<'a> {
    conn: &'a Connection,
}

// ── encoding helpers ────────────────────────────────────────────────

fn fmt_date(d: NaiveDate) -> String {
    d.format(DATE_FMT).to_string()
}

fn fmt_dt(dt: NaiveDateTime) -> String {
    dt.format(DATETIME_FMT).to_string()
}

fn decode_err(e: impl std::error::Error + Send + Sync + 'static) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
}

fn parse_date(s: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FMT).map_err(decode_err)
}

fn parse_dt(s: &str) -> rusqlite::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, DATETIME_FMT).map_err(decode_err)
}

fn opt_date(v: Option<String>) -> rusqlite::Result<Option<NaiveDate>> {
    v.as_deref().map(parse_date).transpose()
}

fn opt_dt(v: Option<String>) -> rusqlite::Result<Option<NaiveDateTime>> {
    v.as_deref().map(parse_dt).transpose()
}

fn corrupt(what: &str, value: &str) -> rusqlite::Error {
    decode_err(std::io::Error::new(
        std::io::ErrorKind::InvalidData,
        format!("unknown {what} '{value}'"),
    ))
}

const ITEM_COLUMNS: &str = "id, description, project, priority, energy, status, is_habit, is_today,
     due_date, created_at, started_at, completed_at, time_spent, depends_on, habit_type,
     recurrence_type, recurrence_interval, recurrence_days, streak, last_completed_date,
     daily_target, daily_completed";

fn item_from_row(row: &Row<'_>) -> rusqlite::Result<WorkItem> {
    let status_str: String = row.get(5)?;
    let status = ItemStatus::parse(&status_str).ok_or_else(|| corrupt("status", &status_str))?;

    let habit_type = row
        .get::<_, Option<String>>(14)?
        .map(|s| HabitType::parse(&s).ok_or_else(|| corrupt("habit_type", &s)))
        .transpose()?;

    let rec_type: String = row.get(15)?;
    let rec_interval: i64 = row.get(16)?;
    let rec_days: Option<String> = row.get(17)?;
    let recurrence = decode_recurrence(&rec_type, rec_interval, rec_days.as_deref())?;

    Ok(WorkItem {
        id: row.get(0)?,
        description: row.get(1)?,
        project: row.get(2)?,
        priority: row.get(3)?,
        energy: row.get(4)?,
        status,
        is_habit: row.get(6)?,
        is_today: row.get(7)?,
        due_date: opt_date(row.get(8)?)?,
        created_at: parse_dt(&row.get::<_, String>(9)?)?,
        started_at: opt_dt(row.get(10)?)?,
        completed_at: opt_dt(row.get(11)?)?,
        time_spent: row.get(12)?,
        depends_on: row.get(13)?,
        habit_type,
        recurrence,
        streak: row.get(18)?,
        last_completed_date: opt_date(row.get(19)?)?,
        daily_target: row.get(20)?,
        daily_completed: row.get(21)?,
    })
}

fn decode_recurrence(
    kind: &str,
    interval: i64,
    days: Option<&str>,
) -> rusqlite::Result<Recurrence> {
    match kind {
        "none" => Ok(Recurrence::None),
        "daily" => Ok(Recurrence::Daily),
        "every_n_days" => Ok(Recurrence::EveryNDays {
            interval: interval.max(1) as u32,
        }),
        "weekly" => {
            let days: BTreeSet<u8> = match days {
                Some(raw) => serde_json::from_str(raw).map_err(decode_err)?,
                None => BTreeSet::new(),
            };
            Ok(Recurrence::Weekly { days })
        }
        other => Err(corrupt("recurrence_type", other)),
    }
}

/// (type, interval, days-json) column triple for a recurrence.
fn encode_recurrence(rec: &Recurrence) -> (&'static str, i64, Option<String>) {
    match rec {
        Recurrence::None => ("none", 1, None),
        Recurrence::Daily => ("daily", 1, None),
        Recurrence::EveryNDays { interval } => ("every_n_days", *interval as i64, None),
        Recurrence::Weekly { days } => (
            "weekly",
            1,
            Some(serde_json::to_string(days).unwrap_or_else(|_| "[]".into())),
        ),
    }
}

const LEDGER_COLUMNS: &str = "date, points_earned, points_penalty, daily_total, tasks_completed,
     tasks_planned, habits_completed, habits_total, completion_rate, penalty_streak,
     finalized, details";

fn ledger_from_row(row: &Row<'_>) -> rusqlite::Result<DayLedger> {
    Ok(DayLedger {
        date: parse_date(&row.get::<_, String>(0)?)?,
        points_earned: row.get(1)?,
        points_penalty: row.get(2)?,
        daily_total: row.get(3)?,
        tasks_completed: row.get(4)?,
        tasks_planned: row.get(5)?,
        habits_completed: row.get(6)?,
        habits_total: row.get(7)?,
        completion_rate: row.get(8)?,
        penalty_streak: row.get(9)?,
        finalized: row.get(10)?,
        details: row.get(11)?,
    })
}

const GOAL_COLUMNS: &str = "id, kind, target_points, project_name, reward_description, deadline,
     achieved, achieved_date, reward_claimed, reward_claimed_at, created_at";

fn goal_from_row(row: &Row<'_>) -> rusqlite::Result<Goal> {
    let kind_str: String = row.get(1)?;
    let kind = match kind_str.as_str() {
        "points" => GoalKind::Points {
            target_points: row.get::<_, Option<i64>>(2)?.unwrap_or(0),
        },
        "project_completion" => GoalKind::ProjectCompletion {
            project_name: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        },
        other => return Err(corrupt("goal kind", other)),
    };
    Ok(Goal {
        id: row.get(0)?,
        kind,
        reward_description: row.get(4)?,
        deadline: opt_date(row.get(5)?)?,
        achieved: row.get(6)?,
        achieved_date: opt_date(row.get(7)?)?,
        reward_claimed: row.get(8)?,
        reward_claimed_at: opt_dt(row.get(9)?)?,
        created_at: parse_dt(&row.get::<_, String>(10)?)?,
    })
}

fn backup_from_row(row: &Row<'_>) -> rusqlite::Result<BackupRecord> {
    let kind_str: String = row.get(4)?;
    Ok(BackupRecord {
        id: row.get(0)?,
        filename: row.get(1)?,
        created_at: parse_dt(&row.get::<_, String>(2)?)?,
        size_bytes: row.get(3)?,
        kind: BackupKind::parse(&kind_str).ok_or_else(|| corrupt("backup kind", &kind_str))?,
        uploaded_offsite: row.get(5)?,
    })
}

/// A habit occurrence purged by the planner before completion.
#[derive(Debug, Clone)]
pub struct HabitSkip {
    pub item_id: i64,
    pub date: NaiveDate,
    pub habit_type: HabitType,
    /// Description at query time; `None` when the item has been deleted.
    pub description: Option<String>,
}

impl Tx<'_> {
    // ── settings ────────────────────────────────────────────────────

    /// Fetch the settings singleton, creating it with defaults on first
    /// access.
    pub fn settings(&self) -> Result<Settings> {
        let row = self
            .conn
            .query_row(
                "SELECT max_tasks_per_day, critical_days, points_per_task_base,
                        points_per_habit_base, routine_points_fixed, energy_mult_base,
                        energy_mult_step, streak_log_factor, max_streak_bonus_days,
                        minutes_per_energy_unit, min_work_time_seconds, time_efficiency_weight,
                        completion_bonus_full, completion_bonus_good, idle_penalty,
                        incomplete_day_penalty, incomplete_day_threshold,
                        incomplete_threshold_severe, incomplete_penalty_severe,
                        missed_habit_penalty_base, progressive_penalty_factor,
                        progressive_penalty_max, penalty_streak_reset_days, day_start_enabled,
                        day_start_time, roll_available_time, auto_penalties_enabled,
                        penalty_time, auto_roll_enabled, auto_roll_time, auto_backup_enabled,
                        backup_time, backup_interval_days, backup_keep_local_count,
                        last_roll_date, last_penalty_date, last_backup_date, pending_roll,
                        active_item_id
                 FROM settings WHERE id = 1",
                [],
                |row| {
                    Ok(Settings {
                        max_tasks_per_day: row.get(0)?,
                        critical_days: row.get(1)?,
                        points_per_task_base: row.get(2)?,
                        points_per_habit_base: row.get(3)?,
                        routine_points_fixed: row.get(4)?,
                        energy_mult_base: row.get(5)?,
                        energy_mult_step: row.get(6)?,
                        streak_log_factor: row.get(7)?,
                        max_streak_bonus_days: row.get(8)?,
                        minutes_per_energy_unit: row.get(9)?,
                        min_work_time_seconds: row.get(10)?,
                        time_efficiency_weight: row.get(11)?,
                        completion_bonus_full: row.get(12)?,
                        completion_bonus_good: row.get(13)?,
                        idle_penalty: row.get(14)?,
                        incomplete_day_penalty: row.get(15)?,
                        incomplete_day_threshold: row.get(16)?,
                        incomplete_threshold_severe: row.get(17)?,
                        incomplete_penalty_severe: row.get(18)?,
                        missed_habit_penalty_base: row.get(19)?,
                        progressive_penalty_factor: row.get(20)?,
                        progressive_penalty_max: row.get(21)?,
                        penalty_streak_reset_days: row.get(22)?,
                        day_start_enabled: row.get(23)?,
                        day_start_time: row.get(24)?,
                        roll_available_time: row.get(25)?,
                        auto_penalties_enabled: row.get(26)?,
                        penalty_time: row.get(27)?,
                        auto_roll_enabled: row.get(28)?,
                        auto_roll_time: row.get(29)?,
                        auto_backup_enabled: row.get(30)?,
                        backup_time: row.get(31)?,
                        backup_interval_days: row.get(32)?,
                        backup_keep_local_count: row.get(33)?,
                        last_roll_date: opt_date(row.get(34)?)?,
                        last_penalty_date: opt_date(row.get(35)?)?,
                        last_backup_date: opt_dt(row.get(36)?)?,
                        pending_roll: row.get(37)?,
                        active_item_id: row.get(38)?,
                    })
                },
            )
            .optional()
            .map_err(StoreError::from)?;

        match row {
            Some(settings) => Ok(settings),
            None => {
                let defaults = Settings::default();
                self.insert_settings(&defaults)?;
                Ok(defaults)
            }
        }
    }

    fn insert_settings(&self, s: &Settings) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO settings (
                    id, max_tasks_per_day, critical_days, points_per_task_base,
                    points_per_habit_base, routine_points_fixed, energy_mult_base,
                    energy_mult_step, streak_log_factor, max_streak_bonus_days,
                    minutes_per_energy_unit, min_work_time_seconds, time_efficiency_weight,
                    completion_bonus_full, completion_bonus_good, idle_penalty,
                    incomplete_day_penalty, incomplete_day_threshold,
                    incomplete_threshold_severe, incomplete_penalty_severe,
                    missed_habit_penalty_base, progressive_penalty_factor,
                    progressive_penalty_max, penalty_streak_reset_days, day_start_enabled,
                    day_start_time, roll_available_time, auto_penalties_enabled, penalty_time,
                    auto_roll_enabled, auto_roll_time, auto_backup_enabled, backup_time,
                    backup_interval_days, backup_keep_local_count, last_roll_date,
                    last_penalty_date, last_backup_date, pending_roll, active_item_id
                 ) VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
                           ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27,
                           ?28, ?29, ?30, ?31, ?32, ?33, ?34, ?35, ?36, ?37, ?38, ?39)",
                params![
                    s.max_tasks_per_day,
                    s.critical_days,
                    s.points_per_task_base,
                    s.points_per_habit_base,
                    s.routine_points_fixed,
                    s.energy_mult_base,
                    s.energy_mult_step,
                    s.streak_log_factor,
                    s.max_streak_bonus_days,
                    s.minutes_per_energy_unit,
                    s.min_work_time_seconds,
                    s.time_efficiency_weight,
                    s.completion_bonus_full,
                    s.completion_bonus_good,
                    s.idle_penalty,
                    s.incomplete_day_penalty,
                    s.incomplete_day_threshold,
                    s.incomplete_threshold_severe,
                    s.incomplete_penalty_severe,
                    s.missed_habit_penalty_base,
                    s.progressive_penalty_factor,
                    s.progressive_penalty_max,
                    s.penalty_streak_reset_days,
                    s.day_start_enabled,
                    s.day_start_time,
                    s.roll_available_time,
                    s.auto_penalties_enabled,
                    s.penalty_time,
                    s.auto_roll_enabled,
                    s.auto_roll_time,
                    s.auto_backup_enabled,
                    s.backup_time,
                    s.backup_interval_days,
                    s.backup_keep_local_count,
                    s.last_roll_date.map(fmt_date),
                    s.last_penalty_date.map(fmt_date),
                    s.last_backup_date.map(fmt_dt),
                    s.pending_roll,
                    s.active_item_id,
                ],
            )
            .map_err(StoreError::from)?;
        Ok(())
    }

    /// Persist the settings row. The row must already exist (it is
    /// created lazily by [`Tx::settings`]).
    pub fn update_settings(&self, s: &Settings) -> Result<()> {
        let updated = self
            .conn
            .execute(
                "UPDATE settings SET
                    max_tasks_per_day = ?1, critical_days = ?2, points_per_task_base = ?3,
                    points_per_habit_base = ?4, routine_points_fixed = ?5,
                    energy_mult_base = ?6, energy_mult_step = ?7, streak_log_factor = ?8,
                    max_streak_bonus_days = ?9, minutes_per_energy_unit = ?10,
                    min_work_time_seconds = ?11, time_efficiency_weight = ?12,
                    completion_bonus_full = ?13, completion_bonus_good = ?14,
                    idle_penalty = ?15, incomplete_day_penalty = ?16,
                    incomplete_day_threshold = ?17, incomplete_threshold_severe = ?18,
                    incomplete_penalty_severe = ?19, missed_habit_penalty_base = ?20,
                    progressive_penalty_factor = ?21, progressive_penalty_max = ?22,
                    penalty_streak_reset_days = ?23, day_start_enabled = ?24,
                    day_start_time = ?25, roll_available_time = ?26,
                    auto_penalties_enabled = ?27, penalty_time = ?28, auto_roll_enabled = ?29,
                    auto_roll_time = ?30, auto_backup_enabled = ?31, backup_time = ?32,
                    backup_interval_days = ?33, backup_keep_local_count = ?34,
                    last_roll_date = ?35, last_penalty_date = ?36, last_backup_date = ?37,
                    pending_roll = ?38, active_item_id = ?39
                 WHERE id = 1",
                params![
                    s.max_tasks_per_day,
                    s.critical_days,
                    s.points_per_task_base,
                    s.points_per_habit_base,
                    s.routine_points_fixed,
                    s.energy_mult_base,
                    s.energy_mult_step,
                    s.streak_log_factor,
                    s.max_streak_bonus_days,
                    s.minutes_per_energy_unit,
                    s.min_work_time_seconds,
                    s.time_efficiency_weight,
                    s.completion_bonus_full,
                    s.completion_bonus_good,
                    s.idle_penalty,
                    s.incomplete_day_penalty,
                    s.incomplete_day_threshold,
                    s.incomplete_threshold_severe,
                    s.incomplete_penalty_severe,
                    s.missed_habit_penalty_base,
                    s.progressive_penalty_factor,
                    s.progressive_penalty_max,
                    s.penalty_streak_reset_days,
                    s.day_start_enabled,
                    s.day_start_time,
                    s.roll_available_time,
                    s.auto_penalties_enabled,
                    s.penalty_time,
                    s.auto_roll_enabled,
                    s.auto_roll_time,
                    s.auto_backup_enabled,
                    s.backup_time,
                    s.backup_interval_days,
                    s.backup_keep_local_count,
                    s.last_roll_date.map(fmt_date),
                    s.last_penalty_date.map(fmt_date),
                    s.last_backup_date.map(fmt_dt),
                    s.pending_roll,
                    s.active_item_id,
                ],
            )
            .map_err(StoreError::from)?;
        if updated == 0 {
            self.insert_settings(s)?;
        }
        Ok(())
    }

    // ── items ───────────────────────────────────────────────────────

    /// Insert a new item, returning its id. Validates fields and rejects
    /// dependency edges that would form a cycle.
    pub fn insert_item(&self, item: &WorkItem) -> Result<i64> {
        item.validate()?;
        if let Some(dep) = item.depends_on {
            // The new row cannot yet be a target of any edge, so it is
            // enough to require that the dependency exists.
            if self.get_item(dep)?.is_none() {
                return Err(CoreError::NotFound {
                    kind: "item",
                    id: dep,
                });
            }
        }
        let (rec_type, rec_interval, rec_days) = encode_recurrence(&item.recurrence);
        self.conn
            .execute(
                "INSERT INTO items (
                    description, project, priority, energy, status, is_habit, is_today,
                    due_date, created_at, started_at, completed_at, time_spent, depends_on,
                    habit_type, recurrence_type, recurrence_interval, recurrence_days, streak,
                    last_completed_date, daily_target, daily_completed
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
                           ?16, ?17, ?18, ?19, ?20, ?21)",
                params![
                    item.description,
                    item.project,
                    item.priority,
                    item.energy,
                    item.status.as_str(),
                    item.is_habit,
                    item.is_today,
                    item.due_date.map(fmt_date),
                    fmt_dt(item.created_at),
                    item.started_at.map(fmt_dt),
                    item.completed_at.map(fmt_dt),
                    item.time_spent,
                    item.depends_on,
                    item.habit_type.map(|h| h.as_str()),
                    rec_type,
                    rec_interval,
                    rec_days,
                    item.streak,
                    item.last_completed_date.map(fmt_date),
                    item.daily_target,
                    item.daily_completed,
                ],
            )
            .map_err(StoreError::from)?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_item(&self, id: i64) -> Result<Option<WorkItem>> {
        self.conn
            .query_row(
                &format!("SELECT {ITEM_COLUMNS} FROM items WHERE id = ?1"),
                params![id],
                item_from_row,
            )
            .optional()
            .map_err(|e| StoreError::from(e).into())
    }

    /// Like [`Tx::get_item`] but missing rows are an error.
    pub fn require_item(&self, id: i64) -> Result<WorkItem> {
        self.get_item(id)?
            .ok_or(CoreError::NotFound { kind: "item", id })
    }

    /// Persist every mutable field of an existing item. Rejects
    /// dependency edges that would form a cycle.
    pub fn update_item(&self, item: &WorkItem) -> Result<()> {
        item.validate()?;
        if let Some(dep) = item.depends_on {
            if self.creates_dependency_cycle(item.id, dep)? {
                return Err(CoreError::InvalidArgument {
                    field: "depends_on",
                    message: format!("dependency on {dep} would create a cycle"),
                });
            }
        }
        let (rec_type, rec_interval, rec_days) = encode_recurrence(&item.recurrence);
        let updated = self
            .conn
            .execute(
                "UPDATE items SET
                    description = ?1, project = ?2, priority = ?3, energy = ?4, status = ?5,
                    is_habit = ?6, is_today = ?7, due_date = ?8, started_at = ?9,
                    completed_at = ?10, time_spent = ?11, depends_on = ?12, habit_type = ?13,
                    recurrence_type = ?14, recurrence_interval = ?15, recurrence_days = ?16,
                    streak = ?17, last_completed_date = ?18, daily_target = ?19,
                    daily_completed = ?20
                 WHERE id = ?21",
                params![
                    item.description,
                    item.project,
                    item.priority,
                    item.energy,
                    item.status.as_str(),
                    item.is_habit,
                    item.is_today,
                    item.due_date.map(fmt_date),
                    item.started_at.map(fmt_dt),
                    item.completed_at.map(fmt_dt),
                    item.time_spent,
                    item.depends_on,
                    item.habit_type.map(|h| h.as_str()),
                    rec_type,
                    rec_interval,
                    rec_days,
                    item.streak,
                    item.last_completed_date.map(fmt_date),
                    item.daily_target,
                    item.daily_completed,
                    item.id,
                ],
            )
            .map_err(StoreError::from)?;
        if updated == 0 {
            return Err(CoreError::NotFound {
                kind: "item",
                id: item.id,
            });
        }
        Ok(())
    }

    pub fn delete_item(&self, id: i64) -> Result<()> {
        let deleted = self
            .conn
            .execute("DELETE FROM items WHERE id = ?1", params![id])
            .map_err(StoreError::from)?;
        if deleted == 0 {
            return Err(CoreError::NotFound { kind: "item", id });
        }
        Ok(())
    }

    /// Walk the dependency chain from `from`; true if it reaches `item_id`.
    ///
    /// Edges are single-per-node, so the walk is linear in chain length.
    fn creates_dependency_cycle(&self, item_id: i64, from: i64) -> Result<bool> {
        let mut cursor = Some(from);
        let mut hops = 0;
        while let Some(id) = cursor {
            if id == item_id {
                return Ok(true);
            }
            hops += 1;
            if hops > 10_000 {
                // A pre-existing cycle that does not involve item_id.
                return Ok(true);
            }
            cursor = match self.get_item(id)? {
                Some(item) => item.depends_on,
                None => None,
            };
        }
        Ok(false)
    }

    fn query_items(&self, where_clause: &str, p: &[&dyn rusqlite::ToSql]) -> Result<Vec<WorkItem>> {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM items {where_clause}");
        let mut stmt = self.conn.prepare(&sql).map_err(StoreError::from)?;
        let rows = stmt
            .query_map(p, item_from_row)
            .map_err(StoreError::from)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(StoreError::from)?;
        Ok(rows)
    }

    pub fn list_items(&self) -> Result<Vec<WorkItem>> {
        self.query_items("ORDER BY id", &[])
    }

    /// Pending non-habit tasks, most urgent work first by id as a stable
    /// fallback (urgency itself is computed in memory by the planner).
    pub fn pending_tasks(&self) -> Result<Vec<WorkItem>> {
        self.query_items(
            "WHERE status = 'pending' AND is_habit = 0 ORDER BY id",
            &[],
        )
    }

    /// Today's agenda: pending or active non-habits flagged `is_today`.
    pub fn today_tasks(&self) -> Result<Vec<WorkItem>> {
        self.query_items(
            "WHERE is_habit = 0 AND is_today = 1 AND status IN ('pending', 'active') ORDER BY id",
            &[],
        )
    }

    /// Habits scheduled for `date`. Derived purely from `due_date`.
    pub fn today_habits(&self, date: NaiveDate) -> Result<Vec<WorkItem>> {
        self.query_items(
            "WHERE is_habit = 1 AND due_date = ?1 AND status != 'skipped' ORDER BY id",
            &[&fmt_date(date)],
        )
    }

    pub fn habits(&self) -> Result<Vec<WorkItem>> {
        self.query_items("WHERE is_habit = 1 ORDER BY due_date, id", &[])
    }

    /// Habit instances whose scheduled date has passed without completion.
    pub fn overdue_habits(&self, today: NaiveDate) -> Result<Vec<WorkItem>> {
        self.query_items(
            "WHERE is_habit = 1 AND due_date < ?1
             AND status NOT IN ('completed', 'skipped') ORDER BY id",
            &[&fmt_date(today)],
        )
    }

    /// Habits still in place with an unfinished occurrence due on or
    /// before `date` (the live half of the missed-habit query; purged
    /// occurrences are covered by [`Tx::habit_skips_on`]).
    pub fn unfinished_habits_due_by(&self, date: NaiveDate) -> Result<Vec<WorkItem>> {
        self.query_items(
            "WHERE is_habit = 1 AND due_date <= ?1 AND daily_completed < daily_target
             AND status NOT IN ('completed', 'skipped') ORDER BY id",
            &[&fmt_date(date)],
        )
    }

    /// Non-habit tasks belonging to `project`: (total, completed).
    pub fn project_task_counts(&self, project: &str) -> Result<(i64, i64)> {
        self.conn
            .query_row(
                "SELECT COUNT(*),
                        COALESCE(SUM(CASE WHEN status = 'completed' THEN 1 ELSE 0 END), 0)
                 FROM items WHERE is_habit = 0 AND project = ?1",
                params![project],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .map_err(|e| StoreError::from(e).into())
    }

    /// Clear `is_today` on every non-habit (Roll step 2).
    pub fn clear_today_flags(&self) -> Result<()> {
        self.conn
            .execute("UPDATE items SET is_today = 0 WHERE is_habit = 0", [])
            .map_err(StoreError::from)?;
        Ok(())
    }

    /// Completed item count in the half-open datetime range.
    pub fn completed_count_between(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
        is_habit: Option<bool>,
    ) -> Result<i64> {
        let base = "SELECT COUNT(*) FROM items
                    WHERE status = 'completed' AND completed_at >= ?1 AND completed_at < ?2";
        let count = match is_habit {
            Some(flag) => self
                .conn
                .query_row(
                    &format!("{base} AND is_habit = ?3"),
                    params![fmt_dt(start), fmt_dt(end), flag],
                    |row| row.get(0),
                )
                .map_err(StoreError::from)?,
            None => self
                .conn
                .query_row(base, params![fmt_dt(start), fmt_dt(end)], |row| row.get(0))
                .map_err(StoreError::from)?,
        };
        Ok(count)
    }

    pub fn pending_count(&self) -> Result<i64> {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM items WHERE status = 'pending'",
                [],
                |row| row.get(0),
            )
            .map_err(|e| StoreError::from(e).into())
    }

    // ── day ledger ──────────────────────────────────────────────────

    pub fn ledger(&self, date: NaiveDate) -> Result<Option<DayLedger>> {
        self.conn
            .query_row(
                &format!("SELECT {LEDGER_COLUMNS} FROM day_ledger WHERE date = ?1"),
                params![fmt_date(date)],
                ledger_from_row,
            )
            .optional()
            .map_err(|e| StoreError::from(e).into())
    }

    /// Fetch the ledger row for `date`, creating an empty one lazily.
    pub fn get_or_create_ledger(&self, date: NaiveDate) -> Result<DayLedger> {
        if let Some(ledger) = self.ledger(date)? {
            return Ok(ledger);
        }
        let ledger = DayLedger::new(date);
        self.conn
            .execute(
                "INSERT INTO day_ledger (date) VALUES (?1)",
                params![fmt_date(date)],
            )
            .map_err(StoreError::from)?;
        Ok(ledger)
    }

    pub fn update_ledger(&self, ledger: &DayLedger) -> Result<()> {
        self.conn
            .execute(
                "UPDATE day_ledger SET
                    points_earned = ?1, points_penalty = ?2, daily_total = ?3,
                    tasks_completed = ?4, tasks_planned = ?5, habits_completed = ?6,
                    habits_total = ?7, completion_rate = ?8, penalty_streak = ?9,
                    finalized = ?10, details = ?11
                 WHERE date = ?12",
                params![
                    ledger.points_earned,
                    ledger.points_penalty,
                    ledger.daily_total,
                    ledger.tasks_completed,
                    ledger.tasks_planned,
                    ledger.habits_completed,
                    ledger.habits_total,
                    ledger.completion_rate,
                    ledger.penalty_streak,
                    ledger.finalized,
                    ledger.details,
                    fmt_date(ledger.date),
                ],
            )
            .map_err(StoreError::from)?;
        Ok(())
    }

    /// Ledger rows for the `days` most recent dates up to and including
    /// `through`, newest first.
    pub fn ledger_history(&self, through: NaiveDate, days: i64) -> Result<Vec<DayLedger>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {LEDGER_COLUMNS} FROM day_ledger
                 WHERE date <= ?1 ORDER BY date DESC LIMIT ?2"
            ))
            .map_err(StoreError::from)?;
        let rows = stmt
            .query_map(params![fmt_date(through), days], ledger_from_row)
            .map_err(StoreError::from)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(StoreError::from)?;
        Ok(rows)
    }

    /// Cumulative score: the sum of `daily_total` over all ledger rows.
    pub fn total_points(&self) -> Result<i64> {
        self.conn
            .query_row(
                "SELECT COALESCE(SUM(daily_total), 0) FROM day_ledger",
                [],
                |row| row.get(0),
            )
            .map_err(|e| StoreError::from(e).into())
    }

    // ── goals ───────────────────────────────────────────────────────

    pub fn insert_goal(&self, goal: &Goal) -> Result<i64> {
        let (kind, target_points, project_name) = match &goal.kind {
            GoalKind::Points { target_points } => ("points", Some(*target_points), None),
            GoalKind::ProjectCompletion { project_name } => {
                ("project_completion", None, Some(project_name.clone()))
            }
        };
        self.conn
            .execute(
                "INSERT INTO goals (kind, target_points, project_name, reward_description,
                                    deadline, achieved, achieved_date, reward_claimed,
                                    reward_claimed_at, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    kind,
                    target_points,
                    project_name,
                    goal.reward_description,
                    goal.deadline.map(fmt_date),
                    goal.achieved,
                    goal.achieved_date.map(fmt_date),
                    goal.reward_claimed,
                    goal.reward_claimed_at.map(fmt_dt),
                    fmt_dt(goal.created_at),
                ],
            )
            .map_err(StoreError::from)?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_goal(&self, id: i64) -> Result<Option<Goal>> {
        self.conn
            .query_row(
                &format!("SELECT {GOAL_COLUMNS} FROM goals WHERE id = ?1"),
                params![id],
                goal_from_row,
            )
            .optional()
            .map_err(|e| StoreError::from(e).into())
    }

    pub fn update_goal(&self, goal: &Goal) -> Result<()> {
        let (kind, target_points, project_name) = match &goal.kind {
            GoalKind::Points { target_points } => ("points", Some(*target_points), None),
            GoalKind::ProjectCompletion { project_name } => {
                ("project_completion", None, Some(project_name.clone()))
            }
        };
        let updated = self
            .conn
            .execute(
                "UPDATE goals SET kind = ?1, target_points = ?2, project_name = ?3,
                        reward_description = ?4, deadline = ?5, achieved = ?6,
                        achieved_date = ?7, reward_claimed = ?8, reward_claimed_at = ?9
                 WHERE id = ?10",
                params![
                    kind,
                    target_points,
                    project_name,
                    goal.reward_description,
                    goal.deadline.map(fmt_date),
                    goal.achieved,
                    goal.achieved_date.map(fmt_date),
                    goal.reward_claimed,
                    goal.reward_claimed_at.map(fmt_dt),
                    goal.id,
                ],
            )
            .map_err(StoreError::from)?;
        if updated == 0 {
            return Err(CoreError::NotFound {
                kind: "goal",
                id: goal.id,
            });
        }
        Ok(())
    }

    pub fn delete_goal(&self, id: i64) -> Result<()> {
        let deleted = self
            .conn
            .execute("DELETE FROM goals WHERE id = ?1", params![id])
            .map_err(StoreError::from)?;
        if deleted == 0 {
            return Err(CoreError::NotFound { kind: "goal", id });
        }
        Ok(())
    }

    pub fn list_goals(&self, include_achieved: bool) -> Result<Vec<Goal>> {
        let where_clause = if include_achieved {
            ""
        } else {
            "WHERE achieved = 0"
        };
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {GOAL_COLUMNS} FROM goals {where_clause} ORDER BY id"
            ))
            .map_err(StoreError::from)?;
        let rows = stmt
            .query_map([], goal_from_row)
            .map_err(StoreError::from)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(StoreError::from)?;
        Ok(rows)
    }

    // ── rest days ───────────────────────────────────────────────────

    pub fn insert_rest_day(&self, date: NaiveDate, description: Option<&str>) -> Result<i64> {
        self.conn
            .execute(
                "INSERT OR IGNORE INTO rest_days (date, description) VALUES (?1, ?2)",
                params![fmt_date(date), description],
            )
            .map_err(StoreError::from)?;
        self.conn
            .query_row(
                "SELECT id FROM rest_days WHERE date = ?1",
                params![fmt_date(date)],
                |row| row.get(0),
            )
            .map_err(|e| StoreError::from(e).into())
    }

    pub fn delete_rest_day(&self, id: i64) -> Result<()> {
        let deleted = self
            .conn
            .execute("DELETE FROM rest_days WHERE id = ?1", params![id])
            .map_err(StoreError::from)?;
        if deleted == 0 {
            return Err(CoreError::NotFound {
                kind: "rest day",
                id,
            });
        }
        Ok(())
    }

    pub fn rest_days(&self) -> Result<Vec<RestDay>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, date, description FROM rest_days ORDER BY date")
            .map_err(StoreError::from)?;
        let rows = stmt
            .query_map([], |row| {
                Ok(RestDay {
                    id: row.get(0)?,
                    date: parse_date(&row.get::<_, String>(1)?)?,
                    description: row.get(2)?,
                })
            })
            .map_err(StoreError::from)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(StoreError::from)?;
        Ok(rows)
    }

    pub fn is_rest_day(&self, date: NaiveDate) -> Result<bool> {
        let count: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM rest_days WHERE date = ?1",
                params![fmt_date(date)],
                |row| row.get(0),
            )
            .map_err(StoreError::from)?;
        Ok(count > 0)
    }

    // ── backups ─────────────────────────────────────────────────────

    pub fn insert_backup(&self, backup: &BackupRecord) -> Result<i64> {
        self.conn
            .execute(
                "INSERT INTO backups (filename, created_at, size_bytes, kind, uploaded_offsite)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    backup.filename,
                    fmt_dt(backup.created_at),
                    backup.size_bytes,
                    backup.kind.as_str(),
                    backup.uploaded_offsite,
                ],
            )
            .map_err(StoreError::from)?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_backup(&self, id: i64) -> Result<Option<BackupRecord>> {
        self.conn
            .query_row(
                "SELECT id, filename, created_at, size_bytes, kind, uploaded_offsite
                 FROM backups WHERE id = ?1",
                params![id],
                backup_from_row,
            )
            .optional()
            .map_err(|e| StoreError::from(e).into())
    }

    /// All backups, newest first.
    pub fn list_backups(&self) -> Result<Vec<BackupRecord>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, filename, created_at, size_bytes, kind, uploaded_offsite
                 FROM backups ORDER BY created_at DESC, id DESC",
            )
            .map_err(StoreError::from)?;
        let rows = stmt
            .query_map([], backup_from_row)
            .map_err(StoreError::from)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(StoreError::from)?;
        Ok(rows)
    }

    pub fn delete_backup(&self, id: i64) -> Result<()> {
        let deleted = self
            .conn
            .execute("DELETE FROM backups WHERE id = ?1", params![id])
            .map_err(StoreError::from)?;
        if deleted == 0 {
            return Err(CoreError::NotFound { kind: "backup", id });
        }
        Ok(())
    }

    /// Most recent backup of the given kind (interval checks ignore
    /// manual backups).
    pub fn latest_backup(&self, kind: BackupKind) -> Result<Option<BackupRecord>> {
        self.conn
            .query_row(
                "SELECT id, filename, created_at, size_bytes, kind, uploaded_offsite
                 FROM backups WHERE kind = ?1 ORDER BY created_at DESC, id DESC LIMIT 1",
                params![kind.as_str()],
                backup_from_row,
            )
            .optional()
            .map_err(|e| StoreError::from(e).into())
    }

    // ── habit skips ─────────────────────────────────────────────────

    /// Record a purged habit occurrence for later penalty accounting.
    /// Re-recording the same occurrence is a no-op.
    pub fn record_habit_skip(
        &self,
        item_id: i64,
        date: NaiveDate,
        habit_type: HabitType,
    ) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR IGNORE INTO habit_skips (item_id, date, habit_type)
                 VALUES (?1, ?2, ?3)",
                params![item_id, fmt_date(date), habit_type.as_str()],
            )
            .map_err(StoreError::from)?;
        Ok(())
    }

    /// Skipped occurrences recorded for `date`, with the item description
    /// when the item still exists.
    pub fn habit_skips_on(&self, date: NaiveDate) -> Result<Vec<HabitSkip>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT s.item_id, s.date, s.habit_type, i.description
                 FROM habit_skips s LEFT JOIN items i ON i.id = s.item_id
                 WHERE s.date = ?1 ORDER BY s.item_id",
            )
            .map_err(StoreError::from)?;
        let rows = stmt
            .query_map(params![fmt_date(date)], |row| {
                let kind_str: String = row.get(2)?;
                Ok(HabitSkip {
                    item_id: row.get(0)?,
                    date: parse_date(&row.get::<_, String>(1)?)?,
                    habit_type: HabitType::parse(&kind_str)
                        .ok_or_else(|| corrupt("habit_type", &kind_str))?,
                    description: row.get(3)?,
                })
            })
            .map_err(StoreError::from)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(StoreError::from)?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn now() -> NaiveDateTime {
        d("2025-03-10").and_hms_opt(9, 0, 0).unwrap()
    }

    #[test]
    fn item_round_trip() {
        let store = Store::open_memory().unwrap();
        let view = store.view();

        let mut item = WorkItem::new("write report", now());
        item.project = Some("q1".into());
        item.priority = 7;
        item.energy = 4;
        item.due_date = Some(d("2025-03-12"));
        let id = view.insert_item(&item).unwrap();

        let loaded = view.require_item(id).unwrap();
        assert_eq!(loaded.description, "write report");
        assert_eq!(loaded.project.as_deref(), Some("q1"));
        assert_eq!(loaded.priority, 7);
        assert_eq!(loaded.due_date, Some(d("2025-03-12")));
        assert_eq!(loaded.status, ItemStatus::Pending);
        assert_eq!(loaded.time_spent, 0);
    }

    #[test]
    fn habit_recurrence_round_trip() {
        let store = Store::open_memory().unwrap();
        let view = store.view();

        let habit = WorkItem::new_habit(
            "gym",
            HabitType::Skill,
            Recurrence::Weekly {
                days: BTreeSet::from([0, 2, 4]),
            },
            d("2025-03-10"),
            now(),
        );
        let id = view.insert_item(&habit).unwrap();
        let loaded = view.require_item(id).unwrap();
        assert_eq!(
            loaded.recurrence,
            Recurrence::Weekly {
                days: BTreeSet::from([0, 2, 4])
            }
        );
        assert_eq!(loaded.habit_type, Some(HabitType::Skill));
    }

    #[test]
    fn settings_created_lazily_with_defaults() {
        let store = Store::open_memory().unwrap();
        let settings = store.view().settings().unwrap();
        assert_eq!(settings.max_tasks_per_day, 10);
        assert!(settings.last_roll_date.is_none());

        // Update sticks.
        let mut updated = settings;
        updated.last_roll_date = Some(d("2025-03-10"));
        updated.max_tasks_per_day = 7;
        store.view().update_settings(&updated).unwrap();
        let reloaded = store.view().settings().unwrap();
        assert_eq!(reloaded.last_roll_date, Some(d("2025-03-10")));
        assert_eq!(reloaded.max_tasks_per_day, 7);
    }

    #[test]
    fn dependency_cycle_rejected_on_update() {
        let store = Store::open_memory().unwrap();
        let view = store.view();

        let a = view.insert_item(&WorkItem::new("a", now())).unwrap();
        let b = view.insert_item(&WorkItem::new("b", now())).unwrap();

        let mut item_b = view.require_item(b).unwrap();
        item_b.depends_on = Some(a);
        view.update_item(&item_b).unwrap();

        // a -> b would close the loop.
        let mut item_a = view.require_item(a).unwrap();
        item_a.depends_on = Some(b);
        let err = view.update_item(&item_a).unwrap_err();
        assert!(matches!(err, CoreError::InvalidArgument { .. }));

        // Self-dependency is the degenerate cycle.
        let mut item_a = view.require_item(a).unwrap();
        item_a.depends_on = Some(a);
        assert!(view.update_item(&item_a).is_err());
    }

    #[test]
    fn ledger_created_lazily_and_summed() {
        let store = Store::open_memory().unwrap();
        let view = store.view();

        let mut ledger = view.get_or_create_ledger(d("2025-03-10")).unwrap();
        ledger.points_earned = 12;
        ledger.recompute_total();
        view.update_ledger(&ledger).unwrap();

        let mut yesterday = view.get_or_create_ledger(d("2025-03-09")).unwrap();
        yesterday.points_earned = 5;
        yesterday.points_penalty = 30;
        yesterday.recompute_total();
        view.update_ledger(&yesterday).unwrap();

        assert_eq!(view.total_points().unwrap(), 12 - 25);
        let history = view.ledger_history(d("2025-03-10"), 30).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].date, d("2025-03-10"));
    }

    #[test]
    fn tx_rolls_back_on_error() {
        let store = Store::open_memory().unwrap();
        let result: Result<()> = store.tx(|tx| {
            tx.insert_item(&WorkItem::new("doomed", now()))?;
            Err(CoreError::InvalidArgument {
                field: "test",
                message: "forced failure".into(),
            })
        });
        assert!(result.is_err());
        assert!(store.view().list_items().unwrap().is_empty());
    }

    #[test]
    fn rest_days_unique_by_date() {
        let store = Store::open_memory().unwrap();
        let view = store.view();
        let id1 = view.insert_rest_day(d("2025-03-15"), Some("holiday")).unwrap();
        let id2 = view.insert_rest_day(d("2025-03-15"), None).unwrap();
        assert_eq!(id1, id2);
        assert!(view.is_rest_day(d("2025-03-15")).unwrap());
        assert!(!view.is_rest_day(d("2025-03-16")).unwrap());
    }

    #[test]
    fn habit_skips_join_descriptions() {
        let store = Store::open_memory().unwrap();
        let view = store.view();
        let habit = WorkItem::new_habit(
            "meditate",
            HabitType::Routine,
            Recurrence::Daily,
            d("2025-03-09"),
            now(),
        );
        let id = view.insert_item(&habit).unwrap();
        view.record_habit_skip(id, d("2025-03-09"), HabitType::Routine)
            .unwrap();
        view.record_habit_skip(id, d("2025-03-09"), HabitType::Routine)
            .unwrap(); // idempotent

        let skips = view.habit_skips_on(d("2025-03-09")).unwrap();
        assert_eq!(skips.len(), 1);
        assert_eq!(skips[0].description.as_deref(), Some("meditate"));
        assert!(view.habit_skips_on(d("2025-03-10")).unwrap().is_empty());
    }

    #[test]
    fn backups_listed_newest_first() {
        let store = Store::open_memory().unwrap();
        let view = store.view();
        for (i, kind) in [(1, BackupKind::Auto), (2, BackupKind::Manual), (3, BackupKind::Auto)] {
            view.insert_backup(&BackupRecord {
                id: 0,
                filename: format!("backup_{i}.db"),
                created_at: d("2025-03-10").and_hms_opt(3, 0, i as u32).unwrap(),
                size_bytes: 1024,
                kind,
                uploaded_offsite: false,
            })
            .unwrap();
        }
        let backups = view.list_backups().unwrap();
        assert_eq!(backups.len(), 3);
        assert_eq!(backups[0].filename, "backup_3.db");
        let latest_auto = view.latest_backup(BackupKind::Auto).unwrap().unwrap();
        assert_eq!(latest_auto.filename, "backup_3.db");
    }
}
