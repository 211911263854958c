//! Work items: the unit of planning, tracking, and scoring.
//!
//! A `WorkItem` is either a one-shot task or a recurring habit. Habits
//! reuse the same row across occurrences: completing one advances
//! `due_date` through the recurrence engine and resets the per-day
//! counters, so a habit is only terminal when its recurrence is `none`.

use chrono::{Datelike, Days, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::error::{CoreError, Result};

/// Lifecycle state of a work item.
///
/// Valid transitions (driven by the tracker and the planner):
///
/// ```text
///   pending ──start()──▶ active ──stop()──▶ pending
///      │                    │
///      │ complete()         │ complete()
///      ▼                    ▼
///   completed          completed
///
///   pending habit whose one-shot date passes ──purge──▶ skipped
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Pending,
    Active,
    Completed,
    Skipped,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Pending => "pending",
            ItemStatus::Active => "active",
            ItemStatus::Completed => "completed",
            ItemStatus::Skipped => "skipped",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ItemStatus::Pending),
            "active" => Some(ItemStatus::Active),
            "completed" => Some(ItemStatus::Completed),
            "skipped" => Some(ItemStatus::Skipped),
            _ => None,
        }
    }
}

impl Default for ItemStatus {
    fn default() -> Self {
        ItemStatus::Pending
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Habit category. Skills earn a streak bonus; routines earn a fixed
/// reward and half the missed-habit penalty.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HabitType {
    Skill,
    Routine,
}

impl HabitType {
    pub fn as_str(&self) -> &'static str {
        match self {
            HabitType::Skill => "skill",
            HabitType::Routine => "routine",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "skill" => Some(HabitType::Skill),
            "routine" => Some(HabitType::Routine),
            _ => None,
        }
    }
}

/// Habit recurrence schedule.
///
/// Weekdays are 0..=6, Monday-based. The set only becomes a serialized
/// string at the store boundary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Recurrence {
    /// One-shot habit: terminal after its single occurrence.
    None,
    Daily,
    EveryNDays { interval: u32 },
    Weekly { days: BTreeSet<u8> },
}

impl Recurrence {
    /// Next scheduled occurrence strictly after `from`, or `None` when
    /// the habit has no further occurrences.
    pub fn next_occurrence(&self, from: NaiveDate) -> Option<NaiveDate> {
        match self {
            Recurrence::None => None,
            Recurrence::Daily => from.checked_add_days(Days::new(1)),
            Recurrence::EveryNDays { interval } => {
                from.checked_add_days(Days::new((*interval).max(1) as u64))
            }
            Recurrence::Weekly { days } => {
                if days.is_empty() {
                    // Empty weekday set: fall back to a 7-day cadence.
                    return from.checked_add_days(Days::new(7));
                }
                let mut date = from.checked_add_days(Days::new(1))?;
                for _ in 0..7 {
                    let weekday = date.weekday().num_days_from_monday() as u8;
                    if days.contains(&weekday) {
                        return Some(date);
                    }
                    date = date.checked_add_days(Days::new(1))?;
                }
                None
            }
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Recurrence::None)
    }
}

impl Default for Recurrence {
    fn default() -> Self {
        Recurrence::None
    }
}

/// A task or habit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkItem {
    /// Row id; 0 until persisted.
    pub id: i64,
    pub description: String,
    pub project: Option<String>,
    /// 0..=10
    pub priority: i64,
    /// 0..=5
    pub energy: i64,
    pub status: ItemStatus,
    pub is_habit: bool,
    /// Member of today's agenda. Only meaningful for non-habits; habits
    /// derive "today" from `due_date`.
    pub is_today: bool,
    /// For habits, the next scheduled occurrence date.
    pub due_date: Option<NaiveDate>,
    pub created_at: NaiveDateTime,
    pub started_at: Option<NaiveDateTime>,
    pub completed_at: Option<NaiveDateTime>,
    /// Accumulated seconds of tracked work.
    pub time_spent: i64,
    /// Single dependency edge: this item cannot start until the target
    /// is completed (or scheduled for today).
    pub depends_on: Option<i64>,
    pub habit_type: Option<HabitType>,
    pub recurrence: Recurrence,
    /// Consecutive on-schedule completions, capped by settings.
    pub streak: i64,
    pub last_completed_date: Option<NaiveDate>,
    /// Completions required per day before the occurrence counts as done.
    pub daily_target: i64,
    pub daily_completed: i64,
}

impl WorkItem {
    /// New pending task with defaults matching the store schema.
    pub fn new(description: impl Into<String>, created_at: NaiveDateTime) -> Self {
        WorkItem {
            id: 0,
            description: description.into(),
            project: None,
            priority: 5,
            energy: 3,
            status: ItemStatus::Pending,
            is_habit: false,
            is_today: false,
            due_date: None,
            created_at,
            started_at: None,
            completed_at: None,
            time_spent: 0,
            depends_on: None,
            habit_type: None,
            recurrence: Recurrence::None,
            streak: 0,
            last_completed_date: None,
            daily_target: 1,
            daily_completed: 0,
        }
    }

    /// New habit due on `due`, defaulting to a skill with a daily target of 1.
    pub fn new_habit(
        description: impl Into<String>,
        habit_type: HabitType,
        recurrence: Recurrence,
        due: NaiveDate,
        created_at: NaiveDateTime,
    ) -> Self {
        let mut item = Self::new(description, created_at);
        item.is_habit = true;
        item.habit_type = Some(habit_type);
        item.recurrence = recurrence;
        item.due_date = Some(due);
        item
    }

    /// Validate operator-supplied fields.
    pub fn validate(&self) -> Result<()> {
        if self.description.trim().is_empty() {
            return Err(CoreError::InvalidArgument {
                field: "description",
                message: "must not be empty".into(),
            });
        }
        if !(0..=10).contains(&self.priority) {
            return Err(CoreError::InvalidArgument {
                field: "priority",
                message: format!("{} is outside 0..=10", self.priority),
            });
        }
        if !(0..=5).contains(&self.energy) {
            return Err(CoreError::InvalidArgument {
                field: "energy",
                message: format!("{} is outside 0..=5", self.energy),
            });
        }
        if self.daily_target < 1 {
            return Err(CoreError::InvalidArgument {
                field: "daily_target",
                message: "must be at least 1".into(),
            });
        }
        if self.is_habit && self.habit_type.is_none() {
            return Err(CoreError::InvalidArgument {
                field: "habit_type",
                message: "habits need a habit type".into(),
            });
        }
        if let Recurrence::Weekly { days } = &self.recurrence {
            if days.iter().any(|d| *d > 6) {
                return Err(CoreError::InvalidArgument {
                    field: "recurrence",
                    message: "weekdays must be 0..=6".into(),
                });
            }
        }
        Ok(())
    }

    /// Selection urgency as of effective date `today`.
    ///
    /// `priority·10` plus a due-date band (overdue 50, within 2 days 25,
    /// within 7 days 10) plus a small energy nudge.
    pub fn urgency(&self, today: NaiveDate) -> i64 {
        let mut urgency = self.priority * 10;
        if let Some(due) = self.due_date {
            if due < today {
                urgency += 50;
            } else if due <= today + Days::new(2) {
                urgency += 25;
            } else if due <= today + Days::new(7) {
                urgency += 10;
            }
        }
        if self.energy >= 4 {
            urgency += 5;
        } else if self.energy <= 1 {
            urgency -= 1;
        }
        urgency
    }

    /// A habit occurrence is due on `date` when its scheduled date matches.
    pub fn is_due_on(&self, date: NaiveDate) -> bool {
        self.is_habit && self.due_date == Some(date)
    }

    /// This occurrence still needs completions today.
    pub fn occurrence_unfinished(&self) -> bool {
        self.daily_completed < self.daily_target
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn now() -> NaiveDateTime {
        d("2025-03-10").and_hms_opt(9, 0, 0).unwrap()
    }

    #[test]
    fn daily_advances_one_day() {
        assert_eq!(
            Recurrence::Daily.next_occurrence(d("2025-03-10")),
            Some(d("2025-03-11"))
        );
    }

    #[test]
    fn every_n_days_advances_by_interval() {
        let r = Recurrence::EveryNDays { interval: 3 };
        assert_eq!(r.next_occurrence(d("2025-03-10")), Some(d("2025-03-13")));
        // Interval 0 is treated as 1 so the schedule always moves forward.
        let r = Recurrence::EveryNDays { interval: 0 };
        assert_eq!(r.next_occurrence(d("2025-03-10")), Some(d("2025-03-11")));
    }

    #[test]
    fn weekly_finds_smallest_later_matching_weekday() {
        // 2025-03-10 is a Monday. Mon/Wed/Fri habit completed Monday -> Wednesday.
        let r = Recurrence::Weekly {
            days: BTreeSet::from([0, 2, 4]),
        };
        assert_eq!(r.next_occurrence(d("2025-03-10")), Some(d("2025-03-12")));
        // Completed Friday -> next Monday.
        assert_eq!(r.next_occurrence(d("2025-03-14")), Some(d("2025-03-17")));
        // Single-day schedule wraps a full week.
        let r = Recurrence::Weekly {
            days: BTreeSet::from([0]),
        };
        assert_eq!(r.next_occurrence(d("2025-03-10")), Some(d("2025-03-17")));
    }

    #[test]
    fn weekly_with_empty_set_falls_back_to_seven_days() {
        let r = Recurrence::Weekly {
            days: BTreeSet::new(),
        };
        assert_eq!(r.next_occurrence(d("2025-03-10")), Some(d("2025-03-17")));
    }

    #[test]
    fn none_recurrence_is_terminal() {
        assert_eq!(Recurrence::None.next_occurrence(d("2025-03-10")), None);
    }

    #[test]
    fn urgency_bands() {
        let mut item = WorkItem::new("write report", now());
        item.priority = 5;
        item.energy = 3;
        assert_eq!(item.urgency(d("2025-03-10")), 50);

        item.due_date = Some(d("2025-03-09"));
        assert_eq!(item.urgency(d("2025-03-10")), 100); // overdue

        item.due_date = Some(d("2025-03-12"));
        assert_eq!(item.urgency(d("2025-03-10")), 75); // within 2 days

        item.due_date = Some(d("2025-03-16"));
        assert_eq!(item.urgency(d("2025-03-10")), 60); // within 7 days

        item.due_date = Some(d("2025-04-01"));
        assert_eq!(item.urgency(d("2025-03-10")), 50); // far out
    }

    #[test]
    fn urgency_energy_nudge() {
        let mut item = WorkItem::new("deep work", now());
        item.priority = 0;
        item.energy = 5;
        assert_eq!(item.urgency(d("2025-03-10")), 5);
        item.energy = 1;
        assert_eq!(item.urgency(d("2025-03-10")), -1);
        item.energy = 2;
        assert_eq!(item.urgency(d("2025-03-10")), 0);
    }

    #[test]
    fn validate_rejects_bad_fields() {
        let mut item = WorkItem::new("", now());
        assert!(item.validate().is_err());

        item.description = "ok".into();
        item.priority = 11;
        assert!(item.validate().is_err());

        item.priority = 5;
        item.energy = 6;
        assert!(item.validate().is_err());

        item.energy = 3;
        item.is_habit = true;
        assert!(item.validate().is_err()); // habit without a type

        item.habit_type = Some(HabitType::Skill);
        assert!(item.validate().is_ok());
    }

    #[test]
    fn habit_due_today_is_derived_from_due_date() {
        let habit = WorkItem::new_habit(
            "stretch",
            HabitType::Routine,
            Recurrence::Daily,
            d("2025-03-10"),
            now(),
        );
        assert!(habit.is_due_on(d("2025-03-10")));
        assert!(!habit.is_due_on(d("2025-03-11")));
    }
}
