//! The daily Roll: choose the day's agenda.
//!
//! Once per effective date the planner purges stale habit occurrences,
//! clears yesterday's selections, picks critical and dependency-ready
//! tasks by urgency, refills around the operator's mood, materializes
//! the day's habits, and triggers penalty finalization for any date the
//! scheduler has not closed yet. The whole roll is one store
//! transaction, which is what makes it idempotent under races.

use chrono::{Days, NaiveDate, NaiveDateTime};
use std::collections::BTreeSet;
use tracing::{debug, info};

use crate::dates::parse_hhmm;
use crate::error::{CoreError, Result};
use crate::item::{HabitType, ItemStatus, WorkItem};
use crate::scoring::{FinalizeSummary, ScoringEngine};
use crate::storage::{Store, Tx};

/// What a roll produced.
#[derive(Debug, Clone)]
pub struct RollOutcome {
    pub date: NaiveDate,
    /// The chosen agenda, urgency order.
    pub tasks: Vec<WorkItem>,
    /// Habits due on the effective date.
    pub habits: Vec<WorkItem>,
    /// Habit occurrences whose dates had passed and were skipped.
    pub purged_occurrences: i64,
    /// Days finalized as part of this roll (usually just yesterday).
    pub finalized: Vec<FinalizeSummary>,
}

/// The Roll algorithm.
pub struct Planner<'a> {
    store: &'a Store,
}

impl<'a> Planner<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Check whether a roll may run right now.
    pub fn can_roll(&self, now: NaiveDateTime) -> Result<()> {
        let settings = self.store.view().settings()?;
        let today = settings.date_context()?.effective_date(now);
        Self::check_preconditions(&settings, today, now)
    }

    fn check_preconditions(
        settings: &crate::settings::Settings,
        today: NaiveDate,
        now: NaiveDateTime,
    ) -> Result<()> {
        if settings.last_roll_date.is_some_and(|d| d >= today) {
            return Err(CoreError::RollAlreadyDone { date: today });
        }
        // With a shifted day boundary the effective-date change itself
        // gates the roll; otherwise the configured time does.
        if !settings.day_start_enabled {
            let gate = parse_hhmm(&settings.roll_available_time)?;
            if now.time() < gate {
                return Err(CoreError::RollNotAvailable {
                    available_at: settings.roll_available_time.clone(),
                });
            }
        }
        Ok(())
    }

    /// Execute the roll for the current effective date.
    ///
    /// `mood` (0..=5) filters the agenda down to items the operator has
    /// energy for today.
    pub fn roll(&self, mood: Option<i64>, now: NaiveDateTime) -> Result<RollOutcome> {
        if let Some(m) = mood {
            if !(0..=5).contains(&m) {
                return Err(CoreError::InvalidArgument {
                    field: "mood",
                    message: format!("{m} is outside 0..=5"),
                });
            }
        }

        self.store.tx(|tx| {
            let settings = tx.settings()?;
            let today = settings.date_context()?.effective_date(now);
            Self::check_preconditions(&settings, today, now)?;

            let purged = Self::purge_overdue_habits(tx, today)?;
            tx.clear_today_flags()?;

            let chosen = Self::select_agenda(tx, &settings, today, mood)?;
            for item in &chosen {
                let mut item = item.clone();
                item.is_today = true;
                tx.update_item(&item)?;
            }

            let habits = tx.today_habits(today)?;

            let finalized = ScoringEngine::finalize_pending(tx, today)?;

            // finalize_pending advanced the penalty token on the same
            // row; re-read before writing the roll tokens.
            let mut settings = tx.settings()?;
            settings.last_roll_date = Some(today);
            settings.pending_roll = false;
            tx.update_settings(&settings)?;

            let mut ledger = tx.get_or_create_ledger(today)?;
            ledger.tasks_planned = chosen.len() as i64;
            ledger.habits_total = habits.len() as i64;
            tx.update_ledger(&ledger)?;

            info!(
                date = %today,
                tasks = chosen.len(),
                habits = habits.len(),
                purged,
                "roll complete"
            );
            Ok(RollOutcome {
                date: today,
                tasks: chosen,
                habits,
                purged_occurrences: purged,
                finalized,
            })
        })
    }

    /// Advance every overdue habit as if its missed occurrences had been
    /// skipped, recording each one for penalty accounting. One-shot
    /// habits whose date has passed become `skipped`.
    fn purge_overdue_habits(tx: &Tx<'_>, today: NaiveDate) -> Result<i64> {
        let mut purged = 0;
        for mut habit in tx.overdue_habits(today)? {
            let habit_type = habit.habit_type.unwrap_or(HabitType::Skill);
            let mut due = match habit.due_date {
                Some(d) => d,
                None => continue,
            };
            while due < today {
                tx.record_habit_skip(habit.id, due, habit_type)?;
                purged += 1;
                match habit.recurrence.next_occurrence(due) {
                    Some(next) => due = next,
                    None => {
                        habit.status = ItemStatus::Skipped;
                        break;
                    }
                }
            }
            if habit.status != ItemStatus::Skipped {
                habit.due_date = Some(due);
                habit.daily_completed = 0;
            }
            debug!(item = habit.id, due = %due, status = %habit.status, "habit purged forward");
            tx.update_item(&habit)?;
        }
        Ok(purged)
    }

    /// Passes A (critical), B (backlog by urgency), C (same-day
    /// dependents), then the mood filter with a B/C refill.
    fn select_agenda(
        tx: &Tx<'_>,
        settings: &crate::settings::Settings,
        today: NaiveDate,
        mood: Option<i64>,
    ) -> Result<Vec<WorkItem>> {
        let max_tasks = settings.max_tasks_per_day.max(0) as usize;
        let critical_cutoff = today + Days::new(settings.critical_days.max(0) as u64);

        let mut pending = tx.pending_tasks()?;
        // Urgency descending, id ascending as the tie-break.
        pending.sort_by(|a, b| {
            b.urgency(today)
                .cmp(&a.urgency(today))
                .then(a.id.cmp(&b.id))
        });

        let dep_completed = |item: &WorkItem| -> Result<bool> {
            match item.depends_on {
                None => Ok(true),
                Some(dep_id) => Ok(tx
                    .get_item(dep_id)?
                    .map(|dep| dep.status == ItemStatus::Completed)
                    // A vanished dependency no longer blocks selection.
                    .unwrap_or(true)),
            }
        };

        let mut chosen: Vec<WorkItem> = Vec::new();
        let mut chosen_ids: BTreeSet<i64> = BTreeSet::new();

        // Pass A: critical window, dependency-ready.
        for item in &pending {
            if chosen.len() >= max_tasks {
                break;
            }
            let critical = item.due_date.is_some_and(|d| d <= critical_cutoff);
            if critical && !chosen_ids.contains(&item.id) && dep_completed(item)? {
                chosen_ids.insert(item.id);
                chosen.push(item.clone());
            }
        }

        // Pass B: backlog by urgency, dependency-ready.
        for item in &pending {
            if chosen.len() >= max_tasks {
                break;
            }
            if !chosen_ids.contains(&item.id) && dep_completed(item)? {
                chosen_ids.insert(item.id);
                chosen.push(item.clone());
            }
        }

        // Pass C: items whose dependency made it into today's set.
        for item in &pending {
            if chosen.len() >= max_tasks {
                break;
            }
            if !chosen_ids.contains(&item.id)
                && item.depends_on.is_some_and(|dep| chosen_ids.contains(&dep))
            {
                chosen_ids.insert(item.id);
                chosen.push(item.clone());
            }
        }

        // Mood filter: drop what the operator has no energy for, then
        // refill the freed slots from mood-compatible candidates.
        if let Some(mood) = mood {
            chosen.retain(|item| item.energy <= mood);
            chosen_ids = chosen.iter().map(|i| i.id).collect();

            for item in &pending {
                if chosen.len() >= max_tasks {
                    break;
                }
                if item.energy <= mood
                    && !chosen_ids.contains(&item.id)
                    && dep_completed(item)?
                {
                    chosen_ids.insert(item.id);
                    chosen.push(item.clone());
                }
            }
            for item in &pending {
                if chosen.len() >= max_tasks {
                    break;
                }
                if item.energy <= mood
                    && !chosen_ids.contains(&item.id)
                    && item.depends_on.is_some_and(|dep| chosen_ids.contains(&dep))
                {
                    chosen_ids.insert(item.id);
                    chosen.push(item.clone());
                }
            }
        }

        Ok(chosen)
    }
}
