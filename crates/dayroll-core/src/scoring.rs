//! Point arithmetic: rewards on completion, penalties at day finalize.
//!
//! All coefficients come from [`Settings`]; the only rows this module
//! mutates are day-ledger rows (and goal achievement flags). Reward
//! calculations are pure functions so they can be tested without a store.
//!
//! Reward model (Balanced Progress v2.0):
//!
//! ```text
//! task   = round(base · energy_mult · time_quality · focus)
//! skill  = round(base · (1 + log2(streak + 1) · streak_log_factor) · energy_mult)
//! routine = routine_points_fixed
//! ```

use chrono::{Days, NaiveDate, NaiveDateTime};
use tracing::{debug, warn};

use crate::error::{CoreError, Result};
use crate::item::{HabitType, WorkItem};
use crate::ledger::{CompletionEntry, Goal, GoalKind, MissedHabit, PenaltyBreakdown};
use crate::settings::Settings;
use crate::storage::Tx;

/// Floor of the time-quality factor: very slow work still earns half.
pub const MIN_TIME_QUALITY: f64 = 0.5;

/// Factor applied when tracked time is under `min_work_time_seconds`.
const FOCUS_PENALTY: f64 = 0.5;

/// Completion rate at which the partial day bonus kicks in.
const GOOD_BONUS_THRESHOLD: f64 = 0.8;

/// Routine habits carry half the missed-habit penalty of skills.
const ROUTINE_PENALTY_FACTOR: f64 = 0.5;

/// Projection band multipliers around the trailing daily average.
const PROJECTION_LOW: f64 = 0.7;
const PROJECTION_HIGH: f64 = 1.3;

// ── pure reward functions ───────────────────────────────────────────

/// `energy_mult_base + energy · energy_mult_step` (E0→0.6 … E5→1.6 at
/// defaults).
pub fn energy_multiplier(energy: i64, settings: &Settings) -> f64 {
    settings.energy_mult_base + energy as f64 * settings.energy_mult_step
}

/// Time-quality factor in `[MIN_TIME_QUALITY, 1.0]`.
///
/// Expected time is `energy · minutes_per_energy_unit` in seconds;
/// overshooting it drags the factor down proportionally to
/// `time_efficiency_weight`, undershooting never pays more than 1.0.
pub fn time_quality(time_spent: i64, energy: i64, settings: &Settings) -> f64 {
    let expected = (energy * settings.minutes_per_energy_unit * 60) as f64;
    if expected <= 0.0 {
        return 1.0;
    }
    let raw =
        1.0 - ((time_spent as f64 - expected) / expected) * settings.time_efficiency_weight;
    raw.clamp(MIN_TIME_QUALITY, 1.0)
}

/// Full credit only when the item was tracked past the minimum work time.
pub fn focus_factor(time_spent: i64, settings: &Settings) -> f64 {
    if time_spent >= settings.min_work_time_seconds {
        1.0
    } else {
        FOCUS_PENALTY
    }
}

/// Reward for a completed non-habit task. Minimum 1.
pub fn task_reward(item: &WorkItem, settings: &Settings) -> i64 {
    let points = settings.points_per_task_base as f64
        * energy_multiplier(item.energy, settings)
        * time_quality(item.time_spent, item.energy, settings)
        * focus_factor(item.time_spent, settings);
    (points.round() as i64).max(1)
}

/// Reward for a completed habit occurrence. Minimum 1.
///
/// The streak fed into the bonus is the value stored *before* this
/// completion's increment, capped at `max_streak_bonus_days`.
pub fn habit_reward(item: &WorkItem, settings: &Settings) -> i64 {
    match item.habit_type {
        Some(HabitType::Routine) => item_points_floor(settings.routine_points_fixed),
        _ => {
            let capped = item.streak.min(settings.max_streak_bonus_days);
            let streak_bonus = 1.0 + ((capped + 1) as f64).log2() * settings.streak_log_factor;
            let points = settings.points_per_habit_base as f64
                * streak_bonus
                * energy_multiplier(item.energy, settings);
            item_points_floor(points.round() as i64)
        }
    }
}

fn item_points_floor(points: i64) -> i64 {
    points.max(1)
}

/// Summary of one finalized date.
#[derive(Debug, Clone, serde::Serialize)]
pub struct FinalizeSummary {
    pub date: NaiveDate,
    pub penalty: i64,
    pub completion_rate: f64,
    pub penalty_streak: i64,
    pub rest_day: bool,
}

/// Points projection until a target date.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Projection {
    pub current_total: i64,
    pub days_until: i64,
    pub avg_per_day: f64,
    pub min_projection: i64,
    pub avg_projection: i64,
    pub max_projection: i64,
}

/// Ledger mutators. Methods take a [`Tx`] so they compose into the
/// caller's transaction (complete, roll, finalize are each one
/// transaction from the core's perspective).
pub struct ScoringEngine;

impl ScoringEngine {
    /// Award points for a completed item and update the day's counters.
    ///
    /// Returns the points earned. The caller passes the item snapshot
    /// taken *before* habit bookkeeping (streak increment, recurrence
    /// advance) so the streak bonus sees the pre-completion value.
    pub fn apply_completion(
        tx: &Tx<'_>,
        settings: &Settings,
        item: &WorkItem,
        date: NaiveDate,
        now: NaiveDateTime,
    ) -> Result<i64> {
        let mut ledger = tx.get_or_create_ledger(date)?;

        let points = if item.is_habit {
            ledger.habits_completed += 1;
            habit_reward(item, settings)
        } else {
            ledger.tasks_completed += 1;
            task_reward(item, settings)
        };
        ledger.points_earned += points;

        // Full-day bonus: payable per-event because it is gated by
        // equality, which a monotone counter crosses at most once.
        if !item.is_habit
            && ledger.tasks_planned > 0
            && ledger.tasks_completed == ledger.tasks_planned
        {
            let bonus =
                (ledger.points_earned as f64 * settings.completion_bonus_full).round() as i64;
            ledger.points_earned += bonus;
            debug!(date = %date, bonus, "full completion bonus");
        }

        ledger.recompute_total();

        let mut details = ledger.day_details();
        details.completions.push(CompletionEntry {
            item_id: item.id,
            description: item.description.clone(),
            is_habit: item.is_habit,
            points,
            at: now,
        });
        ledger.set_day_details(&details);

        tx.update_ledger(&ledger)?;
        Self::check_goals(tx, date)?;
        Ok(points)
    }

    /// Finalize penalties for `date`. Idempotent: a second call fails
    /// with `AlreadyFinalized` and leaves the row untouched.
    pub fn finalize_day(
        tx: &Tx<'_>,
        settings: &Settings,
        date: NaiveDate,
    ) -> Result<FinalizeSummary> {
        let mut ledger = tx.get_or_create_ledger(date)?;
        if ledger.finalized {
            return Err(CoreError::AlreadyFinalized { date });
        }

        let prev_streak = match date.pred_opt() {
            Some(prev) => tx.ledger(prev)?.map(|l| l.penalty_streak).unwrap_or(0),
            None => 0,
        };
        let rest_day = tx.is_rest_day(date)?;

        ledger.completion_rate = if ledger.tasks_planned > 0 {
            (ledger.tasks_completed as f64 / ledger.tasks_planned as f64).min(1.0)
        } else {
            0.0
        };

        // Partial-day bonus, only judged once the day is closed so the
        // band is not paid repeatedly as the ratio passes through it.
        if ledger.tasks_planned > 0
            && ledger.points_earned > 0
            && ledger.completion_rate >= GOOD_BONUS_THRESHOLD
            && ledger.completion_rate < 1.0
        {
            let bonus =
                (ledger.points_earned as f64 * settings.completion_bonus_good).round() as i64;
            ledger.points_earned += bonus;
        }

        let mut breakdown = PenaltyBreakdown::default();
        if rest_day {
            ledger.points_penalty = 0;
            ledger.penalty_streak = prev_streak;
            breakdown.progressive_multiplier = 1.0;
        } else {
            // Rule 2: idle day.
            if ledger.tasks_completed == 0 && ledger.habits_completed == 0 {
                breakdown.idle_penalty = settings.idle_penalty;
            }

            // Rule 3: incomplete day.
            if ledger.tasks_planned > 0 {
                let r = ledger.completion_rate;
                if r < settings.incomplete_threshold_severe {
                    breakdown.incomplete_penalty = settings.incomplete_penalty_severe;
                } else if r < settings.incomplete_day_threshold {
                    breakdown.incomplete_penalty =
                        (settings.incomplete_day_penalty as f64 * (1.0 - r)).round() as i64;
                }
            }

            // Rule 4: missed habits, from rows still in place plus
            // occurrences the planner purged for this date.
            let missed = Self::missed_habits(tx, settings, date)?;
            breakdown.missed_habits_penalty = missed.iter().map(|m| m.penalty).sum();
            breakdown.missed_habits = missed;

            let base = breakdown.idle_penalty
                + breakdown.incomplete_penalty
                + breakdown.missed_habits_penalty;

            // Rule 5: progressive multiplier from yesterday's streak.
            if base > 0 {
                let multiplier = 1.0
                    + (prev_streak as f64 * settings.progressive_penalty_factor)
                        .min(settings.progressive_penalty_max - 1.0);
                ledger.points_penalty = (base as f64 * multiplier).round() as i64;
                ledger.penalty_streak = prev_streak + 1;
                breakdown.progressive_multiplier = multiplier;
            } else {
                ledger.points_penalty = 0;
                ledger.penalty_streak =
                    Self::streak_after_clean_day(tx, settings, date, prev_streak)?;
                breakdown.progressive_multiplier = 1.0;
            }
        }
        breakdown.total_penalty = ledger.points_penalty;

        ledger.finalized = true;
        ledger.recompute_total();
        let mut details = ledger.day_details();
        details.penalty_breakdown = Some(breakdown);
        ledger.set_day_details(&details);
        tx.update_ledger(&ledger)?;

        Self::check_goals(tx, date)?;

        Ok(FinalizeSummary {
            date,
            penalty: ledger.points_penalty,
            completion_rate: ledger.completion_rate,
            penalty_streak: ledger.penalty_streak,
            rest_day,
        })
    }

    /// Finalize every unfinalized effective date before `today`, in
    /// ascending order, advancing `last_penalty_date` per date so a
    /// failure retries from where it stopped.
    ///
    /// A fresh store (no token yet) starts at `today - 1`: days before
    /// the install are never penalized.
    pub fn finalize_pending(tx: &Tx<'_>, today: NaiveDate) -> Result<Vec<FinalizeSummary>> {
        let mut settings = tx.settings()?;
        let from = match settings.last_penalty_date {
            Some(d) => d,
            None => {
                let bootstrap = today - Days::new(1);
                settings.last_penalty_date = Some(bootstrap);
                tx.update_settings(&settings)?;
                bootstrap
            }
        };

        let mut summaries = Vec::new();
        let mut date = from + Days::new(1);
        while date < today {
            match Self::finalize_day(tx, &settings, date) {
                Ok(summary) => {
                    debug!(date = %date, penalty = summary.penalty, "day finalized");
                    summaries.push(summary);
                }
                // Already handled (e.g. by a concurrent roll); just
                // advance the token.
                Err(CoreError::AlreadyFinalized { .. }) => {}
                Err(e) => {
                    warn!(date = %date, error = %e, "finalize failed; token not advanced");
                    return Err(e);
                }
            }
            settings.last_penalty_date = Some(date);
            tx.update_settings(&settings)?;
            date = date + Days::new(1);
        }
        Ok(summaries)
    }

    fn missed_habits(
        tx: &Tx<'_>,
        settings: &Settings,
        date: NaiveDate,
    ) -> Result<Vec<MissedHabit>> {
        let mut missed = Vec::new();
        let mut seen = std::collections::BTreeSet::new();

        for habit in tx.unfinished_habits_due_by(date)? {
            let habit_type = habit.habit_type.unwrap_or(HabitType::Skill);
            seen.insert(habit.id);
            missed.push(MissedHabit {
                item_id: habit.id,
                description: habit.description.clone(),
                habit_type,
                penalty: Self::missed_penalty(habit_type, settings),
            });
        }
        for skip in tx.habit_skips_on(date)? {
            if !seen.insert(skip.item_id) {
                continue;
            }
            missed.push(MissedHabit {
                item_id: skip.item_id,
                description: skip.description.unwrap_or_default(),
                habit_type: skip.habit_type,
                penalty: Self::missed_penalty(skip.habit_type, settings),
            });
        }
        Ok(missed)
    }

    fn missed_penalty(habit_type: HabitType, settings: &Settings) -> i64 {
        match habit_type {
            HabitType::Skill => settings.missed_habit_penalty_base,
            HabitType::Routine => {
                (settings.missed_habit_penalty_base as f64 * ROUTINE_PENALTY_FACTOR).round() as i64
            }
        }
    }

    /// Streak carried into a zero-penalty day: resets after
    /// `penalty_streak_reset_days` consecutive clean days (including
    /// `date`), otherwise unchanged.
    fn streak_after_clean_day(
        tx: &Tx<'_>,
        settings: &Settings,
        date: NaiveDate,
        prev_streak: i64,
    ) -> Result<i64> {
        let mut clean_days: i64 = 1;
        let mut cursor = date.pred_opt();
        while clean_days < settings.penalty_streak_reset_days {
            match cursor {
                Some(day) => match tx.ledger(day)? {
                    Some(l) if l.points_penalty == 0 => {
                        clean_days += 1;
                        cursor = day.pred_opt();
                    }
                    _ => break,
                },
                None => break,
            }
        }
        if clean_days >= settings.penalty_streak_reset_days {
            Ok(0)
        } else {
            Ok(prev_streak)
        }
    }

    /// Check every active goal after a ledger mutation; returns the
    /// goals that just became achieved.
    pub fn check_goals(tx: &Tx<'_>, today: NaiveDate) -> Result<Vec<Goal>> {
        let total = tx.total_points()?;
        let mut achieved = Vec::new();
        for mut goal in tx.list_goals(false)? {
            let done = match &goal.kind {
                GoalKind::Points { target_points } => total >= *target_points,
                GoalKind::ProjectCompletion { project_name } => {
                    let (all, completed) = tx.project_task_counts(project_name)?;
                    all > 0 && completed == all
                }
            };
            if done {
                goal.achieved = true;
                goal.achieved_date = Some(today);
                tx.update_goal(&goal)?;
                achieved.push(goal);
            }
        }
        Ok(achieved)
    }

    /// Claim the reward for an achieved goal.
    pub fn claim_reward(tx: &Tx<'_>, goal_id: i64, now: NaiveDateTime) -> Result<Goal> {
        let mut goal = tx.get_goal(goal_id)?.ok_or(CoreError::NotFound {
            kind: "goal",
            id: goal_id,
        })?;
        if !goal.achieved {
            return Err(CoreError::InvalidArgument {
                field: "goal",
                message: format!("goal {goal_id} is not achieved yet"),
            });
        }
        goal.reward_claimed = true;
        goal.reward_claimed_at = Some(now);
        tx.update_goal(&goal)?;
        Ok(goal)
    }

    /// Min/avg/max projection to `target` from the trailing 30-day
    /// average of `daily_total`. Projections never fall below the
    /// current total.
    pub fn projection(tx: &Tx<'_>, today: NaiveDate, target: NaiveDate) -> Result<Projection> {
        let history = tx.ledger_history(today, 30)?;
        let avg_per_day = if history.is_empty() {
            0.0
        } else {
            history.iter().map(|l| l.daily_total).sum::<i64>() as f64 / history.len() as f64
        };
        let current_total = tx.total_points()?;
        let days_until = (target - today).num_days();

        if days_until <= 0 {
            return Ok(Projection {
                current_total,
                days_until,
                avg_per_day,
                min_projection: current_total,
                avg_projection: current_total,
                max_projection: current_total,
            });
        }

        let project = |mult: f64| {
            let projected =
                current_total + (avg_per_day * mult * days_until as f64) as i64;
            projected.max(current_total)
        };
        Ok(Projection {
            current_total,
            days_until,
            avg_per_day,
            min_projection: project(PROJECTION_LOW),
            avg_projection: project(1.0),
            max_projection: project(PROJECTION_HIGH),
        })
    }
}
