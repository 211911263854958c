//! The work-item state machine: start / stop / complete and time
//! accumulation.
//!
//! At most one item is active at any instant. The active id lives on the
//! settings row and every transition updates it in the same transaction
//! as the item rows, so the invariant holds even when the scheduler and
//! operator race.

use chrono::{NaiveDateTime, NaiveTime};
use tracing::debug;

use crate::error::{CoreError, Result};
use crate::item::{ItemStatus, WorkItem};
use crate::scoring::ScoringEngine;
use crate::storage::Store;

/// Result of a `complete` call.
#[derive(Debug, Clone)]
pub struct CompletionOutcome {
    pub item: WorkItem,
    /// Points awarded; 0 for partial progress on a multi-target habit.
    pub points: i64,
    /// Whether the occurrence (or task) actually finished.
    pub occurrence_done: bool,
}

/// Daily work counters for the operator surface.
#[derive(Debug, Clone, serde::Serialize)]
pub struct WorkStats {
    pub done_today: i64,
    pub pending_today: i64,
    pub total_pending: i64,
}

/// State machine over work items. Every public operation is one store
/// transaction.
pub struct WorkTracker<'a> {
    store: &'a Store,
}

impl<'a> WorkTracker<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Start an item. Any currently-active item is stopped first with
    /// its elapsed time flushed, in the same transaction.
    ///
    /// Fails with `DependencyNotMet` when the item's dependency is
    /// neither completed nor scheduled for today.
    pub fn start(&self, id: i64, now: NaiveDateTime) -> Result<WorkItem> {
        self.store.tx(|tx| {
            let mut settings = tx.settings()?;
            let today = settings.date_context()?.effective_date(now);
            let mut item = tx.require_item(id)?;

            if item.status == ItemStatus::Active {
                return Ok(item); // already running
            }
            if item.status == ItemStatus::Completed {
                return Err(CoreError::InvalidArgument {
                    field: "item",
                    message: format!("item {id} is already completed"),
                });
            }

            if let Some(dep_id) = item.depends_on {
                // A vanished dependency no longer blocks anything.
                if let Some(dep) = tx.get_item(dep_id)? {
                    let satisfied = dep.status == ItemStatus::Completed
                        || (!dep.is_habit && dep.is_today)
                        || dep.is_due_on(today);
                    if !satisfied {
                        return Err(CoreError::DependencyNotMet {
                            item: id,
                            depends_on: dep_id,
                        });
                    }
                }
            }

            if let Some(active_id) = settings.active_item_id {
                if active_id != id {
                    if let Some(mut active) = tx.get_item(active_id)? {
                        flush_elapsed(&mut active, now);
                        active.status = ItemStatus::Pending;
                        tx.update_item(&active)?;
                    }
                }
            }

            item.status = ItemStatus::Active;
            item.started_at = Some(now);
            if !item.is_habit {
                item.is_today = true;
            }
            tx.update_item(&item)?;

            settings.active_item_id = Some(id);
            tx.update_settings(&settings)?;
            debug!(item = id, "item started");
            Ok(item)
        })
    }

    /// Stop the active item, flushing elapsed seconds into `time_spent`.
    /// No-op (returns `None`) when nothing is active.
    pub fn stop(&self, now: NaiveDateTime) -> Result<Option<WorkItem>> {
        self.store.tx(|tx| {
            let mut settings = tx.settings()?;
            let Some(active_id) = settings.active_item_id else {
                return Ok(None);
            };
            settings.active_item_id = None;

            let item = match tx.get_item(active_id)? {
                Some(mut item) => {
                    flush_elapsed(&mut item, now);
                    item.status = ItemStatus::Pending;
                    tx.update_item(&item)?;
                    Some(item)
                }
                // Stale pointer (item deleted out of band); just clear it.
                None => None,
            };
            tx.update_settings(&settings)?;
            Ok(item)
        })
    }

    /// Complete an item, or the active item when `id` is `None`.
    ///
    /// Non-habits become terminal and are rewarded. Habits advance their
    /// daily counter; when the daily target is met the occurrence is
    /// rewarded, the streak moves, and the recurrence engine reschedules
    /// the same row for its next date.
    pub fn complete(&self, id: Option<i64>, now: NaiveDateTime) -> Result<CompletionOutcome> {
        self.store.tx(|tx| {
            let mut settings = tx.settings()?;
            let today = settings.date_context()?.effective_date(now);

            let id = match id.or(settings.active_item_id) {
                Some(id) => id,
                None => {
                    return Err(CoreError::InvalidArgument {
                        field: "item",
                        message: "no active item to complete".into(),
                    })
                }
            };
            let mut item = tx.require_item(id)?;
            if item.status == ItemStatus::Completed {
                return Err(CoreError::InvalidArgument {
                    field: "item",
                    message: format!("item {id} is already completed"),
                });
            }

            flush_elapsed(&mut item, now);
            if settings.active_item_id == Some(id) {
                settings.active_item_id = None;
            }

            let outcome = if item.is_habit {
                item.daily_completed += 1;
                if item.daily_completed >= item.daily_target {
                    // The reward sees the streak as stored before this
                    // completion's increment.
                    let snapshot = item.clone();

                    item.status = ItemStatus::Completed;
                    item.completed_at = Some(now);
                    item.streak = (item.streak + 1).min(settings.max_streak_bonus_days);
                    item.last_completed_date = Some(today);

                    let anchor = item.due_date.unwrap_or(today);
                    if let Some(next) = item.recurrence.next_occurrence(anchor) {
                        item.due_date = Some(next);
                        item.daily_completed = 0;
                        item.status = ItemStatus::Pending;
                        item.completed_at = None;
                        debug!(item = id, next = %next, "habit rescheduled");
                    }
                    tx.update_item(&item)?;
                    let points =
                        ScoringEngine::apply_completion(tx, &settings, &snapshot, today, now)?;
                    CompletionOutcome {
                        item: item.clone(),
                        points,
                        occurrence_done: true,
                    }
                } else {
                    item.status = ItemStatus::Pending;
                    tx.update_item(&item)?;
                    CompletionOutcome {
                        item: item.clone(),
                        points: 0,
                        occurrence_done: false,
                    }
                }
            } else {
                item.status = ItemStatus::Completed;
                item.completed_at = Some(now);
                // Row first: the goal check inside the reward reads
                // project completion state from the store.
                tx.update_item(&item)?;
                let points = ScoringEngine::apply_completion(tx, &settings, &item, today, now)?;
                CompletionOutcome {
                    item: item.clone(),
                    points,
                    occurrence_done: true,
                }
            };

            tx.update_settings(&settings)?;
            Ok(outcome)
        })
    }

    /// Delete an item, clearing the active pointer when it was running.
    pub fn delete(&self, id: i64) -> Result<()> {
        self.store.tx(|tx| {
            let mut settings = tx.settings()?;
            if settings.active_item_id == Some(id) {
                settings.active_item_id = None;
                tx.update_settings(&settings)?;
            }
            tx.delete_item(id)
        })
    }

    /// Daily counters: completions on the effective date, what's still
    /// on the agenda, and the total backlog.
    pub fn stats(&self, now: NaiveDateTime) -> Result<WorkStats> {
        let view = self.store.view();
        let settings = view.settings()?;
        let today = settings.date_context()?.effective_date(now);
        let day_start = today.and_time(NaiveTime::MIN);
        let day_end = (today + chrono::Days::new(1)).and_time(NaiveTime::MIN);

        let done_today = view.completed_count_between(day_start, day_end, None)?;
        let pending_today = view.today_tasks()?.len() as i64
            + view
                .today_habits(today)?
                .iter()
                .filter(|h| h.occurrence_unfinished())
                .count() as i64;
        Ok(WorkStats {
            done_today,
            pending_today,
            total_pending: view.pending_count()?,
        })
    }
}

fn flush_elapsed(item: &mut WorkItem, now: NaiveDateTime) {
    if let Some(started) = item.started_at.take() {
        let elapsed = (now - started).num_seconds().max(0);
        item.time_spent += elapsed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{HabitType, Recurrence};
    use chrono::NaiveDate;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn store_with_task(description: &str) -> (Store, i64) {
        let store = Store::open_memory().unwrap();
        let mut item = WorkItem::new(description, at("2025-03-10 08:00:00"));
        item.energy = 3;
        let id = store.view().insert_item(&item).unwrap();
        (store, id)
    }

    #[test]
    fn start_then_stop_accumulates_elapsed_time() {
        let (store, id) = store_with_task("focus work");
        let tracker = WorkTracker::new(&store);

        tracker.start(id, at("2025-03-10 09:00:00")).unwrap();
        let stopped = tracker
            .stop(at("2025-03-10 09:30:00"))
            .unwrap()
            .expect("active item");
        assert_eq!(stopped.id, id);
        assert_eq!(stopped.time_spent, 1800);
        assert_eq!(stopped.status, ItemStatus::Pending);
        assert!(stopped.started_at.is_none());

        // Second stop is a no-op.
        assert!(tracker.stop(at("2025-03-10 10:00:00")).unwrap().is_none());
    }

    #[test]
    fn starting_second_item_stops_the_first() {
        let (store, first) = store_with_task("first");
        let second = store
            .view()
            .insert_item(&WorkItem::new("second", at("2025-03-10 08:00:00")))
            .unwrap();
        let tracker = WorkTracker::new(&store);

        tracker.start(first, at("2025-03-10 09:00:00")).unwrap();
        tracker.start(second, at("2025-03-10 09:10:00")).unwrap();

        let view = store.view();
        let first_item = view.require_item(first).unwrap();
        let second_item = view.require_item(second).unwrap();
        assert_eq!(first_item.status, ItemStatus::Pending);
        assert_eq!(first_item.time_spent, 600);
        assert_eq!(second_item.status, ItemStatus::Active);
        assert_eq!(view.settings().unwrap().active_item_id, Some(second));

        // Exactly one active item.
        let active = view
            .list_items()
            .unwrap()
            .into_iter()
            .filter(|i| i.status == ItemStatus::Active)
            .count();
        assert_eq!(active, 1);
    }

    #[test]
    fn simple_task_reward_flows_to_ledger() {
        let (store, id) = store_with_task("report");
        let tracker = WorkTracker::new(&store);

        tracker.start(id, at("2025-03-10 09:00:00")).unwrap();
        // Exactly the expected time for energy 3: 3600s.
        let outcome = tracker
            .complete(Some(id), at("2025-03-10 10:00:00"))
            .unwrap();
        assert_eq!(outcome.points, 12);
        assert!(outcome.occurrence_done);
        assert_eq!(outcome.item.time_spent, 3600);
        assert_eq!(outcome.item.status, ItemStatus::Completed);
        assert!(outcome.item.completed_at.is_some());

        let ledger = store.view().ledger(d("2025-03-10")).unwrap().unwrap();
        assert_eq!(ledger.points_earned, 12);
        assert_eq!(ledger.tasks_completed, 1);
        assert!(store.view().settings().unwrap().active_item_id.is_none());
    }

    #[test]
    fn complete_without_id_targets_active_item() {
        let (store, id) = store_with_task("report");
        let tracker = WorkTracker::new(&store);
        tracker.start(id, at("2025-03-10 09:00:00")).unwrap();
        let outcome = tracker.complete(None, at("2025-03-10 09:45:00")).unwrap();
        assert_eq!(outcome.item.id, id);

        // Nothing active anymore.
        let err = tracker.complete(None, at("2025-03-10 09:50:00")).unwrap_err();
        assert!(matches!(err, CoreError::InvalidArgument { .. }));
    }

    #[test]
    fn completing_twice_is_rejected() {
        let (store, id) = store_with_task("once");
        let tracker = WorkTracker::new(&store);
        tracker.complete(Some(id), at("2025-03-10 09:00:00")).unwrap();
        assert!(tracker
            .complete(Some(id), at("2025-03-10 09:01:00"))
            .is_err());
    }

    #[test]
    fn dependency_blocks_until_scheduled_today() {
        let store = Store::open_memory().unwrap();
        let view = store.view();
        let a = view
            .insert_item(&WorkItem::new("a", at("2025-03-10 08:00:00")))
            .unwrap();
        let mut b_item = WorkItem::new("b", at("2025-03-10 08:00:00"));
        b_item.depends_on = Some(a);
        let b = view.insert_item(&b_item).unwrap();

        let tracker = WorkTracker::new(&store);
        let err = tracker.start(b, at("2025-03-10 09:00:00")).unwrap_err();
        assert!(matches!(
            err,
            CoreError::DependencyNotMet { item, depends_on } if item == b && depends_on == a
        ));

        // Put A on today's plan: same-day chains become startable.
        let mut a_item = view.require_item(a).unwrap();
        a_item.is_today = true;
        view.update_item(&a_item).unwrap();
        assert!(tracker.start(b, at("2025-03-10 09:05:00")).is_ok());
    }

    #[test]
    fn habit_completion_reschedules_same_row() {
        let store = Store::open_memory().unwrap();
        let habit = WorkItem::new_habit(
            "stretch",
            HabitType::Skill,
            Recurrence::Daily,
            d("2025-03-10"),
            at("2025-03-10 08:00:00"),
        );
        let id = store.view().insert_item(&habit).unwrap();
        let tracker = WorkTracker::new(&store);

        let outcome = tracker
            .complete(Some(id), at("2025-03-10 09:00:00"))
            .unwrap();
        assert!(outcome.occurrence_done);
        assert!(outcome.points >= 1);

        let item = store.view().require_item(id).unwrap();
        assert_eq!(item.status, ItemStatus::Pending);
        assert_eq!(item.due_date, Some(d("2025-03-11")));
        assert_eq!(item.daily_completed, 0);
        assert_eq!(item.streak, 1);
        assert_eq!(item.last_completed_date, Some(d("2025-03-10")));
        assert!(item.completed_at.is_none());

        let ledger = store.view().ledger(d("2025-03-10")).unwrap().unwrap();
        assert_eq!(ledger.habits_completed, 1);
    }

    #[test]
    fn one_shot_habit_becomes_terminal() {
        let store = Store::open_memory().unwrap();
        let habit = WorkItem::new_habit(
            "file taxes",
            HabitType::Routine,
            Recurrence::None,
            d("2025-03-10"),
            at("2025-03-10 08:00:00"),
        );
        let id = store.view().insert_item(&habit).unwrap();
        let tracker = WorkTracker::new(&store);
        tracker.complete(Some(id), at("2025-03-10 09:00:00")).unwrap();
        let item = store.view().require_item(id).unwrap();
        assert_eq!(item.status, ItemStatus::Completed);
        assert!(item.completed_at.is_some());
    }

    #[test]
    fn multi_target_habit_rewards_only_at_target() {
        let store = Store::open_memory().unwrap();
        let mut habit = WorkItem::new_habit(
            "drink water",
            HabitType::Routine,
            Recurrence::Daily,
            d("2025-03-10"),
            at("2025-03-10 08:00:00"),
        );
        habit.daily_target = 3;
        let id = store.view().insert_item(&habit).unwrap();
        let tracker = WorkTracker::new(&store);

        for n in 1..=2 {
            let outcome = tracker
                .complete(Some(id), at("2025-03-10 09:00:00"))
                .unwrap();
            assert!(!outcome.occurrence_done);
            assert_eq!(outcome.points, 0);
            assert_eq!(outcome.item.daily_completed, n);
        }
        let outcome = tracker
            .complete(Some(id), at("2025-03-10 09:00:00"))
            .unwrap();
        assert!(outcome.occurrence_done);
        assert_eq!(outcome.points, 6);
        assert_eq!(outcome.item.daily_completed, 0); // reset for next date
        assert_eq!(outcome.item.due_date, Some(d("2025-03-11")));

        let ledger = store.view().ledger(d("2025-03-10")).unwrap().unwrap();
        assert_eq!(ledger.habits_completed, 1);
    }

    #[test]
    fn habit_streak_caps_at_settings_maximum() {
        let store = Store::open_memory().unwrap();
        let mut habit = WorkItem::new_habit(
            "read",
            HabitType::Skill,
            Recurrence::Daily,
            d("2025-03-10"),
            at("2025-03-10 08:00:00"),
        );
        habit.streak = 100; // already at the default cap
        let id = store.view().insert_item(&habit).unwrap();
        let tracker = WorkTracker::new(&store);
        let outcome = tracker
            .complete(Some(id), at("2025-03-10 09:00:00"))
            .unwrap();
        assert_eq!(outcome.item.streak, 100);
    }

    #[test]
    fn project_goal_achieved_by_final_completion() {
        use crate::ledger::{Goal, GoalKind};

        let store = Store::open_memory().unwrap();
        let view = store.view();
        let mut item = WorkItem::new("ship it", at("2025-03-10 08:00:00"));
        item.project = Some("launch".into());
        let id = view.insert_item(&item).unwrap();
        view.insert_goal(&Goal {
            id: 0,
            kind: GoalKind::ProjectCompletion {
                project_name: "launch".into(),
            },
            reward_description: "dinner out".into(),
            deadline: None,
            achieved: false,
            achieved_date: None,
            reward_claimed: false,
            reward_claimed_at: None,
            created_at: at("2025-03-10 08:00:00"),
        })
        .unwrap();

        let tracker = WorkTracker::new(&store);
        tracker.complete(Some(id), at("2025-03-10 09:00:00")).unwrap();

        let goals = store.view().list_goals(true).unwrap();
        assert!(goals[0].achieved, "goal flips in the same transaction");
        assert_eq!(goals[0].achieved_date, Some(d("2025-03-10")));
    }

    #[test]
    fn delete_clears_active_pointer() {
        let (store, id) = store_with_task("doomed");
        let tracker = WorkTracker::new(&store);
        tracker.start(id, at("2025-03-10 09:00:00")).unwrap();
        tracker.delete(id).unwrap();
        assert!(store.view().settings().unwrap().active_item_id.is_none());
        assert!(store.view().get_item(id).unwrap().is_none());
    }

    #[test]
    fn start_stop_cycles_never_lose_time() {
        let (store, id) = store_with_task("long haul");
        let tracker = WorkTracker::new(&store);
        let mut t = at("2025-03-10 09:00:00");
        let mut expected = 0;
        for minutes in [5_i64, 17, 42] {
            tracker.start(id, t).unwrap();
            t += chrono::Duration::minutes(minutes);
            tracker.stop(t).unwrap();
            expected += minutes * 60;
            let item = store.view().require_item(id).unwrap();
            assert_eq!(item.time_spent, expected);
            t += chrono::Duration::minutes(1);
        }
    }

    #[test]
    fn stats_counts_effective_day() {
        let (store, id) = store_with_task("report");
        let habit = WorkItem::new_habit(
            "stretch",
            HabitType::Routine,
            Recurrence::Daily,
            d("2025-03-10"),
            at("2025-03-10 08:00:00"),
        );
        store.view().insert_item(&habit).unwrap();
        let mut today_task = WorkItem::new("today", at("2025-03-10 08:00:00"));
        today_task.is_today = true;
        store.view().insert_item(&today_task).unwrap();

        let tracker = WorkTracker::new(&store);
        tracker.complete(Some(id), at("2025-03-10 09:00:00")).unwrap();

        let stats = tracker.stats(at("2025-03-10 12:00:00")).unwrap();
        assert_eq!(stats.done_today, 1);
        assert_eq!(stats.pending_today, 2); // agenda task + habit due today
        assert_eq!(stats.total_pending, 2);
    }

    #[test]
    fn weekly_habit_advances_to_next_scheduled_weekday() {
        let store = Store::open_memory().unwrap();
        // 2025-03-10 is a Monday; habit runs Mon and Thu.
        let habit = WorkItem::new_habit(
            "swim",
            HabitType::Skill,
            Recurrence::Weekly {
                days: std::collections::BTreeSet::from([0, 3]),
            },
            d("2025-03-10"),
            at("2025-03-10 08:00:00"),
        );
        let id = store.view().insert_item(&habit).unwrap();
        let tracker = WorkTracker::new(&store);
        tracker.complete(Some(id), at("2025-03-10 09:00:00")).unwrap();
        let item = store.view().require_item(id).unwrap();
        assert_eq!(item.due_date, Some(d("2025-03-13"))); // Thursday
    }
}
