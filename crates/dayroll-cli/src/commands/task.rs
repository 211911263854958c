//! Task and habit commands.

use clap::Subcommand;
use dayroll_core::{HabitType, Recurrence, WorkItem, WorkTracker};
use std::collections::BTreeSet;

use super::common::{now, open_store, parse_date};

#[derive(Subcommand)]
pub enum TaskAction {
    /// Create a new task or habit
    Create {
        /// What needs doing
        description: String,
        /// Project name
        #[arg(long)]
        project: Option<String>,
        /// Priority 0-10 (default: 5)
        #[arg(long, default_value = "5")]
        priority: i64,
        /// Energy 0-5 (default: 3)
        #[arg(long, default_value = "3")]
        energy: i64,
        /// Due date (YYYY-MM-DD)
        #[arg(long)]
        due: Option<String>,
        /// Id of a task that must be completed first
        #[arg(long)]
        depends_on: Option<i64>,
        /// Create as a habit
        #[arg(long)]
        habit: bool,
        /// Habit type: skill or routine (default: skill)
        #[arg(long, default_value = "skill")]
        habit_type: String,
        /// Recurrence: none, daily, every-n-days, weekly (default: daily for habits)
        #[arg(long, default_value = "daily")]
        recurrence: String,
        /// Interval for every-n-days
        #[arg(long, default_value = "1")]
        interval: u32,
        /// Comma-separated weekdays for weekly recurrence (0=Mon .. 6=Sun)
        #[arg(long)]
        days: Option<String>,
        /// Completions required per day (default: 1)
        #[arg(long, default_value = "1")]
        daily_target: i64,
    },
    /// List tasks
    List {
        /// Only pending items
        #[arg(long)]
        pending: bool,
        /// Only today's agenda
        #[arg(long)]
        today: bool,
        /// Only habits
        #[arg(long)]
        habits: bool,
        /// Only habits due today
        #[arg(long)]
        today_habits: bool,
    },
    /// Get task details
    Get {
        /// Task id
        id: i64,
    },
    /// Update a task
    Update {
        /// Task id
        id: i64,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        project: Option<String>,
        #[arg(long)]
        priority: Option<i64>,
        #[arg(long)]
        energy: Option<i64>,
        /// New due date (YYYY-MM-DD)
        #[arg(long)]
        due: Option<String>,
        /// New dependency (0 clears it)
        #[arg(long)]
        depends_on: Option<i64>,
    },
    /// Delete a task
    Delete {
        /// Task id
        id: i64,
    },
    /// Show the currently active task
    Current,
    /// Start working on a task
    Start {
        /// Task id
        id: i64,
    },
    /// Stop the active task
    Stop,
    /// Complete a task (the active one when no id given)
    Done {
        /// Task id
        id: Option<i64>,
    },
    /// Daily work counters
    Stats,
}

fn parse_habit_type(s: &str) -> Result<HabitType, Box<dyn std::error::Error>> {
    HabitType::parse(s).ok_or_else(|| format!("unknown habit type '{s}'").into())
}

fn parse_recurrence(
    kind: &str,
    interval: u32,
    days: Option<&str>,
) -> Result<Recurrence, Box<dyn std::error::Error>> {
    match kind {
        "none" => Ok(Recurrence::None),
        "daily" => Ok(Recurrence::Daily),
        "every-n-days" | "every_n_days" => Ok(Recurrence::EveryNDays { interval }),
        "weekly" => {
            let days: BTreeSet<u8> = days
                .unwrap_or_default()
                .split(',')
                .filter(|s| !s.trim().is_empty())
                .map(|s| s.trim().parse::<u8>())
                .collect::<Result<_, _>>()?;
            Ok(Recurrence::Weekly { days })
        }
        other => Err(format!("unknown recurrence '{other}'").into()),
    }
}

pub fn run(action: TaskAction) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store()?;

    match action {
        TaskAction::Create {
            description,
            project,
            priority,
            energy,
            due,
            depends_on,
            habit,
            habit_type,
            recurrence,
            interval,
            days,
            daily_target,
        } => {
            let timestamp = now();
            let mut item = if habit {
                let due = match due {
                    Some(s) => parse_date(&s)?,
                    None => timestamp.date(),
                };
                WorkItem::new_habit(
                    description,
                    parse_habit_type(&habit_type)?,
                    parse_recurrence(&recurrence, interval, days.as_deref())?,
                    due,
                    timestamp,
                )
            } else {
                let mut item = WorkItem::new(description, timestamp);
                if let Some(s) = due {
                    item.due_date = Some(parse_date(&s)?);
                }
                item
            };
            item.project = project;
            item.priority = priority;
            item.energy = energy;
            item.depends_on = depends_on;
            item.daily_target = daily_target;

            let id = store.view().insert_item(&item)?;
            item.id = id;
            println!("{}", serde_json::to_string_pretty(&item)?);
        }
        TaskAction::List {
            pending,
            today,
            habits,
            today_habits,
        } => {
            let view = store.view();
            let items = if today_habits {
                let settings = view.settings()?;
                let date = settings.date_context()?.effective_date(now());
                view.today_habits(date)?
            } else if today {
                view.today_tasks()?
            } else if habits {
                view.habits()?
            } else if pending {
                view.pending_tasks()?
            } else {
                view.list_items()?
            };
            println!("{}", serde_json::to_string_pretty(&items)?);
        }
        TaskAction::Get { id } => {
            let item = store.view().require_item(id)?;
            println!("{}", serde_json::to_string_pretty(&item)?);
        }
        TaskAction::Update {
            id,
            description,
            project,
            priority,
            energy,
            due,
            depends_on,
        } => {
            let view = store.view();
            let mut item = view.require_item(id)?;
            if let Some(d) = description {
                item.description = d;
            }
            if project.is_some() {
                item.project = project;
            }
            if let Some(p) = priority {
                item.priority = p;
            }
            if let Some(e) = energy {
                item.energy = e;
            }
            if let Some(s) = due {
                item.due_date = Some(parse_date(&s)?);
            }
            if let Some(dep) = depends_on {
                item.depends_on = if dep == 0 { None } else { Some(dep) };
            }
            view.update_item(&item)?;
            println!("{}", serde_json::to_string_pretty(&item)?);
        }
        TaskAction::Delete { id } => {
            WorkTracker::new(&store).delete(id)?;
            println!("deleted task {id}");
        }
        TaskAction::Current => {
            let view = store.view();
            match view.settings()?.active_item_id {
                Some(id) => {
                    let item = view.require_item(id)?;
                    println!("{}", serde_json::to_string_pretty(&item)?);
                }
                None => println!("nothing active"),
            }
        }
        TaskAction::Start { id } => {
            let item = WorkTracker::new(&store).start(id, now())?;
            println!("started: {} (#{})", item.description, item.id);
        }
        TaskAction::Stop => match WorkTracker::new(&store).stop(now())? {
            Some(item) => println!(
                "stopped: {} (#{}) at {}s total",
                item.description, item.id, item.time_spent
            ),
            None => println!("nothing active"),
        },
        TaskAction::Done { id } => {
            let outcome = WorkTracker::new(&store).complete(id, now())?;
            if outcome.occurrence_done {
                println!(
                    "completed: {} (#{}) +{} points",
                    outcome.item.description, outcome.item.id, outcome.points
                );
            } else {
                println!(
                    "progress: {} ({}/{} today)",
                    outcome.item.description,
                    outcome.item.daily_completed,
                    outcome.item.daily_target
                );
            }
        }
        TaskAction::Stats => {
            let stats = WorkTracker::new(&store).stats(now())?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
    }
    Ok(())
}
