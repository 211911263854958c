//! Daily roll commands.

use clap::Subcommand;
use dayroll_core::Planner;

use super::common::{now, open_store};

#[derive(Subcommand)]
pub enum RollAction {
    /// Roll today's agenda
    Run {
        /// Current energy level 0-5; filters the agenda
        #[arg(long)]
        mood: Option<i64>,
    },
    /// Check whether a roll is available right now
    Can,
}

pub fn run(action: RollAction) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store()?;
    let planner = Planner::new(&store);

    match action {
        RollAction::Run { mood } => {
            let outcome = planner.roll(mood, now())?;
            println!(
                "rolled {}: {} task(s), {} habit(s)",
                outcome.date,
                outcome.tasks.len(),
                outcome.habits.len()
            );
            for task in &outcome.tasks {
                println!("  [{}] {} (p{} e{})", task.id, task.description, task.priority, task.energy);
            }
            for habit in &outcome.habits {
                println!("  [{}] {} (habit, {}/{})", habit.id, habit.description, habit.daily_completed, habit.daily_target);
            }
            if outcome.purged_occurrences > 0 {
                println!("skipped {} overdue habit occurrence(s)", outcome.purged_occurrences);
            }
            for day in &outcome.finalized {
                println!(
                    "finalized {}: penalty {} (completion {:.0}%)",
                    day.date,
                    day.penalty,
                    day.completion_rate * 100.0
                );
            }
        }
        RollAction::Can => match planner.can_roll(now()) {
            Ok(()) => println!("roll available"),
            Err(e) => println!("roll unavailable: {e}"),
        },
    }
    Ok(())
}
