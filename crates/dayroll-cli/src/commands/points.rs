//! Points, history, and projection commands.

use clap::Subcommand;
use dayroll_core::ScoringEngine;

use super::common::{now, open_store, parse_date};

#[derive(Subcommand)]
pub enum PointsAction {
    /// Current total score
    Current,
    /// Daily ledger history
    History {
        /// Number of days (default: 30)
        #[arg(long, default_value = "30")]
        days: i64,
    },
    /// Projection to a target date
    Projection {
        /// Target date (YYYY-MM-DD)
        date: String,
    },
    /// Detailed breakdown of one day
    Day {
        /// Date (YYYY-MM-DD)
        date: String,
    },
}

pub fn run(action: PointsAction) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store()?;
    let view = store.view();
    let settings = view.settings()?;
    let today = settings.date_context()?.effective_date(now());

    match action {
        PointsAction::Current => {
            println!("{}", view.total_points()?);
        }
        PointsAction::History { days } => {
            let history = view.ledger_history(today, days)?;
            println!("{}", serde_json::to_string_pretty(&history)?);
        }
        PointsAction::Projection { date } => {
            let target = parse_date(&date)?;
            let projection = ScoringEngine::projection(&view, today, target)?;
            println!("{}", serde_json::to_string_pretty(&projection)?);
        }
        PointsAction::Day { date } => {
            let date = parse_date(&date)?;
            match view.ledger(date)? {
                Some(ledger) => {
                    println!("{}", serde_json::to_string_pretty(&ledger)?);
                    let details = ledger.day_details();
                    if !details.completions.is_empty() || details.penalty_breakdown.is_some() {
                        println!("{}", serde_json::to_string_pretty(&details)?);
                    }
                }
                None => println!("no ledger for {date}"),
            }
        }
    }
    Ok(())
}
