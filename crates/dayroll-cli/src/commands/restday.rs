//! Rest day commands.

use clap::Subcommand;

use super::common::{open_store, parse_date};

#[derive(Subcommand)]
pub enum RestDayAction {
    /// Mark a date as a rest day
    Add {
        /// Date (YYYY-MM-DD)
        date: String,
        /// Why
        #[arg(long)]
        description: Option<String>,
    },
    /// List rest days
    List,
    /// Remove a rest day
    Remove {
        /// Rest day id
        id: i64,
    },
}

pub fn run(action: RestDayAction) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store()?;
    let view = store.view();

    match action {
        RestDayAction::Add { date, description } => {
            let date = parse_date(&date)?;
            let id = view.insert_rest_day(date, description.as_deref())?;
            println!("rest day {date} recorded (#{id})");
        }
        RestDayAction::List => {
            let days = view.rest_days()?;
            println!("{}", serde_json::to_string_pretty(&days)?);
        }
        RestDayAction::Remove { id } => {
            view.delete_rest_day(id)?;
            println!("removed rest day {id}");
        }
    }
    Ok(())
}
