//! Settings commands.
//!
//! `set` works on any recognized key by round-tripping the settings
//! through JSON, so new fields are editable without new CLI plumbing.

use clap::Subcommand;
use dayroll_core::Settings;

use super::common::open_store;

#[derive(Subcommand)]
pub enum SettingsAction {
    /// Show all settings
    Show,
    /// Set one settings key
    Set {
        /// Key, e.g. max_tasks_per_day or penalty_time
        key: String,
        /// New value
        value: String,
    },
}

pub fn run(action: SettingsAction) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store()?;
    let view = store.view();

    match action {
        SettingsAction::Show => {
            let settings = view.settings()?;
            println!("{}", serde_json::to_string_pretty(&settings)?);
        }
        SettingsAction::Set { key, value } => {
            let settings = view.settings()?;
            let mut tree = serde_json::to_value(&settings)?;
            let map = tree
                .as_object_mut()
                .ok_or("settings did not serialize to an object")?;
            let slot = map
                .get(&key)
                .ok_or_else(|| format!("unknown settings key '{key}'"))?;

            // Interpret the value with the same type the key already has.
            let parsed = match slot {
                serde_json::Value::Bool(_) => serde_json::Value::Bool(value.parse()?),
                serde_json::Value::Number(n) if n.is_i64() => {
                    serde_json::Value::from(value.parse::<i64>()?)
                }
                serde_json::Value::Number(_) => serde_json::Value::from(value.parse::<f64>()?),
                _ => serde_json::Value::String(value.clone()),
            };
            map.insert(key.clone(), parsed);

            let updated: Settings = serde_json::from_value(tree)?;
            updated.validate()?;
            view.update_settings(&updated)?;
            println!("{key} = {value}");
        }
    }
    Ok(())
}
