//! Reward goal commands.

use clap::Subcommand;
use dayroll_core::{Goal, GoalKind, ScoringEngine};

use super::common::{now, open_store, parse_date};

#[derive(Subcommand)]
pub enum GoalAction {
    /// Create a points goal
    Points {
        /// Target cumulative score
        target: i64,
        /// What you get when you reach it
        reward: String,
        /// Optional deadline (YYYY-MM-DD)
        #[arg(long)]
        deadline: Option<String>,
    },
    /// Create a project-completion goal
    Project {
        /// Project name that must be fully completed
        name: String,
        /// What you get when you reach it
        reward: String,
        /// Optional deadline (YYYY-MM-DD)
        #[arg(long)]
        deadline: Option<String>,
    },
    /// List goals
    List {
        /// Include achieved goals
        #[arg(long)]
        all: bool,
    },
    /// Update a goal
    Update {
        /// Goal id
        id: i64,
        /// New reward description
        #[arg(long)]
        reward: Option<String>,
        /// New deadline (YYYY-MM-DD)
        #[arg(long)]
        deadline: Option<String>,
        /// New points target (points goals only)
        #[arg(long)]
        target: Option<i64>,
    },
    /// Delete a goal
    Delete {
        /// Goal id
        id: i64,
    },
    /// Claim the reward of an achieved goal
    Claim {
        /// Goal id
        id: i64,
    },
}

fn create(
    store: &dayroll_core::Store,
    kind: GoalKind,
    reward: String,
    deadline: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut goal = Goal {
        id: 0,
        kind,
        reward_description: reward,
        deadline: deadline.map(|s| parse_date(&s)).transpose()?,
        achieved: false,
        achieved_date: None,
        reward_claimed: false,
        reward_claimed_at: None,
        created_at: now(),
    };
    goal.id = store.view().insert_goal(&goal)?;
    println!("{}", serde_json::to_string_pretty(&goal)?);
    Ok(())
}

pub fn run(action: GoalAction) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store()?;

    match action {
        GoalAction::Points {
            target,
            reward,
            deadline,
        } => create(
            &store,
            GoalKind::Points {
                target_points: target,
            },
            reward,
            deadline,
        )?,
        GoalAction::Project {
            name,
            reward,
            deadline,
        } => create(
            &store,
            GoalKind::ProjectCompletion { project_name: name },
            reward,
            deadline,
        )?,
        GoalAction::List { all } => {
            let goals = store.view().list_goals(all)?;
            println!("{}", serde_json::to_string_pretty(&goals)?);
        }
        GoalAction::Update {
            id,
            reward,
            deadline,
            target,
        } => {
            let view = store.view();
            let mut goal = view
                .get_goal(id)?
                .ok_or_else(|| format!("goal {id} not found"))?;
            if let Some(r) = reward {
                goal.reward_description = r;
            }
            if let Some(s) = deadline {
                goal.deadline = Some(parse_date(&s)?);
            }
            if let Some(t) = target {
                match &mut goal.kind {
                    GoalKind::Points { target_points } => *target_points = t,
                    GoalKind::ProjectCompletion { .. } => {
                        return Err("only points goals have a target".into())
                    }
                }
            }
            view.update_goal(&goal)?;
            println!("{}", serde_json::to_string_pretty(&goal)?);
        }
        GoalAction::Delete { id } => {
            store.view().delete_goal(id)?;
            println!("deleted goal {id}");
        }
        GoalAction::Claim { id } => {
            let goal = store.tx(|tx| ScoringEngine::claim_reward(tx, id, now()))?;
            println!("claimed: {}", goal.reward_description);
        }
    }
    Ok(())
}
