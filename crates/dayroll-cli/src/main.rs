use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "dayroll", version, about = "Dayroll CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Task and habit management
    Task {
        #[command(subcommand)]
        action: commands::task::TaskAction,
    },
    /// Daily roll (agenda selection)
    Roll {
        #[command(subcommand)]
        action: commands::roll::RollAction,
    },
    /// Points, history, and projections
    Points {
        #[command(subcommand)]
        action: commands::points::PointsAction,
    },
    /// Reward goals
    Goal {
        #[command(subcommand)]
        action: commands::goal::GoalAction,
    },
    /// Rest days (penalty-exempt dates)
    RestDay {
        #[command(subcommand)]
        action: commands::restday::RestDayAction,
    },
    /// Database backups
    Backup {
        #[command(subcommand)]
        action: commands::backup::BackupAction,
    },
    /// Settings management
    Settings {
        #[command(subcommand)]
        action: commands::settings::SettingsAction,
    },
    /// Background scheduler
    Scheduler {
        #[command(subcommand)]
        action: commands::scheduler::SchedulerAction,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Task { action } => commands::task::run(action),
        Commands::Roll { action } => commands::roll::run(action),
        Commands::Points { action } => commands::points::run(action),
        Commands::Goal { action } => commands::goal::run(action),
        Commands::RestDay { action } => commands::restday::run(action),
        Commands::Backup { action } => commands::backup::run(action),
        Commands::Settings { action } => commands::settings::run(action),
        Commands::Scheduler { action } => commands::scheduler::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
