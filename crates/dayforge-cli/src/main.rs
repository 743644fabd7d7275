use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod context;

use context::Context;

#[derive(Parser)]
#[command(name = "dayforge", version, about = "Dayforge calendar planner")]
struct Cli {
    /// User whose calendar is planned
    #[arg(long, global = true, default_value = "local")]
    user: String,
    /// JSON snapshot with habits, meetings, tasks and buffers
    /// (default: ~/.config/dayforge/snapshot.json)
    #[arg(long, global = true, env = "DAYFORGE_SNAPSHOT")]
    snapshot: Option<PathBuf>,
    /// Task log database (default: ~/.config/dayforge/logs.db)
    #[arg(long, global = true, env = "DAYFORGE_DB")]
    db: Option<PathBuf>,
    /// Plan as of this RFC 3339 instant instead of the current time
    #[arg(long, global = true)]
    now: Option<DateTime<Utc>>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a full planning pass
    Plan(commands::plan::PlanArgs),
    /// Resolve a habit's start times
    Habit(commands::habit::HabitArgs),
    /// Show quarter-hour availability for a day
    Slots(commands::slots::SlotsArgs),
    /// Show the conflict maps
    Conflicts(commands::conflicts::ConflictsArgs),
    /// Show category buffers for the rest of the week (dry run: reads stored logs, writes none)
    Buffers(commands::buffers::BuffersArgs),
    /// Show weekly hours, revenue and the billable placeholder
    Revenue,
    /// Stored task logs
    Logs {
        #[command(subcommand)]
        action: commands::logs::LogsAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Answer a JSON request (argument or stdin)
    Rpc {
        /// Request JSON, read from stdin when omitted
        request: Option<String>,
    },
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_env("DAYFORGE_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    init_tracing();
    let cli = Cli::parse();
    let ctx = Context::new(cli.user, cli.snapshot, cli.db, cli.now);

    let result = match cli.command {
        Commands::Plan(args) => commands::plan::run(&ctx, args),
        Commands::Habit(args) => commands::habit::run(&ctx, args),
        Commands::Slots(args) => commands::slots::run(&ctx, args),
        Commands::Conflicts(args) => commands::conflicts::run(&ctx, args),
        Commands::Buffers(args) => commands::buffers::run(&ctx, args),
        Commands::Revenue => commands::revenue::run(&ctx),
        Commands::Logs { action } => commands::logs::run(&ctx, action),
        Commands::Config { action } => commands::config::run(action),
        Commands::Rpc { request } => commands::rpc::run(request),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
