use chrono::NaiveDate;
use clap::Subcommand;
use dayforge_core::provider::{DateWindow, LogPersistence};
use dayforge_core::ClockTime;

use crate::context::{CliResult, Context};

#[derive(Subcommand)]
pub enum LogsAction {
    /// List stored logs
    List {
        /// Only this date
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Record actual work on a log
    Done {
        /// Log id
        id: String,
        /// Hours worked
        #[arg(long)]
        hours: f64,
        /// Actual start (HH:MM), defaults to the scheduled start
        #[arg(long)]
        start: Option<ClockTime>,
    },
    /// Remove engine-scheduled logs for a date
    Clear {
        #[arg(long)]
        date: NaiveDate,
    },
}

pub fn run(ctx: &Context, action: LogsAction) -> CliResult {
    let store = ctx.store()?;
    match action {
        LogsAction::List { date, json } => {
            let window = date.map(|d| DateWindow::new(d, d));
            let logs = store.list_logs(&ctx.user, window)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&logs)?);
                return Ok(());
            }
            if logs.is_empty() {
                println!("No logs");
            }
            for log in &logs {
                let start = log
                    .actual_start
                    .or(log.scheduled_start)
                    .map(|t| t.to_string())
                    .unwrap_or_else(|| "--:--".into());
                println!(
                    "{} {} {start} {:.2}h {:?} {}",
                    log.id,
                    log.date,
                    log.to_task_log().duration_hours(),
                    log.status,
                    log.title
                );
            }
        }
        LogsAction::Done { id, hours, start } => {
            if !hours.is_finite() || hours < 0.0 {
                return Err(format!("hours must be a non-negative number, got {hours}").into());
            }
            if !store.record_actual(&id, start, hours)? {
                return Err(format!("log not found: {id}").into());
            }
            println!("ok");
        }
        LogsAction::Clear { date } => {
            let cleared = store.clear_logs_for_date(&ctx.user, date)?;
            println!("cleared {cleared} logs");
        }
    }
    Ok(())
}
