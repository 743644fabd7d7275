use chrono::NaiveDate;
use clap::Args;
use dayforge_core::availability::{free_runs, AvailabilityScanner, OccupiedSlots};
use dayforge_core::conflict::ConflictReason;
use dayforge_core::provider::DateWindow;
use dayforge_core::time::{format_hours, quarter_to_hours};

use crate::context::{CliResult, Context};

#[derive(Args)]
pub struct SlotsArgs {
    /// Day to scan (default: today)
    #[arg(long)]
    date: Option<NaiveDate>,
    /// Only print free runs
    #[arg(long)]
    free: bool,
    /// Output as JSON
    #[arg(long)]
    json: bool,
}

pub fn run(ctx: &Context, args: SlotsArgs) -> CliResult {
    let config = ctx.config();
    let date = args.date.unwrap_or_else(|| ctx.today(&config));
    let days = [date];
    let inputs = ctx.inputs(DateWindow::new(date, date))?;
    let maps = ctx.conflict_maps(&config, &inputs, &days);
    let weekend = config.weekend();
    let scanner = AvailabilityScanner::new(&maps, &weekend, ctx.local_now(&config));
    let slots = scanner.scan(date, config.work_hours.for_date(date), &OccupiedSlots::new());

    if args.free {
        let runs = free_runs(&slots);
        if args.json {
            let runs: Vec<_> = runs
                .iter()
                .map(|r| serde_json::json!({"start": quarter_to_hours(r.start), "end": quarter_to_hours(r.end)}))
                .collect();
            println!("{}", serde_json::to_string_pretty(&runs)?);
        } else {
            for run in runs {
                println!(
                    "{}-{}",
                    format_hours(quarter_to_hours(run.start)),
                    format_hours(quarter_to_hours(run.end))
                );
            }
        }
        return Ok(());
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&slots)?);
        return Ok(());
    }
    if slots.is_empty() {
        println!("No slots on {date}");
    }
    for slot in &slots {
        let why: Vec<String> = slot.reasons.iter().map(describe).collect();
        let state = if slot.available { "free".to_string() } else { why.join(", ") };
        println!("{} {state}", format_hours(slot.start_hours()));
    }
    Ok(())
}

fn describe(reason: &ConflictReason) -> String {
    match reason {
        ConflictReason::Habit(id) => format!("habit {id}"),
        ConflictReason::Session(id) => format!("session {id}"),
        ConflictReason::Meeting(id) => format!("meeting {id}"),
        ConflictReason::TaskLog(id) => format!("task log {id}"),
        ConflictReason::Buffer(id) => format!("wind-down {id}"),
        ConflictReason::Scheduled(id) => format!("scheduled {id}"),
    }
}
