use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use clap::Args;
use dayforge_core::time::format_hours;
use dayforge_core::{PlanCache, PlanOutcome};

use crate::context::{CliResult, Context};

#[derive(Args)]
pub struct PlanArgs {
    /// Cache file; reused when inputs are unchanged and rewritten otherwise
    #[arg(long)]
    cache: Option<PathBuf>,
    /// Output as JSON
    #[arg(long)]
    json: bool,
    /// Plan against stored logs without writing or clearing any
    #[arg(long)]
    dry_run: bool,
}

pub fn run(ctx: &Context, args: PlanArgs) -> CliResult {
    let cached = match &args.cache {
        Some(path) => read_cache(path),
        None => None,
    };

    let outcome = ctx.plan(cached, args.dry_run)?;

    if let Some(path) = &args.cache {
        std::fs::write(path, serde_json::to_string_pretty(&outcome.cache)?)?;
    }

    if args.json {
        let json = serde_json::json!({
            "report": outcome.report,
            "plan": outcome.cache,
        });
        println!("{}", serde_json::to_string_pretty(&json)?);
    } else {
        print_outcome(&outcome);
    }
    Ok(())
}

/// A missing or unreadable cache only means the pass rebuilds.
fn read_cache(path: &Path) -> Option<PlanCache> {
    let content = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str(&content) {
        Ok(cache) => Some(cache),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable plan cache");
            None
        }
    }
}

fn print_outcome(outcome: &PlanOutcome) {
    let PlanOutcome { cache, report } = outcome;
    let state = if report.regenerated { "regenerated" } else { "unchanged" };
    println!(
        "Plan {state} ({} chunks, {:.2}h scheduled, {} logs cleared)",
        report.chunk_count, report.scheduled_hours, report.cleared_logs
    );

    let mut lines: Vec<(NaiveDate, f64, String)> = cache
        .chunks
        .values()
        .flatten()
        .map(|c| (c.date, c.start, c.label()))
        .chain(
            cache
                .buffers
                .iter()
                .map(|b| (b.date, b.start, format!("{} (buffer)", b.label()))),
        )
        .collect();
    lines.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.total_cmp(&b.1)));
    for (_, _, line) in lines {
        println!("  {line}");
    }

    if !cache.unscheduled.is_empty() {
        println!("\nUnscheduled:");
        for (task_id, hours) in &cache.unscheduled {
            println!("  {task_id}: {hours:.2}h");
        }
    }
    if let Some(hours) = report.placeholder_hours {
        println!("\nBillable placeholder: {hours:.0}h");
    }
    for block in &cache.wind_down {
        println!(
            "Wind-down {}: {} for {}m",
            block.date,
            format_hours(block.start_hours()),
            block.duration_minutes
        );
    }
}
