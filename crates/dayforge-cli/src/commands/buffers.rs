use clap::Args;
use dayforge_core::buffer::{spent_hours_by_category, CategorySources};
use dayforge_core::provider::DateWindow;
use dayforge_core::time::dates_between;

use crate::context::{CliResult, Context};

#[derive(Args)]
pub struct BuffersArgs {
    /// Output as JSON
    #[arg(long)]
    json: bool,
}

/// Buffers from a dry-run pass over stored logs, next to each category's spent time.
pub fn run(ctx: &Context, args: BuffersArgs) -> CliResult {
    let config = ctx.config();
    let outcome = ctx.plan(None, true)?;
    let week = config.week.week_bounds(ctx.today(&config));
    let inputs = ctx.inputs(DateWindow::new(week.0, week.1))?;
    let spent = spent_hours_by_category(
        CategorySources {
            habits: &inputs.habits,
            sessions: &inputs.sessions,
            meetings: &inputs.meetings,
            task_logs: &inputs.task_logs,
            tasks: &inputs.tasks,
            projects: &inputs.projects,
        },
        &dates_between(week.0, week.1),
    );

    if args.json {
        let json = serde_json::json!({
            "spent": spent,
            "blocks": outcome.cache.buffers,
        });
        println!("{}", serde_json::to_string_pretty(&json)?);
        return Ok(());
    }

    println!("Week {} to {}", week.0, week.1);
    for buffer in &inputs.buffers {
        let used = spent.get(&buffer.category_id).copied().unwrap_or(0.0);
        let planned: f64 = outcome
            .cache
            .buffers
            .iter()
            .filter(|b| b.category_id == buffer.category_id)
            .map(|b| b.duration)
            .sum();
        println!(
            "{}: {used:.2}h spent, {planned:.2}h planned of {:.2}h",
            buffer.category_id, buffer.weekly_hours
        );
    }
    for block in &outcome.cache.buffers {
        println!("  {} ({:.2}h left)", block.label(), block.remaining_quota_hours);
    }
    Ok(())
}
