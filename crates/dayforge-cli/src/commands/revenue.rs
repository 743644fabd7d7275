use dayforge_core::provider::DateWindow;
use dayforge_core::scheduler::completed_hours_by_task;
use dayforge_core::scheduler::revenue::{placeholder_task, remaining_revenue};
use dayforge_core::WorkSummary;

use crate::context::{CliResult, Context};

pub fn run(ctx: &Context) -> CliResult {
    let config = ctx.config();
    let week = config.week.week_bounds(ctx.today(&config));
    let inputs = ctx.inputs(DateWindow::new(week.0, week.1))?;
    let billing = &config.billing;

    let summary = WorkSummary::from_logs(
        week,
        &inputs.task_logs,
        &inputs.tasks,
        &inputs.projects,
        billing.default_hourly_rate,
    );
    let completed = completed_hours_by_task(&inputs.task_logs);
    let remaining = remaining_revenue(
        billing,
        &inputs.tasks,
        &inputs.projects,
        &completed,
        summary.completed_billable_revenue(),
    );

    println!("Week {} to {}", week.0, week.1);
    println!("Worked:   {:.2}h", summary.actual_hours);
    println!(
        "Billable: {:.2}h (${:.2})",
        summary.billable_hours, summary.billable_revenue
    );
    for project in &summary.projects {
        let name = project.project_id.as_deref().unwrap_or("(no project)");
        println!("  {name}: {:.2}h", project.actual_hours);
    }
    println!(
        "Target:   ${:.2}, ${remaining:.2} still open",
        billing.weekly_revenue_target
    );

    match placeholder_task(
        billing,
        &inputs.tasks,
        &inputs.projects,
        &completed,
        summary.completed_billable_revenue(),
    ) {
        Some(task) => println!("Placeholder: {:.0}h of {}", task.estimated_hours, task.title),
        None if !billing.enabled => println!("Placeholder: billing disabled"),
        None => println!("Placeholder: none needed"),
    }
    Ok(())
}
