use chrono::NaiveDate;
use clap::Args;
use dayforge_core::habit::resolve_duration_minutes;
use dayforge_core::provider::DateWindow;
use dayforge_core::resolve_start_time;
use dayforge_core::time::checked_day_range;

use crate::context::{CliResult, Context};

#[derive(Args)]
pub struct HabitArgs {
    /// Habit id from the snapshot
    id: String,
    /// First date (default: today)
    #[arg(long)]
    date: Option<NaiveDate>,
    /// Number of days to resolve
    #[arg(long, default_value_t = 1)]
    days: u32,
}

pub fn run(ctx: &Context, args: HabitArgs) -> CliResult {
    let config = ctx.config();
    let start = args.date.unwrap_or_else(|| ctx.today(&config));
    let dates = checked_day_range(start, args.days)?;
    let window = DateWindow::new(start, *dates.last().unwrap_or(&start));

    let inputs = ctx.provider()?.read()?.within(window);
    let habit = inputs
        .habits
        .iter()
        .find(|h| h.id == args.id)
        .ok_or_else(|| format!("habit not found: {}", args.id))?;

    for date in dates {
        match resolve_start_time(habit, date) {
            Some(time) => println!(
                "{date} {time} ({}m)",
                resolve_duration_minutes(habit, date)
            ),
            None => println!("{date} -"),
        }
    }
    Ok(())
}
