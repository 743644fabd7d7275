use std::collections::BTreeMap;

use chrono::NaiveDate;
use clap::Args;
use dayforge_core::conflict::FixedEventKind;
use dayforge_core::provider::DateWindow;
use dayforge_core::time::{checked_day_range, format_hours};

use crate::context::{CliResult, Context};

#[derive(Args)]
pub struct ConflictsArgs {
    /// First day (default: today)
    #[arg(long)]
    date: Option<NaiveDate>,
    /// Number of days
    #[arg(long, default_value_t = 1)]
    days: u32,
    /// Output as JSON
    #[arg(long)]
    json: bool,
}

pub fn run(ctx: &Context, args: ConflictsArgs) -> CliResult {
    let config = ctx.config();
    let start = args.date.unwrap_or_else(|| ctx.today(&config));
    let days = checked_day_range(start, args.days)?;
    let window = DateWindow::new(start, *days.last().unwrap_or(&start));
    let inputs = ctx.inputs(window)?;
    let maps = ctx.conflict_maps(&config, &inputs, &days);

    if args.json {
        let counts: BTreeMap<FixedEventKind, usize> = FixedEventKind::ALL
            .iter()
            .map(|&kind| (kind, maps.slot_count(kind)))
            .collect();
        let json = serde_json::json!({
            "events": maps.events(),
            "slot_counts": counts,
        });
        println!("{}", serde_json::to_string_pretty(&json)?);
        return Ok(());
    }

    let mut events = maps.events().to_vec();
    events.sort_by(|a, b| a.date.cmp(&b.date).then(a.start.total_cmp(&b.start)));
    for event in &events {
        let moved = event
            .displaced_from
            .map(|from| format!(" (moved from {})", format_hours(from)))
            .unwrap_or_default();
        println!(
            "{} {}-{} {:?} {}{moved}",
            event.date,
            format_hours(event.start),
            format_hours(event.end()),
            event.kind,
            event.title
        );
    }
    Ok(())
}
