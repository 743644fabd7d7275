//! Weekly category buffers.
//!
//! A buffer reserves protected time for a category (a client, a practice, an
//! area of life) up to a weekly quota. Time the category already received
//! this week through meetings, sessions, habits or logged work counts against
//! the quota; what is left is placed into free slots as late in the week as
//! possible, so earlier days stay open for tasks.
//!
//! Two strategies exist:
//! - `Contended`: categories are allocated one after another against a shared
//!   pool of free slots. Least-served categories go first.
//! - `Priority`: each category is allocated on its own, then overlapping
//!   blocks are settled by declared priority.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::availability::{AvailabilityScanner, OccupiedSlots};
use crate::conflict::SlotKey;
use crate::error::ValidationError;
use crate::habit::resolve_instance;
use crate::schedule::{Habit, Meeting, Project, Session, Task, TaskLog};
use crate::storage::config::{BufferStrategy, WeekConfig};
use crate::time::{covered_quarters, format_hours, quarter_to_hours, HourRange, QUARTER_HOURS};

const HOURS_EPSILON: f64 = 1e-6;
const MAX_BUFFER_PRIORITY: u8 = 10;

/// Weekly time quota for one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BufferConfig {
    pub category_id: String,
    pub weekly_hours: f64,
    /// 0 (lowest) to 10. Only used by the priority strategy.
    #[serde(default)]
    pub priority: u8,
}

/// A placed buffer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BufferBlock {
    pub category_id: String,
    pub date: NaiveDate,
    pub start: f64,
    pub duration: f64,
    pub priority: u8,
    /// Quota left for the category once this block was placed.
    pub remaining_quota_hours: f64,
}

impl BufferBlock {
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }

    pub fn quarters(&self) -> std::ops::Range<u16> {
        covered_quarters(self.start, self.duration)
    }

    pub fn label(&self) -> String {
        format!(
            "{} {}-{} {}",
            self.date,
            format_hours(self.start),
            format_hours(self.end()),
            self.category_id
        )
    }
}

/// Free quarters per date, in ascending order.
pub type FreeSlots = BTreeMap<NaiveDate, Vec<u16>>;

/// Reject quotas that are not positive and priorities outside 0..=10.
pub fn validate_configs(configs: &[BufferConfig]) -> Result<(), ValidationError> {
    let mut seen = HashSet::new();
    for config in configs {
        if !config.weekly_hours.is_finite() || config.weekly_hours <= 0.0 {
            return Err(ValidationError::InvalidValue {
                field: format!("buffers[{}].weekly_hours", config.category_id),
                message: format!("must be positive, got {}", config.weekly_hours),
            });
        }
        if config.priority > MAX_BUFFER_PRIORITY {
            return Err(ValidationError::InvalidValue {
                field: format!("buffers[{}].priority", config.category_id),
                message: format!("must be between 0 and 10, got {}", config.priority),
            });
        }
        if !seen.insert(config.category_id.as_str()) {
            return Err(ValidationError::DuplicateId {
                collection: "buffers".into(),
                id: config.category_id.clone(),
            });
        }
    }
    Ok(())
}

/// Categorized records a week's spent hours are drawn from.
#[derive(Debug, Clone, Copy)]
pub struct CategorySources<'a> {
    pub habits: &'a [Habit],
    pub sessions: &'a [Session],
    pub meetings: &'a [Meeting],
    pub task_logs: &'a [TaskLog],
    pub tasks: &'a [Task],
    pub projects: &'a [Project],
}

/// Hours each category already received in `week`.
///
/// Task logs reach a category through their task's project.
pub fn spent_hours_by_category(
    sources: CategorySources<'_>,
    week: &[NaiveDate],
) -> HashMap<String, f64> {
    let in_week: BTreeSet<NaiveDate> = week.iter().copied().collect();
    let mut spent: HashMap<String, f64> = HashMap::new();
    let mut add = |category: Option<&str>, hours: f64| {
        if let Some(category) = category {
            *spent.entry(category.to_string()).or_default() += hours;
        }
    };

    for meeting in sources.meetings.iter().filter(|m| in_week.contains(&m.date)) {
        add(meeting.category_id.as_deref(), meeting.duration_hours);
    }
    for session in sources.sessions.iter().filter(|s| in_week.contains(&s.date)) {
        add(session.category_id.as_deref(), session.duration_hours);
    }
    for habit in sources.habits.iter().filter(|h| h.category_id.is_some()) {
        for &date in week {
            if let Some(instance) = resolve_instance(habit, date) {
                add(habit.category_id.as_deref(), instance.duration_hours());
            }
        }
    }

    let project_category = |task_id: &str| {
        let task = sources.tasks.iter().find(|t| t.id == task_id)?;
        let project_id = task.project_id.as_deref()?;
        sources
            .projects
            .iter()
            .find(|p| p.id == project_id)?
            .category_id
            .as_deref()
    };
    for log in sources.task_logs.iter().filter(|l| in_week.contains(&l.date)) {
        add(project_category(&log.task_id), log.duration_hours());
    }
    spent
}

/// Latest hour a buffer may end on each day.
///
/// The day is cut at the wind-down habit's start, and on the week-ending
/// day at the week-ending time, whichever is earlier. Days without either
/// run to midnight.
pub fn day_cutoffs(
    days: &[NaiveDate],
    habits: &[Habit],
    week: &WeekConfig,
) -> BTreeMap<NaiveDate, f64> {
    let ending_day = week.ending_weekday();
    days.iter()
        .map(|&date| {
            let mut cutoff = 24.0_f64;
            for habit in habits.iter().filter(|h| h.is_wind_down) {
                if let Some(instance) = resolve_instance(habit, date) {
                    cutoff = cutoff.min(instance.start_hours());
                }
            }
            if date.weekday() == ending_day {
                cutoff = cutoff.min(week.ending_time.as_hours());
            }
            (date, cutoff)
        })
        .collect()
}

/// Collect the free quarters of `days` within the buffer window.
pub fn collect_free_slots(
    scanner: &AvailabilityScanner<'_>,
    days: &[NaiveDate],
    window: impl Fn(NaiveDate) -> HourRange,
    occupied: &OccupiedSlots,
) -> FreeSlots {
    days.iter()
        .map(|&date| {
            let free = scanner
                .scan(date, window(date), occupied)
                .into_iter()
                .filter(|slot| slot.available)
                .map(|slot| slot.quarter)
                .collect();
            (date, free)
        })
        .collect()
}

/// Everything the allocator reads.
#[derive(Debug, Clone, Copy)]
pub struct BufferRequest<'a> {
    pub configs: &'a [BufferConfig],
    pub spent: &'a HashMap<String, f64>,
    pub free_slots: &'a FreeSlots,
    pub cutoffs: &'a BTreeMap<NaiveDate, f64>,
}

/// Places category buffers into free slots.
#[derive(Debug, Clone, Copy, Default)]
pub struct BufferAllocator {
    strategy: BufferStrategy,
}

impl BufferAllocator {
    pub fn new(strategy: BufferStrategy) -> Self {
        Self { strategy }
    }

    /// Validate the configs, run the configured strategy and return blocks
    /// ordered by date and start.
    pub fn allocate(&self, request: BufferRequest<'_>) -> Result<Vec<BufferBlock>, ValidationError> {
        validate_configs(request.configs)?;
        let mut blocks = match self.strategy {
            BufferStrategy::Contended => Self::allocate_buffers(request),
            BufferStrategy::Priority => Self::allocate_independent(request),
        };
        blocks.sort_by(|a, b| a.date.cmp(&b.date).then(a.start.total_cmp(&b.start)));
        tracing::debug!(strategy = ?self.strategy, blocks = blocks.len(), "buffers allocated");
        Ok(blocks)
    }

    /// Allocate every category against one shared pool of free slots.
    ///
    /// Categories are served by utilization (spent / quota) ascending, larger
    /// quotas first on ties. Each walks days from the latest and slots from
    /// the latest, merging adjacent free quarters into blocks no longer than
    /// the category's remaining hours. Blocks never end after the day's
    /// cutoff.
    pub fn allocate_buffers(request: BufferRequest<'_>) -> Vec<BufferBlock> {
        let mut pending: Vec<(&BufferConfig, f64, f64)> = request
            .configs
            .iter()
            .filter_map(|config| {
                let spent = request.spent.get(&config.category_id).copied().unwrap_or(0.0);
                let remaining = config.weekly_hours - spent;
                if remaining <= HOURS_EPSILON {
                    tracing::debug!(category = %config.category_id, spent, "buffer quota already met");
                    return None;
                }
                Some((config, remaining, spent / config.weekly_hours))
            })
            .collect();
        pending.sort_by(|a, b| {
            a.2.total_cmp(&b.2)
                .then(b.0.weekly_hours.total_cmp(&a.0.weekly_hours))
        });

        let mut used = BTreeSet::new();
        let mut blocks = Vec::new();
        for (config, remaining, _) in pending {
            place_category(config, remaining, &request, &mut used, &mut blocks);
        }
        blocks
    }

    /// Allocate each category as if it were alone, then settle overlaps
    /// with [`resolve_slot_conflicts`].
    pub fn allocate_independent(request: BufferRequest<'_>) -> Vec<BufferBlock> {
        let mut blocks = Vec::new();
        for config in request.configs {
            let spent = request.spent.get(&config.category_id).copied().unwrap_or(0.0);
            let remaining = config.weekly_hours - spent;
            if remaining > HOURS_EPSILON {
                let mut used = BTreeSet::new();
                place_category(config, remaining, &request, &mut used, &mut blocks);
            }
        }
        resolve_slot_conflicts(blocks)
    }
}

fn place_category(
    config: &BufferConfig,
    mut remaining: f64,
    request: &BufferRequest<'_>,
    used: &mut BTreeSet<SlotKey>,
    blocks: &mut Vec<BufferBlock>,
) {
    for (&date, quarters) in request.free_slots.iter().rev() {
        if remaining <= HOURS_EPSILON {
            break;
        }
        let cutoff = request.cutoffs.get(&date).copied().unwrap_or(24.0);
        let limit = (cutoff / QUARTER_HOURS + HOURS_EPSILON).floor() as u16;

        // Latest first.
        let free: Vec<u16> = quarters
            .iter()
            .rev()
            .copied()
            .filter(|&q| q < limit && !used.contains(&SlotKey::new(date, q)))
            .collect();

        let mut i = 0;
        while i < free.len() && remaining > HOURS_EPSILON {
            let cap = ((remaining / QUARTER_HOURS) - HOURS_EPSILON).ceil() as u16;
            let end = free[i] + 1;
            let mut start = free[i];
            i += 1;
            while i < free.len() && free[i] + 1 == start && end - start < cap {
                start = free[i];
                i += 1;
            }

            let duration = ((end - start) as f64 * QUARTER_HOURS).min(remaining);
            for q in start..end {
                used.insert(SlotKey::new(date, q));
            }
            remaining -= duration;
            blocks.push(BufferBlock {
                category_id: config.category_id.clone(),
                date,
                start: quarter_to_hours(start),
                duration,
                priority: config.priority,
                remaining_quota_hours: remaining.max(0.0),
            });
        }
    }

    if remaining > HOURS_EPSILON {
        tracing::debug!(category = %config.category_id, remaining, "buffer quota not fully placed");
    }
}

/// Drop blocks that share a quarter with a higher-priority block.
///
/// Blocks are considered by priority, highest first, keeping input order
/// among equals; a block survives only if none of its quarters is already
/// held by a surviving block.
pub fn resolve_slot_conflicts(blocks: Vec<BufferBlock>) -> Vec<BufferBlock> {
    let mut ordered = blocks;
    ordered.sort_by(|a, b| b.priority.cmp(&a.priority));

    let mut held = BTreeSet::new();
    let mut kept = Vec::new();
    for block in ordered {
        let keys: Vec<SlotKey> = block
            .quarters()
            .map(|q| SlotKey::new(block.date, q))
            .collect();
        if keys.iter().any(|k| held.contains(k)) {
            tracing::debug!(block = %block.label(), "buffer lost slot conflict");
            continue;
        }
        held.extend(keys);
        kept.push(block);
    }
    kept
}
