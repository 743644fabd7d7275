//! # Dayforge Core Library
//!
//! This library provides the calendar scheduling and buffer allocation
//! engine behind Dayforge. Given fixed commitments (meetings, habits, logged
//! work, project sessions) it decides where flexible tasks and protected
//! category time land on a quarter-hour grid. Every operation is available
//! both as a direct call and through the JSON [`RpcHandler`], and the
//! `dayforge` CLI is a thin layer over the same library.
//!
//! ## Architecture
//!
//! - **Conflict maps**: fixed events indexed by `(date, quarter)` slot
//! - **Availability**: per-day free/taken slot scanning
//! - **Scheduler**: greedy, priority-ordered task chunking plus a revenue
//!   placeholder sized from the weekly billable target
//! - **Buffers**: weekly category quotas placed late in the week
//! - **Engine**: one full pass with hash-gated reuse of the previous plan
//! - **Storage**: TOML configuration and a SQLite task log store
//!
//! ## Key Components
//!
//! - [`PlanningEngine`]: Runs a complete pass
//! - [`TaskScheduler`]: Places tasks into free slots
//! - [`BufferAllocator`]: Places category buffers
//! - [`Config`]: Engine settings
//! - [`LogStore`]: Persistence for today's scheduled chunks

pub mod availability;
pub mod buffer;
pub mod conflict;
pub mod engine;
pub mod error;
pub mod habit;
pub mod provider;
pub mod rpc;
pub mod schedule;
pub mod scheduler;
pub mod storage;
pub mod summary;
pub mod time;

pub use availability::{AvailabilityScanner, OccupiedSlots, TimeSlot};
pub use buffer::{BufferAllocator, BufferBlock, BufferConfig};
pub use conflict::{build_conflict_maps, ConflictMaps, FixedEvent, FixedEventKind, SlotKey};
pub use engine::{PassReport, PlanCache, PlanOutcome, PlanningEngine};
pub use error::{ConfigError, CoreError, DatabaseError, ValidationError};
pub use habit::resolve_start_time;
pub use provider::{DataProvider, LogPersistence, PlanInputs, SettingsProvider, SnapshotProvider};
pub use rpc::RpcHandler;
pub use schedule::{Habit, Meeting, Priority, Project, Session, Task, TaskLog};
pub use scheduler::{ScheduledChunk, TaskScheduler};
pub use storage::{Config, LogStore};
pub use summary::WorkSummary;
pub use time::ClockTime;
