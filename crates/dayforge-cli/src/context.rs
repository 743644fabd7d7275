//! Shared state for every subcommand.

use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use dayforge_core::conflict::{build_conflict_maps, wind_down_blocks, ConflictMaps, FixedInputs};
use dayforge_core::provider::{
    DataProvider, DateWindow, FileSettings, LogPersistence, PlanInputs, PreviewLogs,
};
use dayforge_core::storage::data_dir;
use dayforge_core::{Config, LogStore, PlanCache, PlanOutcome, PlanningEngine, SnapshotProvider};

pub type CliResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

pub struct Context {
    pub user: String,
    snapshot: Option<PathBuf>,
    db: Option<PathBuf>,
    now: Option<DateTime<Utc>>,
}

impl Context {
    pub fn new(
        user: String,
        snapshot: Option<PathBuf>,
        db: Option<PathBuf>,
        now: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            user,
            snapshot,
            db,
            now,
        }
    }

    pub fn config(&self) -> Config {
        Config::load_or_default()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now.unwrap_or_else(Utc::now)
    }

    /// `now` in the configured week timezone.
    pub fn local_now(&self, config: &Config) -> NaiveDateTime {
        self.now().with_timezone(&config.week.tz()).naive_local()
    }

    pub fn today(&self, config: &Config) -> NaiveDate {
        self.local_now(config).date()
    }

    pub fn provider(&self) -> CliResult<SnapshotProvider> {
        let path = match &self.snapshot {
            Some(path) => path.clone(),
            None => data_dir()?.join("snapshot.json"),
        };
        Ok(SnapshotProvider::new(path))
    }

    pub fn store(&self) -> CliResult<LogStore> {
        let store = match &self.db {
            Some(path) => LogStore::open_path(path)?,
            None => LogStore::open()?,
        };
        Ok(store)
    }

    /// Snapshot data for `window` plus the logs stored for it.
    pub fn inputs(&self, window: DateWindow) -> CliResult<PlanInputs> {
        let mut inputs = self.provider()?.load(&self.user, window)?;
        inputs.merge_logs(self.store()?.stored_logs(&self.user, window)?);
        Ok(inputs)
    }

    /// Conflict maps for `days`, including wind-down blocks.
    pub fn conflict_maps(
        &self,
        config: &Config,
        inputs: &PlanInputs,
        days: &[NaiveDate],
    ) -> ConflictMaps {
        let wind_down = wind_down_blocks(
            days,
            &inputs.meetings,
            self.local_now(config),
            &config.wind_down,
        );
        build_conflict_maps(
            FixedInputs {
                habits: &inputs.habits,
                sessions: &inputs.sessions,
                meetings: &inputs.meetings,
                task_logs: &inputs.task_logs,
                wind_down: &wind_down,
            },
            days,
            &config.work_hours,
        )
    }

    /// Run a planning pass with settings read from the config file.
    ///
    /// A dry run reads stored logs but never writes or clears them.
    pub fn plan(&self, cache: Option<PlanCache>, dry_run: bool) -> CliResult<PlanOutcome> {
        let provider = self.provider()?;
        let store = self.store()?;
        let preview = PreviewLogs::new(&store);
        let persistence: &dyn LogPersistence = if dry_run { &preview } else { &store };
        let outcome = PlanningEngine::new(&provider, persistence, &FileSettings).plan(
            &self.user,
            self.now(),
            cache,
        )?;
        Ok(outcome)
    }
}
