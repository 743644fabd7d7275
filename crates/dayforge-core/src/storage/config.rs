//! TOML-based engine settings.
//!
//! Stores user preferences including:
//! - Work hours, with optional per-weekday overrides
//! - Weekend days and the scheduling horizon
//! - Billable revenue target and default hourly rate
//! - Week-ending day, time and timezone
//! - Wind-down buffer and category buffer behavior
//!
//! Configuration is stored at `~/.config/dayforge/config.toml`. Values that
//! are missing or out of range fall back to the defaults below.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::error::{ConfigError, CoreError, Result, ValidationError};
use crate::time::{ClockTime, HourRange, WeekdaySet};

pub const DEFAULT_WORK_START: f64 = 10.0;
pub const DEFAULT_WORK_END: f64 = 22.0;
pub const DEFAULT_REVENUE_TARGET: f64 = 1000.0;
pub const DEFAULT_HOURLY_RATE: f64 = 65.0;
pub const DEFAULT_HORIZON_DAYS: u32 = 7;
/// Longest horizon or caller-supplied day range, in days.
pub const MAX_HORIZON_DAYS: u32 = 62;

/// Work-hours window, optionally overridden per weekday.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkHours {
    #[serde(default = "default_work_start")]
    pub start: f64,
    #[serde(default = "default_work_end")]
    pub end: f64,
    /// Weekday name (`"friday"`) to window.
    #[serde(default)]
    pub overrides: BTreeMap<String, HourRange>,
}

impl WorkHours {
    pub fn new(start: f64, end: f64) -> Self {
        Self {
            start,
            end,
            overrides: BTreeMap::new(),
        }
    }

    pub fn range(&self) -> HourRange {
        HourRange::new(self.start, self.end)
    }

    /// Window for `date`, using a weekday override when one is configured.
    pub fn for_date(&self, date: NaiveDate) -> HourRange {
        self.overrides
            .iter()
            .find(|(name, _)| name.parse::<Weekday>().ok() == Some(date.weekday()))
            .map(|(_, range)| *range)
            .filter(HourRange::is_valid)
            .unwrap_or_else(|| self.range())
    }

    /// Reject a base window or weekday override that is empty or leaves the day.
    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        check_range(self.range())?;
        self.overrides.values().try_for_each(|range| check_range(*range))
    }
}

fn check_range(range: HourRange) -> std::result::Result<(), ValidationError> {
    if range.is_valid() {
        Ok(())
    } else {
        Err(ValidationError::InvalidTimeRange {
            start: range.start,
            end: range.end,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulingConfig {
    #[serde(default = "default_horizon_days")]
    pub horizon_days: u32,
    #[serde(default = "default_weekend_days")]
    pub weekend_days: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillingConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_revenue_target")]
    pub weekly_revenue_target: f64,
    #[serde(default = "default_hourly_rate")]
    pub default_hourly_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeekConfig {
    #[serde(default = "default_ending_day")]
    pub ending_day: String,
    #[serde(default = "default_ending_time")]
    pub ending_time: ClockTime,
    /// IANA timezone name used to decide what "today" and "now" are.
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

/// Daily end-of-day reservation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindDownConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_wind_down_start")]
    pub start: ClockTime,
    #[serde(default = "default_wind_down_minutes")]
    pub duration_minutes: u32,
    #[serde(default = "default_wind_down_today_minutes")]
    pub today_duration_minutes: u32,
    #[serde(default = "default_wind_down_expiry")]
    pub today_expires_at: ClockTime,
    /// A block relocated to or past this time is dropped.
    #[serde(default = "default_wind_down_latest")]
    pub latest_start: ClockTime,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BufferStrategy {
    /// Categories claim slots one after another, most under-served first.
    #[default]
    Contended,
    /// Categories are allocated independently, then contested slots go to
    /// the highest declared priority.
    Priority,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BufferSettings {
    #[serde(default)]
    pub strategy: BufferStrategy,
    /// Window buffers may use. Defaults to the work hours.
    #[serde(default)]
    pub window: Option<HourRange>,
}

/// Engine configuration.
///
/// Serialized to/from TOML at `~/.config/dayforge/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub work_hours: WorkHours,
    #[serde(default)]
    pub scheduling: SchedulingConfig,
    #[serde(default)]
    pub billing: BillingConfig,
    #[serde(default)]
    pub week: WeekConfig,
    #[serde(default)]
    pub wind_down: WindDownConfig,
    #[serde(default)]
    pub buffers: BufferSettings,
}

// Default functions
fn default_work_start() -> f64 {
    DEFAULT_WORK_START
}
fn default_work_end() -> f64 {
    DEFAULT_WORK_END
}
fn default_horizon_days() -> u32 {
    DEFAULT_HORIZON_DAYS
}
fn default_weekend_days() -> Vec<String> {
    vec!["saturday".into(), "sunday".into()]
}
fn default_revenue_target() -> f64 {
    DEFAULT_REVENUE_TARGET
}
fn default_hourly_rate() -> f64 {
    DEFAULT_HOURLY_RATE
}
fn default_ending_day() -> String {
    "friday".into()
}
fn default_ending_time() -> ClockTime {
    ClockTime::from_minutes(17 * 60)
}
fn default_timezone() -> String {
    "UTC".into()
}
fn default_true() -> bool {
    true
}
fn default_wind_down_start() -> ClockTime {
    ClockTime::from_minutes(19 * 60)
}
fn default_wind_down_minutes() -> u32 {
    60
}
fn default_wind_down_today_minutes() -> u32 {
    30
}
fn default_wind_down_expiry() -> ClockTime {
    ClockTime::from_minutes(13 * 60)
}
fn default_wind_down_latest() -> ClockTime {
    ClockTime::from_minutes(23 * 60)
}

impl Default for WorkHours {
    fn default() -> Self {
        Self::new(DEFAULT_WORK_START, DEFAULT_WORK_END)
    }
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            horizon_days: default_horizon_days(),
            weekend_days: default_weekend_days(),
        }
    }
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            weekly_revenue_target: DEFAULT_REVENUE_TARGET,
            default_hourly_rate: DEFAULT_HOURLY_RATE,
        }
    }
}

impl Default for WeekConfig {
    fn default() -> Self {
        Self {
            ending_day: default_ending_day(),
            ending_time: default_ending_time(),
            timezone: default_timezone(),
        }
    }
}

impl Default for WindDownConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            start: default_wind_down_start(),
            duration_minutes: default_wind_down_minutes(),
            today_duration_minutes: default_wind_down_today_minutes(),
            today_expires_at: default_wind_down_expiry(),
            latest_start: default_wind_down_latest(),
        }
    }
}

impl Default for BufferSettings {
    fn default() -> Self {
        Self {
            strategy: BufferStrategy::Contended,
            window: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            work_hours: WorkHours::default(),
            scheduling: SchedulingConfig::default(),
            billing: BillingConfig::default(),
            week: WeekConfig::default(),
            wind_down: WindDownConfig::default(),
            buffers: BufferSettings::default(),
        }
    }
}

impl WeekConfig {
    pub fn ending_weekday(&self) -> Weekday {
        self.ending_day.parse().unwrap_or(Weekday::Fri)
    }

    pub fn tz(&self) -> chrono_tz::Tz {
        self.timezone.parse().unwrap_or(chrono_tz::UTC)
    }

    /// First and last date of the week containing `today`. The week ends on
    /// the configured ending day.
    pub fn week_bounds(&self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        let ending = self.ending_weekday().num_days_from_monday() as i64;
        let current = today.weekday().num_days_from_monday() as i64;
        let end = today + Duration::days((ending - current).rem_euclid(7));
        (end - Duration::days(6), end)
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> std::result::Result<(), ConfigError> {
        let unknown = || ConfigError::MissingKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if parts.peek().is_none() || key.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_none() {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value.parse::<bool>().map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => {
                        if let Ok(n) = value.parse::<u64>() {
                            serde_json::Value::Number(n.into())
                        } else if let Ok(n) = value.parse::<f64>() {
                            serde_json::Number::from_f64(n)
                                .map(serde_json::Value::Number)
                                .ok_or_else(|| invalid(format!("cannot parse '{value}' as number")))?
                        } else {
                            return Err(invalid(format!("cannot parse '{value}' as number")));
                        }
                    }
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                    }
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    pub fn path() -> Result<PathBuf> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from disk or write and return the default.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self> {
        let path = Self::path()?;
        match std::fs::read_to_string(&path) {
            Ok(content) => Self::from_toml(&content).map_err(|e| match e {
                CoreError::Config(ConfigError::ParseFailed(message)) => {
                    ConfigError::LoadFailed { path, message }.into()
                }
                other => other,
            }),
            Err(_) => {
                let cfg = Self::default();
                cfg.save()?;
                Ok(cfg)
            }
        }
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let cfg: Config =
            toml::from_str(content).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        Ok(cfg.sanitized())
    }

    /// Persist to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<()> {
        let path = Self::path()?;
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::SaveFailed {
            path: path.clone(),
            message: e.to_string(),
        })?;
        std::fs::write(&path, content).map_err(|e| ConfigError::SaveFailed {
            path,
            message: e.to_string(),
        })?;
        Ok(())
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a value by dot-separated key without saving.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value cannot be parsed.
    pub fn apply(&mut self, key: &str, value: &str) -> Result<()> {
        let mut json = serde_json::to_value(&*self)?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config =
            serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            })?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// Check the hour windows a user can set directly.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidTimeRange`] when work hours, an
    /// override or the buffer window does not start before it ends.
    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        self.work_hours.validate()?;
        match self.buffers.window {
            Some(window) => check_range(window),
            None => Ok(()),
        }
    }

    /// Set a value by key and save. Returns error if key is unknown.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.apply(key, value)?;
        self.save()
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "failed to load config, using defaults");
            Self::default()
        })
    }

    /// Replace out-of-range values with their documented defaults.
    pub fn sanitized(mut self) -> Self {
        if !self.work_hours.range().is_valid() {
            tracing::warn!(
                start = self.work_hours.start,
                end = self.work_hours.end,
                "invalid work hours, falling back to 10-22"
            );
            self.work_hours.start = DEFAULT_WORK_START;
            self.work_hours.end = DEFAULT_WORK_END;
        }
        self.work_hours.overrides.retain(|name, range| {
            let keep = name.parse::<Weekday>().is_ok() && range.is_valid();
            if !keep {
                tracing::warn!(day = %name, "dropping invalid work-hours override");
            }
            keep
        });
        if self.scheduling.horizon_days == 0 || self.scheduling.horizon_days > MAX_HORIZON_DAYS {
            self.scheduling.horizon_days = DEFAULT_HORIZON_DAYS;
        }
        let billing = &mut self.billing;
        if !billing.weekly_revenue_target.is_finite() || billing.weekly_revenue_target < 0.0 {
            billing.weekly_revenue_target = DEFAULT_REVENUE_TARGET;
        }
        if !billing.default_hourly_rate.is_finite() || billing.default_hourly_rate <= 0.0 {
            billing.default_hourly_rate = DEFAULT_HOURLY_RATE;
        }
        if self.week.ending_day.parse::<Weekday>().is_err() {
            self.week.ending_day = default_ending_day();
        }
        if self.week.timezone.parse::<chrono_tz::Tz>().is_err() {
            tracing::warn!(timezone = %self.week.timezone, "unknown timezone, using UTC");
            self.week.timezone = default_timezone();
        }
        if self.buffers.window.is_some_and(|w| !w.is_valid()) {
            self.buffers.window = None;
        }
        self
    }

    pub fn weekend(&self) -> WeekdaySet {
        WeekdaySet::from_names(&self.scheduling.weekend_days)
    }

    /// Hours buffers may occupy on `date`.
    pub fn buffer_window(&self, date: NaiveDate) -> HourRange {
        self.buffers
            .window
            .unwrap_or_else(|| self.work_hours.for_date(date))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed = Config::from_toml(&toml_str).unwrap();
        assert_eq!(parsed, cfg);
    }

    #[test]
    fn config_default_values() {
        let cfg = Config::default();
        assert_eq!(cfg.work_hours.start, 10.0);
        assert_eq!(cfg.work_hours.end, 22.0);
        assert_eq!(cfg.billing.weekly_revenue_target, 1000.0);
        assert_eq!(cfg.billing.default_hourly_rate, 65.0);
        assert!(!cfg.billing.enabled);
        assert_eq!(cfg.scheduling.horizon_days, 7);
        assert_eq!(cfg.wind_down.start.to_string(), "19:00");
        assert_eq!(cfg.week.ending_time.to_string(), "17:00");
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let cfg = Config::from_toml(
            r#"
            [work_hours]
            start = 9.0
            end = 17.0

            [billing]
            enabled = true
            "#,
        )
        .unwrap();
        assert_eq!(cfg.work_hours.range(), HourRange::new(9.0, 17.0));
        assert!(cfg.billing.enabled);
        assert_eq!(cfg.billing.default_hourly_rate, 65.0);
        assert_eq!(cfg.scheduling.weekend_days, vec!["saturday", "sunday"]);
    }

    #[test]
    fn invalid_values_fall_back_to_defaults() {
        let cfg = Config::from_toml(
            r#"
            [work_hours]
            start = 22.0
            end = 10.0

            [billing]
            default_hourly_rate = -5.0

            [week]
            timezone = "Mars/Olympus"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.work_hours.range(), HourRange::new(10.0, 22.0));
        assert_eq!(cfg.billing.default_hourly_rate, 65.0);
        assert_eq!(cfg.week.timezone, "UTC");
    }

    #[test]
    fn weekday_override_applies_to_matching_dates() {
        let mut hours = WorkHours::new(9.0, 17.0);
        hours.overrides.insert("friday".into(), HourRange::new(9.0, 13.0));
        let friday = NaiveDate::from_ymd_opt(2026, 10, 23).unwrap();
        let thursday = NaiveDate::from_ymd_opt(2026, 10, 22).unwrap();
        assert_eq!(hours.for_date(friday), HourRange::new(9.0, 13.0));
        assert_eq!(hours.for_date(thursday), HourRange::new(9.0, 17.0));
    }

    #[test]
    fn week_bounds_end_on_configured_day() {
        let week = WeekConfig::default();
        let monday = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        let (start, end) = week.week_bounds(monday);
        assert_eq!(end, NaiveDate::from_ymd_opt(2026, 10, 23).unwrap());
        assert_eq!(start, NaiveDate::from_ymd_opt(2026, 10, 17).unwrap());

        let friday = NaiveDate::from_ymd_opt(2026, 10, 23).unwrap();
        assert_eq!(week.week_bounds(friday).1, friday);
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("billing.enabled").as_deref(), Some("false"));
        assert_eq!(cfg.get("week.ending_time").as_deref(), Some("17:00"));
        assert!(cfg.get("billing.missing_key").is_none());
    }

    #[test]
    fn apply_updates_nested_values() {
        let mut cfg = Config::default();
        cfg.apply("billing.enabled", "true").unwrap();
        cfg.apply("billing.default_hourly_rate", "80.5").unwrap();
        cfg.apply("week.ending_time", "18:30").unwrap();
        assert!(cfg.billing.enabled);
        assert_eq!(cfg.billing.default_hourly_rate, 80.5);
        assert_eq!(cfg.week.ending_time.to_string(), "18:30");
    }

    #[test]
    fn apply_rejects_unknown_key_and_bad_type() {
        let mut cfg = Config::default();
        assert!(cfg.apply("billing.nonexistent", "1").is_err());
        assert!(cfg.apply("billing.enabled", "not_a_bool").is_err());
        assert!(cfg.apply("week.ending_time", "25:99").is_err());
    }

    #[test]
    fn apply_rejects_inverted_work_hours_and_keeps_previous() {
        let mut cfg = Config::default();
        let err = cfg.apply("work_hours.start", "23").unwrap_err();
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::InvalidTimeRange { start, end })
                if start == 23.0 && end == 22.0
        ));
        assert_eq!(cfg.work_hours.start, 10.0);

        cfg.apply("work_hours.end", "23.5").unwrap();
        cfg.apply("work_hours.start", "23").unwrap();
        assert_eq!(cfg.work_hours.range(), HourRange::new(23.0, 23.5));
    }

    #[test]
    fn validate_checks_overrides_and_buffer_window() {
        let mut cfg = Config::default();
        cfg.work_hours
            .overrides
            .insert("friday".into(), HourRange::new(15.0, 12.0));
        assert!(matches!(
            cfg.validate(),
            Err(ValidationError::InvalidTimeRange { start, .. }) if start == 15.0
        ));

        let mut cfg = Config::default();
        cfg.buffers.window = Some(HourRange::new(8.0, 8.0));
        assert!(cfg.validate().is_err());
    }
}
