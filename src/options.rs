//! Resolution of per-call options into job options, manager and due instant.

use aide_de_camp::core::DateTime;
use chrono::{Duration, SecondsFormat, TimeZone, Utc};
use serde_json::Value;

use crate::error::DelayQueueError;

/// Keyed job options, as supplied by callers and as stored on jobs.
pub type Options = serde_json::Map<String, Value>;

pub const MANAGER: &str = "manager";
pub const MANAGER_OPTIONS: &str = "manager_options";
pub const TIME: &str = "time";
pub const DELAY: &str = "delay";

/// Keys that route or schedule a job and are never stored among flat job options.
const CONTROL_KEYS: [&str; 3] = [MANAGER, TIME, DELAY];

/// When a job should run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobTime {
    At(DateTime),
    /// No delay was requested; the job goes straight to immediate dispatch.
    Immediate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedOptions {
    pub options: Options,
    pub manager: String,
    pub time: JobTime,
}

#[derive(Debug, Clone)]
pub struct OptionsResolver {
    default_manager: String,
    default_manager_options: Options,
}

impl OptionsResolver {
    pub fn new(default_manager: impl Into<String>, default_manager_options: Options) -> Self {
        Self {
            default_manager: default_manager.into(),
            default_manager_options,
        }
    }

    /// Resolves `options` against the defaults, using `now` as the base for a
    /// relative `delay`.
    pub fn resolve(
        &self,
        options: &Options,
        now: DateTime,
    ) -> Result<ResolvedOptions, DelayQueueError> {
        Ok(ResolvedOptions {
            options: self.job_options(options)?,
            manager: self.job_manager(options)?,
            time: job_time(options, now)?,
        })
    }

    fn job_options(&self, options: &Options) -> Result<Options, DelayQueueError> {
        match options.get(MANAGER_OPTIONS) {
            // Nested mode: top-level keys are ignored and nothing is stripped.
            Some(Value::Object(nested)) => Ok(merge(&self.default_manager_options, nested.iter())),
            Some(other) => Err(DelayQueueError::configuration(format!(
                "`{MANAGER_OPTIONS}` must be a map, got {other}"
            ))),
            None => Ok(merge(
                &self.default_manager_options,
                options
                    .iter()
                    .filter(|(key, _)| !CONTROL_KEYS.contains(&key.as_str())),
            )),
        }
    }

    fn job_manager(&self, options: &Options) -> Result<String, DelayQueueError> {
        match options.get(MANAGER) {
            None => Ok(self.default_manager.clone()),
            Some(Value::String(manager)) => Ok(manager.clone()),
            Some(other) => Err(DelayQueueError::configuration(format!(
                "`{MANAGER}` must be a string, got {other}"
            ))),
        }
    }
}

/// Copies `defaults` and lets `overrides` win on matching keys.
fn merge<'a>(
    defaults: &Options,
    overrides: impl Iterator<Item = (&'a String, &'a Value)>,
) -> Options {
    let mut merged = defaults.clone();
    for (key, value) in overrides {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

/// `null` counts as unset for `time` and `delay`.
fn set<'a>(options: &'a Options, key: &str) -> Option<&'a Value> {
    options.get(key).filter(|value| !value.is_null())
}

fn job_time(options: &Options, now: DateTime) -> Result<JobTime, DelayQueueError> {
    if let Some(time) = set(options, TIME) {
        return parse_time(time).map(JobTime::At);
    }

    if let Some(delay) = set(options, DELAY) {
        let seconds = delay.as_i64().ok_or_else(|| {
            DelayQueueError::configuration(format!(
                "`{DELAY}` must be an integer number of seconds, got {delay}"
            ))
        })?;
        let at = Duration::try_seconds(seconds)
            .and_then(|delay| now.checked_add_signed(delay))
            .ok_or_else(|| {
                DelayQueueError::configuration(format!("`{DELAY}` of {seconds}s is out of range"))
            })?;
        return Ok(JobTime::At(at));
    }

    Ok(JobTime::Immediate)
}

fn parse_time(time: &Value) -> Result<DateTime, DelayQueueError> {
    let raw = time.as_str().ok_or_else(|| {
        DelayQueueError::configuration(format!("`{TIME}` must be an RFC 3339 string, got {time}"))
    })?;
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|err| DelayQueueError::configuration(format!("`{TIME}` {raw:?}: {err}")))
}

/// Renders `time` as an option value, keeping its offset. The resolver
/// converts it to UTC.
pub fn time_option<Tz>(time: &chrono::DateTime<Tz>) -> Value
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    Value::String(time.to_rfc3339_opts(SecondsFormat::AutoSi, false))
}
