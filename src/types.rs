use aide_de_camp::core::{DateTime, Xid};
use serde_json::Value;

use crate::{error::StoreError, options::Options};

/// A job scheduled to become eligible at a UTC instant.
#[derive(Debug, Clone, PartialEq)]
pub struct DelayJob {
    id: Option<Xid>,
    name: String,
    arguments: Value,
    options: Options,
    manager: String,
    time: DateTime,
}

impl DelayJob {
    pub fn new(
        name: impl Into<String>,
        arguments: Value,
        options: Options,
        manager: impl Into<String>,
        time: DateTime,
    ) -> Self {
        Self {
            id: None,
            name: name.into(),
            arguments,
            options,
            manager: manager.into(),
            time,
        }
    }

    /// `None` until the job has been persisted.
    pub fn id(&self) -> Option<Xid> {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arguments(&self) -> &Value {
        &self.arguments
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn manager(&self) -> &str {
        &self.manager
    }

    /// Due instant, always UTC.
    pub fn time(&self) -> DateTime {
        self.time
    }

    pub fn is_due(&self, now: DateTime) -> bool {
        self.time <= now
    }

    pub(crate) fn assign_id(&mut self, id: Xid) {
        self.id = Some(id);
    }

    /// Rebuilds a detached job carrying a known id, as a caller holding only a
    /// stored identifier would.
    pub fn with_id(mut self, id: Xid) -> Self {
        self.id = Some(id);
        self
    }
}

/// A job handed to a non-delayed queue.
#[derive(Debug, Clone, PartialEq)]
pub struct ImmediateJob {
    pub id: Option<Xid>,
    pub name: String,
    pub arguments: Value,
    pub options: Options,
    pub manager: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    Delay,
    Immediate,
}

/// Any job produced by a queue manager.
#[derive(Debug, Clone, PartialEq)]
pub enum Job {
    Delay(DelayJob),
    Immediate(ImmediateJob),
}

impl Job {
    pub fn kind(&self) -> JobKind {
        match self {
            Job::Delay(_) => JobKind::Delay,
            Job::Immediate(_) => JobKind::Immediate,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Job::Delay(job) => job.name(),
            Job::Immediate(job) => &job.name,
        }
    }

    pub fn id(&self) -> Option<Xid> {
        match self {
            Job::Delay(job) => job.id(),
            Job::Immediate(job) => job.id,
        }
    }

    pub fn as_delay(&self) -> Option<&DelayJob> {
        match self {
            Job::Delay(job) => Some(job),
            Job::Immediate(_) => None,
        }
    }
}

impl From<DelayJob> for Job {
    fn from(job: DelayJob) -> Self {
        Job::Delay(job)
    }
}

impl From<ImmediateJob> for Job {
    fn from(job: ImmediateJob) -> Self {
        Job::Immediate(job)
    }
}

/// Stored layout of a delay job. `arguments` and `options` are JSON text.
#[derive(Debug, Clone)]
pub struct DelayJobRow {
    pub id: Xid,
    pub name: String,
    pub arguments: String,
    pub options: String,
    pub manager: String,
    pub time: DateTime,
}

impl DelayJobRow {
    pub fn from_job(id: Xid, job: &DelayJob) -> Result<Self, StoreError> {
        Ok(Self {
            id,
            name: job.name.clone(),
            arguments: serde_json::to_string(&job.arguments)?,
            options: serde_json::to_string(&job.options)?,
            manager: job.manager.clone(),
            time: job.time,
        })
    }

    pub fn into_job(self) -> Result<DelayJob, StoreError> {
        Ok(DelayJob {
            id: Some(self.id),
            name: self.name,
            arguments: serde_json::from_str(&self.arguments)?,
            options: serde_json::from_str(&self.options)?,
            manager: self.manager,
            time: self.time,
        })
    }
}
