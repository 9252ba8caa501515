use aide_de_camp::core::{DateTime, Xid};
use async_trait::async_trait;

use crate::{
    error::StoreError,
    types::{DelayJob, DelayJobRow},
};

/// Handle to a stored record, used for removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobReference {
    /// An entity the store currently tracks.
    Managed(Xid),
    /// An unvalidated stand-in; existence is checked on flush.
    Lazy(Xid),
}

impl JobReference {
    pub fn id(&self) -> Xid {
        match self {
            JobReference::Managed(id) | JobReference::Lazy(id) => *id,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Change {
    Insert(DelayJobRow),
    Remove(JobReference),
}

/// Changes staged by one caller, applied together by [`DelayJobStore::flush`].
#[derive(Debug, Default)]
pub struct ChangeSet {
    changes: Vec<Change>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, row: DelayJobRow) {
        self.changes.push(Change::Insert(row));
    }

    pub fn remove(&mut self, job: JobReference) {
        self.changes.push(Change::Remove(job));
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn changes(&self) -> &[Change] {
        &self.changes
    }
}

impl IntoIterator for ChangeSet {
    type Item = Change;
    type IntoIter = std::vec::IntoIter<Change>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.into_iter()
    }
}

/// Unit-of-work storage for delay jobs.
///
/// Every caller stages its own [`ChangeSet`] through `persist` and `remove`;
/// nothing is durable until `flush` applies that set. A set is applied whole
/// or not at all.
#[async_trait]
pub trait DelayJobStore: Send + Sync {
    /// Starts a unit of work.
    fn begin(&self) -> ChangeSet {
        ChangeSet::new()
    }

    /// Stages an insert and assigns the job its id if it has none.
    async fn persist(&self, changes: &mut ChangeSet, job: &mut DelayJob)
        -> Result<(), StoreError>;

    async fn remove(&self, changes: &mut ChangeSet, job: JobReference)
        -> Result<(), StoreError>;

    async fn flush(&self, changes: ChangeSet) -> Result<(), StoreError>;

    /// Whether `job` is an entity the store tracks: flushed or loaded, and
    /// not removed or detached since.
    async fn contains(&self, job: &DelayJob) -> bool;

    /// Builds a reference by id without touching storage.
    fn reference(&self, id: Xid) -> JobReference {
        JobReference::Lazy(id)
    }

    async fn find(&self, id: Xid) -> Result<Option<DelayJob>, StoreError>;

    /// Stored jobs whose due instant is at or before `now`, earliest first.
    async fn find_due(&self, now: DateTime) -> Result<Vec<DelayJob>, StoreError>;
}
