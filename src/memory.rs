use std::collections::{HashMap, HashSet};

use aide_de_camp::core::{new_xid, DateTime, Xid};
use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::instrument;

use crate::{
    error::StoreError,
    store::{Change, ChangeSet, DelayJobStore, JobReference},
    types::{DelayJob, DelayJobRow},
};

/// In-memory [`DelayJobStore`].
///
/// Entities become managed once flushed or loaded through [`find`](DelayJobStore::find)
/// and stay managed until removed or [`clear`](MemoryDelayStore::clear) is called.
#[derive(Default)]
pub struct MemoryDelayStore {
    jobs: RwLock<HashMap<Xid, DelayJobRow>>,
    managed: RwLock<HashSet<Xid>>,
}

impl MemoryDelayStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Detaches every managed entity.
    pub async fn clear(&self) {
        self.managed.write().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }
}

/// Fails on the first removal of a row that would not exist at that point of
/// the change set.
fn check_removals(
    jobs: &HashMap<Xid, DelayJobRow>,
    changes: &ChangeSet,
) -> Result<(), StoreError> {
    let mut inserted = HashSet::new();
    let mut removed = HashSet::new();

    for change in changes.changes() {
        match change {
            Change::Insert(row) => {
                inserted.insert(row.id);
                removed.remove(&row.id);
            }
            Change::Remove(reference) => {
                let jid = reference.id();
                let present = inserted.contains(&jid)
                    || (jobs.contains_key(&jid) && !removed.contains(&jid));
                if !present {
                    return Err(StoreError::NotFound(jid));
                }
                inserted.remove(&jid);
                removed.insert(jid);
            }
        }
    }

    Ok(())
}

#[async_trait]
impl DelayJobStore for MemoryDelayStore {
    #[instrument(skip_all, err, fields(job_name = job.name(), jid))]
    async fn persist(
        &self,
        changes: &mut ChangeSet,
        job: &mut DelayJob,
    ) -> Result<(), StoreError> {
        if let Some(jid) = job.id() {
            if self.managed.read().await.contains(&jid) {
                return Ok(());
            }
        }

        let jid = match job.id() {
            Some(jid) => jid,
            None => {
                let jid = new_xid();
                job.assign_id(jid);
                jid
            }
        };
        tracing::Span::current().record("jid", tracing::field::display(jid));

        changes.insert(DelayJobRow::from_job(jid, job)?);

        Ok(())
    }

    #[instrument(skip_all, err, fields(jid = %job.id()))]
    async fn remove(
        &self,
        changes: &mut ChangeSet,
        job: JobReference,
    ) -> Result<(), StoreError> {
        changes.remove(job);
        Ok(())
    }

    #[instrument(skip_all, err, fields(changes = changes.len()))]
    async fn flush(&self, changes: ChangeSet) -> Result<(), StoreError> {
        let mut jobs = self.jobs.write().await;
        let mut managed = self.managed.write().await;

        check_removals(&jobs, &changes)?;

        for change in changes {
            match change {
                Change::Insert(row) => {
                    managed.insert(row.id);
                    jobs.insert(row.id, row);
                }
                Change::Remove(reference) => {
                    let jid = reference.id();
                    jobs.remove(&jid);
                    managed.remove(&jid);
                }
            }
        }

        Ok(())
    }

    async fn contains(&self, job: &DelayJob) -> bool {
        match job.id() {
            Some(jid) => self.managed.read().await.contains(&jid),
            None => false,
        }
    }

    #[instrument(skip_all, err, fields(jid = %id))]
    async fn find(&self, id: Xid) -> Result<Option<DelayJob>, StoreError> {
        let row = self.jobs.read().await.get(&id).cloned();

        match row {
            Some(row) => {
                let job = row.into_job()?;
                self.managed.write().await.insert(id);
                Ok(Some(job))
            }
            None => Ok(None),
        }
    }

    #[instrument(skip_all, err)]
    async fn find_due(&self, now: DateTime) -> Result<Vec<DelayJob>, StoreError> {
        let jobs = self.jobs.read().await;

        let mut due = jobs
            .values()
            .filter(|row| row.time <= now)
            .cloned()
            .map(DelayJobRow::into_job)
            .collect::<Result<Vec<_>, _>>()?;
        due.sort_by_key(|job| job.time());

        Ok(due)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use serde_json::json;

    use super::*;
    use crate::options::Options;

    fn at(minute: u32) -> DateTime {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, minute, 0).unwrap()
    }

    fn job(name: &str, time: DateTime) -> DelayJob {
        DelayJob::new(name, json!([1, "two"]), Options::new(), "default", time)
    }

    async fn save(store: &MemoryDelayStore, job: &mut DelayJob) {
        let mut changes = store.begin();
        store.persist(&mut changes, job).await.unwrap();
        store.flush(changes).await.unwrap();
    }

    #[tokio::test]
    async fn persist_is_staged_until_flush() {
        let store = MemoryDelayStore::new();
        let mut job = job("w", at(0));

        let mut changes = store.begin();
        store.persist(&mut changes, &mut job).await.unwrap();
        let jid = job.id().unwrap();
        assert!(!store.contains(&job).await);
        assert!(store.find(jid).await.unwrap().is_none());

        store.flush(changes).await.unwrap();
        assert!(store.contains(&job).await);
        assert_eq!(store.find(jid).await.unwrap(), Some(job));
    }

    #[tokio::test]
    async fn failed_flush_applies_nothing() {
        let store = MemoryDelayStore::new();
        let mut kept = job("kept", at(0));
        save(&store, &mut kept).await;

        let mut job = job("w", at(0));
        let mut changes = store.begin();
        store.persist(&mut changes, &mut job).await.unwrap();
        store
            .remove(&mut changes, JobReference::Managed(kept.id().unwrap()))
            .await
            .unwrap();
        let missing = new_xid();
        store
            .remove(&mut changes, store.reference(missing))
            .await
            .unwrap();

        let err = store.flush(changes).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(jid) if jid == missing));
        assert_eq!(store.len().await, 1);
        assert!(store.contains(&kept).await);
        assert!(!store.contains(&job).await);
    }

    #[tokio::test]
    async fn persist_can_be_retried_after_a_failed_flush() {
        let store = MemoryDelayStore::new();
        let mut job = job("w", at(0));

        let mut changes = store.begin();
        store.persist(&mut changes, &mut job).await.unwrap();
        store
            .remove(&mut changes, store.reference(new_xid()))
            .await
            .unwrap();
        assert!(store.flush(changes).await.is_err());
        assert!(!store.contains(&job).await);

        save(&store, &mut job).await;
        let jid = job.id().unwrap();
        assert_eq!(store.find(jid).await.unwrap(), Some(job));
    }

    #[tokio::test]
    async fn change_sets_are_isolated() {
        let store = MemoryDelayStore::new();
        let missing = new_xid();

        let mut doomed = store.begin();
        store
            .remove(&mut doomed, store.reference(missing))
            .await
            .unwrap();

        let mut job = job("w", at(0));
        save(&store, &mut job).await;
        assert_eq!(store.len().await, 1);

        let err = store.flush(doomed).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(jid) if jid == missing));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn removals_see_earlier_changes_in_the_same_set() {
        let store = MemoryDelayStore::new();
        let mut job = job("w", at(0));

        let mut changes = store.begin();
        store.persist(&mut changes, &mut job).await.unwrap();
        let jid = job.id().unwrap();
        store
            .remove(&mut changes, store.reference(jid))
            .await
            .unwrap();
        store.flush(changes).await.unwrap();
        assert!(store.is_empty().await);

        save(&store, &mut job).await;
        let mut twice = store.begin();
        for _ in 0..2 {
            store
                .remove(&mut twice, store.reference(jid))
                .await
                .unwrap();
        }
        let err = store.flush(twice).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(found) if found == jid));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn clear_detaches_entities() {
        let store = MemoryDelayStore::new();
        let mut job = job("w", at(0));
        save(&store, &mut job).await;

        store.clear().await;
        assert!(!store.contains(&job).await);

        let loaded = store.find(job.id().unwrap()).await.unwrap().unwrap();
        assert!(store.contains(&loaded).await);
    }

    #[tokio::test]
    async fn find_due_returns_eligible_jobs_in_order() {
        let store = MemoryDelayStore::new();
        let mut changes = store.begin();
        for (name, minute) in [("late", 20), ("second", 10), ("first", 5), ("future", 40)] {
            store
                .persist(&mut changes, &mut job(name, at(minute)))
                .await
                .unwrap();
        }
        store.flush(changes).await.unwrap();

        let due = store.find_due(at(20)).await.unwrap();
        let names: Vec<_> = due.iter().map(DelayJob::name).collect();
        assert_eq!(names, ["first", "second", "late"]);
        assert!(due.iter().all(|job| job.is_due(at(20))));
        assert!(!due[0].is_due(at(5) - Duration::seconds(1)));
    }
}
