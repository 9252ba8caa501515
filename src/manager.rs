use std::sync::Arc;

use aide_de_camp::core::DateTime;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tracing::instrument;

use crate::{
    config::DelayQueueConfig,
    error::DelayQueueError,
    options::{JobTime, Options, OptionsResolver},
    registry::ImmediateDispatch,
    store::{DelayJobStore, JobReference},
    types::{DelayJob, Job},
};

/// Something jobs can be put on and deleted from.
#[async_trait]
pub trait QueueManager: Send + Sync {
    /// Puts a job for the worker `name`. `options` are manager specific.
    async fn put(&self, name: &str, arguments: Value, options: Options)
        -> Result<Job, DelayQueueError>;

    async fn delete(&self, job: &Job) -> Result<(), DelayQueueError>;
}

/// Queue manager that stores jobs until their due instant.
pub struct DelayQueueManager<S, D> {
    resolver: OptionsResolver,
    store: Arc<S>,
    dispatch: Arc<D>,
}

impl<S, D> DelayQueueManager<S, D>
where
    S: DelayJobStore,
    D: ImmediateDispatch,
{
    pub fn new(config: DelayQueueConfig, store: Arc<S>, dispatch: Arc<D>) -> Self {
        Self {
            resolver: OptionsResolver::new(config.default_manager, config.default_manager_options),
            store,
            dispatch,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Like [`QueueManager::put`], with `now` as the base for a relative delay.
    #[instrument(skip_all, err, fields(job_name = name, manager, delayed))]
    pub async fn put_at(
        &self,
        name: &str,
        arguments: Value,
        options: Options,
        now: DateTime,
    ) -> Result<Job, DelayQueueError> {
        if name.is_empty() {
            return Err(DelayQueueError::configuration("job name must not be empty"));
        }

        let resolved = self.resolver.resolve(&options, now)?;
        let span = tracing::Span::current();
        span.record("manager", resolved.manager.as_str());

        let time = match resolved.time {
            JobTime::At(time) => time,
            JobTime::Immediate => {
                span.record("delayed", false);
                return self
                    .dispatch
                    .put(name, arguments, resolved.options, &resolved.manager)
                    .await;
            }
        };
        span.record("delayed", true);

        let mut job = DelayJob::new(name, arguments, resolved.options, resolved.manager, time);
        let mut changes = self.store.begin();
        self.store.persist(&mut changes, &mut job).await?;
        self.store.flush(changes).await?;

        tracing::debug!(jid = ?job.id(), %time, "delay job stored");
        Ok(Job::Delay(job))
    }
}

#[async_trait]
impl<S, D> QueueManager for DelayQueueManager<S, D>
where
    S: DelayJobStore,
    D: ImmediateDispatch,
{
    async fn put(
        &self,
        name: &str,
        arguments: Value,
        options: Options,
    ) -> Result<Job, DelayQueueError> {
        self.put_at(name, arguments, options, Utc::now()).await
    }

    #[instrument(skip_all, err, fields(job_name = job.name()))]
    async fn delete(&self, job: &Job) -> Result<(), DelayQueueError> {
        let Job::Delay(job) = job else {
            return Err(DelayQueueError::WrongJob(
                "Delay queue manager can only delete delay jobs".to_string(),
            ));
        };

        let reference = match (self.store.contains(job).await, job.id()) {
            (true, Some(jid)) => JobReference::Managed(jid),
            (false, Some(jid)) => self.store.reference(jid),
            (_, None) => {
                return Err(DelayQueueError::NoSuchJob(
                    "Delay queue manager cannot delete a job that hasn't been persisted"
                        .to_string(),
                ))
            }
        };

        let mut changes = self.store.begin();
        self.store.remove(&mut changes, reference).await?;
        self.store.flush(changes).await?;

        Ok(())
    }
}
