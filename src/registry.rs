use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use serde_json::Value;
use tracing::instrument;

use crate::{error::DelayQueueError, manager::QueueManager, options::Options, types::Job};

/// Destination for jobs that ask for no delay.
#[async_trait]
pub trait ImmediateDispatch: Send + Sync {
    async fn put(
        &self,
        name: &str,
        arguments: Value,
        options: Options,
        manager: &str,
    ) -> Result<Job, DelayQueueError>;
}

/// Named queue managers.
#[derive(Default, Clone)]
pub struct ManagerRegistry {
    managers: HashMap<String, Arc<dyn QueueManager>>,
}

impl ManagerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        name: impl Into<String>,
        manager: Arc<dyn QueueManager>,
    ) -> &mut Self {
        self.managers.insert(name.into(), manager);
        self
    }

    pub fn get(&self, name: &str) -> Result<&Arc<dyn QueueManager>, DelayQueueError> {
        self.managers
            .get(name)
            .ok_or_else(|| DelayQueueError::UnknownManager(name.to_string()))
    }
}

#[async_trait]
impl ImmediateDispatch for ManagerRegistry {
    #[instrument(skip_all, err, fields(job_name = name, manager = manager))]
    async fn put(
        &self,
        name: &str,
        arguments: Value,
        options: Options,
        manager: &str,
    ) -> Result<Job, DelayQueueError> {
        self.get(manager)?.put(name, arguments, options).await
    }
}
