use aide_de_camp::core::Xid;
use thiserror::Error;

/// Errors raised by the storage collaborator.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A removal referenced a record that does not exist.
    #[error("delay job {0} not found")]
    NotFound(Xid),
    #[error("failed to (de)serialize delay job column")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum DelayQueueError {
    /// The job variant is not owned by the manager it was handed to.
    #[error("{0}")]
    WrongJob(String),
    /// The job has no durable identity.
    #[error("{0}")]
    NoSuchJob(String),
    /// Malformed caller input such as a bad `time` or `delay` option.
    #[error("invalid configuration: {0}")]
    Configuration(String),
    #[error("no queue manager named {0:?}")]
    UnknownManager(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl DelayQueueError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}
