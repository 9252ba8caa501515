//! Delayed-execution queue manager.
//!
//! Instead of dispatching a job right away, [`DelayQueueManager::put`] stores a
//! [`DelayJob`] record that becomes eligible once the current UTC time reaches
//! its due instant. Calls that ask for no delay are forwarded to an
//! [`ImmediateDispatch`] collaborator untouched.

pub mod config;
pub mod error;
pub mod manager;
pub mod memory;
pub mod options;
pub mod registry;
pub mod store;
pub mod types;

pub use config::DelayQueueConfig;
pub use error::{DelayQueueError, StoreError};
pub use manager::{DelayQueueManager, QueueManager};
pub use memory::MemoryDelayStore;
pub use options::{JobTime, Options, OptionsResolver, ResolvedOptions};
pub use registry::{ImmediateDispatch, ManagerRegistry};
pub use store::{Change, ChangeSet, DelayJobStore, JobReference};
pub use types::{DelayJob, DelayJobRow, ImmediateJob, Job, JobKind};
