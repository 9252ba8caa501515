use serde::Deserialize;

use crate::{error::DelayQueueError, options::Options};

/// Process-wide defaults for the delay queue manager.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct DelayQueueConfig {
    /// Manager that due jobs are handed to when a call names none.
    pub default_manager: String,
    pub default_manager_options: Options,
}

impl Default for DelayQueueConfig {
    fn default() -> Self {
        Self {
            default_manager: "default".to_string(),
            default_manager_options: Options::new(),
        }
    }
}

impl DelayQueueConfig {
    pub fn from_value(value: serde_json::Value) -> Result<Self, DelayQueueError> {
        serde_json::from_value(value).map_err(|err| DelayQueueError::configuration(err.to_string()))
    }
}
