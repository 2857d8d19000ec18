use crate::retry::Poll;

// Config
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;

// Error Handling
use log::info;
use miette::Error;
use virtorch_error::{CastError, TomlError, VirtorchError, WrapError};

pub const DISK_LOCK_TIMEOUT: Duration = Duration::from_secs(30);
pub const DELETE_TIMEOUT: Duration = Duration::from_secs(3 * 60);

/*
* Waits and bounds of the lifecycle operations.
*
* ```toml
* require_disk_attachment = true
*
* [disk_lock]
* interval = "2s"
* timeout = "30s"
*
* [delete]
* interval = "1s"
* timeout = "3m"
* backoff = { kind = "exponential", max = "15s" }
* ```
*/
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Refuse desired states without any disk attachment.
    pub require_disk_attachment: bool,
    /// Wait for a newly created vm to leave image_locked.
    pub create_settle: Poll,
    /// Wait for a disk to leave the locked state before attaching/after creating it.
    pub disk_lock: Poll,
    /// Wait for a vm to be down after a shutdown request.
    pub shutdown_settle: Poll,
    /// Retries of the whole check, shutdown, remove sequence.
    pub delete: Poll,
}
impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            require_disk_attachment: false,
            create_settle: Poll::new(Duration::from_secs(1), Duration::from_secs(3 * 60)),
            disk_lock: Poll::new(Duration::from_secs(2), DISK_LOCK_TIMEOUT),
            shutdown_settle: Poll::new(Duration::from_secs(2), Duration::from_secs(60)),
            delete: Poll::new(Duration::from_secs(1), DELETE_TIMEOUT)
                .exponential(Duration::from_secs(15)),
        }
    }
}

impl OrchestratorConfig {
    pub fn from_file(path: &str) -> Result<Self, VirtorchError> {
        info!("Read orchestrator config from {:#?}.", path);
        let string = match fs::read_to_string(path) {
            Ok(string) => string,
            Err(e) => {
                let message = format!("Couldn't read config file {:#?}", path);
                return Err(WrapError::builder()
                    .msg(&message)
                    .help("Check the file exists and is readable.")
                    .origin(Error::from_err(e))
                    .build()
                    .into());
            }
        };
        Self::from_toml(&string)
    }
    pub fn from_toml(string: &str) -> Result<Self, VirtorchError> {
        let res = toml::from_str::<Self>(string);
        let item = match res {
            Ok(res) => res,
            Err(e) => {
                let err = CastError::TomlError(TomlError::new(e, string));
                return Err(err.into());
            }
        };
        Ok(item)
    }
}
