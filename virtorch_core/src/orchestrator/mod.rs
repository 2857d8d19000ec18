/*
* Vm lifecycle orchestration.
*
* The platform gives no transactional guarantee, so ordering,
* idempotency and partial failure recovery are imposed here.
*
* The platform handle is passed to every call: the orchestrator only holds
* its configuration and keeps no state between operations, so independent
* operations on different vms can run concurrently on the same handle.
*/
mod create;
mod delete;
mod disk;
mod read;

// Reexports
pub use create::Created;

use crate::config::OrchestratorConfig;
use crate::desired::VmDesiredState;
use crate::platform::{Platform, VmStatus};
use crate::retry::{Attempt, Poll};
use strum::Display;
use tokio::time::Instant;

// Error Handling
use log::info;
use virtorch_error::{LibError, VirtorchError};

/// States of the creation sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum CreateState {
    Building,
    DisksAttached,
    NicsProvisioned,
    Starting,
    Started,
    RolledBack,
}

/// States of the deletion sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum DeleteState {
    Checking,
    ShuttingDown,
    Removing,
    Removed,
    NotFoundIsSuccess,
}

#[derive(Default, Debug, Clone)]
pub struct Orchestrator {
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(config: OrchestratorConfig) -> Self {
        Self { config }
    }
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /*
     * In place reconciliation of a running vm is not supported.
     * A changed desired state means destroy and recreate.
     */
    pub async fn update<P: Platform>(
        &self,
        _platform: &P,
        id: &str,
        _desired: &VmDesiredState,
    ) -> Result<VmDesiredState, VirtorchError> {
        info!("refusing in place update of vm {:#?}", id);
        Err(VirtorchError::Unsupported {
            operation: format!("update of vm {:?}", id),
        })
    }
}

/// Poll the vm until the platform reports it down.
async fn wait_down<P: Platform>(
    platform: &P,
    poll: &Poll,
    id: &str,
    outer: Option<Instant>,
) -> Result<(), VirtorchError> {
    let what = format!("vm {} to be down", id);
    poll.until_deadline(&what, outer, move || async move {
        match platform.get_vm(id).await {
            Ok(vm) if vm.status == VmStatus::Down => Attempt::Ready(()),
            Ok(vm) => {
                let message = format!("vm {:?} is {}", id, vm.status);
                let err = LibError::builder()
                    .msg(&message)
                    .help("the platform hasn't settled the vm yet")
                    .build();
                Attempt::Pending(err.into())
            }
            Err(e) if e.is_transient() => Attempt::Pending(e),
            Err(e) => Attempt::Failed(e),
        }
    })
    .await
}
