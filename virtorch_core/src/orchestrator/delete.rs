use super::{wait_down, DeleteState, Orchestrator};
use crate::platform::{Platform, VmStatus};
use crate::retry::Attempt;
use tokio::time::Instant;

// Error Handling
use log::{debug, info, warn};
use virtorch_error::{Step, VirtorchError};

impl Orchestrator {
    /*
     * Check, shutdown, remove.
     *
     * The whole sequence is retried on any error until the delete timeout,
     * so a failed step is always preceded by a fresh status check.
     * An absent vm is already deleted. Disks are detached, never destroyed.
     */
    pub async fn delete<P: Platform>(&self, platform: &P, id: &str) -> Result<(), VirtorchError> {
        info!("[start] deleting vm {}", id);
        let poll = &self.config.delete;
        let deadline = poll.deadline_from(Instant::now());
        let what = format!("vm {} to be removed", id);

        let state = poll
            .until(&what, move || async move {
                match self.delete_once(platform, id, deadline).await {
                    Ok(state) => Attempt::Ready(state),
                    Err(e) if e.is_not_found() => Attempt::Ready(DeleteState::NotFoundIsSuccess),
                    Err(e) => {
                        warn!("{} on vm {}: {}", e, id, e.root());
                        Attempt::Pending(e)
                    }
                }
            })
            .await?;
        debug!("vm {} is {}", id, state);
        info!("[end] deleted vm {}", id);
        Ok(())
    }

    async fn delete_once<P: Platform>(
        &self,
        platform: &P,
        id: &str,
        deadline: Instant,
    ) -> Result<DeleteState, VirtorchError> {
        debug!("vm {} is {}", id, DeleteState::Checking);
        let vm = platform.get_vm(id).await.map_err(|e| e.at(Step::Check))?;

        if vm.status != VmStatus::Down {
            debug!("vm {} is {}", id, DeleteState::ShuttingDown);
            platform
                .shutdown_vm(id)
                .await
                .map_err(|e| e.at(Step::Shutdown))?;
            wait_down(platform, &self.config.shutdown_settle, id, Some(deadline))
                .await
                .map_err(|e| e.at(Step::ShutdownSettle))?;
        }

        debug!("vm {} is {}", id, DeleteState::Removing);
        platform
            .remove_vm(id, true)
            .await
            .map_err(|e| e.at(Step::Remove))?;
        Ok(DeleteState::Removed)
    }
}
