use super::Orchestrator;
use crate::desired::VmDesiredState;
use crate::flatten::{flatten, NicBinding, RemoteGraph};
use crate::platform::{follow, Platform, Template, VnicProfile};

// Error Handling
use log::{debug, info};
use virtorch_error::VirtorchError;

/// Keep Ok(None) for entities the platform reports absent.
fn found<T>(res: Result<T, VirtorchError>) -> Result<Option<T>, VirtorchError> {
    match res {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

impl Orchestrator {
    /*
     * Fetch the vm and the entities hanging off it, fresh,
     * and flatten them into the desired state shape.
     * Returns None when the vm doesn't exist (anymore).
     */
    pub async fn read<P: Platform>(
        &self,
        platform: &P,
        id: &str,
    ) -> Result<Option<VmDesiredState>, VirtorchError> {
        info!("[start] reading vm {}", id);
        let graph = match found(fetch_graph(platform, id).await)? {
            Some(graph) => graph,
            None => {
                info!("[end] vm {} not found", id);
                return Ok(None);
            }
        };
        let state = flatten(&graph);
        info!("[end] read vm {:#?} ({})", state.name, id);
        Ok(Some(state))
    }
}

async fn fetch_graph<P: Platform>(platform: &P, id: &str) -> Result<RemoteGraph, VirtorchError> {
    let vm = platform.get_vm(id).await?;
    // A removed template doesn't make the vm unreadable.
    let template = found(follow::<P, Template>(platform, &vm.template).await)?;
    let disk_attachments = platform.list_disk_attachments(id).await?;

    let mut nics = vec![];
    for nic in platform.list_nics(id).await? {
        let profile = match &nic.vnic_profile {
            Some(link) => found(follow::<P, VnicProfile>(platform, link).await)?.map(|e| e.name),
            None => None,
        };
        debug!("vm {} {} is bound to {:?}", id, nic.name, profile);
        nics.push(NicBinding {
            name: nic.name,
            profile,
        });
    }
    Ok(RemoteGraph {
        vm,
        template,
        disk_attachments,
        nics,
    })
}
