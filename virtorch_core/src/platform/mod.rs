/*
* The remote virtualization platform, as seen by the orchestrator.
*
* The transport (http session, authentication, (de)serialization) lives behind
* the Platform trait. A handle is shared by reference between concurrent
* lifecycle operations, so implementations take &self and must be Sync.
*
* Every method returns either the entity or an error,
* an absent entity being reported as VirtorchError::NotFound.
*/

mod memory;
mod types;

// Reexports
pub use memory::{Call, Fault, MemoryPlatform, Operation};
pub use types::*;

use std::future::Future;

// Error Handling
use virtorch_error::{LibError, VirtorchError};

pub trait Platform: Send + Sync {
    ////////////////////////////////
    // Vm
    fn add_vm(
        &self,
        request: &VmCreateRequest,
    ) -> impl Future<Output = Result<RemoteVm, VirtorchError>> + Send;
    fn get_vm(&self, id: &str) -> impl Future<Output = Result<RemoteVm, VirtorchError>> + Send;
    fn start_vm(&self, id: &str) -> impl Future<Output = Result<(), VirtorchError>> + Send;
    /*
     * Graceful (acpi) shutdown request.
     * Returns once the request is accepted, not once the vm is down.
     */
    fn shutdown_vm(&self, id: &str) -> impl Future<Output = Result<(), VirtorchError>> + Send;
    /*
     * Remove the vm.
     * With detach_only, attached disks are left in place instead of being destroyed.
     */
    fn remove_vm(
        &self,
        id: &str,
        detach_only: bool,
    ) -> impl Future<Output = Result<(), VirtorchError>> + Send;

    ////////////////////////////////
    // Disk
    fn add_disk(
        &self,
        request: &DiskCreateRequest,
    ) -> impl Future<Output = Result<Disk, VirtorchError>> + Send;
    fn get_disk(&self, id: &str) -> impl Future<Output = Result<Disk, VirtorchError>> + Send;
    fn remove_disk(&self, id: &str) -> impl Future<Output = Result<(), VirtorchError>> + Send;

    fn add_disk_attachment(
        &self,
        vm_id: &str,
        request: &DiskAttachmentRequest,
    ) -> impl Future<Output = Result<DiskAttachment, VirtorchError>> + Send;
    fn list_disk_attachments(
        &self,
        vm_id: &str,
    ) -> impl Future<Output = Result<Vec<DiskAttachment>, VirtorchError>> + Send;

    ////////////////////////////////
    // Nic
    fn add_nic(
        &self,
        vm_id: &str,
        request: &NicRequest,
    ) -> impl Future<Output = Result<Nic, VirtorchError>> + Send;
    fn list_nics(&self, vm_id: &str)
        -> impl Future<Output = Result<Vec<Nic>, VirtorchError>> + Send;

    ////////////////////////////////
    // Lookups
    fn list_vnic_profiles(
        &self,
    ) -> impl Future<Output = Result<Vec<VnicProfile>, VirtorchError>> + Send;
    fn list_clusters(&self) -> impl Future<Output = Result<Vec<Cluster>, VirtorchError>> + Send;
    fn list_templates(&self)
        -> impl Future<Output = Result<Vec<Template>, VirtorchError>> + Send;
    /*
     * Resolve an embedded reference to the full entity.
     */
    fn follow_link(&self, link: &Link) -> impl Future<Output = Result<Entity, VirtorchError>> + Send;
}

/// Follow a link and check the entity is of the expected kind.
pub async fn follow<P, T>(platform: &P, link: &Link) -> Result<T, VirtorchError>
where
    P: Platform,
    T: FromEntity,
{
    let entity = platform.follow_link(link).await?;
    let kind = entity.kind();
    match T::from_entity(entity) {
        Some(value) => Ok(value),
        None => {
            let message = format!("Link {} {:#?} resolved to a {}", link.kind, link.id, kind);
            let help = format!("Expected a {}.", T::KIND);
            Err(LibError::builder().msg(&message).help(&help).build().into())
        }
    }
}
