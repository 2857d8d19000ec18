/*
* Disk attachment.
*
* Disks are created and destroyed by their own lifecycle,
* vms only attach them by id. A disk still being provisioned is LOCKED
* on the platform and refuses attachment until it settles.
*/
use crate::desired::DiskAttachmentSpec;
use crate::platform::{
    Disk, DiskAttachment, DiskAttachmentRequest, DiskStatus, EntityKind, Link, Platform,
};
use crate::retry::{Attempt, Poll};

// Error Handling
use log::{debug, info};
use virtorch_error::VirtorchError;

pub struct DiskReconciler<'a, P: Platform> {
    platform: &'a P,
    lock_wait: &'a Poll,
}

impl From<&DiskAttachmentSpec> for DiskAttachmentRequest {
    fn from(e: &DiskAttachmentSpec) -> Self {
        Self {
            disk: Link::new(EntityKind::Disk, &e.disk_id),
            interface: e.interface,
            bootable: e.bootable,
            active: e.active,
            logical_name: e.logical_name.clone(),
            pass_discard: e.pass_discard,
            read_only: e.read_only,
            uses_scsi_reservation: e.uses_scsi_reservation,
        }
    }
}

impl<'a, P: Platform> DiskReconciler<'a, P> {
    pub fn new(platform: &'a P, lock_wait: &'a Poll) -> Self {
        Self {
            platform,
            lock_wait,
        }
    }

    /*
     * Fetch the disk until it is no longer locked.
     * Every poll is a fresh fetch.
     */
    pub async fn wait_unlocked(&self, disk_id: &str) -> Result<Disk, VirtorchError> {
        let platform = self.platform;
        let what = format!("disk {} to unlock", disk_id);
        self.lock_wait
            .until(&what, move || async move {
                match platform.get_disk(disk_id).await {
                    Ok(disk) if disk.status == DiskStatus::Locked => {
                        Attempt::Pending(VirtorchError::Locked {
                            kind: EntityKind::Disk.to_string(),
                            id: disk.id,
                        })
                    }
                    Ok(disk) => Attempt::Ready(disk),
                    Err(e) if e.is_transient() => Attempt::Pending(e),
                    Err(e) => Attempt::Failed(e),
                }
            })
            .await
    }

    /// Wait for the disk to unlock, then attach it exactly as specified.
    pub async fn attach(
        &self,
        vm_id: &str,
        spec: &DiskAttachmentSpec,
    ) -> Result<DiskAttachment, VirtorchError> {
        let disk = self.wait_unlocked(&spec.disk_id).await?;
        debug!("disk {} ({}) is {}", disk.name, disk.id, disk.status);

        let request = DiskAttachmentRequest::from(spec);
        let attachment = self
            .platform
            .add_disk_attachment(vm_id, &request)
            .await
            .map_err(|e| match e {
                VirtorchError::RejectedByRemote { reason, .. } => VirtorchError::AttachRejected {
                    disk_id: spec.disk_id.clone(),
                    reason,
                },
                other => other,
            })?;
        info!(
            "attached disk {} to vm {} on {}",
            spec.disk_id, vm_id, spec.interface
        );
        Ok(attachment)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::OrchestratorConfig;
    use crate::platform::{DiskInterface, Fault, MemoryPlatform, Operation, VmStatus};
    use miette::Result;
    use std::time::Duration;
    use tokio::time::Instant;

    fn spec(disk_id: &str, interface: DiskInterface) -> DiskAttachmentSpec {
        DiskAttachmentSpec::builder()
            .disk_id(disk_id)
            .interface(interface)
            .bootable(true)
            .build()
    }

    #[tokio::test(start_paused = true)]
    async fn wait_out_a_locked_disk() -> Result<()> {
        let platform = MemoryPlatform::new();
        let cluster = platform.seed_cluster("Default", "dc-a");
        let vm = platform.seed_vm("web1", &cluster, VmStatus::Down);
        let disk = platform.seed_disk("data", false, 3);
        let config = OrchestratorConfig::default();

        let reconciler = DiskReconciler::new(&platform, &config.disk_lock);
        let attachment = reconciler
            .attach(&vm.id, &spec(&disk.id, DiskInterface::Virtio))
            .await?;

        // Locked for 3 polls, unlocked on the 4th.
        assert_eq!(platform.count(Operation::GetDisk), 4);
        assert_eq!(attachment.disk.id, disk.id);
        assert!(attachment.bootable);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn give_up_after_the_lock_timeout() {
        let platform = MemoryPlatform::new();
        let cluster = platform.seed_cluster("Default", "dc-a");
        let vm = platform.seed_vm("web1", &cluster, VmStatus::Down);
        let disk = platform.seed_disk("data", false, u32::MAX);
        let config = OrchestratorConfig::default();

        let start = Instant::now();
        let reconciler = DiskReconciler::new(&platform, &config.disk_lock);
        let err = reconciler
            .attach(&vm.id, &spec(&disk.id, DiskInterface::Virtio))
            .await
            .unwrap_err();

        assert!(matches!(err, VirtorchError::Timeout { .. }));
        assert!(start.elapsed() >= Duration::from_secs(30));
        assert!(start.elapsed() < Duration::from_secs(32));
        assert_eq!(platform.count(Operation::AddDiskAttachment), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_fetch_errors_are_retried() -> Result<()> {
        let platform = MemoryPlatform::new();
        let disk = platform.seed_disk("data", false, 0);
        platform.inject(Fault::unavailable(Operation::GetDisk).times(2));
        let config = OrchestratorConfig::default();

        let reconciler = DiskReconciler::new(&platform, &config.disk_lock);
        let found = reconciler.wait_unlocked(&disk.id).await?;
        assert_eq!(found.status, DiskStatus::Ok);
        assert_eq!(platform.count(Operation::GetDisk), 3);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_attachment_names_the_disk() {
        let platform = MemoryPlatform::new();
        let cluster = platform.seed_cluster("Default", "dc-a");
        let vm = platform.seed_vm("web1", &cluster, VmStatus::Down);
        let disk = platform.seed_disk("shared", true, 0);
        let config = OrchestratorConfig::default();

        let reconciler = DiskReconciler::new(&platform, &config.disk_lock);
        let err = reconciler
            .attach(&vm.id, &spec(&disk.id, DiskInterface::Ide))
            .await
            .unwrap_err();
        match err {
            VirtorchError::AttachRejected { disk_id, .. } => assert_eq!(disk_id, disk.id),
            other => panic!("expected a rejected attachment, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn missing_disk_is_not_retried() {
        let platform = MemoryPlatform::new();
        let config = OrchestratorConfig::default();

        let reconciler = DiskReconciler::new(&platform, &config.disk_lock);
        let err = reconciler.wait_unlocked("missing").await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(platform.count(Operation::GetDisk), 1);
    }
}
