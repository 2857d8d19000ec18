/*
* The disk resource lifecycle.
*
* Disks live independently of the vms they get attached to.
* A vm removal only detaches them.
*/
use super::Orchestrator;
use crate::desired::DiskDesiredState;
use crate::disk::DiskReconciler;
use crate::platform::{Disk, DiskCreateRequest, EntityKind, Link, Platform};

// Error Handling
use log::{error, info};
use virtorch_error::{Step, VirtorchError};

impl From<&DiskDesiredState> for DiskCreateRequest {
    fn from(e: &DiskDesiredState) -> Self {
        Self {
            name: e.name.clone(),
            provisioned_size: e.size,
            format: e.format,
            storage_domain: Link::new(EntityKind::StorageDomain, &e.storage_domain_id),
            bootable: e.bootable,
            shareable: e.shareable,
            sparse: e.sparse,
        }
    }
}
impl From<&Disk> for DiskDesiredState {
    fn from(e: &Disk) -> Self {
        Self {
            name: e.name.clone(),
            size: e.provisioned_size,
            format: e.format,
            storage_domain_id: e.storage_domain.id.clone(),
            bootable: e.bootable,
            shareable: e.shareable,
            sparse: e.sparse,
        }
    }
}

impl Orchestrator {
    /// Create the disk and wait for the platform to unlock it.
    /// A disk that never settles is removed again.
    pub async fn create_disk<P: Platform>(
        &self,
        platform: &P,
        desired: &DiskDesiredState,
    ) -> Result<(String, DiskDesiredState), VirtorchError> {
        info!("[start] creating disk {:#?}", desired.name);
        desired.validate().map_err(|e| e.at(Step::Validate))?;

        let request = DiskCreateRequest::from(desired);
        let disk = platform
            .add_disk(&request)
            .await
            .map_err(|e| e.at(Step::DiskCreate))?;

        let reconciler = DiskReconciler::new(platform, &self.config.disk_lock);
        let disk = match reconciler.wait_unlocked(&disk.id).await {
            Ok(disk) => disk,
            Err(e) => {
                if let Err(err) = platform.remove_disk(&disk.id).await {
                    error!("couldn't remove unsettled disk {}: {}", disk.id, err);
                }
                return Err(e.at(Step::DiskSettle));
            }
        };
        info!("[end] created disk {:#?} with id {}", disk.name, disk.id);
        Ok((disk.id.clone(), DiskDesiredState::from(&disk)))
    }

    pub async fn read_disk<P: Platform>(
        &self,
        platform: &P,
        id: &str,
    ) -> Result<Option<DiskDesiredState>, VirtorchError> {
        match platform.get_disk(id).await {
            Ok(disk) => Ok(Some(DiskDesiredState::from(&disk))),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Absent disks are already deleted.
    pub async fn delete_disk<P: Platform>(&self, platform: &P, id: &str) -> Result<(), VirtorchError> {
        info!("[start] deleting disk {}", id);
        match platform.remove_disk(id).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => info!("disk {} is already gone", id),
            Err(e) => return Err(e),
        };
        info!("[end] deleted disk {}", id);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::desired::DiskFormat;
    use crate::platform::{Call, MemoryPlatform, Operation};
    use miette::Result;
    use pretty_assertions::assert_eq;

    fn desired() -> DiskDesiredState {
        DiskDesiredState::builder()
            .name("web1_root")
            .size(10 * 1024 * 1024 * 1024)
            .format(DiskFormat::Cow)
            .storage_domain_id("data")
            .bootable(true)
            .sparse(true)
            .build()
    }

    #[tokio::test(start_paused = true)]
    async fn create_read_delete_disk() -> Result<()> {
        let platform = MemoryPlatform::new().disk_create_locked_polls(3);
        let orchestrator = Orchestrator::default();

        let (id, created) = orchestrator.create_disk(&platform, &desired()).await?;
        assert_eq!(created, desired());
        assert_eq!(platform.count(Operation::GetDisk), 4);

        let read = orchestrator.read_disk(&platform, &id).await?;
        assert_eq!(read, Some(desired()));

        orchestrator.delete_disk(&platform, &id).await?;
        assert_eq!(orchestrator.read_disk(&platform, &id).await?, None);
        // Deleting twice is fine.
        orchestrator.delete_disk(&platform, &id).await?;
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn unsettled_disk_is_removed() {
        let platform = MemoryPlatform::new().disk_create_locked_polls(u32::MAX);

        let err = Orchestrator::default()
            .create_disk(&platform, &desired())
            .await
            .unwrap_err();
        assert_eq!(err.step(), Some(&Step::DiskSettle));
        assert!(matches!(err.root(), VirtorchError::Timeout { .. }));

        let removed = platform
            .journal()
            .into_iter()
            .find_map(|call| match call {
                Call::RemoveDisk { id } => Some(id),
                _ => None,
            })
            .expect("disk removal was attempted");
        assert!(!platform.disk_exists(&removed));
    }
}
