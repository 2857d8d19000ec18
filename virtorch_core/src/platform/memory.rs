/*
* An in-memory platform.
*
* Behaves like the remote platform closely enough to drive the orchestrator:
* transient states (image_locked vms, locked disks, powering up/down) last a
* configurable number of polls, faults can be injected per operation,
* and every mutating call is journaled so call ordering can be checked.
*/
use super::types::*;
use super::Platform;

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use strum::Display;
use uuid::Uuid;

// Error Handling
use log::trace;
use virtorch_error::VirtorchError;

/// Id of the template every platform ships with.
pub const BLANK_TEMPLATE_ID: &str = "00000000-0000-0000-0000-000000000000";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "snake_case")]
pub enum Operation {
    AddVm,
    GetVm,
    StartVm,
    ShutdownVm,
    RemoveVm,
    AddDisk,
    GetDisk,
    RemoveDisk,
    AddDiskAttachment,
    ListDiskAttachments,
    AddNic,
    ListNics,
    ListVnicProfiles,
    ListClusters,
    ListTemplates,
    FollowLink,
}

/// A mutating call, as received by the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    AddVm { name: String },
    StartVm { id: String },
    ShutdownVm { id: String },
    RemoveVm { id: String, detach_only: bool },
    AddDisk { name: String },
    RemoveDisk { id: String },
    AddDiskAttachment { vm_id: String, disk_id: String },
    AddNic { vm_id: String, name: String },
}

#[derive(Debug, Clone)]
enum FaultKind {
    Rejected(String),
    Unavailable,
}

/**
An error returned instead of the operation result.
Matches every call to the operation unless narrowed to a target id.
*/
#[derive(Debug, Clone)]
pub struct Fault {
    op: Operation,
    target: Option<String>,
    times: usize,
    kind: FaultKind,
}
impl Fault {
    pub fn reject(op: Operation, reason: &str) -> Self {
        Self {
            op,
            target: None,
            times: 1,
            kind: FaultKind::Rejected(reason.to_owned()),
        }
    }
    pub fn unavailable(op: Operation) -> Self {
        Self {
            op,
            target: None,
            times: 1,
            kind: FaultKind::Unavailable,
        }
    }
    /// Only fail calls about this entity id.
    pub fn on(mut self, target: &str) -> Self {
        self.target = Some(target.to_owned());
        self
    }
    pub fn times(mut self, times: usize) -> Self {
        self.times = times;
        self
    }
    fn error(&self) -> VirtorchError {
        match &self.kind {
            FaultKind::Rejected(reason) => VirtorchError::rejected(&self.op.to_string(), reason),
            FaultKind::Unavailable => VirtorchError::Unavailable {
                reason: format!("connection reset during {}", self.op),
            },
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Transition {
    polls: u32,
    to: VmStatus,
}

#[derive(Debug)]
struct VmRecord {
    vm: RemoteVm,
    transition: Option<Transition>,
    attachments: Vec<DiskAttachment>,
    nics: Vec<Nic>,
}

#[derive(Debug)]
struct DiskRecord {
    disk: Disk,
    locked_polls: u32,
}

#[derive(Debug)]
struct Behavior {
    image_locked_polls: u32,
    power_up_polls: u32,
    power_down_polls: u32,
    disk_create_locked_polls: u32,
}
impl Default for Behavior {
    fn default() -> Self {
        Self {
            image_locked_polls: 1,
            power_up_polls: 1,
            power_down_polls: 1,
            disk_create_locked_polls: 1,
        }
    }
}

#[derive(Debug, Default)]
struct State {
    behavior: Behavior,
    vms: Vec<VmRecord>,
    disks: Vec<DiskRecord>,
    clusters: Vec<Cluster>,
    networks: Vec<Network>,
    profiles: Vec<VnicProfile>,
    templates: Vec<Template>,
    faults: Vec<Fault>,
    journal: Vec<Call>,
    counts: HashMap<Operation, usize>,
}

impl State {
    /*
     * Count the call and return the first matching injected fault, if any.
     */
    fn enter(&mut self, op: Operation, target: Option<&str>) -> Result<(), VirtorchError> {
        trace!("[memory] {} {:?}", op, target);
        *self.counts.entry(op).or_default() += 1;

        let position = self.faults.iter().position(|fault| {
            fault.op == op
                && match (&fault.target, target) {
                    (None, _) => true,
                    (Some(expected), Some(target)) => expected == target,
                    (Some(_), None) => false,
                }
        });
        if let Some(position) = position {
            let fault = &mut self.faults[position];
            let error = fault.error();
            fault.times = fault.times.saturating_sub(1);
            if fault.times == 0 {
                self.faults.remove(position);
            }
            return Err(error);
        }
        Ok(())
    }
    fn vm_mut(&mut self, id: &str) -> Result<&mut VmRecord, VirtorchError> {
        self.vms
            .iter_mut()
            .find(|e| e.vm.id == id)
            .ok_or_else(|| VirtorchError::not_found(EntityKind::Vm, id))
    }
    fn disk_mut(&mut self, id: &str) -> Result<&mut DiskRecord, VirtorchError> {
        self.disks
            .iter_mut()
            .find(|e| e.disk.id == id)
            .ok_or_else(|| VirtorchError::not_found(EntityKind::Disk, id))
    }
    fn is_attached(&self, disk_id: &str) -> bool {
        self.vms
            .iter()
            .any(|vm| vm.attachments.iter().any(|a| a.disk.id == disk_id))
    }

    fn add_vm(&mut self, request: &VmCreateRequest) -> Result<RemoteVm, VirtorchError> {
        self.journal.push(Call::AddVm {
            name: request.name.clone(),
        });
        self.enter(Operation::AddVm, None)?;

        if self.vms.iter().any(|e| e.vm.name == request.name) {
            let reason = format!("name {:#?} is already in use", request.name);
            return Err(VirtorchError::rejected("add vm", reason));
        }
        if !self.clusters.iter().any(|e| e.id == request.cluster.id) {
            let reason = format!("unknown cluster {:#?}", request.cluster.id);
            return Err(VirtorchError::rejected("add vm", reason));
        }
        if !self.templates.iter().any(|e| e.id == request.template.id) {
            let reason = format!("unknown template {:#?}", request.template.id);
            return Err(VirtorchError::rejected("add vm", reason));
        }

        let vm = RemoteVm {
            id: Uuid::new_v4().to_string(),
            name: request.name.clone(),
            status: VmStatus::ImageLocked,
            cluster: request.cluster.clone(),
            template: request.template.clone(),
            cpu: request.cpu,
            // Platform default: 1GiB
            memory: Some(request.memory.unwrap_or(1024 * 1024 * 1024)),
            initialization: Some(request.initialization.clone()),
        };
        self.vms.push(VmRecord {
            vm: vm.clone(),
            transition: Some(Transition {
                polls: self.behavior.image_locked_polls,
                to: VmStatus::Down,
            }),
            attachments: vec![],
            nics: vec![],
        });
        Ok(vm)
    }

    fn get_vm(&mut self, id: &str) -> Result<RemoteVm, VirtorchError> {
        self.enter(Operation::GetVm, Some(id))?;
        let record = self.vm_mut(id)?;
        if let Some(transition) = record.transition.as_mut() {
            if transition.polls == 0 {
                record.vm.status = transition.to;
                record.transition = None;
            } else {
                transition.polls -= 1;
            }
        }
        Ok(record.vm.clone())
    }

    fn start_vm(&mut self, id: &str) -> Result<(), VirtorchError> {
        self.journal.push(Call::StartVm { id: id.to_owned() });
        self.enter(Operation::StartVm, Some(id))?;
        let polls = self.behavior.power_up_polls;
        let record = self.vm_mut(id)?;
        match record.vm.status {
            VmStatus::Down => {
                record.vm.status = VmStatus::PoweringUp;
                record.transition = Some(Transition {
                    polls,
                    to: VmStatus::Up,
                });
                Ok(())
            }
            status => Err(VirtorchError::rejected(
                "start vm",
                format!("vm is {}", status),
            )),
        }
    }

    fn shutdown_vm(&mut self, id: &str) -> Result<(), VirtorchError> {
        self.journal.push(Call::ShutdownVm { id: id.to_owned() });
        self.enter(Operation::ShutdownVm, Some(id))?;
        let polls = self.behavior.power_down_polls;
        let record = self.vm_mut(id)?;
        match record.vm.status {
            VmStatus::Down | VmStatus::ImageLocked => Err(VirtorchError::rejected(
                "shutdown vm",
                format!("vm is {}", record.vm.status),
            )),
            _ => {
                record.vm.status = VmStatus::PoweringDown;
                record.transition = Some(Transition {
                    polls,
                    to: VmStatus::Down,
                });
                Ok(())
            }
        }
    }

    fn remove_vm(&mut self, id: &str, detach_only: bool) -> Result<(), VirtorchError> {
        self.journal.push(Call::RemoveVm {
            id: id.to_owned(),
            detach_only,
        });
        self.enter(Operation::RemoveVm, Some(id))?;
        let record = self.vm_mut(id)?;
        if record.vm.status != VmStatus::Down {
            return Err(VirtorchError::rejected(
                "remove vm",
                format!("vm is {}, it must be down", record.vm.status),
            ));
        }
        let disk_ids: Vec<String> = record
            .attachments
            .iter()
            .map(|e| e.disk.id.clone())
            .collect();
        self.vms.retain(|e| e.vm.id != id);
        if !detach_only {
            self.disks.retain(|e| !disk_ids.contains(&e.disk.id));
        }
        Ok(())
    }

    fn add_disk(&mut self, request: &DiskCreateRequest) -> Result<Disk, VirtorchError> {
        self.journal.push(Call::AddDisk {
            name: request.name.clone(),
        });
        self.enter(Operation::AddDisk, None)?;
        if request.provisioned_size == 0 {
            return Err(VirtorchError::rejected("add disk", "size must be positive"));
        }
        let disk = Disk {
            id: Uuid::new_v4().to_string(),
            name: request.name.clone(),
            provisioned_size: request.provisioned_size,
            format: request.format,
            storage_domain: request.storage_domain.clone(),
            bootable: request.bootable,
            shareable: request.shareable,
            sparse: request.sparse,
            status: DiskStatus::Locked,
        };
        self.disks.push(DiskRecord {
            disk: disk.clone(),
            locked_polls: self.behavior.disk_create_locked_polls,
        });
        Ok(disk)
    }

    fn get_disk(&mut self, id: &str) -> Result<Disk, VirtorchError> {
        self.enter(Operation::GetDisk, Some(id))?;
        let record = self.disk_mut(id)?;
        if record.locked_polls > 0 {
            record.locked_polls -= 1;
            record.disk.status = DiskStatus::Locked;
        } else if record.disk.status == DiskStatus::Locked {
            record.disk.status = DiskStatus::Ok;
        }
        Ok(record.disk.clone())
    }

    fn remove_disk(&mut self, id: &str) -> Result<(), VirtorchError> {
        self.journal.push(Call::RemoveDisk { id: id.to_owned() });
        self.enter(Operation::RemoveDisk, Some(id))?;
        self.disk_mut(id)?;
        if self.is_attached(id) {
            return Err(VirtorchError::rejected(
                "remove disk",
                "disk is attached to a vm",
            ));
        }
        self.disks.retain(|e| e.disk.id != id);
        Ok(())
    }

    fn add_disk_attachment(
        &mut self,
        vm_id: &str,
        request: &DiskAttachmentRequest,
    ) -> Result<DiskAttachment, VirtorchError> {
        self.journal.push(Call::AddDiskAttachment {
            vm_id: vm_id.to_owned(),
            disk_id: request.disk.id.clone(),
        });
        self.enter(Operation::AddDiskAttachment, Some(&request.disk.id))?;
        self.vm_mut(vm_id)?;

        let disk = self.disk_mut(&request.disk.id)?.disk.clone();
        if disk.status == DiskStatus::Locked {
            return Err(VirtorchError::rejected("attach disk", "disk is locked"));
        }
        if disk.shareable && request.interface == DiskInterface::Ide {
            return Err(VirtorchError::rejected(
                "attach disk",
                "shareable disks can't use the ide interface",
            ));
        }
        if !disk.shareable && self.is_attached(&disk.id) {
            return Err(VirtorchError::rejected(
                "attach disk",
                "disk is already attached and is not shareable",
            ));
        }

        let attachment = DiskAttachment {
            id: Uuid::new_v4().to_string(),
            disk: Link::new(EntityKind::Disk, &disk.id),
            interface: request.interface,
            bootable: request.bootable,
            active: request.active,
            logical_name: request.logical_name.clone(),
            pass_discard: request.pass_discard,
            read_only: request.read_only,
            uses_scsi_reservation: request.uses_scsi_reservation,
        };
        self.vm_mut(vm_id)?.attachments.push(attachment.clone());
        Ok(attachment)
    }

    fn add_nic(&mut self, vm_id: &str, request: &NicRequest) -> Result<Nic, VirtorchError> {
        self.journal.push(Call::AddNic {
            vm_id: vm_id.to_owned(),
            name: request.name.clone(),
        });
        self.enter(Operation::AddNic, Some(vm_id))?;
        if let Some(profile) = &request.vnic_profile {
            if !self.profiles.iter().any(|e| e.id == profile.id) {
                let reason = format!("unknown vnic profile {:#?}", profile.id);
                return Err(VirtorchError::rejected("add nic", reason));
            }
        }
        let record = self.vm_mut(vm_id)?;
        if record.nics.iter().any(|e| e.name == request.name) {
            let reason = format!("nic {:#?} already exists", request.name);
            return Err(VirtorchError::rejected("add nic", reason));
        }
        let nic = Nic {
            id: Uuid::new_v4().to_string(),
            name: request.name.clone(),
            description: request.description.clone(),
            vnic_profile: request.vnic_profile.clone(),
        };
        record.nics.push(nic.clone());
        Ok(nic)
    }

    fn follow_link(&mut self, link: &Link) -> Result<Entity, VirtorchError> {
        self.enter(Operation::FollowLink, Some(&link.id))?;
        let entity = match link.kind {
            EntityKind::Cluster => self
                .clusters
                .iter()
                .find(|e| e.id == link.id)
                .cloned()
                .map(Entity::Cluster),
            EntityKind::Network => self
                .networks
                .iter()
                .find(|e| e.id == link.id)
                .cloned()
                .map(Entity::Network),
            EntityKind::Template => self
                .templates
                .iter()
                .find(|e| e.id == link.id)
                .cloned()
                .map(Entity::Template),
            EntityKind::VnicProfile => self
                .profiles
                .iter()
                .find(|e| e.id == link.id)
                .cloned()
                .map(Entity::VnicProfile),
            kind => {
                let reason = format!("{} links can't be followed", kind);
                return Err(VirtorchError::rejected("follow link", reason));
            }
        };
        entity.ok_or_else(|| VirtorchError::not_found(link.kind, &link.id))
    }
}

#[derive(Debug, Default)]
pub struct MemoryPlatform {
    state: Mutex<State>,
}

impl MemoryPlatform {
    /// A platform with the blank template and nothing else.
    pub fn new() -> Self {
        let platform = Self::default();
        platform.with(|state| {
            state.templates.push(Template {
                id: BLANK_TEMPLATE_ID.to_owned(),
                name: "Blank".to_owned(),
            })
        });
        platform
    }
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
    fn with<T>(&self, f: impl FnOnce(&mut State) -> T) -> T {
        let mut state = self.lock();
        f(&mut state)
    }

    ////////////////////////////////
    // Behavior
    /// Polls a new vm stays image_locked before going down.
    pub fn image_locked_polls(self, polls: u32) -> Self {
        self.with(|state| state.behavior.image_locked_polls = polls);
        self
    }
    /// Polls a started vm stays powering_up.
    pub fn power_up_polls(self, polls: u32) -> Self {
        self.with(|state| state.behavior.power_up_polls = polls);
        self
    }
    /// Polls a vm stays powering_down after a shutdown request.
    pub fn power_down_polls(self, polls: u32) -> Self {
        self.with(|state| state.behavior.power_down_polls = polls);
        self
    }
    /// Polls a new disk stays locked.
    pub fn disk_create_locked_polls(self, polls: u32) -> Self {
        self.with(|state| state.behavior.disk_create_locked_polls = polls);
        self
    }
    pub fn inject(&self, fault: Fault) {
        self.with(|state| state.faults.push(fault));
    }

    ////////////////////////////////
    // Seeding
    pub fn seed_cluster(&self, name: &str, data_center_id: &str) -> Cluster {
        let cluster = Cluster {
            id: Uuid::new_v4().to_string(),
            name: name.to_owned(),
            data_center: Link::new(EntityKind::DataCenter, data_center_id),
        };
        self.with(|state| state.clusters.push(cluster.clone()));
        cluster
    }
    pub fn seed_network(&self, name: &str, data_center_id: &str) -> Network {
        let network = Network {
            id: Uuid::new_v4().to_string(),
            name: name.to_owned(),
            data_center: Link::new(EntityKind::DataCenter, data_center_id),
        };
        self.with(|state| state.networks.push(network.clone()));
        network
    }
    pub fn seed_vnic_profile(&self, name: &str, network_id: &str) -> VnicProfile {
        let profile = VnicProfile {
            id: Uuid::new_v4().to_string(),
            name: name.to_owned(),
            network: Link::new(EntityKind::Network, network_id),
        };
        self.with(|state| state.profiles.push(profile.clone()));
        profile
    }
    pub fn seed_template(&self, name: &str) -> Template {
        let template = Template {
            id: Uuid::new_v4().to_string(),
            name: name.to_owned(),
        };
        self.with(|state| state.templates.push(template.clone()));
        template
    }
    /// An existing disk, reported locked for the given number of polls.
    pub fn seed_disk(&self, name: &str, shareable: bool, locked_polls: u32) -> Disk {
        let disk = Disk {
            id: Uuid::new_v4().to_string(),
            name: name.to_owned(),
            provisioned_size: 10 * 1024 * 1024 * 1024,
            format: DiskFormat::Cow,
            storage_domain: Link::new(EntityKind::StorageDomain, "data"),
            bootable: false,
            shareable,
            sparse: true,
            status: if locked_polls > 0 {
                DiskStatus::Locked
            } else {
                DiskStatus::Ok
            },
        };
        self.with(|state| {
            state.disks.push(DiskRecord {
                disk: disk.clone(),
                locked_polls,
            })
        });
        disk
    }
    /// An existing vm with a settled status.
    pub fn seed_vm(&self, name: &str, cluster: &Cluster, status: VmStatus) -> RemoteVm {
        let vm = RemoteVm {
            id: Uuid::new_v4().to_string(),
            name: name.to_owned(),
            status,
            cluster: Link::new(EntityKind::Cluster, &cluster.id),
            template: Link::new(EntityKind::Template, BLANK_TEMPLATE_ID),
            cpu: CpuTopology::default(),
            memory: Some(1024 * 1024 * 1024),
            initialization: None,
        };
        self.with(|state| {
            state.vms.push(VmRecord {
                vm: vm.clone(),
                transition: None,
                attachments: vec![],
                nics: vec![],
            })
        });
        vm
    }

    ////////////////////////////////
    // Inspection
    pub fn journal(&self) -> Vec<Call> {
        self.with(|state| state.journal.clone())
    }
    /// How many times an operation was called, failed calls included.
    pub fn count(&self, op: Operation) -> usize {
        self.with(|state| state.counts.get(&op).copied().unwrap_or_default())
    }
    pub fn vm_exists(&self, id: &str) -> bool {
        self.with(|state| state.vms.iter().any(|e| e.vm.id == id))
    }
    pub fn disk_exists(&self, id: &str) -> bool {
        self.with(|state| state.disks.iter().any(|e| e.disk.id == id))
    }
    /// Nics of a vm, without counting as a remote call.
    pub fn nics_of(&self, vm_id: &str) -> Vec<Nic> {
        self.with(|state| {
            state
                .vms
                .iter()
                .find(|e| e.vm.id == vm_id)
                .map(|e| e.nics.clone())
                .unwrap_or_default()
        })
    }
}

impl Platform for MemoryPlatform {
    async fn add_vm(&self, request: &VmCreateRequest) -> Result<RemoteVm, VirtorchError> {
        self.with(|state| state.add_vm(request))
    }
    async fn get_vm(&self, id: &str) -> Result<RemoteVm, VirtorchError> {
        self.with(|state| state.get_vm(id))
    }
    async fn start_vm(&self, id: &str) -> Result<(), VirtorchError> {
        self.with(|state| state.start_vm(id))
    }
    async fn shutdown_vm(&self, id: &str) -> Result<(), VirtorchError> {
        self.with(|state| state.shutdown_vm(id))
    }
    async fn remove_vm(&self, id: &str, detach_only: bool) -> Result<(), VirtorchError> {
        self.with(|state| state.remove_vm(id, detach_only))
    }
    async fn add_disk(&self, request: &DiskCreateRequest) -> Result<Disk, VirtorchError> {
        self.with(|state| state.add_disk(request))
    }
    async fn get_disk(&self, id: &str) -> Result<Disk, VirtorchError> {
        self.with(|state| state.get_disk(id))
    }
    async fn remove_disk(&self, id: &str) -> Result<(), VirtorchError> {
        self.with(|state| state.remove_disk(id))
    }
    async fn add_disk_attachment(
        &self,
        vm_id: &str,
        request: &DiskAttachmentRequest,
    ) -> Result<DiskAttachment, VirtorchError> {
        self.with(|state| state.add_disk_attachment(vm_id, request))
    }
    async fn list_disk_attachments(&self, vm_id: &str) -> Result<Vec<DiskAttachment>, VirtorchError> {
        self.with(|state| {
            state.enter(Operation::ListDiskAttachments, Some(vm_id))?;
            Ok(state.vm_mut(vm_id)?.attachments.clone())
        })
    }
    async fn add_nic(&self, vm_id: &str, request: &NicRequest) -> Result<Nic, VirtorchError> {
        self.with(|state| state.add_nic(vm_id, request))
    }
    async fn list_nics(&self, vm_id: &str) -> Result<Vec<Nic>, VirtorchError> {
        self.with(|state| {
            state.enter(Operation::ListNics, Some(vm_id))?;
            Ok(state.vm_mut(vm_id)?.nics.clone())
        })
    }
    async fn list_vnic_profiles(&self) -> Result<Vec<VnicProfile>, VirtorchError> {
        self.with(|state| {
            state.enter(Operation::ListVnicProfiles, None)?;
            Ok(state.profiles.clone())
        })
    }
    async fn list_clusters(&self) -> Result<Vec<Cluster>, VirtorchError> {
        self.with(|state| {
            state.enter(Operation::ListClusters, None)?;
            Ok(state.clusters.clone())
        })
    }
    async fn list_templates(&self) -> Result<Vec<Template>, VirtorchError> {
        self.with(|state| {
            state.enter(Operation::ListTemplates, None)?;
            Ok(state.templates.clone())
        })
    }
    async fn follow_link(&self, link: &Link) -> Result<Entity, VirtorchError> {
        self.with(|state| state.follow_link(link))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use miette::Result;

    #[tokio::test]
    async fn disk_reports_locked_for_the_configured_polls() -> Result<()> {
        let platform = MemoryPlatform::new();
        let disk = platform.seed_disk("data", false, 2);

        assert_eq!(platform.get_disk(&disk.id).await?.status, DiskStatus::Locked);
        assert_eq!(platform.get_disk(&disk.id).await?.status, DiskStatus::Locked);
        assert_eq!(platform.get_disk(&disk.id).await?.status, DiskStatus::Ok);
        assert_eq!(platform.count(Operation::GetDisk), 3);
        Ok(())
    }

    #[tokio::test]
    async fn targeted_fault_fires_once() -> Result<()> {
        let platform = MemoryPlatform::new();
        let cluster = platform.seed_cluster("Default", "dc-a");
        let vm = platform.seed_vm("web1", &cluster, VmStatus::Down);
        platform.inject(Fault::reject(Operation::StartVm, "no host available").on(&vm.id));

        let err = platform.start_vm(&vm.id).await.unwrap_err();
        assert!(matches!(err, VirtorchError::RejectedByRemote { .. }));
        platform.start_vm(&vm.id).await?;
        assert_eq!(platform.get_vm(&vm.id).await?.status, VmStatus::PoweringUp);
        assert_eq!(platform.get_vm(&vm.id).await?.status, VmStatus::Up);
        Ok(())
    }

    #[tokio::test]
    async fn detach_only_remove_keeps_disks() -> Result<()> {
        let platform = MemoryPlatform::new();
        let cluster = platform.seed_cluster("Default", "dc-a");
        let vm = platform.seed_vm("web1", &cluster, VmStatus::Down);
        let disk = platform.seed_disk("data", false, 0);
        let request = DiskAttachmentRequest {
            disk: Link::new(EntityKind::Disk, &disk.id),
            interface: DiskInterface::Virtio,
            bootable: true,
            active: true,
            logical_name: None,
            pass_discard: false,
            read_only: false,
            uses_scsi_reservation: false,
        };
        platform.add_disk_attachment(&vm.id, &request).await?;

        platform.remove_vm(&vm.id, true).await?;
        assert!(!platform.vm_exists(&vm.id));
        assert!(platform.disk_exists(&disk.id));
        Ok(())
    }
}
