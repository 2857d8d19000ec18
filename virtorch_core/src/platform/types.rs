/*
* A loose mapping of the remote platform entities.
*
* Only the fields the orchestrator reads or writes are mapped.
* Field names follow the platform api (snake_case json).
*/
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use strum::{Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EntityKind {
    Vm,
    Disk,
    DiskAttachment,
    Nic,
    VnicProfile,
    Network,
    Cluster,
    DataCenter,
    Template,
    StorageDomain,
}

/// An embedded reference to another entity, as returned by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Link {
    pub kind: EntityKind,
    pub id: String,
}
impl Link {
    pub fn new(kind: EntityKind, id: &str) -> Self {
        Self {
            kind,
            id: id.to_owned(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum VmStatus {
    Down,
    ImageLocked,
    WaitForLaunch,
    PoweringUp,
    Up,
    PoweringDown,
    Paused,
    Suspended,
    NotResponding,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DiskStatus {
    Ok,
    Locked,
    Illegal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DiskFormat {
    Cow,
    Raw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DiskInterface {
    Virtio,
    VirtioScsi,
    Ide,
    Sata,
    SpaprVscsi,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BootProtocol {
    Static,
    Dhcp,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuTopology {
    pub cores: u32,
    pub sockets: u32,
    pub threads: u32,
}
impl Default for CpuTopology {
    fn default() -> Self {
        Self {
            cores: 1,
            sockets: 1,
            threads: 1,
        }
    }
}

#[skip_serializing_none]
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ip {
    pub address: Option<String>,
    pub netmask: Option<String>,
    pub gateway: Option<String>,
}

/// Guest network configuration applied on first boot (cloud-init).
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NicConfiguration {
    pub name: Option<String>,
    pub boot_protocol: BootProtocol,
    pub on_boot: bool,
    pub ip: Option<Ip>,
}

#[skip_serializing_none]
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Initialization {
    pub authorized_ssh_keys: Option<String>,
    #[serde(default)]
    pub nic_configurations: Vec<NicConfiguration>,
}

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteVm {
    pub id: String,
    pub name: String,
    pub status: VmStatus,
    pub cluster: Link,
    pub template: Link,
    pub cpu: CpuTopology,
    /// Memory in bytes.
    pub memory: Option<u64>,
    pub initialization: Option<Initialization>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Disk {
    pub id: String,
    pub name: String,
    /// Size in bytes.
    pub provisioned_size: u64,
    pub format: DiskFormat,
    pub storage_domain: Link,
    pub bootable: bool,
    pub shareable: bool,
    pub sparse: bool,
    pub status: DiskStatus,
}

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskAttachment {
    pub id: String,
    pub disk: Link,
    pub interface: DiskInterface,
    pub bootable: bool,
    pub active: bool,
    pub logical_name: Option<String>,
    pub pass_discard: bool,
    pub read_only: bool,
    pub uses_scsi_reservation: bool,
}

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nic {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub vnic_profile: Option<Link>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VnicProfile {
    pub id: String,
    pub name: String,
    pub network: Link,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    pub id: String,
    pub name: String,
    pub data_center: Link,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cluster {
    pub id: String,
    pub name: String,
    pub data_center: Link,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    pub name: String,
}

/// An entity reached by following a link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entity {
    Cluster(Cluster),
    Network(Network),
    Template(Template),
    VnicProfile(VnicProfile),
}
impl Entity {
    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::Cluster(_) => EntityKind::Cluster,
            Entity::Network(_) => EntityKind::Network,
            Entity::Template(_) => EntityKind::Template,
            Entity::VnicProfile(_) => EntityKind::VnicProfile,
        }
    }
}

/*
* Typed extraction of a followed entity.
*/
pub trait FromEntity: Sized {
    const KIND: EntityKind;
    fn from_entity(entity: Entity) -> Option<Self>;
}
impl FromEntity for Cluster {
    const KIND: EntityKind = EntityKind::Cluster;
    fn from_entity(entity: Entity) -> Option<Self> {
        match entity {
            Entity::Cluster(e) => Some(e),
            _ => None,
        }
    }
}
impl FromEntity for Network {
    const KIND: EntityKind = EntityKind::Network;
    fn from_entity(entity: Entity) -> Option<Self> {
        match entity {
            Entity::Network(e) => Some(e),
            _ => None,
        }
    }
}
impl FromEntity for Template {
    const KIND: EntityKind = EntityKind::Template;
    fn from_entity(entity: Entity) -> Option<Self> {
        match entity {
            Entity::Template(e) => Some(e),
            _ => None,
        }
    }
}
impl FromEntity for VnicProfile {
    const KIND: EntityKind = EntityKind::VnicProfile;
    fn from_entity(entity: Entity) -> Option<Self> {
        match entity {
            Entity::VnicProfile(e) => Some(e),
            _ => None,
        }
    }
}

////////////////////////////////
// Requests

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmCreateRequest {
    pub name: String,
    pub cluster: Link,
    pub template: Link,
    pub cpu: CpuTopology,
    /// Memory in bytes.
    pub memory: Option<u64>,
    pub initialization: Initialization,
}

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskAttachmentRequest {
    pub disk: Link,
    pub interface: DiskInterface,
    pub bootable: bool,
    pub active: bool,
    pub logical_name: Option<String>,
    pub pass_discard: bool,
    pub read_only: bool,
    pub uses_scsi_reservation: bool,
}

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NicRequest {
    pub name: String,
    pub description: Option<String>,
    pub vnic_profile: Option<Link>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskCreateRequest {
    pub name: String,
    pub provisioned_size: u64,
    pub format: DiskFormat,
    pub storage_domain: Link,
    pub bootable: bool,
    pub shareable: bool,
    pub sparse: bool,
}
