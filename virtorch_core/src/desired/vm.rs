use crate::config::OrchestratorConfig;
use crate::platform::{BootProtocol, CpuTopology, DiskInterface};

use bon::Builder;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use std::collections::HashSet;
use std::fs;
use std::net::IpAddr;

// Error Handling
use virtorch_error::{CastError, TomlError, VirtorchError};

const MIB: u64 = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterRef {
    Id(String),
    Name(String),
}
impl Default for ClusterRef {
    fn default() -> Self {
        ClusterRef::Name("Default".to_owned())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateRef {
    Id(String),
    Name(String),
}
impl Default for TemplateRef {
    fn default() -> Self {
        TemplateRef::Name("Blank".to_owned())
    }
}

fn default_true() -> bool {
    true
}

/// A network interface of the vm, as configured on first boot.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Builder)]
pub struct NetworkInterfaceSpec {
    /// Interface name inside the guest (eth0).
    #[builder(into)]
    pub label: String,
    /// Name of the vnic profile (network) to plug the nic into.
    #[builder(into)]
    pub network: Option<String>,
    pub boot_protocol: BootProtocol,
    #[builder(into)]
    pub ip_address: Option<String>,
    #[builder(into)]
    pub subnet_mask: Option<String>,
    #[builder(into)]
    pub gateway: Option<String>,
    #[serde(default = "default_true")]
    #[builder(default = true)]
    pub on_boot: bool,
}

/// A pre-existing disk to attach to the vm.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Builder)]
pub struct DiskAttachmentSpec {
    #[builder(into)]
    pub disk_id: String,
    pub interface: DiskInterface,
    #[serde(default)]
    #[builder(default)]
    pub bootable: bool,
    #[serde(default = "default_true")]
    #[builder(default = true)]
    pub active: bool,
    #[builder(into)]
    pub logical_name: Option<String>,
    #[serde(default)]
    #[builder(default)]
    pub pass_discard: bool,
    #[serde(default)]
    #[builder(default)]
    pub read_only: bool,
    #[serde(default)]
    #[builder(default)]
    pub uses_scsi_reservation: bool,
}

/**
The caller declared vm.

```toml
name = "web1"
cluster = { name = "Default" }

[[network_interfaces]]
label = "eth0"
network = "ovirtmgmt"
boot_protocol = "static"
ip_address = "10.1.60.60"
subnet_mask = "255.255.255.0"
gateway = "10.1.60.1"

[[disk_attachments]]
disk_id = "8a3ad14e-1a5b-4c66-a5e9-3c2f1c8c2b1e"
interface = "virtio"
bootable = true
```
*/
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Builder)]
pub struct VmDesiredState {
    #[builder(into)]
    pub name: String,
    #[serde(default)]
    #[builder(default)]
    pub cluster: ClusterRef,
    #[serde(default)]
    #[builder(default)]
    pub template: TemplateRef,
    #[serde(default)]
    #[builder(default)]
    pub cpu: CpuTopology,
    /// Memory in MiB.
    pub memory: Option<u64>,
    #[serde(default)]
    #[builder(default, into)]
    pub authorized_ssh_key: String,
    #[serde(default)]
    #[builder(default)]
    pub network_interfaces: Vec<NetworkInterfaceSpec>,
    #[serde(default)]
    #[builder(default)]
    pub disk_attachments: Vec<DiskAttachmentSpec>,
}

fn invalid(field: &str, reason: &str) -> VirtorchError {
    VirtorchError::InvalidDesiredState {
        field: field.to_owned(),
        reason: reason.to_owned(),
    }
}

fn is_ip(value: &str) -> bool {
    value.parse::<IpAddr>().is_ok()
}

/// Dotted netmask (255.255.255.0) or prefix length (24).
fn is_netmask(value: &str) -> bool {
    value.parse::<IpAddr>().is_ok() || value.parse::<u8>().is_ok_and(|prefix| prefix <= 32)
}

impl NetworkInterfaceSpec {
    pub fn validate(&self, field: &str) -> Result<(), VirtorchError> {
        if self.label.trim().is_empty() {
            return Err(invalid(&format!("{field}.label"), "must not be empty"));
        }
        if let Some(network) = &self.network {
            if network.trim().is_empty() {
                return Err(invalid(&format!("{field}.network"), "must not be empty"));
            }
        }
        // Addresses are checked whenever given, and required when static.
        let required = self.boot_protocol == BootProtocol::Static;
        let addresses: [(&str, Option<&str>, fn(&str) -> bool, &str); 3] = [
            ("ip_address", self.ip_address.as_deref(), is_ip, "not an ip address"),
            (
                "subnet_mask",
                self.subnet_mask.as_deref(),
                is_netmask,
                "not a netmask nor a prefix length",
            ),
            ("gateway", self.gateway.as_deref(), is_ip, "not an ip address"),
        ];
        for (name, value, is_valid, reason) in addresses {
            match value {
                None if required => {
                    return Err(invalid(
                        &format!("{field}.{name}"),
                        "required with the static boot protocol",
                    ))
                }
                Some(v) if !is_valid(v) => return Err(invalid(&format!("{field}.{name}"), reason)),
                _ => {}
            };
        }
        Ok(())
    }
}

impl DiskAttachmentSpec {
    pub fn validate(&self, field: &str) -> Result<(), VirtorchError> {
        if self.disk_id.trim().is_empty() {
            return Err(invalid(&format!("{field}.disk_id"), "must not be empty"));
        }
        if let Some(name) = &self.logical_name {
            if name.trim().is_empty() {
                return Err(invalid(&format!("{field}.logical_name"), "must not be empty"));
            }
        }
        Ok(())
    }
}

impl VmDesiredState {
    /*
     * Check the desired state once, at the boundary.
     * The orchestrator relies on these invariants afterwards.
     */
    pub fn validate(&self, config: &OrchestratorConfig) -> Result<(), VirtorchError> {
        if self.name.trim().is_empty() {
            return Err(invalid("name", "must not be empty"));
        }
        match &self.cluster {
            ClusterRef::Id(v) | ClusterRef::Name(v) if v.trim().is_empty() => {
                return Err(invalid("cluster", "must not be empty"));
            }
            _ => {}
        };
        match &self.template {
            TemplateRef::Id(v) | TemplateRef::Name(v) if v.trim().is_empty() => {
                return Err(invalid("template", "must not be empty"));
            }
            _ => {}
        };
        let cpu = &self.cpu;
        if cpu.cores == 0 || cpu.sockets == 0 || cpu.threads == 0 {
            return Err(invalid("cpu", "cores, sockets and threads must be at least 1"));
        }
        match self.memory {
            Some(0) => return Err(invalid("memory", "must be positive")),
            Some(mib) if mib.checked_mul(MIB).is_none() => {
                return Err(invalid("memory", "too large to express in bytes"))
            }
            _ => {}
        };

        if self.network_interfaces.is_empty() {
            return Err(invalid(
                "network_interfaces",
                "at least one network interface is required",
            ));
        }
        let mut labels = HashSet::new();
        for (i, nic) in self.network_interfaces.iter().enumerate() {
            let field = format!("network_interfaces[{i}]");
            nic.validate(&field)?;
            if !labels.insert(nic.label.as_str()) {
                return Err(invalid(&format!("{field}.label"), "duplicated label"));
            }
        }

        if config.require_disk_attachment && self.disk_attachments.is_empty() {
            return Err(invalid(
                "disk_attachments",
                "at least one disk attachment is required",
            ));
        }
        let mut disks = HashSet::new();
        for (i, disk) in self.disk_attachments.iter().enumerate() {
            let field = format!("disk_attachments[{i}]");
            disk.validate(&field)?;
            if !disks.insert(disk.disk_id.as_str()) {
                return Err(invalid(&format!("{field}.disk_id"), "disk attached twice"));
            }
        }
        Ok(())
    }

    pub fn from_file(path: &str) -> Result<Self, VirtorchError> {
        let string = fs::read_to_string(path)?;
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

#[cfg(test)]
mod test {
    use super::*;
    use miette::Result;
    use pretty_assertions::assert_eq;

    fn static_nic() -> NetworkInterfaceSpec {
        NetworkInterfaceSpec::builder()
            .label("eth0")
            .network("ovirtmgmt")
            .boot_protocol(BootProtocol::Static)
            .ip_address("10.1.60.60")
            .subnet_mask("255.255.255.0")
            .gateway("10.1.60.1")
            .build()
    }

    fn field_of(err: VirtorchError) -> String {
        match err {
            VirtorchError::InvalidDesiredState { field, .. } => field,
            other => panic!("expected an invalid desired state, got {:?}", other),
        }
    }

    #[test]
    fn get_desired_state_from_toml() -> Result<()> {
        let toml = r#"
            name = "web1"
            cluster = { name = "Default" }
            memory = 2048

            [cpu]
            cores = 2
            sockets = 1
            threads = 1

            [[network_interfaces]]
            label = "eth0"
            network = "ovirtmgmt"
            boot_protocol = "static"
            ip_address = "10.1.60.60"
            subnet_mask = "255.255.255.0"
            gateway = "10.1.60.1"

            [[disk_attachments]]
            disk_id = "disk-1"
            interface = "virtio"
            bootable = true
        "#;
        let vm = VmDesiredState::from_toml(toml)?;

        assert_eq!(vm.template, TemplateRef::Name("Blank".to_owned()));
        assert_eq!(vm.cpu.cores, 2);
        assert_eq!(vm.network_interfaces, vec![static_nic()]);
        let disk = &vm.disk_attachments[0];
        assert!(disk.active);
        assert!(disk.bootable);
        assert!(!disk.read_only);
        assert_eq!(disk.logical_name, None);

        vm.validate(&OrchestratorConfig::default())?;
        Ok(())
    }

    #[test]
    fn require_a_network_interface() {
        let vm = VmDesiredState::builder().name("web1").build();
        let err = vm.validate(&OrchestratorConfig::default()).unwrap_err();
        assert_eq!(field_of(err), "network_interfaces");
    }

    #[test]
    fn require_a_disk_in_legacy_mode() {
        let vm = VmDesiredState::builder()
            .name("web1")
            .network_interfaces(vec![static_nic()])
            .build();
        let config = OrchestratorConfig {
            require_disk_attachment: true,
            ..Default::default()
        };
        assert!(vm.validate(&OrchestratorConfig::default()).is_ok());
        assert_eq!(field_of(vm.validate(&config).unwrap_err()), "disk_attachments");
    }

    #[test]
    fn static_interface_needs_an_address() {
        let mut nic = static_nic();
        nic.gateway = None;
        let vm = VmDesiredState::builder()
            .name("web1")
            .network_interfaces(vec![nic])
            .build();
        let err = vm.validate(&OrchestratorConfig::default()).unwrap_err();
        assert_eq!(field_of(err), "network_interfaces[0].gateway");
    }

    #[test]
    fn dhcp_interface_needs_no_address() {
        let nic = NetworkInterfaceSpec::builder()
            .label("eth0")
            .boot_protocol(BootProtocol::Dhcp)
            .build();
        assert!(nic.on_boot);
        assert!(nic.validate("nic").is_ok());
    }

    #[test]
    fn dhcp_interface_addresses_must_parse() {
        let mut nic = NetworkInterfaceSpec::builder()
            .label("eth0")
            .boot_protocol(BootProtocol::Dhcp)
            .ip_address("10.0.0.5")
            .build();
        assert!(nic.validate("nic").is_ok());
        nic.gateway = Some("gateway.lan".to_owned());
        assert_eq!(field_of(nic.validate("nic").unwrap_err()), "nic.gateway");
    }

    #[test]
    fn refuse_memory_beyond_byte_range() {
        let vm = VmDesiredState::builder()
            .name("web1")
            .memory(u64::MAX / 1024)
            .network_interfaces(vec![static_nic()])
            .build();
        let err = vm.validate(&OrchestratorConfig::default()).unwrap_err();
        assert_eq!(field_of(err), "memory");

        let vm = VmDesiredState {
            memory: Some(u64::MAX / MIB),
            ..vm
        };
        assert!(vm.validate(&OrchestratorConfig::default()).is_ok());
    }

    #[test]
    fn accept_prefix_length_netmask() {
        let mut nic = static_nic();
        nic.subnet_mask = Some("24".to_owned());
        assert!(nic.validate("nic").is_ok());
        nic.subnet_mask = Some("33".to_owned());
        assert_eq!(field_of(nic.validate("nic").unwrap_err()), "nic.subnet_mask");
    }

    #[test]
    fn refuse_duplicated_disks() {
        let disk = DiskAttachmentSpec::builder()
            .disk_id("disk-1")
            .interface(DiskInterface::Virtio)
            .build();
        let vm = VmDesiredState::builder()
            .name("web1")
            .network_interfaces(vec![static_nic()])
            .disk_attachments(vec![disk.clone(), disk])
            .build();
        let err = vm.validate(&OrchestratorConfig::default()).unwrap_err();
        assert_eq!(field_of(err), "disk_attachments[1].disk_id");
    }
}
