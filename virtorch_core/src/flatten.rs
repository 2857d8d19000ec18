/*
* Projection of the remote entity graph back into the desired state shape.
*
* Pure functions, no remote call: the graph is fetched beforehand.
* Values are read off the remote entities as is, never defaulted,
* so that flattening the same graph twice gives the same desired state.
*/
use crate::desired::{ClusterRef, DiskAttachmentSpec, NetworkInterfaceSpec, TemplateRef, VmDesiredState};
use crate::nic::nic_index;
use crate::platform::{DiskAttachment, NicConfiguration, RemoteVm, Template};

const MIB: u64 = 1024 * 1024;

/// A nic object of the vm and the name of the vnic profile it is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NicBinding {
    pub name: String,
    pub profile: Option<String>,
}

/// A vm and the entities hanging off it, as fetched in one read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteGraph {
    pub vm: RemoteVm,
    pub template: Option<Template>,
    pub disk_attachments: Vec<DiskAttachment>,
    pub nics: Vec<NicBinding>,
}

pub fn flatten(graph: &RemoteGraph) -> VmDesiredState {
    let vm = &graph.vm;
    let template = match &graph.template {
        Some(template) => TemplateRef::Name(template.name.clone()),
        None => TemplateRef::Id(vm.template.id.clone()),
    };
    let (authorized_ssh_key, nic_configurations): (String, &[NicConfiguration]) =
        match &vm.initialization {
            Some(init) => (
                init.authorized_ssh_keys.clone().unwrap_or_default(),
                init.nic_configurations.as_slice(),
            ),
            None => (String::new(), &[]),
        };
    VmDesiredState {
        name: vm.name.clone(),
        cluster: ClusterRef::Id(vm.cluster.id.clone()),
        template,
        cpu: vm.cpu,
        memory: vm.memory.map(|bytes| bytes / MIB),
        authorized_ssh_key,
        network_interfaces: flatten_network_interfaces(nic_configurations, &graph.nics),
        disk_attachments: flatten_disk_attachments(&graph.disk_attachments),
    }
}

pub fn flatten_disk_attachments(attachments: &[DiskAttachment]) -> Vec<DiskAttachmentSpec> {
    attachments
        .iter()
        .map(|e| DiskAttachmentSpec {
            disk_id: e.disk.id.clone(),
            interface: e.interface,
            bootable: e.bootable,
            active: e.active,
            logical_name: e.logical_name.clone(),
            pass_discard: e.pass_discard,
            read_only: e.read_only,
            uses_scsi_reservation: e.uses_scsi_reservation,
        })
        .collect()
}

/*
* The n-th configuration is the n-th interface of the desired state,
* its target network is the profile of the nic object at the same position.
*
* A configuration without a name, which this crate never writes,
* flattens to an empty label. Validation rejects that label,
* so such a state is flagged instead of silently matching a desired one.
*/
pub fn flatten_network_interfaces(
    configurations: &[NicConfiguration],
    nics: &[NicBinding],
) -> Vec<NetworkInterfaceSpec> {
    configurations
        .iter()
        .enumerate()
        .map(|(i, e)| {
            let network = nics
                .iter()
                .find(|nic| nic_index(&nic.name) == Some(i))
                .and_then(|nic| nic.profile.clone());
            let ip = e.ip.clone().unwrap_or_default();
            NetworkInterfaceSpec {
                label: e.name.clone().unwrap_or_default(),
                network,
                boot_protocol: e.boot_protocol,
                ip_address: ip.address,
                subnet_mask: ip.netmask,
                gateway: ip.gateway,
                on_boot: e.on_boot,
            }
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::platform::{
        BootProtocol, CpuTopology, DiskInterface, EntityKind, Initialization, Ip, Link, VmStatus,
    };
    use pretty_assertions::assert_eq;

    fn graph() -> RemoteGraph {
        RemoteGraph {
            vm: RemoteVm {
                id: "vm-1".to_owned(),
                name: "web1".to_owned(),
                status: VmStatus::Up,
                cluster: Link::new(EntityKind::Cluster, "cluster-1"),
                template: Link::new(EntityKind::Template, "template-1"),
                cpu: CpuTopology {
                    cores: 2,
                    sockets: 1,
                    threads: 1,
                },
                memory: Some(2048 * MIB),
                initialization: Some(Initialization {
                    authorized_ssh_keys: Some("ssh-ed25519 AAAA".to_owned()),
                    nic_configurations: vec![
                        NicConfiguration {
                            name: Some("eth0".to_owned()),
                            boot_protocol: BootProtocol::Static,
                            on_boot: true,
                            ip: Some(Ip {
                                address: Some("10.1.60.60".to_owned()),
                                netmask: Some("255.255.255.0".to_owned()),
                                gateway: Some("10.1.60.1".to_owned()),
                            }),
                        },
                        NicConfiguration {
                            name: Some("eth1".to_owned()),
                            boot_protocol: BootProtocol::Dhcp,
                            on_boot: false,
                            ip: None,
                        },
                    ],
                }),
            },
            template: None,
            disk_attachments: vec![DiskAttachment {
                id: "attachment-1".to_owned(),
                disk: Link::new(EntityKind::Disk, "disk-1"),
                interface: DiskInterface::VirtioScsi,
                bootable: true,
                active: true,
                logical_name: Some("/dev/sda".to_owned()),
                pass_discard: true,
                read_only: false,
                uses_scsi_reservation: false,
            }],
            // Listed out of order on purpose.
            nics: vec![
                NicBinding {
                    name: "nic2".to_owned(),
                    profile: None,
                },
                NicBinding {
                    name: "nic1".to_owned(),
                    profile: Some("ovirtmgmt".to_owned()),
                },
            ],
        }
    }

    #[test]
    fn flatten_remote_graph() {
        let vm = flatten(&graph());

        assert_eq!(vm.cluster, ClusterRef::Id("cluster-1".to_owned()));
        assert_eq!(vm.template, TemplateRef::Id("template-1".to_owned()));
        assert_eq!(vm.memory, Some(2048));
        assert_eq!(vm.authorized_ssh_key, "ssh-ed25519 AAAA");

        let eth0 = &vm.network_interfaces[0];
        assert_eq!(eth0.network.as_deref(), Some("ovirtmgmt"));
        assert_eq!(eth0.gateway.as_deref(), Some("10.1.60.1"));

        // Unreported addresses stay absent.
        let eth1 = &vm.network_interfaces[1];
        assert_eq!(eth1.network, None);
        assert_eq!(eth1.ip_address, None);
        assert_eq!(eth1.subnet_mask, None);
        assert!(!eth1.on_boot);

        let disk = &vm.disk_attachments[0];
        assert_eq!(disk.disk_id, "disk-1");
        assert_eq!(disk.interface, DiskInterface::VirtioScsi);
        assert_eq!(disk.logical_name.as_deref(), Some("/dev/sda"));
        assert!(disk.pass_discard);
    }

    #[test]
    fn flatten_is_idempotent() {
        let graph = graph();
        assert_eq!(flatten(&graph), flatten(&graph));
    }

    #[test]
    fn nameless_configuration_fails_validation() {
        let mut graph = graph();
        if let Some(init) = graph.vm.initialization.as_mut() {
            init.nic_configurations[0].name = None;
        }

        let vm = flatten(&graph);
        let eth0 = &vm.network_interfaces[0];
        assert_eq!(eth0.label, "");
        assert_eq!(eth0.ip_address.as_deref(), Some("10.1.60.60"));
        assert!(eth0.validate("network_interfaces[0]").is_err());
    }

    #[test]
    fn flatten_vm_without_initialization() {
        let mut graph = graph();
        graph.vm.initialization = None;
        graph.template = Some(Template {
            id: "template-1".to_owned(),
            name: "Blank".to_owned(),
        });

        let vm = flatten(&graph);
        assert_eq!(vm.template, TemplateRef::Name("Blank".to_owned()));
        assert_eq!(vm.authorized_ssh_key, "");
        assert!(vm.network_interfaces.is_empty());
    }
}
