use crate::desired::NetworkInterfaceSpec;
use crate::platform::{
    EntityKind, Ip, Link, Nic, NicConfiguration, NicRequest, Platform, VnicProfile,
};

// Error Handling
use log::info;
use virtorch_error::VirtorchError;

/// Nic objects are named after their position: nic1, nic2...
pub fn nic_name(index: usize) -> String {
    format!("nic{}", index + 1)
}

/// Position of a nic from its name, the reverse of nic_name().
pub fn nic_index(name: &str) -> Option<usize> {
    let n: usize = name.strip_prefix("nic")?.parse().ok()?;
    n.checked_sub(1)
}

/*
* The first boot network configuration of an interface.
* Addressing is never set on the nic object itself,
* it travels in the vm initialization payload.
* Given addresses are kept whatever the boot protocol,
* so that reading the vm back yields what was declared.
*/
impl From<&NetworkInterfaceSpec> for NicConfiguration {
    fn from(e: &NetworkInterfaceSpec) -> Self {
        let ip = match (&e.ip_address, &e.subnet_mask, &e.gateway) {
            (None, None, None) => None,
            _ => Some(Ip {
                address: e.ip_address.clone(),
                netmask: e.subnet_mask.clone(),
                gateway: e.gateway.clone(),
            }),
        };
        Self {
            name: Some(e.label.clone()),
            boot_protocol: e.boot_protocol,
            on_boot: e.on_boot,
            ip,
        }
    }
}

pub struct NicProvisioner<'a, P: Platform> {
    platform: &'a P,
}

impl<'a, P: Platform> NicProvisioner<'a, P> {
    pub fn new(platform: &'a P) -> Self {
        Self { platform }
    }

    /// Create the nic object at the given position, bound to the profile if any.
    pub async fn provision(
        &self,
        vm_id: &str,
        index: usize,
        profile: Option<&VnicProfile>,
    ) -> Result<Nic, VirtorchError> {
        let name = nic_name(index);
        let request = NicRequest {
            name: name.clone(),
            description: Some(format!("network interface card #{}", index + 1)),
            vnic_profile: profile.map(|e| Link::new(EntityKind::VnicProfile, &e.id)),
        };
        let nic = self
            .platform
            .add_nic(vm_id, &request)
            .await
            .map_err(|e| match e {
                VirtorchError::RejectedByRemote { reason, .. } => VirtorchError::NicCreateFailed {
                    nic: name.clone(),
                    reason,
                },
                other => other,
            })?;
        info!(
            "added {} to vm {} on profile {}",
            nic.name,
            vm_id,
            profile.map(|e| e.name.as_str()).unwrap_or("<none>")
        );
        Ok(nic)
    }
}
