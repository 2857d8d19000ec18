use super::{wait_down, CreateState, Orchestrator};
use crate::desired::VmDesiredState;
use crate::disk::DiskReconciler;
use crate::nic::NicProvisioner;
use crate::platform::{
    Cluster, EntityKind, Initialization, Link, NicConfiguration, Platform, VmCreateRequest,
};
use crate::resolver::Resolver;

// Error Handling
use log::{debug, error, info, warn};
use virtorch_error::{Step, VirtorchError};

const MIB: u64 = 1024 * 1024;

/// Keep the id of the created vm along with the error.
fn partial(id: &str, removed: bool, source: VirtorchError) -> VirtorchError {
    VirtorchError::PartiallyCreated {
        id: id.to_owned(),
        removed,
        source: Box::new(source),
    }
}

/// The outcome of a vm creation.
#[derive(Debug)]
pub struct Created {
    /// Platform assigned id, the vm identity from now on.
    pub id: String,
    /// The vm as read back after start.
    pub state: VmDesiredState,
    /// Network interfaces that couldn't be provisioned.
    /// The vm was still started without them.
    pub nic_failures: Vec<VirtorchError>,
}

impl Created {
    /// Address to connect to the vm: the declared address of its first interface.
    pub fn host(&self) -> Option<&str> {
        self.state
            .network_interfaces
            .first()
            .and_then(|e| e.ip_address.as_deref())
    }
    /// Fail on the first network interface failure.
    pub fn into_result(mut self) -> Result<Self, VirtorchError> {
        if self.nic_failures.is_empty() {
            Ok(self)
        } else {
            Err(self.nic_failures.remove(0))
        }
    }
}

fn build_request(desired: &VmDesiredState, cluster: &Cluster, template: Link) -> VmCreateRequest {
    let authorized_ssh_keys = match desired.authorized_ssh_key.is_empty() {
        true => None,
        false => Some(desired.authorized_ssh_key.clone()),
    };
    VmCreateRequest {
        name: desired.name.clone(),
        cluster: Link::new(EntityKind::Cluster, &cluster.id),
        template,
        cpu: desired.cpu,
        // Bounded by validation.
        memory: desired.memory.and_then(|mib| mib.checked_mul(MIB)),
        initialization: Initialization {
            authorized_ssh_keys,
            nic_configurations: desired
                .network_interfaces
                .iter()
                .map(NicConfiguration::from)
                .collect(),
        },
    }
}

impl Orchestrator {
    /*
     * Create, attach disks, provision nics, start, read back.
     *
     * A failure after the vm exists and before it is started rolls the vm back
     * (detach only removal). Nic failures are collected instead.
     * A start failure leaves everything in place.
     *
     * Once the vm exists, every error is a PartiallyCreated carrying its id.
     */
    pub async fn create<P: Platform>(
        &self,
        platform: &P,
        desired: &VmDesiredState,
    ) -> Result<Created, VirtorchError> {
        info!("[start] creating vm {:#?}", desired.name);
        desired
            .validate(&self.config)
            .map_err(|e| e.at(Step::Validate))?;

        let mut state = CreateState::Building;
        debug!("vm {:#?} is {}", desired.name, state);

        let resolver = Resolver::new(platform);
        let cluster = resolver
            .cluster(&desired.cluster)
            .await
            .map_err(|e| e.at(Step::Resolve))?;
        let template = resolver
            .template(&desired.template)
            .await
            .map_err(|e| e.at(Step::Resolve))?;

        let request = build_request(desired, &cluster, template);
        let vm = platform
            .add_vm(&request)
            .await
            .map_err(|e| e.at(Step::Create))?;
        let id = vm.id;
        info!("created vm {:#?} with id {}", desired.name, id);

        if let Err(e) = wait_down(platform, &self.config.create_settle, &id, None).await {
            let rolled_back = self.rollback(platform, &id).await;
            return Err(partial(&id, rolled_back, e.at(Step::CreateSettle)));
        }

        let reconciler = DiskReconciler::new(platform, &self.config.disk_lock);
        for (index, spec) in desired.disk_attachments.iter().enumerate() {
            if let Err(e) = reconciler.attach(&id, spec).await {
                let e = e.at(Step::AttachDisk {
                    index,
                    disk_id: spec.disk_id.clone(),
                });
                error!("{}", e);
                let rolled_back = self.rollback(platform, &id).await;
                if rolled_back {
                    state = CreateState::RolledBack;
                    debug!("vm {:#?} is {}", desired.name, state);
                }
                return Err(partial(&id, rolled_back, e));
            }
        }
        state = CreateState::DisksAttached;
        debug!("vm {:#?} is {}", desired.name, state);

        let nic_failures = self.provision_nics(platform, &id, &cluster, desired).await;
        state = CreateState::NicsProvisioned;
        debug!("vm {:#?} is {}", desired.name, state);

        state = CreateState::Starting;
        debug!("vm {:#?} is {}", desired.name, state);
        platform
            .start_vm(&id)
            .await
            .map_err(|e| partial(&id, false, e.at(Step::Start)))?;
        state = CreateState::Started;
        debug!("vm {:#?} is {}", desired.name, state);

        let read = self
            .read(platform, &id)
            .await
            .map_err(|e| partial(&id, false, e.at(Step::ReadBack)))?;
        let state = match read {
            Some(state) => state,
            None => {
                let e = VirtorchError::not_found(EntityKind::Vm, &id).at(Step::ReadBack);
                return Err(partial(&id, true, e));
            }
        };
        info!("[end] created vm {:#?} with id {}", desired.name, id);
        Ok(Created {
            id,
            state,
            nic_failures,
        })
    }

    /*
     * Resolve the profile of every interface and create its nic object.
     * A failing interface doesn't prevent the others from being provisioned.
     */
    async fn provision_nics<P: Platform>(
        &self,
        platform: &P,
        vm_id: &str,
        cluster: &Cluster,
        desired: &VmDesiredState,
    ) -> Vec<VirtorchError> {
        let resolver = Resolver::new(platform);
        let provisioner = NicProvisioner::new(platform);
        let data_center_id = &cluster.data_center.id;

        let mut failures = vec![];
        for (index, spec) in desired.network_interfaces.iter().enumerate() {
            let profile = match &spec.network {
                Some(network) => match resolver.vnic_profile(data_center_id, network).await {
                    Ok(profile) => Some(profile),
                    Err(e) => {
                        failures.push(e.at(Step::ProvisionNic {
                            index,
                            label: spec.label.clone(),
                        }));
                        continue;
                    }
                },
                None => None,
            };
            if let Err(e) = provisioner.provision(vm_id, index, profile.as_ref()).await {
                failures.push(e.at(Step::ProvisionNic {
                    index,
                    label: spec.label.clone(),
                }));
            }
        }
        for e in &failures {
            error!("{} on vm {}: {}", e, vm_id, e.root());
        }
        failures
    }

    /// Best effort removal of a half created vm. Failures are logged only.
    async fn rollback<P: Platform>(&self, platform: &P, id: &str) -> bool {
        warn!("rolling back vm {}", id);
        match self.delete(platform, id).await {
            Ok(()) => {
                info!("rolled back vm {}", id);
                true
            }
            Err(e) => {
                error!("couldn't roll back vm {}: {}", id, e);
                false
            }
        }
    }
}
