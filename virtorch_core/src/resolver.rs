/*
* Reference resolution.
*
* Turns the human supplied names of a desired state (cluster, template, network)
* into platform ids. Read-only: nothing is ever mutated on the remote side.
*/
use crate::desired::{ClusterRef, TemplateRef};
use crate::platform::{follow, Cluster, EntityKind, Link, Network, Platform, Template, VnicProfile};

// Error Handling
use log::{debug, trace};
use virtorch_error::VirtorchError;

pub struct Resolver<'a, P: Platform> {
    platform: &'a P,
}

/// Keep the only entity in a name lookup result.
fn single<T>(mut matches: Vec<T>, kind: EntityKind, name: &str) -> Result<T, VirtorchError> {
    match matches.len() {
        0 => Err(VirtorchError::not_found(kind, name)),
        1 => Ok(matches.remove(0)),
        count => Err(VirtorchError::AmbiguousReference {
            kind: kind.to_string(),
            name: name.to_owned(),
            count,
        }),
    }
}

impl<'a, P: Platform> Resolver<'a, P> {
    pub fn new(platform: &'a P) -> Self {
        Self { platform }
    }

    pub async fn cluster(&self, reference: &ClusterRef) -> Result<Cluster, VirtorchError> {
        let cluster = match reference {
            ClusterRef::Id(id) => {
                follow::<P, Cluster>(self.platform, &Link::new(EntityKind::Cluster, id)).await?
            }
            ClusterRef::Name(name) => {
                let matches: Vec<Cluster> = self
                    .platform
                    .list_clusters()
                    .await?
                    .into_iter()
                    .filter(|e| &e.name == name)
                    .collect();
                single(matches, EntityKind::Cluster, name)?
            }
        };
        debug!(
            "resolved cluster {:?} to {} in data center {}",
            reference, cluster.id, cluster.data_center.id
        );
        Ok(cluster)
    }

    /// Id of the data center the cluster belongs to.
    pub async fn data_center(&self, reference: &ClusterRef) -> Result<String, VirtorchError> {
        Ok(self.cluster(reference).await?.data_center.id)
    }

    /*
     * A link usable in a create request.
     * Templates referenced by id are checked to exist.
     */
    pub async fn template(&self, reference: &TemplateRef) -> Result<Link, VirtorchError> {
        let template = match reference {
            TemplateRef::Id(id) => {
                follow::<P, Template>(self.platform, &Link::new(EntityKind::Template, id)).await?
            }
            TemplateRef::Name(name) => {
                let matches: Vec<Template> = self
                    .platform
                    .list_templates()
                    .await?
                    .into_iter()
                    .filter(|e| &e.name == name)
                    .collect();
                single(matches, EntityKind::Template, name)?
            }
        };
        debug!("resolved template {:?} to {}", reference, template.id);
        Ok(Link::new(EntityKind::Template, &template.id))
    }

    /*
     * Profile names are only unique within a data center.
     * A profile matches if its name is the requested network name
     * AND its network lives in the given data center.
     * A profile whose network can't be read is skipped.
     */
    pub async fn vnic_profile(
        &self,
        data_center_id: &str,
        network: &str,
    ) -> Result<VnicProfile, VirtorchError> {
        let profiles = self.platform.list_vnic_profiles().await?;
        for profile in profiles.into_iter().filter(|e| e.name == network) {
            let owner: Network = match follow(self.platform, &profile.network).await {
                Ok(owner) => owner,
                Err(e) => {
                    debug!(
                        "skipping vnic profile {} ({}): {}",
                        profile.name, profile.id, e
                    );
                    continue;
                }
            };
            trace!(
                "vnic profile {} ({}) belongs to data center {}",
                profile.name,
                profile.id,
                owner.data_center.id
            );
            if owner.data_center.id == data_center_id {
                debug!(
                    "resolved network {:?} to vnic profile {} in data center {}",
                    network, profile.id, data_center_id
                );
                return Ok(profile);
            }
        }
        Err(VirtorchError::ProfileNotFound {
            network: network.to_owned(),
            data_center: data_center_id.to_owned(),
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::platform::MemoryPlatform;
    use miette::Result;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn pick_profile_of_the_cluster_data_center() -> Result<()> {
        let platform = MemoryPlatform::new();
        // Seeded first so that a name only match would pick it.
        let net_b = platform.seed_network("mgmt", "dc-b");
        let profile_b = platform.seed_vnic_profile("mgmt", &net_b.id);
        let net_a = platform.seed_network("mgmt", "dc-a");
        let profile_a = platform.seed_vnic_profile("mgmt", &net_a.id);

        let resolver = Resolver::new(&platform);
        assert_eq!(resolver.vnic_profile("dc-a", "mgmt").await?, profile_a);
        assert_eq!(resolver.vnic_profile("dc-b", "mgmt").await?, profile_b);
        Ok(())
    }

    #[tokio::test]
    async fn skip_profile_with_a_dangling_network() -> Result<()> {
        let platform = MemoryPlatform::new();
        platform.seed_vnic_profile("mgmt", "deleted-network");
        let net_a = platform.seed_network("mgmt", "dc-a");
        let profile_a = platform.seed_vnic_profile("mgmt", &net_a.id);

        let resolver = Resolver::new(&platform);
        assert_eq!(resolver.vnic_profile("dc-a", "mgmt").await?, profile_a);

        let err = resolver.vnic_profile("dc-b", "mgmt").await.unwrap_err();
        assert!(matches!(err, VirtorchError::ProfileNotFound { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn fail_loudly_on_unknown_profile() {
        let platform = MemoryPlatform::new();
        let net_b = platform.seed_network("mgmt", "dc-b");
        platform.seed_vnic_profile("mgmt", &net_b.id);

        let resolver = Resolver::new(&platform);
        let err = resolver.vnic_profile("dc-a", "mgmt").await.unwrap_err();
        assert!(matches!(err, VirtorchError::ProfileNotFound { .. }));
        let err = resolver.vnic_profile("dc-b", "storage").await.unwrap_err();
        assert!(matches!(err, VirtorchError::ProfileNotFound { .. }));
    }

    #[tokio::test]
    async fn resolve_cluster_by_name_and_id() -> Result<()> {
        let platform = MemoryPlatform::new();
        let cluster = platform.seed_cluster("Default", "dc-a");
        platform.seed_cluster("Other", "dc-b");

        let resolver = Resolver::new(&platform);
        let by_name = resolver
            .data_center(&ClusterRef::Name("Default".to_owned()))
            .await?;
        let by_id = resolver
            .data_center(&ClusterRef::Id(cluster.id.clone()))
            .await?;
        assert_eq!(by_name, "dc-a");
        assert_eq!(by_id, "dc-a");

        let err = resolver
            .cluster(&ClusterRef::Id("missing".to_owned()))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        Ok(())
    }

    #[tokio::test]
    async fn refuse_ambiguous_template_name() -> Result<()> {
        let platform = MemoryPlatform::new();
        platform.seed_template("centos");
        platform.seed_template("centos");
        let debian = platform.seed_template("debian");

        let resolver = Resolver::new(&platform);
        let err = resolver
            .template(&TemplateRef::Name("centos".to_owned()))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            VirtorchError::AmbiguousReference { count: 2, .. }
        ));

        let link = resolver
            .template(&TemplateRef::Name("debian".to_owned()))
            .await?;
        assert_eq!(link, Link::new(EntityKind::Template, &debian.id));

        let err = resolver
            .template(&TemplateRef::Name("ubuntu".to_owned()))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        Ok(())
    }
}
