use std::collections::HashMap;

use ovirt_api::{AffinityGroup, Vm};
use tracing::{debug, info};

use crate::platform::Platform;
use crate::{Error, Result};

/// Look up every name among the cluster's affinity groups.
///
/// Fails on the first unknown name, so nothing is bound unless all resolve.
pub async fn resolve_affinity_groups(
    platform: &dyn Platform,
    cluster_id: &str,
    names: &[String],
) -> Result<Vec<AffinityGroup>> {
    let by_name: HashMap<String, AffinityGroup> = platform
        .list_affinity_groups(cluster_id)
        .await?
        .into_iter()
        .map(|g| (g.name.clone(), g))
        .collect();

    names
        .iter()
        .map(|name| {
            by_name.get(name).cloned().ok_or_else(|| {
                Error::NotFound(format!(
                    "affinity group {name} was not found on cluster {cluster_id}"
                ))
            })
        })
        .collect()
}

/// Add the VM to each named affinity group of its cluster.
pub async fn bind_affinity_groups(
    platform: &dyn Platform,
    vm: &Vm,
    cluster_id: &str,
    names: &[String],
) -> Result<()> {
    if names.is_empty() {
        return Ok(());
    }

    let groups = resolve_affinity_groups(platform, cluster_id, names).await?;
    for group in &groups {
        info!(vm = %vm.name, group = %group.name, "adding machine to affinity group");
        match platform
            .add_vm_to_affinity_group(cluster_id, &group.id, &vm.id)
            .await
        {
            Ok(_) => {}
            // The engine adds the VM but answers with an <action> element
            // instead of the <vm> (BZ#1931932). Remove once fixed upstream.
            Err(e) if e.is_action_tag_mismatch("vm") => {
                debug!(vm = %vm.name, group = %group.name, "ignoring action tag mismatch on membership add");
            }
            Err(e) => {
                return Err(Error::Api(e));
            }
        }
    }
    Ok(())
}
