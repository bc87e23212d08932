use tracing::info;

use crate::Result;
use crate::build::nic;
use crate::platform::Platform;
use crate::spec::NetworkInterfaceSpec;

/// Replace every NIC on the VM with one NIC per entry in `desired`.
///
/// An empty `desired` keeps whatever the template defined. Otherwise this is
/// a destructive replace, not a merge: all existing NICs are removed, then new
/// ones are added as `nic1..nicN`. A failure part way through leaves the VM
/// with a partial NIC set; nothing is rolled back.
pub async fn reconcile_network_interfaces(
    platform: &dyn Platform,
    vm_id: &str,
    desired: &[NetworkInterfaceSpec],
) -> Result<()> {
    if desired.is_empty() {
        return Ok(());
    }

    // Build every NIC first so a bad entry fails before anything is removed.
    let new_nics = desired
        .iter()
        .enumerate()
        .map(|(i, spec)| nic(i + 1, &spec.vnic_profile_id))
        .collect::<Result<Vec<_>>>()?;

    let existing = platform.list_nics(vm_id).await?;
    info!(vm_id, removing = existing.len(), adding = new_nics.len(), "replacing network interfaces");

    for old in &existing {
        platform.remove_nic(vm_id, &old.id).await?;
    }
    for new in &new_nics {
        platform.add_nic(vm_id, new).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::testing::FakePlatform;

    fn profiles(ids: &[&str]) -> Vec<NetworkInterfaceSpec> {
        ids.iter()
            .map(|id| NetworkInterfaceSpec {
                vnic_profile_id: (*id).into(),
            })
            .collect()
    }

    #[tokio::test]
    async fn empty_desired_set_touches_nothing() {
        let platform = FakePlatform::default();
        platform.add_nic_named("vm-1", "n1", "nic1");

        reconcile_network_interfaces(&platform, "vm-1", &[]).await.unwrap();
        assert!(platform.calls().is_empty());
    }

    #[tokio::test]
    async fn replaces_all_existing_nics() {
        let platform = FakePlatform::default();
        platform.add_nic_named("vm-1", "n1", "nic1");
        platform.add_nic_named("vm-1", "n2", "eth-legacy");

        reconcile_network_interfaces(&platform, "vm-1", &profiles(&["p-a", "p-b", "p-c"]))
            .await
            .unwrap();

        assert_eq!(
            platform.calls(),
            vec![
                "list_nics:vm-1",
                "remove_nic:n1",
                "remove_nic:n2",
                "add_nic:nic1=p-a",
                "add_nic:nic2=p-b",
                "add_nic:nic3=p-c",
            ]
        );
        let names: Vec<String> = platform.state.lock().unwrap().nics["vm-1"]
            .iter()
            .map(|n| n.name.clone())
            .collect();
        assert_eq!(names, vec!["nic1", "nic2", "nic3"]);
    }

    #[tokio::test]
    async fn removal_failure_aborts_before_adding() {
        let platform = FakePlatform::default();
        platform.add_nic_named("vm-1", "n1", "nic1");
        platform.state.lock().unwrap().failing.insert("remove_nic");

        let err = reconcile_network_interfaces(&platform, "vm-1", &profiles(&["p-a"]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Api(_)));
        assert_eq!(platform.count("add_nic"), 0);
    }

    #[tokio::test]
    async fn empty_profile_id_fails_before_any_removal() {
        let platform = FakePlatform::default();
        platform.add_nic_named("vm-1", "n1", "nic1");

        let err = reconcile_network_interfaces(&platform, "vm-1", &profiles(&["p-a", ""]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Build(_)));
        assert!(platform.calls().is_empty());
    }
}
