//! Assembly of the VM creation request.
//!
//! Each engine object has a constructor that checks its inputs and returns a
//! value or [`Error::Build`]; [`build_vm_definition`] composes them. Nothing
//! here mutates engine state.

use ovirt_api::{
    AutoPinningPolicy, Cpu, CpuTopology, CustomProperties, CustomProperty, Host, Hosts,
    Initialization, Link, MemoryPolicy, NewNic, NewVm, PlacementPolicy, VmAffinity, VmType,
};
use tracing::debug;

use crate::platform::Platform;
use crate::spec::{CpuSpec, MachineSpec};
use crate::{Error, Result};

pub const MIB: i64 = 1 << 20;

/// Custom property carrying the hugepage size.
pub const HUGEPAGES_PROPERTY: &str = "hugepages";

/// Everything needed to create a VM and finish configuring it afterwards.
#[derive(Debug, Clone)]
pub struct VmDefinition {
    pub request: NewVm,
    /// Tag attached to the VM once it exists.
    pub cluster_tag: String,
    /// Set when a policy other than `disabled` was requested.
    pub auto_pinning: Option<AutoPinningPolicy>,
}

pub fn cluster_ref(cluster_id: &str) -> Result<Link> {
    if cluster_id.is_empty() {
        return Err(Error::build("cluster id is empty"));
    }
    Ok(Link::id(cluster_id))
}

pub fn template_ref(template_name: &str) -> Result<Link> {
    if template_name.is_empty() {
        return Err(Error::build("template name is empty"));
    }
    Ok(Link::name(template_name))
}

pub fn instance_type_ref(instance_type_id: &str) -> Result<Link> {
    if instance_type_id.is_empty() {
        return Err(Error::build("instance type id is empty"));
    }
    Ok(Link::id(instance_type_id))
}

/// Cloud-init style initialization: the machine name becomes the guest
/// hostname and the ignition payload the custom script.
pub fn initialization(host_name: &str, payload: &[u8]) -> Result<Initialization> {
    if host_name.is_empty() {
        return Err(Error::build("host name is empty"));
    }
    let custom_script = std::str::from_utf8(payload)
        .map_err(|e| Error::build(format!("bootstrap payload is not valid UTF-8: {e}")))?;
    Ok(Initialization {
        host_name: host_name.to_string(),
        custom_script: custom_script.to_string(),
    })
}

pub fn cpu(spec: &CpuSpec) -> Result<Cpu> {
    if spec.cores <= 0 || spec.sockets <= 0 || spec.threads <= 0 {
        return Err(Error::build(format!(
            "cpu topology must be positive, got {}/{}/{} (cores/sockets/threads)",
            spec.cores, spec.sockets, spec.threads
        )));
    }
    Ok(Cpu {
        topology: CpuTopology {
            cores: spec.cores,
            sockets: spec.sockets,
            threads: spec.threads,
        },
    })
}

/// Megabytes to bytes (`mb × 2^20`).
pub fn memory_bytes(mb: i64) -> Result<i64> {
    mb.checked_mul(MIB)
        .filter(|bytes| *bytes > 0)
        .ok_or_else(|| Error::build(format!("memory of {mb}MB is out of range")))
}

/// Let the VM migrate freely among `hosts`; required for host-level pinning.
pub fn placement_policy(hosts: &[Host]) -> Result<PlacementPolicy> {
    if hosts.is_empty() {
        return Err(Error::build("failed to build the placement policy of the vm: no hosts in cluster"));
    }
    Ok(PlacementPolicy {
        affinity: VmAffinity::Migratable,
        hosts: Hosts {
            host: hosts.iter().map(|h| Link::id(&h.id)).collect(),
        },
    })
}

pub fn custom_property(name: &str, value: impl ToString) -> Result<CustomProperty> {
    let value = value.to_string();
    if name.is_empty() || value.is_empty() {
        return Err(Error::build(format!(
            "custom property needs a name and a value, got {name:?}={value:?}"
        )));
    }
    Ok(CustomProperty {
        name: name.to_string(),
        value,
    })
}

/// NIC named by 1-based position (`nic1`, `nic2`, ...).
pub fn nic(position: usize, vnic_profile_id: &str) -> Result<NewNic> {
    if vnic_profile_id.is_empty() {
        return Err(Error::build(format!("vnic profile id of nic{position} is empty")));
    }
    Ok(NewNic {
        name: format!("nic{position}"),
        vnic_profile: Link::id(vnic_profile_id),
    })
}

/// Hosts belonging to the cluster, resolved through the cluster's name.
pub async fn cluster_hosts(platform: &dyn Platform, cluster_id: &str) -> Result<Vec<Host>> {
    let cluster = platform
        .get_cluster(cluster_id)
        .await
        .map_err(|e| Error::build(format!("failed to get the cluster: {e}")))?;
    let hosts = platform
        .search_hosts(&format!("cluster={}", cluster.name))
        .await
        .map_err(|e| Error::build(format!("failed to get the list of hosts in the cluster: {e}")))?;
    debug!(cluster = %cluster.name, hosts = hosts.len(), "resolved cluster hosts");
    Ok(hosts)
}

/// Translate a validated spec into a creation request.
pub async fn build_vm_definition(
    platform: &dyn Platform,
    name: &str,
    cluster_tag: &str,
    payload: &[u8],
    spec: &MachineSpec,
) -> Result<VmDefinition> {
    let vm_type = if spec.vm_type.is_empty() {
        None
    } else {
        Some(spec.vm_type.parse::<VmType>().map_err(|e| Error::build(e.to_string()))?)
    };

    let mut request = NewVm {
        name: name.to_string(),
        cluster: cluster_ref(&spec.cluster_id)?,
        template: template_ref(&spec.template_name)?,
        initialization: initialization(name, payload)?,
        vm_type,
        instance_type: None,
        cpu: None,
        memory: None,
        memory_policy: None,
        placement_policy: None,
        custom_properties: None,
    };

    if !spec.instance_type_id.is_empty() {
        // Memory and CPU come from the instance type.
        request.instance_type = Some(instance_type_ref(&spec.instance_type_id)?);
    } else {
        if let Some(cpu_spec) = &spec.cpu {
            request.cpu = Some(cpu(cpu_spec)?);
        }
        if spec.memory_mb > 0 {
            request.memory = Some(memory_bytes(spec.memory_mb)?);
        }
        if spec.guaranteed_memory_mb > 0 {
            request.memory_policy = Some(MemoryPolicy {
                guaranteed: memory_bytes(spec.guaranteed_memory_mb)?,
            });
        }
    }

    let auto_pinning = match spec.auto_pinning_policy.as_deref().filter(|p| !p.is_empty()) {
        None => None,
        Some(raw) => {
            let policy = raw
                .parse::<AutoPinningPolicy>()
                .map_err(|e| Error::build(e.to_string()))?;
            (policy != AutoPinningPolicy::Disabled).then_some(policy)
        }
    };
    if auto_pinning.is_some() {
        let hosts = cluster_hosts(platform, &spec.cluster_id).await?;
        request.placement_policy = Some(placement_policy(&hosts)?);
    }

    if spec.hugepages > 0 {
        request.custom_properties = Some(CustomProperties {
            custom_property: vec![custom_property(HUGEPAGES_PROPERTY, spec.hugepages)?],
        });
    }

    Ok(VmDefinition {
        request,
        cluster_tag: cluster_tag.to_string(),
        auto_pinning,
    })
}
