use serde::{Deserialize, Serialize};

/// Hugepage sizes (KiB) the engine accepts. `0` means no hugepages.
pub const HUGEPAGE_SIZES_KIB: [i64; 3] = [0, 2048, 1_048_576];

/// Declarative description of one machine, as carried by the provider spec.
///
/// Enum-valued fields stay raw strings here; validation parses them so a bad
/// value surfaces as a validation error instead of a deserialization error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineSpec {
    pub cluster_id: String,
    pub template_name: String,
    #[serde(rename = "type", default)]
    pub vm_type: String,
    /// Mutually exclusive with `cpu` + `memory_mb`.
    #[serde(default)]
    pub instance_type_id: String,
    #[serde(default)]
    pub cpu: Option<CpuSpec>,
    #[serde(default)]
    pub memory_mb: i64,
    #[serde(default)]
    pub guaranteed_memory_mb: i64,
    #[serde(default)]
    pub os_disk: Option<DiskSpec>,
    #[serde(default)]
    pub network_interfaces: Vec<NetworkInterfaceSpec>,
    #[serde(rename = "affinityGroupsNames", default)]
    pub affinity_groups_names: Vec<String>,
    /// Hugepage size in KiB, one of [`HUGEPAGE_SIZES_KIB`].
    #[serde(default)]
    pub hugepages: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_pinning_policy: Option<String>,
    #[serde(rename = "userDataSecret", default)]
    pub user_data_secret: Option<SecretRef>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuSpec {
    pub cores: i64,
    pub sockets: i64,
    pub threads: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskSpec {
    pub size_gb: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInterfaceSpec {
    pub vnic_profile_id: String,
}

/// Reference to the secret holding the ignition payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretRef {
    pub name: String,
}

/// Identity of the machine object a VM is looked up for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MachineRef {
    pub name: String,
    /// Engine VM id recorded on the machine once it was provisioned.
    pub provider_id: Option<String>,
}
