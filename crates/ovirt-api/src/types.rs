use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Error;

/// The engine renders booleans and integers as JSON strings (`"true"`,
/// `"10737418240"`). These accept either encoding.
mod lenient {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, de::Error as _};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw<T> {
        Native(T),
        Text(String),
    }

    pub fn bool<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
        match Raw::<bool>::deserialize(d)? {
            Raw::Native(b) => Ok(b),
            Raw::Text(s) => s.parse().map_err(D::Error::custom),
        }
    }

    pub fn i64<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
        match Raw::<i64>::deserialize(d)? {
            Raw::Native(n) => Ok(n),
            Raw::Text(s) => s.parse().map_err(D::Error::custom),
        }
    }

    pub fn opt_i64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
        i64(d).map(Some)
    }

    pub fn opt_millis<'de, D: Deserializer<'de>>(d: D) -> Result<Option<DateTime<Utc>>, D::Error> {
        let ms = i64(d)?;
        DateTime::from_timestamp_millis(ms)
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("timestamp out of range: {ms}")))
    }
}

// ── References ──────────────────────────────────────────────────────

/// Reference to another engine object by id and/or name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Link {
    pub fn id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            name: None,
        }
    }

    pub fn name(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: Some(name.into()),
        }
    }
}

// ── Enums ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VmStatus {
    Down,
    Up,
    ImageLocked,
    Migrating,
    NotResponding,
    Paused,
    PoweringDown,
    PoweringUp,
    RebootInProgress,
    RestoringState,
    SavingState,
    Suspended,
    WaitForLaunch,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiskStatus {
    Ok,
    Locked,
    Illegal,
    #[serde(other)]
    Unknown,
}

/// Optimisation profile the engine applies to a VM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VmType {
    Server,
    Desktop,
    HighPerformance,
}

impl VmType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Server => "server",
            Self::Desktop => "desktop",
            Self::HighPerformance => "high_performance",
        }
    }
}

impl fmt::Display for VmType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VmType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "server" => Ok(Self::Server),
            "desktop" => Ok(Self::Desktop),
            "high_performance" => Ok(Self::HighPerformance),
            other => Err(Error::InvalidValue {
                kind: "vm type",
                value: other.to_string(),
            }),
        }
    }
}

/// How the engine pins vCPUs and NUMA nodes to host resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoPinningPolicy {
    Disabled,
    Existing,
    Adjust,
    ResizeAndPin,
}

impl AutoPinningPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::Existing => "existing",
            Self::Adjust => "adjust",
            Self::ResizeAndPin => "resize_and_pin",
        }
    }

    /// Only `adjust` lets the engine rewrite the VM's CPU topology.
    pub fn optimize_cpu_settings(&self) -> bool {
        matches!(self, Self::Adjust)
    }
}

impl fmt::Display for AutoPinningPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AutoPinningPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "disabled" => Ok(Self::Disabled),
            "existing" => Ok(Self::Existing),
            "adjust" => Ok(Self::Adjust),
            "resize_and_pin" => Ok(Self::ResizeAndPin),
            other => Err(Error::InvalidValue {
                kind: "auto pinning policy",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VmAffinity {
    Migratable,
    UserMigratable,
    Pinned,
}

// ── VMs ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct Vm {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: Option<VmStatus>,
    #[serde(rename = "type", default)]
    pub vm_type: Option<VmType>,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub memory: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_millis")]
    pub creation_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub cluster: Option<Link>,
    #[serde(default)]
    pub template: Option<Link>,
    #[serde(default)]
    pub cpu: Option<Cpu>,
}

/// Creation request for `POST /vms`.
#[derive(Debug, Clone, Serialize)]
pub struct NewVm {
    pub name: String,
    pub cluster: Link,
    pub template: Link,
    pub initialization: Initialization,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub vm_type: Option<VmType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_type: Option<Link>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu: Option<Cpu>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_policy: Option<MemoryPolicy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placement_policy: Option<PlacementPolicy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_properties: Option<CustomProperties>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Initialization {
    pub host_name: String,
    pub custom_script: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cpu {
    pub topology: CpuTopology,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuTopology {
    #[serde(deserialize_with = "lenient::i64")]
    pub cores: i64,
    #[serde(deserialize_with = "lenient::i64")]
    pub sockets: i64,
    #[serde(deserialize_with = "lenient::i64")]
    pub threads: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MemoryPolicy {
    pub guaranteed: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlacementPolicy {
    pub affinity: VmAffinity,
    pub hosts: Hosts,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Hosts {
    pub host: Vec<Link>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CustomProperties {
    pub custom_property: Vec<CustomProperty>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CustomProperty {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct VmList {
    #[serde(default)]
    pub vm: Vec<Vm>,
}

/// Body for action endpoints (`start`, `stop`, `autopincpuandnumanodes`).
#[derive(Debug, Clone, Default, Serialize)]
pub struct Action {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub optimize_cpu_settings: Option<bool>,
}

// ── Disks ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct DiskAttachment {
    pub id: String,
    #[serde(default, deserialize_with = "lenient::bool")]
    pub bootable: bool,
    #[serde(default, deserialize_with = "lenient::bool")]
    pub active: bool,
    #[serde(default)]
    pub disk: Option<Link>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct DiskAttachmentList {
    #[serde(default)]
    pub disk_attachment: Vec<DiskAttachment>,
}

/// Body for `PUT /vms/{id}/diskattachments/{id}` that only touches the size.
#[derive(Debug, Clone, Serialize)]
pub struct DiskAttachmentUpdate {
    pub disk: DiskSize,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiskSize {
    pub provisioned_size: i64,
}

impl DiskAttachmentUpdate {
    pub fn provisioned_size(bytes: i64) -> Self {
        Self {
            disk: DiskSize {
                provisioned_size: bytes,
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Disk {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient::i64")]
    pub provisioned_size: i64,
    #[serde(default)]
    pub status: Option<DiskStatus>,
}

// ── NICs ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct Nic {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub vnic_profile: Option<Link>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct NicList {
    #[serde(default)]
    pub nic: Vec<Nic>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewNic {
    pub name: String,
    pub vnic_profile: Link,
}

// ── Clusters, hosts, affinity groups ────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct Cluster {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Host {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct HostList {
    #[serde(default)]
    pub host: Vec<Host>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AffinityGroup {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct AffinityGroupList {
    #[serde(default)]
    pub affinity_group: Vec<AffinityGroup>,
}

// ── Tags ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct NewTag {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Tag {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

// ── Guest reported devices ──────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct ReportedDevice {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub ips: Option<Ips>,
}

impl ReportedDevice {
    /// Addresses reported for this device, in engine order.
    pub fn addresses(&self) -> impl Iterator<Item = &str> {
        self.ips
            .iter()
            .flat_map(|ips| ips.ip.iter())
            .filter_map(|ip| ip.address.as_deref())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Ips {
    #[serde(default)]
    pub ip: Vec<Ip>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Ip {
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ReportedDeviceList {
    #[serde(default)]
    pub reported_device: Vec<ReportedDevice>,
}

// ── Instance types & product info ───────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct InstanceType {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiRoot {
    #[serde(default)]
    pub product_info: Option<ProductInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProductInfo {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<Version>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    #[serde(default, deserialize_with = "lenient::i64")]
    pub major: i64,
    #[serde(default, deserialize_with = "lenient::i64")]
    pub minor: i64,
    #[serde(default, deserialize_with = "lenient::i64")]
    pub build: i64,
    #[serde(default, deserialize_with = "lenient::i64")]
    pub revision: i64,
    #[serde(default)]
    pub full_version: Option<String>,
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.full_version {
            Some(full) => f.write_str(full),
            None => write!(
                f,
                "{}.{}.{}.{}",
                self.major, self.minor, self.build, self.revision
            ),
        }
    }
}

/// Error body the engine returns alongside non-2xx statuses.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Fault {
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
}
