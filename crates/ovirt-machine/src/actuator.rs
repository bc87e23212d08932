//! Create and teardown drivers on top of a [`Platform`].

use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use ovirt_api::{Credentials, OvirtClient, Vm, VmStatus};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::affinity::bind_affinity_groups;
use crate::build::build_vm_definition;
use crate::disk::reconcile_boot_disk;
use crate::guest;
use crate::nics::reconcile_network_interfaces;
use crate::pinning::apply_auto_pinning;
use crate::platform::Platform;
use crate::poll::{PollConfig, poll_until};
use crate::spec::{MachineRef, MachineSpec};
use crate::teardown;
use crate::validate::validate;
use crate::{Error, Result};

/// Poll bounds for each wait in the create and teardown pipelines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// New VM reaching `down` after creation.
    pub create_settle: PollConfig,
    /// Boot disk leaving `locked` after a resize.
    pub disk_extend: PollConfig,
    /// Each of the two teardown waits.
    pub teardown: PollConfig,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            create_settle: PollConfig::new(Duration::from_secs(2), Duration::from_secs(60)),
            disk_extend: PollConfig::new(Duration::from_secs(10), Duration::from_secs(20 * 60)),
            teardown: PollConfig::new(Duration::from_secs(10), Duration::from_secs(5 * 60)),
        }
    }
}

/// Whether a failed create step aborts the creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepPolicy {
    Critical,
    /// Logged and absorbed; the VM is usable without the step.
    BestEffort,
}

/// Post-create steps, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateStep {
    WaitForStable,
    ResizeBootDisk,
    ReplaceNetworkInterfaces,
    Tag,
    BindAffinityGroups,
    AutoPin,
}

impl CreateStep {
    pub fn policy(self) -> StepPolicy {
        match self {
            Self::WaitForStable | Self::ResizeBootDisk | Self::ReplaceNetworkInterfaces => {
                StepPolicy::Critical
            }
            Self::Tag | Self::BindAffinityGroups | Self::AutoPin => StepPolicy::BestEffort,
        }
    }

    /// Apply this step's policy to its result.
    pub fn resolve(self, vm_id: &str, result: Result<()>) -> Result<()> {
        match (result, self.policy()) {
            (Ok(()), _) => Ok(()),
            (Err(e), StepPolicy::Critical) => Err(Error::Step {
                step: self,
                source: Box::new(e),
            }),
            (Err(e), StepPolicy::BestEffort) => {
                warn!(vm_id, step = %self, error = %e, "best-effort step failed, continuing");
                Ok(())
            }
        }
    }
}

impl fmt::Display for CreateStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::WaitForStable => "wait for the new vm to settle",
            Self::ResizeBootDisk => "boot disk resize",
            Self::ReplaceNetworkInterfaces => "network interface replacement",
            Self::Tag => "tagging",
            Self::BindAffinityGroups => "affinity group binding",
            Self::AutoPin => "cpu auto-pinning",
        })
    }
}

/// What callers get back for a VM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Instance {
    pub id: String,
    pub name: String,
    pub status: Option<VmStatus>,
    pub creation_time: Option<DateTime<Utc>>,
}

impl From<Vm> for Instance {
    fn from(vm: Vm) -> Self {
        Self {
            id: vm.id,
            name: vm.name,
            status: vm.status,
            creation_time: vm.creation_time,
        }
    }
}

/// Provisions, looks up and tears down machine VMs.
#[derive(Clone)]
pub struct MachineActuator {
    platform: Arc<dyn Platform>,
    timeouts: Timeouts,
}

impl MachineActuator {
    pub fn new(platform: Arc<dyn Platform>) -> Self {
        Self {
            platform,
            timeouts: Timeouts::default(),
        }
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Connect to the engine using env vars:
    ///
    /// - `OVIRT_URL` (required, API root)
    /// - `OVIRT_USERNAME` (required)
    /// - `OVIRT_PASSWORD` (required)
    /// - `OVIRT_CAFILE` (optional, PEM bundle)
    /// - `OVIRT_INSECURE` (optional, `true` skips certificate checks)
    ///
    /// A `.env` file is not loaded here; binaries load it at startup.
    pub fn from_env() -> Result<Self> {
        let url = required_env("OVIRT_URL")?;
        let username = required_env("OVIRT_USERNAME")?;
        let password = required_env("OVIRT_PASSWORD")?;
        let ca_file = std::env::var("OVIRT_CAFILE")
            .ok()
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);
        let insecure = std::env::var("OVIRT_INSECURE")
            .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        let client = OvirtClient::connect(&Credentials {
            url,
            username,
            password,
            ca_file,
            insecure,
        })?;
        Ok(Self::new(Arc::new(client)))
    }

    pub fn platform(&self) -> &dyn Platform {
        self.platform.as_ref()
    }

    pub async fn validate(&self, spec: &MachineSpec) -> Result<()> {
        validate(self.platform(), spec).await
    }

    /// Validate, build and create the VM, then run every post-create step.
    ///
    /// The VM is left down; start it with [`Self::start_vm`]. A critical step
    /// failure leaves the created VM in place, partially configured.
    pub async fn create_vm(
        &self,
        name: &str,
        cluster_tag: &str,
        bootstrap: &[u8],
        spec: &MachineSpec,
    ) -> Result<Instance> {
        let platform = self.platform();

        self.validate(spec).await?;
        let definition = build_vm_definition(platform, name, cluster_tag, bootstrap, spec).await?;

        info!(name, cluster_id = %spec.cluster_id, template = %spec.template_name, "creating vm");
        let vm = platform.create_vm(&definition.request).await?;
        info!(name, vm_id = %vm.id, "vm created");

        self.run_step(&vm, CreateStep::WaitForStable, self.wait_until_down(&vm.id))
            .await?;

        if let Some(disk) = &spec.os_disk {
            let resize = async {
                reconcile_boot_disk(platform, &vm, disk.size_gb, &self.timeouts.disk_extend)
                    .await
                    .map(|outcome| debug!(vm_id = %vm.id, ?outcome, "boot disk reconciled"))
            };
            self.run_step(&vm, CreateStep::ResizeBootDisk, resize).await?;
        }

        self.run_step(
            &vm,
            CreateStep::ReplaceNetworkInterfaces,
            reconcile_network_interfaces(platform, &vm.id, &spec.network_interfaces),
        )
        .await?;

        let tag = async {
            platform
                .add_tag(&vm.id, &definition.cluster_tag)
                .await
                .map(|_| ())
                .map_err(Error::from)
        };
        self.run_step(&vm, CreateStep::Tag, tag).await?;

        self.run_step(
            &vm,
            CreateStep::BindAffinityGroups,
            bind_affinity_groups(platform, &vm, &spec.cluster_id, &spec.affinity_groups_names),
        )
        .await?;

        if let Some(policy) = definition.auto_pinning {
            self.run_step(&vm, CreateStep::AutoPin, apply_auto_pinning(platform, &vm.id, policy))
                .await?;
        }

        info!(name, vm_id = %vm.id, "vm provisioned");
        Ok(vm.into())
    }

    async fn run_step<F>(&self, vm: &Vm, step: CreateStep, work: F) -> Result<()>
    where
        F: Future<Output = Result<()>>,
    {
        debug!(vm_id = %vm.id, %step, "running create step");
        step.resolve(&vm.id, work.await)
    }

    async fn wait_until_down(&self, vm_id: &str) -> Result<()> {
        let platform = self.platform();
        poll_until(&self.timeouts.create_settle, "new vm to settle", move || async move {
            platform
                .get_vm(vm_id)
                .await
                .map(|vm| vm.status == Some(VmStatus::Down))
        })
        .await
    }

    /// Stop and remove the VM; see [`teardown::delete_vm`].
    pub async fn delete_vm(&self, vm_id: &str) -> Result<()> {
        teardown::delete_vm(self.platform(), vm_id, &self.timeouts.teardown).await
    }

    pub async fn start_vm(&self, vm_id: &str) -> Result<()> {
        info!(vm_id, "starting vm");
        self.platform.start_vm(vm_id).await?;
        Ok(())
    }

    /// Find the VM backing a machine: by provider id when one is recorded,
    /// otherwise (or when that lookup fails) by name.
    pub async fn get_vm_by_machine(&self, machine: &MachineRef) -> Result<Option<Instance>> {
        if let Some(id) = machine.provider_id.as_deref().filter(|id| !id.is_empty()) {
            match self.get_vm_by_id(id).await {
                Ok(instance) => return Ok(Some(instance)),
                Err(e) => {
                    debug!(machine = %machine.name, provider_id = id, error = %e, "lookup by id failed, trying by name");
                }
            }
        }
        self.get_vm_by_name(&machine.name).await
    }

    pub async fn get_vm_by_id(&self, vm_id: &str) -> Result<Instance> {
        if vm_id.is_empty() {
            return Err(Error::InvalidId("vm id is empty".into()));
        }
        match self.platform.get_vm(vm_id).await {
            Ok(vm) => Ok(vm.into()),
            Err(e) if e.is_not_found() => Err(Error::NotFound(format!("vm {vm_id}"))),
            Err(e) => Err(e.into()),
        }
    }

    /// `None` when no VM has exactly this name.
    pub async fn get_vm_by_name(&self, name: &str) -> Result<Option<Instance>> {
        let vms = self.platform.search_vms(&format!("name={name}")).await?;
        Ok(vms.into_iter().find(|vm| vm.name == name).map(Instance::from))
    }

    pub async fn find_usable_ip(&self, vm_id: &str, excluded: &HashSet<String>) -> Result<String> {
        guest::find_usable_ip(self.platform(), vm_id, excluded).await
    }

    pub async fn engine_version(&self) -> Result<String> {
        self.platform
            .product_info()
            .await?
            .version
            .map(|v| v.to_string())
            .ok_or_else(|| Error::NotFound("engine did not report a version".into()))
    }
}

fn required_env(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| Error::MissingEnv(key.into()))
}
