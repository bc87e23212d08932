//! Provisioning and teardown of cluster machines as oVirt VMs.
//!
//! [`MachineActuator`] turns a declarative [`MachineSpec`] into a sequence of
//! engine calls: validate, build the creation request, create, wait for the
//! VM to settle, then reconcile the boot disk, NICs, tag, affinity groups and
//! CPU auto-pinning. Teardown runs stop, wait for down, remove, wait for gone.
//!
//! The engine is reached through the [`Platform`] trait, implemented for
//! [`ovirt_api::OvirtClient`].

pub mod actuator;
pub mod affinity;
pub mod build;
pub mod disk;
pub mod guest;
pub mod nics;
pub mod pinning;
pub mod platform;
pub mod poll;
pub mod spec;
pub mod teardown;
pub mod validate;

#[cfg(test)]
pub(crate) mod testing;

use std::time::Duration;

pub use actuator::{CreateStep, Instance, MachineActuator, StepPolicy, Timeouts};
pub use ovirt_api::{AutoPinningPolicy, VmStatus, VmType};
pub use platform::Platform;
pub use poll::PollConfig;
pub use spec::{CpuSpec, DiskSpec, MachineRef, MachineSpec, NetworkInterfaceSpec, SecretRef};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("ovirt api error: {0}")]
    Api(#[from] ovirt_api::Error),

    #[error("invalid machine spec: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("failed to build vm request: {0}")]
    Build(String),

    #[error("timed out after {timeout:?} waiting for {what}")]
    Timeout { what: String, timeout: Duration },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("the VM {vm_name}({vm_id}) doesn't have a bootable disk - was the Blank template used by mistake?")]
    MissingBootDisk { vm_name: String, vm_id: String },

    #[error("invalid id: {0}")]
    InvalidId(String),

    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("missing env var: {0}")]
    MissingEnv(String),

    #[error("{step} failed: {source}")]
    Step {
        step: CreateStep,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    pub(crate) fn build(msg: impl Into<String>) -> Self {
        Self::Build(msg.into())
    }

    /// True when the failure means the looked-up object does not exist.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound(_) => true,
            Self::Api(e) => e.is_not_found(),
            Self::Step { source, .. } => source.is_not_found(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
