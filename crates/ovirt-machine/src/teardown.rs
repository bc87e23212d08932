//! Stop, remove, and confirm removal of a VM.

use std::fmt;

use ovirt_api::VmStatus;
use tracing::{info, warn};

use crate::Result;
use crate::platform::Platform;
use crate::poll::{PollConfig, poll_until};

/// Teardown progress, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownStage {
    Stopping,
    Stopped,
    Removing,
    Gone,
}

impl fmt::Display for TeardownStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Removing => "removing",
            Self::Gone => "gone",
        })
    }
}

/// Stop and remove the VM, returning once the engine no longer knows it.
///
/// Every step's effect is confirmed by polling rather than by trusting the
/// call, so a VM that is already down or already gone is handled by the same
/// sequence. Only the final "gone" wait decides the result.
///
/// While waiting for `down`, read errors count as "not yet", except a 404:
/// a VM the engine no longer knows is treated as down, so deleting an
/// already removed VM does not sit out the whole stop timeout.
pub async fn delete_vm(platform: &dyn Platform, vm_id: &str, poll: &PollConfig) -> Result<()> {
    info!(vm_id, stage = %TeardownStage::Stopping, "stopping vm");
    if let Err(e) = platform.stop_vm(vm_id).await {
        warn!(vm_id, error = %e, "stop request failed, waiting for the vm to go down anyway");
    }

    let down = poll_until(poll, "vm to stop", move || async move {
        match platform.get_vm(vm_id).await {
            Ok(vm) => Ok(vm.status == Some(VmStatus::Down)),
            // A VM that no longer exists is as down as it gets.
            Err(e) if e.is_not_found() => Ok(true),
            Err(e) => Err(e),
        }
    })
    .await;
    match down {
        Ok(()) => info!(vm_id, stage = %TeardownStage::Stopped, "vm is down"),
        Err(e) => warn!(vm_id, error = %e, "vm did not report down, removing anyway"),
    }

    info!(vm_id, stage = %TeardownStage::Removing, "removing vm");
    if let Err(e) = platform.remove_vm(vm_id).await {
        warn!(vm_id, error = %e, "remove request failed, waiting for the vm to disappear anyway");
    }

    poll_until(poll, "vm to be removed", move || async move {
        Ok::<_, std::convert::Infallible>(platform.get_vm(vm_id).await.is_err())
    })
    .await?;

    info!(vm_id, stage = %TeardownStage::Gone, "vm removed");
    Ok(())
}
