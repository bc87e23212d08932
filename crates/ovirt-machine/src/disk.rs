use ovirt_api::{DiskAttachmentUpdate, DiskStatus, Vm};
use tracing::{info, warn};

use crate::platform::Platform;
use crate::poll::{PollConfig, poll_until};
use crate::{Error, Result};

pub const GIB: i64 = 1 << 30;

/// What [`reconcile_boot_disk`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiskOutcome {
    Unchanged,
    /// Requested size was below the current one; shrinking is not supported.
    ShrinkSkipped { current: i64, requested: i64 },
    Extended { from: i64, to: i64 },
}

/// Grow the VM's boot disk to `size_gb`, waiting for the engine to finish.
///
/// Idempotent: a disk already at or above the requested size is left alone.
pub async fn reconcile_boot_disk(
    platform: &dyn Platform,
    vm: &Vm,
    size_gb: i64,
    poll: &PollConfig,
) -> Result<DiskOutcome> {
    let attachments = platform.list_disk_attachments(&vm.id).await?;
    let boot = attachments
        .into_iter()
        .find(|a| a.bootable)
        .ok_or_else(|| Error::MissingBootDisk {
            vm_name: vm.name.clone(),
            vm_id: vm.id.clone(),
        })?;

    let requested = size_gb
        .checked_mul(GIB)
        .ok_or_else(|| Error::build(format!("disk size of {size_gb}GB is out of range")))?;

    let disk_id = boot
        .disk
        .as_ref()
        .and_then(|d| d.id.clone())
        .unwrap_or_else(|| boot.id.clone());
    let current = platform.get_disk(&disk_id).await?.provisioned_size;

    if requested < current {
        warn!(
            vm_id = %vm.id,
            current,
            requested,
            "requested os disk size is smaller than the current one, shrinking is not supported"
        );
        return Ok(DiskOutcome::ShrinkSkipped { current, requested });
    }
    if requested == current {
        return Ok(DiskOutcome::Unchanged);
    }

    info!(vm_id = %vm.id, from = current, to = requested, "extending the os disk");
    platform
        .update_disk_attachment(
            &vm.id,
            &boot.id,
            &DiskAttachmentUpdate::provisioned_size(requested),
        )
        .await?;

    info!(vm_id = %vm.id, disk_id = %disk_id, "waiting for the os disk extension");
    poll_until(poll, "os disk extension", move || {
        let disk_id = disk_id.clone();
        async move {
            platform
                .get_disk(&disk_id)
                .await
                .map(|disk| disk.status == Some(DiskStatus::Ok))
        }
    })
    .await?;

    Ok(DiskOutcome::Extended {
        from: current,
        to: requested,
    })
}
