use ovirt_api::AutoPinningPolicy;
use tracing::info;

use crate::Result;
use crate::platform::Platform;

/// Ask the engine to pin the VM's vCPUs and NUMA nodes to its host.
///
/// `disabled` issues no call. `adjust` also lets the engine rewrite the CPU
/// topology; every other policy keeps the requested one.
pub async fn apply_auto_pinning(
    platform: &dyn Platform,
    vm_id: &str,
    policy: AutoPinningPolicy,
) -> Result<()> {
    if policy == AutoPinningPolicy::Disabled {
        return Ok(());
    }

    let optimize = policy.optimize_cpu_settings();
    info!(vm_id, policy = %policy, optimize, "applying cpu and numa auto-pinning");
    platform.auto_pin_cpu_and_numa_nodes(vm_id, optimize).await?;
    Ok(())
}
