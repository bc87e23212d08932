//! Structural checks on a [`MachineSpec`] before anything is created.

use ovirt_api::{AutoPinningPolicy, VmType};

use crate::platform::Platform;
use crate::spec::{HUGEPAGE_SIZES_KIB, MachineSpec};
use crate::{Error, Result};

/// Validate `spec`, collecting every violation into one [`Error::Validation`].
///
/// The only remote call is a read of the instance type, made when `spec`
/// sizes the VM by instance type and is otherwise consistent.
pub async fn validate(platform: &dyn Platform, spec: &MachineSpec) -> Result<()> {
    let mut violations = Vec::new();

    match &spec.user_data_secret {
        None => violations.push("no user data secret reference provided".to_string()),
        Some(secret) if secret.name.is_empty() => {
            violations.push("user data secret name is empty".to_string())
        }
        Some(_) => {}
    }

    match &spec.os_disk {
        None => violations.push("os_disk must be specified".to_string()),
        Some(disk) if disk.size_gb <= 0 => violations.push(format!(
            "os_disk size must be greater than 0, got {}",
            disk.size_gb
        )),
        Some(_) => {}
    }

    if spec.vm_type.is_empty() {
        violations.push("vm type must be set".to_string());
    } else if let Err(e) = spec.vm_type.parse::<VmType>() {
        violations.push(format!("{e}, expected one of server, desktop, high_performance"));
    }

    let instance_type_ok = check_sizing(spec, &mut violations);

    if !HUGEPAGE_SIZES_KIB.contains(&spec.hugepages) {
        violations.push(format!(
            "hugepages value {} is not supported, expected one of {:?}",
            spec.hugepages, HUGEPAGE_SIZES_KIB
        ));
    }

    if spec.guaranteed_memory_mb < 0 {
        violations.push(format!(
            "guaranteed memory must not be negative, got {}",
            spec.guaranteed_memory_mb
        ));
    } else if spec.guaranteed_memory_mb > spec.memory_mb {
        violations.push(format!(
            "guaranteed memory {}MB exceeds memory {}MB",
            spec.guaranteed_memory_mb, spec.memory_mb
        ));
    }

    if let Some(policy) = spec.auto_pinning_policy.as_deref().filter(|p| !p.is_empty())
        && let Err(e) = policy.parse::<AutoPinningPolicy>()
    {
        violations.push(format!(
            "{e}, expected one of disabled, existing, adjust, resize_and_pin"
        ));
    }

    if instance_type_ok
        && let Err(e) = platform.get_instance_type(&spec.instance_type_id).await
    {
        violations.push(format!(
            "instance type {} could not be found: {e}",
            spec.instance_type_id
        ));
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(Error::Validation(violations))
    }
}

/// Exactly one sizing mode: an instance type alone, or CPU and memory.
///
/// Returns true when `spec` uses a well-formed instance type, meaning the
/// type still has to be looked up.
fn check_sizing(spec: &MachineSpec, violations: &mut Vec<String>) -> bool {
    if !spec.instance_type_id.is_empty() {
        if spec.cpu.is_some() || spec.memory_mb != 0 {
            violations.push(format!(
                "instance type {} cannot be combined with explicit cpu or memory",
                spec.instance_type_id
            ));
            return false;
        }
        return true;
    }

    match &spec.cpu {
        None => violations.push("cpu must be set when no instance type is given".to_string()),
        Some(cpu) => {
            if cpu.cores <= 0 {
                violations.push(format!("cpu cores must be greater than 0, got {}", cpu.cores));
            }
            if cpu.sockets <= 0 {
                violations.push(format!("cpu sockets must be greater than 0, got {}", cpu.sockets));
            }
            if cpu.threads <= 0 {
                violations.push(format!("cpu threads must be greater than 0, got {}", cpu.threads));
            }
        }
    }
    if spec.memory_mb <= 0 {
        violations.push(format!(
            "memory must be greater than 0 when no instance type is given, got {}MB",
            spec.memory_mb
        ));
    }
    false
}
