use std::collections::HashSet;

use regex::Regex;
use tracing::debug;

use crate::platform::Platform;
use crate::{Error, Result};

/// Guest device names that carry the machine's routable addresses.
const ETHERNET_DEVICE: &str = r"^(eth|en)";

/// First guest-reported address on an Ethernet-like device that is not in
/// `excluded`. Read only; needs the guest agent to be reporting.
pub async fn find_usable_ip(
    platform: &dyn Platform,
    vm_id: &str,
    excluded: &HashSet<String>,
) -> Result<String> {
    let devices = platform.list_reported_devices(vm_id).await?;
    if devices.is_empty() {
        return Err(Error::NotFound(format!("cannot find NICs for vm id {vm_id}")));
    }

    let pattern = Regex::new(ETHERNET_DEVICE)?;
    for device in &devices {
        let Some(name) = device.name.as_deref() else {
            continue;
        };
        if !pattern.is_match(name) {
            debug!(vm_id, device = name, "skipping non-ethernet device");
            continue;
        }
        if let Some(address) = device.addresses().find(|a| !excluded.contains(*a)) {
            return Ok(address.to_string());
        }
    }

    Err(Error::NotFound(format!(
        "no usable ip address reported for vm id {vm_id}"
    )))
}
