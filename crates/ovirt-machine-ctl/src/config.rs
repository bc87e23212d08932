use std::path::Path;

use ovirt_machine::MachineSpec;

use crate::error::{CliError, Result};

/// Read a machine spec from a JSON file in the provider-spec shape.
pub fn load_spec(path: &Path) -> Result<MachineSpec> {
    let raw = read(path)?;
    serde_json::from_slice(&raw).map_err(|source| CliError::Spec {
        path: path.to_path_buf(),
        source,
    })
}

/// Read the opaque bootstrap (ignition) payload.
pub fn load_user_data(path: &Path) -> Result<Vec<u8>> {
    read(path)
}

fn read(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })
}
