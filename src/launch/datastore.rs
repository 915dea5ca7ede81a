//! Per-endpoint data directories and the pre-seeded datastore.

use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::LaunchError;

/// Location of the tunnel core's datastore inside an endpoint directory.
pub const DATASTORE_RELATIVE_PATH: &str =
    "ca.psiphon.PsiphonTunnel.tunnel-core/datastore/psiphon.boltdb";

/// `<data_dir>/data/<port>`.
pub fn endpoint_dir(data_dir: &Path, port: u16) -> PathBuf {
    data_dir.join("data").join(port.to_string())
}

/// Copies `template` into the endpoint's datastore slot unless one is already there.
///
/// Returns `Ok(true)` when a copy was made. A missing template is not an error:
/// the tunnel core simply starts with an empty datastore.
pub async fn seed_datastore(endpoint_dir: &Path, template: &Path) -> Result<bool, LaunchError> {
    let target = endpoint_dir.join(DATASTORE_RELATIVE_PATH);
    if tokio::fs::try_exists(&target).await? {
        return Ok(false);
    }
    if !tokio::fs::try_exists(template).await? {
        warn!(template = %template.display(), "datastore template not found; skipping seed");
        return Ok(false);
    }
    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::copy(template, &target).await?;
    debug!(target = %target.display(), "datastore seeded");
    Ok(true)
}

/// Deletes every endpoint directory under `<data_dir>/data`.
pub async fn remove_data(data_dir: &Path) -> io::Result<()> {
    match tokio::fs::remove_dir_all(data_dir.join("data")).await {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}
