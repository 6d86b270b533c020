//! Resolving stable identifiers to live VM handles.

use std::sync::Arc;

use standby_platform::{ManagedObjectRef, PlatformClient, VmHandle, VmProperties};

use crate::error::{err_stage, locate_err, Result};

/// Resolves a stable identifier to a VM handle plus a fresh property
/// snapshot.
///
/// Nothing is cached: every locate issues a lookup and a property
/// read, so the snapshot always reflects the platform's current view.
/// A definitive not-found is distinguished from transient lookup
/// failures so callers can clear state versus retry.
#[derive(Clone)]
pub struct VmLocator {
    client: Arc<dyn PlatformClient>,
}

impl VmLocator {
    /// Locator over the given platform client.
    pub fn new(client: Arc<dyn PlatformClient>) -> Self {
        Self { client }
    }

    /// Locate by BIOS UUID.
    pub async fn by_uuid(&self, uuid: &str) -> Result<(VmHandle, VmProperties)> {
        let handle = self
            .client
            .find_by_uuid(uuid)
            .await
            .map_err(locate_err(uuid, "uuid lookup"))?;
        self.snapshot(handle).await
    }

    /// Locate by managed object id.
    pub async fn by_moref(&self, moref: &ManagedObjectRef) -> Result<(VmHandle, VmProperties)> {
        let handle = self
            .client
            .find_by_moref(moref)
            .await
            .map_err(locate_err(moref.as_str(), "moref lookup"))?;
        self.snapshot(handle).await
    }

    async fn snapshot(&self, handle: VmHandle) -> Result<(VmHandle, VmProperties)> {
        let props = self
            .client
            .properties(&handle)
            .await
            .map_err(err_stage("property read"))?;
        tracing::debug!(
            vm = %handle.moref,
            path = %handle.inventory_path,
            uuid = %props.config.uuid,
            "Located virtual machine"
        );
        Ok((handle, props))
    }
}
