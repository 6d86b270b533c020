//! Cloning a standby VM from a source machine.

use std::sync::Arc;

use standby_platform::{
    CloneDiskSpec, CloneSpec, ManagedObjectRef, PlatformClient, PlatformError, VmHandle,
};

use crate::config::{minutes, CloneBlock, StandbyConfig};
use crate::error::{err_stage, locate_err, LifecycleError, Result};
use crate::tasks::wait_for_task;

/// Builds a one-shot clone spec from declarative inputs and submits
/// the clone, blocking until the platform reports completion or the
/// clone timeout elapses.
///
/// The target folder is resolved from the resource pool's position in
/// the inventory hierarchy, so the folder and the pool always share
/// the same root. On timeout the VM may or may not exist on the
/// platform; the caller must re-locate before deciding.
#[derive(Clone)]
pub struct CloneOrchestrator {
    client: Arc<dyn PlatformClient>,
}

impl CloneOrchestrator {
    /// Orchestrator over the given platform client.
    pub fn new(client: Arc<dyn PlatformClient>) -> Self {
        Self { client }
    }

    /// Clone a new VM per `config` and return its handle.
    pub async fn clone_vm(&self, config: &StandbyConfig, block: &CloneBlock) -> Result<VmHandle> {
        tracing::debug!(
            source = %block.source,
            name = %config.name,
            timeout_min = block.timeout_minutes,
            "Cloning virtual machine from source"
        );

        let source = self
            .client
            .find_by_moref(&block.source)
            .await
            .map_err(locate_err(block.source.as_str(), "clone source lookup"))?;

        // The VM folder must live in the same hierarchy as the
        // resource pool, so it is resolved from the pool rather than
        // taken as an absolute path.
        let folder = self
            .client
            .folder_for_pool(&config.resource_pool, config.folder.as_deref())
            .await
            .map_err(err_stage("folder resolution"))?;

        let datastore = config.placement.resolve(self.client.as_ref()).await?;
        let spec = self.build_clone_spec(config, block, datastore);

        let task = self
            .client
            .clone_vm(&source, &folder, spec)
            .await
            .map_err(err_stage("clone submit"))?;

        let result = wait_for_task(
            self.client.as_ref(),
            &task,
            minutes(block.timeout_minutes),
            "clone",
        )
        .await?;

        let moref = result.ok_or_else(|| LifecycleError::Platform {
            stage: "clone",
            source: PlatformError::InvalidRequest("clone task returned no virtual machine".into()),
        })?;

        let vm = self
            .client
            .find_by_moref(&moref)
            .await
            .map_err(err_stage("clone result lookup"))?;
        tracing::info!(vm = %vm.moref, name = %config.name, "Clone complete");
        Ok(vm)
    }

    /// Derive the disposable clone spec. Consumed exactly once; a
    /// retry builds a fresh one from current declarative input.
    fn build_clone_spec(
        &self,
        config: &StandbyConfig,
        block: &CloneBlock,
        datastore: ManagedObjectRef,
    ) -> CloneSpec {
        CloneSpec {
            name: config.name.clone(),
            resource_pool: config.resource_pool.clone(),
            datastore,
            host: None,
            disks: config
                .disks
                .iter()
                .map(|d| CloneDiskSpec {
                    label: d.label.clone(),
                    capacity_gib: d.size_gib,
                    datastore: d.datastore.clone(),
                })
                .collect(),
            networks: config
                .network_interfaces
                .iter()
                .map(|n| n.network.clone())
                .collect(),
            snapshot: block.snapshot.clone(),
        }
    }
}
