//! Live relocation of an existing VM.

use std::sync::Arc;
use std::time::Duration;

use standby_platform::{
    DatastorePath, ManagedObjectRef, PlatformClient, RelocateSpec, VmHandle, VmProperties,
};
use tokio::time::{sleep, Instant};

use crate::config::{minutes, MigrateConfig};
use crate::error::{err_stage, LifecycleError, Result};
use crate::tasks::wait_for_task;

/// Interval between post-relocation verification reads.
const VERIFY_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Relocates a VM to a new datastore/host/resource-pool and verifies
/// the result.
///
/// A completed relocation task is not trusted at face value: property
/// replication can lag the task result, so the orchestrator re-reads
/// properties until they corroborate the new placement, bounded by
/// the same overall timeout. A relocation that times out fails the
/// current call; the next read reconciles actual state.
#[derive(Clone)]
pub struct MigrationOrchestrator {
    client: Arc<dyn PlatformClient>,
}

impl MigrationOrchestrator {
    /// Orchestrator over the given platform client.
    pub fn new(client: Arc<dyn PlatformClient>) -> Self {
        Self { client }
    }

    /// Relocate `vm` per `config`.
    ///
    /// Returns the post-relocation property snapshot and the concrete
    /// target datastore it was verified against.
    pub async fn relocate(
        &self,
        vm: &VmHandle,
        config: &MigrateConfig,
    ) -> Result<(VmProperties, ManagedObjectRef)> {
        let deadline = minutes(config.migrate_wait_timeout);
        let start = Instant::now();

        let datastore = config.placement.resolve(self.client.as_ref()).await?;
        let target = self
            .client
            .datastore_summary(&datastore)
            .await
            .map_err(err_stage("target datastore lookup"))?;

        // The target folder is resolved relative to the destination
        // pool's inventory root, same as on the create path. Without a
        // configured folder the VM stays where it is.
        let folder = match config.folder.as_deref() {
            Some(path) => Some(
                self.client
                    .folder_for_pool(&config.resource_pool, Some(path))
                    .await
                    .map_err(err_stage("folder resolution"))?,
            ),
            None => None,
        };

        // Fresh spec per attempt, consumed once.
        let spec = RelocateSpec {
            datastore: datastore.clone(),
            resource_pool: Some(config.resource_pool.clone()),
            host: config.host.clone(),
            folder,
        };

        tracing::info!(
            vm = %vm.moref,
            datastore = %datastore,
            host = config.host.as_ref().map(|h| h.as_str()).unwrap_or("-"),
            timeout_min = config.migrate_wait_timeout,
            "Relocating virtual machine"
        );

        let task = self
            .client
            .relocate(vm, spec)
            .await
            .map_err(err_stage("relocate submit"))?;
        wait_for_task(self.client.as_ref(), &task, deadline, "relocate").await?;

        // Corroborate the task result with fresh property reads.
        loop {
            let props = self
                .client
                .properties(vm)
                .await
                .map_err(err_stage("relocate verification read"))?;

            if self.placement_confirmed(&props, &datastore, &target.name, config.host.as_ref()) {
                tracing::info!(
                    vm = %vm.moref,
                    datastore = %datastore,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Relocation verified"
                );
                return Ok((props, datastore));
            }

            if start.elapsed() >= deadline {
                return Err(LifecycleError::Timeout {
                    stage: "relocate verification",
                    elapsed: start.elapsed(),
                });
            }
            tracing::trace!(vm = %vm.moref, "Placement not yet visible, re-reading");
            sleep(VERIFY_POLL_INTERVAL).await;
        }
    }

    fn placement_confirmed(
        &self,
        props: &VmProperties,
        datastore: &ManagedObjectRef,
        datastore_name: &str,
        host: Option<&ManagedObjectRef>,
    ) -> bool {
        if !props.datastores.contains(datastore) {
            return false;
        }
        // The VMX path names the datastore the configuration actually
        // lives on, which is the authoritative signal.
        match DatastorePath::parse(&props.config.vmx_file_path) {
            Ok(dp) if dp.datastore == datastore_name => {}
            _ => return false,
        }
        match host {
            Some(want) => props.runtime.host.as_ref() == Some(want),
            None => true,
        }
    }
}
