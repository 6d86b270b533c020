//! Sequencing the lifecycle components into create/delete/migrate
//! operations, with rollback on partial failure.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use standby_platform::{
    DatastorePath, PlatformClient, PlatformError, PowerState, VmHandle, VmProperties,
};
use tokio::time::{sleep, Instant};

use crate::clone::CloneOrchestrator;
use crate::config::{minutes, CreationSource, MigrateConfig, StandbyConfig};
use crate::customize::{build_customization_spec, CustomizationOutcome, CustomizationWaiter};
use crate::error::{err_stage, LifecycleError, Result};
use crate::locator::VmLocator;
use crate::migrate::MigrationOrchestrator;
use crate::netwait::{select_candidate, AddressFilter, GuestNetWaiter};
use crate::record::LifecycleRecord;

/// Interval between power-state polls during graceful shutdown.
const POWER_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Sequences locate/clone/customize/power/wait/migrate/teardown for a
/// managed VM.
///
/// The controller owns its collaborators explicitly; nothing is
/// looked up through global registries. It is also the only layer
/// that decides recoverability: a definitive not-found clears the
/// record on read and delete paths but fails create paths, and any
/// failure after a created VM exists triggers a rollback delete.
///
/// The caller guarantees at most one concurrent operation per
/// identifier.
pub struct LifecycleController {
    client: Arc<dyn PlatformClient>,
    locator: VmLocator,
    cloner: CloneOrchestrator,
    migrator: MigrationOrchestrator,
    netwait: GuestNetWaiter,
}

impl LifecycleController {
    /// Controller over the given platform client.
    pub fn new(client: Arc<dyn PlatformClient>) -> Self {
        Self {
            locator: VmLocator::new(client.clone()),
            cloner: CloneOrchestrator::new(client.clone()),
            migrator: MigrationOrchestrator::new(client.clone()),
            netwait: GuestNetWaiter::new(client.clone()),
            client,
        }
    }

    /// Create a standby VM: clone from a source or adopt an existing
    /// VM, customize, power on, and wait for guest networking.
    ///
    /// On success the record is bound to the VM's UUID and its origin
    /// (cloned versus adopted) is fixed. Any failure after the VM
    /// exists rolls the VM back via the delete path; if the rollback
    /// itself fails, the returned error carries both causes.
    pub async fn create_standby(
        &self,
        config: &StandbyConfig,
        record: &mut LifecycleRecord,
    ) -> Result<()> {
        config.validate()?;

        let (vm, created_by_clone) = match &config.source {
            CreationSource::Clone(block) => {
                let vm = self.cloner.clone_vm(config, block).await?;
                (vm, true)
            }
            // Not-found is a hard failure here: adopting requires the
            // VM to exist.
            CreationSource::Adopt { moref } => {
                tracing::debug!(moref = %moref, "Adopting existing virtual machine");
                let (vm, _) = self.locator.by_moref(moref).await?;
                (vm, false)
            }
        };

        let props = self
            .client
            .properties(&vm)
            .await
            .map_err(err_stage("property read"))?;
        record.mark_created(props.config.uuid.clone(), created_by_clone);
        tracing::info!(
            vm = %vm.moref,
            uuid = %props.config.uuid,
            created_by_clone,
            "Standby VM bound to record"
        );

        match self.bring_up(config, &vm, &props, record).await {
            Ok(()) => Ok(()),
            Err(original) => self.rollback(config, record, original).await,
        }
    }

    /// Customize, power on, and wait for the guest, refreshing the
    /// record's computed fields at the end.
    async fn bring_up(
        &self,
        config: &StandbyConfig,
        vm: &VmHandle,
        props: &VmProperties,
        record: &mut LifecycleRecord,
    ) -> Result<()> {
        let mut waiter = None;
        if let Some(customize) = &config.customize {
            let pool = props
                .resource_pool
                .clone()
                .ok_or_else(|| LifecycleError::MissingResourcePool {
                    vm: props.config.name.clone(),
                })?;
            let family = self
                .client
                .os_family(&pool, &customize.guest_id)
                .await
                .map_err(err_stage("os family lookup"))?;
            let spec = build_customization_spec(customize, family);

            // Start observing before the push so the terminal event
            // cannot slip past the waiter.
            waiter = Some(CustomizationWaiter::spawn(
                self.client.clone(),
                vm.clone(),
                minutes(customize.timeout_minutes),
            ));
            self.client
                .customize(vm, spec)
                .await
                .map_err(err_stage("customization push"))?;
            tracing::debug!(vm = %vm.moref, "Customization spec sent");
        }

        self.client
            .power_on(vm)
            .await
            .map_err(err_stage("power on"))?;
        tracing::debug!(vm = %vm.moref, "Powered on");

        if let Some(mut w) = waiter {
            match w.wait().await {
                CustomizationOutcome::Succeeded => {
                    tracing::debug!(vm = %vm.moref, "Guest customization complete");
                }
                CustomizationOutcome::Failed(message) => {
                    return Err(LifecycleError::CustomizationFailed { message });
                }
                CustomizationOutcome::TimedOut(elapsed) => {
                    return Err(LifecycleError::Timeout {
                        stage: "guest customization",
                        elapsed,
                    });
                }
                CustomizationOutcome::Platform(source) => {
                    return Err(LifecycleError::Platform {
                        stage: "customization wait",
                        source,
                    });
                }
            }
        }

        // The guest may report an old DHCP lease before picking up a
        // customized static address; waiting on the desired address
        // avoids succeeding on the stale one.
        let filter = AddressFilter {
            ignored: config.ignored_guest_ips.clone(),
            desired: config.customize.as_ref().and_then(|c| c.static_ip()),
        };
        self.netwait
            .wait_for_ip(vm, config.wait_for_guest_ip_timeout, &filter)
            .await?;
        let selected = self
            .netwait
            .wait_for_net(
                vm,
                config.wait_for_guest_net_routable,
                config.wait_for_guest_net_timeout,
                &filter,
            )
            .await?;

        let props = self
            .client
            .properties(vm)
            .await
            .map_err(err_stage("property read"))?;
        self.refresh_record(vm, &props, &config.ignored_guest_ips, record)
            .await?;
        if let Some(ip) = selected {
            record.default_ip = Some(ip);
        }
        Ok(())
    }

    /// Attempt to delete the partially-created VM, preserving the
    /// original failure either way.
    async fn rollback(
        &self,
        config: &StandbyConfig,
        record: &mut LifecycleRecord,
        original: LifecycleError,
    ) -> Result<()> {
        tracing::warn!(error = %original, "Create failed after VM exists, rolling back");
        match self.delete(config, record).await {
            Ok(()) => Err(original),
            Err(cleanup) => Err(LifecycleError::Rollback {
                original: Box::new(original),
                cleanup: Box::new(cleanup),
            }),
        }
    }

    /// Tear down the managed VM.
    ///
    /// Gracefully shuts the guest down within the configured timeout,
    /// forcing power-off when allowed. The underlying VM is destroyed
    /// only when this record created it by cloning; an adopted VM is
    /// power-cycled but never destroyed. The identifier is cleared on
    /// success regardless of path, including when the VM turns out to
    /// be already gone.
    pub async fn delete(
        &self,
        config: &StandbyConfig,
        record: &mut LifecycleRecord,
    ) -> Result<()> {
        let Some(id) = record.identifier.clone() else {
            return Ok(());
        };
        let (vm, props) = match self.locator.by_uuid(&id).await {
            Ok(found) => found,
            Err(e) if e.is_not_found() => {
                tracing::debug!(uuid = %id, "VM already gone, clearing record");
                record.clear();
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        self.graceful_power_off(
            &vm,
            &props,
            minutes(config.shutdown_wait_timeout),
            config.force_power_off,
        )
        .await?;

        if record.is_destroyable() {
            tracing::info!(vm = %vm.moref, "VM was created by cloning, destroying it");
            self.client
                .destroy(&vm)
                .await
                .map_err(err_stage("destroy"))?;
        }

        record.clear();
        tracing::info!(uuid = %id, "Delete complete");
        Ok(())
    }

    /// Relocate an existing VM in place and refresh the record from
    /// the verified post-move snapshot.
    pub async fn migrate_in_place(
        &self,
        config: &MigrateConfig,
        record: &mut LifecycleRecord,
    ) -> Result<()> {
        config.validate()?;
        // Create path: the VM must exist to be migrated.
        let (vm, _) = self.locator.by_uuid(&config.vm_uuid).await?;
        if !record.is_bound() {
            record.mark_created(config.vm_uuid.clone(), false);
        }

        let (props, _target) = self.migrator.relocate(&vm, config).await?;
        self.refresh_record(&vm, &props, &config.ignored_guest_ips, record)
            .await
    }

    /// Re-read the managed VM and refresh the record's computed
    /// fields, clearing the record when the VM is definitively gone.
    pub async fn refresh(&self, ignored: &[IpAddr], record: &mut LifecycleRecord) -> Result<()> {
        let Some(id) = record.identifier.clone() else {
            return Ok(());
        };
        match self.locator.by_uuid(&id).await {
            Ok((vm, props)) => self.refresh_record(&vm, &props, ignored, record).await,
            Err(e) if e.is_not_found() => {
                tracing::debug!(uuid = %id, "VM not found, marking record as gone");
                record.clear();
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Recompute the record's derived fields from a fresh snapshot.
    async fn refresh_record(
        &self,
        vm: &VmHandle,
        props: &VmProperties,
        ignored: &[IpAddr],
        record: &mut LifecycleRecord,
    ) -> Result<()> {
        record.moid = Some(vm.moref.as_str().to_string());
        record.reboot_required = false;
        record.tools_status = props.guest.as_ref().and_then(|g| g.tools_status);
        record.resource_pool_id = props.resource_pool.as_ref().map(|p| p.as_str().to_string());
        record.host_id = props.runtime.host.as_ref().map(|h| h.as_str().to_string());

        // vApp members live under a host path in the inventory, so
        // folder resolution is skipped for them.
        record.folder = None;
        if let Some(pool) = &props.resource_pool {
            let vapp = self
                .client
                .is_vapp_container(pool)
                .await
                .map_err(err_stage("vapp check"))?;
            if !vapp {
                record.folder = vm
                    .inventory_path
                    .rsplit_once('/')
                    .map(|(folder, _)| folder.to_string());
            }
        }

        // The backing datastore is the one whose name appears in the
        // VMX path.
        let dp = DatastorePath::parse(&props.config.vmx_file_path)
            .map_err(err_stage("vmx path parse"))?;
        let mut backing = None;
        for ds in &props.datastores {
            let summary = self
                .client
                .datastore_summary(ds)
                .await
                .map_err(err_stage("datastore lookup"))?;
            if summary.name == dp.datastore {
                backing = Some(summary.moref);
                break;
            }
        }
        let backing = backing.ok_or_else(|| LifecycleError::Platform {
            stage: "record refresh",
            source: PlatformError::NotFound {
                kind: "datastore",
                id: dp.datastore.clone(),
            },
        })?;
        record.datastore_id = Some(backing.as_str().to_string());
        record.vmx_path = Some(dp.path);

        if let Some(guest) = &props.guest {
            if let Some(candidate) =
                select_candidate(guest, &AddressFilter::ignoring(ignored.to_vec()))
            {
                record.default_ip = Some(candidate.addr);
            }
        }
        record.updated_at = Some(Utc::now());
        Ok(())
    }

    /// Shut the guest down gracefully, falling back to a hard
    /// power-off when allowed.
    async fn graceful_power_off(
        &self,
        vm: &VmHandle,
        props: &VmProperties,
        timeout: Duration,
        force: bool,
    ) -> Result<()> {
        if props.runtime.power_state == PowerState::PoweredOff {
            return Ok(());
        }

        if let Err(e) = self.client.shutdown_guest(vm).await {
            if !force {
                return Err(err_stage("guest shutdown")(e));
            }
            tracing::warn!(vm = %vm.moref, error = %e, "Graceful shutdown rejected, forcing power off");
            return self
                .client
                .power_off(vm)
                .await
                .map_err(err_stage("power off"));
        }

        let start = Instant::now();
        loop {
            let current = self
                .client
                .properties(vm)
                .await
                .map_err(err_stage("power state read"))?;
            if current.runtime.power_state == PowerState::PoweredOff {
                return Ok(());
            }
            if start.elapsed() >= timeout {
                if force {
                    tracing::warn!(vm = %vm.moref, "Graceful shutdown timed out, forcing power off");
                    return self
                        .client
                        .power_off(vm)
                        .await
                        .map_err(err_stage("power off"));
                }
                return Err(LifecycleError::Timeout {
                    stage: "guest shutdown",
                    elapsed: start.elapsed(),
                });
            }
            sleep(POWER_POLL_INTERVAL).await;
        }
    }
}
