//! Declarative input types.
//!
//! These records are handed in by the surrounding declarative driver.
//! Fields that the original schema modeled as mutually-exclusive
//! optional pairs (`datastore_id` / `datastore_cluster_id`, clone
//! block / adopt moref) are tagged unions here, so exclusivity holds
//! by construction rather than by validation.

use std::net::IpAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use standby_platform::{CustomizationNicSetting, ManagedObjectRef, PlatformClient};

use crate::error::{err_stage, LifecycleError, Result};

/// Where the VM's configuration and default disks land.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatastorePlacement {
    /// A concrete datastore.
    Datastore(ManagedObjectRef),
    /// A datastore cluster; the platform's storage recommendation
    /// picks the concrete datastore.
    DatastoreCluster(ManagedObjectRef),
}

impl DatastorePlacement {
    /// Resolve to the concrete datastore that placement and
    /// post-migration verification use.
    pub async fn resolve(&self, client: &dyn PlatformClient) -> Result<ManagedObjectRef> {
        match self {
            Self::Datastore(ds) => Ok(ds.clone()),
            Self::DatastoreCluster(cluster) => client
                .recommended_datastore(cluster)
                .await
                .map_err(err_stage("datastore recommendation")),
        }
    }
}

/// How the standby VM comes to exist.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreationSource {
    /// Clone a new VM from a source machine.
    Clone(CloneBlock),
    /// Adopt an existing VM by its managed object id. Adopted VMs are
    /// power-cycled on delete but never destroyed.
    Adopt {
        /// Managed object id of the VM to adopt.
        moref: ManagedObjectRef,
    },
}

/// Clone details.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloneBlock {
    /// Managed object id of the source VM.
    pub source: ManagedObjectRef,
    /// Minutes to wait for the clone task.
    pub timeout_minutes: i64,
    /// Source snapshot to clone from; current state when `None`.
    pub snapshot: Option<String>,
}

impl CloneBlock {
    /// Clone block with the default 30 minute timeout.
    pub fn new(source: ManagedObjectRef) -> Self {
        Self {
            source,
            timeout_minutes: 30,
            snapshot: None,
        }
    }
}

/// Guest customization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomizeBlock {
    /// Host name to set inside the guest.
    pub host_name: String,
    /// DNS domain.
    pub domain: String,
    /// Guest id used to resolve the OS family for the identity format.
    pub guest_id: String,
    /// Minutes to wait for in-guest customization to complete.
    pub timeout_minutes: i64,
    /// DNS servers.
    pub dns_servers: Vec<IpAddr>,
    /// Per-NIC network identity.
    pub nic_settings: Vec<CustomizationNicSetting>,
}

impl CustomizeBlock {
    /// The static address the guest is being customized to, if any.
    ///
    /// The guest may briefly report an old DHCP lease after boot; the
    /// network waiters use this address to avoid succeeding on the
    /// stale one.
    pub fn static_ip(&self) -> Option<IpAddr> {
        self.nic_settings.iter().find_map(|n| n.ipv4_address)
    }
}

/// A virtual disk carried into the clone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiskInput {
    /// Disk label.
    pub label: String,
    /// Capacity in GiB.
    pub size_gib: u64,
    /// Datastore override for this disk.
    pub datastore: Option<ManagedObjectRef>,
}

/// A virtual NIC carried into the clone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkInterfaceInput {
    /// Network to attach.
    pub network: ManagedObjectRef,
}

/// Declarative input for the standby (adopt-or-clone) variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandbyConfig {
    /// Name for a cloned VM.
    pub name: String,
    /// Resource pool to place the VM in.
    pub resource_pool: ManagedObjectRef,
    /// Datastore placement.
    pub placement: DatastorePlacement,
    /// Folder path relative to the pool's inventory root.
    pub folder: Option<String>,
    /// Clone or adopt.
    pub source: CreationSource,
    /// Guest customization, if any.
    pub customize: Option<CustomizeBlock>,
    /// Disks for the clone.
    pub disks: Vec<DiskInput>,
    /// NICs for the clone.
    pub network_interfaces: Vec<NetworkInterfaceInput>,
    /// Minutes to wait for any guest IP; `<= 0` disables the wait.
    pub wait_for_guest_ip_timeout: i64,
    /// Minutes to wait for a (routable) guest network; `<= 0` disables.
    pub wait_for_guest_net_timeout: i64,
    /// Whether the network wait requires a routable address.
    pub wait_for_guest_net_routable: bool,
    /// Addresses to ignore while waiting for an IP.
    pub ignored_guest_ips: Vec<IpAddr>,
    /// Minutes to wait for graceful guest shutdown.
    pub shutdown_wait_timeout: i64,
    /// Force power-off when graceful shutdown fails or times out.
    pub force_power_off: bool,
}

impl StandbyConfig {
    /// Config with schema defaults for a given pool, placement and
    /// source.
    pub fn new(
        resource_pool: ManagedObjectRef,
        placement: DatastorePlacement,
        source: CreationSource,
    ) -> Self {
        Self {
            name: String::new(),
            resource_pool,
            placement,
            folder: None,
            source,
            customize: None,
            disks: Vec::new(),
            network_interfaces: Vec::new(),
            wait_for_guest_ip_timeout: 0,
            wait_for_guest_net_timeout: 5,
            wait_for_guest_net_routable: true,
            ignored_guest_ips: Vec::new(),
            shutdown_wait_timeout: 3,
            force_power_off: true,
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if let CreationSource::Clone(block) = &self.source {
            if self.name.is_empty() {
                return Err(LifecycleError::InvalidConfig(
                    "name is required when cloning".into(),
                ));
            }
            if block.timeout_minutes < 1 {
                return Err(LifecycleError::InvalidConfig(
                    "clone timeout must be at least 1 minute".into(),
                ));
            }
        }
        if !(1..=10).contains(&self.shutdown_wait_timeout) {
            return Err(LifecycleError::InvalidConfig(
                "shutdown_wait_timeout must be between 1 and 10 minutes".into(),
            ));
        }
        if let Some(c) = &self.customize {
            if c.timeout_minutes < 1 {
                return Err(LifecycleError::InvalidConfig(
                    "customization timeout must be at least 1 minute".into(),
                ));
            }
        }
        Ok(())
    }
}

/// Declarative input for the migrate-in-place variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrateConfig {
    /// BIOS UUID of the VM to relocate.
    pub vm_uuid: String,
    /// Target resource pool.
    pub resource_pool: ManagedObjectRef,
    /// Target datastore placement.
    pub placement: DatastorePlacement,
    /// Host to pin the VM to.
    pub host: Option<ManagedObjectRef>,
    /// Folder path relative to the pool's inventory root.
    pub folder: Option<String>,
    /// Minutes to wait for the relocation before failing.
    pub migrate_wait_timeout: i64,
    /// Addresses to ignore when selecting the guest IP on refresh.
    pub ignored_guest_ips: Vec<IpAddr>,
}

impl MigrateConfig {
    /// Config with the default 30 minute migration timeout.
    pub fn new(
        vm_uuid: impl Into<String>,
        resource_pool: ManagedObjectRef,
        placement: DatastorePlacement,
    ) -> Self {
        Self {
            vm_uuid: vm_uuid.into(),
            resource_pool,
            placement,
            host: None,
            folder: None,
            migrate_wait_timeout: 30,
            ignored_guest_ips: Vec::new(),
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.vm_uuid.is_empty() {
            return Err(LifecycleError::InvalidConfig("vm_uuid is required".into()));
        }
        if self.migrate_wait_timeout < 10 {
            return Err(LifecycleError::InvalidConfig(
                "migrate_wait_timeout must be at least 10 minutes".into(),
            ));
        }
        Ok(())
    }
}

/// Convert a minute count from declarative input into a duration.
/// Non-positive values clamp to zero, which disables the wait that
/// uses them.
pub(crate) fn minutes(m: i64) -> Duration {
    Duration::from_secs(60 * m.max(0) as u64)
}
