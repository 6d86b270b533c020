//! Platform data types: handles, property snapshots, and the
//! disposable wire specs consumed by clone/customize/relocate calls.

use std::fmt;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};

/// Reference to a managed object on the platform (`vm-500`,
/// `resgroup-12`, `datastore-7`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ManagedObjectRef(String);

impl ManagedObjectRef {
    /// Wrap a raw managed object id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw id string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ManagedObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ManagedObjectRef {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Opaque handle to a VM on the platform.
///
/// Valid only for the call sequence that resolved it; the
/// orchestration layer re-resolves it from the stable identifier at
/// the start of every operation rather than caching it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmHandle {
    /// Managed object id of the VM.
    pub moref: ManagedObjectRef,
    /// Inventory path of the VM at resolution time.
    pub inventory_path: String,
}

/// Power state of a VM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PowerState {
    /// VM is powered on.
    PoweredOn,
    /// VM is powered off.
    PoweredOff,
    /// VM is suspended.
    Suspended,
}

/// Guest tools run state as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ToolsStatus {
    /// Tools are running in the guest.
    Running,
    /// Tools are installed but not running.
    NotRunning,
    /// Tools are not installed.
    NotInstalled,
}

impl fmt::Display for ToolsStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "guestToolsRunning"),
            Self::NotRunning => write!(f, "guestToolsNotRunning"),
            Self::NotInstalled => write!(f, "guestToolsNotInstalled"),
        }
    }
}

/// An address reported on a guest NIC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuestIpAddress {
    /// The address itself.
    pub addr: IpAddr,
    /// Subnet prefix length.
    pub prefix_len: u8,
}

/// A virtual NIC as seen from inside the guest.
#[derive(Debug, Clone, Default)]
pub struct GuestNic {
    /// Addresses currently bound to this NIC.
    pub ip_addresses: Vec<GuestIpAddress>,
}

/// A route entry from the guest IP stack.
#[derive(Debug, Clone)]
pub struct GuestRoute {
    /// Destination network.
    pub network: IpAddr,
    /// Destination prefix length (0 for a default route).
    pub prefix_len: u8,
    /// Next-hop gateway, if any.
    pub gateway: Option<IpAddr>,
}

impl GuestRoute {
    /// Whether this is a default route carrying a gateway.
    pub fn is_default_gateway(&self) -> bool {
        self.prefix_len == 0 && self.gateway.is_some()
    }
}

/// Guest-info portion of a property snapshot.
#[derive(Debug, Clone, Default)]
pub struct GuestInfo {
    /// Tools run state, if tools have ever reported in.
    pub tools_status: Option<ToolsStatus>,
    /// Per-NIC address lists.
    pub nics: Vec<GuestNic>,
    /// Guest IP stack routes.
    pub routes: Vec<GuestRoute>,
}

impl GuestInfo {
    /// All addresses reported across NICs, in NIC order.
    pub fn all_addresses(&self) -> impl Iterator<Item = GuestIpAddress> + '_ {
        self.nics.iter().flat_map(|n| n.ip_addresses.iter().copied())
    }

    /// Gateways on default routes.
    pub fn default_gateways(&self) -> impl Iterator<Item = IpAddr> + '_ {
        self.routes
            .iter()
            .filter(|r| r.is_default_gateway())
            .filter_map(|r| r.gateway)
    }
}

/// Config portion of a property snapshot.
#[derive(Debug, Clone)]
pub struct VmConfigInfo {
    /// Display name of the VM.
    pub name: String,
    /// BIOS UUID, the stable identifier.
    pub uuid: String,
    /// VMX file path in `[datastore] path` form.
    pub vmx_file_path: String,
}

/// Runtime portion of a property snapshot.
#[derive(Debug, Clone)]
pub struct VmRuntimeInfo {
    /// Host currently running the VM.
    pub host: Option<ManagedObjectRef>,
    /// Current power state.
    pub power_state: PowerState,
}

/// Immutable property snapshot of a VM, taken at read time.
///
/// Never mutated in place; every read produces a fresh value.
#[derive(Debug, Clone)]
pub struct VmProperties {
    /// Config info.
    pub config: VmConfigInfo,
    /// Runtime info.
    pub runtime: VmRuntimeInfo,
    /// Owning resource pool, if any.
    pub resource_pool: Option<ManagedObjectRef>,
    /// Datastores backing this VM.
    pub datastores: Vec<ManagedObjectRef>,
    /// Guest info, absent until tools report in.
    pub guest: Option<GuestInfo>,
}

/// Identity and name of a datastore.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatastoreSummary {
    /// Managed object id.
    pub moref: ManagedObjectRef,
    /// Display name (the part that appears in datastore paths).
    pub name: String,
}

/// A disk entry in a clone spec.
#[derive(Debug, Clone)]
pub struct CloneDiskSpec {
    /// Disk label.
    pub label: String,
    /// Capacity in GiB.
    pub capacity_gib: u64,
    /// Datastore override; falls back to the spec-level datastore.
    pub datastore: Option<ManagedObjectRef>,
}

/// Clone submission payload. Built fresh per attempt, consumed once.
#[derive(Debug, Clone)]
pub struct CloneSpec {
    /// Name of the VM to create.
    pub name: String,
    /// Target resource pool.
    pub resource_pool: ManagedObjectRef,
    /// Target datastore for the VM configuration and default disks.
    pub datastore: ManagedObjectRef,
    /// Target host, if pinned.
    pub host: Option<ManagedObjectRef>,
    /// Disks to carry into the clone.
    pub disks: Vec<CloneDiskSpec>,
    /// Network ids for the clone's NICs.
    pub networks: Vec<ManagedObjectRef>,
    /// Source snapshot to clone from; the current state when `None`.
    pub snapshot: Option<String>,
}

/// Relocation payload. Built fresh per attempt, consumed once.
#[derive(Debug, Clone)]
pub struct RelocateSpec {
    /// Target datastore.
    pub datastore: ManagedObjectRef,
    /// Target resource pool.
    pub resource_pool: Option<ManagedObjectRef>,
    /// Target host, if pinned.
    pub host: Option<ManagedObjectRef>,
    /// Target folder.
    pub folder: Option<ManagedObjectRef>,
}

/// Guest OS family, which selects the customization identity format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsFamily {
    /// Linux guests.
    Linux,
    /// Windows guests.
    Windows,
}

/// Static network identity for one customized NIC.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CustomizationNicSetting {
    /// Static IPv4 address; DHCP when `None`.
    pub ipv4_address: Option<IpAddr>,
    /// IPv4 prefix length for a static address.
    pub ipv4_prefix_len: Option<u8>,
    /// Default gateway.
    pub gateway: Option<IpAddr>,
}

/// Guest customization payload. Built fresh per attempt, consumed once.
#[derive(Debug, Clone)]
pub struct CustomizationSpec {
    /// Identity format to apply.
    pub family: OsFamily,
    /// Host name to set inside the guest.
    pub host_name: String,
    /// DNS domain.
    pub domain: String,
    /// DNS servers.
    pub dns_servers: Vec<IpAddr>,
    /// Per-NIC network identity, positionally matched to guest NICs.
    pub nic_settings: Vec<CustomizationNicSetting>,
}

/// Outcome of an in-guest customization, as reported by platform
/// events scoped to the VM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CustomizationStatus {
    /// No terminal event observed yet.
    Pending,
    /// Customization completed in the guest.
    Succeeded,
    /// Customization failed in the guest.
    Failed(String),
}
