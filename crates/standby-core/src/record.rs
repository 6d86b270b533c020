//! The persisted identity of a managed VM.

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use standby_platform::ToolsStatus;

/// Durable identity and last-known computed fields of a managed VM.
///
/// Created on successful create, refreshed on read, and cleared when
/// the VM is deleted or discovered missing. The `created_by_clone`
/// flag is set once at create time and never changes for the life of
/// the record: it decides whether delete may destroy the VM or only
/// power-cycle it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LifecycleRecord {
    /// Stable identifier (BIOS UUID) of the managed VM.
    pub identifier: Option<String>,
    created_by_clone: bool,
    /// Managed object id.
    pub moid: Option<String>,
    /// Resource pool id.
    pub resource_pool_id: Option<String>,
    /// Host id.
    pub host_id: Option<String>,
    /// Datastore id backing the VM configuration.
    pub datastore_id: Option<String>,
    /// VMX path relative to the datastore root.
    pub vmx_path: Option<String>,
    /// Folder holding the VM, absent for vApp members.
    pub folder: Option<String>,
    /// Address selected for provisioning.
    pub default_ip: Option<IpAddr>,
    /// Guest tools state at last read.
    pub tools_status: Option<ToolsStatus>,
    /// Whether a pending configuration change needs a reboot. Reset
    /// on every read.
    pub reboot_required: bool,
    /// Last refresh time.
    pub updated_at: Option<DateTime<Utc>>,
}

impl LifecycleRecord {
    /// Empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind this record to a VM at create time.
    pub fn mark_created(&mut self, uuid: impl Into<String>, created_by_clone: bool) {
        self.identifier = Some(uuid.into());
        self.created_by_clone = created_by_clone;
    }

    /// Whether delete may destroy the underlying VM. Only VMs this
    /// record created by cloning are destroyable; adopted VMs are
    /// power-cycled but never destroyed.
    pub fn is_destroyable(&self) -> bool {
        self.created_by_clone
    }

    /// Whether the record is bound to a VM.
    pub fn is_bound(&self) -> bool {
        self.identifier.is_some()
    }

    /// Reset the identifier and computed fields, marking the VM gone.
    pub fn clear(&mut self) {
        let created_by_clone = self.created_by_clone;
        *self = Self {
            created_by_clone,
            ..Self::default()
        };
    }
}
