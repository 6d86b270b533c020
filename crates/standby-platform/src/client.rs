//! The platform client trait.
//!
//! Implementations speak the actual wire protocol to the
//! virtualization platform. The orchestration layer only ever sees
//! this trait, which keeps it testable against an in-memory fake and
//! lets platform backends be swapped without touching the lifecycle
//! logic.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{
    CloneSpec, CustomizationSpec, CustomizationStatus, DatastoreSummary, ManagedObjectRef,
    OsFamily, RelocateSpec, VmHandle, VmProperties,
};

/// Handle to a long-running platform task (clone, relocate).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskHandle(pub String);

impl std::fmt::Display for TaskHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Poll result for a platform task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    /// Task still running.
    Running,
    /// Task finished; clone tasks carry the new VM's reference.
    Success(Option<ManagedObjectRef>),
    /// Task reported an error payload.
    Error(String),
}

/// Remote calls against the virtualization platform.
///
/// Every method is a single request/response exchange; none of them
/// retry internally. Long-running operations return a [`TaskHandle`]
/// which the caller polls via [`task_status`](Self::task_status) on
/// its own interval and timeout.
#[async_trait]
pub trait PlatformClient: Send + Sync {
    /// Resolve a VM by its BIOS UUID.
    ///
    /// # Errors
    /// `NotFound` when no VM carries the UUID; `Fault` on transient
    /// lookup failure.
    async fn find_by_uuid(&self, uuid: &str) -> Result<VmHandle>;

    /// Resolve a VM by its managed object id.
    async fn find_by_moref(&self, moref: &ManagedObjectRef) -> Result<VmHandle>;

    /// Read a fresh property snapshot for a VM.
    async fn properties(&self, vm: &VmHandle) -> Result<VmProperties>;

    /// Submit a clone of `source` into `folder` and return the task.
    async fn clone_vm(
        &self,
        source: &VmHandle,
        folder: &ManagedObjectRef,
        spec: CloneSpec,
    ) -> Result<TaskHandle>;

    /// Push a guest customization spec into the VM.
    ///
    /// The spec is applied inside the guest asynchronously; terminal
    /// outcome is observed via
    /// [`customization_status`](Self::customization_status).
    async fn customize(&self, vm: &VmHandle, spec: CustomizationSpec) -> Result<()>;

    /// Check the customization event stream scoped to `vm`.
    async fn customization_status(&self, vm: &VmHandle) -> Result<CustomizationStatus>;

    /// Power the VM on.
    async fn power_on(&self, vm: &VmHandle) -> Result<()>;

    /// Ask the guest to shut down gracefully. Returns once the request
    /// is accepted; the caller polls power state for completion.
    async fn shutdown_guest(&self, vm: &VmHandle) -> Result<()>;

    /// Hard power-off.
    async fn power_off(&self, vm: &VmHandle) -> Result<()>;

    /// Submit a relocation and return the task.
    async fn relocate(&self, vm: &VmHandle, spec: RelocateSpec) -> Result<TaskHandle>;

    /// Destroy the VM and its files.
    async fn destroy(&self, vm: &VmHandle) -> Result<()>;

    /// Poll a task submitted by this client.
    async fn task_status(&self, task: &TaskHandle) -> Result<TaskStatus>;

    // Lookup services assumed available on the platform side.

    /// Resolve the VM folder for a resource pool, optionally walking a
    /// relative folder path. The folder shares the pool's inventory
    /// root.
    async fn folder_for_pool(
        &self,
        pool: &ManagedObjectRef,
        folder_path: Option<&str>,
    ) -> Result<ManagedObjectRef>;

    /// Identity and name of a datastore.
    async fn datastore_summary(&self, datastore: &ManagedObjectRef) -> Result<DatastoreSummary>;

    /// Storage-placement recommendation: concrete datastore for a
    /// datastore cluster.
    async fn recommended_datastore(
        &self,
        cluster: &ManagedObjectRef,
    ) -> Result<ManagedObjectRef>;

    /// Guest OS family for a guest id, in the context of a pool's
    /// environment browser.
    async fn os_family(&self, pool: &ManagedObjectRef, guest_id: &str) -> Result<OsFamily>;

    /// Whether a resource pool is a vApp container. Inventory path
    /// semantics differ for vApp members, so folder resolution is
    /// skipped for them.
    async fn is_vapp_container(&self, pool: &ManagedObjectRef) -> Result<bool>;
}
