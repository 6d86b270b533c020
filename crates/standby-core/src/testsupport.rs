//! Scriptable in-memory platform client for tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::net::IpAddr;
use std::sync::Mutex;

use async_trait::async_trait;
use standby_platform::{
    CloneSpec, CustomizationSpec, CustomizationStatus, DatastoreSummary, GuestInfo,
    GuestIpAddress, GuestNic, GuestRoute, ManagedObjectRef, OsFamily, PlatformClient,
    PlatformError, RelocateSpec, TaskHandle, TaskStatus, ToolsStatus, VmConfigInfo, VmHandle,
    VmProperties, VmRuntimeInfo,
};
use standby_platform::{PowerState, Result};

/// Guest snapshot with a single address and no routes.
pub fn guest_with_ip(addr: IpAddr, prefix_len: u8) -> GuestInfo {
    GuestInfo {
        tools_status: Some(ToolsStatus::Running),
        nics: vec![GuestNic {
            ip_addresses: vec![GuestIpAddress { addr, prefix_len }],
        }],
        routes: Vec::new(),
    }
}

/// Guest snapshot with one address and a default route via `gateway`.
pub fn guest_with_ip_and_gateway(addr: IpAddr, prefix_len: u8, gateway: IpAddr) -> GuestInfo {
    let mut guest = guest_with_ip(addr, prefix_len);
    guest.routes.push(GuestRoute {
        network: "0.0.0.0".parse().unwrap(),
        prefix_len: 0,
        gateway: Some(gateway),
    });
    guest
}

struct FakeVm {
    moref: String,
    uuid: String,
    name: String,
    power: PowerState,
    pool: Option<String>,
    host: Option<String>,
    datastores: Vec<String>,
    vmx: String,
    guest: Option<GuestInfo>,
    guest_script: VecDeque<GuestInfo>,
    // pre-relocation view served for the next N property reads
    stale_view: Option<(Vec<String>, String, Option<String>)>,
    stale_reads: u32,
}

#[derive(Default)]
struct State {
    vms: HashMap<String, FakeVm>,
    datastores: HashMap<String, String>,
    clusters: HashMap<String, String>,
    tasks: HashMap<String, TaskStatus>,
    next_task: u64,
    next_clone: u64,
    tasks_never_complete: bool,
    customization_events: VecDeque<CustomizationStatus>,
    customize_sent: Vec<String>,
    fail_customize: Option<String>,
    fail_customization_status: Option<String>,
    fail_destroy: Option<String>,
    fail_shutdown: bool,
    shutdown_hangs: bool,
    destroyed: Vec<String>,
    forced_off: Vec<String>,
    vapp_pools: HashSet<String>,
    stale_reads_after_relocate: HashMap<String, u32>,
    relocated_into: Vec<(String, String)>,
}

/// In-memory `PlatformClient` with scriptable failures and guest-info
/// sequences.
///
/// Cloned VMs get deterministic identifiers: the n-th clone is
/// `vm-clone-n` with UUID `uuid-clone-n`.
pub struct FakePlatform {
    state: Mutex<State>,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
        }
    }

    pub fn add_datastore(&self, moref: &str, name: &str) {
        self.state
            .lock()
            .unwrap()
            .datastores
            .insert(moref.into(), name.into());
    }

    pub fn add_datastore_cluster(&self, cluster: &str, recommended: &str) {
        self.state
            .lock()
            .unwrap()
            .clusters
            .insert(cluster.into(), recommended.into());
    }

    /// Add a powered-on VM whose VMX lives on its first datastore.
    pub fn add_vm(&self, moref: &str, uuid: &str, name: &str, datastores: &[&str]) {
        let mut state = self.state.lock().unwrap();
        let ds_name = datastores
            .first()
            .and_then(|d| state.datastores.get(*d).cloned())
            .unwrap_or_else(|| "ds".into());
        state.vms.insert(
            moref.into(),
            FakeVm {
                moref: moref.into(),
                uuid: uuid.into(),
                name: name.into(),
                power: PowerState::PoweredOn,
                pool: Some("resgroup-1".into()),
                host: Some("host-1".into()),
                datastores: datastores.iter().map(|d| d.to_string()).collect(),
                vmx: format!("[{ds_name}] {name}/{name}.vmx"),
                guest: None,
                guest_script: VecDeque::new(),
                stale_view: None,
                stale_reads: 0,
            },
        );
    }

    pub fn set_guest_info(&self, moref: &str, guest: GuestInfo) {
        let mut state = self.state.lock().unwrap();
        if let Some(vm) = state.vms.get_mut(moref) {
            vm.guest = Some(guest);
            vm.guest_script.clear();
        }
    }

    /// Serve these guest snapshots on successive property reads; the
    /// last one sticks.
    pub fn script_guest_info(&self, moref: &str, snapshots: Vec<GuestInfo>) {
        let mut state = self.state.lock().unwrap();
        if let Some(vm) = state.vms.get_mut(moref) {
            vm.guest_script = snapshots.into();
        }
    }

    pub fn set_vm_pool(&self, moref: &str, pool: &str) {
        let mut state = self.state.lock().unwrap();
        if let Some(vm) = state.vms.get_mut(moref) {
            vm.pool = Some(pool.into());
        }
    }

    pub fn add_vapp_pool(&self, pool: &str) {
        self.state.lock().unwrap().vapp_pools.insert(pool.into());
    }

    pub fn push_customization_status(&self, status: CustomizationStatus) {
        self.state
            .lock()
            .unwrap()
            .customization_events
            .push_back(status);
    }

    pub fn set_fail_customize(&self, message: &str) {
        self.state.lock().unwrap().fail_customize = Some(message.into());
    }

    /// Customization status reads fail with a fault carrying
    /// `message`.
    pub fn set_fail_customization_status(&self, message: &str) {
        self.state.lock().unwrap().fail_customization_status = Some(message.into());
    }

    pub fn set_fail_destroy(&self, message: &str) {
        self.state.lock().unwrap().fail_destroy = Some(message.into());
    }

    pub fn set_fail_shutdown(&self, fail: bool) {
        self.state.lock().unwrap().fail_shutdown = fail;
    }

    /// Guest accepts the shutdown request but never powers off.
    pub fn set_shutdown_hangs(&self, hangs: bool) {
        self.state.lock().unwrap().shutdown_hangs = hangs;
    }

    pub fn set_tasks_never_complete(&self, stuck: bool) {
        self.state.lock().unwrap().tasks_never_complete = stuck;
    }

    /// After a relocation of `moref`, serve the pre-move view for the
    /// next `reads` property reads.
    pub fn set_stale_reads_after_relocate(&self, moref: &str, reads: u32) {
        self.state
            .lock()
            .unwrap()
            .stale_reads_after_relocate
            .insert(moref.into(), reads);
    }

    pub fn was_destroyed(&self, moref: &str) -> bool {
        self.state
            .lock()
            .unwrap()
            .destroyed
            .iter()
            .any(|m| m == moref)
    }

    pub fn destroy_count(&self) -> usize {
        self.state.lock().unwrap().destroyed.len()
    }

    pub fn was_forced_off(&self, moref: &str) -> bool {
        self.state
            .lock()
            .unwrap()
            .forced_off
            .iter()
            .any(|m| m == moref)
    }

    pub fn customize_sent_to(&self, moref: &str) -> bool {
        self.state
            .lock()
            .unwrap()
            .customize_sent
            .iter()
            .any(|m| m == moref)
    }

    pub fn vm_power(&self, moref: &str) -> Option<PowerState> {
        self.state.lock().unwrap().vms.get(moref).map(|vm| vm.power)
    }

    /// Folder the most recent relocation of `moref` targeted, if it
    /// carried one.
    pub fn relocated_to_folder(&self, moref: &str) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .relocated_into
            .iter()
            .rev()
            .find(|(m, _)| m == moref)
            .map(|(_, folder)| folder.clone())
    }

    fn handle_for(vm: &FakeVm) -> VmHandle {
        VmHandle {
            moref: ManagedObjectRef::new(vm.moref.clone()),
            inventory_path: format!("/dc1/vm/{}", vm.name),
        }
    }

    fn new_task(state: &mut State, status: TaskStatus) -> TaskHandle {
        state.next_task += 1;
        let id = format!("task-{}", state.next_task);
        state.tasks.insert(id.clone(), status);
        TaskHandle(id)
    }
}

impl Default for FakePlatform {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PlatformClient for FakePlatform {
    async fn find_by_uuid(&self, uuid: &str) -> Result<VmHandle> {
        let state = self.state.lock().unwrap();
        state
            .vms
            .values()
            .find(|vm| vm.uuid == uuid)
            .map(Self::handle_for)
            .ok_or_else(|| PlatformError::vm_not_found(uuid))
    }

    async fn find_by_moref(&self, moref: &ManagedObjectRef) -> Result<VmHandle> {
        let state = self.state.lock().unwrap();
        state
            .vms
            .get(moref.as_str())
            .map(Self::handle_for)
            .ok_or_else(|| PlatformError::vm_not_found(moref.as_str()))
    }

    async fn properties(&self, vm: &VmHandle) -> Result<VmProperties> {
        let mut state = self.state.lock().unwrap();
        let fake = state
            .vms
            .get_mut(vm.moref.as_str())
            .ok_or_else(|| PlatformError::vm_not_found(vm.moref.as_str()))?;

        if let Some(next) = fake.guest_script.pop_front() {
            fake.guest = Some(next);
        }

        let (datastores, vmx, host) = if fake.stale_reads > 0 {
            fake.stale_reads -= 1;
            let (ds, vmx, host) = fake
                .stale_view
                .clone()
                .unwrap_or((fake.datastores.clone(), fake.vmx.clone(), fake.host.clone()));
            if fake.stale_reads == 0 {
                fake.stale_view = None;
            }
            (ds, vmx, host)
        } else {
            (fake.datastores.clone(), fake.vmx.clone(), fake.host.clone())
        };

        Ok(VmProperties {
            config: VmConfigInfo {
                name: fake.name.clone(),
                uuid: fake.uuid.clone(),
                vmx_file_path: vmx,
            },
            runtime: VmRuntimeInfo {
                host: host.map(ManagedObjectRef::new),
                power_state: fake.power,
            },
            resource_pool: fake.pool.clone().map(ManagedObjectRef::new),
            datastores: datastores.into_iter().map(ManagedObjectRef::new).collect(),
            guest: fake.guest.clone(),
        })
    }

    async fn clone_vm(
        &self,
        _source: &VmHandle,
        _folder: &ManagedObjectRef,
        spec: CloneSpec,
    ) -> Result<TaskHandle> {
        let mut state = self.state.lock().unwrap();
        if state.tasks_never_complete {
            return Ok(Self::new_task(&mut state, TaskStatus::Running));
        }
        state.next_clone += 1;
        let moref = format!("vm-clone-{}", state.next_clone);
        let uuid = format!("uuid-clone-{}", state.next_clone);
        let ds_name = state
            .datastores
            .get(spec.datastore.as_str())
            .cloned()
            .unwrap_or_else(|| "ds".into());
        state.vms.insert(
            moref.clone(),
            FakeVm {
                moref: moref.clone(),
                uuid,
                name: spec.name.clone(),
                power: PowerState::PoweredOff,
                pool: Some(spec.resource_pool.as_str().to_string()),
                host: None,
                datastores: vec![spec.datastore.as_str().to_string()],
                vmx: format!("[{ds_name}] {0}/{0}.vmx", spec.name),
                guest: None,
                guest_script: VecDeque::new(),
                stale_view: None,
                stale_reads: 0,
            },
        );
        let result = Some(ManagedObjectRef::new(moref));
        Ok(Self::new_task(&mut state, TaskStatus::Success(result)))
    }

    async fn customize(&self, vm: &VmHandle, _spec: CustomizationSpec) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(message) = state.fail_customize.clone() {
            return Err(PlatformError::InvalidRequest(message));
        }
        let moref = vm.moref.as_str().to_string();
        state.customize_sent.push(moref);
        Ok(())
    }

    async fn customization_status(&self, _vm: &VmHandle) -> Result<CustomizationStatus> {
        let mut state = self.state.lock().unwrap();
        if let Some(message) = state.fail_customization_status.clone() {
            return Err(PlatformError::Fault(message));
        }
        Ok(state
            .customization_events
            .pop_front()
            .unwrap_or(CustomizationStatus::Pending))
    }

    async fn power_on(&self, vm: &VmHandle) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let fake = state
            .vms
            .get_mut(vm.moref.as_str())
            .ok_or_else(|| PlatformError::vm_not_found(vm.moref.as_str()))?;
        fake.power = PowerState::PoweredOn;
        Ok(())
    }

    async fn shutdown_guest(&self, vm: &VmHandle) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_shutdown {
            return Err(PlatformError::Fault("guest tools not running".into()));
        }
        if state.shutdown_hangs {
            return Ok(());
        }
        let fake = state
            .vms
            .get_mut(vm.moref.as_str())
            .ok_or_else(|| PlatformError::vm_not_found(vm.moref.as_str()))?;
        fake.power = PowerState::PoweredOff;
        Ok(())
    }

    async fn power_off(&self, vm: &VmHandle) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let moref = vm.moref.as_str().to_string();
        let fake = state
            .vms
            .get_mut(&moref)
            .ok_or_else(|| PlatformError::vm_not_found(&moref))?;
        fake.power = PowerState::PoweredOff;
        state.forced_off.push(moref);
        Ok(())
    }

    async fn relocate(&self, vm: &VmHandle, spec: RelocateSpec) -> Result<TaskHandle> {
        let mut state = self.state.lock().unwrap();
        if state.tasks_never_complete {
            return Ok(Self::new_task(&mut state, TaskStatus::Running));
        }
        let moref = vm.moref.as_str().to_string();
        if let Some(folder) = &spec.folder {
            state
                .relocated_into
                .push((moref.clone(), folder.as_str().to_string()));
        }
        let stale = state.stale_reads_after_relocate.remove(&moref).unwrap_or(0);
        let ds_name = state
            .datastores
            .get(spec.datastore.as_str())
            .cloned()
            .unwrap_or_else(|| "ds".into());
        let fake = state
            .vms
            .get_mut(&moref)
            .ok_or_else(|| PlatformError::vm_not_found(&moref))?;
        if stale > 0 {
            fake.stale_view = Some((
                fake.datastores.clone(),
                fake.vmx.clone(),
                fake.host.clone(),
            ));
            fake.stale_reads = stale;
        }
        fake.datastores = vec![spec.datastore.as_str().to_string()];
        fake.vmx = format!("[{ds_name}] {0}/{0}.vmx", fake.name);
        if let Some(host) = &spec.host {
            fake.host = Some(host.as_str().to_string());
        }
        if let Some(pool) = &spec.resource_pool {
            fake.pool = Some(pool.as_str().to_string());
        }
        Ok(Self::new_task(&mut state, TaskStatus::Success(None)))
    }

    async fn destroy(&self, vm: &VmHandle) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(message) = state.fail_destroy.clone() {
            return Err(PlatformError::Fault(message));
        }
        let moref = vm.moref.as_str().to_string();
        state
            .vms
            .remove(&moref)
            .ok_or_else(|| PlatformError::vm_not_found(&moref))?;
        state.destroyed.push(moref);
        Ok(())
    }

    async fn task_status(&self, task: &TaskHandle) -> Result<TaskStatus> {
        let state = self.state.lock().unwrap();
        state
            .tasks
            .get(&task.0)
            .cloned()
            .ok_or_else(|| PlatformError::InvalidRequest(format!("unknown task {task}")))
    }

    async fn folder_for_pool(
        &self,
        pool: &ManagedObjectRef,
        folder_path: Option<&str>,
    ) -> Result<ManagedObjectRef> {
        Ok(ManagedObjectRef::new(match folder_path {
            Some(path) => format!("folder-{pool}/{path}"),
            None => format!("folder-{pool}"),
        }))
    }

    async fn datastore_summary(&self, datastore: &ManagedObjectRef) -> Result<DatastoreSummary> {
        let state = self.state.lock().unwrap();
        state
            .datastores
            .get(datastore.as_str())
            .map(|name| DatastoreSummary {
                moref: datastore.clone(),
                name: name.clone(),
            })
            .ok_or_else(|| PlatformError::NotFound {
                kind: "datastore",
                id: datastore.as_str().to_string(),
            })
    }

    async fn recommended_datastore(&self, cluster: &ManagedObjectRef) -> Result<ManagedObjectRef> {
        let state = self.state.lock().unwrap();
        state
            .clusters
            .get(cluster.as_str())
            .map(|ds| ManagedObjectRef::new(ds.clone()))
            .ok_or_else(|| PlatformError::NotFound {
                kind: "datastore cluster",
                id: cluster.as_str().to_string(),
            })
    }

    async fn os_family(&self, _pool: &ManagedObjectRef, _guest_id: &str) -> Result<OsFamily> {
        Ok(OsFamily::Linux)
    }

    async fn is_vapp_container(&self, pool: &ManagedObjectRef) -> Result<bool> {
        Ok(self.state.lock().unwrap().vapp_pools.contains(pool.as_str()))
    }
}
