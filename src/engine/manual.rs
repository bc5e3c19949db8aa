//! Deterministic engine for tests, benchmarks and tools.
//!
//! Loads stay pending until the caller completes them by name, unless the engine
//! is in auto mode, where every load completes on its first poll. Every call is
//! recorded as `"<operation> <name>"` so tests can assert on ordering.

use std::collections::{BTreeSet, HashMap};

use crate::catalog::DocNode;
use crate::core::Vec3;

use super::{
    Engine, EngineHandle, FactoryRequest, LightSetup, LoadStatus, LoadTicket, MaterialBinding,
    MeshRequest, PortalSetup, SectorSetup, TextureRequest,
};

#[derive(Debug)]
struct ManualLoad {
    name: String,
    status: LoadStatus,
}

#[derive(Debug, Default)]
pub struct ManualEngine {
    next_id: u64,
    auto_complete: bool,
    loads: HashMap<LoadTicket, ManualLoad>,
    names: HashMap<EngineHandle, String>,
    sectors: BTreeSet<EngineHandle>,
    attached: BTreeSet<EngineHandle>,
    portals: BTreeSet<EngineHandle>,
    lights: BTreeSet<EngineHandle>,
    /// Recorded calls, oldest first
    pub calls: Vec<String>,
    pub shaders: Vec<String>,
    pub plugin_blocks: usize,
}

impl ManualEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine whose loads complete on first poll.
    pub fn auto() -> Self {
        Self {
            auto_complete: true,
            ..Self::default()
        }
    }

    fn next_handle(&mut self, name: &str) -> EngineHandle {
        self.next_id += 1;
        let handle = EngineHandle(self.next_id);
        self.names.insert(handle, name.to_string());
        handle
    }

    fn start_load(&mut self, op: &str, name: &str) -> LoadTicket {
        self.calls.push(format!("{} {}", op, name));
        self.next_id += 1;
        let ticket = LoadTicket(self.next_id);
        self.loads.insert(
            ticket,
            ManualLoad {
                name: name.to_string(),
                status: LoadStatus::Pending,
            },
        );
        ticket
    }

    /// Complete every pending load with this name. Returns how many completed.
    pub fn complete_named(&mut self, name: &str) -> usize {
        let tickets: Vec<LoadTicket> = self
            .loads
            .iter()
            .filter(|(_, l)| l.name == name && l.status == LoadStatus::Pending)
            .map(|(t, _)| *t)
            .collect();
        for ticket in &tickets {
            let handle = self.next_handle(name);
            if let Some(load) = self.loads.get_mut(ticket) {
                load.status = LoadStatus::Loaded(handle);
            }
        }
        tickets.len()
    }

    /// Fail every pending load with this name.
    pub fn fail_named(&mut self, name: &str, message: &str) -> usize {
        let mut failed = 0;
        for load in self.loads.values_mut() {
            if load.name == name && load.status == LoadStatus::Pending {
                load.status = LoadStatus::Failed(message.to_string());
                failed += 1;
            }
        }
        failed
    }

    pub fn complete_all(&mut self) -> usize {
        let names: BTreeSet<String> = self.pending_loads().into_iter().collect();
        names.iter().map(|n| self.complete_named(n)).sum()
    }

    /// Names of loads that have not completed, sorted.
    pub fn pending_loads(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .loads
            .values()
            .filter(|l| l.status == LoadStatus::Pending)
            .map(|l| l.name.clone())
            .collect();
        names.sort();
        names
    }

    /// Number of recorded calls equal to `call`.
    pub fn count(&self, call: &str) -> usize {
        self.calls.iter().filter(|c| *c == call).count()
    }

    /// Index of the first recorded call equal to `call`.
    pub fn position(&self, call: &str) -> Option<usize> {
        self.calls.iter().position(|c| c == call)
    }

    pub fn name_of(&self, handle: EngineHandle) -> &str {
        self.names.get(&handle).map(String::as_str).unwrap_or("?")
    }

    fn names_in(&self, set: &BTreeSet<EngineHandle>) -> Vec<String> {
        let mut names: Vec<String> = set.iter().map(|h| self.name_of(*h).to_string()).collect();
        names.sort();
        names
    }

    pub fn live_sectors(&self) -> Vec<String> {
        self.names_in(&self.sectors)
    }

    pub fn attached_meshes(&self) -> Vec<String> {
        self.names_in(&self.attached)
    }

    pub fn live_portals(&self) -> Vec<String> {
        self.names_in(&self.portals)
    }

    pub fn live_lights(&self) -> Vec<String> {
        self.names_in(&self.lights)
    }

    fn record(&mut self, op: &str, handle: EngineHandle) {
        let call = format!("{} {}", op, self.name_of(handle));
        self.calls.push(call);
    }
}

impl Engine for ManualEngine {
    fn request_texture(&mut self, request: &TextureRequest) -> LoadTicket {
        self.start_load("request_texture", &request.name)
    }

    fn request_mesh_factory(&mut self, request: &FactoryRequest) -> LoadTicket {
        self.start_load("request_factory", &request.name)
    }

    fn request_mesh(&mut self, request: &MeshRequest) -> LoadTicket {
        self.start_load("request_mesh", &request.name)
    }

    fn poll(&mut self, ticket: LoadTicket) -> LoadStatus {
        if self.auto_complete {
            let pending = self
                .loads
                .get(&ticket)
                .filter(|l| l.status == LoadStatus::Pending)
                .map(|l| l.name.clone());
            if let Some(name) = pending {
                let handle = self.next_handle(&name);
                if let Some(load) = self.loads.get_mut(&ticket) {
                    load.status = LoadStatus::Loaded(handle);
                }
            }
        }
        match self.loads.get(&ticket) {
            Some(load) => load.status.clone(),
            None => LoadStatus::Failed(format!("unknown ticket {:?}", ticket)),
        }
    }

    fn bind_material(&mut self, binding: &MaterialBinding) -> EngineHandle {
        self.calls.push(format!("bind_material {}", binding.name));
        self.next_handle(&binding.name)
    }

    fn create_sector(&mut self, setup: &SectorSetup) -> EngineHandle {
        self.calls.push(format!("create_sector {}", setup.name));
        let handle = self.next_handle(&setup.name);
        self.sectors.insert(handle);
        handle
    }

    fn destroy_sector(&mut self, sector: EngineHandle) {
        self.record("destroy_sector", sector);
        self.sectors.remove(&sector);
    }

    fn attach_mesh(&mut self, mesh: EngineHandle, sector: EngineHandle, _position: Vec3) {
        debug_assert!(self.sectors.contains(&sector), "attach into a dead sector");
        self.record("attach_mesh", mesh);
        self.attached.insert(mesh);
    }

    fn detach_mesh(&mut self, mesh: EngineHandle) {
        self.record("detach_mesh", mesh);
        self.attached.remove(&mesh);
    }

    fn release(&mut self, handle: EngineHandle) {
        self.record("release", handle);
    }

    fn create_portal(&mut self, from: EngineHandle, to: EngineHandle, setup: &PortalSetup) -> EngineHandle {
        debug_assert!(self.sectors.contains(&from) && self.sectors.contains(&to));
        self.calls.push(format!("create_portal {}", setup.name));
        let handle = self.next_handle(&setup.name);
        self.portals.insert(handle);
        handle
    }

    fn remove_portal(&mut self, portal: EngineHandle) {
        self.record("remove_portal", portal);
        self.portals.remove(&portal);
    }

    fn add_light(&mut self, sector: EngineHandle, setup: &LightSetup) -> EngineHandle {
        debug_assert!(self.sectors.contains(&sector));
        self.calls.push(format!("add_light {}", setup.name));
        let handle = self.next_handle(&setup.name);
        self.lights.insert(handle);
        handle
    }

    fn remove_light(&mut self, light: EngineHandle) {
        self.record("remove_light", light);
        self.lights.remove(&light);
    }

    fn preload_shader(&mut self, file: &str) {
        self.shaders.push(file.to_string());
    }

    fn load_plugins(&mut self, _plugins: &DocNode) {
        self.plugin_blocks += 1;
    }
}
