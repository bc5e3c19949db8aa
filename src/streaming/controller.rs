//! Position-driven streaming of sectors, meshes, portals and lights.
//!
//! Objects load when the observer comes within `load_range` and unload only once
//! the observer is farther than 1.5x that, so an object on the boundary does not
//! flap. Sectors reachable through active portals are streamed before the portal
//! itself changes state.

use crate::core::{Error, Result, Vec3};
use crate::engine::{Engine, EngineHandle, LightSetup, LoadStatus, MeshRequest, PortalSetup, SectorSetup};
use crate::world::{LightId, MeshInstanceId, MeshState, PortalId, SectorId, World};

use super::config::StreamingConfig;
use super::pump::try_ready_mesh_dependencies;
use super::sweep;

/// Outcome of one step on a pending mesh.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MeshStep {
    /// Still pending; keep it queued
    Waiting,
    /// Attached to its sector
    Loaded,
    /// Left the queue without attaching (failed or discarded)
    Dropped,
}

/// Drives residency from observer position updates.
#[derive(Debug)]
pub struct StreamingController {
    config: StreamingConfig,
    /// Meshes in `MeshState::Pending`, in request order
    pending: Vec<MeshInstanceId>,
    current_sector: Option<SectorId>,
    last_position: Option<Vec3>,
    updates: u64,
}

impl StreamingController {
    pub fn new(config: StreamingConfig) -> Self {
        Self {
            config,
            pending: Vec::new(),
            current_sector: None,
            last_position: None,
            updates: 0,
        }
    }

    pub fn config(&self) -> &StreamingConfig {
        &self.config
    }

    pub fn current_sector(&self) -> Option<SectorId> {
        self.current_sector
    }

    pub fn last_position(&self) -> Option<Vec3> {
        self.last_position
    }

    /// Position updates that passed the movement gate.
    pub fn updates(&self) -> u64 {
        self.updates
    }

    pub fn pending(&self) -> &[MeshInstanceId] {
        &self.pending
    }

    /// Handle one observer position update.
    ///
    /// Pending meshes are always advanced. The rest is skipped when the observer
    /// stayed in the same sector and moved less than a tenth of the load range,
    /// unless `force` is set.
    pub fn update_position<E: Engine + ?Sized>(
        &mut self,
        world: &mut World,
        engine: &mut E,
        position: Vec3,
        sector_name: &str,
        force: bool,
    ) -> Result<()> {
        self.pump(world, engine);

        let sector = self.resolve_sector(world, sector_name)?;
        let changed = self.current_sector != Some(sector);
        if !force && !changed {
            if let Some(last) = self.last_position {
                if last.distance(position) < self.config.move_threshold() {
                    return Ok(());
                }
            }
        }

        self.stream_sector(world, engine, position, sector);

        if changed {
            let torn_down = sweep::sweep(world, engine, sector);
            if torn_down > 0 {
                log::debug!(
                    "Entered '{}', swept {} unreachable sector(s)",
                    world.sector(sector).name,
                    torn_down
                );
            }
        }

        self.current_sector = Some(sector);
        self.last_position = Some(position);
        self.updates += 1;
        Ok(())
    }

    fn resolve_sector(&self, world: &World, name: &str) -> Result<SectorId> {
        if name == self.config.holding_sector {
            return self
                .current_sector
                .ok_or_else(|| Error::UnknownSector(name.to_string()));
        }
        world
            .find_sector(name)
            .ok_or_else(|| Error::UnknownSector(name.to_string()))
    }

    /// Advance every queued mesh once.
    pub fn pump<E: Engine + ?Sized>(&mut self, world: &mut World, engine: &mut E) {
        let queue = std::mem::take(&mut self.pending);
        for mesh in queue {
            if advance_mesh(world, engine, mesh) == MeshStep::Waiting {
                self.pending.push(mesh);
            }
        }
    }

    /// Idempotent readiness for a single mesh instance. An unloaded mesh is queued
    /// and its dependencies requested; returns `true` once it is attached.
    pub fn try_ready_mesh<E: Engine + ?Sized>(
        &mut self,
        world: &mut World,
        engine: &mut E,
        mesh: MeshInstanceId,
    ) -> bool {
        let state = world.mesh(mesh).state;
        match state {
            MeshState::Loaded(_) => true,
            MeshState::Failed => false,
            MeshState::Unloaded => {
                self.begin_mesh_load(world, engine, mesh);
                false
            }
            MeshState::Pending { .. } => match advance_mesh(world, engine, mesh) {
                MeshStep::Waiting => false,
                step => {
                    self.pending.retain(|m| *m != mesh);
                    step == MeshStep::Loaded
                }
            },
        }
    }

    fn begin_mesh_load<E: Engine + ?Sized>(&mut self, world: &mut World, engine: &mut E, mesh: MeshInstanceId) {
        let sector = world.mesh(mesh).sector;
        world.mesh_mut(mesh).state = MeshState::Pending {
            ticket: None,
            discard: false,
        };
        world.sector_mut(sector).resident_children += 1;
        log::debug!("Mesh '{}' entered range", world.mesh(mesh).name);
        if advance_mesh(world, engine, mesh) == MeshStep::Waiting {
            self.pending.push(mesh);
        }
    }

    /// Stream one sector and, first, every sector behind its active portals.
    pub fn stream_sector<E: Engine + ?Sized>(
        &mut self,
        world: &mut World,
        engine: &mut E,
        position: Vec3,
        sector: SectorId,
    ) {
        if world.sector(sector).streaming {
            return;
        }
        world.sector_mut(sector).streaming = true;

        for i in 0..world.sector(sector).portals.len() {
            let portal = world.portal(world.sector(sector).portals[i]);
            if portal.is_active() {
                let target = portal.target;
                self.stream_sector(world, engine, position, target);
            }
        }

        for i in 0..world.sector(sector).meshes.len() {
            let mesh = world.sector(sector).meshes[i];
            self.stream_mesh(world, engine, position, mesh);
        }
        for i in 0..world.sector(sector).portals.len() {
            let portal = world.sector(sector).portals[i];
            self.stream_portal(world, engine, position, portal);
        }
        for i in 0..world.sector(sector).lights.len() {
            let light = world.sector(sector).lights[i];
            stream_light(world, engine, &self.config, position, light);
        }

        debug_assert_eq!(
            world.sector(sector).resident_children,
            world.live_children(sector),
            "resident child count out of sync in sector '{}'",
            world.sector(sector).name
        );

        world.sector_mut(sector).streaming = false;
        release_if_idle(world, engine, sector);
    }

    fn stream_mesh<E: Engine + ?Sized>(
        &mut self,
        world: &mut World,
        engine: &mut E,
        position: Vec3,
        id: MeshInstanceId,
    ) {
        let mesh = world.mesh(id);
        let distance = mesh.position.distance(position);
        let state = mesh.state;
        match state {
            MeshState::Unloaded if distance <= self.config.load_range => {
                self.begin_mesh_load(world, engine, id);
            }
            MeshState::Pending { ticket, discard: true } if distance <= self.config.load_range => {
                // Back in range before the discarded load finished
                let sector = mesh.sector;
                world.mesh_mut(id).state = MeshState::Pending { ticket, discard: false };
                world.sector_mut(sector).resident_children += 1;
                if !self.pending.contains(&id) {
                    self.pending.push(id);
                }
            }
            MeshState::Loaded(handle) if distance > self.config.unload_range() => {
                let sector = mesh.sector;
                log::debug!("Mesh '{}' left range", mesh.name);
                engine.detach_mesh(handle);
                world.mesh_mut(id).state = MeshState::Unloaded;
                world.sector_mut(sector).resident_children -= 1;
            }
            _ => {}
        }
    }

    fn stream_portal<E: Engine + ?Sized>(
        &mut self,
        world: &mut World,
        engine: &mut E,
        position: Vec3,
        id: PortalId,
    ) {
        let portal = world.portal(id);
        let distance = portal.activation.distance_to_point(position);
        let (owner, target, handle) = (portal.sector, portal.target, portal.handle);

        match handle {
            None if distance <= self.config.load_range => {
                self.stream_sector(world, engine, position, target);

                let from = ensure_sector_object(world, engine, owner);
                let to = ensure_sector_object(world, engine, target);
                let portal = world.portal(id);
                let setup = PortalSetup {
                    name: portal.name.clone(),
                    polygon: portal.polygon.clone(),
                    offset: portal.offset,
                };
                let handle = engine.create_portal(from, to, &setup);
                world.portal_mut(id).handle = Some(handle);
                world.sector_mut(owner).resident_children += 1;
                world.sector_mut(target).inbound_portals += 1;
                log::debug!(
                    "Portal '{}' active: '{}' -> '{}'",
                    setup.name,
                    world.sector(owner).name,
                    world.sector(target).name
                );
            }
            Some(handle) if distance > self.config.unload_range() => {
                self.stream_sector(world, engine, position, target);

                engine.remove_portal(handle);
                world.portal_mut(id).handle = None;
                world.sector_mut(owner).resident_children -= 1;
                world.sector_mut(target).inbound_portals -= 1;
                log::debug!("Portal '{}' inactive", world.portal(id).name);
                release_if_idle(world, engine, target);
            }
            _ => {}
        }
    }
}

fn stream_light<E: Engine + ?Sized>(
    world: &mut World,
    engine: &mut E,
    config: &StreamingConfig,
    position: Vec3,
    id: LightId,
) {
    let light = world.light(id);
    let distance = light.position.distance(position);
    let (sector, handle) = (light.sector, light.handle);

    match handle {
        None if distance <= config.load_range => {
            let setup = LightSetup {
                name: light.name.clone(),
                position: light.position,
                radius: light.radius,
                color: light.color,
                attenuation: light.attenuation,
                dynamic: light.dynamic,
            };
            let sector_object = ensure_sector_object(world, engine, sector);
            let handle = engine.add_light(sector_object, &setup);
            world.light_mut(id).handle = Some(handle);
            world.sector_mut(sector).resident_children += 1;
        }
        Some(handle) if distance > config.unload_range() => {
            engine.remove_light(handle);
            world.light_mut(id).handle = None;
            world.sector_mut(sector).resident_children -= 1;
        }
        _ => {}
    }
}

/// One step on a pending mesh: bring dependencies forward, issue the instantiate
/// request, or finish it.
pub fn advance_mesh<E: Engine + ?Sized>(world: &mut World, engine: &mut E, id: MeshInstanceId) -> MeshStep {
    let MeshState::Pending { ticket, discard } = world.mesh(id).state else {
        return MeshStep::Dropped;
    };

    let Some(ticket) = ticket else {
        if discard {
            world.mesh_mut(id).state = MeshState::Unloaded;
            return MeshStep::Dropped;
        }
        if !try_ready_mesh_dependencies(world, engine, id) {
            return MeshStep::Waiting;
        }
        let mesh = world.mesh(id);
        let request = MeshRequest {
            name: mesh.name.clone(),
            source: mesh.source.clone(),
            position: mesh.position,
            factories: mesh.factories.iter().map(|f| world.factory(*f).state.handle()).collect(),
            materials: mesh.materials.iter().map(|m| world.material(*m).state.handle()).collect(),
        };
        let ticket = engine.request_mesh(&request);
        world.mesh_mut(id).state = MeshState::Pending {
            ticket: Some(ticket),
            discard: false,
        };
        log::trace!("Mesh '{}' instantiate requested", request.name);
        return MeshStep::Waiting;
    };

    match engine.poll(ticket) {
        LoadStatus::Pending => MeshStep::Waiting,
        LoadStatus::Loaded(handle) if discard => {
            engine.release(handle);
            world.mesh_mut(id).state = MeshState::Unloaded;
            log::trace!("Mesh '{}' finished after its sector left, released", world.mesh(id).name);
            MeshStep::Dropped
        }
        LoadStatus::Loaded(handle) => {
            let sector = world.mesh(id).sector;
            let position = world.mesh(id).position;
            let sector_object = ensure_sector_object(world, engine, sector);
            engine.attach_mesh(handle, sector_object, position);
            world.mesh_mut(id).state = MeshState::Loaded(handle);
            log::trace!("Mesh '{}' attached", world.mesh(id).name);
            MeshStep::Loaded
        }
        LoadStatus::Failed(message) => {
            let mesh = world.mesh_mut(id);
            log::warn!("Mesh '{}' failed to load: {}", mesh.name, message);
            mesh.state = MeshState::Failed;
            let sector = mesh.sector;
            if !discard {
                world.sector_mut(sector).resident_children -= 1;
                release_if_idle(world, engine, sector);
            }
            MeshStep::Dropped
        }
    }
}

/// Engine object for a sector, created on first use.
pub(crate) fn ensure_sector_object<E: Engine + ?Sized>(
    world: &mut World,
    engine: &mut E,
    id: SectorId,
) -> EngineHandle {
    let sector = world.sector_mut(id);
    if let Some(handle) = sector.handle {
        return handle;
    }
    let setup = SectorSetup {
        name: sector.name.clone(),
        ambient: sector.ambient,
        culler: sector.culler.clone(),
    };
    let handle = engine.create_sector(&setup);
    sector.handle = Some(handle);
    log::info!("Sector '{}' loaded", sector.name);
    handle
}

/// Destroy a sector's engine object once nothing holds it and it is not mid-stream.
pub(crate) fn release_if_idle<E: Engine + ?Sized>(world: &mut World, engine: &mut E, id: SectorId) {
    let sector = world.sector_mut(id);
    if sector.streaming || sector.resident_children > 0 || sector.inbound_portals > 0 {
        return;
    }
    if let Some(handle) = sector.handle.take() {
        engine.destroy_sector(handle);
        log::info!("Sector '{}' unloaded", sector.name);
    }
}
