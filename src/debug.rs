//! Debug server handler for a running [`WorldLoader`].

use sectorstream_debug::{
    DebugCommand, DebugHandler, DebugResponse, LightInfo, MeshInfo, PortalInfo, ResponseData, SectorInfo,
    StatsInfo,
};

use crate::core::Vec3;
use crate::engine::Engine;
use crate::loader::WorldLoader;
use crate::world::{MeshState, SectorId, World};

impl<E: Engine + Send + Sync + 'static> DebugHandler for WorldLoader<E> {
    fn handle_command(&mut self, cmd: DebugCommand) -> DebugResponse {
        match cmd {
            DebugCommand::Ping => DebugResponse::pong(),
            DebugCommand::GetStreamingStats => {
                let stats = self.stats();
                DebugResponse::ok(ResponseData::StreamingStats(StatsInfo {
                    current_sector: stats.current_sector,
                    updates: stats.updates,
                    sectors: stats.sectors,
                    resident_sectors: stats.resident_sectors,
                    loaded_meshes: stats.loaded_meshes,
                    pending_meshes: stats.pending_meshes,
                    failed_meshes: stats.failed_meshes,
                    active_portals: stats.active_portals,
                    resident_lights: stats.resident_lights,
                    ready_textures: stats.ready_textures,
                    ready_materials: stats.ready_materials,
                    ready_factories: stats.ready_factories,
                }))
            }
            DebugCommand::ListResidentSectors => {
                let sectors = self
                    .world()
                    .sectors()
                    .iter()
                    .filter(|s| s.is_resident())
                    .map(|s| s.name.clone())
                    .collect();
                DebugResponse::ok(ResponseData::SectorList { sectors })
            }
            DebugCommand::GetSectorInfo { name } => match self.world().find_sector(&name) {
                Some(id) => DebugResponse::ok(ResponseData::SectorInfo(sector_info(self.world(), id))),
                None => DebugResponse::error(format!("Unknown sector '{}'", name)),
            },
            DebugCommand::UpdatePosition { x, y, z, sector, force } => {
                match self.update_position(Vec3::new(x, y, z), &sector, force) {
                    Ok(()) => DebugResponse::ok(ResponseData::PositionUpdated {
                        sector: self.current_sector().map(str::to_owned),
                        updates: self.controller().updates(),
                    }),
                    Err(e) => DebugResponse::error(e.to_string()),
                }
            }
        }
    }
}

fn sector_info(world: &World, id: SectorId) -> SectorInfo {
    let sector = world.sector(id);
    SectorInfo {
        name: sector.name.clone(),
        resident: sector.is_resident(),
        stub: sector.stub,
        ambient: sector.ambient.map(|c| c.to_array()),
        resident_children: sector.resident_children,
        inbound_portals: sector.inbound_portals,
        meshes: sector
            .meshes
            .iter()
            .map(|m| {
                let mesh = world.mesh(*m);
                let state = match mesh.state {
                    MeshState::Unloaded => "unloaded",
                    MeshState::Pending { discard: false, .. } => "pending",
                    MeshState::Pending { discard: true, .. } => "discarding",
                    MeshState::Loaded(_) => "loaded",
                    MeshState::Failed => "failed",
                };
                MeshInfo {
                    name: mesh.name.clone(),
                    state: state.to_string(),
                    position: mesh.position.to_array(),
                }
            })
            .collect(),
        portals: sector
            .portals
            .iter()
            .map(|p| {
                let portal = world.portal(*p);
                PortalInfo {
                    name: portal.name.clone(),
                    target: world.sector(portal.target).name.clone(),
                    active: portal.is_active(),
                }
            })
            .collect(),
        lights: sector
            .lights
            .iter()
            .map(|l| {
                let light = world.light(*l);
                LightInfo {
                    name: light.name.clone(),
                    resident: light.is_resident(),
                    radius: light.radius,
                }
            })
            .collect(),
    }
}
