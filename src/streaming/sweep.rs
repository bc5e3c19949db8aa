//! Reachability sweep over active portals.
//!
//! Range checks only touch sectors the observer walks through. After a sector
//! change, anything resident that can no longer be reached from the new sector
//! through active portals is torn down here.

use std::collections::HashSet;

use crate::engine::Engine;
use crate::world::{MeshState, SectorId, World};

use super::controller::release_if_idle;

/// Sectors reachable from `start` through active portals, `start` included.
pub fn connected(world: &World, start: SectorId) -> HashSet<SectorId> {
    let mut visited = HashSet::new();
    let mut stack = vec![start];
    while let Some(sector) = stack.pop() {
        if !visited.insert(sector) {
            continue;
        }
        for portal in &world.sector(sector).portals {
            let portal = world.portal(*portal);
            if portal.is_active() && !visited.contains(&portal.target) {
                stack.push(portal.target);
            }
        }
    }
    visited
}

/// Tear down every resident sector not connected to `start`. Returns how many
/// sectors were cleared.
pub fn sweep<E: Engine + ?Sized>(world: &mut World, engine: &mut E, start: SectorId) -> usize {
    let keep = connected(world, start);
    let doomed: Vec<SectorId> = world
        .sector_ids()
        .filter(|id| !keep.contains(id))
        .filter(|id| {
            let sector = world.sector(*id);
            sector.is_resident() || sector.resident_children > 0
        })
        .collect();
    if doomed.is_empty() {
        return 0;
    }

    // Clear every doomed sector before destroying any, so portals between two
    // doomed sectors are removed while both ends still exist.
    let mut survivors = Vec::new();
    for &id in &doomed {
        clear_sector(world, engine, id, &mut survivors);
    }

    for &id in &doomed {
        let sector = world.sector_mut(id);
        debug_assert_eq!(sector.resident_children, 0);
        debug_assert_eq!(sector.inbound_portals, 0, "swept sector '{}' still targeted", sector.name);
        if let Some(handle) = sector.handle.take() {
            engine.destroy_sector(handle);
            log::info!("Sector '{}' unloaded (unreachable)", sector.name);
        }
    }

    // Kept sectors that were only held by a portal from a swept sector
    for id in survivors {
        if !doomed.contains(&id) {
            release_if_idle(world, engine, id);
        }
    }

    doomed.len()
}

/// Remove every resident child of a sector. Targets of removed portals are
/// appended to `targets`.
fn clear_sector<E: Engine + ?Sized>(world: &mut World, engine: &mut E, id: SectorId, targets: &mut Vec<SectorId>) {
    for i in 0..world.sector(id).meshes.len() {
        let mesh_id = world.sector(id).meshes[i];
        let mesh = world.mesh_mut(mesh_id);
        match mesh.state {
            MeshState::Loaded(handle) => {
                engine.detach_mesh(handle);
                mesh.state = MeshState::Unloaded;
            }
            MeshState::Pending { ticket, discard: false } => {
                mesh.state = MeshState::Pending { ticket, discard: true };
            }
            _ => continue,
        }
        world.sector_mut(id).resident_children -= 1;
    }

    for i in 0..world.sector(id).portals.len() {
        let portal = world.portal_mut(world.sector(id).portals[i]);
        let Some(handle) = portal.handle.take() else {
            continue;
        };
        engine.remove_portal(handle);
        let target = portal.target;
        world.sector_mut(id).resident_children -= 1;
        world.sector_mut(target).inbound_portals -= 1;
        targets.push(target);
    }

    for i in 0..world.sector(id).lights.len() {
        let light = world.light_mut(world.sector(id).lights[i]);
        let Some(handle) = light.handle.take() else {
            continue;
        };
        engine.remove_light(handle);
        world.sector_mut(id).resident_children -= 1;
    }

    debug_assert_eq!(world.live_children(id), 0);
}
