//! Residency statistics.

use serde::Serialize;

use crate::world::{MeshState, World};

/// Snapshot of what is resident right now.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct StreamingStats {
    pub current_sector: Option<String>,
    pub updates: u64,
    pub sectors: usize,
    pub resident_sectors: usize,
    pub loaded_meshes: usize,
    pub pending_meshes: usize,
    pub failed_meshes: usize,
    pub active_portals: usize,
    pub resident_lights: usize,
    pub ready_textures: usize,
    pub ready_materials: usize,
    pub ready_factories: usize,
}

impl StreamingStats {
    pub fn collect(world: &World, current_sector: Option<&str>, updates: u64) -> Self {
        let mut stats = Self {
            current_sector: current_sector.map(str::to_owned),
            updates,
            sectors: world.sectors().len(),
            resident_sectors: world.sectors().iter().filter(|s| s.is_resident()).count(),
            active_portals: world.portals().iter().filter(|p| p.is_active()).count(),
            resident_lights: world.lights().iter().filter(|l| l.is_resident()).count(),
            ready_textures: world.textures().iter().filter(|t| t.state.is_ready()).count(),
            ready_materials: world.materials().iter().filter(|m| m.state.is_ready()).count(),
            ready_factories: world.factories().iter().filter(|f| f.state.is_ready()).count(),
            ..Default::default()
        };
        for mesh in world.meshes() {
            match mesh.state {
                MeshState::Loaded(_) => stats.loaded_meshes += 1,
                MeshState::Pending { .. } => stats.pending_meshes += 1,
                MeshState::Failed => stats.failed_meshes += 1,
                MeshState::Unloaded => {}
            }
        }
        stats
    }
}

impl std::fmt::Display for StreamingStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "sector={} sectors={}/{} meshes={} (+{} pending) portals={} lights={} textures={}",
            self.current_sector.as_deref().unwrap_or("-"),
            self.resident_sectors,
            self.sectors,
            self.loaded_meshes,
            self.pending_meshes,
            self.active_portals,
            self.resident_lights,
            self.ready_textures,
        )
    }
}
