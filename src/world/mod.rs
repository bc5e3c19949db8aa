//! In-memory world graph built from the catalog.
//!
//! All entities live in flat arenas addressed by typed ids. Cross references
//! (a mesh's sector, a portal's target) are ids, not pointers, and leaf assets
//! plus sectors are additionally indexed by name for resolution.

pub mod assets;
pub mod ids;
pub mod sector;

use std::collections::HashMap;

pub use assets::{LoadState, Material, MeshFactory, ShaderVar, ShaderVarValue, Texture};
pub use ids::{LightId, MaterialId, MeshFactoryId, MeshInstanceId, PortalId, SectorId, TextureId};
pub use sector::{Attenuation, Light, MeshInstance, MeshState, Portal, Sector};

/// Arena of every catalog entity plus name indices.
#[derive(Debug, Default)]
pub struct World {
    textures: Vec<Texture>,
    materials: Vec<Material>,
    factories: Vec<MeshFactory>,
    sectors: Vec<Sector>,
    meshes: Vec<MeshInstance>,
    portals: Vec<Portal>,
    lights: Vec<Light>,
    texture_names: HashMap<String, TextureId>,
    material_names: HashMap<String, MaterialId>,
    factory_names: HashMap<String, MeshFactoryId>,
    sector_names: HashMap<String, SectorId>,
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    // -- Leaf assets ------------------------------------------------------

    /// Register a texture. The caller checks for duplicates first.
    pub fn add_texture(&mut self, texture: Texture) -> TextureId {
        let id = TextureId::from_index(self.textures.len());
        self.texture_names.insert(texture.name.clone(), id);
        self.textures.push(texture);
        id
    }

    pub fn add_material(&mut self, material: Material) -> MaterialId {
        let id = MaterialId::from_index(self.materials.len());
        self.material_names.insert(material.name.clone(), id);
        self.materials.push(material);
        id
    }

    pub fn add_factory(&mut self, factory: MeshFactory) -> MeshFactoryId {
        let id = MeshFactoryId::from_index(self.factories.len());
        self.factory_names.insert(factory.name.clone(), id);
        self.factories.push(factory);
        id
    }

    pub fn find_texture(&self, name: &str) -> Option<TextureId> {
        self.texture_names.get(name).copied()
    }

    pub fn find_material(&self, name: &str) -> Option<MaterialId> {
        self.material_names.get(name).copied()
    }

    pub fn find_factory(&self, name: &str) -> Option<MeshFactoryId> {
        self.factory_names.get(name).copied()
    }

    pub fn texture(&self, id: TextureId) -> &Texture {
        &self.textures[id.index()]
    }

    pub fn texture_mut(&mut self, id: TextureId) -> &mut Texture {
        &mut self.textures[id.index()]
    }

    pub fn material(&self, id: MaterialId) -> &Material {
        &self.materials[id.index()]
    }

    pub fn material_mut(&mut self, id: MaterialId) -> &mut Material {
        &mut self.materials[id.index()]
    }

    pub fn factory(&self, id: MeshFactoryId) -> &MeshFactory {
        &self.factories[id.index()]
    }

    pub fn factory_mut(&mut self, id: MeshFactoryId) -> &mut MeshFactory {
        &mut self.factories[id.index()]
    }

    pub fn textures(&self) -> &[Texture] {
        &self.textures
    }

    pub fn materials(&self) -> &[Material] {
        &self.materials
    }

    pub fn factories(&self) -> &[MeshFactory] {
        &self.factories
    }

    pub fn texture_ids(&self) -> impl Iterator<Item = TextureId> + use<> {
        (0..self.textures.len()).map(TextureId::from_index)
    }

    // -- Sectors ----------------------------------------------------------

    pub fn find_sector(&self, name: &str) -> Option<SectorId> {
        self.sector_names.get(name).copied()
    }

    /// Look up a sector by name, creating an empty stub if it is not known yet.
    pub fn sector_or_stub(&mut self, name: &str) -> SectorId {
        if let Some(id) = self.find_sector(name) {
            return id;
        }
        let id = SectorId::from_index(self.sectors.len());
        self.sectors.push(Sector::stub(name));
        self.sector_names.insert(name.to_string(), id);
        log::trace!("Created stub sector '{}'", name);
        id
    }

    pub fn sector(&self, id: SectorId) -> &Sector {
        &self.sectors[id.index()]
    }

    pub fn sector_mut(&mut self, id: SectorId) -> &mut Sector {
        &mut self.sectors[id.index()]
    }

    pub fn sectors(&self) -> &[Sector] {
        &self.sectors
    }

    pub fn sector_ids(&self) -> impl Iterator<Item = SectorId> + use<> {
        (0..self.sectors.len()).map(SectorId::from_index)
    }

    // -- Sector children --------------------------------------------------

    /// Add a mesh instance to its sector.
    pub fn add_mesh(&mut self, mesh: MeshInstance) -> MeshInstanceId {
        let id = MeshInstanceId::from_index(self.meshes.len());
        let sector = mesh.sector;
        self.meshes.push(mesh);
        self.sectors[sector.index()].meshes.push(id);
        id
    }

    pub fn add_portal(&mut self, portal: Portal) -> PortalId {
        let id = PortalId::from_index(self.portals.len());
        let sector = portal.sector;
        self.portals.push(portal);
        self.sectors[sector.index()].portals.push(id);
        id
    }

    pub fn add_light(&mut self, light: Light) -> LightId {
        let id = LightId::from_index(self.lights.len());
        let sector = light.sector;
        self.lights.push(light);
        self.sectors[sector.index()].lights.push(id);
        id
    }

    pub fn mesh(&self, id: MeshInstanceId) -> &MeshInstance {
        &self.meshes[id.index()]
    }

    pub fn mesh_mut(&mut self, id: MeshInstanceId) -> &mut MeshInstance {
        &mut self.meshes[id.index()]
    }

    pub fn portal(&self, id: PortalId) -> &Portal {
        &self.portals[id.index()]
    }

    pub fn portal_mut(&mut self, id: PortalId) -> &mut Portal {
        &mut self.portals[id.index()]
    }

    pub fn light(&self, id: LightId) -> &Light {
        &self.lights[id.index()]
    }

    pub fn light_mut(&mut self, id: LightId) -> &mut Light {
        &mut self.lights[id.index()]
    }

    pub fn meshes(&self) -> &[MeshInstance] {
        &self.meshes
    }

    pub fn portals(&self) -> &[Portal] {
        &self.portals
    }

    pub fn lights(&self) -> &[Light] {
        &self.lights
    }

    /// Find a mesh instance by name within a sector.
    pub fn find_mesh(&self, sector: SectorId, name: &str) -> Option<MeshInstanceId> {
        self.sector(sector)
            .meshes
            .iter()
            .copied()
            .find(|id| self.mesh(*id).name == name)
    }

    pub fn find_portal(&self, sector: SectorId, name: &str) -> Option<PortalId> {
        self.sector(sector)
            .portals
            .iter()
            .copied()
            .find(|id| self.portal(*id).name == name)
    }

    pub fn find_light(&self, sector: SectorId, name: &str) -> Option<LightId> {
        self.sector(sector)
            .lights
            .iter()
            .copied()
            .find(|id| self.light(*id).name == name)
    }

    /// Children of `sector` that currently hold the sector's engine object alive.
    /// Must match `Sector::resident_children` at all times.
    pub fn live_children(&self, sector: SectorId) -> usize {
        let s = self.sector(sector);
        s.meshes.iter().filter(|id| self.mesh(**id).occupies_sector()).count()
            + s.portals.iter().filter(|id| self.portal(**id).is_active()).count()
            + s.lights.iter().filter(|id| self.light(**id).is_resident()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::DocNode;
    use crate::core::Vec3;
    use crate::engine::EngineHandle;
    use crate::math::Aabb;

    fn light(sector: SectorId, name: &str) -> Light {
        Light {
            name: name.into(),
            sector,
            position: Vec3::ZERO,
            radius: 5.0,
            color: Vec3::ONE,
            attenuation: Attenuation::Linear,
            dynamic: false,
            handle: None,
        }
    }

    #[test]
    fn test_sector_or_stub_reuses_existing() {
        let mut world = World::new();
        let a = world.sector_or_stub("A");
        let b = world.sector_or_stub("B");
        assert_ne!(a, b);
        assert_eq!(world.sector_or_stub("A"), a);
        assert_eq!(world.sectors().len(), 2);
        assert_eq!(world.find_sector("B"), Some(b));
        assert_eq!(world.find_sector("C"), None);
    }

    #[test]
    fn test_children_registered_with_sector() {
        let mut world = World::new();
        let a = world.sector_or_stub("A");
        let b = world.sector_or_stub("B");

        let lamp = world.add_light(light(a, "lamp"));
        let portal = world.add_portal(Portal {
            name: "door".into(),
            polygon: vec![Vec3::ZERO, Vec3::X],
            offset: Vec3::ZERO,
            sector: a,
            target: b,
            activation: Aabb::from_points(&[Vec3::ZERO, Vec3::X]),
            handle: None,
        });
        let mesh = world.add_mesh(MeshInstance {
            name: "rock".into(),
            source: DocNode::new("meshobj"),
            sector: a,
            position: Vec3::ZERO,
            factories: Vec::new(),
            materials: Vec::new(),
            textures: Vec::new(),
            state: MeshState::Unloaded,
        });

        assert_eq!(world.sector(a).lights, vec![lamp]);
        assert_eq!(world.sector(a).portals, vec![portal]);
        assert_eq!(world.find_mesh(a, "rock"), Some(mesh));
        assert_eq!(world.find_light(a, "lamp"), Some(lamp));
        assert_eq!(world.find_portal(a, "door"), Some(portal));
        assert!(world.sector(b).portals.is_empty());
    }

    #[test]
    fn test_live_children() {
        let mut world = World::new();
        let a = world.sector_or_stub("A");
        let lamp = world.add_light(light(a, "lamp"));
        world.add_light(light(a, "candle"));
        assert_eq!(world.live_children(a), 0);

        world.light_mut(lamp).handle = Some(EngineHandle(9));
        assert_eq!(world.live_children(a), 1);
    }
}
