//! Catalog ingestion and dependency resolution.
//!
//! Turns a parsed catalog into the [`World`] graph. Named references are resolved
//! against everything ingested so far. Sector references may point forward: an
//! unknown sector name creates an empty stub that a later `sector` node fills in.
//! Any other unknown name is a hard error.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::core::{Error, Result, Vec2, Vec3};
use crate::engine::Engine;
use crate::math::Aabb;
use crate::streaming::config::GfxFeatures;
use crate::world::{
    Attenuation, Light, LoadState, Material, MaterialId, MeshFactory, MeshFactoryId, MeshInstance,
    MeshState, Portal, SectorId, ShaderVar, ShaderVarValue, Texture, TextureId, World,
};

use super::DocNode;

/// Counts of what one ingestion added.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CatalogSummary {
    pub textures: usize,
    pub materials: usize,
    pub factories: usize,
    pub sectors: usize,
    pub meshes: usize,
    pub portals: usize,
    pub lights: usize,
    pub libraries: usize,
    pub shaders: usize,
    pub plugin_blocks: usize,
    /// Leaf assets skipped because the name was already known
    pub duplicates: usize,
}

/// Ingests catalog documents into a [`World`].
///
/// Keeps track of library files already ingested so a shared library included by
/// several catalogs is read once.
#[derive(Debug)]
pub struct CatalogResolver {
    features: GfxFeatures,
    base_dir: PathBuf,
    libraries: HashSet<PathBuf>,
}

impl CatalogResolver {
    /// `base_dir` resolves relative `library` and `paramsfile` paths.
    pub fn new(features: GfxFeatures, base_dir: impl Into<PathBuf>) -> Self {
        Self {
            features,
            base_dir: base_dir.into(),
            libraries: HashSet::new(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn set_base_dir(&mut self, base_dir: impl Into<PathBuf>) {
        self.base_dir = base_dir.into();
    }

    /// Read a catalog file and ingest it. Relative paths inside resolve against the
    /// file's directory.
    pub fn ingest_file<E: Engine + ?Sized>(
        &mut self,
        world: &mut World,
        engine: &mut E,
        path: &Path,
    ) -> Result<CatalogSummary> {
        let doc = DocNode::parse_file(path)?;
        let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let previous = std::mem::replace(&mut self.base_dir, dir);
        let result = self.ingest(world, engine, &doc);
        self.base_dir = previous;
        result
    }

    /// Ingest a catalog root (`world` or `library`).
    pub fn ingest<E: Engine + ?Sized>(
        &mut self,
        world: &mut World,
        engine: &mut E,
        root: &DocNode,
    ) -> Result<CatalogSummary> {
        let mut summary = CatalogSummary::default();
        self.ingest_node(world, engine, root, &mut summary)?;

        let stubs = world.sectors().iter().filter(|s| s.stub).count();
        log::info!(
            "Catalog '{}': {} textures, {} materials, {} factories, {} sectors, {} meshes, {} portals, {} lights ({} libraries)",
            root.attr("name").unwrap_or(&root.name),
            summary.textures,
            summary.materials,
            summary.factories,
            summary.sectors,
            summary.meshes,
            summary.portals,
            summary.lights,
            summary.libraries,
        );
        if stubs > 0 {
            log::debug!("{} sector(s) referenced but not defined", stubs);
        }
        Ok(summary)
    }

    fn ingest_node<E: Engine + ?Sized>(
        &mut self,
        world: &mut World,
        engine: &mut E,
        node: &DocNode,
        summary: &mut CatalogSummary,
    ) -> Result<()> {
        // Libraries first so their assets can be referenced below
        for library in node.children_named("library") {
            self.ingest_library(world, engine, library, summary)?;
        }

        for plugins in node.children_named("plugins") {
            engine.load_plugins(plugins);
            summary.plugin_blocks += 1;
        }

        for shaders in node.children_named("shaders") {
            for shader in shaders.children_named("shader") {
                if let Some(file) = shader.child("file").and_then(DocNode::text) {
                    engine.preload_shader(file);
                    summary.shaders += 1;
                }
            }
        }

        for textures in node.children_named("textures") {
            for texture in textures.children_named("texture") {
                self.ingest_texture(world, texture, summary)?;
            }
        }

        for materials in node.children_named("materials") {
            for material in materials.children_named("material") {
                self.ingest_material(world, material, summary)?;
            }
        }

        for factory in node.children_named("meshfact") {
            self.ingest_factory(world, factory, summary)?;
        }

        for sector in node.children_named("sector") {
            self.ingest_sector(world, sector, summary)?;
        }

        Ok(())
    }

    fn ingest_library<E: Engine + ?Sized>(
        &mut self,
        world: &mut World,
        engine: &mut E,
        library: &DocNode,
        summary: &mut CatalogSummary,
    ) -> Result<()> {
        if !library.children.is_empty() {
            summary.libraries += 1;
            return self.ingest_node(world, engine, library, summary);
        }

        let file = library.require_text()?;
        let path = self.base_dir.join(file);
        if !self.libraries.insert(path.clone()) {
            log::debug!("Library '{}' already ingested", path.display());
            return Ok(());
        }

        log::debug!("Ingesting library '{}'", path.display());
        let doc = DocNode::parse_file(&path)?;
        let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let previous = std::mem::replace(&mut self.base_dir, dir);
        let result = self.ingest_node(world, engine, &doc, summary);
        self.base_dir = previous;
        summary.libraries += 1;
        result
    }

    // -- Leaf assets ------------------------------------------------------

    fn ingest_texture(&self, world: &mut World, node: &DocNode, summary: &mut CatalogSummary) -> Result<()> {
        let name = node.require_name()?;
        if world.find_texture(name).is_some() {
            log::debug!("Texture '{}' already defined, skipping", name);
            summary.duplicates += 1;
            return Ok(());
        }

        let file = node.child("file").and_then(DocNode::text).map(str::to_owned);
        let class = node
            .attr("class")
            .or_else(|| node.child("class").and_then(DocNode::text))
            .map(str::to_owned);

        world.add_texture(Texture {
            name: name.to_string(),
            file,
            class,
            source: node.clone(),
            state: LoadState::Unloaded,
        });
        summary.textures += 1;
        Ok(())
    }

    fn ingest_material(&self, world: &mut World, node: &DocNode, summary: &mut CatalogSummary) -> Result<()> {
        let name = node.require_name()?;
        if world.find_material(name).is_some() {
            log::debug!("Material '{}' already defined, skipping", name);
            summary.duplicates += 1;
            return Ok(());
        }

        let mut shaders = Vec::new();
        let mut shader_vars = Vec::new();
        let mut textures = Vec::new();

        if let Some(diffuse) = node.child("texture") {
            let texture_name = diffuse.require_text()?;
            push_unique(&mut textures, resolve_texture(world, texture_name, name)?);
            shader_vars.push(ShaderVar {
                name: "tex diffuse".to_string(),
                value: ShaderVarValue::Texture(texture_name.to_string()),
            });
        }

        for shader in node.children_named("shader") {
            let slot = shader
                .attr("type")
                .ok_or_else(|| Error::catalog("shader", format!("shader in material '{}' has no type", name)))?;
            shaders.push((slot.to_string(), shader.require_text()?.to_string()));
        }

        for var in node.children_named("shadervar") {
            let var_name = var.require_name()?;
            let Some(var_type) = var.attr("type") else {
                return Err(Error::catalog(
                    "shadervar",
                    format!("shadervar '{}' in material '{}' has no type", var_name, name),
                ));
            };
            match var_type {
                "texture" => {
                    if !self.features.allows(var_name) {
                        log::trace!("Material '{}': '{}' disabled by gfx features", name, var_name);
                        continue;
                    }
                    let texture_name = var.require_text()?;
                    push_unique(&mut textures, resolve_texture(world, texture_name, name)?);
                    shader_vars.push(ShaderVar {
                        name: var_name.to_string(),
                        value: ShaderVarValue::Texture(texture_name.to_string()),
                    });
                }
                "vector2" => {
                    shader_vars.push(ShaderVar {
                        name: var_name.to_string(),
                        value: ShaderVarValue::Vector2(parse_vector2(var)?),
                    });
                }
                other => {
                    log::warn!(
                        "Material '{}': shadervar '{}' has unsupported type '{}', skipped",
                        name,
                        var_name,
                        other
                    );
                }
            }
        }

        world.add_material(Material {
            name: name.to_string(),
            shaders,
            shader_vars,
            textures,
            state: LoadState::Unloaded,
        });
        summary.materials += 1;
        Ok(())
    }

    fn ingest_factory(&self, world: &mut World, node: &DocNode, summary: &mut CatalogSummary) -> Result<()> {
        let name = node.require_name()?;
        if world.find_factory(name).is_some() {
            log::debug!("Mesh factory '{}' already defined, skipping", name);
            summary.duplicates += 1;
            return Ok(());
        }

        let mut material_names: Vec<&str> = Vec::new();
        if let Some(params) = node.child("params") {
            for submesh in params.children_prefixed("submesh") {
                for material in submesh.children_named("material") {
                    material_names.push(material.require_text()?);
                }
            }
            if let Some(cells) = params.child("cells") {
                if let Some(base) = cells.path("celldefault/basematerial") {
                    material_names.push(base.require_text()?);
                }
                for cell in cells.children_prefixed("cell").filter(|c| c.name != "celldefault") {
                    let Some(feeder) = cell.child("feederproperties") else {
                        continue;
                    };
                    for alphamap in feeder.children_named("alphamap") {
                        if let Some(material) = alphamap.attr("material") {
                            material_names.push(material);
                        }
                    }
                }
            }
        }

        let mut materials = Vec::new();
        for material in material_names {
            push_unique(&mut materials, resolve_material(world, material, name)?);
        }

        world.add_factory(MeshFactory {
            name: name.to_string(),
            source: node.clone(),
            materials,
            state: LoadState::Unloaded,
        });
        summary.factories += 1;
        Ok(())
    }

    // -- Sectors ----------------------------------------------------------

    fn ingest_sector(&self, world: &mut World, node: &DocNode, summary: &mut CatalogSummary) -> Result<()> {
        let name = node.require_name()?;
        let id = world.sector_or_stub(name);

        let sector = world.sector_mut(id);
        if sector.stub {
            sector.stub = false;
            summary.sectors += 1;
        } else {
            log::debug!("Merging into existing sector '{}'", name);
        }
        if let Some(culler) = node.child("cullerp").and_then(DocNode::text) {
            sector.culler = Some(culler.to_string());
        }
        if let Some(ambient) = node.child("ambient") {
            sector.ambient = Some(ambient.color_attrs()?);
        }

        for mesh in node.children_named("meshobj") {
            self.ingest_mesh(world, id, mesh)?;
            summary.meshes += 1;
        }
        for portals in node.children_named("portals") {
            for portal in portals.children_named("portal") {
                self.ingest_portal(world, id, portal)?;
                summary.portals += 1;
            }
        }
        for light in node.children_named("light") {
            self.ingest_light(world, id, light)?;
            summary.lights += 1;
        }
        Ok(())
    }

    fn ingest_mesh(&self, world: &mut World, sector: SectorId, node: &DocNode) -> Result<()> {
        let name = node.require_name()?;
        if world.find_mesh(sector, name).is_some() {
            return Err(duplicate("meshobj", name, world, sector));
        }

        let position = match node.path("move/v") {
            Some(v) => v.vec3_attrs()?,
            None => Vec3::ZERO,
        };
        let params = self.mesh_params(node)?;
        let source = with_params(node, &params);

        let mut factories: Vec<MeshFactoryId> = Vec::new();
        for factory in params.children_named("factory") {
            let factory_name = factory.require_text()?;
            let id = world.find_factory(factory_name).ok_or_else(|| dangling("meshfact", factory_name, name))?;
            push_unique(&mut factories, id);
        }
        if factories.is_empty() {
            return Err(Error::catalog("meshobj", format!("'{}' has no params/factory", name)));
        }

        let mut material_names: Vec<&str> = Vec::new();
        let mut texture_names: Vec<&str> = Vec::new();
        for submesh in params.children_prefixed("submesh") {
            for material in submesh.children_named("material") {
                material_names.push(material.require_text()?);
            }
            self.collect_texture_vars(submesh, &mut texture_names)?;
        }
        for material in params.children_named("material") {
            material_names.push(material.require_text()?);
        }
        if let Some(palette) = params.child("materialpalette") {
            for material in palette.children_prefixed("material") {
                material_names.push(material.require_text()?);
            }
        }
        if let Some(cells) = params.child("cells") {
            for cell in cells.children_prefixed("cell").filter(|c| c.name != "celldefault") {
                if let Some(render) = cell.child("renderproperties") {
                    self.collect_texture_vars(render, &mut texture_names)?;
                }
            }
        }

        let mut materials: Vec<MaterialId> = Vec::new();
        for material in material_names {
            push_unique(&mut materials, resolve_material(world, material, name)?);
        }
        let mut textures: Vec<TextureId> = Vec::new();
        for texture in texture_names {
            push_unique(&mut textures, resolve_texture(world, texture, name)?);
        }

        world.add_mesh(MeshInstance {
            name: name.to_string(),
            source,
            sector,
            position,
            factories,
            materials,
            textures,
            state: MeshState::Unloaded,
        });
        Ok(())
    }

    /// Inline `params` with any `paramsfile` children appended.
    fn mesh_params(&self, node: &DocNode) -> Result<DocNode> {
        let mut params = node.child("params").cloned().unwrap_or_else(|| DocNode::new("params"));
        if let Some(file) = node.child("paramsfile") {
            let path = self.base_dir.join(file.require_text()?);
            let doc = DocNode::parse_file(&path)?;
            let external = if doc.name == "params" {
                doc
            } else {
                doc.child("params").cloned().ok_or_else(|| {
                    Error::catalog("paramsfile", format!("'{}' has no <params>", path.display()))
                })?
            };
            params.children.extend(external.children);
        }
        Ok(params)
    }

    fn collect_texture_vars<'a>(&self, node: &'a DocNode, out: &mut Vec<&'a str>) -> Result<()> {
        for var in node.children_named("shadervar") {
            if var.attr("type") != Some("texture") {
                continue;
            }
            if !self.features.allows(var.attr("name").unwrap_or_default()) {
                continue;
            }
            out.push(var.require_text()?);
        }
        Ok(())
    }

    fn ingest_portal(&self, world: &mut World, sector: SectorId, node: &DocNode) -> Result<()> {
        let name = node.require_name()?;
        if world.find_portal(sector, name).is_some() {
            return Err(duplicate("portal", name, world, sector));
        }

        let vertices = node
            .children_named("v")
            .map(DocNode::vec3_attrs)
            .collect::<Result<Vec<Vec3>>>()?;
        if vertices.len() < 2 {
            return Err(Error::catalog(
                "portal",
                format!("'{}' needs at least 2 <v> nodes, found {}", name, vertices.len()),
            ));
        }
        // The last two vertices are reserved
        let polygon = vertices[..vertices.len() - 2].to_vec();
        if polygon.is_empty() {
            log::warn!("Portal '{}' has an empty polygon and can never activate", name);
        }

        let offset = match node.child("ww") {
            Some(ww) => ww.vec3_attrs()?,
            None => Vec3::ZERO,
        };
        let target_name = node.require_child("sector")?.require_text()?;
        let target = world.sector_or_stub(target_name);

        world.add_portal(Portal {
            name: name.to_string(),
            activation: Aabb::from_points(&polygon).translated(offset),
            polygon,
            offset,
            sector,
            target,
            handle: None,
        });
        Ok(())
    }

    fn ingest_light(&self, world: &mut World, sector: SectorId, node: &DocNode) -> Result<()> {
        let name = node.require_name()?;
        if world.find_light(sector, name).is_some() {
            return Err(duplicate("light", name, world, sector));
        }

        let attenuation = match node.child("attenuation").and_then(DocNode::text) {
            Some(text) => text.parse::<Attenuation>()?,
            None => Attenuation::default(),
        };
        let position = node.require_child("center")?.vec3_attrs()?;
        let radius = node.require_child("radius")?.f32_text()?;
        let color = node.require_child("color")?.color_attrs()?;

        world.add_light(Light {
            name: name.to_string(),
            sector,
            position,
            radius,
            color,
            attenuation,
            dynamic: node.child("dynamic").is_some(),
            handle: None,
        });
        Ok(())
    }
}

fn push_unique<T: PartialEq>(list: &mut Vec<T>, item: T) {
    if !list.contains(&item) {
        list.push(item);
    }
}

fn dangling(kind: &'static str, name: &str, from: &str) -> Error {
    Error::DanglingReference {
        kind,
        name: name.to_string(),
        from: from.to_string(),
    }
}

fn duplicate(kind: &'static str, name: &str, world: &World, sector: SectorId) -> Error {
    Error::DuplicateName {
        kind,
        name: name.to_string(),
        sector: world.sector(sector).name.clone(),
    }
}

fn resolve_texture(world: &World, name: &str, from: &str) -> Result<TextureId> {
    world.find_texture(name).ok_or_else(|| dangling("texture", name, from))
}

fn resolve_material(world: &World, name: &str, from: &str) -> Result<MaterialId> {
    world.find_material(name).ok_or_else(|| dangling("material", name, from))
}

/// `"x,y"` content of a vector2 shader variable.
fn parse_vector2(node: &DocNode) -> Result<Vec2> {
    let text = node.require_text()?;
    let mut parts = text.split(',').map(|p| p.trim().parse::<f32>());
    match (parts.next(), parts.next(), parts.next()) {
        (Some(Ok(x)), Some(Ok(y)), None) => Ok(Vec2::new(x, y)),
        _ => Err(Error::catalog("shadervar", format!("bad vector2 value '{}'", text))),
    }
}

/// Copy of a meshobj node whose `params` child is replaced by the merged params.
fn with_params(node: &DocNode, params: &DocNode) -> DocNode {
    let mut source = DocNode {
        name: node.name.clone(),
        attributes: node.attributes.clone(),
        text: node.text.clone(),
        children: Vec::with_capacity(node.children.len() + 1),
    };
    for child in &node.children {
        if child.name != "params" && child.name != "paramsfile" {
            source.children.push(child.clone());
        }
    }
    source.children.push(params.clone());
    source
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ManualEngine;

    const BASE: &str = r#"
        <world>
          <plugins><plugin name="thing">x.y.z</plugin></plugins>
          <shaders><shader><file>/shader/terrain.xml</file></shader></shaders>
          <textures>
            <texture name="stone"><file>stone.png</file><class>item</class></texture>
            <texture name="stone_n"><file>stone_n.png</file></texture>
          </textures>
          <materials>
            <material name="rock">
              <texture>stone</texture>
              <shader type="standard">lighting_default</shader>
              <shadervar name="tex normal" type="texture">stone_n</shadervar>
              <shadervar name="tex scale" type="vector2">2,0.5</shadervar>
              <shadervar name="glow" type="float">1.0</shadervar>
            </material>
          </materials>
          <meshfact name="boulder">
            <params><submesh><material>rock</material></submesh></params>
          </meshfact>
          <sector name="A">
            <ambient red="1" green="1" blue="1"/>
            <cullerp>frustvis</cullerp>
            <meshobj name="boulder1">
              <move><v x="10" y="0" z="0"/></move>
              <params><factory>boulder</factory></params>
            </meshobj>
            <portals>
              <portal name="P">
                <v x="0" y="0" z="0"/><v x="0" y="1" z="0"/>
                <v x="1" y="1" z="0"/><v x="1" y="0" z="0"/>
                <v x="9" y="9" z="9"/><v x="9" y="9" z="9"/>
                <ww x="0" y="0" z="5"/>
                <sector>B</sector>
              </portal>
            </portals>
            <light name="lamp">
              <center x="1" y="2" z="3"/>
              <radius>15</radius>
              <color red="1" green="0.8" blue="0.6"/>
              <attenuation>Realistic</attenuation>
              <dynamic/>
            </light>
          </sector>
          <sector name="B"/>
        </world>"#;

    fn ingest(xml: &str, features: GfxFeatures) -> Result<(World, ManualEngine, CatalogSummary)> {
        let mut world = World::new();
        let mut engine = ManualEngine::new();
        let mut resolver = CatalogResolver::new(features, ".");
        let summary = resolver.ingest(&mut world, &mut engine, &DocNode::parse_str(xml)?)?;
        Ok((world, engine, summary))
    }

    #[test]
    fn test_full_catalog() {
        let (world, engine, summary) = ingest(BASE, GfxFeatures::empty()).unwrap();
        assert_eq!(summary.textures, 2);
        assert_eq!(summary.materials, 1);
        assert_eq!(summary.factories, 1);
        assert_eq!(summary.sectors, 2);
        assert_eq!((summary.meshes, summary.portals, summary.lights), (1, 1, 1));
        assert_eq!(engine.shaders, vec!["/shader/terrain.xml".to_string()]);
        assert_eq!(engine.plugin_blocks, 1);

        let a = world.find_sector("A").unwrap();
        let sector = world.sector(a);
        assert_eq!(sector.ambient, Some(Vec3::ONE));
        assert_eq!(sector.culler.as_deref(), Some("frustvis"));

        let stone = world.find_texture("stone").unwrap();
        assert_eq!(world.texture(stone).class.as_deref(), Some("item"));
        assert_eq!(world.texture(stone).file.as_deref(), Some("stone.png"));

        let mesh = world.mesh(world.find_mesh(a, "boulder1").unwrap());
        assert_eq!(mesh.position, Vec3::new(10.0, 0.0, 0.0));
        assert_eq!(mesh.factories, vec![world.find_factory("boulder").unwrap()]);
    }

    #[test]
    fn test_material_vars_and_gating() {
        let (world, _, _) = ingest(BASE, GfxFeatures::empty()).unwrap();
        let rock = world.material(world.find_material("rock").unwrap());
        assert_eq!(rock.shaders, vec![("standard".to_string(), "lighting_default".to_string())]);
        // Normal map gated off, unknown type skipped
        let names: Vec<&str> = rock.shader_vars.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["tex diffuse", "tex scale"]);
        assert_eq!(rock.shader_vars[1].value, ShaderVarValue::Vector2(Vec2::new(2.0, 0.5)));
        assert_eq!(rock.textures.len(), 1);

        let (world, _, _) = ingest(BASE, GfxFeatures::NORMAL_MAP).unwrap();
        let rock = world.material(world.find_material("rock").unwrap());
        assert_eq!(rock.textures.len(), 2);
        assert!(rock.shader_vars.iter().any(|v| v.name == "tex normal"));
    }

    #[test]
    fn test_portal_polygon_and_forward_stub() {
        let xml = r#"
            <world>
              <sector name="A">
                <portals>
                  <portal name="P">
                    <v x="0" y="0" z="0"/><v x="0" y="1" z="0"/>
                    <v x="1" y="1" z="0"/><v x="1" y="0" z="0"/>
                    <v x="9" y="9" z="9"/><v x="9" y="9" z="9"/>
                    <ww x="0" y="0" z="5"/>
                    <sector>Later</sector>
                  </portal>
                </portals>
              </sector>
            </world>"#;
        let (world, _, summary) = ingest(xml, GfxFeatures::empty()).unwrap();
        assert_eq!(summary.sectors, 1);

        let a = world.find_sector("A").unwrap();
        let portal = world.portal(world.find_portal(a, "P").unwrap());
        assert_eq!(portal.polygon.len(), 4);
        assert_eq!(portal.activation.min, Vec3::new(0.0, 0.0, 5.0));
        assert_eq!(portal.activation.max, Vec3::new(1.0, 1.0, 5.0));

        let target = world.sector(portal.target);
        assert_eq!(target.name, "Later");
        assert!(target.stub);
        assert!(target.meshes.is_empty());
    }

    #[test]
    fn test_stub_filled_by_later_definition() {
        let (world, _, _) = ingest(BASE, GfxFeatures::empty()).unwrap();
        let b = world.find_sector("B").unwrap();
        assert!(!world.sector(b).stub);
        assert_eq!(world.sectors().len(), 2);
    }

    #[test]
    fn test_light_fields() {
        let (world, _, _) = ingest(BASE, GfxFeatures::empty()).unwrap();
        let a = world.find_sector("A").unwrap();
        let lamp = world.light(world.find_light(a, "lamp").unwrap());
        assert_eq!(lamp.position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(lamp.radius, 15.0);
        assert_eq!(lamp.attenuation, Attenuation::Realistic);
        assert!(lamp.dynamic);
    }

    #[test]
    fn test_dangling_reference_is_error() {
        let xml = r#"<world><materials><material name="m"><texture>nope</texture></material></materials></world>"#;
        let err = ingest(xml, GfxFeatures::empty()).unwrap_err();
        assert!(matches!(err, Error::DanglingReference { kind: "texture", .. }));
    }

    #[test]
    fn test_mesh_without_factory_is_error() {
        let xml = r#"<world><sector name="A"><meshobj name="m"><params/></meshobj></sector></world>"#;
        let err = ingest(xml, GfxFeatures::empty()).unwrap_err();
        assert!(matches!(err, Error::Catalog { .. }));
    }

    #[test]
    fn test_light_without_center_is_error() {
        let xml = r#"<world><sector name="A"><light name="l"><radius>1</radius><color red="1" green="1" blue="1"/></light></sector></world>"#;
        assert!(ingest(xml, GfxFeatures::empty()).is_err());
    }

    #[test]
    fn test_portal_needs_two_vertices() {
        let xml = r#"<world><sector name="A"><portals><portal name="P"><v x="0" y="0" z="0"/><sector>B</sector></portal></portals></sector></world>"#;
        assert!(ingest(xml, GfxFeatures::empty()).is_err());
    }

    #[test]
    fn test_duplicates() {
        let xml = r#"
            <world>
              <textures><texture name="t"/><texture name="t"/></textures>
            </world>"#;
        let (world, _, summary) = ingest(xml, GfxFeatures::empty()).unwrap();
        assert_eq!(world.textures().len(), 1);
        assert_eq!(summary.duplicates, 1);

        let xml = r#"
            <world>
              <meshfact name="f"/>
              <sector name="A">
                <meshobj name="m"><params><factory>f</factory></params></meshobj>
                <meshobj name="m"><params><factory>f</factory></params></meshobj>
              </sector>
            </world>"#;
        let err = ingest(xml, GfxFeatures::empty()).unwrap_err();
        assert!(matches!(err, Error::DuplicateName { kind: "meshobj", .. }));
    }

    #[test]
    fn test_terrain_factory_materials() {
        let xml = r#"
            <world>
              <materials>
                <material name="base"/><material name="grass"/><material name="sand"/>
              </materials>
              <meshfact name="terrain">
                <params>
                  <cells>
                    <celldefault><basematerial>base</basematerial></celldefault>
                    <cell>
                      <feederproperties>
                        <alphamap material="grass">a.png</alphamap>
                        <alphamap material="sand">b.png</alphamap>
                      </feederproperties>
                    </cell>
                  </cells>
                </params>
              </meshfact>
            </world>"#;
        let (world, _, _) = ingest(xml, GfxFeatures::empty()).unwrap();
        let terrain = world.factory(world.find_factory("terrain").unwrap());
        let names: Vec<&str> = terrain.materials.iter().map(|m| world.material(*m).name.as_str()).collect();
        assert_eq!(names, vec!["base", "grass", "sand"]);
    }

    #[test]
    fn test_celldefault_is_not_a_cell() {
        // Feeder and render properties only count on real cells
        let xml = r#"
            <world>
              <materials><material name="base"/></materials>
              <meshfact name="terrain">
                <params>
                  <cells>
                    <celldefault>
                      <basematerial>base</basematerial>
                      <feederproperties><alphamap material="missing">a.png</alphamap></feederproperties>
                    </celldefault>
                  </cells>
                </params>
              </meshfact>
              <sector name="A">
                <meshobj name="ground">
                  <params>
                    <factory>terrain</factory>
                    <cells>
                      <celldefault><renderproperties><shadervar name="tex diffuse" type="texture">missing</shadervar></renderproperties></celldefault>
                    </cells>
                  </params>
                </meshobj>
              </sector>
            </world>"#;
        let (world, _, _) = ingest(xml, GfxFeatures::empty()).unwrap();
        let terrain = world.factory(world.find_factory("terrain").unwrap());
        assert_eq!(terrain.materials.len(), 1);
        let a = world.find_sector("A").unwrap();
        assert!(world.mesh(world.find_mesh(a, "ground").unwrap()).textures.is_empty());
    }

    #[test]
    fn test_mesh_dependencies() {
        let xml = r#"
            <world>
              <textures><texture name="t1"/><texture name="t2"/></textures>
              <materials><material name="m1"/><material name="m2"/><material name="m3"/></materials>
              <meshfact name="f"/>
              <sector name="A">
                <meshobj name="m">
                  <params>
                    <factory>f</factory>
                    <submesh><material>m1</material><shadervar name="tex diffuse" type="texture">t1</shadervar></submesh>
                    <material>m2</material>
                    <materialpalette><material>m3</material><material>m1</material></materialpalette>
                    <cells><cell><renderproperties><shadervar name="tex diffuse" type="texture">t2</shadervar></renderproperties></cell></cells>
                  </params>
                </meshobj>
              </sector>
            </world>"#;
        let (world, _, _) = ingest(xml, GfxFeatures::empty()).unwrap();
        let a = world.find_sector("A").unwrap();
        let mesh = world.mesh(world.find_mesh(a, "m").unwrap());
        assert_eq!(mesh.materials.len(), 3);
        assert_eq!(mesh.textures.len(), 2);
    }

    #[test]
    fn test_library_files_and_paramsfile() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("lib")).unwrap();
        std::fs::write(
            dir.path().join("lib/shared.xml"),
            r#"<library>
                 <textures><texture name="bark"/></textures>
                 <materials><material name="wood"><texture>bark</texture></material></materials>
                 <meshfact name="tree"/>
               </library>"#,
        )
        .unwrap();
        std::fs::write(
            dir.path().join("tree_params.xml"),
            r#"<params><factory>tree</factory><material>wood</material></params>"#,
        )
        .unwrap();
        let world_path = dir.path().join("world.xml");
        std::fs::write(
            &world_path,
            r#"<world>
                 <library>lib/shared.xml</library>
                 <library>lib/shared.xml</library>
                 <sector name="forest">
                   <meshobj name="oak"><paramsfile>tree_params.xml</paramsfile></meshobj>
                 </sector>
               </world>"#,
        )
        .unwrap();

        let mut world = World::new();
        let mut engine = ManualEngine::new();
        let mut resolver = CatalogResolver::new(GfxFeatures::empty(), "/nonexistent");
        let summary = resolver.ingest_file(&mut world, &mut engine, &world_path).unwrap();
        assert_eq!(summary.libraries, 1);
        assert_eq!(summary.textures, 1);

        let forest = world.find_sector("forest").unwrap();
        let oak = world.mesh(world.find_mesh(forest, "oak").unwrap());
        assert_eq!(oak.factories, vec![world.find_factory("tree").unwrap()]);
        assert_eq!(oak.materials, vec![world.find_material("wood").unwrap()]);
        assert!(oak.source.path("params/factory").is_some());
        assert_eq!(resolver.base_dir(), Path::new("/nonexistent"));
    }

    #[test]
    fn test_inline_library_ingested_first() {
        let xml = r#"
            <world>
              <materials><material name="m"><texture>t</texture></material></materials>
              <library><textures><texture name="t"/></textures></library>
            </world>"#;
        let (world, _, summary) = ingest(xml, GfxFeatures::empty()).unwrap();
        assert_eq!(summary.libraries, 1);
        assert!(world.find_material("m").is_some());
    }
}
