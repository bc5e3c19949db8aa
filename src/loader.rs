//! Runtime entry point tying the catalog, the world graph and streaming together.

use std::path::{Path, PathBuf};

use crate::catalog::{CatalogResolver, CatalogSummary, DocNode};
use crate::core::{Result, Vec3};
use crate::engine::Engine;
use crate::streaming::{self, StreamingConfig, StreamingController, StreamingStats};
use crate::world::{LoadState, Material, MaterialId, ShaderVar, ShaderVarValue, Texture, TextureId, World};

/// Incremental world loader following a single observer.
///
/// ```ignore
/// let mut loader = WorldLoader::init(StreamingConfig::default(), HeadlessEngine::new("data")?)?;
/// loader.load_catalog(Path::new("data/world.xml"))?;
/// loader.update_position(Vec3::ZERO, "courtyard", true)?;
/// ```
pub struct WorldLoader<E: Engine> {
    world: World,
    engine: E,
    resolver: CatalogResolver,
    controller: StreamingController,
    /// Textures preloaded because of `keep_models`, not yet ready
    preloads: Vec<TextureId>,
}

impl<E: Engine> WorldLoader<E> {
    pub fn init(config: StreamingConfig, engine: E) -> Result<Self> {
        config.validate()?;
        log::info!(
            "World loader: load range {}, keep models {}, gfx features {:?}",
            config.load_range,
            config.keep_models,
            config.gfx_features
        );
        Ok(Self {
            world: World::new(),
            engine,
            resolver: CatalogResolver::new(config.gfx_features, PathBuf::from(".")),
            controller: StreamingController::new(config),
            preloads: Vec::new(),
        })
    }

    pub fn config(&self) -> &StreamingConfig {
        self.controller.config()
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn controller(&self) -> &StreamingController {
        &self.controller
    }

    /// Ingest a catalog file. May be called again for further catalogs.
    pub fn load_catalog(&mut self, path: &Path) -> Result<CatalogSummary> {
        let summary = self.resolver.ingest_file(&mut self.world, &mut self.engine, path)?;
        self.queue_preloads();
        Ok(summary)
    }

    /// Ingest a catalog held in memory. Relative paths resolve against `base_dir`.
    pub fn load_catalog_str(&mut self, xml: &str, base_dir: &Path) -> Result<CatalogSummary> {
        let doc = DocNode::parse_str(xml)?;
        self.resolver.set_base_dir(base_dir);
        let summary = self.resolver.ingest(&mut self.world, &mut self.engine, &doc)?;
        self.queue_preloads();
        Ok(summary)
    }

    fn queue_preloads(&mut self) {
        let config = self.controller.config();
        if !config.keep_models {
            return;
        }
        let wanted: Vec<TextureId> = self
            .world
            .texture_ids()
            .filter(|id| {
                let texture = self.world.texture(*id);
                texture.state == LoadState::Unloaded
                    && texture
                        .class
                        .as_ref()
                        .is_some_and(|c| config.preload_classes.contains(c))
            })
            .collect();
        if !wanted.is_empty() {
            log::info!("Preloading {} model texture(s)", wanted.len());
        }
        for id in wanted {
            if !streaming::try_ready_texture(&mut self.world, &mut self.engine, id) {
                self.preloads.push(id);
            }
        }
    }

    /// Report a new observer position. See [`StreamingController::update_position`].
    pub fn update_position(&mut self, position: Vec3, sector: &str, force: bool) -> Result<()> {
        let (world, engine) = (&mut self.world, &mut self.engine);
        self.preloads.retain(|id| !streaming::try_ready_texture(world, engine, *id));
        self.controller
            .update_position(&mut self.world, &mut self.engine, position, sector, force)
    }

    /// Register and request a texture outside the sector graph. An existing texture
    /// with the same name is reused.
    pub fn load_texture(&mut self, name: &str, file: &str, class: Option<&str>) -> TextureId {
        let id = match self.world.find_texture(name) {
            Some(id) => id,
            None => {
                let mut source = DocNode::new("texture")
                    .with_attr("name", name)
                    .with_child(DocNode::new("file").with_text(file));
                if let Some(class) = class {
                    source = source.with_child(DocNode::new("class").with_text(class));
                }
                self.world.add_texture(Texture {
                    name: name.to_string(),
                    file: Some(file.to_string()),
                    class: class.map(str::to_owned),
                    source,
                    state: LoadState::Unloaded,
                })
            }
        };
        streaming::try_ready_texture(&mut self.world, &mut self.engine, id);
        id
    }

    /// Register a single-texture material (bound as "tex diffuse") outside the
    /// sector graph and request its texture.
    pub fn load_material(&mut self, name: &str, file: &str) -> MaterialId {
        if let Some(id) = self.world.find_material(name) {
            streaming::try_ready_material(&mut self.world, &mut self.engine, id);
            return id;
        }
        let texture = self.load_texture(name, file, None);
        let id = self.world.add_material(Material {
            name: name.to_string(),
            shaders: Vec::new(),
            shader_vars: vec![ShaderVar {
                name: "tex diffuse".to_string(),
                value: ShaderVarValue::Texture(self.world.texture(texture).name.clone()),
            }],
            textures: vec![texture],
            state: LoadState::Unloaded,
        });
        streaming::try_ready_material(&mut self.world, &mut self.engine, id);
        id
    }

    pub fn try_ready_texture(&mut self, id: TextureId) -> bool {
        streaming::try_ready_texture(&mut self.world, &mut self.engine, id)
    }

    pub fn try_ready_material(&mut self, id: MaterialId) -> bool {
        streaming::try_ready_material(&mut self.world, &mut self.engine, id)
    }

    pub fn current_sector(&self) -> Option<&str> {
        self.controller
            .current_sector()
            .map(|id| self.world.sector(id).name.as_str())
    }

    pub fn stats(&self) -> StreamingStats {
        StreamingStats::collect(&self.world, self.current_sector(), self.controller.updates())
    }
}
