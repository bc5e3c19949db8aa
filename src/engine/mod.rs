//! Boundary to the engine that owns concrete resources.
//!
//! The streaming loader never touches GPU or CPU resources directly. It asks an
//! [`Engine`] to start loads, receives opaque [`LoadTicket`]s, and polls them once
//! per tick. Every call is non-blocking.

pub mod headless;
pub mod manual;

use crate::catalog::DocNode;
use crate::core::{Vec2, Vec3};
use crate::world::Attenuation;

pub use headless::HeadlessEngine;
pub use manual::ManualEngine;

/// Opaque engine-side resource handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EngineHandle(pub u64);

/// Opaque token for an in-flight asynchronous load.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LoadTicket(pub u64);

/// Result of polling a [`LoadTicket`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoadStatus {
    Pending,
    Loaded(EngineHandle),
    Failed(String),
}

#[derive(Clone, Debug)]
pub struct TextureRequest {
    pub name: String,
    pub file: Option<String>,
    pub class: Option<String>,
    /// Loader parameters as written in the catalog
    pub params: DocNode,
}

#[derive(Clone, Debug)]
pub struct FactoryRequest {
    pub name: String,
    pub source: DocNode,
    /// Bound materials in catalog order; `None` for placeholders
    pub materials: Vec<Option<EngineHandle>>,
}

#[derive(Clone, Debug)]
pub struct MeshRequest {
    pub name: String,
    pub source: DocNode,
    pub position: Vec3,
    pub factories: Vec<Option<EngineHandle>>,
    pub materials: Vec<Option<EngineHandle>>,
}

/// A shader variable resolved against loaded textures.
#[derive(Clone, Debug, PartialEq)]
pub enum BoundValue {
    /// `None` when the texture failed to load or is not listed on the material
    Texture(Option<EngineHandle>),
    Vector2(Vec2),
}

#[derive(Clone, Debug)]
pub struct MaterialBinding {
    pub name: String,
    pub shaders: Vec<(String, String)>,
    pub vars: Vec<(String, BoundValue)>,
}

#[derive(Clone, Debug)]
pub struct SectorSetup {
    pub name: String,
    pub ambient: Option<Vec3>,
    pub culler: Option<String>,
}

#[derive(Clone, Debug)]
pub struct PortalSetup {
    pub name: String,
    pub polygon: Vec<Vec3>,
    pub offset: Vec3,
}

#[derive(Clone, Debug)]
pub struct LightSetup {
    pub name: String,
    pub position: Vec3,
    pub radius: f32,
    pub color: Vec3,
    pub attenuation: Attenuation,
    pub dynamic: bool,
}

/// Engine operations used by the loader.
///
/// Loads are started with `request_*` and observed with [`Engine::poll`]. All
/// other operations complete synchronously.
pub trait Engine {
    fn request_texture(&mut self, request: &TextureRequest) -> LoadTicket;

    fn request_mesh_factory(&mut self, request: &FactoryRequest) -> LoadTicket;

    /// Start instantiating a mesh object. The result is not yet in any sector.
    fn request_mesh(&mut self, request: &MeshRequest) -> LoadTicket;

    /// Non-blocking completion check. A ticket's final status may be reported
    /// only once; callers record it and stop polling.
    fn poll(&mut self, ticket: LoadTicket) -> LoadStatus;

    /// Bind shader variables and produce a material. Synchronous.
    fn bind_material(&mut self, binding: &MaterialBinding) -> EngineHandle;

    fn create_sector(&mut self, setup: &SectorSetup) -> EngineHandle;

    fn destroy_sector(&mut self, sector: EngineHandle);

    /// Place a loaded mesh into a sector and set up collision.
    fn attach_mesh(&mut self, mesh: EngineHandle, sector: EngineHandle, position: Vec3);

    /// Remove a mesh from its sector and free it.
    fn detach_mesh(&mut self, mesh: EngineHandle);

    /// Free a loaded object that was never attached.
    fn release(&mut self, handle: EngineHandle);

    fn create_portal(&mut self, from: EngineHandle, to: EngineHandle, setup: &PortalSetup) -> EngineHandle;

    fn remove_portal(&mut self, portal: EngineHandle);

    fn add_light(&mut self, sector: EngineHandle, setup: &LightSetup) -> EngineHandle;

    fn remove_light(&mut self, light: EngineHandle);

    fn preload_shader(&mut self, _file: &str) {}

    /// Plugin declarations, forwarded verbatim.
    fn load_plugins(&mut self, _plugins: &DocNode) {}
}
