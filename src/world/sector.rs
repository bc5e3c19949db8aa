//! Sectors and the objects they own: mesh instances, portals and lights.

use std::str::FromStr;

use crate::catalog::DocNode;
use crate::core::{Error, Vec3};
use crate::engine::{EngineHandle, LoadTicket};
use crate::math::Aabb;

use super::ids::{LightId, MaterialId, MeshFactoryId, MeshInstanceId, PortalId, SectorId, TextureId};

/// Residency of a mesh instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MeshState {
    Unloaded,
    /// Queued. `ticket` is set once the instantiate request went out; `discard`
    /// means the owning sector was torn down and the result must be dropped.
    Pending { ticket: Option<LoadTicket>, discard: bool },
    Loaded(EngineHandle),
    /// Instantiate request failed. Never retried.
    Failed,
}

#[derive(Clone, Debug)]
pub struct MeshInstance {
    pub name: String,
    pub source: DocNode,
    /// Owning sector (lookup relation, not ownership)
    pub sector: SectorId,
    pub position: Vec3,
    pub factories: Vec<MeshFactoryId>,
    pub materials: Vec<MaterialId>,
    pub textures: Vec<TextureId>,
    pub state: MeshState,
}

impl MeshInstance {
    /// Whether this mesh keeps its sector's engine object alive.
    pub fn occupies_sector(&self) -> bool {
        matches!(
            self.state,
            MeshState::Loaded(_) | MeshState::Pending { discard: false, .. }
        )
    }
}

#[derive(Clone, Debug)]
pub struct Portal {
    pub name: String,
    pub polygon: Vec<Vec3>,
    /// Activation offset (`ww`)
    pub offset: Vec3,
    pub sector: SectorId,
    pub target: SectorId,
    /// Polygon bounds moved by `offset`
    pub activation: Aabb,
    /// Present only while Active
    pub handle: Option<EngineHandle>,
}

impl Portal {
    pub fn is_active(&self) -> bool {
        self.handle.is_some()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Attenuation {
    None,
    #[default]
    Linear,
    Inverse,
    Realistic,
    /// Constant/linear/quadratic polynomial
    Clq,
}

impl FromStr for Attenuation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Attenuation::None),
            "linear" => Ok(Attenuation::Linear),
            "inverse" => Ok(Attenuation::Inverse),
            "realistic" => Ok(Attenuation::Realistic),
            "clq" => Ok(Attenuation::Clq),
            other => Err(Error::catalog("attenuation", format!("unknown attenuation '{}'", other))),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Light {
    pub name: String,
    pub sector: SectorId,
    pub position: Vec3,
    pub radius: f32,
    pub color: Vec3,
    pub attenuation: Attenuation,
    pub dynamic: bool,
    /// Present only while Resident
    pub handle: Option<EngineHandle>,
}

impl Light {
    pub fn is_resident(&self) -> bool {
        self.handle.is_some()
    }
}

#[derive(Clone, Debug)]
pub struct Sector {
    pub name: String,
    pub ambient: Option<Vec3>,
    /// Visibility culler plugin
    pub culler: Option<String>,
    pub meshes: Vec<MeshInstanceId>,
    pub portals: Vec<PortalId>,
    pub lights: Vec<LightId>,
    /// Engine-side sector object; `Some` while the sector is resident
    pub handle: Option<EngineHandle>,
    /// Occupying meshes + active portals + resident lights
    pub resident_children: usize,
    /// Active portals elsewhere that target this sector
    pub inbound_portals: usize,
    /// Re-entrancy guard for portal recursion
    pub streaming: bool,
    /// Created from a forward reference and not defined yet
    pub stub: bool,
}

impl Sector {
    /// Empty stub for a name that has only been referenced so far.
    pub fn stub(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ambient: None,
            culler: None,
            meshes: Vec::new(),
            portals: Vec::new(),
            lights: Vec::new(),
            handle: None,
            resident_children: 0,
            inbound_portals: 0,
            streaming: false,
            stub: true,
        }
    }

    pub fn is_resident(&self) -> bool {
        self.handle.is_some()
    }
}
