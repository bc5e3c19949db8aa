//! Leaf assets: textures, materials and mesh factories.
//!
//! Leaf assets are shared by reference between any number of consumers. They are
//! loaded at most once and never return to [`LoadState::Unloaded`].

use crate::catalog::DocNode;
use crate::core::Vec2;
use crate::engine::{EngineHandle, LoadTicket};

use super::ids::{MaterialId, TextureId};

/// Load state of a leaf asset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadState {
    /// No request issued yet
    Unloaded,
    /// Request in flight
    Pending(LoadTicket),
    /// Finalized. `None` is the placeholder left behind by a failed load.
    Ready(Option<EngineHandle>),
}

impl LoadState {
    pub fn is_ready(&self) -> bool {
        matches!(self, LoadState::Ready(_))
    }

    /// Engine handle, present only when Ready and the load succeeded.
    pub fn handle(&self) -> Option<EngineHandle> {
        match self {
            LoadState::Ready(handle) => *handle,
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Texture {
    pub name: String,
    /// File path from the loader params, if any
    pub file: Option<String>,
    /// Texture class (e.g. "item", "character") used for eager preloading
    pub class: Option<String>,
    /// Catalog node holding the loader params
    pub source: DocNode,
    pub state: LoadState,
}

/// Value of a shader variable as written in the catalog.
#[derive(Clone, Debug, PartialEq)]
pub enum ShaderVarValue {
    /// Name of a texture; matched against the material's texture list at bind time
    Texture(String),
    Vector2(Vec2),
}

#[derive(Clone, Debug, PartialEq)]
pub struct ShaderVar {
    pub name: String,
    pub value: ShaderVarValue,
}

#[derive(Clone, Debug)]
pub struct Material {
    pub name: String,
    /// (shader slot, shader name)
    pub shaders: Vec<(String, String)>,
    pub shader_vars: Vec<ShaderVar>,
    /// Textures referenced by texture shader variables
    pub textures: Vec<TextureId>,
    /// Never Pending: binding is synchronous once every texture is Ready.
    pub state: LoadState,
}

#[derive(Clone, Debug)]
pub struct MeshFactory {
    pub name: String,
    pub source: DocNode,
    pub materials: Vec<MaterialId>,
    pub state: LoadState,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_state_handle() {
        assert_eq!(LoadState::Unloaded.handle(), None);
        assert_eq!(LoadState::Pending(LoadTicket(3)).handle(), None);
        assert_eq!(LoadState::Ready(Some(EngineHandle(7))).handle(), Some(EngineHandle(7)));
        assert!(LoadState::Ready(None).is_ready());
        assert!(!LoadState::Pending(LoadTicket(1)).is_ready());
    }
}
