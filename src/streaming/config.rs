//! Loader configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::{Error, Result};

bitflags::bitflags! {
    /// Optional shader maps. A material's side-texture variable is only bound,
    /// and its texture only loaded, when the matching bit is set.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct GfxFeatures: u32 {
        const NORMAL_MAP        = 1 << 0;
        const HEIGHT_MAP        = 1 << 1;
        const SPECULAR_MAP      = 1 << 2;
        const GLOSS_MAP         = 1 << 3;
        const AMBIENT_OCCLUSION = 1 << 4;
    }
}

impl Default for GfxFeatures {
    fn default() -> Self {
        GfxFeatures::empty()
    }
}

impl GfxFeatures {
    /// Feature bit gating a shader variable name, or `None` if the variable is
    /// always bound.
    pub fn gate_for(shader_var: &str) -> Option<GfxFeatures> {
        match shader_var {
            "tex normal" | "tex normal compressed" => Some(GfxFeatures::NORMAL_MAP),
            "tex height" => Some(GfxFeatures::HEIGHT_MAP),
            "tex specular" => Some(GfxFeatures::SPECULAR_MAP),
            "tex gloss" => Some(GfxFeatures::GLOSS_MAP),
            "tex ambient occlusion" => Some(GfxFeatures::AMBIENT_OCCLUSION),
            _ => None,
        }
    }

    /// Whether a shader variable should be bound under these features.
    pub fn allows(self, shader_var: &str) -> bool {
        Self::gate_for(shader_var).is_none_or(|gate| self.contains(gate))
    }
}

/// Streaming configuration. Every field has a default, so a partial JSON file is fine.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingConfig {
    /// Eagerly preload textures of the classes in `preload_classes`.
    pub keep_models: bool,
    pub gfx_features: GfxFeatures,
    /// Activation radius. Objects load within this distance and unload beyond 1.5x.
    pub load_range: f32,
    /// Sector name meaning "stay where you were" (entities parked while their map is unloaded).
    pub holding_sector: String,
    pub preload_classes: Vec<String>,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            keep_models: false,
            gfx_features: GfxFeatures::empty(),
            load_range: 200.0,
            holding_sector: "__holding__".to_string(),
            preload_classes: vec!["item".to_string(), "character".to_string()],
        }
    }
}

impl StreamingConfig {
    /// Distance beyond which resident objects unload.
    pub fn unload_range(&self) -> f32 {
        self.load_range * 1.5
    }

    /// Observer movement below which a same-sector update is skipped.
    pub fn move_threshold(&self) -> f32 {
        self.load_range / 10.0
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !self.load_range.is_finite() || self.load_range <= 0.0 {
            return Err(Error::Config(format!(
                "load_range must be a positive number, got {}",
                self.load_range
            )));
        }
        if self.holding_sector.is_empty() {
            return Err(Error::Config("holding_sector must not be empty".into()));
        }
        Ok(())
    }
}
