//! Position-driven streaming: load pump, controller and reachability sweep.

pub mod config;
pub mod controller;
pub mod pump;
pub mod stats;
pub mod sweep;

pub use config::{GfxFeatures, StreamingConfig};
pub use controller::{MeshStep, StreamingController};
pub use pump::{try_ready_factory, try_ready_material, try_ready_mesh_dependencies, try_ready_texture};
pub use stats::StreamingStats;
pub use sweep::{connected, sweep};
