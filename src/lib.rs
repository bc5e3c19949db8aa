//! Sectorstream - incremental world streaming for sector/portal worlds

pub mod core;
pub mod math;
pub mod catalog;
pub mod world;
pub mod engine;
pub mod streaming;
pub mod loader;
pub mod debug;

pub use loader::WorldLoader;
