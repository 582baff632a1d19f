//! Per-pixel fusion of a frame into the accumulated model.

pub mod engine;
pub mod index_map;

pub use engine::{FuseStats, FusionEngine};
pub use index_map::{project_to_index_map, IndexMap};
