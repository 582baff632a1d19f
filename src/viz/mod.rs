//! Visualization via the rerun viewer.

pub mod rerun;

pub use self::rerun::RerunVisualizer;
