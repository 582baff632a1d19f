//! Per-tick results and diagnostics.

use nalgebra::Isometry3;

use crate::fusion::FuseStats;

/// High-level state of the fusion system.
///
/// `Seeding` while the model is empty; the transition to `Tracking`
/// happens exactly on the first successful capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SystemState {
    #[default]
    Seeding,
    Tracking,
}

/// Scalar metrics from one tick, for logging and visualization.
#[derive(Debug, Clone, Copy, Default)]
pub struct TickMetrics {
    pub frame_points: usize,
    pub model_points: usize,
    /// True on the tick whose capture seeded the model.
    pub seeded: bool,
    pub cleared: bool,
}

/// Timing breakdown of one tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct TickTiming {
    pub total_ms: f64,
    pub track_ms: f64,
    pub fuse_ms: f64,
}

/// Everything the caller needs to render and log after one tick.
#[derive(Debug, Clone, Copy)]
pub struct TickResult {
    pub state: SystemState,
    /// Camera pose after tracking (camera-to-model).
    pub pose: Isometry3<f32>,
    /// Present when this tick fused a captured frame.
    pub fuse: Option<FuseStats>,
    pub metrics: TickMetrics,
    pub timing: TickTiming,
}
