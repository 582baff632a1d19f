//! Runtime configuration for fusion and tracking.
//!
//! Defaults reproduce the tuning that works well on PrimeSense-class
//! sensors: a light blend weight so the model converges slowly and a
//! 2 cm depth gate for correspondence classification.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::camera::PinholeIntrinsics;

/// Parameters of the per-pixel fusion step.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    /// Blend weight toward the new observation, in (0, 1).
    pub weight: f32,
    /// Maximum depth discrepancy accepted as a correspondence, in meters.
    pub dist_thresh: f32,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            weight: 0.1,
            dist_thresh: 0.02,
        }
    }
}

/// Parameters of the projective ICP tracker.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct IcpConfig {
    /// Correspondence rejection radius in meters (compared squared).
    pub max_corr_dist: f32,
    /// Stop when the update twist norm falls below this.
    pub convergence_tol: f32,
    /// Outer iterations (correspondence re-search each time).
    pub max_iterations: usize,
    /// Optimization steps per correspondence set.
    pub max_step_iterations: usize,
}

impl Default for IcpConfig {
    fn default() -> Self {
        Self {
            max_corr_dist: 0.1,
            convergence_tol: 5e-4,
            max_iterations: 6,
            max_step_iterations: 1,
        }
    }
}

/// Top-level configuration, loadable from a JSON file.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    pub fusion: FusionConfig,
    pub icp: IcpConfig,
    pub intrinsics: Option<PinholeIntrinsics>,
    /// Depth image unit scale: raw depth / `depth_scale` = meters.
    /// TUM RGB-D PNGs use 5000, OpenNI streams use 1000.
    pub depth_scale: Option<f32>,
}

impl SystemConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("parsing config file {}", path.display()))
    }
}
