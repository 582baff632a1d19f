//! The fusion engine: classify every pixel, blend correspondences into
//! the model in place, append novel geometry at the tail.
//!
//! Inputs arrive already aligned: `frame_t` is the current frame moved
//! into the model's coordinate frame, `model_t` is the model moved into
//! the sensor-view frame, and both index maps were built in the
//! sensor-view frame at the same resolution. A pixel where both maps
//! hold a point and the view-axis depths agree within the threshold is
//! a correspondence and gets an exponential-moving-average update; any
//! other observed pixel stages a verbatim copy of the frame point for a
//! single bulk append after the scan.
//!
//! The scan is data-parallel over pixel rows. Projection is many-to-one
//! (oblique geometry can send several pixels to one model point), so
//! instead of locking the model inside the parallel region each row
//! emits a local outcome and a single sequential merge pass applies the
//! blends and the appends in row-major order. The fused result is
//! therefore identical for any worker count.

use rayon::prelude::*;

use crate::cloud::PointCloud;
use crate::config::FusionConfig;
use crate::fusion::IndexMap;

/// Counts from one `fuse` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FuseStats {
    /// Pixels classified as correspondence and blended in place.
    pub blended: usize,
    /// Pixels classified as novel and appended to the model.
    pub appended: usize,
}

/// Pixel classifications collected by one row of the parallel scan.
#[derive(Default)]
struct RowOutcome {
    /// (model index, frame index) pairs to blend.
    blends: Vec<(usize, usize)>,
    /// Frame indices to append verbatim.
    novel: Vec<usize>,
}

/// Merges aligned frames into the accumulated model.
#[derive(Debug, Clone, Copy)]
pub struct FusionEngine {
    weight: f32,
    weight_compl: f32,
    dist_thresh: f32,
}

impl FusionEngine {
    pub fn new(config: FusionConfig) -> Self {
        assert!(
            config.weight > 0.0 && config.weight < 1.0,
            "fusion weight must be in (0, 1)"
        );
        assert!(config.dist_thresh > 0.0, "fusion distance threshold must be positive");
        Self {
            weight: config.weight,
            weight_compl: 1.0 - config.weight,
            dist_thresh: config.dist_thresh,
        }
    }

    /// Fuse one aligned frame into `model`.
    ///
    /// `model_t` must be `model` transformed into the sensor-view frame
    /// (same length, same point order); the index maps must share the
    /// sensor resolution. Violations are caller contract failures and
    /// panic.
    ///
    /// The model only grows: its length increases by exactly the number
    /// of novel pixels and no existing point is removed or reordered.
    pub fn fuse(
        &self,
        model: &mut PointCloud,
        frame_t: &PointCloud,
        model_t: &PointCloud,
        frame_map: &IndexMap,
        model_map: &IndexMap,
    ) -> FuseStats {
        assert_eq!(
            (frame_map.width(), frame_map.height()),
            (model_map.width(), model_map.height()),
            "index map dimensions differ"
        );
        assert_eq!(
            model_t.len(),
            model.len(),
            "model_t is not a transform of the current model"
        );

        let (width, height) = (frame_map.width(), frame_map.height());

        // Parallel classification, one outcome per row, collected in row
        // order. Classification only reads, so rows are independent.
        let rows: Vec<RowOutcome> = (0..height)
            .into_par_iter()
            .map(|y| {
                let mut outcome = RowOutcome::default();
                for x in 0..width {
                    let frame_idx = match frame_map.get(x, y) {
                        Some(index) => index,
                        None => continue,
                    };
                    match model_map.get(x, y) {
                        Some(model_idx)
                            if self.depths_agree(
                                model_t.positions[model_idx].z,
                                frame_t.positions[frame_idx].z,
                            ) =>
                        {
                            outcome.blends.push((model_idx, frame_idx));
                        }
                        _ => outcome.novel.push(frame_idx),
                    }
                }
                outcome
            })
            .collect();

        // Sequential merge: in-place blends first per row, novel points
        // staged for one bulk append. Worst case every pixel is novel.
        let mut staged = PointCloud::with_capacity(width * height);
        let mut stats = FuseStats::default();
        for outcome in &rows {
            for &(model_idx, frame_idx) in &outcome.blends {
                self.blend_point(model, frame_t, model_idx, frame_idx);
            }
            for &frame_idx in &outcome.novel {
                staged.push_from(frame_t, frame_idx);
            }
            stats.blended += outcome.blends.len();
            stats.appended += outcome.novel.len();
        }
        model.append(&mut staged);
        stats
    }

    /// Strict inequality; a NaN discrepancy fails the gate and the
    /// pixel classifies novel.
    #[inline]
    fn depths_agree(&self, model_depth: f32, frame_depth: f32) -> bool {
        (model_depth - frame_depth).abs() < self.dist_thresh
    }

    /// Exponential-moving-average update of one model point. The
    /// blended normal is renormalized unconditionally.
    #[inline]
    fn blend_point(
        &self,
        model: &mut PointCloud,
        frame_t: &PointCloud,
        model_idx: usize,
        frame_idx: usize,
    ) {
        let (w, wc) = (self.weight, self.weight_compl);
        model.positions[model_idx] =
            wc * model.positions[model_idx] + w * frame_t.positions[frame_idx];
        model.colors[model_idx] = wc * model.colors[model_idx] + w * frame_t.colors[frame_idx];
        let blended = wc * model.normals[model_idx] + w * frame_t.normals[frame_idx];
        model.normals[model_idx] = blended
            .try_normalize(0.0)
            .unwrap_or(model.normals[model_idx]);
    }
}
