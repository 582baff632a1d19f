//! Projective point-to-plane ICP.
//!
//! Aligns a source point set onto a target cloud that came from an
//! organized sensor frame. Correspondence search is projective: a
//! transformed source point is pushed through the pinhole model and
//! paired with whatever target point owns that pixel, gated by a
//! Euclidean rejection radius. The point-to-plane objective
//! `sum n_i . (T p_i - q_i)` is linearized around the current estimate
//! and solved as 6-DoF normal equations, accumulated in f64 and
//! factorized with Cholesky.
//!
//! Registration is best-effort by contract: too few correspondences, a
//! rank-deficient system or plain non-convergence all end the loop with
//! the best transform found so far, never an error.

use nalgebra::{Isometry3, Matrix6, Point3, Translation3, UnitQuaternion, Vector3, Vector6};
use tracing::debug;

use crate::camera::PinholeIntrinsics;
use crate::cloud::PointCloud;
use crate::config::IcpConfig;
use crate::fusion::project_to_index_map;

/// Minimum correspondences for a solvable 6-DoF system.
const MIN_CORRESPONDENCES: usize = 6;

/// Projective point-to-plane ICP over a pinhole camera.
#[derive(Debug, Clone, Copy)]
pub struct ProjectiveIcp {
    config: IcpConfig,
}

impl ProjectiveIcp {
    pub fn new(config: IcpConfig) -> Self {
        Self { config }
    }

    /// Refine `initial` so that it maps `source` onto `target`.
    ///
    /// `target` must be expressed in the sensor-view frame (its points
    /// project through `intrinsics`) and supplies the normals for the
    /// point-to-plane metric. Never fails; the return value is the best
    /// estimate available when the loop stops.
    pub fn estimate(
        &self,
        target: &PointCloud,
        source: &[Vector3<f32>],
        intrinsics: &PinholeIntrinsics,
        initial: &Isometry3<f32>,
    ) -> Isometry3<f32> {
        let mut transform = *initial;
        if source.is_empty() || target.is_empty() {
            return transform;
        }

        let target_map = project_to_index_map(&target.positions, intrinsics);
        let max_dist_sq = self.config.max_corr_dist * self.config.max_corr_dist;

        for iteration in 0..self.config.max_iterations {
            // Projective correspondence search at the current estimate.
            let mut pairs: Vec<(usize, usize)> = Vec::new();
            for (src_idx, p) in source.iter().enumerate() {
                let p_t = (transform * Point3::from(*p)).coords;
                let (x, y) = match intrinsics.project_to_pixel(&p_t) {
                    Some(pixel) => pixel,
                    None => continue,
                };
                let tgt_idx = match target_map.get(x, y) {
                    Some(index) => index,
                    None => continue,
                };
                if (p_t - target.positions[tgt_idx]).norm_squared() <= max_dist_sq {
                    pairs.push((src_idx, tgt_idx));
                }
            }

            if pairs.len() < MIN_CORRESPONDENCES {
                debug!(iteration, n_pairs = pairs.len(), "icp: too few correspondences");
                return transform;
            }

            let mut converged = false;
            for _ in 0..self.config.max_step_iterations.max(1) {
                let delta = match self.solve_step(target, source, &pairs, &transform) {
                    Some(delta) => delta,
                    None => return transform,
                };
                transform = apply_twist(&delta, &transform);
                if delta.norm() < self.config.convergence_tol as f64 {
                    converged = true;
                    break;
                }
            }
            if converged {
                debug!(iteration, n_pairs = pairs.len(), "icp: converged");
                break;
            }
        }
        transform
    }

    /// One Gauss-Newton step on a fixed correspondence set. Returns the
    /// solved twist `[omega, v]`, or `None` for a rank-deficient system.
    fn solve_step(
        &self,
        target: &PointCloud,
        source: &[Vector3<f32>],
        pairs: &[(usize, usize)],
        transform: &Isometry3<f32>,
    ) -> Option<Vector6<f64>> {
        let mut jtj = Matrix6::<f64>::zeros();
        let mut jtr = Vector6::<f64>::zeros();

        for &(src_idx, tgt_idx) in pairs {
            let p_t = (transform * Point3::from(source[src_idx])).coords.cast::<f64>();
            let q = target.positions[tgt_idx].cast::<f64>();
            let n = target.normals[tgt_idx].cast::<f64>();

            // d/d xi of n . (exp(xi) p - q) at xi = 0 is [(p x n), n].
            let residual = n.dot(&(p_t - q));
            let mut row = Vector6::zeros();
            row.fixed_rows_mut::<3>(0).copy_from(&p_t.cross(&n));
            row.fixed_rows_mut::<3>(3).copy_from(&n);

            jtj += row * row.transpose();
            jtr += row * residual;
        }

        let cholesky = jtj.cholesky()?;
        Some(cholesky.solve(&-jtr))
    }
}

/// Apply the twist `[omega, v]` as a left-multiplied incremental rigid
/// transform.
fn apply_twist(delta: &Vector6<f64>, transform: &Isometry3<f32>) -> Isometry3<f32> {
    let omega: Vector3<f32> = delta.fixed_rows::<3>(0).into_owned().cast::<f32>();
    let v: Vector3<f32> = delta.fixed_rows::<3>(3).into_owned().cast::<f32>();
    let increment = Isometry3::from_parts(
        Translation3::from(v),
        UnitQuaternion::from_scaled_axis(omega),
    );
    increment * transform
}
