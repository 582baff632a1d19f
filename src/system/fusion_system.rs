//! The tick-level control loop: alternate tracking and mapping.
//!
//! One tick fully completes before the next starts; pose and model are
//! owned here and mutated only on the control thread. Per tick:
//!
//! 1. consume `clear` (model emptied, pose back to identity),
//! 2. if the model is non-empty, refine the camera pose against the
//!    new frame with projective ICP (best effort, never fatal),
//! 3. consume `capture`: an empty model is seeded with a copy of the
//!    frame, otherwise the frame is fused into the model,
//! 4. hand a `TickResult` back to the caller for rendering.

use std::time::Instant;

use nalgebra::Isometry3;
use tracing::{debug, info};

use crate::camera::PinholeIntrinsics;
use crate::cloud::PointCloud;
use crate::config::SystemConfig;
use crate::fusion::{project_to_index_map, FusionEngine};
use crate::registration::ProjectiveIcp;
use crate::system::result::{SystemState, TickMetrics, TickResult, TickTiming};
use crate::system::signals::CaptureSignals;

/// Incremental fusion system: model, pose and the tick procedure.
pub struct FusionSystem {
    intrinsics: PinholeIntrinsics,
    engine: FusionEngine,
    icp: ProjectiveIcp,

    model: PointCloud,
    /// Camera-to-model transform. Identity while the model is empty.
    pose: Isometry3<f32>,
    state: SystemState,
    tick_count: usize,
}

impl FusionSystem {
    pub fn new(config: SystemConfig, intrinsics: PinholeIntrinsics) -> Self {
        Self {
            intrinsics,
            engine: FusionEngine::new(config.fusion),
            icp: ProjectiveIcp::new(config.icp),
            model: PointCloud::new(),
            pose: Isometry3::identity(),
            state: SystemState::Seeding,
            tick_count: 0,
        }
    }

    pub fn model(&self) -> &PointCloud {
        &self.model
    }

    pub fn pose(&self) -> &Isometry3<f32> {
        &self.pose
    }

    pub fn state(&self) -> SystemState {
        self.state
    }

    /// Run one tick on a freshly reconstructed frame.
    ///
    /// The frame is ephemeral: unless this tick captures, it only
    /// serves pose refinement and is gone by the next tick. Tracking
    /// failure is never fatal; the loop continues with the best
    /// transform the estimator returned.
    pub fn tick(&mut self, frame: &PointCloud, signals: &CaptureSignals) -> TickResult {
        let t_start = Instant::now();
        self.tick_count += 1;

        let mut metrics = TickMetrics {
            frame_points: frame.len(),
            ..TickMetrics::default()
        };
        let mut timing = TickTiming::default();

        if signals.take_clear() {
            info!(tick = self.tick_count, "clear requested: resetting model and pose");
            self.model.clear();
            self.pose = Isometry3::identity();
            self.state = SystemState::Seeding;
            metrics.cleared = true;
        }

        // Localize against the new frame.
        if !self.model.is_empty() {
            let t_track = Instant::now();
            let model_to_cam = self.icp.estimate(
                frame,
                &self.model.positions,
                &self.intrinsics,
                &self.pose.inverse(),
            );
            self.pose = model_to_cam.inverse();
            timing.track_ms = t_track.elapsed().as_secs_f64() * 1000.0;
        }

        // Map on capture.
        let mut fuse = None;
        if signals.take_capture() {
            if self.model.is_empty() {
                self.model = frame.clone();
                self.pose = Isometry3::identity();
                self.state = SystemState::Tracking;
                metrics.seeded = true;
                info!(
                    tick = self.tick_count,
                    points = self.model.len(),
                    "model seeded from frame"
                );
            } else {
                let t_fuse = Instant::now();
                let frame_t = frame.transformed(&self.pose);
                let model_t = self.model.transformed(&self.pose.inverse());
                let frame_map = project_to_index_map(&frame.positions, &self.intrinsics);
                let model_map = project_to_index_map(&model_t.positions, &self.intrinsics);

                let stats =
                    self.engine
                        .fuse(&mut self.model, &frame_t, &model_t, &frame_map, &model_map);
                timing.fuse_ms = t_fuse.elapsed().as_secs_f64() * 1000.0;
                info!(
                    tick = self.tick_count,
                    blended = stats.blended,
                    appended = stats.appended,
                    model_points = self.model.len(),
                    "fused frame into model"
                );
                fuse = Some(stats);
            }
        } else {
            debug!(tick = self.tick_count, frame_points = frame.len(), "tracked frame");
        }

        metrics.model_points = self.model.len();
        timing.total_ms = t_start.elapsed().as_secs_f64() * 1000.0;

        TickResult {
            state: self.state,
            pose: self.pose,
            fuse,
            metrics,
            timing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    fn small_intrinsics() -> PinholeIntrinsics {
        PinholeIntrinsics {
            fx: 10.0,
            fy: 10.0,
            cx: 4.0,
            cy: 4.0,
            width: 8,
            height: 8,
        }
    }

    fn system() -> FusionSystem {
        FusionSystem::new(SystemConfig::default(), small_intrinsics())
    }

    /// Four points at four distinct pixels.
    fn four_point_frame(intr: &PinholeIntrinsics) -> PointCloud {
        let mut cloud = PointCloud::new();
        for (x, y) in [(1.0, 1.0), (6.0, 1.0), (1.0, 6.0), (6.0, 6.0)] {
            cloud.push(
                intr.deproject(x, y, 2.0),
                Vector3::new(0.0, 0.0, -1.0),
                Vector3::new(0.4, 0.4, 0.4),
            );
        }
        cloud
    }

    #[test]
    fn test_capture_seeds_empty_model() {
        // Scenario A: first capture copies the frame, pose stays identity.
        let mut sys = system();
        let signals = CaptureSignals::new();
        let frame = four_point_frame(&small_intrinsics());

        signals.request_capture();
        let result = sys.tick(&frame, &signals);

        assert_eq!(result.state, SystemState::Tracking);
        assert!(result.metrics.seeded);
        assert_eq!(sys.model().len(), 4);
        assert_eq!(sys.model().positions, frame.positions);
        assert_relative_eq!(result.pose.translation.vector.norm(), 0.0);
        assert_relative_eq!(result.pose.rotation.angle(), 0.0);
    }

    #[test]
    fn test_tick_without_capture_leaves_model_untouched() {
        let mut sys = system();
        let signals = CaptureSignals::new();
        let frame = four_point_frame(&small_intrinsics());

        let result = sys.tick(&frame, &signals);
        assert_eq!(result.state, SystemState::Seeding);
        assert!(sys.model().is_empty());
        assert!(result.fuse.is_none());
    }

    #[test]
    fn test_reobservation_keeps_model_count() {
        // Scenario B: seed, then capture the identical frame again.
        let mut sys = system();
        let signals = CaptureSignals::new();
        let frame = four_point_frame(&small_intrinsics());

        signals.request_capture();
        sys.tick(&frame, &signals);

        signals.request_capture();
        let result = sys.tick(&frame, &signals);

        let stats = result.fuse.unwrap();
        assert_eq!(stats.blended, 4);
        assert_eq!(stats.appended, 0);
        assert_eq!(sys.model().len(), 4);
        for (p, q) in sys.model().positions.iter().zip(&frame.positions) {
            assert_relative_eq!(*p, *q, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_clear_resets_model_pose_and_state() {
        let mut sys = system();
        let signals = CaptureSignals::new();
        let frame = four_point_frame(&small_intrinsics());

        signals.request_capture();
        sys.tick(&frame, &signals);
        assert_eq!(sys.state(), SystemState::Tracking);

        signals.request_clear();
        let result = sys.tick(&frame, &signals);

        assert!(result.metrics.cleared);
        assert_eq!(result.state, SystemState::Seeding);
        assert!(sys.model().is_empty());
        assert_relative_eq!(sys.pose().translation.vector.norm(), 0.0);
    }

    #[test]
    fn test_clear_then_capture_reseeds_in_one_tick() {
        let mut sys = system();
        let signals = CaptureSignals::new();
        let frame = four_point_frame(&small_intrinsics());

        signals.request_capture();
        sys.tick(&frame, &signals);

        // Both slots set: clear first, then the capture reseeds.
        signals.request_clear();
        signals.request_capture();
        let result = sys.tick(&frame, &signals);

        assert!(result.metrics.cleared);
        assert!(result.metrics.seeded);
        assert_eq!(sys.model().len(), 4);
        assert_eq!(result.state, SystemState::Tracking);
    }

    #[test]
    fn test_capture_signal_does_not_linger() {
        let mut sys = system();
        let signals = CaptureSignals::new();
        let frame = four_point_frame(&small_intrinsics());

        signals.request_capture();
        sys.tick(&frame, &signals);
        assert_eq!(sys.model().len(), 4);

        // No new request: this tick must not fuse.
        let result = sys.tick(&frame, &signals);
        assert!(result.fuse.is_none());
        assert_eq!(sys.model().len(), 4);
    }
}
