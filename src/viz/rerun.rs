//! Rerun-based visualization of the fusion process.
//!
//! Entity hierarchy:
//!     status               - Status bar: state, model size, timings
//!     world/
//!         model            - Accumulated model cloud (own colors)
//!         frame            - Current frame in the model frame (dimmed)
//!         camera           - Camera pose + pinhole frustum
//!     plots/
//!         model_points     - Model size over time
//!         appended         - Points appended per capture

use rerun::{external::glam, RecordingStream};
use tracing::warn;

use crate::camera::PinholeIntrinsics;
use crate::cloud::PointCloud;
use crate::system::{SystemState, TickResult};

pub struct RerunVisualizer {
    rec: RecordingStream,
    start_timestamp_s: Option<f64>,
}

impl RerunVisualizer {
    pub fn new(app_name: &str) -> anyhow::Result<Self> {
        // Runs the rerun viewer in a separate process.
        let rec = rerun::RecordingStreamBuilder::new(app_name.to_owned()).spawn()?;

        // Model and camera both live in the sensor convention: X right,
        // Y down, Z forward along the optical axis.
        rec.log_static("world", &rerun::ViewCoordinates::RDF()).ok();

        Ok(Self {
            rec,
            start_timestamp_s: None,
        })
    }

    /// Set the timeline position for all subsequent logs, relative to
    /// the first frame.
    pub fn set_time(&mut self, timestamp_s: f64) {
        let start = *self.start_timestamp_s.get_or_insert(timestamp_s);
        self.rec.set_duration_secs("time", timestamp_s - start);
    }

    /// Log everything for one tick: status, clouds, camera, plots.
    pub fn log_tick(
        &self,
        result: &TickResult,
        model: &PointCloud,
        frame: &PointCloud,
        intrinsics: &PinholeIntrinsics,
    ) {
        self.log_status(result);
        self.log_model(model);
        self.log_frame(frame, result);
        self.log_camera(result, intrinsics);

        self.rec
            .log(
                "plots/model_points",
                &rerun::Scalars::new([model.len() as f64]),
            )
            .ok();
        if let Some(stats) = result.fuse {
            self.rec
                .log("plots/appended", &rerun::Scalars::new([stats.appended as f64]))
                .ok();
        }
    }

    fn log_status(&self, result: &TickResult) {
        let state = match result.state {
            SystemState::Seeding => "**SEEDING** (press 'a' to capture)",
            SystemState::Tracking => "**TRACKING**",
        };
        let status = format!(
            "{} | Frame: {} pts | Model: {} pts | track {:.1} ms | fuse {:.1} ms",
            state,
            result.metrics.frame_points,
            result.metrics.model_points,
            result.timing.track_ms,
            result.timing.fuse_ms,
        );
        self.rec
            .log(
                "status",
                &rerun::TextDocument::new(status).with_media_type(rerun::MediaType::markdown()),
            )
            .ok();
    }

    fn log_model(&self, model: &PointCloud) {
        if model.is_empty() {
            self.rec.log("world/model", &rerun::Clear::flat()).ok();
            return;
        }
        let positions: Vec<[f32; 3]> = model.positions.iter().map(|p| [p.x, p.y, p.z]).collect();
        let colors: Vec<[u8; 3]> = model
            .colors
            .iter()
            .map(|c| {
                [
                    (c.x.clamp(0.0, 1.0) * 255.0) as u8,
                    (c.y.clamp(0.0, 1.0) * 255.0) as u8,
                    (c.z.clamp(0.0, 1.0) * 255.0) as u8,
                ]
            })
            .collect();
        if let Err(e) = self.rec.log(
            "world/model",
            &rerun::Points3D::new(positions)
                .with_colors(colors)
                .with_radii([0.002f32]),
        ) {
            warn!("failed to log model cloud: {}", e);
        }
    }

    /// The current frame, moved into the model frame by the tracked
    /// pose and dimmed so the model stays readable underneath.
    fn log_frame(&self, frame: &PointCloud, result: &TickResult) {
        let frame_t = frame.transformed(&result.pose);
        let positions: Vec<[f32; 3]> =
            frame_t.positions.iter().map(|p| [p.x, p.y, p.z]).collect();
        self.rec
            .log(
                "world/frame",
                &rerun::Points3D::new(positions)
                    .with_colors([[180u8, 180, 180]])
                    .with_radii([0.001f32]),
            )
            .ok();
    }

    fn log_camera(&self, result: &TickResult, intrinsics: &PinholeIntrinsics) {
        let t = result.pose.translation;
        let q = result.pose.rotation;
        let translation = glam::Vec3::new(t.x, t.y, t.z);
        let rotation = glam::Quat::from_xyzw(q.i, q.j, q.k, q.w);

        self.rec
            .log(
                "world/camera",
                &rerun::Transform3D::from_translation_rotation(translation, rotation),
            )
            .ok();
        self.rec
            .log(
                "world/camera",
                &rerun::Pinhole::from_focal_length_and_resolution(
                    [intrinsics.fx, intrinsics.fy],
                    [intrinsics.width as f32, intrinsics.height as f32],
                ),
            )
            .ok();
    }
}
