//! Pinhole camera intrinsics.

use nalgebra::{Matrix3, Vector3};
use serde::Deserialize;

/// Pinhole intrinsics for a registered depth+color sensor.
///
/// All projections in the crate (deprojection, index-map construction,
/// projective correspondence search) go through this one type so the
/// conventions stay in a single place: `x` right, `y` down, `z` forward
/// along the optical axis.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PinholeIntrinsics {
    pub fx: f32,
    pub fy: f32,
    pub cx: f32,
    pub cy: f32,
    pub width: usize,
    pub height: usize,
}

impl PinholeIntrinsics {
    /// The intrinsics of the classic 640x480 PrimeSense-style sensors
    /// (Kinect v1, Xtion), also used by the TUM RGB-D sequences.
    pub fn primesense_default() -> Self {
        Self {
            fx: 525.0,
            fy: 525.0,
            cx: 319.5,
            cy: 239.5,
            width: 640,
            height: 480,
        }
    }

    /// Camera matrix K.
    pub fn matrix(&self) -> Matrix3<f32> {
        Matrix3::new(
            self.fx, 0.0, self.cx, //
            0.0, self.fy, self.cy, //
            0.0, 0.0, 1.0,
        )
    }

    /// Back-project pixel (u, v) at depth `z` into the camera frame.
    #[inline]
    pub fn deproject(&self, u: f32, v: f32, z: f32) -> Vector3<f32> {
        Vector3::new((u - self.cx) * z / self.fx, (v - self.cy) * z / self.fy, z)
    }

    /// Project a camera-frame point to the nearest pixel.
    ///
    /// Returns `None` for points behind the camera (`z <= 0`) or
    /// projecting outside the image bounds.
    #[inline]
    pub fn project_to_pixel(&self, p: &Vector3<f32>) -> Option<(usize, usize)> {
        if p.z <= 0.0 {
            return None;
        }
        let u = (self.fx * p.x / p.z + self.cx).round();
        let v = (self.fy * p.y / p.z + self.cy).round();
        if u < 0.0 || v < 0.0 || u >= self.width as f32 || v >= self.height as f32 {
            return None;
        }
        Some((u as usize, v as usize))
    }
}
