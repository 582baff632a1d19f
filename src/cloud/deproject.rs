//! RGB-D image pair to oriented point cloud.
//!
//! Reconstructs an unorganized cloud from a registered depth+color pair:
//! every pixel with valid depth back-projects through the pinhole model,
//! takes its color from the RGB image and its normal from the
//! central-difference tangents of the depth image. Pixels with invalid
//! depth or a degenerate neighborhood yield no point.

use nalgebra::Vector3;

use crate::camera::PinholeIntrinsics;
use crate::cloud::PointCloud;

/// Depth image in meters. Values `<= 0` or non-finite are invalid.
#[derive(Debug, Clone)]
pub struct DepthImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<f32>,
}

impl DepthImage {
    pub fn new(width: usize, height: usize, data: Vec<f32>) -> Self {
        assert_eq!(data.len(), width * height, "depth buffer size mismatch");
        Self {
            width,
            height,
            data,
        }
    }

    #[inline]
    fn at(&self, x: usize, y: usize) -> f32 {
        self.data[y * self.width + x]
    }
}

/// Interleaved 8-bit RGB image.
#[derive(Debug, Clone)]
pub struct ColorImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl ColorImage {
    pub fn new(width: usize, height: usize, data: Vec<u8>) -> Self {
        assert_eq!(data.len(), width * height * 3, "color buffer size mismatch");
        Self {
            width,
            height,
            data,
        }
    }

    #[inline]
    fn at(&self, x: usize, y: usize) -> Vector3<f32> {
        let i = (y * self.width + x) * 3;
        Vector3::new(
            self.data[i] as f32 / 255.0,
            self.data[i + 1] as f32 / 255.0,
            self.data[i + 2] as f32 / 255.0,
        )
    }
}

#[inline]
fn valid_depth(z: f32) -> bool {
    z.is_finite() && z > 0.0
}

/// Reconstruct an oriented, colored cloud from a registered RGB-D pair.
///
/// The depth and color images must share the sensor resolution given in
/// `intrinsics`. Normals are oriented toward the camera.
pub fn deproject_rgbd(
    depth: &DepthImage,
    color: &ColorImage,
    intrinsics: &PinholeIntrinsics,
) -> PointCloud {
    let (w, h) = (intrinsics.width, intrinsics.height);
    assert_eq!((depth.width, depth.height), (w, h), "depth resolution mismatch");
    assert_eq!((color.width, color.height), (w, h), "color resolution mismatch");

    // Organized 3D image first; normals need the 3D neighbors.
    let mut grid: Vec<Option<Vector3<f32>>> = vec![None; w * h];
    for y in 0..h {
        for x in 0..w {
            let z = depth.at(x, y);
            if valid_depth(z) {
                grid[y * w + x] = Some(intrinsics.deproject(x as f32, y as f32, z));
            }
        }
    }

    let mut cloud = PointCloud::with_capacity(w * h);
    for y in 1..h.saturating_sub(1) {
        for x in 1..w.saturating_sub(1) {
            let p = match grid[y * w + x] {
                Some(p) => p,
                None => continue,
            };
            let (left, right) = (grid[y * w + x - 1], grid[y * w + x + 1]);
            let (up, down) = (grid[(y - 1) * w + x], grid[(y + 1) * w + x]);
            let (left, right, up, down) = match (left, right, up, down) {
                (Some(l), Some(r), Some(u), Some(d)) => (l, r, u, d),
                _ => continue,
            };

            let du = right - left;
            let dv = down - up;
            let mut normal = du.cross(&dv);
            let norm = normal.norm();
            if norm < 1e-12 {
                continue;
            }
            normal /= norm;
            // Orient toward the camera at the origin.
            if normal.dot(&p) > 0.0 {
                normal = -normal;
            }

            cloud.push(p, normal, color.at(x, y));
        }
    }
    cloud
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

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

    fn flat_wall(intr: &PinholeIntrinsics, z: f32) -> (DepthImage, ColorImage) {
        let n = intr.width * intr.height;
        (
            DepthImage::new(intr.width, intr.height, vec![z; n]),
            ColorImage::new(intr.width, intr.height, vec![128; n * 3]),
        )
    }

    #[test]
    fn test_flat_wall_normals_face_camera() {
        let intr = small_intrinsics();
        let (depth, color) = flat_wall(&intr, 2.0);
        let cloud = deproject_rgbd(&depth, &color, &intr);

        // Border pixels have no full neighborhood, interior ones all do.
        assert_eq!(cloud.len(), (intr.width - 2) * (intr.height - 2));
        for (p, n) in cloud.positions.iter().zip(&cloud.normals) {
            assert_relative_eq!(p.z, 2.0);
            assert_relative_eq!(n.norm(), 1.0, epsilon = 1e-6);
            // A frontoparallel wall normal points straight back at the camera.
            assert_relative_eq!(n.z, -1.0, epsilon = 1e-5);
        }
        assert_relative_eq!(cloud.colors[0].x, 128.0 / 255.0, epsilon = 1e-6);
    }

    #[test]
    fn test_invalid_depth_yields_no_point() {
        let intr = small_intrinsics();
        let (mut depth, color) = flat_wall(&intr, 1.0);
        // Knock out one interior pixel; it and its four neighbors lose
        // their full neighborhood.
        depth.data[3 * intr.width + 3] = 0.0;
        let cloud = deproject_rgbd(&depth, &color, &intr);
        assert_eq!(cloud.len(), (intr.width - 2) * (intr.height - 2) - 5);
    }

    #[test]
    fn test_nan_depth_yields_no_point() {
        let intr = small_intrinsics();
        let (mut depth, color) = flat_wall(&intr, 1.0);
        depth.data[2 * intr.width + 2] = f32::NAN;
        let cloud = deproject_rgbd(&depth, &color, &intr);
        assert!(cloud.len() < (intr.width - 2) * (intr.height - 2));
    }
}
