//! Projective index maps.
//!
//! An index map is the dense per-pixel lookup table that links image
//! space back to a point cloud: each cell holds the index of the cloud
//! point projecting there, or the empty sentinel. Fusion asks for one
//! map of the frame and one of the model, both in the sensor-view
//! frame, and classifies every pixel from the pair.

use nalgebra::Vector3;

use crate::camera::PinholeIntrinsics;

/// Sentinel for a cell no point projects into.
pub const EMPTY: usize = usize::MAX;

/// Dense width x height grid of optional point indices.
#[derive(Debug, Clone)]
pub struct IndexMap {
    width: usize,
    height: usize,
    cells: Vec<usize>,
}

impl IndexMap {
    pub fn empty(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            cells: vec![EMPTY; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Point index at pixel (x, y), or `None` for an empty cell.
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> Option<usize> {
        match self.cells[y * self.width + x] {
            EMPTY => None,
            index => Some(index),
        }
    }

    #[inline]
    fn set(&mut self, x: usize, y: usize, index: usize) {
        self.cells[y * self.width + x] = index;
    }

    /// Pixels holding a point index.
    pub fn occupied(&self) -> usize {
        self.cells.iter().filter(|&&c| c != EMPTY).count()
    }
}

/// Project every cloud point into the image grid and record, per pixel,
/// the index of the point that lands there.
///
/// Projection is many-to-one; when several points hit the same pixel the
/// one nearest the camera wins, with ties broken toward the lower point
/// index. The scan is sequential so the outcome is deterministic.
pub fn project_to_index_map(
    points: &[Vector3<f32>],
    intrinsics: &PinholeIntrinsics,
) -> IndexMap {
    let mut map = IndexMap::empty(intrinsics.width, intrinsics.height);
    let mut depths = vec![f32::INFINITY; intrinsics.width * intrinsics.height];

    for (index, p) in points.iter().enumerate() {
        let (x, y) = match intrinsics.project_to_pixel(p) {
            Some(pixel) => pixel,
            None => continue,
        };
        let cell = y * intrinsics.width + x;
        if p.z < depths[cell] {
            depths[cell] = p.z;
            map.set(x, y, index);
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;

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

    #[test]
    fn test_single_point_lands_in_its_pixel() {
        let intr = small_intrinsics();
        let points = vec![intr.deproject(3.0, 5.0, 1.0)];
        let map = project_to_index_map(&points, &intr);
        assert_eq!(map.get(3, 5), Some(0));
        assert_eq!(map.occupied(), 1);
    }

    #[test]
    fn test_nearest_to_camera_wins() {
        let intr = small_intrinsics();
        // Two points on the same viewing ray; the nearer one must win
        // regardless of insertion order.
        let near = intr.deproject(2.0, 2.0, 1.0);
        let far = intr.deproject(2.0, 2.0, 3.0);

        let map = project_to_index_map(&[far, near], &intr);
        assert_eq!(map.get(2, 2), Some(1));
        let map = project_to_index_map(&[near, far], &intr);
        assert_eq!(map.get(2, 2), Some(0));
    }

    #[test]
    fn test_equal_depth_keeps_lower_index() {
        let intr = small_intrinsics();
        let p = intr.deproject(4.0, 4.0, 2.0);
        let map = project_to_index_map(&[p, p], &intr);
        assert_eq!(map.get(4, 4), Some(0));
    }

    #[test]
    fn test_points_behind_camera_are_skipped() {
        let intr = small_intrinsics();
        let map = project_to_index_map(&[Vector3::new(0.0, 0.0, -1.0)], &intr);
        assert_eq!(map.occupied(), 0);
    }
}
