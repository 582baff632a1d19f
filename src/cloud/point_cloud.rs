//! Columnar oriented point-cloud storage.
//!
//! Positions, normals and colors live in parallel arrays indexed by the
//! same integer slot, so the fusion scan can address a point by index
//! without chasing per-point allocations. The cloud only ever grows by
//! appending at the tail; nothing reorders or removes points short of
//! an explicit `clear`.

use nalgebra::{Isometry3, Point3, Vector3};

/// An oriented, colored point cloud in columnar layout.
///
/// Invariants: all three columns have equal length, and every stored
/// normal has unit magnitude.
#[derive(Debug, Clone, Default)]
pub struct PointCloud {
    pub positions: Vec<Vector3<f32>>,
    pub normals: Vec<Vector3<f32>>,
    /// RGB, each channel in [0, 1].
    pub colors: Vec<Vector3<f32>>,
}

impl PointCloud {
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty cloud with room for `capacity` points in every column.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            positions: Vec::with_capacity(capacity),
            normals: Vec::with_capacity(capacity),
            colors: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Reserve room for `additional` more points in every column.
    pub fn reserve(&mut self, additional: usize) {
        self.positions.reserve(additional);
        self.normals.reserve(additional);
        self.colors.reserve(additional);
    }

    pub fn push(&mut self, position: Vector3<f32>, normal: Vector3<f32>, color: Vector3<f32>) {
        self.positions.push(position);
        self.normals.push(normal);
        self.colors.push(color);
    }

    /// Copy the point at `src_index` of `other` onto the tail of `self`.
    pub fn push_from(&mut self, other: &PointCloud, src_index: usize) {
        self.positions.push(other.positions[src_index]);
        self.normals.push(other.normals[src_index]);
        self.colors.push(other.colors[src_index]);
    }

    /// Bulk-append another cloud at the tail.
    pub fn append(&mut self, other: &mut PointCloud) {
        self.positions.append(&mut other.positions);
        self.normals.append(&mut other.normals);
        self.colors.append(&mut other.colors);
    }

    /// Drop all points. Keeps allocations.
    pub fn clear(&mut self) {
        self.positions.clear();
        self.normals.clear();
        self.colors.clear();
    }

    /// A copy of this cloud with positions moved by `transform` and
    /// normals rotated accordingly. Colors are unaffected.
    pub fn transformed(&self, transform: &Isometry3<f32>) -> PointCloud {
        let rotation = transform.rotation;
        PointCloud {
            // An isometry applied to a Vector3 would rotate only; go
            // through Point3 so the translation applies too.
            positions: self
                .positions
                .iter()
                .map(|p| (transform * Point3::from(*p)).coords)
                .collect(),
            normals: self.normals.iter().map(|n| rotation * n).collect(),
            colors: self.colors.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Translation3;

    fn sample_cloud() -> PointCloud {
        let mut cloud = PointCloud::new();
        cloud.push(
            Vector3::new(0.0, 0.0, 1.0),
            Vector3::new(0.0, 0.0, -1.0),
            Vector3::new(1.0, 0.0, 0.0),
        );
        cloud.push(
            Vector3::new(0.1, -0.2, 2.0),
            Vector3::new(0.0, 1.0, 0.0),
            Vector3::new(0.0, 1.0, 0.0),
        );
        cloud
    }

    #[test]
    fn test_columns_stay_parallel() {
        let mut cloud = sample_cloud();
        assert_eq!(cloud.len(), 2);
        let mut tail = sample_cloud();
        cloud.append(&mut tail);
        assert_eq!(cloud.len(), 4);
        assert_eq!(cloud.positions.len(), cloud.normals.len());
        assert_eq!(cloud.positions.len(), cloud.colors.len());
        assert!(tail.is_empty());
    }

    #[test]
    fn test_transformed_moves_positions_and_rotates_normals() {
        let cloud = sample_cloud();
        let shift = Isometry3::from_parts(
            Translation3::new(1.0, 0.0, 0.0),
            nalgebra::UnitQuaternion::identity(),
        );
        let moved = cloud.transformed(&shift);
        assert_relative_eq!(moved.positions[0].x, 1.0);
        // Pure translation leaves normals alone.
        assert_relative_eq!(moved.normals[0], cloud.normals[0]);
        assert_relative_eq!(moved.colors[1], cloud.colors[1]);

        let quarter_turn = Isometry3::rotation(Vector3::new(0.0, std::f32::consts::FRAC_PI_2, 0.0));
        let rotated = cloud.transformed(&quarter_turn);
        // (0,0,-1) about +Y by 90 degrees lands on (-1,0,0).
        assert_relative_eq!(rotated.normals[0].x, -1.0, epsilon = 1e-6);
        assert_relative_eq!(rotated.normals[0].norm(), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_clear_empties_all_columns() {
        let mut cloud = sample_cloud();
        cloud.clear();
        assert!(cloud.is_empty());
        assert!(cloud.normals.is_empty());
        assert!(cloud.colors.is_empty());
    }
}
