//! Rigid registration of a point cloud against the current frame.

pub mod icp;

pub use icp::ProjectiveIcp;
