//! Oriented, colored point clouds and RGB-D deprojection.

pub mod deproject;
pub mod point_cloud;

pub use deproject::{deproject_rgbd, ColorImage, DepthImage};
pub use point_cloud::PointCloud;
