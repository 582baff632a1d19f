//! Dataset input and model export.

pub mod ply;
pub mod tum;

pub use ply::write_ply;
pub use tum::TumDataset;
