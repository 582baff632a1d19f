//! PLY export of the fused model.
//!
//! Binary little-endian PLY with position, normal and 8-bit color per
//! vertex, readable by MeshLab/CloudCompare.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};

use crate::cloud::PointCloud;

/// Write the cloud to `path` as binary little-endian PLY.
pub fn write_ply<P: AsRef<Path>>(cloud: &PointCloud, path: P) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path)
        .with_context(|| format!("creating PLY file {}", path.display()))?;
    let mut out = BufWriter::new(file);

    write!(
        out,
        "ply\n\
         format binary_little_endian 1.0\n\
         element vertex {}\n\
         property float x\n\
         property float y\n\
         property float z\n\
         property float nx\n\
         property float ny\n\
         property float nz\n\
         property uchar red\n\
         property uchar green\n\
         property uchar blue\n\
         end_header\n",
        cloud.len()
    )?;

    for i in 0..cloud.len() {
        for v in [&cloud.positions[i], &cloud.normals[i]] {
            for c in 0..3 {
                out.write_all(&v[c].to_le_bytes())?;
            }
        }
        for c in 0..3 {
            let channel = (cloud.colors[i][c].clamp(0.0, 1.0) * 255.0).round() as u8;
            out.write_all(&[channel])?;
        }
    }

    out.flush()
        .with_context(|| format!("writing PLY file {}", path.display()))?;
    Ok(())
}
