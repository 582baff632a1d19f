//! TUM RGB-D dataset reader.
//!
//! Sequence layout on disk:
//!
//! ```text
//! <root>/rgb.txt     # timestamp filename, '#' comments
//! <root>/depth.txt
//! <root>/rgb/*.png     8-bit RGB
//! <root>/depth/*.png   16-bit, 5000 units per meter
//! ```
//!
//! The color and depth streams are not synchronized; frames are paired
//! by nearest timestamp within a maximum offset, color stream leading.
//! The index is loaded eagerly, images are decoded per frame.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use image::ImageReader;
use tracing::info;

use crate::cloud::{ColorImage, DepthImage};

/// Raw depth units per meter in TUM RGB-D PNGs.
pub const TUM_DEPTH_SCALE: f32 = 5000.0;

/// Maximum color/depth timestamp offset accepted for a pair, seconds.
const MAX_PAIR_OFFSET_S: f64 = 0.02;

#[derive(Debug, Clone)]
struct ImageEntry {
    timestamp_s: f64,
    filename: String,
}

/// One associated color+depth sample, decoded.
#[derive(Debug, Clone)]
pub struct RgbdSample {
    pub timestamp_s: f64,
    pub color: ColorImage,
    pub depth: DepthImage,
}

/// An indexed TUM RGB-D sequence.
#[derive(Debug)]
pub struct TumDataset {
    root: PathBuf,
    pairs: Vec<(ImageEntry, ImageEntry)>,
    depth_scale: f32,
}

impl TumDataset {
    pub fn new<P: AsRef<Path>>(root: P, depth_scale: f32) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let rgb_entries = load_image_list(&root.join("rgb.txt"))?;
        let depth_entries = load_image_list(&root.join("depth.txt"))?;
        if rgb_entries.is_empty() || depth_entries.is_empty() {
            bail!("dataset at {} has no frames", root.display());
        }

        let pairs = associate(&rgb_entries, &depth_entries);
        info!(
            rgb = rgb_entries.len(),
            depth = depth_entries.len(),
            pairs = pairs.len(),
            "indexed TUM sequence at {}",
            root.display()
        );

        Ok(Self {
            root,
            pairs,
            depth_scale,
        })
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Decode the associated pair at `idx`. Blocking.
    pub fn sample(&self, idx: usize) -> Result<RgbdSample> {
        let (rgb, depth) = self
            .pairs
            .get(idx)
            .with_context(|| format!("no frame at index {}", idx))?;

        let color_path = self.root.join(&rgb.filename);
        let color_img = ImageReader::open(&color_path)
            .with_context(|| format!("opening {}", color_path.display()))?
            .decode()
            .with_context(|| format!("decoding {}", color_path.display()))?
            .to_rgb8();
        let color = ColorImage::new(
            color_img.width() as usize,
            color_img.height() as usize,
            color_img.into_raw(),
        );

        let depth_path = self.root.join(&depth.filename);
        let depth_img = ImageReader::open(&depth_path)
            .with_context(|| format!("opening {}", depth_path.display()))?
            .decode()
            .with_context(|| format!("decoding {}", depth_path.display()))?
            .to_luma16();
        let scale = self.depth_scale;
        let meters: Vec<f32> = depth_img
            .as_raw()
            .iter()
            .map(|&raw| raw as f32 / scale)
            .collect();
        let depth = DepthImage::new(
            depth_img.width() as usize,
            depth_img.height() as usize,
            meters,
        );

        Ok(RgbdSample {
            timestamp_s: rgb.timestamp_s,
            color,
            depth,
        })
    }
}

fn load_image_list(path: &Path) -> Result<Vec<ImageEntry>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading image list {}", path.display()))?;

    let mut entries = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut fields = line.split_whitespace();
        let (ts, filename) = match (fields.next(), fields.next()) {
            (Some(ts), Some(name)) => (ts, name),
            _ => continue,
        };
        entries.push(ImageEntry {
            timestamp_s: ts
                .parse()
                .with_context(|| format!("bad timestamp {:?} in {}", ts, path.display()))?,
            filename: filename.to_string(),
        });
    }
    Ok(entries)
}

/// Pair each color entry with the nearest depth entry in time, within
/// the maximum offset. Color stream leads; unmatched entries of either
/// stream are dropped.
fn associate(rgb: &[ImageEntry], depth: &[ImageEntry]) -> Vec<(ImageEntry, ImageEntry)> {
    let mut pairs = Vec::with_capacity(rgb.len());
    let mut d = 0usize;
    for r in rgb {
        // Advance while the next depth entry is closer in time.
        while d + 1 < depth.len()
            && (depth[d + 1].timestamp_s - r.timestamp_s).abs()
                <= (depth[d].timestamp_s - r.timestamp_s).abs()
        {
            d += 1;
        }
        if (depth[d].timestamp_s - r.timestamp_s).abs() <= MAX_PAIR_OFFSET_S {
            pairs.push((r.clone(), depth[d].clone()));
        }
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn entry(ts: f64) -> ImageEntry {
        ImageEntry {
            timestamp_s: ts,
            filename: format!("{}.png", ts),
        }
    }

    #[test]
    fn test_associate_picks_nearest_within_offset() {
        let rgb = vec![entry(1.000), entry(1.033), entry(1.066)];
        let depth = vec![entry(1.002), entry(1.040), entry(1.500)];
        let pairs = associate(&rgb, &depth);
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].1.timestamp_s, 1.002);
        assert_eq!(pairs[1].1.timestamp_s, 1.040);
        // 1.066 is 0.026 s from the nearest depth entry: dropped.
    }

    #[test]
    fn test_image_list_skips_comments_and_blanks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rgb.txt");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "# color images").unwrap();
        writeln!(file, "# file: sequence").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "1305031102.175304 rgb/1305031102.175304.png").unwrap();
        writeln!(file, "1305031102.211214 rgb/1305031102.211214.png").unwrap();
        drop(file);

        let entries = load_image_list(&path).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].filename, "rgb/1305031102.175304.png");
    }

    #[test]
    fn test_missing_list_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(TumDataset::new(dir.path(), TUM_DEPTH_SCALE).is_err());
    }
}
