use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use thiserror::Error;

/// Edge length of the luminance grid kept per tile
const SAMPLE_SIZE: u32 = 64;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("tile image {path} could not be loaded: {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("tile image {path} has no pixels")]
    Empty { path: PathBuf },
}

/// Downsampled luminance of a tile image, row-major
#[derive(Clone, Debug, PartialEq)]
pub struct TileImage {
    width: u32,
    height: u32,
    luma: Vec<u8>,
}

impl TileImage {
    /// Returns `None` when `luma` does not hold `width * height` samples
    pub fn new(width: u32, height: u32, luma: Vec<u8>) -> Option<Self> {
        if width == 0 || height == 0 || luma.len() != (width * height) as usize {
            return None;
        }
        Some(Self { width, height, luma })
    }

    /// Uniform image, handy for headless probes
    pub fn flat(value: u8) -> Self {
        Self {
            width: 1,
            height: 1,
            luma: vec![value],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Nearest sample at normalized (u, v), both clamped to [0, 1].
    /// v = 0 is the top (north) edge.
    #[inline(always)]
    pub fn sample(&self, u: f64, v: f64) -> u8 {
        let x = ((u.clamp(0.0, 1.0) * self.width as f64) as u32).min(self.width - 1);
        let y = ((v.clamp(0.0, 1.0) * self.height as f64) as u32).min(self.height - 1);
        self.luma[(y * self.width + x) as usize]
    }
}

/// Existence check for a tile image, performed by attempting a load.
/// Implementations run off the event loop, so they must be thread-safe.
pub trait TileProbe: Send + Sync {
    fn load(&self, path: &Path) -> Result<TileImage, ProbeError>;
}

/// Decodes tile images from disk with the `image` crate
#[derive(Clone, Copy, Debug, Default)]
pub struct ImageProbe;

impl TileProbe for ImageProbe {
    fn load(&self, path: &Path) -> Result<TileImage, ProbeError> {
        let decoded = image::open(path).map_err(|source| ProbeError::Load {
            path: path.to_path_buf(),
            source,
        })?;
        if decoded.width() == 0 || decoded.height() == 0 {
            return Err(ProbeError::Empty {
                path: path.to_path_buf(),
            });
        }

        let luma = decoded.to_luma8();
        let small = image::imageops::resize(&luma, SAMPLE_SIZE, SAMPLE_SIZE, FilterType::Triangle);
        let (width, height) = small.dimensions();
        TileImage::new(width, height, small.into_raw()).ok_or_else(|| ProbeError::Empty {
            path: path.to_path_buf(),
        })
    }
}
