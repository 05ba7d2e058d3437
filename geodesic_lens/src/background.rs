//! Equirectangular sky background
//!
//! The sky is addressed by direction:
//! u = 0.5 + atan2(z, x) / 2π, v = 0.5 - asin(y) / π.
//! Colors are kept in the image's own (sRGB) encoding.

use std::f64::consts::{PI, TAU};
use std::path::{Path, PathBuf};

use glam::DVec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Image looked up in the working directory at startup
pub const DEFAULT_BACKGROUND_PATH: &str = "galaxy.jpg";

/// Size and seed of the procedural starfield fallback
pub const NOISE_WIDTH: u32 = 2048;
pub const NOISE_HEIGHT: u32 = 1024;
pub const NOISE_SEED: u64 = 0x5eed_57a2;

#[derive(Debug, thiserror::Error)]
pub enum BackgroundError {
    #[error("failed to load background image {path:?}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("background image {0:?} has no pixels")]
    Empty(PathBuf),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Background {
    width: u32,
    height: u32,
    /// Row-major RGBA8, top row first
    rgba: Vec<u8>,
}

impl Background {
    /// Wrap raw RGBA8 pixels. `None` if the buffer does not match the size.
    pub fn from_rgba8(width: u32, height: u32, rgba: Vec<u8>) -> Option<Self> {
        let expected = width as usize * height as usize * 4;
        (width > 0 && height > 0 && rgba.len() == expected).then_some(Self {
            width,
            height,
            rgba,
        })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, BackgroundError> {
        let path = path.as_ref();
        let decoded = image::open(path).map_err(|source| BackgroundError::Decode {
            path: path.to_path_buf(),
            source,
        })?;
        let rgba = decoded.to_rgba8();
        let (width, height) = rgba.dimensions();
        Self::from_rgba8(width, height, rgba.into_raw())
            .ok_or_else(|| BackgroundError::Empty(path.to_path_buf()))
    }

    /// Seeded starfield on a dark sky
    pub fn noise(width: u32, height: u32, seed: u64) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        let mut rng = StdRng::seed_from_u64(seed);
        let mut rgba = Vec::with_capacity(width as usize * height as usize * 4);

        for y in 0..height {
            // Faint band toward the equator
            let latitude = (y as f32 + 0.5) / height as f32 - 0.5;
            let band = (-(latitude * 6.0).powi(2)).exp();
            for _ in 0..width {
                let base = 6.0 + 18.0 * band + rng.gen_range(0.0..4.0);
                let mut color = [base * 0.8, base * 0.85, base * 1.2];
                if rng.gen::<f32>() < 0.002 + 0.004 * band {
                    let brightness = rng.gen_range(120.0..255.0);
                    let tint = rng.gen_range(0.75..1.0);
                    color = [brightness * tint, brightness * 0.95, brightness];
                }
                rgba.extend(color.iter().map(|&c| c.clamp(0.0, 255.0) as u8));
                rgba.push(255);
            }
        }

        Self {
            width,
            height,
            rgba,
        }
    }

    /// The image at `path`, or the procedural starfield if it cannot be used
    pub fn load_or_noise(path: impl AsRef<Path>) -> Self {
        match Self::load(path.as_ref()) {
            Ok(background) => {
                log::info!(
                    "Loaded background {:?} ({}x{})",
                    path.as_ref(),
                    background.width,
                    background.height
                );
                background
            }
            Err(err) => {
                log::warn!("{err}; generating procedural starfield");
                Self::noise(NOISE_WIDTH, NOISE_HEIGHT, NOISE_SEED)
            }
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn rgba8(&self) -> &[u8] {
        &self.rgba
    }

    /// Copy no larger than `max_dimension` on either side, for GPU upload
    pub fn fitted(&self, max_dimension: u32) -> Self {
        let largest = self.width.max(self.height);
        if largest <= max_dimension {
            return self.clone();
        }
        let scale = max_dimension as f64 / largest as f64;
        let width = ((self.width as f64 * scale).round() as u32).clamp(1, max_dimension);
        let height = ((self.height as f64 * scale).round() as u32).clamp(1, max_dimension);
        let source = image::RgbaImage::from_raw(self.width, self.height, self.rgba.clone())
            .unwrap_or_else(|| image::RgbaImage::new(self.width, self.height));
        let resized = image::imageops::resize(&source, width, height, image::imageops::FilterType::Triangle);
        log::info!(
            "Background downscaled from {}x{} to {}x{}",
            self.width,
            self.height,
            width,
            height
        );
        Self {
            width,
            height,
            rgba: resized.into_raw(),
        }
    }

    /// Nearest-texel color along `direction`, channels in [0, 1]
    pub fn sample(&self, direction: DVec3) -> [f32; 3] {
        let (u, v) = direction_to_uv(direction);
        let x = ((u * self.width as f64).floor() as i64).rem_euclid(self.width as i64) as usize;
        let y = ((v * self.height as f64).floor() as i64).clamp(0, self.height as i64 - 1) as usize;
        let i = (y * self.width as usize + x) * 4;
        [
            self.rgba[i] as f32 / 255.0,
            self.rgba[i + 1] as f32 / 255.0,
            self.rgba[i + 2] as f32 / 255.0,
        ]
    }
}

/// Equirectangular texture coordinates of a direction
pub fn direction_to_uv(direction: DVec3) -> (f64, f64) {
    let d = direction.normalize_or_zero();
    let u = 0.5 + d.z.atan2(d.x) / TAU;
    let v = 0.5 - d.y.clamp(-1.0, 1.0).asin() / PI;
    (u, v)
}
