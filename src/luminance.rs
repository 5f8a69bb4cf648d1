//! Brightness grids derived from source images.
//!
//! Every target image is reduced to a small square grid before sampling.
//! Only the red channel is read, matching how the particle field treats
//! grayscale artwork: a white pixel is fully bright, a black pixel is empty.

use std::path::Path;

use image::imageops::{self, FilterType};
use image::DynamicImage;

use crate::error::SampleError;

/// Default grid resolution. `GRID_SIZE²` is also the particle count.
pub const GRID_SIZE: u32 = 64;

/// A square grid of normalized brightness values in `[0, 1]`.
///
/// Cells are addressed as `(x, y)` with `x` running left to right and `y`
/// top to bottom, the same orientation as the source image.
#[derive(Debug, Clone, PartialEq)]
pub struct LuminanceField {
    size: u32,
    values: Vec<f32>,
}

impl LuminanceField {
    /// Downsample a decoded image to `size × size` and read its red channel.
    ///
    /// # Panics
    ///
    /// Panics if `size` is zero.
    pub fn from_image(img: &DynamicImage, size: u32) -> Self {
        assert!(size > 0, "Luminance grid size must be non-zero");
        let rgba = img.to_rgba8();
        let small = imageops::resize(&rgba, size, size, FilterType::Triangle);

        let mut values = Vec::with_capacity((size * size) as usize);
        for y in 0..size {
            for x in 0..size {
                values.push(small.get_pixel(x, y)[0] as f32 / 255.0);
            }
        }

        Self { size, values }
    }

    /// Decode an encoded image (PNG, JPEG) held in memory.
    pub fn from_bytes(bytes: &[u8], size: u32) -> Result<Self, SampleError> {
        let img = image::load_from_memory(bytes)?;
        check_dimensions(&img)?;
        Ok(Self::from_image(&img, size))
    }

    /// Read and decode an image file.
    pub fn open<P: AsRef<Path>>(path: P, size: u32) -> Result<Self, SampleError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| SampleError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let img = image::load_from_memory(&bytes).map_err(|source| SampleError::ImageDecode {
            path: path.to_path_buf(),
            source,
        })?;
        check_dimensions(&img)?;
        Ok(Self::from_image(&img, size))
    }

    /// Build a field from a function of cell coordinates.
    ///
    /// Values are clamped into `[0, 1]`. Mostly useful for synthetic targets.
    pub fn from_fn<F>(size: u32, f: F) -> Self
    where
        F: Fn(u32, u32) -> f32,
    {
        assert!(size > 0, "Luminance grid size must be non-zero");
        let mut values = Vec::with_capacity((size * size) as usize);
        for y in 0..size {
            for x in 0..size {
                values.push(f(x, y).clamp(0.0, 1.0));
            }
        }
        Self { size, values }
    }

    /// A field with the same brightness everywhere.
    pub fn uniform(size: u32, value: f32) -> Self {
        Self::from_fn(size, |_, _| value)
    }

    /// Grid resolution per axis.
    #[inline]
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Brightness of cell `(x, y)`.
    #[inline]
    pub fn get(&self, x: u32, y: u32) -> f32 {
        self.values[(x + y * self.size) as usize]
    }

    /// Brightness at normalized coordinates `(u, v)`.
    ///
    /// The cell is `(floor(u·N), floor(v·N))`; no interpolation. Coordinates
    /// outside `[0, 1)` are clamped to the border cells.
    pub fn sample(&self, u: f32, v: f32) -> f32 {
        let max = self.size as i64 - 1;
        let x = ((u * self.size as f32).floor() as i64).clamp(0, max) as u32;
        let y = ((v * self.size as f32).floor() as i64).clamp(0, max) as u32;
        self.get(x, y)
    }

    /// Average brightness over the whole grid.
    pub fn mean(&self) -> f32 {
        self.values.iter().sum::<f32>() / self.values.len() as f32
    }
}

fn check_dimensions(img: &DynamicImage) -> Result<(), SampleError> {
    if img.width() == 0 || img.height() == 0 {
        return Err(SampleError::Empty {
            width: img.width(),
            height: img.height(),
        });
    }
    Ok(())
}
