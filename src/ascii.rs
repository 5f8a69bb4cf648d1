//! Brightness-to-glyph mapping for ASCII-style shading.
//!
//! A glyph atlas is a single row of `len` equally wide cells, darkest glyph
//! first. A brightness in `[0, 1]` selects a cell with
//!
//! ```text
//! index = floor((b^0.4 − 0.2·random) · len)     clamped to [0, len − 1]
//! ```
//!
//! where `random` is a fixed per-instance scalar in `[0, 1]` that breaks up
//! banding. [`ASCII_WGSL`] carries the same mapping for materials that sample
//! a real atlas texture; [`preview`] uses it on the CPU to print a particle
//! state as text.

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec4};
use rand::Rng;

/// Default alphabet, darkest to brightest.
pub const DEFAULT_ALPHABET: &str = " .:-=+*#%@";

/// Exponent applied to brightness before quantization.
pub const GAMMA: f32 = 0.4;

/// Weight of the per-instance random offset.
pub const RANDOM_WEIGHT: f32 = 0.2;

/// WGSL helpers matching [`glyph_index`] and [`atlas_uv`].
pub const ASCII_WGSL: &str = r#"
fn glyph_brightness(brightness: f32, random: f32) -> f32 {
    return pow(clamp(brightness, 0.0, 1.0), 0.4) - 0.2 * random;
}

fn glyph_atlas_uv(local_uv: vec2<f32>, brightness: f32, random: f32, count: f32) -> vec2<f32> {
    let index = clamp(floor(glyph_brightness(brightness, random) * count), 0.0, count - 1.0);
    return vec2<f32>(local_uv.x / count + index / count, local_uv.y);
}
"#;

/// Adjusted brightness before quantization. May fall below zero.
#[inline]
pub fn glyph_brightness(brightness: f32, random: f32) -> f32 {
    brightness.clamp(0.0, 1.0).powf(GAMMA) - RANDOM_WEIGHT * random
}

/// Atlas cell for a brightness/random pair.
pub fn glyph_index(brightness: f32, random: f32, len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    let raw = (glyph_brightness(brightness, random) * len as f32).floor();
    raw.clamp(0.0, (len - 1) as f32) as usize
}

/// Map a quad-local UV into the atlas cell `index` of `len`.
#[inline]
pub fn atlas_uv(local_uv: Vec2, index: usize, len: usize) -> Vec2 {
    let len = len.max(1) as f32;
    Vec2::new(local_uv.x / len + index as f32 / len, local_uv.y)
}

/// Per-instance attributes for an ASCII material.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GlyphInstance {
    /// Image lookup coordinate for this instance.
    pub pixel_uv: [f32; 2],
    /// Fixed random scalar in `[0, 1)`.
    pub random: f32,
    pub _padding: f32,
}

/// One instance per cell of a `cols × rows` grid, row-major.
pub fn glyph_instances<R: Rng>(cols: u32, rows: u32, rng: &mut R) -> Vec<GlyphInstance> {
    (0..rows)
        .flat_map(|y| (0..cols).map(move |x| (x, y)))
        .map(|(x, y)| GlyphInstance {
            pixel_uv: [x as f32 / cols as f32, y as f32 / rows as f32],
            random: rng.gen(),
            _padding: 0.0,
        })
        .collect()
}

/// An alphabet of glyphs ordered by visual density.
#[derive(Debug, Clone)]
pub struct GlyphAtlas {
    glyphs: Vec<char>,
}

impl Default for GlyphAtlas {
    fn default() -> Self {
        Self::new(DEFAULT_ALPHABET)
    }
}

impl GlyphAtlas {
    pub fn new(alphabet: &str) -> Self {
        Self {
            glyphs: alphabet.chars().collect(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.glyphs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.glyphs.is_empty()
    }

    pub fn glyph(&self, brightness: f32, random: f32) -> char {
        self.glyphs
            .get(glyph_index(brightness, random, self.len()))
            .copied()
            .unwrap_or(' ')
    }
}

/// Render position texels as text on a `cols × rows` grid.
///
/// Each texel lands in the cell under its `xy` (plane `[-1, 1]²`, y up) and
/// the brightest texel per cell picks the glyph. Texels off the plane are
/// skipped.
pub fn preview(texels: &[Vec4], cols: usize, rows: usize, atlas: &GlyphAtlas) -> String {
    let mut cells = vec![0.0f32; cols * rows];
    let mut hit = vec![false; cols * rows];
    for t in texels {
        let u = (t.x + 1.0) * 0.5;
        let v = (1.0 - t.y) * 0.5;
        if !(0.0..1.0).contains(&u) || !(0.0..1.0).contains(&v) {
            continue;
        }
        let i = (u * cols as f32) as usize + (v * rows as f32) as usize * cols;
        cells[i] = cells[i].max(t.w);
        hit[i] = true;
    }

    let mut out = String::with_capacity((cols + 1) * rows);
    for row in 0..rows {
        for col in 0..cols {
            let i = col + row * cols;
            out.push(if hit[i] { atlas.glyph(cells[i], 0.0) } else { ' ' });
        }
        out.push('\n');
    }
    out
}
