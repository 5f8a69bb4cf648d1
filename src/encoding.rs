//! State textures: `N × N` grids of four-channel float texels.
//!
//! Texel `i` belongs to particle `i` and sits at `(i % N, i / N)`.
//!
//! - Position textures hold `(x, y, z, brightness)`.
//! - Velocity textures hold `(vx, vy, vz, 1)`.
//!
//! Point sets are mapped into world space with a fixed convention: the image
//! square `[0, 1)²` becomes `[-1, 1)²` centred on the origin, with `v` flipped
//! so the top of the image is `+y`.

use bytemuck::Zeroable;
use glam::{Vec2, Vec4};
use rand::Rng;

use crate::sampling::{Point, PointSet};

/// Which simulation variable a texture carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureKind {
    Position,
    Velocity,
}

/// World-space texel for a sampled point.
#[inline]
pub fn encode_point(p: &Point) -> Vec4 {
    Vec4::new(2.0 * (p.u - 0.5), -2.0 * (p.v - 0.5), 0.0, p.brightness)
}

/// Inverse of [`encode_point`].
#[inline]
pub fn decode_point(texel: Vec4) -> Point {
    Point {
        u: texel.x * 0.5 + 0.5,
        v: 0.5 - texel.y * 0.5,
        brightness: texel.w,
    }
}

/// A fixed-size grid of RGBA32F texels.
#[derive(Debug, Clone, PartialEq)]
pub struct StateTexture {
    kind: TextureKind,
    size: u32,
    texels: Vec<Vec4>,
}

impl StateTexture {
    /// A texture with every texel set to `(0, 0, 0, 1)`.
    pub fn new(kind: TextureKind, size: u32) -> Self {
        Self {
            kind,
            size,
            texels: vec![Vec4::W; (size * size) as usize],
        }
    }

    /// Encode a point set as a position texture.
    ///
    /// # Panics
    ///
    /// Panics if `points.len() != size²`.
    pub fn from_points(points: &PointSet, size: u32) -> Self {
        assert_eq!(
            points.len(),
            (size * size) as usize,
            "Point set does not match texture size"
        );
        Self {
            kind: TextureKind::Position,
            size,
            texels: points.iter().map(encode_point).collect(),
        }
    }

    /// Uniform random positions on the `[-1, 1]²` plane at `z = 0`, alpha 1.
    pub fn random_positions<R: Rng>(size: u32, rng: &mut R) -> Self {
        let texels = (0..size * size)
            .map(|_| {
                Vec4::new(
                    2.0 * (rng.gen::<f32>() - 0.5),
                    2.0 * (rng.gen::<f32>() - 0.5),
                    0.0,
                    1.0,
                )
            })
            .collect();
        Self {
            kind: TextureKind::Position,
            size,
            texels,
        }
    }

    /// Uniform random velocities in `[-0.005, 0.005]²` at `z = 0`, w = 1.
    pub fn random_velocities<R: Rng>(size: u32, rng: &mut R) -> Self {
        let texels = (0..size * size)
            .map(|_| {
                Vec4::new(
                    0.01 * (rng.gen::<f32>() - 0.5),
                    0.01 * (rng.gen::<f32>() - 0.5),
                    0.0,
                    1.0,
                )
            })
            .collect();
        Self {
            kind: TextureKind::Velocity,
            size,
            texels,
        }
    }

    #[inline]
    pub fn kind(&self) -> TextureKind {
        self.kind
    }

    /// Texels per axis.
    #[inline]
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Total texel count (`size²`).
    #[inline]
    pub fn len(&self) -> usize {
        self.texels.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.texels.is_empty()
    }

    #[inline]
    pub fn texel(&self, index: usize) -> Vec4 {
        self.texels[index]
    }

    #[inline]
    pub fn set_texel(&mut self, index: usize, value: Vec4) {
        self.texels[index] = value;
    }

    pub fn texels(&self) -> &[Vec4] {
        &self.texels
    }

    pub fn texels_mut(&mut self) -> &mut [Vec4] {
        &mut self.texels
    }

    /// Grid coordinates of texel `index`.
    #[inline]
    pub fn coords_of(&self, index: usize) -> (u32, u32) {
        let i = index as u32;
        (i % self.size, i / self.size)
    }

    /// Texel index of in-range coordinates.
    #[inline]
    pub fn index_of(&self, x: u32, y: u32) -> usize {
        (x + y * self.size) as usize
    }

    /// Texel index with toroidal wrapping on both axes.
    #[inline]
    pub fn wrapped_index(&self, x: i64, y: i64) -> usize {
        let n = self.size as i64;
        let x = x.rem_euclid(n) as u32;
        let y = y.rem_euclid(n) as u32;
        self.index_of(x, y)
    }

    /// Normalized lookup coordinate for texel `index`, as used by the renderer.
    #[inline]
    pub fn reference_uv(&self, index: usize) -> Vec2 {
        let (x, y) = self.coords_of(index);
        Vec2::new(x as f32, y as f32) / self.size as f32
    }

    /// Raw bytes for GPU upload (16 bytes per texel, row-major).
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.texels)
    }

    /// Rebuild a texture from bytes read back from the GPU.
    ///
    /// Returns `None` if the byte count does not match `size²` texels.
    pub fn from_bytes(kind: TextureKind, size: u32, bytes: &[u8]) -> Option<Self> {
        let count = (size * size) as usize;
        if bytes.len() != count * std::mem::size_of::<Vec4>() {
            return None;
        }
        let mut texels = vec![Vec4::zeroed(); count];
        bytemuck::cast_slice_mut::<Vec4, u8>(&mut texels).copy_from_slice(bytes);
        Some(Self { kind, size, texels })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn points(size: u32) -> PointSet {
        let count = (size * size) as usize;
        let pts = (0..count)
            .map(|i| Point {
                u: i as f32 / count as f32,
                v: 1.0 - (i as f32 + 1.0) / count as f32,
                brightness: (i % 3) as f32 / 2.0,
            })
            .collect();
        PointSet::from_points(pts, count).unwrap()
    }

    #[test]
    fn test_position_encode_convention() {
        let tex = StateTexture::from_points(&points(4), 4);
        assert_eq!(tex.kind(), TextureKind::Position);
        for (i, p) in points(4).iter().enumerate() {
            let t = tex.texel(i);
            assert_eq!(t, Vec4::new(2.0 * (p.u - 0.5), -2.0 * (p.v - 0.5), 0.0, p.brightness));
        }
    }

    #[test]
    fn test_top_left_maps_to_upper_left_world() {
        let p = Point {
            u: 0.0,
            v: 0.0,
            brightness: 1.0,
        };
        assert_eq!(encode_point(&p), Vec4::new(-1.0, 1.0, 0.0, 1.0));
    }

    #[test]
    fn test_decode_inverts_encode() {
        let p = Point {
            u: 0.25,
            v: 0.75,
            brightness: 0.5,
        };
        assert_eq!(decode_point(encode_point(&p)), p);
    }

    #[test]
    fn test_random_ranges() {
        let mut rng = SmallRng::seed_from_u64(4);
        let pos = StateTexture::random_positions(16, &mut rng);
        let vel = StateTexture::random_velocities(16, &mut rng);

        for t in pos.texels() {
            assert!(t.x >= -1.0 && t.x <= 1.0);
            assert!(t.y >= -1.0 && t.y <= 1.0);
            assert_eq!(t.z, 0.0);
            assert_eq!(t.w, 1.0);
        }
        for t in vel.texels() {
            assert!(t.x.abs() <= 0.005);
            assert!(t.y.abs() <= 0.005);
            assert_eq!(t.z, 0.0);
            assert_eq!(t.w, 1.0);
        }
        assert_eq!(vel.kind(), TextureKind::Velocity);
    }

    #[test]
    fn test_addressing() {
        let tex = StateTexture::new(TextureKind::Position, 8);
        assert_eq!(tex.coords_of(0), (0, 0));
        assert_eq!(tex.coords_of(9), (1, 1));
        assert_eq!(tex.coords_of(63), (7, 7));
        assert_eq!(tex.index_of(3, 2), 19);
        assert_eq!(tex.reference_uv(9), Vec2::new(0.125, 0.125));
    }

    #[test]
    fn test_wrapping_is_toroidal() {
        let tex = StateTexture::new(TextureKind::Velocity, 8);
        assert_eq!(tex.wrapped_index(-1, 0), tex.index_of(7, 0));
        assert_eq!(tex.wrapped_index(8, 8), tex.index_of(0, 0));
        assert_eq!(tex.wrapped_index(3, -9), tex.index_of(3, 7));
    }

    #[test]
    fn test_bytes_roundtrip() {
        let mut rng = SmallRng::seed_from_u64(8);
        let tex = StateTexture::random_positions(4, &mut rng);
        assert_eq!(tex.as_bytes().len(), 16 * 16);
        let back = StateTexture::from_bytes(TextureKind::Position, 4, tex.as_bytes()).unwrap();
        assert_eq!(back, tex);
        assert!(StateTexture::from_bytes(TextureKind::Position, 4, &[0u8; 12]).is_none());
    }
}
