//! Brightness-weighted point placement.
//!
//! Points are generated with a variable-density Poisson-disk sampler. The
//! spacing around every point is looked up in a [`LuminanceField`]: bright
//! cells pack points tightly, dark cells spread them out. The raw candidate
//! set is then shuffled and cut to exactly `N²` points so that it fits the
//! `N × N` state textures one texel per particle.
//!
//! # Example
//!
//! ```ignore
//! use ipme::sampling::{sample_image, SamplerConfig};
//!
//! let (points, report) = sample_image("img/a.png", &SamplerConfig::default().with_seed(7))?;
//! assert_eq!(points.len(), 64 * 64);
//! if let Some(underflow) = report.underflow {
//!     println!("padded {} points", underflow.missing());
//! }
//! ```

use std::f32::consts::{SQRT_2, TAU};
use std::ops::Index;
use std::path::Path;

use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::error::SampleError;
use crate::luminance::{LuminanceField, GRID_SIZE};

/// Largest coordinate strictly below 1.0.
const MAX_COORD: f32 = 1.0 - f32::EPSILON;

/// A placed particle: normalized image coordinates plus the brightness there.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    /// Horizontal coordinate in `[0, 1)`, left to right.
    pub u: f32,
    /// Vertical coordinate in `[0, 1)`, top to bottom.
    pub v: f32,
    /// Brightness of the luminance cell under `(u, v)`.
    pub brightness: f32,
}

/// A raw disk-sampling output before shuffling, with its local spacing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub u: f32,
    pub v: f32,
    /// Minimum distance this point demands from its neighbours.
    pub spacing: f32,
}

/// Configuration for the disk sampler.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplerConfig {
    /// Luminance grid resolution; the point set holds `grid_size²` points.
    pub grid_size: u32,
    /// Spacing used in fully bright cells.
    pub min_distance: f32,
    /// Spacing used in fully dark cells.
    pub max_distance: f32,
    /// Attempts per active point before it is retired.
    pub tries: u32,
    /// Fixed seed for reproducible sampling. `None` draws from entropy.
    pub seed: Option<u64>,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            grid_size: GRID_SIZE,
            min_distance: 2.0 / 400.0,
            max_distance: 10.0 / 400.0,
            tries: 20,
            seed: None,
        }
    }
}

impl SamplerConfig {
    /// Use a fixed RNG seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set the luminance grid resolution.
    pub fn with_grid_size(mut self, size: u32) -> Self {
        self.grid_size = size;
        self
    }

    /// Set the spacing range. Values are reordered if given backwards.
    pub fn with_distance(mut self, min: f32, max: f32) -> Self {
        self.min_distance = min.min(max);
        self.max_distance = min.max(max);
        self
    }

    /// Set the retry budget per active point.
    pub fn with_tries(mut self, tries: u32) -> Self {
        self.tries = tries.max(1);
        self
    }

    /// Number of points in every generated [`PointSet`].
    #[inline]
    pub fn point_count(&self) -> usize {
        (self.grid_size * self.grid_size) as usize
    }

    /// Local spacing for a given brightness. Brighter means tighter.
    #[inline]
    pub fn spacing(&self, brightness: f32) -> f32 {
        let b = brightness.clamp(0.0, 1.0);
        self.max_distance - (self.max_distance - self.min_distance) * b
    }

    fn rng(&self) -> SmallRng {
        match self.seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_entropy(),
        }
    }
}

/// The sampler produced fewer candidates than the state texture has texels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Underflow {
    pub produced: usize,
    pub required: usize,
}

impl Underflow {
    /// How many points were synthesized by padding.
    pub fn missing(&self) -> usize {
        self.required - self.produced
    }
}

/// Statistics from one sampling call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplingReport {
    /// Size of the raw disk-sampling output.
    pub candidates: usize,
    /// Set when padding was needed.
    pub underflow: Option<Underflow>,
}

/// An ordered set of exactly `N²` points.
#[derive(Debug, Clone, PartialEq)]
pub struct PointSet {
    points: Vec<Point>,
}

impl PointSet {
    /// Shuffle, then truncate or pad `candidates` to exactly `count` points.
    ///
    /// Shuffling first keeps the survivors spatially uniform: disk sampling
    /// emits points in growth order, so a plain truncation would keep one
    /// connected blob. Underflow is filled by cycling through the shuffled
    /// points and jittering each copy by up to half of `jitter` on each axis.
    pub fn from_candidates<R: Rng>(
        mut candidates: Vec<Candidate>,
        count: usize,
        field: &LuminanceField,
        jitter: f32,
        rng: &mut R,
    ) -> (Self, Option<Underflow>) {
        candidates.shuffle(rng);
        candidates.truncate(count);

        let mut points: Vec<Point> = candidates
            .iter()
            .map(|c| Point {
                u: c.u,
                v: c.v,
                brightness: field.sample(c.u, c.v),
            })
            .collect();

        let produced = points.len();
        let underflow = if produced < count {
            Some(Underflow {
                produced,
                required: count,
            })
        } else {
            None
        };

        while points.len() < count {
            let (u, v) = if produced == 0 {
                (rng.gen_range(0.0..1.0), rng.gen_range(0.0..1.0))
            } else {
                let source = points[(points.len() - produced) % produced];
                let du = (rng.gen::<f32>() - 0.5) * jitter;
                let dv = (rng.gen::<f32>() - 0.5) * jitter;
                (
                    (source.u + du).clamp(0.0, MAX_COORD),
                    (source.v + dv).clamp(0.0, MAX_COORD),
                )
            };
            points.push(Point {
                u,
                v,
                brightness: field.sample(u, v),
            });
        }

        (Self { points }, underflow)
    }

    /// Wrap an existing point list. Returns `None` if the length is wrong.
    pub fn from_points(points: Vec<Point>, count: usize) -> Option<Self> {
        (points.len() == count).then_some(Self { points })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Point> {
        self.points.iter()
    }

    pub fn as_slice(&self) -> &[Point] {
        &self.points
    }
}

impl Index<usize> for PointSet {
    type Output = Point;

    fn index(&self, index: usize) -> &Point {
        &self.points[index]
    }
}

impl<'a> IntoIterator for &'a PointSet {
    type Item = &'a Point;
    type IntoIter = std::slice::Iter<'a, Point>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}

/// Variable-density Poisson-disk sampler over the unit square.
///
/// Uses a background grid with cells of `min_distance / √2`, so each cell
/// holds at most one accepted point. A candidate at distance `d` from an
/// existing point is accepted only if `d ≥ min(spacing_a, spacing_b)`.
pub struct DiskSampler<'a, R: Rng> {
    field: &'a LuminanceField,
    config: &'a SamplerConfig,
    rng: &'a mut R,
    cell_size: f32,
    grid_width: usize,
    grid: Vec<u32>,
    accepted: Vec<Candidate>,
    active: Vec<usize>,
}

impl<'a, R: Rng> DiskSampler<'a, R> {
    const EMPTY: u32 = u32::MAX;

    /// # Panics
    ///
    /// Panics if `config.min_distance` is not positive.
    pub fn new(field: &'a LuminanceField, config: &'a SamplerConfig, rng: &'a mut R) -> Self {
        assert!(
            config.min_distance > 0.0,
            "Sampler min_distance must be positive"
        );
        let cell_size = config.min_distance / SQRT_2;
        let grid_width = (1.0 / cell_size).ceil() as usize;
        Self {
            field,
            config,
            rng,
            cell_size,
            grid_width,
            grid: vec![Self::EMPTY; grid_width * grid_width],
            accepted: Vec::new(),
            active: Vec::new(),
        }
    }

    /// Run the sampler until no active points remain.
    pub fn fill(mut self) -> Vec<Candidate> {
        let u = self.rng.gen_range(0.0..1.0);
        let v = self.rng.gen_range(0.0..1.0);
        self.insert(u, v);

        while !self.active.is_empty() {
            let slot = self.rng.gen_range(0..self.active.len());
            if !self.grow_from(self.active[slot]) {
                self.active.swap_remove(slot);
            }
        }

        self.accepted
    }

    /// Try to place one new point around `accepted[index]`.
    fn grow_from(&mut self, index: usize) -> bool {
        let origin = self.accepted[index];
        let radius = origin.spacing;

        for _ in 0..self.config.tries {
            let angle = self.rng.gen_range(0.0..TAU);
            let dist = self.rng.gen_range(radius..radius * 2.0);
            let u = origin.u + dist * angle.cos();
            let v = origin.v + dist * angle.sin();

            if !(0.0..1.0).contains(&u) || !(0.0..1.0).contains(&v) {
                continue;
            }

            let spacing = self.spacing_at(u, v);
            if self.fits(u, v, spacing) {
                self.insert(u, v);
                return true;
            }
        }

        false
    }

    fn spacing_at(&self, u: f32, v: f32) -> f32 {
        self.config.spacing(self.field.sample(u, v))
    }

    fn cell_of(&self, u: f32, v: f32) -> (usize, usize) {
        let max = self.grid_width - 1;
        let cx = ((u / self.cell_size) as usize).min(max);
        let cy = ((v / self.cell_size) as usize).min(max);
        (cx, cy)
    }

    fn fits(&self, u: f32, v: f32, spacing: f32) -> bool {
        let (cx, cy) = self.cell_of(u, v);
        let reach = (spacing / self.cell_size).ceil() as usize;

        let x0 = cx.saturating_sub(reach);
        let y0 = cy.saturating_sub(reach);
        let x1 = (cx + reach).min(self.grid_width - 1);
        let y1 = (cy + reach).min(self.grid_width - 1);

        for gy in y0..=y1 {
            for gx in x0..=x1 {
                let slot = self.grid[gx + gy * self.grid_width];
                if slot == Self::EMPTY {
                    continue;
                }
                let other = self.accepted[slot as usize];
                let limit = spacing.min(other.spacing);
                let du = other.u - u;
                let dv = other.v - v;
                if du * du + dv * dv < limit * limit {
                    return false;
                }
            }
        }

        true
    }

    fn insert(&mut self, u: f32, v: f32) {
        let spacing = self.spacing_at(u, v);
        let index = self.accepted.len();
        let (cx, cy) = self.cell_of(u, v);
        self.grid[cx + cy * self.grid_width] = index as u32;
        self.accepted.push(Candidate { u, v, spacing });
        self.active.push(index);
    }
}

/// Raw disk-sampling output for a field, before shuffle/truncate.
pub fn raw_candidates(field: &LuminanceField, config: &SamplerConfig) -> Vec<Candidate> {
    let mut rng = config.rng();
    DiskSampler::new(field, config, &mut rng).fill()
}

/// Sample a luminance field into a point set of exactly `config.point_count()` points.
pub fn sample_field(field: &LuminanceField, config: &SamplerConfig) -> (PointSet, SamplingReport) {
    let mut rng = config.rng();
    let candidates = DiskSampler::new(field, config, &mut rng).fill();
    let produced = candidates.len();

    let (points, underflow) = PointSet::from_candidates(
        candidates,
        config.point_count(),
        field,
        config.min_distance,
        &mut rng,
    );

    match underflow {
        Some(u) => tracing::warn!(
            produced = u.produced,
            required = u.required,
            "disk sampling underflow, padding with jittered copies"
        ),
        None => tracing::debug!(candidates = produced, kept = points.len(), "sampled point set"),
    }

    (
        points,
        SamplingReport {
            candidates: produced,
            underflow,
        },
    )
}

/// Decode an image file and sample it.
pub fn sample_image<P: AsRef<Path>>(
    path: P,
    config: &SamplerConfig,
) -> Result<(PointSet, SamplingReport), SampleError> {
    let field = LuminanceField::open(path, config.grid_size)?;
    Ok(sample_field(&field, config))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coarse() -> SamplerConfig {
        SamplerConfig::default()
            .with_grid_size(16)
            .with_distance(0.02, 0.08)
            .with_seed(11)
    }

    #[test]
    fn test_spacing_is_monotonic() {
        let config = SamplerConfig::default();
        assert_eq!(config.spacing(1.0), config.min_distance);
        assert_eq!(config.spacing(0.0), config.max_distance);
        let mut last = f32::INFINITY;
        for i in 0..=10 {
            let s = config.spacing(i as f32 / 10.0);
            assert!(s <= last);
            last = s;
        }
    }

    #[test]
    fn test_candidates_respect_relaxed_disk_property() {
        let config = coarse();
        let field = LuminanceField::from_fn(16, |x, y| ((x + y) % 5) as f32 / 4.0);
        let raw = raw_candidates(&field, &config);
        assert!(raw.len() > 50);

        for (i, a) in raw.iter().enumerate() {
            for b in &raw[i + 1..] {
                let d = ((a.u - b.u).powi(2) + (a.v - b.v).powi(2)).sqrt();
                let limit = a.spacing.min(b.spacing);
                assert!(d >= limit * 0.9999, "{d} < {limit}");
            }
        }
    }

    #[test]
    fn test_candidates_stay_in_unit_square() {
        let config = coarse();
        let field = LuminanceField::uniform(16, 0.7);
        for c in raw_candidates(&field, &config) {
            assert!((0.0..1.0).contains(&c.u));
            assert!((0.0..1.0).contains(&c.v));
        }
    }

    #[test]
    fn test_overflow_truncates_to_exact_count() {
        let config = SamplerConfig::default().with_seed(3);
        let field = LuminanceField::uniform(GRID_SIZE, 1.0);
        let (points, report) = sample_field(&field, &config);

        assert!(report.candidates > config.point_count());
        assert!(report.underflow.is_none());
        assert_eq!(points.len(), config.point_count());
    }

    #[test]
    fn test_dark_image_underflows_and_pads() {
        let config = SamplerConfig::default().with_seed(5);
        let field = LuminanceField::uniform(GRID_SIZE, 0.0);
        let (points, report) = sample_field(&field, &config);

        let underflow = report.underflow.expect("dark field should underflow");
        assert_eq!(underflow.produced, report.candidates);
        assert_eq!(underflow.required, config.point_count());
        assert_eq!(points.len(), config.point_count());
        for p in &points {
            assert!((0.0..1.0).contains(&p.u));
            assert!((0.0..1.0).contains(&p.v));
            assert_eq!(p.brightness, 0.0);
        }
    }

    #[test]
    fn test_padding_from_nothing() {
        let field = LuminanceField::uniform(4, 0.5);
        let mut rng = SmallRng::seed_from_u64(1);
        let (points, underflow) = PointSet::from_candidates(Vec::new(), 16, &field, 0.01, &mut rng);
        assert_eq!(points.len(), 16);
        assert_eq!(underflow.map(|u| u.missing()), Some(16));
    }

    #[test]
    fn test_shuffle_keeps_spatial_spread() {
        // Growth order is spatially coherent; after shuffle+truncate the
        // survivors should still cover all four quadrants.
        let config = SamplerConfig::default().with_seed(9);
        let field = LuminanceField::uniform(GRID_SIZE, 1.0);
        let (points, _) = sample_field(&field, &config);

        let mut quadrants = [0usize; 4];
        for p in &points {
            let q = (p.u >= 0.5) as usize + 2 * (p.v >= 0.5) as usize;
            quadrants[q] += 1;
        }
        let expected = points.len() / 4;
        for count in quadrants {
            assert!(count > expected / 2, "quadrant counts {quadrants:?}");
        }
    }

    #[test]
    fn test_from_points_checks_length() {
        let p = Point {
            u: 0.1,
            v: 0.2,
            brightness: 0.3,
        };
        assert!(PointSet::from_points(vec![p; 4], 4).is_some());
        assert!(PointSet::from_points(vec![p; 3], 4).is_none());
    }
}
