//! Per-texel update functions for the two simulation stages.
//!
//! These are the CPU twins of `velocity.wgsl` and `position.wgsl`. Each one
//! reads exactly one texel from each input at its own index and produces the
//! output texel for that index, nothing else.

use glam::{Vec2, Vec3, Vec4, Vec4Swizzles};

/// Force law parameters for the velocity stage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForceParams {
    /// Spring constant toward the target texel.
    pub stiffness: f32,
    /// Per-step velocity multiplier, strictly below 1.
    pub damping: f32,
    /// Hard cap on velocity magnitude per step.
    pub max_speed: f32,
    /// Amplitude of the per-particle noise kick.
    pub jitter: f32,
}

impl Default for ForceParams {
    fn default() -> Self {
        Self {
            stiffness: 0.01,
            damping: 0.93,
            max_speed: 0.05,
            jitter: 0.0005,
        }
    }
}

impl ForceParams {
    pub fn with_stiffness(mut self, stiffness: f32) -> Self {
        self.stiffness = stiffness.max(0.0);
        self
    }

    /// Clamped to `[0, 0.999]` so the system always loses energy.
    pub fn with_damping(mut self, damping: f32) -> Self {
        self.damping = damping.clamp(0.0, 0.999);
        self
    }

    pub fn with_max_speed(mut self, max_speed: f32) -> Self {
        self.max_speed = max_speed.max(0.0);
        self
    }

    pub fn with_jitter(mut self, jitter: f32) -> Self {
        self.jitter = jitter.max(0.0);
        self
    }
}

/// Integer hash, bit-identical to `hash()` in the WGSL utilities.
#[inline]
pub fn hash(n: u32) -> u32 {
    let mut x = n;
    x ^= x >> 17;
    x = x.wrapping_mul(0xed5a_d4bb);
    x ^= x >> 11;
    x = x.wrapping_mul(0xac4c_1b51);
    x ^= x >> 15;
    x = x.wrapping_mul(0x3184_8bab);
    x ^= x >> 14;
    x
}

/// Hash to a float in `[0, 1]`.
#[inline]
pub fn rand(seed: u32) -> f32 {
    hash(seed) as f32 / 4_294_967_295.0
}

/// Planar noise in `[-1, 1]²`, constant within each 1/60 of simulation time.
pub fn noise(index: u32, time: f32) -> Vec2 {
    let tick = (time.max(0.0) * 60.0).floor() as u32;
    let seed = index.wrapping_mul(1973).wrapping_add(tick.wrapping_mul(9277));
    Vec2::new(rand(seed) - 0.5, rand(hash(seed)) - 0.5) * 2.0
}

/// New velocity texel from the previous position, previous velocity and the
/// bound target texel.
pub fn velocity_step(
    position: Vec4,
    velocity: Vec4,
    goal: Vec4,
    index: u32,
    time: f32,
    params: &ForceParams,
) -> Vec4 {
    let kick = noise(index, time) * params.jitter;
    let acc = (goal.xyz() - position.xyz()) * params.stiffness + Vec3::new(kick.x, kick.y, 0.0);
    let v = ((velocity.xyz() + acc) * params.damping).clamp_length_max(params.max_speed);
    v.extend(1.0)
}

/// New position texel. Brightness in `w` is carried unchanged.
#[inline]
pub fn position_step(position: Vec4, velocity: Vec4) -> Vec4 {
    (position.xyz() + velocity.xyz()).extend(position.w)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_known_values() {
        // Values shared with the WGSL implementation.
        assert_eq!(hash(0), 0);
        assert_ne!(hash(1), hash(2));
        assert!(rand(12345) >= 0.0 && rand(12345) <= 1.0);
    }

    #[test]
    fn test_noise_is_bounded_and_piecewise_constant() {
        for i in 0..256 {
            let n = noise(i, 3.0);
            assert!(n.x.abs() <= 1.0 && n.y.abs() <= 1.0);
        }
        assert_eq!(noise(7, 1.0), noise(7, 1.0 + 0.001));
    }

    #[test]
    fn test_velocity_points_toward_goal() {
        let params = ForceParams::default().with_jitter(0.0);
        let v = velocity_step(Vec4::ZERO, Vec4::W, Vec4::new(1.0, 0.0, 0.0, 1.0), 0, 0.0, &params);
        assert!(v.x > 0.0);
        assert_eq!(v.y, 0.0);
        assert_eq!(v.w, 1.0);
    }

    #[test]
    fn test_velocity_is_clamped() {
        let params = ForceParams::default();
        let v = velocity_step(
            Vec4::ZERO,
            Vec4::new(100.0, -100.0, 0.0, 1.0),
            Vec4::new(1000.0, 1000.0, 0.0, 1.0),
            3,
            0.5,
            &params,
        );
        assert!(v.xyz().length() <= params.max_speed + 1e-6);
    }

    #[test]
    fn test_position_carries_brightness() {
        let p = position_step(Vec4::new(0.5, 0.5, 0.0, 0.3), Vec4::new(0.1, -0.1, 0.0, 1.0));
        assert!((p.x - 0.6).abs() < 1e-6);
        assert!((p.y - 0.4).abs() < 1e-6);
        assert_eq!(p.w, 0.3);
    }

    #[test]
    fn test_damping_is_capped_below_one() {
        assert_eq!(ForceParams::default().with_damping(2.0).damping, 0.999);
    }
}
