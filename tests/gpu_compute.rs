//! GPU executor tests.
//!
//! These need a wgpu adapter. On machines without one they log and return
//! early instead of failing.

use glam::Vec4Swizzles;
use ipme::gpu::{ComputeGraph, GpuContext};
use ipme::{
    FeedbackGraph, ForceParams, GpuError, GraphSeed, SeedError, StateTexture, Stepper, Target,
    TextureKind,
};
use rand::rngs::SmallRng;
use rand::SeedableRng;

fn context() -> Option<GpuContext> {
    match pollster::block_on(GpuContext::headless()) {
        Ok(ctx) => Some(ctx),
        Err(err) => {
            eprintln!("skipping GPU test: {err}");
            None
        }
    }
}

fn seed(size: u32) -> GraphSeed {
    let mut rng = SmallRng::seed_from_u64(21);
    GraphSeed {
        position: StateTexture::random_positions(size, &mut rng),
        velocity: StateTexture::random_velocities(size, &mut rng),
        targets: [
            StateTexture::random_positions(size, &mut rng),
            StateTexture::random_positions(size, &mut rng),
        ],
    }
}

fn max_difference(a: &StateTexture, b: &StateTexture) -> f32 {
    a.texels()
        .iter()
        .zip(b.texels())
        .map(|(x, y)| (x.xyz() - y.xyz()).length())
        .fold(0.0, f32::max)
}

#[test]
fn test_gpu_matches_cpu_executor() {
    let Some(ctx) = context() else { return };
    let params = ForceParams::default().with_jitter(0.0);
    let seed = seed(16);

    let mut gpu = ComputeGraph::new(&ctx, &seed, params).unwrap();
    let mut cpu = FeedbackGraph::new(seed, params);

    for _ in 0..20 {
        Stepper::step(&mut gpu);
        cpu.step();
    }

    let positions = gpu.read_positions().unwrap();
    assert!(max_difference(&positions, cpu.current_positions()) < 1e-3);

    let velocities = gpu
        .read_texture(gpu.current_velocity_id(), TextureKind::Velocity)
        .unwrap();
    assert!(max_difference(&velocities, cpu.current_velocities()) < 1e-3);
}

#[test]
fn test_gpu_uploads_targets_untouched() {
    let Some(ctx) = context() else { return };
    let seed = seed(8);
    let mut gpu = ComputeGraph::new(&ctx, &seed, ForceParams::default()).unwrap();
    gpu.step();

    let b = gpu
        .read_texture(gpu.target_texture(Target::B), TextureKind::Position)
        .unwrap();
    assert_eq!(b, seed.targets[1]);
}

#[test]
fn test_gpu_target_switch() {
    let Some(ctx) = context() else { return };
    let mut gpu = ComputeGraph::new(&ctx, &seed(8), ForceParams::default()).unwrap();
    assert_eq!(gpu.bound_target(), gpu.target_texture(Target::A));
    assert_eq!(gpu.trigger(), Target::B);
    assert_eq!(gpu.bound_target(), gpu.target_texture(Target::B));
    gpu.trigger();
    assert_eq!(gpu.bound_target(), gpu.target_texture(Target::A));
}

#[test]
fn test_gpu_position_buffer_alternates() {
    let Some(ctx) = context() else { return };
    let mut gpu = ComputeGraph::new(&ctx, &seed(8), ForceParams::default()).unwrap();
    let first = gpu.current_position_id();
    gpu.step();
    let second = gpu.current_position_id();
    gpu.step();
    assert_ne!(first, second);
    assert_eq!(gpu.current_position_id(), first);
    assert_eq!(gpu.frame(), 2);
}

#[test]
fn test_gpu_rejects_mismatched_seed() {
    let Some(ctx) = context() else { return };
    let mut bad = seed(8);
    bad.velocity = StateTexture::random_velocities(4, &mut SmallRng::seed_from_u64(1));
    match ComputeGraph::new(&ctx, &bad, ForceParams::default()) {
        Err(GpuError::Seed(SeedError::Size { texture, expected, actual })) => {
            assert_eq!(texture, "velocity");
            assert_eq!((expected, actual), (8, 4));
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("mismatched seed was accepted"),
    }
}
