//! End-to-end tests: image bytes in, simulated particles out.
//!
//! Everything here runs on the CPU executor, so no GPU is needed.

use std::io::Cursor;

use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use ipme::prelude::*;
use ipme::{encode_point, MorphError, SampleError, StateTexture, TextureKind};

fn png(width: u32, height: u32, f: impl Fn(u32, u32) -> u8) -> Vec<u8> {
    let img = RgbaImage::from_fn(width, height, |x, y| {
        let v = f(x, y);
        Rgba([v, v, v, 255])
    });
    let mut bytes = Vec::new();
    DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}

fn bright_left() -> Vec<u8> {
    png(128, 128, |x, _| if x < 64 { 255 } else { 0 })
}

fn gradient() -> Vec<u8> {
    png(96, 96, |_, y| (y * 255 / 95) as u8)
}

fn morph(seed: u64) -> Morph {
    Morph::new()
        .with_image(Target::A, ImageSource::Bytes(bright_left()))
        .with_image(Target::B, ImageSource::Bytes(gradient()))
        .with_seed(seed)
}

#[test]
fn test_bright_half_gets_most_points() {
    let prepared = morph(1).prepare().unwrap();
    let points = &prepared.points[0];
    assert_eq!(points.len(), 64 * 64);

    let left = points.iter().filter(|p| p.u < 0.5).count();
    assert!(
        left as f32 > 0.75 * points.len() as f32,
        "only {left} of {} points on the bright side",
        points.len()
    );
}

#[test]
fn test_point_sets_are_well_formed() {
    let prepared = morph(2).prepare().unwrap();
    for set in &prepared.points {
        assert_eq!(set.len(), 4096);
        for p in set {
            assert!((0.0..1.0).contains(&p.u));
            assert!((0.0..1.0).contains(&p.v));
            assert!((0.0..=1.0).contains(&p.brightness));
        }
    }
}

#[test]
fn test_seeded_sampling_is_reproducible() {
    let first = morph(7).prepare().unwrap();
    let second = morph(7).prepare().unwrap();
    assert_eq!(first.points[0].len(), second.points[0].len());
    assert_eq!(first.points[0], second.points[0]);
    assert_eq!(first.seed.targets[1], second.seed.targets[1]);

    let other = morph(8).prepare().unwrap();
    assert_ne!(first.points[0], other.points[0]);
}

#[test]
fn test_encoded_targets_round_trip() {
    let prepared = morph(3).prepare().unwrap();
    for (set, texture) in prepared.points.iter().zip(&prepared.seed.targets) {
        assert_eq!(texture.kind(), TextureKind::Position);
        for (i, p) in set.iter().enumerate() {
            let texel = texture.texel(i);
            assert_eq!(texel, encode_point(p));
            assert_eq!(texel.x, 2.0 * (p.u - 0.5));
            assert_eq!(texel.y, -2.0 * (p.v - 0.5));
            assert_eq!(texel.z, 0.0);
            assert_eq!(texel.w, p.brightness);
        }

        let bytes = texture.as_bytes().to_vec();
        let back = StateTexture::from_bytes(TextureKind::Position, 64, &bytes).unwrap();
        assert_eq!(&back, texture);
    }
}

#[test]
fn test_start_at_target_matches_target_a() {
    let prepared = morph(4)
        .with_initial_layout(InitialLayout::TargetA)
        .prepare()
        .unwrap();
    assert_eq!(prepared.seed.position, prepared.seed.targets[0]);
}

#[test]
fn test_missing_image_is_reported() {
    let err = Morph::new()
        .with_image(Target::A, ImageSource::Bytes(bright_left()))
        .prepare()
        .unwrap_err();
    assert!(matches!(err, MorphError::MissingImage(Target::B)));
}

#[test]
fn test_undecodable_image_blocks_startup() {
    let err = Morph::new()
        .with_image(Target::A, ImageSource::Bytes(b"not an image".to_vec()))
        .with_image(Target::B, ImageSource::Bytes(gradient()))
        .build_graph()
        .unwrap_err();
    match err {
        MorphError::Sample { target, source } => {
            assert_eq!(target, Target::A);
            assert!(matches!(source, SampleError::ImageBytes(_)));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_missing_file_blocks_startup() {
    let err = Morph::new()
        .with_images("/nonexistent/a.png", "/nonexistent/b.png")
        .prepare()
        .unwrap_err();
    assert!(matches!(err, MorphError::Sample { .. }));
}

#[test]
fn test_target_switch_rebinds_velocity_input() {
    let mut graph = morph(5).build_graph().unwrap();
    let a = graph.target_texture(Target::A);
    let b = graph.target_texture(Target::B);
    assert_ne!(a, b);
    assert_eq!(graph.bound_target(), a);

    graph.step();
    graph.trigger();
    assert_eq!(graph.bound_target(), b);
    graph.step();
    graph.trigger();
    assert_eq!(graph.bound_target(), a);
}

#[test]
fn test_particles_settle_on_selected_target() {
    let summary = morph(6).run_headless(800, None).unwrap();
    assert_eq!(summary.frames, 800);
    assert_eq!(summary.selected, Target::A);
    assert!(summary.mean_target_error < 0.05, "error {}", summary.mean_target_error);
    assert!(!summary.preview.trim().is_empty());
}

#[test]
fn test_switching_moves_particles_to_other_target() {
    let mut graph = morph(9).build_graph().unwrap();
    let mut scheduler = FrameScheduler::new();
    scheduler.run_for(&mut graph, 600);
    let settled_on_a = graph.mean_target_error();

    graph.trigger();
    let just_switched = graph.mean_target_error();
    assert!(just_switched > settled_on_a);

    scheduler.run_for(&mut graph, 800);
    assert!(graph.mean_target_error() < just_switched * 0.1);
}

#[test]
fn test_ten_thousand_frames_stay_bounded() {
    let mut graph = Morph::new()
        .with_image(Target::A, ImageSource::Bytes(bright_left()))
        .with_image(Target::B, ImageSource::Bytes(gradient()))
        .with_seed(10)
        .with_sampler(SamplerConfig::default().with_grid_size(32))
        .with_force(ForceParams::default().with_jitter(0.01))
        .build_graph()
        .unwrap();
    let mut scheduler = FrameScheduler::new();

    for chunk in 0..10 {
        scheduler.run_for(&mut graph, 1000);
        if chunk % 3 == 0 {
            graph.trigger();
        }
        assert!(graph.is_finite());
        assert!(graph.max_extent() <= 10.0, "extent {}", graph.max_extent());
    }
    assert_eq!(graph.frame(), 10_000);
}

#[test]
fn test_default_layout_renders_target_brightness() {
    let mut graph = Morph::new()
        .with_image(Target::A, ImageSource::Bytes(gradient()))
        .with_image(Target::B, ImageSource::Bytes(gradient()))
        .with_seed(3)
        .build_graph()
        .unwrap();
    for _ in 0..800 {
        graph.step();
    }

    let goal = graph.texture(graph.target_texture(Target::A)).texels();
    let live = graph.current_positions().texels();
    assert!(live.iter().zip(goal).all(|(l, g)| l.w == g.w));
    assert!(live.iter().any(|t| t.w < 0.5));
    assert!(live.iter().any(|t| t.w > 0.5));
}

#[test]
fn test_ten_thousand_frames_on_fixed_target_stay_bounded() {
    let mut graph = morph(11).with_force(ForceParams::default()).build_graph().unwrap();
    assert_eq!(graph.size(), 64);
    let mut scheduler = FrameScheduler::new();

    for _ in 0..10 {
        scheduler.run_for(&mut graph, 1000);
        assert_eq!(graph.selected(), Target::A);
        assert!(graph.is_finite());
        assert!(graph.max_extent() <= 10.0, "extent {}", graph.max_extent());
    }
    assert_eq!(graph.frame(), 10_000);
}
