use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use ipme::{ForceParams, InitialLayout, Morph};
use tracing_subscriber::EnvFilter;

/// Morph a particle cloud between two images.
#[derive(Parser, Debug)]
#[command(name = "ipme", version, about)]
struct Args {
    /// Image for target A (shown first)
    #[arg(value_name = "IMAGE_A")]
    image_a: PathBuf,

    /// Image for target B (selected by clicking)
    #[arg(value_name = "IMAGE_B")]
    image_b: PathBuf,

    /// Seed every random choice for reproducible runs
    #[arg(long, env = "IPME_SEED")]
    seed: Option<u64>,

    /// Start with particles already on target A instead of scattered
    #[arg(long)]
    start_at_target: bool,

    /// Spring constant toward the target
    #[arg(long, default_value_t = ForceParams::default().stiffness)]
    stiffness: f32,

    /// Velocity multiplier per frame, below 1
    #[arg(long, default_value_t = ForceParams::default().damping)]
    damping: f32,

    /// Velocity cap per frame
    #[arg(long, default_value_t = ForceParams::default().max_speed)]
    max_speed: f32,

    /// Sprite half size in clip units
    #[arg(long, default_value_t = 0.006)]
    point_size: f32,

    /// Run this many frames on the CPU without a window and print a summary
    #[arg(long, value_name = "N")]
    frames: Option<u64>,

    /// In headless mode, toggle the target every N frames
    #[arg(long, value_name = "N", requires = "frames")]
    switch_every: Option<u64>,

    #[arg(long, default_value_t = 1024)]
    width: u32,

    #[arg(long, default_value_t = 1024)]
    height: u32,
}

fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    initialise_tracing();
    let args = Args::parse();

    let force = ForceParams::default()
        .with_stiffness(args.stiffness)
        .with_damping(args.damping)
        .with_max_speed(args.max_speed);
    let layout = if args.start_at_target {
        InitialLayout::TargetA
    } else {
        InitialLayout::Scatter
    };

    let mut morph = Morph::new()
        .with_images(args.image_a, args.image_b)
        .with_force(force)
        .with_initial_layout(layout)
        .with_point_size(args.point_size)
        .with_window_size(args.width, args.height);
    if let Some(seed) = args.seed {
        morph = morph.with_seed(seed);
    }

    let result = match args.frames {
        Some(frames) => morph.run_headless(frames, args.switch_every).map(|summary| {
            println!("{}", summary.preview);
            println!(
                "frames: {}  target: {}  mean error: {:.5}  max extent: {:.3}",
                summary.frames, summary.selected, summary.mean_target_error, summary.max_extent
            );
            for (target, report) in ipme::Target::ALL.iter().zip(&summary.reports) {
                match report.underflow {
                    Some(u) => println!(
                        "target {target}: {} candidates, padded {} points",
                        report.candidates,
                        u.missing()
                    ),
                    None => println!("target {target}: {} candidates", report.candidates),
                }
            }
        }),
        None => morph.run(),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err}");
            ExitCode::FAILURE
        }
    }
}
