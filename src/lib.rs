//! # IPME - Image Particle Morph Engine
//!
//! Turns two images into particle clouds and morphs between them on the GPU.
//!
//! Each image is reduced to a 64×64 luminance grid and sampled with a
//! brightness-weighted Poisson-disk sampler: bright areas get dense points,
//! dark areas sparse ones. The 4096 points of each image are packed into a
//! floating-point state texture, and a two-stage feedback simulation pulls
//! every particle toward its texel in the selected target. A click swaps the
//! target and the particles fly to the other image.
//!
//! ## Quick Start
//!
//! ```ignore
//! use ipme::prelude::*;
//!
//! fn main() -> Result<(), MorphError> {
//!     Morph::new()
//!         .with_images("portrait.png", "logo.png")
//!         .with_seed(42)
//!         .run()
//! }
//! ```
//!
//! ## Pipeline
//!
//! | Stage | Module |
//! |-------|--------|
//! | Decode and resample to a luminance grid | [`luminance`] |
//! | Variable-density disk sampling | [`sampling`] |
//! | Point set to state texture | [`encoding`] |
//! | Velocity and position stages, ping-pong buffers | [`graph`], [`kernels`] |
//! | Target toggling | [`target`] |
//! | GPU execution and point-sprite rendering | `gpu` |
//!
//! The simulation runs on either executor: [`FeedbackGraph`] on the CPU with
//! rayon, or [`gpu::ComputeGraph`] with wgpu compute passes. Both advance
//! through the [`Stepper`] trait, driven one step per frame by a
//! [`FrameScheduler`].
//!
//! ## Headless use
//!
//! ```ignore
//! let summary = Morph::new()
//!     .with_images("a.png", "b.png")
//!     .with_seed(1)
//!     .run_headless(600, None)?;
//! println!("{}", summary.preview);
//! ```

mod app;
pub mod ascii;
pub mod encoding;
pub mod error;
pub mod gpu;
pub mod graph;
pub mod input;
pub mod kernels;
pub mod luminance;
pub mod sampling;
pub mod scheduler;
pub mod shader;
pub mod target;
pub mod time;
pub mod uniforms;

pub use app::{HeadlessSummary, ImageSource, Morph, Prepared};
pub use encoding::{decode_point, encode_point, StateTexture, TextureKind};
pub use error::{GpuError, MorphError, SampleError, SeedError, ShaderError};
pub use graph::{FeedbackGraph, GraphSeed, InitialLayout, TextureId, VariableKind};
pub use kernels::ForceParams;
pub use luminance::{LuminanceField, GRID_SIZE};
pub use sampling::{Point, PointSet, SamplerConfig, SamplingReport, Underflow};
pub use scheduler::{FrameScheduler, Stepper};
pub use target::{Target, TargetSelector};

/// Common imports.
pub mod prelude {
    pub use crate::{
        FeedbackGraph, ForceParams, FrameScheduler, ImageSource, InitialLayout, Morph,
        MorphError, PointSet, SamplerConfig, Stepper, Target,
    };
    pub use glam::{Vec2, Vec4};
}
