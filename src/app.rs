//! The `Morph` builder and the windowed frame loop.
//!
//! # Example
//!
//! ```ignore
//! use ipme::prelude::*;
//!
//! fn main() -> Result<(), MorphError> {
//!     Morph::new()
//!         .with_images("first.png", "second.jpg")
//!         .with_seed(7)
//!         .with_force(ForceParams::default().with_stiffness(0.02))
//!         .run()
//! }
//! ```
//!
//! Startup is gated: both images are decoded and sampled in parallel, and
//! nothing touching the simulation is created until both have succeeded.

use std::path::PathBuf;
use std::sync::Arc;

use rand::rngs::SmallRng;
use rand::SeedableRng;
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

use crate::ascii::{self, GlyphAtlas};
use crate::error::{GpuError, MorphError, SampleError};
use crate::gpu::{ComputeGraph, GpuContext, RenderState};
use crate::graph::{FeedbackGraph, GraphSeed, InitialLayout};
use crate::input::Input;
use crate::kernels::ForceParams;
use crate::luminance::LuminanceField;
use crate::sampling::{sample_field, PointSet, SamplerConfig, SamplingReport};
use crate::scheduler::FrameScheduler;
use crate::target::Target;
use crate::time::FRAME_DELTA;

/// Where a target image comes from.
#[derive(Debug, Clone)]
pub enum ImageSource {
    /// An image file on disk.
    Path(PathBuf),
    /// An encoded image in memory.
    Bytes(Vec<u8>),
    /// An already computed luminance grid.
    Field(LuminanceField),
}

impl ImageSource {
    fn load(&self, size: u32) -> Result<LuminanceField, SampleError> {
        match self {
            ImageSource::Path(path) => LuminanceField::open(path, size),
            ImageSource::Bytes(bytes) => LuminanceField::from_bytes(bytes, size),
            ImageSource::Field(field) if field.size() == size => Ok(field.clone()),
            ImageSource::Field(field) => Ok(LuminanceField::from_fn(size, |x, y| {
                field.sample(x as f32 / size as f32, y as f32 / size as f32)
            })),
        }
    }
}

/// Both targets sampled and encoded, ready to build an executor.
#[derive(Debug, Clone)]
pub struct Prepared {
    pub seed: GraphSeed,
    pub points: [PointSet; 2],
    pub reports: [SamplingReport; 2],
}

/// Result of a headless run.
#[derive(Debug, Clone)]
pub struct HeadlessSummary {
    pub frames: u64,
    pub selected: Target,
    pub mean_target_error: f32,
    pub max_extent: f32,
    pub reports: [SamplingReport; 2],
    /// Text rendering of the final particle positions.
    pub preview: String,
}

/// Builder for an image morph.
#[derive(Debug, Clone)]
pub struct Morph {
    images: [Option<ImageSource>; 2],
    sampler: SamplerConfig,
    force: ForceParams,
    layout: InitialLayout,
    seed: Option<u64>,
    point_size: f32,
    window_size: (u32, u32),
    title: String,
}

impl Default for Morph {
    fn default() -> Self {
        Self::new()
    }
}

impl Morph {
    pub fn new() -> Self {
        Self {
            images: [None, None],
            sampler: SamplerConfig::default(),
            force: ForceParams::default(),
            layout: InitialLayout::default(),
            seed: None,
            point_size: 0.006,
            window_size: (1024, 1024),
            title: "ipme".to_string(),
        }
    }

    /// Image files for target A and target B.
    pub fn with_images(mut self, a: impl Into<PathBuf>, b: impl Into<PathBuf>) -> Self {
        self.images = [Some(ImageSource::Path(a.into())), Some(ImageSource::Path(b.into()))];
        self
    }

    /// Set one target's image source.
    pub fn with_image(mut self, target: Target, source: ImageSource) -> Self {
        self.images[target.index()] = Some(source);
        self
    }

    /// Seed every random choice: sampling, scatter and initial velocity.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_force(mut self, force: ForceParams) -> Self {
        self.force = force;
        self
    }

    pub fn with_initial_layout(mut self, layout: InitialLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Sprite half size in clip units.
    pub fn with_point_size(mut self, size: f32) -> Self {
        self.point_size = size.max(0.0);
        self
    }

    /// Replace the sampler configuration. A seed set with
    /// [`with_seed`](Self::with_seed) still takes precedence.
    pub fn with_sampler(mut self, sampler: SamplerConfig) -> Self {
        self.sampler = sampler;
        self
    }

    pub fn with_window_size(mut self, width: u32, height: u32) -> Self {
        self.window_size = (width.max(1), height.max(1));
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    fn sampler_for(&self, target: Target) -> SamplerConfig {
        match self.seed.or(self.sampler.seed) {
            // Distinct streams per target so identical images still differ
            Some(seed) => self
                .sampler
                .clone()
                .with_seed(seed.wrapping_add(target.index() as u64)),
            None => self.sampler.clone(),
        }
    }

    fn rng(&self) -> SmallRng {
        match self.seed {
            Some(seed) => SmallRng::seed_from_u64(seed ^ 0x9e37_79b9_7f4a_7c15),
            None => SmallRng::from_entropy(),
        }
    }

    fn sample_target(&self, target: Target) -> Result<(PointSet, SamplingReport), MorphError> {
        let source = self.images[target.index()]
            .as_ref()
            .ok_or(MorphError::MissingImage(target))?;
        let config = self.sampler_for(target);
        let field = source
            .load(config.grid_size)
            .map_err(|source| MorphError::Sample { target, source })?;
        let (points, report) = sample_field(&field, &config);
        tracing::debug!(
            image = %target,
            candidates = report.candidates,
            mean_brightness = field.mean(),
            "target sampled"
        );
        Ok((points, report))
    }

    /// Sample both targets in parallel and encode the initial textures.
    ///
    /// Fails if either image is missing or unreadable; no partial result is
    /// returned.
    pub fn prepare(&self) -> Result<Prepared, MorphError> {
        let (a, b) = rayon::join(
            || self.sample_target(Target::A),
            || self.sample_target(Target::B),
        );
        let (points_a, report_a) = a?;
        let (points_b, report_b) = b?;

        let mut rng = self.rng();
        let seed = GraphSeed::from_point_sets(
            &points_a,
            &points_b,
            self.sampler.grid_size,
            self.layout,
            &mut rng,
        );
        tracing::info!(
            particles = self.sampler.point_count(),
            layout = ?self.layout,
            "targets encoded"
        );

        Ok(Prepared {
            seed,
            points: [points_a, points_b],
            reports: [report_a, report_b],
        })
    }

    /// Build the CPU executor.
    pub fn build_graph(&self) -> Result<FeedbackGraph, MorphError> {
        let prepared = self.prepare()?;
        Ok(FeedbackGraph::new(prepared.seed, self.force))
    }

    /// Step the CPU executor `frames` times without opening a window.
    ///
    /// `switch_every` toggles the target after that many frames, repeatedly.
    pub fn run_headless(
        &self,
        frames: u64,
        switch_every: Option<u64>,
    ) -> Result<HeadlessSummary, MorphError> {
        let prepared = self.prepare()?;
        let reports = prepared.reports;
        let mut graph = FeedbackGraph::new(prepared.seed, self.force);
        let mut scheduler = FrameScheduler::new();

        for frame in 1..=frames {
            scheduler.tick(&mut graph);
            if let Some(n) = switch_every.filter(|n| *n > 0) {
                if frame % n == 0 {
                    graph.trigger();
                }
            }
        }

        let summary = HeadlessSummary {
            frames: graph.frame(),
            selected: graph.selected(),
            mean_target_error: graph.mean_target_error(),
            max_extent: graph.max_extent(),
            reports,
            preview: ascii::preview(graph.current_positions().texels(), 64, 32, &GlyphAtlas::default()),
        };
        tracing::info!(
            frames = summary.frames,
            error = summary.mean_target_error,
            extent = summary.max_extent,
            "headless run finished"
        );
        Ok(summary)
    }

    /// Open a window and run until it is closed.
    pub fn run(self) -> Result<(), MorphError> {
        let prepared = self.prepare()?;

        let event_loop = EventLoop::new()?;
        event_loop.set_control_flow(ControlFlow::Poll);

        let mut app = App::new(self, prepared.seed);
        event_loop.run_app(&mut app)?;

        match app.error.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

struct Running {
    window: Arc<Window>,
    compute: ComputeGraph,
    render: RenderState,
}

struct App {
    morph: Morph,
    seed: GraphSeed,
    running: Option<Running>,
    input: Input,
    scheduler: FrameScheduler,
    error: Option<MorphError>,
}

impl App {
    fn new(morph: Morph, seed: GraphSeed) -> Self {
        Self {
            morph,
            seed,
            running: None,
            input: Input::new(),
            scheduler: FrameScheduler::new(),
            error: None,
        }
    }

    fn start(&mut self, event_loop: &ActiveEventLoop) -> Result<Running, MorphError> {
        let (width, height) = self.morph.window_size;
        let attrs = Window::default_attributes()
            .with_title(self.morph.title.clone())
            .with_inner_size(winit::dpi::LogicalSize::new(width, height));
        let window = Arc::new(event_loop.create_window(attrs)?);

        let mut ctx = pollster::block_on(GpuContext::with_window(Arc::clone(&window)))?;
        let compute = ComputeGraph::new(&ctx, &self.seed, self.morph.force)?;
        let size = window.inner_size();
        let mut rng = self.morph.rng();
        let render = RenderState::new(
            &mut ctx,
            size.width,
            size.height,
            compute.size(),
            self.morph.point_size,
            &mut rng,
        )?;
        tracing::info!(width = size.width, height = size.height, "window ready");

        Ok(Running {
            window,
            compute,
            render,
        })
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: MorphError) {
        tracing::error!(error = %err, "stopping");
        self.error = Some(err);
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.running.is_some() {
            return;
        }
        match self.start(event_loop) {
            Ok(running) => {
                running.window.request_redraw();
                self.running = Some(running);
            }
            Err(err) => self.fail(event_loop, err),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        self.input.handle_event(&event);

        let Some(running) = self.running.as_mut() else {
            return;
        };

        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                running.render.resize(size.width, size.height);
            }
            WindowEvent::RedrawRequested => {
                while self.input.take_trigger() {
                    let selected = running.compute.trigger();
                    tracing::info!(%selected, "target switched");
                }

                self.scheduler.tick(&mut running.compute);

                let time = running.compute.frame() as f32 * FRAME_DELTA;
                match running.render.draw(&running.compute, time) {
                    Ok(()) => {}
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        tracing::warn!("surface lost, reconfiguring");
                        running.render.reconfigure();
                    }
                    Err(e @ wgpu::SurfaceError::OutOfMemory) => {
                        self.fail(event_loop, MorphError::Gpu(GpuError::Surface(e)));
                        return;
                    }
                    Err(e) => tracing::error!(error = %e, "render error"),
                }

                if self.scheduler.clock().frame() % 30 == 0 {
                    running.window.set_title(&format!(
                        "{} | {:.0} fps | target {}",
                        self.morph.title,
                        self.scheduler.fps(),
                        running.compute.selected()
                    ));
                }
                running.window.request_redraw();
            }
            _ => {}
        }
    }
}
