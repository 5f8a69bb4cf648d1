//! Error types for IPME.
//!
//! Everything here is a startup failure: image decoding, shader validation,
//! GPU initialization and window creation. Once the frame loop is running
//! nothing in the simulation can fail; numerical stability is guaranteed by
//! the bounded force law instead of being checked after the fact.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while turning a source image into a point set.
#[derive(Debug, Error)]
pub enum SampleError {
    /// The image file exists but could not be decoded.
    #[error("failed to decode image '{path}': {source}")]
    ImageDecode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    /// The image bytes could not be decoded (in-memory source).
    #[error("failed to decode image bytes: {0}")]
    ImageBytes(#[from] image::ImageError),
    /// The image file could not be read.
    #[error("failed to read image '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The decoded image has a zero dimension.
    #[error("image has no pixels ({width}x{height})")]
    Empty { width: u32, height: u32 },
}

/// A WGSL program failed to parse or validate.
#[derive(Debug, Clone, Error)]
#[error("{stage} shader error: {message}")]
pub struct ShaderError {
    /// Which program failed (`velocity`, `position`, `render`).
    pub stage: &'static str,
    /// Formatted naga diagnostic.
    pub message: String,
}

/// The initial textures handed to an executor do not line up.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SeedError {
    #[error("{texture} texture size mismatch: expected {expected}, got {actual}")]
    Size {
        texture: &'static str,
        expected: u32,
        actual: u32,
    },
    #[error("{texture} texture has kind {actual:?}, expected {expected:?}")]
    Kind {
        texture: &'static str,
        expected: crate::TextureKind,
        actual: crate::TextureKind,
    },
}

/// Errors that can occur during GPU initialization.
#[derive(Debug, Error)]
pub enum GpuError {
    /// Failed to create a surface for rendering.
    #[error("failed to create GPU surface: {0}")]
    SurfaceCreation(#[from] wgpu::CreateSurfaceError),
    /// The context was created without a window surface.
    #[error("no presentation surface; create the GPU context with a window")]
    NoSurface,
    /// No compatible GPU adapter found.
    #[error("no compatible GPU adapter found; a WebGPU/Vulkan/Metal/DX12 capable GPU is required")]
    NoAdapter,
    /// Failed to create GPU device.
    #[error("failed to create GPU device: {0}")]
    DeviceCreation(#[from] wgpu::RequestDeviceError),
    /// The seed textures have inconsistent sizes or kinds.
    #[error("invalid seed: {0}")]
    Seed(#[from] SeedError),
    /// A compute or render program was rejected.
    #[error(transparent)]
    Shader(#[from] ShaderError),
    /// The surface could not provide a frame and cannot recover.
    #[error("surface error: {0}")]
    Surface(#[from] wgpu::SurfaceError),
    /// Failed to map buffer for reading.
    #[error("failed to map GPU buffer: {0}")]
    BufferMapping(String),
}

/// Top level errors returned by [`crate::Morph::run`].
#[derive(Debug, Error)]
pub enum MorphError {
    /// One of the two target images could not be sampled.
    #[error("target {target}: {source}")]
    Sample {
        target: crate::Target,
        #[source]
        source: SampleError,
    },
    /// No image was configured for a target.
    #[error("no image configured for target {0}; use .with_images()")]
    MissingImage(crate::Target),
    /// GPU initialization failed.
    #[error("GPU error: {0}")]
    Gpu(#[from] GpuError),
    /// Failed to create event loop.
    #[error("failed to create event loop: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),
    /// Failed to create window.
    #[error("failed to create window: {0}")]
    Window(#[from] winit::error::OsError),
}

impl From<ShaderError> for MorphError {
    fn from(e: ShaderError) -> Self {
        MorphError::Gpu(GpuError::Shader(e))
    }
}
