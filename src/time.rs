//! Simulation and frame timing.
//!
//! Simulation time is frame-locked, not wall-clock: every step advances each
//! stage clock by a fixed [`FRAME_DELTA`]. The velocity and position stages
//! keep separate clocks with different starting phases, so their `time`
//! uniforms stay one unit apart for the life of the view.
//!
//! [`FrameClock`] measures real frame pacing for diagnostics only.

use std::time::{Duration, Instant};

/// Simulation-time advance per rendered frame.
pub const FRAME_DELTA: f32 = 0.015;

/// Initial phase of the velocity stage clock.
pub const VELOCITY_PHASE: f32 = 1.0;

/// Initial phase of the position stage clock.
pub const POSITION_PHASE: f32 = 0.0;

/// A per-stage simulation clock.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StageClock {
    time: f32,
    delta: f32,
}

impl StageClock {
    /// A clock starting at `phase` that advances by [`FRAME_DELTA`].
    pub fn new(phase: f32) -> Self {
        Self {
            time: phase,
            delta: FRAME_DELTA,
        }
    }

    /// Override the per-step delta.
    pub fn with_delta(mut self, delta: f32) -> Self {
        self.delta = delta;
        self
    }

    /// Advance one step and return the new time.
    #[inline]
    pub fn advance(&mut self) -> f32 {
        self.time += self.delta;
        self.time
    }

    #[inline]
    pub fn time(&self) -> f32 {
        self.time
    }

    #[inline]
    pub fn delta(&self) -> f32 {
        self.delta
    }
}

/// Wall-clock frame pacing: frame count and a periodically refreshed FPS.
#[derive(Debug)]
pub struct FrameClock {
    start: Instant,
    last_frame: Instant,
    frame_count: u64,
    fps: f32,
    fps_frame_count: u64,
    fps_update_time: Instant,
    fps_update_interval: Duration,
}

impl FrameClock {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last_frame: now,
            frame_count: 0,
            fps: 0.0,
            fps_frame_count: 0,
            fps_update_time: now,
            fps_update_interval: Duration::from_millis(500),
        }
    }

    /// Record a frame. Returns `true` when the FPS value was refreshed.
    pub fn tick(&mut self) -> bool {
        let now = Instant::now();
        self.last_frame = now;
        self.frame_count += 1;

        let fps_elapsed = now.duration_since(self.fps_update_time);
        if fps_elapsed >= self.fps_update_interval {
            let frames_since = self.frame_count - self.fps_frame_count;
            self.fps = frames_since as f32 / fps_elapsed.as_secs_f32();
            self.fps_frame_count = self.frame_count;
            self.fps_update_time = now;
            return true;
        }
        false
    }

    #[inline]
    pub fn frame(&self) -> u64 {
        self.frame_count
    }

    #[inline]
    pub fn fps(&self) -> f32 {
        self.fps
    }

    /// Wall time since the clock was created.
    pub fn elapsed(&self) -> Duration {
        self.last_frame.duration_since(self.start)
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}
