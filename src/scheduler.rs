//! Frame-driven stepping.
//!
//! The windowed loop and the headless runner both drive the simulation
//! through a [`FrameScheduler`]: one `tick()` is one frame and runs exactly
//! one graph step. Nothing re-schedules itself; the caller owns the loop.

use crate::graph::FeedbackGraph;
use crate::target::Target;
use crate::time::FrameClock;

/// Anything that can advance the simulation by one frame.
///
/// Implemented by the CPU [`FeedbackGraph`] and the GPU `ComputeGraph`.
pub trait Stepper {
    /// Run the velocity stage then the position stage.
    fn step(&mut self);

    /// Toggle the bound target, returning the newly selected one.
    fn trigger(&mut self) -> Target;

    /// Frames completed so far.
    fn frame(&self) -> u64;
}

impl Stepper for FeedbackGraph {
    fn step(&mut self) {
        FeedbackGraph::step(self);
    }

    fn trigger(&mut self) -> Target {
        FeedbackGraph::trigger(self)
    }

    fn frame(&self) -> u64 {
        FeedbackGraph::frame(self)
    }
}

/// Calls [`Stepper::step`] once per tick and tracks frame pacing.
#[derive(Debug, Default)]
pub struct FrameScheduler {
    clock: FrameClock,
    paused: bool,
}

impl FrameScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance one frame. Returns `true` if a step ran.
    pub fn tick<S: Stepper + ?Sized>(&mut self, stepper: &mut S) -> bool {
        self.clock.tick();
        if self.paused {
            return false;
        }
        stepper.step();
        true
    }

    /// Run `frames` ticks back to back.
    pub fn run_for<S: Stepper + ?Sized>(&mut self, stepper: &mut S, frames: u64) {
        for _ in 0..frames {
            self.tick(stepper);
        }
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    #[inline]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    #[inline]
    pub fn clock(&self) -> &FrameClock {
        &self.clock
    }

    #[inline]
    pub fn fps(&self) -> f32 {
        self.clock.fps()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Counter {
        steps: u64,
        target: Target,
    }

    impl Stepper for Counter {
        fn step(&mut self) {
            self.steps += 1;
        }

        fn trigger(&mut self) -> Target {
            self.target = crate::target::toggle(self.target);
            self.target
        }

        fn frame(&self) -> u64 {
            self.steps
        }
    }

    #[test]
    fn test_one_step_per_tick() {
        let mut scheduler = FrameScheduler::new();
        let mut counter = Counter::default();
        for _ in 0..7 {
            assert!(scheduler.tick(&mut counter));
        }
        assert_eq!(counter.frame(), 7);
        assert_eq!(scheduler.clock().frame(), 7);
    }

    #[test]
    fn test_paused_ticks_do_not_step() {
        let mut scheduler = FrameScheduler::new();
        let mut counter = Counter::default();
        scheduler.set_paused(true);
        scheduler.run_for(&mut counter, 3);
        assert_eq!(counter.steps, 0);
        scheduler.set_paused(false);
        scheduler.run_for(&mut counter, 3);
        assert_eq!(counter.steps, 3);
    }

    #[test]
    fn test_stepper_is_object_safe() {
        let mut scheduler = FrameScheduler::new();
        let mut counter = Counter::default();
        let stepper: &mut dyn Stepper = &mut counter;
        scheduler.tick(stepper);
        assert_eq!(stepper.trigger(), Target::B);
        assert_eq!(stepper.frame(), 1);
    }
}
