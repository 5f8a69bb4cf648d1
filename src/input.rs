//! The single user trigger: a left click or a touch.
//!
//! Raw winit events are reduced to press edges. Holding the button does not
//! repeat; each new press counts once and is consumed by [`Input::take_trigger`]
//! at the start of the next frame.

use winit::event::{ElementState, MouseButton, TouchPhase, WindowEvent};

#[derive(Debug, Default)]
pub struct Input {
    held: bool,
    pending: u32,
}

impl Input {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process a winit window event. Returns `true` if it produced a trigger.
    pub fn handle_event(&mut self, event: &WindowEvent) -> bool {
        match event {
            WindowEvent::MouseInput { state, button, .. } => self.on_button(*button, *state),
            WindowEvent::Touch(touch) if touch.phase == TouchPhase::Started => {
                self.pending += 1;
                true
            }
            _ => false,
        }
    }

    pub(crate) fn on_button(&mut self, button: MouseButton, state: ElementState) -> bool {
        if button != MouseButton::Left {
            return false;
        }
        match state {
            ElementState::Pressed if !self.held => {
                self.held = true;
                self.pending += 1;
                true
            }
            ElementState::Pressed => false,
            ElementState::Released => {
                self.held = false;
                false
            }
        }
    }

    /// Consume one pending trigger.
    pub fn take_trigger(&mut self) -> bool {
        if self.pending > 0 {
            self.pending -= 1;
            true
        } else {
            false
        }
    }

    /// Triggers received but not yet consumed.
    #[inline]
    pub fn pending(&self) -> u32 {
        self.pending
    }

    #[inline]
    pub fn is_held(&self) -> bool {
        self.held
    }
}
