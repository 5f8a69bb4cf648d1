//! Target selection between the two encoded images.
//!
//! There is no transition state: flipping the target only rebinds the
//! velocity stage's attractor texture. The visible morph comes entirely from
//! the damped force law pulling particles toward the new positions.

use std::fmt;

/// One of the two target images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Target {
    #[default]
    A,
    B,
}

impl Target {
    /// Both targets, in slot order.
    pub const ALL: [Target; 2] = [Target::A, Target::B];

    /// Slot index (`A = 0`, `B = 1`), matching the uniform flag value.
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Target::A => 0,
            Target::B => 1,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::A => write!(f, "A"),
            Target::B => write!(f, "B"),
        }
    }
}

/// Pure transition: `A ↔ B`.
#[inline]
pub fn toggle(state: Target) -> Target {
    match state {
        Target::A => Target::B,
        Target::B => Target::A,
    }
}

/// Owns the current target. Starts at [`Target::A`].
#[derive(Debug, Clone, Default)]
pub struct TargetSelector {
    current: Target,
    switches: u64,
}

impl TargetSelector {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn current(&self) -> Target {
        self.current
    }

    /// Handle the external trigger. Returns the new target.
    pub fn trigger(&mut self) -> Target {
        self.current = toggle(self.current);
        self.switches += 1;
        tracing::debug!(selected = %self.current, switches = self.switches, "target switched");
        self.current
    }

    /// How many times the trigger has fired.
    #[inline]
    pub fn switches(&self) -> u64 {
        self.switches
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_is_involution() {
        for t in Target::ALL {
            assert_ne!(toggle(t), t);
            assert_eq!(toggle(toggle(t)), t);
        }
    }

    #[test]
    fn test_selector_starts_at_a() {
        let selector = TargetSelector::new();
        assert_eq!(selector.current(), Target::A);
        assert_eq!(selector.switches(), 0);
    }

    #[test]
    fn test_trigger_flips() {
        let mut selector = TargetSelector::new();
        assert_eq!(selector.trigger(), Target::B);
        assert_eq!(selector.trigger(), Target::A);
        assert_eq!(selector.switches(), 2);
    }

    #[test]
    fn test_index() {
        assert_eq!(Target::A.index(), 0);
        assert_eq!(Target::B.index(), 1);
    }
}
