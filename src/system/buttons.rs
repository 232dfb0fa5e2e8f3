//! Button state and function memory
//!
//! The rotor has two push buttons. Every operating mode samples them once
//! per tick as a [`Buttons`] mask and uses a [`FunctionMemory`] latch to tell
//! a deliberate "confirm" gesture apart from a button that is simply still
//! held down from the previous step.

use crate::system::config::{DEBOUNCE_TICKS, RELEASE_TICKS};

/// Combined state of both buttons at one sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Buttons {
    /// No button pressed
    #[default]
    None,
    /// Only button A pressed (clockwise / increase)
    A,
    /// Only button B pressed (counter-clockwise / decrease)
    B,
    /// Both buttons pressed together
    Both,
}

impl Buttons {
    /// Builds the mask from the two raw button levels (true = pressed)
    pub const fn from_levels(a: bool, b: bool) -> Self {
        match (a, b) {
            (false, false) => Buttons::None,
            (true, false) => Buttons::A,
            (false, true) => Buttons::B,
            (true, true) => Buttons::Both,
        }
    }

    /// Bit mask representation (bit 0 = A, bit 1 = B)
    pub const fn bits(self) -> u8 {
        match self {
            Buttons::None => 0b00,
            Buttons::A => 0b01,
            Buttons::B => 0b10,
            Buttons::Both => 0b11,
        }
    }

    /// True when at least one button is pressed
    pub const fn any(self) -> bool {
        !matches!(self, Buttons::None)
    }
}

/// Stable-count filter for raw button samples
///
/// A new level is accepted once it has been sampled [`DEBOUNCE_TICKS`] times
/// in a row; contact bounce shorter than that never reaches the modes.
#[derive(Debug, Clone, Copy, Default)]
pub struct Debouncer {
    stable: Buttons,
    candidate: Buttons,
    count: u8,
}

impl Debouncer {
    pub const fn new() -> Self {
        Self {
            stable: Buttons::None,
            candidate: Buttons::None,
            count: 0,
        }
    }

    /// Feeds one raw sample, returns the debounced state
    pub fn update(&mut self, raw: Buttons) -> Buttons {
        if raw == self.stable {
            self.candidate = raw;
            self.count = 0;
            return self.stable;
        }

        if raw == self.candidate {
            self.count += 1;
        } else {
            self.candidate = raw;
            self.count = 1;
        }

        if self.count >= DEBOUNCE_TICKS {
            self.stable = raw;
            self.count = 0;
        }
        self.stable
    }

    /// Last accepted state
    pub fn state(&self) -> Buttons {
        self.stable
    }
}

/// One-shot latch for button driven step sequences
///
/// A step arms the latch when it sees the press it is waiting for and fires
/// it on the confirming gesture (usually both buttons). After firing the
/// latch stays blocked until the buttons have been released for
/// [`RELEASE_TICKS`] samples, so a press held across a step boundary (or a
/// single bouncing release) cannot arm or fire the next step.
///
/// Call [`observe`](Self::observe) exactly once per tick before any of the
/// other methods.
#[derive(Debug, Clone, Copy, Default)]
pub struct FunctionMemory {
    armed: bool,
    blocked: bool,
    released: u8,
    previous: Buttons,
    current: Buttons,
}

impl FunctionMemory {
    /// Creates a disarmed latch
    pub const fn new() -> Self {
        Self {
            armed: false,
            blocked: false,
            released: 0,
            previous: Buttons::None,
            current: Buttons::None,
        }
    }

    /// Records this tick's button sample
    pub fn observe(&mut self, buttons: Buttons) -> Buttons {
        self.previous = self.current;
        self.current = buttons;
        if buttons.any() {
            self.released = 0;
        } else {
            self.released = self.released.saturating_add(1);
            if self.released >= RELEASE_TICKS {
                self.blocked = false;
            }
        }
        buttons
    }

    /// True on the first pressed sample after a release
    ///
    /// Changing from one pressed combination to another is not a new press,
    /// nor is a press while blocked after a fire.
    pub fn is_new_press(&self) -> bool {
        self.current.any() && !self.previous.any() && !self.blocked
    }

    /// Whether the gesture that fired the latch is still going on
    pub fn is_blocked(&self) -> bool {
        self.blocked
    }

    /// True when this tick's sample differs from the previous one, including
    /// releases
    pub fn changed(&self) -> bool {
        self.current != self.previous
    }

    /// This tick's sample
    pub fn current(&self) -> Buttons {
        self.current
    }

    /// Arms the latch, returns true if it was not armed before
    ///
    /// Has no effect while blocked after a fire.
    pub fn arm(&mut self) -> bool {
        if self.blocked || self.armed {
            return false;
        }
        self.armed = true;
        true
    }

    /// Whether a qualifying press has been observed
    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Fires the latch if armed; disarms it and blocks re-arming until the
    /// buttons have been released
    pub fn fire(&mut self) -> bool {
        if !self.armed {
            return false;
        }
        self.armed = false;
        self.blocked = self.current.any();
        true
    }

    /// Drops any armed state without blocking
    pub fn clear(&mut self) {
        self.armed = false;
        self.blocked = false;
        self.released = 0;
    }
}
