//! Button Steering
//!
//! Turns the two push buttons into a commanded bearing. Button A turns the
//! target clockwise, button B counter-clockwise. Holding a button speeds the
//! target up through four tiers:
//!
//! | Tier | Ticks per step | Degrees per step | Steps before next tier |
//! | ---- | -------------- | ---------------- | ---------------------- |
//! | 1    | 21             | 1                | 10                     |
//! | 2    | 10             | 2                | 10                     |
//! | 3    | 4              | 3                | 10                     |
//! | 4    | 2              | 4                | -                      |
//!
//! Releasing the buttons drops back to tier 1.

use crate::system::buttons::Buttons;
use crate::system::config::MAX_BEARING;

/// Raw access to the two buttons
pub trait ButtonInput {
    /// Samples both buttons
    fn read(&mut self) -> Buttons;
}

/// Source of the commanded bearing as seen by the operating mode controller
pub trait Steering {
    /// Samples the buttons without touching the speed ramp
    fn buttons(&mut self) -> Buttons;
    /// Samples the buttons and advances the target by the speed ramp
    fn scan(&mut self) -> Buttons;
    /// Commanded bearing
    fn target(&self) -> u16;
    /// Replaces the commanded bearing, clamped to [0, 360]
    fn reset(&mut self, angle: u16);
}

/// One speed tier of the ramp
#[derive(Debug, Clone, Copy)]
struct SpeedTier {
    /// A step is taken once the hold counter exceeds this
    interval: u8,
    /// Degrees per step
    step: u16,
    /// Steps taken before moving to the next tier
    repeats: u8,
}

const TIERS: [SpeedTier; 4] = [
    SpeedTier { interval: 20, step: 1, repeats: 10 },
    SpeedTier { interval: 9, step: 2, repeats: 10 },
    SpeedTier { interval: 3, step: 3, repeats: 10 },
    SpeedTier { interval: 1, step: 4, repeats: 0 },
];

/// Upper bound of the hold counter
const HOLD_MAX: u8 = 100;

/// Steering with a hold-to-accelerate speed ramp
pub struct SpeedRampSteering<B> {
    input: B,
    target: u16,
    tier: usize,
    hold: u8,
    repeats: u8,
}

impl<B: ButtonInput> SpeedRampSteering<B> {
    pub fn new(input: B, target: u16) -> Self {
        Self {
            input,
            target: target.min(MAX_BEARING),
            tier: 0,
            hold: 0,
            repeats: 0,
        }
    }

    /// Speed tier currently active, 1 based
    pub fn tier(&self) -> usize {
        self.tier + 1
    }

    /// Drops back to the slowest tier
    fn release(&mut self) {
        self.tier = 0;
        self.hold = 0;
        self.repeats = 0;
    }

    /// Counts one held tick and steps the target when the tier allows
    fn hold(&mut self, clockwise: bool) {
        let tier = TIERS[self.tier];
        self.hold = (self.hold + 1).min(HOLD_MAX);
        if self.hold <= tier.interval {
            return;
        }

        self.hold = 0;
        self.target = if clockwise {
            (self.target + tier.step).min(MAX_BEARING)
        } else {
            self.target.saturating_sub(tier.step)
        };

        if self.tier + 1 < TIERS.len() {
            self.repeats += 1;
            if self.repeats >= tier.repeats {
                self.tier += 1;
                self.repeats = 0;
            }
        }
    }
}

impl<B: ButtonInput> Steering for SpeedRampSteering<B> {
    fn buttons(&mut self) -> Buttons {
        self.input.read()
    }

    fn scan(&mut self) -> Buttons {
        let buttons = self.input.read();
        match buttons {
            Buttons::A => self.hold(true),
            Buttons::B => self.hold(false),
            // both buttons have no steering meaning, treat as release
            Buttons::None | Buttons::Both => self.release(),
        }
        buttons
    }

    fn target(&self) -> u16 {
        self.target
    }

    fn reset(&mut self, angle: u16) {
        self.target = angle.min(MAX_BEARING);
        self.release();
    }
}
