//! Relay motor driver
//!
//! The rotor motor is switched by two relays:
//! - the run relay powers the motor
//! - the direction relay selects clockwise (energised) or counter-clockwise
//!   (rest)
//!
//! Because direction is a single changeover relay, clockwise and
//! counter-clockwise drive can never be active at the same time.

/// Rotation direction of the motor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    /// Clockwise, bearing increases
    Clockwise,
    /// Counter-clockwise, bearing decreases
    CounterClockwise,
}

/// Energised state of both relays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RelayState {
    /// Run relay energised, motor powered
    pub run: bool,
    /// Direction relay energised, clockwise selected
    pub clockwise: bool,
}

impl RelayState {
    /// Both relays at rest
    pub const REST: Self = Self {
        run: false,
        clockwise: false,
    };

    /// Relay pattern that turns the motor in `direction`
    pub const fn turning(direction: Direction) -> Self {
        Self {
            run: true,
            clockwise: matches!(direction, Direction::Clockwise),
        }
    }

    /// Direction the motor is actually driven in, if powered
    pub const fn drive(self) -> Option<Direction> {
        match (self.run, self.clockwise) {
            (false, _) => None,
            (true, true) => Some(Direction::Clockwise),
            (true, false) => Some(Direction::CounterClockwise),
        }
    }
}

/// Output stage switching the two relays
///
/// Writes are fire-and-forget: there is no feedback sensor, so a failing
/// write can only be logged.
pub trait RelayDriver {
    /// Error raised by the output stage
    type Error: core::fmt::Debug;

    /// Applies both relay levels
    fn set_relays(&mut self, state: RelayState) -> Result<(), Self::Error>;
}
