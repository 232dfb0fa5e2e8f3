//! Rotor Motion Controller
//!
//! Open-loop, time based dead reckoning of the rotor bearing. There is no
//! position sensor: while the motor runs, the bearing advances by a fixed
//! increment every tick, derived from the time a full 0° to 360° traversal
//! takes (the run time). The run time itself is measured by a calibration
//! run, during which the controller counts the ticks the motor is powered.
//!
//! # State machine
//!
//! ```text
//!            target > ceil(bearing)
//!      +--------------------------------> TurningCw --+
//!      |                                              | bearing >= target
//!     Idle <------------------------------------------+
//!      |                                              | bearing <= target
//!      +--------------------------------> TurningCcw -+
//!            target < floor(bearing)
//! ```
//!
//! A transition decided in one tick takes effect at the start of the next.
//! The tick that crosses the target therefore still applies its increment,
//! so the bearing may overshoot the target by at most one increment.
//!
//! Comparing the target against the ceiling (upwards) or floor (downwards)
//! of the fractional bearing keeps an idle rotor from hunting around a
//! target it already overshot by a fraction of a degree.
//!
//! Stalls and relay faults cannot be detected; the bearing is only as good
//! as the run time calibration.

use libm::{ceilf, floorf};

use crate::log_error;
use crate::log_debug;
use crate::logging::debug_fmt;
use crate::system::config::{FULL_CIRCLE_DEG, MAX_BEARING};
use crate::system::relay::{Direction, RelayDriver, RelayState};

/// Motion states of the rotor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MotionState {
    /// Motor stopped, bearing equals target within hysteresis
    Idle,
    /// Motor running clockwise, bearing increasing
    TurningCw,
    /// Motor running counter-clockwise, bearing decreasing
    TurningCcw,
}

impl MotionState {
    /// Relay pattern belonging to this state
    pub const fn relays(self) -> RelayState {
        match self {
            MotionState::Idle => RelayState::REST,
            MotionState::TurningCw => RelayState::turning(Direction::Clockwise),
            MotionState::TurningCcw => RelayState::turning(Direction::CounterClockwise),
        }
    }
}

/// Clamps an angle to the valid bearing range
pub fn clamp_bearing(angle: u16) -> u16 {
    angle.min(MAX_BEARING)
}

/// Bearing tracker and relay sequencer
pub struct MotionController<R> {
    /// Relay output stage
    relays: R,
    /// State processed in the current tick
    state: MotionState,
    /// State that becomes active at the start of the next tick
    next_state: MotionState,
    /// Dead-reckoned bearing in degrees with sub-degree precision
    bearing: f32,
    /// Commanded bearing in degrees
    target: u16,
    /// Ticks for a full 0° to 360° traversal
    run_time: u16,
    /// Degrees moved per tick while turning
    degrees_per_tick: f32,
    /// Last relay pattern written to the output stage
    outputs: RelayState,
    /// Calibration counter enabled
    calibrating: bool,
    /// Ticks counted while turning with calibration enabled
    calibration_ticks: u16,
}

impl<R: RelayDriver> MotionController<R> {
    /// Creates an idle controller at `bearing` and puts both relays at rest
    pub fn new(relays: R, bearing: u16, run_time: u16) -> Self {
        let run_time = run_time.max(1);
        let bearing = clamp_bearing(bearing);
        let mut controller = Self {
            relays,
            state: MotionState::Idle,
            next_state: MotionState::Idle,
            bearing: f32::from(bearing),
            target: bearing,
            run_time,
            degrees_per_tick: FULL_CIRCLE_DEG / f32::from(run_time),
            outputs: RelayState::REST,
            calibrating: false,
            calibration_ticks: 0,
        };
        controller.apply(RelayState::REST);
        controller
    }

    /// Sets the bearing to turn to, clamped to [0, 360]
    ///
    /// Motion starts on the next [`tick`](Self::tick).
    pub fn set_target(&mut self, angle: u16) -> u16 {
        self.target = clamp_bearing(angle);
        self.target
    }

    /// Advances the state machine by one tick
    pub fn tick(&mut self) {
        match self.state {
            MotionState::Idle => self.process_idle(),
            MotionState::TurningCw => {
                self.process_turning(Direction::Clockwise);
                self.count_calibration();
            }
            MotionState::TurningCcw => {
                self.process_turning(Direction::CounterClockwise);
                self.count_calibration();
            }
        }
        self.state = self.next_state;
    }

    /// Idle: release the motor if it was running and decide on a direction
    fn process_idle(&mut self) {
        if self.outputs.run {
            self.stop();
        }

        let target = f32::from(self.target);
        self.next_state = if target > ceilf(self.bearing) {
            MotionState::TurningCw
        } else if target < floorf(self.bearing) {
            MotionState::TurningCcw
        } else {
            MotionState::Idle
        };
    }

    /// Turning: energise on entry, advance the bearing, schedule the stop
    fn process_turning(&mut self, direction: Direction) {
        let wanted = RelayState::turning(direction);
        if self.outputs != wanted {
            log_debug!(
                "Rotor turning {:?} from {} to {}",
                direction,
                self.bearing(),
                self.target
            );
            self.apply(wanted);
        }

        let target = f32::from(self.target);
        match direction {
            Direction::Clockwise => {
                self.bearing = (self.bearing + self.degrees_per_tick).min(FULL_CIRCLE_DEG);
                if self.bearing >= target {
                    self.next_state = MotionState::Idle;
                }
            }
            Direction::CounterClockwise => {
                self.bearing = (self.bearing - self.degrees_per_tick).max(0.0);
                if self.bearing <= target {
                    self.next_state = MotionState::Idle;
                }
            }
        }
    }

    /// Counts one tick of a calibration run, saturating at `u16::MAX`
    fn count_calibration(&mut self) {
        if self.calibrating {
            self.calibration_ticks = self.calibration_ticks.saturating_add(1);
        }
    }

    /// Releases both relays
    fn stop(&mut self) {
        log_debug!("Rotor stopped at {}", self.bearing());
        self.apply(RelayState::REST);
    }

    /// Writes a relay pattern to the output stage
    fn apply(&mut self, state: RelayState) {
        self.outputs = state;
        if let Err(e) = self.relays.set_relays(state) {
            log_error!("Relay write failed: {:?}", debug_fmt(&e));
        }
    }

    /// Starts counting turning ticks from zero
    pub fn start_calibration(&mut self) {
        self.calibrating = true;
        self.calibration_ticks = 0;
    }

    /// Stops counting and returns the ticks counted since
    /// [`start_calibration`](Self::start_calibration)
    pub fn read_calibration(&mut self) -> u16 {
        self.calibrating = false;
        self.calibration_ticks
    }

    /// Whether a calibration count is running
    pub fn is_calibrating(&self) -> bool {
        self.calibrating
    }

    /// Ticks counted so far, without stopping the count
    pub fn calibration_ticks(&self) -> u16 {
        self.calibration_ticks
    }

    /// Re-initialises bearing, target and run time
    ///
    /// Used at boot with the persisted values and after a calibration run
    /// with the newly measured run time. A running motor is stopped.
    pub fn reconfigure(&mut self, angle: u16, run_time: u16) {
        let angle = clamp_bearing(angle);
        self.run_time = run_time.max(1);
        self.degrees_per_tick = FULL_CIRCLE_DEG / f32::from(self.run_time);
        self.bearing = f32::from(angle);
        self.target = angle;
        self.state = MotionState::Idle;
        self.next_state = MotionState::Idle;
        if self.outputs != RelayState::REST {
            self.stop();
        }
    }

    /// Stops the motor immediately and holds the current bearing
    pub fn halt(&mut self) {
        self.target = self.bearing();
        self.state = MotionState::Idle;
        self.next_state = MotionState::Idle;
        if self.outputs != RelayState::REST {
            self.stop();
        }
    }

    /// Drives the motor by hand without advancing the bearing model
    ///
    /// `None` releases the motor. Only meant for the test and calibration
    /// sequence, where the rotor is driven into a mechanical end stop.
    pub fn jog(&mut self, direction: Option<Direction>) {
        let wanted = direction.map_or(RelayState::REST, RelayState::turning);
        if self.outputs != wanted {
            self.apply(wanted);
        }
    }

    /// Energises relays directly for the relay self-test
    pub fn override_relays(&mut self, relays: RelayState) {
        if self.outputs != relays {
            self.apply(relays);
        }
    }

    /// Current bearing truncated to whole degrees
    pub fn bearing(&self) -> u16 {
        self.bearing as u16
    }

    /// Current bearing with sub-degree precision
    pub fn bearing_exact(&self) -> f32 {
        self.bearing
    }

    /// Commanded bearing
    pub fn target(&self) -> u16 {
        self.target
    }

    /// State processed by the last tick
    pub fn state(&self) -> MotionState {
        self.state
    }

    /// Whether the motor is currently powered
    pub fn is_moving(&self) -> bool {
        self.outputs.run
    }

    /// Relay pattern currently applied
    pub fn relays(&self) -> RelayState {
        self.outputs
    }

    /// Configured full-rotation run time in ticks
    pub fn run_time(&self) -> u16 {
        self.run_time
    }

    /// Degrees per tick while turning
    pub fn degrees_per_tick(&self) -> f32 {
        self.degrees_per_tick
    }

    /// Relay output stage
    pub fn driver(&self) -> &R {
        &self.relays
    }
}
