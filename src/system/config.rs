//! Rotor Configuration
//!
//! Compile-time constants of the control loop and the factory defaults that
//! are seeded into persistent storage on first boot.

/// Period of one control loop tick in milliseconds
pub const TICK_PERIOD_MS: u64 = 10;

/// Ticks a raw button level has to hold before it is accepted
pub const DEBOUNCE_TICKS: u8 = 3;

/// Consecutive released samples that end a button gesture
pub const RELEASE_TICKS: u8 = 2;

/// Number of indicator cells on the LED ring
pub const LED_COUNT: usize = 24;

/// Highest bearing the rotor can be commanded to (degrees)
pub const MAX_BEARING: u16 = 360;

/// Full compass card in degrees, used for the per-tick increment
pub const FULL_CIRCLE_DEG: f32 = 360.0;

/// Settings the controller falls back to when storage holds nothing usable
///
/// Run times are expressed in control loop ticks for a full 0° to 360°
/// traversal, so 36000 ticks at 10 ms equals six minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RotorConfig {
    /// Full-rotation run time seeded on first boot (ticks)
    pub default_run_time: u16,
    /// LED brightness seeded on first boot
    pub default_brightness: u8,
    /// Bearing seeded on first boot (degrees)
    pub default_bearing: u16,
    /// Brightness the intensity setting mode starts from
    pub intensity_start: u8,
    /// Model run time used while timing a calibration run (ticks)
    ///
    /// Must be slower than any real rotor so the model never reaches the
    /// end of its sweep before the operator stops the measurement.
    pub calibration_run_time: u16,
}

impl RotorConfig {
    /// Factory defaults
    pub const DEFAULT: Self = Self {
        default_run_time: 36_000,
        default_brightness: 200,
        default_bearing: 0,
        intensity_start: 200,
        calibration_run_time: u16::MAX,
    };
}

impl Default for RotorConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}
