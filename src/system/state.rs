//! Operating Modes
//!
//! The controller runs in exactly one mode. The mode is picked once at boot
//! from the buttons held while powering up:
//!
//! | Buttons at boot | Mode            |
//! | --------------- | --------------- |
//! | none            | Normal          |
//! | A               | Synchronize     |
//! | B               | SetIntensity    |
//! | both            | TestCalibrate   |
//!
//! Every other mode returns to Normal from its last step.

use crate::system::buttons::Buttons;

/// Top level operating mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OperatingMode {
    /// Steering by buttons, bearing shown on the ring
    #[default]
    Normal,
    /// LED brightness adjustment
    SetIntensity,
    /// Re-anchoring the bearing model at the end stops
    Synchronize,
    /// Hardware self-test and run time calibration
    TestCalibrate,
}

impl OperatingMode {
    /// Mode selected by the buttons held at boot
    pub const fn from_buttons(buttons: Buttons) -> Self {
        match buttons {
            Buttons::None => OperatingMode::Normal,
            Buttons::A => OperatingMode::Synchronize,
            Buttons::B => OperatingMode::SetIntensity,
            Buttons::Both => OperatingMode::TestCalibrate,
        }
    }
}
