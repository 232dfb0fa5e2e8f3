//! Brightness setting mode
//!
//! The ring is filled white as a reference. Holding A ramps the brightness
//! up to 254, then down to 1, then up again, so one button covers the whole
//! range. Pressing B after any adjustment stores the value and leaves.

use crate::log_info;
use crate::system::buttons::Buttons;
use crate::system::config::LED_COUNT;
use crate::system::controller::Devices;
use crate::system::display::{Display, WHITE};
use crate::system::relay::RelayDriver;
use crate::system::steering::Steering;
use crate::system::storage::Storage;

/// Highest brightness reached by the ramp
const RAMP_MAX: u8 = 254;
/// Lowest brightness reached by the ramp
const RAMP_MIN: u8 = 1;

/// Steps of the brightness setting mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IntensityStep {
    #[default]
    Init,
    Adjust,
    Finish,
}

/// Brightness setting mode state
#[derive(Debug, Default)]
pub struct IntensitySetting {
    step: IntensityStep,
    brightness: u8,
    rising: bool,
}

impl IntensitySetting {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step(&self) -> IntensityStep {
        self.step
    }

    /// Brightness being adjusted
    pub fn brightness(&self) -> u8 {
        self.brightness
    }

    /// Advances the mode by one tick, returns true once finished
    pub fn tick<R, D, S, St>(&mut self, devices: &mut Devices<R, D, S, St>) -> bool
    where
        R: RelayDriver,
        D: Display,
        S: Steering,
        St: Storage,
    {
        let buttons = devices.observe();
        match self.step {
            IntensityStep::Init => {
                self.brightness = devices.config.intensity_start;
                self.rising = true;
                devices.memory.clear();
                for cell in 0..LED_COUNT {
                    devices.display.set_cell(cell, WHITE);
                }
                devices.display.set_brightness(self.brightness);
                self.step = IntensityStep::Adjust;
            }
            IntensityStep::Adjust => match buttons {
                Buttons::A => {
                    self.ramp();
                    devices.memory.arm();
                    devices.display.set_brightness(self.brightness);
                }
                Buttons::B if devices.memory.fire() => self.step = IntensityStep::Finish,
                _ => {}
            },
            IntensityStep::Finish => {
                log_info!("Brightness set to {}", self.brightness);
                devices.store.write_brightness(self.brightness);
                devices.brightness = self.brightness;
                return true;
            }
        }
        false
    }

    /// Moves the brightness one step, turning around at the ramp limits
    fn ramp(&mut self) {
        if self.rising && self.brightness >= RAMP_MAX {
            self.rising = false;
        } else if !self.rising && self.brightness <= RAMP_MIN {
            self.rising = true;
        }

        self.brightness = if self.rising {
            self.brightness.saturating_add(1)
        } else {
            self.brightness.saturating_sub(1)
        };
    }
}
