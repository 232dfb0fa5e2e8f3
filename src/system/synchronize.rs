//! Synchronisation mode
//!
//! Without a position sensor the bearing model drifts away from the real
//! rotor. Synchronisation drives the rotor a full sweep into both end stops
//! so model and rotor agree again afterwards:
//!
//! 1. Once the boot buttons are released the model is placed at 360° and
//!    driven to 0°. Whatever the real position was, the rotor ends up
//!    against the lower end stop.
//! 2. A single button pressed and released after the rotor stopped starts
//!    the sweep to 360°; another press once it has stopped finishes.
//!
//! Both buttons stop the rotor where it is and finish at any time.

use crate::system::buttons::Buttons;
use crate::system::config::MAX_BEARING;
use crate::system::controller::Devices;
use crate::system::display::Display;
use crate::system::motion::MotionState;
use crate::system::relay::RelayDriver;
use crate::system::steering::Steering;
use crate::system::storage::Storage;
use crate::{log_info, log_warn};

/// Steps of the synchronisation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SyncStep {
    #[default]
    Init,
    /// Sweep down to 0°
    Step1,
    /// Sweep up to 360°
    Step2,
    Finish,
}

/// Synchronisation mode state
#[derive(Debug, Default)]
pub struct Synchronization {
    step: SyncStep,
}

impl Synchronization {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step(&self) -> SyncStep {
        self.step
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

        if buttons == Buttons::Both && matches!(self.step, SyncStep::Step1 | SyncStep::Step2) {
            log_warn!("Synchronisation aborted at {}", devices.motion.bearing());
            devices.motion.halt();
            self.step = SyncStep::Finish;
        }

        match self.step {
            SyncStep::Init => {
                devices.display.clear();
                devices.memory.clear();
                self.step = SyncStep::Step1;
            }
            SyncStep::Step1 => {
                if Self::sweep(devices, buttons, 0) {
                    self.step = SyncStep::Step2;
                }
            }
            SyncStep::Step2 => {
                if Self::sweep(devices, buttons, MAX_BEARING) {
                    self.step = SyncStep::Finish;
                }
            }
            SyncStep::Finish => {
                let bearing = devices.motion.bearing();
                log_info!("Synchronised at {}", bearing);
                devices.store.write_bearing(bearing);
                devices.steering.reset(bearing);
                return true;
            }
        }

        devices.motion.tick();
        devices.show_motion();
        false
    }

    /// Starts a sweep to `target` on the first release, returns true when a
    /// single button is pressed after the sweep has come to rest
    fn sweep<R, D, S, St>(devices: &mut Devices<R, D, S, St>, buttons: Buttons, target: u16) -> bool
    where
        R: RelayDriver,
        D: Display,
        S: Steering,
        St: Storage,
    {
        if !devices.memory.is_armed() {
            if !buttons.any() && devices.memory.arm() {
                if target == 0 {
                    let run_time = devices.motion.run_time();
                    devices.motion.reconfigure(MAX_BEARING, run_time);
                }
                log_info!("Synchronising towards {}", target);
                devices.motion.set_target(target);
            }
            return false;
        }

        let at_rest = devices.motion.state() == MotionState::Idle && !devices.motion.is_moving();
        let single = matches!(buttons, Buttons::A | Buttons::B);
        if single && devices.memory.is_new_press() && at_rest {
            devices.memory.fire();
            return true;
        }
        false
    }
}
