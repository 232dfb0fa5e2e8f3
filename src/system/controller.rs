//! Operating Mode Controller
//!
//! Top level of the rotor control core. One [`RotorController::tick`] per
//! control period runs the active operating mode:
//!
//! - **Normal**: the steering target is fed to the motion controller, the
//!   bearing is drawn on the ring and saved once the rotor comes to rest.
//! - **SetIntensity**, **Synchronize**, **TestCalibrate**: step sequences in
//!   their own modules that hand control back to Normal when finished.
//!
//! The mode is selected once, at construction, from the buttons held at
//! boot.

use crate::log_info;
use crate::system::buttons::{Buttons, FunctionMemory};
use crate::system::config::RotorConfig;
use crate::system::display::Display;
use crate::system::intensity::IntensitySetting;
use crate::system::motion::MotionController;
use crate::system::relay::RelayDriver;
use crate::system::state::OperatingMode;
use crate::system::steering::Steering;
use crate::system::storage::{PersistentStore, Storage};
use crate::system::synchronize::Synchronization;
use crate::system::test_calibrate::TestCalibration;

/// Everything an operating mode works on during a tick
pub struct Devices<R, D, S, St> {
    pub motion: MotionController<R>,
    pub display: D,
    pub steering: S,
    pub store: PersistentStore<St>,
    /// Button latch shared by the step sequences
    pub memory: FunctionMemory,
    pub config: RotorConfig,
    /// LED brightness in effect
    pub brightness: u8,
}

impl<R, D, S, St> Devices<R, D, S, St>
where
    R: RelayDriver,
    D: Display,
    S: Steering,
    St: Storage,
{
    /// Samples the buttons into the function memory
    pub fn observe(&mut self) -> Buttons {
        let buttons = self.steering.buttons();
        self.memory.observe(buttons)
    }

    /// Draws bearing, target and motor state on the display
    pub fn show_motion(&mut self) {
        self.display.set_current(self.motion.bearing());
        self.display.set_next(self.motion.target());
        self.display.set_moving(self.motion.is_moving());
        self.display.render();
    }
}

/// Supervisory state machine over the operating modes
pub struct RotorController<R, D, S, St> {
    devices: Devices<R, D, S, St>,
    mode: OperatingMode,
    /// Motor state of the previous Normal tick
    was_moving: bool,
    intensity: IntensitySetting,
    synchronization: Synchronization,
    test: TestCalibration,
}

impl<R, D, S, St> RotorController<R, D, S, St>
where
    R: RelayDriver,
    D: Display,
    S: Steering,
    St: Storage,
{
    /// Restores the persisted settings and selects the operating mode from
    /// the buttons held right now
    pub fn new(relays: R, mut display: D, mut steering: S, storage: St, config: RotorConfig) -> Self {
        let mut store = PersistentStore::new(storage, config);
        let run_time = store.read_run_time();
        let brightness = store.read_brightness();
        let bearing = store.read_bearing();

        let motion = MotionController::new(relays, bearing, run_time);
        steering.reset(bearing);
        display.set_brightness(brightness);

        let mode = OperatingMode::from_buttons(steering.buttons());
        log_info!(
            "Rotor controller starting in {:?} mode at {} deg, run time {} ticks",
            mode,
            bearing,
            run_time
        );

        Self {
            devices: Devices {
                motion,
                display,
                steering,
                store,
                memory: FunctionMemory::new(),
                config,
                brightness,
            },
            mode,
            was_moving: false,
            intensity: IntensitySetting::new(),
            synchronization: Synchronization::new(),
            test: TestCalibration::new(),
        }
    }

    /// Runs one control period
    pub fn tick(&mut self) {
        let finished = match self.mode {
            OperatingMode::Normal => {
                self.normal();
                false
            }
            OperatingMode::SetIntensity => self.intensity.tick(&mut self.devices),
            OperatingMode::Synchronize => self.synchronization.tick(&mut self.devices),
            OperatingMode::TestCalibrate => self.test.tick(&mut self.devices),
        };

        if finished {
            self.enter_normal();
        }
    }

    /// Normal operation: follow the steering target
    fn normal(&mut self) {
        let devices = &mut self.devices;
        devices.steering.scan();
        devices.motion.set_target(devices.steering.target());
        devices.motion.tick();
        devices.show_motion();

        let moving = devices.motion.is_moving();
        if self.was_moving && !moving {
            let bearing = devices.motion.bearing();
            log_info!("Rotor at rest at {} deg", bearing);
            devices.store.write_bearing(bearing);
        }
        self.was_moving = moving;
    }

    /// Hands control back to Normal with a stopped rotor
    fn enter_normal(&mut self) {
        log_info!("{:?} finished, entering Normal mode", self.mode);
        let devices = &mut self.devices;
        devices.motion.halt();
        devices.memory.clear();
        devices.steering.reset(devices.motion.bearing());
        devices.display.clear();
        devices.display.set_brightness(devices.brightness);
        self.was_moving = false;
        self.mode = OperatingMode::Normal;
    }

    pub fn mode(&self) -> OperatingMode {
        self.mode
    }

    pub fn devices(&self) -> &Devices<R, D, S, St> {
        &self.devices
    }

    pub fn motion(&self) -> &MotionController<R> {
        &self.devices.motion
    }

    pub fn display(&self) -> &D {
        &self.devices.display
    }

    pub fn steering(&self) -> &S {
        &self.devices.steering
    }

    pub fn store(&self) -> &PersistentStore<St> {
        &self.devices.store
    }

    /// Brightness in effect
    pub fn brightness(&self) -> u8 {
        self.devices.brightness
    }

    pub fn intensity(&self) -> &IntensitySetting {
        &self.intensity
    }

    pub fn synchronization(&self) -> &Synchronization {
        &self.synchronization
    }

    pub fn test(&self) -> &TestCalibration {
        &self.test
    }
}
