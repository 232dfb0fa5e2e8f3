//! Test and calibration mode
//!
//! A fixed sequence of hardware checks followed by the run time
//! calibration. Every step follows the same pattern: a single button press
//! exercises the step and arms the function memory, both buttons together
//! then confirm and move on. Steps only ever move forward.
//!
//! The first ring cells track progress: blue marks the step waiting for
//! input, green a passed check, red a failed check or a running motor.
//!
//! | # | Step        | A                      | B                     |
//! | - | ----------- | ---------------------- | --------------------- |
//! | 1 | LedTest     | start rainbow          |                       |
//! | 2 | SwitchTest  | cell 2 green           | cell 3 green          |
//! | 3 | RelayTest   | run relay on           | direction relay on    |
//! | 4 | MemoryTest  | storage self-test      |                       |
//! | 5 | DriveToZero | turn counter-clockwise |                       |
//! | 6 | TimedRun    | start measuring        | stop measuring        |
//! | 7 | Confirm     | any press and release finishes                 |

use crate::system::buttons::Buttons;
use crate::system::config::{LED_COUNT, MAX_BEARING};
use crate::system::controller::Devices;
use crate::system::display::{wheel, Display, BLUE, GREEN, RED};
use crate::system::relay::{Direction, RelayDriver, RelayState};
use crate::system::steering::Steering;
use crate::system::storage::Storage;
use crate::{log_info, log_warn};

/// Steps of the test and calibration sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TestStep {
    #[default]
    Init = 0,
    LedTest = 1,
    SwitchTest = 2,
    RelayTest = 3,
    MemoryTest = 4,
    DriveToZero = 5,
    TimedRun = 6,
    Confirm = 7,
    Finish = 8,
}

impl TestStep {
    /// Position in the sequence
    pub const fn index(self) -> u8 {
        self as u8
    }
}

/// Test and calibration mode state
#[derive(Debug, Default)]
pub struct TestCalibration {
    step: TestStep,
    /// Colour wheel offset of the LED test
    wheel: u8,
    /// Next cell painted by the LED test
    cell: usize,
    /// Last storage self-test outcome
    memory_passed: Option<bool>,
    /// Ticks captured by the timed run
    captured: u16,
    /// Motor jogged by a fresh press in the drive to zero step
    jogging: bool,
}

impl TestCalibration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step(&self) -> TestStep {
        self.step
    }

    /// Outcome of the last storage self-test, if one ran
    pub fn memory_passed(&self) -> Option<bool> {
        self.memory_passed
    }

    /// Ticks captured by the timed run, zero before the capture
    pub fn captured(&self) -> u16 {
        self.captured
    }

    /// Advances the sequence by one tick, returns true once finished
    pub fn tick<R, D, S, St>(&mut self, devices: &mut Devices<R, D, S, St>) -> bool
    where
        R: RelayDriver,
        D: Display,
        S: Steering,
        St: Storage,
    {
        let buttons = devices.observe();
        let next = match self.step {
            TestStep::Init => {
                devices.motion.halt();
                devices.memory.clear();
                devices.display.clear();
                devices.display.set_cell(1, BLUE);
                Some(TestStep::LedTest)
            }
            TestStep::LedTest => self.led_test(devices, buttons),
            TestStep::SwitchTest => Self::switch_test(devices, buttons),
            TestStep::RelayTest => Self::relay_test(devices, buttons),
            TestStep::MemoryTest => self.memory_test(devices, buttons),
            TestStep::DriveToZero => self.drive_to_zero(devices, buttons),
            TestStep::TimedRun => self.timed_run(devices, buttons),
            TestStep::Confirm => Self::confirm(devices, buttons),
            TestStep::Finish => {
                devices.motion.halt();
                return true;
            }
        };

        if let Some(step) = next {
            log_info!("Test step {:?} -> {:?}", self.step, step);
            self.step = step;
        }
        false
    }

    /// Fires the function memory on both buttons
    fn confirmed<R, D, S, St>(devices: &mut Devices<R, D, S, St>, buttons: Buttons) -> bool
    where
        R: RelayDriver,
        D: Display,
        S: Steering,
        St: Storage,
    {
        buttons == Buttons::Both && devices.memory.fire()
    }

    fn led_test<R, D, S, St>(&mut self, devices: &mut Devices<R, D, S, St>, buttons: Buttons) -> Option<TestStep>
    where
        R: RelayDriver,
        D: Display,
        S: Steering,
        St: Storage,
    {
        if buttons == Buttons::A {
            devices.memory.arm();
        }

        if Self::confirmed(devices, buttons) {
            devices.display.clear();
            devices.display.set_cell(0, BLUE);
            devices.display.set_cell(1, GREEN);
            devices.display.set_cell(2, BLUE);
            devices.display.set_cell(3, BLUE);
            return Some(TestStep::SwitchTest);
        }

        if devices.memory.is_armed() {
            let offset = (self.cell * 256 / LED_COUNT) as u8;
            devices.display.set_cell(self.cell, wheel(self.wheel.wrapping_add(offset)));
            self.cell += 1;
            if self.cell >= LED_COUNT {
                self.cell = 0;
                self.wheel = self.wheel.wrapping_add(1);
            }
        }
        None
    }

    fn switch_test<R, D, S, St>(devices: &mut Devices<R, D, S, St>, buttons: Buttons) -> Option<TestStep>
    where
        R: RelayDriver,
        D: Display,
        S: Steering,
        St: Storage,
    {
        if Self::confirmed(devices, buttons) {
            for cell in 2..=5 {
                devices.display.set_cell(cell, BLUE);
            }
            return Some(TestStep::RelayTest);
        }

        if devices.memory.changed() {
            match buttons {
                Buttons::A => {
                    devices.display.set_cell(2, GREEN);
                    devices.memory.arm();
                }
                Buttons::B => {
                    devices.display.set_cell(3, GREEN);
                    devices.memory.arm();
                }
                Buttons::None => {
                    devices.display.set_cell(2, BLUE);
                    devices.display.set_cell(3, BLUE);
                }
                Buttons::Both => {}
            }
        }
        None
    }

    fn relay_test<R, D, S, St>(devices: &mut Devices<R, D, S, St>, buttons: Buttons) -> Option<TestStep>
    where
        R: RelayDriver,
        D: Display,
        S: Steering,
        St: Storage,
    {
        if buttons == Buttons::Both {
            devices.motion.override_relays(RelayState::REST);
            if devices.memory.fire() {
                devices.display.set_cell(6, BLUE);
                return Some(TestStep::MemoryTest);
            }
            return None;
        }

        let fresh = !devices.memory.is_blocked();
        if devices.memory.changed() {
            match buttons {
                Buttons::A if fresh => {
                    devices.motion.override_relays(RelayState {
                        run: true,
                        clockwise: false,
                    });
                    devices.display.set_cell(4, GREEN);
                    devices.memory.arm();
                }
                Buttons::B if fresh => {
                    devices.motion.override_relays(RelayState {
                        run: false,
                        clockwise: true,
                    });
                    devices.display.set_cell(5, GREEN);
                    devices.memory.arm();
                }
                _ => {
                    devices.motion.override_relays(RelayState::REST);
                    devices.display.set_cell(4, BLUE);
                    devices.display.set_cell(5, BLUE);
                }
            }
        }
        None
    }

    fn memory_test<R, D, S, St>(&mut self, devices: &mut Devices<R, D, S, St>, buttons: Buttons) -> Option<TestStep>
    where
        R: RelayDriver,
        D: Display,
        S: Steering,
        St: Storage,
    {
        if Self::confirmed(devices, buttons) {
            devices.display.set_cell(6, BLUE);
            devices.display.set_cell(7, BLUE);
            return Some(TestStep::DriveToZero);
        }

        if buttons == Buttons::A && devices.memory.is_new_press() {
            let passed = devices.store.self_test();
            if !passed {
                log_warn!("Storage self-test failed");
            }
            self.memory_passed = Some(passed);
            devices.display.set_cell(6, if passed { GREEN } else { RED });
            devices.memory.arm();
        }
        None
    }

    fn drive_to_zero<R, D, S, St>(
        &mut self,
        devices: &mut Devices<R, D, S, St>,
        buttons: Buttons,
    ) -> Option<TestStep>
    where
        R: RelayDriver,
        D: Display,
        S: Steering,
        St: Storage,
    {
        if buttons == Buttons::A {
            if devices.memory.is_new_press() {
                self.jogging = true;
                devices.display.set_cell(7, RED);
                devices.memory.arm();
            }
            if self.jogging {
                devices.motion.jog(Some(Direction::CounterClockwise));
                return None;
            }
        } else if self.jogging {
            self.jogging = false;
            devices.display.set_cell(7, BLUE);
        }

        devices.motion.jog(None);

        if Self::confirmed(devices, buttons) {
            return Some(TestStep::TimedRun);
        }
        None
    }

    fn timed_run<R, D, S, St>(&mut self, devices: &mut Devices<R, D, S, St>, buttons: Buttons) -> Option<TestStep>
    where
        R: RelayDriver,
        D: Display,
        S: Steering,
        St: Storage,
    {
        let new_press = devices.memory.is_new_press();

        if !devices.memory.is_armed() {
            if buttons == Buttons::A && new_press && devices.memory.arm() {
                log_info!("Calibration run started");
                self.captured = 0;
                devices.motion.reconfigure(0, devices.config.calibration_run_time);
                devices.motion.start_calibration();
                devices.motion.set_target(MAX_BEARING);
            }
            return None;
        }

        if buttons == Buttons::B && new_press && devices.motion.is_calibrating() {
            self.captured = devices.motion.read_calibration();
            devices.motion.halt();
            log_info!("Calibration run captured {} ticks", self.captured);
        }

        if buttons == Buttons::Both && self.captured > 0 && devices.memory.fire() {
            let run_time = self.captured;
            log_info!("Run time calibrated to {} ticks", run_time);
            devices.store.write_run_time(run_time);
            devices.motion.reconfigure(MAX_BEARING, run_time);
            devices.store.write_bearing(MAX_BEARING);
            devices.steering.reset(MAX_BEARING);
            for cell in 0..=6 {
                devices.display.set_cell(cell, BLUE);
            }
            devices.display.set_cell(7, GREEN);
            return Some(TestStep::Confirm);
        }

        devices.motion.tick();
        devices.show_motion();
        None
    }

    fn confirm<R, D, S, St>(devices: &mut Devices<R, D, S, St>, buttons: Buttons) -> Option<TestStep>
    where
        R: RelayDriver,
        D: Display,
        S: Steering,
        St: Storage,
    {
        if matches!(buttons, Buttons::A | Buttons::B) {
            devices.memory.arm();
        } else if buttons == Buttons::None && devices.memory.fire() {
            return Some(TestStep::Finish);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::display::OFF;
    use crate::system::mock::{devices, Fault, FaultyStorage, MemoryStorage, SharedButtons, TestDevices};
    use nanorand::{Rng, WyRand};

    /// Holds `buttons` for `ticks` ticks
    fn hold<St: Storage>(
        test: &mut TestCalibration,
        devices: &mut TestDevices<St>,
        buttons: &SharedButtons,
        pressed: Buttons,
        ticks: usize,
    ) {
        buttons.press(pressed);
        for _ in 0..ticks {
            test.tick(devices);
        }
    }

    /// Single press, confirm with both, release
    fn pass_step<St: Storage>(
        test: &mut TestCalibration,
        devices: &mut TestDevices<St>,
        buttons: &SharedButtons,
        press: Buttons,
    ) {
        hold(test, devices, buttons, press, 2);
        hold(test, devices, buttons, Buttons::Both, 2);
        hold(test, devices, buttons, Buttons::None, 2);
    }

    #[test]
    fn boot_press_held_does_not_skip_steps() {
        let buttons = SharedButtons::holding(Buttons::Both);
        let mut devices = devices(buttons.clone(), MemoryStorage::blank(0), 3600);
        let mut test = TestCalibration::new();

        hold(&mut test, &mut devices, &buttons, Buttons::Both, 50);
        assert_eq!(test.step(), TestStep::LedTest);
        assert_eq!(devices.display.cell(1), BLUE);
    }

    #[test]
    fn led_test_paints_rainbow_while_armed() {
        let buttons = SharedButtons::holding(Buttons::None);
        let mut devices = devices(buttons.clone(), MemoryStorage::blank(0), 3600);
        let mut test = TestCalibration::new();

        hold(&mut test, &mut devices, &buttons, Buttons::None, 3);
        assert_eq!(devices.display.cell(5), OFF);

        hold(&mut test, &mut devices, &buttons, Buttons::A, 1);
        hold(&mut test, &mut devices, &buttons, Buttons::None, LED_COUNT);
        assert!(devices.display.frame().iter().all(|&cell| cell != OFF));

        hold(&mut test, &mut devices, &buttons, Buttons::Both, 1);
        assert_eq!(test.step(), TestStep::SwitchTest);
        assert_eq!(devices.display.cell(1), GREEN);
        assert_eq!(devices.display.cell(4), OFF);
    }

    #[test]
    fn held_both_does_not_pass_two_steps() {
        let buttons = SharedButtons::holding(Buttons::None);
        let mut devices = devices(buttons.clone(), MemoryStorage::blank(0), 3600);
        let mut test = TestCalibration::new();
        hold(&mut test, &mut devices, &buttons, Buttons::None, 1);

        hold(&mut test, &mut devices, &buttons, Buttons::A, 2);
        hold(&mut test, &mut devices, &buttons, Buttons::Both, 20);
        assert_eq!(test.step(), TestStep::SwitchTest);

        // Both falling back to A is the same gesture and must not arm
        hold(&mut test, &mut devices, &buttons, Buttons::A, 2);
        hold(&mut test, &mut devices, &buttons, Buttons::Both, 2);
        assert_eq!(test.step(), TestStep::SwitchTest);
    }

    #[test]
    fn bouncy_release_confirms_one_step_only() {
        let buttons = SharedButtons::holding(Buttons::None);
        let mut devices = devices(buttons.clone(), MemoryStorage::blank(0), 3600);
        let mut test = TestCalibration::new();
        hold(&mut test, &mut devices, &buttons, Buttons::None, 1);

        hold(&mut test, &mut devices, &buttons, Buttons::A, 2);
        hold(&mut test, &mut devices, &buttons, Buttons::Both, 2);
        assert_eq!(test.step(), TestStep::SwitchTest);

        // contact bounce while letting go of both buttons
        hold(&mut test, &mut devices, &buttons, Buttons::None, 1);
        hold(&mut test, &mut devices, &buttons, Buttons::A, 1);
        hold(&mut test, &mut devices, &buttons, Buttons::Both, 1);
        assert_eq!(test.step(), TestStep::SwitchTest);

        hold(&mut test, &mut devices, &buttons, Buttons::None, 2);
        pass_step(&mut test, &mut devices, &buttons, Buttons::B);
        assert_eq!(test.step(), TestStep::RelayTest);
    }

    #[test]
    fn press_held_into_next_step_has_no_effect() {
        let memory = MemoryStorage::blank(0);
        let buttons = SharedButtons::holding(Buttons::None);
        let mut devices = devices(buttons.clone(), memory.clone(), 3600);
        let mut test = TestCalibration::new();
        hold(&mut test, &mut devices, &buttons, Buttons::None, 1);
        pass_step(&mut test, &mut devices, &buttons, Buttons::A);

        // B then both confirm the switch test, B released first
        hold(&mut test, &mut devices, &buttons, Buttons::B, 2);
        hold(&mut test, &mut devices, &buttons, Buttons::Both, 1);
        assert_eq!(test.step(), TestStep::RelayTest);
        hold(&mut test, &mut devices, &buttons, Buttons::A, 3);
        assert_eq!(devices.motion.relays(), RelayState::REST);
        assert_eq!(devices.display.cell(4), BLUE);

        hold(&mut test, &mut devices, &buttons, Buttons::None, 2);
        hold(&mut test, &mut devices, &buttons, Buttons::A, 2);
        assert_eq!(devices.motion.relays(), RelayState { run: true, clockwise: false });
        hold(&mut test, &mut devices, &buttons, Buttons::Both, 1);
        assert_eq!(test.step(), TestStep::MemoryTest);

        let writes = memory.writes();
        hold(&mut test, &mut devices, &buttons, Buttons::A, 5);
        assert_eq!(test.memory_passed(), None);
        assert_eq!(memory.writes(), writes);

        hold(&mut test, &mut devices, &buttons, Buttons::None, 2);
        hold(&mut test, &mut devices, &buttons, Buttons::A, 1);
        assert_eq!(test.memory_passed(), Some(true));
        hold(&mut test, &mut devices, &buttons, Buttons::Both, 1);
        assert_eq!(test.step(), TestStep::DriveToZero);

        hold(&mut test, &mut devices, &buttons, Buttons::A, 5);
        assert_eq!(devices.motion.relays(), RelayState::REST);

        hold(&mut test, &mut devices, &buttons, Buttons::None, 2);
        hold(&mut test, &mut devices, &buttons, Buttons::A, 1);
        assert_eq!(devices.motion.relays().drive(), Some(Direction::CounterClockwise));
    }

    #[test]
    fn relay_test_energises_one_relay_at_a_time() {
        let buttons = SharedButtons::holding(Buttons::None);
        let mut devices = devices(buttons.clone(), MemoryStorage::blank(0), 3600);
        let mut test = TestCalibration::new();
        hold(&mut test, &mut devices, &buttons, Buttons::None, 1);
        pass_step(&mut test, &mut devices, &buttons, Buttons::A);
        pass_step(&mut test, &mut devices, &buttons, Buttons::B);
        assert_eq!(test.step(), TestStep::RelayTest);

        hold(&mut test, &mut devices, &buttons, Buttons::A, 1);
        assert_eq!(devices.motion.relays(), RelayState { run: true, clockwise: false });
        hold(&mut test, &mut devices, &buttons, Buttons::B, 1);
        assert_eq!(devices.motion.relays(), RelayState { run: false, clockwise: true });
        hold(&mut test, &mut devices, &buttons, Buttons::None, 1);
        assert_eq!(devices.motion.relays(), RelayState::REST);

        hold(&mut test, &mut devices, &buttons, Buttons::A, 1);
        hold(&mut test, &mut devices, &buttons, Buttons::Both, 1);
        assert_eq!(test.step(), TestStep::MemoryTest);
        assert_eq!(devices.motion.relays(), RelayState::REST);
    }

    #[test]
    fn memory_test_shows_failure_and_allows_retry() {
        let memory = MemoryStorage::blank(0);
        let faulty = FaultyStorage::new(memory, Fault::WriteError(6));
        let buttons = SharedButtons::holding(Buttons::None);
        let mut devices = devices(buttons.clone(), faulty, 3600);
        let mut test = TestCalibration::new();
        hold(&mut test, &mut devices, &buttons, Buttons::None, 1);
        for press in [Buttons::A, Buttons::A, Buttons::A] {
            pass_step(&mut test, &mut devices, &buttons, press);
        }
        assert_eq!(test.step(), TestStep::MemoryTest);

        hold(&mut test, &mut devices, &buttons, Buttons::A, 3);
        assert_eq!(test.memory_passed(), Some(false));
        assert_eq!(devices.display.cell(6), RED);

        hold(&mut test, &mut devices, &buttons, Buttons::None, 1);
        hold(&mut test, &mut devices, &buttons, Buttons::A, 1);
        assert_eq!(devices.display.cell(6), RED);

        hold(&mut test, &mut devices, &buttons, Buttons::Both, 1);
        assert_eq!(test.step(), TestStep::DriveToZero);
    }

    #[test]
    fn drive_to_zero_jogs_only_while_held() {
        let buttons = SharedButtons::holding(Buttons::None);
        let mut devices = devices(buttons.clone(), MemoryStorage::blank(0), 3600);
        let mut test = TestCalibration::new();
        hold(&mut test, &mut devices, &buttons, Buttons::None, 1);
        for press in [Buttons::A, Buttons::A, Buttons::A, Buttons::A] {
            pass_step(&mut test, &mut devices, &buttons, press);
        }
        assert_eq!(test.step(), TestStep::DriveToZero);

        hold(&mut test, &mut devices, &buttons, Buttons::A, 10);
        assert_eq!(devices.motion.relays().drive(), Some(Direction::CounterClockwise));
        assert_eq!(devices.display.cell(7), RED);

        hold(&mut test, &mut devices, &buttons, Buttons::Both, 1);
        assert_eq!(devices.motion.relays(), RelayState::REST);
        assert_eq!(test.step(), TestStep::TimedRun);
    }

    #[test]
    fn timed_run_commits_measured_run_time() {
        let memory = MemoryStorage::blank(0);
        let buttons = SharedButtons::holding(Buttons::None);
        let mut devices = devices(buttons.clone(), memory, 3600);
        let mut test = TestCalibration::new();
        hold(&mut test, &mut devices, &buttons, Buttons::None, 1);
        for _ in 0..5 {
            pass_step(&mut test, &mut devices, &buttons, Buttons::A);
        }
        assert_eq!(test.step(), TestStep::TimedRun);

        // both without a capture does nothing
        hold(&mut test, &mut devices, &buttons, Buttons::Both, 2);
        hold(&mut test, &mut devices, &buttons, Buttons::None, 2);
        assert_eq!(test.step(), TestStep::TimedRun);

        hold(&mut test, &mut devices, &buttons, Buttons::A, 1);
        assert!(devices.motion.is_calibrating());
        hold(&mut test, &mut devices, &buttons, Buttons::None, 500);
        assert!(devices.motion.is_moving());

        hold(&mut test, &mut devices, &buttons, Buttons::B, 1);
        let captured = test.captured();
        assert!((499..=502).contains(&captured), "captured {}", captured);
        assert!(!devices.motion.is_calibrating());

        hold(&mut test, &mut devices, &buttons, Buttons::Both, 1);
        assert_eq!(test.step(), TestStep::Confirm);
        assert_eq!(devices.motion.run_time(), captured);
        assert_eq!(devices.motion.bearing(), 360);
        assert_eq!(devices.store.read_run_time(), captured);
        assert_eq!(devices.store.read_bearing(), 360);
        assert_eq!(devices.steering.target(), 360);
        assert_eq!(devices.display.cell(7), GREEN);

        hold(&mut test, &mut devices, &buttons, Buttons::None, 2);
        assert_eq!(test.step(), TestStep::Confirm);
        hold(&mut test, &mut devices, &buttons, Buttons::B, 1);
        hold(&mut test, &mut devices, &buttons, Buttons::None, 1);
        assert_eq!(test.step(), TestStep::Finish);
        assert!(test.tick(&mut devices));
    }

    #[test]
    fn random_buttons_step_forward_one_at_a_time() {
        let mut rng = WyRand::new_seed(0x5EED_1234);
        let sequence = [Buttons::None, Buttons::A, Buttons::B, Buttons::Both];

        for _ in 0..20 {
            let buttons = SharedButtons::holding(Buttons::Both);
            let mut devices = devices(buttons.clone(), MemoryStorage::blank(0), 360);
            let mut test = TestCalibration::new();
            let mut previous = test.step().index();

            for _ in 0..3000 {
                let pick = sequence[rng.generate_range(0_usize..sequence.len())];
                let ticks = rng.generate_range(1_usize..40);
                // one in five holds bounces between the press and release
                let bouncing = rng.generate_range(0_u8..5) == 0;
                for tick in 0..ticks {
                    let sample = if bouncing && tick % 2 == 1 { Buttons::None } else { pick };
                    buttons.press(sample);
                    let done = test.tick(&mut devices);
                    let index = test.step().index();
                    assert!(index >= previous, "step went from {} to {}", previous, index);
                    assert!(index - previous <= 1, "step skipped from {} to {}", previous, index);
                    assert!(index <= TestStep::Finish.index());
                    if done {
                        assert_eq!(test.step(), TestStep::Finish);
                    }
                    previous = index;
                }
            }
        }
    }
}
