//! Persistent Settings Storage
//!
//! Three scalar settings survive a power cycle: the calibrated run time, the
//! LED brightness and the last bearing. They live in a small byte-addressed
//! cell store (EEPROM style) with a fixed layout:
//!
//! | Cell | Content                                   |
//! | ---- | ----------------------------------------- |
//! | 0    | initialisation marker, `0x01` when seeded |
//! | 1    | brightness                                |
//! | 2..3 | bearing, big-endian `u16`                 |
//! | 6..7 | run time in ticks, big-endian `u16`       |
//!
//! A missing marker (blank or corrupted storage) reseeds all three settings
//! from [`RotorConfig`] defaults. Cells are only written when their value
//! changes, which keeps wear down on the bearing that is saved after every
//! rotor movement.

use crate::logging::debug_fmt;
use crate::system::config::{RotorConfig, MAX_BEARING};
use crate::{log_error, log_info, log_warn};

/// Number of cells the layout occupies
pub const STORAGE_CELLS: usize = 8;

/// Marker cell address
const MARKER_CELL: usize = 0;
/// Brightness cell address
const BRIGHTNESS_CELL: usize = 1;
/// Bearing high byte address, low byte follows
const BEARING_CELL: usize = 2;
/// Run time high byte address, low byte follows
const RUN_TIME_CELL: usize = 6;

/// Marker value of seeded storage
const INITIALIZED: u8 = 0x01;

/// Self-test pattern for the run time
const RUN_TIME_PATTERN: u16 = 0xFFFF;
/// Self-test pattern for the bearing (must stay within range)
const BEARING_PATTERN: u16 = 0x00FF;
/// Self-test pattern for the brightness
const BRIGHTNESS_PATTERN: u8 = 0xFF;

/// Byte-addressed non-volatile cell store
pub trait Storage {
    /// Error raised by the memory
    type Error: core::fmt::Debug;

    /// Reads one cell
    fn read(&mut self, address: usize) -> Result<u8, Self::Error>;

    /// Writes one cell, completing before returning
    fn write(&mut self, address: usize, value: u8) -> Result<(), Self::Error>;
}

/// Which setting a cell access belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Setting {
    /// Full-rotation run time
    RunTime,
    /// LED brightness
    Brightness,
    /// Last bearing
    Bearing,
}

/// Typed access to the three persisted settings
pub struct PersistentStore<S> {
    storage: S,
    config: RotorConfig,
}

impl<S: Storage> PersistentStore<S> {
    /// Opens the store, seeding defaults if it has never been initialised
    pub fn new(storage: S, config: RotorConfig) -> Self {
        let mut store = Self { storage, config };
        let marker = store.read_cell(MARKER_CELL);
        if marker != Some(INITIALIZED) {
            log_warn!("Settings storage not initialised, seeding defaults");
            store.reseed();
        }
        store
    }

    /// Writes factory defaults and marks the storage as initialised
    pub fn reseed(&mut self) {
        self.write_run_time(self.config.default_run_time);
        self.write_brightness(self.config.default_brightness);
        self.write_bearing(self.config.default_bearing);
        self.write_cell(MARKER_CELL, INITIALIZED);
    }

    /// Reads the full-rotation run time in ticks
    pub fn read_run_time(&mut self) -> u16 {
        self.read_u16(RUN_TIME_CELL)
            .filter(|&ticks| ticks > 0)
            .unwrap_or(self.config.default_run_time)
    }

    /// Stores the full-rotation run time in ticks
    pub fn write_run_time(&mut self, ticks: u16) {
        self.write_u16(RUN_TIME_CELL, ticks);
    }

    /// Reads the LED brightness
    pub fn read_brightness(&mut self) -> u8 {
        self.read_cell(BRIGHTNESS_CELL)
            .unwrap_or(self.config.default_brightness)
    }

    /// Stores the LED brightness
    pub fn write_brightness(&mut self, brightness: u8) {
        self.write_cell(BRIGHTNESS_CELL, brightness);
    }

    /// Reads the last bearing, clamped to 360
    pub fn read_bearing(&mut self) -> u16 {
        self.read_u16(BEARING_CELL)
            .unwrap_or(self.config.default_bearing)
            .min(MAX_BEARING)
    }

    /// Stores the bearing, clamped to 360
    pub fn write_bearing(&mut self, bearing: u16) {
        self.write_u16(BEARING_CELL, bearing.min(MAX_BEARING));
    }

    /// Exercises every setting: writes a known pattern, verifies it, restores
    /// the original value and verifies that too
    ///
    /// Returns true only if all three settings passed.
    pub fn self_test(&mut self) -> bool {
        let run_time = self.test_u16(Setting::RunTime, RUN_TIME_CELL, RUN_TIME_PATTERN);
        let bearing = self.test_u16(Setting::Bearing, BEARING_CELL, BEARING_PATTERN);
        let brightness = self.test_brightness();

        let passed = run_time && bearing && brightness;
        log_info!(
            "Storage self-test: run time {}, bearing {}, brightness {}",
            run_time,
            bearing,
            brightness
        );
        passed
    }

    /// Pattern test of a two-cell setting
    fn test_u16(&mut self, setting: Setting, address: usize, pattern: u16) -> bool {
        let Some(original) = self.read_u16(address) else {
            log_error!("Self-test could not read {:?}", setting);
            return false;
        };

        let mut passed = true;
        for value in [pattern, original] {
            self.write_u16(address, value);
            if self.read_u16(address) != Some(value) {
                log_error!("Self-test mismatch on {:?}, wrote {}", setting, value);
                passed = false;
            }
        }
        passed
    }

    /// Pattern test of the brightness cell
    fn test_brightness(&mut self) -> bool {
        let Some(original) = self.read_cell(BRIGHTNESS_CELL) else {
            log_error!("Self-test could not read {:?}", Setting::Brightness);
            return false;
        };

        let mut passed = true;
        for value in [BRIGHTNESS_PATTERN, original] {
            self.write_cell(BRIGHTNESS_CELL, value);
            if self.read_cell(BRIGHTNESS_CELL) != Some(value) {
                log_error!("Self-test mismatch on {:?}, wrote {}", Setting::Brightness, value);
                passed = false;
            }
        }
        passed
    }

    /// Reads a big-endian `u16` from two consecutive cells
    fn read_u16(&mut self, address: usize) -> Option<u16> {
        let high = self.read_cell(address)?;
        let low = self.read_cell(address + 1)?;
        Some(u16::from_be_bytes([high, low]))
    }

    /// Writes a big-endian `u16` to two consecutive cells
    fn write_u16(&mut self, address: usize, value: u16) {
        let [high, low] = value.to_be_bytes();
        self.write_cell(address + 1, low);
        self.write_cell(address, high);
    }

    /// Reads one cell, logging failures
    fn read_cell(&mut self, address: usize) -> Option<u8> {
        match self.storage.read(address) {
            Ok(value) => Some(value),
            Err(e) => {
                log_error!("Storage read of cell {} failed: {:?}", address, debug_fmt(&e));
                None
            }
        }
    }

    /// Writes one cell if its value changes, logging failures
    fn write_cell(&mut self, address: usize, value: u8) {
        if self.read_cell(address) == Some(value) {
            return;
        }
        if let Err(e) = self.storage.write(address, value) {
            log_error!("Storage write of cell {} failed: {:?}", address, debug_fmt(&e));
        }
    }

    /// Underlying cell store
    pub fn storage(&self) -> &S {
        &self.storage
    }
}
