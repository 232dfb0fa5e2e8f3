//! Host test doubles for the hardware capability traits

use core::cell::{Cell, RefCell};
use core::convert::Infallible;
use std::rc::Rc;
use std::vec::Vec;

use crate::system::buttons::{Buttons, FunctionMemory};
use crate::system::config::{RotorConfig, LED_COUNT};
use crate::system::controller::Devices;
use crate::system::display::{Color, FrameSink, LedRing, OFF};
use crate::system::motion::MotionController;
use crate::system::relay::{RelayDriver, RelayState};
use crate::system::steering::{ButtonInput, SpeedRampSteering};
use crate::system::storage::{PersistentStore, Storage, STORAGE_CELLS};

/// Mode devices built from the doubles below
pub type TestDevices<St = MemoryStorage> =
    Devices<RecordingRelays, LedRing<RecordingSink>, SpeedRampSteering<SharedButtons>, St>;

/// Devices at the stored bearing with the given model run time
pub fn devices<St: Storage>(buttons: SharedButtons, storage: St, run_time: u16) -> TestDevices<St> {
    let config = RotorConfig::default();
    let mut store = PersistentStore::new(storage, config);
    let bearing = store.read_bearing();
    Devices {
        motion: MotionController::new(RecordingRelays::default(), bearing, run_time),
        display: LedRing::new(RecordingSink::default(), config.default_brightness),
        steering: SpeedRampSteering::new(buttons, bearing),
        store,
        memory: FunctionMemory::new(),
        config,
        brightness: config.default_brightness,
    }
}

/// Relay output stage that records every write
#[derive(Debug, Default)]
pub struct RecordingRelays {
    history: Vec<RelayState>,
}

impl RecordingRelays {
    /// Last applied pattern, rest if never written
    pub fn current(&self) -> RelayState {
        self.history.last().copied().unwrap_or(RelayState::REST)
    }

    /// Number of writes so far
    pub fn writes(&self) -> usize {
        self.history.len()
    }
}

impl RelayDriver for RecordingRelays {
    type Error = Infallible;

    fn set_relays(&mut self, state: RelayState) -> Result<(), Self::Error> {
        self.history.push(state);
        Ok(())
    }
}

/// LED driver that keeps the last frame
#[derive(Debug)]
pub struct RecordingSink {
    frames: usize,
    last_frame: [Color; LED_COUNT],
    last_brightness: u8,
}

impl Default for RecordingSink {
    fn default() -> Self {
        Self {
            frames: 0,
            last_frame: [OFF; LED_COUNT],
            last_brightness: 0,
        }
    }
}

impl RecordingSink {
    /// Frames pushed so far
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Last frame pushed
    pub fn last_frame(&self) -> [Color; LED_COUNT] {
        self.last_frame
    }

    /// Brightness of the last frame
    pub fn last_brightness(&self) -> u8 {
        self.last_brightness
    }
}

impl FrameSink for RecordingSink {
    type Error = Infallible;

    fn show(&mut self, frame: &[Color; LED_COUNT], brightness: u8) -> Result<(), Self::Error> {
        self.frames += 1;
        self.last_frame = *frame;
        self.last_brightness = brightness;
        Ok(())
    }
}

/// Button levels shared between a test and the code under test
#[derive(Debug, Clone, Default)]
pub struct SharedButtons(Rc<Cell<Buttons>>);

impl SharedButtons {
    /// Starts with `buttons` held
    pub fn holding(buttons: Buttons) -> Self {
        Self(Rc::new(Cell::new(buttons)))
    }

    /// Changes the held buttons
    pub fn press(&self, buttons: Buttons) {
        self.0.set(buttons);
    }
}

impl ButtonInput for SharedButtons {
    fn read(&mut self) -> Buttons {
        self.0.get()
    }
}

/// Storage access error of the doubles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryError {
    /// Address outside the cell array
    OutOfRange(usize),
    /// Injected fault
    Injected(usize),
}

#[derive(Debug)]
struct Cells {
    cells: [u8; STORAGE_CELLS],
    writes: usize,
}

/// In-memory cell store; clones share the same cells
#[derive(Debug, Clone)]
pub struct MemoryStorage(Rc<RefCell<Cells>>);

impl MemoryStorage {
    /// Every cell holds `fill`
    pub fn blank(fill: u8) -> Self {
        Self(Rc::new(RefCell::new(Cells {
            cells: [fill; STORAGE_CELLS],
            writes: 0,
        })))
    }

    /// Reads a cell bypassing the write counter
    pub fn cell(&self, address: usize) -> u8 {
        self.0.borrow().cells[address]
    }

    /// Sets a cell bypassing the write counter
    pub fn set_cell(&self, address: usize, value: u8) {
        self.0.borrow_mut().cells[address] = value;
    }

    /// Cell writes through the [`Storage`] interface so far
    pub fn writes(&self) -> usize {
        self.0.borrow().writes
    }
}

impl Storage for MemoryStorage {
    type Error = MemoryError;

    fn read(&mut self, address: usize) -> Result<u8, Self::Error> {
        self.0
            .borrow()
            .cells
            .get(address)
            .copied()
            .ok_or(MemoryError::OutOfRange(address))
    }

    fn write(&mut self, address: usize, value: u8) -> Result<(), Self::Error> {
        let mut inner = self.0.borrow_mut();
        let cell = inner
            .cells
            .get_mut(address)
            .ok_or(MemoryError::OutOfRange(address))?;
        *cell = value;
        inner.writes += 1;
        Ok(())
    }
}

/// Fault injected by [`FaultyStorage`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Writes to this cell report success but change nothing
    DropWrites(usize),
    /// Writes to this cell fail
    WriteError(usize),
    /// Every read fails
    ReadError,
}

/// Memory wrapper that misbehaves in one configured way
#[derive(Debug, Clone)]
pub struct FaultyStorage {
    inner: MemoryStorage,
    fault: Fault,
}

impl FaultyStorage {
    pub fn new(inner: MemoryStorage, fault: Fault) -> Self {
        Self { inner, fault }
    }
}

impl Storage for FaultyStorage {
    type Error = MemoryError;

    fn read(&mut self, address: usize) -> Result<u8, Self::Error> {
        match self.fault {
            Fault::ReadError => Err(MemoryError::Injected(address)),
            _ => self.inner.read(address),
        }
    }

    fn write(&mut self, address: usize, value: u8) -> Result<(), Self::Error> {
        match self.fault {
            Fault::DropWrites(cell) if cell == address => Ok(()),
            Fault::WriteError(cell) if cell == address => Err(MemoryError::Injected(address)),
            _ => self.inner.write(address, value),
        }
    }
}
