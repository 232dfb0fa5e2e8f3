//! Flash storage task for the persistent settings
//!
//! The control core expects a small byte-addressed store that completes
//! writes immediately. Flash cannot do that, so the settings cells are kept
//! in a RAM shadow:
//! - [`load`] fills the shadow from flash once at boot
//! - [`FlashCells`] reads and writes the shadow and marks it dirty
//! - the [`flash_storage`] task writes the shadow back with
//!   `sequential-storage`, which takes care of wear levelling
//!
//! The data is kept in the last two sectors of the 2 MB boot flash.

use core::cell::RefCell;

use defmt::*;
use embassy_rp::flash::{Async, Flash, ERASE_SIZE};
use embassy_rp::peripherals::FLASH;
use embassy_sync::blocking_mutex::{raw::CriticalSectionRawMutex, Mutex};
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Timer};
use rotor_controller::system::storage::{Storage, STORAGE_CELLS};
use sequential_storage::{
    cache::NoCache,
    map::{fetch_item, store_item, Key, SerializationError, Value},
};

/// Size of the boot flash
pub const FLASH_SIZE: usize = 2048 * 1024;

/// Size of one flash sector (4KB on RP2350)
const FLASH_SECTOR_SIZE: usize = ERASE_SIZE;

/// Number of sectors to use for storage (2 sectors for wear leveling)
const STORAGE_SECTOR_COUNT: usize = 2;

/// Total storage size
const STORAGE_SIZE: usize = FLASH_SECTOR_SIZE * STORAGE_SECTOR_COUNT;

/// Flash storage offset from the end of flash (last 8KB = 2 sectors)
const STORAGE_OFFSET: u32 = (FLASH_SIZE - STORAGE_SIZE) as u32;

/// Time a write burst is given to settle before flash is touched
const SETTLE_DELAY: Duration = Duration::from_millis(500);
/// Wait before a failed flash write is attempted again
const RETRY_DELAY: Duration = Duration::from_secs(5);

/// Boot flash driver type
pub type BootFlash = Flash<'static, FLASH, Async, FLASH_SIZE>;

/// RAM shadow of the settings cells, erased flash reads as 0xFF
static SHADOW: Mutex<CriticalSectionRawMutex, RefCell<SettingsImage>> =
    Mutex::new(RefCell::new(SettingsImage([0xFF; STORAGE_CELLS])));

/// Raised whenever the shadow changes
static DIRTY: Signal<CriticalSectionRawMutex, ()> = Signal::new();

/// All settings cells as one flash item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Format)]
struct SettingsImage([u8; STORAGE_CELLS]);

/// Storage keys for sequential-storage
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
enum StorageKey {
    Settings = 0,
}

impl Key for StorageKey {
    fn serialize_into(&self, buffer: &mut [u8]) -> Result<usize, SerializationError> {
        if buffer.is_empty() {
            return Err(SerializationError::BufferTooSmall);
        }
        buffer[0] = *self as u8;
        Ok(1)
    }

    fn deserialize_from(buffer: &[u8]) -> Result<(Self, usize), SerializationError>
    where
        Self: Sized,
    {
        match buffer.first() {
            None => Err(SerializationError::BufferTooSmall),
            Some(0) => Ok((StorageKey::Settings, 1)),
            Some(_) => Err(SerializationError::InvalidFormat),
        }
    }
}

impl Value<'_> for SettingsImage {
    fn serialize_into(&self, buffer: &mut [u8]) -> Result<usize, SerializationError> {
        if buffer.len() < STORAGE_CELLS {
            return Err(SerializationError::BufferTooSmall);
        }
        buffer[..STORAGE_CELLS].copy_from_slice(&self.0);
        Ok(STORAGE_CELLS)
    }

    fn deserialize_from(buffer: &[u8]) -> Result<Self, SerializationError>
    where
        Self: Sized,
    {
        let cells = buffer
            .get(..STORAGE_CELLS)
            .ok_or(SerializationError::BufferTooSmall)?;
        let mut image = [0; STORAGE_CELLS];
        image.copy_from_slice(cells);
        Ok(SettingsImage(image))
    }
}

/// Settings storage cell access outside the shadow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Format)]
pub struct OutOfRange(pub usize);

/// Storage backend of the control core, backed by the RAM shadow
pub struct FlashCells;

impl Storage for FlashCells {
    type Error = OutOfRange;

    fn read(&mut self, address: usize) -> Result<u8, Self::Error> {
        SHADOW.lock(|shadow| shadow.borrow().0.get(address).copied().ok_or(OutOfRange(address)))
    }

    fn write(&mut self, address: usize, value: u8) -> Result<(), Self::Error> {
        SHADOW.lock(|shadow| {
            let mut shadow = shadow.borrow_mut();
            let cell = shadow.0.get_mut(address).ok_or(OutOfRange(address))?;
            *cell = value;
            Ok(())
        })?;
        DIRTY.signal(());
        Ok(())
    }
}

/// Flash range reserved for the settings
fn flash_range() -> core::ops::Range<u32> {
    STORAGE_OFFSET..(STORAGE_OFFSET + STORAGE_SIZE as u32)
}

/// Fills the shadow from flash
///
/// Must run before the control loop starts. Without a stored image the
/// shadow stays erased and the control core seeds its defaults.
pub async fn load(flash: &mut BootFlash) {
    let mut cache = NoCache::new();
    let mut data_buffer: [u8; 32] = [0; 32];

    match fetch_item::<StorageKey, SettingsImage, _>(
        flash,
        flash_range(),
        &mut cache,
        &mut data_buffer,
        &StorageKey::Settings,
    )
    .await
    {
        Ok(Some(image)) => {
            info!("Settings loaded from flash: {}", image);
            SHADOW.lock(|shadow| *shadow.borrow_mut() = image);
        }
        Ok(None) => {
            info!("No settings found in flash");
        }
        Err(e) => {
            error!("Failed to load settings: {}", Debug2Format(&e));
        }
    }
}

/// Flash storage task
///
/// Writes the shadow to flash after it changed. Writes arriving within the
/// settle delay are merged into one flash write.
#[embassy_executor::task]
pub async fn flash_storage(mut flash: BootFlash) {
    info!("Flash storage task started");

    let mut cache = NoCache::new();
    let mut data_buffer: [u8; 32] = [0; 32];
    let mut stored = SHADOW.lock(|shadow| *shadow.borrow());

    loop {
        DIRTY.wait().await;
        Timer::after(SETTLE_DELAY).await;
        DIRTY.reset();

        let image = SHADOW.lock(|shadow| *shadow.borrow());
        if image == stored {
            continue;
        }

        debug!("Saving settings to flash: {}", image);
        match store_item(
            &mut flash,
            flash_range(),
            &mut cache,
            &mut data_buffer,
            &StorageKey::Settings,
            &image,
        )
        .await
        {
            Ok(_) => {
                stored = image;
                info!("Settings saved");
            }
            Err(e) => {
                error!("Failed to save settings: {}", Debug2Format(&e));
                Timer::after(RETRY_DELAY).await;
                DIRTY.signal(());
            }
        }
    }
}
