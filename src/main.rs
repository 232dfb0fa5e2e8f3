//! Rotor controller firmware entry point
//!
//! Restores the settings from flash and spawns the control tasks.

#![no_std]
#![no_main]

use crate::task::{
    control_loop::control_loop,
    flash_storage::{self, flash_storage, BootFlash},
    led_ring::led_ring,
    resources::{AssignedResources, ButtonResources, FlashResources, LedRingResources, RelayResources},
};
use embassy_executor::Spawner;
use embassy_rp::block::ImageDef;
use embassy_rp::config::Config;
use {defmt_rtt as _, panic_probe as _};

/// Firmware image type for bootloader
#[link_section = ".start_block"]
#[used]
pub static IMAGE_DEF: ImageDef = ImageDef::secure_exe();

/// Task implementations
mod task;

/// Firmware entry point
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    let p = embassy_rp::init(Config::default());

    // Split the resources into separate groups for each task
    let r = split_resources!(p);

    // Settings have to be in RAM before the control loop reads them
    let mut flash = BootFlash::new(r.flash.flash, r.flash.dma);
    flash_storage::load(&mut flash).await;

    spawner.spawn(flash_storage(flash)).unwrap();
    spawner.spawn(led_ring(r.led_ring)).unwrap();
    spawner.spawn(control_loop(r.relays, r.buttons)).unwrap();
}
