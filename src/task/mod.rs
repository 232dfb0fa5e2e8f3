//! Firmware tasks
pub mod control_loop;
pub mod flash_storage;
pub mod led_ring;
pub mod resources;
