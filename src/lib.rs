//! Antenna rotor controller core
//!
//! Hardware-agnostic control logic for a relay-driven antenna rotor:
//! open-loop bearing tracking, self-calibration of the full-rotation run
//! time, and the boot-selected operating modes (normal steering,
//! synchronisation, LED brightness setting, test and calibration).
//!
//! The firmware binary wires these components to RP2350 peripherals; the
//! library itself only talks to hardware through the small capability
//! traits in [`system::relay`], [`system::steering`], [`system::display`]
//! and [`system::storage`], so the whole control path runs on the host.

#![cfg_attr(not(test), no_std)]

/// Logging macros shared by library and firmware
pub mod logging;
/// Core system components for rotor operation
pub mod system;
