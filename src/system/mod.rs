//! Hardware-agnostic rotor control core
pub mod buttons;
pub mod config;
pub mod controller;
pub mod display;
pub mod intensity;
pub mod motion;
pub mod relay;
pub mod state;
pub mod steering;
pub mod storage;
pub mod synchronize;
pub mod test_calibrate;

#[cfg(test)]
mod mock;
