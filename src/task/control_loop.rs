//! Control Loop Task
//!
//! Runs the rotor control core at a fixed tick. Owns the relay outputs and
//! the steering buttons; frames go to the LED ring task and settings to the
//! flash storage task.

use core::convert::Infallible;

use defmt::info;
use embassy_rp::gpio::{Input, Level, Output, Pull};
use embassy_time::{Duration, Ticker};
use rotor_controller::system::buttons::{Buttons, Debouncer};
use rotor_controller::system::config::{RotorConfig, TICK_PERIOD_MS};
use rotor_controller::system::controller::RotorController;
use rotor_controller::system::display::LedRing;
use rotor_controller::system::relay::{RelayDriver, RelayState};
use rotor_controller::system::steering::{ButtonInput, SpeedRampSteering};

use crate::task::flash_storage::FlashCells;
use crate::task::led_ring::RingSignal;
use crate::task::resources::{ButtonResources, RelayResources};

/// Relay driver board, inputs are active low
struct GpioRelays {
    run: Output<'static>,
    direction: Output<'static>,
}

impl GpioRelays {
    fn new(r: RelayResources) -> Self {
        Self {
            run: Output::new(r.run_pin, Level::High),
            direction: Output::new(r.direction_pin, Level::High),
        }
    }
}

impl RelayDriver for GpioRelays {
    type Error = Infallible;

    fn set_relays(&mut self, state: RelayState) -> Result<(), Self::Error> {
        // switch direction first so the motor never starts the wrong way
        self.direction.set_level(Level::from(!state.clockwise));
        self.run.set_level(Level::from(!state.run));
        Ok(())
    }
}

/// Push buttons to 3V3, pulled down, debounced over consecutive ticks
struct GpioButtons {
    a: Input<'static>,
    b: Input<'static>,
    debouncer: Debouncer,
}

impl GpioButtons {
    fn new(r: ButtonResources) -> Self {
        Self {
            a: Input::new(r.button_a, Pull::Down),
            b: Input::new(r.button_b, Pull::Down),
            debouncer: Debouncer::new(),
        }
    }
}

impl ButtonInput for GpioButtons {
    fn read(&mut self) -> Buttons {
        let raw = Buttons::from_levels(self.a.is_high(), self.b.is_high());
        self.debouncer.update(raw)
    }
}

/// Rotor control loop
///
/// The settings shadow must have been loaded from flash before this task
/// starts, the controller reads it once on construction.
#[embassy_executor::task]
pub async fn control_loop(relays: RelayResources, buttons: ButtonResources) {
    let config = RotorConfig::default();
    let mut controller = RotorController::new(
        GpioRelays::new(relays),
        LedRing::new(RingSignal, config.default_brightness),
        SpeedRampSteering::new(GpioButtons::new(buttons), config.default_bearing),
        FlashCells,
        config,
    );
    info!("Control loop started in {:?} mode", controller.mode());

    let mut ticker = Ticker::every(Duration::from_millis(TICK_PERIOD_MS));
    loop {
        controller.tick();
        ticker.next().await;
    }
}
