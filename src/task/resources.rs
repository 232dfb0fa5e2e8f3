//! Hardware Resource Management
//!
//! Assigns the RP2350 pins and peripherals to the firmware tasks. Every
//! group is owned by exactly one task.
//!
//! # Resource Groups
//! - Relays: run and direction relay driver outputs
//! - Buttons: steering push buttons A and B
//! - LED ring: WS2812 data line driven by PIO0
//! - Flash: settings storage in the last sectors of the boot flash

use assign_resources::assign_resources;
use embassy_rp::bind_interrupts;
use embassy_rp::peripherals::{self, PIO0};
use embassy_rp::pio::InterruptHandler as PioInterruptHandler;

assign_resources! {
    /// Relay driver outputs (active low)
    relays: RelayResources {
        run_pin: PIN_2,
        direction_pin: PIN_3,
    },
    /// Steering buttons (active high, pulled down)
    buttons: ButtonResources {
        button_a: PIN_4,
        button_b: PIN_5,
    },
    /// WS2812 LED ring
    led_ring: LedRingResources {
        pio: PIO0,
        data_pin: PIN_16,
        dma: DMA_CH0,
    },
    /// Boot flash holding the settings
    flash: FlashResources {
        flash: FLASH,
        dma: DMA_CH1,
    },
}

bind_interrupts!(pub struct Irqs {
    PIO0_IRQ_0 => PioInterruptHandler<PIO0>;
});
