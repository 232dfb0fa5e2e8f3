//! LED Ring Task
//!
//! Drives the 24 cell WS2812 bearing ring over PIO0. The control loop hands
//! over complete frames through a signal; only the newest frame is drawn,
//! frames produced faster than the ring can be written are skipped.

use defmt::info;
use embassy_rp::pio::Pio;
use embassy_rp::pio_programs::ws2812::{PioWs2812, PioWs2812Program};
use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, signal::Signal};
use rotor_controller::system::config::LED_COUNT;
use rotor_controller::system::display::{Color, FrameSink, OFF};
use smart_leds::brightness;

use crate::task::resources::{Irqs, LedRingResources};

/// Frame as rendered by the display, before brightness scaling
#[derive(Clone, Copy)]
struct Frame {
    cells: [Color; LED_COUNT],
    brightness: u8,
}

/// Newest frame waiting to be written to the ring
static FRAME: Signal<CriticalSectionRawMutex, Frame> = Signal::new();

/// Frame sink of the control loop, forwards frames to the LED ring task
pub struct RingSignal;

impl FrameSink for RingSignal {
    type Error = core::convert::Infallible;

    fn show(&mut self, frame: &[Color; LED_COUNT], brightness: u8) -> Result<(), Self::Error> {
        FRAME.signal(Frame {
            cells: *frame,
            brightness,
        });
        Ok(())
    }
}

/// Writes frames to the WS2812 ring
#[embassy_executor::task]
pub async fn led_ring(r: LedRingResources) {
    let Pio { mut common, sm0, .. } = Pio::new(r.pio, Irqs);
    let program = PioWs2812Program::new(&mut common);
    let mut ws2812: PioWs2812<'_, _, 0, LED_COUNT> = PioWs2812::new(&mut common, sm0, r.dma, r.data_pin, &program);

    info!("LED ring task started");
    ws2812.write(&[OFF; LED_COUNT]).await;

    let mut data = [OFF; LED_COUNT];
    loop {
        let frame = FRAME.wait().await;
        for (cell, color) in data
            .iter_mut()
            .zip(brightness(frame.cells.iter().copied(), frame.brightness))
        {
            *cell = color;
        }
        ws2812.write(&data).await;
    }
}
