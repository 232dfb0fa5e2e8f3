//! Bearing Display
//!
//! The bearing is shown on a ring of [`LED_COUNT`] RGB cells. Each angle
//! lights the two cells closest to it, weighted linearly by distance, so the
//! indicator glides smoothly between cells:
//! - motor idle: current bearing in green
//! - motor running: current bearing in red, target bearing in blue
//!
//! The test, synchronisation and brightness modes paint individual cells
//! directly with [`Display::set_cell`].

use smart_leds::RGB8;

use crate::log_error;
use crate::logging::debug_fmt;
use crate::system::config::LED_COUNT;

/// RGB colour of one cell
pub type Color = RGB8;

/// Cell switched off
pub const OFF: Color = RGB8 { r: 0, g: 0, b: 0 };
/// Running / failed
pub const RED: Color = RGB8 { r: 255, g: 0, b: 0 };
/// Passed / idle bearing
pub const GREEN: Color = RGB8 { r: 0, g: 255, b: 0 };
/// Pending / target bearing
pub const BLUE: Color = RGB8 { r: 0, g: 0, b: 255 };
/// Brightness reference
pub const WHITE: Color = RGB8 { r: 255, g: 255, b: 255 };

/// Angular width of one cell in degrees
const CELL_DEGREES: i32 = 360 / LED_COUNT as i32;

/// Colour wheel: 0..=255 walks red, green, blue and back to red
pub fn wheel(position: u8) -> Color {
    let position = 255 - position;
    if position < 85 {
        RGB8::new(255 - position * 3, 0, position * 3)
    } else if position < 170 {
        let position = position - 85;
        RGB8::new(0, position * 3, 255 - position * 3)
    } else {
        let position = position - 170;
        RGB8::new(position * 3, 255 - position * 3, 0)
    }
}

/// Intensity of `cell` for an indicator at `angle`
///
/// Full brightness when the angle sits on the cell, fading linearly to zero
/// one cell width away. Cell index `LED_COUNT` stands for 360° and is folded
/// onto cell 0 by the caller.
fn intensity(cell: usize, angle: u16) -> u8 {
    let distance = (i32::from(angle) - cell as i32 * CELL_DEGREES).abs();
    if distance >= CELL_DEGREES {
        0
    } else {
        (255 * (CELL_DEGREES - distance) / CELL_DEGREES) as u8
    }
}

/// Bearing indicator as seen by the operating mode controller
pub trait Display {
    /// Sets the bearing the rotor is at
    fn set_current(&mut self, angle: u16);
    /// Sets the bearing the rotor is heading for
    fn set_next(&mut self, angle: u16);
    /// Selects the running (two arcs) or idle (one arc) presentation
    fn set_moving(&mut self, moving: bool);
    /// Draws the bearing presentation and pushes it to the ring
    fn render(&mut self);
    /// Switches every cell off
    fn clear(&mut self);
    /// Sets the global brightness (0 = off, 255 = maximum) and refreshes
    fn set_brightness(&mut self, brightness: u8);
    /// Paints one cell and refreshes
    fn set_cell(&mut self, index: usize, color: Color);
}

/// Destination for a rendered frame (the LED driver)
pub trait FrameSink {
    /// Error raised by the LED driver
    type Error: core::fmt::Debug;

    /// Pushes a frame at the given brightness
    fn show(&mut self, frame: &[Color; LED_COUNT], brightness: u8) -> Result<(), Self::Error>;
}

/// LED ring bearing display
pub struct LedRing<S> {
    sink: S,
    frame: [Color; LED_COUNT],
    current: u16,
    next: u16,
    moving: bool,
    brightness: u8,
}

impl<S: FrameSink> LedRing<S> {
    /// Creates a dark ring
    pub fn new(sink: S, brightness: u8) -> Self {
        Self {
            sink,
            frame: [OFF; LED_COUNT],
            current: 0,
            next: 0,
            moving: false,
            brightness,
        }
    }

    /// Adds an indicator for `angle` to one colour channel of the frame
    fn draw_arc(&mut self, angle: u16, channel: fn(&mut Color) -> &mut u8) {
        for cell in 0..=LED_COUNT {
            let level = intensity(cell, angle);
            let slot = channel(&mut self.frame[cell % LED_COUNT]);
            *slot = slot.saturating_add(level);
        }
    }

    /// Pushes the frame to the LED driver
    fn show(&mut self) {
        if let Err(e) = self.sink.show(&self.frame, self.brightness) {
            log_error!("LED ring update failed: {:?}", debug_fmt(&e));
        }
    }

    /// Colour of one cell in the current frame
    pub fn cell(&self, index: usize) -> Color {
        self.frame[index % LED_COUNT]
    }

    /// Current frame
    pub fn frame(&self) -> &[Color; LED_COUNT] {
        &self.frame
    }

    /// Global brightness
    pub fn brightness(&self) -> u8 {
        self.brightness
    }

    /// Whether the running presentation is selected
    pub fn is_moving(&self) -> bool {
        self.moving
    }

    /// Bearing shown as current
    pub fn current(&self) -> u16 {
        self.current
    }

    /// Bearing shown as target
    pub fn next(&self) -> u16 {
        self.next
    }

    /// LED driver
    pub fn sink(&self) -> &S {
        &self.sink
    }
}

impl<S: FrameSink> Display for LedRing<S> {
    fn set_current(&mut self, angle: u16) {
        self.current = angle;
    }

    fn set_next(&mut self, angle: u16) {
        self.next = angle;
    }

    fn set_moving(&mut self, moving: bool) {
        self.moving = moving;
    }

    fn render(&mut self) {
        self.frame = [OFF; LED_COUNT];
        if self.moving {
            self.draw_arc(self.current, |c| &mut c.r);
            self.draw_arc(self.next, |c| &mut c.b);
        } else {
            self.draw_arc(self.current, |c| &mut c.g);
        }
        self.show();
    }

    fn clear(&mut self) {
        self.frame = [OFF; LED_COUNT];
        self.show();
    }

    fn set_brightness(&mut self, brightness: u8) {
        self.brightness = brightness;
        self.show();
    }

    fn set_cell(&mut self, index: usize, color: Color) {
        if let Some(cell) = self.frame.get_mut(index) {
            *cell = color;
        }
        self.show();
    }
}
