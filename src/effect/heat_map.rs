//! Heat map effect
//!
//! Shows a reading (temperature, wind speed, ...) as a color on a
//! blue, green, yellow, red ramp. The value is fixed for the effect's
//! lifetime; a fresh reading means a fresh trigger.

use super::{Effect, Position};
use crate::color::Rgb;

/// Map a reading onto the blue → green → yellow → red ramp
pub const fn heat_color(value: u8) -> Rgb {
    // Four segments of 64 steps, each channel moving 4 levels per step
    match value {
        0..=63 => Rgb {
            r: 0,
            g: value * 4,
            b: 255,
        },
        64..=127 => Rgb {
            r: 0,
            g: 255,
            b: 255 - (value - 64) * 4,
        },
        128..=191 => Rgb {
            r: (value - 128) * 4,
            g: 255,
            b: 0,
        },
        _ => Rgb {
            r: 255,
            g: 255 - (value - 192) * 4,
            b: 0,
        },
    }
}

#[derive(Debug, Clone)]
pub struct HeatMapEffect {
    color: Rgb,
}

impl HeatMapEffect {
    pub const fn new(value: u8) -> Self {
        Self {
            color: heat_color(value),
        }
    }
}

impl Effect for HeatMapEffect {
    fn sample(&self, _phase: u32, _span: u32, _position: Position, _base: Rgb) -> Rgb {
        self.color
    }
}
