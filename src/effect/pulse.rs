//! Pulse effect for rain and snow
//!
//! Breathes the station color between roughly a third and full intensity
//! along a sine wave.

use super::{Effect, Position};
use crate::{
    color::{Rgb, scale_color},
    math8::{scale8, sine8},
};

/// Lowest intensity of the wave
const MIN_LEVEL: u8 = 80;

#[derive(Debug, Clone)]
pub struct PulseEffect {
    /// Pulsed color; the station's own color when unset
    color: Option<Rgb>,
}

impl PulseEffect {
    pub const fn new(color: Option<Rgb>) -> Self {
        Self { color }
    }
}

impl Effect for PulseEffect {
    const PERIODIC: bool = true;

    fn sample(&self, phase: u32, span: u32, _position: Position, base: Rgb) -> Rgb {
        let wave = sine8(phase, span);
        let level = MIN_LEVEL.saturating_add(scale8(wave, 255 - MIN_LEVEL));
        scale_color(self.color.unwrap_or(base), level)
    }
}
