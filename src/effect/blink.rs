//! Blink effect for wind alerts and warnings
//!
//! On for the first half of every period, off for the second half.

use super::{Effect, Position};
use crate::color::{BLACK, Rgb};

#[derive(Debug, Clone)]
pub struct BlinkEffect {
    /// "On" color; the station's own color when unset
    on: Option<Rgb>,
    /// "Off" color; black when unset
    off: Option<Rgb>,
}

impl BlinkEffect {
    pub const fn new(on: Option<Rgb>, off: Option<Rgb>) -> Self {
        Self { on, off }
    }
}

impl Effect for BlinkEffect {
    const PERIODIC: bool = true;

    fn sample(&self, phase: u32, span: u32, _position: Position, base: Rgb) -> Rgb {
        // 50% duty cycle, an odd period gives the extra tick to "off"
        if phase.saturating_mul(2) < span {
            self.on.unwrap_or(base)
        } else {
            self.off.unwrap_or(BLACK)
        }
    }
}
