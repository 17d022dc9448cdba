//! Wipe transition
//!
//! Sweeps a color across the stations of the set in LED order. A station
//! switches once the sweep reaches it and holds the color until the effect
//! ends.

use super::{Effect, Position};
use crate::color::Rgb;

#[derive(Debug, Clone)]
pub struct WipeEffect {
    /// Color behind the sweep; the station's own color when unset
    color: Option<Rgb>,
    /// Color ahead of the sweep; the station's own color when unset
    ahead: Option<Rgb>,
}

impl WipeEffect {
    pub const fn new(color: Option<Rgb>, ahead: Option<Rgb>) -> Self {
        Self { color, ahead }
    }
}

impl Effect for WipeEffect {
    fn sample(&self, phase: u32, span: u32, position: Position, base: Rgb) -> Rgb {
        let count = position.count.max(1) as u64;
        // Station `index` is reached at `index * span / count`
        let reached = u64::from(phase) * count >= position.index as u64 * u64::from(span);
        if reached {
            self.color.unwrap_or(base)
        } else {
            self.ahead.unwrap_or(base)
        }
    }
}
