//! Lightning effect
//!
//! A double flash at the start of every period: flash, dark gap, flash,
//! then the station's own color until the next period. Stations further
//! along the set flash one tick later so a group looks like a traveling
//! strike rather than a single blink.

use super::{Effect, Position};
use crate::color::{Rgb, WHITE};

/// Ticks of the (flash, gap, flash) sequence
const FLASH_PATTERN: [bool; 3] = [true, false, true];

#[derive(Debug, Clone)]
pub struct LightningEffect {
    /// Flash color; white when unset
    flash: Option<Rgb>,
    /// Color between flashes; the station's own color when unset
    idle: Option<Rgb>,
}

impl LightningEffect {
    pub const fn new(flash: Option<Rgb>, idle: Option<Rgb>) -> Self {
        Self { flash, idle }
    }
}

impl Effect for LightningEffect {
    const PERIODIC: bool = true;

    #[allow(clippy::cast_possible_truncation)]
    fn sample(&self, phase: u32, span: u32, position: Position, base: Rgb) -> Rgb {
        let span = u64::from(span.max(1));
        let offset = position.index as u64 % span;
        let local = (u64::from(phase) % span + span - offset) % span;
        let flashing = FLASH_PATTERN
            .get(local as usize)
            .copied()
            .unwrap_or(false);
        if flashing {
            self.flash.unwrap_or(WHITE)
        } else {
            self.idle.unwrap_or(base)
        }
    }
}
