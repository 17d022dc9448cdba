//! Static color fill effect
//!
//! Holds every station of the set at one solid color for the effect's
//! lifetime.

use super::{Effect, Position};
use crate::color::Rgb;

/// Static color effect - one color, no animation
#[derive(Debug, Clone)]
pub struct StaticColorEffect {
    /// Fill color; the station's own color when unset
    color: Option<Rgb>,
}

impl StaticColorEffect {
    pub const fn new(color: Option<Rgb>) -> Self {
        Self { color }
    }
}

impl Effect for StaticColorEffect {
    fn sample(&self, _phase: u32, _span: u32, _position: Position, base: Rgb) -> Rgb {
        self.color.unwrap_or(base)
    }
}
