//! Fade effect for homeport and other smooth transitions
//!
//! Crossfades from a source color to a target color across the effect's
//! duration with an ease-in-out curve.

use super::{Effect, Position};
use crate::{
    color::{BLACK, Rgb, blend_colors},
    math8::{ease_in_out_quad, progress8},
};

#[derive(Debug, Clone)]
pub struct FadeEffect {
    /// Source color; the station's own color when unset
    from: Option<Rgb>,
    /// Target color; black when unset
    to: Option<Rgb>,
}

impl FadeEffect {
    pub const fn new(from: Option<Rgb>, to: Option<Rgb>) -> Self {
        Self { from, to }
    }
}

impl Effect for FadeEffect {
    fn sample(&self, phase: u32, span: u32, _position: Position, base: Rgb) -> Rgb {
        let from = self.from.unwrap_or(base);
        let to = self.to.unwrap_or(BLACK);
        let progress = ease_in_out_quad(progress8(phase, span));
        blend_colors(from, to, progress)
    }
}
