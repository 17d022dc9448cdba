//! Frame post-processing
//!
//! Applied to the composited frame after effect resolution, right before
//! it is handed to the driver.

use crate::color::{Rgb, scale_color};

pub(crate) trait Filter {
    /// Apply the filter to a frame
    fn apply(&self, frame: &mut [Rgb]);
}

/// Global brightness of the map
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrightnessFilter {
    level: u8,
}

impl BrightnessFilter {
    pub const fn new(level: u8) -> Self {
        Self { level }
    }

    pub const fn level(&self) -> u8 {
        self.level
    }

    pub fn set_level(&mut self, level: u8) {
        self.level = level;
    }
}

impl Filter for BrightnessFilter {
    fn apply(&self, frame: &mut [Rgb]) {
        if self.level == u8::MAX {
            return;
        }
        for color in frame {
            *color = scale_color(*color, self.level);
        }
    }
}
