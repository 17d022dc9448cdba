mod utils;

use smart_leds::RGB8;

pub use utils::{blend_colors, parse_rgb, rgb_from_u32, scale_color};

pub type Rgb = RGB8;

pub const BLACK: Rgb = Rgb { r: 0, g: 0, b: 0 };
pub const WHITE: Rgb = Rgb {
    r: 255,
    g: 255,
    b: 255,
};
