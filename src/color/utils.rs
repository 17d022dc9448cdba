use crate::color::Rgb;
use crate::math8::{blend8, scale8};

/// Blend two RGB colors
///
/// # Arguments
/// * `a` - First color
/// * `b` - Second color
/// * `amount_of_b` - Blend factor (0 = all a, 255 = all b)
#[inline]
pub fn blend_colors(a: Rgb, b: Rgb, amount_of_b: u8) -> Rgb {
    Rgb {
        r: blend8(a.r, b.r, amount_of_b),
        g: blend8(a.g, b.g, amount_of_b),
        b: blend8(a.b, b.b, amount_of_b),
    }
}

/// Scale every channel of a color by `level` (0-255)
#[inline]
pub fn scale_color(color: Rgb, level: u8) -> Rgb {
    Rgb {
        r: scale8(color.r, level),
        g: scale8(color.g, level),
        b: scale8(color.b, level),
    }
}

/// Create an RGB color from a u32 value (0xRRGGBB format)
pub const fn rgb_from_u32(color: u32) -> Rgb {
    Rgb {
        r: ((color >> 16) & 0xFF) as u8,
        g: ((color >> 8) & 0xFF) as u8,
        b: (color & 0xFF) as u8,
    }
}

/// Checked conversion from 0xRRGGBB, rejecting values wider than 24 bits
pub const fn parse_rgb(color: u32) -> Option<Rgb> {
    if color > 0x00FF_FFFF {
        return None;
    }
    Some(rgb_from_u32(color))
}
