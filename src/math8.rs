/// Scale an 8-bit value by a factor (0-255 = 0.0-1.0)
///
/// Uses integer math for efficiency on embedded systems.
#[inline]
#[allow(clippy::cast_lossless)]
pub const fn scale8(value: u8, scale: u8) -> u8 {
    ((value as u16 * (1 + scale as u16)) >> 8) as u8
}

/// Blend two 8-bit values
#[inline]
#[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
pub const fn blend8(a: u8, b: u8, amount_of_b: u8) -> u8 {
    let delta = b as i16 - a as i16;

    let mut partial: u32 = (a as u32) << 16; // a * 65536
    partial = partial.wrapping_add(
        (delta as u32)
            .wrapping_mul(amount_of_b as u32)
            .wrapping_mul(257),
    ); // (b - a) * amount_of_b * 257
    partial = partial.wrapping_add(0x8000); // + 32768 for rounding

    (partial >> 16) as u8
}

/// Progress (0-255) of `phase` ticks through a span of `span` ticks
#[allow(clippy::cast_possible_truncation)]
#[inline]
pub const fn progress8(phase: u32, span: u32) -> u8 {
    if span == 0 {
        return 0;
    }
    if phase >= span {
        return 255;
    }

    ((phase as u64 * 255) / span as u64) as u8
}

/// Ease in out quadratic
pub fn ease_in_out_quad(i: u8) -> u8 {
    let j = if i & 0x80 != 0 { 255 - i } else { i };
    let jj = scale8(j, j);
    let jj2 = jj << 1;
    if i & 0x80 == 0 { jj2 } else { 255 - jj2 }
}

/// Sine wave mapped to 0-255, one full cycle per `span` ticks.
///
/// Starts at the midpoint (128) for phase 0.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn sine8(phase: u32, span: u32) -> u8 {
    if span == 0 {
        return 128;
    }
    let angle = (phase % span) as f32 / span as f32 * core::f32::consts::TAU;
    let value = 127.5 + 127.5 * libm::sinf(angle);
    libm::roundf(value).clamp(0.0, 255.0) as u8
}
