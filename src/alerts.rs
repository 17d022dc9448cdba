//! Weather alert effects
//!
//! Maps station flags to the bounded effect that visualizes them. The most
//! severe flag wins: lightning over wind over precipitation.

use crate::{
    color::{Rgb, rgb_from_u32},
    effect::{EffectKind, EffectParams, EffectPriority, EffectRequest},
    station::{StationFlags, StationSet},
};

/// Flash period of the lightning alert, in ticks
pub const LIGHTNING_PERIOD: u32 = 30;

/// Blink period of the wind alert, in ticks
pub const WIND_PERIOD: u32 = 30;

/// Shimmer period of the precipitation alert, in ticks
pub const PRECIPITATION_PERIOD: u32 = 60;

/// Wind alerts blink towards yellow
pub const WIND_ALERT_COLOR: Rgb = rgb_from_u32(0xFF_FF_00);

/// Build the alert effect for a set of stations sharing the same flags.
///
/// Returns `None` when no flag is set.
pub fn effect_for_flags(
    flags: StationFlags,
    stations: StationSet,
    duration: u32,
) -> Option<EffectRequest> {
    let (kind, priority, params) = if flags.lightning {
        (
            EffectKind::Lightning,
            EffectPriority::Critical,
            EffectParams::default().with_period(LIGHTNING_PERIOD),
        )
    } else if flags.wind_alert {
        (
            EffectKind::Blink,
            EffectPriority::High,
            EffectParams::default()
                .with_alt_color(WIND_ALERT_COLOR)
                .with_period(WIND_PERIOD),
        )
    } else if flags.precipitation {
        (
            EffectKind::Pulse,
            EffectPriority::Medium,
            EffectParams::default().with_period(PRECIPITATION_PERIOD),
        )
    } else {
        return None;
    };

    Some(EffectRequest::new(kind, stations, priority.into(), duration).with_params(params))
}

/// Background heat map reading (0 cold to 255 hot) for a set of stations
pub fn heat_map_effect(value: u8, stations: StationSet, duration: u32) -> EffectRequest {
    EffectRequest::new(
        EffectKind::HeatMap,
        stations,
        EffectPriority::Low.into(),
        duration,
    )
    .with_params(EffectParams::default().with_value(value))
}
