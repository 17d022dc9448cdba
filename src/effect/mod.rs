//! Effect system with compile-time known effect variants
//!
//! All effects are stored in an enum to avoid heap allocations.
//! Each effect implements the `Effect` trait and is a pure function of its
//! phase: effects hold no timers of their own, the engine derives the phase
//! from the frame tick.

mod blink;
mod fade;
mod heat_map;
mod lightning;
mod pulse;
mod static_color;
mod wipe;

pub use blink::BlinkEffect;
pub use fade::FadeEffect;
pub use heat_map::{HeatMapEffect, heat_color};
pub use lightning::LightningEffect;
pub use pulse::PulseEffect;
pub use static_color::StaticColorEffect;
pub use wipe::WipeEffect;

use crate::{color::Rgb, station::StationSet};

const EFFECT_NAME_STATIC: &str = "static";
const EFFECT_NAME_BLINK: &str = "blink";
const EFFECT_NAME_FADE: &str = "fade";
const EFFECT_NAME_WIPE: &str = "wipe";
const EFFECT_NAME_LIGHTNING: &str = "lightning";
const EFFECT_NAME_PULSE: &str = "pulse";
const EFFECT_NAME_HEAT_MAP: &str = "heat_map";

/// Period used by periodic effects when the request leaves it at zero
pub const DEFAULT_PERIOD_TICKS: u32 = 30;

/// Position of a station inside an effect's station set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    /// Rank of the station among the set's members (LED order)
    pub index: usize,
    /// Number of members in the set
    pub count: usize,
}

pub trait Effect {
    /// Periodic effects repeat every `span` ticks; one-shot effects run
    /// through `span` exactly once.
    const PERIODIC: bool = false;

    /// Color contribution for one station at the given phase.
    ///
    /// `phase` is always in `0..=span` and `base` is the station's own color.
    fn sample(&self, phase: u32, span: u32, position: Position, base: Rgb) -> Rgb;
}

/// Known effect kinds that can be requested.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum EffectKind {
    Static,
    Blink,
    Fade,
    Wipe,
    Lightning,
    Pulse,
    HeatMap,
}

impl EffectKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Static => EFFECT_NAME_STATIC,
            Self::Blink => EFFECT_NAME_BLINK,
            Self::Fade => EFFECT_NAME_FADE,
            Self::Wipe => EFFECT_NAME_WIPE,
            Self::Lightning => EFFECT_NAME_LIGHTNING,
            Self::Pulse => EFFECT_NAME_PULSE,
            Self::HeatMap => EFFECT_NAME_HEAT_MAP,
        }
    }

    pub fn parse_from_str(s: &str) -> Option<Self> {
        match s {
            EFFECT_NAME_STATIC => Some(Self::Static),
            EFFECT_NAME_BLINK => Some(Self::Blink),
            EFFECT_NAME_FADE => Some(Self::Fade),
            EFFECT_NAME_WIPE => Some(Self::Wipe),
            EFFECT_NAME_LIGHTNING => Some(Self::Lightning),
            EFFECT_NAME_PULSE => Some(Self::Pulse),
            EFFECT_NAME_HEAT_MAP => Some(Self::HeatMap),
            _ => None,
        }
    }

    pub fn to_slot(self, params: &EffectParams) -> EffectSlot {
        match self {
            Self::Static => EffectSlot::Static(StaticColorEffect::new(params.color)),
            Self::Blink => EffectSlot::Blink(BlinkEffect::new(params.color, params.alt_color)),
            Self::Fade => EffectSlot::Fade(FadeEffect::new(params.alt_color, params.color)),
            Self::Wipe => EffectSlot::Wipe(WipeEffect::new(params.color, params.alt_color)),
            Self::Lightning => {
                EffectSlot::Lightning(LightningEffect::new(params.color, params.alt_color))
            }
            Self::Pulse => EffectSlot::Pulse(PulseEffect::new(params.color)),
            Self::HeatMap => EffectSlot::HeatMap(HeatMapEffect::new(params.value)),
        }
    }
}

/// Priority levels used by the built-in alerts. Higher wins.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum EffectPriority {
    /// Heat map and other background effects
    Low = 10,
    /// Homeport and precipitation effects
    Medium = 20,
    /// Wind alerts
    High = 30,
    /// Weather alerts such as lightning
    Critical = 40,
}

impl From<EffectPriority> for u8 {
    fn from(priority: EffectPriority) -> Self {
        priority as u8
    }
}

/// Kind-specific parameters of an effect request
///
/// Unset colors fall back to the station's own color (or black where noted
/// on the effect).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EffectParams {
    /// Primary color: "on" for blink, the fade target, the wipe color
    pub color: Option<Rgb>,
    /// Secondary color: "off" for blink, the fade source, the color ahead of a wipe
    pub alt_color: Option<Rgb>,
    /// Repetition period in ticks for periodic effects (zero = default)
    pub period: u32,
    /// Heat map reading, 0 (cold, blue) to 255 (hot, red)
    pub value: u8,
    /// Brightness of this effect's output; full when unset
    pub intensity: Option<u8>,
}

impl EffectParams {
    #[must_use]
    pub const fn with_color(mut self, color: Rgb) -> Self {
        self.color = Some(color);
        self
    }

    #[must_use]
    pub const fn with_alt_color(mut self, color: Rgb) -> Self {
        self.alt_color = Some(color);
        self
    }

    #[must_use]
    pub const fn with_period(mut self, period: u32) -> Self {
        self.period = period;
        self
    }

    #[must_use]
    pub const fn with_value(mut self, value: u8) -> Self {
        self.value = value;
        self
    }

    #[must_use]
    pub const fn with_intensity(mut self, intensity: u8) -> Self {
        self.intensity = Some(intensity);
        self
    }
}

/// A request to start a bounded effect on a set of stations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectRequest {
    pub kind: EffectKind,
    pub stations: StationSet,
    /// Numeric priority, higher wins
    pub priority: u8,
    /// Lifetime in ticks; clamped to the engine's maximum
    pub duration: u32,
    pub params: EffectParams,
    /// First tick the effect may run on; `None` starts it on admission
    pub start_tick: Option<u64>,
}

impl EffectRequest {
    pub fn new(kind: EffectKind, stations: StationSet, priority: u8, duration: u32) -> Self {
        Self {
            kind,
            stations,
            priority,
            duration,
            params: EffectParams::default(),
            start_tick: None,
        }
    }

    #[must_use]
    pub fn with_params(mut self, params: EffectParams) -> Self {
        self.params = params;
        self
    }

    #[must_use]
    pub fn starting_at(mut self, tick: u64) -> Self {
        self.start_tick = Some(tick);
        self
    }
}

/// Identifier of a triggered effect, assigned in trigger order
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct EffectId(pub(crate) u32);

impl EffectId {
    pub const fn get(self) -> u32 {
        self.0
    }
}

/// Lifecycle of an effect instance
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum EffectState {
    /// Admitted, waiting for its start tick
    Pending,
    Running,
    /// Duration elapsed or stopped explicitly
    Completed,
    /// Lost every station to a higher-ranked effect; never resumed
    Preempted,
}

impl EffectState {
    pub const fn is_finished(self) -> bool {
        matches!(self, Self::Completed | Self::Preempted)
    }
}

/// Effect slot - enum containing all possible effects
#[derive(Debug, Clone)]
pub enum EffectSlot {
    Static(StaticColorEffect),
    Blink(BlinkEffect),
    Fade(FadeEffect),
    Wipe(WipeEffect),
    Lightning(LightningEffect),
    Pulse(PulseEffect),
    HeatMap(HeatMapEffect),
}

impl EffectSlot {
    /// Derived from each effect's `Effect::PERIODIC` constant.
    pub fn is_periodic(&self) -> bool {
        match self {
            Self::Static(_) => StaticColorEffect::PERIODIC,
            Self::Blink(_) => BlinkEffect::PERIODIC,
            Self::Fade(_) => FadeEffect::PERIODIC,
            Self::Wipe(_) => WipeEffect::PERIODIC,
            Self::Lightning(_) => LightningEffect::PERIODIC,
            Self::Pulse(_) => PulseEffect::PERIODIC,
            Self::HeatMap(_) => HeatMapEffect::PERIODIC,
        }
    }

    pub fn sample(&self, phase: u32, span: u32, position: Position, base: Rgb) -> Rgb {
        match self {
            Self::Static(effect) => effect.sample(phase, span, position, base),
            Self::Blink(effect) => effect.sample(phase, span, position, base),
            Self::Fade(effect) => effect.sample(phase, span, position, base),
            Self::Wipe(effect) => effect.sample(phase, span, position, base),
            Self::Lightning(effect) => effect.sample(phase, span, position, base),
            Self::Pulse(effect) => effect.sample(phase, span, position, base),
            Self::HeatMap(effect) => effect.sample(phase, span, position, base),
        }
    }

    pub fn kind(&self) -> EffectKind {
        match self {
            Self::Static(_) => EffectKind::Static,
            Self::Blink(_) => EffectKind::Blink,
            Self::Fade(_) => EffectKind::Fade,
            Self::Wipe(_) => EffectKind::Wipe,
            Self::Lightning(_) => EffectKind::Lightning,
            Self::Pulse(_) => EffectKind::Pulse,
            Self::HeatMap(_) => EffectKind::HeatMap,
        }
    }
}
