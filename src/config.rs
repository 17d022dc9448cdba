//! Configuration for the rendering and reliability core.
//!
//! Every struct is `Copy` and has a `Default` built from the constants below,
//! so an embedding application only overrides what it cares about.

use embassy_time::Duration;

use crate::arbiter::OwnerId;
use crate::color::{Rgb, rgb_from_u32};

/// Default target frame rate (30 FPS).
pub const DEFAULT_FPS: u32 = 30;

/// Consecutive late frames before the clock reports itself degraded.
pub const DEFAULT_MAX_LATE_FRAMES: u32 = 10;

/// Full brightness
pub const DEFAULT_BRIGHTNESS: u8 = u8::MAX;

/// Hard cap on any effect's lifetime (30 seconds at the default rate).
pub const DEFAULT_MAX_EFFECT_TICKS: u32 = 30 * DEFAULT_FPS;

pub const DEFAULT_STALENESS_THRESHOLD: Duration = Duration::from_millis(500);
pub const DEFAULT_TRIP_AFTER_MISSES: u32 = 3;
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(5);

/// Name of the arbitrated LED output channel
pub const LED_CHANNEL: &str = "LED_CHANNEL";

/// Owner id used by the render loop when leasing the LED channel
pub const RENDER_OWNER: OwnerId = OwnerId(1);

#[derive(Debug, Clone, Copy)]
pub struct ClockConfig {
    /// Target frame rate
    pub fps: u32,
    /// Consecutive late frames tolerated before reporting degraded status
    pub max_late_frames: u32,
}

impl ClockConfig {
    /// Duration of one frame at the configured rate
    pub fn frame_duration(&self) -> Duration {
        Duration::from_micros(1_000_000 / u64::from(self.fps.max(1)))
    }
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            fps: DEFAULT_FPS,
            max_late_frames: DEFAULT_MAX_LATE_FRAMES,
        }
    }
}

/// Configuration for the effect engine
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    /// Channel the composited frame is written through
    pub led_channel: &'static str,
    /// Owner id presented to the arbiter
    pub owner: OwnerId,
    /// Upper bound for every effect, regardless of the requested duration
    pub max_effect_ticks: u32,
    /// How long a frame write may wait for the LED lease (zero = one attempt)
    pub write_timeout: Duration,
    /// Color of every station while the core is in safe state
    pub neutral: Rgb,
    /// Initial global brightness applied to every composited frame
    pub brightness: u8,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            led_channel: LED_CHANNEL,
            owner: RENDER_OWNER,
            max_effect_ticks: DEFAULT_MAX_EFFECT_TICKS,
            write_timeout: Duration::from_millis(0),
            neutral: CategoryPalette::DEFAULT.no_data,
            brightness: DEFAULT_BRIGHTNESS,
        }
    }
}

/// Staleness and breaker tuning for the health monitor
#[derive(Debug, Clone, Copy)]
pub struct HealthConfig {
    /// Age of a heartbeat that counts as one missed beat
    pub staleness_threshold: Duration,
    /// Missed beats before a closed breaker opens
    pub trip_after_misses: u32,
    /// Time an open breaker waits before allowing a probe
    pub cooldown: Duration,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            staleness_threshold: DEFAULT_STALENESS_THRESHOLD,
            trip_after_misses: DEFAULT_TRIP_AFTER_MISSES,
            cooldown: DEFAULT_COOLDOWN,
        }
    }
}

/// Base colors per flight category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryPalette {
    pub vfr: Rgb,
    pub mvfr: Rgb,
    pub ifr: Rgb,
    pub lifr: Rgb,
    /// Used for category NONE and for any malformed station data
    pub no_data: Rgb,
}

impl CategoryPalette {
    pub const DEFAULT: Self = Self {
        vfr: rgb_from_u32(0x00_FF_00),
        mvfr: rgb_from_u32(0x00_00_FF),
        ifr: rgb_from_u32(0xFF_00_00),
        lifr: rgb_from_u32(0xFF_00_FF),
        no_data: rgb_from_u32(0x40_40_40),
    };
}

impl Default for CategoryPalette {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Full configuration of the core
#[derive(Debug, Clone, Copy, Default)]
pub struct CoreConfig {
    pub clock: ClockConfig,
    pub engine: EngineConfig,
    pub health: HealthConfig,
    pub palette: CategoryPalette,
}

impl CoreConfig {
    /// Derive the effect cap from the clock rate so it stays at 30 seconds
    #[must_use]
    pub fn with_fps(mut self, fps: u32) -> Self {
        self.clock.fps = fps;
        self.engine.max_effect_ticks = 30 * fps.max(1);
        self
    }
}
