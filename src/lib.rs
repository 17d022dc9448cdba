#![no_std]

pub mod alerts;
pub mod arbiter;
pub mod color;
pub mod config;
pub mod effect;
pub mod engine;
pub mod error;
pub mod filter;
pub mod frame_clock;
pub mod health;
#[cfg(feature = "esp32-log")]
pub mod logging;
pub mod math8;
pub mod render_loop;
pub mod shutdown;
pub mod station;
pub mod status;
pub mod trigger;

pub use arbiter::{Lease, LeaseGuard, OwnerId, ResourceArbiter};
pub use config::{
    CategoryPalette, ClockConfig, CoreConfig, EngineConfig, HealthConfig, LED_CHANNEL,
};
pub use effect::{
    EffectId, EffectKind, EffectParams, EffectPriority, EffectRequest, EffectSlot, EffectState,
};
pub use engine::EffectEngine;
pub use error::{CoreError, DriverError, InvalidData};
pub use filter::BrightnessFilter;
pub use frame_clock::{FrameClock, TickInfo};
pub use health::{BreakerState, HealthMonitor, SafeState, SourceId};
pub use render_loop::{FrameOutcome, RenderContext, RenderLoop};
pub use shutdown::ShutdownSignal;
pub use station::{FlightCategory, StationFlags, StationSet, StationState, StationTable};
pub use status::{RenderStats, SourceStatus, StatusSnapshot};
pub use trigger::{EffectTrigger, TriggerQueue};

pub use color::Rgb;
pub use embassy_time::{Duration, Instant};

/// Abstract LED driver trait
///
/// Implement this trait to support different hardware platforms.
/// The render loop is generic over this trait and only calls it while
/// holding the LED channel lease.
pub trait OutputDriver {
    /// Write colors to the LED strip, one per station in LED order
    fn write(&mut self, colors: &[Rgb]) -> Result<(), DriverError>;
}
