//! Health and status snapshot types
//!
//! Plain values copied out of the core so a status page can poll them
//! without touching any shared state. With the `serde` feature they derive
//! `Serialize`.

use heapless::Vec;

use crate::health::{BreakerState, MAX_SOURCES};

/// One monitored source as seen by the last status poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SourceStatus {
    pub name: &'static str,
    pub breaker: BreakerState,
    /// Highest tick the source reported
    pub last_tick: u64,
    /// Time since the last heartbeat, in milliseconds
    pub heartbeat_age_ms: u64,
    /// Whole staleness thresholds elapsed since the last heartbeat
    pub missed: u32,
    pub trips: u32,
    /// Source reported degraded operation (still alive, but behind)
    pub degraded: bool,
}

/// Render loop statistics, published once per tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct RenderStats {
    pub tick: u64,
    pub frames: u64,
    /// Frames per second measured over the last full window
    pub measured_fps: u32,
    /// Ticks dropped by lossy catch-up since start
    pub skipped_ticks: u64,
    /// Frames that started later than the drift limit since start
    pub late_frames: u32,
    /// Frames not written because the channel was busy or guarded
    pub skipped_writes: u32,
    pub active_effects: usize,
    /// Stations rendered with the fallback color in the last frame
    pub fallback_stations: usize,
    pub degraded: bool,
}

impl RenderStats {
    /// Statistics before the first frame
    pub const EMPTY: Self = Self {
        tick: 0,
        frames: 0,
        measured_fps: 0,
        skipped_ticks: 0,
        late_frames: 0,
        skipped_writes: 0,
        active_effects: 0,
        fallback_stations: 0,
        degraded: false,
    };
}

impl Default for RenderStats {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// Everything an external status page needs
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct StatusSnapshot {
    pub sources: Vec<SourceStatus, MAX_SOURCES>,
    pub safe_state: bool,
    /// Number of safe-state transitions since start
    pub safe_epoch: u32,
    pub live_leases: usize,
    pub render: RenderStats,
}

impl StatusSnapshot {
    /// True when every breaker is closed and the core is not in safe state
    pub fn is_healthy(&self) -> bool {
        !self.safe_state
            && self
                .sources
                .iter()
                .all(|source| source.breaker == BreakerState::Closed)
    }

    pub fn source(&self, name: &str) -> Option<&SourceStatus> {
        self.sources.iter().find(|source| source.name == name)
    }
}
