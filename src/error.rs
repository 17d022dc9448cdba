//! Error taxonomy shared by every part of the core.
//!
//! Per-station and per-tick errors are recovered where they happen; only a
//! stale heartbeat escalates to the supervised safe-state path.

use thiserror::Error;

/// Reason why a station update was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InvalidData {
    /// Category string is not one of VFR/MVFR/IFR/LIFR/NONE
    #[error("unknown flight category")]
    Category,
    /// Color value does not fit into 24 bits
    #[error("color out of range")]
    Color,
}

/// Failure reported by an [`crate::OutputDriver`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct DriverError(pub &'static str);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CoreError {
    /// Channel is currently leased by another owner
    #[error("channel `{channel}` is held by another owner")]
    Busy { channel: &'static str },
    /// Lease or bounded operation exceeded its deadline
    #[error("timed out waiting for channel `{channel}`")]
    Timeout { channel: &'static str },
    /// Channel id was not enumerated when the arbiter was built
    #[error("unknown hardware channel")]
    UnknownChannel,
    /// Malformed color or category; the station renders the fallback color
    #[error("invalid station data: {reason}")]
    InvalidStationData { reason: InvalidData },
    #[error("unknown station")]
    UnknownStation,
    /// A monitored source stopped sending heartbeats
    #[error("stale heartbeat from `{name}`")]
    StaleHeartbeat { name: &'static str },
    /// Guarded operation was short-circuited by its breaker
    #[error("circuit breaker for `{name}` is open")]
    BreakerOpen { name: &'static str },
    /// A bounded collection is full
    #[error("capacity exceeded")]
    Capacity,
    #[error("effect command queue is full")]
    QueueFull,
    #[error("driver write failed: {0}")]
    Driver(#[from] DriverError),
    /// Cooperative shutdown, not a failure
    #[error("shutdown requested")]
    ShutdownRequested,
}

impl CoreError {
    /// Returns true for errors that are handled locally (skip the write,
    /// substitute a color, retry next tick) without escalating.
    pub const fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            Self::StaleHeartbeat { .. } | Self::ShutdownRequested
        )
    }

    /// Returns true when the hardware channel could not be obtained this tick
    pub const fn is_contention(&self) -> bool {
        matches!(self, Self::Busy { .. } | Self::Timeout { .. })
    }
}
