//! Three-state circuit breaker

use embassy_time::{Duration, Instant};

/// Breaker state of one guarded source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum BreakerState {
    /// Normal operation
    Closed,
    /// Calls are short-circuited until the cooldown elapses
    Open,
    /// One trial call is allowed
    HalfOpen,
}

impl BreakerState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half-open",
        }
    }
}

/// Circuit breaker guarding one source or operation.
///
/// The breaker itself knows nothing about heartbeats; the monitor decides
/// when a failure happened and reports it through [`Self::trip`] or
/// [`Self::record_failure`].
#[derive(Debug, Clone, Copy)]
pub struct CircuitBreaker {
    state: BreakerState,
    cooldown: Duration,
    opened_at: Instant,
    trial_in_flight: bool,
    trips: u32,
}

impl CircuitBreaker {
    pub const fn new(cooldown: Duration) -> Self {
        Self {
            state: BreakerState::Closed,
            cooldown,
            opened_at: Instant::from_ticks(0),
            trial_in_flight: false,
            trips: 0,
        }
    }

    pub const fn state(&self) -> BreakerState {
        self.state
    }

    /// Times the breaker went to `Open`
    pub const fn trips(&self) -> u32 {
        self.trips
    }

    /// Move `Open` to `HalfOpen` once the cooldown has elapsed.
    ///
    /// Returns true on that transition.
    pub fn poll(&mut self, now: Instant) -> bool {
        if self.state == BreakerState::Open
            && now.saturating_duration_since(self.opened_at) >= self.cooldown
        {
            self.state = BreakerState::HalfOpen;
            self.trial_in_flight = false;
            return true;
        }
        false
    }

    /// Whether a guarded call may be attempted now.
    ///
    /// In `HalfOpen` only the first caller gets through until the trial
    /// resolves.
    pub fn allow(&mut self, now: Instant) -> bool {
        self.poll(now);
        match self.state {
            BreakerState::Closed => true,
            BreakerState::Open => false,
            BreakerState::HalfOpen if self.trial_in_flight => false,
            BreakerState::HalfOpen => {
                self.trial_in_flight = true;
                true
            }
        }
    }

    /// Successful call or probe. Closes a half-open breaker.
    ///
    /// Returns true when this closed the breaker.
    pub fn record_success(&mut self) -> bool {
        self.trial_in_flight = false;
        if self.state == BreakerState::HalfOpen {
            self.state = BreakerState::Closed;
            return true;
        }
        false
    }

    /// Failed trial. Reopens a half-open breaker; a no-op otherwise.
    ///
    /// Returns true when this reopened the breaker.
    pub fn record_failure(&mut self, now: Instant) -> bool {
        if self.state == BreakerState::HalfOpen {
            self.open(now);
            return true;
        }
        false
    }

    /// Force the breaker open from any state
    pub fn trip(&mut self, now: Instant) -> bool {
        if self.state == BreakerState::Open {
            return false;
        }
        self.open(now);
        true
    }

    fn open(&mut self, now: Instant) {
        self.state = BreakerState::Open;
        self.opened_at = now;
        self.trial_in_flight = false;
        self.trips = self.trips.saturating_add(1);
    }
}
