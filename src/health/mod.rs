//! Health monitor
//!
//! Tracks heartbeats from the render loop and from any bounded external
//! operation, trips a per-source circuit breaker when a source goes stale,
//! and drives the supervised safe-state transition.
//!
//! [`HealthMonitor::check`] is meant to run on its own timer, outside the
//! render loop, so that a stalled render pass cannot also stall detection.

mod breaker;

pub use breaker::{BreakerState, CircuitBreaker};

use core::cell::RefCell;

use critical_section::Mutex;
use embassy_time::Instant;
use heapless::Vec;

use crate::arbiter::ResourceArbiter;
use crate::config::HealthConfig;
use crate::error::CoreError;
use crate::status::{RenderStats, SourceStatus, StatusSnapshot};

/// Upper bound on monitored sources
pub const MAX_SOURCES: usize = 8;

/// Handle of a registered source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceId(usize);

/// Safe-state request observed by the effect engine.
///
/// `epoch` increments on every breaker trip; the engine drops its effects
/// whenever it sees a new epoch. While `active` the engine renders the
/// neutral pattern and refuses new effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SafeState {
    pub epoch: u32,
    pub active: bool,
}

#[derive(Debug, Clone, Copy)]
struct Source {
    name: &'static str,
    last_tick: u64,
    last_seen: Instant,
    breaker: CircuitBreaker,
    degraded: bool,
}

struct MonitorState {
    sources: Vec<Source, MAX_SOURCES>,
    safe: SafeState,
    render: RenderStats,
}

impl MonitorState {
    /// Leave safe state once every breaker is closed again
    fn settle(&mut self) {
        if self.safe.active
            && self
                .sources
                .iter()
                .all(|source| source.breaker.state() == BreakerState::Closed)
        {
            self.safe.active = false;
            log::info!("all sources healthy, leaving safe state");
        }
    }
}

pub struct HealthMonitor<'a> {
    config: HealthConfig,
    arbiter: &'a ResourceArbiter,
    inner: Mutex<RefCell<MonitorState>>,
}

impl<'a> HealthMonitor<'a> {
    pub const fn new(config: HealthConfig, arbiter: &'a ResourceArbiter) -> Self {
        Self {
            config,
            arbiter,
            inner: Mutex::new(RefCell::new(MonitorState {
                sources: Vec::new(),
                safe: SafeState {
                    epoch: 0,
                    active: false,
                },
                render: RenderStats::EMPTY,
            })),
        }
    }

    pub const fn config(&self) -> &HealthConfig {
        &self.config
    }

    /// Register a source. The registration counts as its first heartbeat.
    ///
    /// Registering a name twice returns the existing handle.
    pub fn register(&self, name: &'static str, now: Instant) -> Result<SourceId, CoreError> {
        critical_section::with(|cs| {
            let mut state = self.inner.borrow(cs).borrow_mut();
            if let Some(index) = state.sources.iter().position(|source| source.name == name) {
                return Ok(SourceId(index));
            }
            state
                .sources
                .push(Source {
                    name,
                    last_tick: 0,
                    last_seen: now,
                    breaker: CircuitBreaker::new(self.config.cooldown),
                    degraded: false,
                })
                .map_err(|_| CoreError::Capacity)?;
            Ok(SourceId(state.sources.len() - 1))
        })
    }

    /// Record liveness of a source.
    ///
    /// The recorded tick and time never go backwards. A heartbeat that
    /// arrives while the breaker is half-open is the successful probe and
    /// closes it.
    pub fn heartbeat(&self, id: SourceId, tick: u64, now: Instant) {
        critical_section::with(|cs| {
            let mut state = self.inner.borrow(cs).borrow_mut();
            let Some(source) = state.sources.get_mut(id.0) else {
                return;
            };
            source.last_tick = source.last_tick.max(tick);
            source.last_seen = source.last_seen.max(now);
            if source.breaker.record_success() {
                log::info!("source {}: probe succeeded, breaker closed", source.name);
                state.settle();
            }
        });
    }

    /// Mark a source as degraded (alive but not keeping up)
    pub fn report_degraded(&self, id: SourceId, degraded: bool) {
        critical_section::with(|cs| {
            let mut state = self.inner.borrow(cs).borrow_mut();
            if let Some(source) = state.sources.get_mut(id.0)
                && source.degraded != degraded
            {
                source.degraded = degraded;
                if degraded {
                    log::warn!("source {} reports degraded operation", source.name);
                } else {
                    log::info!("source {} recovered from degraded operation", source.name);
                }
            }
        });
    }

    /// Inspect every source and drive its breaker.
    ///
    /// A closed breaker opens after `trip_after_misses` whole staleness
    /// thresholds without a heartbeat. An open breaker turns half-open once
    /// the cooldown elapses and gives the source one threshold to deliver a
    /// probe heartbeat; a half-open breaker that goes stale opens again.
    ///
    /// Any trip puts the core into safe state and force-releases every
    /// lease. Returns `StaleHeartbeat` naming the first source that tripped.
    pub fn check(&self, now: Instant) -> Result<(), CoreError> {
        let threshold = self.config.staleness_threshold.as_ticks().max(1);
        let trip_after = u64::from(self.config.trip_after_misses.max(1));

        let tripped = critical_section::with(|cs| {
            let mut state = self.inner.borrow(cs).borrow_mut();
            let mut tripped: Option<&'static str> = None;

            for source in &mut state.sources {
                let misses =
                    now.saturating_duration_since(source.last_seen).as_ticks() / threshold;
                match source.breaker.state() {
                    BreakerState::Closed if misses >= trip_after => {
                        source.breaker.trip(now);
                        log::warn!(
                            "source {}: {} missed heartbeats, breaker open",
                            source.name,
                            misses
                        );
                        tripped.get_or_insert(source.name);
                    }
                    BreakerState::Closed => {}
                    BreakerState::Open => {
                        if source.breaker.poll(now) {
                            source.last_seen = now;
                            log::info!(
                                "source {}: cooldown elapsed, breaker half-open",
                                source.name
                            );
                        }
                    }
                    BreakerState::HalfOpen if misses >= 1 => {
                        source.breaker.record_failure(now);
                        log::warn!("source {}: probe missed, breaker open again", source.name);
                        tripped.get_or_insert(source.name);
                    }
                    BreakerState::HalfOpen => {}
                }
            }

            if tripped.is_some() {
                state.safe.epoch = state.safe.epoch.wrapping_add(1);
                if !state.safe.active {
                    log::error!("entering safe state");
                }
                state.safe.active = true;
            } else {
                state.settle();
            }
            tripped
        });

        match tripped {
            Some(name) => {
                self.arbiter.force_release_all();
                Err(CoreError::StaleHeartbeat { name })
            }
            None => Ok(()),
        }
    }

    /// Run a bounded operation through the source's breaker.
    ///
    /// An open breaker (or a half-open one whose single trial is already
    /// taken) short-circuits with `BreakerOpen` without running `op`. A
    /// successful run counts as a heartbeat; a failed trial reopens a
    /// half-open breaker.
    pub fn guard<T>(
        &self,
        id: SourceId,
        tick: u64,
        now: Instant,
        op: impl FnOnce() -> Result<T, CoreError>,
    ) -> Result<T, CoreError> {
        let allowed = critical_section::with(|cs| {
            let mut state = self.inner.borrow(cs).borrow_mut();
            state
                .sources
                .get_mut(id.0)
                .map(|source| (source.name, source.breaker.allow(now)))
        });

        let Some((name, allowed)) = allowed else {
            return op();
        };
        if !allowed {
            return Err(CoreError::BreakerOpen { name });
        }

        let result = op();
        match &result {
            Ok(_) => self.heartbeat(id, tick, now),
            Err(err) => {
                critical_section::with(|cs| {
                    let mut state = self.inner.borrow(cs).borrow_mut();
                    if let Some(source) = state.sources.get_mut(id.0)
                        && source.breaker.record_failure(now)
                    {
                        log::warn!("source {}: trial failed ({}), breaker open again", name, err);
                    }
                });
            }
        }
        result
    }

    pub fn breaker_state(&self, id: SourceId) -> Option<BreakerState> {
        critical_section::with(|cs| {
            self.inner
                .borrow(cs)
                .borrow()
                .sources
                .get(id.0)
                .map(|source| source.breaker.state())
        })
    }

    pub fn safe_state(&self) -> SafeState {
        critical_section::with(|cs| self.inner.borrow(cs).borrow().safe)
    }

    /// Store the render loop's latest statistics for status polling
    pub fn publish_render(&self, stats: RenderStats) {
        critical_section::with(|cs| self.inner.borrow(cs).borrow_mut().render = stats);
    }

    /// Copy out breaker states, heartbeat ages and render statistics
    pub fn status(&self, now: Instant) -> StatusSnapshot {
        let threshold = self.config.staleness_threshold.as_ticks().max(1);
        let (sources, safe, render) = critical_section::with(|cs| {
            let state = self.inner.borrow(cs).borrow();
            let sources: Vec<SourceStatus, MAX_SOURCES> = state
                .sources
                .iter()
                .map(|source| {
                    let age = now.saturating_duration_since(source.last_seen);
                    SourceStatus {
                        name: source.name,
                        breaker: source.breaker.state(),
                        last_tick: source.last_tick,
                        heartbeat_age_ms: age.as_millis(),
                        missed: u32::try_from(age.as_ticks() / threshold).unwrap_or(u32::MAX),
                        trips: source.breaker.trips(),
                        degraded: source.degraded,
                    }
                })
                .collect();
            (sources, state.safe, state.render)
        });

        StatusSnapshot {
            sources,
            safe_state: safe.active,
            safe_epoch: safe.epoch,
            live_leases: self.arbiter.live_leases(),
            render,
        }
    }
}
