//! Resource arbiter for non-shareable hardware channels.
//!
//! Every channel (the LED output, each GPIO line, each display) is
//! enumerated when the arbiter is built. A channel has at most one live
//! lease at any time. Leases are handed out inside a [`LeaseGuard`] that
//! releases them when dropped, so a lease cannot outlive the scope that
//! acquired it whatever path that scope exits through.

use core::cell::RefCell;

use critical_section::Mutex;
use embassy_time::{Duration, Instant};
use heapless::Vec;

use crate::error::CoreError;

/// Upper bound on enumerated hardware channels
pub const MAX_CHANNELS: usize = 8;

/// Attempts a contended bounded wait makes before giving up, even if the
/// clock never reaches the deadline
pub const MAX_ACQUIRE_SPINS: u32 = 100_000;

/// Time source used by blocking acquisition
pub type ClockFn = fn() -> Instant;

/// Logical owner of a lease
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct OwnerId(pub u32);

/// Exclusive ownership of one hardware channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lease {
    channel: usize,
    name: &'static str,
    owner: OwnerId,
    generation: u32,
    acquired_at: Instant,
}

impl Lease {
    pub const fn channel(&self) -> &'static str {
        self.name
    }

    pub const fn owner(&self) -> OwnerId {
        self.owner
    }

    pub const fn acquired_at(&self) -> Instant {
        self.acquired_at
    }
}

#[derive(Debug, Clone, Copy)]
struct Held {
    owner: OwnerId,
    generation: u32,
}

struct ArbiterState {
    slots: [Option<Held>; MAX_CHANNELS],
    generation: u32,
    contention: u32,
}

/// Grants exclusive channel leases to at most one owner at a time
pub struct ResourceArbiter {
    channels: Vec<&'static str, MAX_CHANNELS>,
    clock: ClockFn,
    inner: Mutex<RefCell<ArbiterState>>,
}

impl ResourceArbiter {
    /// Build an arbiter for a fixed set of channels
    pub fn new(channels: &[&'static str]) -> Result<Self, CoreError> {
        let mut names = Vec::new();
        for name in channels {
            if names.contains(name) {
                continue;
            }
            names.push(*name).map_err(|_| CoreError::Capacity)?;
        }

        Ok(Self {
            channels: names,
            clock: Instant::now,
            inner: Mutex::new(RefCell::new(ArbiterState {
                slots: [None; MAX_CHANNELS],
                generation: 0,
                contention: 0,
            })),
        })
    }

    /// Replace the time source used by [`Self::acquire`]
    #[must_use]
    pub fn with_clock(mut self, clock: ClockFn) -> Self {
        self.clock = clock;
        self
    }

    /// Enumerated channel names
    pub fn channels(&self) -> &[&'static str] {
        &self.channels
    }

    fn index_of(&self, channel: &str) -> Result<(usize, &'static str), CoreError> {
        self.channels
            .iter()
            .position(|name| *name == channel)
            .map(|index| (index, self.channels[index]))
            .ok_or(CoreError::UnknownChannel)
    }

    /// Single acquisition attempt at `now`.
    ///
    /// Fails with `Busy` if any owner, including `owner` itself, already
    /// holds the channel.
    pub fn try_acquire(
        &self,
        channel: &str,
        owner: OwnerId,
        now: Instant,
    ) -> Result<LeaseGuard<'_>, CoreError> {
        let (index, name) = self.index_of(channel)?;

        let outcome = critical_section::with(|cs| {
            let mut state = self.inner.borrow(cs).borrow_mut();
            let current = state.slots[index];
            match current {
                Some(held) => {
                    state.contention = state.contention.wrapping_add(1);
                    Err(held.owner)
                }
                None => {
                    state.generation = state.generation.wrapping_add(1);
                    let generation = state.generation;
                    state.slots[index] = Some(Held { owner, generation });
                    Ok(generation)
                }
            }
        });

        match outcome {
            Ok(generation) => Ok(LeaseGuard {
                arbiter: self,
                lease: Lease {
                    channel: index,
                    name,
                    owner,
                    generation,
                    acquired_at: now,
                },
            }),
            Err(holder) => {
                log::warn!(
                    "channel {} contention: owner {} refused, held by {}",
                    name,
                    owner.0,
                    holder.0
                );
                Err(CoreError::Busy { channel: name })
            }
        }
    }

    /// Acquire a channel, retrying until `timeout` has elapsed.
    ///
    /// A zero timeout makes exactly one attempt and reports `Busy` on
    /// contention. A positive timeout spins on the arbiter's clock and
    /// reports `Timeout` once the deadline passes or after
    /// [`MAX_ACQUIRE_SPINS`] attempts, whichever comes first, so a stalled
    /// clock cannot hold the caller forever.
    pub fn acquire(
        &self,
        channel: &str,
        owner: OwnerId,
        timeout: Duration,
    ) -> Result<LeaseGuard<'_>, CoreError> {
        self.acquire_at(channel, owner, (self.clock)(), timeout)
    }

    /// Same as [`Self::acquire`], with the first attempt made at `now`.
    ///
    /// Only a contended positive-timeout wait reads the arbiter's clock.
    pub fn acquire_at(
        &self,
        channel: &str,
        owner: OwnerId,
        now: Instant,
        timeout: Duration,
    ) -> Result<LeaseGuard<'_>, CoreError> {
        if timeout.as_ticks() == 0 {
            return self.try_acquire(channel, owner, now);
        }

        let deadline = now + timeout;
        let mut attempt_at = now;
        let mut spins: u32 = 0;
        loop {
            match self.try_acquire(channel, owner, attempt_at) {
                Err(CoreError::Busy { channel })
                    if attempt_at >= deadline || spins >= MAX_ACQUIRE_SPINS =>
                {
                    return Err(CoreError::Timeout { channel });
                }
                Err(CoreError::Busy { .. }) => {
                    spins += 1;
                    core::hint::spin_loop();
                    attempt_at = (self.clock)();
                }
                other => return other,
            }
        }
    }

    /// Release a lease.
    ///
    /// Releasing a lease that was already released, force-released, or
    /// superseded by a newer lease is a no-op. Returns whether the channel
    /// was actually freed.
    pub fn release(&self, lease: &Lease) -> bool {
        critical_section::with(|cs| {
            let mut state = self.inner.borrow(cs).borrow_mut();
            match state.slots.get(lease.channel).copied().flatten() {
                Some(held) if held.generation == lease.generation && held.owner == lease.owner => {
                    state.slots[lease.channel] = None;
                    true
                }
                _ => false,
            }
        })
    }

    /// Release every lease held by `owner`
    pub fn release_owner(&self, owner: OwnerId) -> usize {
        critical_section::with(|cs| {
            let mut state = self.inner.borrow(cs).borrow_mut();
            let mut released = 0;
            for slot in &mut state.slots {
                if slot.is_some_and(|held| held.owner == owner) {
                    *slot = None;
                    released += 1;
                }
            }
            released
        })
    }

    /// Drop every live lease. Outstanding guards become no-ops.
    pub fn force_release_all(&self) -> usize {
        let released = critical_section::with(|cs| {
            let mut state = self.inner.borrow(cs).borrow_mut();
            let released = state.slots.iter().filter(|slot| slot.is_some()).count();
            state.slots = [None; MAX_CHANNELS];
            released
        });
        if released > 0 {
            log::warn!("force-released {} channel lease(s)", released);
        }
        released
    }

    /// Current holder of a channel
    pub fn holder(&self, channel: &str) -> Result<Option<OwnerId>, CoreError> {
        let (index, _) = self.index_of(channel)?;
        Ok(critical_section::with(|cs| {
            self.inner.borrow(cs).borrow().slots[index].map(|held| held.owner)
        }))
    }

    /// Number of channels currently leased
    pub fn live_leases(&self) -> usize {
        critical_section::with(|cs| {
            self.inner
                .borrow(cs)
                .borrow()
                .slots
                .iter()
                .filter(|slot| slot.is_some())
                .count()
        })
    }

    /// Refused acquisition attempts since creation (wraps)
    pub fn contention_count(&self) -> u32 {
        critical_section::with(|cs| self.inner.borrow(cs).borrow().contention)
    }
}

/// Scoped lease, released on drop
pub struct LeaseGuard<'a> {
    arbiter: &'a ResourceArbiter,
    lease: Lease,
}

impl LeaseGuard<'_> {
    pub const fn lease(&self) -> &Lease {
        &self.lease
    }
}

impl Drop for LeaseGuard<'_> {
    fn drop(&mut self) {
        self.arbiter.release(&self.lease);
    }
}
