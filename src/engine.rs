//! Effect engine
//!
//! Holds the bounded arena of active effects, advances their lifecycle once
//! per tick and composites one color per station. The composited frame is a
//! pure function of (tick, station snapshot, active effect set): effects hold
//! only their relative phase, never timers of their own.

use embassy_time::Instant;
use heapless::{Deque, Vec};

use crate::{
    OutputDriver,
    arbiter::ResourceArbiter,
    color::{Rgb, scale_color},
    config::EngineConfig,
    effect::{
        DEFAULT_PERIOD_TICKS, EffectId, EffectRequest, EffectSlot, EffectState, Position,
    },
    error::CoreError,
    filter::{BrightnessFilter, Filter},
    health::SafeState,
    station::{StationSet, StationState},
    trigger::{CommandReceiver, EngineCommand},
};

/// Upper bound on effects alive (pending or running) at once
pub const MAX_EFFECTS: usize = 16;

/// Number of finished effects whose final state stays queryable
pub const EFFECT_HISTORY: usize = 32;

#[derive(Debug, Clone)]
struct EffectInstance {
    id: EffectId,
    slot: EffectSlot,
    /// Stations requested by the trigger; fixes each station's position
    members: StationSet,
    /// Stations not yet claimed by a higher-ranked effect
    owned: StationSet,
    priority: u8,
    start_tick: u64,
    /// Lifetime in ticks, already clamped to the engine maximum
    duration: u32,
    /// Repetition period, resolved and clamped like the duration
    period: u32,
    /// Per-effect brightness (255 = as sampled)
    intensity: u8,
    state: EffectState,
}

impl EffectInstance {
    /// Resolution order: priority first, then the most recently created
    fn outranks(&self, other: &Self) -> bool {
        (self.priority, self.id) > (other.priority, other.id)
    }

    fn elapsed(&self, tick: u64) -> u64 {
        tick.saturating_sub(self.start_tick)
    }

    #[allow(clippy::cast_possible_truncation)]
    fn phase(&self, tick: u64) -> (u32, u32) {
        let elapsed = self.elapsed(tick);
        if self.slot.is_periodic() {
            let period = self.period.max(1);
            ((elapsed % u64::from(period)) as u32, period)
        } else {
            (elapsed.min(u64::from(self.duration)) as u32, self.duration)
        }
    }
}

/// Engine counters, copied into the render statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub running: usize,
    pub pending: usize,
    /// Stations rendered with the fallback color in the last frame
    pub fallback_stations: usize,
    pub completed: u32,
    pub preempted: u32,
}

pub struct EffectEngine<'a, const N: usize, const Q: usize> {
    config: EngineConfig,
    commands: CommandReceiver<'a, Q>,
    effects: Vec<EffectInstance, MAX_EFFECTS>,
    history: Deque<(EffectId, EffectState), EFFECT_HISTORY>,
    frame: Vec<Rgb, N>,
    brightness: BrightnessFilter,
    safe_epoch: u32,
    stats: EngineStats,
}

impl<'a, const N: usize, const Q: usize> EffectEngine<'a, N, Q> {
    pub fn new(config: EngineConfig, commands: CommandReceiver<'a, Q>) -> Self {
        Self {
            config,
            commands,
            effects: Vec::new(),
            history: Deque::new(),
            frame: Vec::new(),
            brightness: BrightnessFilter::new(config.brightness),
            safe_epoch: 0,
            stats: EngineStats::default(),
        }
    }

    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Advance every effect to `tick` and composite the frame.
    ///
    /// Call once per frame clock tick with the latest station snapshot and
    /// the monitor's safe-state request. A new safe-state epoch drops every
    /// effect; while safe state is active every station shows the neutral
    /// color and new triggers are refused.
    pub fn advance(&mut self, tick: u64, stations: &[StationState], safe: SafeState) -> &[Rgb] {
        if safe.epoch != self.safe_epoch {
            self.safe_epoch = safe.epoch;
            let dropped = self.finish_all(EffectState::Preempted);
            if dropped > 0 {
                log::error!("safe state: dropped {} active effect(s)", dropped);
            }
        }

        self.process_commands(tick, safe.active);
        self.run_lifecycle(tick);
        self.compose(tick, stations, safe.active);

        &self.frame
    }

    /// Frame composited by the last [`Self::advance`]
    pub fn frame(&self) -> &[Rgb] {
        &self.frame
    }

    /// Write the last frame to the driver under a scoped LED lease.
    ///
    /// The lease is released on every exit path, including a driver error.
    pub fn present<D: OutputDriver>(
        &self,
        arbiter: &ResourceArbiter,
        driver: &mut D,
        now: Instant,
    ) -> Result<(), CoreError> {
        let _lease = arbiter.acquire_at(
            self.config.led_channel,
            self.config.owner,
            now,
            self.config.write_timeout,
        )?;
        driver.write(&self.frame)?;
        Ok(())
    }

    /// Current state of a live effect, or the final state of a recent one
    pub fn state(&self, id: EffectId) -> Option<EffectState> {
        self.effects
            .iter()
            .find(|effect| effect.id == id)
            .map(|effect| effect.state)
            .or_else(|| {
                self.history
                    .iter()
                    .rev()
                    .find(|(known, _)| *known == id)
                    .map(|(_, state)| *state)
            })
    }

    /// Number of effects currently running
    pub fn active_count(&self) -> usize {
        self.effects
            .iter()
            .filter(|effect| effect.state == EffectState::Running)
            .count()
    }

    pub const fn stats(&self) -> EngineStats {
        self.stats
    }

    /// Global brightness applied to the composited frame
    pub const fn brightness(&self) -> u8 {
        self.brightness.level()
    }

    pub fn set_brightness(&mut self, brightness: u8) {
        if brightness != self.brightness.level() {
            log::info!("brightness set to {}", brightness);
            self.brightness.set_level(brightness);
        }
    }

    /// Complete every effect immediately
    pub fn clear(&mut self) {
        self.finish_all(EffectState::Completed);
    }

    fn process_commands(&mut self, tick: u64, safe_active: bool) {
        while let Some(command) = self.commands.try_receive() {
            match command {
                EngineCommand::Trigger { id, .. } if safe_active => {
                    log::warn!("effect {} refused: core is in safe state", id.get());
                    self.record(id, EffectState::Preempted);
                }
                EngineCommand::Trigger { id, request } => self.admit(id, &request, tick),
                EngineCommand::Stop(id) => self.stop(id),
                EngineCommand::StopAll => {
                    self.finish_all(EffectState::Completed);
                }
                EngineCommand::SetBrightness(brightness) => self.set_brightness(brightness),
            }
        }
    }

    fn admit(&mut self, id: EffectId, request: &EffectRequest, tick: u64) {
        if request.stations.is_empty() {
            log::debug!("effect {} targets no station, completed", id.get());
            self.record(id, EffectState::Completed);
            return;
        }

        let max_ticks = self.config.max_effect_ticks.max(1);
        let start_tick = request
            .start_tick
            .unwrap_or(tick)
            .min(tick.saturating_add(u64::from(max_ticks)));
        let period = match request.params.period {
            0 => DEFAULT_PERIOD_TICKS,
            period => period,
        };
        let instance = EffectInstance {
            id,
            slot: request.kind.to_slot(&request.params),
            members: request.stations,
            owned: request.stations,
            priority: request.priority,
            start_tick,
            duration: request.duration.clamp(1, max_ticks),
            period: period.clamp(1, max_ticks),
            intensity: request.params.intensity.unwrap_or(u8::MAX),
            state: EffectState::Pending,
        };

        if self.effects.push(instance).is_err() {
            log::warn!(
                "effect arena full ({} effects), effect {} discarded",
                MAX_EFFECTS,
                id.get()
            );
            self.record(id, EffectState::Preempted);
        }
    }

    fn stop(&mut self, id: EffectId) {
        if let Some(effect) = self.effects.iter_mut().find(|effect| effect.id == id) {
            log::debug!("effect {} stopped", id.get());
            effect.state = EffectState::Completed;
            self.sweep();
        }
    }

    /// Run every state transition due at `tick`, in id order
    fn run_lifecycle(&mut self, tick: u64) {
        for index in 0..self.effects.len() {
            let effect = &mut self.effects[index];
            let started = match effect.state {
                EffectState::Running if effect.elapsed(tick) >= u64::from(effect.duration) => {
                    effect.state = EffectState::Completed;
                    log::debug!("effect {} completed at tick {}", effect.id.get(), tick);
                    false
                }
                EffectState::Pending if tick >= effect.start_tick => {
                    effect.state = EffectState::Running;
                    log::debug!(
                        "effect {} ({}) running at tick {}",
                        effect.id.get(),
                        effect.slot.kind().as_str(),
                        tick
                    );
                    true
                }
                _ => false,
            };
            if started {
                self.claim(index, tick);
            }
        }
        self.sweep();
    }

    /// Strip the stations of a newly started effect from every lower-ranked
    /// running effect. Effects left without stations are preempted.
    fn claim(&mut self, index: usize, tick: u64) {
        let claimer = self.effects[index].clone();
        for effect in &mut self.effects {
            if effect.id == claimer.id
                || effect.state != EffectState::Running
                || !claimer.outranks(effect)
                || !effect.owned.intersects(&claimer.members)
            {
                continue;
            }
            effect.owned.subtract(&claimer.members);
            if effect.owned.is_empty() {
                effect.state = EffectState::Preempted;
                log::debug!(
                    "effect {} preempted by effect {} at tick {}",
                    effect.id.get(),
                    claimer.id.get(),
                    tick
                );
            }
        }
    }

    fn compose(&mut self, tick: u64, stations: &[StationState], safe_active: bool) {
        self.frame.clear();
        let mut fallback = 0;

        for (index, station) in stations.iter().take(N).enumerate() {
            if !station.valid {
                fallback += 1;
            }

            let color = if safe_active {
                self.config.neutral
            } else {
                self.resolve(index, tick, station.color)
            };
            // Bounded by `take(N)`
            let _ = self.frame.push(color);
        }

        self.brightness.apply(&mut self.frame);

        self.stats.fallback_stations = fallback;
        self.stats.running = self.active_count();
        self.stats.pending = self.effects.len() - self.stats.running;
    }

    /// Color of one station: the highest-ranked running effect that owns it,
    /// or the station's base color. Lower-ranked effects are suppressed.
    fn resolve(&self, index: usize, tick: u64, base: Rgb) -> Rgb {
        let winner = self
            .effects
            .iter()
            .filter(|effect| effect.state == EffectState::Running && effect.owned.contains(index))
            .reduce(|best, effect| if effect.outranks(best) { effect } else { best });

        let Some(effect) = winner else {
            return base;
        };
        let (phase, span) = effect.phase(tick);
        let position = Position {
            index: effect.members.rank(index),
            count: effect.members.len(),
        };
        let color = effect.slot.sample(phase, span, position, base);
        if effect.intensity == u8::MAX {
            color
        } else {
            scale_color(color, effect.intensity)
        }
    }

    fn finish_all(&mut self, state: EffectState) -> usize {
        let count = self.effects.len();
        for effect in &mut self.effects {
            effect.state = state;
        }
        self.sweep();
        count
    }

    /// Move finished effects from the arena into the history
    fn sweep(&mut self) {
        let mut index = 0;
        while index < self.effects.len() {
            let effect = &self.effects[index];
            if effect.state.is_finished() {
                let (id, state) = (effect.id, effect.state);
                self.effects.remove(index);
                self.record(id, state);
            } else {
                index += 1;
            }
        }
    }

    fn record(&mut self, id: EffectId, state: EffectState) {
        match state {
            EffectState::Completed => self.stats.completed = self.stats.completed.saturating_add(1),
            EffectState::Preempted => self.stats.preempted = self.stats.preempted.saturating_add(1),
            EffectState::Pending | EffectState::Running => {}
        }
        if self.history.is_full() {
            self.history.pop_front();
        }
        let _ = self.history.push_back((id, state));
    }
}
