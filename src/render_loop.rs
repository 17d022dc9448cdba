//! Render loop.
//!
//! Ties the frame clock, the effect engine and the output driver together.
//! One call to [`RenderLoop::tick`] renders one frame; the caller sleeps for
//! the returned duration between calls. The loop never blocks: a busy LED
//! channel or an open write breaker skips that tick's hardware write.
//!
//! # Usage
//!
//! ```ignore
//! let mut render = RenderLoop::new(&config, queue.receiver(), driver, context, Instant::now())?;
//!
//! // Blocks until shutdown is requested
//! render.run(Instant::now, |duration| sleep(duration))?;
//! ```

use embassy_time::{Duration, Instant};
use heapless::Vec;

use crate::{
    OutputDriver,
    arbiter::ResourceArbiter,
    color::{BLACK, Rgb},
    config::CoreConfig,
    engine::EffectEngine,
    error::CoreError,
    frame_clock::FrameClock,
    health::{HealthMonitor, SourceId},
    shutdown::ShutdownSignal,
    station::StationTable,
    status::RenderStats,
    trigger::CommandReceiver,
};

/// Heartbeat source of the frame clock
pub const FRAME_CLOCK_SOURCE: &str = "frame_clock";

/// Breaker-guarded source of the LED frame write
pub const LED_WRITE_SOURCE: &str = "led_write";

/// Shared collaborators of the render loop
#[derive(Clone, Copy)]
pub struct RenderContext<'a, const N: usize> {
    pub stations: &'a StationTable<N>,
    pub arbiter: &'a ResourceArbiter,
    pub monitor: &'a HealthMonitor<'a>,
    pub shutdown: &'a ShutdownSignal,
}

/// Result of one rendered frame
#[derive(Debug, Clone, Copy)]
pub struct FrameOutcome {
    pub tick: u64,
    /// The frame reached the driver
    pub written: bool,
    /// Ticks dropped by lossy catch-up before this frame
    pub skipped: u64,
    pub safe_state: bool,
    /// The deadline for the next frame.
    pub next_deadline: Instant,
    /// How long to wait until the next frame (may be zero if behind schedule).
    pub sleep_duration: Duration,
}

pub struct RenderLoop<'a, D: OutputDriver, const N: usize, const Q: usize> {
    clock: FrameClock,
    engine: EffectEngine<'a, N, Q>,
    driver: D,
    context: RenderContext<'a, N>,
    clock_source: SourceId,
    write_source: SourceId,
    stats: RenderStats,
    stopped: bool,
}

impl<'a, D: OutputDriver, const N: usize, const Q: usize> RenderLoop<'a, D, N, Q> {
    /// Create the loop and register its heartbeat sources with the monitor
    pub fn new(
        config: &CoreConfig,
        commands: CommandReceiver<'a, Q>,
        driver: D,
        context: RenderContext<'a, N>,
        now: Instant,
    ) -> Result<Self, CoreError> {
        let clock_source = context.monitor.register(FRAME_CLOCK_SOURCE, now)?;
        let write_source = context.monitor.register(LED_WRITE_SOURCE, now)?;

        Ok(Self {
            clock: FrameClock::new(config.clock),
            engine: EffectEngine::new(config.engine, commands),
            driver,
            context,
            clock_source,
            write_source,
            stats: RenderStats::default(),
            stopped: false,
        })
    }

    /// Render one frame.
    ///
    /// Returns `ShutdownRequested` once the shutdown signal is raised; by
    /// then the effects are cleared, a blank frame has been written and every
    /// lease of the render owner is released.
    pub fn tick(&mut self, now: Instant) -> Result<FrameOutcome, CoreError> {
        if self.context.shutdown.is_requested() {
            self.shutdown(now);
            return Err(CoreError::ShutdownRequested);
        }

        let monitor = self.context.monitor;
        let info = self.clock.tick(now);
        monitor.heartbeat(self.clock_source, info.tick, now);
        monitor.report_degraded(self.clock_source, info.degraded);

        let snapshot = self.context.stations.snapshot();
        let safe = monitor.safe_state();
        self.engine.advance(info.tick, &snapshot, safe);

        let arbiter = self.context.arbiter;
        let engine = &self.engine;
        let driver = &mut self.driver;
        let written = match monitor.guard(self.write_source, info.tick, now, || {
            engine.present(arbiter, driver, now)
        }) {
            Ok(()) => true,
            Err(err) if err.is_recoverable() => {
                log::debug!("tick {}: frame write skipped: {}", info.tick, err);
                self.stats.skipped_writes = self.stats.skipped_writes.saturating_add(1);
                false
            }
            Err(err) => return Err(err),
        };

        let frame_stats = self.clock.stats();
        let engine_stats = self.engine.stats();
        self.stats.tick = info.tick;
        self.stats.frames = self.stats.frames.saturating_add(1);
        self.stats.measured_fps = frame_stats.measured_fps;
        self.stats.skipped_ticks = frame_stats.skipped_ticks;
        self.stats.late_frames = frame_stats.late_frames;
        self.stats.active_effects = engine_stats.running;
        self.stats.fallback_stations = engine_stats.fallback_stations;
        self.stats.degraded = info.degraded;
        monitor.publish_render(self.stats);

        Ok(FrameOutcome {
            tick: info.tick,
            written,
            skipped: info.skipped,
            safe_state: safe.active,
            next_deadline: info.next_deadline,
            sleep_duration: info.sleep_duration,
        })
    }

    /// Drive the loop until shutdown.
    ///
    /// `now` reads the platform clock and `sleep` waits between frames.
    pub fn run(
        &mut self,
        mut now: impl FnMut() -> Instant,
        mut sleep: impl FnMut(Duration),
    ) -> Result<(), CoreError> {
        loop {
            match self.tick(now()) {
                Ok(outcome) => sleep(outcome.sleep_duration),
                Err(CoreError::ShutdownRequested) => return Ok(()),
                Err(err) => return Err(err),
            }
        }
    }

    fn shutdown(&mut self, now: Instant) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        self.engine.clear();

        let config = *self.engine.config();
        let mut blank: Vec<Rgb, N> = Vec::new();
        for _ in 0..self.context.stations.len().min(N) {
            let _ = blank.push(BLACK);
        }

        match self
            .context
            .arbiter
            .acquire_at(config.led_channel, config.owner, now, config.write_timeout)
        {
            Ok(_lease) => {
                if let Err(err) = self.driver.write(&blank) {
                    log::warn!("blank frame on shutdown failed: {}", err);
                }
            }
            Err(err) => log::warn!("blank frame on shutdown skipped: {}", err),
        }

        let released = self.context.arbiter.release_owner(config.owner);
        // No lease of any owner outlives the loop
        let forced = self.context.arbiter.force_release_all();
        log::info!(
            "render loop stopped after {} frames, {} lease(s) released",
            self.stats.frames,
            released + forced
        );
    }

    pub fn engine(&self) -> &EffectEngine<'a, N, Q> {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut EffectEngine<'a, N, Q> {
        &mut self.engine
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub const fn stats(&self) -> RenderStats {
        self.stats
    }
}
