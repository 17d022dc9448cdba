//! Frame clock and pacing.
//!
//! Portable frame pacing without async/await or platform-specific timers.
//! The caller is responsible for sleeping/waiting between frames.
//!
//! Ticks are a monotonically increasing frame counter. When the loop falls
//! behind by more than two frames the backlog is skipped: the tick counter
//! jumps forward by the number of whole frames missed and the deadline is
//! reset to now. Catch-up is lossy, never a burst.

use embassy_time::{Duration, Instant};

use crate::config::ClockConfig;

/// Length of the window used for FPS measurement
const STATS_WINDOW: Duration = Duration::from_secs(1);

/// Measured rate below this share of the target is logged (percent)
const LOW_FPS_PERCENT: u32 = 80;

/// Result of a frame tick.
#[derive(Debug, Clone, Copy)]
pub struct TickInfo {
    /// Frame counter for this tick
    pub tick: u64,
    /// Ticks dropped by drift correction just before this one
    pub skipped: u64,
    /// The deadline for the next frame.
    pub next_deadline: Instant,
    /// How long to wait until the next frame (may be zero if behind schedule).
    pub sleep_duration: Duration,
    /// The clock has been late for `max_late_frames` consecutive frames
    pub degraded: bool,
}

/// Frame rate statistics over the latest full window
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub measured_fps: u32,
    pub late_frames: u32,
    pub skipped_ticks: u64,
}

/// Single authoritative tick source of the render loop
///
/// # Usage
///
/// ```ignore
/// let mut clock = FrameClock::new(ClockConfig::default());
///
/// loop {
///     let info = clock.tick(Instant::now());
///     render(info.tick);
///
///     // Platform-specific sleep
///     sleep(info.sleep_duration);
/// }
/// ```
pub struct FrameClock {
    config: ClockConfig,
    frame_duration: Duration,
    next_frame: Option<Instant>,
    tick: u64,
    late_streak: u32,
    stats: FrameStats,
    window_start: Instant,
    window_frames: u32,
}

impl FrameClock {
    pub fn new(config: ClockConfig) -> Self {
        Self {
            config,
            frame_duration: config.frame_duration(),
            next_frame: None,
            tick: 0,
            late_streak: 0,
            stats: FrameStats::default(),
            window_start: Instant::from_ticks(0),
            window_frames: 0,
        }
    }

    pub const fn frame_duration(&self) -> Duration {
        self.frame_duration
    }

    /// Tick the next call to [`Self::tick`] will hand out, ignoring skips
    pub const fn current_tick(&self) -> u64 {
        self.tick
    }

    pub const fn stats(&self) -> FrameStats {
        self.stats
    }

    pub const fn is_degraded(&self) -> bool {
        self.late_streak >= self.config.max_late_frames
    }

    /// Produce the tick for a frame starting at `now`.
    ///
    /// The first call starts the schedule at `now` and yields tick 0.
    pub fn tick(&mut self, now: Instant) -> TickInfo {
        let deadline = match self.next_frame {
            Some(deadline) => deadline,
            None => {
                self.window_start = now;
                now
            }
        };

        // Drift correction: if we've fallen too far behind, skip the backlog
        let max_drift = self.frame_duration * 2;
        let mut skipped = 0;
        if now > deadline + max_drift {
            let behind = now.saturating_duration_since(deadline);
            skipped = behind.as_ticks() / self.frame_duration.as_ticks().max(1);
            self.tick = self.tick.saturating_add(skipped);
            self.next_frame = Some(now);
            self.late_streak = self.late_streak.saturating_add(1);
            self.stats.late_frames = self.stats.late_frames.saturating_add(1);
            self.stats.skipped_ticks = self.stats.skipped_ticks.saturating_add(skipped);
            log::debug!(
                "frame clock behind by {} ms, skipped {} ticks",
                behind.as_millis(),
                skipped
            );
        } else {
            self.late_streak = 0;
        }

        let tick = self.tick;
        self.tick = self.tick.saturating_add(1);
        self.measure(now);

        let next = self.next_frame.unwrap_or(now) + self.frame_duration;
        self.next_frame = Some(next);

        let sleep_duration = if next > now {
            next - now
        } else {
            Duration::from_ticks(0)
        };

        TickInfo {
            tick,
            skipped,
            next_deadline: next,
            sleep_duration,
            degraded: self.is_degraded(),
        }
    }

    fn measure(&mut self, now: Instant) {
        self.window_frames = self.window_frames.saturating_add(1);
        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed < STATS_WINDOW {
            return;
        }

        let fps = u64::from(self.window_frames) * 1_000_000 / elapsed.as_micros().max(1);
        self.stats.measured_fps = u32::try_from(fps).unwrap_or(u32::MAX);
        let floor = self.config.fps.saturating_mul(LOW_FPS_PERCENT) / 100;
        if self.stats.measured_fps < floor {
            log::warn!(
                "low frame rate: {} FPS (target {})",
                self.stats.measured_fps,
                self.config.fps
            );
        }
        self.window_start = now;
        self.window_frames = 0;
    }
}
