// Frame timing: the scene clock driven by the redraw callback,
// and the periodic timer used by animated widgets.

use std::time::{Duration, Instant};

/// Wall-clock time since the scene started plus a once-per-second FPS sample.
pub struct FrameClock {
    start: Instant,
    last_frame: Instant,
    delta: f32,
    frames_this_window: u32,
    window_start: Instant,
    frame_time_min_ms: f32,
    frame_time_max_ms: f32,
}

/// Aggregated timing for the last completed one-second window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FpsSample {
    pub fps: u32,
    pub frame_time_avg_ms: f32,
    pub frame_time_min_ms: f32,
    pub frame_time_max_ms: f32,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    fn starting_at(now: Instant) -> Self {
        Self {
            start: now,
            last_frame: now,
            delta: 0.0,
            frames_this_window: 0,
            window_start: now,
            frame_time_min_ms: f32::MAX,
            frame_time_max_ms: 0.0,
        }
    }

    /// Record a frame. Returns a sample when a full second has passed since the last one.
    pub fn tick(&mut self) -> Option<FpsSample> {
        self.tick_at(Instant::now())
    }

    fn tick_at(&mut self, now: Instant) -> Option<FpsSample> {
        self.delta = (now - self.last_frame).as_secs_f32();
        self.last_frame = now;

        let ms = self.delta * 1000.0;
        self.frame_time_min_ms = self.frame_time_min_ms.min(ms);
        self.frame_time_max_ms = self.frame_time_max_ms.max(ms);
        self.frames_this_window += 1;

        let window = (now - self.window_start).as_secs_f32();
        if window < 1.0 {
            return None;
        }

        let sample = FpsSample {
            fps: self.frames_this_window,
            frame_time_avg_ms: window * 1000.0 / self.frames_this_window as f32,
            frame_time_min_ms: self.frame_time_min_ms,
            frame_time_max_ms: self.frame_time_max_ms,
        };
        self.frames_this_window = 0;
        self.window_start = now;
        self.frame_time_min_ms = f32::MAX;
        self.frame_time_max_ms = 0.0;
        Some(sample)
    }

    /// Seconds since the clock was created, as of the last tick.
    pub fn elapsed(&self) -> f32 {
        (self.last_frame - self.start).as_secs_f32()
    }

    /// Seconds between the last two ticks.
    pub fn delta(&self) -> f32 {
        self.delta
    }
}

/// Fires every `period` seconds of scene time until cancelled.
///
/// Driven from the frame clock rather than a background thread, so a fire
/// always happens inside a frame callback. After `cancel()` it never fires again.
#[derive(Debug, Clone)]
pub struct PeriodicTimer {
    period: f32,
    next_due: f32,
    cancelled: bool,
}

impl PeriodicTimer {
    /// First fire at `started_at + period`.
    pub fn new(period: Duration, started_at: f32) -> Self {
        let period = period.as_secs_f32();
        Self {
            period,
            next_due: started_at + period,
            cancelled: false,
        }
    }

    /// Number of periods that elapsed up to `now` since the previous poll.
    pub fn poll(&mut self, now: f32) -> u32 {
        if self.cancelled || self.period <= 0.0 {
            return 0;
        }
        let mut fired = 0;
        while now >= self.next_due {
            self.next_due += self.period;
            fired += 1;
        }
        fired
    }

    /// Fraction of the current period that has elapsed at `now`, in [0, 1].
    pub fn progress(&self, now: f32) -> f32 {
        if self.period <= 0.0 {
            return 0.0;
        }
        let start = self.next_due - self.period;
        ((now - start) / self.period).clamp(0.0, 1.0)
    }

    pub fn cancel(&mut self) {
        self.cancelled = true;
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}
