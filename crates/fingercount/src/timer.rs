//! Performance measurement tools.

use std::{
    fmt::{self, Arguments},
    mem,
    sync::{Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};

use itertools::Itertools;

const EMA_ALPHA: f32 = 0.3;

/// A timer that can measure and average the time an operation takes.
///
/// Collected timings are averaged with an exponential moving average, and reset when the timer is
/// displayed using `{}` ([`std::fmt::Display`]).
pub struct Timer {
    name: &'static str,
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    /// The current average time in seconds. [`None`] until the first measurement.
    avg: Option<f32>,
    /// The number of time measurements that contributed to the current `avg`.
    count: usize,
}

impl Timer {
    /// Creates a new timer.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            state: Mutex::default(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Invokes a closure, measuring and recording the time it takes.
    pub fn time<T>(&self, timee: impl FnOnce() -> T) -> T {
        let _guard = self.start();
        timee()
    }

    /// Starts timing an operation using a drop guard.
    ///
    /// When the returned [`TimerGuard`] is dropped, the time between the call to `start` and the
    /// drop is measured and recorded.
    pub fn start(&self) -> TimerGuard<'_> {
        TimerGuard {
            start: Instant::now(),
            timer: self,
        }
    }

    fn stop(&self, start: Instant) {
        self.record(start.elapsed());
    }

    fn record(&self, duration: Duration) {
        let secs = duration.as_secs_f32();
        let mut state = self.state();
        state.avg = Some(match state.avg {
            Some(avg) => avg + EMA_ALPHA * (secs - avg),
            None => secs,
        });
        state.count += 1;
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Displays the average recorded time and resets it.
impl fmt::Display for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let State { avg, count } = mem::take(&mut *self.state());
        let avg_ms = avg.unwrap_or(0.0) * 1000.0;

        write!(f, "{}: {count}x{avg_ms:.01}ms", self.name)
    }
}

/// Cloning a timer resets its collected timings.
impl Clone for Timer {
    fn clone(&self) -> Self {
        Self::new(self.name)
    }
}

impl fmt::Debug for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timer").field("name", &self.name).finish()
    }
}

/// Guard returned by [`Timer::start`]. Stops timing the operation when dropped.
pub struct TimerGuard<'a> {
    start: Instant,
    timer: &'a Timer,
}

impl Drop for TimerGuard<'_> {
    fn drop(&mut self) {
        self.timer.stop(self.start);
    }
}

/// Logs frames per second with optional extra data.
pub struct FpsCounter {
    name: String,
    frames: u32,
    start: Instant,
}

impl FpsCounter {
    pub fn new<N: Into<String>>(name: N) -> Self {
        Self {
            name: name.into(),
            frames: 0,
            start: Instant::now(),
        }
    }

    /// Advances the frame counter by 1 and logs FPS and `extra` data if one second has passed.
    ///
    /// `extra` is only formatted when the log line is emitted, so displaying a [`Timer`] here
    /// resets it once per second.
    pub fn tick_with<D: fmt::Display, I: IntoIterator<Item = D>>(&mut self, extra: I) {
        let mut extra = extra.into_iter().peekable();
        if extra.peek().is_none() {
            self.tick_impl(format_args!(""));
        } else {
            self.tick_impl(format_args!(" ({})", extra.format(", ")));
        }
    }

    fn tick_impl(&mut self, args: Arguments<'_>) {
        self.frames += 1;
        if self.start.elapsed() > Duration::from_secs(1) {
            log::debug!("{}: {} FPS{}", self.name, self.frames, args);

            self.frames = 0;
            self.start = Instant::now();
        }
    }
}

/// Computes the instantaneous frame rate from the time between two consecutive frames.
#[derive(Debug, Clone, Default)]
pub struct FrameRate {
    prev: Option<Instant>,
}

impl FrameRate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a frame at `now` and returns `1 / (now - previous frame)`.
    ///
    /// Returns 0.0 for the first frame, and when no time has passed since the previous frame.
    pub fn tick(&mut self, now: Instant) -> f32 {
        let fps = match self.prev {
            Some(prev) => {
                let secs = now.saturating_duration_since(prev).as_secs_f32();
                if secs > 0.0 {
                    1.0 / secs
                } else {
                    0.0
                }
            }
            None => 0.0,
        };
        self.prev = Some(now);
        fps
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn frame_rate() {
        let start = Instant::now();
        let mut rate = FrameRate::new();
        assert_eq!(rate.tick(start), 0.0);
        assert_relative_eq!(rate.tick(start + Duration::from_millis(50)), 20.0, epsilon = 1e-3);
        assert_relative_eq!(rate.tick(start + Duration::from_millis(150)), 10.0, epsilon = 1e-3);
    }

    #[test]
    fn frame_rate_zero_interval() {
        let now = Instant::now();
        let mut rate = FrameRate::new();
        rate.tick(now);
        assert_eq!(rate.tick(now), 0.0);
        assert!(rate.tick(now + Duration::from_millis(1)).is_finite());
    }

    #[test]
    fn timer_display_resets() {
        let timer = Timer::new("infer");
        timer.record(Duration::from_millis(10));
        timer.record(Duration::from_millis(20));
        // 10 + 0.3 * (20 - 10)
        assert_eq!(timer.to_string(), "infer: 2x13.0ms");
        assert_eq!(timer.to_string(), "infer: 0x0.0ms");
    }

    #[test]
    fn timer_guard_records() {
        let timer = Timer::new("op");
        let value = timer.time(|| 42);
        assert_eq!(value, 42);
        assert!(timer.to_string().starts_with("op: 1x"));
    }
}
