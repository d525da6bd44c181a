//! Time management utilities

use std::time::{Duration, Instant};

/// Largest frame delta reported by [`FrameTimer`], in seconds
///
/// Keeps controllers stable after a long stall such as a window drag or a
/// swapchain rebuild.
pub const DEFAULT_MAX_FRAME_TIME: f32 = 0.25;

/// Frame timer producing the elapsed time between ticks
pub struct FrameTimer {
    last_tick: Instant,
    delta_time: f32,
    total_time: f32,
    frame_count: u64,
    max_frame_time: f32,
}

impl Default for FrameTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameTimer {
    /// Create a new timer
    pub fn new() -> Self {
        Self::with_max_frame_time(DEFAULT_MAX_FRAME_TIME)
    }

    /// Create a timer with a custom clamp on the per-tick delta
    pub fn with_max_frame_time(max_frame_time: f32) -> Self {
        Self {
            last_tick: Instant::now(),
            delta_time: 0.0,
            total_time: 0.0,
            frame_count: 0,
            max_frame_time,
        }
    }

    /// Advance the timer (call once per tick) and return the clamped delta
    pub fn tick(&mut self) -> f32 {
        let now = Instant::now();
        self.advance(now.duration_since(self.last_tick));
        self.last_tick = now;
        self.delta_time
    }

    fn advance(&mut self, elapsed: Duration) {
        self.delta_time = elapsed.as_secs_f32().min(self.max_frame_time);
        self.total_time += self.delta_time;
        self.frame_count += 1;
    }

    /// Get the time since the last tick in seconds
    pub fn delta_time(&self) -> f32 {
        self.delta_time
    }

    /// Get the total elapsed time accumulated by ticks
    pub fn total_time(&self) -> f32 {
        self.total_time
    }

    /// Get the current tick count
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Get the average FPS since timer creation
    #[allow(clippy::cast_precision_loss)]
    pub fn average_fps(&self) -> f32 {
        if self.total_time > 0.0 {
            self.frame_count as f32 / self.total_time
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_delta_is_clamped() {
        let mut timer = FrameTimer::with_max_frame_time(0.1);
        timer.advance(Duration::from_secs(3));
        assert_relative_eq!(timer.delta_time(), 0.1);
        assert_eq!(timer.frame_count(), 1);
    }

    #[test]
    fn test_total_time_accumulates() {
        let mut timer = FrameTimer::new();
        timer.advance(Duration::from_millis(10));
        timer.advance(Duration::from_millis(20));
        assert_relative_eq!(timer.total_time(), 0.03, epsilon = 1e-6);
        assert_relative_eq!(timer.average_fps(), 2.0 / 0.03, epsilon = 1e-3);
    }
}
