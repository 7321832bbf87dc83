//! Simulation time
//!
//! Fixed 60Hz render tick plus the slowly advancing field time that animates
//! the noise field.

use std::time::{Duration, Instant};

/// Render tick rate (60 Hz = 16.666ms per tick)
pub const TICK_RATE_HZ: u32 = 60;
pub const TICK_DURATION: Duration = Duration::from_micros(16_666); // ~16.666ms

/// Field time advanced per elapsed millisecond.
pub const DEFAULT_TIME_SCALE: f32 = 0.0002;

/// Simulation time tracker
pub struct SimulationClock {
    tick_count: u64,
    started: Instant,
    time_scale: f32,
}

impl SimulationClock {
    pub fn new(time_scale: f32) -> Self {
        Self {
            tick_count: 0,
            started: Instant::now(),
            time_scale,
        }
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn advance_tick(&mut self) {
        self.tick_count += 1;
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Field time for the current wall-clock instant.
    pub fn field_time(&self) -> f32 {
        self.field_time_at(self.elapsed())
    }

    /// Field time after `elapsed` wall-clock time.
    pub fn field_time_at(&self, elapsed: Duration) -> f32 {
        (elapsed.as_secs_f64() * 1000.0 * self.time_scale as f64) as f32
    }
}

impl Default for SimulationClock {
    fn default() -> Self {
        Self::new(DEFAULT_TIME_SCALE)
    }
}
