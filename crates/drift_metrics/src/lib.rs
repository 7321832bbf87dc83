//! Drift Metrics - exchange counters and tick timing
//!
//! Zero-cost when the `metrics` feature is off: the same types exist as
//! no-op stubs so call sites never need `cfg` attributes.
//!
//! # Feature Flags
//!
//! - `metrics` - Enable metrics collection (default: disabled)
//!
//! # Usage
//!
//! ```ignore
//! use drift_metrics::{ExchangeEvent, ExchangeStats, TickTimer};
//!
//! let mut stats = ExchangeStats::new();
//! stats.record(ExchangeEvent::Published);
//!
//! let mut timer = TickTimer::new(120);
//! timer.begin();
//! // ... integrate ...
//! timer.end();
//! ```

#[cfg(feature = "metrics")]
mod exchange_stats;
#[cfg(feature = "metrics")]
mod tick_timer;

#[cfg(feature = "metrics")]
pub use exchange_stats::{ExchangeEvent, ExchangeStats};
#[cfg(feature = "metrics")]
pub use tick_timer::TickTimer;

// ============================================================================
// No-op stubs when metrics disabled
// ============================================================================

#[cfg(not(feature = "metrics"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeEvent {
    Published,
    DroppedNoEdge,
    DroppedStoreFull,
    Imported,
    NotAdjacent,
    ClaimLost,
    PoolSaturated,
    Malformed,
}

#[cfg(not(feature = "metrics"))]
impl ExchangeEvent {
    pub fn name(self) -> &'static str { "" }
}

#[cfg(not(feature = "metrics"))]
#[derive(Debug, Clone, Default)]
pub struct ExchangeStats;

#[cfg(not(feature = "metrics"))]
impl ExchangeStats {
    pub fn new() -> Self { Self }
    pub fn record(&mut self, _event: ExchangeEvent) {}
    pub fn get(&self, _event: ExchangeEvent) -> u64 { 0 }
    pub fn merge(&mut self, _other: &ExchangeStats) {}
    pub fn iter(&self) -> impl Iterator<Item = (ExchangeEvent, u64)> + '_ { std::iter::empty() }
}

#[cfg(not(feature = "metrics"))]
pub struct TickTimer;

#[cfg(not(feature = "metrics"))]
impl TickTimer {
    pub fn new(_capacity: usize) -> Self { Self }
    pub fn begin(&mut self) {}
    pub fn end(&mut self) {}
    pub fn push(&mut self, _sample: std::time::Duration) {}
    pub fn average(&self) -> std::time::Duration { std::time::Duration::ZERO }
    pub fn tick_time_ms(&self) -> f64 { 0.0 }
    pub fn max_ms(&self) -> f64 { 0.0 }
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_compiles_with_or_without_metrics() {
        let mut stats = super::ExchangeStats::new();
        stats.record(super::ExchangeEvent::Imported);
        let mut timer = super::TickTimer::new(60);
        timer.begin();
        timer.end();
    }
}
