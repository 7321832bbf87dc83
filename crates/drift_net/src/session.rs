//! One viewport: pool, integrator, registry and exchange bound to one store
//! handle, driven by the render tick, the poll timer and store notifications.
//!
//! All three triggers run on the session's own task, so each handler runs to
//! completion before the next starts and the pool is never shared.

use crate::edge::ViewportExtent;
use crate::exchange::{Exchange, ExchangeConfig, ImportOutcome, ScanReport};
use crate::registry::{WindowRect, WindowRegistry};
use crate::store::{PeerStore, SharedStore, StoreEvent, StoreSubscription};
use crate::WindowId;
use drift_core::noise::NoiseField;
use drift_core::physics::{Integrator, SceneBounds, TickSummary};
use drift_core::pool::{ParticlePool, PoolConfig};
use drift_core::render::RenderDriver;
use drift_core::time::{SimulationClock, TICK_DURATION};
use drift_metrics::{ExchangeStats, TickTimer};
use drift_services::settings::{Settings, WindowSettings};
use drift_services::ViewportEvent;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

/// Ticks averaged by the session's tick timer.
const TIMER_WINDOW: usize = 120;

/// What a session did over its lifetime.
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub window: WindowId,
    pub title: String,
    pub ticks: u64,
    pub stats: ExchangeStats,
    pub avg_tick_ms: f64,
    pub max_tick_ms: f64,
}

pub struct ViewportSession {
    title: String,
    pool: ParticlePool,
    integrator: Integrator,
    clock: SimulationClock,
    registry: WindowRegistry,
    exchange: Exchange,
    changes: StoreSubscription,
    poll_interval: Duration,
    timer: TickTimer,
}

impl ViewportSession {
    pub fn new(settings: &Settings, window: &WindowSettings, store: SharedStore) -> Self {
        let sim = &settings.simulation;
        let id = store.origin();
        let extent = ViewportExtent::from_half_extent(sim.half_extent);

        let pool = ParticlePool::new(PoolConfig {
            capacity: sim.particle_count,
            half_extent: sim.half_extent,
            floor_y: sim.floor_y,
            sea_level: sim.sea_level,
            seed: sim.seed ^ id.0,
        });
        // Every viewport samples the same field.
        let integrator = Integrator::new(
            NoiseField::new(sim.seed),
            sim.gravity,
            sim.noise_amplitude,
            SceneBounds {
                half_extent: sim.half_extent,
                floor_y: sim.floor_y,
            },
        );
        let registry = WindowRegistry::new(
            store.clone(),
            window.title.clone(),
            WindowRect {
                x: window.x,
                y: window.y,
                width: window.width,
                height: window.height,
            },
            extent,
            settings.exchange.adjacency_tolerance_px,
        );
        let exchange = Exchange::new(
            store.clone(),
            ExchangeConfig {
                extent,
                edge_threshold: settings.exchange.edge_threshold,
                compress: settings.exchange.compress,
            },
        );

        Self {
            title: window.title.clone(),
            pool,
            integrator,
            clock: SimulationClock::new(sim.time_scale),
            registry,
            exchange,
            changes: store.subscribe(),
            poll_interval: Duration::from_millis(settings.exchange.poll_interval_ms),
            timer: TickTimer::new(TIMER_WINDOW),
        }
    }

    pub fn id(&self) -> WindowId {
        self.registry.id()
    }

    pub fn pool(&self) -> &ParticlePool {
        &self.pool
    }

    pub fn pool_mut(&mut self) -> &mut ParticlePool {
        &mut self.pool
    }

    pub fn registry(&self) -> &WindowRegistry {
        &self.registry
    }

    pub fn exchange(&self) -> &Exchange {
        &self.exchange
    }

    /// Announce this window's geometry.
    pub fn start(&mut self) {
        self.handle_viewport_event(ViewportEvent::Loaded);
    }

    pub fn handle_viewport_event(&mut self, event: ViewportEvent) {
        if let Err(err) = self.registry.handle_event(event) {
            tracing::warn!(window = %self.id(), ?event, %err, "failed to publish window geometry");
        }
    }

    /// Advance one frame using wall-clock field time.
    pub fn tick(&mut self) -> TickSummary {
        let field_time = self.clock.field_time();
        self.tick_at(field_time)
    }

    /// Advance one frame at an explicit field time.
    pub fn tick_at(&mut self, field_time: f32) -> TickSummary {
        self.timer.begin();
        let summary = self
            .integrator
            .tick(&mut self.pool, field_time, &mut self.exchange);
        self.timer.end();
        self.clock.advance_tick();
        summary
    }

    pub fn poll(&mut self) -> ScanReport {
        self.exchange.scan(&self.registry, &mut self.pool)
    }

    pub fn handle_store_event(&mut self, event: &StoreEvent) -> Option<ImportOutcome> {
        self.exchange
            .on_store_event(event, &self.registry, &mut self.pool)
    }

    /// Handle every notification already queued. Returns how many there were.
    pub fn drain_store_events(&mut self) -> usize {
        let mut handled = 0;
        while let Some(event) = self.changes.try_recv() {
            self.handle_store_event(&event);
            handled += 1;
        }
        handled
    }

    pub fn report(&self) -> SessionReport {
        SessionReport {
            window: self.id(),
            title: self.title.clone(),
            ticks: self.clock.tick_count(),
            stats: self.exchange.stats().clone(),
            avg_tick_ms: self.timer.tick_time_ms(),
            max_tick_ms: self.timer.max_ms(),
        }
    }

    /// Run until `shutdown` flips to `true` or its sender goes away.
    pub async fn run<D: RenderDriver + ?Sized>(
        mut self,
        driver: &mut D,
        mut shutdown: watch::Receiver<bool>,
    ) -> SessionReport {
        self.start();

        let mut frame = tokio::time::interval(TICK_DURATION);
        frame.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut poll = tokio::time::interval(self.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            window = %self.id(),
            title = %self.title,
            particles = self.pool.len(),
            "viewport running"
        );

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = frame.tick() => {
                    self.tick();
                    self.pool.flush_to(driver);
                }
                _ = poll.tick() => {
                    self.poll();
                }
                event = self.changes.recv() => match event {
                    Some(event) => {
                        self.handle_store_event(&event);
                    }
                    None => {
                        tracing::warn!(window = %self.id(), "store closed");
                        break;
                    }
                },
            }
        }

        let report = self.report();
        tracing::info!(window = %report.window, ticks = report.ticks, "viewport stopped");
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use drift_core::math::Vec3;
    use std::sync::Arc;

    fn settings(particles: usize) -> Settings {
        let mut settings = Settings::default();
        settings.simulation.particle_count = particles;
        settings
    }

    fn session(store: &Arc<MemoryStore>, settings: &Settings, index: usize, id: u64) -> ViewportSession {
        let handle: SharedStore = Arc::new(store.connect(WindowId(id)));
        ViewportSession::new(settings, &settings.windows.0[index], handle)
    }

    #[test]
    fn right_exit_reenters_the_right_neighbour() {
        let store = Arc::new(MemoryStore::new(1 << 20));
        let settings = settings(1);
        let mut left = session(&store, &settings, 0, 1);
        let mut right = session(&store, &settings, 1, 2);
        left.start();
        right.start();
        // Left's geometry record.
        assert_eq!(right.drain_store_events(), 1);

        // Past the right edge by more than one noise step, mid-height.
        left.pool_mut().set(0, Vec3::new(2.7, 0.0, 0.0), 0.0);
        right.pool_mut().release(0);

        let summary = left.tick_at(0.0);
        assert_eq!(summary.published, 1);
        assert!(!left.pool().is_alive(0));

        assert_eq!(right.drain_store_events(), 1);
        assert!(right.pool().is_alive(0));
        assert_eq!(right.pool().position(0).x, -2.5);

        // The message is gone, so the poll finds nothing.
        assert_eq!(right.poll().scanned, 0);
    }

    #[test]
    fn poll_recovers_missed_notifications() {
        let store = Arc::new(MemoryStore::new(1 << 20));
        let settings = settings(1);
        let mut left = session(&store, &settings, 0, 1);
        let mut right = session(&store, &settings, 1, 2);
        left.start();
        right.start();

        left.pool_mut().set(0, Vec3::new(2.7, 0.0, 0.0), 0.0);
        left.tick_at(0.0);
        // No dead slot yet: the notification is handled but cannot land.
        right.pool_mut().set(0, Vec3::ZERO, 0.0);
        right.drain_store_events();
        assert!(right.pool().is_alive(0));
        assert_eq!(right.poll().scanned, 0, "saturated import still consumes the message");

        left.pool_mut().set(0, Vec3::new(2.7, 0.0, 0.0), 0.0);
        left.tick_at(0.0);
        right.pool_mut().release(0);
        // Skip the notification and rely on the scan.
        assert_eq!(right.poll().imported, 1);
        right.drain_store_events();
        assert_eq!(right.pool().position(0).x, -2.5);
    }

    #[test]
    fn particles_fall_into_the_window_below() {
        let store = Arc::new(MemoryStore::new(1 << 20));
        let mut settings = settings(1);
        settings.windows.0[1].x = 0.0;
        settings.windows.0[1].y = 600.0;
        let mut upper = session(&store, &settings, 0, 1);
        let mut lower = session(&store, &settings, 1, 2);
        upper.start();
        lower.start();
        lower.pool_mut().release(0);

        upper.pool_mut().set(0, Vec3::new(0.5, -2.7, 1.0), -0.01);
        assert_eq!(upper.tick_at(0.0).published, 1);

        assert_eq!(lower.poll().imported, 1);
        let landed = lower.pool().position(0);
        assert_eq!(landed.y, 2.5);
        assert_eq!(landed.z, 0.0);
    }

    #[test]
    fn only_the_bordering_window_imports() {
        let store = Arc::new(MemoryStore::new(1 << 20));
        let mut settings = settings(1);
        settings.windows.0.push(WindowSettings {
            title: "Drift 3".into(),
            x: 1600.0,
            ..settings.windows.0[1].clone()
        });
        let mut left = session(&store, &settings, 0, 1);
        let mut middle = session(&store, &settings, 1, 2);
        let mut right = session(&store, &settings, 2, 3);
        for s in [&mut left, &mut middle, &mut right] {
            s.start();
            s.pool_mut().release(0);
        }

        // Out of the middle window's left side.
        middle.pool_mut().set(0, Vec3::new(-2.7, 0.0, 0.0), 0.0);
        middle.tick_at(0.0);

        assert_eq!(right.poll().imported, 0);
        assert_eq!(left.poll().imported, 1);
        assert_eq!(left.pool().position(0).x, 2.5);
        assert!(!right.pool().is_alive(0));
    }

    #[test]
    fn resize_republishes_geometry() {
        let store = Arc::new(MemoryStore::new(1 << 20));
        let settings = settings(1);
        let mut s = session(&store, &settings, 0, 1);
        s.start();
        s.handle_viewport_event(ViewportEvent::Resized {
            width: 1024.0,
            height: 768.0,
        });
        assert_eq!(s.registry().published().unwrap().width, 1024.0);
    }

    #[tokio::test]
    async fn run_stops_on_shutdown() {
        let store = Arc::new(MemoryStore::new(1 << 20));
        let settings = settings(64);
        let (tx, rx) = watch::channel(false);

        struct Frames(usize);
        impl RenderDriver for Frames {
            fn upload(&mut self, _positions: &[f32], _velocities: &[f32]) {
                self.0 += 1;
            }
        }

        let handles: Vec<_> = (0..2)
            .map(|i| {
                let s = session(&store, &settings, i, 10 + i as u64);
                let rx = rx.clone();
                tokio::spawn(async move {
                    let mut frames = Frames(0);
                    let report = s.run(&mut frames, rx).await;
                    (report, frames.0)
                })
            })
            .collect();

        tokio::time::sleep(Duration::from_millis(200)).await;
        tx.send(true).unwrap();

        for handle in handles {
            let (report, frames) = handle.await.unwrap();
            assert!(report.ticks > 0);
            assert!(frames > 0);
        }
    }
}
