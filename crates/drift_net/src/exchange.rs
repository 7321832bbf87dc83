//! Cross-viewport exchange protocol
//!
//! A particle crossing the viewport boundary moves through
//! `LIVE -> EXIT_CANDIDATE -> {PUBLISHED | DROPPED} -> [IMPORTED | EXPIRED]`:
//!
//! - EXIT_CANDIDATE: the integrator reported it outside the cube.
//! - DROPPED: no edge matched, or the store rejected the write. Not retried.
//! - PUBLISHED: written under a fresh `particleExit…` key.
//! - IMPORTED: a bordering viewport claimed the key and placed the particle.
//! - EXPIRED: nobody borders that edge; the entry stays in the store.
//!
//! Imports run from two paths that share one decision: the periodic scan and
//! store change notifications. Claiming goes through
//! [`PeerStore::try_claim`], so a message is imported at most once overall.

use crate::codec::{ExitKeys, ExitMessage, MessageCodec};
use crate::edge::{classify_exit, Edge, ViewportExtent};
use crate::error::StoreError;
use crate::registry::WindowRegistry;
use crate::store::{PeerStore, SharedStore, StoreEvent};
use crate::{WindowId, EXIT_PREFIX};
use drift_core::math::Vec3;
use drift_core::physics::{ExitSink, Handoff};
use drift_core::pool::ParticlePool;
use drift_metrics::{ExchangeEvent, ExchangeStats};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExchangeConfig {
    pub extent: ViewportExtent,
    pub edge_threshold: f32,
    pub compress: bool,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            extent: ViewportExtent::from_half_extent(2.5),
            edge_threshold: 0.1,
            compress: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Left through a corner or the depth axis.
    NoEdge,
    /// The store refused the write.
    StoreRejected,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExitOutcome {
    Published { key: String, edge: Edge },
    Dropped(DropReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportOutcome {
    Imported { slot: usize },
    OwnMessage,
    NotAdjacent,
    /// Another viewport claimed it first.
    AlreadyClaimed,
    /// Claimed, but no dead slot was free; the particle is lost.
    PoolSaturated,
    Malformed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub scanned: usize,
    pub imported: usize,
}

pub struct Exchange {
    window: WindowId,
    store: SharedStore,
    codec: MessageCodec,
    keys: ExitKeys,
    config: ExchangeConfig,
    stats: ExchangeStats,
    store_full: bool,
}

impl Exchange {
    pub fn new(store: SharedStore, config: ExchangeConfig) -> Self {
        let window = store.origin();
        Self {
            window,
            store,
            codec: MessageCodec::new(config.compress),
            keys: ExitKeys::new(window),
            config,
            stats: ExchangeStats::new(),
            store_full: false,
        }
    }

    pub fn window(&self) -> WindowId {
        self.window
    }

    pub fn stats(&self) -> &ExchangeStats {
        &self.stats
    }

    /// Classify, encode and publish one exiting particle.
    pub fn publish_exit(&mut self, position: Vec3, velocity: f32) -> ExitOutcome {
        let Some(edge) = classify_exit(
            position.x,
            position.y,
            self.config.extent,
            self.config.edge_threshold,
        ) else {
            self.stats.record(ExchangeEvent::DroppedNoEdge);
            tracing::trace!(?position, "exit matched no edge");
            return ExitOutcome::Dropped(DropReason::NoEdge);
        };

        let message = ExitMessage {
            position: position.to_array(),
            velocity,
            edge,
            source: self.window,
        };
        let key = self.keys.next_key();
        let written = self
            .codec
            .encode(&message)
            .map_err(|err| StoreError::Encode {
                key: key.clone(),
                reason: err.to_string(),
            })
            .and_then(|payload| self.store.put(&key, payload));

        match written {
            Ok(()) => {
                if self.store_full {
                    self.store_full = false;
                    tracing::info!(window = %self.window, "store accepting exits again");
                }
                self.stats.record(ExchangeEvent::Published);
                tracing::debug!(%edge, %key, "particle exited");
                ExitOutcome::Published { key, edge }
            }
            Err(err) => {
                self.stats.record(ExchangeEvent::DroppedStoreFull);
                if !self.store_full {
                    self.store_full = true;
                    tracing::warn!(window = %self.window, %err, "store rejected exit, dropping until it has room");
                } else {
                    tracing::trace!(%err, "exit dropped");
                }
                ExitOutcome::Dropped(DropReason::StoreRejected)
            }
        }
    }

    /// The import decision for one stored message.
    pub fn try_import(
        &mut self,
        key: &str,
        payload: &str,
        registry: &WindowRegistry,
        pool: &mut ParticlePool,
    ) -> ImportOutcome {
        let outcome = self.decide(key, payload, registry, pool);
        match outcome {
            ImportOutcome::Imported { .. } => self.stats.record(ExchangeEvent::Imported),
            ImportOutcome::NotAdjacent => self.stats.record(ExchangeEvent::NotAdjacent),
            ImportOutcome::AlreadyClaimed => self.stats.record(ExchangeEvent::ClaimLost),
            ImportOutcome::PoolSaturated => self.stats.record(ExchangeEvent::PoolSaturated),
            ImportOutcome::Malformed => self.stats.record(ExchangeEvent::Malformed),
            ImportOutcome::OwnMessage => {}
        }
        outcome
    }

    fn decide(
        &self,
        key: &str,
        payload: &str,
        registry: &WindowRegistry,
        pool: &mut ParticlePool,
    ) -> ImportOutcome {
        let message = match self.codec.decode(payload) {
            Ok(message) => message,
            Err(err) => {
                // Left in place: it may belong to a newer peer.
                tracing::debug!(key, %err, "skipping malformed exit message");
                return ImportOutcome::Malformed;
            }
        };

        if message.source == self.window {
            return ImportOutcome::OwnMessage;
        }
        if !registry.accepts_from(message.source, message.edge) {
            return ImportOutcome::NotAdjacent;
        }

        let entry = registry.entry_position(message.edge, Vec3::from_array(message.position));
        if self.store.try_claim(key).is_none() {
            tracing::trace!(key, "exit already claimed");
            return ImportOutcome::AlreadyClaimed;
        }

        match pool.import_into(entry, message.velocity) {
            Some(slot) => {
                tracing::debug!(key, edge = %message.edge, slot, "imported particle");
                ImportOutcome::Imported { slot }
            }
            None => {
                tracing::debug!(key, "pool saturated, claimed particle lost");
                ImportOutcome::PoolSaturated
            }
        }
    }

    /// Periodic scan over every pending exit message.
    pub fn scan(&mut self, registry: &WindowRegistry, pool: &mut ParticlePool) -> ScanReport {
        let mut report = ScanReport::default();
        for key in self.store.list(EXIT_PREFIX) {
            // Claimed by someone else between list and get.
            let Some(payload) = self.store.get(&key) else {
                continue;
            };
            report.scanned += 1;
            if let ImportOutcome::Imported { .. } = self.try_import(&key, &payload, registry, pool) {
                report.imported += 1;
            }
        }
        if report.imported > 0 {
            tracing::debug!(window = %self.window, ?report, "scan imported particles");
        }
        report
    }

    /// Reactive path: a peer wrote or removed a key.
    pub fn on_store_event(
        &mut self,
        event: &StoreEvent,
        registry: &WindowRegistry,
        pool: &mut ParticlePool,
    ) -> Option<ImportOutcome> {
        if !event.key.starts_with(EXIT_PREFIX) {
            return None;
        }
        let payload = event.value.as_deref()?;
        Some(self.try_import(&event.key, payload, registry, pool))
    }
}

impl ExitSink for Exchange {
    fn on_exit(&mut self, position: Vec3, velocity: f32) -> Handoff {
        match self.publish_exit(position, velocity) {
            ExitOutcome::Published { .. } => Handoff::Published,
            ExitOutcome::Dropped(_) => Handoff::Dropped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{WindowRect, DEFAULT_ADJACENCY_TOLERANCE};
    use crate::store::MemoryStore;
    use drift_core::pool::PoolConfig;
    use std::sync::Arc;

    struct Viewport {
        exchange: Exchange,
        registry: WindowRegistry,
        pool: ParticlePool,
    }

    fn viewport(store: &Arc<MemoryStore>, id: u64, x: f32, compress: bool) -> Viewport {
        let handle: SharedStore = Arc::new(store.connect(WindowId(id)));
        let config = ExchangeConfig {
            compress,
            ..ExchangeConfig::default()
        };
        let registry = WindowRegistry::new(
            Arc::clone(&handle),
            "Drift",
            WindowRect {
                x,
                y: 0.0,
                width: 800.0,
                height: 600.0,
            },
            config.extent,
            DEFAULT_ADJACENCY_TOLERANCE,
        );
        registry.publish().unwrap();
        let pool = ParticlePool::new(PoolConfig {
            capacity: 4,
            seed: id,
            ..PoolConfig::default()
        });
        Viewport {
            exchange: Exchange::new(handle, config),
            registry,
            pool,
        }
    }

    impl Viewport {
        fn scan(&mut self) -> ScanReport {
            self.exchange.scan(&self.registry, &mut self.pool)
        }
    }

    #[test]
    fn corner_and_depth_exits_are_dropped() {
        let store = Arc::new(MemoryStore::new(1 << 16));
        let mut a = viewport(&store, 1, 0.0, false);
        let outcome = a.exchange.publish_exit(Vec3::new(0.0, 0.0, 2.6), 0.0);
        assert_eq!(outcome, ExitOutcome::Dropped(DropReason::NoEdge));
        assert!(a.exchange.store.list(EXIT_PREFIX).is_empty());
    }

    #[test]
    fn quota_failure_drops_without_retry() {
        // Room for the window record only.
        let store = Arc::new(MemoryStore::new(160));
        let mut a = viewport(&store, 1, 0.0, false);
        let outcome = a.exchange.publish_exit(Vec3::new(2.6, 0.0, 0.0), -0.1);
        assert_eq!(outcome, ExitOutcome::Dropped(DropReason::StoreRejected));
        assert_eq!(a.exchange.on_exit(Vec3::new(2.6, 0.0, 0.0), -0.1), Handoff::Dropped);
        assert!(a.exchange.store.list(EXIT_PREFIX).is_empty());
    }

    #[test]
    fn bordering_viewport_imports_and_deletes() {
        let store = Arc::new(MemoryStore::new(1 << 16));
        let mut a = viewport(&store, 1, 0.0, true);
        let mut b = viewport(&store, 2, 800.0, true);
        b.pool.release(1);

        let outcome = a.exchange.publish_exit(Vec3::new(2.6, 0.4, 1.0), -0.02);
        assert!(matches!(outcome, ExitOutcome::Published { edge: Edge::Right, .. }));

        // The publisher never imports its own exits.
        assert_eq!(a.scan().imported, 0);

        let report = b.scan();
        assert_eq!(report, ScanReport { scanned: 1, imported: 1 });
        assert_eq!(b.pool.position(1), Vec3::new(-2.5, 0.4, 0.0));
        assert_eq!(b.pool.velocity(1), -0.02);
        assert!(store.connect(WindowId(9)).list(EXIT_PREFIX).is_empty());
    }

    #[test]
    fn in_band_right_exit_lands_on_the_peers_left_boundary() {
        let store = Arc::new(MemoryStore::new(1 << 16));
        let mut a = viewport(&store, 1, 0.0, true);
        let mut b = viewport(&store, 2, 800.0, true);
        b.pool.release(3);

        // Inside the threshold band, not yet past the boundary.
        let x = a.exchange.config.extent.half_width() - 0.05;
        let outcome = a.exchange.publish_exit(Vec3::new(x, 0.2, 0.0), 0.0);
        assert!(matches!(outcome, ExitOutcome::Published { edge: Edge::Right, .. }));
        assert!(a.registry.is_edge_adjacent(Edge::Right));

        assert_eq!(b.scan().imported, 1);
        assert_eq!(b.pool.position(3), Vec3::new(-2.5, 0.2, 0.0));
    }

    #[test]
    fn top_entry_respects_a_raised_floor() {
        let store = Arc::new(MemoryStore::new(1 << 16));
        // `lower` sits below `upper` on screen; a top exit from `lower` enters
        // `upper` at its bottom boundary.
        let lower: SharedStore = Arc::new(store.connect(WindowId(1)));
        let upper: SharedStore = Arc::new(store.connect(WindowId(2)));
        let config = ExchangeConfig::default();
        let rect = |y| WindowRect {
            x: 0.0,
            y,
            width: 800.0,
            height: 600.0,
        };
        let lower_registry = WindowRegistry::new(
            Arc::clone(&lower),
            "lower",
            rect(600.0),
            config.extent,
            DEFAULT_ADJACENCY_TOLERANCE,
        );
        let upper_registry = WindowRegistry::new(
            Arc::clone(&upper),
            "upper",
            rect(0.0),
            config.extent,
            DEFAULT_ADJACENCY_TOLERANCE,
        );
        lower_registry.publish().unwrap();
        upper_registry.publish().unwrap();

        let mut source = Exchange::new(lower, config);
        let mut target = Exchange::new(upper, config);
        let mut pool = ParticlePool::new(PoolConfig {
            capacity: 2,
            floor_y: -1.0,
            ..PoolConfig::default()
        });
        pool.release(0);
        pool.release(1);

        source.publish_exit(Vec3::new(-0.7, 2.6, 0.0), 0.0);
        source.publish_exit(Vec3::new(0.4, 2.6, 0.0), 0.0);
        let report = target.scan(&upper_registry, &mut pool);

        assert_eq!(report.imported, 2);
        assert!(pool.is_alive(0) && pool.is_alive(1));
        assert_eq!(pool.dead_slots(), 0);
    }

    #[test]
    fn non_bordering_viewport_leaves_message() {
        let store = Arc::new(MemoryStore::new(1 << 16));
        let mut a = viewport(&store, 1, 0.0, false);
        let mut b = viewport(&store, 2, 800.0, false);
        b.pool.release(0);

        // `b` is to the right of `a`, so a left exit is not for it.
        a.exchange.publish_exit(Vec3::new(-2.6, 0.0, 0.0), 0.0);
        assert_eq!(b.scan().imported, 0);
        assert_eq!(store.connect(WindowId(9)).list(EXIT_PREFIX).len(), 1);
        assert!(!b.pool.is_alive(0));
    }

    #[test]
    fn saturated_pool_consumes_message_without_touching_slots() {
        let store = Arc::new(MemoryStore::new(1 << 16));
        let mut a = viewport(&store, 1, 0.0, false);
        let mut b = viewport(&store, 2, 800.0, false);
        let before = b.pool.positions().to_vec();

        let ExitOutcome::Published { key, .. } = a.exchange.publish_exit(Vec3::new(2.6, 0.0, 0.0), 0.0)
        else {
            panic!("expected publish");
        };
        let payload = store.connect(WindowId(9)).get(&key).unwrap();
        let outcome = b.exchange.try_import(&key, &payload, &b.registry, &mut b.pool);
        assert_eq!(outcome, ImportOutcome::PoolSaturated);
        assert_eq!(b.pool.positions(), &before[..]);
    }

    #[test]
    fn second_reader_loses_the_claim() {
        let store = Arc::new(MemoryStore::new(1 << 16));
        let mut a = viewport(&store, 1, 0.0, false);
        let mut b = viewport(&store, 2, 800.0, false);
        // A second window at the same spot as `b` also borders `a`.
        let mut c = viewport(&store, 3, 800.0, false);
        b.pool.release(0);
        c.pool.release(0);

        let ExitOutcome::Published { key, .. } = a.exchange.publish_exit(Vec3::new(2.6, 0.0, 0.0), 0.0)
        else {
            panic!("expected publish");
        };
        // Both read the payload before either claims it.
        let payload = store.connect(WindowId(9)).get(&key).unwrap();
        let first = b.exchange.try_import(&key, &payload, &b.registry, &mut b.pool);
        let second = c.exchange.try_import(&key, &payload, &c.registry, &mut c.pool);

        assert_eq!(first, ImportOutcome::Imported { slot: 0 });
        assert_eq!(second, ImportOutcome::AlreadyClaimed);
        assert!(!c.pool.is_alive(0));
    }

    #[test]
    fn store_events_drive_imports() {
        let store = Arc::new(MemoryStore::new(1 << 16));
        let mut a = viewport(&store, 1, 0.0, true);
        let mut b = viewport(&store, 2, 800.0, true);
        let mut feed = b.exchange.store.subscribe();
        b.pool.release(2);

        a.exchange.publish_exit(Vec3::new(2.7, -1.0, 0.0), -0.03);
        let event = feed.try_recv().unwrap();
        let outcome = b.exchange.on_store_event(&event, &b.registry, &mut b.pool);
        assert_eq!(outcome, Some(ImportOutcome::Imported { slot: 2 }));

        // The claim's own removal is not echoed back to `b`.
        assert!(feed.try_recv().is_none());
    }

    #[test]
    fn malformed_messages_are_skipped_not_fatal() {
        let store = Arc::new(MemoryStore::new(1 << 16));
        let mut a = viewport(&store, 1, 0.0, false);
        let mut b = viewport(&store, 2, 800.0, false);
        b.pool.release(0);

        store
            .connect(WindowId(7))
            .put("particleExit0-garbage", "{\"velocity\":".into())
            .unwrap();
        a.exchange.publish_exit(Vec3::new(2.6, 0.0, 0.0), 0.0);

        let report = b.scan();
        assert_eq!(report, ScanReport { scanned: 2, imported: 1 });
        assert!(b.pool.is_alive(0));
        assert_eq!(store.connect(WindowId(9)).list(EXIT_PREFIX), vec!["particleExit0-garbage"]);
    }
}
