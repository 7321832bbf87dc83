//! Window geometry registry
//!
//! Each viewport publishes its screen rectangle (pixels) to the shared store
//! and reads its peers' rectangles to decide which of them border a given
//! edge. Records are overwritten in place and never deleted, so a closed
//! window's record lingers until something overwrites it.

use crate::edge::{Edge, ViewportExtent};
use crate::error::StoreError;
use crate::store::{PeerStore, SharedStore};
use crate::{WindowId, WINDOW_PREFIX};
use drift_core::math::Vec3;
use drift_services::ViewportEvent;
use serde::{Deserialize, Serialize};

pub const DEFAULT_ADJACENCY_TOLERANCE: f32 = 100.0;

/// Screen rectangle in pixels, y growing downward.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Published geometry of one window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowRecord {
    pub id: WindowId,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub title: String,
}

impl WindowRecord {
    pub fn rect(&self) -> WindowRect {
        WindowRect {
            x: self.x,
            y: self.y,
            width: self.width,
            height: self.height,
        }
    }
}

pub fn window_key(id: WindowId) -> String {
    format!("{WINDOW_PREFIX}{id}")
}

/// Whether `other` lies beyond `edge` of `this`: strictly on that side along
/// the crossing axis and within `tolerance` pixels on the other axis.
pub fn is_adjacent(this: &WindowRect, other: &WindowRect, edge: Edge, tolerance: f32) -> bool {
    match edge {
        Edge::Left => other.x < this.x && (this.y - other.y).abs() <= tolerance,
        Edge::Right => other.x > this.x && (this.y - other.y).abs() <= tolerance,
        Edge::Top => other.y < this.y && (this.x - other.x).abs() <= tolerance,
        Edge::Bottom => other.y > this.y && (this.x - other.x).abs() <= tolerance,
    }
}

pub struct WindowRegistry {
    id: WindowId,
    title: String,
    rect: WindowRect,
    extent: ViewportExtent,
    tolerance: f32,
    store: SharedStore,
}

impl WindowRegistry {
    pub fn new(
        store: SharedStore,
        title: impl Into<String>,
        rect: WindowRect,
        extent: ViewportExtent,
        tolerance: f32,
    ) -> Self {
        Self {
            id: store.origin(),
            title: title.into(),
            rect,
            extent,
            tolerance,
            store,
        }
    }

    pub fn id(&self) -> WindowId {
        self.id
    }

    pub fn rect(&self) -> WindowRect {
        self.rect
    }

    pub fn extent(&self) -> ViewportExtent {
        self.extent
    }

    fn record(&self) -> WindowRecord {
        WindowRecord {
            id: self.id,
            x: self.rect.x,
            y: self.rect.y,
            width: self.rect.width,
            height: self.rect.height,
            title: self.title.clone(),
        }
    }

    /// Write this window's current rectangle under its key.
    pub fn publish(&self) -> Result<(), StoreError> {
        let key = window_key(self.id);
        let payload = serde_json::to_string(&self.record()).map_err(|err| StoreError::Encode {
            key: key.clone(),
            reason: err.to_string(),
        })?;
        self.store.put(&key, payload)?;
        tracing::trace!(window = %self.id, rect = ?self.rect, "published window geometry");
        Ok(())
    }

    /// Apply a host event and republish.
    pub fn handle_event(&mut self, event: ViewportEvent) -> Result<(), StoreError> {
        match event {
            ViewportEvent::Loaded | ViewportEvent::PointerMoved => {}
            ViewportEvent::Resized { width, height } => {
                self.rect.width = width;
                self.rect.height = height;
            }
            ViewportEvent::Moved { x, y } => {
                self.rect.x = x;
                self.rect.y = y;
            }
        }
        self.publish()
    }

    fn decode(key: &str, payload: &str) -> Option<WindowRecord> {
        match serde_json::from_str(payload) {
            Ok(record) => Some(record),
            Err(err) => {
                tracing::trace!(key, %err, "skipping unreadable window record");
                None
            }
        }
    }

    /// A window's record as currently published.
    pub fn record_of(&self, id: WindowId) -> Option<WindowRecord> {
        let key = window_key(id);
        let payload = self.store.get(&key)?;
        Self::decode(&key, &payload)
    }

    /// This window's last-published record.
    pub fn published(&self) -> Option<WindowRecord> {
        self.record_of(self.id)
    }

    /// Every other window's record.
    pub fn peers(&self) -> Vec<WindowRecord> {
        let own = window_key(self.id);
        self.store
            .list(WINDOW_PREFIX)
            .into_iter()
            .filter(|key| *key != own)
            .filter_map(|key| {
                let payload = self.store.get(&key)?;
                Self::decode(&key, &payload)
            })
            .collect()
    }

    /// Whether some peer window borders `edge` of this window.
    pub fn is_edge_adjacent(&self, edge: Edge) -> bool {
        let Some(me) = self.published() else {
            return false;
        };
        let me = me.rect();
        self.peers()
            .iter()
            .any(|peer| is_adjacent(&me, &peer.rect(), edge, self.tolerance))
    }

    /// Whether this window borders `edge` of `source`, i.e. whether a particle
    /// leaving `source` through `edge` should enter here.
    pub fn accepts_from(&self, source: WindowId, edge: Edge) -> bool {
        if source == self.id {
            return false;
        }
        let (Some(me), Some(them)) = (self.published(), self.record_of(source)) else {
            return false;
        };
        is_adjacent(&them.rect(), &me.rect(), edge, self.tolerance)
    }

    /// Where a particle that left a peer through `edge` enters this viewport:
    /// on the opposite boundary, keeping the other in-plane coordinate.
    /// Depth has no counterpart across windows and starts at 0.
    pub fn entry_position(&self, edge: Edge, exit: Vec3) -> Vec3 {
        let hw = self.extent.half_width();
        let hh = self.extent.half_height();
        match edge.opposite() {
            Edge::Left => Vec3::new(-hw, exit.y, 0.0),
            Edge::Right => Vec3::new(hw, exit.y, 0.0),
            Edge::Bottom => Vec3::new(exit.x, -hh, 0.0),
            Edge::Top => Vec3::new(exit.x, hh, 0.0),
        }
    }
}
