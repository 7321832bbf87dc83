//! Drift Network Layer
//!
//! Cross-viewport particle handoff over a shared key-value store: window
//! geometry discovery, exit edge classification, the exit message wire
//! format, and the exchange protocol that publishes and claims particles.

pub mod codec;
pub mod edge;
pub mod error;
pub mod exchange;
pub mod registry;
pub mod session;
pub mod store;

use drift_core::math::DeterministicRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

pub use edge::{Edge, ViewportExtent};
pub use error::{MessageError, StoreError};
pub use exchange::{Exchange, ExitOutcome, ImportOutcome};
pub use registry::WindowRegistry;
pub use session::ViewportSession;
pub use store::{MemoryStore, PeerStore, SharedStore, StoreEvent};

/// Wire format version of exit messages and window records
pub const PROTOCOL_VERSION: u32 = 1;

/// Key prefix of exit messages.
pub const EXIT_PREFIX: &str = "particleExit";

/// Key prefix of window geometry records.
pub const WINDOW_PREFIX: &str = "windowPosition-";

/// Identity of one viewport instance, stable for its lifetime.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowId(pub u64);

impl WindowId {
    /// Fresh identifier, unique within the process and unlikely to collide
    /// across processes.
    pub fn generate() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        let seed = nanos ^ n.rotate_left(32) ^ ((std::process::id() as u64) << 16);
        WindowId(DeterministicRng::new(seed).next_u64())
    }
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn generated_ids_are_distinct() {
        let ids: HashSet<WindowId> = (0..1_000).map(|_| WindowId::generate()).collect();
        assert_eq!(ids.len(), 1_000);
    }

    #[test]
    fn display_is_fixed_width_hex() {
        assert_eq!(WindowId(0xab).to_string(), "00000000000000ab");
    }
}
