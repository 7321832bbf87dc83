//! Counters for the cross-viewport exchange

/// Every outcome the exchange can report.
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

impl ExchangeEvent {
    pub const ALL: [ExchangeEvent; 8] = [
        ExchangeEvent::Published,
        ExchangeEvent::DroppedNoEdge,
        ExchangeEvent::DroppedStoreFull,
        ExchangeEvent::Imported,
        ExchangeEvent::NotAdjacent,
        ExchangeEvent::ClaimLost,
        ExchangeEvent::PoolSaturated,
        ExchangeEvent::Malformed,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ExchangeEvent::Published => "published",
            ExchangeEvent::DroppedNoEdge => "dropped_no_edge",
            ExchangeEvent::DroppedStoreFull => "dropped_store_full",
            ExchangeEvent::Imported => "imported",
            ExchangeEvent::NotAdjacent => "not_adjacent",
            ExchangeEvent::ClaimLost => "claim_lost",
            ExchangeEvent::PoolSaturated => "pool_saturated",
            ExchangeEvent::Malformed => "malformed",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Default)]
pub struct ExchangeStats {
    counts: [u64; 8],
}

impl ExchangeStats {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn record(&mut self, event: ExchangeEvent) {
        self.counts[event.index()] += 1;
    }

    pub fn get(&self, event: ExchangeEvent) -> u64 {
        self.counts[event.index()]
    }

    pub fn merge(&mut self, other: &ExchangeStats) {
        for (mine, theirs) in self.counts.iter_mut().zip(other.counts.iter()) {
            *mine += theirs;
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (ExchangeEvent, u64)> + '_ {
        ExchangeEvent::ALL.iter().map(|&e| (e, self.get(e)))
    }
}
