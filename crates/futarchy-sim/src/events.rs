//! Market lifecycle events.
//!
//! Events are broadcast to every subscriber; a subscriber that falls more
//! than the channel capacity behind loses the oldest events.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use futarchy_types::{OutcomeIndex, Price};

/// An event emitted by the simulator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event_type")]
pub enum MarketEvent {
    /// A proposal opened and the spot pool was locked.
    ProposalOpened {
        /// Simulated time.
        at: u64,
        /// Number of outcomes.
        outcomes: usize,
        /// Share of spot liquidity moved into conditional markets.
        conditional_liquidity_ratio_bps: u16,
    },
    /// A swap session committed.
    BatchCommitted {
        /// Batch number.
        batch: u64,
        /// Simulated time.
        at: u64,
        /// Swaps in the session.
        swaps: usize,
        /// Spot price after the session.
        spot_price: Price,
    },
    /// A swap session was rolled back.
    BatchRolledBack {
        /// Batch number.
        batch: u64,
        /// Simulated time.
        at: u64,
        /// Commit failure.
        reason: String,
    },
    /// The proposal resolved.
    ProposalResolved {
        /// Simulated time.
        at: u64,
        /// Winning outcome.
        winner: OutcomeIndex,
        /// Winning market's TWAP at resolution.
        final_twap: Price,
    },
}

impl MarketEvent {
    /// Event type name.
    pub fn name(&self) -> &'static str {
        match self {
            MarketEvent::ProposalOpened { .. } => "ProposalOpened",
            MarketEvent::BatchCommitted { .. } => "BatchCommitted",
            MarketEvent::BatchRolledBack { .. } => "BatchRolledBack",
            MarketEvent::ProposalResolved { .. } => "ProposalResolved",
        }
    }
}

/// Event bus for broadcasting events to subscribers.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<MarketEvent>,
    sequence: Arc<AtomicU64>,
}

impl EventBus {
    /// Create a new event bus with the given buffer capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            sequence: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Emit an event to all subscribers.
    pub fn emit(&self, event: MarketEvent) {
        self.sequence.fetch_add(1, Ordering::SeqCst);
        // Ignore send errors (no subscribers)
        let _ = self.sender.send(event);
    }

    /// Subscribe to events. Returns a receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<MarketEvent> {
        self.sender.subscribe()
    }

    /// Number of events emitted so far.
    pub fn sequence(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_bus_emit_subscribe() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.emit(MarketEvent::ProposalResolved {
            at: 1_000,
            winner: 1,
            final_twap: 5,
        });

        let event = rx.try_recv().expect("receive event");
        assert_eq!(event.name(), "ProposalResolved");
        assert_eq!(bus.sequence(), 1);
    }

    #[test]
    fn test_emit_without_subscribers() {
        let bus = EventBus::new(4);
        bus.emit(MarketEvent::BatchRolledBack {
            batch: 3,
            at: 0,
            reason: "spot out of band".to_string(),
        });
        assert_eq!(bus.sequence(), 1);
    }

    #[test]
    fn test_event_json_is_tagged() {
        let event = MarketEvent::BatchCommitted {
            batch: 2,
            at: 120_000,
            swaps: 4,
            spot_price: 1_000_000_000_000,
        };
        let json = serde_json::to_value(&event).expect("serialize");
        assert_eq!(json["event_type"], "BatchCommitted");
        assert_eq!(json["swaps"], 4);
        let back: MarketEvent = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back, event);
    }
}
