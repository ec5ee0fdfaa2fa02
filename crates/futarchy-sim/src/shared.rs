//! Shared market handle.
//!
//! One [`FutarchyMarket`] may be driven from several tasks. Every batch of
//! swaps must hold the lock for the whole [`SwapSession`] so that no other
//! writer observes a half-applied batch.
//!
//! [`SwapSession`]: futarchy_market::SwapSession

use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};

use futarchy_market::FutarchyMarket;

/// Cloneable, single-writer handle to a market.
#[derive(Clone)]
pub struct SharedMarket {
    inner: Arc<Mutex<FutarchyMarket>>,
}

impl SharedMarket {
    /// Wrap a market.
    pub fn new(market: FutarchyMarket) -> Self {
        Self {
            inner: Arc::new(Mutex::new(market)),
        }
    }

    /// Exclusive access until the guard is dropped.
    pub async fn lock(&self) -> MutexGuard<'_, FutarchyMarket> {
        self.inner.lock().await
    }

    /// Copy of the current state.
    pub async fn snapshot(&self) -> FutarchyMarket {
        self.inner.lock().await.clone()
    }
}
