//! Per-chain progress tracking
//!
//! The store holds the last fully processed height of every chain. It is
//! shared by all observers, but each chain's entry is only written by that
//! chain's own task. Persistence is the coordinating ledger's job: on
//! restart the value is re-derived from its record of the chain.

use dashmap::DashMap;
use metrics::gauge;
use tracing::{info, warn};

use crate::{
    connector::ChainConnector, forwarder::CoordinatorClient, ChainId, ObserverError, Result,
    Watermark,
};

/// Concurrent map of chain watermarks
#[derive(Debug, Default)]
pub struct WatermarkStore {
    heights: DashMap<ChainId, u64>,
}

impl WatermarkStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve the starting watermark of a chain.
    ///
    /// Uses the coordinating ledger's last processed height when it is known
    /// and nonzero, otherwise the chain's current head. A failed ledger lookup
    /// counts as unknown.
    pub async fn initialize<C, K>(&self, chain: &ChainId, coordinator: &C, connector: &K) -> Result<u64>
    where
        C: CoordinatorClient + ?Sized,
        K: ChainConnector + ?Sized,
    {
        let recorded = match coordinator.last_processed_height(chain).await {
            Ok(height) => height,
            Err(e) => {
                warn!(chain = %chain, error = %e, "Failed to read last processed height");
                0
            }
        };

        let height = if recorded > 0 {
            info!(chain = %chain, height = recorded, "Resuming from coordinating ledger");
            recorded
        } else {
            let head = connector.current_height().await?;
            info!(chain = %chain, height = head, "No recorded progress, starting at chain head");
            head
        };

        self.heights.insert(chain.clone(), height);
        record_gauge(chain, height);
        Ok(height)
    }

    /// Move a chain's watermark forward; moving it back is refused
    pub fn advance(&self, chain: &ChainId, height: u64) -> Result<()> {
        let mut entry = self.heights.entry(chain.clone()).or_insert(height);
        if height < *entry {
            return Err(ObserverError::WatermarkRegression {
                chain: chain.clone(),
                current: *entry,
                requested: height,
            });
        }
        *entry = height;
        drop(entry);

        record_gauge(chain, height);
        Ok(())
    }

    /// Operator override, in either direction. Returns the previous value.
    pub fn resync(&self, chain: &ChainId, height: u64) -> Option<u64> {
        let previous = self.heights.insert(chain.clone(), height);
        warn!(chain = %chain, ?previous, height, "Watermark resynced");
        record_gauge(chain, height);
        previous
    }

    /// Get a chain's watermark, if initialized
    pub fn get(&self, chain: &ChainId) -> Option<u64> {
        self.heights.get(chain).map(|entry| *entry.value())
    }

    /// All watermarks, ordered by chain
    pub fn snapshot(&self) -> Vec<Watermark> {
        let mut watermarks: Vec<Watermark> = self
            .heights
            .iter()
            .map(|entry| Watermark {
                chain: entry.key().clone(),
                last_processed_height: *entry.value(),
            })
            .collect();
        watermarks.sort_by(|a, b| a.chain.cmp(&b.chain));
        watermarks
    }
}

fn record_gauge(chain: &ChainId, height: u64) {
    gauge!("observer_watermark", height as f64, "chain" => chain.to_string());
}
