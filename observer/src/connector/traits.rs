//! Contract over a remote ledger's RPC

use async_trait::async_trait;
use ethers::types::Address;
use std::sync::Arc;

use crate::{ChainId, LogEntry, Result};

/// Read access to a source chain.
///
/// Implementations perform no retries; the observer retries on its next tick.
#[async_trait]
pub trait ChainConnector: Send + Sync {
    /// Get the chain this connector talks to
    fn chain(&self) -> &ChainId;

    /// Get the current head height
    async fn current_height(&self) -> Result<u64>;

    /// Fetch the logs emitted by `contract` in the inclusive range `from..=to`,
    /// ordered by block height and log index
    async fn fetch_logs(&self, contract: Address, from: u64, to: u64) -> Result<Vec<LogEntry>>;
}

#[async_trait]
impl<T: ChainConnector + ?Sized> ChainConnector for Arc<T> {
    fn chain(&self) -> &ChainId {
        (**self).chain()
    }

    async fn current_height(&self) -> Result<u64> {
        (**self).current_height().await
    }

    async fn fetch_logs(&self, contract: Address, from: u64, to: u64) -> Result<Vec<LogEntry>> {
        (**self).fetch_logs(contract, from, to).await
    }
}
