//! Relay of decoded events to the coordinating ledger
//!
//! Deposits and burns become transfer submissions; releases and mints
//! become receipt confirmations. The forwarder is shared by all observers.

pub mod http;
pub mod traits;

pub use http::HttpCoordinatorClient;
pub use traits::{CoordinatorClient, OutboundTransfer, ReceiptConfirmation};

use metrics::counter;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::{CorrelationId, DecodedEvent, EventKind, ObserverError, Result};

/// Forwards decoded events through a coordinating ledger client
pub struct RelayForwarder {
    client: Arc<dyn CoordinatorClient>,
    forwarded: Mutex<HashMap<EventKind, u64>>,
}

impl RelayForwarder {
    /// Create a forwarder over a client
    pub fn new(client: Arc<dyn CoordinatorClient>) -> Self {
        Self {
            client,
            forwarded: Mutex::new(HashMap::new()),
        }
    }

    /// Get the underlying client
    pub fn client(&self) -> Arc<dyn CoordinatorClient> {
        Arc::clone(&self.client)
    }

    /// Submit a deposit or burn as a cross-chain transfer
    pub async fn submit_transfer(&self, event: &DecodedEvent) -> Result<CorrelationId> {
        let transfer = OutboundTransfer::try_from(event)?;
        let id = self
            .client
            .submit_transfer(&transfer)
            .await
            .map_err(into_submit_failure)?;
        self.record(event, &id);
        Ok(id)
    }

    /// Confirm a release or mint
    pub async fn confirm_receipt(&self, event: &DecodedEvent) -> Result<CorrelationId> {
        let receipt = ReceiptConfirmation::try_from(event)?;
        let id = self
            .client
            .confirm_receipt(&receipt)
            .await
            .map_err(into_submit_failure)?;
        self.record(event, &id);
        Ok(id)
    }

    /// Dispatch an event to the matching ledger call
    pub async fn forward(&self, event: &DecodedEvent) -> Result<CorrelationId> {
        if event.kind().is_transfer() {
            self.submit_transfer(event).await
        } else {
            self.confirm_receipt(event).await
        }
    }

    /// Events forwarded so far, by kind
    pub fn forwarded_counts(&self) -> HashMap<EventKind, u64> {
        self.forwarded.lock().clone()
    }

    fn record(&self, event: &DecodedEvent, id: &CorrelationId) {
        let provenance = event.provenance();
        let kind = event.kind();
        *self.forwarded.lock().entry(kind).or_insert(0) += 1;

        counter!(
            "observer_events_forwarded_total",
            1,
            "chain" => provenance.chain.to_string(),
            "kind" => kind.name()
        );

        info!(
            chain = %provenance.chain,
            kind = %kind,
            tx_hash = ?provenance.transaction_id,
            block = provenance.block_height,
            correlation_id = id.short(),
            "Event forwarded"
        );
        debug!(amount = %event.amount(), "Forwarded amount");
    }
}

fn into_submit_failure(error: ObserverError) -> ObserverError {
    match error {
        ObserverError::SubmitFailure { .. } => error,
        other => ObserverError::submit(other.to_string()),
    }
}
