//! Coordinating ledger client contract and outbound payloads

use async_trait::async_trait;
use ethers::utils::to_checksum;
use serde::{Deserialize, Serialize};

use crate::{utils::to_hex_prefixed, ChainId, CorrelationId, DecodedEvent, ObserverError, Result};

/// Client of the coordinating ledger that settles cross-chain transfers.
///
/// Submissions may be repeated; the ledger de-duplicates them.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CoordinatorClient: Send + Sync {
    /// Last source height the ledger has processed for a chain, 0 if unknown
    async fn last_processed_height(&self, chain: &ChainId) -> Result<u64>;

    /// Submit a transfer opened on a source chain
    async fn submit_transfer(&self, transfer: &OutboundTransfer) -> Result<CorrelationId>;

    /// Confirm a release or mint observed on a chain
    async fn confirm_receipt(&self, receipt: &ReceiptConfirmation) -> Result<CorrelationId>;
}

/// Transfer submission built from a deposit or burn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundTransfer {
    pub sender: String,
    pub sender_chain: ChainId,
    pub recipient: String,
    pub recipient_chain: ChainId,
    /// Decimal amount
    pub amount: String,
    pub gas_limit: String,
    /// 0x-prefixed hex message
    pub message: String,
    pub in_tx_hash: String,
    pub in_block_height: u64,
}

impl TryFrom<&DecodedEvent> for OutboundTransfer {
    type Error = ObserverError;

    fn try_from(event: &DecodedEvent) -> Result<Self> {
        match event {
            DecodedEvent::Deposit {
                sender,
                source_chain,
                recipient,
                destination_chain,
                amount,
                message,
                provenance,
            }
            | DecodedEvent::Burn {
                sender,
                source_chain,
                recipient,
                amount,
                destination_chain,
                message,
                provenance,
            } => Ok(Self {
                sender: to_checksum(sender, None),
                sender_chain: source_chain.clone(),
                recipient: recipient.clone(),
                recipient_chain: destination_chain.clone(),
                amount: amount.to_string(),
                gas_limit: "0".to_string(),
                message: to_hex_prefixed(message.as_ref()),
                in_tx_hash: to_hex_prefixed(provenance.transaction_id.as_bytes()),
                in_block_height: provenance.block_height,
            }),
            other => Err(ObserverError::internal(format!(
                "{} is not a transfer",
                other.kind()
            ))),
        }
    }
}

/// Receipt confirmation built from a release or mint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptConfirmation {
    /// Hash of the originating send, empty when unknown
    pub send_hash: String,
    /// Hash of the transaction that completed the transfer, empty when unknown
    pub out_tx_hash: String,
    pub block_height: u64,
    pub amount: String,
    pub recipient: String,
}

impl TryFrom<&DecodedEvent> for ReceiptConfirmation {
    type Error = ObserverError;

    fn try_from(event: &DecodedEvent) -> Result<Self> {
        match event {
            DecodedEvent::Release {
                recipient,
                amount,
                provenance,
            } => Ok(Self {
                send_hash: String::new(),
                out_tx_hash: String::new(),
                block_height: provenance.block_height,
                amount: amount.to_string(),
                recipient: recipient.clone(),
            }),
            DecodedEvent::MintConfirmation {
                recipient,
                amount,
                correlation_hash,
                provenance,
            } => Ok(Self {
                send_hash: to_hex_prefixed(correlation_hash.as_bytes()),
                out_tx_hash: to_hex_prefixed(provenance.transaction_id.as_bytes()),
                block_height: provenance.block_height,
                amount: amount.to_string(),
                recipient: recipient.clone(),
            }),
            other => Err(ObserverError::internal(format!(
                "{} is not a receipt",
                other.kind()
            ))),
        }
    }
}
