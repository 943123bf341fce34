//! Core data types shared by the connector, decoder and forwarder

use ethers::types::{Address, Bytes, H256, U256};
use serde::{Deserialize, Serialize};

use crate::ChainId;

/// Raw log entry fetched from a source chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Height of the block containing the log
    pub block_height: u64,

    /// Hash of the emitting transaction
    pub transaction_id: H256,

    /// Event-signature hash (first topic), absent for anonymous logs
    pub topic: Option<H256>,

    /// ABI-encoded, non-indexed event data
    pub payload: Bytes,

    /// Contract that emitted the log
    pub contract_address: Address,

    /// Position of the log within its block
    pub log_index: u64,
}

/// The bridge events an observer understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Deposit,
    Burn,
    Release,
    MintConfirmation,
}

impl EventKind {
    /// All kinds, in schema order
    pub const ALL: [EventKind; 4] = [
        EventKind::Deposit,
        EventKind::Burn,
        EventKind::Release,
        EventKind::MintConfirmation,
    ];

    /// Get the human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::Deposit => "deposit",
            EventKind::Burn => "burn",
            EventKind::Release => "release",
            EventKind::MintConfirmation => "mint_confirmation",
        }
    }

    /// Whether events of this kind open a transfer (as opposed to confirming one)
    pub fn is_transfer(&self) -> bool {
        matches!(self, EventKind::Deposit | EventKind::Burn)
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Where a decoded event came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    pub chain: ChainId,
    pub transaction_id: H256,
    pub block_height: u64,
}

/// A bridge event decoded from a source-chain log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DecodedEvent {
    /// Tokens locked on the source chain for transfer to another chain
    Deposit {
        sender: Address,
        source_chain: ChainId,
        recipient: String,
        destination_chain: ChainId,
        amount: U256,
        message: Bytes,
        provenance: Provenance,
    },

    /// Wrapped tokens burned on the source chain for transfer to another chain
    Burn {
        sender: Address,
        source_chain: ChainId,
        recipient: String,
        amount: U256,
        destination_chain: ChainId,
        message: Bytes,
        provenance: Provenance,
    },

    /// Locked tokens released to a recipient on this chain
    Release {
        recipient: String,
        amount: U256,
        provenance: Provenance,
    },

    /// Wrapped tokens minted on this chain for an earlier transfer
    MintConfirmation {
        recipient: String,
        amount: U256,
        correlation_hash: H256,
        provenance: Provenance,
    },
}

impl DecodedEvent {
    /// Get the kind of this event
    pub fn kind(&self) -> EventKind {
        match self {
            DecodedEvent::Deposit { .. } => EventKind::Deposit,
            DecodedEvent::Burn { .. } => EventKind::Burn,
            DecodedEvent::Release { .. } => EventKind::Release,
            DecodedEvent::MintConfirmation { .. } => EventKind::MintConfirmation,
        }
    }

    /// Get the provenance of this event
    pub fn provenance(&self) -> &Provenance {
        match self {
            DecodedEvent::Deposit { provenance, .. }
            | DecodedEvent::Burn { provenance, .. }
            | DecodedEvent::Release { provenance, .. }
            | DecodedEvent::MintConfirmation { provenance, .. } => provenance,
        }
    }

    /// Get the transferred amount
    pub fn amount(&self) -> U256 {
        match self {
            DecodedEvent::Deposit { amount, .. }
            | DecodedEvent::Burn { amount, .. }
            | DecodedEvent::Release { amount, .. }
            | DecodedEvent::MintConfirmation { amount, .. } => *amount,
        }
    }
}

/// Identifier returned by the coordinating ledger for a relayed event
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(pub String);

impl CorrelationId {
    /// Short prefix for log lines
    pub fn short(&self) -> &str {
        let end = self.0.char_indices().nth(10).map(|(i, _)| i).unwrap_or(self.0.len());
        &self.0[..end]
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Last fully processed block height of a chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Watermark {
    pub chain: ChainId,
    pub last_processed_height: u64,
}

/// Inclusive block range scanned in a single tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockWindow {
    pub from: u64,
    pub to: u64,
}

impl BlockWindow {
    /// Compute the next window past `watermark`, bounded by `max_window` blocks and `head`.
    ///
    /// Returns `None` when the chain has not produced a block past the watermark.
    pub fn next(watermark: u64, head: u64, max_window: u64) -> Option<Self> {
        if head <= watermark {
            return None;
        }
        let span = max_window.max(1);
        let to = watermark.saturating_add(span).min(head);
        Some(Self {
            from: watermark + 1,
            to,
        })
    }

    /// Number of blocks in the window
    pub fn len(&self) -> u64 {
        self.to - self.from + 1
    }
}

impl std::fmt::Display for BlockWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..={}", self.from, self.to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_window_is_bounded_by_max_window() {
        let window = BlockWindow::next(100, 137, 10).unwrap();
        assert_eq!(window, BlockWindow { from: 101, to: 110 });
        assert_eq!(window.len(), 10);
    }

    #[test]
    fn test_window_is_bounded_by_head() {
        let window = BlockWindow::next(100, 104, 10).unwrap();
        assert_eq!(window, BlockWindow { from: 101, to: 104 });
    }

    #[test]
    fn test_no_window_without_new_blocks() {
        assert!(BlockWindow::next(100, 100, 10).is_none());
        assert!(BlockWindow::next(100, 90, 10).is_none());
    }

    #[test]
    fn test_correlation_id_short() {
        let id = CorrelationId("0xabcdef0123456789".to_string());
        assert_eq!(id.short(), "0xabcdef01");
        assert_eq!(CorrelationId("0x1".to_string()).short(), "0x1");
    }

    proptest! {
        #[test]
        fn prop_window_never_exceeds_max(
            watermark in 0u64..1_000_000,
            ahead in 0u64..10_000,
            max_window in 1u64..500,
        ) {
            let head = watermark + ahead;
            match BlockWindow::next(watermark, head, max_window) {
                None => prop_assert_eq!(ahead, 0),
                Some(window) => {
                    prop_assert_eq!(window.from, watermark + 1);
                    prop_assert!(window.to <= head);
                    prop_assert!(window.len() <= max_window);
                    prop_assert!(window.to > watermark);
                }
            }
        }
    }
}
