//! Test utilities and helpers
//!
//! Scripted fakes for the chain connector and the coordinating ledger, plus
//! builders for bridge contract logs.

#![allow(dead_code)]

use async_trait::async_trait;
use ethers::abi::{encode, Token};
use ethers::types::{Address, Bytes, H256, U256};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;

use crosslink_observer::{
    config::{ChainConfig, FailurePolicy},
    connector::ChainConnector,
    decoder::EventSchema,
    forwarder::{CoordinatorClient, OutboundTransfer, ReceiptConfirmation, RelayForwarder},
    observers::ChainObserver,
    watermark::WatermarkStore,
    ChainId, CorrelationId, EventKind, LogEntry, ObserverError, Result,
};

pub const CHAIN: &str = "goerli";

pub fn chain() -> ChainId {
    ChainId::new(CHAIN)
}

pub fn contract() -> Address {
    Address::repeat_byte(0x42)
}

/// Connector with a scripted head and logs keyed by block
pub struct FakeConnector {
    chain: ChainId,
    head: Mutex<u64>,
    logs: Mutex<BTreeMap<u64, Vec<LogEntry>>>,
    fetch_failures: Mutex<VecDeque<ObserverError>>,
    head_failures: Mutex<VecDeque<ObserverError>>,
    fetches: Mutex<Vec<(u64, u64)>>,
    head_reads: Mutex<usize>,
}

impl FakeConnector {
    pub fn new(head: u64) -> Arc<Self> {
        Arc::new(Self {
            chain: chain(),
            head: Mutex::new(head),
            logs: Mutex::new(BTreeMap::new()),
            fetch_failures: Mutex::new(VecDeque::new()),
            head_failures: Mutex::new(VecDeque::new()),
            fetches: Mutex::new(Vec::new()),
            head_reads: Mutex::new(0),
        })
    }

    pub fn set_head(&self, head: u64) {
        *self.head.lock() = head;
    }

    pub fn add_log(&self, entry: LogEntry) {
        self.logs.lock().entry(entry.block_height).or_default().push(entry);
    }

    /// Fail the next `fetch_logs` call
    pub fn fail_next_fetch(&self, error: ObserverError) {
        self.fetch_failures.lock().push_back(error);
    }

    /// Fail the next `current_height` call
    pub fn fail_next_head(&self, error: ObserverError) {
        self.head_failures.lock().push_back(error);
    }

    /// Ranges requested so far
    pub fn fetches(&self) -> Vec<(u64, u64)> {
        self.fetches.lock().clone()
    }

    pub fn head_reads(&self) -> usize {
        *self.head_reads.lock()
    }
}

#[async_trait]
impl ChainConnector for FakeConnector {
    fn chain(&self) -> &ChainId {
        &self.chain
    }

    async fn current_height(&self) -> Result<u64> {
        *self.head_reads.lock() += 1;
        if let Some(error) = self.head_failures.lock().pop_front() {
            return Err(error);
        }
        Ok(*self.head.lock())
    }

    async fn fetch_logs(&self, contract: Address, from: u64, to: u64) -> Result<Vec<LogEntry>> {
        self.fetches.lock().push((from, to));
        if let Some(error) = self.fetch_failures.lock().pop_front() {
            return Err(error);
        }
        let logs = self.logs.lock();
        Ok(logs
            .range(from..=to)
            .flat_map(|(_, entries)| entries.iter())
            .filter(|entry| entry.contract_address == contract)
            .cloned()
            .collect())
    }
}

/// Coordinating ledger that records every call
#[derive(Default)]
pub struct RecordingCoordinator {
    heights: Mutex<HashMap<ChainId, u64>>,
    height_unavailable: Mutex<bool>,
    transfers: Mutex<Vec<OutboundTransfer>>,
    receipts: Mutex<Vec<ReceiptConfirmation>>,
    rejected_recipients: Mutex<Vec<String>>,
}

impl RecordingCoordinator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_height(height: u64) -> Arc<Self> {
        let coordinator = Self::default();
        coordinator.heights.lock().insert(chain(), height);
        Arc::new(coordinator)
    }

    pub fn set_height_unavailable(&self) {
        *self.height_unavailable.lock() = true;
    }

    /// Refuse submissions whose recipient matches
    pub fn reject_recipient(&self, recipient: &str) {
        self.rejected_recipients.lock().push(recipient.to_string());
    }

    pub fn transfers(&self) -> Vec<OutboundTransfer> {
        self.transfers.lock().clone()
    }

    pub fn receipts(&self) -> Vec<ReceiptConfirmation> {
        self.receipts.lock().clone()
    }

    pub fn calls(&self) -> usize {
        self.transfers.lock().len() + self.receipts.lock().len()
    }

    fn check(&self, recipient: &str) -> Result<()> {
        if self.rejected_recipients.lock().iter().any(|r| r == recipient) {
            return Err(ObserverError::submit(format!("rejected {}", recipient)));
        }
        Ok(())
    }
}

#[async_trait]
impl CoordinatorClient for RecordingCoordinator {
    async fn last_processed_height(&self, chain: &ChainId) -> Result<u64> {
        if *self.height_unavailable.lock() {
            return Err(ObserverError::coordinator("gateway unavailable"));
        }
        Ok(self.heights.lock().get(chain).copied().unwrap_or(0))
    }

    async fn submit_transfer(&self, transfer: &OutboundTransfer) -> Result<CorrelationId> {
        self.check(&transfer.recipient)?;
        let mut transfers = self.transfers.lock();
        transfers.push(transfer.clone());
        Ok(CorrelationId(format!("0xtransfer{}", transfers.len())))
    }

    async fn confirm_receipt(&self, receipt: &ReceiptConfirmation) -> Result<CorrelationId> {
        self.check(&receipt.recipient)?;
        let mut receipts = self.receipts.lock();
        receipts.push(receipt.clone());
        Ok(CorrelationId(format!("0xreceipt{}", receipts.len())))
    }
}

/// Observer wired to fakes, with its shared watermark store
pub struct Harness {
    pub observer: ChainObserver<Arc<FakeConnector>>,
    pub connector: Arc<FakeConnector>,
    pub coordinator: Arc<RecordingCoordinator>,
    pub watermarks: Arc<WatermarkStore>,
}

impl Harness {
    pub fn new(head: u64, coordinator: Arc<RecordingCoordinator>) -> Self {
        Self::with_config(head, coordinator, chain_config(FailurePolicy::Skip))
    }

    pub fn with_config(
        head: u64,
        coordinator: Arc<RecordingCoordinator>,
        config: ChainConfig,
    ) -> Self {
        let connector = FakeConnector::new(head);
        let watermarks = Arc::new(WatermarkStore::new());
        let forwarder = Arc::new(RelayForwarder::new(coordinator.clone()));
        let observer = ChainObserver::new(
            chain(),
            &config,
            connector.clone(),
            forwarder,
            watermarks.clone(),
        )
        .expect("valid observer configuration");

        Self {
            observer,
            connector,
            coordinator,
            watermarks,
        }
    }

    pub fn watermark(&self) -> Option<u64> {
        self.watermarks.get(&chain())
    }
}

pub fn chain_config(policy: FailurePolicy) -> ChainConfig {
    ChainConfig {
        endpoint: "http://localhost:8545".to_string(),
        contract_address: format!("{:?}", contract()),
        poll_interval_seconds: 5,
        max_window: 10,
        failure_policy: policy,
        ..Default::default()
    }
}

fn log(kind: Option<EventKind>, block: u64, index: u64, tokens: &[Token]) -> LogEntry {
    let topic = kind.map(|kind| {
        EventSchema::canonical()
            .signature(kind)
            .expect("canonical signature")
            .topic
    });
    LogEntry {
        block_height: block,
        transaction_id: H256::from_low_u64_be(block * 1_000 + index),
        topic,
        payload: Bytes::from(encode(tokens)),
        contract_address: contract(),
        log_index: index,
    }
}

/// `LockSend(sender, recipient, amount, destination, message)`
pub fn deposit_log(
    block: u64,
    index: u64,
    sender: Address,
    recipient: &str,
    amount: u64,
    destination: &str,
    message: &[u8],
) -> LogEntry {
    log(
        Some(EventKind::Deposit),
        block,
        index,
        &[
            Token::Address(sender),
            Token::String(recipient.to_string()),
            Token::Uint(U256::from(amount)),
            Token::String(destination.to_string()),
            Token::Bytes(message.to_vec()),
        ],
    )
}

/// `Unlock(recipient, amount)`
pub fn release_log(block: u64, index: u64, recipient: Address, amount: u64) -> LogEntry {
    log(
        Some(EventKind::Release),
        block,
        index,
        &[Token::Address(recipient), Token::Uint(U256::from(amount))],
    )
}

/// A log whose topic matches no bridge event
pub fn unknown_log(block: u64, index: u64) -> LogEntry {
    let mut entry = log(None, block, index, &[Token::Uint(U256::one())]);
    entry.topic = Some(H256::repeat_byte(0xee));
    entry
}

/// A deposit log whose payload is truncated
pub fn malformed_deposit_log(block: u64, index: u64) -> LogEntry {
    let mut entry = deposit_log(block, index, Address::zero(), "r", 1, "dest", b"");
    entry.payload = Bytes::from(vec![0u8; 40]);
    entry
}
