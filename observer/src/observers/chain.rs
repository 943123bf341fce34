//! Per-chain poll scheduler
//!
//! Each tick reads the head, scans one bounded window past the watermark,
//! decodes and forwards the window's events, then advances the watermark
//! to the window's end. A failed head read or log fetch leaves the
//! watermark untouched so the next tick retries the same range.

use ethers::types::Address;
use metrics::{counter, gauge};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    config::{ChainConfig, FailurePolicy},
    connector::ChainConnector,
    decoder::{EventDecoder, EventSchema},
    forwarder::RelayForwarder,
    observers::traits::{ObserverHandle, ObserverState, ObserverStatus, TickOutcome},
    watermark::WatermarkStore,
    BlockWindow, ChainId, CorrelationId, LogEntry, ObserverError, Result,
};

/// Default consecutive failures before an observer reports unhealthy
const DEFAULT_UNHEALTHY_AFTER: u32 = 5;

/// Observer of one source chain
pub struct ChainObserver<C: ChainConnector> {
    chain: ChainId,
    connector: C,
    decoder: EventDecoder,
    contract: Address,
    forwarder: Arc<RelayForwarder>,
    watermarks: Arc<WatermarkStore>,
    poll_interval: Duration,
    max_window: u64,
    window: u64,
    policy: FailurePolicy,
    status: Arc<RwLock<ObserverStatus>>,
    unhealthy_after: u32,
}

impl<C: ChainConnector> ChainObserver<C> {
    /// Create an observer from a chain's configuration
    pub fn new(
        chain: ChainId,
        config: &ChainConfig,
        connector: C,
        forwarder: Arc<RelayForwarder>,
        watermarks: Arc<WatermarkStore>,
    ) -> Result<Self> {
        let schema = EventSchema::from_config(&config.schema)?;
        let contract = config
            .contract()
            .map_err(|_| ObserverError::InvalidAddress(config.contract_address.clone()))?;
        let max_window = config.max_window.max(1);

        info!(
            chain = %chain,
            contract = ?contract,
            max_window,
            poll_interval_s = config.poll_interval_seconds,
            policy = ?config.failure_policy,
            "Creating chain observer"
        );

        Ok(Self {
            decoder: EventDecoder::new(chain.clone(), schema),
            chain,
            connector,
            contract,
            forwarder,
            watermarks,
            poll_interval: config.poll_interval(),
            max_window,
            window: max_window,
            policy: config.failure_policy,
            status: Arc::new(RwLock::new(ObserverStatus::new(max_window))),
            unhealthy_after: DEFAULT_UNHEALTHY_AFTER,
        })
    }

    /// Set the number of consecutive faulted ticks that make the observer unhealthy
    pub fn with_unhealthy_after(mut self, failures: u32) -> Self {
        self.unhealthy_after = failures;
        self
    }

    /// Get the observed chain
    pub fn chain(&self) -> &ChainId {
        &self.chain
    }

    /// Get the effective window of the next scan
    pub fn window(&self) -> u64 {
        self.window
    }

    /// Get a handle for health reporting
    pub fn handle(&self) -> ObserverHandle {
        ObserverHandle {
            chain: self.chain.clone(),
            status: Arc::clone(&self.status),
            watermarks: Arc::clone(&self.watermarks),
            unhealthy_after: self.unhealthy_after,
        }
    }

    /// Run ticks until cancelled.
    ///
    /// Ticks never overlap: a tick that outlasts the poll interval delays the
    /// next one. Cancellation drops an in-flight tick without advancing the
    /// watermark.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<()> {
        info!(chain = %self.chain, "Starting observation loop");

        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!(chain = %self.chain, "Cancelled during tick");
                    break;
                }
                result = self.tick() => {
                    if let Err(e) = result {
                        warn!(chain = %self.chain, error = %e, "Tick failed");
                    }
                }
            }
        }

        self.status.write().state = ObserverState::Idle;
        info!(chain = %self.chain, "Observation loop stopped");
        Ok(())
    }

    /// Run a single catch-up step
    pub async fn tick(&mut self) -> Result<TickOutcome> {
        self.set_state(ObserverState::Scanning);
        let result = self.step().await;

        let mut status = self.status.write();
        status.metrics.ticks += 1;
        status.window = self.window;
        match &result {
            Ok(TickOutcome::Held { error, .. }) => {
                status.record_failure(error.clone());
            }
            Ok(outcome) => {
                if let TickOutcome::Applied {
                    forwarded,
                    ignored,
                    skipped,
                    ..
                } = outcome
                {
                    status.metrics.windows_applied += 1;
                    status.metrics.events_forwarded += *forwarded as u64;
                    status.metrics.events_ignored += *ignored as u64;
                    status.metrics.events_skipped += *skipped as u64;
                }
                status.record_success();
            }
            Err(e) => {
                match e {
                    ObserverError::RangeTooLarge { .. } => status.metrics.range_rejections += 1,
                    ObserverError::ConnectionFailure { .. } => {
                        status.metrics.connection_failures += 1;
                        counter!(
                            "observer_connection_failures_total",
                            1,
                            "chain" => self.chain.to_string()
                        );
                    }
                    _ => {}
                }
                status.record_failure(e.to_string());
            }
        }
        drop(status);

        let outcome = match &result {
            Ok(outcome) => outcome.label(),
            Err(e) => e.category(),
        };
        counter!(
            "observer_ticks_total",
            1,
            "chain" => self.chain.to_string(),
            "outcome" => outcome
        );

        result
    }

    async fn step(&mut self) -> Result<TickOutcome> {
        let watermark = match self.watermarks.get(&self.chain) {
            Some(watermark) => watermark,
            None => {
                let client = self.forwarder.client();
                let watermark = self
                    .watermarks
                    .initialize(&self.chain, client.as_ref(), &self.connector)
                    .await?;
                return Ok(TickOutcome::Initialized { watermark });
            }
        };

        let head = self.connector.current_height().await?;
        self.status.write().last_head = Some(head);
        gauge!("observer_head", head as f64, "chain" => self.chain.to_string());

        let window = match BlockWindow::next(watermark, head, self.window) {
            Some(window) => window,
            None => {
                debug!(chain = %self.chain, head, watermark, "No new blocks");
                return Ok(TickOutcome::NoNewBlocks { head });
            }
        };

        let logs = match self
            .connector
            .fetch_logs(self.contract, window.from, window.to)
            .await
        {
            Ok(logs) => logs,
            Err(e) => {
                if matches!(e, ObserverError::RangeTooLarge { .. }) {
                    self.window = (self.window / 2).max(1);
                    warn!(
                        chain = %self.chain,
                        %window,
                        next_window = self.window,
                        "Range rejected, shrinking window"
                    );
                }
                return Err(e);
            }
        };

        debug!(chain = %self.chain, %window, head, logs = logs.len(), "Scanned window");
        self.set_state(ObserverState::Applying);

        let (mut forwarded, mut ignored, mut skipped) = (0usize, 0usize, 0usize);
        for entry in &logs {
            match self.apply(entry).await {
                Ok(Some(_)) => forwarded += 1,
                Ok(None) => ignored += 1,
                Err(e) => {
                    counter!(
                        "observer_events_skipped_total",
                        1,
                        "chain" => self.chain.to_string(),
                        "reason" => e.category()
                    );
                    warn!(
                        chain = %self.chain,
                        tx_hash = ?entry.transaction_id,
                        block = entry.block_height,
                        log_index = entry.log_index,
                        error = %e,
                        "Failed to relay log entry"
                    );

                    if self.policy == FailurePolicy::Hold {
                        return Ok(TickOutcome::Held {
                            window,
                            forwarded,
                            error: e.to_string(),
                        });
                    }
                    skipped += 1;
                }
            }
        }

        self.watermarks.advance(&self.chain, window.to)?;
        self.window = self.max_window;

        info!(
            chain = %self.chain,
            %window,
            forwarded,
            ignored,
            skipped,
            "Window applied"
        );

        Ok(TickOutcome::Applied {
            window,
            forwarded,
            ignored,
            skipped,
        })
    }

    /// Decode and forward one entry; `None` for entries outside the schema
    async fn apply(&self, entry: &LogEntry) -> Result<Option<CorrelationId>> {
        let event = match self.decoder.decode(entry) {
            Ok(event) => event,
            Err(ObserverError::UnknownSignature { topic }) => {
                debug!(chain = %self.chain, %topic, tx_hash = ?entry.transaction_id, "Ignoring log");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        self.forwarder.forward(&event).await.map(Some)
    }

    fn set_state(&self, state: ObserverState) {
        self.status.write().state = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forwarder::traits::MockCoordinatorClient;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    /// Connector returning a fixed head and no logs
    struct StaticHead {
        chain: ChainId,
        head: u64,
        fetches: Mutex<Vec<(u64, u64)>>,
    }

    #[async_trait]
    impl ChainConnector for StaticHead {
        fn chain(&self) -> &ChainId {
            &self.chain
        }

        async fn current_height(&self) -> Result<u64> {
            Ok(self.head)
        }

        async fn fetch_logs(&self, _: Address, from: u64, to: u64) -> Result<Vec<LogEntry>> {
            self.fetches.lock().push((from, to));
            Ok(Vec::new())
        }
    }

    fn observer(head: u64, recorded: u64) -> ChainObserver<Arc<StaticHead>> {
        let chain = ChainId::new("goerli");
        let connector = Arc::new(StaticHead {
            chain: chain.clone(),
            head,
            fetches: Mutex::new(Vec::new()),
        });

        let mut coordinator = MockCoordinatorClient::new();
        coordinator
            .expect_last_processed_height()
            .returning(move |_| Ok(recorded));

        ChainObserver::new(
            chain,
            &ChainConfig::default(),
            connector,
            Arc::new(RelayForwarder::new(Arc::new(coordinator))),
            Arc::new(WatermarkStore::new()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_first_tick_initializes() {
        let mut observer = observer(500, 100);
        let outcome = observer.tick().await.unwrap();
        assert_eq!(outcome, TickOutcome::Initialized { watermark: 100 });
        assert_eq!(observer.handle().health().watermark, Some(100));
    }

    #[tokio::test]
    async fn test_empty_window_advances() {
        let mut observer = observer(137, 100);
        observer.tick().await.unwrap();

        let outcome = observer.tick().await.unwrap();
        assert_eq!(
            outcome,
            TickOutcome::Applied {
                window: BlockWindow { from: 101, to: 110 },
                forwarded: 0,
                ignored: 0,
                skipped: 0,
            }
        );
        assert_eq!(observer.connector.fetches.lock().clone(), vec![(101, 110)]);

        let health = observer.handle().health();
        assert!(health.is_healthy());
        assert_eq!(health.watermark, Some(110));
        assert_eq!(health.last_head, Some(137));
        assert_eq!(health.metrics.ticks, 2);
        assert_eq!(health.metrics.windows_applied, 1);
    }

    #[tokio::test]
    async fn test_new_chain_starts_at_head() {
        let mut observer = observer(900, 0);
        assert_eq!(
            observer.tick().await.unwrap(),
            TickOutcome::Initialized { watermark: 900 }
        );
        assert_eq!(
            observer.tick().await.unwrap(),
            TickOutcome::NoNewBlocks { head: 900 }
        );
        assert!(observer.connector.fetches.lock().is_empty());
    }

    #[test]
    fn test_invalid_contract_is_rejected() {
        let config = ChainConfig {
            contract_address: "0x12".to_string(),
            ..Default::default()
        };
        let chain = ChainId::new("goerli");
        let connector = Arc::new(StaticHead {
            chain: chain.clone(),
            head: 0,
            fetches: Mutex::new(Vec::new()),
        });
        let result = ChainObserver::new(
            chain,
            &config,
            connector,
            Arc::new(RelayForwarder::new(Arc::new(MockCoordinatorClient::new()))),
            Arc::new(WatermarkStore::new()),
        );
        assert!(matches!(result, Err(ObserverError::InvalidAddress(_))));
    }
}
