//! JSON-RPC connector over HTTP

use async_trait::async_trait;
use ethers::providers::{Http, Middleware, Provider, ProviderError};
use ethers::types::{Address, Filter, Log};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::{
    config::ChainConfig, connector::traits::ChainConnector, utils, ChainId, LogEntry,
    ObserverError, Result,
};

/// Messages nodes return when a log query spans too many blocks or results
const RANGE_REJECTIONS: &[&str] = &[
    "query returned more than",
    "too many results",
    "too many logs",
    "block range",
    "range too large",
    "is limited to",
    "response size exceeded",
];

/// Chain connector backed by an ethers HTTP provider
#[derive(Debug, Clone)]
pub struct EthRpcConnector {
    chain: ChainId,
    provider: Provider<Http>,
    max_range: u64,
    rpc_timeout: Duration,
}

impl EthRpcConnector {
    /// Create a connector for a configured chain
    pub fn new(chain: ChainId, config: &ChainConfig) -> Result<Self> {
        info!(chain = %chain, endpoint = %config.endpoint, "Creating RPC connector");

        let url = Url::parse(&config.endpoint).map_err(|e| {
            ObserverError::Config(config::ConfigError::Message(format!(
                "Invalid RPC endpoint for chain {}: {}",
                chain, e
            )))
        })?;
        let http_client = utils::http_client(config.rpc_timeout())?;
        let provider = Provider::<Http>::new(Http::new_with_client(url, http_client));

        Ok(Self {
            chain,
            provider,
            max_range: config.max_window.max(1),
            rpc_timeout: config.rpc_timeout(),
        })
    }

    /// Largest range accepted by `fetch_logs`
    pub fn max_range(&self) -> u64 {
        self.max_range
    }

    fn map_provider_error(&self, error: ProviderError, from: u64, to: u64) -> ObserverError {
        let message = error.to_string();
        if is_range_rejection(&message) {
            ObserverError::RangeTooLarge {
                chain: self.chain.clone(),
                from,
                to,
                limit: self.max_range,
            }
        } else {
            ObserverError::connection(&self.chain, message)
        }
    }
}

#[async_trait]
impl ChainConnector for EthRpcConnector {
    fn chain(&self) -> &ChainId {
        &self.chain
    }

    async fn current_height(&self) -> Result<u64> {
        let chain = self.chain.clone();
        utils::with_deadline(
            async {
                self.provider
                    .get_block_number()
                    .await
                    .map(|height| height.as_u64())
                    .map_err(|e| ObserverError::connection(&self.chain, e.to_string()))
            },
            self.rpc_timeout,
            "eth_blockNumber",
            |message| ObserverError::connection(&chain, message),
        )
        .await
    }

    async fn fetch_logs(&self, contract: Address, from: u64, to: u64) -> Result<Vec<LogEntry>> {
        if from > to {
            return Err(ObserverError::InvalidRange { from, to });
        }
        if to - from + 1 > self.max_range {
            return Err(ObserverError::RangeTooLarge {
                chain: self.chain.clone(),
                from,
                to,
                limit: self.max_range,
            });
        }

        let filter = Filter::new().address(contract).from_block(from).to_block(to);
        let chain = self.chain.clone();
        let logs = utils::with_deadline(
            async {
                self.provider
                    .get_logs(&filter)
                    .await
                    .map_err(|e| self.map_provider_error(e, from, to))
            },
            self.rpc_timeout,
            "eth_getLogs",
            |message| ObserverError::connection(&chain, message),
        )
        .await?;

        debug!(chain = %self.chain, from, to, count = logs.len(), "Fetched logs");
        Ok(convert_logs(&self.chain, logs))
    }
}

/// Whether a node error means the requested range was too large
pub fn is_range_rejection(message: &str) -> bool {
    let message = message.to_lowercase();
    RANGE_REJECTIONS.iter().any(|needle| message.contains(needle))
}

/// Convert RPC logs into ordered log entries, dropping pending and removed logs
pub fn convert_logs(chain: &ChainId, logs: Vec<Log>) -> Vec<LogEntry> {
    let mut entries: Vec<LogEntry> = logs
        .into_iter()
        .filter_map(|log| {
            if log.removed == Some(true) {
                debug!(chain = %chain, tx_hash = ?log.transaction_hash, "Dropping removed log");
                return None;
            }

            let (block_number, transaction_hash) = match (log.block_number, log.transaction_hash) {
                (Some(block_number), Some(transaction_hash)) => (block_number, transaction_hash),
                _ => {
                    warn!(chain = %chain, address = ?log.address, "Dropping pending log");
                    return None;
                }
            };

            Some(LogEntry {
                block_height: block_number.as_u64(),
                transaction_id: transaction_hash,
                topic: log.topics.first().copied(),
                payload: log.data,
                contract_address: log.address,
                log_index: log.log_index.map(|index| index.low_u64()).unwrap_or_default(),
            })
        })
        .collect();

    entries.sort_by_key(|entry| (entry.block_height, entry.log_index));
    entries
}
