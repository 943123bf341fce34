//! Configuration management for the observer
//!
//! Chains are data: each entry of `chains` describes one source chain to
//! observe, keyed by its chain id. Sources are layered with the `config`
//! crate: base file, environment-specific file, explicit file, then
//! `CROSSLINK__*` environment variables.

use config::{Config, ConfigError, Environment, File};
use ethers::types::Address;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

use crate::{decoder::EventSchema, ChainId};

/// Default number of blocks scanned per tick
pub const DEFAULT_MAX_WINDOW: u64 = 10;

/// Default per-RPC deadline in seconds
pub const DEFAULT_RPC_TIMEOUT_SECONDS: u64 = 10;

/// Main configuration structure for the observer
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ObserverConfig {
    /// Global settings
    pub global: GlobalConfig,

    /// Coordinating ledger connection
    pub coordinator: CoordinatorConfig,

    /// Source chains to observe
    pub chains: HashMap<ChainId, ChainConfig>,

    /// Monitoring and observability
    pub monitoring: MonitoringConfig,
}

/// Global observer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Number of runtime worker threads
    pub worker_threads: usize,

    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,

    /// Consecutive faulted ticks before an observer reports unhealthy
    pub unhealthy_after_failures: u32,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            worker_threads: num_cpus::get(),
            shutdown_timeout_seconds: 30,
            unhealthy_after_failures: 5,
        }
    }
}

/// Coordinating ledger gateway settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Base URL of the coordinating ledger gateway
    pub endpoint: String,

    /// Request timeout in seconds
    pub request_timeout_seconds: u64,

    /// Name of the signer submitting on behalf of this observer
    pub signer_name: String,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:1317".to_string(),
            request_timeout_seconds: 10,
            signer_name: "observer".to_string(),
        }
    }
}

/// What to do when a single entry of a window fails to decode or forward
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Log and skip the entry; the window still advances the watermark
    #[default]
    Skip,

    /// Stop the window and retry it on the next tick
    Hold,
}

/// Per-chain configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Observe this chain
    pub enabled: bool,

    /// JSON-RPC endpoint
    pub endpoint: String,

    /// Bridge contract to watch
    pub contract_address: String,

    /// Seconds between polls (usually the chain's block time)
    pub poll_interval_seconds: u64,

    /// Maximum number of blocks scanned per tick
    pub max_window: u64,

    /// Deadline for each RPC call in seconds
    pub rpc_timeout_seconds: u64,

    /// Entry-level failure handling
    pub failure_policy: FailurePolicy,

    /// Event signatures emitted by the bridge contract
    pub schema: SchemaConfig,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "http://localhost:8545".to_string(),
            contract_address: format!("{:?}", Address::zero()),
            poll_interval_seconds: 5,
            max_window: DEFAULT_MAX_WINDOW,
            rpc_timeout_seconds: DEFAULT_RPC_TIMEOUT_SECONDS,
            failure_policy: FailurePolicy::Skip,
            schema: SchemaConfig::default(),
        }
    }
}

impl ChainConfig {
    /// Poll interval as a duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }

    /// RPC deadline as a duration
    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_seconds)
    }

    /// Parsed bridge contract address
    pub fn contract(&self) -> std::result::Result<Address, ConfigError> {
        Address::from_str(&self.contract_address).map_err(|e| {
            ConfigError::Message(format!(
                "Invalid contract address {}: {}",
                self.contract_address, e
            ))
        })
    }
}

/// Canonical event signatures, one per bridge event kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaConfig {
    pub deposit: String,
    pub burn: String,
    pub release: String,
    pub mint_confirmation: String,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            deposit: "LockSend(address,string,uint256,string,bytes)".to_string(),
            burn: "BurnSend(address,address,uint256,uint256,string)".to_string(),
            release: "Unlock(address,uint256)".to_string(),
            mint_confirmation: "MMinted(address,uint256,bytes32)".to_string(),
        }
    }
}

/// Monitoring and observability configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    /// Metrics configuration
    pub metrics: MetricsConfig,
}

/// Metrics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Install the Prometheus exporter
    pub enabled: bool,

    /// Prometheus exporter bind address
    pub prometheus_bind_address: String,

    /// Prometheus exporter port
    pub prometheus_port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            prometheus_bind_address: "0.0.0.0".to_string(),
            prometheus_port: 9100,
        }
    }
}

impl ObserverConfig {
    /// Load configuration from files and environment
    pub fn load(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            // Start with default values
            .add_source(File::with_name("config/default").required(false))
            // Add environment-specific config
            .add_source(
                File::with_name(&format!(
                    "config/{}",
                    std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into())
                ))
                .required(false),
            );

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        let config = builder
            // Add environment variables with CROSSLINK_ prefix
            .add_source(Environment::with_prefix("CROSSLINK").separator("__"))
            .build()?;

        config.try_deserialize()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.global.worker_threads == 0 {
            return Err(ConfigError::Message("worker_threads must be greater than 0".into()));
        }

        if Url::parse(&self.coordinator.endpoint).is_err() {
            return Err(ConfigError::Message(format!(
                "Invalid coordinator endpoint: {}",
                self.coordinator.endpoint
            )));
        }

        if self.chains.values().all(|chain| !chain.enabled) {
            return Err(ConfigError::Message("At least one chain must be enabled".into()));
        }

        for (chain, config) in self.chains.iter().filter(|(_, c)| c.enabled) {
            if Url::parse(&config.endpoint).is_err() {
                return Err(ConfigError::Message(format!(
                    "Invalid RPC endpoint for chain {}: {}",
                    chain, config.endpoint
                )));
            }

            config.contract()?;

            if config.poll_interval_seconds == 0 {
                return Err(ConfigError::Message(format!(
                    "poll_interval_seconds must be greater than 0 for chain {}",
                    chain
                )));
            }

            if config.max_window == 0 {
                return Err(ConfigError::Message(format!(
                    "max_window must be greater than 0 for chain {}",
                    chain
                )));
            }

            if config.rpc_timeout_seconds == 0 {
                return Err(ConfigError::Message(format!(
                    "rpc_timeout_seconds must be greater than 0 for chain {}",
                    chain
                )));
            }

            if let Err(e) = EventSchema::from_config(&config.schema) {
                return Err(ConfigError::Message(format!(
                    "Invalid event schema for chain {}: {}",
                    chain, e
                )));
            }
        }

        Ok(())
    }

    /// Enabled chains, optionally restricted to `only`, in a stable order
    pub fn enabled_chains(&self, only: Option<&[ChainId]>) -> Vec<(ChainId, ChainConfig)> {
        let mut chains: Vec<(ChainId, ChainConfig)> = self
            .chains
            .iter()
            .filter(|(_, config)| config.enabled)
            .filter(|(chain, _)| only.map_or(true, |only| only.contains(chain)))
            .map(|(chain, config)| (chain.clone(), config.clone()))
            .collect();
        chains.sort_by(|a, b| a.0.cmp(&b.0));
        chains
    }
}
