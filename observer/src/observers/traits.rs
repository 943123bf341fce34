//! State, metrics and health types for chain observers

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{BlockWindow, ChainId};

/// Phase of an observer within its tick cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObserverState {
    /// Waiting for the next timer fire
    Idle,
    /// Reading the head and fetching logs
    Scanning,
    /// Decoding and forwarding a fetched window
    Applying,
    /// The last tick failed; the next one retries
    Faulted,
}

/// Result of a single tick
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TickOutcome {
    /// The starting watermark was resolved; no scan took place
    Initialized { watermark: u64 },

    /// The head has not moved past the watermark
    NoNewBlocks { head: u64 },

    /// The window was processed and the watermark advanced to its end
    Applied {
        window: BlockWindow,
        forwarded: usize,
        ignored: usize,
        skipped: usize,
    },

    /// An entry failed under the hold policy; the window will be retried
    Held {
        window: BlockWindow,
        forwarded: usize,
        error: String,
    },
}

impl TickOutcome {
    /// Short label for metrics
    pub fn label(&self) -> &'static str {
        match self {
            TickOutcome::Initialized { .. } => "initialized",
            TickOutcome::NoNewBlocks { .. } => "no_new_blocks",
            TickOutcome::Applied { .. } => "applied",
            TickOutcome::Held { .. } => "held",
        }
    }
}

/// Observer operational counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObserverMetrics {
    /// Ticks run
    pub ticks: u64,

    /// Windows applied
    pub windows_applied: u64,

    /// Events forwarded to the coordinating ledger
    pub events_forwarded: u64,

    /// Logs with unrecognized signatures
    pub events_ignored: u64,

    /// Entries that failed to decode or forward
    pub events_skipped: u64,

    /// Ticks that failed on the connector
    pub connection_failures: u64,

    /// Log queries refused as too large
    pub range_rejections: u64,
}

/// Health status levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
    Unknown,
}

/// Observer health snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObserverHealth {
    /// Chain being observed
    pub chain: ChainId,

    /// Overall health status
    pub status: HealthStatus,

    /// Current tick phase
    pub state: ObserverState,

    /// Last processed height
    pub watermark: Option<u64>,

    /// Last head read from the chain
    pub last_head: Option<u64>,

    /// Effective block window for the next scan
    pub window: u64,

    /// Faulted ticks since the last success
    pub consecutive_failures: u32,

    /// Last error message (if any)
    pub last_error: Option<String>,

    /// Time of the last successful tick
    pub last_success: Option<DateTime<Utc>>,

    /// Timestamp of the snapshot
    pub timestamp: DateTime<Utc>,

    /// Counters
    pub metrics: ObserverMetrics,
}

impl ObserverHealth {
    /// Check if the observer is healthy
    pub fn is_healthy(&self) -> bool {
        matches!(self.status, HealthStatus::Healthy)
    }

    /// Check if the observer is degraded
    pub fn is_degraded(&self) -> bool {
        matches!(self.status, HealthStatus::Degraded)
    }

    /// Check if the observer is unhealthy
    pub fn is_unhealthy(&self) -> bool {
        matches!(self.status, HealthStatus::Unhealthy)
    }
}

/// Mutable observer status, written by the observer task
#[derive(Debug, Clone)]
pub(crate) struct ObserverStatus {
    pub state: ObserverState,
    pub last_head: Option<u64>,
    pub window: u64,
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
    pub last_success: Option<DateTime<Utc>>,
    pub metrics: ObserverMetrics,
}

impl ObserverStatus {
    pub(crate) fn new(window: u64) -> Self {
        Self {
            state: ObserverState::Idle,
            last_head: None,
            window,
            consecutive_failures: 0,
            last_error: None,
            last_success: None,
            metrics: ObserverMetrics::default(),
        }
    }

    pub(crate) fn record_success(&mut self) {
        self.state = ObserverState::Idle;
        self.consecutive_failures = 0;
        self.last_error = None;
        self.last_success = Some(Utc::now());
    }

    pub(crate) fn record_failure(&mut self, error: String) {
        self.state = ObserverState::Faulted;
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.last_error = Some(error);
    }
}

/// Read-only view of a running observer, for health reporting
#[derive(Debug, Clone)]
pub struct ObserverHandle {
    pub(crate) chain: ChainId,
    pub(crate) status: Arc<RwLock<ObserverStatus>>,
    pub(crate) watermarks: Arc<crate::watermark::WatermarkStore>,
    pub(crate) unhealthy_after: u32,
}

impl ObserverHandle {
    /// Get the observed chain
    pub fn chain(&self) -> &ChainId {
        &self.chain
    }

    /// Get the current tick phase
    pub fn state(&self) -> ObserverState {
        self.status.read().state
    }

    /// Get a copy of the observer counters
    pub fn metrics(&self) -> ObserverMetrics {
        self.status.read().metrics.clone()
    }

    /// Build a health snapshot
    pub fn health(&self) -> ObserverHealth {
        let status = self.status.read().clone();
        let health = if status.consecutive_failures >= self.unhealthy_after.max(1) {
            HealthStatus::Unhealthy
        } else if status.consecutive_failures > 0 {
            HealthStatus::Degraded
        } else if status.last_success.is_some() {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unknown
        };

        ObserverHealth {
            chain: self.chain.clone(),
            status: health,
            state: status.state,
            watermark: self.watermarks.get(&self.chain),
            last_head: status.last_head,
            window: status.window,
            consecutive_failures: status.consecutive_failures,
            last_error: status.last_error,
            last_success: status.last_success,
            timestamp: Utc::now(),
            metrics: status.metrics,
        }
    }
}
