//! Chain observers
//!
//! One observer runs per configured chain. It owns its connector and
//! decoder, and shares the forwarder and watermark store with the others.

pub mod chain;
pub mod traits;

// Re-export commonly used types
pub use chain::ChainObserver;
pub use traits::{
    HealthStatus, ObserverHandle, ObserverHealth, ObserverMetrics, ObserverState, TickOutcome,
};
