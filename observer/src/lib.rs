//! # Crosslink Observer
//!
//! Watches source chains for bridge contract events and relays them to the
//! coordinating ledger. One observer runs per configured chain; each polls its
//! RPC endpoint, scans bounded block windows past its watermark, decodes the
//! bridge events it recognizes and forwards them.

pub mod config;
pub mod connector;
pub mod decoder;
pub mod error;
pub mod forwarder;
pub mod observers;
pub mod supervisor;
pub mod types;
pub mod utils;
pub mod watermark;

// Re-export commonly used types
pub use config::ObserverConfig;
pub use error::{ObserverError, Result};
pub use types::*;

/// Current version of the observer
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Identifier of a source or destination chain, as named in configuration
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct ChainId(String);

impl ChainId {
    /// Create a chain id from any string-like value
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self(id.into())
    }

    /// Get the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ChainId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ChainId {
    type Err = ObserverError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ObserverError::InvalidChain(s.to_string()));
        }
        Ok(ChainId(trimmed.to_string()))
    }
}

impl From<&str> for ChainId {
    fn from(s: &str) -> Self {
        ChainId(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_id_parsing() {
        let chain: ChainId = " goerli ".parse().unwrap();
        assert_eq!(chain.as_str(), "goerli");
        assert_eq!(chain.to_string(), "goerli");

        assert!("".parse::<ChainId>().is_err());
        assert!("   ".parse::<ChainId>().is_err());
    }
}
