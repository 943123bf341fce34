//! Chain connectors
//!
//! A connector is the observer's only view of a source chain: the current
//! head and the bridge contract's logs over a bounded block range.

pub mod rpc;
pub mod traits;

pub use rpc::EthRpcConnector;
pub use traits::ChainConnector;
