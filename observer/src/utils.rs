//! Utility functions and helpers for the observer

use std::time::Duration;
use tokio::time::timeout;
use tracing::warn;

use crate::{ObserverError, Result};

/// Execute an operation with a deadline.
///
/// On expiry the future is dropped and `on_timeout` builds the error returned.
pub async fn with_deadline<F, T, E>(
    future: F,
    deadline: Duration,
    operation_name: &str,
    on_timeout: E,
) -> Result<T>
where
    F: std::future::Future<Output = Result<T>>,
    E: FnOnce(String) -> ObserverError,
{
    match timeout(deadline, future).await {
        Ok(result) => result,
        Err(_) => {
            warn!(
                operation = operation_name,
                timeout_ms = deadline.as_millis() as u64,
                "Operation timed out"
            );
            Err(on_timeout(format!(
                "Operation '{}' timed out after {}ms",
                operation_name,
                deadline.as_millis()
            )))
        }
    }
}

/// Build an HTTP client with a request timeout
pub fn http_client(request_timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(request_timeout)
        .build()
        .map_err(|e| ObserverError::internal(format!("Failed to create HTTP client: {}", e)))
}

/// Render bytes as 0x-prefixed lowercase hex
pub fn to_hex_prefixed(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}
