//! JSON-over-HTTP client for the coordinating ledger gateway

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::{
    config::CoordinatorConfig,
    forwarder::traits::{CoordinatorClient, OutboundTransfer, ReceiptConfirmation},
    utils, ChainId, CorrelationId, ObserverError, Result,
};

#[derive(Debug, Deserialize)]
struct LastHeightResponse {
    last_send_height: u64,
}

#[derive(Debug, Deserialize)]
struct SubmissionResponse {
    correlation_id: String,
}

/// Coordinating ledger client speaking JSON over HTTP
#[derive(Debug, Clone)]
pub struct HttpCoordinatorClient {
    base: Url,
    client: Client,
    signer: String,
}

impl HttpCoordinatorClient {
    /// Create a client from configuration
    pub fn new(config: &CoordinatorConfig) -> Result<Self> {
        let mut base = Url::parse(&config.endpoint).map_err(|e| {
            ObserverError::coordinator(format!("Invalid endpoint {}: {}", config.endpoint, e))
        })?;
        // Keep any base path when joining relative routes
        if !base.path().ends_with('/') {
            base.set_path(&format!("{}/", base.path()));
        }

        let client = utils::http_client(std::time::Duration::from_secs(
            config.request_timeout_seconds,
        ))?;

        Ok(Self {
            base,
            client,
            signer: config.signer_name.clone(),
        })
    }

    fn url(&self, route: &str) -> Result<Url> {
        self.base
            .join(route)
            .map_err(|e| ObserverError::coordinator(format!("Invalid route {}: {}", route, e)))
    }

    async fn post<B: Serialize + ?Sized>(&self, route: &str, body: &B) -> Result<CorrelationId> {
        let url = self.url(route).map_err(|e| ObserverError::submit(e.to_string()))?;
        let response = self
            .client
            .post(url)
            .header("x-signer", &self.signer)
            .json(body)
            .send()
            .await
            .map_err(|e| ObserverError::submit(format!("POST {} failed: {}", route, e)))?;

        let parsed: SubmissionResponse = read_json(response, route)
            .await
            .map_err(|e| ObserverError::submit(e.to_string()))?;
        debug!(route, correlation_id = %parsed.correlation_id, "Submission accepted");
        Ok(CorrelationId(parsed.correlation_id))
    }
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response, route: &str) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ObserverError::coordinator(format!(
            "{} returned {}: {}",
            route, status, body
        )));
    }
    response
        .json::<T>()
        .await
        .map_err(|e| ObserverError::coordinator(format!("Invalid response from {}: {}", route, e)))
}

#[async_trait]
impl CoordinatorClient for HttpCoordinatorClient {
    async fn last_processed_height(&self, chain: &ChainId) -> Result<u64> {
        let route = format!("chains/{}/last-height", chain);
        let response = self
            .client
            .get(self.url(&route)?)
            .send()
            .await
            .map_err(|e| ObserverError::coordinator(format!("GET {} failed: {}", route, e)))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(0);
        }

        let parsed: LastHeightResponse = read_json(response, &route).await?;
        Ok(parsed.last_send_height)
    }

    async fn submit_transfer(&self, transfer: &OutboundTransfer) -> Result<CorrelationId> {
        self.post("transfers", transfer).await
    }

    async fn confirm_receipt(&self, receipt: &ReceiptConfirmation) -> Result<CorrelationId> {
        self.post("receipts", receipt).await
    }
}
