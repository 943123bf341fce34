//! Supervision of per-chain observer tasks

use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::{
    config::ObserverConfig,
    connector::{ChainConnector, EthRpcConnector},
    forwarder::RelayForwarder,
    observers::{ChainObserver, ObserverHandle, ObserverHealth},
    watermark::WatermarkStore,
    ChainId, ObserverError, Result,
};

/// Runs one observer task per chain and stops them together
pub struct Supervisor {
    forwarder: Arc<RelayForwarder>,
    watermarks: Arc<WatermarkStore>,
    cancel: CancellationToken,
    shutdown_timeout: Duration,
    handles: Vec<ObserverHandle>,
    tasks: Vec<(ChainId, JoinHandle<Result<()>>)>,
}

impl Supervisor {
    /// Create a supervisor with no running observers
    pub fn new(
        forwarder: Arc<RelayForwarder>,
        watermarks: Arc<WatermarkStore>,
        shutdown_timeout: Duration,
    ) -> Self {
        Self {
            forwarder,
            watermarks,
            cancel: CancellationToken::new(),
            shutdown_timeout,
            handles: Vec::new(),
            tasks: Vec::new(),
        }
    }

    /// Start an RPC-backed observer for every enabled chain, optionally
    /// restricted to `only`
    pub fn start(
        config: &ObserverConfig,
        only: Option<&[ChainId]>,
        forwarder: Arc<RelayForwarder>,
    ) -> Result<Self> {
        let chains = config.enabled_chains(only);
        if chains.is_empty() {
            return Err(ObserverError::internal("No enabled chains to observe"));
        }

        let mut supervisor = Self::new(
            forwarder,
            Arc::new(WatermarkStore::new()),
            Duration::from_secs(config.global.shutdown_timeout_seconds),
        );

        for (chain, chain_config) in chains {
            let connector = EthRpcConnector::new(chain.clone(), &chain_config)?;
            let observer = ChainObserver::new(
                chain,
                &chain_config,
                connector,
                Arc::clone(&supervisor.forwarder),
                Arc::clone(&supervisor.watermarks),
            )?
            .with_unhealthy_after(config.global.unhealthy_after_failures);
            supervisor.spawn(observer);
        }

        Ok(supervisor)
    }

    /// Spawn an observer on the runtime
    pub fn spawn<C: ChainConnector + 'static>(&mut self, observer: ChainObserver<C>) {
        let chain = observer.chain().clone();
        info!(chain = %chain, "Spawning observer task");

        self.handles.push(observer.handle());
        let cancel = self.cancel.child_token();
        self.tasks
            .push((chain, tokio::spawn(async move { observer.run(cancel).await })));
    }

    /// Chains with a running task
    pub fn chains(&self) -> Vec<ChainId> {
        self.tasks.iter().map(|(chain, _)| chain.clone()).collect()
    }

    /// Get the shared watermark store
    pub fn watermarks(&self) -> Arc<WatermarkStore> {
        Arc::clone(&self.watermarks)
    }

    /// Token cancelled on shutdown
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Health of every observer
    pub fn health(&self) -> Vec<ObserverHealth> {
        self.handles.iter().map(|handle| handle.health()).collect()
    }

    /// Cancel all observers and wait for them, aborting stragglers after the
    /// shutdown timeout
    pub async fn shutdown(mut self) -> Result<()> {
        info!(tasks = self.tasks.len(), "Stopping observers");
        self.cancel.cancel();

        let joined = tokio::time::timeout(
            self.shutdown_timeout,
            join_all(self.tasks.iter_mut().map(|(_, task)| task)),
        )
        .await;

        match joined {
            Ok(results) => {
                for ((chain, _), result) in self.tasks.iter().zip(results) {
                    match result {
                        Ok(Ok(())) => info!(chain = %chain, "Observer stopped"),
                        Ok(Err(e)) => error!(chain = %chain, error = %e, "Observer failed"),
                        Err(e) => error!(chain = %chain, error = %e, "Observer task panicked"),
                    }
                }
                Ok(())
            }
            Err(_) => {
                warn!(
                    timeout_s = self.shutdown_timeout.as_secs(),
                    "Observers did not stop in time, aborting"
                );
                for (_, task) in &self.tasks {
                    task.abort();
                }
                Err(ObserverError::internal("Shutdown timed out"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChainConfig;

    #[test]
    fn test_start_requires_enabled_chains() {
        let forwarder = Arc::new(RelayForwarder::new(Arc::new(
            crate::forwarder::traits::MockCoordinatorClient::new(),
        )));
        let result = Supervisor::start(&ObserverConfig::default(), None, forwarder);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_start_and_shutdown() {
        let mut config = ObserverConfig::default();
        config.chains.insert(
            ChainId::new("goerli"),
            ChainConfig {
                endpoint: "http://127.0.0.1:1".to_string(),
                ..Default::default()
            },
        );
        config.chains.insert(
            ChainId::new("mumbai"),
            ChainConfig {
                endpoint: "http://127.0.0.1:1".to_string(),
                ..Default::default()
            },
        );

        let mut coordinator = crate::forwarder::traits::MockCoordinatorClient::new();
        coordinator
            .expect_last_processed_height()
            .returning(|_| Ok(0));
        let forwarder = Arc::new(RelayForwarder::new(Arc::new(coordinator)));

        let only = [ChainId::new("mumbai")];
        let supervisor = Supervisor::start(&config, Some(&only), forwarder).unwrap();
        assert_eq!(supervisor.chains(), vec![ChainId::new("mumbai")]);
        assert_eq!(supervisor.health().len(), 1);

        supervisor.shutdown().await.unwrap();
    }
}
