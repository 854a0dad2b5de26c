//! Registry of monitored endpoints sharing one outcome stream.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{Dispatch, info};
use uuid::Uuid;

use crate::endpoint::{Endpoint, EndpointConfig, EndpointSnapshot};
use crate::error::Result;
use crate::monitoring::{DEFAULT_OUTCOME_BUFFER, OutcomeSender, OutcomeStream, outcome_channel};

struct Inner {
    endpoints: HashMap<Uuid, Arc<Endpoint>>,
    running: bool,
}

/// Owns the endpoints, their loops and the outcome stream they feed.
///
/// Every loop logs through the `logger` handed to [`Registry::new`]; the
/// registry never installs a global subscriber.
pub struct Registry {
    inner: RwLock<Inner>,
    outcome_tx: OutcomeSender,
    outcomes: OutcomeStream,
    logger: Dispatch,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry").field("outcomes", &self.outcomes).finish_non_exhaustive()
    }
}

impl Registry {
    /// Build a stopped registry with the default outcome buffer
    pub fn new(configs: impl IntoIterator<Item = EndpointConfig>, logger: Dispatch) -> Result<Self> {
        Self::with_buffer(configs, logger, DEFAULT_OUTCOME_BUFFER)
    }

    /// Build a stopped registry whose outcome stream holds up to `capacity`
    /// undelivered outcomes. A later config with an already used id
    /// replaces the earlier one.
    pub fn with_buffer(
        configs: impl IntoIterator<Item = EndpointConfig>,
        logger: Dispatch,
        capacity: usize,
    ) -> Result<Self> {
        let mut endpoints = HashMap::new();
        for config in configs {
            let endpoint = Endpoint::new(config)?;
            endpoints.insert(endpoint.id(), Arc::new(endpoint));
        }

        let (outcome_tx, outcomes) = outcome_channel(capacity);
        Ok(Self {
            inner: RwLock::new(Inner { endpoints, running: false }),
            outcome_tx,
            outcomes,
            logger,
        })
    }

    /// Add an endpoint, or replace the one with the same id.
    ///
    /// A replaced endpoint's loop is stopped. The new endpoint starts right
    /// away when the registry is running.
    pub async fn add_endpoint(&self, config: EndpointConfig) -> Result<Arc<Endpoint>> {
        let endpoint = Arc::new(Endpoint::new(config)?);

        let mut inner = self.inner.write().await;
        let replaced = inner.endpoints.insert(endpoint.id(), endpoint.clone());
        if let Some(previous) = &replaced {
            previous.stop();
        }
        let started = inner.running && self.start(&endpoint);

        self.log(|| {
            info!(
                endpoint = %endpoint.id(),
                name = %endpoint.config().display_name(),
                replaced = replaced.is_some(),
                started,
                "Endpoint added"
            )
        });
        Ok(endpoint)
    }

    /// Stop and forget an endpoint. Unknown ids are ignored.
    pub async fn remove_endpoint(&self, id: Uuid) -> bool {
        let mut inner = self.inner.write().await;
        let Some(endpoint) = inner.endpoints.remove(&id) else {
            return false;
        };
        endpoint.stop();

        self.log(|| info!(endpoint = %id, "Endpoint removed"));
        true
    }

    /// Start every endpoint. A registry that is already running is left
    /// alone, so loops that ended on exhausted retries stay stopped.
    pub async fn start_all(&self) {
        let mut inner = self.inner.write().await;
        if inner.running {
            return;
        }
        inner.running = true;
        let started = inner.endpoints.values().filter(|endpoint| self.start(endpoint)).count();

        self.log(|| info!(started, total = inner.endpoints.len(), "Monitoring all endpoints"));
    }

    /// Signal every loop to stop
    pub async fn stop_all(&self) {
        let mut inner = self.inner.write().await;
        inner.running = false;
        let stopped = inner.endpoints.values().filter(|endpoint| endpoint.stop()).count();

        self.log(|| info!(stopped, "Stopped monitoring"));
    }

    /// Handle on the outcome stream. Clones share one queue.
    pub fn outcome_stream(&self) -> OutcomeStream {
        self.outcomes.clone()
    }

    pub async fn get_endpoint(&self, id: Uuid) -> Option<EndpointSnapshot> {
        self.inner.read().await.endpoints.get(&id).map(|endpoint| endpoint.snapshot())
    }

    /// Snapshots of all endpoints, oldest first
    pub async fn list_endpoints(&self) -> Vec<EndpointSnapshot> {
        let inner = self.inner.read().await;
        let mut snapshots: Vec<_> = inner.endpoints.values().map(|endpoint| endpoint.snapshot()).collect();
        snapshots.sort_by_key(|snapshot| (snapshot.config.created_at, snapshot.config.id));
        snapshots
    }

    pub async fn is_running(&self) -> bool {
        self.inner.read().await.running
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.endpoints.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.endpoints.is_empty()
    }

    fn start(&self, endpoint: &Arc<Endpoint>) -> bool {
        endpoint.start(self.outcome_tx.clone(), self.logger.clone())
    }

    fn log(&self, event: impl FnOnce()) {
        tracing::dispatcher::with_default(&self.logger, event)
    }
}

impl Drop for Registry {
    fn drop(&mut self) {
        for endpoint in self.inner.get_mut().endpoints.values() {
            endpoint.stop();
        }
    }
}
