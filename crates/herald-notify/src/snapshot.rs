//! Snapshot loader
//!
//! Bounded, time-limited read of the most recent notifications of one identity.
//! Rows are normalized before they reach the store: rows of other identities
//! are dropped, the rest are sorted newest first and cut to the page size.

use crate::config::EngineConfig;
use crate::errors::RetrievalError;
use herald_core::effects::{FetchQuery, NotificationBackend};
use herald_core::reliability::RetryPolicy;
use herald_core::{IdentityId, Namespace, Notification};
use std::sync::Arc;
use std::time::Duration;

/// Loads the most recent page of notifications for an identity
#[derive(Clone)]
pub struct SnapshotLoader {
    backend: Arc<dyn NotificationBackend>,
    namespace: Namespace,
    page_size: usize,
    timeout: Duration,
    retry: RetryPolicy,
}

impl SnapshotLoader {
    /// Loader configured from the engine configuration
    pub fn new(backend: Arc<dyn NotificationBackend>, config: &EngineConfig) -> Self {
        Self {
            backend,
            namespace: config.namespace,
            page_size: config.effective_page_size(),
            timeout: config.snapshot_timeout(),
            retry: config.snapshot_policy(),
        }
    }

    /// Single load attempt bounded by the configured timeout.
    pub async fn load(&self, identity: IdentityId) -> Result<Vec<Notification>, RetrievalError> {
        let query = FetchQuery::most_recent(self.namespace, identity, self.page_size);
        let rows = tokio::time::timeout(self.timeout, self.backend.fetch(&query))
            .await
            .map_err(|_| RetrievalError::Timeout {
                timeout: self.timeout,
            })?
            .map_err(RetrievalError::Backend)?;

        Ok(self.normalize(identity, rows))
    }

    /// Load with retries on transient failures.
    pub async fn load_with_retry(
        &self,
        identity: IdentityId,
    ) -> Result<Vec<Notification>, RetrievalError> {
        let outcome = self
            .retry
            .execute_while(|| self.load(identity), RetrievalError::is_transient)
            .await;

        match &outcome.result {
            Ok(rows) => tracing::debug!(
                %identity,
                namespace = %self.namespace,
                rows = rows.len(),
                attempts = outcome.attempts,
                "snapshot loaded"
            ),
            Err(error) => tracing::warn!(
                %identity,
                namespace = %self.namespace,
                attempts = outcome.attempts,
                %error,
                "snapshot load failed"
            ),
        }
        outcome.into_result()
    }

    fn normalize(&self, identity: IdentityId, rows: Vec<Notification>) -> Vec<Notification> {
        let fetched = rows.len();
        let mut rows: Vec<Notification> =
            rows.into_iter().filter(|n| n.owner == identity).collect();
        if rows.len() < fetched {
            tracing::warn!(
                %identity,
                dropped = fetched - rows.len(),
                "snapshot contained rows of another identity"
            );
        }
        rows.sort_by(Notification::canonical_cmp);
        rows.truncate(self.page_size);
        rows
    }
}

impl std::fmt::Debug for SnapshotLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotLoader")
            .field("namespace", &self.namespace)
            .field("page_size", &self.page_size)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
