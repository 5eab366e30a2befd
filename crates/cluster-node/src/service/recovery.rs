use std::future::Future;

use crate::domain::NodeError;
use crate::service::Node;

impl Node {
    /// Run `operation`; on `Unauthorized`, mark the description unknown and
    /// return the same error.
    ///
    /// Other errors pass through without touching the description. The node
    /// recovers at its next heartbeat.
    pub async fn handle_auth_failure<T, F, Fut>(&self, operation: F) -> Result<T, NodeError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, NodeError>>,
    {
        match operation().await {
            Err(e) if e.is_unauthorized() => {
                self.monitor.mark_unknown(&e.to_string());
                Err(e)
            }
            other => other,
        }
    }

    /// Run `operation`; on a network error, mark the description unknown,
    /// clear the pool and return the same error.
    pub async fn handle_handshake_failure<T, F, Fut>(&self, operation: F) -> Result<T, NodeError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, NodeError>>,
    {
        match operation().await {
            Err(e) if e.is_network_error() => {
                self.monitor.mark_unknown(&e.to_string());
                if let Some(pool) = self.pool.get() {
                    pool.clear();
                }
                Err(e)
            }
            other => other,
        }
    }

    /// Sessions supported, a logical session timeout reported, and not a
    /// standalone server. Read from one snapshot on every call.
    pub fn eligible_for_retryable_writes(&self) -> bool {
        let description = self.description();
        description.features().sessions_enabled()
            && description.logical_session_timeout().is_some()
            && !description.is_standalone()
    }

    /// Sessions supported and a logical session timeout reported.
    pub fn eligible_for_retryable_reads(&self) -> bool {
        let description = self.description();
        description.features().sessions_enabled() && description.logical_session_timeout().is_some()
    }
}
