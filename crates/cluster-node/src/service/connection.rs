use std::sync::Arc;

use futures::future::BoxFuture;

use crate::domain::NodeError;
use crate::ports::{Connection, ConnectionPool};
use crate::service::Node;

/// Connection on loan from a pool, returned when the guard drops.
///
/// Dropping covers every way out of `with_connection`: success, error, a
/// panic unwinding through the closure, or the caller dropping the future.
struct CheckedOut {
    pool: Arc<dyn ConnectionPool>,
    /// Filled right after checkout; emptied only by `drop`.
    connection: Option<Box<dyn Connection>>,
}

impl Drop for CheckedOut {
    fn drop(&mut self) {
        if let Some(connection) = self.connection.take() {
            self.pool.check_in(connection);
        }
    }
}

impl Node {
    /// Pool of this node, created through the factory on first call.
    pub fn pool(&self) -> Arc<dyn ConnectionPool> {
        let pool = self
            .pool
            .get_or_init(|| self.pool_factory.create(&self.address, &self.options.pool));
        Arc::clone(pool)
    }

    /// Run `operation` on a pooled connection.
    ///
    /// The connection goes back to the pool however `operation` ends.
    /// Errors from the checkout or from `operation` propagate unchanged.
    ///
    /// ```rust,ignore
    /// let id = node
    ///     .with_connection(|connection| Box::pin(async move { Ok(connection.id()) }))
    ///     .await?;
    /// ```
    pub async fn with_connection<T, F>(&self, operation: F) -> Result<T, NodeError>
    where
        F: for<'c> FnOnce(&'c mut dyn Connection) -> BoxFuture<'c, Result<T, NodeError>>,
    {
        let pool = self.pool();
        let checked_out = pool.check_out().await?;
        let mut guard = CheckedOut {
            pool,
            connection: None,
        };
        let connection = guard.connection.insert(checked_out);

        let result = operation(&mut **connection).await;
        drop(guard);
        result
    }

    /// Check out a connection and ping it. Any failure reads as `false`.
    pub async fn is_connectable(&self) -> bool {
        self.with_connection(|connection| connection.ping())
            .await
            .is_ok()
    }
}
