//! PostgreSQL Datastore
//!
//! Implements Datastore on a sqlx connection pool.

use crate::domain::ports::{Datastore, DatastoreError};
use crate::domain::value_objects::{DatastoreKind, DatastoreSettings};
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgSslMode};
use std::str::FromStr;
use std::time::Duration;

/// PostgreSQL-backed datastore.
///
/// The pool is created lazily: no link is opened until `connect` or the
/// first query, so construction never fails on an unreachable server.
pub struct PostgresDatastore {
    pool: PgPool,
    connect_timeout: Duration,
}

impl PostgresDatastore {
    /// Build the pool from the configured parameters.
    pub fn new(settings: &DatastoreSettings) -> Result<Self, DatastoreError> {
        let options = Self::connect_options(settings)?;

        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .acquire_timeout(settings.pool_timeout)
            .test_before_acquire(true)
            .connect_lazy_with(options);

        tracing::debug!(
            "PostgreSQL pool configured for {} (max={}, tls_required={})",
            settings.url,
            settings.max_connections,
            settings.tls_required
        );

        Ok(Self {
            pool,
            connect_timeout: settings.connect_timeout,
        })
    }

    fn connect_options(settings: &DatastoreSettings) -> Result<PgConnectOptions, DatastoreError> {
        let mut options = PgConnectOptions::from_str(settings.url.as_str())
            .map_err(|e| DatastoreError::Config(e.to_string()))?;

        if settings.tls_required {
            options = options.ssl_mode(PgSslMode::Require);
        }

        // Server-side guard against statements hanging on a dead socket
        let statement_timeout = settings.socket_timeout.as_millis().to_string();
        Ok(options.options([("statement_timeout", statement_timeout)]))
    }

    /// The pool, for issuing application queries.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn map_sqlx_error(e: sqlx::Error) -> DatastoreError {
    match e {
        sqlx::Error::PoolClosed => DatastoreError::Closed,
        sqlx::Error::PoolTimedOut => DatastoreError::Unavailable,
        other => DatastoreError::Query(other.to_string()),
    }
}

#[async_trait]
impl Datastore for PostgresDatastore {
    fn kind(&self) -> DatastoreKind {
        DatastoreKind::Postgres
    }

    async fn connect(&self) -> Result<(), DatastoreError> {
        if self.pool.is_closed() {
            return Err(DatastoreError::Closed);
        }

        match tokio::time::timeout(self.connect_timeout, self.pool.acquire()).await {
            Ok(Ok(_conn)) => Ok(()),
            Ok(Err(sqlx::Error::PoolClosed)) => Err(DatastoreError::Closed),
            Ok(Err(e)) => Err(DatastoreError::Connect(e.to_string())),
            Err(_) => Err(DatastoreError::Timeout(self.connect_timeout)),
        }
    }

    async fn ping(&self) -> Result<(), DatastoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(map_sqlx_error)
    }

    async fn close(&self) -> Result<(), DatastoreError> {
        self.pool.close().await;
        Ok(())
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::domain::value_objects::DatastoreUrl;

    fn settings(url: &str) -> DatastoreSettings {
        DatastoreSettings {
            max_connections: 3,
            pool_timeout: Duration::from_millis(200),
            connect_timeout: Duration::from_millis(500),
            socket_timeout: Duration::from_secs(5),
            ..DatastoreSettings::new(DatastoreUrl::parse(url).unwrap())
        }
    }

    #[tokio::test]
    async fn test_new_is_lazy() {
        // Nothing listens on port 1; construction must still succeed
        let store = PostgresDatastore::new(&settings("postgres://shop:pw@127.0.0.1:1/storefront")).unwrap();

        assert_eq!(store.kind(), DatastoreKind::Postgres);
        assert_eq!(store.pool().options().get_max_connections(), 3);
        assert_eq!(store.pool().size(), 0);
    }

    #[tokio::test]
    async fn test_tls_required_sets_ssl_mode() {
        let mut cfg = settings("postgres://localhost/storefront");
        cfg.tls_required = true;

        let options = PostgresDatastore::connect_options(&cfg).unwrap();
        assert!(matches!(options.get_ssl_mode(), PgSslMode::Require));
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let store = PostgresDatastore::new(&settings("postgres://shop:pw@127.0.0.1:1/storefront")).unwrap();

        let result = store.connect().await;
        assert!(matches!(
            result,
            Err(DatastoreError::Connect(_)) | Err(DatastoreError::Timeout(_))
        ));
    }

    #[tokio::test]
    async fn test_closed_pool_rejects() {
        let store = PostgresDatastore::new(&settings("postgres://127.0.0.1:1/storefront")).unwrap();

        store.close().await.unwrap();

        assert_eq!(store.connect().await, Err(DatastoreError::Closed));
        assert_eq!(store.ping().await, Err(DatastoreError::Closed));
    }

    #[test]
    fn test_map_sqlx_error() {
        assert_eq!(map_sqlx_error(sqlx::Error::PoolClosed), DatastoreError::Closed);
        assert_eq!(map_sqlx_error(sqlx::Error::PoolTimedOut), DatastoreError::Unavailable);
        assert!(matches!(
            map_sqlx_error(sqlx::Error::RowNotFound),
            DatastoreError::Query(_)
        ));
    }
}
