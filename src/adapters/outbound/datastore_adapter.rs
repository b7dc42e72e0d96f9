//! Datastore Adapter Selection
//!
//! Picks the concrete datastore from the configured URL scheme.

use super::{PostgresDatastore, SqliteDatastore};
use crate::domain::ports::{Datastore, DatastoreError};
use crate::domain::value_objects::{DatastoreKind, DatastoreSettings};
use async_trait::async_trait;

/// Any supported datastore.
pub enum DatastoreAdapter {
    Postgres(PostgresDatastore),
    Sqlite(SqliteDatastore),
}

impl DatastoreAdapter {
    /// Build the adapter matching the URL scheme. Does not connect.
    pub fn from_settings(settings: &DatastoreSettings) -> Result<Self, DatastoreError> {
        match settings.url.kind() {
            DatastoreKind::Postgres => Ok(Self::Postgres(PostgresDatastore::new(settings)?)),
            DatastoreKind::Sqlite => Ok(Self::Sqlite(SqliteDatastore::from_settings(settings)?)),
        }
    }

    fn inner(&self) -> &dyn Datastore {
        match self {
            Self::Postgres(store) => store,
            Self::Sqlite(store) => store,
        }
    }
}

#[async_trait]
impl Datastore for DatastoreAdapter {
    fn kind(&self) -> DatastoreKind {
        self.inner().kind()
    }

    async fn connect(&self) -> Result<(), DatastoreError> {
        self.inner().connect().await
    }

    async fn ping(&self) -> Result<(), DatastoreError> {
        self.inner().ping().await
    }

    async fn close(&self) -> Result<(), DatastoreError> {
        self.inner().close().await
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::domain::value_objects::DatastoreUrl;

    fn settings(url: &str) -> DatastoreSettings {
        DatastoreSettings::new(DatastoreUrl::parse(url).unwrap())
    }

    #[tokio::test]
    async fn test_selects_postgres() {
        let adapter = DatastoreAdapter::from_settings(&settings("postgres://localhost/storefront")).unwrap();
        assert!(matches!(adapter, DatastoreAdapter::Postgres(_)));
        assert_eq!(adapter.kind(), DatastoreKind::Postgres);
    }

    #[tokio::test]
    async fn test_selects_sqlite_and_delegates() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("shop.db").display());
        let adapter = DatastoreAdapter::from_settings(&settings(&url)).unwrap();

        assert!(matches!(adapter, DatastoreAdapter::Sqlite(_)));
        assert_eq!(adapter.kind(), DatastoreKind::Sqlite);
        adapter.connect().await.unwrap();
        adapter.ping().await.unwrap();
        adapter.close().await.unwrap();
        assert_eq!(adapter.ping().await, Err(DatastoreError::Closed));
    }
}
