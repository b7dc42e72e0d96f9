mod datastore_adapter;
mod postgres_datastore;
mod sqlite_datastore;

pub use datastore_adapter::DatastoreAdapter;
pub use postgres_datastore::PostgresDatastore;
pub use sqlite_datastore::SqliteDatastore;
