//! SQLite Datastore
//!
//! Implements Datastore on a single rusqlite connection. All blocking calls
//! run on the blocking thread pool.

use crate::domain::ports::{Datastore, DatastoreError};
use crate::domain::value_objects::{DatastoreKind, DatastoreSettings};
use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::Connection;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// SQLite-backed datastore, for local development and tests.
pub struct SqliteDatastore {
    path: String,
    busy_timeout: Duration,
    conn: Arc<Mutex<Option<Connection>>>,
    closed: Arc<AtomicBool>,
}

impl SqliteDatastore {
    /// Create an unconnected datastore for a database file.
    pub fn new(path: impl Into<String>, busy_timeout: Duration) -> Self {
        Self {
            path: path.into(),
            busy_timeout,
            conn: Arc::new(Mutex::new(None)),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Create from pooled-client settings; the URL must be `sqlite:`.
    pub fn from_settings(settings: &DatastoreSettings) -> Result<Self, DatastoreError> {
        let path = settings.url.sqlite_path().ok_or_else(|| {
            DatastoreError::Config(format!("not a sqlite URL: {}", settings.url))
        })?;
        Ok(Self::new(path, settings.socket_timeout))
    }

    /// Database file path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Run `f` against the open connection on the blocking pool.
    pub async fn call<T, F>(&self, f: F) -> Result<T, DatastoreError>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        run_blocking(move || {
            let guard = conn.lock();
            let conn = guard.as_ref().ok_or(DatastoreError::Unavailable)?;
            f(conn).map_err(|e| DatastoreError::Query(e.to_string()))
        })
        .await
    }

    fn open(path: &str, busy_timeout: Duration) -> Result<Connection, DatastoreError> {
        let conn = Connection::open(path).map_err(|e| DatastoreError::Connect(e.to_string()))?;
        conn.busy_timeout(busy_timeout)
            .map_err(|e| DatastoreError::Connect(e.to_string()))?;
        Ok(conn)
    }

    fn select_one(conn: &Connection) -> Result<(), DatastoreError> {
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .map(|_| ())
            .map_err(|e| DatastoreError::Query(e.to_string()))
    }
}

async fn run_blocking<T, F>(f: F) -> Result<T, DatastoreError>
where
    F: FnOnce() -> Result<T, DatastoreError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| DatastoreError::Query(format!("spawn_blocking error: {}", e)))?
}

#[async_trait]
impl Datastore for SqliteDatastore {
    fn kind(&self) -> DatastoreKind {
        DatastoreKind::Sqlite
    }

    async fn connect(&self) -> Result<(), DatastoreError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(DatastoreError::Closed);
        }

        let conn = self.conn.clone();
        let closed = self.closed.clone();
        let path = self.path.clone();
        let busy_timeout = self.busy_timeout;

        run_blocking(move || {
            let fresh = Self::open(&path, busy_timeout)?;
            Self::select_one(&fresh)?;

            // close() may have run while the file was opening
            let mut guard = conn.lock();
            if closed.load(Ordering::SeqCst) {
                return Err(DatastoreError::Closed);
            }
            *guard = Some(fresh);
            Ok(())
        })
        .await
    }

    async fn ping(&self) -> Result<(), DatastoreError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(DatastoreError::Closed);
        }

        let conn = self.conn.clone();
        let closed = self.closed.clone();
        let path = self.path.clone();
        let busy_timeout = self.busy_timeout;

        run_blocking(move || {
            let mut guard = conn.lock();
            if closed.load(Ordering::SeqCst) {
                return Err(DatastoreError::Closed);
            }
            if guard.is_none() {
                *guard = Some(Self::open(&path, busy_timeout)?);
            }
            match guard.as_ref() {
                Some(conn) => Self::select_one(conn),
                None => Err(DatastoreError::Unavailable),
            }
        })
        .await
    }

    async fn close(&self) -> Result<(), DatastoreError> {
        self.closed.store(true, Ordering::SeqCst);

        let conn = self.conn.clone();
        run_blocking(move || match conn.lock().take() {
            Some(conn) => conn
                .close()
                .map_err(|(_, e)| DatastoreError::Close(e.to_string())),
            None => Ok(()),
        })
        .await
    }
}
