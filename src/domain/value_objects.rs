//! Value Objects - Immutable domain primitives
//!
//! Value objects are identified by their value rather than identity.
//! They are immutable and can be freely shared.

use crate::domain::ports::DatastoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use url::Url;

/// Relational datastore flavour, derived from the URL scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatastoreKind {
    /// PostgreSQL (`postgres://` or `postgresql://`)
    Postgres,
    /// SQLite file or in-memory database (`sqlite:`)
    Sqlite,
}

impl DatastoreKind {
    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::Sqlite => "sqlite",
        }
    }
}

impl fmt::Display for DatastoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed datastore connection URL.
///
/// Keeps the raw URL for the driver and knows how to render a redacted
/// copy that is safe to put in log lines.
#[derive(Clone, PartialEq, Eq)]
pub struct DatastoreUrl {
    raw: String,
    kind: DatastoreKind,
}

impl DatastoreUrl {
    /// Parse a datastore URL.
    ///
    /// # Examples
    /// ```
    /// use storefront_db::domain::value_objects::{DatastoreKind, DatastoreUrl};
    ///
    /// let url = DatastoreUrl::parse("postgres://shop:secret@db:5432/storefront").unwrap();
    /// assert_eq!(url.kind(), DatastoreKind::Postgres);
    /// assert_eq!(url.redacted(), "postgres://shop:***@db:5432/storefront");
    /// ```
    pub fn parse(raw: &str) -> Result<Self, DatastoreError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(DatastoreError::Config("database URL is empty".to_string()));
        }

        let scheme = raw
            .split_once(':')
            .map(|(scheme, _)| scheme.to_ascii_lowercase())
            .ok_or_else(|| DatastoreError::Config(format!("database URL has no scheme: {}", raw)))?;

        let kind = match scheme.as_str() {
            "postgres" | "postgresql" => DatastoreKind::Postgres,
            "sqlite" => DatastoreKind::Sqlite,
            other => {
                return Err(DatastoreError::Config(format!(
                    "unsupported database scheme: {}",
                    other
                )))
            }
        };

        if kind == DatastoreKind::Postgres {
            Url::parse(raw)
                .map_err(|e| DatastoreError::Config(format!("invalid database URL: {}", e)))?;
        }

        Ok(Self {
            raw: raw.to_string(),
            kind,
        })
    }

    /// The datastore flavour.
    pub fn kind(&self) -> DatastoreKind {
        self.kind
    }

    /// The URL exactly as configured. Contains credentials.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// File path of a SQLite URL (`sqlite://path`, `sqlite:path`).
    pub fn sqlite_path(&self) -> Option<&str> {
        if self.kind != DatastoreKind::Sqlite {
            return None;
        }
        let rest = &self.raw["sqlite:".len()..];
        let rest = rest.strip_prefix("//").unwrap_or(rest);
        Some(rest.split('?').next().unwrap_or(rest))
    }

    /// The URL with its password masked.
    pub fn redacted(&self) -> String {
        match Url::parse(&self.raw) {
            Ok(mut url) if url.password().is_some() => {
                let _ = url.set_password(Some("***"));
                url.to_string()
            }
            _ => self.raw.clone(),
        }
    }
}

impl fmt::Debug for DatastoreUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatastoreUrl")
            .field("url", &self.redacted())
            .field("kind", &self.kind)
            .finish()
    }
}

impl fmt::Display for DatastoreUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.redacted())
    }
}

/// Fixed parameters of the pooled client, read once at start-up.
#[derive(Debug, Clone)]
pub struct DatastoreSettings {
    /// Where to connect
    pub url: DatastoreUrl,
    /// Pool size limit
    pub max_connections: u32,
    /// How long to wait for a free pooled connection
    pub pool_timeout: Duration,
    /// How long a single connect may take
    pub connect_timeout: Duration,
    /// Per-statement socket timeout
    pub socket_timeout: Duration,
    /// Refuse plaintext connections
    pub tls_required: bool,
}

impl DatastoreSettings {
    /// Settings with the default pool parameters.
    pub fn new(url: DatastoreUrl) -> Self {
        Self {
            url,
            max_connections: 10,
            pool_timeout: Duration::from_secs(20),
            connect_timeout: Duration::from_secs(10),
            socket_timeout: Duration::from_secs(30),
            tls_required: false,
        }
    }
}
