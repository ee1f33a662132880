//! Engine configuration.
//!
//! Configuration is plain data with sensible defaults. It can be built in
//! code with the `with_*` methods or loaded from YAML or JSON:
//!
//! ```yaml
//! workers: 4
//! queue_capacity: 8192
//! query:
//!   endpoint:
//!     unix: /var/ossec/queue/db/wdb
//!   timeout_ms: 1000
//!   pool_size: 4
//!   framing: length_prefixed
//! ```

use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default location of the companion store socket.
pub const DEFAULT_QUERY_SOCKET: &str = "/var/ossec/queue/db/wdb";

/// Where the companion store listens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Endpoint {
    /// Local stream socket at the given path.
    Unix(PathBuf),
    /// TCP address in `host:port` form, resolved on every connect.
    Tcp(String),
}

impl Default for Endpoint {
    fn default() -> Self {
        Endpoint::Unix(PathBuf::from(DEFAULT_QUERY_SOCKET))
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Endpoint::Unix(path) => write!(f, "unix:{}", path.display()),
            Endpoint::Tcp(addr) => write!(f, "tcp:{addr}"),
        }
    }
}

/// How messages are delimited on the query socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Framing {
    /// 4-byte little-endian length header followed by the payload.
    #[default]
    LengthPrefixed,
    /// Payload terminated by `\n`.
    Newline,
}

/// Companion store client configuration.
///
/// # Examples
///
/// ```rust
/// use event_engine::config::{Endpoint, Framing, QueryConfig};
/// use std::time::Duration;
///
/// let config = QueryConfig::default()
///     .with_endpoint(Endpoint::Tcp("127.0.0.1:9000".to_string()))
///     .with_timeout(Duration::from_millis(250))
///     .with_framing(Framing::Newline);
/// assert_eq!(config.timeout(), Duration::from_millis(250));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Socket the client connects to.
    ///
    /// **Default**: `unix: /var/ossec/queue/db/wdb`
    pub endpoint: Endpoint,

    /// Connect, read and write timeout in milliseconds. A query that runs
    /// into it yields an `err timeout` response.
    ///
    /// **Default**: 1000
    pub timeout_ms: u64,

    /// Maximum number of idle connections kept for reuse. Zero disables
    /// pooling: every query opens and closes its own connection.
    ///
    /// **Default**: 4
    pub pool_size: usize,

    /// Message framing used on the socket.
    ///
    /// **Default**: `length_prefixed`
    pub framing: Framing,

    /// Largest response accepted, in bytes. Longer frames are treated as a
    /// transport fault.
    ///
    /// **Default**: 1MB
    pub max_response_bytes: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            endpoint: Endpoint::default(),
            timeout_ms: 1000,
            pool_size: 4,
            framing: Framing::default(),
            max_response_bytes: 1024 * 1024,
        }
    }
}

impl QueryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn with_endpoint(mut self, endpoint: Endpoint) -> Self {
        self.endpoint = endpoint;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    pub fn with_framing(mut self, framing: Framing) -> Self {
        self.framing = framing;
        self
    }

    pub fn with_max_response_bytes(mut self, bytes: usize) -> Self {
        self.max_response_bytes = bytes;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.timeout_ms == 0 {
            return Err(EngineError::Config("query timeout must be positive".to_string()));
        }
        if self.max_response_bytes == 0 {
            return Err(EngineError::Config(
                "query max_response_bytes must be positive".to_string(),
            ));
        }
        match &self.endpoint {
            Endpoint::Unix(path) if path.as_os_str().is_empty() => Err(EngineError::Config(
                "query endpoint socket path is empty".to_string(),
            )),
            Endpoint::Tcp(addr) if addr.is_empty() => Err(EngineError::Config(
                "query endpoint address is empty".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

/// Top level engine configuration.
///
/// # Example
/// ```rust
/// use event_engine::EngineConfig;
///
/// let config = EngineConfig::new().with_workers(2).with_queue_capacity(128);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Number of worker threads draining the ingestion queue.
    ///
    /// **Default**: number of threads in the global rayon pool
    pub workers: usize,

    /// Bound of the ingestion queue. Producers block (or are rejected by
    /// `try_push`) once this many events are waiting.
    ///
    /// **Default**: 8192
    pub queue_capacity: usize,

    /// Companion store client settings.
    pub query: QueryConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workers: rayon::current_num_threads().max(1),
            queue_capacity: 8192,
            query: QueryConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a YAML document. Missing keys take their defaults.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON document. Missing keys take their defaults.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a file, choosing the format by extension (`.json` or YAML).
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_str(&text),
            _ => Self::from_yaml_str(&text),
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn with_query(mut self, query: QueryConfig) -> Self {
        self.query = query;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(EngineError::Config("workers must be positive".to_string()));
        }
        if self.queue_capacity == 0 {
            return Err(EngineError::Config(
                "queue_capacity must be positive".to_string(),
            ));
        }
        self.query.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();

        assert!(config.workers >= 1);
        assert_eq!(config.queue_capacity, 8192);
        assert_eq!(config.query.timeout(), Duration::from_secs(1));
        assert_eq!(config.query.pool_size, 4);
        assert_eq!(config.query.framing, Framing::LengthPrefixed);
        assert_eq!(
            config.query.endpoint,
            Endpoint::Unix(PathBuf::from(DEFAULT_QUERY_SOCKET))
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_methods() {
        let config = EngineConfig::new()
            .with_workers(3)
            .with_queue_capacity(16)
            .with_query(
                QueryConfig::default()
                    .with_pool_size(0)
                    .with_timeout(Duration::from_millis(50))
                    .with_max_response_bytes(128),
            );

        assert_eq!(config.workers, 3);
        assert_eq!(config.queue_capacity, 16);
        assert_eq!(config.query.pool_size, 0);
        assert_eq!(config.query.timeout_ms, 50);
        assert_eq!(config.query.max_response_bytes, 128);
    }

    #[test]
    fn test_from_yaml() {
        let config = EngineConfig::from_yaml_str(
            r#"
workers: 2
queue_capacity: 64
query:
  endpoint:
    tcp: "127.0.0.1:9000"
  timeout_ms: 250
  framing: newline
"#,
        )
        .unwrap();

        assert_eq!(config.workers, 2);
        assert_eq!(config.queue_capacity, 64);
        assert_eq!(config.query.endpoint, Endpoint::Tcp("127.0.0.1:9000".to_string()));
        assert_eq!(config.query.framing, Framing::Newline);
        assert_eq!(config.query.timeout_ms, 250);
        assert_eq!(config.query.pool_size, 4);
    }

    #[test]
    fn test_from_json() {
        let config = EngineConfig::from_json_str(
            r#"{"workers": 1, "query": {"endpoint": {"unix": "/tmp/wdb"}}}"#,
        )
        .unwrap();

        assert_eq!(config.workers, 1);
        assert_eq!(config.query.endpoint, Endpoint::Unix(PathBuf::from("/tmp/wdb")));
        assert_eq!(config.query.framing, Framing::LengthPrefixed);
    }

    #[test]
    fn test_validation_errors() {
        let cases = [
            EngineConfig::new().with_workers(0),
            EngineConfig::new().with_queue_capacity(0),
            EngineConfig::new().with_query(QueryConfig::default().with_timeout(Duration::ZERO)),
            EngineConfig::new().with_query(
                QueryConfig::default().with_endpoint(Endpoint::Tcp(String::new())),
            ),
        ];
        for config in cases {
            match config.validate() {
                Err(EngineError::Config(_)) => {}
                other => panic!("Expected Config error, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_invalid_yaml_is_rejected() {
        assert!(matches!(
            EngineConfig::from_yaml_str("workers: [1"),
            Err(EngineError::Yaml(_))
        ));
        assert!(matches!(
            EngineConfig::from_yaml_str("workers: 0"),
            Err(EngineError::Config(_))
        ));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");
        std::fs::write(&path, r#"{"queue_capacity": 10}"#).unwrap();

        let config = EngineConfig::from_file(&path).unwrap();
        assert_eq!(config.queue_capacity, 10);
    }

    #[test]
    fn test_endpoint_display() {
        assert_eq!(Endpoint::Tcp("h:1".to_string()).to_string(), "tcp:h:1");
        assert_eq!(Endpoint::Unix(PathBuf::from("/s")).to_string(), "unix:/s");
    }
}
