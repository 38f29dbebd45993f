use async_trait::async_trait;
use linkshelf_core::{CacheError, DocumentKey, PreviewRecord, RemoteStore, Result};
use redis::AsyncCommands;
use tracing::{debug, trace, warn};

/// A Redis-backed [`RemoteStore`].
///
/// Preview documents are stored as JSON strings under
/// `{key_prefix}{document_key}`.
#[derive(Debug, Clone)]
pub struct RedisRemoteStore {
    conn: redis::aio::MultiplexedConnection,
    key_prefix: String,
}

fn map_redis_error(operation: &str, err: redis::RedisError) -> CacheError {
    let message = format!("{operation}: {err}");
    if err.is_timeout() {
        CacheError::Timeout(message)
    } else if err.is_connection_dropped() || err.is_connection_refusal() {
        CacheError::Unavailable(message)
    } else {
        CacheError::Operation(message)
    }
}

impl RedisRemoteStore {
    /// Creates a store using the default `preview:` key prefix.
    ///
    /// # Arguments
    ///
    /// * `conn` - A multiplexed Redis connection
    pub fn new(conn: redis::aio::MultiplexedConnection) -> Self {
        Self::with_prefix(conn, "preview:")
    }

    /// Creates a store with a custom key prefix.
    ///
    /// # Arguments
    ///
    /// * `conn` - A multiplexed Redis connection
    /// * `key_prefix` - Prefix for document keys (e.g., "myapp:preview:")
    pub fn with_prefix(
        conn: redis::aio::MultiplexedConnection,
        key_prefix: impl Into<String>,
    ) -> Self {
        Self {
            conn,
            key_prefix: key_prefix.into(),
        }
    }

    /// Opens a multiplexed connection and creates a store with the default prefix.
    ///
    /// # Arguments
    ///
    /// * `redis_url` - Connection URL (e.g., "redis://127.0.0.1:6379")
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the server cannot be reached.
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| map_redis_error("invalid redis url", e))?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| map_redis_error("failed to connect to Redis", e))?;
        Ok(Self::new(conn))
    }

    /// Builds the Redis key for a document key.
    fn redis_key(&self, key: &DocumentKey) -> String {
        format!("{}{}", self.key_prefix, key)
    }
}

#[async_trait]
impl RemoteStore for RedisRemoteStore {
    async fn get(&self, key: &DocumentKey) -> Result<Option<PreviewRecord>> {
        let redis_key = self.redis_key(key);
        trace!(key = %key, "reading preview document from Redis");

        let mut conn = self.conn.clone();
        match conn.get::<_, Option<String>>(&redis_key).await {
            Ok(Some(raw)) => match serde_json::from_str::<PreviewRecord>(&raw) {
                Ok(record) => {
                    debug!(key = %key, "preview document found in Redis");
                    Ok(Some(record))
                }
                Err(e) => {
                    warn!(key = %key, error = %e, "failed to deserialize preview document");
                    Err(CacheError::InvalidData(format!(
                        "invalid preview document '{redis_key}': {e}"
                    )))
                }
            },
            Ok(None) => {
                trace!(key = %key, "no preview document in Redis");
                Ok(None)
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Redis error on get");
                Err(map_redis_error("failed to read preview from Redis", e))
            }
        }
    }

    async fn put(&self, key: &DocumentKey, record: &PreviewRecord) -> Result<()> {
        let redis_key = self.redis_key(key);
        trace!(key = %key, "writing preview document to Redis");

        let json = serde_json::to_string(record).map_err(|e| {
            warn!(key = %key, error = %e, "failed to serialize preview document");
            CacheError::Serialization(format!("failed to serialize preview: {e}"))
        })?;

        let mut conn = self.conn.clone();
        match conn.set::<_, _, ()>(&redis_key, json).await {
            Ok(()) => {
                debug!(key = %key, "stored preview document in Redis");
                Ok(())
            }
            Err(e) => {
                warn!(key = %key, error = %e, "failed to store preview document in Redis");
                Err(map_redis_error("failed to write preview to Redis", e))
            }
        }
    }
}
