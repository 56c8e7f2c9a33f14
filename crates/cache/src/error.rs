use thiserror::Error;

/// Errors that can occur when talking to the cache backend.
///
/// Cache errors are never fatal to a read: the caller degrades to the
/// durable store and logs the failure.
#[derive(Debug, Error)]
pub enum CacheError {
    /// A Redis connection or command error occurred.
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// A cached payload could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
