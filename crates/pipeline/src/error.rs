use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("broker error: {0}")]
    Broker(#[from] redis::RedisError),

    #[error("broker channel closed: {0}")]
    Channel(String),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] store::StoreError),
}
