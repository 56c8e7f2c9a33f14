use async_trait::async_trait;

use crate::PipelineError;

/// A message handed to a consumer, identified for acknowledgment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub id: String,
    pub payload: String,
}

/// Durable message broker with at-least-once delivery.
///
/// Published payloads persist until a subscriber acknowledges them;
/// unacknowledged deliveries come back on the next subscribe.
#[async_trait]
pub trait Broker: Send + Sync {
    async fn publish(&self, payload: &str) -> Result<(), PipelineError>;

    /// Opens a named consumer on the shared consumer group.
    async fn subscribe(&self, consumer: &str) -> Result<Box<dyn Subscription>, PipelineError>;
}

/// A consumer's view of the stream. Deliveries stay pending until
/// `ack` is called for them.
#[async_trait]
pub trait Subscription: Send {
    /// Waits for the next delivery. `None` means the stream is closed
    /// and no more deliveries will arrive.
    async fn next(&mut self) -> Result<Option<Delivery>, PipelineError>;

    async fn ack(&mut self, delivery: &Delivery) -> Result<(), PipelineError>;
}
