use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::broker::{Broker, Delivery, Subscription};
use crate::PipelineError;

/// Process-local broker over an unbounded channel, for tests and
/// single-process runs. Supports one subscriber; acknowledged ids are
/// recorded so tests can assert on ack behavior.
pub struct InMemoryBroker {
    tx: mpsc::UnboundedSender<Delivery>,
    rx: Mutex<Option<mpsc::UnboundedReceiver<Delivery>>>,
    next_id: AtomicU64,
    acked: Arc<Mutex<Vec<String>>>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(Some(rx)),
            next_id: AtomicU64::new(1),
            acked: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Delivery ids acknowledged so far, in ack order.
    pub fn acked_ids(&self) -> Vec<String> {
        self.acked.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Broker for InMemoryBroker {
    async fn publish(&self, payload: &str) -> Result<(), PipelineError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.tx
            .send(Delivery {
                id: id.to_string(),
                payload: payload.to_string(),
            })
            .map_err(|_| PipelineError::Channel("subscriber dropped".to_string()))
    }

    async fn subscribe(&self, _consumer: &str) -> Result<Box<dyn Subscription>, PipelineError> {
        let rx = self
            .rx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
            .ok_or_else(|| PipelineError::Channel("already subscribed".to_string()))?;
        Ok(Box::new(InMemorySubscription {
            rx,
            acked: Arc::clone(&self.acked),
        }))
    }
}

struct InMemorySubscription {
    rx: mpsc::UnboundedReceiver<Delivery>,
    acked: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Subscription for InMemorySubscription {
    async fn next(&mut self) -> Result<Option<Delivery>, PipelineError> {
        Ok(self.rx.recv().await)
    }

    async fn ack(&mut self, delivery: &Delivery) -> Result<(), PipelineError> {
        self.acked
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(delivery.id.clone());
        Ok(())
    }
}
