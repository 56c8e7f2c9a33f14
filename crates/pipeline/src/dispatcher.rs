use std::sync::Arc;
use std::time::Duration;

use domain::LifecycleEvent;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::broker::Broker;
use crate::PipelineError;

const RETRY_PAUSE: Duration = Duration::from_secs(5);

/// Pulls deliveries off the broker and hands them to the executor.
///
/// Each delivery is acknowledged only after the parsed event has been
/// enqueued on the worker channel, so a crash between receipt and
/// handoff redelivers rather than loses the event. Payloads that do
/// not parse are acknowledged and dropped with a warning; redelivering
/// them could not succeed either.
pub struct Dispatcher {
    broker: Arc<dyn Broker>,
}

impl Dispatcher {
    pub fn new(broker: Arc<dyn Broker>) -> Self {
        Self { broker }
    }

    /// Runs the dispatch loop until the worker channel closes,
    /// reattaching to the broker after a fixed pause on failure.
    ///
    /// A broker outage at startup (or a lost consumer-group attach
    /// later) must not kill the pipeline for the life of the process.
    pub async fn supervise(&self, consumer: &str, events: mpsc::Sender<LifecycleEvent>) {
        loop {
            match self.run(consumer, events.clone()).await {
                Ok(()) => return,
                Err(err) => {
                    warn!(%err, consumer, "dispatcher failed, reattaching to broker");
                    tokio::time::sleep(RETRY_PAUSE).await;
                }
            }
        }
    }

    pub async fn run(
        &self,
        consumer: &str,
        events: mpsc::Sender<LifecycleEvent>,
    ) -> Result<(), PipelineError> {
        let mut sub = self.broker.subscribe(consumer).await?;
        info!(consumer, "dispatcher started");

        while let Some(delivery) = sub.next().await? {
            match serde_json::from_str::<LifecycleEvent>(&delivery.payload) {
                Ok(event) => {
                    if events.send(event).await.is_err() {
                        // Executor is gone; leave the delivery pending
                        // so it redelivers to the next consumer.
                        warn!(consumer, "worker channel closed, stopping dispatch");
                        return Ok(());
                    }
                    if let Err(err) = sub.ack(&delivery).await {
                        warn!(%err, id = %delivery.id, "ack failed, delivery may repeat");
                    }
                }
                Err(err) => {
                    warn!(%err, id = %delivery.id, "discarding malformed event payload");
                    if let Err(err) = sub.ack(&delivery).await {
                        warn!(%err, id = %delivery.id, "ack failed for malformed payload");
                    }
                }
            }
        }

        info!(consumer, "stream closed, dispatcher stopping");
        Ok(())
    }
}
