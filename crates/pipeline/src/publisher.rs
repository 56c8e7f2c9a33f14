use std::sync::Arc;

use common::OrderId;
use domain::LifecycleEvent;
use metrics::counter;
use tracing::{debug, warn};

use crate::broker::Broker;

/// Stream carrying `new_order` lifecycle events.
pub const NEW_ORDER_STREAM: &str = "new_order";

/// Publishes lifecycle events after an order commits.
pub struct Publisher {
    broker: Arc<dyn Broker>,
}

impl Publisher {
    pub fn new(broker: Arc<dyn Broker>) -> Self {
        Self { broker }
    }

    /// Announces a newly created order.
    ///
    /// The order is already committed when this runs, so a broker
    /// failure must not fail the request: it is logged and counted,
    /// and `false` is returned so the caller can attach a warning to
    /// its response.
    pub async fn publish_new_order(&self, order_id: OrderId) -> bool {
        let event = LifecycleEvent::new_order(order_id);
        let result = match serde_json::to_string(&event) {
            Ok(payload) => self.broker.publish(&payload).await,
            Err(err) => Err(err.into()),
        };
        match result {
            Ok(()) => {
                debug!(%order_id, "published new_order event");
                true
            }
            Err(err) => {
                counter!("publish_failures_total").increment(1);
                warn!(%order_id, %err, "failed to publish new_order event");
                false
            }
        }
    }
}
