use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cache::CachedOrders;
use common::OrderId;
use domain::{EventKind, LifecycleEvent, Order, OrderError, OrderStatus};
use store::StoreError;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::PipelineError;

/// Failure modes of a fulfillment attempt. Transient failures are
/// retried; permanent ones are not.
#[derive(Debug, thiserror::Error)]
pub enum FulfillmentError {
    #[error("transient fulfillment failure: {0}")]
    Transient(String),
    #[error("permanent fulfillment failure: {0}")]
    Permanent(String),
}

/// The external work done for a new order, such as charging a payment.
#[async_trait]
pub trait Fulfillment: Send + Sync {
    async fn fulfill(&self, order: &Order) -> Result<(), FulfillmentError>;
}

/// Retry schedule for transient fulfillment failures.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Succeeded,
    Failed,
    /// The order was no longer `PENDING` when the event arrived, so
    /// there was nothing to do. Redeliveries land here.
    AlreadyProcessed,
}

/// What happened to one `new_order` event.
#[derive(Debug)]
pub struct TaskOutcome {
    pub order_id: OrderId,
    pub disposition: Disposition,
    pub attempts: u32,
    pub last_error: Option<String>,
}

/// Consumes `new_order` events and drives orders from `PENDING` to
/// `PAID` through the fulfillment hook.
///
/// Processing is idempotent: the status gate makes a redelivered or
/// duplicated event a no-op, which is what makes at-least-once
/// delivery safe upstream.
pub struct TaskExecutor {
    orders: Arc<CachedOrders>,
    fulfillment: Arc<dyn Fulfillment>,
    policy: RetryPolicy,
}

impl TaskExecutor {
    pub fn new(
        orders: Arc<CachedOrders>,
        fulfillment: Arc<dyn Fulfillment>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            orders,
            fulfillment,
            policy,
        }
    }

    /// Drains the worker channel until it closes.
    pub async fn run(&self, mut events: mpsc::Receiver<LifecycleEvent>) {
        while let Some(event) = events.recv().await {
            match event.kind {
                EventKind::NewOrder => match self.process(event.order_id).await {
                    Ok(outcome) => info!(
                        order_id = %outcome.order_id,
                        disposition = ?outcome.disposition,
                        attempts = outcome.attempts,
                        "processed new_order event"
                    ),
                    Err(err) => {
                        warn!(order_id = %event.order_id, %err, "event processing errored");
                    }
                },
            }
        }
    }

    /// Fulfills one order, retrying transient failures per the policy.
    pub async fn process(&self, order_id: OrderId) -> Result<TaskOutcome, PipelineError> {
        let order = match self.orders.get(order_id).await {
            Ok(order) => order,
            Err(StoreError::OrderNotFound(_)) => {
                // The order can vanish under a user-delete cascade.
                warn!(%order_id, "event refers to a missing order");
                return Ok(TaskOutcome {
                    order_id,
                    disposition: Disposition::AlreadyProcessed,
                    attempts: 0,
                    last_error: None,
                });
            }
            Err(err) => return Err(err.into()),
        };

        if order.status != OrderStatus::Pending {
            return Ok(TaskOutcome {
                order_id,
                disposition: Disposition::AlreadyProcessed,
                attempts: 0,
                last_error: None,
            });
        }

        let mut attempts = 0;
        let mut last_error = None;
        while attempts < self.policy.max_attempts {
            attempts += 1;
            match self.fulfillment.fulfill(&order).await {
                Ok(()) => return self.mark_paid(order_id, attempts).await,
                Err(FulfillmentError::Permanent(msg)) => {
                    last_error = Some(msg);
                    break;
                }
                Err(FulfillmentError::Transient(msg)) => {
                    warn!(%order_id, attempts, error = %msg, "fulfillment attempt failed");
                    last_error = Some(msg);
                    if attempts < self.policy.max_attempts {
                        tokio::time::sleep(self.policy.delay).await;
                    }
                }
            }
        }

        Ok(TaskOutcome {
            order_id,
            disposition: Disposition::Failed,
            attempts,
            last_error,
        })
    }

    async fn mark_paid(&self, order_id: OrderId, attempts: u32) -> Result<TaskOutcome, PipelineError> {
        match self.orders.update_status(order_id, OrderStatus::Paid).await {
            Ok(_) => Ok(TaskOutcome {
                order_id,
                disposition: Disposition::Succeeded,
                attempts,
                last_error: None,
            }),
            // A concurrent cancel won the race between our status read
            // and this commit.
            Err(StoreError::Domain(OrderError::InvalidTransition { .. })) => Ok(TaskOutcome {
                order_id,
                disposition: Disposition::AlreadyProcessed,
                attempts,
                last_error: None,
            }),
            Err(err) => Err(err.into()),
        }
    }
}
