//! Publish side and worker side of the order event pipeline.
//!
//! When an order commits, a `new_order` lifecycle event is published to
//! the broker. A dispatcher consumes deliveries from a durable consumer
//! group, hands them to the task executor over a bounded channel, and
//! acknowledges each delivery only after the handoff, so an event is
//! never lost between receipt and processing. The executor fulfills
//! orders idempotently with bounded retries.

mod broker;
mod dispatcher;
mod error;
mod executor;
mod memory;
mod publisher;
mod redis_broker;

pub use broker::{Broker, Delivery, Subscription};
pub use dispatcher::Dispatcher;
pub use error::PipelineError;
pub use executor::{
    Disposition, Fulfillment, FulfillmentError, RetryPolicy, TaskExecutor, TaskOutcome,
};
pub use memory::InMemoryBroker;
pub use publisher::{NEW_ORDER_STREAM, Publisher};
pub use redis_broker::RedisStreamBroker;
