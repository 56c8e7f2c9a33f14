use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use redis::streams::{StreamReadOptions, StreamReadReply};
use tracing::warn;

use crate::broker::{Broker, Delivery, Subscription};
use crate::publisher::NEW_ORDER_STREAM;
use crate::PipelineError;

const CONSUMER_GROUP: &str = "fulfillment";
const READ_BATCH: usize = 10;
const BLOCK_MS: usize = 5_000;
const RECONNECT_PAUSE: Duration = Duration::from_secs(5);

/// Broker backed by a Redis stream and one consumer group.
///
/// `XADD` appends events; subscribers read through `XREADGROUP` and
/// acknowledge with `XACK`, so a crashed consumer's unacknowledged
/// entries are redelivered when it reattaches.
pub struct RedisStreamBroker {
    conn: ConnectionManager,
    stream: String,
}

impl RedisStreamBroker {
    pub async fn connect(url: &str) -> Result<Self, PipelineError> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self::with_connection(conn))
    }

    pub fn with_connection(conn: ConnectionManager) -> Self {
        Self {
            conn,
            stream: NEW_ORDER_STREAM.to_string(),
        }
    }

    async fn ensure_group(&self) -> Result<(), PipelineError> {
        let mut conn = self.conn.clone();
        let created: redis::RedisResult<()> = conn
            .xgroup_create_mkstream(&self.stream, CONSUMER_GROUP, "0")
            .await;
        match created {
            Ok(()) => Ok(()),
            // The group surviving a restart is the normal case.
            Err(err) if err.code() == Some("BUSYGROUP") => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

#[async_trait]
impl Broker for RedisStreamBroker {
    async fn publish(&self, payload: &str) -> Result<(), PipelineError> {
        let mut conn = self.conn.clone();
        let _: String = conn
            .xadd(&self.stream, "*", &[("payload", payload)])
            .await?;
        Ok(())
    }

    async fn subscribe(&self, consumer: &str) -> Result<Box<dyn Subscription>, PipelineError> {
        self.ensure_group().await?;
        Ok(Box::new(RedisSubscription {
            conn: self.conn.clone(),
            stream: self.stream.clone(),
            consumer: consumer.to_string(),
            backlog_cursor: Some("0".to_string()),
            buffered: VecDeque::new(),
        }))
    }
}

struct RedisSubscription {
    conn: ConnectionManager,
    stream: String,
    consumer: String,
    /// Entries this consumer received but never acknowledged before a
    /// restart are read first, from id 0 upward; `None` once the
    /// backlog is exhausted and reads switch to new entries.
    backlog_cursor: Option<String>,
    buffered: VecDeque<Delivery>,
}

impl RedisSubscription {
    fn flatten(&self, reply: StreamReadReply) -> Vec<Delivery> {
        let mut deliveries = Vec::new();
        for key in reply.keys {
            for entry in key.ids {
                match entry.get::<String>("payload") {
                    Some(payload) => deliveries.push(Delivery {
                        id: entry.id,
                        payload,
                    }),
                    None => {
                        warn!(id = %entry.id, "stream entry has no payload field");
                        deliveries.push(Delivery {
                            id: entry.id,
                            payload: String::new(),
                        });
                    }
                }
            }
        }
        deliveries
    }
}

#[async_trait]
impl Subscription for RedisSubscription {
    async fn next(&mut self) -> Result<Option<Delivery>, PipelineError> {
        loop {
            if let Some(delivery) = self.buffered.pop_front() {
                return Ok(Some(delivery));
            }

            let mut opts = StreamReadOptions::default()
                .group(CONSUMER_GROUP, &self.consumer)
                .count(READ_BATCH);
            let cursor = match &self.backlog_cursor {
                Some(cursor) => cursor.clone(),
                None => {
                    opts = opts.block(BLOCK_MS);
                    ">".to_string()
                }
            };

            let mut conn = self.conn.clone();
            let reply: redis::RedisResult<StreamReadReply> = conn
                .xread_options(&[&self.stream], &[cursor.as_str()], &opts)
                .await;
            match reply {
                Ok(reply) => {
                    let deliveries = self.flatten(reply);
                    if self.backlog_cursor.is_some() {
                        match deliveries.last() {
                            Some(last) => self.backlog_cursor = Some(last.id.clone()),
                            None => self.backlog_cursor = None,
                        }
                    }
                    self.buffered.extend(deliveries);
                }
                Err(err) => {
                    warn!(%err, "stream read failed, retrying");
                    tokio::time::sleep(RECONNECT_PAUSE).await;
                }
            }
        }
    }

    async fn ack(&mut self, delivery: &Delivery) -> Result<(), PipelineError> {
        let mut conn = self.conn.clone();
        let _: u64 = conn
            .xack(&self.stream, CONSUMER_GROUP, &[&delivery.id])
            .await?;
        Ok(())
    }
}
