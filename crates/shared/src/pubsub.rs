//! Redis-backed pub/sub bus (spec §6.2), grounded on the teacher's
//! `llm::reliability::redis_state::RedisReliabilityState` connection-manager
//! pattern: one cloned `ConnectionManager` per call site, a fixed key/channel
//! prefix, thin `AsyncCommands` wrappers.

use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::DomainEvent;
use crate::domain::audit_log::AuditLog;

#[derive(Debug, Error)]
pub enum PubSubError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("failed to serialize payload: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Clone)]
pub struct PubSubBus {
    connection: ConnectionManager,
}

impl PubSubBus {
    pub async fn connect(redis_url: &str) -> Result<Self, PubSubError> {
        let client = redis::Client::open(redis_url)?;
        let connection = ConnectionManager::new(client).await?;
        Ok(Self { connection })
    }

    pub async fn ping(&self) -> Result<(), PubSubError> {
        let mut connection = self.connection.clone();
        redis::cmd("PING")
            .query_async::<String>(&mut connection)
            .await?;
        Ok(())
    }

    /// `user:{user_id}:auditlog` — one message per committed audit log row
    /// (spec §6.2). The UoW synthesizes an `AuditLog`-shaped payload from
    /// the stamped event rather than re-reading the row it just inserted.
    pub async fn publish_audit_log(&self, user_id: Uuid, event: &DomainEvent) -> Result<(), PubSubError> {
        let payload = AuditLog {
            id: Uuid::new_v4(),
            user_id,
            activity_type: event.activity_type(),
            entity_id: event.entity_id,
            entity_type: event.entity_type,
            occurred_at: event.occurred_at,
            entity_data: event.entity_data().cloned(),
        };
        self.publish(&format!("user:{user_id}:auditlog"), &payload).await
    }

    /// `user:{user_id}:domain-events` — events that are not per-entity
    /// mutations, e.g. `NewDayEvent` (spec §6.2).
    pub async fn publish_domain_event(&self, user_id: Uuid, event: &DomainEvent) -> Result<(), PubSubError> {
        self.publish(&format!("user:{user_id}:domain-events"), event).await
    }

    /// `user:{user_id}:kiosk-notifications` — kiosk UI push-read-aloud
    /// payload, published verbatim by the kiosk-notification reactive
    /// handler (spec §4.5.6).
    pub async fn publish_kiosk_notification<T: Serialize>(
        &self,
        user_id: Uuid,
        payload: &T,
    ) -> Result<(), PubSubError> {
        self.publish(&format!("user:{user_id}:kiosk-notifications"), payload)
            .await
    }

    async fn publish<T: Serialize>(&self, channel: &str, payload: &T) -> Result<(), PubSubError> {
        let mut connection = self.connection.clone();
        let body = serde_json::to_string(payload)?;
        let _: i64 = connection.publish(channel, body).await?;
        Ok(())
    }

    /// Opens a dedicated (non-pooled) connection for `SUBSCRIBE`, since
    /// `ConnectionManager` multiplexes regular commands but pub/sub requires
    /// exclusive use of the connection for its lifetime — the same reason
    /// the teacher keeps its reliability state on a plain `ConnectionManager`
    /// for commands only.
    pub async fn subscriber_connection(
        &self,
        redis_url: &str,
        channels: &[String],
    ) -> Result<redis::aio::PubSub, PubSubError> {
        let client = redis::Client::open(redis_url)?;
        let mut pubsub = client.get_async_pubsub().await?;
        for channel in channels {
            pubsub.subscribe(channel).await?;
        }
        Ok(pubsub)
    }
}
