//! Per-connection task for `/days/today/context` (spec §4.8), grounded on
//! the pack's WebSocket reference (`skynet-gateway::ws::connection`): a
//! split socket driven by one `tokio::select!` over client inbound,
//! pub/sub outbound, and a heartbeat tick.

use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use shared::domain::audit_log::AuditLog;
use shared::queries::{day_context, incremental_changes};
use shared::repos::AuditLogFilter;
use shared::timezone::user_local_date;
use tracing::{info, warn};
use uuid::Uuid;

use super::protocol::{ServerMessage, parse_sync_request};
use super::{AppState, AuthUser};

pub(crate) async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    user: AuthUser,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, state, user.user_id))
}

async fn handle_connection(socket: WebSocket, state: AppState, user_id: Uuid) {
    let (mut tx, mut rx) = socket.split();

    let channels = vec![
        format!("user:{user_id}:auditlog"),
        format!("user:{user_id}:domain-events"),
    ];
    let mut subscriber = match state
        .pubsub
        .subscriber_connection(&state.redis_url, &channels)
        .await
    {
        Ok(subscriber) => subscriber,
        Err(err) => {
            warn!(%user_id, "failed to open pub/sub subscriber: {err}");
            return;
        }
    };
    let mut messages = Box::pin(subscriber.on_message());

    if tx
        .send(Message::Text(
            ServerMessage::ConnectionAck { user_id }.to_json().into(),
        ))
        .await
        .is_err()
    {
        return;
    }

    let mut heartbeat = tokio::time::interval(Duration::from_secs(state.heartbeat_seconds));
    heartbeat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            inbound = rx.next() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        let response = handle_client_message(&state, user_id, &text).await;
                        if tx.send(Message::Text(response.to_json().into())).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if tx.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(err)) => {
                        warn!(%user_id, "websocket receive error: {err}");
                        break;
                    }
                    _ => {}
                }
            }

            payload = messages.next() => {
                let Some(payload) = payload else { break };
                let Ok(raw) = payload.get_payload::<String>() else { continue };
                let Ok(log) = serde_json::from_str::<AuditLog>(&raw) else { continue };

                let target_date = match state.store.find_user(user_id).await {
                    Ok(Some(user)) => user_local_date(Utc::now(), &user.settings.time_zone),
                    _ => continue,
                };
                if !log.is_for_date(target_date) {
                    continue;
                }
                let Some(change_type) = log.change_type() else { continue };

                let change = shared::queries::Change {
                    change_type: change_type.as_str(),
                    entity_type: log.entity_type.as_str(),
                    entity_id: log.entity_id,
                    entity_data: if matches!(change_type, shared::domain::audit_log::ChangeType::Deleted) {
                        None
                    } else {
                        log.entity_data
                    },
                };

                let response = ServerMessage::SyncResponse {
                    day_context: None,
                    changes: Some(vec![change]),
                    last_audit_log_timestamp: log.occurred_at,
                };
                if tx.send(Message::Text(response.to_json().into())).await.is_err() {
                    break;
                }
            }

            _ = heartbeat.tick() => {
                if tx.send(Message::Ping(Vec::new().into())).await.is_err() {
                    break;
                }
            }
        }
    }

    info!(%user_id, "websocket connection closed");
}

async fn handle_client_message(state: &AppState, user_id: Uuid, text: &str) -> ServerMessage {
    let since_timestamp = match parse_sync_request(text) {
        Ok(since) => since,
        Err(message) => return ServerMessage::error("PROTOCOL_ERROR", message),
    };

    let latest = match state
        .store
        .list_audit_logs(user_id, &AuditLogFilter { limit: 1, ..Default::default() })
        .await
    {
        Ok(logs) => logs.first().map(|log| log.occurred_at).unwrap_or_else(Utc::now),
        Err(err) => return ServerMessage::error("STORE_ERROR", err.to_string()),
    };

    let target_date = match state.store.find_user(user_id).await {
        Ok(Some(user)) => user_local_date(Utc::now(), &user.settings.time_zone),
        Ok(None) => return ServerMessage::error("NOT_FOUND", "user not found".to_string()),
        Err(err) => return ServerMessage::error("STORE_ERROR", err.to_string()),
    };

    match since_timestamp {
        None => match day_context(&state.store, user_id, target_date).await {
            Ok(context) => ServerMessage::SyncResponse {
                day_context: Some(context),
                changes: None,
                last_audit_log_timestamp: latest,
            },
            Err(err) => ServerMessage::error("STORE_ERROR", err.to_string()),
        },
        Some(since) => match incremental_changes(&state.store, user_id, since, target_date).await {
            Ok(changes) => ServerMessage::SyncResponse {
                day_context: None,
                changes: Some(changes),
                last_audit_log_timestamp: latest,
            },
            Err(err) => ServerMessage::error("STORE_ERROR", err.to_string()),
        },
    }
}
