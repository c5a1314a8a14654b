//! Downstream transport for `AlarmTriggeredEvent` (spec §4.5.1): the one
//! handler registered against the process-wide [`EventDispatcher`]. Mirrors
//! `kiosk_notification`'s publish-only shape for the `KIOSK`/`URL` branch and
//! `send_push.rs`'s best-effort per-subscription fan-out for everything else
//! — but, unlike `send_push_notification`, this handler reacts to an event
//! that's already audited (the `Day`/`AlarmTriggered` mutation that produced
//! it), so it doesn't persist a second `PushNotification` row of its own.

use serde_json::json;
use tracing::warn;

use crate::domain::{AlarmType, DomainEventKind};
use crate::event_dispatch::{HandlerContext, HandlerError, HandlerFuture, HandlerRegistration};

pub fn alarm_triggered_transport() -> HandlerRegistration {
    HandlerRegistration::new(
        "alarm_triggered_transport",
        |event| matches!(event.kind, DomainEventKind::AlarmTriggered { .. }),
        |context, event| -> HandlerFuture { Box::pin(invoke(context, event)) },
    )
}

async fn invoke(
    context: HandlerContext,
    event: crate::domain::DomainEvent,
) -> Result<(), HandlerError> {
    let DomainEventKind::AlarmTriggered { alarm_id, alarm_type } = event.kind else {
        return Ok(());
    };

    if matches!(alarm_type, AlarmType::Kiosk | AlarmType::Url) {
        let payload = json!({
            "alarm_id": alarm_id,
            "alarm_type": alarm_type.as_str(),
        });
        context
            .pubsub
            .publish_kiosk_notification(event.user_id, &payload)
            .await
            .map_err(|error| HandlerError::Gateway(error.to_string()))?;
        return Ok(());
    }

    let alarm_name = context
        .store
        .find_day_by_id(event.entity_id)
        .await?
        .and_then(|day| day.alarms.into_iter().find(|alarm| alarm.id == alarm_id))
        .map(|alarm| alarm.name)
        .unwrap_or_else(|| "Alarm".to_string());

    let subscriptions = context.store.list_push_subscriptions(event.user_id).await?;
    let content = format!("{alarm_name} alarm");
    for subscription in &subscriptions {
        if let Err(error) = context.push_gateway.send_push(subscription, &content).await {
            warn!(
                alarm_id = %alarm_id,
                subscription_id = %subscription.id,
                %error,
                "alarm push delivery failed"
            );
        }
    }

    Ok(())
}
