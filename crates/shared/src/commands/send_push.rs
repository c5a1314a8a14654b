use chrono::Utc;
use uuid::Uuid;

use crate::domain::push::{PushNotification, PushNotificationStatus};
use crate::event_dispatch::EventDispatcher;
use crate::gateways::PushGateway;
use crate::pubsub::PubSubBus;
use crate::repos::Store;
use crate::uow::UnitOfWork;

use super::CommandError;

/// Sends a push notification to every subscription a user holds, best-effort
/// per subscription (spec §4.5.3 / §7: gateway failures are logged, and the
/// persisted `PushNotification` still commits regardless of delivery outcome).
pub async fn send_push_notification(
    store: Store,
    dispatcher: &EventDispatcher,
    pubsub: &PubSubBus,
    user_id: Uuid,
    content: String,
    triggered_by: Option<String>,
    gateway: &dyn PushGateway,
) -> Result<PushNotification, CommandError> {
    let subscriptions = store.list_push_subscriptions(user_id).await?;
    let now = Utc::now();

    let notification = if subscriptions.is_empty() {
        PushNotification::create(
            Uuid::new_v4(),
            user_id,
            Vec::new(),
            content,
            PushNotificationStatus::Skipped,
            Some("no_subscriptions".to_string()),
            None,
            triggered_by,
        )
    } else {
        let subscription_ids = subscriptions.iter().map(|subscription| subscription.id).collect();

        let mut last_error = None;
        let mut any_success = false;
        for subscription in &subscriptions {
            match gateway.send_push(subscription, &content).await {
                Ok(()) => any_success = true,
                Err(error) => last_error = Some(error.to_string()),
            }
        }

        if any_success {
            PushNotification::create(
                Uuid::new_v4(),
                user_id,
                subscription_ids,
                content,
                PushNotificationStatus::Success,
                None,
                Some(now),
                triggered_by,
            )
        } else {
            PushNotification::create(
                Uuid::new_v4(),
                user_id,
                subscription_ids,
                content,
                PushNotificationStatus::Error,
                last_error,
                None,
                triggered_by,
            )
        }
    };

    let mut notification = notification;
    let mut uow = UnitOfWork::begin(store, dispatcher, pubsub, user_id).await?;
    uow.add(&mut notification);
    uow.commit().await?;

    Ok(notification)
}
