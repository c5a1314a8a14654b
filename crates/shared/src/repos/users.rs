use serde_json::Value;
use sqlx::Row;
use uuid::Uuid;

use crate::domain::user::{
    CalendarEntryNotificationRule, CalendarEntryNotificationSettings, NotificationChannel,
    User, UserSettings,
};

use super::{Store, StoreError};

impl Store {
    pub async fn upsert_user(&self, user: &User) -> Result<(), StoreError> {
        let settings = user_settings_to_json(&user.settings);

        sqlx::query(
            "INSERT INTO users (id, settings)
             VALUES ($1, $2)
             ON CONFLICT (id) DO UPDATE SET settings = EXCLUDED.settings, updated_at = NOW()",
        )
        .bind(user.id)
        .bind(settings)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn find_user(&self, user_id: Uuid) -> Result<Option<User>, StoreError> {
        let row = sqlx::query("SELECT id, settings FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let id: Uuid = row.try_get("id")?;
        let settings: Value = row.try_get("settings")?;
        let settings = user_settings_from_json(&settings)?;

        Ok(Some(User::from_persisted(id, settings)))
    }

    pub async fn list_user_ids(&self) -> Result<Vec<Uuid>, StoreError> {
        let ids: Vec<Uuid> = sqlx::query_scalar("SELECT id FROM users ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }
}

fn user_settings_to_json(settings: &UserSettings) -> Value {
    serde_json::json!({
        "time_zone": settings.time_zone,
        "llm_provider": settings.llm_provider,
        "morning_overview_time_minutes": settings.morning_overview_time_minutes,
        "calendar_entry_notification_settings": {
            "enabled": settings.calendar_entry_notification_settings.enabled,
            "rules": settings.calendar_entry_notification_settings.rules.iter().map(|rule| {
                serde_json::json!({
                    "channel": rule.channel.as_str(),
                    "minutes_before": rule.minutes_before,
                })
            }).collect::<Vec<_>>(),
        },
        "template_defaults": settings.template_defaults,
    })
}

fn user_settings_from_json(value: &Value) -> Result<UserSettings, StoreError> {
    let invalid = || StoreError::InvalidData("malformed user settings".to_string());

    let time_zone = value
        .get("time_zone")
        .and_then(Value::as_str)
        .ok_or_else(invalid)?
        .to_string();
    let llm_provider = value
        .get("llm_provider")
        .and_then(Value::as_str)
        .map(str::to_string);
    let morning_overview_time_minutes = value
        .get("morning_overview_time_minutes")
        .and_then(Value::as_u64)
        .ok_or_else(invalid)? as u16;

    let notification_settings_value = value
        .get("calendar_entry_notification_settings")
        .ok_or_else(invalid)?;
    let enabled = notification_settings_value
        .get("enabled")
        .and_then(Value::as_bool)
        .ok_or_else(invalid)?;
    let rules = notification_settings_value
        .get("rules")
        .and_then(Value::as_array)
        .ok_or_else(invalid)?
        .iter()
        .map(|rule| {
            let channel = rule
                .get("channel")
                .and_then(Value::as_str)
                .and_then(NotificationChannel::from_str)
                .ok_or_else(invalid)?;
            let minutes_before = rule
                .get("minutes_before")
                .and_then(Value::as_i64)
                .ok_or_else(invalid)?;
            Ok(CalendarEntryNotificationRule {
                channel,
                minutes_before,
            })
        })
        .collect::<Result<Vec<_>, StoreError>>()?;

    let template_defaults_value = value
        .get("template_defaults")
        .and_then(Value::as_array)
        .ok_or_else(invalid)?;
    if template_defaults_value.len() != 7 {
        return Err(invalid());
    }
    let mut template_defaults: [Option<String>; 7] = Default::default();
    for (index, slot) in template_defaults_value.iter().enumerate() {
        template_defaults[index] = slot.as_str().map(str::to_string);
    }

    Ok(UserSettings {
        time_zone,
        llm_provider,
        morning_overview_time_minutes,
        calendar_entry_notification_settings: CalendarEntryNotificationSettings { enabled, rules },
        template_defaults,
    })
}
