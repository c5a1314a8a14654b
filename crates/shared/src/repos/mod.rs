use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;
use uuid::Uuid;

mod audit;
mod brain_dumps;
mod calendar;
mod days;
mod jobs;
mod messages;
mod push;
mod routines;
mod tasks;
mod users;

pub use audit::AuditLogFilter;
pub use jobs::default_job_idempotency_key;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("entity not found")]
    NotFound,
    #[error("invalid persisted data: {0}")]
    InvalidData(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobType {
    ScheduleAllUsersDay,
    EmitNewDayEvent,
    AlarmTick,
    CalendarEntryReminderTick,
    MorningOverviewTick,
    SmartNotificationTick,
    KioskNotificationTick,
    ProcessBrainDumpItem,
    ProcessInboundSmsMessage,
    SendPushNotification,
    SendSmsMessage,
    SyncCalendar,
}

impl JobType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ScheduleAllUsersDay => "SCHEDULE_ALL_USERS_DAY",
            Self::EmitNewDayEvent => "EMIT_NEW_DAY_EVENT",
            Self::AlarmTick => "ALARM_TICK",
            Self::CalendarEntryReminderTick => "CALENDAR_ENTRY_REMINDER_TICK",
            Self::MorningOverviewTick => "MORNING_OVERVIEW_TICK",
            Self::SmartNotificationTick => "SMART_NOTIFICATION_TICK",
            Self::KioskNotificationTick => "KIOSK_NOTIFICATION_TICK",
            Self::ProcessBrainDumpItem => "PROCESS_BRAIN_DUMP_ITEM",
            Self::ProcessInboundSmsMessage => "PROCESS_INBOUND_SMS_MESSAGE",
            Self::SendPushNotification => "SEND_PUSH_NOTIFICATION",
            Self::SendSmsMessage => "SEND_SMS_MESSAGE",
            Self::SyncCalendar => "SYNC_CALENDAR",
        }
    }

    pub fn from_db(value: &str) -> Result<Self, StoreError> {
        match value {
            "SCHEDULE_ALL_USERS_DAY" => Ok(Self::ScheduleAllUsersDay),
            "EMIT_NEW_DAY_EVENT" => Ok(Self::EmitNewDayEvent),
            "ALARM_TICK" => Ok(Self::AlarmTick),
            "CALENDAR_ENTRY_REMINDER_TICK" => Ok(Self::CalendarEntryReminderTick),
            "MORNING_OVERVIEW_TICK" => Ok(Self::MorningOverviewTick),
            "SMART_NOTIFICATION_TICK" => Ok(Self::SmartNotificationTick),
            "KIOSK_NOTIFICATION_TICK" => Ok(Self::KioskNotificationTick),
            "PROCESS_BRAIN_DUMP_ITEM" => Ok(Self::ProcessBrainDumpItem),
            "PROCESS_INBOUND_SMS_MESSAGE" => Ok(Self::ProcessInboundSmsMessage),
            "SEND_PUSH_NOTIFICATION" => Ok(Self::SendPushNotification),
            "SEND_SMS_MESSAGE" => Ok(Self::SendSmsMessage),
            "SYNC_CALENDAR" => Ok(Self::SyncCalendar),
            _ => Err(StoreError::InvalidData(format!(
                "unknown job type persisted: {value}"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClaimedJob {
    pub id: Uuid,
    pub user_id: Uuid,
    pub job_type: JobType,
    pub due_at: chrono::DateTime<chrono::Utc>,
    pub payload: Option<serde_json::Value>,
    pub attempts: i32,
    pub max_attempts: i32,
    pub idempotency_key: String,
}

#[derive(Clone)]
pub struct Store {
    pool: PgPool,
}

impl Store {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
