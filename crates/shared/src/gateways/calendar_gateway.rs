//! `CalendarGateway` (spec §4.4): the Google Calendar wire protocol is out of
//! scope, abstracted behind this trait the same way the teacher abstracts
//! the LLM provider behind `LlmGateway`.

use std::future::Future;
use std::pin::Pin;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::calendar::AttendanceStatus;
use crate::domain::task::{TaskCategory, TaskFrequency};

pub type CalendarGatewayFuture<'a> =
    Pin<Box<dyn Future<Output = Result<CalendarSyncResult, CalendarGatewayError>> + Send + 'a>>;

#[derive(Debug, Clone)]
pub struct CalendarSyncRequest {
    pub calendar_id: String,
    pub lookback: chrono::Duration,
    pub sync_token: Option<String>,
}

/// One upstream series record (spec §4.4 step 3).
#[derive(Debug, Clone)]
pub struct CalendarSeriesUpstream {
    pub series_platform_id: String,
    pub name: String,
    pub frequency: TaskFrequency,
    pub category: TaskCategory,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
}

/// One upstream entry record (spec §4.4 step 4).
#[derive(Debug, Clone)]
pub struct CalendarEntryUpstream {
    pub platform_id: String,
    pub series_platform_id: Option<String>,
    pub name: String,
    pub frequency: TaskFrequency,
    pub category: TaskCategory,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub attendance_status: AttendanceStatus,
}

#[derive(Debug, Clone, Default)]
pub struct CalendarSyncResult {
    pub series_upserts: Vec<CalendarSeriesUpstream>,
    pub series_deletes: Vec<String>,
    pub entry_upserts: Vec<CalendarEntryUpstream>,
    pub entry_deletes: Vec<String>,
    pub next_sync_token: Option<String>,
}

#[derive(Debug, Error)]
pub enum CalendarGatewayError {
    #[error("calendar auth token expired")]
    TokenExpired,
    #[error("calendar provider request failed: {0}")]
    ProviderFailure(String),
}

pub trait CalendarGateway: Send + Sync {
    fn load_calendar_events<'a>(&'a self, request: CalendarSyncRequest) -> CalendarGatewayFuture<'a>;
}
