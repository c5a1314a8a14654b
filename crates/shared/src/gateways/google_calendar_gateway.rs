//! Concrete `CalendarGateway` over the real Google Calendar events API.
//!
//! Scoped deliberately thin: spec §1 puts the calendar wire protocol out of
//! bounds, and credential refresh/OAuth is someone else's concern, so this
//! adapter takes a single pre-provisioned bearer token from config rather
//! than managing a token lifecycle. Recurring-event expansion (Google's
//! `recurringEventId`/RRULE machinery) is not modeled; every upstream event
//! lands as a standalone `CalendarEntryUpstream` with no series link.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::Deserialize;

use super::calendar_gateway::{
    CalendarEntryUpstream, CalendarGateway, CalendarGatewayError, CalendarGatewayFuture,
    CalendarSyncRequest, CalendarSyncResult,
};
use crate::config::ConfigError;
use crate::config_env::{optional_trimmed_env, parse_u64_env, require_env};
use crate::domain::calendar::AttendanceStatus;
use crate::domain::task::{TaskCategory, TaskFrequency};

const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/calendar/v3/calendars";
const DEFAULT_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_MAX_RESULTS: &str = "250";

#[derive(Debug, Clone)]
pub struct GoogleCalendarGatewayConfig {
    pub base_url: String,
    pub access_token: String,
    pub timeout_ms: u64,
}

impl GoogleCalendarGatewayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: optional_trimmed_env("GOOGLE_CALENDAR_EVENTS_URL")
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            access_token: require_env("GOOGLE_CALENDAR_ACCESS_TOKEN")?,
            timeout_ms: parse_u64_env("GOOGLE_CALENDAR_TIMEOUT_MS", DEFAULT_TIMEOUT_MS)?,
        })
    }
}

#[derive(Clone)]
pub struct GoogleCalendarGateway {
    client: reqwest::Client,
    config: GoogleCalendarGatewayConfig,
}

impl GoogleCalendarGateway {
    pub fn new(config: GoogleCalendarGatewayConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .unwrap_or_default();
        Self { client, config }
    }
}

impl CalendarGateway for GoogleCalendarGateway {
    fn load_calendar_events<'a>(&'a self, request: CalendarSyncRequest) -> CalendarGatewayFuture<'a> {
        Box::pin(async move {
            let time_min = (Utc::now() - request.lookback).to_rfc3339();
            let url = format!("{}/{}/events", self.config.base_url, request.calendar_id);

            let response = self
                .client
                .get(url)
                .bearer_auth(&self.config.access_token)
                .query(&[
                    ("singleEvents", "true"),
                    ("orderBy", "startTime"),
                    ("timeMin", time_min.as_str()),
                    ("maxResults", DEFAULT_MAX_RESULTS),
                ])
                .send()
                .await
                .map_err(|err| CalendarGatewayError::ProviderFailure(err.to_string()))?;

            if response.status() == StatusCode::UNAUTHORIZED {
                return Err(CalendarGatewayError::TokenExpired);
            }
            if !response.status().is_success() {
                return Err(CalendarGatewayError::ProviderFailure(format!(
                    "calendar events request failed with HTTP {}",
                    response.status().as_u16()
                )));
            }

            let payload: GoogleCalendarEventsResponse = response
                .json()
                .await
                .map_err(|err| CalendarGatewayError::ProviderFailure(err.to_string()))?;

            let mut entry_upserts = Vec::with_capacity(payload.items.len());
            let mut entry_deletes = Vec::new();

            for event in payload.items {
                let Some(id) = event.id.clone() else { continue };

                if event.status.as_deref() == Some("cancelled") {
                    entry_deletes.push(id);
                    continue;
                }

                let Some(starts_at) = event.start.as_ref().and_then(GoogleEventTime::to_datetime)
                else {
                    continue;
                };
                let Some(ends_at) = event.end.as_ref().and_then(GoogleEventTime::to_datetime) else {
                    continue;
                };

                let is_recurring = event.recurring_event_id.is_some();
                entry_upserts.push(CalendarEntryUpstream {
                    platform_id: id,
                    series_platform_id: event.recurring_event_id,
                    name: event.summary.unwrap_or_else(|| "Untitled event".to_string()),
                    frequency: if is_recurring {
                        TaskFrequency::Other("RECURRING".to_string())
                    } else {
                        TaskFrequency::Other("ONCE".to_string())
                    },
                    category: TaskCategory::Other("CALENDAR".to_string()),
                    starts_at,
                    ends_at,
                    attendance_status: event
                        .attendees
                        .iter()
                        .find(|attendee| attendee.is_self)
                        .map(GoogleEventAttendee::attendance_status)
                        .unwrap_or(AttendanceStatus::Unknown),
                });
            }

            Ok(CalendarSyncResult {
                series_upserts: Vec::new(),
                series_deletes: Vec::new(),
                entry_upserts,
                entry_deletes,
                next_sync_token: payload.next_sync_token,
            })
        })
    }
}

#[derive(Debug, Deserialize)]
struct GoogleCalendarEventsResponse {
    #[serde(default)]
    items: Vec<GoogleCalendarEvent>,
    #[serde(rename = "nextSyncToken")]
    next_sync_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleCalendarEvent {
    id: Option<String>,
    status: Option<String>,
    summary: Option<String>,
    start: Option<GoogleEventTime>,
    end: Option<GoogleEventTime>,
    #[serde(rename = "recurringEventId")]
    recurring_event_id: Option<String>,
    #[serde(default)]
    attendees: Vec<GoogleEventAttendee>,
}

#[derive(Debug, Deserialize)]
struct GoogleEventTime {
    #[serde(rename = "dateTime")]
    date_time: Option<String>,
}

impl GoogleEventTime {
    fn to_datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(self.date_time.as_deref()?)
            .ok()
            .map(|value| value.with_timezone(&Utc))
    }
}

#[derive(Debug, Deserialize)]
struct GoogleEventAttendee {
    #[serde(rename = "self", default)]
    is_self: bool,
    #[serde(rename = "responseStatus")]
    response_status: Option<String>,
}

impl GoogleEventAttendee {
    fn attendance_status(&self) -> AttendanceStatus {
        match self.response_status.as_deref() {
            Some("accepted") => AttendanceStatus::Going,
            Some("declined") => AttendanceStatus::NotGoing,
            Some("tentative") | Some("needsAction") => AttendanceStatus::Tentative,
            _ => AttendanceStatus::Unknown,
        }
    }
}
