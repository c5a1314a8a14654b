//! Outer-collaborator interfaces (spec §1 Non-goals): wire protocols the
//! core consumes but never implements directly.

pub mod calendar_gateway;
pub mod google_calendar_gateway;
pub mod push_gateway;
pub mod render;
pub mod sms_gateway;
pub mod twilio_sms_gateway;
pub mod web_push_gateway;

pub use calendar_gateway::{
    CalendarEntryUpstream, CalendarGateway, CalendarGatewayError, CalendarSeriesUpstream,
    CalendarSyncRequest, CalendarSyncResult,
};
pub use google_calendar_gateway::{GoogleCalendarGateway, GoogleCalendarGatewayConfig};
pub use push_gateway::{PushGateway, PushGatewayError};
pub use render::render;
pub use sms_gateway::{SmsGateway, SmsGatewayError};
pub use twilio_sms_gateway::{TwilioSmsGateway, TwilioSmsGatewayConfig};
pub use web_push_gateway::{WebPushGateway, WebPushGatewayConfig};
