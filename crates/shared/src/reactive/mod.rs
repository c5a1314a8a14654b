//! Reactive handlers: the per-user job bodies a cron tick fans out into
//! (spec §4.5). Each function here is one `*_TICK` job's payload.

mod alarm_transport;
mod alarm_trigger;
mod calendar_reminder;
mod emit_new_day_event;
mod kiosk_notification;
mod morning_overview;
mod process_brain_dump_item;
mod process_inbound_sms_message;
mod schedule_all_users_day;
mod smart_notification;

pub use alarm_transport::alarm_triggered_transport;
pub use alarm_trigger::alarm_trigger;
pub use calendar_reminder::calendar_reminder;
pub use emit_new_day_event::emit_new_day_event;
pub use kiosk_notification::kiosk_notification;
pub use morning_overview::morning_overview;
pub use process_brain_dump_item::process_brain_dump_item;
pub use process_inbound_sms_message::process_inbound_sms_message;
pub use schedule_all_users_day::schedule_all_users_day;
pub use smart_notification::smart_notification;
