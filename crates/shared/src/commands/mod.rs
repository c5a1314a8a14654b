//! Commands: the write-side entry points a request handler or worker job
//! invokes, each opening exactly one [`crate::uow::UnitOfWork`] and
//! committing it (spec §4).

mod receive_sms;
mod record_task_action;
mod schedule_day;
mod send_push;
mod sync_calendar;

pub use receive_sms::receive_sms;
pub use record_task_action::record_task_action;
pub use schedule_day::schedule_day;
pub use send_push::send_push_notification;
pub use sync_calendar::sync_calendar;

use thiserror::Error;

use crate::repos::StoreError;
use crate::uow::UowError;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("entity not found")]
    NotFound,
    #[error("validation error: {0}")]
    Validation(String),
    #[error("token expired")]
    TokenExpired,
    #[error("gateway error: {0}")]
    Gateway(String),
    #[error(transparent)]
    Internal(#[from] StoreError),
}

impl From<UowError> for CommandError {
    fn from(error: UowError) -> Self {
        match error {
            UowError::Store(store_error) => CommandError::Internal(store_error),
        }
    }
}
