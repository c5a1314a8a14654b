//! The Unit of Work: one DB transaction per request/worker invocation,
//! collecting aggregate snapshots, domain events, and deferred jobs so they
//! land in a single commit and a single post-commit fan-out (spec §4.1).

use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;
use tracing::error;
use uuid::Uuid;

use crate::domain::brain_dump::BrainDumpItem;
use crate::domain::calendar::{CalendarAccount, CalendarEntry, CalendarEntrySeries};
use crate::domain::day::Day;
use crate::domain::message::Message;
use crate::domain::push::PushNotification;
use crate::domain::task::Task;
use crate::domain::{Aggregate, DomainEvent};
use crate::event_dispatch::EventDispatcher;
use crate::pubsub::PubSubBus;
use crate::repos::{JobType, Store, StoreError};

#[derive(Debug, Error)]
pub enum UowError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// One of the aggregate types a command may pass to [`UnitOfWork::add`].
/// The UoW only needs to know how to upsert a snapshot in-transaction; it
/// never inspects entity fields directly.
#[derive(Debug, Clone)]
enum AggregateSnapshot {
    Day(Day),
    Task(Task),
    CalendarEntrySeries(CalendarEntrySeries),
    CalendarEntry(CalendarEntry),
    CalendarAccount(CalendarAccount),
    Message(Message),
    PushNotification(PushNotification),
    BrainDumpItem(BrainDumpItem),
}

impl AggregateSnapshot {
    async fn upsert_in_tx(
        &self,
        store: &Store,
        tx: &mut sqlx::PgConnection,
    ) -> Result<(), StoreError> {
        match self {
            Self::Day(day) => store.upsert_day_in_tx(tx, day).await,
            Self::Task(task) => store.upsert_task_in_tx(tx, task).await,
            Self::CalendarEntrySeries(series) => {
                store.upsert_calendar_entry_series_in_tx(tx, series).await
            }
            Self::CalendarEntry(entry) => store.upsert_calendar_entry_in_tx(tx, entry).await,
            Self::CalendarAccount(account) => store.upsert_calendar_account_in_tx(tx, account).await,
            Self::Message(message) => store.upsert_message_in_tx(tx, message).await,
            Self::PushNotification(notification) => {
                store.upsert_push_notification_in_tx(tx, notification).await
            }
            Self::BrainDumpItem(item) => store.upsert_brain_dump_item_in_tx(tx, item).await,
        }
    }
}

impl From<&Day> for AggregateSnapshot {
    fn from(value: &Day) -> Self {
        Self::Day(value.clone())
    }
}
impl From<&Task> for AggregateSnapshot {
    fn from(value: &Task) -> Self {
        Self::Task(value.clone())
    }
}
impl From<&CalendarEntrySeries> for AggregateSnapshot {
    fn from(value: &CalendarEntrySeries) -> Self {
        Self::CalendarEntrySeries(value.clone())
    }
}
impl From<&CalendarEntry> for AggregateSnapshot {
    fn from(value: &CalendarEntry) -> Self {
        Self::CalendarEntry(value.clone())
    }
}
impl From<&CalendarAccount> for AggregateSnapshot {
    fn from(value: &CalendarAccount) -> Self {
        Self::CalendarAccount(value.clone())
    }
}
impl From<&Message> for AggregateSnapshot {
    fn from(value: &Message) -> Self {
        Self::Message(value.clone())
    }
}
impl From<&PushNotification> for AggregateSnapshot {
    fn from(value: &PushNotification) -> Self {
        Self::PushNotification(value.clone())
    }
}
impl From<&BrainDumpItem> for AggregateSnapshot {
    fn from(value: &BrainDumpItem) -> Self {
        Self::BrainDumpItem(value.clone())
    }
}

/// A job the UoW will submit on successful commit (spec §4.7). `due_at`
/// defaults to "now" for reactive side effects fired immediately.
#[derive(Debug, Clone)]
pub struct PendingJob {
    pub job_type: JobType,
    pub due_at: DateTime<Utc>,
    pub payload: Option<Value>,
}

/// Per-transaction collector for deferred work, discarded wholesale on
/// rollback so no orphan job can ever be enqueued without its triggering
/// state change (spec §4.7).
#[derive(Debug, Clone, Default)]
pub struct WorkersToSchedule {
    jobs: Vec<PendingJob>,
}

impl WorkersToSchedule {
    pub fn schedule_process_brain_dump_item(&mut self, user_id: Uuid, day_date: chrono::NaiveDate, item_id: Uuid) {
        self.jobs.push(PendingJob {
            job_type: JobType::ProcessBrainDumpItem,
            due_at: Utc::now(),
            payload: Some(serde_json::json!({
                "user_id": user_id,
                "day_date": day_date,
                "item_id": item_id,
            })),
        });
    }

    pub fn schedule_process_inbound_sms_message(&mut self, user_id: Uuid, message_id: Uuid) {
        self.jobs.push(PendingJob {
            job_type: JobType::ProcessInboundSmsMessage,
            due_at: Utc::now(),
            payload: Some(serde_json::json!({
                "user_id": user_id,
                "message_id": message_id,
            })),
        });
    }

    pub fn schedule_send_push_notification(&mut self, user_id: Uuid, notification_id: Uuid) {
        self.jobs.push(PendingJob {
            job_type: JobType::SendPushNotification,
            due_at: Utc::now(),
            payload: Some(serde_json::json!({
                "user_id": user_id,
                "notification_id": notification_id,
            })),
        });
    }

    pub fn schedule_send_sms_message(&mut self, user_id: Uuid, message_id: Uuid) {
        self.jobs.push(PendingJob {
            job_type: JobType::SendSmsMessage,
            due_at: Utc::now(),
            payload: Some(serde_json::json!({
                "user_id": user_id,
                "message_id": message_id,
            })),
        });
    }

    pub fn push(&mut self, job: PendingJob) {
        self.jobs.push(job);
    }
}

/// Non-`Send`, non-`Clone`: callers must hold a UoW on a single logical task
/// and consume it via `commit`/`rollback` (spec §4.1, SPEC_FULL §4.1).
pub struct UnitOfWork<'a> {
    store: Store,
    dispatcher: &'a EventDispatcher,
    pubsub: &'a PubSubBus,
    user_id: Uuid,
    tx: Option<sqlx::Transaction<'static, sqlx::Postgres>>,
    snapshots: Vec<AggregateSnapshot>,
    events: Vec<crate::domain::PendingEvent>,
    workers: WorkersToSchedule,
}

impl<'a> UnitOfWork<'a> {
    /// Opens a fresh transaction. Nesting (spec §4.1: "nested `begin` reuses
    /// the outer transaction") is modeled at the call site instead of here —
    /// a handler that already holds a `&mut UnitOfWork` takes it by
    /// reference rather than calling `begin` again, so the outer transaction
    /// is always the only one in play for a given commit.
    pub async fn begin(
        store: Store,
        dispatcher: &'a EventDispatcher,
        pubsub: &'a PubSubBus,
        user_id: Uuid,
    ) -> Result<Self, UowError> {
        let tx = store.pool().begin().await.map_err(StoreError::from)?;
        Ok(Self {
            store,
            dispatcher,
            pubsub,
            user_id,
            tx: Some(tx),
            snapshots: Vec::new(),
            events: Vec::new(),
            workers: WorkersToSchedule::default(),
        })
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Raw access to the open transaction, for repo calls that fall outside
    /// `add()`'s upsert-a-snapshot shape (e.g. the routine-sourced-task
    /// delete that precedes `schedule_day`'s materialization step).
    pub fn connection(&mut self) -> &mut sqlx::PgConnection {
        self.tx.as_mut().expect("UnitOfWork used after commit/rollback")
    }

    pub fn workers(&mut self) -> &mut WorkersToSchedule {
        &mut self.workers
    }

    /// Stages an aggregate for upsert and drains its pending events into
    /// this UoW's buffer (spec §4.1 steps 1–2).
    pub fn add<T>(&mut self, entity: &mut T)
    where
        T: Aggregate,
        for<'e> AggregateSnapshot: From<&'e T>,
    {
        self.snapshots.push(AggregateSnapshot::from(&*entity));
        self.events.extend(entity.drain_events());
    }

    /// Runs the five-step commit algorithm (spec §4.1). Consumes `self`:
    /// once committed (or rolled back) the UoW cannot be reused.
    pub async fn commit(mut self) -> Result<(), UowError> {
        let occurred_at = Utc::now();
        let stamped: Vec<DomainEvent> = self
            .events
            .drain(..)
            .map(|event| event.stamp(self.user_id, occurred_at))
            .collect();

        {
            let tx = self.tx.as_mut().expect("UnitOfWork used after commit/rollback");
            for snapshot in &self.snapshots {
                snapshot.upsert_in_tx(&self.store, tx).await?;
            }

            let mut audit_ids = Vec::with_capacity(stamped.len());
            for event in &stamped {
                if !event.is_auditable() {
                    audit_ids.push(None);
                    continue;
                }
                let id = self
                    .store
                    .insert_audit_log_in_tx(
                        tx,
                        self.user_id,
                        &event.activity_type(),
                        event.entity_id,
                        event.entity_type,
                        event.occurred_at,
                        event.entity_data(),
                    )
                    .await?;
                audit_ids.push(Some(id));
            }

            for job in &self.workers.jobs {
                self.store
                    .enqueue_job_in_tx(
                        tx,
                        self.user_id,
                        job.job_type,
                        job.due_at,
                        job.payload.as_ref(),
                    )
                    .await?;
            }
        }

        let tx = self.tx.take().expect("UnitOfWork used after commit/rollback");
        tx.commit().await.map_err(StoreError::from)?;

        // Post-commit: publish, dispatch, enqueue — failures here are
        // logged, never raised, because the DB transaction already landed
        // (spec §4.1 step 5, error-handling policy in §7).
        for event in &stamped {
            if event.is_auditable() {
                if let Err(error) = self.pubsub.publish_audit_log(self.user_id, event).await {
                    error!(user_id = %self.user_id, %error, "failed to publish audit log after commit");
                }
            } else if let Err(error) = self.pubsub.publish_domain_event(self.user_id, event).await {
                error!(user_id = %self.user_id, %error, "failed to publish domain event after commit");
            }
        }

        for event in &stamped {
            self.dispatcher.dispatch(event.clone()).await;
        }

        Ok(())
    }

    pub async fn rollback(mut self) -> Result<(), UowError> {
        if let Some(tx) = self.tx.take() {
            tx.rollback().await.map_err(StoreError::from)?;
        }
        self.events.clear();
        self.snapshots.clear();
        self.workers.jobs.clear();
        Ok(())
    }
}
