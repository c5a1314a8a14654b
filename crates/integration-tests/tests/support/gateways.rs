#![allow(dead_code)]

use std::sync::Mutex;

use shared::domain::push::PushSubscription;
use shared::gateways::{
    CalendarGateway, CalendarGatewayFuture, CalendarSyncResult, PushGateway, PushGatewayFuture,
    SmsGateway, SmsGatewayFuture,
};

/// Replays one canned `CalendarSyncResult` regardless of the request, the
/// same role the teacher's LLM gateway stubs play in command tests.
pub struct StubCalendarGateway {
    result: CalendarSyncResult,
}

impl StubCalendarGateway {
    pub fn new(result: CalendarSyncResult) -> Self {
        Self { result }
    }
}

impl CalendarGateway for StubCalendarGateway {
    fn load_calendar_events<'a>(
        &'a self,
        _request: shared::gateways::CalendarSyncRequest,
    ) -> CalendarGatewayFuture<'a> {
        let result = self.result.clone();
        Box::pin(async move { Ok(result) })
    }
}

/// Records every push it is asked to send so tests can assert on fan-out.
#[derive(Default)]
pub struct RecordingPushGateway {
    sent: Mutex<Vec<String>>,
}

impl RecordingPushGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent_payloads(&self) -> Vec<String> {
        self.sent.lock().expect("lock should not be poisoned").clone()
    }
}

impl PushGateway for RecordingPushGateway {
    fn send_push<'a>(
        &'a self,
        _subscription: &'a PushSubscription,
        payload: &'a str,
    ) -> PushGatewayFuture<'a> {
        self.sent
            .lock()
            .expect("lock should not be poisoned")
            .push(payload.to_string());
        Box::pin(async { Ok(()) })
    }
}

/// Records every SMS it is asked to send; never used in the current
/// scenario set but kept alongside `RecordingPushGateway` for symmetry.
#[derive(Default)]
pub struct RecordingSmsGateway {
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingSmsGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent_messages(&self) -> Vec<(String, String)> {
        self.sent.lock().expect("lock should not be poisoned").clone()
    }
}

impl SmsGateway for RecordingSmsGateway {
    fn send_message<'a>(&'a self, phone: &'a str, body: &'a str) -> SmsGatewayFuture<'a> {
        self.sent
            .lock()
            .expect("lock should not be poisoned")
            .push((phone.to_string(), body.to_string()));
        Box::pin(async { Ok(()) })
    }
}

