use jiff::Timestamp;
use tracing::{Level, event};
use uuid::Uuid;

use crate::errors::Error;

#[derive(Clone, Debug)]
pub enum RefreshOutcome {
    Success,
    /// Logout or login replaced the session while the exchange was running.
    Superseded,
    Failed,
}

/// Structured events for one refresh cycle, correlated by `attempt_id`.
#[derive(Clone, Debug)]
pub struct RefreshTelemetry {
    attempt_id: Uuid,
    context: String,
    started_at: Timestamp,
}

impl RefreshTelemetry {
    pub fn new(context: impl Into<String>) -> Self {
        Self {
            attempt_id: Uuid::new_v4(),
            context: context.into(),
            started_at: Timestamp::now(),
        }
    }

    pub fn attempt_id(&self) -> Uuid {
        self.attempt_id
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    fn elapsed_ms(&self) -> i64 {
        Timestamp::now()
            .duration_since(self.started_at)
            .as_millis() as i64
    }

    pub fn emit_start(&self) {
        event!(
            Level::INFO,
            attempt_id = %self.attempt_id,
            context = %self.context,
            timestamp = %self.started_at,
            "refresh.start"
        );
    }

    pub fn emit_success(&self, outcome: RefreshOutcome, waiters: usize) {
        event!(
            Level::INFO,
            attempt_id = %self.attempt_id,
            context = %self.context,
            timestamp = %Timestamp::now(),
            elapsed_ms = self.elapsed_ms(),
            outcome = ?outcome,
            waiters,
            "refresh.success"
        );
    }

    pub fn emit_superseded(&self, waiters: usize) {
        event!(
            Level::WARN,
            attempt_id = %self.attempt_id,
            context = %self.context,
            outcome = ?RefreshOutcome::Superseded,
            waiters,
            "refresh.superseded"
        );
    }

    pub fn emit_failure(&self, error: &Error, waiters: usize) {
        event!(
            Level::ERROR,
            attempt_id = %self.attempt_id,
            context = %self.context,
            timestamp = %Timestamp::now(),
            elapsed_ms = self.elapsed_ms(),
            outcome = ?RefreshOutcome::Failed,
            waiters,
            error = %error,
            "refresh.failure"
        );
    }
}
