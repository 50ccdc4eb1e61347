//! Alert jobs raised by check status changes.

use chrono::{DateTime, SecondsFormat, Utc};
use uuid::Uuid;

use crate::job::NewJob;

/// Job type for alert dispatch.
pub const SEND_ALERT: &str = "send_alert";

/// A check moved to a new status at a point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub check_code: Uuid,
    pub new_status: String,
    pub at: DateTime<Utc>,
}

impl StatusChange {
    pub fn new(check_code: Uuid, new_status: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            check_code,
            new_status: new_status.into(),
            at,
        }
    }

    pub fn payload(&self) -> serde_json::Value {
        serde_json::json!({
            "check_code": self.check_code.to_string(),
            "new_status": self.new_status,
        })
    }

    /// Deterministic key for this transition; the same change always maps
    /// to the same key.
    pub fn idempotency_key(&self) -> String {
        format!(
            "{}:{}:{}:{}",
            SEND_ALERT,
            self.check_code,
            self.new_status,
            self.at.to_rfc3339_opts(SecondsFormat::Micros, true)
        )
    }

    pub fn to_new_job(&self) -> NewJob {
        NewJob::new(SEND_ALERT, self.payload())
            .with_idempotency_key(self.idempotency_key())
    }
}
