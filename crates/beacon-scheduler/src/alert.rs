//! `send_alert` job handler.

use async_trait::async_trait;
use beacon_core::{CheckLookup, HandlerError, JobHandler, SEND_ALERT};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Validates alert jobs against the checks they reference.
///
/// Delivery of the alert itself happens elsewhere; a job succeeds once its
/// payload names a check that still exists.
pub struct SendAlertHandler {
    checks: Arc<dyn CheckLookup>,
}

impl SendAlertHandler {
    pub fn new(checks: Arc<dyn CheckLookup>) -> Self {
        Self { checks }
    }
}

#[async_trait]
impl JobHandler for SendAlertHandler {
    fn job_type(&self) -> &'static str {
        SEND_ALERT
    }

    async fn handle(&self, payload: &serde_json::Value) -> Result<(), HandlerError> {
        // Only check_code is required; other fields are passed through untouched.
        let raw = payload
            .get("check_code")
            .and_then(serde_json::Value::as_str)
            .filter(|code| !code.is_empty())
            .ok_or(HandlerError::MissingField("check_code"))?;
        let code = Uuid::parse_str(raw).map_err(|e| HandlerError::InvalidField {
            field: "check_code",
            message: e.to_string(),
        })?;

        let exists = self
            .checks
            .exists(code)
            .await
            .map_err(|e| HandlerError::Failed(e.to_string()))?;
        if !exists {
            return Err(HandlerError::NotFound(format!("check {}", code)));
        }

        debug!(
            check_code = %code,
            new_status = ?payload.get("new_status"),
            "Alert job validated"
        );
        Ok(())
    }
}
