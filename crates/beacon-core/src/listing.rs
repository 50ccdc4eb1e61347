//! Flat job documents for read-only listings.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::job::Job;

/// A job rendered with string ids and ISO 8601 timestamps.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobDocument {
    pub uuid: String,
    pub job_type: String,
    pub payload: serde_json::Value,
    pub status: String,
    pub attempts: i32,
    pub max_attempts: i32,
    pub idempotency_key: String,
    pub created: String,
    pub scheduled_at: String,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
    pub error: String,
}

fn iso(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339()
}

impl From<&Job> for JobDocument {
    fn from(job: &Job) -> Self {
        Self {
            uuid: job.id.to_string(),
            job_type: job.job_type.clone(),
            payload: job.payload.clone(),
            status: job.status.to_string(),
            attempts: job.attempts,
            max_attempts: job.max_attempts,
            idempotency_key: job.idempotency_key.clone(),
            created: iso(job.created),
            scheduled_at: iso(job.scheduled_at),
            started_at: job.started_at.map(iso),
            completed_at: job.completed_at.map(iso),
            error: job.error.clone(),
        }
    }
}

/// Response body of a job listing: `{"jobs": [...]}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JobListing {
    pub jobs: Vec<JobDocument>,
}

impl JobListing {
    pub fn new(jobs: &[Job]) -> Self {
        Self {
            jobs: jobs.iter().map(JobDocument::from).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::NewJob;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_document_keys_and_values() {
        let created = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let job = NewJob::new("send_alert", json!({"check_code": "abc"}))
            .with_idempotency_key("test-key-123")
            .into_job(created);

        let value = serde_json::to_value(JobDocument::from(&job)).unwrap();
        for key in [
            "uuid",
            "job_type",
            "payload",
            "status",
            "attempts",
            "max_attempts",
            "idempotency_key",
            "created",
            "scheduled_at",
            "started_at",
            "completed_at",
            "error",
        ] {
            assert!(value.get(key).is_some(), "missing key: {key}");
        }

        assert_eq!(value["uuid"], json!(job.id.to_string()));
        assert_eq!(value["payload"], json!({"check_code": "abc"}));
        assert_eq!(value["status"], json!("pending"));
        assert_eq!(value["idempotency_key"], json!("test-key-123"));
        assert_eq!(value["created"], json!("2024-01-02T03:04:05+00:00"));
        assert!(value["started_at"].is_null());
        assert!(value["completed_at"].is_null());
        assert_eq!(value["error"], json!(""));
    }

    #[test]
    fn test_empty_listing() {
        let value = serde_json::to_value(JobListing::new(&[])).unwrap();
        assert_eq!(value, json!({"jobs": []}));
    }
}
