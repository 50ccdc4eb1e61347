//! Handler registry.
//!
//! Maps job type strings (e.g. "send_alert") to the handler that executes
//! them. New job types are added by registering a handler; claim and retry
//! logic never changes.

use beacon_core::{HandlerError, Job, JobHandler};
use std::collections::HashMap;
use std::sync::Arc;

/// Registry that maps job type strings to handlers.
#[derive(Default, Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<&'static str, Arc<dyn JobHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under its own job type, replacing any previous one.
    pub fn register(&mut self, handler: Arc<dyn JobHandler>) {
        self.handlers.insert(handler.job_type(), handler);
    }

    pub fn with_handler(mut self, handler: Arc<dyn JobHandler>) -> Self {
        self.register(handler);
        self
    }

    pub fn is_registered(&self, job_type: &str) -> bool {
        self.handlers.contains_key(job_type)
    }

    pub fn registered_types(&self) -> Vec<&'static str> {
        let mut types: Vec<_> = self.handlers.keys().copied().collect();
        types.sort_unstable();
        types
    }

    /// Run the handler for `job`. An unregistered job type is a failure,
    /// never a silent skip.
    pub async fn execute(&self, job: &Job) -> Result<(), HandlerError> {
        let handler = self
            .handlers
            .get(job.job_type.as_str())
            .ok_or_else(|| HandlerError::UnknownJobType(job.job_type.clone()))?;
        handler.handle(&job.payload).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use beacon_core::NewJob;
    use chrono::Utc;
    use serde_json::json;

    struct Echo;

    #[async_trait]
    impl JobHandler for Echo {
        fn job_type(&self) -> &'static str {
            "echo"
        }

        async fn handle(&self, payload: &serde_json::Value) -> Result<(), HandlerError> {
            match payload.get("fail") {
                Some(reason) => Err(HandlerError::Failed(reason.to_string())),
                None => Ok(()),
            }
        }
    }

    #[test]
    fn test_register_and_check() {
        let registry = HandlerRegistry::new().with_handler(Arc::new(Echo));
        assert!(registry.is_registered("echo"));
        assert!(!registry.is_registered("unknown_job"));
        assert_eq!(registry.registered_types(), vec!["echo"]);
    }

    #[tokio::test]
    async fn test_execute_dispatches_on_job_type() {
        let registry = HandlerRegistry::new().with_handler(Arc::new(Echo));

        let ok = NewJob::new("echo", json!({})).into_job(Utc::now());
        assert!(registry.execute(&ok).await.is_ok());

        let bad = NewJob::new("echo", json!({"fail": "nope"})).into_job(Utc::now());
        assert!(matches!(
            registry.execute(&bad).await,
            Err(HandlerError::Failed(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_job_type_fails() {
        let registry = HandlerRegistry::new();
        let job = NewJob::new("nonexistent_type", json!({})).into_job(Utc::now());

        let err = registry.execute(&job).await.unwrap_err();
        assert!(err.to_string().contains("unknown job type"));
    }
}
