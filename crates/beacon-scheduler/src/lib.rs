//! Job scheduling for the Beacon job queue.
//!
//! Enqueues jobs, claims them for workers and applies the retry policy to
//! their outcomes. All coordination goes through the job store; claims rely
//! on the store's exclusive "take next eligible job" primitive.

pub mod alert;
pub mod error;
pub mod queue;
pub mod registry;
pub mod worker;

pub use alert::SendAlertHandler;
pub use error::{SchedulerError, SchedulerResult};
pub use queue::JobQueue;
pub use registry::HandlerRegistry;
pub use worker::{BatchReport, Worker, WorkerOptions};
