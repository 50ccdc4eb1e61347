//! Core domain types and traits for the Beacon job queue.
//!
//! This crate contains:
//! - Job identifiers, records and status
//! - The retry / completion policy
//! - The job handler trait
//! - Alert jobs raised by check status changes
//! - Flat documents for job listings

pub mod alert;
pub mod check;
pub mod error;
pub mod handler;
pub mod id;
pub mod job;
pub mod listing;
pub mod retry;

pub use alert::{SEND_ALERT, StatusChange};
pub use check::{CheckLookup, KnownChecks};
pub use error::{Error, Result};
pub use handler::{HandlerError, JobHandler};
pub use id::JobId;
pub use job::{DEFAULT_MAX_ATTEMPTS, Job, JobStatus, NewJob};
pub use listing::{JobDocument, JobListing};
pub use retry::{Outcome, RetryPolicy, Transition};
