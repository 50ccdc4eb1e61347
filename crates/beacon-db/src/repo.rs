//! Repository traits and implementations.

pub mod check;
pub mod job;
pub mod memory;

pub use check::PgCheckLookup;
pub use job::{Enqueued, JobStore, PgJobStore};
pub use memory::MemoryJobStore;
