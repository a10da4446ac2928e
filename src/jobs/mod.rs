//! Extraction jobs
//!
//! A job wraps one submitted document: it is validated up front, stored as
//! `pending`, processed in the background and ends in exactly one terminal
//! status (`completed`, `failed` or `cancelled`).

mod service;
mod store;
mod types;

pub use service::{JobService, JobServiceConfig, SubmitJob, DEFAULT_MAX_UPLOAD_BYTES};
pub use store::{InMemoryJobStore, JobStore};
pub use types::{JobError, JobOutcome, JobRecord, JobStatus};
