//! Job types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::ocr::ProcessingOptions;
use crate::pipeline::{ProcessedDocument, ValidationError};

// ============================================================================
// Status
// ============================================================================

/// Job lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// Terminal statuses are absorbing
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Pending, Failed)
                | (Pending, Cancelled)
                | (Processing, Completed)
                | (Processing, Failed)
                | (Processing, Cancelled)
        )
    }
}

// ============================================================================
// Record
// ============================================================================

/// Persisted state of one extraction job
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    pub id: Uuid,
    /// SHA-256 of the document content
    pub document_id: String,
    pub owner_id: String,
    pub file_name: String,
    pub status: JobStatus,
    /// 0-100
    pub progress: u8,
    pub language: String,
    pub options: ProcessingOptions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_pages: Option<Vec<u32>>,
    pub error_message: Option<String>,
    pub result: Option<ProcessedDocument>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Fields set alongside a status change
#[derive(Debug, Clone, Default)]
pub struct JobOutcome {
    pub error_message: Option<String>,
    pub result: Option<ProcessedDocument>,
}

impl JobOutcome {
    pub fn completed(result: ProcessedDocument) -> Self {
        Self {
            error_message: None,
            result: Some(result),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            error_message: Some(message.into()),
            result: None,
        }
    }
}

impl JobRecord {
    pub fn new(
        document_id: String,
        owner_id: String,
        file_name: String,
        language: String,
        options: ProcessingOptions,
        selected_pages: Option<Vec<u32>>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            document_id,
            owner_id,
            file_name,
            status: JobStatus::Pending,
            progress: 0,
            language,
            options,
            selected_pages,
            error_message: None,
            result: None,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
        }
    }

    /// Apply a validated status change
    pub fn transition(&mut self, next: JobStatus, outcome: JobOutcome) -> Result<(), JobError> {
        if !self.status.can_transition_to(next) {
            return Err(JobError::InvalidTransition {
                id: self.id,
                from: self.status,
                to: next,
            });
        }

        let now = Utc::now();
        self.status = next;
        self.updated_at = now;
        match next {
            JobStatus::Processing => self.started_at = Some(now),
            JobStatus::Completed => {
                self.progress = 100;
                self.completed_at = Some(now);
            }
            _ => self.completed_at = Some(now),
        }
        if outcome.error_message.is_some() {
            self.error_message = outcome.error_message;
        }
        if outcome.result.is_some() {
            self.result = outcome.result;
        }
        Ok(())
    }

    /// Raise progress; lower values and terminal jobs are ignored
    pub fn advance(&mut self, progress: u8) -> bool {
        let progress = progress.min(100);
        if self.status.is_terminal() || progress <= self.progress {
            return false;
        }
        self.progress = progress;
        self.updated_at = Utc::now();
        true
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Job service errors
#[derive(Debug, Error)]
pub enum JobError {
    #[error("Job not found: {0}")]
    NotFound(Uuid),

    #[error("Job {id} cannot move from {from:?} to {to:?}")]
    InvalidTransition {
        id: Uuid,
        from: JobStatus,
        to: JobStatus,
    },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Job store error: {0}")]
    Store(String),
}
