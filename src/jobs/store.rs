//! Job persistence
//!
//! The service only talks to [`JobStore`]; a relational backend can replace
//! [`InMemoryJobStore`] without touching the pipeline.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::types::{JobError, JobOutcome, JobRecord, JobStatus};

#[async_trait]
pub trait JobStore: Send + Sync {
    async fn insert(&self, job: JobRecord) -> Result<(), JobError>;

    async fn get(&self, id: Uuid) -> Result<JobRecord, JobError>;

    /// Jobs of one owner, newest first
    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<JobRecord>, JobError>;

    /// Validated status change
    async fn transition(
        &self,
        id: Uuid,
        next: JobStatus,
        outcome: JobOutcome,
    ) -> Result<JobRecord, JobError>;

    /// Raise the progress of a non-terminal job
    async fn update_progress(&self, id: Uuid, progress: u8) -> Result<(), JobError>;
}

/// Process-local job store
#[derive(Clone, Default)]
pub struct InMemoryJobStore {
    jobs: Arc<RwLock<HashMap<Uuid, JobRecord>>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn insert(&self, job: JobRecord) -> Result<(), JobError> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&job.id) {
            return Err(JobError::Store(format!("duplicate job id {}", job.id)));
        }
        jobs.insert(job.id, job);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<JobRecord, JobError> {
        self.jobs
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(JobError::NotFound(id))
    }

    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<JobRecord>, JobError> {
        let jobs = self.jobs.read().await;
        let mut owned: Vec<JobRecord> = jobs
            .values()
            .filter(|job| job.owner_id == owner_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(owned)
    }

    async fn transition(
        &self,
        id: Uuid,
        next: JobStatus,
        outcome: JobOutcome,
    ) -> Result<JobRecord, JobError> {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(&id).ok_or(JobError::NotFound(id))?;
        job.transition(next, outcome)?;
        Ok(job.clone())
    }

    async fn update_progress(&self, id: Uuid, progress: u8) -> Result<(), JobError> {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(&id).ok_or(JobError::NotFound(id))?;
        job.advance(progress);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::ProcessingOptions;

    fn job(owner: &str) -> JobRecord {
        JobRecord::new(
            "doc".into(),
            owner.into(),
            "a.png".into(),
            "eng".into(),
            ProcessingOptions::default(),
            None,
        )
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let store = InMemoryJobStore::new();
        let record = job("alice");
        let id = record.id;
        store.insert(record.clone()).await.unwrap();

        assert_eq!(store.get(id).await.unwrap().owner_id, "alice");
        assert!(store.insert(record).await.is_err());
        assert!(matches!(
            store.get(Uuid::new_v4()).await,
            Err(JobError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_by_owner() {
        let store = InMemoryJobStore::new();
        store.insert(job("alice")).await.unwrap();
        store.insert(job("alice")).await.unwrap();
        store.insert(job("bob")).await.unwrap();

        assert_eq!(store.list_by_owner("alice").await.unwrap().len(), 2);
        assert_eq!(store.list_by_owner("bob").await.unwrap().len(), 1);
        assert!(store.list_by_owner("carol").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_transition_is_validated() {
        let store = InMemoryJobStore::new();
        let record = job("alice");
        let id = record.id;
        store.insert(record).await.unwrap();

        store
            .transition(id, JobStatus::Processing, JobOutcome::default())
            .await
            .unwrap();
        store.update_progress(id, 40).await.unwrap();
        store
            .transition(id, JobStatus::Cancelled, JobOutcome::default())
            .await
            .unwrap();

        let err = store
            .transition(id, JobStatus::Completed, JobOutcome::default())
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::InvalidTransition { .. }));

        let stored = store.get(id).await.unwrap();
        assert_eq!(stored.status, JobStatus::Cancelled);
        assert_eq!(stored.progress, 40);
    }
}
