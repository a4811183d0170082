//! In-process job store used when no `DATABASE_URL` is configured and by
//! tests.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::store::{ImportJobStore, JobStoreError};
use super::{ImportJob, ImportProgress, JobStatus, NewImportJob, ProcessOptions};
use crate::orchestrator::ImportPhase;
use crate::preview::ImportPreview;
use crate::types::{ImportId, Timestamp};

#[derive(Default)]
pub struct MemoryJobStore {
    jobs: RwLock<HashMap<ImportId, ImportJob>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }
}

#[async_trait]
impl ImportJobStore for MemoryJobStore {
    async fn create(&self, input: NewImportJob) -> Result<ImportJob, JobStoreError> {
        let job = ImportJob::new(Uuid::new_v4(), input, Utc::now());
        self.jobs.write().await.insert(job.id, job.clone());
        Ok(job)
    }

    async fn find_by_id(&self, id: ImportId) -> Result<Option<ImportJob>, JobStoreError> {
        Ok(self.jobs.read().await.get(&id).cloned())
    }

    async fn claim(&self, id: ImportId) -> Result<Option<ImportJob>, JobStoreError> {
        let mut jobs = self.jobs.write().await;
        let Some(job) = jobs.get_mut(&id).filter(|j| j.status == JobStatus::Queued) else {
            return Ok(None);
        };
        job.status = JobStatus::Processing;
        job.updated_at = Utc::now();
        Ok(Some(job.clone()))
    }

    async fn requeue(
        &self,
        id: ImportId,
        options: &ProcessOptions,
    ) -> Result<Option<ImportJob>, JobStoreError> {
        let mut jobs = self.jobs.write().await;
        let Some(job) = jobs
            .get_mut(&id)
            .filter(|j| j.status.is_terminal() && !j.is_committed())
        else {
            return Ok(None);
        };
        job.status = JobStatus::Queued;
        job.phase = ImportPhase::Received;
        job.options = options.clone();
        job.progress = None;
        job.preview = None;
        job.finished_at = None;
        job.updated_at = Utc::now();
        Ok(Some(job.clone()))
    }

    async fn requeue_interrupted(&self) -> Result<Vec<ImportId>, JobStoreError> {
        let mut jobs = self.jobs.write().await;
        let mut queued = Vec::new();
        for job in jobs.values_mut() {
            if job.status == JobStatus::Processing {
                job.status = JobStatus::Queued;
                job.phase = ImportPhase::Received;
                job.progress = None;
                job.updated_at = Utc::now();
            }
            if job.status == JobStatus::Queued {
                queued.push((job.created_at, job.id));
            }
        }
        queued.sort();
        Ok(queued.into_iter().map(|(_, id)| id).collect())
    }

    async fn update_phase(
        &self,
        id: ImportId,
        phase: ImportPhase,
        progress: &ImportProgress,
    ) -> Result<(), JobStoreError> {
        if let Some(job) = self.jobs.write().await.get_mut(&id) {
            job.phase = phase;
            job.progress = Some(progress.clone());
            job.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn finish(
        &self,
        id: ImportId,
        status: JobStatus,
        progress: &ImportProgress,
        preview: Option<&ImportPreview>,
    ) -> Result<bool, JobStoreError> {
        let mut jobs = self.jobs.write().await;
        let Some(job) = jobs
            .get_mut(&id)
            .filter(|j| j.status == JobStatus::Processing)
        else {
            return Ok(false);
        };
        let now = Utc::now();
        job.status = status;
        job.phase = progress.phase;
        job.progress = Some(progress.clone());
        job.preview = preview.cloned();
        job.finished_at = Some(now);
        job.updated_at = now;
        Ok(true)
    }

    async fn delete_older_than(&self, cutoff: Timestamp) -> Result<u64, JobStoreError> {
        let mut jobs = self.jobs.write().await;
        let before = jobs.len();
        jobs.retain(|_, j| !(j.status.is_terminal() && j.updated_at < cutoff));
        Ok((before - jobs.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use crate::parser::ParsedTable;
    use crate::workflow::WorkflowKind;

    fn input() -> NewImportJob {
        NewImportJob {
            program_id: Uuid::new_v4(),
            mapping_id: "germplasm".to_string(),
            workflow: WorkflowKind::Germplasm,
            file_name: None,
            user_fields: BTreeMap::new(),
            created_by: None,
            table: ParsedTable::default(),
        }
    }

    #[tokio::test]
    async fn claim_only_once() {
        let store = MemoryJobStore::new();
        let job = store.create(input()).await.unwrap();
        assert_eq!(job.status, JobStatus::Queued);

        assert!(store.claim(job.id).await.unwrap().is_some());
        assert!(store.claim(job.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn finish_requires_processing() {
        let store = MemoryJobStore::new();
        let job = store.create(input()).await.unwrap();
        let progress = ImportProgress::succeeded("done", 0);

        assert!(!store
            .finish(job.id, JobStatus::Succeeded, &progress, None)
            .await
            .unwrap());
        store.claim(job.id).await.unwrap();
        assert!(store
            .finish(job.id, JobStatus::Succeeded, &progress, None)
            .await
            .unwrap());

        let stored = store.find_by_id(job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Succeeded);
        assert_eq!(stored.phase, ImportPhase::Done);
        assert!(stored.finished_at.is_some());
    }

    #[tokio::test]
    async fn requeue_only_from_terminal() {
        let store = MemoryJobStore::new();
        let job = store.create(input()).await.unwrap();
        let options = ProcessOptions {
            commit: true,
            ..ProcessOptions::default()
        };
        assert!(store.requeue(job.id, &options).await.unwrap().is_none());

        store.claim(job.id).await.unwrap();
        store
            .finish(job.id, JobStatus::Failed, &ImportProgress::succeeded("x", 0), None)
            .await
            .unwrap();
        let requeued = store.requeue(job.id, &options).await.unwrap().unwrap();
        assert_eq!(requeued.status, JobStatus::Queued);
        assert!(requeued.options.commit);
        assert!(requeued.progress.is_none());
    }

    #[tokio::test]
    async fn committed_job_is_not_requeued() {
        let store = MemoryJobStore::new();
        let job = store.create(input()).await.unwrap();
        let commit = ProcessOptions {
            commit: true,
            ..ProcessOptions::default()
        };
        store.claim(job.id).await.unwrap();
        store
            .finish(job.id, JobStatus::Succeeded, &ImportProgress::succeeded("ok", 0), None)
            .await
            .unwrap();
        store.requeue(job.id, &commit).await.unwrap().unwrap();
        store.claim(job.id).await.unwrap();
        store
            .finish(job.id, JobStatus::Succeeded, &ImportProgress::succeeded("ok", 0), None)
            .await
            .unwrap();

        assert!(store.requeue(job.id, &commit).await.unwrap().is_none());
        assert!(store
            .requeue(job.id, &ProcessOptions::preview())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn requeue_interrupted_resets_processing_jobs() {
        let store = MemoryJobStore::new();
        let queued = store.create(input()).await.unwrap();
        let running = store.create(input()).await.unwrap();
        let done = store.create(input()).await.unwrap();
        store.claim(running.id).await.unwrap();
        store
            .update_phase(
                running.id,
                ImportPhase::Resolving,
                &ImportProgress::running(ImportPhase::Resolving, 0, 0),
            )
            .await
            .unwrap();
        store.claim(done.id).await.unwrap();
        store
            .finish(done.id, JobStatus::Failed, &ImportProgress::succeeded("x", 0), None)
            .await
            .unwrap();

        let ids = store.requeue_interrupted().await.unwrap();

        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&queued.id));
        assert!(ids.contains(&running.id));
        let reset = store.find_by_id(running.id).await.unwrap().unwrap();
        assert_eq!(reset.status, JobStatus::Queued);
        assert_eq!(reset.phase, ImportPhase::Received);
        assert!(reset.progress.is_none());
        let untouched = store.find_by_id(done.id).await.unwrap().unwrap();
        assert_eq!(untouched.status, JobStatus::Failed);
    }

    #[tokio::test]
    async fn delete_older_than_keeps_pending_jobs() {
        let store = MemoryJobStore::new();
        let pending = store.create(input()).await.unwrap();
        let done = store.create(input()).await.unwrap();
        store.claim(done.id).await.unwrap();
        store
            .finish(done.id, JobStatus::Succeeded, &ImportProgress::succeeded("ok", 0), None)
            .await
            .unwrap();

        let deleted = store
            .delete_older_than(Utc::now() + chrono::Duration::seconds(1))
            .await
            .unwrap();
        assert_eq!(deleted, 1);
        assert!(store.find_by_id(pending.id).await.unwrap().is_some());
        assert!(store.find_by_id(done.id).await.unwrap().is_none());
    }
}
