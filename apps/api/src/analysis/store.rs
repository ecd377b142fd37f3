//! Job storage behind a trait so orchestration logic stays independent of
//! where state lives. The in-process map is the only implementation here; a
//! networked store is a valid drop-in for production hardening.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::analysis::models::{AnalysisResult, Job};
use crate::analysis::progress::{JobStatus, StepProgress};

/// Storage for the three per-job collections the orchestrator owns: the job
/// aggregate, its progress table, and its final result.
///
/// Writers are the background run task plus cancel/cleanup callers, so every
/// implementation must be safe under concurrent access, and reads must never
/// block on an in-flight external call.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn put_job(&self, job: Job);
    async fn get_job(&self, id: Uuid) -> Option<Job>;
    /// Removes the job and its progress/result records.
    async fn delete_job(&self, id: Uuid) -> bool;
    async fn list_jobs(&self) -> Vec<Job>;
    async fn list_jobs_by_status(&self, status: JobStatus) -> Vec<Job>;

    async fn put_progress(&self, id: Uuid, steps: Vec<StepProgress>);
    async fn get_progress(&self, id: Uuid) -> Option<Vec<StepProgress>>;

    async fn put_result(&self, id: Uuid, result: AnalysisResult);
    async fn get_result(&self, id: Uuid) -> Option<AnalysisResult>;
}

/// In-process store: three maps keyed by job id behind `RwLock`s.
#[derive(Default)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<Uuid, Job>>,
    progress: RwLock<HashMap<Uuid, Vec<StepProgress>>>,
    results: RwLock<HashMap<Uuid, AnalysisResult>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn put_job(&self, job: Job) {
        self.jobs.write().await.insert(job.id, job);
    }

    async fn get_job(&self, id: Uuid) -> Option<Job> {
        self.jobs.read().await.get(&id).cloned()
    }

    async fn delete_job(&self, id: Uuid) -> bool {
        let removed = self.jobs.write().await.remove(&id).is_some();
        self.progress.write().await.remove(&id);
        self.results.write().await.remove(&id);
        removed
    }

    async fn list_jobs(&self) -> Vec<Job> {
        self.jobs.read().await.values().cloned().collect()
    }

    async fn list_jobs_by_status(&self, status: JobStatus) -> Vec<Job> {
        self.jobs
            .read()
            .await
            .values()
            .filter(|job| job.status == status)
            .cloned()
            .collect()
    }

    async fn put_progress(&self, id: Uuid, steps: Vec<StepProgress>) {
        self.progress.write().await.insert(id, steps);
    }

    async fn get_progress(&self, id: Uuid) -> Option<Vec<StepProgress>> {
        self.progress.read().await.get(&id).cloned()
    }

    async fn put_result(&self, id: Uuid, result: AnalysisResult) {
        self.results.write().await.insert(id, result);
    }

    async fn get_result(&self, id: Uuid) -> Option<AnalysisResult> {
        self.results.read().await.get(&id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::models::{AnalysisPreferences, AnalysisRequest};
    use crate::analysis::progress::initial_progress;

    fn make_job(id: Uuid) -> Job {
        Job::new(
            id,
            AnalysisRequest {
                session_id: "session".to_string(),
                user_id: "user".to_string(),
                job_description: "desc".to_string(),
                job_url: None,
                resume_file_id: None,
                resume_text: Some("text".to_string()),
                preferences: AnalysisPreferences::default(),
            },
        )
    }

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let store = InMemoryJobStore::new();
        let id = Uuid::new_v4();
        store.put_job(make_job(id)).await;

        let job = store.get_job(id).await.unwrap();
        assert_eq!(job.id, id);
        assert!(store.get_job(Uuid::new_v4()).await.is_none());
    }

    #[tokio::test]
    async fn test_delete_removes_all_collections() {
        let store = InMemoryJobStore::new();
        let id = Uuid::new_v4();
        store.put_job(make_job(id)).await;
        store.put_progress(id, initial_progress()).await;

        assert!(store.delete_job(id).await);
        assert!(store.get_job(id).await.is_none());
        assert!(store.get_progress(id).await.is_none());
        assert!(!store.delete_job(id).await);
    }

    #[tokio::test]
    async fn test_list_by_status_filters() {
        let store = InMemoryJobStore::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        store.put_job(make_job(a)).await;

        let mut failed = make_job(b);
        failed.status = JobStatus::Failed;
        store.put_job(failed).await;

        let pending = store.list_jobs_by_status(JobStatus::Pending).await;
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, a);
        assert_eq!(store.list_jobs().await.len(), 2);
    }
}
