//! Orchestrates the seven-step analysis workflow: accepts jobs, runs the
//! steps as a background task, and serves progress/result/cancel/cleanup
//! queries concurrently with execution.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio::sync::RwLock;
use tracing::{error, info};
use uuid::Uuid;

use crate::analysis::models::{
    AnalysisRequest, AnalysisResult, Job, JobSummary, ProcessingMetadata, ProgressSnapshot,
};
use crate::analysis::progress::{self, JobStatus, StepStatus};
use crate::analysis::steps::{self, CancelFlag, StepContext, StepError};
use crate::analysis::store::JobStore;
use crate::errors::AppError;
use crate::llm_client::GenerativeCapability;
use crate::parser::TextExtractionCapability;

const MIN_JOB_DESCRIPTION_CHARS: usize = 50;
const MIN_RESUME_CHARS: usize = 100;

/// Service-level load summary for the admin health view.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ServiceHealth {
    pub total_jobs: usize,
    pub processing_jobs: usize,
    pub status_counts: HashMap<String, usize>,
    pub service_status: &'static str,
}

/// Owns the job lifecycle. Constructed once at startup with its collaborators
/// injected; every query path goes through the store, never through the
/// running task.
pub struct AnalysisOrchestrator {
    store: Arc<dyn JobStore>,
    llm: Arc<dyn GenerativeCapability>,
    extractor: Arc<dyn TextExtractionCapability>,
    /// Cooperative cancel flags for jobs whose background task is live.
    active: RwLock<HashMap<Uuid, CancelFlag>>,
}

impl AnalysisOrchestrator {
    pub fn new(
        store: Arc<dyn JobStore>,
        llm: Arc<dyn GenerativeCapability>,
        extractor: Arc<dyn TextExtractionCapability>,
    ) -> Arc<Self> {
        Arc::new(AnalysisOrchestrator {
            store,
            llm,
            extractor,
            active: RwLock::new(HashMap::new()),
        })
    }

    /// Accepts a job: validates the request, initializes the job and its
    /// progress table, schedules the background run, and returns the fresh
    /// job id immediately. The job is visible to `progress`/`cancel` the
    /// instant this returns, before step 1 has executed.
    pub async fn start(self: &Arc<Self>, request: AnalysisRequest) -> Result<Uuid, AppError> {
        if request.job_description.trim().len() < MIN_JOB_DESCRIPTION_CHARS {
            return Err(AppError::Validation(format!(
                "Job description must be at least {MIN_JOB_DESCRIPTION_CHARS} characters long"
            )));
        }
        let resume_len = request
            .resume_text
            .as_deref()
            .map(|t| t.trim().len())
            .unwrap_or(0);
        if resume_len == 0 {
            return Err(AppError::Validation(
                "Either resume file or resume text must be provided".to_string(),
            ));
        }
        if resume_len < MIN_RESUME_CHARS {
            return Err(AppError::Validation(format!(
                "Resume content must be at least {MIN_RESUME_CHARS} characters long"
            )));
        }

        let id = Uuid::new_v4();
        let session_id = request.session_id.clone();

        self.store.put_job(Job::new(id, request)).await;
        self.store.put_progress(id, progress::initial_progress()).await;

        let flag = CancelFlag::new();
        self.active.write().await.insert(id, flag.clone());

        info!("Started analysis job {id} for session {session_id}");

        let orchestrator = Arc::clone(self);
        tokio::spawn(async move {
            orchestrator.run(id, flag).await;
        });

        Ok(id)
    }

    /// Background execution of steps 1 through 7, strictly in order. Each
    /// step receives prior outputs by value. A failing step (other than
    /// company research) halts the run; no partial result is ever stored.
    async fn run(self: Arc<Self>, id: Uuid, cancel: CancelFlag) {
        // A cancel can land before this task is first polled; the cancelled
        // status must not be overwritten.
        if cancel.is_set() {
            self.active.write().await.remove(&id);
            return;
        }
        self.set_job_status(id, JobStatus::Processing, None).await;
        info!("Starting analysis processing for job {id}");

        let outcome = self.execute_steps(id, &cancel).await;

        match outcome {
            Ok(()) => {
                info!("Analysis job {id} completed successfully");
            }
            Err(StepError::Cancelled) => {
                // cancel() already stamped the job and its processing step.
                info!("Analysis job {id} stopped after cancellation");
            }
            Err(err) => {
                error!("Analysis job {id} failed: {err}");
                self.set_job_status(id, JobStatus::Failed, Some(err.to_string()))
                    .await;
            }
        }

        self.active.write().await.remove(&id);
    }

    async fn execute_steps(&self, id: Uuid, cancel: &CancelFlag) -> Result<(), StepError> {
        let Some(job) = self.store.get_job(id).await else {
            return Err(StepError::Cancelled);
        };
        let request = job.request;
        let started_at = job.started_at;

        let ctx = StepContext {
            job_id: id,
            store: self.store.as_ref(),
            llm: self.llm.as_ref(),
            extractor: self.extractor.as_ref(),
            cancel,
        };

        let job_analysis = steps::run_job_analysis(&ctx, &request).await?;
        let company_research = steps::run_company_research(&ctx, &request, &job_analysis).await?;
        let parsed_resume = steps::run_resume_parsing(&ctx, &request).await?;
        let skills_analysis =
            steps::run_skills_analysis(&ctx, &job_analysis, &parsed_resume).await?;
        let resume_recommendations =
            steps::run_resume_enhancement(&ctx, &job_analysis, &parsed_resume, &skills_analysis)
                .await?;
        let cover_letter =
            steps::run_cover_letter(&ctx, &request, &company_research, &parsed_resume).await?;
        let final_summary = steps::run_final_review(
            &ctx,
            &job_analysis,
            &company_research,
            &parsed_resume,
            &skills_analysis,
            &resume_recommendations,
            &cover_letter,
        )
        .await?;

        // Steps 1, 4, 5 and 6 always call the capability on success; step 2
        // only when it reached the model.
        let generative_calls = 4 + u32::from(matches!(
            company_research.method,
            crate::analysis::models::ResearchMethod::Generative
        ));

        let completed_at = Utc::now();
        let result = AnalysisResult {
            job_id: id,
            session_id: request.session_id.clone(),
            job_analysis,
            company_research,
            parsed_resume,
            skills_analysis,
            resume_recommendations,
            cover_letter,
            final_summary,
            processing_metadata: ProcessingMetadata {
                total_processing_secs: (completed_at - started_at).num_milliseconds() as f64
                    / 1000.0,
                steps_completed: 7,
                generative_calls,
            },
            created_at: started_at,
            completed_at,
        };

        // A cancel that landed during the last step wins over completion.
        if cancel.is_set() {
            return Err(StepError::Cancelled);
        }

        self.store.put_result(id, result).await;
        self.set_job_status(id, JobStatus::Completed, None).await;
        Ok(())
    }

    async fn set_job_status(&self, id: Uuid, status: JobStatus, error: Option<String>) {
        if let Some(mut job) = self.store.get_job(id).await {
            job.status = status;
            job.updated_at = Utc::now();
            if error.is_some() {
                job.error = error;
            }
            self.store.put_job(job).await;
        }
    }

    /// Point-in-time progress for a job, safe to call concurrently with the
    /// background run.
    pub async fn progress(&self, id: Uuid) -> Option<ProgressSnapshot> {
        let job = self.store.get_job(id).await?;
        let steps = self.store.get_progress(id).await.unwrap_or_default();

        Some(ProgressSnapshot {
            analysis_id: id,
            status: job.status,
            overall_progress: progress::overall_progress(&steps),
            current_step: progress::current_step(&steps).cloned(),
            steps,
            started_at: job.started_at,
            updated_at: job.updated_at,
            error: job.error,
        })
    }

    /// The stored result, only once the job has completed. Returns `None`
    /// before completion so partial state never leaks.
    pub async fn result(&self, id: Uuid) -> Option<AnalysisResult> {
        let job = self.store.get_job(id).await?;
        if job.status != JobStatus::Completed {
            return None;
        }
        self.store.get_result(id).await
    }

    /// Cancels a pending/processing job. Advisory: an in-flight external
    /// call is not aborted; its result is discarded when control returns.
    pub async fn cancel(&self, id: Uuid) -> bool {
        let Some(mut job) = self.store.get_job(id).await else {
            return false;
        };
        if job.status.is_terminal() {
            return false;
        }

        job.status = JobStatus::Cancelled;
        job.updated_at = Utc::now();
        self.store.put_job(job).await;

        if let Some(mut steps) = self.store.get_progress(id).await {
            if let Some(current) = steps
                .iter_mut()
                .find(|p| p.status == StepStatus::Processing)
            {
                current.transition(StepStatus::Cancelled, None);
            }
            self.store.put_progress(id, steps).await;
        }

        if let Some(flag) = self.active.read().await.get(&id) {
            flag.set();
        }

        info!("Analysis job {id} cancelled");
        true
    }

    /// Evicts terminal jobs not updated within `max_age`. Pending and
    /// processing jobs are never evicted, regardless of staleness.
    pub async fn cleanup(&self, max_age: Duration) -> usize {
        let cutoff = Utc::now() - max_age;
        let mut evicted = 0;

        for job in self.store.list_jobs().await {
            if job.status.is_terminal() && job.updated_at < cutoff {
                self.store.delete_job(job.id).await;
                evicted += 1;
            }
        }

        if evicted > 0 {
            info!("Cleaned up {evicted} old analysis jobs");
        }
        evicted
    }

    /// All jobs for the history view, newest first.
    pub async fn list_jobs(&self) -> Vec<JobSummary> {
        let mut jobs = self.store.list_jobs().await;
        jobs.sort_by(|a, b| b.started_at.cmp(&a.started_at));

        let mut summaries = Vec::with_capacity(jobs.len());
        for job in jobs {
            let steps = self.store.get_progress(job.id).await.unwrap_or_default();
            let description = &job.request.job_description;
            let preview = if description.chars().count() > 100 {
                let head: String = description.chars().take(100).collect();
                format!("{head}...")
            } else {
                description.clone()
            };
            summaries.push(JobSummary {
                analysis_id: job.id,
                status: job.status,
                overall_progress: progress::overall_progress(&steps),
                started_at: job.started_at,
                updated_at: job.updated_at,
                job_description_preview: preview,
                job_url: job.request.job_url.clone(),
            });
        }
        summaries
    }

    /// Job counts by status plus a coarse load flag.
    pub async fn health(&self) -> ServiceHealth {
        let jobs = self.store.list_jobs().await;
        let mut status_counts: HashMap<String, usize> = HashMap::new();
        for job in &jobs {
            let key = serde_json::to_value(job.status)
                .ok()
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_else(|| "unknown".to_string());
            *status_counts.entry(key).or_insert(0) += 1;
        }
        let processing_jobs = self
            .store
            .list_jobs_by_status(JobStatus::Processing)
            .await
            .len();

        ServiceHealth {
            total_jobs: jobs.len(),
            processing_jobs,
            status_counts,
            service_status: if processing_jobs > 10 { "busy" } else { "healthy" },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration as StdDuration;

    use async_trait::async_trait;
    use tokio::sync::Semaphore;

    use crate::analysis::models::{AnalysisPreferences, ResearchMethod};
    use crate::analysis::progress::StepStatus;
    use crate::analysis::store::InMemoryJobStore;
    use crate::llm_client::{prompts, CapabilityError, Completion};
    use crate::parser::ResumeParser;

    const JOB_DESCRIPTION: &str = "We are hiring a senior engineer with Python, React and 5+ \
        years of experience building distributed web services for logistics customers.";

    const RESUME_TEXT: &str = "\
John Doe
john@example.com | (555) 123-4567

Experience

Senior Software Engineer at Initech Inc (01/2020 - present)
• Built Python services processing millions of events daily
• Shipped React dashboards used across the organization

Education

Bachelor of Science in Computer Science
Stanford University
2016

Skills
Python, JavaScript, React
";

    /// Scripted generative capability: canned JSON per step, selectable
    /// failures, and an optional gate that holds every call until released.
    struct FakeCapability {
        fail_systems: Vec<&'static str>,
        gate: Option<Arc<Semaphore>>,
    }

    impl FakeCapability {
        fn ok() -> Self {
            FakeCapability {
                fail_systems: vec![],
                gate: None,
            }
        }

        fn failing(fail_systems: Vec<&'static str>) -> Self {
            FakeCapability {
                fail_systems,
                gate: None,
            }
        }

        fn gated(gate: Arc<Semaphore>) -> Self {
            FakeCapability {
                fail_systems: vec![],
                gate: Some(gate),
            }
        }
    }

    #[async_trait]
    impl GenerativeCapability for FakeCapability {
        async fn generate(
            &self,
            _prompt: &str,
            system: &str,
        ) -> Result<Completion, CapabilityError> {
            if let Some(gate) = &self.gate {
                gate.acquire().await.expect("gate closed").forget();
            }
            if self.fail_systems.contains(&system) {
                return Err(CapabilityError::Api {
                    status: 500,
                    message: "upstream failure".to_string(),
                });
            }

            let text = if system == prompts::JOB_ANALYSIS_SYSTEM {
                r#"{"job_title": "Senior Engineer", "company_name": "Acme Corp",
                    "industry": "Technology", "requirements": ["Python", "React"],
                    "keywords": ["Python", "React"]}"#
                    .to_string()
            } else if system == prompts::COMPANY_RESEARCH_SYSTEM {
                r#"{"company_name": "Acme Corp", "industry": "Technology",
                    "research_summary": "A steady mid-size software company.",
                    "culture_insights": ["Remote-friendly"]}"#
                    .to_string()
            } else if system == prompts::SKILLS_ANALYSIS_SYSTEM {
                r#"{"current_skills": ["Python"], "missing_skills": ["Kubernetes", "Terraform"],
                    "skill_gaps": ["No infrastructure automation experience"]}"#
                    .to_string()
            } else if system == prompts::RESUME_ANALYSIS_SYSTEM {
                r#"{"overall_score": 8.0, "improvements": ["Quantify impact",
                    "Lead with outcomes", "Trim the oldest role", "Add project links"]}"#
                    .to_string()
            } else {
                "Dear Hiring Manager,\n\nI am excited to apply for this role.\n\nSincerely,\nJohn"
                    .to_string()
            };

            Ok(Completion {
                text,
                tokens_used: 250,
                latency: StdDuration::from_millis(3),
            })
        }
    }

    fn make_request() -> AnalysisRequest {
        AnalysisRequest {
            session_id: "session-1".to_string(),
            user_id: "user-1".to_string(),
            job_description: JOB_DESCRIPTION.to_string(),
            job_url: Some("https://jobs.example.com/123".to_string()),
            resume_file_id: None,
            resume_text: Some(RESUME_TEXT.to_string()),
            preferences: AnalysisPreferences::default(),
        }
    }

    fn build(
        llm: FakeCapability,
    ) -> (Arc<AnalysisOrchestrator>, Arc<InMemoryJobStore>) {
        let store = Arc::new(InMemoryJobStore::new());
        let orchestrator = AnalysisOrchestrator::new(
            store.clone(),
            Arc::new(llm),
            Arc::new(ResumeParser::new()),
        );
        (orchestrator, store)
    }

    async fn wait_terminal(orchestrator: &AnalysisOrchestrator, id: Uuid) -> JobStatus {
        for _ in 0..400 {
            if let Some(snapshot) = orchestrator.progress(id).await {
                if snapshot.status.is_terminal() {
                    return snapshot.status;
                }
            }
            tokio::time::sleep(StdDuration::from_millis(5)).await;
        }
        panic!("job {id} never reached a terminal status");
    }

    #[tokio::test]
    async fn test_start_returns_before_execution_with_zero_progress() {
        let gate = Arc::new(Semaphore::new(0));
        let (orchestrator, _store) = build(FakeCapability::gated(gate.clone()));

        let id = orchestrator.start(make_request()).await.unwrap();

        // The first external call is gated, so nothing can have completed.
        let snapshot = orchestrator.progress(id).await.unwrap();
        assert_eq!(snapshot.overall_progress, 0);
        assert!(matches!(
            snapshot.status,
            JobStatus::Pending | JobStatus::Processing
        ));
        assert!(orchestrator.result(id).await.is_none());

        gate.add_permits(16);
        assert_eq!(wait_terminal(&orchestrator, id).await, JobStatus::Completed);
    }

    #[tokio::test]
    async fn test_completed_job_has_full_progress_and_result() {
        let (orchestrator, _store) = build(FakeCapability::ok());
        let id = orchestrator.start(make_request()).await.unwrap();

        assert_eq!(wait_terminal(&orchestrator, id).await, JobStatus::Completed);

        let snapshot = orchestrator.progress(id).await.unwrap();
        assert_eq!(snapshot.overall_progress, 100);
        assert!(snapshot
            .steps
            .iter()
            .all(|p| p.status == StepStatus::Completed));
        assert!(snapshot.current_step.is_none());

        let result = orchestrator.result(id).await.unwrap();
        assert_eq!(result.processing_metadata.steps_completed, 7);
        assert_eq!(result.processing_metadata.generative_calls, 5);
        assert_eq!(
            result.job_analysis.job_title.as_deref(),
            Some("Senior Engineer")
        );
        assert!(result.cover_letter.word_count > 0);
        assert_eq!(result.resume_recommendations.skills_gap_insights.len(), 2);
    }

    #[tokio::test]
    async fn test_completed_job_match_score_scenario() {
        // Resume skills Python/JavaScript/React against JD keywords
        // Python+React: the 0.4 overlap term is fully earned.
        let (orchestrator, _store) = build(FakeCapability::ok());
        let id = orchestrator.start(make_request()).await.unwrap();
        wait_terminal(&orchestrator, id).await;

        let result = orchestrator.result(id).await.unwrap();
        let summary = &result.final_summary;
        assert!(
            summary.job_match_score > 0.5,
            "expected > 0.5, got {}",
            summary.job_match_score
        );
        assert_eq!(summary.key_findings.skills_match, "3 skills identified");
        assert!(summary.key_findings.cover_letter_generated);
        assert_eq!(summary.recommendations_summary.top_priorities.len(), 3);
        assert_eq!(
            summary.recommendations_summary.skills_to_develop,
            vec!["Kubernetes", "Terraform"]
        );
    }

    #[tokio::test]
    async fn test_company_research_failure_degrades_not_fails() {
        let (orchestrator, _store) = build(FakeCapability::failing(vec![
            prompts::COMPANY_RESEARCH_SYSTEM,
        ]));
        let id = orchestrator.start(make_request()).await.unwrap();

        assert_eq!(wait_terminal(&orchestrator, id).await, JobStatus::Completed);

        let result = orchestrator.result(id).await.unwrap();
        assert_eq!(result.company_research.method, ResearchMethod::Failed);
        assert_eq!(result.company_research.company_name, "Research failed");
        assert!(result
            .company_research
            .research_summary
            .contains("encountered an error"));
        // Only four generative calls succeeded.
        assert_eq!(result.processing_metadata.generative_calls, 4);

        let snapshot = orchestrator.progress(id).await.unwrap();
        let research = snapshot
            .steps
            .iter()
            .find(|p| p.step == crate::analysis::progress::AnalysisStep::CompanyResearch)
            .unwrap();
        assert_eq!(research.status, StepStatus::Failed);
        assert!(research.error_message.is_some());
        let other_completed = snapshot
            .steps
            .iter()
            .filter(|p| p.status == StepStatus::Completed)
            .count();
        assert_eq!(other_completed, 6);
        assert_eq!(snapshot.overall_progress, 86);
    }

    #[tokio::test]
    async fn test_fatal_step_failure_halts_job() {
        let (orchestrator, _store) = build(FakeCapability::failing(vec![
            prompts::SKILLS_ANALYSIS_SYSTEM,
        ]));
        let id = orchestrator.start(make_request()).await.unwrap();

        assert_eq!(wait_terminal(&orchestrator, id).await, JobStatus::Failed);
        assert!(orchestrator.result(id).await.is_none());

        let snapshot = orchestrator.progress(id).await.unwrap();
        assert!(snapshot
            .error
            .as_deref()
            .unwrap()
            .contains("Skills Gap Analysis failed"));

        let statuses: Vec<StepStatus> = snapshot.steps.iter().map(|p| p.status).collect();
        assert_eq!(
            statuses,
            vec![
                StepStatus::Completed,
                StepStatus::Completed,
                StepStatus::Completed,
                StepStatus::Failed,
                StepStatus::Pending,
                StepStatus::Pending,
                StepStatus::Pending,
            ]
        );
    }

    #[tokio::test]
    async fn test_validation_rejects_before_job_creation() {
        let (orchestrator, store) = build(FakeCapability::ok());

        let mut short_description = make_request();
        short_description.job_description = "Too short".to_string();
        assert!(matches!(
            orchestrator.start(short_description).await,
            Err(AppError::Validation(_))
        ));

        let mut no_resume = make_request();
        no_resume.resume_text = None;
        assert!(matches!(
            orchestrator.start(no_resume).await,
            Err(AppError::Validation(_))
        ));

        // The "hi" resume: rejected up front, never reaches the parser step.
        let mut tiny_resume = make_request();
        tiny_resume.resume_text = Some("hi".to_string());
        assert!(matches!(
            orchestrator.start(tiny_resume).await,
            Err(AppError::Validation(_))
        ));

        assert!(store.list_jobs().await.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_processing_job() {
        let gate = Arc::new(Semaphore::new(0));
        let (orchestrator, _store) = build(FakeCapability::gated(gate.clone()));
        let id = orchestrator.start(make_request()).await.unwrap();

        // Let the background task reach the gated step-1 call.
        for _ in 0..400 {
            let snapshot = orchestrator.progress(id).await.unwrap();
            if snapshot.steps[0].status == StepStatus::Processing {
                break;
            }
            tokio::time::sleep(StdDuration::from_millis(5)).await;
        }

        assert!(orchestrator.cancel(id).await);
        let snapshot = orchestrator.progress(id).await.unwrap();
        assert_eq!(snapshot.status, JobStatus::Cancelled);
        assert_eq!(snapshot.steps[0].status, StepStatus::Cancelled);
        assert!(snapshot.steps[1..]
            .iter()
            .all(|p| p.status == StepStatus::Pending));

        // Release the in-flight call; its result must be discarded.
        gate.add_permits(16);
        tokio::time::sleep(StdDuration::from_millis(50)).await;

        let snapshot = orchestrator.progress(id).await.unwrap();
        assert_eq!(snapshot.status, JobStatus::Cancelled);
        assert!(orchestrator.result(id).await.is_none());
        assert!(!orchestrator.cancel(id).await);
    }

    #[tokio::test]
    async fn test_cancel_terminal_job_returns_false_without_mutation() {
        let (orchestrator, _store) = build(FakeCapability::ok());
        let id = orchestrator.start(make_request()).await.unwrap();
        wait_terminal(&orchestrator, id).await;

        let before = orchestrator.progress(id).await.unwrap();
        assert!(!orchestrator.cancel(id).await);
        let after = orchestrator.progress(id).await.unwrap();

        assert_eq!(after.status, JobStatus::Completed);
        assert_eq!(after.updated_at, before.updated_at);
        let before_statuses: Vec<StepStatus> = before.steps.iter().map(|p| p.status).collect();
        let after_statuses: Vec<StepStatus> = after.steps.iter().map(|p| p.status).collect();
        assert_eq!(before_statuses, after_statuses);

        // Unknown ids are also a no-op.
        assert!(!orchestrator.cancel(Uuid::new_v4()).await);
    }

    #[tokio::test]
    async fn test_cleanup_evicts_only_stale_terminal_jobs() {
        let (orchestrator, store) = build(FakeCapability::ok());
        let completed = orchestrator.start(make_request()).await.unwrap();
        wait_terminal(&orchestrator, completed).await;

        // Age the completed job past the cutoff.
        let mut job = store.get_job(completed).await.unwrap();
        job.updated_at = Utc::now() - Duration::hours(48);
        store.put_job(job).await;

        // A processing job with the same staleness must survive.
        let gate = Arc::new(Semaphore::new(0));
        let (gated_orchestrator, gated_store) = build(FakeCapability::gated(gate.clone()));
        let processing = gated_orchestrator.start(make_request()).await.unwrap();
        tokio::time::sleep(StdDuration::from_millis(10)).await;
        let mut job = gated_store.get_job(processing).await.unwrap();
        job.updated_at = Utc::now() - Duration::hours(48);
        gated_store.put_job(job).await;

        assert_eq!(orchestrator.cleanup(Duration::hours(24)).await, 1);
        assert!(orchestrator.progress(completed).await.is_none());

        assert_eq!(gated_orchestrator.cleanup(Duration::hours(24)).await, 0);
        assert!(gated_orchestrator.progress(processing).await.is_some());

        gate.add_permits(16);
    }

    #[tokio::test]
    async fn test_concurrent_jobs_are_independent() {
        let (orchestrator, _store) = build(FakeCapability::ok());

        let first = orchestrator.start(make_request()).await.unwrap();
        let mut other = make_request();
        other.session_id = "session-2".to_string();
        other.job_description = format!("{JOB_DESCRIPTION} Second posting variant.");
        let second = orchestrator.start(other).await.unwrap();

        assert_ne!(first, second);
        assert_eq!(wait_terminal(&orchestrator, first).await, JobStatus::Completed);
        assert_eq!(wait_terminal(&orchestrator, second).await, JobStatus::Completed);

        let first_result = orchestrator.result(first).await.unwrap();
        let second_result = orchestrator.result(second).await.unwrap();
        assert_eq!(first_result.session_id, "session-1");
        assert_eq!(second_result.session_id, "session-2");
        assert_eq!(orchestrator.progress(first).await.unwrap().overall_progress, 100);
        assert_eq!(orchestrator.progress(second).await.unwrap().overall_progress, 100);
    }

    #[tokio::test]
    async fn test_history_sorted_newest_first_and_health_counts() {
        let (orchestrator, store) = build(FakeCapability::ok());
        let first = orchestrator.start(make_request()).await.unwrap();
        wait_terminal(&orchestrator, first).await;

        // Push the first job into the past so ordering is observable.
        let mut job = store.get_job(first).await.unwrap();
        job.started_at = Utc::now() - Duration::hours(2);
        store.put_job(job).await;

        let second = orchestrator.start(make_request()).await.unwrap();
        wait_terminal(&orchestrator, second).await;

        let jobs = orchestrator.list_jobs().await;
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].analysis_id, second);
        assert_eq!(jobs[1].analysis_id, first);
        assert!(jobs[0].job_description_preview.len() <= 103);

        let health = orchestrator.health().await;
        assert_eq!(health.total_jobs, 2);
        assert_eq!(health.processing_jobs, 0);
        assert_eq!(health.service_status, "healthy");
        assert_eq!(health.status_counts.get("completed"), Some(&2));
    }
}
