//! Data model for the analysis workflow: request, job aggregate, per-step
//! payloads, and the final composed result.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::analysis::progress::{AnalysisStep, JobStatus, StepProgress};
use crate::parser::ParsedResume;

/// User preferences carried through the workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisPreferences {
    pub tone: String,
    pub focus_areas: Vec<String>,
    #[serde(default)]
    pub include_salary_guidance: bool,
    #[serde(default)]
    pub include_interview_prep: bool,
}

impl Default for AnalysisPreferences {
    fn default() -> Self {
        AnalysisPreferences {
            tone: "professional".to_string(),
            focus_areas: vec![
                "relevant experience".to_string(),
                "technical skills".to_string(),
            ],
            include_salary_guidance: false,
            include_interview_prep: false,
        }
    }
}

/// Immutable input to a job. `resume_text` must hold the resolved resume
/// content before a job starts; `resume_file_id` is provenance from the
/// upload service (which extracts text before we ever see the request).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub session_id: String,
    pub user_id: String,
    pub job_description: String,
    pub job_url: Option<String>,
    pub resume_file_id: Option<String>,
    pub resume_text: Option<String>,
    #[serde(default)]
    pub preferences: AnalysisPreferences,
}

/// Mutable job aggregate. Owned exclusively by the orchestrator's store.
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub id: Uuid,
    pub request: AnalysisRequest,
    pub status: JobStatus,
    pub current_step: Option<AnalysisStep>,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn new(id: Uuid, request: AnalysisRequest) -> Self {
        let now = Utc::now();
        Job {
            id,
            request,
            status: JobStatus::Pending,
            current_step: None,
            error: None,
            started_at: now,
            updated_at: now,
        }
    }
}

// ── Per-step payloads ───────────────────────────────────────────────────────

/// How well the generative call resolved into structured data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisQuality {
    High,
    #[default]
    Medium,
}

/// Step 1 output: structured reading of the job description.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobAnalysis {
    #[serde(default)]
    pub job_title: Option<String>,
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub employment_type: Option<String>,
    #[serde(default)]
    pub experience_level: Option<String>,
    #[serde(default)]
    pub requirements: Vec<String>,
    #[serde(default)]
    pub responsibilities: Vec<String>,
    #[serde(default)]
    pub preferred_qualifications: Vec<String>,
    /// ATS keywords a resume should cover.
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Set only when the model response was not valid JSON.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_analysis: Option<String>,
    #[serde(skip_deserializing)]
    pub tokens_used: u32,
    #[serde(skip_deserializing)]
    pub quality: AnalysisQuality,
}

/// How the company research payload was produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResearchMethod {
    /// Generative capability was called and answered.
    #[default]
    Generative,
    /// No identifiable company name, so no call was made.
    Fallback,
    /// The external call failed; the sentinel payload below was substituted.
    Failed,
}

/// Step 2 output. Never fatal to the job: an external failure degrades into
/// a sentinel payload with `method == Failed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyResearch {
    #[serde(default)]
    pub company_name: String,
    #[serde(default)]
    pub research_summary: String,
    #[serde(default)]
    pub industry: String,
    #[serde(default)]
    pub culture_insights: Vec<String>,
    #[serde(default)]
    pub recent_developments: Vec<String>,
    #[serde(skip_deserializing)]
    pub method: ResearchMethod,
    #[serde(skip_deserializing, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CompanyResearch {
    /// Sentinel payload returned when the research call fails. The workflow
    /// proceeds; the step's own progress record shows the failure.
    pub fn unavailable(error: String) -> Self {
        CompanyResearch {
            company_name: "Research failed".to_string(),
            research_summary: format!("Company research encountered an error: {error}"),
            industry: "Unknown".to_string(),
            culture_insights: vec![],
            recent_developments: vec![],
            method: ResearchMethod::Failed,
            error: Some(error),
        }
    }

    /// Basic payload when step 1 could not identify a company.
    pub fn unidentified() -> Self {
        CompanyResearch {
            company_name: "Not specified".to_string(),
            research_summary: "Company name not clearly identified in job posting".to_string(),
            industry: "Unknown".to_string(),
            culture_insights: vec![
                "Company research requires identifiable company name".to_string()
            ],
            recent_developments: vec![],
            method: ResearchMethod::Fallback,
            error: None,
        }
    }
}

/// Step 3 output: the structured resume plus extraction counts.
#[derive(Debug, Clone, Serialize)]
pub struct ResumeReport {
    pub source: ResumeSource,
    pub resume: ParsedResume,
    pub sections_detected: usize,
    pub work_experiences: usize,
    pub skills_extracted: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResumeSource {
    TextInput,
    FileUpload,
}

/// Step 4 output: skills-gap reading of resume vs job requirements.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SkillsAnalysis {
    #[serde(default)]
    pub current_skills: Vec<String>,
    #[serde(default)]
    pub missing_skills: Vec<String>,
    #[serde(default)]
    pub skill_gaps: Vec<String>,
    #[serde(default)]
    pub learning_priorities: Vec<String>,
    #[serde(default)]
    pub analysis_summary: Option<String>,
    #[serde(skip_deserializing)]
    pub tokens_used: u32,
}

/// Step 5 output: resume improvement recommendations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResumeRecommendations {
    #[serde(default)]
    pub overall_score: Option<f64>,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub weaknesses: Vec<String>,
    #[serde(default)]
    pub improvements: Vec<String>,
    #[serde(default)]
    pub ats_keywords: Vec<String>,
    /// Free-text recommendations, or the raw response when not JSON.
    #[serde(default)]
    pub recommendations: Option<String>,
    /// Missing skills spliced in from step 4.
    #[serde(skip_deserializing)]
    pub skills_gap_insights: Vec<String>,
    #[serde(skip_deserializing)]
    pub tokens_used: u32,
}

/// Step 6 output. The letter body is used verbatim; no JSON expected.
#[derive(Debug, Clone, Serialize)]
pub struct CoverLetter {
    pub content: String,
    pub tone: String,
    pub focus_areas: Vec<String>,
    pub word_count: usize,
    pub generated_at: DateTime<Utc>,
    pub tokens_used: u32,
}

/// Step 7 output: pure aggregation over steps 1-6, no external call.
#[derive(Debug, Clone, Serialize)]
pub struct FinalSummary {
    pub job_match_score: f64,
    pub application_strength: String,
    pub key_findings: KeyFindings,
    pub recommendations_summary: RecommendationsSummary,
    pub next_steps: Vec<String>,
    pub analysis_completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct KeyFindings {
    pub job_title: String,
    pub company: String,
    pub skills_match: String,
    pub experience_level: String,
    pub cover_letter_generated: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecommendationsSummary {
    pub top_priorities: Vec<String>,
    pub skills_to_develop: Vec<String>,
}

/// Workflow-level accounting attached to the final result.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessingMetadata {
    pub total_processing_secs: f64,
    pub steps_completed: u32,
    pub generative_calls: u32,
}

/// Immutable composed result, created exactly once at successful completion
/// of step 7.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    pub job_id: Uuid,
    pub session_id: String,
    pub job_analysis: JobAnalysis,
    pub company_research: CompanyResearch,
    pub parsed_resume: ResumeReport,
    pub skills_analysis: SkillsAnalysis,
    pub resume_recommendations: ResumeRecommendations,
    pub cover_letter: CoverLetter,
    pub final_summary: FinalSummary,
    pub processing_metadata: ProcessingMetadata,
    pub created_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

/// Point-in-time read of a job's overall and per-step status.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressSnapshot {
    pub analysis_id: Uuid,
    pub status: JobStatus,
    pub overall_progress: u8,
    pub current_step: Option<StepProgress>,
    pub steps: Vec<StepProgress>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub error: Option<String>,
}

/// One row of the admin/history listing.
#[derive(Debug, Clone, Serialize)]
pub struct JobSummary {
    pub analysis_id: Uuid,
    pub status: JobStatus,
    pub overall_progress: u8,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub job_description_preview: String,
    pub job_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preferences_defaults() {
        let prefs = AnalysisPreferences::default();
        assert_eq!(prefs.tone, "professional");
        assert_eq!(
            prefs.focus_areas,
            vec!["relevant experience", "technical skills"]
        );
        assert!(!prefs.include_salary_guidance);
    }

    #[test]
    fn test_job_analysis_deserializes_partial_model_output() {
        // Models often return a subset of the schema; every field defaults.
        let json = r#"{
            "job_title": "Senior Rust Engineer",
            "company_name": "Acme Corp",
            "keywords": ["Rust", "Tokio"]
        }"#;
        let analysis: JobAnalysis = serde_json::from_str(json).unwrap();
        assert_eq!(analysis.job_title.as_deref(), Some("Senior Rust Engineer"));
        assert_eq!(analysis.keywords, vec!["Rust", "Tokio"]);
        assert!(analysis.requirements.is_empty());
        assert!(analysis.raw_analysis.is_none());
    }

    #[test]
    fn test_company_research_sentinel_markers() {
        let sentinel = CompanyResearch::unavailable("socket hang up".to_string());
        assert_eq!(sentinel.method, ResearchMethod::Failed);
        assert_eq!(sentinel.company_name, "Research failed");
        assert!(sentinel.research_summary.contains("socket hang up"));
    }

    #[test]
    fn test_company_research_unidentified_is_fallback() {
        let basic = CompanyResearch::unidentified();
        assert_eq!(basic.method, ResearchMethod::Fallback);
        assert!(basic.error.is_none());
    }

    #[test]
    fn test_job_new_starts_pending() {
        let request = AnalysisRequest {
            session_id: "s".to_string(),
            user_id: "u".to_string(),
            job_description: "desc".to_string(),
            job_url: None,
            resume_file_id: None,
            resume_text: Some("resume".to_string()),
            preferences: AnalysisPreferences::default(),
        };
        let job = Job::new(Uuid::new_v4(), request);
        assert_eq!(job.status, JobStatus::Pending);
        assert!(job.current_step.is_none());
        assert!(job.error.is_none());
    }
}
