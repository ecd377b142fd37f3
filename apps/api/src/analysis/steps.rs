//! Step executors for the seven-stage workflow.
//!
//! Each executor transitions its progress record to `processing`, makes at
//! most one external call, interprets the response tolerantly, transitions to
//! a terminal state, and returns a typed payload for downstream steps.
//! Company research is the one step allowed to degrade instead of failing
//! the job.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::analysis::models::{
    AnalysisQuality, AnalysisRequest, CompanyResearch, CoverLetter, FinalSummary, JobAnalysis,
    KeyFindings, RecommendationsSummary, ResearchMethod, ResumeRecommendations, ResumeReport,
    ResumeSource, SkillsAnalysis,
};
use crate::analysis::progress::{AnalysisStep, StepStatus};
use crate::analysis::store::JobStore;
use crate::llm_client::prompts;
use crate::llm_client::{strip_json_fences, Completion, GenerativeCapability};
use crate::parser::{ParsedResume, TextExtractionCapability};

#[derive(Debug, Error)]
pub enum StepError {
    #[error("{} failed: {message}", .step.name())]
    Execution { step: AnalysisStep, message: String },

    #[error("analysis cancelled")]
    Cancelled,
}

impl StepError {
    fn execution(step: AnalysisStep, message: impl ToString) -> Self {
        StepError::Execution {
            step,
            message: message.to_string(),
        }
    }
}

/// Cooperative cancellation flag shared between the orchestrator's `cancel`
/// entry point and the background run task. Checked before and after every
/// external call; the in-flight call itself is never aborted.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Outcome of tolerant-parsing an expected-JSON model response. A prose or
/// malformed response degrades to `Unstructured` instead of erroring, so a
/// bad model answer never fails the job on its own.
#[derive(Debug)]
pub enum ModelOutput<T> {
    Structured(T),
    Unstructured(String),
}

impl<T: DeserializeOwned> ModelOutput<T> {
    pub fn parse(text: &str) -> Self {
        match serde_json::from_str(strip_json_fences(text)) {
            Ok(value) => ModelOutput::Structured(value),
            Err(_) => ModelOutput::Unstructured(text.to_string()),
        }
    }
}

/// Everything a step executor needs: the job, its store, and the injected
/// capabilities. Prior step outputs are passed by value as arguments, never
/// by reference into shared state.
pub struct StepContext<'a> {
    pub job_id: Uuid,
    pub store: &'a dyn JobStore,
    pub llm: &'a dyn GenerativeCapability,
    pub extractor: &'a dyn TextExtractionCapability,
    pub cancel: &'a CancelFlag,
}

impl StepContext<'_> {
    async fn begin(&self, step: AnalysisStep) {
        self.update(step, StepStatus::Processing, None).await;
    }

    async fn complete(&self, step: AnalysisStep) {
        self.update(step, StepStatus::Completed, None).await;
    }

    async fn fail(&self, step: AnalysisStep, message: String) {
        self.update(step, StepStatus::Failed, Some(message)).await;
    }

    async fn update(&self, step: AnalysisStep, status: StepStatus, error: Option<String>) {
        if let Some(mut steps) = self.store.get_progress(self.job_id).await {
            if let Some(progress) = steps.iter_mut().find(|p| p.step == step) {
                progress.transition(status, error);
            }
            self.store.put_progress(self.job_id, steps).await;
        }
        if let Some(mut job) = self.store.get_job(self.job_id).await {
            job.current_step = Some(step);
            job.updated_at = Utc::now();
            self.store.put_job(job).await;
        }
    }

    fn ensure_live(&self) -> Result<(), StepError> {
        if self.cancel.is_set() {
            Err(StepError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// One generative call with cancellation checks on both sides. Does not
    /// touch progress records; the caller decides how a failure is recorded.
    async fn call_model(
        &self,
        step: AnalysisStep,
        prompt: &str,
        system: &str,
    ) -> Result<Completion, StepError> {
        self.ensure_live()?;
        let completion = self
            .llm
            .generate(prompt, system)
            .await
            .map_err(|e| StepError::execution(step, e))?;
        self.ensure_live()?;
        debug!(
            "{} call used {} tokens in {:?}",
            step.name(),
            completion.tokens_used,
            completion.latency
        );
        Ok(completion)
    }

    /// Generative call for the fatal steps: a capability failure marks this
    /// step failed before propagating.
    async fn generate_or_fail(
        &self,
        step: AnalysisStep,
        prompt: &str,
        system: &str,
    ) -> Result<Completion, StepError> {
        match self.call_model(step, prompt, system).await {
            Ok(completion) => Ok(completion),
            Err(StepError::Cancelled) => Err(StepError::Cancelled),
            Err(err) => {
                self.fail(step, err.to_string()).await;
                Err(err)
            }
        }
    }
}

// ── Step 1: Job Description Analysis ────────────────────────────────────────

pub async fn run_job_analysis(
    ctx: &StepContext<'_>,
    request: &AnalysisRequest,
) -> Result<JobAnalysis, StepError> {
    let step = AnalysisStep::JobAnalysis;
    ctx.ensure_live()?;
    ctx.begin(step).await;

    let prompt = prompts::JOB_ANALYSIS_PROMPT_TEMPLATE
        .replace(
            "{additional_context}",
            request.job_url.as_deref().unwrap_or("None"),
        )
        .replace("{job_description}", &request.job_description);

    let completion = ctx
        .generate_or_fail(step, &prompt, prompts::JOB_ANALYSIS_SYSTEM)
        .await?;

    let mut analysis = match ModelOutput::parse(&completion.text) {
        ModelOutput::Structured(analysis) => analysis,
        ModelOutput::Unstructured(raw) => JobAnalysis {
            job_title: Some("Position Title Not Extracted".to_string()),
            requirements: vec!["Analysis completed but structured data unavailable".to_string()],
            raw_analysis: Some(raw),
            ..JobAnalysis::default()
        },
    };
    analysis.tokens_used = completion.tokens_used;
    analysis.quality = if completion.tokens_used > 200 {
        AnalysisQuality::High
    } else {
        AnalysisQuality::Medium
    };

    ctx.complete(step).await;
    Ok(analysis)
}

// ── Step 2: Company Research (degrade-not-fail) ─────────────────────────────

/// The only step whose external failure does not fail the job: the error is
/// logged, the step's own progress shows `failed`, and a sentinel payload is
/// returned so the workflow proceeds. Cancellation still propagates.
pub async fn run_company_research(
    ctx: &StepContext<'_>,
    request: &AnalysisRequest,
    job_analysis: &JobAnalysis,
) -> Result<CompanyResearch, StepError> {
    let step = AnalysisStep::CompanyResearch;
    ctx.ensure_live()?;
    ctx.begin(step).await;

    let company_name = job_analysis
        .company_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty());

    let Some(name) = company_name else {
        let research = CompanyResearch::unidentified();
        ctx.complete(step).await;
        return Ok(research);
    };

    let context = request
        .job_url
        .as_ref()
        .map(|url| format!("Job posting URL: {url}"))
        .unwrap_or_else(|| "No additional context provided".to_string());
    let prompt = prompts::COMPANY_RESEARCH_PROMPT_TEMPLATE
        .replace("{company_name}", name)
        .replace("{context}", &context);

    match ctx
        .call_model(step, &prompt, prompts::COMPANY_RESEARCH_SYSTEM)
        .await
    {
        Ok(completion) => {
            let mut research = match ModelOutput::parse(&completion.text) {
                ModelOutput::Structured(research) => research,
                ModelOutput::Unstructured(raw) => CompanyResearch {
                    company_name: name.to_string(),
                    research_summary: raw,
                    industry: "Not identified".to_string(),
                    culture_insights: vec![
                        "Research completed but structured data unavailable".to_string(),
                    ],
                    recent_developments: vec![],
                    method: ResearchMethod::Generative,
                    error: None,
                },
            };
            research.method = ResearchMethod::Generative;
            ctx.complete(step).await;
            Ok(research)
        }
        Err(StepError::Cancelled) => Err(StepError::Cancelled),
        Err(err) => {
            warn!("Company research failed for {}: {err}", ctx.job_id);
            ctx.fail(step, err.to_string()).await;
            Ok(CompanyResearch::unavailable(err.to_string()))
        }
    }
}

// ── Step 3: Resume Parsing ──────────────────────────────────────────────────

pub async fn run_resume_parsing(
    ctx: &StepContext<'_>,
    request: &AnalysisRequest,
) -> Result<ResumeReport, StepError> {
    let step = AnalysisStep::ResumeParsing;
    ctx.ensure_live()?;
    ctx.begin(step).await;

    let text = request.resume_text.as_deref().unwrap_or_default();
    match ctx.extractor.parse(text) {
        Ok(resume) => {
            let report = ResumeReport {
                source: if request.resume_file_id.is_some() {
                    ResumeSource::FileUpload
                } else {
                    ResumeSource::TextInput
                },
                sections_detected: resume.sections.len(),
                work_experiences: resume.work_experience.len(),
                skills_extracted: resume.skills.len(),
                resume,
            };
            ctx.complete(step).await;
            Ok(report)
        }
        Err(e) => {
            let err = StepError::execution(step, e);
            ctx.fail(step, err.to_string()).await;
            Err(err)
        }
    }
}

// ── Step 4: Skills Gap Analysis ─────────────────────────────────────────────

pub async fn run_skills_analysis(
    ctx: &StepContext<'_>,
    job_analysis: &JobAnalysis,
    parsed: &ResumeReport,
) -> Result<SkillsAnalysis, StepError> {
    let step = AnalysisStep::SkillsAnalysis;
    ctx.ensure_live()?;
    ctx.begin(step).await;

    let current_skills = &parsed.resume.skills;
    let skills_str = if current_skills.is_empty() {
        "No skills specified".to_string()
    } else {
        current_skills.join(", ")
    };

    let prompt = prompts::SKILLS_ANALYSIS_PROMPT_TEMPLATE
        .replace("{current_skills}", &skills_str)
        .replace("{job_requirements}", &job_analysis.requirements.join("; "))
        .replace(
            "{industry}",
            job_analysis.industry.as_deref().unwrap_or("Technology"),
        );

    let completion = ctx
        .generate_or_fail(step, &prompt, prompts::SKILLS_ANALYSIS_SYSTEM)
        .await?;

    let mut analysis = match ModelOutput::parse(&completion.text) {
        ModelOutput::Structured(analysis) => analysis,
        ModelOutput::Unstructured(raw) => SkillsAnalysis {
            current_skills: current_skills.clone(),
            skill_gaps: vec!["Analysis completed but structured data unavailable".to_string()],
            analysis_summary: Some(raw),
            ..SkillsAnalysis::default()
        },
    };
    analysis.tokens_used = completion.tokens_used;

    ctx.complete(step).await;
    Ok(analysis)
}

// ── Step 5: Resume Enhancement ──────────────────────────────────────────────

pub async fn run_resume_enhancement(
    ctx: &StepContext<'_>,
    job_analysis: &JobAnalysis,
    parsed: &ResumeReport,
    skills: &SkillsAnalysis,
) -> Result<ResumeRecommendations, StepError> {
    let step = AnalysisStep::ResumeEnhancement;
    ctx.ensure_live()?;
    ctx.begin(step).await;

    let resume_summary = format!(
        "Contact: {}\nSkills: {}\nExperience: {} positions\nEducation: {} entries",
        parsed
            .resume
            .contact_info
            .email
            .as_deref()
            .unwrap_or("Not provided"),
        parsed
            .resume
            .skills
            .iter()
            .take(10)
            .cloned()
            .collect::<Vec<_>>()
            .join(", "),
        parsed.resume.work_experience.len(),
        parsed.resume.education.len(),
    );

    let requirements_str = if job_analysis.requirements.is_empty() {
        "No specific requirements identified".to_string()
    } else {
        job_analysis.requirements.join("; ")
    };

    let prompt = prompts::RESUME_ANALYSIS_PROMPT_TEMPLATE
        .replace("{resume_content}", &resume_summary)
        .replace("{job_requirements}", &requirements_str);

    let completion = ctx
        .generate_or_fail(step, &prompt, prompts::RESUME_ANALYSIS_SYSTEM)
        .await?;

    let mut recommendations = match ModelOutput::parse(&completion.text) {
        ModelOutput::Structured(recommendations) => recommendations,
        ModelOutput::Unstructured(raw) => ResumeRecommendations {
            overall_score: Some(7.0),
            improvements: vec!["Analysis completed but structured data unavailable".to_string()],
            recommendations: Some(raw),
            ..ResumeRecommendations::default()
        },
    };
    recommendations.skills_gap_insights = skills.missing_skills.clone();
    recommendations.tokens_used = completion.tokens_used;

    ctx.complete(step).await;
    Ok(recommendations)
}

// ── Step 6: Cover Letter Generation ─────────────────────────────────────────

pub async fn run_cover_letter(
    ctx: &StepContext<'_>,
    request: &AnalysisRequest,
    company: &CompanyResearch,
    parsed: &ResumeReport,
) -> Result<CoverLetter, StepError> {
    let step = AnalysisStep::CoverLetter;
    ctx.ensure_live()?;
    ctx.begin(step).await;

    let company_info = format!(
        "Company: {}\nIndustry: {}\nResearch Summary: {}",
        company.company_name,
        company.industry,
        company
            .research_summary
            .chars()
            .take(500)
            .collect::<String>(),
    );
    let resume_summary = format!(
        "Name: {}\nExperience: {} positions\nKey Skills: {}\nEducation: {} degrees/certifications",
        parsed
            .resume
            .contact_info
            .email
            .as_deref()
            .unwrap_or("Candidate"),
        parsed.resume.work_experience.len(),
        parsed
            .resume
            .skills
            .iter()
            .take(8)
            .cloned()
            .collect::<Vec<_>>()
            .join(", "),
        parsed.resume.education.len(),
    );

    let tone = request.preferences.tone.clone();
    let focus_areas = request.preferences.focus_areas.clone();

    let prompt = prompts::COVER_LETTER_PROMPT_TEMPLATE
        .replace("{job_description}", &request.job_description)
        .replace("{company_info}", &company_info)
        .replace("{resume_summary}", &resume_summary)
        .replace("{tone}", &tone)
        .replace("{focus_areas}", &focus_areas.join(", "));

    let completion = ctx
        .generate_or_fail(step, &prompt, prompts::COVER_LETTER_SYSTEM)
        .await?;

    // The letter body is used verbatim; word count feeds the final review.
    let content = completion.text.trim().to_string();
    let letter = CoverLetter {
        word_count: content.split_whitespace().count(),
        content,
        tone,
        focus_areas,
        generated_at: Utc::now(),
        tokens_used: completion.tokens_used,
    };

    ctx.complete(step).await;
    Ok(letter)
}

// ── Step 7: Final Review & Formatting ───────────────────────────────────────

/// Pure aggregation over steps 1-6; no external call.
#[allow(clippy::too_many_arguments)]
pub async fn run_final_review(
    ctx: &StepContext<'_>,
    job_analysis: &JobAnalysis,
    company: &CompanyResearch,
    parsed: &ResumeReport,
    skills: &SkillsAnalysis,
    recommendations: &ResumeRecommendations,
    cover_letter: &CoverLetter,
) -> Result<FinalSummary, StepError> {
    let step = AnalysisStep::FinalReview;
    ctx.ensure_live()?;
    ctx.begin(step).await;

    let score = job_match_score(&job_analysis.keywords, &parsed.resume);

    let summary = FinalSummary {
        job_match_score: score,
        application_strength: application_strength(score).to_string(),
        key_findings: KeyFindings {
            job_title: job_analysis
                .job_title
                .clone()
                .unwrap_or_else(|| "Position not identified".to_string()),
            company: company.company_name.clone(),
            skills_match: format!("{} skills identified", parsed.resume.skills.len()),
            experience_level: format!("{} positions", parsed.resume.work_experience.len()),
            cover_letter_generated: cover_letter.word_count > 0,
        },
        recommendations_summary: RecommendationsSummary {
            top_priorities: recommendations.improvements.iter().take(3).cloned().collect(),
            skills_to_develop: skills.missing_skills.iter().take(5).cloned().collect(),
        },
        next_steps: vec![
            "Review and implement resume recommendations".to_string(),
            "Customize cover letter for specific application".to_string(),
            "Prepare for interviews based on job requirements".to_string(),
            "Consider developing identified missing skills".to_string(),
        ],
        analysis_completed_at: Utc::now(),
    };

    ctx.complete(step).await;
    Ok(summary)
}

/// Weighted composite in [0, 1]: skill-keyword overlap (0.4), experience
/// count bucket (0.3), education presence (0.2), contact completeness (0.1).
/// Comparison is case-insensitive; an empty keyword list contributes zero
/// rather than dividing by zero.
pub fn job_match_score(job_keywords: &[String], resume: &ParsedResume) -> f64 {
    let mut score = 0.0;

    let keywords: HashSet<String> = job_keywords.iter().map(|k| k.to_lowercase()).collect();
    if !keywords.is_empty() {
        let skills: HashSet<String> = resume.skills.iter().map(|s| s.to_lowercase()).collect();
        let overlap = keywords.intersection(&skills).count();
        score += (overlap as f64 / keywords.len() as f64) * 0.4;
    }

    let experience_count = resume.work_experience.len();
    if experience_count >= 3 {
        score += 0.3;
    } else if experience_count >= 1 {
        score += 0.2;
    }

    if !resume.education.is_empty() {
        score += 0.2;
    }

    let contact = &resume.contact_info;
    let contact_fields = [contact.email.is_some(), contact.phone.is_some()]
        .into_iter()
        .filter(|present| *present)
        .count();
    score += (contact_fields as f64 / 2.0) * 0.1;

    score.min(1.0)
}

/// Textual strength band for a match score.
pub fn application_strength(score: f64) -> &'static str {
    if score >= 0.8 {
        "Strong - Excellent match for this position"
    } else if score >= 0.6 {
        "Good - Solid candidate with some areas to strengthen"
    } else if score >= 0.4 {
        "Moderate - Some relevant qualifications, needs improvement"
    } else {
        "Developing - Significant skill gaps to address"
    }
}
