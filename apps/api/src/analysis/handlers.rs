//! Axum route handlers for the Analysis API. Thin layer: validation and
//! shaping only; all lifecycle logic lives in the orchestrator.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::analysis::models::{
    AnalysisPreferences, AnalysisRequest, AnalysisResult, JobSummary, ProgressSnapshot,
};
use crate::analysis::orchestrator::ServiceHealth;
use crate::errors::AppError;
use crate::state::AppState;

// ── Request / Response types ────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct StartAnalysisRequest {
    pub job_description: String,
    pub job_url: Option<String>,
    /// Resolved resume text. The upload service extracts text from files
    /// before this endpoint is called.
    pub resume_text: Option<String>,
    pub resume_file_id: Option<String>,
    pub tone: Option<String>,
    pub focus_areas: Option<Vec<String>>,
    #[serde(default)]
    pub include_salary_guidance: bool,
    #[serde(default)]
    pub include_interview_prep: bool,
}

#[derive(Debug, Serialize)]
pub struct StartAnalysisResponse {
    pub analysis_id: Uuid,
    pub status: String,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    #[serde(default = "default_history_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

fn default_history_limit() -> usize {
    10
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub analyses: Vec<JobSummary>,
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
    pub has_more: bool,
}

#[derive(Debug, Deserialize)]
pub struct CleanupParams {
    pub max_age_hours: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct CleanupResponse {
    pub cleaned_analyses: usize,
    pub max_age_hours: i64,
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub message: String,
    pub status: String,
}

// ── Handlers ────────────────────────────────────────────────────────────────

/// POST /api/v1/analysis
///
/// Accepts a new analysis job. Accept is synchronous; execution is a
/// background task observed through the progress endpoint.
pub async fn handle_start_analysis(
    State(state): State<AppState>,
    Json(request): Json<StartAnalysisRequest>,
) -> Result<Json<StartAnalysisResponse>, AppError> {
    let mut preferences = AnalysisPreferences::default();
    if let Some(tone) = request.tone {
        preferences.tone = tone;
    }
    if let Some(focus_areas) = request.focus_areas {
        let focus_areas: Vec<String> = focus_areas
            .into_iter()
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .collect();
        if !focus_areas.is_empty() {
            preferences.focus_areas = focus_areas;
        }
    }
    preferences.include_salary_guidance = request.include_salary_guidance;
    preferences.include_interview_prep = request.include_interview_prep;

    // Sessions are issued per request; auth is handled upstream.
    let analysis_request = AnalysisRequest {
        session_id: Uuid::new_v4().to_string(),
        user_id: "anonymous".to_string(),
        job_description: request.job_description,
        job_url: request.job_url,
        resume_file_id: request.resume_file_id,
        resume_text: request.resume_text,
        preferences,
    };

    let analysis_id = state.orchestrator.start(analysis_request).await?;

    Ok(Json(StartAnalysisResponse {
        analysis_id,
        status: "pending".to_string(),
        message: "Analysis started. Poll the progress endpoint for updates.".to_string(),
    }))
}

/// GET /api/v1/analysis/:id/progress
pub async fn handle_get_progress(
    State(state): State<AppState>,
    Path(analysis_id): Path<Uuid>,
) -> Result<Json<ProgressSnapshot>, AppError> {
    state
        .orchestrator
        .progress(analysis_id)
        .await
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Analysis {analysis_id} not found")))
}

/// GET /api/v1/analysis/:id/results
///
/// Returns the composed result once the job has completed. Before that,
/// reports the current status as a validation error so polling clients can
/// distinguish "not yet" from "no such job".
pub async fn handle_get_results(
    State(state): State<AppState>,
    Path(analysis_id): Path<Uuid>,
) -> Result<Json<AnalysisResult>, AppError> {
    let progress = state
        .orchestrator
        .progress(analysis_id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Analysis {analysis_id} not found")))?;

    if progress.status != crate::analysis::progress::JobStatus::Completed {
        return Err(AppError::Validation(format!(
            "Analysis {analysis_id} is not yet completed. Current status: {:?}",
            progress.status
        )));
    }

    state
        .orchestrator
        .result(analysis_id)
        .await
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Results for analysis {analysis_id} not found")))
}

/// POST /api/v1/analysis/:id/cancel
pub async fn handle_cancel_analysis(
    State(state): State<AppState>,
    Path(analysis_id): Path<Uuid>,
) -> Result<Json<CancelResponse>, AppError> {
    if !state.orchestrator.cancel(analysis_id).await {
        return Err(AppError::Conflict(format!(
            "Cannot cancel analysis {analysis_id}. It may not exist or is already finished."
        )));
    }

    Ok(Json(CancelResponse {
        message: format!("Analysis {analysis_id} has been cancelled"),
        status: "cancelled".to_string(),
    }))
}

/// GET /api/v1/analysis/history?limit&offset
///
/// Past and in-flight analyses, newest first.
pub async fn handle_analysis_history(
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> Json<HistoryResponse> {
    let all = state.orchestrator.list_jobs().await;
    let total = all.len();
    let analyses: Vec<JobSummary> = all
        .into_iter()
        .skip(params.offset)
        .take(params.limit)
        .collect();

    Json(HistoryResponse {
        has_more: params.offset + params.limit < total,
        analyses,
        total,
        limit: params.limit,
        offset: params.offset,
    })
}

/// POST /api/v1/analysis/cleanup?max_age_hours
///
/// Maintenance endpoint: evicts terminal jobs older than the cutoff.
pub async fn handle_cleanup_old_analyses(
    State(state): State<AppState>,
    Query(params): Query<CleanupParams>,
) -> Json<CleanupResponse> {
    let max_age_hours = params
        .max_age_hours
        .unwrap_or(state.config.job_max_age_hours);
    let cleaned = state
        .orchestrator
        .cleanup(chrono::Duration::hours(max_age_hours))
        .await;

    Json(CleanupResponse {
        cleaned_analyses: cleaned,
        max_age_hours,
    })
}

/// GET /api/v1/analysis/health
pub async fn handle_analysis_health(State(state): State<AppState>) -> Json<ServiceHealth> {
    Json(state.orchestrator.health().await)
}
