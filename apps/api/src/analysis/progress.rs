//! Progress state machine for the seven-step analysis workflow.
//!
//! Pure data and transition logic — no I/O. The orchestrator owns the
//! records; everything here is safe to call from tests without a runtime.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The seven fixed stages of the analysis workflow, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStep {
    JobAnalysis,
    CompanyResearch,
    ResumeParsing,
    SkillsAnalysis,
    ResumeEnhancement,
    CoverLetter,
    FinalReview,
}

impl AnalysisStep {
    pub const ALL: [AnalysisStep; 7] = [
        AnalysisStep::JobAnalysis,
        AnalysisStep::CompanyResearch,
        AnalysisStep::ResumeParsing,
        AnalysisStep::SkillsAnalysis,
        AnalysisStep::ResumeEnhancement,
        AnalysisStep::CoverLetter,
        AnalysisStep::FinalReview,
    ];

    /// Ordinal position, 1-based.
    pub fn number(self) -> u8 {
        match self {
            AnalysisStep::JobAnalysis => 1,
            AnalysisStep::CompanyResearch => 2,
            AnalysisStep::ResumeParsing => 3,
            AnalysisStep::SkillsAnalysis => 4,
            AnalysisStep::ResumeEnhancement => 5,
            AnalysisStep::CoverLetter => 6,
            AnalysisStep::FinalReview => 7,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            AnalysisStep::JobAnalysis => "Job Description Analysis",
            AnalysisStep::CompanyResearch => "Company Research",
            AnalysisStep::ResumeParsing => "Resume Analysis",
            AnalysisStep::SkillsAnalysis => "Skills Gap Analysis",
            AnalysisStep::ResumeEnhancement => "Resume Enhancement",
            AnalysisStep::CoverLetter => "Cover Letter Generation",
            AnalysisStep::FinalReview => "Final Review & Formatting",
        }
    }

    /// Cumulative display target reached when this step completes.
    ///
    /// Display-only: the aggregate percentage reported by `overall_progress`
    /// uses equal-weight step counting instead.
    pub fn target_percentage(self) -> u8 {
        match self {
            AnalysisStep::JobAnalysis => 14,
            AnalysisStep::CompanyResearch => 28,
            AnalysisStep::ResumeParsing => 42,
            AnalysisStep::SkillsAnalysis => 57,
            AnalysisStep::ResumeEnhancement => 71,
            AnalysisStep::CoverLetter => 85,
            AnalysisStep::FinalReview => 100,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            AnalysisStep::JobAnalysis => {
                "Analyzing job requirements and extracting key information"
            }
            AnalysisStep::CompanyResearch => {
                "Researching company culture, values, and recent developments"
            }
            AnalysisStep::ResumeParsing => "Parsing resume and extracting structured information",
            AnalysisStep::SkillsAnalysis => "Comparing skills and identifying gaps",
            AnalysisStep::ResumeEnhancement => "Generating improvement recommendations",
            AnalysisStep::CoverLetter => "Creating personalized cover letter",
            AnalysisStep::FinalReview => "Quality check and final formatting",
        }
    }
}

/// Per-step status. `Processing` is entered exactly once per step and always
/// reaches a terminal state before the next step starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

/// Overall job status, derived from step states plus explicit cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// Terminal jobs are eligible for cleanup and can no longer be cancelled.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

/// Mutable per-step progress record. One exists per step per job, created at
/// job start in `pending` and never destroyed until job cleanup.
#[derive(Debug, Clone, Serialize)]
pub struct StepProgress {
    pub step: AnalysisStep,
    pub step_number: u8,
    pub step_name: &'static str,
    pub status: StepStatus,
    /// Display target for step completion — see `AnalysisStep::target_percentage`.
    pub progress_percentage: u8,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub details: Map<String, Value>,
}

impl StepProgress {
    pub fn pending(step: AnalysisStep) -> Self {
        let mut details = Map::new();
        details.insert(
            "description".to_string(),
            Value::String(step.description().to_string()),
        );
        StepProgress {
            step,
            step_number: step.number(),
            step_name: step.name(),
            status: StepStatus::Pending,
            progress_percentage: step.target_percentage(),
            started_at: None,
            completed_at: None,
            error_message: None,
            details,
        }
    }

    /// Applies a status transition, stamping start/completion timestamps.
    pub fn transition(&mut self, status: StepStatus, error_message: Option<String>) {
        self.status = status;
        match status {
            StepStatus::Processing => self.started_at = Some(Utc::now()),
            StepStatus::Completed | StepStatus::Failed | StepStatus::Cancelled => {
                self.completed_at = Some(Utc::now())
            }
            StepStatus::Pending => {}
        }
        if error_message.is_some() {
            self.error_message = error_message;
        }
    }
}

/// Creates the initial progress table for a new job: all seven steps pending.
pub fn initial_progress() -> Vec<StepProgress> {
    AnalysisStep::ALL.iter().map(|s| StepProgress::pending(*s)).collect()
}

/// Overall completion percentage: equal-weight completed-step counting,
/// `round(100 * completed / total)`. Deliberately NOT the weighted per-step
/// display targets — the two views disagree mid-run and that is accepted.
pub fn overall_progress(steps: &[StepProgress]) -> u8 {
    if steps.is_empty() {
        return 0;
    }
    let completed = steps
        .iter()
        .filter(|p| p.status == StepStatus::Completed)
        .count();
    ((completed as f64 / steps.len() as f64) * 100.0).round() as u8
}

/// The step a poller should surface: the one currently processing, or the
/// next pending step when nothing is in flight.
pub fn current_step(steps: &[StepProgress]) -> Option<&StepProgress> {
    steps
        .iter()
        .find(|p| p.status == StepStatus::Processing)
        .or_else(|| steps.iter().find(|p| p.status == StepStatus::Pending))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_targets_strictly_increase_and_end_at_100() {
        let targets: Vec<u8> = AnalysisStep::ALL
            .iter()
            .map(|s| s.target_percentage())
            .collect();
        assert_eq!(targets, vec![14, 28, 42, 57, 71, 85, 100]);
        for pair in targets.windows(2) {
            assert!(pair[0] < pair[1]);
        }
        assert_eq!(*targets.last().unwrap(), 100);
    }

    #[test]
    fn test_step_numbers_are_1_through_7() {
        let numbers: Vec<u8> = AnalysisStep::ALL.iter().map(|s| s.number()).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn test_initial_progress_all_pending() {
        let steps = initial_progress();
        assert_eq!(steps.len(), 7);
        assert!(steps.iter().all(|p| p.status == StepStatus::Pending));
        assert!(steps.iter().all(|p| p.started_at.is_none()));
        assert!(steps.iter().all(|p| p.details.contains_key("description")));
        assert_eq!(overall_progress(&steps), 0);
    }

    #[test]
    fn test_transition_stamps_timestamps() {
        let mut p = StepProgress::pending(AnalysisStep::JobAnalysis);
        p.transition(StepStatus::Processing, None);
        assert!(p.started_at.is_some());
        assert!(p.completed_at.is_none());

        p.transition(StepStatus::Completed, None);
        assert!(p.completed_at.is_some());
        assert!(p.error_message.is_none());
    }

    #[test]
    fn test_transition_failed_records_error() {
        let mut p = StepProgress::pending(AnalysisStep::SkillsAnalysis);
        p.transition(StepStatus::Processing, None);
        p.transition(StepStatus::Failed, Some("capability timeout".to_string()));
        assert_eq!(p.status, StepStatus::Failed);
        assert_eq!(p.error_message.as_deref(), Some("capability timeout"));
    }

    #[test]
    fn test_overall_progress_equal_weight_counting() {
        let mut steps = initial_progress();
        // Three steps completed out of seven: round(300/7) = 43, not the
        // weighted display target (42).
        for p in steps.iter_mut().take(3) {
            p.status = StepStatus::Completed;
        }
        assert_eq!(overall_progress(&steps), 43);
    }

    #[test]
    fn test_overall_progress_completed_job_is_exactly_100() {
        let mut steps = initial_progress();
        for p in steps.iter_mut() {
            p.status = StepStatus::Completed;
        }
        assert_eq!(overall_progress(&steps), 100);
    }

    #[test]
    fn test_current_step_prefers_processing_over_pending() {
        let mut steps = initial_progress();
        steps[0].status = StepStatus::Completed;
        steps[1].status = StepStatus::Processing;
        let current = current_step(&steps).unwrap();
        assert_eq!(current.step, AnalysisStep::CompanyResearch);
    }

    #[test]
    fn test_current_step_falls_back_to_next_pending() {
        let mut steps = initial_progress();
        steps[0].status = StepStatus::Completed;
        steps[1].status = StepStatus::Failed;
        let current = current_step(&steps).unwrap();
        assert_eq!(current.step, AnalysisStep::ResumeParsing);
    }

    #[test]
    fn test_current_step_none_when_all_terminal() {
        let mut steps = initial_progress();
        for p in steps.iter_mut() {
            p.status = StepStatus::Completed;
        }
        assert!(current_step(&steps).is_none());
    }

    #[test]
    fn test_job_status_terminality() {
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Cancelled.is_terminal());
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
    }
}
