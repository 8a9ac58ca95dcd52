use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::{StudentAnswer, TestAttempt};
use crate::db::types::{AttemptStatus, SubmitTrigger};
use crate::schemas::test::QuestionResponse;

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct StartAttemptRequest {
    #[serde(alias = "testId")]
    #[validate(length(min = 1, message = "test_id must not be empty"))]
    pub(crate) test_id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SaveAnswerRequest {
    #[serde(alias = "questionId")]
    pub(crate) question_id: String,
    #[serde(default)]
    #[serde(alias = "selectedOptionIds")]
    pub(crate) selected_option_ids: Option<Vec<String>>,
    #[serde(default)]
    #[serde(alias = "answerText")]
    pub(crate) answer_text: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct EssayGradeRequest {
    #[serde(alias = "questionId")]
    #[validate(length(min = 1, message = "question_id must not be empty"))]
    pub(crate) question_id: String,
    #[validate(range(min = 0.0, message = "marks must be non-negative"))]
    pub(crate) marks: f64,
    #[serde(default)]
    pub(crate) feedback: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct AttemptResponse {
    pub(crate) id: String,
    pub(crate) test_id: String,
    pub(crate) student_id: String,
    pub(crate) attempt_number: i32,
    pub(crate) status: AttemptStatus,
    pub(crate) started_at: String,
    pub(crate) deadline_at: String,
    pub(crate) submitted_at: Option<String>,
    pub(crate) submit_trigger: Option<SubmitTrigger>,
    pub(crate) total_score: Option<f64>,
    pub(crate) percentage: Option<f64>,
    pub(crate) passed: Option<bool>,
    pub(crate) access_charge: f64,
}

impl AttemptResponse {
    pub(crate) fn from_db(attempt: TestAttempt) -> Self {
        Self {
            id: attempt.id,
            test_id: attempt.test_id,
            student_id: attempt.student_id,
            attempt_number: attempt.attempt_number,
            status: attempt.status,
            started_at: format_primitive(attempt.started_at),
            deadline_at: format_primitive(attempt.deadline_at),
            submitted_at: attempt.submitted_at.map(format_primitive),
            submit_trigger: attempt.submit_trigger,
            total_score: attempt.total_score,
            percentage: attempt.percentage,
            passed: attempt.passed,
            access_charge: attempt.access_charge,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct AnswerResponse {
    pub(crate) question_id: String,
    pub(crate) selected_option_ids: Option<Vec<String>>,
    pub(crate) answer_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) is_correct: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) marks_awarded: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) feedback: Option<String>,
    pub(crate) updated_at: String,
}

impl AnswerResponse {
    /// In-progress view: grading fields stay hidden while the attempt is open.
    pub(crate) fn open(answer: StudentAnswer) -> Self {
        Self {
            question_id: answer.question_id,
            selected_option_ids: answer.selected_option_ids.map(|json| json.0),
            answer_text: answer.answer_text,
            is_correct: None,
            marks_awarded: None,
            feedback: None,
            updated_at: format_primitive(answer.updated_at),
        }
    }

    pub(crate) fn settled(answer: StudentAnswer) -> Self {
        Self {
            question_id: answer.question_id,
            selected_option_ids: answer.selected_option_ids.map(|json| json.0),
            answer_text: answer.answer_text,
            is_correct: answer.is_correct,
            marks_awarded: answer.marks_awarded,
            feedback: answer.ai_feedback,
            updated_at: format_primitive(answer.updated_at),
        }
    }
}

/// Full state for resume/review: the frozen question order (with options in
/// their frozen order), current answers, and the server-computed clock.
/// `auto_save_interval_seconds` is a pacing hint for the client's autosave
/// timer; the server accepts every save regardless.
#[derive(Debug, Serialize)]
pub(crate) struct AttemptStateResponse {
    pub(crate) attempt: AttemptResponse,
    pub(crate) questions: Vec<QuestionResponse>,
    pub(crate) answers: Vec<AnswerResponse>,
    pub(crate) remaining_seconds: i64,
    pub(crate) pending_essays: i64,
    pub(crate) auto_save_interval_seconds: u64,
}

#[derive(Debug, Serialize)]
pub(crate) struct SaveAnswerResponse {
    pub(crate) question_id: String,
    pub(crate) saved_at: String,
}

/// Per-test roll-up for the owning lecturer.
#[derive(Debug, Serialize)]
pub(crate) struct AttemptSummaryResponse {
    pub(crate) total: i64,
    pub(crate) in_progress: i64,
    pub(crate) completed: i64,
    pub(crate) passed: i64,
}

#[derive(Debug, Serialize)]
pub(crate) struct SubmitAttemptResponse {
    pub(crate) attempt: AttemptResponse,
    pub(crate) already_settled: bool,
    pub(crate) pending_essays: i64,
}
