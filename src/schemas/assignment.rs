use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::{Assignment, AssignmentSubmission};
use crate::db::types::SubmissionStatus;
use crate::schemas::test::deserialize_offset_datetime_flexible;

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct AssignmentCreate {
    #[validate(length(min = 1, message = "title must not be empty"))]
    pub(crate) title: String,
    #[serde(default)]
    pub(crate) description: Option<String>,
    #[serde(alias = "maxScore")]
    #[validate(range(exclusive_min = 0.0, message = "max_score must be positive"))]
    pub(crate) max_score: f64,
    #[serde(default)]
    #[serde(alias = "allocatedMarks")]
    #[validate(range(min = 0.0, message = "allocated_marks must be non-negative"))]
    pub(crate) allocated_marks: f64,
    #[serde(deserialize_with = "deserialize_offset_datetime_flexible")]
    pub(crate) deadline: OffsetDateTime,
    #[serde(default)]
    #[serde(alias = "lateSubmissionAllowed")]
    pub(crate) late_submission_allowed: bool,
    #[serde(default)]
    #[serde(alias = "latePenaltyPercentage")]
    #[validate(range(min = 0.0, max = 100.0, message = "late_penalty_percentage must be 0-100"))]
    pub(crate) late_penalty_percentage: f64,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct SubmissionCreate {
    #[serde(alias = "submissionText")]
    #[validate(length(min = 1, message = "submission_text must not be empty"))]
    pub(crate) submission_text: String,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct GradeSubmissionRequest {
    #[serde(alias = "rawScore")]
    #[validate(range(min = 0.0, message = "raw_score must be non-negative"))]
    pub(crate) raw_score: f64,
    #[serde(default)]
    pub(crate) feedback: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct AssignmentResponse {
    pub(crate) id: String,
    pub(crate) created_by: String,
    pub(crate) title: String,
    pub(crate) description: Option<String>,
    pub(crate) max_score: f64,
    pub(crate) allocated_marks: f64,
    pub(crate) deadline: String,
    pub(crate) late_submission_allowed: bool,
    pub(crate) late_penalty_percentage: f64,
    pub(crate) is_published: bool,
    pub(crate) created_at: String,
    pub(crate) updated_at: String,
}

impl AssignmentResponse {
    pub(crate) fn from_db(assignment: Assignment) -> Self {
        Self {
            id: assignment.id,
            created_by: assignment.created_by,
            title: assignment.title,
            description: assignment.description,
            max_score: assignment.max_score,
            allocated_marks: assignment.allocated_marks,
            deadline: format_primitive(assignment.deadline),
            late_submission_allowed: assignment.late_submission_allowed,
            late_penalty_percentage: assignment.late_penalty_percentage,
            is_published: assignment.is_published,
            created_at: format_primitive(assignment.created_at),
            updated_at: format_primitive(assignment.updated_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct SubmissionResponse {
    pub(crate) id: String,
    pub(crate) assignment_id: String,
    pub(crate) student_id: String,
    pub(crate) submission_text: Option<String>,
    pub(crate) submitted_at: String,
    pub(crate) is_late: bool,
    pub(crate) late_days: i32,
    pub(crate) raw_score: Option<f64>,
    pub(crate) final_score: Option<f64>,
    pub(crate) ca_marks_awarded: Option<f64>,
    pub(crate) status: SubmissionStatus,
    pub(crate) graded_at: Option<String>,
    pub(crate) lecturer_feedback: Option<String>,
}

impl SubmissionResponse {
    pub(crate) fn from_db(submission: AssignmentSubmission) -> Self {
        Self {
            id: submission.id,
            assignment_id: submission.assignment_id,
            student_id: submission.student_id,
            submission_text: submission.submission_text,
            submitted_at: format_primitive(submission.submitted_at),
            is_late: submission.is_late,
            late_days: submission.late_days,
            raw_score: submission.raw_score,
            final_score: submission.final_score,
            ca_marks_awarded: submission.ca_marks_awarded,
            status: submission.status,
            graded_at: submission.graded_at.map(format_primitive),
            lecturer_feedback: submission.lecturer_feedback,
        }
    }
}
