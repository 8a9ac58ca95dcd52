use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use time::PrimitiveDateTime;

use crate::db::types::{
    AttemptStatus, QuestionType, SubmissionStatus, SubmitTrigger, TransactionKind, UserRole,
};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct User {
    pub(crate) id: String,
    pub(crate) email: String,
    pub(crate) hashed_password: String,
    pub(crate) full_name: String,
    pub(crate) role: UserRole,
    pub(crate) is_active: bool,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Wallet {
    pub(crate) id: String,
    pub(crate) user_id: String,
    pub(crate) balance: f64,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct WalletTransaction {
    pub(crate) id: String,
    pub(crate) wallet_id: String,
    pub(crate) kind: TransactionKind,
    pub(crate) amount: f64,
    pub(crate) reason: String,
    pub(crate) source_id: Option<String>,
    pub(crate) created_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Test {
    pub(crate) id: String,
    pub(crate) course_id: Option<String>,
    pub(crate) created_by: String,
    pub(crate) title: String,
    pub(crate) description: Option<String>,
    pub(crate) total_marks: f64,
    pub(crate) pass_mark: f64,
    pub(crate) allocated_marks: f64,
    pub(crate) duration_minutes: i32,
    pub(crate) start_time: PrimitiveDateTime,
    pub(crate) end_time: PrimitiveDateTime,
    pub(crate) shuffle_questions: bool,
    pub(crate) shuffle_options: bool,
    pub(crate) max_attempts: i32,
    pub(crate) access_cost: f64,
    pub(crate) is_published: bool,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Question {
    pub(crate) id: String,
    pub(crate) test_id: String,
    pub(crate) question_type: QuestionType,
    pub(crate) question_text: String,
    pub(crate) marks: f64,
    pub(crate) order_index: i32,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct QuestionOption {
    pub(crate) id: String,
    pub(crate) question_id: String,
    pub(crate) option_text: String,
    pub(crate) is_correct: bool,
    pub(crate) order_index: i32,
    pub(crate) created_at: PrimitiveDateTime,
}

/// One timed instance of a student taking a test. `question_order` and
/// `option_orders` are the frozen presentation snapshot computed at creation;
/// they are never recomputed, so a student resuming mid-attempt (or reviewing
/// after the question bank changed) sees the exact order they started with.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct TestAttempt {
    pub(crate) id: String,
    pub(crate) test_id: String,
    pub(crate) student_id: String,
    pub(crate) attempt_number: i32,
    pub(crate) status: AttemptStatus,
    pub(crate) shuffle_seed: i64,
    pub(crate) question_order: Json<Vec<String>>,
    pub(crate) option_orders: Json<HashMap<String, Vec<String>>>,
    pub(crate) started_at: PrimitiveDateTime,
    pub(crate) deadline_at: PrimitiveDateTime,
    pub(crate) submitted_at: Option<PrimitiveDateTime>,
    pub(crate) submit_trigger: Option<SubmitTrigger>,
    pub(crate) total_score: Option<f64>,
    pub(crate) percentage: Option<f64>,
    pub(crate) passed: Option<bool>,
    pub(crate) access_charge: f64,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct StudentAnswer {
    pub(crate) id: String,
    pub(crate) attempt_id: String,
    pub(crate) question_id: String,
    pub(crate) selected_option_ids: Option<Json<Vec<String>>>,
    pub(crate) answer_text: Option<String>,
    pub(crate) is_correct: Option<bool>,
    pub(crate) marks_awarded: Option<f64>,
    pub(crate) ai_feedback: Option<String>,
    pub(crate) ai_started_at: Option<PrimitiveDateTime>,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Assignment {
    pub(crate) id: String,
    pub(crate) course_id: Option<String>,
    pub(crate) created_by: String,
    pub(crate) title: String,
    pub(crate) description: Option<String>,
    pub(crate) max_score: f64,
    pub(crate) allocated_marks: f64,
    pub(crate) deadline: PrimitiveDateTime,
    pub(crate) late_submission_allowed: bool,
    pub(crate) late_penalty_percentage: f64,
    pub(crate) is_published: bool,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct AssignmentSubmission {
    pub(crate) id: String,
    pub(crate) assignment_id: String,
    pub(crate) student_id: String,
    pub(crate) submission_text: Option<String>,
    pub(crate) submitted_at: PrimitiveDateTime,
    pub(crate) is_late: bool,
    pub(crate) late_days: i32,
    pub(crate) raw_score: Option<f64>,
    pub(crate) final_score: Option<f64>,
    pub(crate) ca_marks_awarded: Option<f64>,
    pub(crate) status: SubmissionStatus,
    pub(crate) graded_by: Option<String>,
    pub(crate) graded_at: Option<PrimitiveDateTime>,
    pub(crate) lecturer_feedback: Option<String>,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}
