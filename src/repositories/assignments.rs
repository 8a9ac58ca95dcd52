use sqlx::PgPool;

use crate::db::models::{Assignment, AssignmentSubmission};
use crate::db::types::SubmissionStatus;

pub(crate) const COLUMNS: &str = "\
    id, course_id, created_by, title, description, max_score, allocated_marks, \
    deadline, late_submission_allowed, late_penalty_percentage, is_published, \
    created_at, updated_at";

pub(crate) const SUBMISSION_COLUMNS: &str = "\
    id, assignment_id, student_id, submission_text, submitted_at, is_late, late_days, \
    raw_score, final_score, ca_marks_awarded, status, graded_by, graded_at, \
    lecturer_feedback, created_at, updated_at";

pub(crate) struct CreateAssignment<'a> {
    pub(crate) id: &'a str,
    pub(crate) course_id: Option<&'a str>,
    pub(crate) created_by: &'a str,
    pub(crate) title: &'a str,
    pub(crate) description: Option<&'a str>,
    pub(crate) max_score: f64,
    pub(crate) allocated_marks: f64,
    pub(crate) deadline: time::PrimitiveDateTime,
    pub(crate) late_submission_allowed: bool,
    pub(crate) late_penalty_percentage: f64,
    pub(crate) created_at: time::PrimitiveDateTime,
    pub(crate) updated_at: time::PrimitiveDateTime,
}

pub(crate) async fn create(
    executor: impl sqlx::PgExecutor<'_>,
    params: CreateAssignment<'_>,
) -> Result<Assignment, sqlx::Error> {
    sqlx::query_as::<_, Assignment>(&format!(
        "INSERT INTO assignments (
            id, course_id, created_by, title, description, max_score, allocated_marks,
            deadline, late_submission_allowed, late_penalty_percentage, is_published,
            created_at, updated_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,FALSE,$11,$12)
        RETURNING {COLUMNS}"
    ))
    .bind(params.id)
    .bind(params.course_id)
    .bind(params.created_by)
    .bind(params.title)
    .bind(params.description)
    .bind(params.max_score)
    .bind(params.allocated_marks)
    .bind(params.deadline)
    .bind(params.late_submission_allowed)
    .bind(params.late_penalty_percentage)
    .bind(params.created_at)
    .bind(params.updated_at)
    .fetch_one(executor)
    .await
}

pub(crate) async fn find_by_id(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
) -> Result<Option<Assignment>, sqlx::Error> {
    sqlx::query_as::<_, Assignment>(&format!("SELECT {COLUMNS} FROM assignments WHERE id = $1"))
        .bind(id)
        .fetch_optional(executor)
        .await
}

pub(crate) async fn publish(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    now: time::PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE assignments SET is_published = TRUE, updated_at = $2
         WHERE id = $1 AND is_published = FALSE",
    )
    .bind(id)
    .bind(now)
    .execute(executor)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub(crate) async fn list_published(
    pool: &PgPool,
    skip: i64,
    limit: i64,
) -> Result<Vec<Assignment>, sqlx::Error> {
    sqlx::query_as::<_, Assignment>(&format!(
        "SELECT {COLUMNS} FROM assignments WHERE is_published = TRUE
         ORDER BY deadline OFFSET $1 LIMIT $2"
    ))
    .bind(skip.max(0))
    .bind(limit.clamp(1, 1000))
    .fetch_all(pool)
    .await
}

pub(crate) async fn count_published(pool: &PgPool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM assignments WHERE is_published = TRUE")
        .fetch_one(pool)
        .await
}

pub(crate) async fn list_by_creator(
    pool: &PgPool,
    created_by: &str,
    skip: i64,
    limit: i64,
) -> Result<Vec<Assignment>, sqlx::Error> {
    sqlx::query_as::<_, Assignment>(&format!(
        "SELECT {COLUMNS} FROM assignments WHERE created_by = $1
         ORDER BY created_at DESC OFFSET $2 LIMIT $3"
    ))
    .bind(created_by)
    .bind(skip.max(0))
    .bind(limit.clamp(1, 1000))
    .fetch_all(pool)
    .await
}

pub(crate) struct CreateSubmission<'a> {
    pub(crate) id: &'a str,
    pub(crate) assignment_id: &'a str,
    pub(crate) student_id: &'a str,
    pub(crate) submission_text: Option<&'a str>,
    pub(crate) submitted_at: time::PrimitiveDateTime,
    pub(crate) is_late: bool,
    pub(crate) late_days: i32,
    pub(crate) created_at: time::PrimitiveDateTime,
    pub(crate) updated_at: time::PrimitiveDateTime,
}

pub(crate) async fn create_submission(
    executor: impl sqlx::PgExecutor<'_>,
    params: CreateSubmission<'_>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO assignment_submissions (
            id, assignment_id, student_id, submission_text, submitted_at,
            is_late, late_days, status, created_at, updated_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10)
        ON CONFLICT DO NOTHING",
    )
    .bind(params.id)
    .bind(params.assignment_id)
    .bind(params.student_id)
    .bind(params.submission_text)
    .bind(params.submitted_at)
    .bind(params.is_late)
    .bind(params.late_days)
    .bind(SubmissionStatus::Submitted)
    .bind(params.created_at)
    .bind(params.updated_at)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub(crate) async fn find_submission_by_id(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
) -> Result<Option<AssignmentSubmission>, sqlx::Error> {
    sqlx::query_as::<_, AssignmentSubmission>(&format!(
        "SELECT {SUBMISSION_COLUMNS} FROM assignment_submissions WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(executor)
    .await
}

pub(crate) async fn find_submission_by_pair(
    executor: impl sqlx::PgExecutor<'_>,
    assignment_id: &str,
    student_id: &str,
) -> Result<Option<AssignmentSubmission>, sqlx::Error> {
    sqlx::query_as::<_, AssignmentSubmission>(&format!(
        "SELECT {SUBMISSION_COLUMNS} FROM assignment_submissions
         WHERE assignment_id = $1 AND student_id = $2"
    ))
    .bind(assignment_id)
    .bind(student_id)
    .fetch_optional(executor)
    .await
}

pub(crate) struct GradeSubmission<'a> {
    pub(crate) raw_score: f64,
    pub(crate) final_score: f64,
    pub(crate) ca_marks_awarded: f64,
    pub(crate) graded_by: &'a str,
    pub(crate) graded_at: time::PrimitiveDateTime,
    pub(crate) lecturer_feedback: Option<&'a str>,
}

pub(crate) async fn grade_submission(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    params: GradeSubmission<'_>,
) -> Result<AssignmentSubmission, sqlx::Error> {
    sqlx::query_as::<_, AssignmentSubmission>(&format!(
        "UPDATE assignment_submissions
         SET raw_score = $2, final_score = $3, ca_marks_awarded = $4, status = $5,
             graded_by = $6, graded_at = $7, lecturer_feedback = $8, updated_at = $7
         WHERE id = $1
         RETURNING {SUBMISSION_COLUMNS}"
    ))
    .bind(id)
    .bind(params.raw_score)
    .bind(params.final_score)
    .bind(params.ca_marks_awarded)
    .bind(SubmissionStatus::Graded)
    .bind(params.graded_by)
    .bind(params.graded_at)
    .bind(params.lecturer_feedback)
    .fetch_one(executor)
    .await
}

pub(crate) async fn list_submissions_by_assignment(
    pool: &PgPool,
    assignment_id: &str,
    skip: i64,
    limit: i64,
) -> Result<Vec<AssignmentSubmission>, sqlx::Error> {
    sqlx::query_as::<_, AssignmentSubmission>(&format!(
        "SELECT {SUBMISSION_COLUMNS} FROM assignment_submissions
         WHERE assignment_id = $1 ORDER BY submitted_at OFFSET $2 LIMIT $3"
    ))
    .bind(assignment_id)
    .bind(skip.max(0))
    .bind(limit.clamp(1, 1000))
    .fetch_all(pool)
    .await
}

pub(crate) async fn count_submissions_by_assignment(
    pool: &PgPool,
    assignment_id: &str,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM assignment_submissions WHERE assignment_id = $1")
        .bind(assignment_id)
        .fetch_one(pool)
        .await
}

pub(crate) async fn list_submissions_by_student(
    pool: &PgPool,
    student_id: &str,
    skip: i64,
    limit: i64,
) -> Result<Vec<AssignmentSubmission>, sqlx::Error> {
    sqlx::query_as::<_, AssignmentSubmission>(&format!(
        "SELECT {SUBMISSION_COLUMNS} FROM assignment_submissions
         WHERE student_id = $1 ORDER BY submitted_at DESC OFFSET $2 LIMIT $3"
    ))
    .bind(student_id)
    .bind(skip.max(0))
    .bind(limit.clamp(1, 1000))
    .fetch_all(pool)
    .await
}
