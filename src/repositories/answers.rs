use sqlx::PgPool;

use crate::db::models::StudentAnswer;

pub(crate) const COLUMNS: &str = "\
    id, attempt_id, question_id, selected_option_ids, answer_text, is_correct, \
    marks_awarded, ai_feedback, ai_started_at, created_at, updated_at";

pub(crate) struct UpsertAnswer<'a> {
    pub(crate) id: &'a str,
    pub(crate) attempt_id: &'a str,
    pub(crate) question_id: &'a str,
    pub(crate) selected_option_ids: Option<serde_json::Value>,
    pub(crate) answer_text: Option<&'a str>,
    pub(crate) created_at: time::PrimitiveDateTime,
    pub(crate) updated_at: time::PrimitiveDateTime,
}

/// Last-write-wins upsert keyed on (attempt, question). Re-saving clears any
/// grade fields so a settled value can never survive an answer change. The
/// write is gated on the attempt still being `in_progress` in the same
/// statement, so a settlement landing between the handler's status check and
/// this write cannot have its graded answers rewritten; `None` means the
/// attempt settled first.
pub(crate) async fn upsert(
    executor: impl sqlx::PgExecutor<'_>,
    params: UpsertAnswer<'_>,
) -> Result<Option<StudentAnswer>, sqlx::Error> {
    sqlx::query_as::<_, StudentAnswer>(&format!(
        "INSERT INTO student_answers (
            id, attempt_id, question_id, selected_option_ids, answer_text,
            created_at, updated_at
        )
        SELECT $1, $2, $3, $4, $5, $6, $7
        WHERE EXISTS (
            SELECT 1 FROM test_attempts WHERE id = $2 AND status = 'in_progress'
        )
        ON CONFLICT (attempt_id, question_id) DO UPDATE SET
            selected_option_ids = EXCLUDED.selected_option_ids,
            answer_text = EXCLUDED.answer_text,
            is_correct = NULL,
            marks_awarded = NULL,
            updated_at = EXCLUDED.updated_at
        RETURNING {COLUMNS}"
    ))
    .bind(params.id)
    .bind(params.attempt_id)
    .bind(params.question_id)
    .bind(params.selected_option_ids)
    .bind(params.answer_text)
    .bind(params.created_at)
    .bind(params.updated_at)
    .fetch_optional(executor)
    .await
}

pub(crate) async fn find_by_attempt_and_question(
    executor: impl sqlx::PgExecutor<'_>,
    attempt_id: &str,
    question_id: &str,
) -> Result<Option<StudentAnswer>, sqlx::Error> {
    sqlx::query_as::<_, StudentAnswer>(&format!(
        "SELECT {COLUMNS} FROM student_answers WHERE attempt_id = $1 AND question_id = $2"
    ))
    .bind(attempt_id)
    .bind(question_id)
    .fetch_optional(executor)
    .await
}

pub(crate) async fn list_by_attempt(
    executor: impl sqlx::PgExecutor<'_>,
    attempt_id: &str,
) -> Result<Vec<StudentAnswer>, sqlx::Error> {
    sqlx::query_as::<_, StudentAnswer>(&format!(
        "SELECT {COLUMNS} FROM student_answers WHERE attempt_id = $1 ORDER BY created_at"
    ))
    .bind(attempt_id)
    .fetch_all(executor)
    .await
}

pub(crate) async fn set_objective_grade(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    is_correct: bool,
    marks_awarded: f64,
    now: time::PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE student_answers
         SET is_correct = $2, marks_awarded = $3, updated_at = $4
         WHERE id = $1",
    )
    .bind(id)
    .bind(is_correct)
    .bind(marks_awarded)
    .bind(now)
    .execute(executor)
    .await?;
    Ok(())
}

pub(crate) async fn set_essay_grade(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    marks_awarded: f64,
    feedback: Option<&str>,
    now: time::PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE student_answers
         SET marks_awarded = $2, ai_feedback = COALESCE($3, ai_feedback), updated_at = $4
         WHERE id = $1",
    )
    .bind(id)
    .bind(marks_awarded)
    .bind(feedback)
    .bind(now)
    .execute(executor)
    .await?;
    Ok(())
}

/// Claims one ungraded essay answer on a settled attempt for the grading
/// worker. SKIP LOCKED keeps concurrent workers off the same row; the
/// `ai_started_at` stamp keeps a claim from being re-issued while a grade
/// request is in flight.
pub(crate) async fn claim_pending_essay(
    executor: impl sqlx::PgExecutor<'_>,
    now: time::PrimitiveDateTime,
) -> Result<Option<StudentAnswer>, sqlx::Error> {
    sqlx::query_as::<_, StudentAnswer>(&format!(
        "UPDATE student_answers SET ai_started_at = $1, updated_at = $1
         WHERE id = (
            SELECT sa.id FROM student_answers sa
            JOIN questions q ON q.id = sa.question_id
            JOIN test_attempts ta ON ta.id = sa.attempt_id
            WHERE q.question_type = 'essay'
              AND ta.status = 'completed'
              AND sa.marks_awarded IS NULL
              AND sa.ai_started_at IS NULL
            ORDER BY sa.created_at
            FOR UPDATE OF sa SKIP LOCKED
            LIMIT 1
         )
         RETURNING {COLUMNS}"
    ))
    .bind(now)
    .fetch_optional(executor)
    .await
}

pub(crate) async fn release_essay_claim(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    now: time::PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE student_answers SET ai_started_at = NULL, updated_at = $2 WHERE id = $1",
    )
    .bind(id)
    .bind(now)
    .execute(executor)
    .await?;
    Ok(())
}

pub(crate) async fn count_ungraded_essays(
    executor: impl sqlx::PgExecutor<'_>,
    attempt_id: &str,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT COUNT(*) FROM student_answers sa
         JOIN questions q ON q.id = sa.question_id
         WHERE sa.attempt_id = $1 AND q.question_type = 'essay' AND sa.marks_awarded IS NULL",
    )
    .bind(attempt_id)
    .fetch_one(executor)
    .await
}
