use sqlx::PgPool;

use crate::db::models::TestAttempt;
use crate::db::types::{AttemptStatus, SubmitTrigger};

pub(crate) const COLUMNS: &str = "\
    id, test_id, student_id, attempt_number, status, shuffle_seed, question_order, \
    option_orders, started_at, deadline_at, submitted_at, submit_trigger, \
    total_score, percentage, passed, access_charge, created_at, updated_at";

pub(crate) struct CreateAttempt<'a> {
    pub(crate) id: &'a str,
    pub(crate) test_id: &'a str,
    pub(crate) student_id: &'a str,
    pub(crate) attempt_number: i32,
    pub(crate) shuffle_seed: i64,
    pub(crate) question_order: serde_json::Value,
    pub(crate) option_orders: serde_json::Value,
    pub(crate) started_at: time::PrimitiveDateTime,
    pub(crate) deadline_at: time::PrimitiveDateTime,
    pub(crate) access_charge: f64,
    pub(crate) created_at: time::PrimitiveDateTime,
    pub(crate) updated_at: time::PrimitiveDateTime,
}

/// Serializes concurrent attempt starts for one (test, student) pair within
/// the surrounding transaction.
pub(crate) async fn acquire_test_user_lock(
    executor: impl sqlx::PgExecutor<'_>,
    test_id: &str,
    student_id: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1), hashtext($2))")
        .bind(test_id)
        .bind(student_id)
        .execute(executor)
        .await?;
    Ok(())
}

pub(crate) async fn create(
    executor: impl sqlx::PgExecutor<'_>,
    attempt: CreateAttempt<'_>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO test_attempts (
            id, test_id, student_id, attempt_number, status, shuffle_seed,
            question_order, option_orders, started_at, deadline_at, access_charge,
            created_at, updated_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13)
        ON CONFLICT DO NOTHING",
    )
    .bind(attempt.id)
    .bind(attempt.test_id)
    .bind(attempt.student_id)
    .bind(attempt.attempt_number)
    .bind(AttemptStatus::InProgress)
    .bind(attempt.shuffle_seed)
    .bind(attempt.question_order)
    .bind(attempt.option_orders)
    .bind(attempt.started_at)
    .bind(attempt.deadline_at)
    .bind(attempt.access_charge)
    .bind(attempt.created_at)
    .bind(attempt.updated_at)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub(crate) async fn find_by_id(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
) -> Result<Option<TestAttempt>, sqlx::Error> {
    sqlx::query_as::<_, TestAttempt>(&format!(
        "SELECT {COLUMNS} FROM test_attempts WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(executor)
    .await
}

pub(crate) async fn fetch_one_by_id(pool: &PgPool, id: &str) -> Result<TestAttempt, sqlx::Error> {
    sqlx::query_as::<_, TestAttempt>(&format!(
        "SELECT {COLUMNS} FROM test_attempts WHERE id = $1"
    ))
    .bind(id)
    .fetch_one(pool)
    .await
}

pub(crate) async fn find_in_progress(
    executor: impl sqlx::PgExecutor<'_>,
    test_id: &str,
    student_id: &str,
) -> Result<Option<TestAttempt>, sqlx::Error> {
    sqlx::query_as::<_, TestAttempt>(&format!(
        "SELECT {COLUMNS} FROM test_attempts
         WHERE test_id = $1 AND student_id = $2 AND status = $3"
    ))
    .bind(test_id)
    .bind(student_id)
    .bind(AttemptStatus::InProgress)
    .fetch_optional(executor)
    .await
}

pub(crate) async fn count_by_test_and_student(
    executor: impl sqlx::PgExecutor<'_>,
    test_id: &str,
    student_id: &str,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT COUNT(*) FROM test_attempts WHERE test_id = $1 AND student_id = $2",
    )
    .bind(test_id)
    .bind(student_id)
    .fetch_one(executor)
    .await
}

/// First half of settlement: flip the attempt out of `in_progress` and stamp
/// the submission metadata. Returns `None` when another settler already won
/// the compare-and-set.
pub(crate) async fn settle_begin(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    submitted_at: time::PrimitiveDateTime,
    trigger: SubmitTrigger,
    now: time::PrimitiveDateTime,
) -> Result<Option<TestAttempt>, sqlx::Error> {
    sqlx::query_as::<_, TestAttempt>(&format!(
        "UPDATE test_attempts
         SET status = $2, submitted_at = $3, submit_trigger = $4, updated_at = $5
         WHERE id = $1 AND status = $6
         RETURNING {COLUMNS}"
    ))
    .bind(id)
    .bind(AttemptStatus::Completed)
    .bind(submitted_at)
    .bind(trigger)
    .bind(now)
    .bind(AttemptStatus::InProgress)
    .fetch_optional(executor)
    .await
}

pub(crate) async fn record_result(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    total_score: f64,
    percentage: f64,
    passed: bool,
    now: time::PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE test_attempts
         SET total_score = $2, percentage = $3, passed = $4, updated_at = $5
         WHERE id = $1",
    )
    .bind(id)
    .bind(total_score)
    .bind(percentage)
    .bind(passed)
    .bind(now)
    .execute(executor)
    .await?;
    Ok(())
}

pub(crate) async fn list_expired(
    executor: impl sqlx::PgExecutor<'_>,
    now: time::PrimitiveDateTime,
    limit: i64,
) -> Result<Vec<TestAttempt>, sqlx::Error> {
    sqlx::query_as::<_, TestAttempt>(&format!(
        "SELECT {COLUMNS} FROM test_attempts
         WHERE status = $1 AND deadline_at <= $2
         ORDER BY deadline_at LIMIT $3"
    ))
    .bind(AttemptStatus::InProgress)
    .bind(now)
    .bind(limit.clamp(1, 1000))
    .fetch_all(executor)
    .await
}

pub(crate) async fn list_by_student(
    pool: &PgPool,
    student_id: &str,
    skip: i64,
    limit: i64,
) -> Result<Vec<TestAttempt>, sqlx::Error> {
    sqlx::query_as::<_, TestAttempt>(&format!(
        "SELECT {COLUMNS} FROM test_attempts WHERE student_id = $1
         ORDER BY created_at DESC OFFSET $2 LIMIT $3"
    ))
    .bind(student_id)
    .bind(skip.max(0))
    .bind(limit.clamp(1, 1000))
    .fetch_all(pool)
    .await
}

pub(crate) async fn count_by_student(pool: &PgPool, student_id: &str) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM test_attempts WHERE student_id = $1")
        .bind(student_id)
        .fetch_one(pool)
        .await
}

pub(crate) async fn list_by_test(
    pool: &PgPool,
    test_id: &str,
    skip: i64,
    limit: i64,
) -> Result<Vec<TestAttempt>, sqlx::Error> {
    sqlx::query_as::<_, TestAttempt>(&format!(
        "SELECT {COLUMNS} FROM test_attempts WHERE test_id = $1
         ORDER BY created_at DESC OFFSET $2 LIMIT $3"
    ))
    .bind(test_id)
    .bind(skip.max(0))
    .bind(limit.clamp(1, 1000))
    .fetch_all(pool)
    .await
}

pub(crate) async fn count_by_test(pool: &PgPool, test_id: &str) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM test_attempts WHERE test_id = $1")
        .bind(test_id)
        .fetch_one(pool)
        .await
}

pub(crate) async fn count_by_test_and_status(
    pool: &PgPool,
    test_id: &str,
    status: AttemptStatus,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM test_attempts WHERE test_id = $1 AND status = $2")
        .bind(test_id)
        .bind(status)
        .fetch_one(pool)
        .await
}

pub(crate) async fn count_passed_by_test(pool: &PgPool, test_id: &str) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM test_attempts WHERE test_id = $1 AND passed = TRUE")
        .bind(test_id)
        .fetch_one(pool)
        .await
}
