use std::collections::HashMap;

use sqlx::PgPool;
use thiserror::Error;

use crate::core::time::primitive_now_utc;
use crate::db::models::TestAttempt;
use crate::db::types::{AttemptStatus, SubmitTrigger};
use crate::repositories;
use crate::services::scoring;

#[derive(Debug, Error)]
pub(crate) enum SettlementError {
    #[error("attempt not found")]
    AttemptNotFound,
    #[error("test not found for attempt")]
    TestNotFound,
    #[error("question not found on this attempt's test")]
    QuestionNotFound,
    #[error("question is not an essay")]
    NotAnEssay,
    #[error("no answer was saved for this question")]
    AnswerNotFound,
    #[error("attempt has not been submitted yet")]
    AttemptStillOpen,
    #[error("marks {marks} outside the range 0..={max_marks}")]
    MarksOutOfRange { marks: f64, max_marks: f64 },
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

#[derive(Debug)]
pub(crate) enum SettleOutcome {
    Settled(TestAttempt),
    /// Another caller won the status transition; carries the stored result so
    /// racing submitters see a successful no-op rather than an error.
    AlreadySettled(TestAttempt),
}

impl SettleOutcome {
    pub(crate) fn attempt(&self) -> &TestAttempt {
        match self {
            SettleOutcome::Settled(attempt) | SettleOutcome::AlreadySettled(attempt) => attempt,
        }
    }
}

/// Settles one attempt: a compare-and-set moves it out of `in_progress`,
/// objective answers are graded by exact option-set match, and the aggregate
/// is persisted. Exactly one caller wins when a manual submit races the
/// deadline sweep; the loser gets `AlreadySettled` with the prior result.
pub(crate) async fn submit_attempt(
    pool: &PgPool,
    attempt_id: &str,
    trigger: SubmitTrigger,
) -> Result<SettleOutcome, SettlementError> {
    let now = primitive_now_utc();
    let mut tx = pool.begin().await?;

    let attempt = repositories::attempts::find_by_id(&mut *tx, attempt_id)
        .await?
        .ok_or(SettlementError::AttemptNotFound)?;

    if attempt.status == AttemptStatus::Completed {
        tx.commit().await?;
        return Ok(SettleOutcome::AlreadySettled(attempt));
    }

    // A deadline-triggered settlement is stamped with the deadline itself, so
    // a sweep that wakes late still records the moment time actually ran out.
    let submitted_at = match trigger {
        SubmitTrigger::Manual => now,
        SubmitTrigger::Deadline => attempt.deadline_at,
    };

    let Some(attempt) =
        repositories::attempts::settle_begin(&mut *tx, attempt_id, submitted_at, trigger, now)
            .await?
    else {
        tx.commit().await?;
        let attempt = repositories::attempts::fetch_one_by_id(pool, attempt_id).await?;
        return Ok(SettleOutcome::AlreadySettled(attempt));
    };

    let test = repositories::tests::find_by_id(&mut *tx, &attempt.test_id)
        .await?
        .ok_or(SettlementError::TestNotFound)?;
    let questions = repositories::questions::list_by_test(&mut *tx, &attempt.test_id).await?;
    let options = repositories::questions::list_options_by_test(&mut *tx, &attempt.test_id).await?;
    let answers = repositories::answers::list_by_attempt(&mut *tx, attempt_id).await?;

    let mut correct_options: HashMap<&str, Vec<String>> = HashMap::new();
    for option in &options {
        if option.is_correct {
            correct_options.entry(&option.question_id).or_default().push(option.id.clone());
        }
    }

    let answers_by_question: HashMap<&str, &crate::db::models::StudentAnswer> =
        answers.iter().map(|answer| (answer.question_id.as_str(), answer)).collect();

    for question in &questions {
        if !question.question_type.is_objective() {
            continue;
        }
        let Some(answer) = answers_by_question.get(question.id.as_str()) else {
            continue;
        };
        let selected: Vec<String> =
            answer.selected_option_ids.as_ref().map(|json| json.0.clone()).unwrap_or_default();
        let correct = correct_options.get(question.id.as_str()).cloned().unwrap_or_default();
        let is_correct = scoring::grade_objective(&selected, &correct);
        let marks = if is_correct { question.marks } else { 0.0 };
        repositories::answers::set_objective_grade(&mut *tx, &answer.id, is_correct, marks, now)
            .await?;
    }

    reaggregate(&mut tx, attempt_id, test.total_marks, test.pass_mark, now).await?;
    tx.commit().await?;

    metrics::counter!("attempts_settled_total", "trigger" => trigger.as_str()).increment(1);

    let settled = repositories::attempts::fetch_one_by_id(pool, attempt_id).await?;
    Ok(SettleOutcome::Settled(settled))
}

/// Writes one essay grade and re-aggregates the attempt result. Re-entrant:
/// re-grading the same answer replaces the previous mark, so the aggregate
/// converges on the latest grade rather than double-counting.
pub(crate) async fn record_essay_grade(
    pool: &PgPool,
    attempt_id: &str,
    question_id: &str,
    marks: f64,
    feedback: Option<&str>,
) -> Result<TestAttempt, SettlementError> {
    let now = primitive_now_utc();
    let mut tx = pool.begin().await?;

    let attempt = repositories::attempts::find_by_id(&mut *tx, attempt_id)
        .await?
        .ok_or(SettlementError::AttemptNotFound)?;
    if attempt.status != AttemptStatus::Completed {
        return Err(SettlementError::AttemptStillOpen);
    }

    let question = repositories::questions::find_by_id(&mut *tx, question_id)
        .await?
        .filter(|question| question.test_id == attempt.test_id)
        .ok_or(SettlementError::QuestionNotFound)?;
    if question.question_type.is_objective() {
        return Err(SettlementError::NotAnEssay);
    }
    if !(0.0..=question.marks).contains(&marks) {
        return Err(SettlementError::MarksOutOfRange { marks, max_marks: question.marks });
    }

    let answer =
        repositories::answers::find_by_attempt_and_question(&mut *tx, attempt_id, question_id)
            .await?
            .ok_or(SettlementError::AnswerNotFound)?;

    let test = repositories::tests::find_by_id(&mut *tx, &attempt.test_id)
        .await?
        .ok_or(SettlementError::TestNotFound)?;

    repositories::answers::set_essay_grade(&mut *tx, &answer.id, marks, feedback, now).await?;
    reaggregate(&mut tx, attempt_id, test.total_marks, test.pass_mark, now).await?;
    tx.commit().await?;

    metrics::counter!("essay_grades_recorded_total").increment(1);

    let attempt = repositories::attempts::fetch_one_by_id(pool, attempt_id).await?;
    Ok(attempt)
}

/// Recomputes total_score/percentage/passed from the answers currently on
/// disk, inside the caller's transaction. Ungraded answers contribute zero.
async fn reaggregate(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    attempt_id: &str,
    total_marks: f64,
    pass_mark: f64,
    now: time::PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    let answers = repositories::answers::list_by_attempt(&mut **tx, attempt_id).await?;
    let awarded: Vec<f64> = answers.iter().filter_map(|answer| answer.marks_awarded).collect();
    let result = scoring::aggregate(&awarded, total_marks, pass_mark);
    repositories::attempts::record_result(
        &mut **tx,
        attempt_id,
        result.total_score,
        result.percentage,
        result.passed,
        now,
    )
    .await
}
