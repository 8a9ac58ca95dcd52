use crate::db::models::{Question, QuestionOption};
use crate::db::types::QuestionType;

pub(crate) const COLUMNS: &str =
    "id, test_id, question_type, question_text, marks, order_index, created_at, updated_at";

pub(crate) const OPTION_COLUMNS: &str =
    "id, question_id, option_text, is_correct, order_index, created_at";

pub(crate) struct CreateQuestion<'a> {
    pub(crate) id: &'a str,
    pub(crate) test_id: &'a str,
    pub(crate) question_type: QuestionType,
    pub(crate) question_text: &'a str,
    pub(crate) marks: f64,
    pub(crate) order_index: i32,
    pub(crate) created_at: time::PrimitiveDateTime,
    pub(crate) updated_at: time::PrimitiveDateTime,
}

pub(crate) async fn create(
    executor: impl sqlx::PgExecutor<'_>,
    params: CreateQuestion<'_>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO questions (
            id, test_id, question_type, question_text, marks, order_index, created_at, updated_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8)",
    )
    .bind(params.id)
    .bind(params.test_id)
    .bind(params.question_type)
    .bind(params.question_text)
    .bind(params.marks)
    .bind(params.order_index)
    .bind(params.created_at)
    .bind(params.updated_at)
    .execute(executor)
    .await?;
    Ok(())
}

pub(crate) struct CreateOption<'a> {
    pub(crate) id: &'a str,
    pub(crate) question_id: &'a str,
    pub(crate) option_text: &'a str,
    pub(crate) is_correct: bool,
    pub(crate) order_index: i32,
    pub(crate) created_at: time::PrimitiveDateTime,
}

pub(crate) async fn create_option(
    executor: impl sqlx::PgExecutor<'_>,
    params: CreateOption<'_>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO question_options (
            id, question_id, option_text, is_correct, order_index, created_at
        ) VALUES ($1,$2,$3,$4,$5,$6)",
    )
    .bind(params.id)
    .bind(params.question_id)
    .bind(params.option_text)
    .bind(params.is_correct)
    .bind(params.order_index)
    .bind(params.created_at)
    .execute(executor)
    .await?;
    Ok(())
}

pub(crate) async fn find_by_id(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
) -> Result<Option<Question>, sqlx::Error> {
    sqlx::query_as::<_, Question>(&format!("SELECT {COLUMNS} FROM questions WHERE id = $1"))
        .bind(id)
        .fetch_optional(executor)
        .await
}

pub(crate) async fn list_by_test(
    executor: impl sqlx::PgExecutor<'_>,
    test_id: &str,
) -> Result<Vec<Question>, sqlx::Error> {
    sqlx::query_as::<_, Question>(&format!(
        "SELECT {COLUMNS} FROM questions WHERE test_id = $1 ORDER BY order_index"
    ))
    .bind(test_id)
    .fetch_all(executor)
    .await
}

pub(crate) async fn list_options_by_test(
    executor: impl sqlx::PgExecutor<'_>,
    test_id: &str,
) -> Result<Vec<QuestionOption>, sqlx::Error> {
    sqlx::query_as::<_, QuestionOption>(&format!(
        "SELECT {OPTION_COLUMNS} FROM question_options
         WHERE question_id IN (SELECT id FROM questions WHERE test_id = $1)
         ORDER BY question_id, order_index"
    ))
    .bind(test_id)
    .fetch_all(executor)
    .await
}

pub(crate) async fn list_options_by_question(
    executor: impl sqlx::PgExecutor<'_>,
    question_id: &str,
) -> Result<Vec<QuestionOption>, sqlx::Error> {
    sqlx::query_as::<_, QuestionOption>(&format!(
        "SELECT {OPTION_COLUMNS} FROM question_options
         WHERE question_id = $1 ORDER BY order_index"
    ))
    .bind(question_id)
    .fetch_all(executor)
    .await
}

pub(crate) async fn sum_marks_by_test(
    executor: impl sqlx::PgExecutor<'_>,
    test_id: &str,
) -> Result<f64, sqlx::Error> {
    sqlx::query_scalar("SELECT COALESCE(SUM(marks), 0) FROM questions WHERE test_id = $1")
        .bind(test_id)
        .fetch_one(executor)
        .await
}

pub(crate) async fn count_by_test(
    executor: impl sqlx::PgExecutor<'_>,
    test_id: &str,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM questions WHERE test_id = $1")
        .bind(test_id)
        .fetch_one(executor)
        .await
}
