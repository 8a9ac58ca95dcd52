use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::{require_owner, CurrentLecturer, CurrentUser};
use crate::api::pagination::{PageQuery, PaginatedResponse};
use crate::core::state::AppState;
use crate::core::time::{primitive_now_utc, to_primitive_utc};
use crate::db::models::Test;
use crate::db::types::{AttemptStatus, QuestionType};
use crate::repositories;
use crate::schemas::attempt::{AttemptResponse, AttemptSummaryResponse};
use crate::schemas::test::{
    question_response, OptionResponse, QuestionCreate, QuestionResponse, TestCreate, TestResponse,
};

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_tests).post(create_test))
        .route("/mine", get(list_my_tests))
        .route("/:test_id", get(get_test))
        .route("/:test_id/questions", get(list_questions))
        .route("/:test_id/publish", post(publish_test))
        .route("/:test_id/attempts", get(list_test_attempts))
        .route("/:test_id/attempts/summary", get(attempt_summary))
}

fn validate_question(question: &QuestionCreate) -> Result<(), ApiError> {
    match question.question_type {
        QuestionType::Essay => {
            if !question.options.is_empty() {
                return Err(ApiError::BadRequest(
                    "Essay questions must not carry options".to_string(),
                ));
            }
        }
        QuestionType::TrueFalse => {
            if question.options.len() != 2 {
                return Err(ApiError::BadRequest(
                    "True/false questions must have exactly two options".to_string(),
                ));
            }
            if !question.options.iter().any(|option| option.is_correct) {
                return Err(ApiError::BadRequest(
                    "Objective questions must flag at least one correct option".to_string(),
                ));
            }
        }
        QuestionType::MultipleChoice => {
            if question.options.len() < 2 {
                return Err(ApiError::BadRequest(
                    "Multiple-choice questions must have at least two options".to_string(),
                ));
            }
            if !question.options.iter().any(|option| option.is_correct) {
                return Err(ApiError::BadRequest(
                    "Objective questions must flag at least one correct option".to_string(),
                ));
            }
        }
    }
    Ok(())
}

async fn create_test(
    CurrentLecturer(user): CurrentLecturer,
    State(state): State<AppState>,
    Json(payload): Json<TestCreate>,
) -> Result<(StatusCode, Json<TestResponse>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    if payload.end_time <= payload.start_time {
        return Err(ApiError::BadRequest("end_time must be after start_time".to_string()));
    }

    for question in &payload.questions {
        validate_question(question)?;
    }

    let question_marks: f64 = payload.questions.iter().map(|question| question.marks).sum();
    if question_marks > payload.total_marks {
        return Err(ApiError::BadRequest(format!(
            "Question marks ({question_marks}) exceed total_marks ({})",
            payload.total_marks
        )));
    }

    let now = primitive_now_utc();
    let test_id = Uuid::new_v4().to_string();

    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;

    let test = repositories::tests::create(
        &mut *tx,
        repositories::tests::CreateTest {
            id: &test_id,
            course_id: None,
            created_by: &user.id,
            title: &payload.title,
            description: payload.description.as_deref(),
            total_marks: payload.total_marks,
            pass_mark: payload.pass_mark,
            allocated_marks: payload.allocated_marks,
            duration_minutes: payload.duration_minutes,
            start_time: to_primitive_utc(payload.start_time),
            end_time: to_primitive_utc(payload.end_time),
            shuffle_questions: payload.shuffle_questions,
            shuffle_options: payload.shuffle_options,
            max_attempts: payload.max_attempts,
            access_cost: payload.access_cost,
            created_at: now,
            updated_at: now,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create test"))?;

    for (question_index, question) in payload.questions.iter().enumerate() {
        let question_id = Uuid::new_v4().to_string();
        repositories::questions::create(
            &mut *tx,
            repositories::questions::CreateQuestion {
                id: &question_id,
                test_id: &test_id,
                question_type: question.question_type,
                question_text: &question.question_text,
                marks: question.marks,
                order_index: question_index as i32,
                created_at: now,
                updated_at: now,
            },
        )
        .await
        .map_err(|e| ApiError::internal(e, "Failed to create question"))?;

        for (option_index, option) in question.options.iter().enumerate() {
            let option_id = Uuid::new_v4().to_string();
            repositories::questions::create_option(
                &mut *tx,
                repositories::questions::CreateOption {
                    id: &option_id,
                    question_id: &question_id,
                    option_text: &option.option_text,
                    is_correct: option.is_correct,
                    order_index: option_index as i32,
                    created_at: now,
                },
            )
            .await
            .map_err(|e| ApiError::internal(e, "Failed to create option"))?;
        }
    }

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit transaction"))?;

    let question_count = payload.questions.len() as i64;
    Ok((StatusCode::CREATED, Json(TestResponse::from_db(test, question_count))))
}

async fn list_tests(
    Query(params): Query<PageQuery>,
    CurrentUser(_user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<PaginatedResponse<TestResponse>>, ApiError> {
    let tests = repositories::tests::list_published(state.db(), params.skip, params.limit)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list tests"))?;
    let total_count = repositories::tests::count_published(state.db())
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count tests"))?;

    let mut items = Vec::with_capacity(tests.len());
    for test in tests {
        items.push(test_with_question_count(&state, test).await?);
    }

    Ok(Json(PaginatedResponse { items, total_count, skip: params.skip, limit: params.limit }))
}

async fn list_my_tests(
    Query(params): Query<PageQuery>,
    CurrentLecturer(user): CurrentLecturer,
    State(state): State<AppState>,
) -> Result<Json<PaginatedResponse<TestResponse>>, ApiError> {
    let tests = repositories::tests::list_by_creator(state.db(), &user.id, params.skip, params.limit)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list tests"))?;
    let total_count = repositories::tests::count_by_creator(state.db(), &user.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count tests"))?;

    let mut items = Vec::with_capacity(tests.len());
    for test in tests {
        items.push(test_with_question_count(&state, test).await?);
    }

    Ok(Json(PaginatedResponse { items, total_count, skip: params.skip, limit: params.limit }))
}

async fn get_test(
    Path(test_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<TestResponse>, ApiError> {
    let test = fetch_test(&state, &test_id).await?;

    if !test.is_published {
        require_owner(&user, &test.created_by)?;
    }

    test_with_question_count(&state, test).await.map(Json)
}

/// Authoring view of the question bank, correctness flags included. Students
/// never see this route's payload; they get the frozen per-attempt view from
/// the attempts API instead.
async fn list_questions(
    Path(test_id): Path<String>,
    CurrentLecturer(user): CurrentLecturer,
    State(state): State<AppState>,
) -> Result<Json<Vec<QuestionResponse>>, ApiError> {
    let test = fetch_test(&state, &test_id).await?;
    require_owner(&user, &test.created_by)?;

    let questions = repositories::questions::list_by_test(state.db(), &test_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch questions"))?;
    let options = repositories::questions::list_options_by_test(state.db(), &test_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch options"))?;

    let responses = questions
        .iter()
        .map(|question| {
            let question_options = options
                .iter()
                .filter(|option| option.question_id == question.id)
                .map(OptionResponse::authoring)
                .collect();
            question_response(question, question_options)
        })
        .collect();

    Ok(Json(responses))
}

async fn publish_test(
    Path(test_id): Path<String>,
    CurrentLecturer(user): CurrentLecturer,
    State(state): State<AppState>,
) -> Result<Json<TestResponse>, ApiError> {
    let test = fetch_test(&state, &test_id).await?;
    require_owner(&user, &test.created_by)?;

    let question_count = repositories::questions::count_by_test(state.db(), &test_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count questions"))?;
    if question_count == 0 {
        return Err(ApiError::BadRequest("Cannot publish a test without questions".to_string()));
    }

    let question_marks = repositories::questions::sum_marks_by_test(state.db(), &test_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to sum question marks"))?;
    if question_marks > test.total_marks {
        return Err(ApiError::BadRequest(format!(
            "Question marks ({question_marks}) exceed total_marks ({})",
            test.total_marks
        )));
    }

    let published = repositories::tests::publish(state.db(), &test_id, primitive_now_utc())
        .await
        .map_err(|e| ApiError::internal(e, "Failed to publish test"))?;
    if !published {
        return Err(ApiError::Conflict("Test is already published".to_string()));
    }

    let test = fetch_test(&state, &test_id).await?;
    test_with_question_count(&state, test).await.map(Json)
}

async fn list_test_attempts(
    Path(test_id): Path<String>,
    Query(params): Query<PageQuery>,
    CurrentLecturer(user): CurrentLecturer,
    State(state): State<AppState>,
) -> Result<Json<PaginatedResponse<AttemptResponse>>, ApiError> {
    let test = fetch_test(&state, &test_id).await?;
    require_owner(&user, &test.created_by)?;

    let attempts =
        repositories::attempts::list_by_test(state.db(), &test_id, params.skip, params.limit)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to list attempts"))?;
    let total_count = repositories::attempts::count_by_test(state.db(), &test_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count attempts"))?;

    Ok(Json(PaginatedResponse {
        items: attempts.into_iter().map(AttemptResponse::from_db).collect(),
        total_count,
        skip: params.skip,
        limit: params.limit,
    }))
}

async fn attempt_summary(
    Path(test_id): Path<String>,
    CurrentLecturer(user): CurrentLecturer,
    State(state): State<AppState>,
) -> Result<Json<AttemptSummaryResponse>, ApiError> {
    let test = fetch_test(&state, &test_id).await?;
    require_owner(&user, &test.created_by)?;

    let total = repositories::attempts::count_by_test(state.db(), &test_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count attempts"))?;
    let in_progress = repositories::attempts::count_by_test_and_status(
        state.db(),
        &test_id,
        AttemptStatus::InProgress,
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to count attempts"))?;
    let completed = repositories::attempts::count_by_test_and_status(
        state.db(),
        &test_id,
        AttemptStatus::Completed,
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to count attempts"))?;
    let passed = repositories::attempts::count_passed_by_test(state.db(), &test_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count attempts"))?;

    Ok(Json(AttemptSummaryResponse { total, in_progress, completed, passed }))
}

async fn fetch_test(state: &AppState, test_id: &str) -> Result<Test, ApiError> {
    repositories::tests::find_by_id(state.db(), test_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch test"))?
        .ok_or_else(|| ApiError::NotFound("Test not found".to_string()))
}

async fn test_with_question_count(
    state: &AppState,
    test: Test,
) -> Result<TestResponse, ApiError> {
    let question_count = repositories::questions::count_by_test(state.db(), &test.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count questions"))?;
    Ok(TestResponse::from_db(test, question_count))
}
