use std::collections::{HashMap, HashSet};

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
use crate::core::time::{attempt_deadline, format_primitive, primitive_now_utc, remaining_seconds};
use crate::db::models::{Test, TestAttempt, User};
use crate::db::types::{AttemptStatus, SubmitTrigger, TransactionKind, UserRole};
use crate::repositories;
use crate::schemas::attempt::{
    AnswerResponse, AttemptResponse, AttemptStateResponse, EssayGradeRequest, SaveAnswerRequest,
    SaveAnswerResponse, StartAttemptRequest, SubmitAttemptResponse,
};
use crate::schemas::test::{question_response, OptionResponse};
use crate::services::settlement::{self, SettlementError};
use crate::services::shuffle;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(start_attempt))
        .route("/mine", get(list_my_attempts))
        .route("/:attempt_id", get(get_attempt_state))
        .route("/:attempt_id/answers", post(save_answer))
        .route("/:attempt_id/submit", post(submit_attempt))
        .route("/:attempt_id/grades", post(record_essay_grade))
}

async fn start_attempt(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<StartAttemptRequest>,
) -> Result<(StatusCode, Json<AttemptResponse>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let now = primitive_now_utc();
    let test = repositories::tests::find_by_id(state.db(), &payload.test_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch test"))?
        .filter(|test| test.is_published)
        .ok_or_else(|| ApiError::NotFound("Test not found".to_string()))?;

    if now < test.start_time {
        return Err(ApiError::BadRequest("Test has not opened yet".to_string()));
    }
    if now >= test.end_time {
        return Err(ApiError::BadRequest("Test window has closed".to_string()));
    }

    // An expired attempt left behind by a missed sweep must settle before a
    // new one can start.
    if let Some(stale) = repositories::attempts::find_in_progress(state.db(), &test.id, &user.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch active attempt"))?
    {
        if now >= stale.deadline_at {
            settlement::submit_attempt(state.db(), &stale.id, SubmitTrigger::Deadline)
                .await
                .map_err(settlement_error)?;
        }
    }

    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;

    repositories::attempts::acquire_test_user_lock(&mut *tx, &test.id, &user.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to serialize attempt start"))?;

    // Idempotent resume: an active attempt is returned as-is, no charge.
    if let Some(active) = repositories::attempts::find_in_progress(&mut *tx, &test.id, &user.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch active attempt"))?
    {
        drop(tx);
        return Ok((StatusCode::OK, Json(AttemptResponse::from_db(active))));
    }

    let used = repositories::attempts::count_by_test_and_student(&mut *tx, &test.id, &user.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count attempts"))?;
    if used >= i64::from(test.max_attempts) {
        return Err(ApiError::Conflict(format!(
            "Maximum attempts ({}) reached for this test",
            test.max_attempts
        )));
    }

    if test.access_cost > 0.0 {
        repositories::wallets::ensure_wallet(&mut *tx, &user.id, now)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to ensure wallet"))?;
        let debited = repositories::wallets::debit(&mut *tx, &user.id, test.access_cost, now)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to debit wallet"))?;
        if !debited {
            let available = repositories::wallets::find_by_user(state.db(), &user.id)
                .await
                .map_err(|e| ApiError::internal(e, "Failed to fetch wallet"))?
                .map(|wallet| wallet.balance)
                .unwrap_or(0.0);
            return Err(ApiError::InsufficientFunds { required: test.access_cost, available });
        }
        let wallet = repositories::wallets::find_by_user(&mut *tx, &user.id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to fetch wallet"))?
            .ok_or_else(|| ApiError::internal(sqlx::Error::RowNotFound, "Wallet vanished"))?;
        repositories::wallets::record_transaction(
            &mut *tx,
            repositories::wallets::CreateTransaction {
                wallet_id: &wallet.id,
                kind: TransactionKind::Debit,
                amount: test.access_cost,
                reason: "test_access",
                source_id: Some(&test.id),
                created_at: now,
            },
        )
        .await
        .map_err(|e| ApiError::internal(e, "Failed to record wallet transaction"))?;
    }

    let questions = repositories::questions::list_by_test(&mut *tx, &test.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch questions"))?;
    let options = repositories::questions::list_options_by_test(&mut *tx, &test.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch options"))?;

    // Stay inside the BIGINT positive range so round-tripping through the
    // column cannot change the seed.
    let shuffle_seed = (rand::random::<u64>() >> 1) as i64;
    let frozen = shuffle::freeze_order(
        shuffle_seed as u64,
        &questions,
        &options,
        test.shuffle_questions,
        test.shuffle_options,
    );

    let attempt_id = Uuid::new_v4().to_string();
    let deadline_at = attempt_deadline(now, test.duration_minutes);
    let inserted = repositories::attempts::create(
        &mut *tx,
        repositories::attempts::CreateAttempt {
            id: &attempt_id,
            test_id: &test.id,
            student_id: &user.id,
            attempt_number: (used + 1) as i32,
            shuffle_seed,
            question_order: serde_json::json!(frozen.question_order),
            option_orders: serde_json::json!(frozen.option_orders),
            started_at: now,
            deadline_at,
            access_charge: test.access_cost,
            created_at: now,
            updated_at: now,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create attempt"))?;

    if !inserted {
        // Another request won the unique in-progress slot; drop our charge
        // and hand back theirs.
        drop(tx);
        let active = repositories::attempts::find_in_progress(state.db(), &test.id, &user.id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to fetch active attempt"))?
            .ok_or_else(|| ApiError::Conflict("Attempt start lost a race, retry".to_string()))?;
        return Ok((StatusCode::OK, Json(AttemptResponse::from_db(active))));
    }

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit transaction"))?;

    metrics::counter!("attempts_started_total").increment(1);

    let attempt = repositories::attempts::fetch_one_by_id(state.db(), &attempt_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch attempt"))?;
    Ok((StatusCode::CREATED, Json(AttemptResponse::from_db(attempt))))
}

async fn get_attempt_state(
    Path(attempt_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<AttemptStateResponse>, ApiError> {
    let mut attempt = fetch_attempt(&state, &attempt_id).await?;
    let test = fetch_attempt_test(&state, &attempt).await?;
    authorize_attempt_view(&user, &attempt, &test)?;

    let now = primitive_now_utc();
    if attempt.status == AttemptStatus::InProgress && now >= attempt.deadline_at {
        let outcome = settlement::submit_attempt(state.db(), &attempt.id, SubmitTrigger::Deadline)
            .await
            .map_err(settlement_error)?;
        attempt = outcome.attempt().clone();
    }

    let questions = repositories::questions::list_by_test(state.db(), &test.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch questions"))?;
    let options = repositories::questions::list_options_by_test(state.db(), &test.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch options"))?;
    let answers = repositories::answers::list_by_attempt(state.db(), &attempt.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch answers"))?;

    let question_order: Vec<String> = attempt.question_order.0.clone();
    let option_orders: HashMap<String, Vec<String>> = attempt.option_orders.0.clone();

    let questions_by_id: HashMap<&str, _> =
        questions.iter().map(|question| (question.id.as_str(), question)).collect();
    let options_by_id: HashMap<&str, _> =
        options.iter().map(|option| (option.id.as_str(), option)).collect();

    let mut ordered_questions = Vec::with_capacity(question_order.len());
    for question_id in &question_order {
        let Some(question) = questions_by_id.get(question_id.as_str()) else {
            continue;
        };
        let ordered_options = option_orders
            .get(question_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| options_by_id.get(id.as_str()))
                    .map(|option| OptionResponse::public(option))
                    .collect()
            })
            .unwrap_or_default();
        ordered_questions.push(question_response(question, ordered_options));
    }

    let settled = attempt.status == AttemptStatus::Completed;
    let answer_responses = answers
        .into_iter()
        .map(|answer| if settled { AnswerResponse::settled(answer) } else { AnswerResponse::open(answer) })
        .collect();

    let pending_essays = if settled {
        repositories::answers::count_ungraded_essays(state.db(), &attempt.id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to count pending essays"))?
    } else {
        0
    };

    let remaining = remaining_seconds(attempt.deadline_at, now);
    Ok(Json(AttemptStateResponse {
        attempt: AttemptResponse::from_db(attempt),
        questions: ordered_questions,
        answers: answer_responses,
        remaining_seconds: remaining,
        pending_essays,
        auto_save_interval_seconds: state.settings().engine().auto_save_interval_seconds,
    }))
}

async fn save_answer(
    Path(attempt_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<SaveAnswerRequest>,
) -> Result<Json<SaveAnswerResponse>, ApiError> {
    let attempt = fetch_attempt(&state, &attempt_id).await?;
    if attempt.student_id != user.id {
        return Err(ApiError::Forbidden("Not your attempt"));
    }

    if attempt.status != AttemptStatus::InProgress {
        return Err(ApiError::Conflict("Attempt is already settled".to_string()));
    }

    let now = primitive_now_utc();
    if now >= attempt.deadline_at {
        settlement::submit_attempt(state.db(), &attempt.id, SubmitTrigger::Deadline)
            .await
            .map_err(settlement_error)?;
        return Err(ApiError::Conflict("Attempt deadline has passed".to_string()));
    }

    let question = repositories::questions::find_by_id(state.db(), &payload.question_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch question"))?
        .filter(|question| question.test_id == attempt.test_id)
        .ok_or_else(|| ApiError::NotFound("Question not found on this test".to_string()))?;

    let selected_option_ids = if question.question_type.is_objective() {
        let selected = payload
            .selected_option_ids
            .as_ref()
            .filter(|ids| !ids.is_empty())
            .ok_or_else(|| {
                ApiError::BadRequest("Objective answers require selected_option_ids".to_string())
            })?;
        let valid: HashSet<String> =
            repositories::questions::list_options_by_question(state.db(), &question.id)
                .await
                .map_err(|e| ApiError::internal(e, "Failed to fetch options"))?
                .into_iter()
                .map(|option| option.id)
                .collect();
        if selected.iter().any(|id| !valid.contains(id)) {
            return Err(ApiError::BadRequest(
                "selected_option_ids contains an unknown option".to_string(),
            ));
        }
        Some(serde_json::json!(selected))
    } else {
        if payload.answer_text.as_deref().map(str::trim).unwrap_or("").is_empty() {
            return Err(ApiError::BadRequest("Essay answers require answer_text".to_string()));
        }
        None
    };

    let answer_id = Uuid::new_v4().to_string();
    let answer = repositories::answers::upsert(
        state.db(),
        repositories::answers::UpsertAnswer {
            id: &answer_id,
            attempt_id: &attempt.id,
            question_id: &question.id,
            selected_option_ids,
            answer_text: payload.answer_text.as_deref().filter(|_| !question.question_type.is_objective()),
            created_at: now,
            updated_at: now,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to save answer"))?
    .ok_or_else(|| ApiError::Conflict("Attempt is already settled".to_string()))?;

    metrics::counter!("answers_saved_total").increment(1);

    Ok(Json(SaveAnswerResponse {
        question_id: answer.question_id,
        saved_at: format_primitive(answer.updated_at),
    }))
}

async fn submit_attempt(
    Path(attempt_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<SubmitAttemptResponse>, ApiError> {
    let attempt = fetch_attempt(&state, &attempt_id).await?;
    if attempt.student_id != user.id {
        return Err(ApiError::Forbidden("Not your attempt"));
    }

    // A submit arriving after the deadline settles the same way the sweep
    // would: deadline trigger, stamped at the deadline itself.
    let now = primitive_now_utc();
    let trigger = if attempt.status == AttemptStatus::InProgress && now >= attempt.deadline_at {
        SubmitTrigger::Deadline
    } else {
        SubmitTrigger::Manual
    };
    let outcome = settlement::submit_attempt(state.db(), &attempt.id, trigger)
        .await
        .map_err(settlement_error)?;
    let already_settled = matches!(outcome, settlement::SettleOutcome::AlreadySettled(_));
    let attempt = outcome.attempt().clone();

    let pending_essays = repositories::answers::count_ungraded_essays(state.db(), &attempt.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count pending essays"))?;

    Ok(Json(SubmitAttemptResponse {
        attempt: AttemptResponse::from_db(attempt),
        already_settled,
        pending_essays,
    }))
}

async fn record_essay_grade(
    Path(attempt_id): Path<String>,
    CurrentLecturer(user): CurrentLecturer,
    State(state): State<AppState>,
    Json(payload): Json<EssayGradeRequest>,
) -> Result<Json<AttemptResponse>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let attempt = fetch_attempt(&state, &attempt_id).await?;
    let test = fetch_attempt_test(&state, &attempt).await?;
    require_owner(&user, &test.created_by)?;

    let attempt = settlement::record_essay_grade(
        state.db(),
        &attempt.id,
        &payload.question_id,
        payload.marks,
        payload.feedback.as_deref(),
    )
    .await
    .map_err(settlement_error)?;

    Ok(Json(AttemptResponse::from_db(attempt)))
}

async fn list_my_attempts(
    Query(params): Query<PageQuery>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<PaginatedResponse<AttemptResponse>>, ApiError> {
    let attempts =
        repositories::attempts::list_by_student(state.db(), &user.id, params.skip, params.limit)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to list attempts"))?;
    let total_count = repositories::attempts::count_by_student(state.db(), &user.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count attempts"))?;

    Ok(Json(PaginatedResponse {
        items: attempts.into_iter().map(AttemptResponse::from_db).collect(),
        total_count,
        skip: params.skip,
        limit: params.limit,
    }))
}

async fn fetch_attempt(state: &AppState, attempt_id: &str) -> Result<TestAttempt, ApiError> {
    repositories::attempts::find_by_id(state.db(), attempt_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch attempt"))?
        .ok_or_else(|| ApiError::NotFound("Attempt not found".to_string()))
}

async fn fetch_attempt_test(state: &AppState, attempt: &TestAttempt) -> Result<Test, ApiError> {
    repositories::tests::find_by_id(state.db(), &attempt.test_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch test"))?
        .ok_or_else(|| ApiError::internal(sqlx::Error::RowNotFound, "Attempt without test"))
}

fn authorize_attempt_view(user: &User, attempt: &TestAttempt, test: &Test) -> Result<(), ApiError> {
    if attempt.student_id == user.id || user.role == UserRole::Admin {
        return Ok(());
    }
    if user.role == UserRole::Lecturer && test.created_by == user.id {
        return Ok(());
    }
    Err(ApiError::Forbidden("Not enough permissions for this attempt"))
}

fn settlement_error(err: SettlementError) -> ApiError {
    match err {
        SettlementError::AttemptNotFound => ApiError::NotFound("Attempt not found".to_string()),
        SettlementError::QuestionNotFound => {
            ApiError::NotFound("Question not found on this test".to_string())
        }
        SettlementError::AnswerNotFound => {
            ApiError::NotFound("No answer was saved for this question".to_string())
        }
        SettlementError::NotAnEssay => {
            ApiError::BadRequest("Only essay questions are graded manually".to_string())
        }
        SettlementError::AttemptStillOpen => {
            ApiError::Conflict("Attempt has not been submitted yet".to_string())
        }
        SettlementError::MarksOutOfRange { marks, max_marks } => ApiError::BadRequest(format!(
            "Marks {marks} outside the allowed range 0..={max_marks}"
        )),
        SettlementError::TestNotFound => {
            ApiError::internal(sqlx::Error::RowNotFound, "Attempt without test")
        }
        SettlementError::Db(e) => ApiError::internal(e, "Settlement failed"),
    }
}
