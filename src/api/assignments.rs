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
use crate::db::models::Assignment;
use crate::repositories;
use crate::schemas::assignment::{
    AssignmentCreate, AssignmentResponse, GradeSubmissionRequest, SubmissionCreate,
    SubmissionResponse,
};
use crate::services::penalty;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_assignments).post(create_assignment))
        .route("/mine", get(list_my_assignments))
        .route("/submissions/mine", get(list_my_submissions))
        .route("/:assignment_id", get(get_assignment))
        .route("/:assignment_id/publish", post(publish_assignment))
        .route("/:assignment_id/submissions", get(list_submissions).post(submit_assignment))
        .route("/:assignment_id/submissions/:submission_id/grade", post(grade_submission))
}

async fn create_assignment(
    CurrentLecturer(user): CurrentLecturer,
    State(state): State<AppState>,
    Json(payload): Json<AssignmentCreate>,
) -> Result<(StatusCode, Json<AssignmentResponse>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let now = primitive_now_utc();
    let assignment_id = Uuid::new_v4().to_string();
    let assignment = repositories::assignments::create(
        state.db(),
        repositories::assignments::CreateAssignment {
            id: &assignment_id,
            course_id: None,
            created_by: &user.id,
            title: &payload.title,
            description: payload.description.as_deref(),
            max_score: payload.max_score,
            allocated_marks: payload.allocated_marks,
            deadline: to_primitive_utc(payload.deadline),
            late_submission_allowed: payload.late_submission_allowed,
            late_penalty_percentage: payload.late_penalty_percentage,
            created_at: now,
            updated_at: now,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create assignment"))?;

    Ok((StatusCode::CREATED, Json(AssignmentResponse::from_db(assignment))))
}

async fn list_assignments(
    Query(params): Query<PageQuery>,
    CurrentUser(_user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<PaginatedResponse<AssignmentResponse>>, ApiError> {
    let assignments =
        repositories::assignments::list_published(state.db(), params.skip, params.limit)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to list assignments"))?;
    let total_count = repositories::assignments::count_published(state.db())
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count assignments"))?;

    Ok(Json(PaginatedResponse {
        items: assignments.into_iter().map(AssignmentResponse::from_db).collect(),
        total_count,
        skip: params.skip,
        limit: params.limit,
    }))
}

async fn list_my_assignments(
    Query(params): Query<PageQuery>,
    CurrentLecturer(user): CurrentLecturer,
    State(state): State<AppState>,
) -> Result<Json<Vec<AssignmentResponse>>, ApiError> {
    let assignments = repositories::assignments::list_by_creator(
        state.db(),
        &user.id,
        params.skip,
        params.limit,
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to list assignments"))?;

    Ok(Json(assignments.into_iter().map(AssignmentResponse::from_db).collect()))
}

async fn get_assignment(
    Path(assignment_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<AssignmentResponse>, ApiError> {
    let assignment = fetch_assignment(&state, &assignment_id).await?;
    if !assignment.is_published {
        require_owner(&user, &assignment.created_by)?;
    }
    Ok(Json(AssignmentResponse::from_db(assignment)))
}

async fn publish_assignment(
    Path(assignment_id): Path<String>,
    CurrentLecturer(user): CurrentLecturer,
    State(state): State<AppState>,
) -> Result<Json<AssignmentResponse>, ApiError> {
    let assignment = fetch_assignment(&state, &assignment_id).await?;
    require_owner(&user, &assignment.created_by)?;

    let published =
        repositories::assignments::publish(state.db(), &assignment_id, primitive_now_utc())
            .await
            .map_err(|e| ApiError::internal(e, "Failed to publish assignment"))?;
    if !published {
        return Err(ApiError::Conflict("Assignment is already published".to_string()));
    }

    let assignment = fetch_assignment(&state, &assignment_id).await?;
    Ok(Json(AssignmentResponse::from_db(assignment)))
}

async fn submit_assignment(
    Path(assignment_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<SubmissionCreate>,
) -> Result<(StatusCode, Json<SubmissionResponse>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let assignment = fetch_assignment(&state, &assignment_id).await?;
    if !assignment.is_published {
        return Err(ApiError::NotFound("Assignment not found".to_string()));
    }

    let now = primitive_now_utc();
    let is_late = now > assignment.deadline;
    if is_late && !assignment.late_submission_allowed {
        return Err(ApiError::BadRequest(
            "Deadline has passed and late submissions are not allowed".to_string(),
        ));
    }
    let late_days = if is_late { penalty::late_days(assignment.deadline, now) } else { 0 };

    let submission_id = Uuid::new_v4().to_string();
    let inserted = repositories::assignments::create_submission(
        state.db(),
        repositories::assignments::CreateSubmission {
            id: &submission_id,
            assignment_id: &assignment.id,
            student_id: &user.id,
            submission_text: Some(&payload.submission_text),
            submitted_at: now,
            is_late,
            late_days,
            created_at: now,
            updated_at: now,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create submission"))?;
    if !inserted {
        return Err(ApiError::Conflict(
            "You have already submitted this assignment".to_string(),
        ));
    }

    metrics::counter!("assignment_submissions_total").increment(1);

    let submission =
        repositories::assignments::find_submission_by_pair(state.db(), &assignment.id, &user.id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to fetch submission"))?
            .ok_or_else(|| ApiError::internal(sqlx::Error::RowNotFound, "Submission vanished"))?;

    Ok((StatusCode::CREATED, Json(SubmissionResponse::from_db(submission))))
}

async fn grade_submission(
    Path((assignment_id, submission_id)): Path<(String, String)>,
    CurrentLecturer(user): CurrentLecturer,
    State(state): State<AppState>,
    Json(payload): Json<GradeSubmissionRequest>,
) -> Result<Json<SubmissionResponse>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let assignment = fetch_assignment(&state, &assignment_id).await?;
    require_owner(&user, &assignment.created_by)?;

    let submission = repositories::assignments::find_submission_by_id(state.db(), &submission_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch submission"))?
        .filter(|submission| submission.assignment_id == assignment.id)
        .ok_or_else(|| ApiError::NotFound("Submission not found".to_string()))?;

    if payload.raw_score > assignment.max_score {
        return Err(ApiError::BadRequest(format!(
            "raw_score {} exceeds max_score {}",
            payload.raw_score, assignment.max_score
        )));
    }

    let final_score = if submission.is_late {
        penalty::effective_score(
            payload.raw_score,
            assignment.late_penalty_percentage,
            submission.late_days,
        )
    } else {
        payload.raw_score
    };
    let ca_marks_awarded =
        penalty::ca_marks(final_score, assignment.max_score, assignment.allocated_marks);

    let submission = repositories::assignments::grade_submission(
        state.db(),
        &submission.id,
        repositories::assignments::GradeSubmission {
            raw_score: payload.raw_score,
            final_score,
            ca_marks_awarded,
            graded_by: &user.id,
            graded_at: primitive_now_utc(),
            lecturer_feedback: payload.feedback.as_deref(),
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to grade submission"))?;

    metrics::counter!("assignment_grades_recorded_total").increment(1);

    Ok(Json(SubmissionResponse::from_db(submission)))
}

async fn list_submissions(
    Path(assignment_id): Path<String>,
    Query(params): Query<PageQuery>,
    CurrentLecturer(user): CurrentLecturer,
    State(state): State<AppState>,
) -> Result<Json<PaginatedResponse<SubmissionResponse>>, ApiError> {
    let assignment = fetch_assignment(&state, &assignment_id).await?;
    require_owner(&user, &assignment.created_by)?;

    let submissions = repositories::assignments::list_submissions_by_assignment(
        state.db(),
        &assignment.id,
        params.skip,
        params.limit,
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to list submissions"))?;
    let total_count =
        repositories::assignments::count_submissions_by_assignment(state.db(), &assignment.id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to count submissions"))?;

    Ok(Json(PaginatedResponse {
        items: submissions.into_iter().map(SubmissionResponse::from_db).collect(),
        total_count,
        skip: params.skip,
        limit: params.limit,
    }))
}

async fn list_my_submissions(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<SubmissionResponse>>, ApiError> {
    let submissions =
        repositories::assignments::list_submissions_by_student(state.db(), &user.id, 0, 1000)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to list submissions"))?;

    Ok(Json(submissions.into_iter().map(SubmissionResponse::from_db).collect()))
}

async fn fetch_assignment(state: &AppState, assignment_id: &str) -> Result<Assignment, ApiError> {
    repositories::assignments::find_by_id(state.db(), assignment_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch assignment"))?
        .ok_or_else(|| ApiError::NotFound("Assignment not found".to_string()))
}
