use axum::http::{Method, StatusCode};
use serde_json::json;
use sqlx::PgPool;
use tower::ServiceExt;
use uuid::Uuid;

use crate::core::time::{format_primitive, primitive_now_utc};
use crate::db::types::UserRole;
use crate::repositories;
use crate::test_support;

#[tokio::test]
#[ignore = "requires local Postgres and Redis"]
async fn signup_then_login_returns_token() {
    let ctx = test_support::setup_test_context().await;

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            "/api/v1/auth/signup",
            None,
            Some(json!({
                "email": "student@example.com",
                "full_name": "First Student",
                "password": "correct-horse"
            })),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = test_support::read_json(response).await;
    assert!(body["access_token"].as_str().is_some());
    assert_eq!(body["user"]["role"], "student");

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({
                "email": "student@example.com",
                "password": "correct-horse"
            })),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore = "requires local Postgres and Redis"]
async fn attempt_lifecycle_settles_once_and_reaggregates_essays() {
    let ctx = test_support::setup_test_context().await;
    let db = ctx.state.db().clone();

    let lecturer = test_support::insert_user(&db, "lect@example.com", UserRole::Lecturer).await;
    let student = test_support::insert_user(&db, "stud@example.com", UserRole::Student).await;
    let (test, correct_option_id) = test_support::insert_published_test(&db, &lecturer.id, 0.0).await;

    let student_token = test_support::bearer_token(&student.id, ctx.state.settings());
    let lecturer_token = test_support::bearer_token(&lecturer.id, ctx.state.settings());

    // Start, then start again: the second call resumes the same attempt.
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            "/api/v1/attempts",
            Some(&student_token),
            Some(json!({"test_id": test.id})),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::CREATED);
    let attempt = test_support::read_json(response).await;
    let attempt_id = attempt["id"].as_str().expect("attempt id").to_string();

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            "/api/v1/attempts",
            Some(&student_token),
            Some(json!({"test_id": test.id})),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let resumed = test_support::read_json(response).await;
    assert_eq!(resumed["id"], attempt_id.as_str());

    let state_uri = format!("/api/v1/attempts/{attempt_id}");
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(Method::GET, &state_uri, Some(&student_token), None))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let state = test_support::read_json(response).await;
    let questions = state["questions"].as_array().expect("questions");
    assert_eq!(questions.len(), 2);
    // Option correctness must never leak while the attempt is open.
    for question in questions {
        for option in question["options"].as_array().expect("options") {
            assert!(option.get("is_correct").is_none());
        }
    }

    let essay_question_id = questions
        .iter()
        .find(|q| q["question_type"] == "essay")
        .and_then(|q| q["id"].as_str())
        .expect("essay question")
        .to_string();
    let mcq_question_id = questions
        .iter()
        .find(|q| q["question_type"] == "multiple_choice")
        .and_then(|q| q["id"].as_str())
        .expect("mcq question")
        .to_string();

    let answers_uri = format!("/api/v1/attempts/{attempt_id}/answers");
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            &answers_uri,
            Some(&student_token),
            Some(json!({
                "question_id": mcq_question_id,
                "selected_option_ids": [correct_option_id]
            })),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            &answers_uri,
            Some(&student_token),
            Some(json!({
                "question_id": essay_question_id,
                "answer_text": "Digits carry weight by position."
            })),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let submit_uri = format!("/api/v1/attempts/{attempt_id}/submit");
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(Method::POST, &submit_uri, Some(&student_token), None))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let settled = test_support::read_json(response).await;
    assert_eq!(settled["already_settled"], false);
    assert_eq!(settled["pending_essays"], 1);
    assert_eq!(settled["attempt"]["status"], "completed");
    assert_eq!(settled["attempt"]["total_score"], 10.0);
    assert_eq!(settled["attempt"]["percentage"], 10.0);
    assert_eq!(settled["attempt"]["passed"], false);

    // A second submit is a no-op that reports the stored result.
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(Method::POST, &submit_uri, Some(&student_token), None))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let repeated = test_support::read_json(response).await;
    assert_eq!(repeated["already_settled"], true);
    assert_eq!(repeated["attempt"]["total_score"], 10.0);

    // Saving after settlement is rejected.
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            &answers_uri,
            Some(&student_token),
            Some(json!({
                "question_id": essay_question_id,
                "answer_text": "Too late."
            })),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // The lecturer grades the essay; the aggregate flips the attempt to pass.
    let grades_uri = format!("/api/v1/attempts/{attempt_id}/grades");
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            &grades_uri,
            Some(&lecturer_token),
            Some(json!({
                "question_id": essay_question_id,
                "marks": 45.0,
                "feedback": "Solid explanation."
            })),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let regraded = test_support::read_json(response).await;
    assert_eq!(regraded["total_score"], 55.0);
    assert_eq!(regraded["percentage"], 55.0);
    assert_eq!(regraded["passed"], true);
}

#[tokio::test]
#[ignore = "requires local Postgres and Redis"]
async fn rapid_resaves_overwrite_without_rejection() {
    let ctx = test_support::setup_test_context().await;
    let db = ctx.state.db().clone();

    let lecturer = test_support::insert_user(&db, "lect@example.com", UserRole::Lecturer).await;
    let student = test_support::insert_user(&db, "stud@example.com", UserRole::Student).await;
    let (test, _) = test_support::insert_published_test(&db, &lecturer.id, 0.0).await;
    let student_token = test_support::bearer_token(&student.id, ctx.state.settings());

    let attempt_id = start_attempt(&ctx, &student_token, &test.id).await;
    let essay_question_id = essay_question_id(&ctx, &student_token, &attempt_id).await;

    // Back-to-back saves of the same question: every call is an independent
    // upsert, so the second one must win, not bounce.
    let answers_uri = format!("/api/v1/attempts/{attempt_id}/answers");
    for text in ["First draft.", "Second draft, sent moments later."] {
        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::POST,
                &answers_uri,
                Some(&student_token),
                Some(json!({
                    "question_id": essay_question_id,
                    "answer_text": text
                })),
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
    }

    let state_uri = format!("/api/v1/attempts/{attempt_id}");
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(Method::GET, &state_uri, Some(&student_token), None))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let state = test_support::read_json(response).await;
    let answer = state["answers"]
        .as_array()
        .expect("answers")
        .iter()
        .find(|a| a["question_id"] == essay_question_id.as_str())
        .expect("essay answer");
    assert_eq!(answer["answer_text"], "Second draft, sent moments later.");
}

#[tokio::test]
#[ignore = "requires local Postgres and Redis"]
async fn answer_write_is_rejected_once_the_attempt_settles() {
    let ctx = test_support::setup_test_context().await;
    let db = ctx.state.db().clone();

    let lecturer = test_support::insert_user(&db, "lect@example.com", UserRole::Lecturer).await;
    let student = test_support::insert_user(&db, "stud@example.com", UserRole::Student).await;
    let (test, _) = test_support::insert_published_test(&db, &lecturer.id, 0.0).await;
    let student_token = test_support::bearer_token(&student.id, ctx.state.settings());

    let attempt_id = start_attempt(&ctx, &student_token, &test.id).await;
    let essay_question_id = essay_question_id(&ctx, &student_token, &attempt_id).await;

    let answers_uri = format!("/api/v1/attempts/{attempt_id}/answers");
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            &answers_uri,
            Some(&student_token),
            Some(json!({
                "question_id": essay_question_id,
                "answer_text": "Digits carry weight by position."
            })),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let submit_uri = format!("/api/v1/attempts/{attempt_id}/submit");
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(Method::POST, &submit_uri, Some(&student_token), None))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    // A write that slips past the handler's status check still cannot touch a
    // settled attempt: the upsert itself is gated on `in_progress`.
    let now = primitive_now_utc();
    let rewritten = repositories::answers::upsert(
        &db,
        repositories::answers::UpsertAnswer {
            id: &Uuid::new_v4().to_string(),
            attempt_id: &attempt_id,
            question_id: &essay_question_id,
            selected_option_ids: None,
            answer_text: Some("Rewritten after the freeze."),
            created_at: now,
            updated_at: now,
        },
    )
    .await
    .expect("upsert");
    assert!(rewritten.is_none());

    let stored =
        repositories::answers::find_by_attempt_and_question(&db, &attempt_id, &essay_question_id)
            .await
            .expect("query")
            .expect("stored answer");
    assert_eq!(stored.answer_text.as_deref(), Some("Digits carry weight by position."));
}

#[tokio::test]
#[ignore = "requires local Postgres and Redis"]
async fn third_attempt_is_rejected_when_attempts_are_exhausted() {
    let ctx = test_support::setup_test_context().await;
    let db = ctx.state.db().clone();

    let lecturer = test_support::insert_user(&db, "lect@example.com", UserRole::Lecturer).await;
    let student = test_support::insert_user(&db, "stud@example.com", UserRole::Student).await;
    let (test, _) = test_support::insert_published_test(&db, &lecturer.id, 0.0).await;
    let student_token = test_support::bearer_token(&student.id, ctx.state.settings());

    // max_attempts is 2: two start/submit cycles use them up.
    for expected_number in [1, 2] {
        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::POST,
                "/api/v1/attempts",
                Some(&student_token),
                Some(json!({"test_id": test.id})),
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::CREATED);
        let attempt = test_support::read_json(response).await;
        assert_eq!(attempt["attempt_number"], expected_number);
        let attempt_id = attempt["id"].as_str().expect("attempt id").to_string();

        let submit_uri = format!("/api/v1/attempts/{attempt_id}/submit");
        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::POST,
                &submit_uri,
                Some(&student_token),
                None,
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            "/api/v1/attempts",
            Some(&student_token),
            Some(json!({"test_id": test.id})),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
#[ignore = "requires local Postgres and Redis"]
async fn regrading_an_essay_converges_to_the_latest_mark() {
    let ctx = test_support::setup_test_context().await;
    let db = ctx.state.db().clone();

    let lecturer = test_support::insert_user(&db, "lect@example.com", UserRole::Lecturer).await;
    let student = test_support::insert_user(&db, "stud@example.com", UserRole::Student).await;
    let (test, _) = test_support::insert_published_test(&db, &lecturer.id, 0.0).await;

    let student_token = test_support::bearer_token(&student.id, ctx.state.settings());
    let lecturer_token = test_support::bearer_token(&lecturer.id, ctx.state.settings());

    let attempt_id = start_attempt(&ctx, &student_token, &test.id).await;
    let essay_question_id = essay_question_id(&ctx, &student_token, &attempt_id).await;

    let answers_uri = format!("/api/v1/attempts/{attempt_id}/answers");
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            &answers_uri,
            Some(&student_token),
            Some(json!({
                "question_id": essay_question_id,
                "answer_text": "Digits carry weight by position."
            })),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let submit_uri = format!("/api/v1/attempts/{attempt_id}/submit");
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(Method::POST, &submit_uri, Some(&student_token), None))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    // Two grades for the same essay: the attempt re-aggregates each time and
    // the latest mark replaces the earlier one instead of stacking.
    let grades_uri = format!("/api/v1/attempts/{attempt_id}/grades");
    for (marks, expected_total) in [(45.0, 45.0), (20.0, 20.0)] {
        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::POST,
                &grades_uri,
                Some(&lecturer_token),
                Some(json!({
                    "question_id": essay_question_id,
                    "marks": marks
                })),
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let regraded = test_support::read_json(response).await;
        assert_eq!(regraded["total_score"], expected_total);
        assert_eq!(regraded["percentage"], expected_total);
    }
}

#[tokio::test]
#[ignore = "requires local Postgres and Redis"]
async fn expired_attempt_settles_on_read_with_deadline_trigger() {
    let ctx = test_support::setup_test_context().await;
    let db = ctx.state.db().clone();

    let lecturer = test_support::insert_user(&db, "lect@example.com", UserRole::Lecturer).await;
    let student = test_support::insert_user(&db, "stud@example.com", UserRole::Student).await;
    let (test, _) = test_support::insert_published_test(&db, &lecturer.id, 0.0).await;
    let student_token = test_support::bearer_token(&student.id, ctx.state.settings());

    let attempt_id = start_attempt(&ctx, &student_token, &test.id).await;
    let expired_at = backdate_deadline(&db, &attempt_id).await;

    let state_uri = format!("/api/v1/attempts/{attempt_id}");
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(Method::GET, &state_uri, Some(&student_token), None))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let state = test_support::read_json(response).await;
    assert_eq!(state["attempt"]["status"], "completed");
    assert_eq!(state["attempt"]["submit_trigger"], "deadline");
    assert_eq!(state["attempt"]["submitted_at"], format_primitive(expired_at).as_str());
    assert_eq!(state["remaining_seconds"], 0);
}

#[tokio::test]
#[ignore = "requires local Postgres and Redis"]
async fn late_manual_submit_is_stamped_as_deadline_triggered() {
    let ctx = test_support::setup_test_context().await;
    let db = ctx.state.db().clone();

    let lecturer = test_support::insert_user(&db, "lect@example.com", UserRole::Lecturer).await;
    let student = test_support::insert_user(&db, "stud@example.com", UserRole::Student).await;
    let (test, _) = test_support::insert_published_test(&db, &lecturer.id, 0.0).await;
    let student_token = test_support::bearer_token(&student.id, ctx.state.settings());

    let attempt_id = start_attempt(&ctx, &student_token, &test.id).await;
    let expired_at = backdate_deadline(&db, &attempt_id).await;

    // The student's submit arrives after time ran out: it settles the attempt
    // the same way the sweep would, stamped at the deadline.
    let submit_uri = format!("/api/v1/attempts/{attempt_id}/submit");
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(Method::POST, &submit_uri, Some(&student_token), None))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let settled = test_support::read_json(response).await;
    assert_eq!(settled["already_settled"], false);
    assert_eq!(settled["attempt"]["status"], "completed");
    assert_eq!(settled["attempt"]["submit_trigger"], "deadline");
    assert_eq!(settled["attempt"]["submitted_at"], format_primitive(expired_at).as_str());
}

#[tokio::test]
#[ignore = "requires local Postgres and Redis"]
async fn paid_test_requires_funds_and_charges_once() {
    let ctx = test_support::setup_test_context().await;
    let db = ctx.state.db().clone();

    let lecturer = test_support::insert_user(&db, "lect@example.com", UserRole::Lecturer).await;
    let admin = test_support::insert_user(&db, "admin@example.com", UserRole::Admin).await;
    let student = test_support::insert_user(&db, "stud@example.com", UserRole::Student).await;
    let (test, _) = test_support::insert_published_test(&db, &lecturer.id, 50.0).await;

    let student_token = test_support::bearer_token(&student.id, ctx.state.settings());
    let admin_token = test_support::bearer_token(&admin.id, ctx.state.settings());

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            "/api/v1/attempts",
            Some(&student_token),
            Some(json!({"test_id": test.id})),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    let body = test_support::read_json(response).await;
    assert_eq!(body["required"], 50.0);

    let topup_uri = format!("/api/v1/users/{}/wallet/topup", student.id);
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            &topup_uri,
            Some(&admin_token),
            Some(json!({"amount": 80.0})),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            "/api/v1/attempts",
            Some(&student_token),
            Some(json!({"test_id": test.id})),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::CREATED);
    let attempt = test_support::read_json(response).await;
    assert_eq!(attempt["access_charge"], 50.0);

    // Resuming must not charge a second time.
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            "/api/v1/attempts",
            Some(&student_token),
            Some(json!({"test_id": test.id})),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::GET,
            "/api/v1/users/me/wallet",
            Some(&student_token),
            None,
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let wallet = test_support::read_json(response).await;
    assert_eq!(wallet["balance"], 30.0);
}

#[tokio::test]
#[ignore = "requires local Postgres and Redis"]
async fn assignment_submission_is_single_shot_and_grading_converts_to_ca() {
    let ctx = test_support::setup_test_context().await;
    let db = ctx.state.db().clone();

    let lecturer = test_support::insert_user(&db, "lect@example.com", UserRole::Lecturer).await;
    let student = test_support::insert_user(&db, "stud@example.com", UserRole::Student).await;

    let lecturer_token = test_support::bearer_token(&lecturer.id, ctx.state.settings());
    let student_token = test_support::bearer_token(&student.id, ctx.state.settings());

    let deadline = (time::OffsetDateTime::now_utc() + time::Duration::days(3))
        .format(&time::format_description::well_known::Rfc3339)
        .expect("deadline");
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            "/api/v1/assignments",
            Some(&lecturer_token),
            Some(json!({
                "title": "Essay on sorting",
                "max_score": 100.0,
                "allocated_marks": 30.0,
                "deadline": deadline,
                "late_submission_allowed": true,
                "late_penalty_percentage": 10.0
            })),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::CREATED);
    let assignment = test_support::read_json(response).await;
    let assignment_id = assignment["id"].as_str().expect("assignment id").to_string();

    let publish_uri = format!("/api/v1/assignments/{assignment_id}/publish");
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(Method::POST, &publish_uri, Some(&lecturer_token), None))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let submissions_uri = format!("/api/v1/assignments/{assignment_id}/submissions");
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            &submissions_uri,
            Some(&student_token),
            Some(json!({"submission_text": "Quicksort beats bubblesort."})),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::CREATED);
    let submission = test_support::read_json(response).await;
    let submission_id = submission["id"].as_str().expect("submission id").to_string();
    assert_eq!(submission["is_late"], false);

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            &submissions_uri,
            Some(&student_token),
            Some(json!({"submission_text": "Second thoughts."})),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let grade_uri =
        format!("/api/v1/assignments/{assignment_id}/submissions/{submission_id}/grade");
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            &grade_uri,
            Some(&lecturer_token),
            Some(json!({"raw_score": 80.0, "feedback": "Good comparison."})),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let graded = test_support::read_json(response).await;
    assert_eq!(graded["status"], "graded");
    assert_eq!(graded["final_score"], 80.0);
    assert_eq!(graded["ca_marks_awarded"], 24.0);
}

async fn start_attempt(
    ctx: &test_support::TestContext,
    token: &str,
    test_id: &str,
) -> String {
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            "/api/v1/attempts",
            Some(token),
            Some(json!({"test_id": test_id})),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::CREATED);
    let attempt = test_support::read_json(response).await;
    attempt["id"].as_str().expect("attempt id").to_string()
}

async fn essay_question_id(
    ctx: &test_support::TestContext,
    token: &str,
    attempt_id: &str,
) -> String {
    let state_uri = format!("/api/v1/attempts/{attempt_id}");
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(Method::GET, &state_uri, Some(token), None))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let state = test_support::read_json(response).await;
    state["questions"]
        .as_array()
        .expect("questions")
        .iter()
        .find(|q| q["question_type"] == "essay")
        .and_then(|q| q["id"].as_str())
        .expect("essay question")
        .to_string()
}

/// Moves the attempt's deadline into the past and returns the new deadline.
/// Trimmed to whole seconds so the value round-trips through the database
/// without precision loss.
async fn backdate_deadline(db: &PgPool, attempt_id: &str) -> time::PrimitiveDateTime {
    let expired_at = (primitive_now_utc() - time::Duration::minutes(5))
        .replace_nanosecond(0)
        .expect("whole second");
    sqlx::query("UPDATE test_attempts SET deadline_at = $2 WHERE id = $1")
        .bind(attempt_id)
        .bind(expired_at)
        .execute(db)
        .await
        .expect("backdate deadline");
    expired_at
}
