use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::repositories;
use crate::services::essay_grading::EssayGradingService;
use crate::services::settlement;

/// Claims one pending essay answer, asks the grading model for a mark, and
/// records it through the same path a lecturer's grade takes. Returns whether
/// an answer was claimed so the worker knows when to idle.
pub(crate) async fn grade_next_essay(
    state: &AppState,
    ai: &EssayGradingService,
) -> anyhow::Result<bool> {
    let now = primitive_now_utc();
    let Some(answer) = repositories::answers::claim_pending_essay(state.db(), now).await? else {
        return Ok(false);
    };

    let question = repositories::questions::find_by_id(state.db(), &answer.question_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("question {} missing for claimed answer", answer.question_id))?;

    let answer_text = answer.answer_text.as_deref().unwrap_or("");
    if answer_text.trim().is_empty() {
        // Nothing to grade; a blank essay scores zero.
        settlement::record_essay_grade(
            state.db(),
            &answer.attempt_id,
            &answer.question_id,
            0.0,
            Some("No answer was provided."),
        )
        .await?;
        metrics::counter!("grading_jobs_total", "status" => "empty").increment(1);
        return Ok(true);
    }

    match ai.grade_essay(&question.question_text, question.marks, answer_text).await {
        Ok(grade) => {
            settlement::record_essay_grade(
                state.db(),
                &answer.attempt_id,
                &answer.question_id,
                grade.marks,
                Some(&grade.feedback),
            )
            .await?;
            metrics::counter!("grading_jobs_total", "status" => "graded").increment(1);
            tracing::info!(
                attempt_id = %answer.attempt_id,
                question_id = %answer.question_id,
                marks = grade.marks,
                "Essay graded"
            );
        }
        Err(err) => {
            // Release the claim so a later pass (or a lecturer) can grade it.
            repositories::answers::release_essay_claim(state.db(), &answer.id, primitive_now_utc())
                .await?;
            metrics::counter!("grading_jobs_total", "status" => "failed").increment(1);
            tracing::error!(
                attempt_id = %answer.attempt_id,
                question_id = %answer.question_id,
                error = %err,
                "Essay grading request failed"
            );
        }
    }

    Ok(true)
}
