use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::types::SubmitTrigger;
use crate::repositories;
use crate::services::settlement;

const SWEEP_BATCH_SIZE: i64 = 200;

/// Settles every attempt whose deadline has passed. Each attempt settles in
/// its own transaction so one failure cannot hold back the rest of the batch;
/// an attempt a student submits mid-sweep just comes back `AlreadySettled`.
pub(crate) async fn sweep_expired_attempts(state: &AppState) -> anyhow::Result<usize> {
    let now = primitive_now_utc();
    let expired =
        repositories::attempts::list_expired(state.db(), now, SWEEP_BATCH_SIZE).await?;

    let mut settled = 0usize;
    for attempt in expired {
        match settlement::submit_attempt(state.db(), &attempt.id, SubmitTrigger::Deadline).await {
            Ok(settlement::SettleOutcome::Settled(_)) => {
                settled += 1;
                tracing::info!(attempt_id = %attempt.id, "Deadline sweep settled attempt");
            }
            Ok(settlement::SettleOutcome::AlreadySettled(_)) => {}
            Err(err) => {
                metrics::counter!("deadline_sweep_failures_total").increment(1);
                tracing::error!(
                    attempt_id = %attempt.id,
                    error = %err,
                    "Deadline sweep failed to settle attempt"
                );
            }
        }
    }

    if settled > 0 {
        metrics::counter!("deadline_sweep_settled_total").increment(settled as u64);
    }
    Ok(settled)
}
