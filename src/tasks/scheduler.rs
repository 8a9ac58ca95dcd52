use anyhow::Result;
use tokio::sync::watch;
use tokio::time::{interval, sleep, Duration};

use crate::core::state::AppState;
use crate::services::essay_grading::EssayGradingService;
use crate::tasks::{deadlines, grading};

pub(crate) async fn run(state: AppState) -> Result<()> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let grading_workers = if state.settings().ai().ai_grading_enabled {
        state.settings().engine().essay_worker_concurrency as usize
    } else {
        0
    };

    let mut handles = Vec::with_capacity(grading_workers + 1);
    handles.push(tokio::spawn(deadline_sweep_loop(state.clone(), shutdown_rx.clone())));

    if grading_workers > 0 {
        let ai = EssayGradingService::from_settings(state.settings())?;
        for _ in 0..grading_workers {
            handles.push(tokio::spawn(essay_worker(state.clone(), ai.clone(), shutdown_rx.clone())));
        }
    } else {
        tracing::info!("AI essay grading disabled, essays await manual grades");
    }

    crate::core::shutdown::shutdown_signal().await;
    if shutdown_tx.send(true).is_err() {
        tracing::warn!("Failed to broadcast shutdown signal to background tasks");
    }

    for handle in handles {
        if let Err(err) = handle.await {
            tracing::error!(error = %err, "Background task join failed");
        }
    }

    Ok(())
}

async fn deadline_sweep_loop(state: AppState, mut shutdown: watch::Receiver<bool>) {
    let period = state.settings().engine().deadline_sweep_interval_seconds;
    let mut tick = interval(Duration::from_secs(period.max(1)));
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = tick.tick() => {
                if let Err(err) = deadlines::sweep_expired_attempts(&state).await {
                    tracing::error!(error = %err, "Deadline sweep failed");
                }
            }
        }
    }
}

async fn essay_worker(
    state: AppState,
    ai: EssayGradingService,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        if *shutdown.borrow() {
            break;
        }

        match grading::grade_next_essay(&state, &ai).await {
            Ok(true) => continue,
            Ok(false) => {}
            Err(err) => tracing::error!(error = %err, "Essay grading worker iteration failed"),
        }

        tokio::select! {
            _ = shutdown.changed() => break,
            _ = sleep(Duration::from_secs(3)) => {}
        }
    }
}
