//! services/api/src/web/processing_task.rs
//!
//! This module contains the asynchronous "worker" function that runs one
//! processing cycle: ingestion, normalization and the timed reveal.

use crate::web::{protocol::ServerMessage, state::AppState};
use register_assistant_core::{Generation, Phase, StagedFile, Tick};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// The main asynchronous task for one processing cycle.
///
/// Every session mutation is checked against `generation`, so a task that
/// lost a race with a newer stage, trigger or reset changes nothing. The
/// `CancellationToken` only makes such a task stop sooner.
pub async fn processing_process(
    app_state: Arc<AppState>,
    generation: Generation,
    file: StagedFile,
    prompt: Option<String>,
    cancellation_token: CancellationToken,
) {
    info!(file = %file.name, "Processing task started.");
    let today = chrono::Local::now().date_naive();

    let result = tokio::select! {
        _ = cancellation_token.cancelled() => {
            info!("Processing task cancelled during extraction.");
            return;
        }
        result = app_state.router.ingest(&file, prompt.as_deref(), today) => result,
    };

    // Events are sent while the session lock is held, so every event of an
    // abandoned cycle is ordered before the event that abandoned it.
    {
        let mut active = app_state.session.lock().await;
        let mut rng = rand::thread_rng();
        let Some(phase) = active
            .store
            .resolve_extraction(generation, result, today, &mut rng)
        else {
            info!("Processing task superseded before extraction finished.");
            return;
        };
        let notice = active.store.notice();
        match phase {
            Phase::Failed => {
                let message = notice
                    .map(|notice| notice.message())
                    .unwrap_or_else(|| "Processing failed".to_string());
                app_state.emit(ServerMessage::Failed { message });
                return;
            }
            Phase::Complete => {
                if let Some(notice) = notice {
                    app_state.emit(ServerMessage::NoDataFound {
                        message: notice.message(),
                    });
                }
                return;
            }
            _ => {
                let total = active.store.source_records().map_or(0, <[_]>::len);
                app_state.emit(ServerMessage::ExtractionFinished { total });
            }
        }
    }

    loop {
        let (index, total) = {
            let mut active = app_state.session.lock().await;
            match active.store.begin_tick(generation) {
                Tick::Pending { index, total } => {
                    app_state.emit(ServerMessage::RecordProcessing { index, total });
                    (index, total)
                }
                Tick::Done { total } => {
                    info!(total, "All records revealed.");
                    app_state.emit(ServerMessage::Completed { total });
                    return;
                }
                Tick::Stale => {
                    info!("Processing task superseded during reveal.");
                    return;
                }
            }
        };

        tokio::select! {
            _ = cancellation_token.cancelled() => {
                info!("Processing task cancelled during reveal.");
                return;
            }
            _ = tokio::time::sleep(app_state.config.reveal_delay) => {}
        }

        let mut active = app_state.session.lock().await;
        match active.store.finish_tick(generation) {
            Some(record) => app_state.emit(ServerMessage::RecordRevealed {
                index,
                total,
                record,
            }),
            None => {
                warn!(index, "Reveal tick found no record to append.");
                return;
            }
        }
    }
}
