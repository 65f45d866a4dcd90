//! services/api/src/web/state.rs
//!
//! Defines the application's shared state and the operations the REST layer
//! drives the upload session through.

use crate::config::Config;
use crate::error::ApiError;
use crate::export::{self, ExportFormat, ExportedFile};
use crate::web::{processing_task::processing_process, protocol::ServerMessage};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use register_assistant_core::{
    ExtractionGateway, ExtractionService, FileKind, IngestionRouter, PipelineResult, RecordId,
    Session, SessionView, StagedFile, StudentRecord, TrackedRecord,
};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

const EVENT_CHANNEL_CAPACITY: usize = 256;

//=========================================================================================
// ActiveSession (The Single Upload Session)
//=========================================================================================

/// The session together with the token of the cycle currently allowed to run.
pub struct ActiveSession {
    pub store: Session,
    /// A token to gracefully cancel the current processing task.
    pub cancellation_token: CancellationToken,
}

impl ActiveSession {
    fn new() -> Self {
        Self {
            store: Session::new(),
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Cancels any in-flight task and arms a fresh token for the next one.
    fn cancel_cycle(&mut self) {
        self.cancellation_token.cancel();
        self.cancellation_token = CancellationToken::new();
    }
}

//=========================================================================================
// AppState (Shared Across All Connections)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
pub struct AppState {
    pub config: Arc<Config>,
    pub router: IngestionRouter,
    pub session: Mutex<ActiveSession>,
    events: broadcast::Sender<ServerMessage>,
}

impl AppState {
    /// `extraction` is `None` when no credential is configured. JSON and XLSX
    /// uploads still work; images then fail with a configuration error.
    pub fn new(config: Arc<Config>, extraction: Option<Arc<dyn ExtractionService>>) -> Arc<Self> {
        let gateway = match extraction {
            Some(service) => ExtractionGateway::new(service),
            None => ExtractionGateway::unconfigured(),
        };
        info!(
            image_extraction = gateway.is_configured(),
            "Extraction gateway ready"
        );
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Arc::new(Self {
            config,
            router: IngestionRouter::new(gateway),
            session: Mutex::new(ActiveSession::new()),
            events,
        })
    }

    /// Subscribes and snapshots under the session lock. Every event emitted
    /// after the snapshot, and none before it, reaches the receiver.
    pub async fn subscribe_with_snapshot(&self) -> (broadcast::Receiver<ServerMessage>, SessionView) {
        let active = self.session.lock().await;
        (self.events.subscribe(), active.store.view())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerMessage> {
        self.events.subscribe()
    }

    /// Sends an event to every connected socket. Having none is not an error.
    ///
    /// Callers hold the session lock, so events reach sockets in the order the
    /// session changed.
    pub(crate) fn emit(&self, message: ServerMessage) {
        let _ = self.events.send(message);
    }

    pub async fn view(&self) -> SessionView {
        self.session.lock().await.store.view()
    }

    /// Replaces the staged file and cancels whatever was running. For images
    /// the preview is encoded off the async runtime and applied only if the
    /// same file is still staged when it is ready.
    pub async fn stage_file(self: &Arc<Self>, file: StagedFile) -> SessionView {
        let kind = file.kind();
        let (generation, view) = {
            let mut active = self.session.lock().await;
            active.cancel_cycle();
            let generation = active.store.stage(file.clone());
            self.emit(ServerMessage::FileStaged {
                file_name: file.name.clone(),
                kind,
            });
            (generation, active.store.view())
        };

        if kind == Some(FileKind::Image) {
            let app_state = Arc::clone(self);
            tokio::spawn(async move {
                let StagedFile {
                    mime_type, bytes, ..
                } = file;
                let encoded = tokio::task::spawn_blocking(move || {
                    format!("data:{};base64,{}", mime_type, STANDARD.encode(&bytes))
                })
                .await;

                match encoded {
                    Ok(preview) => {
                        let mut active = app_state.session.lock().await;
                        if active.store.apply_preview(generation, preview.clone()) {
                            app_state.emit(ServerMessage::PreviewReady { preview });
                        }
                    }
                    Err(e) => error!("Preview encoding task failed: {}", e),
                }
            });
        }
        view
    }

    /// Starts a processing cycle for the staged file and returns immediately.
    /// Results arrive as events and in later snapshots.
    pub async fn trigger(self: &Arc<Self>, prompt: Option<String>) -> PipelineResult<SessionView> {
        let (generation, file, token, view) = {
            let mut active = self.session.lock().await;
            active.cancel_cycle();
            let started = active.store.begin_processing();
            match started {
                Ok((generation, file)) => {
                    self.emit(ServerMessage::ProcessingStarted {
                        file_name: file.name.clone(),
                    });
                    let token = active.cancellation_token.clone();
                    (generation, file, token, active.store.view())
                }
                Err(err) => {
                    if let Some(notice) = active.store.notice() {
                        self.emit(ServerMessage::Failed {
                            message: notice.message(),
                        });
                    }
                    warn!("Processing was not started: {}", err);
                    return Err(err);
                }
            }
        };

        let app_state = Arc::clone(self);
        tokio::spawn(processing_process(app_state, generation, file, prompt, token));
        Ok(view)
    }

    pub async fn edit_record(
        &self,
        id: RecordId,
        record: StudentRecord,
    ) -> PipelineResult<TrackedRecord> {
        let mut active = self.session.lock().await;
        let updated = active.store.edit_record(id, record)?;
        info!(id = %updated.id, "Record updated");
        self.emit(ServerMessage::RecordUpdated {
            record: updated.clone(),
        });
        Ok(updated)
    }

    pub async fn edit_record_at(
        &self,
        position: usize,
        record: StudentRecord,
    ) -> PipelineResult<TrackedRecord> {
        let mut active = self.session.lock().await;
        let updated = active.store.edit_record_at(position, record)?;
        info!(id = %updated.id, position, "Record updated");
        self.emit(ServerMessage::RecordUpdated {
            record: updated.clone(),
        });
        Ok(updated)
    }

    /// Clears the staged file and every result, cancelling any running cycle.
    pub async fn reset(&self) -> SessionView {
        let mut active = self.session.lock().await;
        active.cancel_cycle();
        active.store.reset();
        self.emit(ServerMessage::SessionReset);
        active.store.view()
    }

    /// Renders the current source list, named after the staged file. An
    /// empty list still exports.
    pub async fn export(&self, format: ExportFormat) -> Result<ExportedFile, ApiError> {
        let (records, prefix) = {
            let active = self.session.lock().await;
            let staged_name = active.store.staged().map(|file| file.name.as_str());
            let prefix = export::download_prefix(staged_name, &self.config.export_filename_prefix);
            (active.store.export_records(), prefix)
        };
        export::render(format, &records, &prefix)
    }
}

