//! services/api/src/web/protocol.rs
//!
//! Defines the WebSocket message protocol between the API server and the browser.
//! The browser drives the session over REST; the socket only carries progress.

use register_assistant_core::{FileKind, SessionView, TrackedRecord};
use serde::Serialize;

//=========================================================================================
// Messages Sent FROM the Server TO the Client (Browser)
//=========================================================================================

/// Represents the structured text messages the server can send to the client.
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Sent once when the socket connects, so the UI can render current state.
    Snapshot { session: SessionView },

    /// A new file replaced whatever was staged before. All derived state is gone.
    FileStaged {
        file_name: String,
        kind: Option<FileKind>,
    },

    /// The image preview for the staged file is available as a data URL.
    PreviewReady { preview: String },

    /// The user triggered processing; extraction is running.
    ProcessingStarted { file_name: String },

    /// Extraction finished with a non-empty list; the reveal is starting.
    ExtractionFinished { total: usize },

    /// The record at `index` is being processed. The UI can show a progress bar.
    RecordProcessing { index: usize, total: usize },

    /// The record at `index` is now part of the revealed list.
    RecordRevealed {
        index: usize,
        total: usize,
        record: TrackedRecord,
    },

    /// Every record has been revealed.
    Completed { total: usize },

    /// The cycle succeeded without finding any records.
    NoDataFound { message: String },

    /// The cycle failed. The UI should display the message.
    Failed { message: String },

    /// A record was edited.
    RecordUpdated { record: TrackedRecord },

    /// The staged file and all results were cleared.
    SessionReset,
}
