use chrono::{DateTime, Utc};
use ratatui::crossterm::event::KeyEvent;

use crate::api::{EmbedResponse, GenerateResponse, ListModelResponse, SharedError};
use crate::core::ids::ComponentId;

/// Everything that flows through the event loop.
///
/// Messages addressed to a component carry its `id`; components ignore
/// messages meant for someone else, so every message can be offered to
/// every component.
#[derive(Debug, Clone)]
pub enum Msg {
    Key(KeyEvent),
    Resize {
        width: u16,
        height: u16,
    },
    SpinnerTick {
        id: ComponentId,
        tag: u64,
    },

    StartGenerate {
        id: ComponentId,
    },
    StopGenerate {
        id: ComponentId,
    },
    /// A decoded stream line from a generation worker. Only the owning
    /// session consumes these.
    GenerateChunk {
        id: ComponentId,
        request: u64,
        chunk: GenerateResponse,
    },
    /// A generation worker failed. Only the owning session consumes these.
    GenerateFailed {
        id: ComponentId,
        request: u64,
        error: SharedError,
    },
    /// Partial text, re-emitted by the session after it has been appended.
    GenerateResponse {
        id: ComponentId,
        created_at: DateTime<Utc>,
        response: String,
    },
    /// Terminal event for a generation. On failure `response` is empty and
    /// `done_reason` holds the error text.
    GenerateDone {
        id: ComponentId,
        created_at: DateTime<Utc>,
        response: String,
        done_reason: String,
        context: Option<Vec<i64>>,
    },

    StartEmbed {
        id: ComponentId,
    },
    StopEmbed {
        id: ComponentId,
    },
    EmbedResponse {
        id: ComponentId,
        request: u64,
        created_at: DateTime<Utc>,
        response: EmbedResponse,
    },
    EmbedError {
        id: ComponentId,
        request: u64,
        created_at: DateTime<Utc>,
        error: SharedError,
    },

    FetchModelList {
        id: ComponentId,
    },
    ModelListResponse {
        id: ComponentId,
        host: String,
        models: Vec<ListModelResponse>,
    },
    ModelListError {
        id: ComponentId,
        host: String,
        error: SharedError,
    },
    ModelSelected {
        id: ComponentId,
        host: String,
        selection: ListModelResponse,
    },
    ChooserAborted {
        id: ComponentId,
        error: Option<SharedError>,
    },
}
