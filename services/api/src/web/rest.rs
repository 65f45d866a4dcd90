//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::{error::ApiError, export::ExportFormat, web::state::AppState};
use axum::{
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json},
};
use bytes::Bytes;
use register_assistant_core::{PipelineError, RecordId, StagedFile, StudentRecord};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info};
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        stage_file_handler,
        process_handler,
        session_handler,
        edit_record_handler,
        edit_record_at_handler,
        reset_handler,
        export_handler,
    ),
    components(
        schemas(ProcessRequest)
    ),
    tags(
        (name = "Register Assistant API", description = "Upload a student register, extract its records and export them.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Payload Structs
//=========================================================================================

/// Optional body of a processing request.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ProcessRequest {
    /// Replaces the built-in extraction prompt for images. Blank means default.
    #[serde(default)]
    pub prompt: Option<String>,
}

type Rejection = (StatusCode, String);

fn pipeline_rejection(err: PipelineError) -> Rejection {
    let status = match &err {
        PipelineError::NoFileStaged => StatusCode::CONFLICT,
        PipelineError::RecordNotFound(_) => StatusCode::NOT_FOUND,
        PipelineError::UnsupportedType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        PipelineError::Format(_) => StatusCode::UNPROCESSABLE_ENTITY,
        PipelineError::Read { .. } => StatusCode::BAD_REQUEST,
        PipelineError::Configuration(_) => StatusCode::SERVICE_UNAVAILABLE,
        PipelineError::Service { .. } | PipelineError::ResponseFormat(_) => {
            StatusCode::BAD_GATEWAY
        }
    };
    (status, err.to_string())
}

fn export_rejection(err: ApiError) -> Rejection {
    error!("Export failed: {}", err);
    (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Stage a file for processing.
///
/// Accepts a multipart/form-data request. The part named `file`, or else the
/// first part carrying a file name, replaces whatever was staged before.
#[utoipa::path(
    post,
    path = "/files",
    request_body(content_type = "multipart/form-data", description = "An image, JSON or XLSX file."),
    responses(
        (status = 201, description = "File staged; returns the session snapshot"),
        (status = 400, description = "The form did not contain a readable file"),
        (status = 413, description = "The file exceeds the upload limit")
    )
)]
pub async fn stage_file_handler(
    State(app_state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, Rejection> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| (e.status(), format!("Failed to read multipart data: {}", e)))?
    {
        if field.name() != Some("file") && field.file_name().is_none() {
            continue;
        }
        let name = field.file_name().unwrap_or("upload").to_string();
        let mime_type = field.content_type().unwrap_or_default().to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| (e.status(), format!("Failed to read file bytes: {}", e)))?;

        info!(file = %name, size = data.len(), "Upload received");
        let view = app_state
            .stage_file(StagedFile::new(name, mime_type, data))
            .await;
        return Ok((StatusCode::CREATED, Json(view)));
    }

    Err((
        StatusCode::BAD_REQUEST,
        "Multipart form must include a file".to_string(),
    ))
}

/// Start processing the staged file.
///
/// Returns as soon as the cycle has started. Progress is pushed over `/ws`
/// and is visible in `GET /session`.
#[utoipa::path(
    post,
    path = "/process",
    request_body(content = ProcessRequest, description = "Optional prompt override"),
    responses(
        (status = 202, description = "Processing started; returns the session snapshot"),
        (status = 400, description = "Malformed request body"),
        (status = 409, description = "No file is staged"),
        (status = 415, description = "The staged file type cannot be processed")
    )
)]
pub async fn process_handler(
    State(app_state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<impl IntoResponse, Rejection> {
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        ProcessRequest::default()
    } else {
        serde_json::from_slice::<ProcessRequest>(&body).map_err(|e| {
            (
                StatusCode::BAD_REQUEST,
                format!("Invalid processing request: {}", e),
            )
        })?
    };

    let view = app_state
        .trigger(request.prompt)
        .await
        .map_err(pipeline_rejection)?;
    Ok((StatusCode::ACCEPTED, Json(view)))
}

/// Read the current session snapshot.
#[utoipa::path(
    get,
    path = "/session",
    responses((status = 200, description = "The session snapshot"))
)]
pub async fn session_handler(State(app_state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(app_state.view().await)
}

/// Replace a record by its id. The roll number cannot be changed once set.
#[utoipa::path(
    put,
    path = "/records/{id}",
    params(("id" = Uuid, Path, description = "The record's id")),
    request_body(content_type = "application/json", description = "The full edited record"),
    responses(
        (status = 200, description = "The updated record"),
        (status = 404, description = "No record has this id")
    )
)]
pub async fn edit_record_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(record): Json<StudentRecord>,
) -> Result<impl IntoResponse, Rejection> {
    let updated = app_state
        .edit_record(RecordId(id), record)
        .await
        .map_err(pipeline_rejection)?;
    Ok(Json(updated))
}

/// Replace the record shown at a position of the revealed list.
#[utoipa::path(
    put,
    path = "/records/at/{position}",
    params(("position" = usize, Path, description = "Zero-based position in the revealed list")),
    request_body(content_type = "application/json", description = "The full edited record"),
    responses(
        (status = 200, description = "The updated record"),
        (status = 404, description = "Nothing is revealed at this position")
    )
)]
pub async fn edit_record_at_handler(
    State(app_state): State<Arc<AppState>>,
    Path(position): Path<usize>,
    Json(record): Json<StudentRecord>,
) -> Result<impl IntoResponse, Rejection> {
    let updated = app_state
        .edit_record_at(position, record)
        .await
        .map_err(pipeline_rejection)?;
    Ok(Json(updated))
}

/// Clear the staged file and every result.
#[utoipa::path(
    delete,
    path = "/session",
    responses((status = 200, description = "The cleared session snapshot"))
)]
pub async fn reset_handler(State(app_state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(app_state.reset().await)
}

/// Download the current record list as `json`, `xlsx` or `html`.
#[utoipa::path(
    get,
    path = "/export/{format}",
    params(("format" = String, Path, description = "One of json, xlsx, html")),
    responses(
        (status = 200, description = "The exported file as an attachment"),
        (status = 404, description = "Unknown export format")
    )
)]
pub async fn export_handler(
    State(app_state): State<Arc<AppState>>,
    Path(format): Path<String>,
) -> Result<impl IntoResponse, Rejection> {
    let format: ExportFormat = format
        .parse()
        .map_err(|e: ApiError| (StatusCode::NOT_FOUND, e.to_string()))?;
    let exported = app_state.export(format).await.map_err(export_rejection)?;

    let disposition = format!("attachment; filename=\"{}\"", exported.file_name);
    Ok((
        [
            (header::CONTENT_TYPE, exported.content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        exported.bytes,
    ))
}
