//! crates/register_assistant_core/src/ingest.rs
//!
//! Dispatches a staged file to the path that can turn it into raw record
//! objects. Nothing here touches the session; the caller wires results in.

use crate::domain::{FileKind, StagedFile};
use crate::error::{PipelineError, PipelineResult};
use crate::gateway::{into_record_objects, ExtractionGateway};
use chrono::NaiveDate;
use serde_json::Value;
use tracing::{info, warn};

const XLSX_UNSUPPORTED: &str = "Failed to parse XLSX as simple JSON. For complex XLSX, a dedicated \
library and binary reading method is needed. Please use image or JSON for now, or ensure XLSX is a \
very simple, text-convertible format.";

#[derive(Clone)]
pub struct IngestionRouter {
    gateway: ExtractionGateway,
}

impl IngestionRouter {
    pub fn new(gateway: ExtractionGateway) -> Self {
        Self { gateway }
    }

    /// Resolves a staged file into raw, not yet normalized, record objects.
    /// `user_prompt` only applies to images.
    pub async fn ingest(
        &self,
        file: &StagedFile,
        user_prompt: Option<&str>,
        today: NaiveDate,
    ) -> PipelineResult<Vec<Value>> {
        let kind = file
            .kind()
            .ok_or_else(|| PipelineError::UnsupportedType(file.type_label().to_string()))?;
        info!(file = %file.name, ?kind, "Ingesting staged file");

        match kind {
            FileKind::Image => {
                self.gateway
                    .extract_raw(&file.bytes, &file.mime_type, user_prompt, today)
                    .await
            }
            FileKind::Json => parse_json(&file.bytes),
            FileKind::Xlsx => parse_xlsx_as_text(&file.bytes),
        }
    }
}

fn parse_json(bytes: &[u8]) -> PipelineResult<Vec<Value>> {
    let text = std::str::from_utf8(bytes).map_err(|e| PipelineError::read("JSON", e))?;
    let value: Value = serde_json::from_str(text).map_err(|e| {
        PipelineError::format(format!(
            "Invalid JSON format. Expected an array of student objects ({e})."
        ))
    })?;
    into_record_objects(value).ok_or_else(|| {
        PipelineError::format("Invalid JSON format. Expected an array of student objects.")
    })
}

/// XLSX support is intentionally degraded: the file's text is tried as JSON.
/// A real spreadsheet (binary OOXML) always lands in the error branch.
fn parse_xlsx_as_text(bytes: &[u8]) -> PipelineResult<Vec<Value>> {
    let parsed = std::str::from_utf8(bytes)
        .ok()
        .and_then(|text| serde_json::from_str::<Value>(text).ok())
        .and_then(into_record_objects);
    parsed.ok_or_else(|| {
        warn!("Could not parse XLSX as JSON directly; file is probably binary");
        PipelineError::format(XLSX_UNSUPPORTED)
    })
}
