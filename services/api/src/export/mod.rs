//! services/api/src/export/mod.rs
//!
//! Renders the session's source-of-truth list into downloadable documents.

pub mod html;
pub mod xlsx;

use crate::error::ApiError;
use register_assistant_core::StudentRecord;
use std::path::Path;
use std::str::FromStr;

pub const SHEET_NAME: &str = "Students";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Xlsx,
    Html,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Xlsx => "xlsx",
            ExportFormat::Html => "html",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            ExportFormat::Json => "application/json",
            ExportFormat::Xlsx => register_assistant_core::domain::XLSX_MIME,
            ExportFormat::Html => "text/html; charset=utf-8",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "xlsx" => Ok(ExportFormat::Xlsx),
            "html" => Ok(ExportFormat::Html),
            other => Err(ApiError::Export(format!("unknown export format '{other}'"))),
        }
    }
}

/// A rendered document ready to be sent as a download.
#[derive(Debug, Clone)]
pub struct ExportedFile {
    pub file_name: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

pub fn render(
    format: ExportFormat,
    records: &[StudentRecord],
    filename_prefix: &str,
) -> Result<ExportedFile, ApiError> {
    let bytes = match format {
        ExportFormat::Json => to_json(records)?.into_bytes(),
        ExportFormat::Xlsx => xlsx::to_xlsx(records, SHEET_NAME)
            .map_err(|e| ApiError::Export(e.to_string()))?,
        ExportFormat::Html => html::to_html(records, &filename_prefix.replace('_', " "))?.into_bytes(),
    };
    let file_name = match format {
        ExportFormat::Html => format!("{}_report.{}", filename_prefix, format.extension()),
        _ => format!("{}.{}", filename_prefix, format.extension()),
    };
    Ok(ExportedFile {
        file_name,
        content_type: format.content_type(),
        bytes,
    })
}

/// Download names follow the staged file's stem, e.g. `class_9a.png` gives
/// `class_9a`. Without a usable stem the configured `fallback` is used.
pub fn download_prefix(staged_name: Option<&str>, fallback: &str) -> String {
    let stem: String = staged_name
        .and_then(|name| Path::new(name).file_stem())
        .map(|stem| stem.to_string_lossy())
        .unwrap_or_default()
        .chars()
        .filter(|c| !c.is_control() && !matches!(*c, '"' | '\\' | '/'))
        .collect();
    match stem.trim() {
        "" => fallback.to_string(),
        trimmed => trimmed.to_string(),
    }
}

/// Pretty-printed JSON array, readable again by the JSON import path.
pub fn to_json(records: &[StudentRecord]) -> Result<String, ApiError> {
    serde_json::to_string_pretty(records).map_err(|e| ApiError::Export(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_formats_case_insensitively() {
        assert_eq!("JSON".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
        assert_eq!("xlsx".parse::<ExportFormat>().unwrap(), ExportFormat::Xlsx);
        assert!("csv".parse::<ExportFormat>().is_err());
    }

    #[test]
    fn file_name_uses_prefix_and_extension() {
        let file = render(ExportFormat::Json, &[], "student_data").unwrap();
        assert_eq!(file.file_name, "student_data.json");
        assert_eq!(file.content_type, "application/json");
        assert_eq!(String::from_utf8(file.bytes).unwrap(), "[]");
    }

    #[test]
    fn html_report_gets_a_report_suffix() {
        let file = render(ExportFormat::Html, &[], "class_9a").unwrap();
        assert_eq!(file.file_name, "class_9a_report.html");
    }

    #[test]
    fn download_prefix_comes_from_the_staged_file_stem() {
        assert_eq!(download_prefix(Some("class_9a.png"), "student_data"), "class_9a");
        assert_eq!(download_prefix(Some("roster.backup.json"), "student_data"), "roster.backup");
        assert_eq!(download_prefix(Some("say\"hi\".json"), "student_data"), "sayhi");
        assert_eq!(download_prefix(Some(".json"), "student_data"), ".json");
        assert_eq!(download_prefix(None, "student_data"), "student_data");
        assert_eq!(download_prefix(Some("  .  "), "student_data"), "student_data");
    }
}
