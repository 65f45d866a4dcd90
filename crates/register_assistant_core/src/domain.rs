//! crates/register_assistant_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! The serialized field names match the register import/export format.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One row of extracted register data. Every field is a plain string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentRecord {
    #[serde(rename = "RollNumber")]
    pub roll_number: String,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Mobile")]
    pub mobile: String,
    #[serde(rename = "Gmail")]
    pub email: String,
    #[serde(rename = "Password")]
    pub password: String,
    #[serde(rename = "FatherName")]
    pub father_name: String,
    #[serde(rename = "MotherName")]
    pub mother_name: String,
    #[serde(rename = "Class")]
    pub class_name: String,
    #[serde(rename = "Address")]
    pub address: String,
    #[serde(rename = "PhotoURL")]
    pub photo_url: String,
    #[serde(rename = "Aadhar")]
    pub national_id: String,
    #[serde(rename = "Gender")]
    pub gender: String,
    #[serde(rename = "RegistrationDate")]
    pub registration_date: String,
}

impl StudentRecord {
    /// Column headers in canonical field order.
    pub const FIELD_NAMES: [&'static str; 13] = [
        "RollNumber",
        "Name",
        "Mobile",
        "Gmail",
        "Password",
        "FatherName",
        "MotherName",
        "Class",
        "Address",
        "PhotoURL",
        "Aadhar",
        "Gender",
        "RegistrationDate",
    ];

    /// Field values in the same order as [`StudentRecord::FIELD_NAMES`].
    pub fn values(&self) -> [&str; 13] {
        [
            &self.roll_number,
            &self.name,
            &self.mobile,
            &self.email,
            &self.password,
            &self.father_name,
            &self.mother_name,
            &self.class_name,
            &self.address,
            &self.photo_url,
            &self.national_id,
            &self.gender,
            &self.registration_date,
        ]
    }
}

/// Known gender values. Anything else non-blank is kept as free text.
pub const KNOWN_GENDERS: [&str; 4] = ["Male", "Female", "Other", "Not Specified"];

/// A synthetic identifier assigned when a record enters the session.
/// It is independent of the roll number, which users may leave duplicated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub Uuid);

impl RecordId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A record as held by the session: the data plus its stable id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackedRecord {
    pub id: RecordId,
    #[serde(flatten)]
    pub record: StudentRecord,
}

/// The file currently selected by the user, not yet submitted for processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    pub name: String,
    pub mime_type: String,
    pub bytes: Bytes,
}

impl StagedFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes: bytes.into(),
        }
    }

    /// Determines which ingestion path handles this file.
    pub fn kind(&self) -> Option<FileKind> {
        FileKind::detect(&self.name, &self.mime_type)
    }

    /// The label used in user-facing messages about this file's type.
    pub fn type_label(&self) -> &str {
        if self.mime_type.is_empty() {
            &self.name
        } else {
            &self.mime_type
        }
    }
}

pub const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    Image,
    Json,
    Xlsx,
}

impl FileKind {
    pub fn detect(name: &str, mime_type: &str) -> Option<Self> {
        let name = name.to_ascii_lowercase();
        if mime_type.starts_with("image/") {
            Some(Self::Image)
        } else if mime_type == "application/json" || name.ends_with(".json") {
            Some(Self::Json)
        } else if mime_type == XLSX_MIME || name.ends_with(".xlsx") {
            Some(Self::Xlsx)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_kind_by_mime_then_extension() {
        assert_eq!(FileKind::detect("scan.png", "image/png"), Some(FileKind::Image));
        assert_eq!(FileKind::detect("x.bin", "application/json"), Some(FileKind::Json));
        assert_eq!(FileKind::detect("ROSTER.JSON", ""), Some(FileKind::Json));
        assert_eq!(FileKind::detect("roster.xlsx", "application/octet-stream"), Some(FileKind::Xlsx));
        assert_eq!(FileKind::detect("notes.docx", "application/msword"), None);
    }

    #[test]
    fn type_label_falls_back_to_name() {
        let file = StagedFile::new("notes.docx", "", Vec::new());
        assert_eq!(file.type_label(), "notes.docx");
    }

    #[test]
    fn tracked_record_serializes_flat() {
        let record = serde_json::from_value::<StudentRecord>(serde_json::json!({
            "RollNumber": "1", "Name": "A", "Mobile": "9", "Gmail": "a@b", "Password": "p",
            "FatherName": "f", "MotherName": "m", "Class": "c", "Address": "ad",
            "PhotoURL": "https://x", "Aadhar": "1", "Gender": "Male", "RegistrationDate": "2024-01-01"
        }))
        .unwrap();
        let tracked = TrackedRecord { id: RecordId::new(), record };
        let value = serde_json::to_value(&tracked).unwrap();
        assert_eq!(value["Name"], "A");
        assert!(value["id"].is_string());
    }
}
