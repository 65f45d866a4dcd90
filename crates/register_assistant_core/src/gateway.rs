//! crates/register_assistant_core/src/gateway.rs
//!
//! Wraps the external vision service: builds the instruction prompt, sends one
//! request, and turns the untyped response into validated record objects.

use crate::domain::StudentRecord;
use crate::error::{PipelineError, PipelineResult, ServiceErrorKind};
use crate::normalize::normalize;
use crate::ports::{ExtractionService, PortError};
use chrono::NaiveDate;
use regex::Regex;
use serde_json::Value;
use std::sync::{Arc, OnceLock};
use tracing::{error, info};

#[derive(Clone)]
pub struct ExtractionGateway {
    service: Option<Arc<dyn ExtractionService>>,
}

impl ExtractionGateway {
    pub fn new(service: Arc<dyn ExtractionService>) -> Self {
        Self {
            service: Some(service),
        }
    }

    /// A gateway with no credential behind it. Every call fails with
    /// [`PipelineError::Configuration`] without contacting the provider.
    pub fn unconfigured() -> Self {
        Self { service: None }
    }

    pub fn is_configured(&self) -> bool {
        self.service.is_some()
    }

    /// Runs one extraction and returns the raw record objects, in response order.
    pub async fn extract_raw(
        &self,
        image: &[u8],
        mime_type: &str,
        user_prompt: Option<&str>,
        today: NaiveDate,
    ) -> PipelineResult<Vec<Value>> {
        let service = self.service.as_ref().ok_or_else(|| {
            PipelineError::Configuration("Gemini API Key is not configured.".to_string())
        })?;

        let prompt = match user_prompt.map(str::trim) {
            Some(custom) if !custom.is_empty() => custom.to_string(),
            _ => default_prompt(today),
        };

        info!(bytes = image.len(), mime_type, "Sending image to extraction service");
        let response = service
            .extract_records(image, mime_type, &prompt)
            .await
            .map_err(|e| {
                error!("Extraction service call failed: {}", e);
                service_error(e)
            })?;

        let records = parse_response(&response)?;
        info!(count = records.len(), "Extraction service returned records");
        Ok(records)
    }

    /// Like [`ExtractionGateway::extract_raw`], with every element normalized
    /// using its array index.
    pub async fn extract(
        &self,
        image: &[u8],
        mime_type: &str,
        user_prompt: Option<&str>,
        today: NaiveDate,
    ) -> PipelineResult<Vec<StudentRecord>> {
        let raw = self.extract_raw(image, mime_type, user_prompt, today).await?;
        Ok(raw
            .iter()
            .enumerate()
            .map(|(index, item)| normalize(item, index, today))
            .collect())
    }
}

fn service_error(err: PortError) -> PipelineError {
    let (kind, message) = match err {
        PortError::Unauthorized(message) => (ServiceErrorKind::Auth, message),
        PortError::QuotaExceeded(message) => (ServiceErrorKind::Quota, message),
        PortError::Unexpected(message) => (classify_message(&message), message),
    };
    PipelineError::Service { kind, message }
}

/// Sorts a provider message by the substrings providers use for quota and
/// credential problems.
pub fn classify_message(message: &str) -> ServiceErrorKind {
    if message.contains("quota") {
        ServiceErrorKind::Quota
    } else if message.contains("API key") {
        ServiceErrorKind::Auth
    } else {
        ServiceErrorKind::Other
    }
}

fn parse_response(response: &str) -> PipelineResult<Vec<Value>> {
    let body = strip_code_fence(response);
    let parsed: Value = serde_json::from_str(body)
        .map_err(|e| PipelineError::ResponseFormat(format!("response was not valid JSON ({e})")))?;
    into_record_objects(parsed).ok_or_else(|| {
        PipelineError::ResponseFormat("the response was not an array of objects".to_string())
    })
}

/// Removes a surrounding Markdown code fence, if the whole body is fenced.
pub fn strip_code_fence(text: &str) -> &str {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    let fence = FENCE.get_or_init(|| {
        Regex::new(r"(?s)^```(\w*)?\s*\n?(.*?)\n?\s*```$").expect("fence pattern is valid")
    });
    let trimmed = text.trim();
    match fence.captures(trimmed).and_then(|captures| captures.get(2)) {
        Some(inner) if !inner.as_str().is_empty() => inner.as_str().trim(),
        _ => trimmed,
    }
}

/// Accepts only a top-level array whose elements are all objects.
pub(crate) fn into_record_objects(value: Value) -> Option<Vec<Value>> {
    match value {
        Value::Array(items) if items.iter().all(Value::is_object) => Some(items),
        _ => None,
    }
}

/// The instruction prompt used when the user does not supply one.
pub fn default_prompt(today: NaiveDate) -> String {
    let current_date = today.format("%Y-%m-%d").to_string();
    let year = &current_date[..4];
    format!(
        r#"
Analyze the provided image, which could be a student register, a single student's form, or a list.
Identify each student and extract the following information. If a piece of information is missing or unclear from the image, YOU MUST GENERATE HIGHLY REALISTIC DATA for that field. The generated data should look authentic and not like obvious placeholders (e.g., avoid "Example Street", "Placeholder Name").

Mandatory fields for each student object:
- RollNumber: (string) CRITICAL: This MUST be a simple numerical string (e.g., "1", "25", "101").
    - If the image shows "Roll No: 5, Class: 10A", extract ONLY "5".
    - If the image shows "S.No: 3", use "3".
    - If the image contains "ID: 123", use "123".
    - This field MUST NOT contain any class, section, prefixes like "Roll No:", or other descriptive text. It must be ONLY numerals.
    - If no clear numerical roll number is found, generate a unique, simple, sequential numerical placeholder starting from "001" ("001", "002", "003", ... for multiple students).
- Name: (string) Full name. If missing, generate a common, realistic full name (e.g., "Riya Sharma", "Arjun Patel").
- Mobile: (string) 10-digit mobile number. If missing, generate a realistic Indian mobile number (e.g., "9876543210").
- Gmail: (string) Email address. If missing, generate based on the Name and RollNumber (e.g., "riya.sharma.023@example.com").
- Password: (string) Generate a realistic password combining parts of their name, roll, and year (e.g., "{year}[LASTNAMELOWER][ROLLNUMBER]").
- FatherName: (string) Full name. If missing, generate a common, realistic full name for a father (e.g., "Mr. Suresh Kumar Sharma").
- MotherName: (string) Full name. If missing, generate a common, realistic full name for a mother (e.g., "Mrs. Lakshmi Devi Patel").
- Class: (string) Class and section (e.g., "10th A", "XII Commerce"). If missing, generate a common class name.
- Address: (string) Full address. If missing, generate a realistic-sounding address (e.g., "12B, Park View Apartments, MG Road, Bangalore, 560001").
- PhotoURL: (string) URL of a photo. If missing or not an image URL, use "https://picsum.photos/seed/[NUMERIC_ROLLNUMBER]/120/120".
- Aadhar: (string) 12-digit Aadhar number. If missing, generate a realistic-looking 12-digit number.
- Gender: (string) Options: "Male", "Female", "Other", "Not Specified". Infer if possible, otherwise use "Not Specified".
- RegistrationDate: (string, format YYYY-MM-DD) If missing, use a plausible recent date like "{current_date}".

Return the data as a JSON array of objects. Each object MUST represent a student and have keys EXACTLY matching the field names above.
Ensure all fields are present and populated for every student.
The response MUST be ONLY the JSON array, without any other text, comments, or markdown.
If the image contains no discernible student data, return an empty JSON array [].
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::PortResult;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct CannedService {
        response: Mutex<Option<PortResult<String>>>,
        last_prompt: Mutex<Option<String>>,
    }

    impl CannedService {
        fn new(response: PortResult<String>) -> Arc<Self> {
            Arc::new(Self {
                response: Mutex::new(Some(response)),
                last_prompt: Mutex::new(None),
            })
        }
    }

    #[async_trait]
    impl ExtractionService for CannedService {
        async fn extract_records(&self, _image: &[u8], _mime: &str, prompt: &str) -> PortResult<String> {
            *self.last_prompt.lock().unwrap() = Some(prompt.to_string());
            self.response
                .lock()
                .unwrap()
                .take()
                .unwrap_or_else(|| Err(PortError::Unexpected("called twice".into())))
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 14).unwrap()
    }

    #[test]
    fn strips_fences_with_and_without_language() {
        assert_eq!(strip_code_fence("```json\n[1]\n```"), "[1]");
        assert_eq!(strip_code_fence("```\n[]\n```"), "[]");
        assert_eq!(strip_code_fence("  [{\"a\":1}]  "), "[{\"a\":1}]");
    }

    #[tokio::test]
    async fn fenced_array_is_parsed_and_normalized() {
        let service = CannedService::new(Ok("```json\n[{\"Name\":\"Asha\"},{\"RollNumber\":\"12\"}]\n```".into()));
        let gateway = ExtractionGateway::new(service);
        let records = gateway.extract(b"img", "image/png", None, today()).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "Asha");
        assert_eq!(records[0].roll_number, "001");
        assert_eq!(records[1].roll_number, "12");
    }

    #[tokio::test]
    async fn non_array_response_is_a_format_error() {
        let gateway = ExtractionGateway::new(CannedService::new(Ok("{\"students\": []}".into())));
        let err = gateway.extract_raw(b"img", "image/png", None, today()).await.unwrap_err();
        assert!(matches!(err, PipelineError::ResponseFormat(_)));

        let gateway = ExtractionGateway::new(CannedService::new(Ok("I could not read it".into())));
        let err = gateway.extract_raw(b"img", "image/png", None, today()).await.unwrap_err();
        assert!(matches!(err, PipelineError::ResponseFormat(_)));

        let gateway = ExtractionGateway::new(CannedService::new(Ok("[1, 2]".into())));
        let err = gateway.extract_raw(b"img", "image/png", None, today()).await.unwrap_err();
        assert!(matches!(err, PipelineError::ResponseFormat(_)));
    }

    #[tokio::test]
    async fn custom_prompt_is_sent_verbatim_and_blank_prompt_falls_back() {
        let service = CannedService::new(Ok("[]".into()));
        let gateway = ExtractionGateway::new(service.clone());
        gateway
            .extract_raw(b"img", "image/png", Some("List names only"), today())
            .await
            .unwrap();
        assert_eq!(service.last_prompt.lock().unwrap().as_deref(), Some("List names only"));

        let service = CannedService::new(Ok("[]".into()));
        let gateway = ExtractionGateway::new(service.clone());
        gateway.extract_raw(b"img", "image/png", Some("   "), today()).await.unwrap();
        let prompt = service.last_prompt.lock().unwrap().clone().unwrap();
        assert!(prompt.contains("RollNumber"));
        assert!(prompt.contains("2026-10-14"));
    }

    #[tokio::test]
    async fn provider_errors_are_classified() {
        let cases = [
            (PortError::QuotaExceeded("limit".into()), ServiceErrorKind::Quota),
            (PortError::Unauthorized("bad key".into()), ServiceErrorKind::Auth),
            (PortError::Unexpected("API key not valid".into()), ServiceErrorKind::Auth),
            (PortError::Unexpected("You exceeded your quota".into()), ServiceErrorKind::Quota),
            (PortError::Unexpected("connection reset".into()), ServiceErrorKind::Other),
        ];
        for (port_error, expected) in cases {
            let gateway = ExtractionGateway::new(CannedService::new(Err(port_error)));
            match gateway.extract_raw(b"img", "image/png", None, today()).await {
                Err(PipelineError::Service { kind, .. }) => assert_eq!(kind, expected),
                other => panic!("unexpected result: {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn unconfigured_gateway_fails_before_calling_out() {
        let gateway = ExtractionGateway::unconfigured();
        assert!(!gateway.is_configured());
        let err = gateway.extract_raw(b"img", "image/png", None, today()).await.unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));
    }
}
