//! services/api/src/adapters/extraction_llm.rs
//!
//! This module contains the adapter for the vision model that reads register images.
//! It implements the `ExtractionService` port from the `core` crate, talking to
//! Gemini through its OpenAI-compatible chat completions endpoint.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestMessageContentPartImageArgs,
        ChatCompletionRequestMessageContentPartTextArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs, ImageDetail, ImageUrlArgs, ResponseFormat,
    },
    Client,
};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use register_assistant_core::ports::{ExtractionService, PortError, PortResult};
use tracing::debug;

/// Slightly above deterministic so synthesized fields look varied.
const TEMPERATURE: f32 = 0.5;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `ExtractionService` using an OpenAI-compatible vision model.
#[derive(Clone)]
pub struct GeminiExtractionAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl GeminiExtractionAdapter {
    /// Creates a new `GeminiExtractionAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }

    /// Builds a client for `api_base` authenticated with `api_key`.
    pub fn from_credentials(api_key: &str, api_base: &str, model: String) -> Self {
        let config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(api_base);
        Self::new(Client::with_config(config), model)
    }
}

//=========================================================================================
// `ExtractionService` Trait Implementation
//=========================================================================================

#[async_trait]
impl ExtractionService for GeminiExtractionAdapter {
    /// Sends the image, inlined as a base64 data URL, together with the prompt.
    async fn extract_records(
        &self,
        image: &[u8],
        mime_type: &str,
        prompt: &str,
    ) -> PortResult<String> {
        let data_url = format!("data:{};base64,{}", mime_type, STANDARD.encode(image));

        let message = ChatCompletionRequestUserMessageArgs::default()
            .content(vec![
                ChatCompletionRequestMessageContentPartImageArgs::default()
                    .image_url(
                        ImageUrlArgs::default()
                            .url(data_url)
                            .detail(ImageDetail::High)
                            .build()
                            .map_err(|e| PortError::Unexpected(e.to_string()))?,
                    )
                    .build()
                    .map_err(|e| PortError::Unexpected(e.to_string()))?
                    .into(),
                ChatCompletionRequestMessageContentPartTextArgs::default()
                    .text(prompt)
                    .build()
                    .map_err(|e| PortError::Unexpected(e.to_string()))?
                    .into(),
            ])
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        let messages: Vec<ChatCompletionRequestMessage> = vec![message.into()];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(TEMPERATURE)
            .n(1)
            // Gemini maps this to a JSON mime type, which still allows a top-level array.
            .response_format(ResponseFormat::JsonObject)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        debug!(model = %self.model, "Requesting structured extraction");
        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(classify_provider_error)?;

        // Extract the text content from the first choice in the response.
        match response.choices.into_iter().next() {
            Some(choice) => choice.message.content.ok_or_else(|| {
                PortError::Unexpected("Extraction response contained no text content.".to_string())
            }),
            None => Err(PortError::Unexpected(
                "Extraction model returned no choices in its response.".to_string(),
            )),
        }
    }
}

/// Maps provider failures onto the port's error kinds by inspecting the message.
fn classify_provider_error(err: OpenAIError) -> PortError {
    let message = match &err {
        OpenAIError::ApiError(api_error) => api_error.message.clone(),
        other => other.to_string(),
    };
    if message.contains("quota") {
        PortError::QuotaExceeded(message)
    } else if message.contains("API key") {
        PortError::Unauthorized(message)
    } else {
        PortError::Unexpected(message)
    }
}
