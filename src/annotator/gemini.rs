//! Gemini `generateContent` client

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};

use super::classify::{RemoteFailure, classify_failure};
use super::{Annotator, MISSING_CREDENTIAL, prompt};
use crate::config::AnnotatorConfig;
use crate::error::{AnnotateError, Result};
use crate::types::{CaptionLength, ImageSource};

/// Header carrying the API key on Google AI Studio endpoints
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Annotator backed by the Gemini REST API
#[derive(Clone)]
pub struct GeminiAnnotator {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    temperature: f32,
    top_p: f32,
}

impl std::fmt::Debug for GeminiAnnotator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiAnnotator")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    system_instruction: Content,
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
enum Part {
    InlineData(InlineData),
    Text(String),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl GenerateContentResponse {
    /// Concatenated text parts of the first candidate
    fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content
            .parts
            .iter()
            .filter_map(|part| part.text.as_deref())
            .collect();
        (!text.trim().is_empty()).then_some(text)
    }
}

impl GeminiAnnotator {
    /// Build a client from the annotator configuration
    ///
    /// # Errors
    ///
    /// Returns [`Error::Network`](crate::Error::Network) if the HTTP client
    /// cannot be constructed (e.g. TLS backend initialisation fails).
    pub fn new(config: &AnnotatorConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            http,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            top_p: config.top_p,
        })
    }

    fn url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.endpoint, self.model
        )
    }

    fn request_body(&self, image: &ImageSource, length: CaptionLength) -> GenerateContentRequest {
        let data = base64::engine::general_purpose::STANDARD.encode(&image.bytes);
        GenerateContentRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part::Text(prompt::system_instruction(length))],
            },
            contents: vec![Content {
                role: Some("user"),
                parts: vec![
                    Part::InlineData(InlineData {
                        mime_type: image.mime_type.clone(),
                        data,
                    }),
                    Part::Text(prompt::user_prompt(length)),
                ],
            }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
                top_p: self.top_p,
            },
        }
    }
}

#[async_trait]
impl Annotator for GeminiAnnotator {
    async fn annotate(
        &self,
        image: &ImageSource,
        length: CaptionLength,
        credential: &str,
    ) -> std::result::Result<String, AnnotateError> {
        if credential.trim().is_empty() {
            return Err(AnnotateError::Config(MISSING_CREDENTIAL.to_string()));
        }

        tracing::debug!(
            file_name = %image.file_name,
            model = %self.model,
            bytes = image.bytes.len(),
            length = length.label(),
            "Requesting caption"
        );

        let response = self
            .http
            .post(self.url())
            .header(API_KEY_HEADER, credential)
            .json(&self.request_body(image, length))
            .send()
            .await
            .map_err(|e| classify_failure(RemoteFailure::transport(e.to_string())))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| classify_failure(RemoteFailure::transport(e.to_string())))?;

        if !status.is_success() {
            return Err(classify_failure(RemoteFailure::from_response(
                status.as_u16(),
                &body,
            )));
        }

        let parsed: GenerateContentResponse =
            serde_json::from_str(&body).map_err(|e| AnnotateError::Remote {
                message: format!("Malformed response from captioning service: {e}"),
            })?;

        parsed.text().ok_or(AnnotateError::EmptyResult)
    }

    fn name(&self) -> &'static str {
        "gemini"
    }
}
