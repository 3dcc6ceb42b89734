/*!
 * Gemini backend.
 *
 * Sends the whole batch as one JSON prompt and asks the model for a JSON
 * array of `{id, translation, confidence, critique}` via a response schema.
 */

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use url::Url;

use super::{align_results, clamp_confidence, require_credential};
use super::{BackendResult, BatchRequest, TranslatorBackend};
use crate::errors::ProviderError;
use crate::language_utils;
use crate::translation::glossary::AnnotationStyle;

/// Confidence assumed when the model omits one
const DEFAULT_CONFIDENCE: u8 = 80;

const SYSTEM_PROMPT: &str = "You are a professional game and software localizer. \
Translate every input string from {source_language} into {target_language}. \
Some strings start with a [[GLOSSARY: term=translation; ...]] marker: translate those \
terms exactly as given and never copy the marker into your answer. \
Keep placeholders, tags, escape sequences and leading/trailing whitespace intact. \
When an item has an \"existing\" translation, review it instead: return it unchanged if it \
is accurate, fluent and respects the glossary, otherwise return a corrected text and explain \
the problem in \"critique\". \
Answer with one object per input id. \"confidence\" is your 0-100 estimate of the quality \
of the returned translation.";

/// Gemini client
#[derive(Debug)]
pub struct GeminiBackend {
    /// HTTP client for API requests
    client: Client,
    /// API base URL
    endpoint: String,
    /// Sampling temperature
    temperature: f32,
}

/// One string as presented to the model
#[derive(Debug, Serialize)]
struct PromptItem<'a> {
    id: usize,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    existing: Option<&'a str>,
}

/// One element of the model's JSON answer
#[derive(Debug, Deserialize)]
struct ModelItem {
    id: usize,
    translation: String,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    critique: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

impl GeminiBackend {
    /// Create a new Gemini client
    pub fn new(endpoint: impl Into<String>, timeout_secs: u64, temperature: f32) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(timeout_secs))
                .build()
                .unwrap_or_default(),
            endpoint: endpoint.into(),
            temperature,
        }
    }

    /// `{endpoint}/v1beta/models/{model}:generateContent`
    fn api_url(&self, model: &str) -> Result<Url, ProviderError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.endpoint.trim_end_matches('/'),
            model
        );
        Url::parse(&url)
            .map_err(|e| ProviderError::Transport(format!("Invalid Gemini endpoint '{}': {}", url, e)))
    }

    /// Build the generateContent request body
    pub(crate) fn build_body(&self, request: &BatchRequest) -> Value {
        let source_language = language_utils::get_language_name(&request.source_language)
            .unwrap_or_else(|_| request.source_language.clone());
        let target_language = language_utils::get_language_name(&request.target_language)
            .unwrap_or_else(|_| request.target_language.clone());

        let system = SYSTEM_PROMPT
            .replace("{source_language}", &source_language)
            .replace("{target_language}", &target_language);

        let items: Vec<PromptItem<'_>> = request
            .items
            .iter()
            .map(|item| PromptItem {
                id: item.id,
                text: &item.text,
                existing: item.existing_target.as_deref(),
            })
            .collect();
        let payload = serde_json::to_string(&items).unwrap_or_else(|_| "[]".to_string());

        json!({
            "systemInstruction": { "parts": [{ "text": system }] },
            "contents": [{ "role": "user", "parts": [{ "text": payload }] }],
            "generationConfig": {
                "temperature": self.temperature,
                "responseMimeType": "application/json",
                "responseSchema": {
                    "type": "ARRAY",
                    "items": {
                        "type": "OBJECT",
                        "properties": {
                            "id": { "type": "INTEGER" },
                            "translation": { "type": "STRING" },
                            "confidence": { "type": "NUMBER" },
                            "critique": { "type": "STRING" }
                        },
                        "required": ["id", "translation"]
                    }
                }
            }
        })
    }

    /// Extract per-item results from a generateContent response body
    pub(crate) fn parse_response(body: &str) -> Result<Vec<BackendResult>, ProviderError> {
        let response: GenerateContentResponse = serde_json::from_str(body)
            .map_err(|e| ProviderError::Transport(format!("Undecodable Gemini response: {}", e)))?;

        let candidate = response.candidates.into_iter().next().ok_or_else(|| {
            ProviderError::Transport(format!(
                "Gemini returned no candidates (feedback: {})",
                response
                    .prompt_feedback
                    .map(|f| f.to_string())
                    .unwrap_or_else(|| "none".to_string())
            ))
        })?;

        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();
        if text.trim().is_empty() {
            return Err(ProviderError::Transport(format!(
                "Gemini returned an empty answer (finish reason: {})",
                candidate.finish_reason.unwrap_or_else(|| "unknown".to_string())
            )));
        }

        let items: Vec<ModelItem> = serde_json::from_str(strip_code_fence(&text))
            .map_err(|e| ProviderError::Transport(format!("Model answer is not the expected JSON: {}", e)))?;

        Ok(items
            .into_iter()
            .map(|item| BackendResult {
                id: item.id,
                translation: item.translation,
                confidence: clamp_confidence(item.confidence, DEFAULT_CONFIDENCE),
                critique: item.critique.filter(|c| !c.trim().is_empty()),
            })
            .collect())
    }
}

/// Models occasionally wrap JSON in a markdown fence despite the mime type
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    match trimmed.strip_prefix("```") {
        Some(rest) => {
            let rest = rest.strip_prefix("json").unwrap_or(rest);
            rest.strip_suffix("```").unwrap_or(rest).trim()
        }
        None => trimmed,
    }
}

#[async_trait]
impl TranslatorBackend for GeminiBackend {
    async fn translate_batch(
        &self,
        request: &BatchRequest,
        credential: &str,
    ) -> Result<Vec<BackendResult>, ProviderError> {
        let credential = require_credential(credential)?;
        let url = self.api_url(&request.model)?;
        debug!("Gemini request: {} items with model {}", request.items.len(), request.model);

        let response = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .header("x-goog-api-key", credential)
            .json(&self.build_body(request))
            .send()
            .await
            .map_err(|e| ProviderError::Transport(format!("Failed to send request to Gemini API: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::Transport(format!("Failed to read Gemini response: {}", e)))?;

        if !status.is_success() {
            error!("Gemini API error ({}): {}", status, body);
            return Err(ProviderError::from_status(status.as_u16(), &body));
        }

        align_results(request, Self::parse_response(&body)?)
    }

    fn name(&self) -> &str {
        "gemini"
    }

    fn annotation_style(&self) -> AnnotationStyle {
        AnnotationStyle::Generative
    }
}
