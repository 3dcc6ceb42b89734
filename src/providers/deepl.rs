/*!
 * DeepL backend.
 *
 * DeepL is a pure translation engine: it has no notion of confidence or
 * critique. Confidence is derived from whether glossary terms applied, and
 * validation compares the existing translation against the mandated terms.
 */

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use super::{require_credential, BackendResult, BatchRequest, TranslatorBackend};
use crate::errors::ProviderError;
use crate::language_utils;
use crate::translation::glossary::{AnnotationStyle, GlossaryInjector, ENGINE_IGNORE_TAG};

/// Confidence when the source carried glossary terms
const GLOSSARY_CONFIDENCE: u8 = 95;

/// Confidence for everything else
const PLAIN_CONFIDENCE: u8 = 80;

const FREE_ENDPOINT: &str = "https://api-free.deepl.com";
const PRO_ENDPOINT: &str = "https://api.deepl.com";

/// DeepL client
#[derive(Debug)]
pub struct DeepLBackend {
    /// HTTP client for API requests
    client: Client,
    /// API base URL; empty picks the free or pro host from the key
    endpoint: String,
}

#[derive(Debug, Serialize)]
struct TranslateRequest<'a> {
    text: Vec<&'a str>,
    target_lang: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    source_lang: Option<String>,
    tag_handling: &'static str,
    ignore_tags: Vec<&'static str>,
}

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    translations: Vec<Translation>,
}

#[derive(Debug, Deserialize)]
struct Translation {
    text: String,
}

impl DeepLBackend {
    /// Create a new DeepL client
    pub fn new(endpoint: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(timeout_secs))
                .build()
                .unwrap_or_default(),
            endpoint: endpoint.into(),
        }
    }

    /// `{endpoint}/v2/translate`, with free keys (`:fx`) routed to the free host
    fn api_url(&self, credential: &str) -> Result<Url, ProviderError> {
        let base = if !self.endpoint.trim().is_empty() {
            self.endpoint.trim_end_matches('/')
        } else if credential.ends_with(":fx") {
            FREE_ENDPOINT
        } else {
            PRO_ENDPOINT
        };

        let url = format!("{}/v2/translate", base);
        Url::parse(&url)
            .map_err(|e| ProviderError::Transport(format!("Invalid DeepL endpoint '{}': {}", url, e)))
    }

    fn build_body<'a>(request: &'a BatchRequest) -> Result<TranslateRequest<'a>, ProviderError> {
        let target_lang = language_utils::deepl_target_code(&request.target_language)
            .map_err(|e| ProviderError::UnsupportedLanguage(format!("DeepL target: {}", e)))?;
        let source_lang = language_utils::normalize_to_part1_or_part2t(&request.source_language)
            .ok()
            .map(|code| code.to_uppercase());

        Ok(TranslateRequest {
            text: request.items.iter().map(|item| item.text.as_str()).collect(),
            target_lang,
            source_lang,
            tag_handling: "xml",
            ignore_tags: vec![ENGINE_IGNORE_TAG],
        })
    }

    /// Turn engine output into results, applying validation for items with
    /// an existing translation
    pub(crate) fn build_results(
        request: &BatchRequest,
        translations: Vec<String>,
    ) -> Result<Vec<BackendResult>, ProviderError> {
        if translations.len() != request.items.len() {
            return Err(ProviderError::Transport(format!(
                "expected {} translations, got {}",
                request.items.len(),
                translations.len()
            )));
        }

        let results = request
            .items
            .iter()
            .zip(translations)
            .map(|(item, translated)| {
                let confidence = if item.glossary_matched {
                    GLOSSARY_CONFIDENCE
                } else {
                    PLAIN_CONFIDENCE
                };

                let existing = item
                    .existing_target
                    .as_deref()
                    .filter(|t| !t.trim().is_empty());

                match existing {
                    None => BackendResult {
                        id: item.id,
                        translation: translated,
                        confidence,
                        critique: None,
                    },
                    Some(existing) => {
                        let missing = missing_glossary_terms(&item.text, existing);
                        if missing.is_empty() {
                            BackendResult {
                                id: item.id,
                                translation: existing.to_string(),
                                confidence: GLOSSARY_CONFIDENCE,
                                critique: None,
                            }
                        } else {
                            BackendResult {
                                id: item.id,
                                translation: translated,
                                confidence,
                                critique: Some(format!(
                                    "Existing translation does not use the glossary terms: {}",
                                    missing.join(", ")
                                )),
                            }
                        }
                    }
                }
            })
            .collect();

        Ok(results)
    }
}

/// Glossary translations from the annotated source that the target lacks
fn missing_glossary_terms(annotated_source: &str, target: &str) -> Vec<String> {
    let target = target.to_lowercase();
    GlossaryInjector::annotated_terms(annotated_source)
        .into_iter()
        .filter(|(_, translation)| !target.contains(&translation.to_lowercase()))
        .map(|(term, translation)| format!("{} → {}", term, translation))
        .collect()
}

#[async_trait]
impl TranslatorBackend for DeepLBackend {
    async fn translate_batch(
        &self,
        request: &BatchRequest,
        credential: &str,
    ) -> Result<Vec<BackendResult>, ProviderError> {
        let credential = require_credential(credential)?;
        let url = self.api_url(credential)?;
        let body = Self::build_body(request)?;
        debug!("DeepL request: {} items to {}", request.items.len(), body.target_lang);

        let response = self
            .client
            .post(url)
            .header("Authorization", format!("DeepL-Auth-Key {}", credential))
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(format!("Failed to send request to DeepL API: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ProviderError::Transport(format!("Failed to read DeepL response: {}", e)))?;

        if !status.is_success() {
            error!("DeepL API error ({}): {}", status, text);
            return Err(ProviderError::from_status(status.as_u16(), &text));
        }

        let parsed: TranslateResponse = serde_json::from_str(&text)
            .map_err(|e| ProviderError::Transport(format!("Failed to parse DeepL response: {}", e)))?;

        Self::build_results(
            request,
            parsed.translations.into_iter().map(|t| t.text).collect(),
        )
    }

    fn name(&self) -> &str {
        "deepl"
    }

    fn annotation_style(&self) -> AnnotationStyle {
        AnnotationStyle::Engine
    }
}
