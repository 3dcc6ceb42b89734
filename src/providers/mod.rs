/*!
 * Translator backend implementations.
 *
 * This module contains the clients for the supported translation services:
 * - Gemini: generative model answering with a JSON array
 * - DeepL: machine translation engine
 * - Mock: scripted backend for tests
 */

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

use crate::app_config::{TranslationConfig, TranslationProvider};
use crate::errors::ProviderError;
use crate::translation::glossary::AnnotationStyle;

/// One string inside a batch request
#[derive(Debug, Clone, PartialEq)]
pub struct BackendItem {
    /// Item id, echoed back in the result
    pub id: usize,

    /// Source text, already carrying the glossary span when terms matched
    pub text: String,

    /// Existing translation to validate instead of translating from scratch
    pub existing_target: Option<String>,

    /// Whether glossary terms were found in the source
    pub glossary_matched: bool,
}

/// A batch of strings for one backend call
#[derive(Debug, Clone, PartialEq)]
pub struct BatchRequest {
    pub items: Vec<BackendItem>,
    pub source_language: String,
    pub target_language: String,
    pub model: String,
}

/// Translation of one item
#[derive(Debug, Clone, PartialEq)]
pub struct BackendResult {
    pub id: usize,
    pub translation: String,
    /// 0-100
    pub confidence: u8,
    pub critique: Option<String>,
}

/// Common trait for all translation backends
///
/// A call either returns exactly one result per request item or fails as a
/// unit; partial batches are never produced.
#[async_trait]
pub trait TranslatorBackend: Send + Sync + Debug {
    /// Translate (or validate) every item of the batch using one credential
    async fn translate_batch(
        &self,
        request: &BatchRequest,
        credential: &str,
    ) -> Result<Vec<BackendResult>, ProviderError>;

    /// Backend name for logs
    fn name(&self) -> &str;

    /// How the glossary span must be wrapped for this backend
    fn annotation_style(&self) -> AnnotationStyle;
}

/// Reject empty credentials before any request is made
pub fn require_credential(credential: &str) -> Result<&str, ProviderError> {
    let credential = credential.trim();
    if credential.is_empty() {
        return Err(ProviderError::MissingCredential(
            "no API key configured for the active backend".to_string(),
        ));
    }
    Ok(credential)
}

/// Match results to request items by id, in request order
///
/// A missing id, an unknown id, or a count mismatch fails the whole batch.
pub fn align_results(
    request: &BatchRequest,
    results: Vec<BackendResult>,
) -> Result<Vec<BackendResult>, ProviderError> {
    if results.len() != request.items.len() {
        return Err(ProviderError::Transport(format!(
            "expected {} results, got {}",
            request.items.len(),
            results.len()
        )));
    }

    let mut by_id: HashMap<usize, BackendResult> =
        results.into_iter().map(|r| (r.id, r)).collect();

    request
        .items
        .iter()
        .map(|item| {
            by_id.remove(&item.id).ok_or_else(|| {
                ProviderError::Transport(format!("response is missing item {}", item.id))
            })
        })
        .collect()
}

/// Clamp a model-reported confidence to 0-100
pub fn clamp_confidence(value: Option<f64>, default: u8) -> u8 {
    match value {
        Some(v) if v.is_finite() => v.round().clamp(0.0, 100.0) as u8,
        _ => default,
    }
}

/// Create the backend selected by the configuration
pub fn create_backend(config: &TranslationConfig) -> Arc<dyn TranslatorBackend> {
    let endpoint = config.get_endpoint();
    let timeout_secs = config.get_timeout_secs();

    match config.provider {
        TranslationProvider::Gemini => Arc::new(gemini::GeminiBackend::new(
            endpoint,
            timeout_secs,
            config.common.temperature,
        )),
        TranslationProvider::DeepL => Arc::new(deepl::DeepLBackend::new(endpoint, timeout_secs)),
    }
}

pub mod gemini;
pub mod deepl;
pub mod mock;
