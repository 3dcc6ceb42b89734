/*!
 * Mock backend implementation for testing.
 *
 * The mock records every call and can be scripted to fail:
 * - `MockBackend::working()` - Always succeeds
 * - `MockBackend::failing(error)` - Always fails with the given error
 * - `fail_next` / `fail_credential` / `fail_on_call` - Queued, per-credential
 *   or per-call-number failures
 */

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::{align_results, require_credential, BackendResult, BatchRequest, TranslatorBackend};
use crate::errors::ProviderError;
use crate::translation::glossary::{AnnotationStyle, GlossaryInjector};

/// Confidence reported by the mock unless overridden
pub const MOCK_CONFIDENCE: u8 = 90;

/// Behavior mode for the mock backend
#[derive(Debug, Clone, PartialEq)]
pub enum MockBehavior {
    /// Always succeeds
    Working,
    /// Always fails with the given error
    Failing(ProviderError),
    /// Drops the last result of every batch
    ShortResponse,
}

/// One recorded backend call
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub credential: String,
    pub ids: Vec<usize>,
    /// Texts exactly as sent, glossary span included
    pub texts: Vec<String>,
    pub existing_targets: Vec<Option<String>>,
}

type CallHook = Box<dyn Fn(usize) + Send + Sync>;

/// Scripted backend for tests
pub struct MockBackend {
    behavior: MockBehavior,
    style: AnnotationStyle,
    /// Source text (span stripped) → translation
    dictionary: HashMap<String, String>,
    confidence: u8,
    /// Answer with the glossary span still in place
    echo_annotation: bool,
    /// Failures consumed one per call, before anything else applies
    scripted: Mutex<VecDeque<ProviderError>>,
    /// Failures for a credential, with how many calls remain
    credential_failures: Mutex<HashMap<String, (ProviderError, usize)>>,
    /// Failures keyed by 1-based call number
    call_failures: Mutex<HashMap<usize, ProviderError>>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
    request_count: Arc<AtomicUsize>,
    /// Invoked with the 1-based call number, before the answer is produced
    on_call: Option<CallHook>,
}

impl fmt::Debug for MockBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockBackend")
            .field("behavior", &self.behavior)
            .field("style", &self.style)
            .field("calls", &self.request_count.load(Ordering::SeqCst))
            .finish()
    }
}

impl MockBackend {
    /// Create a new mock backend with the specified behavior
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            style: AnnotationStyle::Generative,
            dictionary: HashMap::new(),
            confidence: MOCK_CONFIDENCE,
            echo_annotation: false,
            scripted: Mutex::new(VecDeque::new()),
            credential_failures: Mutex::new(HashMap::new()),
            call_failures: Mutex::new(HashMap::new()),
            calls: Arc::new(Mutex::new(Vec::new())),
            request_count: Arc::new(AtomicUsize::new(0)),
            on_call: None,
        }
    }

    /// Create a working mock backend that always succeeds
    pub fn working() -> Self {
        Self::new(MockBehavior::Working)
    }

    /// Create a mock backend that always fails with `error`
    pub fn failing(error: ProviderError) -> Self {
        Self::new(MockBehavior::Failing(error))
    }

    /// Use the given annotation style
    pub fn with_style(mut self, style: AnnotationStyle) -> Self {
        self.style = style;
        self
    }

    /// Translate `source` as `translation`
    pub fn with_translation(mut self, source: impl Into<String>, translation: impl Into<String>) -> Self {
        self.dictionary.insert(source.into(), translation.into());
        self
    }

    /// Report this confidence for every result
    pub fn with_confidence(mut self, confidence: u8) -> Self {
        self.confidence = confidence;
        self
    }

    /// Leave the glossary span in the answers
    pub fn echoing_annotation(mut self) -> Self {
        self.echo_annotation = true;
        self
    }

    /// Run `hook` with the call number at the start of every call
    pub fn with_call_hook(mut self, hook: impl Fn(usize) + Send + Sync + 'static) -> Self {
        self.on_call = Some(Box::new(hook));
        self
    }

    /// Fail the next call with `error`; queued failures apply in order
    pub fn fail_next(&self, error: ProviderError) {
        self.scripted.lock().push_back(error);
    }

    /// Fail the next `times` calls made with `credential`
    pub fn fail_credential(&self, credential: &str, error: ProviderError, times: usize) {
        self.credential_failures
            .lock()
            .insert(credential.to_string(), (error, times));
    }

    /// Fail the `call_number`-th call (1-based), whatever credential it uses
    pub fn fail_on_call(&self, call_number: usize, error: ProviderError) {
        self.call_failures.lock().insert(call_number, error);
    }

    /// Number of calls made so far
    pub fn call_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Every call made so far, in order
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    /// Credentials used, in call order
    pub fn credentials_used(&self) -> Vec<String> {
        self.calls.lock().iter().map(|c| c.credential.clone()).collect()
    }

    fn take_credential_failure(&self, credential: &str) -> Option<ProviderError> {
        let mut failures = self.credential_failures.lock();
        let (error, remaining) = failures.get_mut(credential)?;
        if *remaining == 0 {
            return None;
        }
        *remaining -= 1;
        Some(error.clone())
    }

    fn answer(&self, request: &BatchRequest) -> Vec<BackendResult> {
        request
            .items
            .iter()
            .map(|item| {
                let stripped = GlossaryInjector::strip(&item.text);
                let translation = match item.existing_target.as_deref().filter(|t| !t.trim().is_empty()) {
                    Some(existing) => existing.to_string(),
                    None => self
                        .dictionary
                        .get(stripped.trim())
                        .cloned()
                        .unwrap_or_else(|| format!("{}:{}", request.target_language, stripped)),
                };
                let translation = if self.echo_annotation && item.text != stripped {
                    let span_len = item.text.len() - stripped.len();
                    format!("{}{}", &item.text[..span_len], translation)
                } else {
                    translation
                };

                BackendResult {
                    id: item.id,
                    translation,
                    confidence: self.confidence,
                    critique: None,
                }
            })
            .collect()
    }
}

#[async_trait]
impl TranslatorBackend for MockBackend {
    async fn translate_batch(
        &self,
        request: &BatchRequest,
        credential: &str,
    ) -> Result<Vec<BackendResult>, ProviderError> {
        let count = self.request_count.fetch_add(1, Ordering::SeqCst) + 1;
        self.calls.lock().push(RecordedCall {
            credential: credential.to_string(),
            ids: request.items.iter().map(|i| i.id).collect(),
            texts: request.items.iter().map(|i| i.text.clone()).collect(),
            existing_targets: request.items.iter().map(|i| i.existing_target.clone()).collect(),
        });

        if let Some(hook) = &self.on_call {
            hook(count);
        }

        require_credential(credential)?;

        if let Some(error) = self.take_credential_failure(credential) {
            return Err(error);
        }
        if let Some(error) = self.call_failures.lock().remove(&count) {
            return Err(error);
        }
        if let Some(error) = self.scripted.lock().pop_front() {
            return Err(error);
        }

        match &self.behavior {
            MockBehavior::Working => align_results(request, self.answer(request)),
            MockBehavior::Failing(error) => Err(error.clone()),
            MockBehavior::ShortResponse => {
                let mut results = self.answer(request);
                results.pop();
                align_results(request, results)
            }
        }
    }

    fn name(&self) -> &str {
        "mock"
    }

    fn annotation_style(&self) -> AnnotationStyle {
        self.style
    }
}
