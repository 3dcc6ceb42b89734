/*!
 * Error types for the locbatch application.
 *
 * This module contains custom error types for the different layers of the
 * translation pipeline, using the thiserror crate for ergonomic error definitions.
 */

use thiserror::Error;

/// Errors that can occur when calling a translation backend
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// Request rate exceeded for the current credential
    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    /// Hard plan limit reached for the current credential
    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),

    /// Credential rejected by the backend
    #[error("Authentication error: {0}")]
    AuthFailed(String),

    /// No usable credential was supplied
    #[error("Missing credential: {0}")]
    MissingCredential(String),

    /// The backend cannot translate into the requested language
    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),

    /// Network failure, unexpected status or undecodable response
    #[error("Transport error: {0}")]
    Transport(String),
}

impl ProviderError {
    /// Whether rotating credentials or waiting can recover from this error
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, Self::RateLimited(_) | Self::QuotaExceeded(_))
    }

    /// Whether this error invalidates the whole run
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::AuthFailed(_) | Self::MissingCredential(_) | Self::UnsupportedLanguage(_)
        )
    }

    /// Classify a non-success HTTP status returned by a backend
    pub fn from_status(status: u16, body: &str) -> Self {
        let lower = body.to_lowercase();
        match status {
            401 | 403 => Self::AuthFailed(format!("HTTP {}: {}", status, body)),
            429 if lower.contains("quota") || lower.contains("resource_exhausted") => {
                Self::QuotaExceeded(format!("HTTP {}: {}", status, body))
            }
            429 => Self::RateLimited(format!("HTTP {}: {}", status, body)),
            456 => Self::QuotaExceeded(format!("HTTP {}: {}", status, body)),
            _ => Self::Transport(format!("HTTP {}: {}", status, body)),
        }
    }
}

/// Errors raised while turning raw CSV text into rows
#[derive(Error, Debug)]
pub enum RowParseError {
    /// The tokenizer rejected the input
    #[error("Malformed CSV: {0}")]
    Malformed(String),

    /// The file has no header row
    #[error("CSV file has no header row")]
    MissingHeader,
}

impl From<csv::Error> for RowParseError {
    fn from(error: csv::Error) -> Self {
        Self::Malformed(error.to_string())
    }
}

/// Errors that escape the batch orchestrator
#[derive(Error, Debug)]
pub enum OrchestratorError {
    /// Missing or rejected credential, or an unusable language; the run cannot continue
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The persistent store failed to read or write
    #[error("Storage error: {0}")]
    Storage(String),

    /// No queued file carries this name
    #[error("Unknown file: {0}")]
    UnknownFile(String),

    /// The file has no item with this id
    #[error("Unknown item {id} in file {file}")]
    UnknownItem { file: String, id: usize },
}

impl From<anyhow::Error> for OrchestratorError {
    fn from(error: anyhow::Error) -> Self {
        Self::Storage(format!("{:#}", error))
    }
}

impl From<ProviderError> for OrchestratorError {
    fn from(error: ProviderError) -> Self {
        Self::Configuration(error.to_string())
    }
}
