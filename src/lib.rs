/*!
 * # locbatch - batch translation of localization files
 *
 * A Rust library that walks a queue of CSV localization files and
 * translates their rows in batches through an external backend.
 *
 * ## Features
 *
 * - Tolerant CSV ingestion with header detection
 * - Translation through pluggable backends:
 *   - Gemini (generative, with confidence and critique per row)
 *   - DeepL (machine translation engine)
 * - Translation memory shared across runs
 * - Glossary injection with whole-word term matching
 * - Credential rotation with cooldown on rate limits
 * - Persisted progress, resumable after interruption
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `app_config`: Configuration management
 * - `row_parser`: CSV reading and writing
 * - `translation`: The translation pipeline:
 *   - `translation::orchestrator`: Queue-walking state machine
 *   - `translation::memory`: Translation memory
 *   - `translation::glossary`: Glossary terms and injection
 *   - `translation::events`: Progress reporting
 * - `providers`: Backend clients (`gemini`, `deepl`, `mock`)
 * - `database`: SQLite persistence
 * - `file_utils`: File system operations
 * - `app_controller`: Main application controller
 * - `language_utils`: ISO language code utilities
 * - `errors`: Custom error types for the application
 *
 * ## License
 *
 * This project is licensed under the MIT License
 */

// Global lints configuration
// These lints will be allowed but not auto-fixed
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod app_config;
pub mod app_controller;
pub mod database;
pub mod errors;
pub mod file_utils;
pub mod language_utils;
pub mod providers;
pub mod row_parser;
pub mod translation;

// Re-export main types for easier usage
pub use app_config::Config;
pub use errors::{OrchestratorError, ProviderError, RowParseError};
pub use language_utils::get_language_name;
pub use providers::TranslatorBackend;
pub use translation::{BatchOrchestrator, FileStatus, ItemStatus, TranslationItem};
