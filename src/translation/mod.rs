/*!
 * Batch translation of localization rows.
 *
 * This module contains the translation pipeline. It is split into several
 * submodules:
 *
 * - `model`: Files, rows and their statuses
 * - `memory`: Translation memory keyed by trimmed source text
 * - `glossary`: Glossary terms and their injection into backend requests
 * - `events`: Progress events and sinks
 * - `orchestrator`: The queue-walking state machine
 */

// Re-export main types for easier usage
pub use self::events::{NoopSink, OrchestratorEvent, ProgressSink, RecordingSink};
pub use self::glossary::{AnnotationStyle, Glossary, GlossaryInjector};
pub use self::memory::TranslationMemory;
pub use self::model::{FileEntry, FileStatus, ItemStatus, RunState, RunSummary, TranslationItem};
pub use self::orchestrator::{BatchOrchestrator, EnqueueOutcome, OrchestratorSettings, StopHandle};

// Submodules
pub mod events;
pub mod glossary;
pub mod memory;
pub mod model;
pub mod orchestrator;
