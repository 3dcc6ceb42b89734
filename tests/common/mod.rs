/*!
 * Common test utilities for the locbatch test suite
 */

use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use locbatch::database::Repository;
use locbatch::providers::mock::MockBackend;
use locbatch::translation::{BatchOrchestrator, Glossary, OrchestratorSettings, TranslationMemory};

/// Five rows, none translated
pub const SAMPLE_CSV: &str = "key,source,target
greeting,Hello,
farewell,Goodbye,
menu.start,Start game,
menu.quit,Quit,
menu.options,Options,
";

/// Routes `log` output to the test harness, set RUST_LOG to see it
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Creates a temporary directory for test files
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// Creates a test file with the given content in the specified directory
pub fn create_test_file(dir: &Path, filename: &str, content: &str) -> Result<PathBuf> {
    let file_path = dir.join(filename);
    if let Some(parent) = file_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&file_path, content)?;
    Ok(file_path)
}

/// Settings without any waiting, two rows per batch
pub fn fast_settings() -> OrchestratorSettings {
    OrchestratorSettings {
        source_language: "en".to_string(),
        target_language: "uk".to_string(),
        model: "mock".to_string(),
        batch_size: 2,
        inter_batch_delay: Duration::ZERO,
        transport_delay: Duration::ZERO,
        transport_retry_limit: 2,
        cooldown: Duration::ZERO,
        quota_cooldown: Duration::ZERO,
        memory_min_confidence: 0,
    }
}

/// Orchestrator over `repo`, loading its memory and glossary
pub fn orchestrator_on(
    repo: &Repository,
    backend: Arc<MockBackend>,
    credentials: &[&str],
    settings: OrchestratorSettings,
) -> BatchOrchestrator {
    init_logging();
    let memory = TranslationMemory::load(repo.clone()).unwrap();
    let glossary = Glossary::load(repo).unwrap();
    BatchOrchestrator::new(
        repo.clone(),
        memory,
        glossary,
        backend,
        credentials.iter().map(|c| c.to_string()).collect(),
        settings,
    )
    .unwrap()
}

/// Orchestrator over a fresh in-memory store with a single credential
pub fn orchestrator(backend: Arc<MockBackend>) -> (BatchOrchestrator, Repository) {
    init_logging();
    let repo = Repository::new_in_memory().unwrap();
    let orchestrator = orchestrator_on(&repo, backend, &["key-1"], fast_settings());
    (orchestrator, repo)
}

/// Targets of a file's items in row order
pub fn targets(orchestrator: &BatchOrchestrator, name: &str) -> Vec<Option<String>> {
    orchestrator
        .items(name)
        .unwrap()
        .iter()
        .map(|item| item.target.clone())
        .collect()
}
