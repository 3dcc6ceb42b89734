use anyhow::{anyhow, Result};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use log::{error, info, warn};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::app_config::Config;
use crate::database::{DatabaseConnection, Repository};
use crate::file_utils::FileManager;
use crate::providers::{self, TranslatorBackend};
use crate::translation::{
    BatchOrchestrator, EnqueueOutcome, FileEntry, FileStatus, Glossary, NoopSink, OrchestratorEvent,
    OrchestratorSettings, ProgressSink, RunSummary, TranslationMemory,
};

// @module: Application controller for CSV localization runs

/// Main application controller: wires configuration, storage and backend
pub struct Controller {
    // @field: App configuration
    config: Config,

    // @field: Persistent state
    repo: Repository,
}

impl Controller {
    // @method: Create a controller using the configured database location
    pub fn with_config(config: Config) -> Result<Self> {
        let repo = match &config.storage.database_path {
            Some(path) => Repository::new(DatabaseConnection::new(path)?),
            None => Repository::new_default()?,
        };
        Ok(Self { config, repo })
    }

    // @method: Create a controller over an existing repository
    pub fn with_repository(config: Config, repo: Repository) -> Self {
        Self { config, repo }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    /// Build an orchestrator for the configured backend
    pub fn orchestrator(&self) -> Result<BatchOrchestrator> {
        self.orchestrator_with_backend(providers::create_backend(&self.config.translation))
    }

    /// Build an orchestrator around an explicit backend
    pub fn orchestrator_with_backend(&self, backend: Arc<dyn TranslatorBackend>) -> Result<BatchOrchestrator> {
        let memory = TranslationMemory::load(self.repo.clone())?;
        let glossary = Glossary::load(&self.repo)?;

        Ok(BatchOrchestrator::new(
            self.repo.clone(),
            memory,
            glossary,
            backend,
            self.config.translation.get_credentials(),
            OrchestratorSettings::from_config(&self.config),
        )?)
    }

    /// CSV files named by `input_path` with their queue names
    ///
    /// A directory is searched recursively; previous exports are left out.
    /// Queue names are canonical paths, see `FileManager::queue_name`.
    pub fn discover(&self, input_path: &Path) -> Result<Vec<(String, PathBuf)>> {
        let files = if input_path.is_file() {
            vec![input_path.to_path_buf()]
        } else if input_path.is_dir() {
            FileManager::find_csv_files(input_path, &self.config.target_language)?
        } else {
            return Err(anyhow!("Input path does not exist: {:?}", input_path));
        };

        if files.is_empty() {
            warn!("No CSV files found in {:?}", input_path);
        }

        Ok(files
            .into_iter()
            .map(|path| (FileManager::queue_name(&path), path))
            .collect())
    }

    /// Read a file from disk and queue it under `name`
    ///
    /// Invalid UTF-8 is logged and queued as an empty file.
    pub fn enqueue_path(&self, orchestrator: &mut BatchOrchestrator, name: &str, path: &Path) -> Result<EnqueueOutcome> {
        let bytes = FileManager::read_bytes(path)?;
        let text = match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(e) => {
                error!("{} is not valid UTF-8: {}", name, e);
                String::new()
            }
        };
        Ok(orchestrator.enqueue_file(name, &text)?)
    }

    /// Ingest, translate and export
    ///
    /// Only the files found under `input_path` are processed; other queued
    /// files wait for their own invocation. Files whose export already exists
    /// are skipped unless `force_overwrite`. Ctrl-C stops the run after the
    /// batch in flight.
    pub async fn translate(
        &self,
        orchestrator: &mut BatchOrchestrator,
        input_path: &Path,
        output_dir: Option<&Path>,
        force_overwrite: bool,
    ) -> Result<RunSummary> {
        let start_time = std::time::Instant::now();
        let default_dir = if input_path.is_dir() {
            input_path.to_path_buf()
        } else {
            input_path.parent().unwrap_or(Path::new(".")).to_path_buf()
        };
        let output_dir = output_dir.map(Path::to_path_buf).unwrap_or(default_dir);

        let mut exports = Vec::new();
        for (name, path) in self.discover(input_path)? {
            let output_path = self.output_path_for(&path, input_path, &output_dir);
            if output_path.exists() && !force_overwrite {
                warn!(
                    "Skipping {}, translation already exists (use -f to force overwrite)",
                    name
                );
                continue;
            }
            self.enqueue_path(orchestrator, &name, &path)?;
            exports.push((name, output_path));
        }

        let stop = orchestrator.stop_handle();
        let ctrl_c = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Stop requested, finishing the batch in flight...");
                stop.stop();
            }
        });

        info!(
            "locbatch: {} - {} ({} → {})",
            self.config.translation.provider.display_name(),
            self.config.translation.get_model(),
            self.config.source_language,
            self.config.target_language
        );
        let names: Vec<String> = exports.iter().map(|(name, _)| name.clone()).collect();
        let result = orchestrator.run_files(&names).await;
        ctrl_c.abort();
        let summary = result?;

        for (name, output_path) in exports {
            let status = orchestrator
                .files()
                .into_iter()
                .find(|f| f.name == name)
                .map(|f| f.status);
            match status {
                Some(FileStatus::Done) | Some(FileStatus::Error) => {
                    let csv = orchestrator.export_csv(&name)?;
                    FileManager::write_atomic(&output_path, &csv)?;
                    info!("Success: {:?}", output_path);
                }
                _ => warn!("{} was not finished and has not been exported", name),
            }
        }

        info!(
            "Translation finished in {}: {} translated, {} from memory, {} failed",
            Self::format_duration(start_time.elapsed()),
            summary.items_translated,
            summary.items_cached,
            summary.items_failed
        );
        Ok(summary)
    }

    // @generates: Export path, mirroring subdirectories of an ingested folder
    fn output_path_for(&self, file: &Path, input_root: &Path, output_dir: &Path) -> PathBuf {
        let relative_dir = if input_root.is_dir() {
            file.parent()
                .and_then(|p| p.strip_prefix(input_root).ok())
                .map(Path::to_path_buf)
                .unwrap_or_default()
        } else {
            PathBuf::new()
        };
        FileManager::generate_output_path(file, output_dir.join(relative_dir), &self.config.target_language)
    }

    /// Queue snapshot with the number of failed items per file
    pub fn status(&self) -> Result<Vec<(FileEntry, usize)>> {
        Ok(self
            .repo
            .load_queue()?
            .into_iter()
            .map(|(entry, items)| {
                let failed = FileEntry::failed_count(&items);
                (entry, failed)
            })
            .collect())
    }

    /// Queue name for a user-supplied file reference
    ///
    /// An existing path is mapped to its canonical queue name; anything else
    /// is taken as a queue name verbatim.
    pub fn resolve_name(name: &str) -> String {
        if Path::new(name).exists() {
            FileManager::queue_name(name)
        } else {
            name.to_string()
        }
    }

    /// Reset failed items of one file, or of the given items only
    pub fn retry(&self, name: &str, ids: &[usize]) -> Result<usize> {
        let name = &Self::resolve_name(name);
        let mut orchestrator = self.orchestrator()?;
        let reset = if ids.is_empty() {
            orchestrator.retry_file(name)?
        } else {
            orchestrator.retry_items(name, ids)?
        };
        Ok(reset)
    }

    /// Write one queued file as CSV
    pub fn export(&self, name: &str, output_path: &Path) -> Result<()> {
        let name = &Self::resolve_name(name);
        let orchestrator = self.orchestrator()?;
        let csv = orchestrator.export_csv(name)?;
        FileManager::write_atomic(output_path, &csv)
    }

    // =========================================================================
    // Glossary management
    // =========================================================================

    pub fn glossary_add(&self, term: &str, translation: &str) -> Result<()> {
        let term = term.trim();
        if term.is_empty() {
            return Err(anyhow!("Glossary term must not be empty"));
        }
        self.repo.upsert_glossary_term(term, translation.trim())
    }

    pub fn glossary_remove(&self, term: &str) -> Result<bool> {
        self.repo.remove_glossary_term(term.trim())
    }

    pub fn glossary_list(&self) -> Result<Glossary> {
        Glossary::load(&self.repo)
    }

    /// Import `term=translation` lines from a file, returning how many were stored
    pub fn glossary_import(&self, path: &Path) -> Result<usize> {
        let pairs = Glossary::read_pairs_file(path)?;
        for (term, translation) in &pairs {
            self.repo.upsert_glossary_term(term, translation)?;
        }
        Ok(pairs.len())
    }

    // =========================================================================
    // Translation memory management
    // =========================================================================

    pub fn memory(&self) -> Result<TranslationMemory> {
        TranslationMemory::load(self.repo.clone())
    }

    // @formats: Duration as "1h 2m 3s"
    fn format_duration(duration: std::time::Duration) -> String {
        let total_seconds = duration.as_secs();
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let seconds = total_seconds % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}.{:01}s", seconds, duration.subsec_millis() / 100)
        }
    }
}

/// Progress bars for orchestrator events
pub struct IndicatifSink {
    multi_progress: MultiProgress,
    files_bar: Mutex<Option<ProgressBar>>,
    items_bar: Mutex<Option<ProgressBar>>,
}

impl IndicatifSink {
    pub fn new() -> Self {
        Self {
            multi_progress: MultiProgress::new(),
            files_bar: Mutex::new(None),
            items_bar: Mutex::new(None),
        }
    }

    fn style(unit: &str) -> ProgressStyle {
        let template = format!(
            "{{spinner:.green}} [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{pos}}/{{len}} {} ({{percent}}%) {{msg}}",
            unit
        );
        ProgressStyle::default_bar()
            .template(&template)
            .or_else(|_| ProgressStyle::default_bar().template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} ({percent}%) {msg}"))
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓▒░")
    }
}

impl Default for IndicatifSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for IndicatifSink {
    fn on_event(&self, event: &OrchestratorEvent) {
        match event {
            OrchestratorEvent::RunStarted { files } => {
                let bar = self.multi_progress.add(ProgressBar::new(*files as u64));
                bar.set_style(Self::style("files"));
                bar.set_message("Processing files");
                *self.files_bar.lock() = Some(bar);
            }
            OrchestratorEvent::FileStarted { name, total_items, completed_items } => {
                let bar = self.multi_progress.add(ProgressBar::new(*total_items as u64));
                bar.set_style(Self::style("rows"));
                bar.set_position(*completed_items as u64);
                bar.set_message(name.clone());
                if let Some(old) = self.items_bar.lock().replace(bar) {
                    old.finish_and_clear();
                }
            }
            OrchestratorEvent::Progress { completed_items, .. } => {
                if let Some(bar) = self.items_bar.lock().as_ref() {
                    bar.set_position(*completed_items as u64);
                }
            }
            OrchestratorEvent::RateLimited { cooldown: Some(cooldown), .. } => {
                if let Some(bar) = self.items_bar.lock().as_ref() {
                    bar.set_message(format!("cooling down for {}s", cooldown.as_secs()));
                }
            }
            OrchestratorEvent::FileFinished { name, status, failed_items } => {
                if let Some(bar) = self.items_bar.lock().take() {
                    match status {
                        FileStatus::Done => bar.finish_with_message(format!("{} done", name)),
                        _ => bar.finish_with_message(format!("{}: {} failed", name, failed_items)),
                    }
                }
                if let Some(bar) = self.files_bar.lock().as_ref() {
                    bar.inc(1);
                }
            }
            OrchestratorEvent::RunFinished { state, .. } => {
                if let Some(bar) = self.items_bar.lock().take() {
                    bar.abandon();
                }
                if let Some(bar) = self.files_bar.lock().take() {
                    bar.finish_with_message(format!("{:?}", state));
                }
            }
            _ => {}
        }
    }
}

/// Sink used when progress bars are not wanted
pub fn quiet_sink() -> Arc<dyn ProgressSink> {
    Arc::new(NoopSink)
}
