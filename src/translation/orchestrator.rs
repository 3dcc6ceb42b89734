/*!
 * Batch translation orchestrator.
 *
 * Owns the file queue and walks it in order: rows already known to the
 * translation memory are filled locally, the rest are sent to the backend in
 * fixed-size batches. Rate limits rotate through the configured credentials
 * and cool down once all of them are exhausted; transport errors are retried
 * a bounded number of times before the batch is marked failed. Every
 * mutation is written to the repository before the next await point.
 *
 * Only one batch is ever in flight. A `StopHandle` interrupts the run between
 * batches and during waits, never during a backend call.
 */

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::sync::watch;

use super::events::{NoopSink, OrchestratorEvent, ProgressSink};
use super::glossary::{Glossary, GlossaryInjector};
use super::memory::TranslationMemory;
use super::model::{FileEntry, FileStatus, ItemStatus, RunState, RunSummary, TranslationItem};
use crate::app_config::{Config, MAX_BATCH_SIZE, MIN_BATCH_SIZE};
use crate::database::Repository;
use crate::errors::{OrchestratorError, ProviderError};
use crate::language_utils::language_codes_match;
use crate::providers::{BackendItem, BackendResult, BatchRequest, TranslatorBackend};
use crate::row_parser;

/// Tunables for one orchestrator
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorSettings {
    pub source_language: String,
    pub target_language: String,
    pub model: String,
    /// Items per backend call, 1-1000
    pub batch_size: usize,
    pub inter_batch_delay: Duration,
    pub transport_delay: Duration,
    /// Extra attempts after the first transport error of a batch
    pub transport_retry_limit: u32,
    pub cooldown: Duration,
    pub quota_cooldown: Duration,
    /// Results below this confidence are not written to the translation memory
    pub memory_min_confidence: u8,
}

impl OrchestratorSettings {
    /// Derive settings from the application configuration
    pub fn from_config(config: &Config) -> Self {
        let common = &config.translation.common;
        Self {
            source_language: config.source_language.clone(),
            target_language: config.target_language.clone(),
            model: config.translation.get_model(),
            batch_size: common.batch_size.clamp(MIN_BATCH_SIZE, MAX_BATCH_SIZE),
            inter_batch_delay: Duration::from_millis(common.inter_batch_delay_ms),
            transport_delay: Duration::from_millis(common.transport_delay_ms),
            transport_retry_limit: common.transport_retry_limit,
            cooldown: Duration::from_millis(common.cooldown_ms),
            quota_cooldown: Duration::from_millis(common.quota_cooldown_ms),
            memory_min_confidence: common.memory_min_confidence,
        }
    }
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Cooperative cancellation for a running orchestrator
#[derive(Debug, Clone)]
pub struct StopHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl StopHandle {
    /// Ask the current run to stop at its next checkpoint
    pub fn stop(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.tx.borrow()
    }
}

/// What happened to an ingested file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// New file appended to the queue
    Added,
    /// Same content and target language already queued; progress kept
    Resumed,
    /// Content or target language changed; items rebuilt from scratch
    Replaced,
}

/// A queued file with its materialized items
#[derive(Debug, Clone)]
struct QueuedFile {
    entry: FileEntry,
    items: Vec<TranslationItem>,
}

/// How a batch dispatch ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BatchOutcome {
    Merged,
    Failed,
    Stopped,
}

/// How a file pass ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileFlow {
    Finished,
    Stopped,
}

/// The batch translation state machine
pub struct BatchOrchestrator {
    repo: Repository,
    memory: TranslationMemory,
    glossary: Glossary,
    backend: Arc<dyn TranslatorBackend>,
    credentials: Vec<String>,
    settings: OrchestratorSettings,
    queue: Vec<QueuedFile>,
    sink: Arc<dyn ProgressSink>,
    stop_tx: Arc<watch::Sender<bool>>,
    state: RunState,
    summary: RunSummary,

    // @field: run-local rotation state
    credential_index: usize,
    tried: HashSet<usize>,
}

impl BatchOrchestrator {
    /// Create an orchestrator over the queue persisted in `repo`
    ///
    /// Work interrupted by a crash (items or files left Processing) is put
    /// back to Pending.
    pub fn new(
        repo: Repository,
        memory: TranslationMemory,
        glossary: Glossary,
        backend: Arc<dyn TranslatorBackend>,
        credentials: Vec<String>,
        settings: OrchestratorSettings,
    ) -> Result<Self, OrchestratorError> {
        let mut queue = Vec::new();
        for (mut entry, mut items) in repo.load_queue()? {
            for item in items.iter_mut().filter(|i| i.status == ItemStatus::Processing) {
                item.status = ItemStatus::Pending;
            }
            if entry.status == FileStatus::Processing {
                entry.status = FileStatus::Pending;
            }
            entry.refresh_progress(&items);
            queue.push(QueuedFile { entry, items });
        }
        debug!("Restored {} queued files", queue.len());

        let credentials = credentials
            .into_iter()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();

        let (stop_tx, _) = watch::channel(false);

        Ok(Self {
            repo,
            memory,
            glossary,
            backend,
            credentials,
            settings,
            queue,
            sink: Arc::new(NoopSink),
            stop_tx: Arc::new(stop_tx),
            state: RunState::Idle,
            summary: RunSummary::default(),
            credential_index: 0,
            tried: HashSet::new(),
        })
    }

    /// Report progress to `sink`
    pub fn with_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Handle that stops the current or next run
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            tx: self.stop_tx.clone(),
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Totals of the last run
    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    pub fn memory(&self) -> &TranslationMemory {
        &self.memory
    }

    pub fn glossary(&self) -> &Glossary {
        &self.glossary
    }

    /// Replace the glossary snapshot used by later runs
    pub fn set_glossary(&mut self, glossary: Glossary) {
        self.glossary = glossary;
    }

    /// Queued files in queue order
    pub fn files(&self) -> Vec<FileEntry> {
        self.queue.iter().map(|f| f.entry.clone()).collect()
    }

    /// Items of one file in row order
    pub fn items(&self, name: &str) -> Result<&[TranslationItem], OrchestratorError> {
        Ok(&self.queue[self.file_index(name)?].items)
    }

    /// Number of failed items in one file
    pub fn failed_count(&self, name: &str) -> Result<usize, OrchestratorError> {
        Ok(FileEntry::failed_count(self.items(name)?))
    }

    // =========================================================================
    // Queue operations
    // =========================================================================

    /// Ingest raw CSV text under `name`
    ///
    /// A file whose content hash and target language match the queued one
    /// keeps its progress. Unparseable text yields a file with no items.
    pub fn enqueue_file(&mut self, name: &str, text: &str) -> Result<EnqueueOutcome, OrchestratorError> {
        let hash = row_parser::content_hash(text);
        let target_language = self.settings.target_language.clone();
        let existing = self.queue.iter().position(|f| f.entry.name == name);

        if let Some(index) = existing {
            let queued = &self.queue[index].entry;
            let same_language = language_codes_match(&queued.target_language, &target_language);
            if queued.source_hash == hash && same_language {
                info!("{} is unchanged, resuming", name);
                return Ok(EnqueueOutcome::Resumed);
            }
            if !same_language {
                info!(
                    "{} was queued for '{}', starting over for '{}'",
                    name, queued.target_language, target_language
                );
            }
        }

        let items = match row_parser::parse_items(text) {
            Ok(items) => items,
            Err(e) => {
                error!("Failed to parse {}: {}", name, e);
                Vec::new()
            }
        };
        let entry = FileEntry::new(name, hash, &items).with_target_language(target_language);
        self.repo.save_file(&entry, &items)?;

        let file = QueuedFile { entry, items };
        match existing {
            Some(index) => {
                info!("{} changed, replacing {} items", name, file.items.len());
                self.queue[index] = file;
                Ok(EnqueueOutcome::Replaced)
            }
            None => {
                info!("Queued {} with {} items", name, file.items.len());
                self.queue.push(file);
                Ok(EnqueueOutcome::Added)
            }
        }
    }

    /// Drop a file and its items
    pub fn remove_file(&mut self, name: &str) -> Result<(), OrchestratorError> {
        let index = self.file_index(name)?;
        self.repo.delete_file(name)?;
        self.queue.remove(index);
        info!("Removed {} from the queue", name);
        Ok(())
    }

    /// Put every failed item of a file back to Pending
    pub fn retry_file(&mut self, name: &str) -> Result<usize, OrchestratorError> {
        let index = self.file_index(name)?;
        let failed: Vec<usize> = self.queue[index]
            .items
            .iter()
            .enumerate()
            .filter(|(_, item)| item.status == ItemStatus::Failed)
            .map(|(i, _)| i)
            .collect();
        self.reset_items(index, &failed)
    }

    /// Put the given failed items back to Pending; other items are untouched
    pub fn retry_items(&mut self, name: &str, ids: &[usize]) -> Result<usize, OrchestratorError> {
        let index = self.file_index(name)?;
        let mut positions = Vec::with_capacity(ids.len());
        for &id in ids {
            let position = self.item_index(index, id)?;
            if self.queue[index].items[position].status == ItemStatus::Failed {
                positions.push(position);
            }
        }
        self.reset_items(index, &positions)
    }

    /// Record an operator-supplied translation
    pub fn apply_manual_edit(&mut self, name: &str, id: usize, text: &str) -> Result<(), OrchestratorError> {
        let file_index = self.file_index(name)?;
        let position = self.item_index(file_index, id)?;

        let item = &mut self.queue[file_index].items[position];
        item.target = Some(text.to_string());
        item.status = ItemStatus::Done;
        item.confidence = None;
        item.critique = None;
        item.is_edited = true;

        self.resettle(file_index);
        self.persist(file_index, &[position])?;
        debug!("Manual edit recorded for {} item {}", name, id);
        Ok(())
    }

    /// Send one item, with its current target, through the backend for review
    ///
    /// Success stores the reviewed text and clears the edit flag. A transport
    /// failure marks the item Failed but keeps its target.
    pub async fn revalidate_item(&mut self, name: &str, id: usize) -> Result<TranslationItem, OrchestratorError> {
        let file_index = self.file_index(name)?;
        let position = self.item_index(file_index, id)?;

        let injector = GlossaryInjector::new(&self.glossary);
        self.reset_rotation();
        self.stop_tx.send_replace(false);

        self.dispatch(file_index, &[position], &injector).await?;

        self.resettle(file_index);
        self.persist(file_index, &[])?;
        Ok(self.queue[file_index].items[position].clone())
    }

    /// Render one file as CSV
    pub fn export_csv(&self, name: &str) -> Result<String, OrchestratorError> {
        Ok(row_parser::write_csv(self.items(name)?)?)
    }

    // =========================================================================
    // Run loop
    // =========================================================================

    /// Process every file that is not Done, in queue order
    ///
    /// Only configuration and storage errors abort the run; everything else
    /// ends up as item and file statuses.
    pub async fn run(&mut self) -> Result<RunSummary, OrchestratorError> {
        self.run_scoped(None).await
    }

    /// Like `run`, restricted to the named files
    ///
    /// Other queued files are left untouched. Unknown names are an error.
    pub async fn run_files(&mut self, names: &[String]) -> Result<RunSummary, OrchestratorError> {
        for name in names {
            self.file_index(name)?;
        }
        let scope: HashSet<&str> = names.iter().map(String::as_str).collect();
        self.run_scoped(Some(&scope)).await
    }

    async fn run_scoped(&mut self, scope: Option<&HashSet<&str>>) -> Result<RunSummary, OrchestratorError> {
        self.stop_tx.send_replace(false);
        self.state = RunState::Running;
        self.summary = RunSummary::default();
        self.reset_rotation();

        let in_scope =
            |entry: &FileEntry| scope.is_none_or(|names| names.contains(entry.name.as_str()));
        let selected: Vec<usize> = self
            .queue
            .iter()
            .enumerate()
            .filter(|(_, f)| f.entry.status != FileStatus::Done && in_scope(&f.entry))
            .map(|(i, _)| i)
            .collect();

        let injector = GlossaryInjector::new(&self.glossary);
        let remaining = selected.len();
        info!(
            "Starting run: {} of {} files to process with {}",
            remaining,
            self.queue.len(),
            self.backend.name()
        );
        self.sink.on_event(&OrchestratorEvent::RunStarted { files: remaining });

        let mut stopped = false;
        for file_index in selected {
            if self.stop_requested() {
                stopped = true;
                break;
            }

            match self.process_file(file_index, &injector).await {
                Ok(FileFlow::Finished) => {}
                Ok(FileFlow::Stopped) => {
                    stopped = true;
                    break;
                }
                Err(e) => {
                    error!("Run aborted: {}", e);
                    self.finish(RunState::Stopped);
                    return Err(e);
                }
            }
        }

        self.finish(if stopped { RunState::Stopped } else { RunState::Completed });
        Ok(self.summary.clone())
    }

    fn finish(&mut self, state: RunState) {
        self.state = state;
        info!(
            "Run {:?}: {} translated, {} from memory, {} failed, {} backend calls",
            state,
            self.summary.items_translated,
            self.summary.items_cached,
            self.summary.items_failed,
            self.summary.backend_calls
        );
        self.sink.on_event(&OrchestratorEvent::RunFinished {
            state,
            summary: self.summary.clone(),
        });
    }

    async fn process_file(
        &mut self,
        file_index: usize,
        injector: &GlossaryInjector,
    ) -> Result<FileFlow, OrchestratorError> {
        let name = self.queue[file_index].entry.name.clone();
        self.queue[file_index].entry.status = FileStatus::Processing;
        self.persist(file_index, &[])?;

        let entry = &self.queue[file_index].entry;
        info!("Processing {} ({}/{} done)", name, entry.completed_items, entry.total_items);
        self.sink.on_event(&OrchestratorEvent::FileStarted {
            name: name.clone(),
            total_items: entry.total_items,
            completed_items: entry.completed_items,
        });

        self.apply_memory(file_index)?;

        let pending: Vec<usize> = self.queue[file_index]
            .items
            .iter()
            .enumerate()
            .filter(|(_, item)| item.needs_translation())
            .map(|(i, _)| i)
            .collect();
        let batches: Vec<&[usize]> = pending.chunks(self.settings.batch_size).collect();

        for (n, batch) in batches.iter().enumerate() {
            if self.stop_requested() {
                return self.suspend_file(file_index);
            }

            let outcome = match self.dispatch(file_index, batch, injector).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    self.queue[file_index].entry.status = FileStatus::Pending;
                    self.persist(file_index, &[])?;
                    return Err(e);
                }
            };

            match outcome {
                BatchOutcome::Stopped => return self.suspend_file(file_index),
                BatchOutcome::Merged if n + 1 < batches.len() => {
                    self.pause(self.settings.inter_batch_delay).await;
                }
                _ => {}
            }
        }

        let file = &mut self.queue[file_index];
        file.entry.settle(&file.items);
        let status = file.entry.status;
        let failed_items = FileEntry::failed_count(&file.items);
        self.persist(file_index, &[])?;

        match status {
            FileStatus::Done => {
                self.summary.files_done += 1;
                info!("{} done", name);
            }
            _ => {
                self.summary.files_error += 1;
                warn!("{} finished with {} failed items", name, failed_items);
            }
        }
        self.sink.on_event(&OrchestratorEvent::FileFinished {
            name,
            status,
            failed_items,
        });
        Ok(FileFlow::Finished)
    }

    /// Leave a partially processed file resumable
    fn suspend_file(&mut self, file_index: usize) -> Result<FileFlow, OrchestratorError> {
        self.queue[file_index].entry.status = FileStatus::Pending;
        self.persist(file_index, &[])?;
        info!("Stopped while processing {}", self.queue[file_index].entry.name);
        Ok(FileFlow::Stopped)
    }

    /// Language a file is translated into
    ///
    /// Entries persisted before languages were recorded fall back to the
    /// configured target.
    fn file_language(&self, file_index: usize) -> String {
        let language = &self.queue[file_index].entry.target_language;
        if language.is_empty() {
            self.settings.target_language.clone()
        } else {
            language.clone()
        }
    }

    /// Fill incomplete items from the translation memory
    ///
    /// Operator edits still awaiting review are skipped so they reach the
    /// backend as validation requests.
    fn apply_memory(&mut self, file_index: usize) -> Result<usize, OrchestratorError> {
        let language = self.file_language(file_index);
        let mut hits = Vec::new();
        let file = &mut self.queue[file_index];
        for (position, item) in file.items.iter_mut().enumerate() {
            if item.status.is_complete() || item.is_edited {
                continue;
            }
            if let Some(translation) = self.memory.lookup(&language, &item.source) {
                item.target = Some(translation);
                item.status = ItemStatus::Cached;
                item.confidence = Some(100);
                item.critique = None;
                hits.push(position);
            }
        }

        if !hits.is_empty() {
            debug!("{} items of {} filled from memory", hits.len(), file.entry.name);
            self.summary.items_cached += hits.len();
            self.persist(file_index, &hits)?;
            self.emit_progress(file_index);
        }
        Ok(hits.len())
    }

    fn build_request(
        &self,
        file_index: usize,
        positions: &[usize],
        injector: &GlossaryInjector,
    ) -> BatchRequest {
        let items = positions
            .iter()
            .map(|&position| {
                let item = &self.queue[file_index].items[position];
                let (text, glossary_matched) =
                    injector.annotate(&item.source, self.backend.annotation_style());
                BackendItem {
                    id: item.id,
                    text,
                    existing_target: item.validation_target().map(String::from),
                    glossary_matched,
                }
            })
            .collect();

        BatchRequest {
            items,
            source_language: self.settings.source_language.clone(),
            target_language: self.file_language(file_index),
            model: self.settings.model.clone(),
        }
    }

    /// Send one batch until it is merged, failed, or the run is stopped
    async fn dispatch(
        &mut self,
        file_index: usize,
        positions: &[usize],
        injector: &GlossaryInjector,
    ) -> Result<BatchOutcome, OrchestratorError> {
        let prior: Vec<ItemStatus> = positions
            .iter()
            .map(|&p| self.queue[file_index].items[p].status)
            .collect();
        for &p in positions {
            self.queue[file_index].items[p].status = ItemStatus::Processing;
        }
        self.persist(file_index, positions)?;

        let request = self.build_request(file_index, positions, injector);
        let ids: Vec<usize> = request.items.iter().map(|i| i.id).collect();
        let file_name = self.queue[file_index].entry.name.clone();
        let mut transport_failures = 0u32;

        loop {
            let Some(credential) = self.credentials.get(self.credential_index).cloned() else {
                let error = ProviderError::MissingCredential(format!(
                    "no API key configured for {}",
                    self.backend.name()
                ));
                error!("{}", error);
                self.restore(file_index, positions, &prior)?;
                return Err(error.into());
            };

            debug!(
                "Dispatching {} items of {} with credential #{}",
                ids.len(),
                file_name,
                self.credential_index + 1
            );
            self.sink.on_event(&OrchestratorEvent::BatchDispatched {
                file: file_name.clone(),
                ids: ids.clone(),
                credential_index: self.credential_index,
            });
            self.summary.backend_calls += 1;

            match self.backend.translate_batch(&request, &credential).await {
                Ok(results) => {
                    self.tried.clear();
                    self.merge(file_index, positions, results)?;
                    return Ok(BatchOutcome::Merged);
                }
                Err(error) if error.is_rate_limit() => {
                    self.summary.rate_limit_hits += 1;
                    self.tried.insert(self.credential_index);
                    let count = self.credentials.len();

                    if let Some(next) = self.next_untried(count) {
                        warn!(
                            "Credential #{} throttled ({}), rotating to #{}",
                            self.credential_index + 1,
                            error,
                            next + 1
                        );
                        self.sink.on_event(&OrchestratorEvent::RateLimited {
                            credential_index: self.credential_index,
                            cooldown: None,
                        });
                        self.credential_index = next;
                        continue;
                    }

                    let cooldown = match error {
                        ProviderError::QuotaExceeded(_) => self.settings.quota_cooldown,
                        _ => self.settings.cooldown,
                    };
                    warn!(
                        "All {} credentials throttled ({}), cooling down for {:?}",
                        count, error, cooldown
                    );
                    self.sink.on_event(&OrchestratorEvent::RateLimited {
                        credential_index: self.credential_index,
                        cooldown: Some(cooldown),
                    });
                    if self.pause(cooldown).await {
                        self.restore(file_index, positions, &prior)?;
                        return Ok(BatchOutcome::Stopped);
                    }
                    self.tried.clear();
                    self.credential_index = (self.credential_index + 1) % count;
                }
                Err(error) if error.is_fatal() => {
                    error!("{} rejected the request: {}", self.backend.name(), error);
                    self.restore(file_index, positions, &prior)?;
                    return Err(error.into());
                }
                Err(error) => {
                    transport_failures += 1;
                    self.summary.transport_errors += 1;

                    if transport_failures <= self.settings.transport_retry_limit {
                        warn!(
                            "Batch {:?} of {} failed (attempt {}/{}): {}",
                            ids,
                            file_name,
                            transport_failures,
                            self.settings.transport_retry_limit + 1,
                            error
                        );
                        if self.pause(self.settings.transport_delay).await {
                            self.restore(file_index, positions, &prior)?;
                            return Ok(BatchOutcome::Stopped);
                        }
                        continue;
                    }

                    error!(
                        "Batch {:?} of {} failed after {} attempts: {}",
                        ids, file_name, transport_failures, error
                    );
                    self.mark_failed(file_index, positions)?;
                    self.sink.on_event(&OrchestratorEvent::BatchFailed {
                        file: file_name,
                        ids,
                        error: error.to_string(),
                    });
                    self.pause(self.settings.transport_delay).await;
                    return Ok(BatchOutcome::Failed);
                }
            }
        }
    }

    /// Next credential not tried since the last success, cycling forward
    fn next_untried(&self, count: usize) -> Option<usize> {
        (1..count)
            .map(|step| (self.credential_index + step) % count)
            .find(|index| !self.tried.contains(index))
    }

    fn reset_rotation(&mut self) {
        self.credential_index = 0;
        self.tried.clear();
    }

    /// Store backend results, then record them in the translation memory
    fn merge(
        &mut self,
        file_index: usize,
        positions: &[usize],
        results: Vec<BackendResult>,
    ) -> Result<(), OrchestratorError> {
        let min_confidence = self.settings.memory_min_confidence;
        let mut remembered = Vec::new();

        for (&position, result) in positions.iter().zip(results) {
            let item = &mut self.queue[file_index].items[position];
            let translation = GlossaryInjector::strip(&result.translation);

            if result.confidence >= min_confidence {
                remembered.push((item.source.clone(), translation.clone()));
            }
            item.target = Some(translation);
            item.status = ItemStatus::Done;
            item.confidence = Some(result.confidence);
            item.critique = result.critique;
            item.is_edited = false;
        }

        self.summary.items_translated += positions.len();
        self.persist(file_index, positions)?;
        let language = self.file_language(file_index);
        self.memory.record_batch(&language, &remembered)?;
        self.emit_progress(file_index);
        Ok(())
    }

    fn mark_failed(&mut self, file_index: usize, positions: &[usize]) -> Result<(), OrchestratorError> {
        for &p in positions {
            self.queue[file_index].items[p].status = ItemStatus::Failed;
        }
        self.summary.items_failed += positions.len();
        self.persist(file_index, positions)
    }

    /// Put items back to the statuses they had before dispatch
    fn restore(
        &mut self,
        file_index: usize,
        positions: &[usize],
        prior: &[ItemStatus],
    ) -> Result<(), OrchestratorError> {
        for (&p, &status) in positions.iter().zip(prior) {
            self.queue[file_index].items[p].status = status;
        }
        self.persist(file_index, positions)
    }

    fn reset_items(&mut self, file_index: usize, positions: &[usize]) -> Result<usize, OrchestratorError> {
        if positions.is_empty() {
            return Ok(0);
        }

        let file = &mut self.queue[file_index];
        for &p in positions {
            let item = &mut file.items[p];
            item.status = ItemStatus::Pending;
            item.critique = None;
        }
        file.entry.status = FileStatus::Pending;
        info!("{} items of {} queued for retry", positions.len(), file.entry.name);

        self.persist(file_index, positions)?;
        Ok(positions.len())
    }

    /// Re-derive a terminal file status after an out-of-run change
    fn resettle(&mut self, file_index: usize) {
        let file = &mut self.queue[file_index];
        if matches!(file.entry.status, FileStatus::Done | FileStatus::Error) {
            file.entry.settle(&file.items);
        }
    }

    /// Refresh counters and write the file plus the given items
    fn persist(&mut self, file_index: usize, positions: &[usize]) -> Result<(), OrchestratorError> {
        let file = &mut self.queue[file_index];
        file.entry.refresh_progress(&file.items);

        let items: Vec<&TranslationItem> = positions.iter().map(|&p| &file.items[p]).collect();
        self.repo.save_progress(&file.entry, &items)?;
        Ok(())
    }

    fn emit_progress(&self, file_index: usize) {
        let entry = &self.queue[file_index].entry;
        self.sink.on_event(&OrchestratorEvent::Progress {
            file: entry.name.clone(),
            completed_items: entry.completed_items,
            total_items: entry.total_items,
            progress: entry.progress,
        });
    }

    fn stop_requested(&self) -> bool {
        *self.stop_tx.borrow()
    }

    /// Wait for `duration`; returns true when a stop was requested
    async fn pause(&self, duration: Duration) -> bool {
        if duration.is_zero() {
            return self.stop_requested();
        }

        let mut rx = self.stop_tx.subscribe();
        tokio::select! {
            _ = tokio::time::sleep(duration) => self.stop_requested(),
            result = rx.wait_for(|stopped| *stopped) => result.is_ok(),
        }
    }

    fn file_index(&self, name: &str) -> Result<usize, OrchestratorError> {
        self.queue
            .iter()
            .position(|f| f.entry.name == name)
            .ok_or_else(|| OrchestratorError::UnknownFile(name.to_string()))
    }

    fn item_index(&self, file_index: usize, id: usize) -> Result<usize, OrchestratorError> {
        let file = &self.queue[file_index];
        file.items
            .iter()
            .position(|item| item.id == id)
            .ok_or_else(|| OrchestratorError::UnknownItem {
                file: file.entry.name.clone(),
                id,
            })
    }
}
