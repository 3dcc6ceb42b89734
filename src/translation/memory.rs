/*!
 * Translation memory.
 *
 * Maps (target language, trimmed source text) to the last known good
 * translation. Lookups happen before every backend call; new entries are
 * written through to the repository as soon as a batch is merged.
 *
 * Languages are keyed by their ISO 639-2/T form, so `uk` and `ukr` share
 * entries.
 */

use std::collections::HashMap;
use std::sync::Arc;
use parking_lot::RwLock;
use log::debug;
use anyhow::Result;

use crate::database::Repository;
use crate::language_utils::language_key;

type MemoryKey = (String, String);

/// Translation memory with optional write-through persistence
pub struct TranslationMemory {
    /// In-memory entries keyed by (language key, trimmed source)
    entries: Arc<RwLock<HashMap<MemoryKey, String>>>,

    /// Lookup hit counter
    hits: Arc<RwLock<usize>>,

    /// Lookup miss counter
    misses: Arc<RwLock<usize>>,

    /// Backing store; `None` keeps the memory process-local
    store: Option<Repository>,
}

impl TranslationMemory {
    /// Create an empty memory that is never persisted
    pub fn in_memory() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            hits: Arc::new(RwLock::new(0)),
            misses: Arc::new(RwLock::new(0)),
            store: None,
        }
    }

    /// Load all entries from the repository and write new ones back to it
    pub fn load(store: Repository) -> Result<Self> {
        let loaded = store.load_memory()?;
        debug!("Loaded {} translation memory entries", loaded.len());

        let memory = Self {
            store: Some(store),
            ..Self::in_memory()
        };
        memory.entries.write().extend(
            loaded
                .into_iter()
                .map(|(language, source, translation)| ((language_key(&language), source), translation)),
        );
        Ok(memory)
    }

    /// Normalize source text into a memory key
    pub fn normalize(source: &str) -> &str {
        source.trim()
    }

    /// Look up a translation of `source` into `target_language`
    pub fn lookup(&self, target_language: &str, source: &str) -> Option<String> {
        let source = Self::normalize(source);
        if source.is_empty() {
            return None;
        }

        let key = (language_key(target_language), source.to_string());
        match self.entries.read().get(&key) {
            Some(translation) => {
                *self.hits.write() += 1;
                debug!("Memory hit for '{}' ({})", truncate_text(source, 30), key.0);
                Some(translation.clone())
            }
            None => {
                *self.misses.write() += 1;
                debug!("Memory miss for '{}' ({})", truncate_text(source, 30), key.0);
                None
            }
        }
    }

    /// Record translations into `target_language` and flush them to the store
    /// before returning
    ///
    /// Later pairs win over earlier ones with the same normalized source.
    pub fn record_batch(&self, target_language: &str, pairs: &[(String, String)]) -> Result<()> {
        let language = language_key(target_language);
        let normalized: Vec<(String, String)> = pairs
            .iter()
            .map(|(source, translation)| (Self::normalize(source).to_string(), translation.clone()))
            .filter(|(source, _)| !source.is_empty())
            .collect();

        if normalized.is_empty() {
            return Ok(());
        }

        if let Some(store) = &self.store {
            store.save_memory_entries(&language, &normalized)?;
        }

        let mut entries = self.entries.write();
        for (source, translation) in normalized {
            entries.insert((language.clone(), source), translation);
        }
        Ok(())
    }

    /// Get lookup statistics as (hits, misses, hit rate)
    pub fn stats(&self) -> (usize, usize, f64) {
        let hits = *self.hits.read();
        let misses = *self.misses.read();
        let total = hits + misses;

        let hit_rate = if total > 0 {
            hits as f64 / total as f64
        } else {
            0.0
        };

        (hits, misses, hit_rate)
    }

    /// Remove every entry, including persisted ones
    pub fn clear(&self) -> Result<usize> {
        let removed = match &self.store {
            Some(store) => store.clear_memory()?,
            None => self.entries.read().len(),
        };
        self.entries.write().clear();
        *self.hits.write() = 0;
        *self.misses.write() = 0;

        debug!("Translation memory cleared");
        Ok(removed)
    }

    /// Get the number of entries
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Check if the memory is empty
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl Default for TranslationMemory {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl Clone for TranslationMemory {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
            hits: self.hits.clone(),
            misses: self.misses.clone(),
            store: self.store.clone(),
        }
    }
}

/// Truncate text to a maximum number of characters with ellipsis
fn truncate_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        format!("{}...", text.chars().take(max_chars).collect::<String>())
    }
}
