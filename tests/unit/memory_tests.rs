/*!
 * Tests for the translation memory
 */

use anyhow::Result;
use locbatch::database::Repository;
use locbatch::translation::TranslationMemory;

/// Entries survive a reload from the same store
#[test]
fn test_load_afterRecordBatch_shouldReturnPersistedEntries() -> Result<()> {
    let repo = Repository::new_in_memory()?;
    let memory = TranslationMemory::load(repo.clone())?;
    memory.record_batch("uk", &[
        ("Caller".to_string(), "Вабик".to_string()),
        ("Badger".to_string(), "Борсук".to_string()),
    ])?;

    let reloaded = TranslationMemory::load(repo)?;
    assert_eq!(reloaded.len(), 2);
    assert_eq!(reloaded.lookup("uk", "  Badger "), Some("Борсук".to_string()));
    Ok(())
}

/// A later translation of the same source replaces the earlier one
#[test]
fn test_recordBatch_withSameSource_shouldKeepLatest() -> Result<()> {
    let repo = Repository::new_in_memory()?;
    let memory = TranslationMemory::load(repo.clone())?;
    memory.record_batch("uk", &[("Quit".to_string(), "Вийти".to_string())])?;
    memory.record_batch("uk", &[(" Quit".to_string(), "Вихід".to_string())])?;

    assert_eq!(memory.len(), 1);
    assert_eq!(TranslationMemory::load(repo)?.lookup("uk", "Quit"), Some("Вихід".to_string()));
    Ok(())
}

/// Clones share entries and counters
#[test]
fn test_clone_shouldShareState() -> Result<()> {
    let memory = TranslationMemory::in_memory();
    let clone = memory.clone();
    clone.record_batch("uk", &[("Hello".to_string(), "Привіт".to_string())])?;

    assert_eq!(memory.lookup("uk", "Hello"), Some("Привіт".to_string()));
    assert_eq!(memory.lookup("uk", "Bye"), None);

    let (hits, misses, rate) = clone.stats();
    assert_eq!((hits, misses), (1, 1));
    assert!((rate - 0.5).abs() < f64::EPSILON);
    Ok(())
}

/// A memory filled for one language serves nothing to another
#[test]
fn test_lookup_withOtherLanguage_shouldMiss() -> Result<()> {
    let repo = Repository::new_in_memory()?;
    let memory = TranslationMemory::load(repo.clone())?;
    memory.record_batch("uk", &[("Hello".to_string(), "Привіт".to_string())])?;

    let reloaded = TranslationMemory::load(repo)?;
    assert_eq!(reloaded.lookup("de", "Hello"), None);
    assert_eq!(reloaded.lookup("ukr", "Hello"), Some("Привіт".to_string()));
    Ok(())
}
