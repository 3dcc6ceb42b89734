/*!
 * End-to-end orchestrator runs against the mock backend
 */

use std::sync::Arc;

use locbatch::providers::mock::{MockBackend, MOCK_CONFIDENCE};
use locbatch::translation::{
    AnnotationStyle, EnqueueOutcome, FileStatus, Glossary, ItemStatus, OrchestratorEvent,
    RecordingSink, RunState,
};
use locbatch::OrchestratorError;
use crate::common::{self, SAMPLE_CSV};

/// Every row is translated in batches of the configured size
#[tokio::test]
async fn test_run_withFreshFile_shouldTranslateEveryRowInBatches() {
    let backend = Arc::new(MockBackend::working().with_translation("Hello", "Привіт"));
    let (mut orchestrator, _repo) = common::orchestrator(backend.clone());
    orchestrator.enqueue_file("strings.csv", SAMPLE_CSV).unwrap();

    let summary = orchestrator.run().await.unwrap();

    assert_eq!(orchestrator.state(), RunState::Completed);
    assert_eq!(summary.items_translated, 5);
    assert_eq!(summary.files_done, 1);
    assert_eq!(
        backend.calls().iter().map(|c| c.ids.clone()).collect::<Vec<_>>(),
        vec![vec![1, 2], vec![3, 4], vec![5]]
    );

    let items = orchestrator.items("strings.csv").unwrap();
    assert!(items.iter().all(|i| i.status == ItemStatus::Done));
    assert!(items.iter().all(|i| i.confidence == Some(MOCK_CONFIDENCE)));
    assert_eq!(items[0].target.as_deref(), Some("Привіт"));
    assert_eq!(items[1].target.as_deref(), Some("uk:Goodbye"));

    let file = &orchestrator.files()[0];
    assert_eq!(file.status, FileStatus::Done);
    assert_eq!(file.progress, 100);
}

/// A second run over a finished queue makes no backend calls
#[tokio::test]
async fn test_run_twice_shouldBeIdempotent() {
    let backend = Arc::new(MockBackend::working());
    let (mut orchestrator, _repo) = common::orchestrator(backend.clone());
    orchestrator.enqueue_file("strings.csv", SAMPLE_CSV).unwrap();
    orchestrator.run().await.unwrap();
    let calls = backend.call_count();

    let summary = orchestrator.run().await.unwrap();

    assert_eq!(backend.call_count(), calls);
    assert_eq!(summary.backend_calls, 0);
    assert_eq!(orchestrator.state(), RunState::Completed);
}

/// Rows found in the translation memory never reach the backend
#[tokio::test]
async fn test_run_withMemoryHits_shouldExportWithoutBackendCalls() {
    let backend = Arc::new(MockBackend::working());
    let (mut orchestrator, _repo) = common::orchestrator(backend.clone());
    orchestrator
        .memory()
        .record_batch("uk", &[
            ("Caller".to_string(), "Вабик".to_string()),
            ("Badger".to_string(), "Борсук".to_string()),
        ])
        .unwrap();
    orchestrator
        .enqueue_file("animals.csv", "key,source,target\nk1,Caller,\nk2,Badger,\n")
        .unwrap();

    let summary = orchestrator.run().await.unwrap();

    assert_eq!(backend.call_count(), 0);
    assert_eq!(summary.items_cached, 2);
    let items = orchestrator.items("animals.csv").unwrap();
    assert!(items.iter().all(|i| i.status == ItemStatus::Cached && i.confidence == Some(100)));
    assert_eq!(
        orchestrator.export_csv("animals.csv").unwrap(),
        "\"key\",\"source\",\"target\"\n\"k1\",\"Caller\",\"Вабик\"\n\"k2\",\"Badger\",\"Борсук\"\n"
    );
}

/// Backend results are remembered for later files
#[tokio::test]
async fn test_run_withRepeatedSource_shouldReuseMemoryAcrossFiles() {
    let backend = Arc::new(MockBackend::working());
    let (mut orchestrator, repo) = common::orchestrator(backend.clone());
    orchestrator.enqueue_file("a.csv", "key,source\nk1,Quit\n").unwrap();
    orchestrator.enqueue_file("b.csv", "key,source\nk1,  Quit \n").unwrap();

    orchestrator.run().await.unwrap();

    assert_eq!(backend.call_count(), 1);
    assert_eq!(orchestrator.items("b.csv").unwrap()[0].status, ItemStatus::Cached);
    assert_eq!(
        repo.load_memory().unwrap(),
        vec![("ukr".to_string(), "Quit".to_string(), "uk:Quit".to_string())]
    );
}

/// Results under the confidence floor are kept but not remembered
#[tokio::test]
async fn test_run_withLowConfidence_shouldNotWriteMemory() {
    let backend = Arc::new(MockBackend::working().with_confidence(40));
    let repo = locbatch::database::Repository::new_in_memory().unwrap();
    let mut settings = common::fast_settings();
    settings.memory_min_confidence = 50;
    let mut orchestrator = common::orchestrator_on(&repo, backend, &["key-1"], settings);
    orchestrator.enqueue_file("a.csv", "key,source\nk1,Quit\n").unwrap();

    orchestrator.run().await.unwrap();

    assert_eq!(orchestrator.items("a.csv").unwrap()[0].confidence, Some(40));
    assert!(orchestrator.memory().is_empty());
}

/// The glossary span is sent to the backend and stripped from the stored target
#[tokio::test]
async fn test_run_withGlossaryTerm_shouldAnnotateRequestAndStripResponse() {
    let backend = Arc::new(MockBackend::working().echoing_annotation());
    let (mut orchestrator, _repo) = common::orchestrator(backend.clone());
    orchestrator.set_glossary(
        [("Caller".to_string(), "Вабик".to_string())].into_iter().collect::<Glossary>(),
    );
    orchestrator
        .enqueue_file("a.csv", "key,source\nk1,Call the caller\nk2,Nothing\n")
        .unwrap();

    orchestrator.run().await.unwrap();

    let texts = &backend.calls()[0].texts;
    assert_eq!(texts[0], "[[GLOSSARY: Caller=Вабик]] Call the caller");
    assert_eq!(texts[1], "Nothing");

    let targets = common::targets(&orchestrator, "a.csv");
    assert_eq!(targets[0].as_deref(), Some("uk:Call the caller"));
    assert!(!targets[0].as_deref().unwrap_or_default().contains("GLOSSARY"));
}

/// Engine-style backends receive the tag form of the span
#[tokio::test]
async fn test_run_withEngineBackend_shouldUseTagSpan() {
    let backend = Arc::new(MockBackend::working().with_style(AnnotationStyle::Engine).echoing_annotation());
    let (mut orchestrator, _repo) = common::orchestrator(backend.clone());
    orchestrator.set_glossary([("Badger".to_string(), "Борсук".to_string())].into_iter().collect());
    orchestrator.enqueue_file("a.csv", "key,source\nk1,Badger\n").unwrap();

    orchestrator.run().await.unwrap();

    assert_eq!(backend.calls()[0].texts[0], "<gl>Badger=Борсук</gl> Badger");
    assert_eq!(common::targets(&orchestrator, "a.csv")[0].as_deref(), Some("uk:Badger"));
}

/// Files are processed in queue order and Done files are skipped
#[tokio::test]
async fn test_run_withSeveralFiles_shouldFollowQueueOrder() {
    let backend = Arc::new(MockBackend::working());
    let (mut orchestrator, _repo) = common::orchestrator(backend.clone());
    orchestrator.enqueue_file("z.csv", "key,source\nk1,Zed\n").unwrap();
    orchestrator.enqueue_file("done.csv", "key,source,target\nk1,Done,Готово\n").unwrap();
    orchestrator.enqueue_file("a.csv", "key,source\nk1,Aye\n").unwrap();

    orchestrator.run().await.unwrap();

    let texts: Vec<String> = backend.calls().iter().map(|c| c.texts[0].clone()).collect();
    assert_eq!(texts, vec!["Zed", "Aye"]);
    assert!(orchestrator.files().iter().all(|f| f.status == FileStatus::Done));
}

/// An unparseable file completes with no work
#[tokio::test]
async fn test_run_withEmptyFile_shouldCompleteInstantly() {
    let backend = Arc::new(MockBackend::working());
    let (mut orchestrator, _repo) = common::orchestrator(backend.clone());
    orchestrator.enqueue_file("empty.csv", "").unwrap();

    orchestrator.run().await.unwrap();

    assert_eq!(backend.call_count(), 0);
    let file = &orchestrator.files()[0];
    assert_eq!(file.total_items, 0);
    assert_eq!(file.status, FileStatus::Done);
}

/// Sinks see the run bracketed by start and finish events
#[tokio::test]
async fn test_run_withSink_shouldReportProgress() {
    let sink = Arc::new(RecordingSink::new());
    let backend = Arc::new(MockBackend::working());
    let (orchestrator, _repo) = common::orchestrator(backend);
    let mut orchestrator = orchestrator.with_sink(sink.clone());
    orchestrator.enqueue_file("strings.csv", SAMPLE_CSV).unwrap();

    orchestrator.run().await.unwrap();

    let events = sink.events();
    assert_eq!(events.first(), Some(&OrchestratorEvent::RunStarted { files: 1 }));
    assert!(matches!(
        events.last(),
        Some(OrchestratorEvent::RunFinished { state: RunState::Completed, .. })
    ));
    let progress: Vec<usize> = events
        .iter()
        .filter_map(|e| match e {
            OrchestratorEvent::Progress { completed_items, .. } => Some(*completed_items),
            _ => None,
        })
        .collect();
    assert_eq!(progress, vec![2, 4, 5]);
    assert!(events.iter().any(|e| matches!(
        e,
        OrchestratorEvent::FileFinished { status: FileStatus::Done, failed_items: 0, .. }
    )));
}

/// Re-ingesting identical text keeps progress; changed text starts over
#[tokio::test]
async fn test_enqueueFile_shouldResumeOrReplace() {
    let backend = Arc::new(MockBackend::working());
    let (mut orchestrator, _repo) = common::orchestrator(backend);
    assert_eq!(orchestrator.enqueue_file("a.csv", SAMPLE_CSV).unwrap(), EnqueueOutcome::Added);
    orchestrator.run().await.unwrap();

    assert_eq!(orchestrator.enqueue_file("a.csv", SAMPLE_CSV).unwrap(), EnqueueOutcome::Resumed);
    assert_eq!(orchestrator.files()[0].status, FileStatus::Done);

    let changed = format!("{}menu.help,Help,\n", SAMPLE_CSV);
    assert_eq!(orchestrator.enqueue_file("a.csv", &changed).unwrap(), EnqueueOutcome::Replaced);
    let file = &orchestrator.files()[0];
    assert_eq!(file.status, FileStatus::Pending);
    assert_eq!(file.total_items, 6);
    assert_eq!(file.completed_items, 0);
}

/// Removing a file drops it from the queue and the store
#[tokio::test]
async fn test_removeFile_shouldForgetFile() {
    let backend = Arc::new(MockBackend::working());
    let (mut orchestrator, repo) = common::orchestrator(backend);
    orchestrator.enqueue_file("a.csv", SAMPLE_CSV).unwrap();

    orchestrator.remove_file("a.csv").unwrap();

    assert!(orchestrator.files().is_empty());
    assert!(repo.load_queue().unwrap().is_empty());
    assert!(matches!(
        orchestrator.remove_file("a.csv"),
        Err(OrchestratorError::UnknownFile(_))
    ));
}

/// A manual edit is re-checked by the backend and the flag cleared
#[tokio::test]
async fn test_revalidateItem_afterManualEdit_shouldSendEditedTarget() {
    let backend = Arc::new(MockBackend::working());
    let (mut orchestrator, _repo) = common::orchestrator(backend.clone());
    orchestrator.enqueue_file("a.csv", "key,source\nk1,Hello\n").unwrap();
    orchestrator.run().await.unwrap();

    orchestrator.apply_manual_edit("a.csv", 1, "Вітаю").unwrap();
    let edited = orchestrator.items("a.csv").unwrap()[0].clone();
    assert!(edited.is_edited);
    assert_eq!(edited.confidence, None);

    let reviewed = orchestrator.revalidate_item("a.csv", 1).await.unwrap();

    let call = backend.calls().last().cloned().unwrap();
    assert_eq!(call.existing_targets, vec![Some("Вітаю".to_string())]);
    assert_eq!(reviewed.target.as_deref(), Some("Вітаю"));
    assert_eq!(reviewed.status, ItemStatus::Done);
    assert!(!reviewed.is_edited);
    assert_eq!(orchestrator.memory().lookup("uk", "Hello"), Some("Вітаю".to_string()));
}

/// Unknown ids are reported, not ignored
#[tokio::test]
async fn test_applyManualEdit_withUnknownId_shouldFail() {
    let backend = Arc::new(MockBackend::working());
    let (mut orchestrator, _repo) = common::orchestrator(backend);
    orchestrator.enqueue_file("a.csv", "key,source\nk1,Hello\n").unwrap();

    assert!(matches!(
        orchestrator.apply_manual_edit("a.csv", 9, "x"),
        Err(OrchestratorError::UnknownItem { id: 9, .. })
    ));
}

/// Switching the target language re-translates instead of serving the old language
#[tokio::test]
async fn test_enqueueFile_withNewTargetLanguage_shouldReplaceAndTranslateAgain() {
    let repo = locbatch::database::Repository::new_in_memory().unwrap();
    let uk_backend = Arc::new(MockBackend::working());
    let mut uk = common::orchestrator_on(&repo, uk_backend, &["key-1"], common::fast_settings());
    uk.enqueue_file("a.csv", "key,source\nk1,Hello\n").unwrap();
    uk.run().await.unwrap();
    assert_eq!(uk.files()[0].target_language, "uk");

    let de_backend = Arc::new(MockBackend::working());
    let mut settings = common::fast_settings();
    settings.target_language = "de".to_string();
    let mut de = common::orchestrator_on(&repo, de_backend.clone(), &["key-1"], settings);

    assert_eq!(
        de.enqueue_file("a.csv", "key,source\nk1,Hello\n").unwrap(),
        EnqueueOutcome::Replaced
    );
    assert_eq!(
        de.enqueue_file("b.csv", "key,source\nk1,Hello\n").unwrap(),
        EnqueueOutcome::Added
    );
    de.run().await.unwrap();

    assert_eq!(de_backend.call_count(), 1);
    for name in ["a.csv", "b.csv"] {
        let items = de.items(name).unwrap();
        assert_eq!(items[0].target.as_deref(), Some("de:Hello"), "{}", name);
    }
    assert_eq!(de.items("b.csv").unwrap()[0].status, ItemStatus::Cached);
    assert_eq!(de.memory().lookup("uk", "Hello"), Some("uk:Hello".to_string()));
    assert_eq!(de.memory().lookup("de", "Hello"), Some("de:Hello".to_string()));
}

/// Re-enqueueing with an equivalent code form keeps the progress
#[tokio::test]
async fn test_enqueueFile_withEquivalentLanguageCode_shouldResume() {
    let repo = locbatch::database::Repository::new_in_memory().unwrap();
    let backend = Arc::new(MockBackend::working());
    let mut first = common::orchestrator_on(&repo, backend.clone(), &["key-1"], common::fast_settings());
    first.enqueue_file("a.csv", SAMPLE_CSV).unwrap();
    first.run().await.unwrap();

    let mut settings = common::fast_settings();
    settings.target_language = "ukr".to_string();
    let mut second = common::orchestrator_on(&repo, backend, &["key-1"], settings);

    assert_eq!(second.enqueue_file("a.csv", SAMPLE_CSV).unwrap(), EnqueueOutcome::Resumed);
    assert_eq!(second.files()[0].status, FileStatus::Done);
}

/// A scoped run leaves the other queued files alone
#[tokio::test]
async fn test_runFiles_shouldOnlyProcessNamedFiles() {
    let backend = Arc::new(MockBackend::working());
    let (mut orchestrator, _repo) = common::orchestrator(backend.clone());
    orchestrator.enqueue_file("a.csv", "key,source\nk1,Start\n").unwrap();
    orchestrator.enqueue_file("b.csv", "key,source\nk1,Cancel\n").unwrap();

    let summary = orchestrator.run_files(&["b.csv".to_string()]).await.unwrap();

    assert_eq!(summary.files_done, 1);
    assert_eq!(backend.calls()[0].texts, vec!["Cancel".to_string()]);
    assert_eq!(orchestrator.files()[0].status, FileStatus::Pending);
    assert!(matches!(
        orchestrator.run_files(&["missing.csv".to_string()]).await,
        Err(OrchestratorError::UnknownFile(_))
    ));
}
