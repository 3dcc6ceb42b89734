/*!
 * Stopping a run and picking it up again
 */

use once_cell::sync::OnceCell;
use std::sync::Arc;
use std::time::{Duration, Instant};

use locbatch::database::Repository;
use locbatch::providers::mock::MockBackend;
use locbatch::row_parser::{content_hash, parse_items};
use locbatch::translation::{FileEntry, FileStatus, ItemStatus, RunState, StopHandle};
use locbatch::ProviderError;
use crate::common::{self, SAMPLE_CSV};

/// A stop requested during the first call lets that batch land, then halts
#[tokio::test]
async fn test_run_stoppedAfterFirstBatch_shouldResumeRemainingRowsInOrder() {
    let handle: Arc<OnceCell<StopHandle>> = Arc::new(OnceCell::new());
    let hook_handle = handle.clone();
    let first = Arc::new(MockBackend::working().with_call_hook(move |call| {
        if call == 1 {
            if let Some(handle) = hook_handle.get() {
                handle.stop();
            }
        }
    }));

    let repo = Repository::new_in_memory().unwrap();
    let mut orchestrator = common::orchestrator_on(&repo, first.clone(), &["key-1"], common::fast_settings());
    let _ = handle.set(orchestrator.stop_handle());
    orchestrator.enqueue_file("strings.csv", SAMPLE_CSV).unwrap();

    orchestrator.run().await.unwrap();

    assert_eq!(orchestrator.state(), RunState::Stopped);
    assert_eq!(first.call_count(), 1);
    let statuses: Vec<ItemStatus> = orchestrator
        .items("strings.csv")
        .unwrap()
        .iter()
        .map(|i| i.status)
        .collect();
    assert_eq!(
        statuses,
        vec![
            ItemStatus::Done,
            ItemStatus::Done,
            ItemStatus::Pending,
            ItemStatus::Pending,
            ItemStatus::Pending
        ]
    );
    assert_eq!(orchestrator.files()[0].status, FileStatus::Pending);
    drop(orchestrator);

    // A new process picks up from the persisted queue
    let second = Arc::new(MockBackend::working());
    let mut resumed = common::orchestrator_on(&repo, second.clone(), &["key-1"], common::fast_settings());
    assert_eq!(resumed.files()[0].completed_items, 2);

    resumed.run().await.unwrap();

    assert_eq!(
        second.calls().iter().map(|c| c.ids.clone()).collect::<Vec<_>>(),
        vec![vec![3, 4], vec![5]]
    );
    assert_eq!(resumed.state(), RunState::Completed);
    assert_eq!(resumed.files()[0].status, FileStatus::Done);
}

/// A stop during a cooldown ends the wait early and keeps the batch pending
#[tokio::test]
async fn test_stop_duringCooldown_shouldInterruptWait() {
    let backend = Arc::new(MockBackend::working());
    backend.fail_next(ProviderError::RateLimited("HTTP 429".to_string()));
    let repo = Repository::new_in_memory().unwrap();
    let mut settings = common::fast_settings();
    settings.cooldown = Duration::from_secs(3600);
    let mut orchestrator = common::orchestrator_on(&repo, backend.clone(), &["key-1"], settings);
    orchestrator.enqueue_file("a.csv", "key,source\nk1,Hello\n").unwrap();

    let stop = orchestrator.stop_handle();
    let stopper = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        stop.stop();
    });

    let started = Instant::now();
    orchestrator.run().await.unwrap();
    stopper.await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(60));
    assert_eq!(orchestrator.state(), RunState::Stopped);
    assert_eq!(backend.call_count(), 1);
    assert_eq!(orchestrator.items("a.csv").unwrap()[0].status, ItemStatus::Pending);
}

/// A stop issued before the run is cleared when the run starts
#[tokio::test]
async fn test_run_afterEarlierStop_shouldStartFresh() {
    let backend = Arc::new(MockBackend::working());
    let (mut orchestrator, _repo) = common::orchestrator(backend.clone());
    orchestrator.enqueue_file("a.csv", "key,source\nk1,Hello\n").unwrap();

    orchestrator.stop_handle().stop();
    assert!(orchestrator.stop_handle().is_stopped());
    orchestrator.run().await.unwrap();

    assert_eq!(orchestrator.state(), RunState::Completed);
    assert_eq!(backend.call_count(), 1);
}

/// Rows left mid-flight by a crash are treated as pending again
#[tokio::test]
async fn test_new_withProcessingRowsInStore_shouldResetThemToPending() {
    let repo = Repository::new_in_memory().unwrap();
    let mut items = parse_items(SAMPLE_CSV).unwrap();
    items[0].status = ItemStatus::Done;
    items[0].target = Some("Привіт".to_string());
    items[1].status = ItemStatus::Processing;
    items[2].status = ItemStatus::Processing;
    let mut entry = FileEntry::new("strings.csv", content_hash(SAMPLE_CSV), &items);
    entry.status = FileStatus::Processing;
    repo.save_file(&entry, &items).unwrap();

    let backend = Arc::new(MockBackend::working());
    let mut orchestrator = common::orchestrator_on(&repo, backend.clone(), &["key-1"], common::fast_settings());

    assert_eq!(orchestrator.files()[0].status, FileStatus::Pending);
    assert_eq!(orchestrator.items("strings.csv").unwrap()[1].status, ItemStatus::Pending);

    orchestrator.run().await.unwrap();
    assert_eq!(
        backend.calls().iter().map(|c| c.ids.clone()).collect::<Vec<_>>(),
        vec![vec![2, 3], vec![4, 5]]
    );
    assert_eq!(common::targets(&orchestrator, "strings.csv")[0].as_deref(), Some("Привіт"));
}
