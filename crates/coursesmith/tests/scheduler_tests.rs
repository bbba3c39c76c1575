//! Scheduler loop timing under a paused clock.

mod common;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

use coursesmith::{
    AssetProcessor, AssetStatus, AssetType, GeneratorRegistry, Scheduler, SchedulerSettings,
};

use common::doubles::{pending_asset, MemoryAssetStore, StubExtractor, StubGenerator};

fn stub_registry() -> GeneratorRegistry {
    AssetType::ALL
        .into_iter()
        .fold(GeneratorRegistry::builder(), |builder, t| {
            builder.register(Arc::new(StubGenerator(t)))
        })
        .build()
        .unwrap()
}

fn scheduler(store: Arc<MemoryAssetStore>) -> Scheduler {
    let processor = AssetProcessor::new(
        store.clone(),
        Arc::new(StubExtractor("Step one\n- Do it")),
        stub_registry(),
    );
    Scheduler::new(store, Arc::new(processor), SchedulerSettings::default())
}

fn gaps(polls: &[Instant]) -> Vec<Duration> {
    polls.windows(2).map(|w| w[1] - w[0]).collect()
}

/// Runs the loop for `duration` of virtual time, then shuts it down.
async fn run_for(store: Arc<MemoryAssetStore>, duration: Duration) {
    let (tx, rx) = watch::channel(false);
    let scheduler = scheduler(store);
    let handle = tokio::spawn(async move { scheduler.run(rx).await });

    tokio::time::sleep(duration).await;
    tx.send(true).unwrap();
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_idle_polls_every_ten_seconds() {
    let store = Arc::new(MemoryAssetStore::default());

    run_for(store.clone(), Duration::from_secs(35)).await;

    let polls = store.polls();
    assert_eq!(polls.len(), 4, "expected polls at 0, 10, 20 and 30s");
    for gap in gaps(&polls) {
        assert!(gap >= Duration::from_secs(10) && gap < Duration::from_secs(11), "{:?}", gap);
    }
}

#[tokio::test(start_paused = true)]
async fn test_store_outage_backs_off_then_recovers() {
    let store = Arc::new(MemoryAssetStore::with_assets(vec![pending_asset(
        "a1", "video",
    )]));
    store.fail_fetches(1);

    run_for(store.clone(), Duration::from_secs(45)).await;

    let polls = store.polls();
    assert!(polls.len() >= 3, "expected a retry after the backoff");
    let gaps = gaps(&polls);
    assert!(gaps[0] >= Duration::from_secs(30) && gaps[0] < Duration::from_secs(31));
    // The retry found work, so the next poll follows without sleeping.
    assert!(gaps[1] < Duration::from_secs(1));

    let asset = store.get("a1").unwrap();
    assert_eq!(asset.status, AssetStatus::Completed);
    assert_eq!(asset.output_url.as_deref(), Some("stub://video/a1"));
}

#[tokio::test(start_paused = true)]
async fn test_work_is_followed_by_an_immediate_poll() {
    let store = Arc::new(MemoryAssetStore::with_assets(vec![
        pending_asset("a1", "job-aid"),
        pending_asset("a2", "spreadsheet"),
    ]));

    run_for(store.clone(), Duration::from_secs(5)).await;

    let polls = store.polls();
    assert_eq!(polls.len(), 2);
    assert!(gaps(&polls)[0] < Duration::from_secs(1));
    assert_eq!(store.get("a1").unwrap().status, AssetStatus::Completed);
    assert_eq!(store.get("a2").unwrap().status, AssetStatus::Failed);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_interrupts_idle_sleep() {
    let store = Arc::new(MemoryAssetStore::default());
    let (tx, rx) = watch::channel(false);
    let scheduler = scheduler(store.clone());
    let started = Instant::now();
    let handle = tokio::spawn(async move { scheduler.run(rx).await });

    tokio::time::sleep(Duration::from_secs(1)).await;
    tx.send(true).unwrap();
    handle.await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(store.polls().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_dropped_shutdown_sender_stops_loop() {
    let store = Arc::new(MemoryAssetStore::default());
    let (tx, rx) = watch::channel(false);
    let scheduler = scheduler(store.clone());
    let handle = tokio::spawn(async move { scheduler.run(rx).await });

    tokio::time::sleep(Duration::from_secs(1)).await;
    drop(tx);
    handle.await.unwrap();

    assert_eq!(store.polls().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_failed_status_writes_trigger_backoff() {
    let store = Arc::new(MemoryAssetStore::with_assets(vec![pending_asset(
        "a1", "video",
    )]));
    store.fail_writes(true);

    run_for(store.clone(), Duration::from_secs(40)).await;

    // Rows the store refused stay pending and are retried after each backoff.
    let polls = store.polls();
    assert_eq!(polls.len(), 2);
    assert!(gaps(&polls)[0] >= Duration::from_secs(30));
    assert_eq!(store.get("a1").unwrap().status, AssetStatus::Processing);
}
