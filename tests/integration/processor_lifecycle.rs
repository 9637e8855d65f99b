use crate::common::{Harness, ManualClock, RecordingCache, job_update, memory_persistence, photo};
use async_trait::async_trait;
use fieldsync_lib::application::ports::queue_store::{MutationPersistence, UploadPersistence};
use fieldsync_lib::application::ports::remote_api::{RemoteApi, RemoteRequest, RemoteResponse};
use fieldsync_lib::application::services::MutationProcessor;
use fieldsync_lib::{
    AppError, ConnectionType, MutationQueueStore, NetworkMonitor, NetworkState, QueueEvent,
    RemovalReason, RetryPolicy,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Default)]
struct SlowApi {
    active: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
}

#[async_trait]
impl RemoteApi for SlowApi {
    async fn execute(&self, _request: &RemoteRequest) -> Result<RemoteResponse, AppError> {
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(active, Ordering::SeqCst);
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(RemoteResponse::new(204, Vec::new()))
    }
}

#[tokio::test]
async fn overlapping_cycles_never_send_two_mutations_at_once() {
    let persistence = memory_persistence().await;
    let clock = ManualClock::new();
    let store = Arc::new(MutationQueueStore::new(persistence, clock.clone()));
    let api = Arc::new(SlowApi::default());
    let processor = MutationProcessor::new(
        store.clone(),
        api.clone(),
        Arc::new(RecordingCache::default()),
        NetworkMonitor::new(NetworkState::online(ConnectionType::Ethernet)),
        RetryPolicy::default().without_jitter(),
        clock,
        Duration::from_secs(30),
    );
    for n in 0..3 {
        store
            .enqueue(job_update(&format!("J{n}"), "en_route"))
            .await
            .unwrap();
    }

    let (a, b) = tokio::join!(processor.run_cycle(), processor.run_cycle());
    let (a, b) = (a.unwrap(), b.unwrap());

    assert!(a.skipped != b.skipped);
    assert_eq!(a.synced + b.synced, 3);
    assert_eq!(api.peak.load(Ordering::SeqCst), 1);
    assert_eq!(api.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn going_offline_halts_after_the_in_flight_call() {
    let harness = Harness::new(true).await;
    let network = harness.network.clone();
    harness.api.on_call(move |index| {
        if index == 0 {
            network.publish(NetworkState::offline());
        }
    });

    for status in ["en_route", "on_site", "complete"] {
        harness
            .engine
            .enqueue_mutation(job_update("J1", status))
            .await
            .unwrap();
    }

    let (report, _) = harness.engine.sync_now().await.unwrap();
    assert_eq!(report.synced, 1);
    assert!(report.halted_offline);
    assert_eq!(harness.engine.pending_mutations(), 2);

    harness.go_online();
    let (report, _) = harness.engine.sync_now().await.unwrap();
    assert_eq!(report.synced, 2);
    assert_eq!(harness.api.call_count(), 3);
}

#[tokio::test]
async fn background_processor_drains_on_enqueue() {
    let harness = Harness::new(true).await;
    harness.engine.init().await.unwrap();
    let mut events = harness.engine.subscribe_mutations();

    let id = harness
        .engine
        .enqueue_mutation(job_update("J5", "complete"))
        .await
        .unwrap();

    let removed = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let QueueEvent::Removed { record, reason } = events.recv().await.unwrap() {
                return (record, reason);
            }
        }
    })
    .await
    .expect("mutation synced in background");

    assert_eq!(removed.0.id, id);
    assert_eq!(removed.1, RemovalReason::Synced);
    harness.engine.teardown().await;
    assert!(!harness.engine.is_running().await);
}

#[tokio::test]
async fn reconnect_wakes_the_background_processor() {
    let harness = Harness::new(false).await;
    harness.engine.init().await.unwrap();
    let mut pending = harness.engine.watch_pending_mutations();

    harness
        .engine
        .enqueue_mutation(job_update("J6", "on_site"))
        .await
        .unwrap();
    pending.wait_for(|count| *count == 1).await.unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(harness.api.call_count(), 0);

    harness.go_online();
    tokio::time::timeout(Duration::from_secs(5), pending.wait_for(|count| *count == 0))
        .await
        .expect("queue drained after reconnect")
        .unwrap();
    assert_eq!(harness.api.call_count(), 1);

    harness.engine.teardown().await;
}

#[tokio::test]
async fn reset_wipes_both_queues() {
    let harness = Harness::new(false).await;
    harness.engine.init().await.unwrap();
    let mut events = harness.engine.subscribe_mutations();

    harness
        .engine
        .enqueue_mutation(job_update("J1", "en_route"))
        .await
        .unwrap();
    harness
        .engine
        .enqueue_upload(photo("J1", "/photos/a.jpg"))
        .await
        .unwrap();

    harness.engine.reset().await.unwrap();

    assert_eq!(harness.engine.pending_mutations(), 0);
    assert_eq!(harness.engine.pending_uploads(), 0);
    assert!(!harness.engine.is_running().await);
    assert!(
        MutationPersistence::load_all(harness.persistence.as_ref())
            .await
            .unwrap()
            .is_empty()
    );
    assert!(
        UploadPersistence::load_all(harness.persistence.as_ref())
            .await
            .unwrap()
            .is_empty()
    );

    let mut saw_reset = false;
    while let Ok(event) = events.try_recv() {
        saw_reset |= event == QueueEvent::Reset;
    }
    assert!(saw_reset);
}

#[tokio::test]
async fn requested_sync_wakes_the_background_processor() {
    let harness = Harness::new(true).await;
    harness.api.push_status(503, "maintenance");
    harness
        .engine
        .enqueue_mutation(job_update("J7", "complete"))
        .await
        .unwrap();
    let (report, _) = harness.engine.sync_now().await.unwrap();
    assert_eq!(report.retried, 1);

    harness.engine.init().await.unwrap();
    let mut pending = harness.engine.watch_pending_mutations();

    harness.clock.advance(chrono::Duration::seconds(3));
    harness.engine.request_sync();

    tokio::time::timeout(Duration::from_secs(5), pending.wait_for(|count| *count == 0))
        .await
        .expect("retry sent after wake")
        .unwrap();
    assert_eq!(harness.api.call_count(), 2);
    harness.engine.teardown().await;
}
