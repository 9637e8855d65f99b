use crate::common::{Harness, photo};
use fieldsync_lib::application::ports::queue_store::UploadPersistence;
use fieldsync_lib::application::ports::remote_api::UploadResponse;
use fieldsync_lib::domain::value_objects::UploadStatus;
use fieldsync_lib::{AppError, NetworkState, QueueEvent, RemovalReason};
use std::time::Duration;

#[tokio::test]
async fn eleventh_photo_for_a_job_is_rejected() {
    let harness = Harness::new(false).await;
    for n in 0..10 {
        harness
            .engine
            .enqueue_upload(photo("J1", &format!("/photos/{n}.jpg")))
            .await
            .unwrap();
    }

    let err = harness
        .engine
        .enqueue_upload(photo("J1", "/photos/10.jpg"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::CapacityExceeded(_)));

    // other jobs have their own limit
    harness
        .engine
        .enqueue_upload(photo("J2", "/photos/other.jpg"))
        .await
        .unwrap();
    assert_eq!(harness.engine.pending_uploads(), 11);
}

#[tokio::test]
async fn uploads_record_server_ids_and_refresh_job_photos() {
    let harness = Harness::new(true).await;
    let mut events = harness.engine.subscribe_uploads();
    let first = harness
        .engine
        .enqueue_upload(photo("J1", "/photos/a.jpg"))
        .await
        .unwrap();
    harness
        .engine
        .enqueue_upload(photo("J2", "/photos/b.jpg"))
        .await
        .unwrap();

    let (_, report) = harness.engine.sync_now().await.unwrap();
    assert_eq!(report.synced, 2);
    assert_eq!(harness.engine.pending_uploads(), 0);
    assert_eq!(harness.engine.upload_status(&first).await, None);

    let mut invalidated = harness.cache.invalidated();
    invalidated.sort();
    assert_eq!(invalidated, ["photos/J1", "photos/J2"]);

    let mut server_ids = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let QueueEvent::Removed { record, reason } = event {
            assert_eq!(reason, RemovalReason::Synced);
            server_ids.push(record.server_id.unwrap().to_string());
        }
    }
    server_ids.sort();
    assert_eq!(server_ids, ["asset-0", "asset-1"]);
    assert!(
        UploadPersistence::load_all(harness.persistence.as_ref())
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn at_most_two_uploads_run_at_once() {
    let harness = Harness::new(true).await;
    let pending = harness.engine.watch_pending_uploads();
    for n in 0..6 {
        harness
            .engine
            .enqueue_upload(photo("J1", &format!("/photos/{n}.jpg")))
            .await
            .unwrap();
    }

    let (_, report) = harness.engine.sync_now().await.unwrap();
    assert_eq!(report.synced, 6);
    assert_eq!(harness.uploads.uploaded().len(), 6);
    assert_eq!(harness.uploads.peak_concurrency(), 2);
    assert_eq!(*pending.borrow(), 0);
}

#[tokio::test]
async fn rejected_upload_can_be_retried_or_discarded() {
    let harness = Harness::new(true).await;
    harness
        .uploads
        .push(UploadResponse::rejected(413, "photo too large"));
    harness
        .uploads
        .push(UploadResponse::rejected(415, "unsupported format"));
    let large = harness
        .engine
        .enqueue_upload(photo("J1", "/photos/large.jpg"))
        .await
        .unwrap();

    let (_, report) = harness.engine.sync_now().await.unwrap();
    assert_eq!(report.failed, 1);
    let failed = harness.engine.failed_uploads().await;
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].id, large);
    assert_eq!(failed[0].status, UploadStatus::Failed);
    assert!(failed[0].last_error.as_deref().unwrap().contains("413"));
    assert_eq!(harness.engine.pending_uploads(), 0);

    harness.engine.retry_upload(&large).await.unwrap();
    assert_eq!(
        harness.engine.upload_status(&large).await,
        Some(UploadStatus::Pending)
    );
    let (_, report) = harness.engine.sync_now().await.unwrap();
    assert_eq!(report.failed, 1);

    let discarded = harness.engine.discard_upload(&large).await.unwrap();
    assert_eq!(discarded.id, large);
    assert!(harness.engine.failed_uploads().await.is_empty());
    assert_eq!(harness.engine.upload_status(&large).await, None);
}

#[tokio::test]
async fn going_offline_while_both_slots_are_busy_starts_no_new_upload() {
    let harness = Harness::new(true).await;
    let network = harness.network.clone();
    harness.uploads.on_upload(move |index| {
        if index == 1 {
            let network = network.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(5)).await;
                network.publish(NetworkState::offline());
            });
        }
    });

    let mut ids = Vec::new();
    for n in 0..4 {
        ids.push(
            harness
                .engine
                .enqueue_upload(photo("J1", &format!("/photos/{n}.jpg")))
                .await
                .unwrap(),
        );
    }

    let (_, report) = harness.engine.sync_now().await.unwrap();
    assert!(report.halted_offline);
    assert_eq!(report.synced, 2);
    assert_eq!(harness.uploads.started(), 2);
    for id in &ids[2..] {
        assert_eq!(
            harness.engine.upload_status(id).await,
            Some(UploadStatus::Pending)
        );
    }
    assert_eq!(harness.engine.pending_uploads(), 2);

    harness.go_online();
    let (_, report) = harness.engine.sync_now().await.unwrap();
    assert_eq!(report.synced, 2);
    assert_eq!(harness.uploads.started(), 4);
}
