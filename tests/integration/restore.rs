use crate::common::{Harness, file_persistence, job_update, photo};
use chrono::Duration;
use fieldsync_lib::application::ports::queue_store::MutationPersistence;
use fieldsync_lib::domain::value_objects::{MutationStatus, UploadStatus};

#[tokio::test]
async fn queues_survive_a_restart_and_in_flight_work_is_resent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("queue.db");

    let (ids, upload_id) = {
        let harness = Harness::with_persistence(file_persistence(&path).await, false).await;
        let mut ids = Vec::new();
        for status in ["en_route", "on_site", "complete"] {
            ids.push(
                harness
                    .engine
                    .enqueue_mutation(job_update("J1", status))
                    .await
                    .unwrap(),
            );
            harness.clock.advance(Duration::milliseconds(5));
        }
        let upload_id = harness
            .engine
            .enqueue_upload(photo("J1", "/photos/before.jpg"))
            .await
            .unwrap();

        // crash while the first mutation is on the wire
        harness
            .engine
            .mutation_queue()
            .mark_processing(&ids[0])
            .await
            .unwrap();
        harness.persistence.pool().close().await;
        (ids, upload_id)
    };

    let harness = Harness::with_persistence(file_persistence(&path).await, false).await;
    assert_eq!(harness.engine.mutation_queue().restore().await.unwrap(), 3);
    assert_eq!(harness.engine.upload_queue().restore().await.unwrap(), 1);

    let restored = harness.engine.mutation_queue().snapshot().await;
    let restored_ids: Vec<_> = restored.iter().map(|record| record.id.clone()).collect();
    assert_eq!(restored_ids, ids);
    assert!(
        restored
            .iter()
            .all(|record| record.status == MutationStatus::Pending)
    );
    assert_eq!(restored[0].retry_count, 0);
    assert_eq!(
        harness.engine.upload_status(&upload_id).await,
        Some(UploadStatus::Pending)
    );
    assert_eq!(harness.engine.pending_mutations(), 3);

    harness.clock.advance(Duration::seconds(1));
    harness.go_online();
    let (mutations, uploads) = harness.engine.sync_now().await.unwrap();
    assert_eq!(mutations.synced, 3);
    assert_eq!(uploads.synced, 1);

    let bodies: Vec<serde_json::Value> = harness
        .api
        .calls()
        .iter()
        .map(|call| serde_json::from_slice(&call.body).unwrap())
        .collect();
    let statuses: Vec<&str> = bodies
        .iter()
        .map(|body| body["status"].as_str().unwrap())
        .collect();
    assert_eq!(statuses, ["en_route", "on_site", "complete"]);
    assert!(
        MutationPersistence::load_all(harness.persistence.as_ref())
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn enqueue_before_restore_keeps_both_sets() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("queue.db");

    let persisted = {
        let harness = Harness::with_persistence(file_persistence(&path).await, false).await;
        let id = harness
            .engine
            .enqueue_mutation(job_update("J2", "on_site"))
            .await
            .unwrap();
        harness.persistence.pool().close().await;
        id
    };

    let harness = Harness::with_persistence(file_persistence(&path).await, false).await;
    harness.clock.advance(Duration::seconds(1));
    let early = harness
        .engine
        .enqueue_mutation(job_update("J3", "complete"))
        .await
        .unwrap();
    harness.engine.init().await.unwrap();

    let ids: Vec<_> = harness
        .engine
        .mutation_queue()
        .snapshot()
        .await
        .into_iter()
        .map(|record| record.id)
        .collect();
    assert_eq!(ids, vec![persisted, early]);
    harness.engine.teardown().await;
}
