use crate::common::{Harness, job_update};
use chrono::Duration;
use fieldsync_lib::application::ports::clock::Clock;
use fieldsync_lib::application::ports::queue_store::MutationPersistence;
use fieldsync_lib::domain::value_objects::MutationStatus;
use fieldsync_lib::{AppError, QueueEvent, RemovalReason};

#[tokio::test]
async fn offline_updates_to_one_job_drain_in_order() {
    let harness = Harness::new(false).await;
    let first = harness
        .engine
        .enqueue_mutation(job_update("J1", "en_route"))
        .await
        .unwrap();
    let second = harness
        .engine
        .enqueue_mutation(job_update("J1", "on_site"))
        .await
        .unwrap();
    assert_eq!(harness.engine.pending_mutations(), 2);

    // オフライン中は何も送らない
    let (report, _) = harness.engine.sync_now().await.unwrap();
    assert!(report.halted_offline);
    assert_eq!(harness.api.call_count(), 0);

    harness.go_online();
    let (report, _) = harness.engine.sync_now().await.unwrap();
    assert_eq!(report.synced, 2);

    let bodies: Vec<String> = harness
        .api
        .calls()
        .iter()
        .map(|call| String::from_utf8(call.body.to_vec()).unwrap())
        .collect();
    assert_eq!(
        bodies,
        vec![
            r#"{"status":"en_route"}"#.to_string(),
            r#"{"status":"on_site"}"#.to_string()
        ]
    );
    assert!(harness.engine.mutation_status(&first).await.is_none());
    assert!(harness.engine.mutation_status(&second).await.is_none());
    assert_eq!(harness.cache.invalidated(), vec!["job/J1", "job/J1"]);
    assert_eq!(harness.engine.pending_mutations(), 0);
    assert!(harness.persistence.load_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn server_errors_back_off_then_sync_with_retry_count_reset() {
    let harness = Harness::new(true).await;
    for _ in 0..3 {
        harness.api.push_status(500, "upstream unavailable");
    }
    harness.api.push_status(200, "{}");

    let mut events = harness.engine.subscribe_mutations();
    let id = harness
        .engine
        .enqueue_mutation(job_update("J1", "complete"))
        .await
        .unwrap();

    let mut delays = Vec::new();
    for attempt in 1..=3 {
        let before = harness.clock.now();
        let (report, _) = harness.engine.sync_now().await.unwrap();
        assert_eq!(report.retried, 1);

        let record = harness.engine.mutation_queue().get(&id).await.unwrap();
        assert_eq!(record.status, MutationStatus::Pending);
        assert_eq!(record.retry_count, attempt);
        assert!(record.last_error.as_deref().unwrap().contains("500"));
        delays.push(record.next_attempt_at - before);

        // backoff 中は再送しない
        let (report, _) = harness.engine.sync_now().await.unwrap();
        assert_eq!(report.attempted(), 0);
        harness.clock.advance(record.next_attempt_at - before);
    }

    let (report, _) = harness.engine.sync_now().await.unwrap();
    assert_eq!(report.synced, 1);
    assert_eq!(harness.api.call_count(), 4);
    assert_eq!(
        delays,
        vec![
            Duration::seconds(2),
            Duration::seconds(4),
            Duration::seconds(8)
        ]
    );

    let mut removed = None;
    while let Ok(event) = events.try_recv() {
        if let QueueEvent::Removed { record, reason } = event {
            removed = Some((record, reason));
        }
    }
    let (record, reason) = removed.expect("removal event");
    assert_eq!(reason, RemovalReason::Synced);
    assert_eq!(record.status, MutationStatus::Synced);
    assert_eq!(record.retry_count, 0);
}

#[tokio::test]
async fn validation_rejection_fails_once_and_waits_for_the_user() {
    let harness = Harness::new(true).await;
    harness
        .api
        .push_status(422, r#"{"error":"notes too long"}"#);
    let id = harness
        .engine
        .enqueue_mutation(job_update("J2", "complete"))
        .await
        .unwrap();

    let (report, _) = harness.engine.sync_now().await.unwrap();
    assert_eq!(report.failed, 1);

    let (report, _) = harness.engine.sync_now().await.unwrap();
    assert_eq!(report.attempted(), 0);
    assert_eq!(harness.api.call_count(), 1);

    let failed = harness.engine.failed_mutations().await;
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].id, id);
    assert_eq!(failed[0].retry_count, 0);
    assert!(failed[0].last_error.as_deref().unwrap().contains("notes too long"));
    assert_eq!(harness.engine.pending_mutations(), 0);

    // 永続化層にも failed のまま残る
    let stored = harness.persistence.load_all().await.unwrap();
    assert_eq!(stored[0].status, MutationStatus::Failed);

    let discarded = harness.engine.discard_mutation(&id).await.unwrap();
    assert_eq!(discarded.id, id);
    assert!(harness.engine.failed_mutations().await.is_empty());
    assert!(harness.persistence.load_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn user_retry_sends_a_failed_mutation_again() {
    let harness = Harness::new(true).await;
    harness.api.push_status(409, "stale version");
    let id = harness
        .engine
        .enqueue_mutation(job_update("J3", "on_site"))
        .await
        .unwrap();
    harness.engine.sync_now().await.unwrap();
    assert_eq!(
        harness.engine.mutation_status(&id).await,
        Some(MutationStatus::Failed)
    );

    let requeued = harness.engine.retry_mutation(&id).await.unwrap();
    assert_eq!(requeued.status, MutationStatus::Pending);
    assert_eq!(requeued.retry_count, 0);

    let (report, _) = harness.engine.sync_now().await.unwrap();
    assert_eq!(report.synced, 1);
    assert_eq!(harness.api.call_count(), 2);
}

#[tokio::test]
async fn discard_of_pending_mutation_is_refused() {
    let harness = Harness::new(false).await;
    let id = harness
        .engine
        .enqueue_mutation(job_update("J1", "en_route"))
        .await
        .unwrap();

    let result = harness.engine.discard_mutation(&id).await;
    assert!(matches!(result, Err(AppError::InvalidTransition(_))));
    assert_eq!(harness.engine.pending_mutations(), 1);
}

#[tokio::test]
async fn backed_off_write_is_not_overtaken_by_a_later_write_to_the_same_job() {
    let harness = Harness::new(true).await;
    harness.api.push_status(503, "busy");

    harness
        .engine
        .enqueue_mutation(job_update("J1", "en_route"))
        .await
        .unwrap();
    harness
        .engine
        .enqueue_mutation(job_update("J1", "on_site"))
        .await
        .unwrap();
    harness
        .engine
        .enqueue_mutation(job_update("J2", "complete"))
        .await
        .unwrap();

    let (report, _) = harness.engine.sync_now().await.unwrap();
    assert_eq!(report.retried, 1);
    assert_eq!(report.synced, 1);

    let endpoints: Vec<String> = harness
        .api
        .calls()
        .iter()
        .map(|call| call.endpoint.as_str().to_string())
        .collect();
    assert_eq!(endpoints, vec!["/jobs/J1", "/jobs/J2"]);

    harness.clock.advance(Duration::seconds(3));
    let (report, _) = harness.engine.sync_now().await.unwrap();
    assert_eq!(report.synced, 2);

    let bodies: Vec<String> = harness.api.calls()[2..]
        .iter()
        .map(|call| String::from_utf8(call.body.to_vec()).unwrap())
        .collect();
    assert_eq!(
        bodies,
        vec![
            r#"{"status":"en_route"}"#.to_string(),
            r#"{"status":"on_site"}"#.to_string()
        ]
    );
}

#[tokio::test]
async fn network_errors_are_retried() {
    let harness = Harness::new(true).await;
    harness
        .api
        .push_error(AppError::Network("connection reset".into()));
    let id = harness
        .engine
        .enqueue_mutation(job_update("J1", "en_route"))
        .await
        .unwrap();

    let (report, _) = harness.engine.sync_now().await.unwrap();
    assert_eq!(report.retried, 1);
    let record = harness.engine.mutation_queue().get(&id).await.unwrap();
    assert_eq!(record.retry_count, 1);
    assert!(record.last_error.unwrap().starts_with("Network error"));
}
