use super::cycle_report::{CycleReport, Settlement};
use super::mutation_processor::sleep_for;
use super::network_monitor::NetworkMonitor;
use super::retry_policy::{RetryDecision, RetryPolicy};
use super::upload_queue::UploadQueueStore;
use crate::application::ports::cache::ReadCacheInvalidator;
use crate::application::ports::clock::Clock;
use crate::application::ports::remote_api::UploadApi;
use crate::domain::entities::UploadItem;
use crate::domain::value_objects::ServerAssetId;
use crate::shared::error::AppError;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{Mutex, Notify, Semaphore};
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;

/// Uploads queued photos with at most `max_concurrent` requests in flight.
pub struct UploadProcessor {
    store: Arc<UploadQueueStore>,
    api: Arc<dyn UploadApi>,
    cache: Arc<dyn ReadCacheInvalidator>,
    network: NetworkMonitor,
    policy: RetryPolicy,
    clock: Arc<dyn Clock>,
    request_timeout: Duration,
    permits: Arc<Semaphore>,
    gate: Mutex<()>,
    wake: Notify,
}

impl UploadProcessor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<UploadQueueStore>,
        api: Arc<dyn UploadApi>,
        cache: Arc<dyn ReadCacheInvalidator>,
        network: NetworkMonitor,
        policy: RetryPolicy,
        clock: Arc<dyn Clock>,
        request_timeout: Duration,
        max_concurrent: usize,
    ) -> Arc<Self> {
        let max_concurrent = max_concurrent.max(1);
        Arc::new(Self {
            store,
            api,
            cache,
            network,
            policy,
            clock,
            request_timeout,
            permits: Arc::new(Semaphore::new(max_concurrent)),
            gate: Mutex::new(()),
            wake: Notify::new(),
        })
    }

    pub fn trigger(&self) {
        self.wake.notify_one();
    }

    pub async fn run_cycle(self: &Arc<Self>) -> Result<CycleReport, AppError> {
        let Ok(_guard) = self.gate.try_lock() else {
            return Ok(CycleReport::skipped());
        };

        self.store.recover_in_flight().await?;

        let mut report = CycleReport::default();
        let mut tasks: JoinSet<Result<Settlement, AppError>> = JoinSet::new();
        let mut failure: Option<AppError> = None;

        // JoinSet を drop すると実行中のタスクが中断されるので、ループ内では `?` を使わない
        loop {
            let permit = match Arc::clone(&self.permits).acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };

            // permit 待ちの間にオフラインになっていることがあるので取得後に確認する
            if !self.network.is_online() {
                drop(permit);
                report.halted_offline = true;
                tracing::debug!(target: "sync::upload", "offline, halting upload cycle");
                break;
            }

            while let Some(joined) = tasks.try_join_next() {
                settle_joined(joined, &mut report, &mut failure);
            }
            if failure.is_some() {
                break;
            }

            let Some(next) = self.store.next_eligible(self.clock.now()).await else {
                drop(permit);
                match tasks.join_next().await {
                    Some(joined) => {
                        settle_joined(joined, &mut report, &mut failure);
                        continue;
                    }
                    None => break,
                }
            };

            let item = match self.store.mark_uploading(&next.id).await {
                Ok(item) => item,
                Err(err) => {
                    failure = Some(err);
                    break;
                }
            };

            let processor = Arc::clone(self);
            tasks.spawn(async move {
                let _permit = permit;
                processor.upload_one(item).await
            });
        }

        while let Some(joined) = tasks.join_next().await {
            settle_joined(joined, &mut report, &mut failure);
        }

        if let Some(err) = failure {
            return Err(err);
        }

        if report.attempted() > 0 {
            tracing::info!(
                target: "sync::upload",
                synced = report.synced,
                retried = report.retried,
                failed = report.failed,
                halted_offline = report.halted_offline,
                "upload cycle finished"
            );
        }
        Ok(report)
    }

    async fn upload_one(&self, item: UploadItem) -> Result<Settlement, AppError> {
        tracing::debug!(
            target: "sync::upload",
            id = %item.id,
            job_id = %item.job_id,
            asset = %item.local_asset_ref,
            attempt = item.retry_count + 1,
            "uploading photo"
        );

        let result = match tokio::time::timeout(self.request_timeout, self.api.upload(&item)).await
        {
            Ok(Ok(response)) if response.is_success() => response.server_id.ok_or_else(|| {
                AppError::ServerError {
                    status: response.status,
                    message: "upload accepted without a server id".to_string(),
                }
            }),
            Ok(Ok(response)) => Err(AppError::from_status(
                response.status,
                response.message.unwrap_or_default(),
            )),
            Ok(Err(err)) => Err(err),
            Err(_) => Err(AppError::Timeout(format!(
                "no response within {}s",
                self.request_timeout.as_secs_f64()
            ))),
        };

        self.settle(&item, result).await
    }

    async fn settle(
        &self,
        item: &UploadItem,
        result: Result<ServerAssetId, AppError>,
    ) -> Result<Settlement, AppError> {
        let err = match result {
            Ok(server_id) => {
                let synced = self.store.mark_synced(&item.id, server_id).await?;
                self.cache.invalidate_job_photos(&item.job_id).await;
                tracing::info!(
                    target: "sync::upload",
                    id = %item.id,
                    job_id = %item.job_id,
                    server_id = ?synced.server_id,
                    "photo uploaded"
                );
                return Ok(Settlement::Synced);
            }
            Err(err) => err,
        };

        if !err.is_transient() {
            self.store.mark_failed(&item.id, &err.to_string()).await?;
            tracing::warn!(
                target: "sync::upload",
                id = %item.id,
                kind = err.kind(),
                error = %err,
                "photo upload rejected"
            );
            return Ok(Settlement::Failed);
        }

        match self.policy.decide(item.retry_count) {
            RetryDecision::Retry { delay } => {
                self.store
                    .mark_retry(&item.id, &err.to_string(), delay)
                    .await?;
                tracing::warn!(
                    target: "sync::upload",
                    id = %item.id,
                    error = %err,
                    delay_ms = delay.as_millis() as u64,
                    "photo upload failed, backing off"
                );
                Ok(Settlement::Retried)
            }
            RetryDecision::Exhausted => {
                let message = format!("gave up after {} retries: {}", item.retry_count, err);
                self.store.mark_failed(&item.id, &message).await?;
                tracing::warn!(
                    target: "sync::upload",
                    id = %item.id,
                    error = %err,
                    "photo upload retries exhausted"
                );
                Ok(Settlement::Failed)
            }
        }
    }

    pub fn spawn(self: &Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        let processor = Arc::clone(self);
        tokio::spawn(async move { processor.drive(shutdown).await })
    }

    async fn drive(self: Arc<Self>, shutdown: CancellationToken) {
        let mut network_rx = self.network.subscribe();
        let mut events = self.store.subscribe();
        let mut run_now = true;

        loop {
            let mut idle_for = None;
            if run_now {
                run_now = false;
                // キャンセル時は実行中のアップロードを待たずに抜ける
                let outcome = tokio::select! {
                    _ = shutdown.cancelled() => break,
                    outcome = self.run_cycle() => outcome,
                };
                match outcome {
                    Ok(report) if report.skipped => idle_for = Some(self.policy.base_delay()),
                    Ok(_) => {}
                    Err(err) => {
                        tracing::error!(target: "sync::upload", error = %err, "upload cycle aborted");
                        idle_for = Some(self.policy.base_delay());
                    }
                }
            }

            if idle_for.is_none() && self.network.is_online() {
                idle_for = self.store.next_wake_at().await.map(|at| {
                    (at - self.clock.now())
                        .to_std()
                        .unwrap_or(Duration::ZERO)
                });
            }

            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = self.wake.notified() => run_now = true,
                changed = network_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    run_now = network_rx.borrow_and_update().is_online();
                }
                event = events.recv() => match event {
                    Ok(event) => run_now = event.is_wake_trigger(),
                    Err(RecvError::Lagged(_)) => run_now = true,
                    Err(RecvError::Closed) => break,
                },
                _ = sleep_for(idle_for) => run_now = true,
            }
        }

        tracing::debug!(target: "sync::upload", "upload processor stopped");
    }
}

fn settle_joined(
    joined: Result<Result<Settlement, AppError>, JoinError>,
    report: &mut CycleReport,
    failure: &mut Option<AppError>,
) {
    match joined {
        Ok(Ok(settlement)) => report.record(settlement),
        Ok(Err(err)) => {
            failure.get_or_insert(err);
        }
        Err(err) => {
            failure.get_or_insert(AppError::Internal(format!("upload task failed: {err}")));
        }
    }
}
