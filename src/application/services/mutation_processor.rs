use super::cycle_report::{CycleReport, Settlement};
use super::mutation_queue::MutationQueueStore;
use super::network_monitor::NetworkMonitor;
use super::retry_policy::{AttemptOutcome, RetryDecision, RetryPolicy};
use crate::application::ports::cache::ReadCacheInvalidator;
use crate::application::ports::clock::Clock;
use crate::application::ports::remote_api::{RemoteApi, RemoteRequest};
use crate::domain::entities::MutationRecord;
use crate::shared::error::AppError;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Replays queued mutations against the remote API in strict `created_at`
/// order, one request at a time.
pub struct MutationProcessor {
    store: Arc<MutationQueueStore>,
    api: Arc<dyn RemoteApi>,
    cache: Arc<dyn ReadCacheInvalidator>,
    network: NetworkMonitor,
    policy: RetryPolicy,
    clock: Arc<dyn Clock>,
    request_timeout: Duration,
    gate: Mutex<()>,
    wake: Notify,
}

impl MutationProcessor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<MutationQueueStore>,
        api: Arc<dyn RemoteApi>,
        cache: Arc<dyn ReadCacheInvalidator>,
        network: NetworkMonitor,
        policy: RetryPolicy,
        clock: Arc<dyn Clock>,
        request_timeout: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            api,
            cache,
            network,
            policy,
            clock,
            request_timeout,
            gate: Mutex::new(()),
            wake: Notify::new(),
        })
    }

    /// Asks the background loop to run a cycle as soon as possible.
    pub fn trigger(&self) {
        self.wake.notify_one();
    }

    /// Drains every eligible record, stopping early when the device goes
    /// offline. Returns a skipped report if another cycle holds the gate.
    pub async fn run_cycle(&self) -> Result<CycleReport, AppError> {
        let Ok(_guard) = self.gate.try_lock() else {
            return Ok(CycleReport::skipped());
        };

        // gate を保持している間に processing のものは前回の決着に失敗した残り
        self.store.recover_in_flight().await?;

        let mut report = CycleReport::default();
        loop {
            if !self.network.is_online() {
                report.halted_offline = true;
                tracing::debug!(target: "sync::mutation", "offline, halting mutation cycle");
                break;
            }

            let Some(next) = self.store.next_eligible(self.clock.now()).await else {
                break;
            };
            let settlement = self.process(next).await?;
            report.record(settlement);
        }

        if report.attempted() > 0 {
            tracing::info!(
                target: "sync::mutation",
                synced = report.synced,
                retried = report.retried,
                failed = report.failed,
                halted_offline = report.halted_offline,
                "mutation cycle finished"
            );
        }
        Ok(report)
    }

    async fn process(&self, next: MutationRecord) -> Result<Settlement, AppError> {
        let record = self.store.mark_processing(&next.id).await?;
        let request = RemoteRequest::from(&record);

        tracing::debug!(
            target: "sync::mutation",
            id = %record.id,
            method = %record.method,
            endpoint = %record.endpoint,
            attempt = record.retry_count + 1,
            "sending mutation"
        );

        let outcome = match tokio::time::timeout(self.request_timeout, self.api.execute(&request))
            .await
        {
            Ok(Ok(response)) => AttemptOutcome::from_response(&response),
            Ok(Err(err)) => AttemptOutcome::from_error(err),
            Err(_) => AttemptOutcome::Transient(AppError::Timeout(format!(
                "no response within {}s",
                self.request_timeout.as_secs_f64()
            ))),
        };

        self.settle(&record, outcome).await
    }

    async fn settle(
        &self,
        record: &MutationRecord,
        outcome: AttemptOutcome,
    ) -> Result<Settlement, AppError> {
        match outcome {
            AttemptOutcome::Success => {
                self.store.mark_synced(&record.id).await?;
                self.cache
                    .invalidate_entity(&record.entity_type, &record.entity_id)
                    .await;
                tracing::info!(
                    target: "sync::mutation",
                    id = %record.id,
                    entity = %record.entity_key(),
                    retries = record.retry_count,
                    "mutation synced"
                );
                Ok(Settlement::Synced)
            }
            AttemptOutcome::Transient(err) => match self.policy.decide(record.retry_count) {
                RetryDecision::Retry { delay } => {
                    let updated = self
                        .store
                        .mark_retry(&record.id, &err.to_string(), delay)
                        .await?;
                    tracing::warn!(
                        target: "sync::mutation",
                        id = %record.id,
                        error = %err,
                        retry_count = updated.retry_count,
                        delay_ms = delay.as_millis() as u64,
                        "mutation failed, backing off"
                    );
                    Ok(Settlement::Retried)
                }
                RetryDecision::Exhausted => {
                    let message = format!("gave up after {} retries: {}", record.retry_count, err);
                    self.store.mark_failed(&record.id, &message).await?;
                    tracing::warn!(
                        target: "sync::mutation",
                        id = %record.id,
                        error = %err,
                        "mutation retries exhausted"
                    );
                    Ok(Settlement::Failed)
                }
            },
            AttemptOutcome::Terminal(err) => {
                self.store.mark_failed(&record.id, &err.to_string()).await?;
                tracing::warn!(
                    target: "sync::mutation",
                    id = %record.id,
                    entity = %record.entity_key(),
                    kind = err.kind(),
                    error = %err,
                    "mutation rejected by server"
                );
                Ok(Settlement::Failed)
            }
        }
    }

    /// Starts the background loop. It runs a cycle on enqueue, on user retry,
    /// on reconnect, and when the earliest backoff expires.
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
                // 送信中に止めた場合は次回の restore で再送される
                let outcome = tokio::select! {
                    _ = shutdown.cancelled() => break,
                    outcome = self.run_cycle() => outcome,
                };
                match outcome {
                    Ok(report) if report.skipped => idle_for = Some(self.policy.base_delay()),
                    Ok(_) => {}
                    Err(err) => {
                        tracing::error!(
                            target: "sync::mutation",
                            error = %err,
                            "mutation cycle aborted"
                        );
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
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!(target: "sync::mutation", skipped, "queue events lagged");
                        run_now = true;
                    }
                    Err(RecvError::Closed) => break,
                },
                _ = sleep_for(idle_for) => run_now = true,
            }
        }

        tracing::debug!(target: "sync::mutation", "mutation processor stopped");
    }
}

pub(crate) async fn sleep_for(delay: Option<Duration>) {
    match delay {
        Some(delay) => tokio::time::sleep(delay).await,
        None => std::future::pending::<()>().await,
    }
}
