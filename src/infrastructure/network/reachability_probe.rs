use crate::application::services::NetworkMonitor;
use crate::domain::entities::{ConnectionType, NetworkState, Reachability};
use crate::infrastructure::http::TransportError;
use crate::shared::config::NetworkConfig;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Feeds the [`NetworkMonitor`] on hosts that have no OS connectivity
/// callbacks, by polling a health URL.
pub struct ReachabilityProbe {
    client: reqwest::Client,
    url: String,
    interval: Duration,
    monitor: NetworkMonitor,
}

impl ReachabilityProbe {
    pub fn new(
        url: impl Into<String>,
        interval: Duration,
        monitor: NetworkMonitor,
    ) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(PROBE_TIMEOUT)
            .build()
            .map_err(|err| TransportError::ClientBuild(err.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
            interval,
            monitor,
        })
    }

    /// `None` when no probe URL is configured.
    pub fn from_config(
        config: &NetworkConfig,
        monitor: NetworkMonitor,
    ) -> Result<Option<Self>, TransportError> {
        match &config.probe_url {
            Some(url) => Self::new(
                url.clone(),
                Duration::from_secs(config.probe_interval_secs),
                monitor,
            )
            .map(Some),
            None => Ok(None),
        }
    }

    /// Any HTTP response counts as reachable; only transport failures do not.
    pub async fn probe_once(&self) -> NetworkState {
        match self.client.get(&self.url).send().await {
            Ok(_) => NetworkState::new(true, Reachability::Reachable, ConnectionType::Other),
            Err(err) => {
                tracing::debug!(target: "sync::network", url = %self.url, error = %err, "probe failed");
                NetworkState::new(
                    !err.is_connect(),
                    Reachability::Unreachable,
                    ConnectionType::Unknown,
                )
            }
        }
    }

    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        let state = self.probe_once().await;
                        self.monitor.publish(state);
                    }
                }
            }
        })
    }
}
