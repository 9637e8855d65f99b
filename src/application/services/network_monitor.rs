use crate::domain::entities::NetworkState;
use std::sync::Arc;
use tokio::sync::watch;

/// Process-wide connectivity signal.
///
/// Platform adapters call [`NetworkMonitor::publish`]; every change is visible
/// to all [`watch::Receiver`]s before `publish` returns.
#[derive(Clone)]
pub struct NetworkMonitor {
    sender: Arc<watch::Sender<NetworkState>>,
}

impl NetworkMonitor {
    pub fn new(initial: NetworkState) -> Self {
        let (sender, _) = watch::channel(initial);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Publishes a new state. Returns `true` when the update moved the
    /// device from offline to online.
    pub fn publish(&self, state: NetworkState) -> bool {
        let previous = self.sender.send_replace(state);
        if previous == state {
            return false;
        }

        let came_online = !previous.is_online() && state.is_online();
        if came_online {
            tracing::info!(
                target: "sync::network",
                connection = %state.connection_type,
                "network online"
            );
        } else if previous.is_online() && !state.is_online() {
            tracing::info!(
                target: "sync::network",
                connected = state.is_connected,
                reachable = ?state.is_internet_reachable,
                "network offline"
            );
        } else {
            tracing::debug!(
                target: "sync::network",
                connection = %state.connection_type,
                reachable = ?state.is_internet_reachable,
                "network state changed"
            );
        }
        came_online
    }

    pub fn current(&self) -> NetworkState {
        *self.sender.borrow()
    }

    pub fn is_online(&self) -> bool {
        self.current().is_online()
    }

    pub fn subscribe(&self) -> watch::Receiver<NetworkState> {
        self.sender.subscribe()
    }
}

impl Default for NetworkMonitor {
    fn default() -> Self {
        Self::new(NetworkState::offline())
    }
}
