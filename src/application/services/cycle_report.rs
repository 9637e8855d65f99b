use serde::Serialize;

/// Summary of one processor wake.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub synced: usize,
    pub retried: usize,
    pub failed: usize,
    /// The cycle stopped because the network went offline.
    pub halted_offline: bool,
    /// Another cycle was already running; nothing was attempted.
    pub skipped: bool,
}

impl CycleReport {
    pub fn skipped() -> Self {
        Self {
            skipped: true,
            ..Self::default()
        }
    }

    pub fn attempted(&self) -> usize {
        self.synced + self.retried + self.failed
    }

    pub fn record(&mut self, settlement: Settlement) {
        match settlement {
            Settlement::Synced => self.synced += 1,
            Settlement::Retried => self.retried += 1,
            Settlement::Failed => self.failed += 1,
        }
    }
}

/// How a single record left the `processing`/`uploading` state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    Synced,
    Retried,
    Failed,
}
