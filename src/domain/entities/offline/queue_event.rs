use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalReason {
    Synced,
    Discarded,
}

/// State transition published by a queue store after the change is durable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueueEvent<R> {
    Enqueued { record: R },
    Updated { record: R },
    /// A failed record was handed back to the processor by the user.
    Requeued { record: R },
    Removed { record: R, reason: RemovalReason },
    Restored { count: usize },
    Reset,
}

impl<R> QueueEvent<R> {
    pub fn record(&self) -> Option<&R> {
        match self {
            QueueEvent::Enqueued { record }
            | QueueEvent::Updated { record }
            | QueueEvent::Requeued { record }
            | QueueEvent::Removed { record, .. } => Some(record),
            QueueEvent::Restored { .. } | QueueEvent::Reset => None,
        }
    }

    /// Whether the event may have produced work for a processor.
    pub fn is_wake_trigger(&self) -> bool {
        matches!(
            self,
            QueueEvent::Enqueued { .. }
                | QueueEvent::Requeued { .. }
                | QueueEvent::Restored { .. }
        )
    }
}
