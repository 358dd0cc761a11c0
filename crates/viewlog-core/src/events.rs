use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

/// Maximum number of events retained in the ring buffer.
const EVENT_LOG_CAPACITY: usize = 200;

/// A typed event from the catalog/sync pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    CatalogLoaded {
        episodes: usize,
        generation: u64,
    },
    CatalogFailed {
        message: String,
    },
    Reconciled {
        user: String,
        applied: usize,
        skipped_local: usize,
    },
    ReconcileFailed {
        user: String,
        message: String,
    },
    /// A reconcile finished after a newer load replaced the collection.
    ReconcileDiscarded {
        generation: u64,
    },
    Persisted {
        user: String,
        episode_id: u32,
        viewed: bool,
    },
    /// Persist dropped because nobody is signed in.
    PersistSkipped {
        episode_id: u32,
    },
    PersistFailed {
        episode_id: u32,
        message: String,
    },
    CharactersLoaded {
        count: usize,
    },
    CharactersFailed {
        message: String,
    },
    RateLimited {
        attempt: u32,
        delay_ms: u64,
    },
}

impl SyncEvent {
    /// Whether this event should be shown to the user as a dismissible notice.
    pub fn is_notice(&self) -> bool {
        matches!(
            self,
            Self::CatalogFailed { .. }
                | Self::ReconcileFailed { .. }
                | Self::PersistFailed { .. }
                | Self::CharactersFailed { .. }
        )
    }
}

impl std::fmt::Display for SyncEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CatalogLoaded { episodes, .. } => write!(f, "loaded {episodes} episodes"),
            Self::CatalogFailed { message } => write!(f, "could not load episodes: {message}"),
            Self::Reconciled { applied, .. } => write!(f, "synced {applied} viewed flags"),
            Self::ReconcileFailed { message, .. } => {
                write!(f, "could not refresh viewed episodes: {message}")
            }
            Self::ReconcileDiscarded { generation } => {
                write!(f, "discarded stale sync for load #{generation}")
            }
            Self::Persisted { episode_id, viewed, .. } => {
                write!(f, "saved episode {episode_id} (viewed: {viewed})")
            }
            Self::PersistSkipped { episode_id } => {
                write!(f, "episode {episode_id} not saved: not signed in")
            }
            Self::PersistFailed { episode_id, message } => {
                write!(f, "could not save episode {episode_id}: {message}")
            }
            Self::CharactersLoaded { count } => write!(f, "loaded {count} characters"),
            Self::CharactersFailed { message } => write!(f, "could not load characters: {message}"),
            Self::RateLimited { attempt, delay_ms } => {
                write!(f, "rate limited (attempt {attempt}), retrying in {delay_ms} ms")
            }
        }
    }
}

/// A timestamped event entry.
pub type EventEntry = (DateTime<Utc>, SyncEvent);

/// Bounded ring buffer of sync events.
#[derive(Debug)]
pub struct EventLog {
    entries: VecDeque<EventEntry>,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLog {
    pub fn new() -> Self {
        Self {
            entries: VecDeque::with_capacity(EVENT_LOG_CAPACITY),
        }
    }

    /// Push a new event, evicting the oldest if at capacity.
    pub fn push(&mut self, event: SyncEvent) {
        if self.entries.len() >= EVENT_LOG_CAPACITY {
            self.entries.pop_front();
        }
        self.entries.push_back((Utc::now(), event));
    }

    /// Return a snapshot of all entries (newest last).
    pub fn snapshot(&self) -> Vec<EventEntry> {
        self.entries.iter().cloned().collect()
    }

    /// Pending user-facing notices (newest last).
    pub fn notices(&self) -> Vec<EventEntry> {
        self.entries
            .iter()
            .filter(|(_, e)| e.is_notice())
            .cloned()
            .collect()
    }

    /// Drop every notice, keeping the informational entries.
    pub fn dismiss_notices(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|(_, e)| !e.is_notice());
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Thread-safe handle to the event log.
pub type SharedEventLog = Arc<Mutex<EventLog>>;

/// Create a new shared event log.
pub fn shared_event_log() -> SharedEventLog {
    Arc::new(Mutex::new(EventLog::new()))
}

/// Push onto a shared log, ignoring a poisoned lock.
pub(crate) fn record(log: &SharedEventLog, event: SyncEvent) {
    if let Ok(mut log) = log.lock() {
        log.push(event);
    }
}
