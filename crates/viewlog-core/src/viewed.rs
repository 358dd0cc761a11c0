//! Mirror between in-memory viewed flags and the per-user record store.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::events::{self, SharedEventLog, SyncEvent};
use crate::models::{Episode, ViewedRecord};
use crate::retry::RetryPolicy;
use crate::traits::{IdentityProvider, RecordStore};

/// What `persist` does when the record store rejects a write.
///
/// The in-memory flag is never rolled back whichever policy is chosen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteFailurePolicy {
    /// Swallow the failure after logging it.
    #[default]
    Log,
    /// Log it and leave a dismissible notice in the event log.
    Notify,
    /// Retry with the store's retry policy, then notify.
    Retry,
}

/// Viewed flags read from the store for one user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteViewed {
    pub user: String,
    pub flags: HashMap<u32, bool>,
}

/// Result of persisting one episode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistOutcome {
    Written,
    /// Nobody is signed in; the write was dropped.
    NoUser,
    /// The store rejected the write and the failure policy absorbed it.
    Failed(StoreError),
}

/// Owns all reads and writes of remote viewed records.
pub struct ViewedStateStore<I, R> {
    identity: I,
    records: R,
    write_failure: WriteFailurePolicy,
    retry: RetryPolicy,
    events: SharedEventLog,
}

impl<I: IdentityProvider, R: RecordStore> ViewedStateStore<I, R> {
    pub fn new(identity: I, records: R, events: SharedEventLog) -> Self {
        Self {
            identity,
            records,
            write_failure: WriteFailurePolicy::default(),
            retry: RetryPolicy::none(),
            events,
        }
    }

    pub fn with_write_failure(mut self, policy: WriteFailurePolicy) -> Self {
        self.write_failure = policy;
        self
    }

    /// Retry policy used by [`WriteFailurePolicy::Retry`].
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn identity(&self) -> &I {
        &self.identity
    }

    pub fn events(&self) -> &SharedEventLog {
        &self.events
    }

    /// Bulk-read the signed-in user's records.
    ///
    /// Returns `Ok(None)` when nobody is signed in. Read failures are logged
    /// as a notice and returned; nothing is retried.
    pub async fn fetch_remote(&self) -> Result<Option<RemoteViewed>, StoreError> {
        let Some(user) = self.identity.current_user_id() else {
            debug!("No signed-in user, skipping reconcile");
            return Ok(None);
        };

        match self.records.read_all(&user).await {
            Ok(records) => {
                let flags = records.into_iter().map(|r| (r.episode_id, r.viewed)).collect();
                Ok(Some(RemoteViewed { user, flags }))
            }
            Err(e) => {
                warn!(user = %user, error = %e, "Failed to read viewed records");
                events::record(
                    &self.events,
                    SyncEvent::ReconcileFailed {
                        user,
                        message: e.to_string(),
                    },
                );
                Err(e)
            }
        }
    }

    /// Create or replace the record for `episode` under the signed-in user.
    pub async fn persist(&self, episode: &Episode) -> PersistOutcome {
        let Some(user) = self.identity.current_user_id() else {
            debug!(episode_id = episode.id, "No signed-in user, dropping persist");
            events::record(
                &self.events,
                SyncEvent::PersistSkipped {
                    episode_id: episode.id,
                },
            );
            return PersistOutcome::NoUser;
        };

        let record = ViewedRecord::from_episode(episode);
        let result = match self.write_failure {
            WriteFailurePolicy::Retry => {
                self.retry
                    .run(
                        || self.records.write(&user, &record),
                        |attempt, delay, err| {
                            warn!(
                                episode_id = record.episode_id,
                                attempt,
                                delay_ms = delay.as_millis() as u64,
                                error = %err,
                                "Retrying viewed record write"
                            );
                        },
                    )
                    .await
            }
            WriteFailurePolicy::Log | WriteFailurePolicy::Notify => {
                self.records.write(&user, &record).await
            }
        };

        match result {
            Ok(()) => {
                debug!(
                    user = %user,
                    episode_id = episode.id,
                    viewed = episode.viewed,
                    "Persisted"
                );
                events::record(
                    &self.events,
                    SyncEvent::Persisted {
                        user,
                        episode_id: episode.id,
                        viewed: episode.viewed,
                    },
                );
                PersistOutcome::Written
            }
            Err(e) => {
                warn!(
                    user = %user,
                    episode_id = episode.id,
                    error = %e,
                    "Failed to persist viewed flag"
                );
                if self.write_failure != WriteFailurePolicy::Log {
                    events::record(
                        &self.events,
                        SyncEvent::PersistFailed {
                            episode_id: episode.id,
                            message: e.to_string(),
                        },
                    );
                }
                PersistOutcome::Failed(e)
            }
        }
    }
}

/// Copy remote flags onto matching episodes, leaving ids `skip` accepts alone.
///
/// Returns `(applied, skipped)` counts over episodes that had a record.
pub(crate) fn apply_flags(
    episodes: &mut [Episode],
    flags: &HashMap<u32, bool>,
    skip: impl Fn(u32) -> bool,
) -> (usize, usize) {
    let mut applied = 0;
    let mut skipped = 0;
    for episode in episodes.iter_mut() {
        if let Some(&viewed) = flags.get(&episode.id) {
            if skip(episode.id) {
                skipped += 1;
                continue;
            }
            episode.viewed = viewed;
            applied += 1;
        }
    }
    (applied, skipped)
}
