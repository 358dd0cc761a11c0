use tokio::sync::watch;
use tracing::{debug, warn};

use crate::error::FetchError;
use crate::events::{self, SharedEventLog, SyncEvent};
use crate::models::{character_ids, Character};
use crate::retry::RetryPolicy;
use crate::traits::CatalogFetcher;

/// Characters of one episode, for a detail view.
pub struct CharacterList<F> {
    fetcher: F,
    retry: RetryPolicy,
    events: SharedEventLog,
    tx: watch::Sender<Vec<Character>>,
}

impl<F: CatalogFetcher> CharacterList<F> {
    pub fn new(fetcher: F, retry: RetryPolicy, events: SharedEventLog) -> Self {
        let (tx, _rx) = watch::channel(Vec::new());
        Self {
            fetcher,
            retry,
            events,
            tx,
        }
    }

    /// Fetch the characters behind `refs` and publish them.
    ///
    /// Unparseable refs are skipped; with nothing left to fetch the list is
    /// simply empty. Rate limiting is retried per the retry policy; any other
    /// failure publishes an empty list and is returned.
    pub async fn load<S: AsRef<str>>(&self, refs: &[S]) -> Result<Vec<Character>, FetchError> {
        let ids = character_ids(refs);
        if ids.is_empty() {
            debug!(refs = refs.len(), "No character ids to fetch");
            self.tx.send_replace(Vec::new());
            return Ok(Vec::new());
        }

        let result = self
            .retry
            .run(
                || self.fetcher.fetch_characters_by_ids(&ids),
                |attempt, delay, _| {
                    let delay_ms = delay.as_millis() as u64;
                    warn!(attempt, delay_ms, "Character fetch rate limited, backing off");
                    events::record(&self.events, SyncEvent::RateLimited { attempt, delay_ms });
                },
            )
            .await;

        match result {
            Ok(characters) => {
                debug!(count = characters.len(), "Loaded characters");
                events::record(
                    &self.events,
                    SyncEvent::CharactersLoaded {
                        count: characters.len(),
                    },
                );
                self.tx.send_replace(characters.clone());
                Ok(characters)
            }
            Err(e) => {
                warn!(error = %e, "Failed to load characters");
                events::record(
                    &self.events,
                    SyncEvent::CharactersFailed {
                        message: e.to_string(),
                    },
                );
                self.tx.send_replace(Vec::new());
                Err(e)
            }
        }
    }

    pub fn current(&self) -> Vec<Character> {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<Character>> {
        self.tx.subscribe()
    }
}
