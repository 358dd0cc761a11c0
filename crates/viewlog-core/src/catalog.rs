//! The session's in-memory episode collection.
//!
//! [`EpisodeCatalog`] is the single owner of the episode list. Every write to
//! it (a load, a reconcile result, a user toggle) goes through one mutex, and
//! every write republishes the whole collection on a `watch` channel.
//!
//! Reconcile results are stamped with the load generation they belong to. A
//! result for an older generation is dropped, and within the current
//! generation an episode the user toggled after the load keeps the user's
//! value even if an earlier remote read disagrees.

use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::error::{CatalogError, StoreError};
use crate::events::{self, SharedEventLog, SyncEvent};
use crate::models::{Episode, EpisodeFilter};
use crate::stats::ViewingStats;
use crate::traits::{CatalogFetcher, IdentityProvider, RecordStore};
use crate::viewed::{apply_flags, RemoteViewed, ViewedStateStore};

/// What a reconcile pass did to the collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Nobody is signed in.
    NoUser,
    Applied {
        applied: usize,
        /// Records ignored because the user edited the episode since the load.
        skipped_local: usize,
    },
    /// The collection was reloaded while the read was in flight.
    Stale,
}

#[derive(Debug, Default)]
struct CatalogState {
    episodes: Vec<Episode>,
    generation: u64,
    /// Episodes toggled locally since the current generation was loaded.
    edited: HashSet<u32>,
}

struct Shared {
    state: Mutex<CatalogState>,
    tx: watch::Sender<Vec<Episode>>,
    events: SharedEventLog,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, CatalogState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn publish(&self, state: &CatalogState) {
        self.tx.send_replace(state.episodes.clone());
    }

    /// Replace the collection and start a new generation.
    fn replace(&self, episodes: Vec<Episode>) -> u64 {
        let mut state = self.lock();
        state.generation += 1;
        state.episodes = episodes;
        state.edited.clear();
        self.publish(&state);
        state.generation
    }

    fn apply_remote(&self, generation: u64, remote: RemoteViewed) -> ReconcileOutcome {
        let mut guard = self.lock();
        if guard.generation != generation {
            drop(guard);
            debug!(generation, "Discarding reconcile for a replaced collection");
            events::record(&self.events, SyncEvent::ReconcileDiscarded { generation });
            return ReconcileOutcome::Stale;
        }

        let state = &mut *guard;
        let edited = &state.edited;
        let (applied, skipped_local) =
            apply_flags(&mut state.episodes, &remote.flags, |id| edited.contains(&id));
        self.publish(state);
        drop(guard);

        info!(user = %remote.user, applied, skipped_local, "Reconciled viewed flags");
        events::record(
            &self.events,
            SyncEvent::Reconciled {
                user: remote.user,
                applied,
                skipped_local,
            },
        );
        ReconcileOutcome::Applied {
            applied,
            skipped_local,
        }
    }
}

async fn reconcile_generation<I: IdentityProvider, R: RecordStore>(
    store: &ViewedStateStore<I, R>,
    shared: &Shared,
    generation: u64,
) -> Result<ReconcileOutcome, StoreError> {
    match store.fetch_remote().await? {
        Some(remote) => Ok(shared.apply_remote(generation, remote)),
        None => Ok(ReconcileOutcome::NoUser),
    }
}

/// Authoritative in-memory episode list for one session.
pub struct EpisodeCatalog<F, I, R> {
    fetcher: F,
    store: Arc<ViewedStateStore<I, R>>,
    shared: Arc<Shared>,
    tasks: Mutex<JoinSet<()>>,
}

impl<F, I, R> EpisodeCatalog<F, I, R>
where
    F: CatalogFetcher,
    I: IdentityProvider,
    R: RecordStore,
{
    pub fn new(fetcher: F, store: ViewedStateStore<I, R>) -> Self {
        let (tx, _rx) = watch::channel(Vec::new());
        let events = store.events().clone();
        Self {
            fetcher,
            store: Arc::new(store),
            shared: Arc::new(Shared {
                state: Mutex::new(CatalogState::default()),
                tx,
                events,
            }),
            tasks: Mutex::new(JoinSet::new()),
        }
    }

    /// Fetch the full collection and replace the in-memory one.
    ///
    /// Returns once the fresh list is published; viewed flags are then
    /// reconciled in the background and published a second time. On failure
    /// the collection becomes empty and the error is returned.
    pub async fn load(&self) -> Result<usize, CatalogError> {
        let mut episodes = match self.fetcher.fetch_all_episodes().await {
            Ok(episodes) => episodes,
            Err(e) => {
                warn!(error = %e, "Failed to load episodes");
                self.shared.replace(Vec::new());
                events::record(
                    &self.shared.events,
                    SyncEvent::CatalogFailed {
                        message: e.to_string(),
                    },
                );
                return Err(e.into());
            }
        };

        let mut seen = HashSet::with_capacity(episodes.len());
        episodes.retain(|e| {
            let fresh = seen.insert(e.id);
            if !fresh {
                warn!(episode_id = e.id, "Dropping duplicate episode id");
            }
            fresh
        });
        for episode in &mut episodes {
            episode.viewed = false;
        }

        let count = episodes.len();
        let generation = self.shared.replace(episodes);
        info!(count, generation, "Loaded episodes");
        events::record(
            &self.shared.events,
            SyncEvent::CatalogLoaded {
                episodes: count,
                generation,
            },
        );

        let store = Arc::clone(&self.store);
        let shared = Arc::clone(&self.shared);
        self.spawn(async move {
            // Failures are already logged and recorded as a notice.
            let _ = reconcile_generation(&store, &shared, generation).await;
        });

        Ok(count)
    }

    /// Reconcile the current collection inline instead of in the background.
    pub async fn reconcile_now(&self) -> Result<ReconcileOutcome, StoreError> {
        let generation = self.shared.lock().generation;
        reconcile_generation(&self.store, &self.shared, generation).await
    }

    /// Mark one episode as viewed or not.
    ///
    /// Memory is updated and published immediately; the write to the record
    /// store happens in the background and its failure never rolls memory
    /// back. An unknown id changes nothing and issues no write.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn set_viewed(&self, episode_id: u32, viewed: bool) -> Result<(), CatalogError> {
        let episode = {
            let mut guard = self.shared.lock();
            let state = &mut *guard;
            let Some(episode) = state.episodes.iter_mut().find(|e| e.id == episode_id) else {
                debug!(episode_id, "Ignoring toggle for unknown episode");
                return Err(CatalogError::NotFoundLocal(episode_id));
            };
            episode.viewed = viewed;
            let updated = episode.clone();
            state.edited.insert(episode_id);
            self.shared.publish(state);
            updated
        };

        debug!(episode_id, viewed, "Toggled viewed flag");
        let store = Arc::clone(&self.store);
        self.spawn(async move {
            store.persist(&episode).await;
        });
        Ok(())
    }

    /// Episodes matching `predicate`, computed fresh on every call.
    pub fn filtered_view(&self, predicate: impl Fn(&Episode) -> bool) -> Vec<Episode> {
        self.shared
            .lock()
            .episodes
            .iter()
            .filter(|e| predicate(e))
            .cloned()
            .collect()
    }

    pub fn filtered(&self, filter: EpisodeFilter) -> Vec<Episode> {
        self.filtered_view(|e| filter.matches(e))
    }

    pub fn snapshot(&self) -> Vec<Episode> {
        self.shared.lock().episodes.clone()
    }

    pub fn get(&self, episode_id: u32) -> Option<Episode> {
        self.shared
            .lock()
            .episodes
            .iter()
            .find(|e| e.id == episode_id)
            .cloned()
    }

    pub fn stats(&self) -> ViewingStats {
        ViewingStats::from_episodes(&self.shared.lock().episodes)
    }

    /// Number of successful or failed loads so far.
    pub fn generation(&self) -> u64 {
        self.shared.lock().generation
    }

    /// Receiver that sees the whole collection after every change.
    pub fn subscribe(&self) -> watch::Receiver<Vec<Episode>> {
        self.shared.tx.subscribe()
    }

    pub fn events(&self) -> &SharedEventLog {
        &self.shared.events
    }

    pub fn store(&self) -> &ViewedStateStore<I, R> {
        &self.store
    }

    /// Wait for every background reconcile and persist spawned so far.
    pub async fn settle(&self) {
        loop {
            let mut tasks = std::mem::take(&mut *self.lock_tasks());
            if tasks.is_empty() {
                return;
            }
            while let Some(result) = tasks.join_next().await {
                if let Err(e) = result {
                    warn!(error = %e, "Background sync task failed");
                }
            }
        }
    }

    fn lock_tasks(&self) -> MutexGuard<'_, JoinSet<()>> {
        self.tasks.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn spawn(&self, task: impl Future<Output = ()> + Send + 'static) {
        let mut tasks = self.lock_tasks();
        while tasks.try_join_next().is_some() {}
        tasks.spawn(task);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::events::shared_event_log;
    use crate::identity::{Session, StaticIdentity};
    use crate::store::MemoryRecordStore;
    use crate::testing::{episode, record, FakeCatalog, GatedStore};

    type TestCatalog<I, R> = EpisodeCatalog<FakeCatalog, I, R>;

    fn catalog<I: IdentityProvider, R: RecordStore>(
        episodes: Vec<Episode>,
        identity: I,
        records: R,
    ) -> TestCatalog<I, R> {
        EpisodeCatalog::new(
            FakeCatalog::with_episodes(episodes),
            ViewedStateStore::new(identity, records, shared_event_log()),
        )
    }

    fn flags(catalog: &TestCatalog<impl IdentityProvider, impl RecordStore>) -> Vec<(u32, bool)> {
        catalog
            .snapshot()
            .iter()
            .map(|e| (e.id, e.viewed))
            .collect()
    }

    #[tokio::test]
    async fn test_load_then_reconcile_applies_remote_flags() {
        let records = MemoryRecordStore::new();
        records.insert("rick", record(1, true));
        let catalog = catalog(
            vec![episode(1), episode(2)],
            StaticIdentity::signed_in("rick"),
            records,
        );

        assert_eq!(catalog.load().await.unwrap(), 2);
        catalog.settle().await;

        assert_eq!(flags(&catalog), vec![(1, true), (2, false)]);
    }

    #[tokio::test]
    async fn test_set_viewed_updates_one_episode_and_persists_once() {
        let records = MemoryRecordStore::new();
        records.insert("rick", record(1, true));
        let catalog = catalog(
            vec![episode(1), episode(2)],
            StaticIdentity::signed_in("rick"),
            records.clone(),
        );
        catalog.load().await.unwrap();
        catalog.settle().await;

        catalog.set_viewed(2, true).unwrap();
        assert_eq!(flags(&catalog), vec![(1, true), (2, true)]);

        catalog.settle().await;
        assert_eq!(records.write_attempts(), 1);
        let stored = records.records_for("rick");
        let ep2 = stored.iter().find(|r| r.episode_id == 2).unwrap();
        assert!(ep2.viewed);
    }

    #[tokio::test]
    async fn test_set_viewed_unknown_id_is_noop() {
        let records = MemoryRecordStore::new();
        let catalog = catalog(
            vec![episode(1), episode(2)],
            StaticIdentity::signed_in("rick"),
            records.clone(),
        );
        catalog.load().await.unwrap();
        catalog.settle().await;
        let before = catalog.snapshot();

        assert_eq!(
            catalog.set_viewed(42, true),
            Err(CatalogError::NotFoundLocal(42))
        );
        catalog.settle().await;

        assert_eq!(catalog.snapshot(), before);
        assert_eq!(records.write_attempts(), 0);
    }

    #[tokio::test]
    async fn test_load_failure_empties_collection() {
        let fake = FakeCatalog::with_episodes(vec![episode(1), episode(2)]);
        fake.push_episodes(Err(FetchError::Network("connection reset".into())));
        let catalog = EpisodeCatalog::new(
            fake,
            ViewedStateStore::new(
                StaticIdentity::anonymous(),
                MemoryRecordStore::new(),
                shared_event_log(),
            ),
        );

        catalog.load().await.unwrap();
        assert_eq!(catalog.snapshot().len(), 2);

        let err = catalog.load().await.unwrap_err();
        assert!(matches!(err, CatalogError::Fetch(FetchError::Network(_))));
        assert!(catalog.snapshot().is_empty());
        assert_eq!(catalog.events().lock().unwrap().notices().len(), 1);
    }

    #[tokio::test]
    async fn test_load_resets_flags_and_drops_duplicate_ids() {
        let mut viewed = episode(1);
        viewed.viewed = true;
        let catalog = catalog(
            vec![viewed, episode(2), episode(1)],
            StaticIdentity::anonymous(),
            MemoryRecordStore::new(),
        );

        assert_eq!(catalog.load().await.unwrap(), 2);
        assert_eq!(flags(&catalog), vec![(1, false), (2, false)]);
    }

    #[tokio::test]
    async fn test_no_user_means_local_only() {
        let records = MemoryRecordStore::new();
        records.insert("rick", record(1, true));
        let catalog = catalog(
            vec![episode(1), episode(2)],
            StaticIdentity::anonymous(),
            records.clone(),
        );

        catalog.load().await.unwrap();
        catalog.settle().await;
        assert_eq!(flags(&catalog), vec![(1, false), (2, false)]);
        assert_eq!(catalog.reconcile_now().await, Ok(ReconcileOutcome::NoUser));

        catalog.set_viewed(2, true).unwrap();
        catalog.settle().await;
        assert_eq!(flags(&catalog), vec![(1, false), (2, true)]);
        assert_eq!(records.read_count(), 0);
        assert_eq!(records.write_attempts(), 0);
    }

    #[tokio::test]
    async fn test_reconcile_twice_is_idempotent() {
        let records = MemoryRecordStore::new();
        records.insert("rick", record(2, true));
        records.insert("rick", record(7, true));
        let catalog = catalog(
            vec![episode(1), episode(2), episode(3)],
            StaticIdentity::signed_in("rick"),
            records,
        );
        catalog.load().await.unwrap();
        catalog.settle().await;
        let once = catalog.snapshot();

        catalog.reconcile_now().await.unwrap();
        assert_eq!(catalog.snapshot(), once);
        assert_eq!(flags(&catalog), vec![(1, false), (2, true), (3, false)]);
    }

    #[tokio::test]
    async fn test_read_failure_leaves_memory_untouched() {
        let records = MemoryRecordStore::new();
        records.insert("rick", record(1, true));
        records.fail_reads(true);
        let catalog = catalog(
            vec![episode(1), episode(2)],
            StaticIdentity::signed_in("rick"),
            records,
        );

        catalog.load().await.unwrap();
        catalog.set_viewed(2, true).unwrap();
        catalog.settle().await;

        assert_eq!(flags(&catalog), vec![(1, false), (2, true)]);
        assert!(matches!(
            catalog.reconcile_now().await,
            Err(StoreError::Read(_))
        ));
    }

    #[tokio::test]
    async fn test_local_edit_survives_slow_reconcile() {
        let records = MemoryRecordStore::new();
        records.insert("rick", record(1, true));
        records.insert("rick", record(2, true));
        let gated = GatedStore::new(records.clone());
        let catalog = catalog(
            vec![episode(1), episode(2)],
            StaticIdentity::signed_in("rick"),
            gated.clone(),
        );

        catalog.load().await.unwrap();
        // Let the reconcile take its snapshot before the user edit lands.
        tokio::task::yield_now().await;
        catalog.set_viewed(1, false).unwrap();
        gated.open();
        catalog.settle().await;

        assert_eq!(flags(&catalog), vec![(1, false), (2, true)]);
        let log = catalog.events().lock().unwrap().snapshot();
        assert!(log.iter().any(|(_, e)| matches!(
            e,
            SyncEvent::Reconciled {
                applied: 1,
                skipped_local: 1,
                ..
            }
        )));
        assert!(!records
            .records_for("rick")
            .iter()
            .find(|r| r.episode_id == 1)
            .unwrap()
            .viewed);
    }

    #[tokio::test]
    async fn test_stale_reconcile_is_discarded() {
        let records = MemoryRecordStore::new();
        records.insert("rick", record(1, true));
        let gated = GatedStore::new(records);
        let catalog = catalog(
            vec![episode(1)],
            StaticIdentity::signed_in("rick"),
            gated.clone(),
        );

        catalog.load().await.unwrap();
        tokio::task::yield_now().await;
        catalog.load().await.unwrap();
        gated.open();
        catalog.settle().await;

        assert_eq!(catalog.generation(), 2);
        assert_eq!(flags(&catalog), vec![(1, true)]);
        let log = catalog.events().lock().unwrap().snapshot();
        assert!(log
            .iter()
            .any(|(_, e)| *e == SyncEvent::ReconcileDiscarded { generation: 1 }));
    }

    #[tokio::test]
    async fn test_observers_receive_whole_collection() {
        let records = MemoryRecordStore::new();
        records.insert("rick", record(2, true));
        let catalog = catalog(
            vec![episode(1), episode(2)],
            StaticIdentity::signed_in("rick"),
            records,
        );
        let mut rx = catalog.subscribe();
        assert!(rx.borrow_and_update().is_empty());

        catalog.load().await.unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().len(), 2);

        catalog.settle().await;
        assert!(rx.borrow_and_update()[1].viewed);

        catalog.set_viewed(1, true).unwrap();
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().iter().all(|e| e.viewed));
    }

    #[tokio::test]
    async fn test_filtered_view_and_stats() {
        let catalog = catalog(
            vec![episode(1), episode(2), episode(3)],
            StaticIdentity::anonymous(),
            MemoryRecordStore::new(),
        );
        catalog.load().await.unwrap();
        catalog.set_viewed(3, true).unwrap();

        let watched = catalog.filtered(EpisodeFilter::Watched);
        assert_eq!(watched.iter().map(|e| e.id).collect::<Vec<_>>(), vec![3]);
        assert_eq!(catalog.filtered(EpisodeFilter::Pending).len(), 2);
        assert_eq!(catalog.filtered_view(|e| e.id < 3).len(), 2);

        let stats = catalog.stats();
        assert_eq!((stats.total, stats.watched, stats.percent), (3, 1, 33));
    }

    #[tokio::test]
    async fn test_sign_out_mid_session_stops_writes() {
        let records = MemoryRecordStore::new();
        let session = Session::new(Some("rick".into()));
        let catalog = catalog(vec![episode(1)], session.clone(), records.clone());
        catalog.load().await.unwrap();

        catalog.set_viewed(1, true).unwrap();
        catalog.settle().await;
        assert_eq!(records.write_count(), 1);

        session.sign_out();
        catalog.set_viewed(1, false).unwrap();
        catalog.settle().await;
        assert_eq!(records.write_attempts(), 1);
        assert!(!catalog.get(1).unwrap().viewed);
    }
}
