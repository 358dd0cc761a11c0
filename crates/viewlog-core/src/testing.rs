//! Fakes shared by the unit tests of this crate.

use std::sync::{Arc, Mutex};

use tokio::sync::Semaphore;

use crate::error::{FetchError, StoreError};
use crate::models::{Character, Episode, ViewedRecord};
use crate::store::MemoryRecordStore;
use crate::traits::{CatalogFetcher, RecordStore};

pub fn episode(id: u32) -> Episode {
    Episode {
        id,
        name: format!("Episode {id}"),
        air_date: "December 2, 2013".into(),
        code: format!("S01E{id:02}"),
        character_refs: vec![
            "https://rickandmortyapi.com/api/character/1".into(),
            "https://rickandmortyapi.com/api/character/2".into(),
        ],
        viewed: false,
    }
}

pub fn record(id: u32, viewed: bool) -> ViewedRecord {
    ViewedRecord {
        viewed,
        ..ViewedRecord::from_episode(&episode(id))
    }
}

pub fn character(id: u32) -> Character {
    Character {
        id,
        name: format!("Character {id}"),
        image: format!("https://rickandmortyapi.com/api/character/avatar/{id}.jpeg"),
        status: "Alive".into(),
        url: format!("https://rickandmortyapi.com/api/character/{id}"),
    }
}

/// Scripted catalog: episode results are served in order, the last one repeats.
#[derive(Clone, Default)]
pub struct FakeCatalog {
    inner: Arc<Mutex<FakeInner>>,
}

#[derive(Default)]
struct FakeInner {
    episode_results: Vec<Result<Vec<Episode>, FetchError>>,
    character_results: Vec<Result<Vec<Character>, FetchError>>,
    character_calls: Vec<Vec<u32>>,
}

impl FakeCatalog {
    pub fn with_episodes(episodes: Vec<Episode>) -> Self {
        let fake = Self::default();
        fake.push_episodes(Ok(episodes));
        fake
    }

    pub fn push_episodes(&self, result: Result<Vec<Episode>, FetchError>) {
        self.inner.lock().unwrap().episode_results.push(result);
    }

    pub fn push_characters(&self, result: Result<Vec<Character>, FetchError>) {
        self.inner.lock().unwrap().character_results.push(result);
    }

    pub fn character_calls(&self) -> Vec<Vec<u32>> {
        self.inner.lock().unwrap().character_calls.clone()
    }

    fn next<T: Clone>(results: &mut Vec<Result<T, FetchError>>) -> Result<T, FetchError> {
        match results.len() {
            0 => Err(FetchError::Network("no scripted response".into())),
            1 => results[0].clone(),
            _ => results.remove(0),
        }
    }
}

impl CatalogFetcher for FakeCatalog {
    async fn fetch_all_episodes(&self) -> Result<Vec<Episode>, FetchError> {
        let mut inner = self.inner.lock().unwrap();
        Self::next(&mut inner.episode_results)
    }

    async fn fetch_characters_by_ids(&self, ids: &[u32]) -> Result<Vec<Character>, FetchError> {
        let mut inner = self.inner.lock().unwrap();
        inner.character_calls.push(ids.to_vec());
        Self::next(&mut inner.character_results)
    }
}

/// Record store whose reads snapshot immediately but only return once the
/// gate has a permit, modelling a slow remote read.
#[derive(Clone)]
pub struct GatedStore {
    pub records: MemoryRecordStore,
    gate: Arc<Semaphore>,
}

impl GatedStore {
    pub fn new(records: MemoryRecordStore) -> Self {
        Self {
            records,
            gate: Arc::new(Semaphore::new(0)),
        }
    }

    pub fn open(&self) {
        self.gate.add_permits(Semaphore::MAX_PERMITS / 2);
    }
}

impl RecordStore for GatedStore {
    async fn read_all(&self, user_id: &str) -> Result<Vec<ViewedRecord>, StoreError> {
        let snapshot = self.records.read_all(user_id).await;
        let _permit = self.gate.acquire().await.map_err(|_| StoreError::Closed)?;
        snapshot
    }

    async fn write(&self, user_id: &str, record: &ViewedRecord) -> Result<(), StoreError> {
        self.records.write(user_id, record).await
    }
}
