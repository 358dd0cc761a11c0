//! Capabilities the sync core needs from the outside world.
//!
//! The catalog client, the identity source and the per-user record store are
//! all injected through these traits so each can be swapped for a fake.

use std::future::Future;
use std::sync::Arc;

use crate::error::{FetchError, StoreError};
use crate::models::{Character, Episode, ViewedRecord};

/// Read-only access to the remote episode/character catalog.
pub trait CatalogFetcher: Send + Sync + 'static {
    /// Fetch the full episode collection in one call.
    fn fetch_all_episodes(&self) -> impl Future<Output = Result<Vec<Episode>, FetchError>> + Send;

    /// Fetch the characters with the given ids. Repeating a call is harmless.
    fn fetch_characters_by_ids(
        &self,
        ids: &[u32],
    ) -> impl Future<Output = Result<Vec<Character>, FetchError>> + Send;
}

/// Source of the signed-in user's stable identifier.
pub trait IdentityProvider: Send + Sync + 'static {
    fn current_user_id(&self) -> Option<String>;
}

/// Per-user persistence of viewed records, one record per episode id.
pub trait RecordStore: Send + Sync + 'static {
    /// Read every record stored under `user_id`.
    fn read_all(
        &self,
        user_id: &str,
    ) -> impl Future<Output = Result<Vec<ViewedRecord>, StoreError>> + Send;

    /// Create or replace the record keyed by `(user_id, record.episode_id)`.
    fn write(
        &self,
        user_id: &str,
        record: &ViewedRecord,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}

impl<T: CatalogFetcher> CatalogFetcher for Arc<T> {
    fn fetch_all_episodes(&self) -> impl Future<Output = Result<Vec<Episode>, FetchError>> + Send {
        (**self).fetch_all_episodes()
    }

    fn fetch_characters_by_ids(
        &self,
        ids: &[u32],
    ) -> impl Future<Output = Result<Vec<Character>, FetchError>> + Send {
        (**self).fetch_characters_by_ids(ids)
    }
}

impl<T: IdentityProvider> IdentityProvider for Arc<T> {
    fn current_user_id(&self) -> Option<String> {
        (**self).current_user_id()
    }
}

impl<T: RecordStore> RecordStore for Arc<T> {
    fn read_all(
        &self,
        user_id: &str,
    ) -> impl Future<Output = Result<Vec<ViewedRecord>, StoreError>> + Send {
        (**self).read_all(user_id)
    }

    fn write(
        &self,
        user_id: &str,
        record: &ViewedRecord,
    ) -> impl Future<Output = Result<(), StoreError>> + Send {
        (**self).write(user_id, record)
    }
}
