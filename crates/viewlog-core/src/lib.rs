//! Episode catalog and viewed-state synchronization.
//!
//! [`catalog::EpisodeCatalog`] owns the session's episode list and
//! [`viewed::ViewedStateStore`] mirrors its viewed flags to a per-user
//! [`traits::RecordStore`]. The HTTP catalog, the identity source and the
//! record store are all injected through the traits in [`traits`].

pub mod catalog;
pub mod characters;
pub mod config;
pub mod error;
pub mod events;
pub mod identity;
pub mod models;
pub mod retry;
pub mod stats;
pub mod storage;
pub mod store;
pub mod traits;
pub mod viewed;

#[cfg(test)]
mod testing;

pub use catalog::{EpisodeCatalog, ReconcileOutcome};
pub use characters::CharacterList;
pub use error::{CatalogError, FetchError, StoreError, ViewlogError};
pub use viewed::{PersistOutcome, ViewedStateStore, WriteFailurePolicy};
