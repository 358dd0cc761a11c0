//! [`RecordStore`] implementations.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, oneshot};

use crate::error::{StoreError, ViewlogError};
use crate::models::ViewedRecord;
use crate::storage::Storage;
use crate::traits::RecordStore;

/// Record store backed by a SQLite file owned by a dedicated thread.
///
/// `rusqlite::Connection` is not `Sync`, so every query is sent to the actor
/// thread over a channel and answered through a oneshot.
#[derive(Clone)]
pub struct SqliteRecordStore {
    tx: mpsc::UnboundedSender<DbCommand>,
}

enum DbCommand {
    ReadAll {
        user_id: String,
        reply: oneshot::Sender<Result<Vec<ViewedRecord>, ViewlogError>>,
    },
    Write {
        user_id: String,
        record: ViewedRecord,
        reply: oneshot::Sender<Result<(), ViewlogError>>,
    },
}

impl SqliteRecordStore {
    pub fn open(path: &Path) -> Result<Self, ViewlogError> {
        Self::spawn(Storage::open(path)?)
    }

    pub fn open_memory() -> Result<Self, ViewlogError> {
        Self::spawn(Storage::open_memory()?)
    }

    fn spawn(storage: Storage) -> Result<Self, ViewlogError> {
        let (tx, rx) = mpsc::unbounded_channel();

        std::thread::Builder::new()
            .name("db-actor".into())
            .spawn(move || actor_loop(storage, rx))?;

        Ok(Self { tx })
    }
}

impl RecordStore for SqliteRecordStore {
    async fn read_all(&self, user_id: &str) -> Result<Vec<ViewedRecord>, StoreError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(DbCommand::ReadAll {
                user_id: user_id.to_owned(),
                reply,
            })
            .map_err(|_| StoreError::Closed)?;
        rx.await
            .map_err(|_| StoreError::Closed)?
            .map_err(|e| StoreError::Read(e.to_string()))
    }

    async fn write(&self, user_id: &str, record: &ViewedRecord) -> Result<(), StoreError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(DbCommand::Write {
                user_id: user_id.to_owned(),
                record: record.clone(),
                reply,
            })
            .map_err(|_| StoreError::Closed)?;
        rx.await
            .map_err(|_| StoreError::Closed)?
            .map_err(|e| StoreError::Write(e.to_string()))
    }
}

fn actor_loop(storage: Storage, mut rx: mpsc::UnboundedReceiver<DbCommand>) {
    while let Some(cmd) = rx.blocking_recv() {
        match cmd {
            DbCommand::ReadAll { user_id, reply } => {
                let _ = reply.send(storage.viewed_records(&user_id));
            }
            DbCommand::Write {
                user_id,
                record,
                reply,
            } => {
                let _ = reply.send(storage.upsert_viewed_record(&user_id, &record));
            }
        }
    }
    tracing::debug!("DB actor shutting down");
}

/// In-process record store with failure injection.
///
/// Clones share the same records, so a test can keep a handle for
/// inspection after moving one into a [`ViewedStateStore`](crate::viewed::ViewedStateStore).
#[derive(Debug, Clone, Default)]
pub struct MemoryRecordStore {
    inner: Arc<Mutex<MemoryInner>>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    records: HashMap<String, BTreeMap<u32, ViewedRecord>>,
    fail_reads: bool,
    fail_writes: bool,
    reads: usize,
    writes: usize,
    write_attempts: usize,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_inner<T>(&self, f: impl FnOnce(&mut MemoryInner) -> T) -> T {
        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut guard)
    }

    /// Seed a record without counting it as a write.
    pub fn insert(&self, user_id: &str, record: ViewedRecord) {
        self.with_inner(|inner| {
            inner
                .records
                .entry(user_id.to_owned())
                .or_default()
                .insert(record.episode_id, record);
        });
    }

    pub fn records_for(&self, user_id: &str) -> Vec<ViewedRecord> {
        self.with_inner(|inner| {
            inner
                .records
                .get(user_id)
                .map(|m| m.values().cloned().collect())
                .unwrap_or_default()
        })
    }

    pub fn fail_reads(&self, fail: bool) {
        self.with_inner(|inner| inner.fail_reads = fail);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.with_inner(|inner| inner.fail_writes = fail);
    }

    pub fn read_count(&self) -> usize {
        self.with_inner(|inner| inner.reads)
    }

    /// Successful writes.
    pub fn write_count(&self) -> usize {
        self.with_inner(|inner| inner.writes)
    }

    /// Every write call, including rejected ones.
    pub fn write_attempts(&self) -> usize {
        self.with_inner(|inner| inner.write_attempts)
    }
}

impl RecordStore for MemoryRecordStore {
    async fn read_all(&self, user_id: &str) -> Result<Vec<ViewedRecord>, StoreError> {
        self.with_inner(|inner| {
            inner.reads += 1;
            if inner.fail_reads {
                return Err(StoreError::Read("injected read failure".into()));
            }
            Ok(inner
                .records
                .get(user_id)
                .map(|m| m.values().cloned().collect())
                .unwrap_or_default())
        })
    }

    async fn write(&self, user_id: &str, record: &ViewedRecord) -> Result<(), StoreError> {
        self.with_inner(|inner| {
            inner.write_attempts += 1;
            if inner.fail_writes {
                return Err(StoreError::Write("injected write failure".into()));
            }
            inner.writes += 1;
            inner
                .records
                .entry(user_id.to_owned())
                .or_default()
                .insert(record.episode_id, record.clone());
            Ok(())
        })
    }
}
