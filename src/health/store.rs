//! Health record persistence.
//!
//! # Responsibilities
//! - Map backend id → last two health states
//! - Survive restarts when backed by a file
//!
//! # Design Decisions
//! - `DashMap` for concurrent reads from request tasks and writes from probes
//! - File store writes through on every `set` and reloads on open
//! - Store failures never take the balancer down; callers treat the backend
//!   as not healthy

use std::collections::BTreeMap;
use std::fmt;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use thiserror::Error;

use crate::config::schema::{StoreConfig, StoreKind};
use crate::health::state::HealthRecord;

/// Errors raised by a status store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("status store IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("status store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("status store unavailable: {0}")]
    Unavailable(String),
}

/// Key/value store of backend health records.
pub trait StatusStore: Send + Sync + fmt::Debug {
    /// The stored record, or `None` if the backend was never probed.
    fn lookup(&self, backend_id: &str) -> Result<Option<HealthRecord>, StoreError>;

    /// Replace the record for `backend_id`.
    fn set(&self, backend_id: &str, record: &HealthRecord) -> Result<(), StoreError>;

    /// The stored record, or `unknown/unknown` if the backend was never probed.
    fn get(&self, backend_id: &str) -> Result<HealthRecord, StoreError> {
        Ok(self
            .lookup(backend_id)?
            .unwrap_or_else(|| HealthRecord::unknown(backend_id)))
    }

    /// Initialize a backend to `unknown/unknown`.
    fn reset(&self, backend_id: &str) -> Result<(), StoreError> {
        self.set(backend_id, &HealthRecord::unknown(backend_id))
    }
}

/// Process-lifetime store.
#[derive(Debug, Default)]
pub struct MemoryStatusStore {
    inner: DashMap<String, HealthRecord>,
}

impl MemoryStatusStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StatusStore for MemoryStatusStore {
    fn lookup(&self, backend_id: &str) -> Result<Option<HealthRecord>, StoreError> {
        Ok(self.inner.get(backend_id).map(|r| r.value().clone()))
    }

    fn set(&self, backend_id: &str, record: &HealthRecord) -> Result<(), StoreError> {
        self.inner.insert(backend_id.to_string(), record.clone());
        Ok(())
    }
}

/// Durable store persisted as a JSON object `{ backend_id: record }`.
#[derive(Debug)]
pub struct FileStatusStore {
    inner: DashMap<String, HealthRecord>,
    path: PathBuf,
    /// Serializes file writes.
    write_lock: Mutex<()>,
}

impl FileStatusStore {
    /// Open the store, loading existing records if the file exists.
    ///
    /// The file is a last-known-status cache: unreadable contents are
    /// discarded (every backend reads as unknown) and overwritten on the next
    /// `set`. IO errors such as a missing permission are still returned.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let inner = DashMap::new();
        if path.exists() {
            let reader = BufReader::new(File::open(&path)?);
            match serde_json::from_reader::<_, BTreeMap<String, HealthRecord>>(reader) {
                Ok(map) => {
                    for (k, v) in map {
                        inner.insert(k, v);
                    }
                    tracing::info!(path = ?path, records = inner.len(), "Loaded backend status from file");
                }
                Err(e) if e.is_io() => return Err(StoreError::Serialization(e)),
                Err(e) => {
                    tracing::warn!(path = ?path, error = %e, "Discarding unreadable status file");
                }
            }
        }
        Ok(Self {
            inner,
            path,
            write_lock: Mutex::new(()),
        })
    }

    fn persist(&self) -> Result<(), StoreError> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| StoreError::Unavailable("write lock poisoned".into()))?;

        let snapshot: BTreeMap<String, HealthRecord> = self
            .inner
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();

        let tmp = self.path.with_extension("tmp");
        {
            let mut writer = BufWriter::new(File::create(&tmp)?);
            serde_json::to_writer_pretty(&mut writer, &snapshot)?;
            writer.flush()?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl StatusStore for FileStatusStore {
    fn lookup(&self, backend_id: &str) -> Result<Option<HealthRecord>, StoreError> {
        Ok(self.inner.get(backend_id).map(|r| r.value().clone()))
    }

    fn set(&self, backend_id: &str, record: &HealthRecord) -> Result<(), StoreError> {
        self.inner.insert(backend_id.to_string(), record.clone());
        self.persist()
    }
}

/// Build the store selected by configuration.
pub fn build_store(config: &StoreConfig) -> Result<Arc<dyn StatusStore>, StoreError> {
    Ok(match config.kind {
        StoreKind::Memory => Arc::new(MemoryStatusStore::new()),
        StoreKind::File => Arc::new(FileStatusStore::open(&config.path)?),
    })
}
