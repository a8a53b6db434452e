// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use once_cell::sync::Lazy;
use std::cell::{Cell, RefCell};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::models::AppData;

static APP: Lazy<(&str, &str, &str)> =
    Lazy::new(|| ("com.alphavelocity", "Stockemi", "stockemi"));

pub const DATA_FILE: &str = "stock-emi-data.json";
pub const SYMBOLS_FILE: &str = "EQUITY_L.csv";
pub const DATA_ENV: &str = "STOCKEMI_DATA";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Malformed data document: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Store rejected write: {0}")]
    Rejected(String),
}

/// Whole-document persistence for the ledger aggregate.
pub trait DataStore {
    /// `Ok(None)` when nothing has been saved yet.
    fn load(&self) -> Result<Option<AppData>, StoreError>;
    fn save(&self, data: &AppData) -> Result<(), StoreError>;
}

pub fn data_dir() -> Result<PathBuf> {
    let proj = ProjectDirs::from(APP.0, APP.1, APP.2)
        .context("Could not determine platform-specific data dir")?;
    let data_dir = proj.data_dir();
    fs::create_dir_all(data_dir).context("Failed to create data dir")?;
    Ok(data_dir.to_path_buf())
}

/// `--data` flag, then `STOCKEMI_DATA`, then the platform data dir.
pub fn resolve_data_path(explicit: Option<&str>) -> Result<PathBuf> {
    if let Some(p) = explicit.map(str::trim).filter(|p| !p.is_empty()) {
        return Ok(PathBuf::from(p));
    }
    if let Ok(p) = std::env::var(DATA_ENV) {
        if !p.trim().is_empty() {
            return Ok(PathBuf::from(p.trim()));
        }
    }
    Ok(data_dir()?.join(DATA_FILE))
}

#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_err(&self, source: io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl DataStore for JsonFileStore {
    fn load(&self) -> Result<Option<AppData>, StoreError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_err(e)),
        };
        let data = serde_json::from_str(&raw)?;
        debug!(path = %self.path.display(), "loaded data document");
        Ok(Some(data))
    }

    fn save(&self, data: &AppData) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.io_err(e))?;
        }
        let body = serde_json::to_string_pretty(data)?;
        // Write beside the target and rename so readers never see half a document.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, body).map_err(|e| self.io_err(e))?;
        fs::rename(&tmp, &self.path).map_err(|e| self.io_err(e))?;
        debug!(path = %self.path.display(), "saved data document");
        Ok(())
    }
}

/// In-process store, mainly for tests. `fail_saves` makes every save error out.
#[derive(Debug, Default)]
pub struct MemoryStore {
    doc: RefCell<Option<AppData>>,
    saves: Cell<usize>,
    fail_saves: Cell<bool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_data(data: AppData) -> Self {
        let store = Self::default();
        store.doc.replace(Some(data));
        store
    }

    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.set(fail);
    }

    pub fn save_count(&self) -> usize {
        self.saves.get()
    }

    pub fn snapshot(&self) -> Option<AppData> {
        self.doc.borrow().clone()
    }
}

impl DataStore for MemoryStore {
    fn load(&self) -> Result<Option<AppData>, StoreError> {
        Ok(self.doc.borrow().clone())
    }

    fn save(&self, data: &AppData) -> Result<(), StoreError> {
        if self.fail_saves.get() {
            return Err(StoreError::Rejected("memory store is read-only".into()));
        }
        self.doc.replace(Some(data.clone()));
        self.saves.set(self.saves.get() + 1);
        Ok(())
    }
}

impl<S: DataStore + ?Sized> DataStore for &S {
    fn load(&self) -> Result<Option<AppData>, StoreError> {
        (**self).load()
    }

    fn save(&self, data: &AppData) -> Result<(), StoreError> {
        (**self).save(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn file_store_reports_missing_document_as_none() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("absent.json"));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn file_store_writes_camel_case_document() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join(DATA_FILE);
        let store = JsonFileStore::new(&path);
        store.save(&AppData::default()).unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"brokerageConfig\""));
        assert!(raw.contains("\"lastUpdated\""));
        assert!(!path.with_extension("json.tmp").exists());

        let back = store.load().unwrap().unwrap();
        assert_eq!(back.brokerage_config, AppData::default().brokerage_config);
    }

    #[test]
    fn file_store_surfaces_malformed_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(DATA_FILE);
        fs::write(&path, "{ not json").unwrap();
        let err = JsonFileStore::new(&path).load().unwrap_err();
        assert!(matches!(err, StoreError::Json(_)));
    }

    #[test]
    fn explicit_data_path_wins() {
        let p = resolve_data_path(Some(" /tmp/ledger.json ")).unwrap();
        assert_eq!(p, PathBuf::from("/tmp/ledger.json"));
    }
}
