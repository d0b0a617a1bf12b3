// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Config store: the single owner of `config.json`.
//
// Reads fail soft to `Config::default()`.  Writes go to a temporary file in
// the same directory and are renamed over the target, so a crash mid-write
// leaves the previous file readable.  All writers serialise on one lock, and
// every successful save bumps a revision counter that caches key on.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError, RwLock};

use tempfile::NamedTempFile;
use tracing::{debug, info, instrument, warn};

use ticketline_core::error::Result;
use ticketline_core::Config;

/// File name of the persisted config inside the data directory.
pub const CONFIG_FILE: &str = "config.json";

/// Owner of the persisted configuration.
#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    current: RwLock<Config>,
    revision: AtomicU64,
    writer: Mutex<()>,
}

impl ConfigStore {
    /// Open the store at `path` and load whatever is there.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let config = read_config(&path);
        Self {
            path,
            current: RwLock::new(config),
            revision: AtomicU64::new(0),
            writer: Mutex::new(()),
        }
    }

    /// Open `config.json` inside `data_dir`.
    pub fn in_dir(data_dir: &Path) -> Self {
        Self::open(data_dir.join(CONFIG_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Re-read the file.  Missing or malformed files yield the default.
    ///
    /// The in-memory copy is replaced, and the revision bumped if it changed.
    pub fn load(&self) -> Config {
        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let config = read_config(&self.path);
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        if *current != config {
            *current = config.clone();
            self.revision.fetch_add(1, Ordering::SeqCst);
        }
        config
    }

    /// Persist `config`.  Returns `false` (and logs) if it could not be written;
    /// the in-memory copy is only updated on success.
    #[instrument(skip(self, config), fields(path = %self.path.display()))]
    pub fn save(&self, config: &Config) -> bool {
        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);

        match write_atomically(&self.path, config) {
            Ok(()) => {
                *self.current.write().unwrap_or_else(PoisonError::into_inner) = config.clone();
                let revision = self.revision.fetch_add(1, Ordering::SeqCst) + 1;
                info!(
                    selected_printer = ?config.selected_printer(),
                    revision,
                    "configuration saved"
                );
                true
            }
            Err(e) => {
                warn!(error = %e, "configuration not saved");
                false
            }
        }
    }

    /// The last loaded or saved configuration.
    pub fn current(&self) -> Config {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Incremented on every change; starts at 0.
    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::SeqCst)
    }
}

fn read_config(path: &Path) -> Config {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "no readable config, using defaults");
            return Config::default();
        }
    };

    match serde_json::from_str(&raw) {
        Ok(config) => config,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "malformed config, using defaults");
            Config::default()
        }
    }
}

fn write_atomically(path: &Path, config: &Config) -> Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let json = serde_json::to_string_pretty(config)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(json.as_bytes())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
