// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scripted printer subsystem for unit tests.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use ticketline_core::error::{Result, TicketlineError};

use crate::system::{DetachedPrint, PrinterSystem};

/// Fake backend that records every call.
#[derive(Default)]
pub(crate) struct FakeSystem {
    printers: Vec<String>,
    statuses: HashMap<String, String>,
    list_fails: bool,
    status_fails: bool,
    clear_fails: bool,
    spawn_fails: bool,
    list_calls: AtomicUsize,
    status_calls: AtomicUsize,
    clear_calls: AtomicUsize,
    spawned: Mutex<Vec<(String, PathBuf)>>,
}

impl FakeSystem {
    pub fn new(printers: &[&str]) -> Self {
        Self {
            printers: printers.iter().map(|p| p.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn with_status(mut self, printer: &str, raw: &str) -> Self {
        self.statuses.insert(printer.into(), raw.into());
        self
    }

    pub fn failing_list(mut self) -> Self {
        self.list_fails = true;
        self
    }

    pub fn failing_status(mut self) -> Self {
        self.status_fails = true;
        self
    }

    pub fn failing_clear(mut self) -> Self {
        self.clear_fails = true;
        self
    }

    pub fn failing_spawn(mut self) -> Self {
        self.spawn_fails = true;
        self
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn clear_calls(&self) -> usize {
        self.clear_calls.load(Ordering::SeqCst)
    }

    /// Every `(printer, file)` a print was spawned for.
    pub fn spawned(&self) -> Vec<(String, PathBuf)> {
        self.spawned.lock().expect("spawned lock").clone()
    }
}

#[async_trait]
impl PrinterSystem for FakeSystem {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn list_printers(&self) -> Result<Vec<String>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.list_fails {
            return Err(TicketlineError::tool("lpstat", "timed out after 10s"));
        }
        Ok(self.printers.clone())
    }

    async fn printer_status(&self, printer: &str) -> Result<String> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        if self.status_fails {
            return Err(TicketlineError::tool("lpstat", "exit status: 1"));
        }
        Ok(self.statuses.get(printer).cloned().unwrap_or_default())
    }

    async fn clear_queue(&self, _printer: &str) -> Result<()> {
        self.clear_calls.fetch_add(1, Ordering::SeqCst);
        if self.clear_fails {
            return Err(TicketlineError::tool("cancel", "exit status: 1"));
        }
        Ok(())
    }

    fn spawn_print(&self, printer: &str, file: &Path) -> Result<DetachedPrint> {
        if self.spawn_fails {
            return Err(TicketlineError::Dispatch("lp: No such file or directory".into()));
        }
        self.spawned
            .lock()
            .expect("spawned lock")
            .push((printer.to_string(), file.to_path_buf()));
        Ok(DetachedPrint::new(format!("fake {printer}"), None, async { Ok(()) }))
    }
}
