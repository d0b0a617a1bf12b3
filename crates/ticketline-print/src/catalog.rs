// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printer catalog: installed printers and their live status.
//
// The installed-printer list is cached for `CACHE_DURATION`.  Refreshes are
// serialised behind the cache lock, so concurrent callers within the window
// share a single OS call.  A failed refresh is never cached and never
// propagated: the caller gets an empty list tagged `Freshness::Unavailable`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

use ticketline_core::{PrinterInfo, PrinterStatus};

use crate::system::PrinterSystem;

/// How long a successful printer listing is reused.
pub const CACHE_DURATION: Duration = Duration::from_secs(30);

/// Where a listing came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Freshness {
    /// Fetched from the OS by this call.
    Fresh,
    /// Served from the cache.
    Cached,
    /// The OS call failed; the list is empty.  Carries the reason.
    Unavailable(String),
}

/// Printer names plus where they came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogSnapshot {
    pub names: Vec<String>,
    pub freshness: Freshness,
}

#[derive(Debug)]
struct CachedList {
    names: Vec<String>,
    fetched_at: Instant,
}

/// Cached view of the host's installed printers.
pub struct PrinterCatalog {
    system: Arc<dyn PrinterSystem>,
    ttl: Duration,
    cache: Mutex<Option<CachedList>>,
}

impl PrinterCatalog {
    pub fn new(system: Arc<dyn PrinterSystem>) -> Self {
        Self::with_ttl(system, CACHE_DURATION)
    }

    pub fn with_ttl(system: Arc<dyn PrinterSystem>, ttl: Duration) -> Self {
        Self {
            system,
            ttl,
            cache: Mutex::new(None),
        }
    }

    pub fn system(&self) -> &Arc<dyn PrinterSystem> {
        &self.system
    }

    /// Installed printer names, cached or freshly fetched.
    #[instrument(skip(self))]
    pub async fn snapshot(&self) -> CatalogSnapshot {
        let mut cache = self.cache.lock().await;

        if let Some(cached) = cache.as_ref() {
            if cached.fetched_at.elapsed() < self.ttl {
                return CatalogSnapshot {
                    names: cached.names.clone(),
                    freshness: Freshness::Cached,
                };
            }
        }

        match self.system.list_printers().await {
            Ok(names) => {
                debug!(count = names.len(), backend = self.system.name(), "printer list refreshed");
                *cache = Some(CachedList {
                    names: names.clone(),
                    fetched_at: Instant::now(),
                });
                CatalogSnapshot {
                    names,
                    freshness: Freshness::Fresh,
                }
            }
            Err(e) => {
                warn!(error = %e, "printer list unavailable");
                CatalogSnapshot {
                    names: Vec::new(),
                    freshness: Freshness::Unavailable(e.to_string()),
                }
            }
        }
    }

    /// Installed printer names.  Empty when the OS cannot be queried.
    pub async fn list_installed(&self) -> Vec<String> {
        self.snapshot().await.names
    }

    /// Live status of one printer.  Never cached.
    ///
    /// `Unknown` when the status tool fails or times out.
    #[instrument(skip(self))]
    pub async fn query_status(&self, name: &str) -> PrinterStatus {
        match self.system.printer_status(name).await {
            Ok(raw) => {
                let status = PrinterStatus::from_raw(&raw);
                debug!(printer = %name, %status, "status queried");
                status
            }
            Err(e) => {
                warn!(printer = %name, error = %e, "status query failed");
                PrinterStatus::Unknown
            }
        }
    }

    /// Every installed printer with its live status.
    pub async fn printers(&self) -> Vec<PrinterInfo> {
        let mut printers = Vec::new();
        for name in self.list_installed().await {
            let status = self.query_status(&name).await;
            printers.push(PrinterInfo { name, status });
        }
        printers
    }

    /// Drop the cached listing so the next call hits the OS.
    pub async fn invalidate(&self) {
        *self.cache.lock().await = None;
    }
}
