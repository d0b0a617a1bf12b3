// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printer resolver.
//
// Turns "the configured printer, or else something that looks like the
// ticket printer" into a concrete name.  Rules, first match wins:
//
//   1. a configured name is returned as-is, installed or not
//   2. an installed name equal to the fallback, ignoring case
//   3. an installed name whose normalised form equals the fallback's
//   4. an installed name containing every word of the fallback
//   5. otherwise unresolved
//
// An unresolved result carries the fallback's display form ("Ticket
// Printer") as a sentinel.  It normalises to the same key as the fallback,
// so if any installed printer had that name rule 3 would have matched it.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use ticketline_core::error::{Result, TicketlineError};
use ticketline_core::Config;

use crate::catalog::PrinterCatalog;
use crate::store::ConfigStore;

// ---------------------------------------------------------------------------
// Pure policy
// ---------------------------------------------------------------------------

/// Lower-case and drop every non-alphanumeric character.
pub fn normalize(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect()
}

/// Lower-cased alphanumeric words of `name`.
fn words(name: &str) -> Vec<String> {
    name.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Display form of a printer identifier: "ticket-printer" -> "Ticket Printer".
pub fn display_form(identifier: &str) -> String {
    words(identifier)
        .iter()
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Which rule produced a resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchRule {
    Configured,
    Exact,
    Normalized,
    Keywords,
}

/// Outcome of printer resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A name the dispatcher may print to.
    Resolved { name: String, rule: MatchRule },
    /// Nothing matched.  `sentinel` is never an installed printer name.
    Unresolved { sentinel: String },
}

impl Resolution {
    /// The resolved name, or the sentinel.
    pub fn name(&self) -> &str {
        match self {
            Self::Resolved { name, .. } => name,
            Self::Unresolved { sentinel } => sentinel,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved { .. })
    }

    /// The printer to dispatch to, or a `Configuration` error.
    pub fn into_printer(self) -> Result<String> {
        match self {
            Self::Resolved { name, .. } => Ok(name),
            Self::Unresolved { sentinel } => Err(TicketlineError::Configuration(format!(
                "no printer selected and none installed matches \"{sentinel}\""
            ))),
        }
    }
}

/// Apply the resolution rules to a printer listing.
pub fn resolve_name(configured: Option<&str>, installed: &[String], fallback: &str) -> Resolution {
    if let Some(name) = configured.map(str::trim).filter(|n| !n.is_empty()) {
        return Resolution::Resolved {
            name: name.to_string(),
            rule: MatchRule::Configured,
        };
    }

    let resolved = |name: &String, rule| Resolution::Resolved {
        name: name.clone(),
        rule,
    };

    if let Some(name) = installed.iter().find(|n| n.to_lowercase() == fallback.to_lowercase()) {
        return resolved(name, MatchRule::Exact);
    }

    let key = normalize(fallback);
    if !key.is_empty() {
        if let Some(name) = installed.iter().find(|n| normalize(n) == key) {
            return resolved(name, MatchRule::Normalized);
        }
    }

    let needed = words(fallback);
    if !needed.is_empty() {
        if let Some(name) = installed.iter().find(|n| {
            let lower = n.to_lowercase();
            needed.iter().all(|w| lower.contains(w.as_str()))
        }) {
            return resolved(name, MatchRule::Keywords);
        }
    }

    Resolution::Unresolved {
        sentinel: display_form(fallback),
    }
}

/// Find `name` among installed printers: exact, then case-insensitive, then
/// normalised.  Returns the installed spelling.
pub fn find_installed<'a>(name: &str, installed: &'a [String]) -> Option<&'a String> {
    let lower = name.to_lowercase();
    let key = normalize(name);
    installed
        .iter()
        .find(|n| n.as_str() == name)
        .or_else(|| installed.iter().find(|n| n.to_lowercase() == lower))
        .or_else(|| {
            if key.is_empty() {
                None
            } else {
                installed.iter().find(|n| normalize(n) == key)
            }
        })
}

// ---------------------------------------------------------------------------
// PrinterResolver
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Memo {
    revision: u64,
    name: String,
    rule: MatchRule,
}

/// Resolver bound to the live config store and catalog.
///
/// A fallback match is remembered for as long as the config revision is
/// unchanged and the printer is still in the latest listing.
pub struct PrinterResolver {
    catalog: Arc<PrinterCatalog>,
    store: Arc<ConfigStore>,
    fallback: String,
    memo: Mutex<Option<Memo>>,
}

impl PrinterResolver {
    pub fn new(catalog: Arc<PrinterCatalog>, store: Arc<ConfigStore>, fallback: impl Into<String>) -> Self {
        Self {
            catalog,
            store,
            fallback: fallback.into(),
            memo: Mutex::new(None),
        }
    }

    pub fn fallback(&self) -> &str {
        &self.fallback
    }

    pub fn catalog(&self) -> &Arc<PrinterCatalog> {
        &self.catalog
    }

    /// Resolve the printer for the next dispatch.
    ///
    /// Re-reads the config file first so a selection saved by another
    /// process takes effect on the next ticket.  The read runs on the
    /// blocking pool.
    #[instrument(skip(self))]
    pub async fn resolve(&self) -> Resolution {
        let (config, revision) = self.reload_config().await;

        if let Some(name) = config.selected_printer() {
            return resolve_name(Some(name), &[], &self.fallback);
        }

        let installed = self.catalog.list_installed().await;
        let mut memo = self.memo.lock().await;

        if let Some(hit) = memo.as_ref() {
            if hit.revision == revision && installed.contains(&hit.name) {
                debug!(printer = %hit.name, "resolution memo hit");
                return Resolution::Resolved {
                    name: hit.name.clone(),
                    rule: hit.rule,
                };
            }
        }

        let resolution = resolve_name(None, &installed, &self.fallback);
        match &resolution {
            Resolution::Resolved { name, rule } => {
                info!(printer = %name, ?rule, "printer resolved");
                *memo = Some(Memo {
                    revision,
                    name: name.clone(),
                    rule: *rule,
                });
            }
            Resolution::Unresolved { sentinel } => {
                warn!(%sentinel, installed = installed.len(), "no printer resolved");
                *memo = None;
            }
        }
        resolution
    }

    /// Config file contents and the store revision after reading it.
    async fn reload_config(&self) -> (Config, u64) {
        let store = self.store.clone();
        match tokio::task::spawn_blocking(move || (store.load(), store.revision())).await {
            Ok(loaded) => loaded,
            Err(e) => {
                warn!(error = %e, "config reload task failed, using cached config");
                (self.store.current(), self.store.revision())
            }
        }
    }

    /// Forget any remembered fallback match.
    pub async fn invalidate(&self) {
        *self.memo.lock().await = None;
    }

    /// Whether `name` is installed and not offline, in error or paused.
    ///
    /// An inconclusive status answer counts as online.
    pub async fn verify_online(&self, name: &str) -> bool {
        self.find_online(name).await.is_some()
    }

    /// Like [`verify_online`](Self::verify_online), returning the installed
    /// spelling of the printer.
    #[instrument(skip(self))]
    pub async fn find_online(&self, name: &str) -> Option<String> {
        let installed = self.catalog.list_installed().await;
        let Some(found) = find_installed(name, &installed) else {
            info!(printer = %name, "printer not installed");
            return None;
        };

        let status = self.catalog.query_status(found).await;
        let online = !status.blocks_printing();
        info!(printer = %found, %status, online, "printer verified");
        online.then(|| found.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeSystem;

    const FALLBACK: &str = "ticket-printer";

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    // -- policy ------------------------------------------------------------

    #[test]
    fn configured_name_wins_even_if_not_installed() {
        let installed = names(&["ticket-printer"]);
        let r = resolve_name(Some("Ghost"), &installed, FALLBACK);
        assert_eq!(r, Resolution::Resolved { name: "Ghost".into(), rule: MatchRule::Configured });
    }

    #[test]
    fn blank_configured_name_is_ignored() {
        let installed = names(&["ticket-printer"]);
        let r = resolve_name(Some("  "), &installed, FALLBACK);
        assert_eq!(r.name(), "ticket-printer");
    }

    #[test]
    fn exact_match_preserves_installed_casing() {
        let installed = names(&["HP", "TICKET-Printer", "ticket_printer"]);
        let r = resolve_name(None, &installed, FALLBACK);
        assert_eq!(r, Resolution::Resolved { name: "TICKET-Printer".into(), rule: MatchRule::Exact });
    }

    #[test]
    fn normalized_match_ignores_punctuation() {
        let installed = names(&["HP", "Ticket_Printer (USB)", "Ticket Printer"]);
        let r = resolve_name(None, &installed, FALLBACK);
        assert_eq!(r, Resolution::Resolved { name: "Ticket Printer".into(), rule: MatchRule::Normalized });
    }

    #[test]
    fn keywords_match_in_any_order() {
        let installed = names(&["HP", "Printer for tickets #2"]);
        let r = resolve_name(None, &installed, FALLBACK);
        assert_eq!(r.name(), "Printer for tickets #2");
        assert!(matches!(r, Resolution::Resolved { rule: MatchRule::Keywords, .. }));
    }

    #[test]
    fn no_match_yields_sentinel_outside_list() {
        let installed = names(&["HP-LaserJet", "Epson Receipt", "ticket", "printer"]);
        let r = resolve_name(None, &installed, FALLBACK);
        assert!(!r.is_resolved());
        assert_eq!(r.name(), "Ticket Printer");
        assert!(!installed.iter().any(|n| n == r.name()));
        assert!(matches!(r.into_printer(), Err(TicketlineError::Configuration(_))));
    }

    #[test]
    fn empty_list_is_unresolved() {
        assert!(!resolve_name(None, &[], FALLBACK).is_resolved());
    }

    #[test]
    fn normalize_is_idempotent_and_strips() {
        for s in ["Ticket-Printer", "HP LaserJet 1020 (USB)", "ÉPSON_tm-20", "", "--", "İstanbul"] {
            let once = normalize(s);
            assert_eq!(normalize(&once), once, "input {s:?}");
            assert!(once.chars().all(char::is_alphanumeric));
            assert_eq!(once, once.to_lowercase());
        }
        assert_eq!(normalize("Ticket-Printer"), "ticketprinter");
    }

    #[test]
    fn display_form_title_cases_words() {
        assert_eq!(display_form("ticket-printer"), "Ticket Printer");
        assert_eq!(normalize(&display_form("ticket-printer")), normalize("ticket-printer"));
    }

    #[test]
    fn find_installed_prefers_exact_spelling() {
        let installed = names(&["hp laserjet", "HP-LaserJet"]);
        assert_eq!(find_installed("HP-LaserJet", &installed), Some(&installed[1]));
        assert_eq!(find_installed("hp_laserjet", &installed), Some(&installed[0]));
        assert_eq!(find_installed("Epson", &installed), None);
    }

    // -- PrinterResolver -----------------------------------------------------

    fn resolver_with(system: FakeSystem) -> (PrinterResolver, Arc<FakeSystem>, Arc<ConfigStore>, tempfile::TempDir) {
        let dir = tempfile::tempdir().expect("tempdir");
        let system = Arc::new(system);
        let catalog = Arc::new(PrinterCatalog::new(system.clone()));
        let store = Arc::new(ConfigStore::in_dir(dir.path()));
        let resolver = PrinterResolver::new(catalog, store.clone(), FALLBACK);
        (resolver, system, store, dir)
    }

    #[tokio::test]
    async fn configured_printer_skips_catalog() {
        let (resolver, system, store, _dir) = resolver_with(FakeSystem::new(&[]));
        assert!(store.save(&Config { selected_printer: Some("HP".into()) }));

        assert_eq!(resolver.resolve().await.name(), "HP");
        assert_eq!(system.list_calls(), 0);
    }

    #[tokio::test]
    async fn config_change_invalidates_memo() {
        let (resolver, _system, store, _dir) = resolver_with(FakeSystem::new(&["ticket-printer", "HP"]));

        assert_eq!(resolver.resolve().await.name(), "ticket-printer");
        assert!(store.save(&Config { selected_printer: Some("HP".into()) }));
        assert_eq!(resolver.resolve().await.name(), "HP");
        assert!(store.save(&Config::default()));
        assert_eq!(resolver.resolve().await.name(), "ticket-printer");
    }

    #[tokio::test]
    async fn selection_written_outside_the_store_is_picked_up() {
        let (resolver, _system, store, _dir) = resolver_with(FakeSystem::new(&["ticket-printer", "HP"]));
        assert_eq!(resolver.resolve().await.name(), "ticket-printer");

        std::fs::write(store.path(), r#"{"selected_printer":"HP"}"#).expect("write config");
        assert_eq!(resolver.resolve().await.name(), "HP");
    }

    #[tokio::test]
    async fn verify_online_checks_status() {
        let (resolver, system, _store, _dir) = resolver_with(
            FakeSystem::new(&["HP-LaserJet", "Epson"])
                .with_status("HP-LaserJet", "printer HP-LaserJet is idle.")
                .with_status("Epson", "Offline"),
        );

        assert!(resolver.verify_online("hp laserjet").await);
        assert_eq!(resolver.find_online("hp laserjet").await.as_deref(), Some("HP-LaserJet"));
        assert!(!resolver.verify_online("Epson").await);
        assert!(!resolver.verify_online("Ghost").await);
        // Status is queried live each time; an uninstalled name never reaches the OS.
        assert_eq!(system.status_calls(), 3);
        assert_eq!(system.list_calls(), 1);
    }

    #[tokio::test]
    async fn verify_online_fails_open_on_status_error() {
        let (resolver, _system, _store, _dir) =
            resolver_with(FakeSystem::new(&["HP-LaserJet"]).failing_status());
        assert!(resolver.verify_online("HP-LaserJet").await);
    }

    #[tokio::test]
    async fn verify_online_is_false_when_catalog_unavailable() {
        let (resolver, _system, _store, _dir) =
            resolver_with(FakeSystem::new(&["HP-LaserJet"]).failing_list());
        assert!(!resolver.verify_online("HP-LaserJet").await);
    }
}
