// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Central service layer: builds the config store, catalog, resolver,
// renderer, dispatcher and intake server once and hands out cheap clones.
//
// The intake server is behind an async mutex because start and stop await.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use ticketline_core::error::{Result, TicketlineError};
use ticketline_core::{Config, MessageBus, PrinterInfo, ServerSettings, TicketRenderer};
use ticketline_print::{
    default_printer_system, ConfigStore, Dispatcher, IntakeServer, PrinterCatalog,
    PrinterResolver, PrinterSystem, Resolution,
};
use ticketline_render::TextTicketRenderer;

use super::data_dir::{self, TICKET_DIR};
use crate::client::IntakeClient;
use crate::coordinator::ShutdownStep;

/// One row of `ticketline printers`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrinterListing {
    pub info: PrinterInfo,
    /// Matches the saved selection.
    pub selected: bool,
    /// The printer the next ticket would go to.
    pub in_use: bool,
}

/// Shared application services.  All fields are Arc-wrapped.
#[derive(Clone)]
pub struct AppServices {
    settings: ServerSettings,
    data_dir: PathBuf,
    store: Arc<ConfigStore>,
    catalog: Arc<PrinterCatalog>,
    resolver: Arc<PrinterResolver>,
    dispatcher: Arc<Dispatcher>,
    intake: Arc<tokio::sync::Mutex<IntakeServer>>,
    bus: MessageBus,
}

impl AppServices {
    /// Initialise every service against the host printer system.
    ///
    /// Creates the data directory and its ticket subdirectory.
    pub fn init(settings: ServerSettings, data_dir_override: Option<&Path>, bus: MessageBus) -> Result<Self> {
        let dir = data_dir::data_dir(data_dir_override)?;
        let tickets = data_dir::data_subdir(&dir, TICKET_DIR)?;
        info!(path = %dir.display(), "initialising app services");

        let renderer = Arc::new(TextTicketRenderer::new(tickets)?);
        Ok(Self::with_backends(settings, dir, bus, default_printer_system(), renderer))
    }

    /// Wire services over explicit backends.
    pub fn with_backends(
        settings: ServerSettings,
        data_dir: PathBuf,
        bus: MessageBus,
        system: Arc<dyn PrinterSystem>,
        renderer: Arc<dyn TicketRenderer>,
    ) -> Self {
        let store = Arc::new(ConfigStore::in_dir(&data_dir));
        let catalog = Arc::new(PrinterCatalog::new(Arc::clone(&system)));
        let resolver = Arc::new(PrinterResolver::new(
            Arc::clone(&catalog),
            Arc::clone(&store),
            settings.fallback_printer.clone(),
        ));
        let dispatcher = Arc::new(Dispatcher::new(
            renderer,
            Arc::clone(&resolver),
            system,
            bus.clone(),
        ));
        let intake = IntakeServer::new(settings.socket_addr(), Arc::clone(&dispatcher), bus.clone());

        Self {
            settings,
            data_dir,
            store,
            catalog,
            resolver,
            dispatcher,
            intake: Arc::new(tokio::sync::Mutex::new(intake)),
            bus,
        }
    }

    pub fn settings(&self) -> &ServerSettings {
        &self.settings
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn config(&self) -> Config {
        self.store.load()
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// HTTP client for this instance's intake address.
    pub fn client(&self) -> Result<IntakeClient> {
        IntakeClient::new(self.settings.base_url())
    }

    // -- Intake server -------------------------------------------------------

    pub async fn start_server(&self) -> Result<SocketAddr> {
        let mut server = self.intake.lock().await;
        server.start().await
    }

    pub async fn stop_server(&self) -> Result<()> {
        let mut server = self.intake.lock().await;
        server.stop().await
    }

    /// Shutdown step that stops the intake server.
    pub fn intake_shutdown_step(&self) -> Box<dyn ShutdownStep> {
        Box::new(IntakeShutdown(self.clone()))
    }

    // -- Printers ------------------------------------------------------------

    /// The printer the next ticket would go to.
    pub async fn resolve(&self) -> Resolution {
        self.resolver.resolve().await
    }

    /// Installed printers with live status, marking the selected one and the
    /// one in use.
    pub async fn printers(&self) -> Vec<PrinterListing> {
        let resolution = self.resolve().await;
        let selected = self.config().selected_printer().map(str::to_string);

        self.catalog
            .printers()
            .await
            .into_iter()
            .map(|info| PrinterListing {
                selected: selected.as_deref() == Some(info.name.as_str()),
                in_use: resolution.is_resolved() && resolution.name() == info.name,
                info,
            })
            .collect()
    }

    /// Save the printer selection.  `None` clears it.
    ///
    /// A named printer must be installed and not offline, in error or paused;
    /// otherwise nothing is saved and a `Resolution` error is returned.  The
    /// installed spelling of the name is what gets saved.
    pub async fn select_printer(&self, name: Option<&str>) -> Result<Config> {
        let requested = name.map(str::trim).filter(|n| !n.is_empty());

        let name = match requested {
            Some(requested) => {
                self.catalog.invalidate().await;
                match self.resolver.find_online(requested).await {
                    Some(installed) => Some(installed),
                    None => {
                        warn!(printer = %requested, "selection rejected");
                        self.bus
                            .warn(format!("Impressora {requested} não encontrada ou indisponível"));
                        return Err(TicketlineError::Resolution(format!(
                            "{requested} is not installed or is offline, in error or paused"
                        )));
                    }
                }
            }
            None => None,
        };

        let config = Config {
            selected_printer: name.clone(),
        };
        if !self.store.save(&config) {
            return Err(TicketlineError::Configuration(format!(
                "could not write {}",
                self.store.path().display()
            )));
        }

        match &name {
            Some(name) => self.bus.info(format!("Impressora selecionada: {name}")),
            None => self.bus.info("Seleção de impressora removida"),
        };
        Ok(config)
    }
}

struct IntakeShutdown(AppServices);

#[async_trait]
impl ShutdownStep for IntakeShutdown {
    fn name(&self) -> &str {
        "intake"
    }

    async fn run(&self) -> Result<()> {
        self.0.stop_server().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use ticketline_core::{bus, PrintJob, PrinterStatus};
    use ticketline_print::DetachedPrint;

    /// Host printer system with a fixed set of printers.
    struct StaticSystem {
        printers: HashMap<String, String>,
        spawned: Mutex<Vec<String>>,
    }

    impl StaticSystem {
        fn new(printers: &[(&str, &str)]) -> Self {
            Self {
                printers: printers
                    .iter()
                    .map(|(n, s)| (n.to_string(), s.to_string()))
                    .collect(),
                spawned: Mutex::default(),
            }
        }
    }

    #[async_trait]
    impl PrinterSystem for StaticSystem {
        fn name(&self) -> &'static str {
            "static"
        }

        async fn list_printers(&self) -> Result<Vec<String>> {
            let mut names: Vec<String> = self.printers.keys().cloned().collect();
            names.sort();
            Ok(names)
        }

        async fn printer_status(&self, printer: &str) -> Result<String> {
            Ok(self.printers.get(printer).cloned().unwrap_or_default())
        }

        async fn clear_queue(&self, _printer: &str) -> Result<()> {
            Ok(())
        }

        fn spawn_print(&self, printer: &str, _file: &Path) -> Result<DetachedPrint> {
            self.spawned.lock().expect("spawned").push(printer.to_string());
            Ok(DetachedPrint::new("static", None, async { Ok(()) }))
        }
    }

    fn services(printers: &[(&str, &str)]) -> (AppServices, tempfile::TempDir) {
        let dir = tempfile::tempdir().expect("tempdir");
        let (bus, _rx) = bus::channel();
        let renderer = Arc::new(TextTicketRenderer::new(dir.path().join(TICKET_DIR)).expect("renderer"));
        let settings = ServerSettings {
            port: 0,
            ..ServerSettings::default()
        };
        let services = AppServices::with_backends(
            settings,
            dir.path().to_path_buf(),
            bus,
            Arc::new(StaticSystem::new(printers)),
            renderer,
        );
        (services, dir)
    }

    #[tokio::test]
    async fn selecting_an_online_printer_persists_it() {
        let (svc, _dir) = services(&[("HP-LaserJet", "printer HP-LaserJet is idle.")]);

        let config = svc.select_printer(Some("hp-laserjet")).await.expect("select");
        assert_eq!(config.selected_printer(), Some("HP-LaserJet"));
        assert_eq!(svc.config().selected_printer(), Some("HP-LaserJet"));
    }

    #[tokio::test]
    async fn selecting_an_offline_printer_is_refused() {
        let (svc, _dir) = services(&[("HP-LaserJet", "Offline")]);

        let err = svc.select_printer(Some("HP-LaserJet")).await.unwrap_err();
        assert!(matches!(err, TicketlineError::Resolution(_)));
        assert_eq!(svc.config(), Config::default());
    }

    #[tokio::test]
    async fn clearing_skips_verification() {
        let (svc, _dir) = services(&[]);
        let config = svc.select_printer(None).await.expect("clear");
        assert_eq!(config, Config::default());
        assert!(svc.data_dir().join("config.json").exists());
    }

    #[tokio::test]
    async fn listing_marks_selected_and_in_use() {
        let (svc, _dir) = services(&[
            ("HP-LaserJet", "printer HP-LaserJet is idle."),
            ("ticket-printer", "printer ticket-printer is idle."),
        ]);

        let rows = svc.printers().await;
        let ticket = rows.iter().find(|r| r.info.name == "ticket-printer").expect("row");
        assert!(ticket.in_use);
        assert!(!ticket.selected);
        assert_eq!(ticket.info.status, PrinterStatus::Ready);

        svc.select_printer(Some("HP-LaserJet")).await.expect("select");
        let rows = svc.printers().await;
        let hp = rows.iter().find(|r| r.info.name == "HP-LaserJet").expect("row");
        assert!(hp.selected && hp.in_use);
    }

    #[tokio::test]
    async fn dispatch_uses_the_saved_selection() {
        let (svc, _dir) = services(&[("HP-LaserJet", "Ready"), ("ticket-printer", "Ready")]);
        svc.select_printer(Some("HP-LaserJet")).await.expect("select");

        let job = PrintJob {
            arrival: svc.dispatcher().next_arrival(),
            code: "A123".into(),
            ..Default::default()
        };
        let out = svc
            .dispatcher()
            .dispatch(job, ticketline_print::TicketKind::Plain)
            .await
            .expect("dispatch");
        assert_eq!(out.printer, "HP-LaserJet");
        assert!(out.ticket.starts_with(svc.data_dir().join(TICKET_DIR)));
    }

    #[tokio::test]
    async fn server_stops_through_shutdown_step() {
        let (svc, _dir) = services(&[]);
        svc.start_server().await.expect("start");

        let step = svc.intake_shutdown_step();
        step.run().await.expect("stop");
        step.run().await.expect("second stop");
    }
}
