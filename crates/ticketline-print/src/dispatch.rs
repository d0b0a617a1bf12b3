// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Job dispatcher: render -> resolve -> clear queue -> spawn print.
//
// Only three things fail a job: the renderer, an unresolved printer, and a
// print command that cannot be started.  Clearing the queue is best-effort.
// Once the print command is running the job is done as far as the caller is
// concerned; its exit status only reaches the log.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{instrument, warn};

use ticketline_core::error::{Result, TicketlineError};
use ticketline_core::log_digest::Stage;
use ticketline_core::{LogLevel, MessageBus, PrintJob, TicketRenderer};

use crate::resolver::PrinterResolver;
use crate::system::PrinterSystem;

/// Which ticket layout to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketKind {
    Plain,
    Qr,
}

impl TicketKind {
    fn is_qr(self) -> bool {
        self == Self::Qr
    }
}

/// Result of the best-effort queue clear.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueClear {
    Cleared,
    /// The clear failed and was ignored.  Carries the reason.
    Skipped(String),
}

/// A job handed to the spooler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatched {
    pub printer: String,
    pub ticket: PathBuf,
    pub queue: QueueClear,
    pub command: String,
}

/// Runs one print job through the pipeline.
pub struct Dispatcher {
    renderer: Arc<dyn TicketRenderer>,
    resolver: Arc<PrinterResolver>,
    system: Arc<dyn PrinterSystem>,
    bus: MessageBus,
    arrivals: AtomicU64,
}

impl Dispatcher {
    pub fn new(
        renderer: Arc<dyn TicketRenderer>,
        resolver: Arc<PrinterResolver>,
        system: Arc<dyn PrinterSystem>,
        bus: MessageBus,
    ) -> Self {
        Self {
            renderer,
            resolver,
            system,
            bus,
            arrivals: AtomicU64::new(0),
        }
    }

    /// Arrival number for the next accepted job, starting at 1.
    pub fn next_arrival(&self) -> u64 {
        self.arrivals.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn resolver(&self) -> &Arc<PrinterResolver> {
        &self.resolver
    }

    /// Render, resolve and spawn.  Returns once the print command is running.
    #[instrument(skip(self, job), fields(arrival = job.arrival, code = %job.code))]
    pub async fn dispatch(&self, job: PrintJob, kind: TicketKind) -> Result<Dispatched> {
        match self.run(&job, kind).await {
            Ok(dispatched) => Ok(dispatched),
            Err(e) => {
                self.bus.stage(
                    Stage::PrintFailed,
                    LogLevel::Error,
                    format!("Erro ao imprimir {}: {e}", job.label()),
                );
                Err(e)
            }
        }
    }

    async fn run(&self, job: &PrintJob, kind: TicketKind) -> Result<Dispatched> {
        let qr = kind.is_qr();
        let received = match (kind, job.qr_content.as_deref()) {
            (TicketKind::Qr, Some(content)) => {
                format!("/imprimir/qrcode recebido: code={}, qrcode={content}", job.code)
            }
            _ => format!("/imprimir recebido: code={}", job.code),
        };
        self.bus.stage(Stage::Received, LogLevel::Info, received);

        let ticket = self.render(job.clone(), kind).await?;
        self.bus.stage(
            Stage::Rendered,
            LogLevel::Info,
            format!("Senha gerada: {}", ticket.display()),
        );

        let printer = self.resolver.resolve().await.into_printer()?;
        self.bus.stage(
            Stage::Resolved,
            LogLevel::Info,
            format!("Impressora selecionada: {printer}"),
        );

        let queue = self.clear_queue(&printer).await;

        let print = self.system.spawn_print(&printer, &ticket)?;
        let command = print.command().to_string();
        self.bus.stage(
            Stage::Dispatched,
            LogLevel::Info,
            format!("Executando comando: {command}"),
        );

        let bus = self.bus.clone();
        let label = job.label().to_string();
        print.detach(move |outcome| match outcome {
            Ok(()) if qr => {
                bus.stage(
                    Stage::Printed { qr: true },
                    LogLevel::Info,
                    format!("Impressão com QRCode realizada com código {label}"),
                );
            }
            Ok(()) => {
                bus.stage(
                    Stage::Printed { qr: false },
                    LogLevel::Info,
                    format!("Impressão realizada com código {label}"),
                );
            }
            Err(detail) => {
                bus.stage(
                    Stage::PrintFailed,
                    LogLevel::Error,
                    format!("Erro ao executar comando de impressão para {label}: {detail}"),
                );
            }
        });

        Ok(Dispatched {
            printer,
            ticket,
            queue,
            command,
        })
    }

    async fn render(&self, job: PrintJob, kind: TicketKind) -> Result<PathBuf> {
        let renderer = Arc::clone(&self.renderer);
        tokio::task::spawn_blocking(move || match kind {
            TicketKind::Plain => renderer.render_ticket(&job),
            TicketKind::Qr => renderer.render_ticket_with_qr(&job),
        })
        .await
        .map_err(|e| TicketlineError::Render(format!("renderer task failed: {e}")))?
    }

    async fn clear_queue(&self, printer: &str) -> QueueClear {
        match self.system.clear_queue(printer).await {
            Ok(()) => QueueClear::Cleared,
            Err(e) => {
                warn!(printer, error = %e, soft = e.is_soft(), "queue clear skipped");
                self.bus.log(
                    LogLevel::Warn,
                    None,
                    format!("Fila de {printer} não foi limpa: {e}"),
                );
                QueueClear::Skipped(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    use ticketline_core::{bus, Config, ControlMessage};

    use crate::catalog::PrinterCatalog;
    use crate::store::ConfigStore;
    use crate::testing::FakeSystem;

    /// Renderer that writes nothing and names the file after the job.
    struct StubRenderer {
        fail: bool,
    }

    impl TicketRenderer for StubRenderer {
        fn render_ticket(&self, job: &PrintJob) -> Result<PathBuf> {
            if self.fail {
                return Err(TicketlineError::Render("font missing".into()));
            }
            Ok(Path::new("/tmp/ticket").join(format!("{}.txt", job.arrival)))
        }

        fn render_ticket_with_qr(&self, job: &PrintJob) -> Result<PathBuf> {
            if job.qr_content.as_deref().unwrap_or_default().is_empty() {
                return Err(TicketlineError::Render("QR content is empty".into()));
            }
            self.render_ticket(job)
        }
    }

    struct Rig {
        dispatcher: Dispatcher,
        system: Arc<FakeSystem>,
        store: Arc<ConfigStore>,
        rx: ticketline_core::BusReceiver,
        _dir: tempfile::TempDir,
    }

    fn rig(system: FakeSystem, fail_render: bool) -> Rig {
        let dir = tempfile::tempdir().expect("tempdir");
        let system = Arc::new(system);
        let store = Arc::new(ConfigStore::in_dir(dir.path()));
        let catalog = Arc::new(PrinterCatalog::new(system.clone()));
        let resolver = Arc::new(PrinterResolver::new(catalog, store.clone(), "ticket-printer"));
        let (bus, rx) = bus::channel();
        let dispatcher = Dispatcher::new(
            Arc::new(StubRenderer { fail: fail_render }),
            resolver,
            system.clone(),
            bus,
        );
        Rig { dispatcher, system, store, rx, _dir: dir }
    }

    fn job(dispatcher: &Dispatcher) -> PrintJob {
        PrintJob {
            arrival: dispatcher.next_arrival(),
            code: "A123".into(),
            ..Default::default()
        }
    }

    fn stages(rx: &mut ticketline_core::BusReceiver) -> Vec<Stage> {
        rx.drain()
            .messages
            .into_iter()
            .filter_map(|m| match m {
                ControlMessage::Log(event) => event.stage,
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn dispatches_to_resolved_printer() {
        let mut rig = rig(FakeSystem::new(&["HP", "ticket-printer"]), false);
        let job = job(&rig.dispatcher);

        let out = rig.dispatcher.dispatch(job, TicketKind::Plain).await.expect("dispatch");
        assert_eq!(out.printer, "ticket-printer");
        assert_eq!(out.queue, QueueClear::Cleared);
        assert_eq!(rig.system.spawned(), vec![("ticket-printer".to_string(), out.ticket.clone())]);

        let seen = stages(&mut rig.rx);
        assert_eq!(
            &seen[..4],
            &[Stage::Received, Stage::Rendered, Stage::Resolved, Stage::Dispatched]
        );
    }

    #[tokio::test]
    async fn queue_clear_failure_does_not_block() {
        let rig = rig(FakeSystem::new(&["ticket-printer"]).failing_clear(), false);
        let job = job(&rig.dispatcher);

        let out = rig.dispatcher.dispatch(job, TicketKind::Plain).await.expect("dispatch");
        assert!(matches!(out.queue, QueueClear::Skipped(_)));
        assert_eq!(rig.system.clear_calls(), 1);
        assert_eq!(rig.system.spawned().len(), 1);
    }

    #[tokio::test]
    async fn unresolved_printer_is_configuration_error() {
        let mut rig = rig(FakeSystem::new(&["HP-LaserJet"]), false);
        let job = job(&rig.dispatcher);

        let err = rig.dispatcher.dispatch(job, TicketKind::Plain).await.unwrap_err();
        assert!(matches!(err, TicketlineError::Configuration(_)));
        assert!(rig.system.spawned().is_empty());
        assert_eq!(rig.system.clear_calls(), 0);
        assert_eq!(stages(&mut rig.rx).last(), Some(&Stage::PrintFailed));
    }

    #[tokio::test]
    async fn render_failure_stops_before_resolution() {
        let rig = rig(FakeSystem::new(&["ticket-printer"]), true);
        let job = job(&rig.dispatcher);

        let err = rig.dispatcher.dispatch(job, TicketKind::Plain).await.unwrap_err();
        assert!(matches!(err, TicketlineError::Render(_)));
        assert_eq!(rig.system.list_calls(), 0);
    }

    #[tokio::test]
    async fn spawn_failure_is_dispatch_error() {
        let rig = rig(FakeSystem::new(&["ticket-printer"]).failing_spawn(), false);
        let job = job(&rig.dispatcher);

        let err = rig.dispatcher.dispatch(job, TicketKind::Plain).await.unwrap_err();
        assert!(matches!(err, TicketlineError::Dispatch(_)));
    }

    #[tokio::test]
    async fn configured_printer_is_trusted() {
        let rig = rig(FakeSystem::new(&[]), false);
        assert!(rig.store.save(&Config { selected_printer: Some("Ghost".into()) }));
        let job = job(&rig.dispatcher);

        let out = rig.dispatcher.dispatch(job, TicketKind::Plain).await.expect("dispatch");
        assert_eq!(out.printer, "Ghost");
    }

    #[tokio::test]
    async fn completion_is_logged_after_detach() {
        let mut rig = rig(FakeSystem::new(&["ticket-printer"]), false);
        let job = PrintJob {
            qr_content: Some("https://exemplo.com".into()),
            ..job(&rig.dispatcher)
        };

        rig.dispatcher.dispatch(job, TicketKind::Qr).await.expect("dispatch");
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        assert!(stages(&mut rig.rx).contains(&Stage::Printed { qr: true }));
    }

    #[test]
    fn arrivals_count_from_one() {
        let rig = rig(FakeSystem::new(&[]), false);
        assert_eq!(rig.dispatcher.next_arrival(), 1);
        assert_eq!(rig.dispatcher.next_arrival(), 2);
    }
}
