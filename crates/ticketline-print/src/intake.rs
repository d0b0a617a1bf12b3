// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// HTTP intake server.
//
//   GET  /imprimir          plain ticket
//   GET  /imprimir/qrcode   ticket with QR block
//   GET  /status            liveness probe
//   POST /shutdown          ask the coordinator to quit
//
// Query parameters are optional; a missing field is an empty string.  A print
// request answers as soon as the print command is running.  Failures answer
// 500 with operator-readable text.  `/shutdown` never ends the process
// itself: it puts `Quit` on the bus after a short delay so the response is
// flushed first.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use ticketline_core::error::{Result, TicketlineError};
use ticketline_core::human_errors::humanize_error;
use ticketline_core::log_digest::Stage;
use ticketline_core::{LogLevel, MessageBus, PrintJob, ServerStatus};

use crate::dispatch::{Dispatcher, TicketKind};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const PRINT_OK: &str = "Impressão realizada com sucesso";
pub const PRINT_QR_OK: &str = "Impressão com QRCode realizada com sucesso";
pub const STATUS_OK: &str = "Servidor de impressão ativo";
pub const SHUTDOWN_OK: &str = "Encerrando servidor de impressão";

/// Delay between answering `/shutdown` and sending `Quit`.
pub const SHUTDOWN_DELAY: Duration = Duration::from_millis(500);

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// Query string of both print endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TicketQuery {
    pub created_date: String,
    pub code: String,
    pub services: String,
    pub header: String,
    pub footer: String,
    pub qrcode: String,
}

impl TicketQuery {
    fn into_job(self, arrival: u64, kind: TicketKind) -> PrintJob {
        PrintJob {
            arrival,
            created_date: self.created_date,
            code: self.code,
            services: self.services,
            header: self.header,
            footer: self.footer,
            qr_content: match kind {
                TicketKind::Qr => Some(self.qrcode),
                TicketKind::Plain => None,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

struct IntakeState {
    dispatcher: Arc<Dispatcher>,
    bus: MessageBus,
    shutdown_delay: Duration,
}

/// Build the intake router.
pub fn router(dispatcher: Arc<Dispatcher>, bus: MessageBus) -> Router {
    router_with_delay(dispatcher, bus, SHUTDOWN_DELAY)
}

fn router_with_delay(dispatcher: Arc<Dispatcher>, bus: MessageBus, shutdown_delay: Duration) -> Router {
    let state = Arc::new(IntakeState {
        dispatcher,
        bus,
        shutdown_delay,
    });

    Router::new()
        .route("/imprimir", get(print_plain))
        .route("/imprimir/qrcode", get(print_qr))
        .route("/status", get(status))
        .route("/shutdown", post(shutdown))
        .with_state(state)
}

async fn print_plain(
    State(state): State<Arc<IntakeState>>,
    Query(query): Query<TicketQuery>,
) -> impl IntoResponse {
    handle_print(&state, query, TicketKind::Plain).await
}

async fn print_qr(
    State(state): State<Arc<IntakeState>>,
    Query(query): Query<TicketQuery>,
) -> impl IntoResponse {
    handle_print(&state, query, TicketKind::Qr).await
}

async fn handle_print(state: &IntakeState, query: TicketQuery, kind: TicketKind) -> (StatusCode, String) {
    let job = query.into_job(state.dispatcher.next_arrival(), kind);
    match state.dispatcher.dispatch(job, kind).await {
        Ok(dispatched) => {
            debug!(printer = %dispatched.printer, ticket = %dispatched.ticket.display(), "print accepted");
            let body = match kind {
                TicketKind::Plain => PRINT_OK,
                TicketKind::Qr => PRINT_QR_OK,
            };
            (StatusCode::OK, body.to_string())
        }
        Err(e) => {
            let human = humanize_error(&e, state.dispatcher.resolver().fallback());
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Erro ao imprimir: {e}\n\n{}", human.to_text()),
            )
        }
    }
}

async fn status() -> &'static str {
    STATUS_OK
}

async fn shutdown(State(state): State<Arc<IntakeState>>) -> impl IntoResponse {
    state.bus.info("Encerramento solicitado via /shutdown");
    let bus = state.bus.clone();
    let delay = state.shutdown_delay;
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        bus.quit();
    });
    (StatusCode::OK, SHUTDOWN_OK)
}

// ---------------------------------------------------------------------------
// IntakeServer
// ---------------------------------------------------------------------------

/// The intake HTTP listener.
///
/// Created `Stopped`.  `start` binds and serves on a background task; `stop`
/// signals a graceful shutdown and waits for the task.  Both are idempotent.
pub struct IntakeServer {
    /// Address to bind.
    addr: SocketAddr,
    /// Address actually bound (differs when port 0 was requested).
    local_addr: Option<SocketAddr>,
    status: ServerStatus,
    dispatcher: Arc<Dispatcher>,
    bus: MessageBus,
    shutdown_signal: Arc<Notify>,
    task_handle: Option<JoinHandle<()>>,
}

impl IntakeServer {
    pub fn new(addr: SocketAddr, dispatcher: Arc<Dispatcher>, bus: MessageBus) -> Self {
        Self {
            addr,
            local_addr: None,
            status: ServerStatus::Stopped,
            dispatcher,
            bus,
            shutdown_signal: Arc::new(Notify::new()),
            task_handle: None,
        }
    }

    pub fn status(&self) -> ServerStatus {
        self.status
    }

    /// Bound address while running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Bind and start serving.
    ///
    /// # Errors
    ///
    /// `Server` if the address cannot be bound (port in use, no permission).
    pub async fn start(&mut self) -> Result<SocketAddr> {
        if let (ServerStatus::Running, Some(addr)) = (self.status, self.local_addr) {
            debug!(%addr, "intake server already running");
            return Ok(addr);
        }

        self.status = ServerStatus::Starting;

        let listener = match TcpListener::bind(self.addr).await {
            Ok(listener) => listener,
            Err(e) => {
                self.status = ServerStatus::Error;
                return Err(TicketlineError::Server(format!("bind {}: {e}", self.addr)));
            }
        };
        let local_addr = listener.local_addr()?;

        let app = router(Arc::clone(&self.dispatcher), self.bus.clone());
        let shutdown = Arc::clone(&self.shutdown_signal);
        let bus = self.bus.clone();

        let handle = tokio::spawn(async move {
            let served = axum::serve(listener, app)
                .with_graceful_shutdown(async move { shutdown.notified().await })
                .await;
            if let Err(e) = served {
                error!(error = %e, "intake server failed");
                bus.error(format!("Servidor de impressão parou com erro: {e}"));
            }
        });

        self.task_handle = Some(handle);
        self.local_addr = Some(local_addr);
        self.status = ServerStatus::Running;
        info!(addr = %local_addr, "intake server listening");
        self.bus.log(
            LogLevel::Info,
            None,
            format!("Servidor de impressão escutando em http://{local_addr}"),
        );
        Ok(local_addr)
    }

    /// Stop serving.  A no-op when not running.
    pub async fn stop(&mut self) -> Result<()> {
        if self.status != ServerStatus::Running {
            return Ok(());
        }

        info!(addr = ?self.local_addr, "stopping intake server");
        self.shutdown_signal.notify_one();

        if let Some(handle) = self.task_handle.take() {
            handle
                .await
                .map_err(|e| TicketlineError::Server(format!("task join: {e}")))?;
        }

        self.status = ServerStatus::Stopped;
        self.local_addr = None;
        self.bus.stage(Stage::ServerStopped, LogLevel::Info, "Servidor de impressão parado");
        Ok(())
    }
}
