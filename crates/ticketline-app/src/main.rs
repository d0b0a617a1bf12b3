// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Ticketline — local queue-ticket print server.
//
// Entry point.  Parses the command line, initialises logging and runs one of
// the subcommands.  `serve` (the default) starts the intake server, the tray
// and the lifecycle coordinator, and exits the process once the coordinator
// has shut everything down.

mod client;
mod console;
mod coordinator;
mod services;
mod tray;

use std::net::IpAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use tracing::{error, info};

use ticketline_core::config::{DEFAULT_FALLBACK_PRINTER, DEFAULT_PORT};
use ticketline_core::error::Result;
use ticketline_core::human_errors::humanize_error;
use ticketline_core::log_digest::Stage;
use ticketline_core::retry::LIVENESS_POLL;
use ticketline_core::{bus, LogEvent, LogLevel, MessageBus, ServerSettings};

use console::{format_event, ConsoleTrayFactory, ConsoleUiFactory, LogView};
use coordinator::Coordinator;
use services::app_services::AppServices;
use tray::TrayController;

/// Ticketline - local queue-ticket print server
#[derive(Parser, Debug)]
#[command(name = "ticketline")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args, Debug, Clone)]
struct GlobalArgs {
    /// Address the intake server listens on
    #[arg(long, global = true, env = "TICKETLINE_HOST", default_value = "127.0.0.1")]
    host: IpAddr,

    /// Port the intake server listens on
    #[arg(long, global = true, env = "TICKETLINE_PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Data directory (config.json and rendered tickets)
    #[arg(long, global = true, env = "TICKETLINE_DATA_DIR", value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Printer identifier used when none is selected
    #[arg(long, global = true, env = "TICKETLINE_FALLBACK_PRINTER", default_value = DEFAULT_FALLBACK_PRINTER)]
    fallback_printer: String,

    /// Debug-level logging
    #[arg(short, long, global = true, env = "TICKETLINE_VERBOSE")]
    verbose: bool,
}

impl GlobalArgs {
    fn settings(&self) -> ServerSettings {
        ServerSettings {
            host: self.host,
            port: self.port,
            fallback_printer: self.fallback_printer.clone(),
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the print server with tray and log window (default)
    Serve {
        /// Start without opening the log window
        #[arg(long, env = "TICKETLINE_MINIMIZED")]
        minimized: bool,

        /// Show the technical log instead of the simplified one
        #[arg(long, env = "TICKETLINE_ADVANCED_LOGS")]
        advanced_logs: bool,
    },

    /// List installed printers and their status
    Printers,

    /// Select the ticket printer
    Select {
        /// Installed printer name
        #[arg(required_unless_present = "clear", conflicts_with = "clear")]
        name: Option<String>,

        /// Remove the selection and fall back to automatic matching
        #[arg(long)]
        clear: bool,
    },

    /// Send a test ticket to the running server
    Test {
        /// Include a QR block
        #[arg(long)]
        qr: bool,
    },

    /// Ask the running server to shut down
    Stop,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.global.verbose);

    let command = cli.command.unwrap_or(Commands::Serve {
        minimized: false,
        advanced_logs: false,
    });

    let outcome = match command {
        Commands::Serve {
            minimized,
            advanced_logs,
        } => serve(&cli.global, minimized, advanced_logs).await,
        Commands::Printers => list_printers(&cli.global).await,
        Commands::Select { name, clear } => {
            select(&cli.global, if clear { None } else { name }).await
        }
        Commands::Test { qr } => test_print(&cli.global, qr).await,
        Commands::Stop => stop(&cli.global).await,
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "ticketline failed");
            eprintln!("{}", humanize_error(&e, &cli.global.fallback_printer).to_text());
            ExitCode::FAILURE
        }
    }
}

/// Services for a one-shot command.  Bus events only reach the log.
fn oneshot_services(global: &GlobalArgs) -> Result<AppServices> {
    let (bus, _rx) = bus::channel();
    AppServices::init(global.settings(), global.data_dir.as_deref(), bus)
}

// ---------------------------------------------------------------------------
// serve
// ---------------------------------------------------------------------------

async fn serve(global: &GlobalArgs, minimized: bool, advanced_logs: bool) -> Result<()> {
    let (bus, rx) = bus::channel();
    let services = AppServices::init(global.settings(), global.data_dir.as_deref(), bus.clone())?;

    let addr = services.start_server().await?;
    info!(%addr, data_dir = %services.data_dir().display(), "ticketline started");

    let client = services.client()?;
    spawn_liveness_check(client.clone(), bus.clone());

    let tray = TrayController::start(
        Box::new(ConsoleTrayFactory::new()),
        bus.clone(),
        Arc::new(client),
        tokio::runtime::Handle::current(),
    )?;

    spawn_ctrl_c(bus.clone());

    if !minimized {
        bus.open_ui();
    }

    let coordinator = Coordinator::new(Box::new(ConsoleUiFactory::new(advanced_logs)))
        .with_step(Box::new(tray))
        .with_step(services.intake_shutdown_step());
    drop(bus);

    let state = coordinator.run(rx).await;
    info!(?state, "ticketline exiting");

    // Blocked stdin readers must not keep the process alive.
    std::process::exit(0)
}

/// Poll `/status` until the server answers and report the outcome.
fn spawn_liveness_check(client: client::IntakeClient, bus: MessageBus) {
    tokio::spawn(async move {
        match client.wait_until_alive(&LIVENESS_POLL).await {
            Ok(_) => bus.stage(
                Stage::ServerStarted,
                LogLevel::Info,
                format!("Servidor iniciado com sucesso em {}", client.base_url()),
            ),
            Err(e) => bus.stage(
                Stage::ServerUnreachable,
                LogLevel::Error,
                format!("Servidor não respondeu: {e}"),
            ),
        };
    });
}

fn spawn_ctrl_c(bus: MessageBus) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received");
            bus.quit();
        }
    });
}

// ---------------------------------------------------------------------------
// printers / select / test / stop
// ---------------------------------------------------------------------------

async fn list_printers(global: &GlobalArgs) -> Result<()> {
    let services = oneshot_services(global)?;
    let rows = services.printers().await;

    if rows.is_empty() {
        println!("Nenhuma impressora instalada foi encontrada.");
    }
    for row in &rows {
        let mut marks = Vec::new();
        if row.selected {
            marks.push("selecionada");
        }
        if row.in_use {
            marks.push("em uso");
        }
        let marks = if marks.is_empty() {
            String::new()
        } else {
            format!("  ({})", marks.join(", "))
        };
        println!("{:<32} {}{marks}", row.info.name, row.info.status.label());
    }

    let resolution = services.resolve().await;
    if !resolution.is_resolved() {
        println!(
            "\nNenhuma impressora corresponde a \"{}\". Use `ticketline select <nome>`.",
            services.settings().fallback_printer
        );
    }
    Ok(())
}

async fn select(global: &GlobalArgs, name: Option<String>) -> Result<()> {
    let services = oneshot_services(global)?;
    let config = services.select_printer(name.as_deref()).await?;
    match config.selected_printer() {
        Some(name) => println!("Impressora selecionada: {name}"),
        None => println!(
            "Seleção removida; será usada a impressora que corresponder a \"{}\".",
            services.settings().fallback_printer
        ),
    }
    Ok(())
}

async fn test_print(global: &GlobalArgs, qr: bool) -> Result<()> {
    let client = client::IntakeClient::new(global.settings().base_url())?;
    info!(qr, url = %client.base_url(), "sending test ticket");
    if let Some(line) = sending_line(qr, client.base_url()) {
        println!("{line}");
    }

    let body = client.test_print(qr).await?;
    println!("{body}");
    Ok(())
}

/// Operator line announcing a test ticket, as the log window would show it.
fn sending_line(qr: bool, base_url: &str) -> Option<String> {
    let event = LogEvent::new(
        LogLevel::Info,
        Some(Stage::Sending { qr }),
        format!("Enviando teste para {base_url}"),
    );
    format_event(&event, LogView::Simple)
}

async fn stop(global: &GlobalArgs) -> Result<()> {
    let client = client::IntakeClient::new(global.settings().base_url())?;
    let body = client.shutdown().await?;
    println!("{body}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_subcommand_means_serve() {
        let cli = Cli::try_parse_from(["ticketline"]).expect("parse");
        assert!(cli.command.is_none());
        assert_eq!(cli.global.port, 5000);
        assert_eq!(cli.global.fallback_printer, "ticket-printer");
    }

    #[test]
    fn select_requires_name_or_clear() {
        assert!(Cli::try_parse_from(["ticketline", "select"]).is_err());
        assert!(Cli::try_parse_from(["ticketline", "select", "HP", "--clear"]).is_err());
        assert!(Cli::try_parse_from(["ticketline", "select", "--clear"]).is_ok());
    }

    #[test]
    fn global_flags_follow_subcommands() {
        let cli = Cli::try_parse_from(["ticketline", "test", "--qr", "--port", "5050"]).expect("parse");
        assert_eq!(cli.global.port, 5050);
        assert!(matches!(cli.command, Some(Commands::Test { qr: true })));
        assert_eq!(cli.global.settings().base_url(), "http://127.0.0.1:5050");
    }

    #[test]
    fn test_print_announces_itself() {
        let plain = sending_line(false, "http://127.0.0.1:5000").expect("digest line");
        assert!(plain.contains("Enviando senha para impressora"), "{plain}");
        let qr = sending_line(true, "http://127.0.0.1:5000").expect("digest line");
        assert!(qr.contains("QR Code"), "{qr}");
    }

    #[test]
    fn stop_takes_no_arguments() {
        let cli = Cli::try_parse_from(["ticketline", "stop"]).expect("parse");
        assert!(matches!(cli.command, Some(Commands::Stop)));
        assert!(Cli::try_parse_from(["ticketline", "stop", "now"]).is_err());
    }
}
