// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Terminal UI shell and stdin-driven tray.
//
// `ConsoleUi` prints the log to stdout, either the operator digest or the
// full technical stream.  `ConsoleTray` reads commands from stdin on a
// reader thread so the tray loop can poll it with a timeout.

use std::io::{self, BufRead, Write};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use ticketline_core::error::{Result, TicketlineError};
use ticketline_core::log_digest::DigestSeverity;
use ticketline_core::LogEvent;

use crate::coordinator::{UiFactory, UiShell};
use crate::tray::{TrayAction, TrayFactory, TrayIcon};

// ---------------------------------------------------------------------------
// Log formatting
// ---------------------------------------------------------------------------

/// Which log stream a UI shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogView {
    /// Operator digest only.
    Simple,
    /// Every technical line.
    Advanced,
}

/// Format one event for `view`.  `None` when the view hides it.
pub fn format_event(event: &LogEvent, view: LogView) -> Option<String> {
    match view {
        LogView::Advanced => Some(format!(
            "[{}] [{}] {}",
            event.at.format("%H:%M:%S"),
            event.level,
            event.text
        )),
        LogView::Simple => event.simplified.as_ref().map(|line| {
            let marker = match line.severity {
                DigestSeverity::Success => "ok",
                DigestSeverity::Info => "..",
                DigestSeverity::Error => "!!",
            };
            format!("{} {marker} {}", event.at.format("%H:%M:%S"), line.text)
        }),
    }
}

// ---------------------------------------------------------------------------
// ConsoleUi
// ---------------------------------------------------------------------------

/// Log window on stdout.
pub struct ConsoleUi {
    view: LogView,
}

impl UiShell for ConsoleUi {
    fn is_active(&self) -> bool {
        true
    }

    fn log(&mut self, event: &LogEvent) {
        if let Some(line) = format_event(event, self.view) {
            let mut out = io::stdout().lock();
            let _ = writeln!(out, "{line}");
        }
    }
}

pub struct ConsoleUiFactory {
    view: LogView,
}

impl ConsoleUiFactory {
    pub fn new(advanced: bool) -> Self {
        let view = if advanced { LogView::Advanced } else { LogView::Simple };
        Self { view }
    }
}

impl UiFactory for ConsoleUiFactory {
    fn open(&mut self, backlog: &[LogEvent]) -> Result<Box<dyn UiShell>> {
        let mut ui = ConsoleUi { view: self.view };
        {
            let mut out = io::stdout().lock();
            writeln!(out, "=== Ticketline: servidor de senhas ===")?;
            writeln!(out, "Comandos: abrir | status | sair")?;
        }
        for event in backlog {
            ui.log(event);
        }
        Ok(Box::new(ui))
    }
}

// ---------------------------------------------------------------------------
// ConsoleTray
// ---------------------------------------------------------------------------

/// Parse one stdin command.
pub fn parse_action(line: &str) -> Option<TrayAction> {
    match line.trim().to_lowercase().as_str() {
        "open" | "abrir" => Some(TrayAction::Open),
        "status" => Some(TrayAction::Status),
        "quit" | "sair" | "exit" => Some(TrayAction::Quit),
        _ => None,
    }
}

/// Tray "icon" fed by stdin lines.
pub struct ConsoleTray {
    lines: Arc<Mutex<Receiver<String>>>,
}

impl TrayIcon for ConsoleTray {
    fn poll_action(&mut self, timeout: Duration) -> Result<Option<TrayAction>> {
        let received = self
            .lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .recv_timeout(timeout);

        match received {
            Ok(line) => {
                let action = parse_action(&line);
                if action.is_none() && !line.trim().is_empty() {
                    println!("Comando desconhecido: {}. Use abrir, status ou sair.", line.trim());
                }
                Ok(action)
            }
            Err(RecvTimeoutError::Timeout) => Ok(None),
            // stdin closed: nothing more will come, stay idle.
            Err(RecvTimeoutError::Disconnected) => {
                std::thread::sleep(timeout);
                Ok(None)
            }
        }
    }

    fn close(&mut self) {}
}

/// Starts one stdin reader thread and shares it across tray icons.
#[derive(Default)]
pub struct ConsoleTrayFactory {
    lines: Option<Arc<Mutex<Receiver<String>>>>,
}

impl ConsoleTrayFactory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TrayFactory for ConsoleTrayFactory {
    fn create(&mut self) -> Result<Box<dyn TrayIcon>> {
        let lines = match &self.lines {
            Some(lines) => Arc::clone(lines),
            None => {
                let (tx, rx) = mpsc::channel();
                std::thread::Builder::new()
                    .name("stdin".into())
                    .spawn(move || {
                        for line in io::stdin().lock().lines() {
                            let Ok(line) = line else { break };
                            if tx.send(line).is_err() {
                                break;
                            }
                        }
                    })
                    .map_err(|e| TicketlineError::Fatal(format!("stdin reader: {e}")))?;
                let lines = Arc::new(Mutex::new(rx));
                self.lines = Some(Arc::clone(&lines));
                lines
            }
        };
        Ok(Box::new(ConsoleTray { lines }))
    }
}
