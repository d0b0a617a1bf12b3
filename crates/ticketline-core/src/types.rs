// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Ticketline print server.

use serde::{Deserialize, Serialize};

/// A ticket print request as accepted at intake.
///
/// Jobs carry no persistent identifier; `arrival` is the order in which the
/// intake server accepted them during this process run.  Missing request
/// fields are stored as empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrintJob {
    /// Arrival sequence number assigned by the intake server.
    pub arrival: u64,
    pub created_date: String,
    pub code: String,
    pub services: String,
    pub header: String,
    pub footer: String,
    /// Content to encode as a QR block (QR variant only).
    pub qr_content: Option<String>,
}

impl PrintJob {
    /// The label used for this job in logs: the ticket code, or the QR
    /// content when the code is empty.
    pub fn label(&self) -> &str {
        if self.code.is_empty() {
            self.qr_content.as_deref().unwrap_or_default()
        } else {
            &self.code
        }
    }
}

/// Live status of an installed printer, as reported by the OS tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrinterStatus {
    Ready,
    Offline,
    Error,
    Paused,
    Unknown,
}

impl PrinterStatus {
    /// Classify raw status text from the OS printer tool.
    ///
    /// Matching is a case-insensitive substring test.  The blocking states are
    /// checked first so that e.g. "printing, error" is reported as `Error`.
    /// CUPS reports a paused queue as "disabled".
    pub fn from_raw(raw: &str) -> Self {
        let lower = raw.to_lowercase();

        if lower.contains("offline") {
            Self::Offline
        } else if lower.contains("error") {
            Self::Error
        } else if lower.contains("paused") || lower.contains("disabled") {
            Self::Paused
        } else if lower.contains("idle")
            || lower.contains("ready")
            || lower.contains("normal")
            || lower.contains("printing")
        {
            Self::Ready
        } else {
            Self::Unknown
        }
    }

    /// Whether this state should stop a printer being accepted in settings.
    pub fn blocks_printing(&self) -> bool {
        matches!(self, Self::Offline | Self::Error | Self::Paused)
    }

    /// Short operator-facing label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Ready => "pronta",
            Self::Offline => "offline",
            Self::Error => "com erro",
            Self::Paused => "pausada",
            Self::Unknown => "desconhecido",
        }
    }
}

impl std::fmt::Display for PrinterStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Ready => "Ready",
            Self::Offline => "Offline",
            Self::Error => "Error",
            Self::Paused => "Paused",
            Self::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

/// An installed printer and its status at the time it was queried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrinterInfo {
    pub name: String,
    pub status: PrinterStatus,
}

/// Severity attached to a technical log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        };
        f.write_str(s)
    }
}

/// Status of the embedded HTTP intake server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerStatus {
    Stopped,
    Starting,
    Running,
    Error,
}
