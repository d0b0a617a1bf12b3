// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Simplified operator log.
//
// The technical log records every step.  The counter operator only needs to
// know a handful of things: the server is up, a ticket is printing, it
// printed, or something failed.  `digest` picks those out.

use serde::{Deserialize, Serialize};

use crate::types::LogLevel;

/// Pipeline stage a log line reports on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    ServerStarted,
    ServerStopped,
    /// A client is about to call the intake server.
    Sending { qr: bool },
    Received,
    Rendered,
    Resolved,
    /// The print command was spawned.
    Dispatched,
    /// The print command exited successfully.
    Printed { qr: bool },
    PrintFailed,
    ServerUnreachable,
}

/// How the simplified line is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DigestSeverity {
    Success,
    Info,
    Error,
}

/// One line of the simplified log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimplifiedLog {
    pub text: String,
    pub severity: DigestSeverity,
}

impl SimplifiedLog {
    fn new(text: &str, severity: DigestSeverity) -> Self {
        Self {
            text: text.into(),
            severity,
        }
    }
}

/// Decide whether a technical log line deserves a simplified counterpart.
///
/// Intermediate stages (received, rendered, resolved) stay in the technical
/// log only.  Unstaged lines surface only when they are errors.
pub fn digest(stage: Option<Stage>, level: LogLevel) -> Option<SimplifiedLog> {
    use DigestSeverity::*;

    match stage {
        Some(Stage::ServerStarted) => Some(SimplifiedLog::new("✅ Servidor iniciado com sucesso", Success)),
        Some(Stage::ServerStopped) => Some(SimplifiedLog::new("⏹️ Servidor parado", Info)),
        Some(Stage::Sending { qr: false }) => {
            Some(SimplifiedLog::new("📤 Enviando senha para impressora...", Info))
        }
        Some(Stage::Sending { qr: true }) => {
            Some(SimplifiedLog::new("📤 Enviando senha com QR Code para impressora...", Info))
        }
        Some(Stage::Dispatched) => Some(SimplifiedLog::new("🖨️ Imprimindo senha...", Info)),
        Some(Stage::Printed { qr: false }) => {
            Some(SimplifiedLog::new("✅ Senha impressa com sucesso na impressora", Success))
        }
        Some(Stage::Printed { qr: true }) => {
            Some(SimplifiedLog::new("✅ Senha com QRCode impressa com sucesso", Success))
        }
        Some(Stage::PrintFailed) => {
            Some(SimplifiedLog::new("❌ Falha ao enviar senha para impressora", Error))
        }
        Some(Stage::ServerUnreachable) => {
            Some(SimplifiedLog::new("❌ Servidor não está respondendo", Error))
        }
        Some(Stage::Received | Stage::Rendered | Stage::Resolved) | None => match level {
            LogLevel::Error => Some(SimplifiedLog::new("⚠️ Erro no sistema", Error)),
            LogLevel::Info | LogLevel::Warn => None,
        },
    }
}
