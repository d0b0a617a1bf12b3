// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Ticketline.
//
// OS-tool and filesystem failures are converted into one of these variants at
// the boundary of the component that invoked them.

use thiserror::Error;

/// Top-level error type for all Ticketline operations.
#[derive(Debug, Error)]
pub enum TicketlineError {
    // -- Printer selection --
    #[error("no usable printer configured: {0}")]
    Configuration(String),

    #[error("printer could not be resolved: {0}")]
    Resolution(String),

    // -- OS printer tools --
    #[error("printer tool `{tool}` failed: {detail}")]
    TransientTool { tool: String, detail: String },

    #[error("print dispatch failed: {0}")]
    Dispatch(String),

    // -- Ticket rendering --
    #[error("ticket rendering failed: {0}")]
    Render(String),

    // -- HTTP --
    #[error("intake server error: {0}")]
    Server(String),

    #[error("intake request failed: {0}")]
    Client(String),

    // -- Storage / persistence --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("unexpected failure: {0}")]
    Fatal(String),
}

/// How an error affects the operation that raised it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Logged and tolerated; the enclosing operation continues.
    Soft,
    /// Aborts the enclosing operation.
    Hard,
}

impl TicketlineError {
    /// Build a `TransientTool` error.
    pub fn tool(tool: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::TransientTool {
            tool: tool.into(),
            detail: detail.into(),
        }
    }

    /// Soft failures are logged and tolerated by queue-clear and catalog
    /// refresh; every other variant aborts the operation that raised it.
    pub fn is_soft(&self) -> bool {
        self.kind() == ErrorKind::Soft
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::TransientTool { .. } => ErrorKind::Soft,
            _ => ErrorKind::Hard,
        }
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, TicketlineError>;
