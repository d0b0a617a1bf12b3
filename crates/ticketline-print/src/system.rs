// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The OS printer subsystem seam.
//
// Every interaction with the host's printing tools goes through
// `PrinterSystem`: enumerate installed printers, query one printer's status,
// clear one printer's queue, and hand a file to a named printer.  All four
// are slow and fallible.  Only the two read operations are safe to retry.
//
// Tool invocations run with a bounded timeout.  A timed-out tool is not
// killed; it is left to finish on its own so the spooler is never
// interrupted mid-operation.

use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::{debug, warn};

use ticketline_core::error::{Result, TicketlineError};

// ---------------------------------------------------------------------------
// Timeouts
// ---------------------------------------------------------------------------

/// Budget for enumerating installed printers.
pub const LIST_TIMEOUT: Duration = Duration::from_secs(10);

/// Budget for one printer status query.
pub const STATUS_TIMEOUT: Duration = Duration::from_secs(8);

/// Budget for clearing one printer's queue.
pub const CLEAR_TIMEOUT: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// PrinterSystem
// ---------------------------------------------------------------------------

/// Host printer subsystem.
#[async_trait]
pub trait PrinterSystem: Send + Sync {
    /// Short backend name used in logs.
    fn name(&self) -> &'static str;

    /// Names of all installed printers.
    async fn list_printers(&self) -> Result<Vec<String>>;

    /// Raw, tool-specific status text for one printer.
    async fn printer_status(&self, printer: &str) -> Result<String>;

    /// Remove every pending job from one printer's queue.
    async fn clear_queue(&self, printer: &str) -> Result<()>;

    /// Start printing `file` on `printer` without waiting for the spooler.
    ///
    /// Returns as soon as the print command has been spawned.  An error here
    /// means the command could not be started at all.
    fn spawn_print(&self, printer: &str, file: &Path) -> Result<DetachedPrint>;
}

/// Pick the backend for the host OS.
pub fn default_printer_system() -> Arc<dyn PrinterSystem> {
    #[cfg(windows)]
    {
        Arc::new(crate::windows::WindowsSystem::new())
    }

    #[cfg(not(windows))]
    {
        Arc::new(crate::cups::CupsSystem::new())
    }
}

// ---------------------------------------------------------------------------
// Detached print
// ---------------------------------------------------------------------------

/// Outcome of a print command observed after it exits.
pub type PrintOutcome = std::result::Result<(), String>;

type Completion = Pin<Box<dyn Future<Output = PrintOutcome> + Send>>;

/// A spawned print command nobody waits for.
///
/// The caller gets no result back.  [`DetachedPrint::detach`] hands the exit
/// status to a callback on a background task, which may only log it.
pub struct DetachedPrint {
    command: String,
    pid: Option<u32>,
    completion: Completion,
}

impl DetachedPrint {
    pub fn new(
        command: impl Into<String>,
        pid: Option<u32>,
        completion: impl Future<Output = PrintOutcome> + Send + 'static,
    ) -> Self {
        Self {
            command: command.into(),
            pid,
            completion: Box::pin(completion),
        }
    }

    /// Spawn `program args..` and watch it from a background task.
    pub fn spawn(program: &str, args: &[String]) -> Result<Self> {
        let command = describe(program, args);
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| TicketlineError::Dispatch(format!("{command}: {e}")))?;

        let pid = child.id();
        debug!(%command, ?pid, "print command spawned");

        let completion = async move {
            let mut detail = String::new();
            if let Some(mut pipe) = child.stderr.take() {
                let _ = pipe.read_to_string(&mut detail).await;
            }
            let status = child.wait().await.map_err(|e| e.to_string())?;
            if status.success() {
                Ok(())
            } else {
                Err(format!("{status}: {}", detail.trim()))
            }
        };

        Ok(Self::new(command, pid, completion))
    }

    /// Human-readable command line.
    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Let the command run to completion on its own.
    pub fn detach<F>(self, on_exit: F)
    where
        F: FnOnce(PrintOutcome) + Send + 'static,
    {
        let completion = self.completion;
        tokio::spawn(async move {
            on_exit(completion.await);
        });
    }
}

impl std::fmt::Debug for DetachedPrint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetachedPrint")
            .field("command", &self.command)
            .field("pid", &self.pid)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tool runner
// ---------------------------------------------------------------------------

/// Run a printer tool to completion and return its stdout.
///
/// Non-zero exit, spawn failure and timeout all become `TransientTool`.
pub async fn run_tool(program: &str, args: &[String], timeout: Duration) -> Result<String> {
    let command = describe(program, args);
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .output();

    let output = match tokio::time::timeout(timeout, output).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => return Err(TicketlineError::tool(program, e.to_string())),
        Err(_) => {
            warn!(%command, timeout_s = timeout.as_secs(), "printer tool timed out");
            return Err(TicketlineError::tool(
                program,
                format!("timed out after {}s", timeout.as_secs()),
            ));
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(TicketlineError::tool(
            program,
            format!("{}: {}", output.status, stderr.trim()),
        ));
    }

    debug!(%command, bytes = output.stdout.len(), "printer tool finished");
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn describe(program: &str, args: &[String]) -> String {
    std::iter::once(program)
        .chain(args.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" ")
}
