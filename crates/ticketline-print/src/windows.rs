// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Windows backend: PowerShell print-management cmdlets for queries and the
// `/pt` (print-to) verb of the stock desktop apps for printing.
//
// Compiled on every platform so the argument builders stay tested; only
// selected at runtime on Windows.

use std::path::Path;

use async_trait::async_trait;
use tracing::instrument;

use ticketline_core::error::Result;

use crate::system::{
    run_tool, DetachedPrint, PrinterSystem, CLEAR_TIMEOUT, LIST_TIMEOUT, STATUS_TIMEOUT,
};

/// Page geometry and zoom passed to `mspaint /pt` for image tickets.
const MSPAINT_PAGE: [&str; 5] = ["1", "1000", "1200", "/z", "200"];

/// Printer subsystem backed by PowerShell.
#[derive(Debug, Clone, Default)]
pub struct WindowsSystem;

impl WindowsSystem {
    pub fn new() -> Self {
        Self
    }
}

/// Quote a value for a single-quoted PowerShell string.
fn ps_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn powershell_args(script: String) -> Vec<String> {
    vec![
        "-NoProfile".into(),
        "-NonInteractive".into(),
        "-Command".into(),
        script,
    ]
}

pub(crate) fn list_script() -> String {
    "Get-Printer | Select-Object -ExpandProperty Name".into()
}

pub(crate) fn status_script(printer: &str) -> String {
    format!(
        "(Get-Printer -Name {}).PrinterStatus",
        ps_quote(printer)
    )
}

pub(crate) fn clear_script(printer: &str) -> String {
    format!(
        "Get-PrintJob -PrinterName {} | Remove-PrintJob",
        ps_quote(printer)
    )
}

/// Program and arguments that print `file` on `printer`.
///
/// Text tickets go through Notepad, anything else through Paint.
pub(crate) fn print_command(printer: &str, file: &Path) -> (&'static str, Vec<String>) {
    let path = file.to_string_lossy().into_owned();
    let is_text = file
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("txt"));

    if is_text {
        ("notepad", vec!["/pt".into(), path, printer.into()])
    } else {
        let mut args = vec!["/pt".into(), path, printer.into()];
        args.extend(MSPAINT_PAGE.iter().map(|arg| arg.to_string()));
        ("mspaint", args)
    }
}

#[async_trait]
impl PrinterSystem for WindowsSystem {
    fn name(&self) -> &'static str {
        "windows"
    }

    #[instrument(skip(self))]
    async fn list_printers(&self) -> Result<Vec<String>> {
        let stdout = run_tool("powershell", &powershell_args(list_script()), LIST_TIMEOUT).await?;
        Ok(stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect())
    }

    #[instrument(skip(self))]
    async fn printer_status(&self, printer: &str) -> Result<String> {
        run_tool("powershell", &powershell_args(status_script(printer)), STATUS_TIMEOUT).await
    }

    #[instrument(skip(self))]
    async fn clear_queue(&self, printer: &str) -> Result<()> {
        run_tool("powershell", &powershell_args(clear_script(printer)), CLEAR_TIMEOUT).await?;
        Ok(())
    }

    fn spawn_print(&self, printer: &str, file: &Path) -> Result<DetachedPrint> {
        let (program, args) = print_command(printer, file);
        DetachedPrint::spawn(program, &args)
    }
}
