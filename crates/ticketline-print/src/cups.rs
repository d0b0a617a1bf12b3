// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// CUPS command-line backend (Linux, macOS, BSD).
//
//   lpstat -e           list destinations, one per line
//   lpstat -p NAME      "printer NAME is idle.  enabled since ..."
//   cancel -a NAME      drop every queued job
//   lp -d NAME FILE     submit a file

use std::path::Path;

use async_trait::async_trait;
use tracing::instrument;

use ticketline_core::error::Result;

use crate::system::{
    run_tool, DetachedPrint, PrinterSystem, CLEAR_TIMEOUT, LIST_TIMEOUT, STATUS_TIMEOUT,
};

/// Printer subsystem backed by the CUPS tools on `PATH`.
#[derive(Debug, Clone, Default)]
pub struct CupsSystem;

impl CupsSystem {
    pub fn new() -> Self {
        Self
    }
}

/// Destination names from `lpstat -e` output.
pub(crate) fn parse_destinations(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}

pub(crate) fn print_args(printer: &str, file: &Path) -> Vec<String> {
    vec![
        "-d".into(),
        printer.into(),
        file.to_string_lossy().into_owned(),
    ]
}

#[async_trait]
impl PrinterSystem for CupsSystem {
    fn name(&self) -> &'static str {
        "cups"
    }

    #[instrument(skip(self))]
    async fn list_printers(&self) -> Result<Vec<String>> {
        let stdout = run_tool("lpstat", &["-e".into()], LIST_TIMEOUT).await?;
        Ok(parse_destinations(&stdout))
    }

    #[instrument(skip(self))]
    async fn printer_status(&self, printer: &str) -> Result<String> {
        run_tool("lpstat", &["-p".into(), printer.into()], STATUS_TIMEOUT).await
    }

    #[instrument(skip(self))]
    async fn clear_queue(&self, printer: &str) -> Result<()> {
        run_tool("cancel", &["-a".into(), printer.into()], CLEAR_TIMEOUT).await?;
        Ok(())
    }

    fn spawn_print(&self, printer: &str, file: &Path) -> Result<DetachedPrint> {
        DetachedPrint::spawn("lp", &print_args(printer, file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ticketline_core::PrinterStatus;

    #[test]
    fn destinations_skip_blank_lines() {
        let out = "HP-LaserJet\n\nticket_printer  \nPDF\n";
        assert_eq!(parse_destinations(out), vec!["HP-LaserJet", "ticket_printer", "PDF"]);
    }

    #[test]
    fn lpstat_lines_classify() {
        let idle = "printer HP-LaserJet is idle.  enabled since Mon 01 Jan 2025";
        let disabled = "printer HP-LaserJet disabled since Mon 01 Jan 2025 -\n\tPaused";
        assert_eq!(PrinterStatus::from_raw(idle), PrinterStatus::Ready);
        assert_eq!(PrinterStatus::from_raw(disabled), PrinterStatus::Paused);
    }

    #[test]
    fn lp_targets_the_named_printer() {
        let args = print_args("ticket-printer", Path::new("/tmp/ticket/a.txt"));
        assert_eq!(args, vec!["-d", "ticket-printer", "/tmp/ticket/a.txt"]);
    }
}
