// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Contract for the ticket renderer collaborator.

use std::path::PathBuf;

use crate::error::Result;
use crate::types::PrintJob;

/// Turns a print job into a file the OS print command can consume.
///
/// Implementations do blocking file I/O; async callers should run them on a
/// blocking worker.
pub trait TicketRenderer: Send + Sync {
    /// Render the plain ticket and return the path of the written file.
    fn render_ticket(&self, job: &PrintJob) -> Result<PathBuf>;

    /// Render the ticket with a QR block built from `job.qr_content`.
    fn render_ticket_with_qr(&self, job: &PrintJob) -> Result<PathBuf>;
}
