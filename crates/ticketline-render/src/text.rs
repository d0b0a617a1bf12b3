// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Plain-text ticket renderer.
//
// Each ticket is written as its own UTF-8 file in the ticket directory.  The
// file name is the render timestamp with millisecond precision followed by the
// job's arrival number, so two tickets rendered in the same instant never
// collide.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use ticketline_core::error::{Result, TicketlineError};
use ticketline_core::{PrintJob, TicketRenderer};
use tracing::{debug, instrument};

use crate::qr::qr_rows;

/// Column count of an 80 mm thermal roll in the default font.
pub const TICKET_WIDTH: usize = 42;

/// Renders tickets as centred text files.
#[derive(Debug, Clone)]
pub struct TextTicketRenderer {
    dir: PathBuf,
    width: usize,
}

impl TextTicketRenderer {
    /// Create a renderer writing into `dir`, creating it if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            width: TICKET_WIDTH,
        })
    }

    /// Override the column count used for centring.
    pub fn with_width(mut self, width: usize) -> Self {
        self.width = width.max(1);
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn ticket_lines(&self, job: &PrintJob) -> Vec<String> {
        let mut lines = Vec::new();
        if !job.header.is_empty() {
            lines.push(self.centre(&job.header));
            lines.push(String::new());
        }
        lines.push(self.centre(&format!("Código: {}", job.code)));
        lines.push(self.centre(&format!("Serviços: {}", job.services)));
        lines.push(self.centre(&format!("Data: {}", job.created_date)));
        if !job.footer.is_empty() {
            lines.push(String::new());
            lines.push(self.centre(&job.footer));
        }
        lines
    }

    fn centre(&self, text: &str) -> String {
        let len = text.chars().count();
        if len >= self.width {
            return text.to_string();
        }
        let pad = (self.width - len) / 2;
        format!("{}{text}", " ".repeat(pad))
    }

    fn write(&self, job: &PrintJob, lines: &[String]) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let stamp = Local::now().format("%Y-%m-%d-%H-%M-%S-%3f");
        let path = self.dir.join(format!("{stamp}-{:04}.txt", job.arrival));

        let mut body = lines.join("\n");
        body.push('\n');
        fs::write(&path, body).map_err(|e| {
            TicketlineError::Render(format!("cannot write {}: {e}", path.display()))
        })?;
        debug!(path = %path.display(), lines = lines.len(), "ticket written");
        Ok(path)
    }
}

impl TicketRenderer for TextTicketRenderer {
    #[instrument(skip(self, job), fields(code = %job.code, arrival = job.arrival))]
    fn render_ticket(&self, job: &PrintJob) -> Result<PathBuf> {
        let lines = self.ticket_lines(job);
        self.write(job, &lines)
    }

    #[instrument(skip(self, job), fields(code = %job.code, arrival = job.arrival))]
    fn render_ticket_with_qr(&self, job: &PrintJob) -> Result<PathBuf> {
        let content = job.qr_content.as_deref().unwrap_or_default();
        let qr = qr_rows(content)?;

        let mut lines = self.ticket_lines(job);
        lines.push(String::new());
        lines.extend(qr.iter().map(|row| self.centre(row)));
        self.write(job, &lines)
    }
}
