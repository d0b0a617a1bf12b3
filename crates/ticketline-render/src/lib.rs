// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// ticketline-render — Ticket rendering for the Ticketline print server.
//
// Produces printable ticket files from a `PrintJob`: a centred plain-text
// ticket, optionally followed by a QR block drawn with text modules.

pub mod qr;
pub mod text;

pub use text::TextTicketRenderer;
