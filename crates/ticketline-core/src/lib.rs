// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Ticketline — Core types, error definitions and the control message bus
// shared across all crates.

pub mod bus;
pub mod config;
pub mod error;
pub mod human_errors;
pub mod log_digest;
pub mod render;
pub mod retry;
pub mod types;

pub use bus::{BusReceiver, ControlMessage, LogEvent, MessageBus};
pub use config::{Config, ServerSettings};
pub use error::{ErrorKind, TicketlineError};
pub use render::TicketRenderer;
pub use types::*;
