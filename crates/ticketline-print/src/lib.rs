// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Ticketline Print — printer catalog and resolution, the config store, the job
// dispatcher and the HTTP intake server.  This crate is the only one that
// talks to the host's printing tools.

pub mod catalog;
pub mod cups;
pub mod dispatch;
pub mod intake;
pub mod resolver;
pub mod store;
pub mod system;
pub mod windows;

#[cfg(test)]
mod testing;

pub use catalog::{CatalogSnapshot, Freshness, PrinterCatalog};
pub use dispatch::{Dispatched, Dispatcher, QueueClear, TicketKind};
pub use intake::IntakeServer;
pub use resolver::{PrinterResolver, Resolution};
pub use store::ConfigStore;
pub use system::{default_printer_system, DetachedPrint, PrinterSystem};
