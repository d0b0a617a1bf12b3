// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Application configuration.
//
// `Config` is the only durable state and is written exclusively through the
// config store in `ticketline-print`.  `ServerSettings` is runtime-only and
// comes from the command line.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use serde::{Deserialize, Serialize};

/// Literal identifier of the preferred ticket printer.
pub const DEFAULT_FALLBACK_PRINTER: &str = "ticket-printer";

/// Default intake port.
pub const DEFAULT_PORT: u16 = 5000;

/// Persistent application settings (`config.json`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Printer chosen by the operator.  Trusted even when not installed.
    pub selected_printer: Option<String>,
}

impl Config {
    /// The selected printer, ignoring blank values.
    pub fn selected_printer(&self) -> Option<&str> {
        self.selected_printer
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }
}

/// Runtime settings for the intake server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    /// Address to listen on.  Loopback by default.
    pub host: IpAddr,
    /// Port to listen on.
    pub port: u16,
    /// Printer identifier used when nothing is configured.
    pub fallback_printer: String,
}

impl ServerSettings {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Base URL clients use to reach the intake server.
    pub fn base_url(&self) -> String {
        let host = if self.host.is_unspecified() {
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        } else {
            self.host
        };
        format!("http://{}", SocketAddr::new(host, self.port))
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: DEFAULT_PORT,
            fallback_printer: DEFAULT_FALLBACK_PRINTER.into(),
        }
    }
}
