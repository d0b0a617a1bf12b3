// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// HTTP client for a running intake server: liveness polling, test prints and
// remote shutdown.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use ticketline_core::error::{Result, TicketlineError};
use ticketline_core::retry::{should_retry, RetryDecision, RetryPolicy};

use crate::tray::StatusProbe;

/// Per-request timeout.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Ticket used by `ticketline test`.
pub const DEMO_TICKET: [(&str, &str); 5] = [
    ("code", "A123"),
    ("services", "Atendimento"),
    ("header", "Bem-vindo"),
    ("footer", "Obrigado"),
    ("created_date", "2025-01-01"),
];

/// QR content used by `ticketline test --qr`.
pub const DEMO_QR: &str = "https://exemplo.com";

#[derive(Debug, Clone)]
pub struct IntakeClient {
    http: reqwest::Client,
    base_url: String,
}

impl IntakeClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| TicketlineError::Client(format!("HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `GET /status`.
    pub async fn status(&self) -> Result<String> {
        let response = self
            .http
            .get(format!("{}/status", self.base_url))
            .send()
            .await
            .map_err(|e| TicketlineError::Client(e.to_string()))?;
        read_body(response).await
    }

    /// Print the demo ticket, with a QR block when `qr` is set.
    #[instrument(skip(self))]
    pub async fn test_print(&self, qr: bool) -> Result<String> {
        let mut query: Vec<(&str, &str)> = DEMO_TICKET.to_vec();
        let path = if qr {
            query.push(("qrcode", DEMO_QR));
            "/imprimir/qrcode"
        } else {
            "/imprimir"
        };

        let response = self
            .http
            .get(format!("{}{path}", self.base_url))
            .query(&query)
            .send()
            .await
            .map_err(|e| TicketlineError::Client(e.to_string()))?;
        read_body(response).await
    }

    /// `POST /shutdown`.
    pub async fn shutdown(&self) -> Result<String> {
        let response = self
            .http
            .post(format!("{}/shutdown", self.base_url))
            .send()
            .await
            .map_err(|e| TicketlineError::Client(e.to_string()))?;
        read_body(response).await
    }

    /// Poll `/status` until it answers or `policy` runs out.
    ///
    /// Returns the number of attempts it took.
    pub async fn wait_until_alive(&self, policy: &RetryPolicy) -> Result<u32> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            match self.status().await {
                Ok(_) => {
                    info!(attempts, url = %self.base_url, "intake server is alive");
                    return Ok(attempts);
                }
                Err(e) => {
                    debug!(attempts, error = %e, "intake server not answering yet");
                    match should_retry(attempts, policy) {
                        RetryDecision::RetryAfter(delay) => tokio::time::sleep(delay).await,
                        RetryDecision::Exhausted => {
                            warn!(attempts, "intake server never answered");
                            return Err(TicketlineError::Client(format!(
                                "{} did not answer after {attempts} attempts: {e}",
                                self.base_url
                            )));
                        }
                    }
                }
            }
        }
    }
}

async fn read_body(response: reqwest::Response) -> Result<String> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| TicketlineError::Client(e.to_string()))?;
    if status.is_success() {
        Ok(body)
    } else {
        Err(TicketlineError::Client(format!("{status}: {body}")))
    }
}

#[async_trait]
impl StatusProbe for IntakeClient {
    async fn probe(&self) -> Result<String> {
        self.status().await
    }
}
