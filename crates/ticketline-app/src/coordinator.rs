// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Lifecycle coordinator: the single consumer of the message bus.
//
// Owns the UI.  Drains the bus on a fixed tick and acts on each message in
// order.  `Quit` runs the shutdown steps once, each under its own timeout; a
// failing or hanging step is logged and skipped.  After the last step the
// coordinator is `Terminated` and `run` returns.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use ticketline_core::error::Result;
use ticketline_core::{BusReceiver, ControlMessage, LogEvent};

/// Interval between bus drains.
pub const TICK: Duration = Duration::from_millis(100);

/// Budget for each shutdown step.
pub const STEP_TIMEOUT: Duration = Duration::from_secs(3);

/// Log events kept for replay when a UI opens.
pub const BACKLOG_LIMIT: usize = 500;

// ---------------------------------------------------------------------------
// Seams
// ---------------------------------------------------------------------------

/// An open UI window.
pub trait UiShell: Send {
    /// Whether the window is still open.
    fn is_active(&self) -> bool;

    /// Show one log event in the UI's log views.
    fn log(&mut self, event: &LogEvent);
}

/// Builds UI windows on demand.
pub trait UiFactory: Send {
    /// Open a window, replaying `backlog` into it.
    fn open(&mut self, backlog: &[LogEvent]) -> Result<Box<dyn UiShell>>;
}

/// One step of the shutdown sequence.  Must tolerate running when the thing
/// it stops is already stopped.
#[async_trait]
pub trait ShutdownStep: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

/// Lifecycle state.  Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Running,
    ShuttingDown,
    Terminated,
}

pub struct Coordinator {
    state: LifecycleState,
    ui_factory: Box<dyn UiFactory>,
    ui: Option<Box<dyn UiShell>>,
    backlog: VecDeque<LogEvent>,
    steps: Vec<Box<dyn ShutdownStep>>,
    tick: Duration,
    step_timeout: Duration,
    shutdown_runs: usize,
}

impl Coordinator {
    pub fn new(ui_factory: Box<dyn UiFactory>) -> Self {
        Self {
            state: LifecycleState::Running,
            ui_factory,
            ui: None,
            backlog: VecDeque::with_capacity(BACKLOG_LIMIT),
            steps: Vec::new(),
            tick: TICK,
            step_timeout: STEP_TIMEOUT,
            shutdown_runs: 0,
        }
    }

    /// Append a shutdown step.  Steps run in the order they were added.
    pub fn with_step(mut self, step: Box<dyn ShutdownStep>) -> Self {
        self.steps.push(step);
        self
    }

    pub fn with_step_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout = timeout;
        self
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// How many times the shutdown sequence has started.
    pub fn shutdown_runs(&self) -> usize {
        self.shutdown_runs
    }

    pub fn has_ui(&self) -> bool {
        self.ui.as_ref().is_some_and(|ui| ui.is_active())
    }

    /// Consume the bus until shutdown completes.
    ///
    /// A bus with no producers left is treated as `Quit`.
    pub async fn run(mut self, mut rx: BusReceiver) -> LifecycleState {
        let mut ticker = tokio::time::interval(self.tick);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        while self.state != LifecycleState::Terminated {
            ticker.tick().await;

            let drained = rx.drain();
            for message in drained.messages {
                self.handle(message).await;
            }
            if drained.closed && self.state == LifecycleState::Running {
                info!("message bus closed, shutting down");
                self.shutdown().await;
            }
        }

        self.state
    }

    /// Act on one message.
    pub async fn handle(&mut self, message: ControlMessage) {
        if self.state != LifecycleState::Running {
            debug!(?message, state = ?self.state, "ignored after shutdown began");
            return;
        }

        match message {
            ControlMessage::OpenUi => self.open_ui(),
            ControlMessage::Quit => self.shutdown().await,
            ControlMessage::Log(event) => self.forward_log(event),
        }
    }

    fn open_ui(&mut self) {
        if self.has_ui() {
            debug!("UI already open");
            return;
        }

        self.ui = None;
        let backlog: Vec<LogEvent> = self.backlog.iter().cloned().collect();
        match self.ui_factory.open(&backlog) {
            Ok(ui) => {
                info!(replayed = backlog.len(), "UI opened");
                self.ui = Some(ui);
            }
            Err(e) => error!(error = %e, "UI could not be opened"),
        }
    }

    fn forward_log(&mut self, event: LogEvent) {
        if let Some(ui) = self.ui.as_mut().filter(|ui| ui.is_active()) {
            ui.log(&event);
        }
        if self.backlog.len() == BACKLOG_LIMIT {
            self.backlog.pop_front();
        }
        self.backlog.push_back(event);
    }

    /// Run the shutdown sequence.  Only the first call does anything.
    pub async fn shutdown(&mut self) {
        if self.state != LifecycleState::Running {
            debug!(state = ?self.state, "shutdown already in progress");
            return;
        }

        self.state = LifecycleState::ShuttingDown;
        self.shutdown_runs += 1;
        info!(steps = self.steps.len(), "shutting down");

        for step in &self.steps {
            match tokio::time::timeout(self.step_timeout, step.run()).await {
                Ok(Ok(())) => debug!(step = step.name(), "shutdown step done"),
                Ok(Err(e)) => warn!(step = step.name(), error = %e, "shutdown step failed"),
                Err(_) => warn!(
                    step = step.name(),
                    timeout_ms = self.step_timeout.as_millis() as u64,
                    "shutdown step timed out"
                ),
            }
        }

        self.ui = None;
        self.state = LifecycleState::Terminated;
        info!("shutdown complete");
    }
}
