// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The control message bus.
//
// A single FIFO channel with exactly one consumer: the lifecycle coordinator
// that owns the UI.  Every other execution context (intake server, tray
// thread, background workers) holds a cloned `MessageBus` and only ever
// enqueues.  Nothing outside the coordinator opens the UI or ends the
// process.

use chrono::{DateTime, Local};
use tokio::sync::mpsc::{self, error::TryRecvError};
use tracing::{error, info, warn};

use crate::log_digest::{self, SimplifiedLog, Stage};
use crate::types::LogLevel;

/// A log line travelling to the UI sinks.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEvent {
    /// Technical text, always shown in the advanced view.
    pub text: String,
    pub level: LogLevel,
    /// Stage the line reports on, if any.
    pub stage: Option<Stage>,
    /// Operator-facing counterpart, if the line deserves one.
    pub simplified: Option<SimplifiedLog>,
    pub at: DateTime<Local>,
}

impl LogEvent {
    pub fn new(level: LogLevel, stage: Option<Stage>, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            level,
            stage,
            simplified: log_digest::digest(stage, level),
            at: Local::now(),
        }
    }
}

/// Commands and events carried by the bus.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlMessage {
    /// Show the UI, constructing it if none is active.
    OpenUi,
    /// Run the shutdown sequence and end the process.
    Quit,
    /// Forward a log line to the UI sinks.
    Log(LogEvent),
}

/// Producer handle.  Cheap to clone; one per execution context.
#[derive(Debug, Clone)]
pub struct MessageBus {
    tx: mpsc::UnboundedSender<ControlMessage>,
}

/// The single consumer end, owned by the lifecycle coordinator.
#[derive(Debug)]
pub struct BusReceiver {
    rx: mpsc::UnboundedReceiver<ControlMessage>,
}

/// Messages taken by one [`BusReceiver::drain`] call.
#[derive(Debug, Default)]
pub struct Drained {
    /// Messages in emission order.
    pub messages: Vec<ControlMessage>,
    /// All producers are gone; nothing more will arrive.
    pub closed: bool,
}

/// Create a connected bus and its consumer.
pub fn channel() -> (MessageBus, BusReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (MessageBus { tx }, BusReceiver { rx })
}

impl MessageBus {
    /// Enqueue a message.  Returns `false` once the consumer has gone away,
    /// which only happens during process exit.
    pub fn send(&self, message: ControlMessage) -> bool {
        self.tx.send(message).is_ok()
    }

    pub fn open_ui(&self) -> bool {
        self.send(ControlMessage::OpenUi)
    }

    pub fn quit(&self) -> bool {
        self.send(ControlMessage::Quit)
    }

    /// Record a log line: emitted to `tracing` immediately and queued for
    /// the UI sinks.
    pub fn log(&self, level: LogLevel, stage: Option<Stage>, text: impl Into<String>) -> bool {
        let event = LogEvent::new(level, stage, text);
        match level {
            LogLevel::Info => info!(target: "ticketline::events", stage = ?event.stage, "{}", event.text),
            LogLevel::Warn => warn!(target: "ticketline::events", stage = ?event.stage, "{}", event.text),
            LogLevel::Error => error!(target: "ticketline::events", stage = ?event.stage, "{}", event.text),
        }
        self.send(ControlMessage::Log(event))
    }

    pub fn info(&self, text: impl Into<String>) -> bool {
        self.log(LogLevel::Info, None, text)
    }

    pub fn warn(&self, text: impl Into<String>) -> bool {
        self.log(LogLevel::Warn, None, text)
    }

    pub fn error(&self, text: impl Into<String>) -> bool {
        self.log(LogLevel::Error, None, text)
    }

    pub fn stage(&self, stage: Stage, level: LogLevel, text: impl Into<String>) -> bool {
        self.log(level, Some(stage), text)
    }
}

impl BusReceiver {
    /// Wait for the next message.  `None` once every producer is dropped.
    pub async fn recv(&mut self) -> Option<ControlMessage> {
        self.rx.recv().await
    }

    /// Take everything queued right now without waiting.
    pub fn drain(&mut self) -> Drained {
        let mut drained = Drained::default();
        loop {
            match self.rx.try_recv() {
                Ok(message) => drained.messages.push(message),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    drained.closed = true;
                    break;
                }
            }
        }
        drained
    }
}
