// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Tray controller.
//
// The tray icon runs its own blocking event loop on a dedicated thread.
// Creating or running it may fail; it is retried under `TRAY_RETRY` and then
// abandoned with a degraded-mode notice.  The application works without it.
//
// Tray actions never act directly.  "open" and "quit" become bus messages;
// "status" starts a probe on the async runtime that reports back through the
// bus.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use async_trait::async_trait;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use ticketline_core::error::{Result, TicketlineError};
use ticketline_core::log_digest::Stage;
use ticketline_core::retry::{should_retry, RetryDecision, RetryPolicy, TRAY_RETRY};
use ticketline_core::{LogLevel, MessageBus};

use crate::coordinator::ShutdownStep;

/// Longest a tray icon may block before the stop flag is checked.
pub const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// A user action on the tray icon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrayAction {
    Open,
    Status,
    Quit,
}

/// A live tray icon.
pub trait TrayIcon {
    /// Wait up to `timeout` for the next action.  `Ok(None)` on timeout.
    fn poll_action(&mut self, timeout: Duration) -> Result<Option<TrayAction>>;

    /// Remove the icon.
    fn close(&mut self);
}

/// Creates tray icons on the tray thread.
pub trait TrayFactory: Send + 'static {
    fn create(&mut self) -> Result<Box<dyn TrayIcon>>;
}

/// Asks the intake server whether it is alive.
#[async_trait]
pub trait StatusProbe: Send + Sync + 'static {
    async fn probe(&self) -> Result<String>;
}

// ---------------------------------------------------------------------------
// TrayHandle
// ---------------------------------------------------------------------------

/// Stops the tray thread.  Clones share the same thread.
#[derive(Clone)]
pub struct TrayHandle {
    stop: Arc<AtomicBool>,
    thread: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl TrayHandle {
    /// Signal the tray thread and wait for it.  Idempotent.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
        let thread = self
            .thread
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(thread) = thread {
            if thread.join().is_err() {
                warn!("tray thread panicked");
            }
            info!("tray stopped");
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ShutdownStep for TrayHandle {
    fn name(&self) -> &str {
        "tray"
    }

    async fn run(&self) -> Result<()> {
        let handle = self.clone();
        tokio::task::spawn_blocking(move || handle.stop())
            .await
            .map_err(|e| TicketlineError::Fatal(format!("tray stop: {e}")))
    }
}

// ---------------------------------------------------------------------------
// TrayController
// ---------------------------------------------------------------------------

pub struct TrayController {
    factory: Box<dyn TrayFactory>,
    bus: MessageBus,
    probe: Arc<dyn StatusProbe>,
    runtime: Handle,
    policy: RetryPolicy,
    stop: Arc<AtomicBool>,
}

impl TrayController {
    /// Start the tray thread.
    ///
    /// # Errors
    ///
    /// `Fatal` if the OS refuses to create a thread.
    pub fn start(
        factory: Box<dyn TrayFactory>,
        bus: MessageBus,
        probe: Arc<dyn StatusProbe>,
        runtime: Handle,
    ) -> Result<TrayHandle> {
        Self::start_with_policy(factory, bus, probe, runtime, TRAY_RETRY)
    }

    pub fn start_with_policy(
        factory: Box<dyn TrayFactory>,
        bus: MessageBus,
        probe: Arc<dyn StatusProbe>,
        runtime: Handle,
        policy: RetryPolicy,
    ) -> Result<TrayHandle> {
        let stop = Arc::new(AtomicBool::new(false));
        let controller = Self {
            factory,
            bus,
            probe,
            runtime,
            policy,
            stop: stop.clone(),
        };

        let thread = std::thread::Builder::new()
            .name("tray".into())
            .spawn(move || controller.run())
            .map_err(|e| TicketlineError::Fatal(format!("tray thread: {e}")))?;

        Ok(TrayHandle {
            stop,
            thread: Arc::new(Mutex::new(Some(thread))),
        })
    }

    fn stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    fn run(mut self) {
        let mut attempts = 0;
        loop {
            if self.stopped() {
                return;
            }
            attempts += 1;

            let failure = match self.factory.create() {
                Ok(mut icon) => {
                    debug!(attempt = attempts, "tray icon created");
                    let outcome = self.event_loop(icon.as_mut());
                    icon.close();
                    match outcome {
                        Ok(()) => return,
                        Err(e) => e,
                    }
                }
                Err(e) => e,
            };

            warn!(attempt = attempts, error = %failure, "tray icon failed");
            match should_retry(attempts, &self.policy) {
                RetryDecision::RetryAfter(delay) => self.sleep(delay),
                RetryDecision::Exhausted => {
                    self.bus.warn(format!(
                        "Ícone da bandeja indisponível após {attempts} tentativas; \
                         o Ticketline continua funcionando sem ele ({failure})"
                    ));
                    return;
                }
            }
        }
    }

    /// Pump actions until stopped.  `Err` when the icon itself fails.
    fn event_loop(&self, icon: &mut dyn TrayIcon) -> Result<()> {
        while !self.stopped() {
            if let Some(action) = icon.poll_action(POLL_INTERVAL)? {
                self.dispatch(action);
            }
        }
        Ok(())
    }

    fn dispatch(&self, action: TrayAction) {
        debug!(?action, "tray action");
        match action {
            TrayAction::Open => {
                self.bus.open_ui();
            }
            TrayAction::Quit => {
                self.bus.quit();
            }
            TrayAction::Status => {
                let probe = Arc::clone(&self.probe);
                let bus = self.bus.clone();
                self.runtime.spawn(async move {
                    match probe.probe().await {
                        Ok(text) => bus.info(format!("Status do servidor: {text}")),
                        Err(e) => bus.stage(
                            Stage::ServerUnreachable,
                            LogLevel::Error,
                            format!("Falha ao consultar status do servidor: {e}"),
                        ),
                    };
                });
            }
        }
    }

    /// Sleep in short slices so a stop request is not held up.
    fn sleep(&self, total: Duration) {
        let step = Duration::from_millis(50);
        let mut left = total;
        while !left.is_zero() && !self.stopped() {
            let slice = left.min(step);
            std::thread::sleep(slice);
            left -= slice;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;

    use ticketline_core::retry::Backoff;
    use ticketline_core::{bus, BusReceiver, ControlMessage};

    struct ScriptedIcon {
        actions: VecDeque<TrayAction>,
        closed: Arc<AtomicUsize>,
    }

    impl TrayIcon for ScriptedIcon {
        fn poll_action(&mut self, timeout: Duration) -> Result<Option<TrayAction>> {
            match self.actions.pop_front() {
                Some(action) => Ok(Some(action)),
                None => {
                    std::thread::sleep(timeout.min(Duration::from_millis(10)));
                    Ok(None)
                }
            }
        }

        fn close(&mut self) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct ScriptedFactory {
        failures_left: usize,
        created: Arc<AtomicUsize>,
        closed: Arc<AtomicUsize>,
        actions: Vec<TrayAction>,
    }

    impl TrayFactory for ScriptedFactory {
        fn create(&mut self) -> Result<Box<dyn TrayIcon>> {
            self.created.fetch_add(1, Ordering::SeqCst);
            if self.failures_left > 0 {
                self.failures_left -= 1;
                return Err(TicketlineError::Fatal("no system tray".into()));
            }
            Ok(Box::new(ScriptedIcon {
                actions: self.actions.drain(..).collect(),
                closed: self.closed.clone(),
            }))
        }
    }

    struct FixedProbe(std::result::Result<&'static str, &'static str>);

    #[async_trait]
    impl StatusProbe for FixedProbe {
        async fn probe(&self) -> Result<String> {
            self.0
                .map(String::from)
                .map_err(|e| TicketlineError::Client(e.into()))
        }
    }

    const FAST: RetryPolicy = RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_millis(5),
        backoff: Backoff::Linear,
    };

    struct Rig {
        handle: TrayHandle,
        rx: BusReceiver,
        created: Arc<AtomicUsize>,
        closed: Arc<AtomicUsize>,
    }

    fn start(failures: usize, actions: Vec<TrayAction>, probe: FixedProbe) -> Rig {
        let created = Arc::new(AtomicUsize::new(0));
        let closed = Arc::new(AtomicUsize::new(0));
        let factory = ScriptedFactory {
            failures_left: failures,
            created: created.clone(),
            closed: closed.clone(),
            actions,
        };
        let (bus, rx) = bus::channel();
        let handle = TrayController::start_with_policy(
            Box::new(factory),
            bus,
            Arc::new(probe),
            Handle::current(),
            FAST,
        )
        .expect("tray thread");
        Rig { handle, rx, created, closed }
    }

    async fn collect(rx: &mut BusReceiver, wait: Duration) -> Vec<ControlMessage> {
        tokio::time::sleep(wait).await;
        rx.drain().messages
    }

    fn texts(messages: &[ControlMessage]) -> Vec<String> {
        messages
            .iter()
            .filter_map(|m| match m {
                ControlMessage::Log(event) => Some(event.text.clone()),
                _ => None,
            })
            .collect()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn actions_become_bus_messages() {
        let mut rig = start(0, vec![TrayAction::Open, TrayAction::Quit], FixedProbe(Ok("ok")));

        let messages = collect(&mut rig.rx, Duration::from_millis(100)).await;
        assert_eq!(messages, vec![ControlMessage::OpenUi, ControlMessage::Quit]);

        rig.handle.stop();
        assert_eq!(rig.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn creation_is_retried_then_succeeds() {
        let mut rig = start(2, vec![TrayAction::Open], FixedProbe(Ok("ok")));

        let messages = collect(&mut rig.rx, Duration::from_millis(200)).await;
        assert_eq!(rig.created.load(Ordering::SeqCst), 3);
        assert!(messages.contains(&ControlMessage::OpenUi));
        rig.handle.stop();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn gives_up_after_three_attempts() {
        let mut rig = start(10, vec![], FixedProbe(Ok("ok")));

        let messages = collect(&mut rig.rx, Duration::from_millis(200)).await;
        assert_eq!(rig.created.load(Ordering::SeqCst), 3);
        let logs = texts(&messages);
        assert_eq!(logs.len(), 1);
        assert!(logs[0].contains("bandeja indisponível"));

        // Thread already ended; stopping is still fine.
        rig.handle.stop();
        rig.handle.stop();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn status_probe_reports_through_bus() {
        let mut rig = start(0, vec![TrayAction::Status], FixedProbe(Err("connection refused")));

        let messages = collect(&mut rig.rx, Duration::from_millis(150)).await;
        let failure = messages.iter().find_map(|m| match m {
            ControlMessage::Log(event) if event.stage == Some(Stage::ServerUnreachable) => Some(event),
            _ => None,
        });
        assert!(failure.is_some(), "messages: {messages:?}");
        rig.handle.stop();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn shutdown_step_stops_the_thread() {
        let rig = start(0, vec![], FixedProbe(Ok("ok")));
        ShutdownStep::run(&rig.handle).await.expect("stop");
        assert!(rig.handle.is_stopped());
        ShutdownStep::run(&rig.handle).await.expect("second stop");
    }
}
