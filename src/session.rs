//! One connect, drive, teardown cycle, and the retry loop around it.

use crate::bridge::EventBridge;
use crate::dispatcher::CommandDispatcher;
use crate::domain::errors::ControlError;
use crate::domain::key_state::KeyStateTracker;
use crate::infrastructure::keyboard::KeyInput;
use crate::transport::{ConnectTarget, DriveTransport};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// How long teardown waits for the stop frame before disconnecting anyway.
const HALT_TIMEOUT: Duration = Duration::from_millis(500);

/// Process-wide stop request. Cheap to clone, safe to trigger from any thread.
#[derive(Clone)]
pub struct Interrupt {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for Interrupt {
    fn default() -> Self {
        Self::new()
    }
}

impl Interrupt {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn trigger(&self) {
        if !self.tx.send_replace(true) {
            info!("Interrupt received, shutting down");
        }
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once [`trigger`](Self::trigger) has been called, immediately
    /// if it already was.
    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = rx.wait_for(|triggered| *triggered).await;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The user asked to quit.
    Interrupted,
    /// The input hook stopped delivering events.
    InputClosed,
}

/// Connect, hand key input to the dispatcher and tear everything down.
///
/// Whatever ends the session, the input hook is removed and `close()` runs
/// exactly once before this returns. A robot left moving by a cut-short
/// dispatch loop gets an idle frame before the disconnect.
pub async fn run_session(
    transport: &dyn DriveTransport,
    input: &mut dyn KeyInput,
    target: &ConnectTarget,
    interrupt: &Interrupt,
) -> Result<SessionEnd, ControlError> {
    let mut dispatcher = match CommandDispatcher::connect(transport, target, interrupt).await {
        Ok(dispatcher) => dispatcher,
        Err(ControlError::Cancelled(_)) => return Ok(SessionEnd::Interrupted),
        Err(e) => return Err(e),
    };

    let (bridge, rx) = EventBridge::new(KeyStateTracker::new());
    if let Err(e) = input.install(bridge, interrupt.clone()) {
        error!("Failed to install keyboard hook: {:#}", e);
        if let Err(close_err) = dispatcher.close().await {
            warn!("{}", close_err);
        }
        return Err(ControlError::Input(e.to_string()));
    }

    let outcome = tokio::select! {
        result = dispatcher.run(rx) => result.map(|()| SessionEnd::InputClosed),
        _ = interrupt.wait() => Ok(SessionEnd::Interrupted),
    };

    input.uninstall().await;
    dispatcher.halt(HALT_TIMEOUT).await;
    let closed = dispatcher.close().await;

    match (outcome, closed) {
        (Err(e), _) => Err(e),
        (Ok(SessionEnd::Interrupted), Err(e)) => {
            warn!("Teardown after interrupt: {}", e);
            Ok(SessionEnd::Interrupted)
        }
        (Ok(_), Err(e)) => Err(e),
        (Ok(end), Ok(())) => Ok(end),
    }
}

/// Keep running sessions until interrupted.
///
/// Recoverable failures (device not found, link dropped) start a new session
/// after `retry_delay`. Anything else is returned to the caller.
pub async fn run_forever(
    transport: &dyn DriveTransport,
    input: &mut dyn KeyInput,
    target: &ConnectTarget,
    interrupt: &Interrupt,
    retry_delay: Duration,
) -> Result<(), ControlError> {
    loop {
        if interrupt.is_triggered() {
            return Ok(());
        }

        match run_session(transport, input, target, interrupt).await {
            Ok(SessionEnd::Interrupted) => return Ok(()),
            Ok(SessionEnd::InputClosed) => {
                info!("Keyboard input closed, exiting");
                return Ok(());
            }
            Err(e) if e.is_recoverable() => {
                warn!("{}, retrying", e);
            }
            Err(e) => return Err(e),
        }

        tokio::select! {
            _ = tokio::time::sleep(retry_delay) => {}
            _ = interrupt.wait() => return Ok(()),
        }
    }
}
