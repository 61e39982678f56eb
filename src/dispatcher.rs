//! Owner of the wireless session.
//!
//! ```text
//! Disconnected -> Connecting -> Connected <-> Writing
//!        ^______________________|_____________|   (fatal error or close)
//! ```
//!
//! `Disconnected` is terminal. Reconnecting means building a new dispatcher.

use crate::bridge::DispatchReceiver;
use crate::domain::errors::ControlError;
use crate::domain::models::{CommandFrame, DispatchRequest, DispatcherState, KeyState};
use crate::session::Interrupt;
use crate::transport::{ConnectTarget, DriveLink, DriveTransport};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub struct CommandDispatcher {
    link: Option<Box<dyn DriveLink>>,
    state: DispatcherState,
    drive_characteristic: Uuid,
    last_seq: u64,
    frames_written: u64,
    // Last state handed to the link, whether or not the write completed.
    last_sent: KeyState,
}

impl CommandDispatcher {
    /// Open a session with the robot described by `target`.
    ///
    /// Gives up with `Cancelled` once `interrupt` fires.
    pub async fn connect(
        transport: &dyn DriveTransport,
        target: &ConnectTarget,
        interrupt: &Interrupt,
    ) -> Result<Self, ControlError> {
        let mut dispatcher = Self {
            link: None,
            state: DispatcherState::Connecting,
            drive_characteristic: target.drive_characteristic,
            last_seq: 0,
            frames_written: 0,
            last_sent: KeyState::default(),
        };

        info!(
            "Searching for device {} ({:.1}s timeout)",
            target.address,
            target.timeout.as_secs_f64()
        );
        match transport.connect(target, interrupt).await {
            Ok(link) => {
                info!("Connected to {}", target.address);
                dispatcher.link = Some(link);
                dispatcher.state = DispatcherState::Connected;
                Ok(dispatcher)
            }
            Err(e) => {
                dispatcher.state = DispatcherState::Disconnected;
                Err(e)
            }
        }
    }

    pub fn state(&self) -> DispatcherState {
        self.state
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    /// Serialize `state` and write it to the drive characteristic.
    ///
    /// A failed write ends the session: the link is closed and
    /// `ConnectionLost` is returned.
    pub async fn send(&mut self, state: KeyState) -> Result<(), ControlError> {
        let Some(link) = self.link.as_ref() else {
            return Err(ControlError::NotConnected);
        };

        let frame = CommandFrame::from(&state);
        self.state = DispatcherState::Writing;
        self.last_sent = state;
        debug!("Writing drive frame {:?} ({})", frame.as_bytes(), state);

        let result = link
            .write_characteristic(self.drive_characteristic, frame.as_bytes())
            .await;
        match result {
            Ok(()) => {
                self.state = DispatcherState::Connected;
                self.frames_written += 1;
                Ok(())
            }
            Err(e) => {
                error!("Drive write failed: {}", e);
                if let Err(close_err) = self.close().await {
                    debug!("Disconnect after failed write also failed: {}", close_err);
                }
                Err(match e {
                    ControlError::ConnectionLost(reason) => ControlError::ConnectionLost(reason),
                    other => ControlError::ConnectionLost(other.to_string()),
                })
            }
        }
    }

    /// Send a handed-off snapshot unless a newer one was already written.
    ///
    /// Returns `Ok(false)` when the request was stale and skipped.
    pub async fn dispatch(&mut self, request: DispatchRequest) -> Result<bool, ControlError> {
        if request.seq <= self.last_seq {
            debug!(
                "Skipping stale snapshot #{} (last sent #{})",
                request.seq, self.last_seq
            );
            return Ok(false);
        }
        self.send(request.state).await?;
        self.last_seq = request.seq;
        Ok(true)
    }

    /// Write snapshots from the bridge one at a time until the bridge goes
    /// away or a write fails.
    ///
    /// Snapshots published while a write is in flight overwrite each other in
    /// the hand-off slot, so after each write only the latest is picked up.
    pub async fn run(&mut self, mut rx: DispatchReceiver) -> Result<(), ControlError> {
        loop {
            if rx.changed().await.is_err() {
                info!("Input bridge closed, stopping dispatch");
                return Ok(());
            }
            let pending = *rx.borrow_and_update();
            if let Some(request) = pending {
                self.dispatch(request).await?;
            }
        }
    }

    /// Write an idle frame if the robot may still be driving.
    ///
    /// Used on teardown when the dispatch loop was cut short. Bounded by
    /// `limit`; failures are logged, never returned.
    pub async fn halt(&mut self, limit: Duration) {
        if self.link.is_none() || self.last_sent.is_idle() {
            return;
        }
        match tokio::time::timeout(limit, self.send(KeyState::default())).await {
            Ok(Ok(())) => debug!("Stop frame written"),
            Ok(Err(e)) => warn!("Could not write stop frame: {}", e),
            Err(_) => warn!("Stop frame not written within {:?}", limit),
        }
    }

    /// Release the connection. Only the first call reaches the transport.
    pub async fn close(&mut self) -> Result<(), ControlError> {
        let Some(link) = self.link.take() else {
            self.state = DispatcherState::Disconnected;
            return Ok(());
        };

        if self.state == DispatcherState::Writing {
            debug!("Closing with a write in flight");
        }
        self.state = DispatcherState::Disconnected;

        match link.disconnect().await {
            Ok(()) => {
                info!("The client has disconnected");
                Ok(())
            }
            Err(e) => {
                warn!("Disconnect failed: {}", e);
                Err(ControlError::ConnectionLost(e.to_string()))
            }
        }
    }
}

impl Drop for CommandDispatcher {
    fn drop(&mut self) {
        if self.link.is_some() {
            warn!("CommandDispatcher dropped without close(), connection may stay open");
        }
    }
}
