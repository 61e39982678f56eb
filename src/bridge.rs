//! Hand-off from the keyboard thread to the command context.
//!
//! The bridge owns the [`KeyStateTracker`] and publishes each changed
//! snapshot into a `watch` channel. The channel holds a single slot, so a
//! new snapshot overwrites one the dispatcher has not picked up yet and the
//! dispatcher always wakes to the freshest state.

use crate::domain::key_state::KeyStateTracker;
use crate::domain::models::{Direction, DispatchRequest, KeyState, KeyTransition, RawKeyEvent};
use tokio::sync::watch;
use tracing::{debug, info, trace};

/// Receiving half of the hand-off, consumed by the dispatcher.
pub type DispatchReceiver = watch::Receiver<Option<DispatchRequest>>;

pub struct EventBridge {
    tracker: KeyStateTracker,
    tx: watch::Sender<Option<DispatchRequest>>,
    seq: u64,
    receiver_gone: bool,
}

impl EventBridge {
    pub fn new(tracker: KeyStateTracker) -> (Self, DispatchReceiver) {
        let (tx, rx) = watch::channel(None);
        let bridge = Self {
            tracker,
            tx,
            seq: 0,
            receiver_gone: false,
        };
        (bridge, rx)
    }

    /// Called on the input thread for every physical key transition.
    ///
    /// Never blocks and never fails: unknown keys and duplicate transitions
    /// are dropped here, and a closed command context is only logged.
    pub fn on_event(&mut self, event: RawKeyEvent) {
        let Some(direction) = Direction::from_key_name(&event.key) else {
            trace!("Ignoring key {:?}", event.key);
            return;
        };

        let held = event.transition == KeyTransition::Pressed;
        if !self.tracker.set(direction, held) {
            trace!("Duplicate {:?} for {}", event.transition, direction);
            return;
        }

        self.schedule_dispatch();
    }

    /// Release everything that is held, e.g. when the input hook goes away.
    pub fn release_all(&mut self) {
        if self.tracker.release_all() {
            self.schedule_dispatch();
        }
    }

    pub fn snapshot(&self) -> KeyState {
        self.tracker.snapshot()
    }

    /// Number of snapshots published so far.
    pub fn dispatch_count(&self) -> u64 {
        self.seq
    }

    fn schedule_dispatch(&mut self) {
        self.seq += 1;
        let request = DispatchRequest {
            seq: self.seq,
            state: self.tracker.snapshot(),
        };
        info!("Drive state: {}", request.state);

        // Overwrites whatever is still pending; succeeds with no receivers.
        self.tx.send_replace(Some(request));

        if self.tx.is_closed() && !self.receiver_gone {
            debug!("Command context is gone, key state is no longer dispatched");
            self.receiver_gone = true;
        }
    }
}
