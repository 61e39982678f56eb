//! Keyboard teleoperation for the Romi robot over Bluetooth LE.
//!
//! Arrow key presses are read on a dedicated input thread, folded into a
//! held/released map and written to the robot's drive characteristic as a
//! 4-byte frame from a single-threaded tokio context.
//!
//! ```text
//! keyboard thread                      tokio current-thread runtime
//! ───────────────                      ────────────────────────────
//! KeyInput ──► EventBridge ──watch──► CommandDispatcher ──► DriveLink
//!              (KeyStateTracker)      (one write at a time)
//! ```

pub mod bridge;
pub mod cmd_args;
pub mod dispatcher;
pub mod domain;
pub mod infrastructure;
pub mod session;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;
