//! Bluetooth Module
//!
//! btleplug implementation of the drive transport.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                BleTransport                  │
//! │   (implements DriveTransport for sessions)   │
//! └──────────────────────┬──────────────────────┘
//!                        │
//!          ┌─────────────┼─────────────┐
//!          ▼             ▼             ▼
//!    ┌───────────┐ ┌────────────┐ ┌──────────┐
//!    │  Scanner  │ │ Connection │ │ Protocol │
//!    │ - adapter │ │ - GATT     │ │ - UUIDs  │
//!    │ - lookup  │ │ - BleLink  │ │ - address│
//!    └───────────┘ └────────────┘ └──────────┘
//! ```

pub mod connection;
pub mod protocol;
pub mod scanner;

pub use connection::BleTransport;
