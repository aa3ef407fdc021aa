//! Device adapters for the VRPN device classes.
//!
//! Each adapter is constructed with its device name and a shared registry.
//! [`Remote::register`] allocates local IDs for the message shapes the
//! adapter handles and installs one handler per shape, keyed by
//! `(shape name, device name)`. Decoded records leave the adapter on a
//! channel as typed events carrying the original header; the application
//! drains them at its own pace, off the reader thread.
//!
//! Payload layouts are validated exactly: a message whose declared length
//! does not match its shape is logged and dropped, never fatal.

pub mod analog;
pub mod button;
mod decode;
pub mod error;
pub mod tracker;

pub use analog::{AnalogEvent, AnalogRemote};
pub use button::{ButtonEvent, ButtonRecord, ButtonRemote};
pub use error::DecodeError;
pub use tracker::{TrackerEvent, TrackerRecord, TrackerRemote};

/// Capability interface implemented by every device adapter.
pub trait Remote {
    /// The device name; the "sender" component of every handler key.
    fn name(&self) -> &str;

    /// Allocate local IDs and install this adapter's handlers.
    /// Idempotent: registering twice installs nothing new.
    fn register(&mut self);

    /// Remove every handler this adapter installed.
    fn unregister(&mut self);
}
