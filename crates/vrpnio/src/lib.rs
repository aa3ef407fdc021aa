//! Client for the VRPN device-streaming protocol.
//!
//! VRPN servers stream continuous sensor data — tracker poses, button
//! transitions, analog channels — over a combined TCP-control / UDP-data
//! transport. This crate re-exports the full client stack:
//!
//! - [`wire`] — pure wire-format codec: headers, alignment, control payloads
//! - [`registry`] — sender/type name directory and handler dispatch
//! - [`client`] — connection bootstrap and the message pump
//! - [`remote`] — device adapters decoding payloads into typed events
//!
//! # Quick start
//!
//! ```no_run
//! use std::net::Ipv4Addr;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use vrpnio::client::Connection;
//! use vrpnio::registry::Registry;
//! use vrpnio::remote::{Remote, TrackerRemote};
//!
//! let registry = Arc::new(Registry::new());
//! let mut tracker = TrackerRemote::new("Tracker0", Arc::clone(&registry));
//! tracker.register();
//!
//! let mut conn = Connection::new("vrpn.example.org", 3883, Ipv4Addr::UNSPECIFIED, registry);
//! conn.connect(3, Duration::from_secs(1)).unwrap();
//! while conn.connected() {
//!     conn.read_messages().unwrap();
//!     for event in tracker.events().try_iter() {
//!         println!("{:?}", event.record);
//!     }
//! }
//! ```

/// Re-export wire format types.
pub mod wire {
    pub use vrpnio_wire::*;
}

/// Re-export registry and dispatch types.
pub mod registry {
    pub use vrpnio_registry::*;
}

/// Re-export connection management types.
pub mod client {
    pub use vrpnio_client::*;
}

/// Re-export device adapter types.
pub mod remote {
    pub use vrpnio_remote::*;
}
