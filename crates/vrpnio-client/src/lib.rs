//! VRPN connection management.
//!
//! A VRPN client does not dial the server's TCP port. It sends a UDP
//! rendezvous datagram naming a local TCP listener, and the server connects
//! back to that listener. The accepted stream becomes the control socket;
//! a second, locally bound UDP socket receives the data stream once the
//! client has announced it over TCP.
//!
//! [`Connection`] owns both sockets, runs the connect state machine, and
//! pumps received messages into the shared registry and dispatch engine.
//! Pumping never blocks: both sockets are availability-checked before any
//! read, so `read_messages` is safe to call in a tight loop on a dedicated
//! reader thread.

pub mod connection;
pub mod error;
mod sys;

pub use connection::{Connection, ConnectionConfig, MessageObserver};
pub use error::{ClientError, Result};
