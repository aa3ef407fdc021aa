//! Name/ID directory and handler dispatch.
//!
//! A VRPN server assigns integer IDs to its senders and message types at
//! runtime and announces them through description messages. The [`Registry`]
//! reconciles those IDs with the human-readable names adapters register
//! against, and holds the ordered handler table keyed by
//! `(type name, sender name)`. [`dispatch::route`] resolves a decoded
//! message through the tables and fans it out to every matching handler.
//!
//! The registry is explicitly owned state: construct one, wrap it in an
//! [`std::sync::Arc`], and hand clones to the connection and each adapter.
//! Independent connections get independent registries.

pub mod dispatch;
pub mod registry;

pub use dispatch::route;
pub use registry::{Handler, HandlerId, Registry};
