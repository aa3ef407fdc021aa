use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::{trace, warn};
use vrpnio_wire::Message;

use crate::registry::Registry;

/// Route a decoded application message to every matching handler.
///
/// Resolution is name-based: the sender ID and type ID are looked up in the
/// registry, and the handler list keyed by `(type name, sender name)` is
/// invoked in registration order. Any miss along the way drops the message;
/// the server may well announce senders or types this client has no adapter
/// for. Returns the number of handlers invoked.
///
/// A panicking handler is isolated so that later handlers still see the
/// message.
pub fn route(registry: &Registry, msg: &Message) -> usize {
    let Some(sender_name) = registry.sender_name(msg.header.sender) else {
        trace!(sender = msg.header.sender, "dropping message: unknown sender");
        return 0;
    };
    let Some(type_name) = registry.type_name(msg.header.type_id) else {
        trace!(type_id = msg.header.type_id, "dropping message: unknown type");
        return 0;
    };

    let handlers = registry.handlers_for(&type_name, &sender_name);
    if handlers.is_empty() {
        trace!(type_name, sender_name, "dropping message: no handler");
        return 0;
    }

    let mut invoked = 0;
    for handler in &handlers {
        if catch_unwind(AssertUnwindSafe(|| handler(msg))).is_err() {
            warn!(type_name, sender_name, "message handler panicked");
        }
        invoked += 1;
    }
    invoked
}
