use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;
use vrpnio_wire::Message;

/// A message handler invoked for every routed message matching its key.
pub type Handler = Arc<dyn Fn(&Message) + Send + Sync>;

/// Opaque handle returned by [`Registry::register_handler`], used to remove
/// the handler again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

#[derive(Default)]
struct Tables {
    /// Server-announced sender IDs, populated from sender descriptions.
    senders: HashMap<i32, String>,
    /// Server-announced type IDs, populated from type descriptions.
    types: HashMap<i32, String>,
    /// Locally allocated IDs for names this client may send.
    local_ids: HashMap<String, i32>,
    /// Ordered handlers keyed by (type name, sender name).
    handlers: HashMap<(String, String), Vec<(HandlerId, Handler)>>,
    next_handler_id: u64,
}

/// Directory of sender names, type names, local IDs, and message handlers.
///
/// All operations take `&self`; a single coarse mutex serializes the tables.
/// Registration events are rare relative to data messages, so contention is
/// not a concern. Lookup misses return `None`; callers drop silently.
#[derive(Default)]
pub struct Registry {
    inner: Mutex<Tables>,
}

/// Names arrive from the wire padded with NUL bytes up to the alignment
/// boundary; every name is stored and queried with those stripped.
fn clean(name: &str) -> String {
    name.replace('\0', "")
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a server-announced sender name.
    ///
    /// If another ID currently maps to the same cleaned name, that stale
    /// mapping is removed first; the server is re-announcing the sender
    /// under a new ID.
    pub fn register_sender(&self, id: i32, name: &str) {
        let name = clean(name);
        let mut tables = self.inner.lock();
        tables.senders.retain(|&other, n| other == id || *n != name);
        debug!(id, name, "registered sender");
        tables.senders.insert(id, name);
    }

    /// Record a server-announced type name. Same re-announcement rule as
    /// [`register_sender`](Self::register_sender).
    pub fn register_type(&self, id: i32, name: &str) {
        let name = clean(name);
        let mut tables = self.inner.lock();
        tables.types.retain(|&other, n| other == id || *n != name);
        debug!(id, name, "registered type");
        tables.types.insert(id, name);
    }

    /// Remove a sender mapping. No-op when absent.
    pub fn unregister_sender(&self, id: i32) {
        self.inner.lock().senders.remove(&id);
    }

    /// Remove a type mapping. No-op when absent.
    pub fn unregister_type(&self, id: i32) {
        self.inner.lock().types.remove(&id);
    }

    /// Name behind a sender ID, if announced.
    pub fn sender_name(&self, id: i32) -> Option<String> {
        self.inner.lock().senders.get(&id).cloned()
    }

    /// Name behind a type ID, if announced.
    pub fn type_name(&self, id: i32) -> Option<String> {
        self.inner.lock().types.get(&id).cloned()
    }

    /// Reverse lookup: the unique sender ID for a name, if announced.
    pub fn sender_id(&self, name: &str) -> Option<i32> {
        let name = clean(name);
        let tables = self.inner.lock();
        tables
            .senders
            .iter()
            .find(|(_, n)| **n == name)
            .map(|(&id, _)| id)
    }

    /// Reverse lookup: the unique type ID for a name, if announced.
    pub fn type_id(&self, name: &str) -> Option<i32> {
        let name = clean(name);
        let tables = self.inner.lock();
        tables
            .types
            .iter()
            .find(|(_, n)| **n == name)
            .map(|(&id, _)| id)
    }

    /// Allocate a local ID for a name this client may send.
    ///
    /// Idempotent: a name already present returns its existing ID. Fresh
    /// names get `max(existing) + 1`, starting from 0; IDs are never reused
    /// within a process lifetime.
    pub fn allocate_local_id(&self, name: &str) -> i32 {
        let name = clean(name);
        let mut tables = self.inner.lock();
        if let Some(&id) = tables.local_ids.get(&name) {
            return id;
        }
        let id = tables.local_ids.values().max().map_or(0, |max| max + 1);
        tables.local_ids.insert(name, id);
        id
    }

    /// Previously allocated local ID for a name, if any.
    pub fn local_id(&self, name: &str) -> Option<i32> {
        self.inner.lock().local_ids.get(&clean(name)).copied()
    }

    /// Install a handler for messages of `type_name` from `sender_name`.
    ///
    /// Multiple handlers per key are permitted; they run in registration
    /// order.
    pub fn register_handler(
        &self,
        type_name: &str,
        sender_name: &str,
        handler: Handler,
    ) -> HandlerId {
        let key = (clean(type_name), clean(sender_name));
        let mut tables = self.inner.lock();
        let id = HandlerId(tables.next_handler_id);
        tables.next_handler_id += 1;
        tables.handlers.entry(key).or_default().push((id, handler));
        id
    }

    /// Remove a handler by its handle. No-op when unknown.
    pub fn unregister_handler(&self, id: HandlerId) {
        let mut tables = self.inner.lock();
        for list in tables.handlers.values_mut() {
            list.retain(|(other, _)| *other != id);
        }
    }

    /// The ordered handler list for a key, cloned out of the lock so that
    /// invocation never holds it.
    pub fn handlers_for(&self, type_name: &str, sender_name: &str) -> Vec<Handler> {
        let key = (clean(type_name), clean(sender_name));
        self.inner
            .lock()
            .handlers
            .get(&key)
            .map(|list| list.iter().map(|(_, h)| Arc::clone(h)).collect())
            .unwrap_or_default()
    }
}
