use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::warn;
use vrpnio_registry::{HandlerId, Registry};
use vrpnio_wire::MessageHeader;

use crate::decode::i32_at;
use crate::error::DecodeError;
use crate::Remote;

/// Message shape for a single button transition.
pub const CHANGE_TYPE: &str = "vrpn_Button Change";

/// Message shape for a full snapshot of all button states.
pub const STATES_TYPE: &str = "vrpn_Button States";

/// A decoded button record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ButtonRecord {
    /// One button changed state.
    Change { button: i32, state: i32 },
    /// Snapshot of every button, in button order.
    States(Vec<i32>),
}

/// A decoded button message.
#[derive(Debug, Clone)]
pub struct ButtonEvent {
    pub header: MessageHeader,
    pub record: ButtonRecord,
}

/// Adapter for the button device class.
///
/// The protocol also defines Admin and Alert shapes for this class; their
/// payload layout is undocumented and they are not decoded here.
pub struct ButtonRemote {
    name: String,
    registry: Arc<Registry>,
    handlers: Vec<HandlerId>,
    tx: Sender<ButtonEvent>,
    rx: Receiver<ButtonEvent>,
}

impl ButtonRemote {
    pub fn new(name: impl Into<String>, registry: Arc<Registry>) -> Self {
        let (tx, rx) = unbounded();
        Self {
            name: name.into(),
            registry,
            handlers: Vec::new(),
            tx,
            rx,
        }
    }

    /// Channel of decoded events, fed from the reader thread.
    pub fn events(&self) -> &Receiver<ButtonEvent> {
        &self.rx
    }
}

impl Remote for ButtonRemote {
    fn name(&self) -> &str {
        &self.name
    }

    fn register(&mut self) {
        if !self.handlers.is_empty() {
            return;
        }

        for shape in [CHANGE_TYPE, STATES_TYPE] {
            self.registry.allocate_local_id(shape);
        }

        let tx = self.tx.clone();
        let change = self.registry.register_handler(
            CHANGE_TYPE,
            &self.name,
            Arc::new(move |msg| match decode_change(&msg.payload) {
                Ok((button, state)) => {
                    let _ = tx.send(ButtonEvent {
                        header: msg.header,
                        record: ButtonRecord::Change { button, state },
                    });
                }
                Err(err) => warn!(%err, "button message dropped"),
            }),
        );
        self.handlers.push(change);

        let tx = self.tx.clone();
        let states = self.registry.register_handler(
            STATES_TYPE,
            &self.name,
            Arc::new(move |msg| match decode_states(&msg.payload) {
                Ok(states) => {
                    let _ = tx.send(ButtonEvent {
                        header: msg.header,
                        record: ButtonRecord::States(states),
                    });
                }
                Err(err) => warn!(%err, "button message dropped"),
            }),
        );
        self.handlers.push(states);
    }

    fn unregister(&mut self) {
        for id in self.handlers.drain(..) {
            self.registry.unregister_handler(id);
        }
    }
}

/// Layout: button number and new state, two big-endian i32s.
pub fn decode_change(payload: &[u8]) -> Result<(i32, i32), DecodeError> {
    if payload.len() != 8 {
        return Err(DecodeError::Length {
            shape: CHANGE_TYPE,
            expected: 8,
            got: payload.len(),
        });
    }
    Ok((i32_at(payload, 0), i32_at(payload, 4)))
}

/// Layout: button count as a big-endian i32, then that many i32 states.
pub fn decode_states(payload: &[u8]) -> Result<Vec<i32>, DecodeError> {
    if payload.len() < 4 {
        return Err(DecodeError::Length {
            shape: STATES_TYPE,
            expected: 4,
            got: payload.len(),
        });
    }

    let count = i32_at(payload, 0);
    if !(0..=1024).contains(&count) {
        return Err(DecodeError::Count {
            shape: STATES_TYPE,
            count: f64::from(count),
        });
    }
    let count = count as usize;

    let expected = 4 + 4 * count;
    if payload.len() != expected {
        return Err(DecodeError::Length {
            shape: STATES_TYPE,
            expected,
            got: payload.len(),
        });
    }

    Ok((0..count).map(|i| i32_at(payload, 4 + 4 * i)).collect())
}

#[cfg(test)]
mod tests {
    use vrpnio_registry::dispatch;
    use vrpnio_wire::Message;

    use super::*;

    #[test]
    fn decodes_change() {
        let mut payload = Vec::new();
        payload.extend_from_slice(&3i32.to_be_bytes());
        payload.extend_from_slice(&1i32.to_be_bytes());
        assert_eq!(decode_change(&payload).unwrap(), (3, 1));
    }

    #[test]
    fn change_requires_exact_length() {
        assert!(matches!(
            decode_change(&[0u8; 12]),
            Err(DecodeError::Length { expected: 8, got: 12, .. })
        ));
    }

    #[test]
    fn decodes_states_snapshot() {
        let mut payload = Vec::new();
        payload.extend_from_slice(&3i32.to_be_bytes());
        for state in [1i32, 0, 1] {
            payload.extend_from_slice(&state.to_be_bytes());
        }
        assert_eq!(decode_states(&payload).unwrap(), vec![1, 0, 1]);
    }

    #[test]
    fn states_rejects_negative_count() {
        let payload = (-2i32).to_be_bytes();
        assert!(matches!(
            decode_states(&payload),
            Err(DecodeError::Count { .. })
        ));
    }

    #[test]
    fn states_rejects_length_mismatch() {
        let mut payload = Vec::new();
        payload.extend_from_slice(&5i32.to_be_bytes());
        payload.extend_from_slice(&1i32.to_be_bytes());
        assert!(matches!(
            decode_states(&payload),
            Err(DecodeError::Length { expected: 24, got: 8, .. })
        ));
    }

    #[test]
    fn change_message_becomes_event() {
        let registry = Arc::new(Registry::new());
        registry.register_sender(0, "DTrack");
        registry.register_type(5, CHANGE_TYPE);

        let mut remote = ButtonRemote::new("DTrack", Arc::clone(&registry));
        remote.register();

        let mut payload = Vec::new();
        payload.extend_from_slice(&3i32.to_be_bytes());
        payload.extend_from_slice(&1i32.to_be_bytes());
        let msg = Message::application(0, 5, payload);
        assert_eq!(dispatch::route(&registry, &msg), 1);

        let event = remote.events().try_recv().unwrap();
        assert_eq!(event.record, ButtonRecord::Change { button: 3, state: 1 });
        assert_eq!(event.header.type_id, 5);
    }

    #[test]
    fn unregister_removes_both_handlers() {
        let registry = Arc::new(Registry::new());
        let mut remote = ButtonRemote::new("DTrack", Arc::clone(&registry));
        remote.register();
        assert_eq!(registry.handlers_for(CHANGE_TYPE, "DTrack").len(), 1);
        assert_eq!(registry.handlers_for(STATES_TYPE, "DTrack").len(), 1);

        remote.unregister();
        assert!(registry.handlers_for(CHANGE_TYPE, "DTrack").is_empty());
        assert!(registry.handlers_for(STATES_TYPE, "DTrack").is_empty());
    }
}
