use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::warn;
use vrpnio_registry::{HandlerId, Registry};
use vrpnio_wire::MessageHeader;

use crate::decode::f64_at;
use crate::error::DecodeError;
use crate::Remote;

/// Message shape carrying all channel values of an analog device.
pub const CHANNEL_TYPE: &str = "vrpn_Analog Channel";

/// A decoded analog channel message.
#[derive(Debug, Clone)]
pub struct AnalogEvent {
    pub header: MessageHeader,
    /// Current value of every channel, in channel order.
    pub channels: Vec<f64>,
}

/// Adapter for the analog device class.
pub struct AnalogRemote {
    name: String,
    registry: Arc<Registry>,
    handlers: Vec<HandlerId>,
    tx: Sender<AnalogEvent>,
    rx: Receiver<AnalogEvent>,
}

impl AnalogRemote {
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
    pub fn events(&self) -> &Receiver<AnalogEvent> {
        &self.rx
    }
}

impl Remote for AnalogRemote {
    fn name(&self) -> &str {
        &self.name
    }

    fn register(&mut self) {
        if !self.handlers.is_empty() {
            return;
        }
        self.registry.allocate_local_id(CHANNEL_TYPE);

        let tx = self.tx.clone();
        let id = self.registry.register_handler(
            CHANNEL_TYPE,
            &self.name,
            Arc::new(move |msg| match decode_channels(&msg.payload) {
                Ok(channels) => {
                    let _ = tx.send(AnalogEvent {
                        header: msg.header,
                        channels,
                    });
                }
                Err(err) => warn!(%err, "analog message dropped"),
            }),
        );
        self.handlers.push(id);
    }

    fn unregister(&mut self) {
        for id in self.handlers.drain(..) {
            self.registry.unregister_handler(id);
        }
    }
}

/// Layout: channel count as a big-endian f64, then that many f64 values.
pub fn decode_channels(payload: &[u8]) -> Result<Vec<f64>, DecodeError> {
    if payload.len() < 8 {
        return Err(DecodeError::Length {
            shape: CHANNEL_TYPE,
            expected: 8,
            got: payload.len(),
        });
    }

    let count = f64_at(payload, 0);
    if !(0.0..=1024.0).contains(&count) || count.fract() != 0.0 {
        return Err(DecodeError::Count {
            shape: CHANNEL_TYPE,
            count,
        });
    }
    let count = count as usize;

    let expected = 8 + 8 * count;
    if payload.len() != expected {
        return Err(DecodeError::Length {
            shape: CHANNEL_TYPE,
            expected,
            got: payload.len(),
        });
    }

    Ok((0..count).map(|i| f64_at(payload, 8 + 8 * i)).collect())
}

#[cfg(test)]
mod tests {
    use vrpnio_registry::dispatch;
    use vrpnio_wire::Message;

    use super::*;

    fn channel_payload(values: &[f64]) -> Vec<u8> {
        let mut payload = Vec::new();
        payload.extend_from_slice(&(values.len() as f64).to_be_bytes());
        for v in values {
            payload.extend_from_slice(&v.to_be_bytes());
        }
        payload
    }

    #[test]
    fn decodes_channel_values() {
        let channels = decode_channels(&channel_payload(&[1.5, -2.25, 0.0])).unwrap();
        assert_eq!(channels, vec![1.5, -2.25, 0.0]);
    }

    #[test]
    fn decodes_empty_channel_set() {
        assert!(decode_channels(&channel_payload(&[])).unwrap().is_empty());
    }

    #[test]
    fn rejects_bad_lengths() {
        assert!(matches!(
            decode_channels(&[0u8; 4]),
            Err(DecodeError::Length { .. })
        ));

        // Count says two channels, payload holds one.
        let mut payload = Vec::new();
        payload.extend_from_slice(&2.0f64.to_be_bytes());
        payload.extend_from_slice(&1.0f64.to_be_bytes());
        assert!(matches!(
            decode_channels(&payload),
            Err(DecodeError::Length { expected: 24, got: 16, .. })
        ));
    }

    #[test]
    fn rejects_bad_counts() {
        for count in [-1.0, 0.5, 1e9] {
            let mut payload = vec![0u8; 16];
            payload[..8].copy_from_slice(&f64::to_be_bytes(count));
            assert!(matches!(
                decode_channels(&payload),
                Err(DecodeError::Count { .. })
            ));
        }
    }

    #[test]
    fn routed_message_becomes_event() {
        let registry = Arc::new(Registry::new());
        registry.register_sender(0, "Analog0");
        registry.register_type(3, CHANNEL_TYPE);

        let mut remote = AnalogRemote::new("Analog0", Arc::clone(&registry));
        remote.register();
        remote.register(); // idempotent

        let msg = Message::application(0, 3, channel_payload(&[4.0, 5.0]));
        assert_eq!(dispatch::route(&registry, &msg), 1);

        let event = remote.events().try_recv().unwrap();
        assert_eq!(event.channels, vec![4.0, 5.0]);
        assert_eq!(event.header.sender, 0);
        assert!(remote.events().try_recv().is_err());

        remote.unregister();
        assert_eq!(dispatch::route(&registry, &msg), 0);
    }

    #[test]
    fn malformed_payload_produces_no_event() {
        let registry = Arc::new(Registry::new());
        registry.register_sender(0, "Analog0");
        registry.register_type(3, CHANNEL_TYPE);

        let mut remote = AnalogRemote::new("Analog0", Arc::clone(&registry));
        remote.register();

        let msg = Message::application(0, 3, &b"junk"[..]);
        assert_eq!(dispatch::route(&registry, &msg), 1);
        assert!(remote.events().try_recv().is_err());
    }
}
