use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::{debug, warn};
use vrpnio_client::Connection;
use vrpnio_registry::{HandlerId, Registry};
use vrpnio_wire::{Message, MessageHeader};

use crate::decode::{f64_at, i32_at, quat_at, vec3_at};
use crate::error::DecodeError;
use crate::Remote;

pub const POSE_TYPE: &str = "vrpn_Tracker Pos_Quat";
pub const VELOCITY_TYPE: &str = "vrpn_Tracker Velocity";
pub const ACCELERATION_TYPE: &str = "vrpn_Tracker Acceleration";
pub const TO_ROOM_TYPE: &str = "vrpn_Tracker To_Room";
pub const UNIT_TO_SENSOR_TYPE: &str = "vrpn_Tracker Unit_To_Sensor";
pub const WORKSPACE_TYPE: &str = "vrpn_Tracker Workspace";

pub const REQUEST_TO_ROOM_TYPE: &str = "vrpn_Tracker Request_Tracker_To_Room";
pub const REQUEST_UNIT_TO_SENSOR_TYPE: &str = "vrpn_Tracker Request_Unit_To_Sensor";
pub const REQUEST_WORKSPACE_TYPE: &str = "vrpn_Tracker Request_Tracker_Workspace";

/// A decoded tracker record.
///
/// Vectors are 3-component, orientations are quaternions. The sensor index
/// travels as an i32 padded to 8 bytes; `dt` is the delta time the
/// velocity/acceleration quaternion applies over.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackerRecord {
    Pose {
        sensor: i32,
        position: [f64; 3],
        orientation: [f64; 4],
    },
    Velocity {
        sensor: i32,
        velocity: [f64; 3],
        quaternion: [f64; 4],
        dt: f64,
    },
    Acceleration {
        sensor: i32,
        acceleration: [f64; 3],
        quaternion: [f64; 4],
        dt: f64,
    },
    ToRoom {
        position: [f64; 3],
        orientation: [f64; 4],
    },
    UnitToSensor {
        sensor: i32,
        position: [f64; 3],
        orientation: [f64; 4],
    },
    Workspace {
        min_corner: [f64; 3],
        max_corner: [f64; 3],
    },
}

/// A decoded tracker message.
#[derive(Debug, Clone)]
pub struct TrackerEvent {
    pub header: MessageHeader,
    pub record: TrackerRecord,
}

/// Adapter for the tracker device class.
pub struct TrackerRemote {
    name: String,
    registry: Arc<Registry>,
    handlers: Vec<HandlerId>,
    tx: Sender<TrackerEvent>,
    rx: Receiver<TrackerEvent>,
}

impl TrackerRemote {
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
    pub fn events(&self) -> &Receiver<TrackerEvent> {
        &self.rx
    }

    /// Ask the server for the tracker-to-room transform.
    pub fn request_to_room(&self, conn: &mut Connection) -> vrpnio_client::Result<()> {
        self.send_request(conn, REQUEST_TO_ROOM_TYPE)
    }

    /// Ask the server for the unit-to-sensor transforms.
    pub fn request_unit_to_sensor(&self, conn: &mut Connection) -> vrpnio_client::Result<()> {
        self.send_request(conn, REQUEST_UNIT_TO_SENSOR_TYPE)
    }

    /// Ask the server for the tracker workspace extents.
    pub fn request_workspace(&self, conn: &mut Connection) -> vrpnio_client::Result<()> {
        self.send_request(conn, REQUEST_WORKSPACE_TYPE)
    }

    /// Requests are empty-payload messages of a named type. Until the server
    /// has announced both this device and the request type, there is nothing
    /// to address the message with; skip silently.
    fn send_request(&self, conn: &mut Connection, request_type: &str) -> vrpnio_client::Result<()> {
        let (Some(sender), Some(type_id)) = (
            self.registry.sender_id(&self.name),
            self.registry.type_id(request_type),
        ) else {
            debug!(device = %self.name, request_type, "request skipped: not announced yet");
            return Ok(());
        };
        conn.send(&Message::application(sender, type_id, &b""[..]))
    }

    fn install<D>(&mut self, shape: &'static str, decoder: D)
    where
        D: Fn(&[u8]) -> Result<TrackerRecord, DecodeError> + Send + Sync + 'static,
    {
        let tx = self.tx.clone();
        let id = self.registry.register_handler(
            shape,
            &self.name,
            Arc::new(move |msg| match decoder(&msg.payload) {
                Ok(record) => {
                    let _ = tx.send(TrackerEvent {
                        header: msg.header,
                        record,
                    });
                }
                Err(err) => warn!(%err, "tracker message dropped"),
            }),
        );
        self.handlers.push(id);
    }
}

impl Remote for TrackerRemote {
    fn name(&self) -> &str {
        &self.name
    }

    fn register(&mut self) {
        if !self.handlers.is_empty() {
            return;
        }

        for shape in [
            POSE_TYPE,
            VELOCITY_TYPE,
            ACCELERATION_TYPE,
            TO_ROOM_TYPE,
            UNIT_TO_SENSOR_TYPE,
            WORKSPACE_TYPE,
            REQUEST_TO_ROOM_TYPE,
            REQUEST_UNIT_TO_SENSOR_TYPE,
            REQUEST_WORKSPACE_TYPE,
        ] {
            self.registry.allocate_local_id(shape);
        }

        self.install(POSE_TYPE, decode_pose);
        self.install(VELOCITY_TYPE, decode_velocity);
        self.install(ACCELERATION_TYPE, decode_acceleration);
        self.install(TO_ROOM_TYPE, decode_to_room);
        self.install(UNIT_TO_SENSOR_TYPE, decode_unit_to_sensor);
        self.install(WORKSPACE_TYPE, decode_workspace);
    }

    fn unregister(&mut self) {
        for id in self.handlers.drain(..) {
            self.registry.unregister_handler(id);
        }
    }
}

/// The pose family shares one layout: an optional sensor index occupying
/// 8 bytes (4 of value, 4 of padding), a 3-vector, a quaternion, and an
/// optional trailing dt.
fn decode_pose_family(
    payload: &[u8],
    shape: &'static str,
    with_sensor: bool,
    with_dt: bool,
) -> Result<(i32, [f64; 3], [f64; 4], f64), DecodeError> {
    let expected = if with_sensor { 8 } else { 0 } + 24 + 32 + if with_dt { 8 } else { 0 };
    if payload.len() != expected {
        return Err(DecodeError::Length {
            shape,
            expected,
            got: payload.len(),
        });
    }

    let sensor = if with_sensor { i32_at(payload, 0) } else { 0 };
    let offset = if with_sensor { 8 } else { 0 };
    let vector = vec3_at(payload, offset);
    let quat = quat_at(payload, offset + 24);
    let dt = if with_dt { f64_at(payload, offset + 56) } else { 0.0 };

    Ok((sensor, vector, quat, dt))
}

pub fn decode_pose(payload: &[u8]) -> Result<TrackerRecord, DecodeError> {
    let (sensor, position, orientation, _) = decode_pose_family(payload, POSE_TYPE, true, false)?;
    Ok(TrackerRecord::Pose {
        sensor,
        position,
        orientation,
    })
}

pub fn decode_velocity(payload: &[u8]) -> Result<TrackerRecord, DecodeError> {
    let (sensor, velocity, quaternion, dt) =
        decode_pose_family(payload, VELOCITY_TYPE, true, true)?;
    Ok(TrackerRecord::Velocity {
        sensor,
        velocity,
        quaternion,
        dt,
    })
}

pub fn decode_acceleration(payload: &[u8]) -> Result<TrackerRecord, DecodeError> {
    let (sensor, acceleration, quaternion, dt) =
        decode_pose_family(payload, ACCELERATION_TYPE, true, true)?;
    Ok(TrackerRecord::Acceleration {
        sensor,
        acceleration,
        quaternion,
        dt,
    })
}

pub fn decode_to_room(payload: &[u8]) -> Result<TrackerRecord, DecodeError> {
    let (_, position, orientation, _) = decode_pose_family(payload, TO_ROOM_TYPE, false, false)?;
    Ok(TrackerRecord::ToRoom {
        position,
        orientation,
    })
}

pub fn decode_unit_to_sensor(payload: &[u8]) -> Result<TrackerRecord, DecodeError> {
    let (sensor, position, orientation, _) =
        decode_pose_family(payload, UNIT_TO_SENSOR_TYPE, true, false)?;
    Ok(TrackerRecord::UnitToSensor {
        sensor,
        position,
        orientation,
    })
}

/// Layout: minimum and maximum workspace corners, two 3-vectors.
pub fn decode_workspace(payload: &[u8]) -> Result<TrackerRecord, DecodeError> {
    if payload.len() != 48 {
        return Err(DecodeError::Length {
            shape: WORKSPACE_TYPE,
            expected: 48,
            got: payload.len(),
        });
    }
    Ok(TrackerRecord::Workspace {
        min_corner: vec3_at(payload, 0),
        max_corner: vec3_at(payload, 24),
    })
}
