//! # Scenesync
//! Server-authoritative scene replication over unreliable datagram
//! transports: delta-compressed field sync, piggy-backed latency and
//! clock-offset estimation, and a latency-paced transmission pipeline.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

mod client;
mod field;
mod identity;
mod latency;
mod packet;
mod pipeline;
mod protocol;
mod scene;
mod time;
mod types;
mod wrapping_number;

pub use client::{
    client_list::{ClientList, ClientListGuard},
    Client, ClientConfig, ClientEvent, OutgoingPacket, RewriteKind, RewriteOp,
};
pub use field::{error::FieldError, ErasedField, FieldSet, SyncedField};
pub use identity::Identity;
pub use latency::{LatencyPlanner, PlannerUnpack};
pub use packet::{
    error::PacketError,
    wire::{Point, Wire},
    Packet, Reader,
};
pub use pipeline::{PipelineConfig, ReceiveHandle, ReceiveQueue, Transmitter, Transport};
pub use protocol::{MessageKind, ProtocolError};
pub use scene::{
    error::SceneError,
    registry::ClassRegistry,
    replica::{Replica, SyncMode},
    watched_event::WatchedEvent,
    NullObserver, Scene, SceneConfig, SceneObserver,
};
pub use time::{to_stamp16, try_stamp16, try_stamp64, wrap16_elapsed, TimeError};
pub use types::{ClassId, FieldIndex, Sid, UpdateCount, LATENCY_UNKNOWN, SID_NONE};
pub use wrapping_number::{sequence_greater_than, sequence_less_than, wrapping_diff};
