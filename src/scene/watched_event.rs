use crate::packet::Packet;
use crate::types::{ClassId, Sid, SID_NONE};

use super::error::SceneError;

/// An out-of-band, queued notification of an entity's existence transition.
///
/// Unlike delta packs, which only describe changes, watched events describe
/// existence itself, so each record carries enough to apply idempotently:
/// deletion by sid, creation by sid plus class plus a full field snapshot,
/// signal by sid plus a one-byte payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchedEvent {
    /// Entity destroyed. [`SID_NONE`] means "delete everything".
    Deleted { sid: Sid },
    /// Entity created; `snapshot` is the entity's complete field payload.
    Created {
        sid: Sid,
        class_id: ClassId,
        plan: i16,
        snapshot: Vec<u8>,
    },
    /// Entity signaled with an application-defined code.
    Signaled { sid: Sid, code: i8 },
}

impl WatchedEvent {
    pub fn delete_all() -> Self {
        WatchedEvent::Deleted { sid: SID_NONE }
    }

    pub(crate) fn write(&self, packet: &mut Packet) {
        match self {
            WatchedEvent::Deleted { sid } => {
                packet.pack(&0u8);
                packet.pack(sid);
            }
            WatchedEvent::Created {
                sid,
                class_id,
                plan,
                snapshot,
            } => {
                packet.pack(&1u8);
                packet.pack(sid);
                packet.pack(class_id);
                packet.pack(plan);
                packet.pack(&(snapshot.len() as u32));
                packet.append(snapshot);
            }
            WatchedEvent::Signaled { sid, code } => {
                packet.pack(&2u8);
                packet.pack(sid);
                packet.pack(code);
            }
        }
    }

    pub(crate) fn read(packet: &mut Packet) -> Result<Self, SceneError> {
        let tag: u8 = packet.read()?;
        match tag {
            0 => Ok(WatchedEvent::Deleted {
                sid: packet.read()?,
            }),
            1 => {
                let sid: Sid = packet.read()?;
                let class_id: ClassId = packet.read()?;
                let plan: i16 = packet.read()?;
                let len: u32 = packet.read()?;
                let snapshot = packet.read_bytes(len as usize)?;
                Ok(WatchedEvent::Created {
                    sid,
                    class_id,
                    plan,
                    snapshot,
                })
            }
            2 => Ok(WatchedEvent::Signaled {
                sid: packet.read()?,
                code: packet.read()?,
            }),
            _ => Err(SceneError::UnknownEventTag { tag }),
        }
    }
}
