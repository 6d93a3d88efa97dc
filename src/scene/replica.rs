use crate::field::FieldSet;
use crate::types::ClassId;

use super::error::SceneError;

/// How (and whether) an entity rides the replication channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Never serialized; exists only on this host
    Local,
    /// Included in full snapshots and delta packs
    Full,
    /// Included in delta packs only
    Delta,
}

impl SyncMode {
    pub(crate) fn wire(self) -> u8 {
        match self {
            SyncMode::Local => 0,
            SyncMode::Full => 1,
            SyncMode::Delta => 2,
        }
    }

    pub(crate) fn from_wire(value: u8) -> Result<Self, SceneError> {
        match value {
            0 => Ok(SyncMode::Local),
            1 => Ok(SyncMode::Full),
            2 => Ok(SyncMode::Delta),
            _ => Err(SceneError::UnknownSyncMode { value }),
        }
    }
}

/// A replicated entity: a class tag, an ordering plan, and a set of tracked
/// fields.
///
/// Implementations own their state in a [`FieldSet`]; the scene layer drives
/// all serialization through it, so an entity never sees packets directly.
pub trait Replica: Send {
    /// Numeric tag resolving to this entity's constructor in the registry.
    fn class_id(&self) -> ClassId;

    /// Ordering value within the scene. Changes are propagated and surface
    /// through [`SceneObserver::plan_changed`](super::SceneObserver::plan_changed).
    fn plan(&self) -> i16 {
        0
    }

    fn set_plan(&mut self, _plan: i16) {}

    fn sync_mode(&self) -> SyncMode {
        SyncMode::Full
    }

    /// Per-destination filter; an entity invisible to a client is skipped in
    /// packs for that client without breaking packet alignment.
    fn visible_to(&self, _identity: &crate::identity::Identity) -> bool {
        true
    }

    fn fields(&self) -> &FieldSet;

    fn fields_mut(&mut self) -> &mut FieldSet;

    /// Out-of-band signal delivered by a watched event.
    fn on_signal(&mut self, _code: i8) {}
}
