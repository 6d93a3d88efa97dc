//! Per-field delta tracking.
//!
//! A [`SyncedField`] wraps one logical piece of entity state and records, per
//! remote [`Identity`], whether that client has already received the current
//! value. The scene layer consults this bookkeeping to decide what goes into
//! a delta pack for each destination.

pub mod error;

use std::any::Any;
use std::collections::HashMap;
use std::ops::Deref;

use crate::identity::Identity;
use crate::packet::{error::PacketError, wire::Wire, Packet};
use crate::types::FieldIndex;

use error::FieldError;

/// A tracked field: current value, change generation, and per-client
/// synced-generation bookkeeping.
///
/// The generation bumps on every mutation. A client is "dirty" for this field
/// exactly when its recorded synced generation differs from the current one;
/// a field that has never changed since a client's last sync is therefore
/// never re-sent to that client in a delta pack.
pub struct SyncedField<T: Wire> {
    value: T,
    generation: u64,
    synced: HashMap<Identity, u64>,
    observers: Vec<Box<dyn Fn(&T) + Send>>,
}

impl<T: Wire> SyncedField<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            generation: 0,
            synced: HashMap::new(),
            observers: Vec::new(),
        }
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    /// Replaces the value and marks the field changed for every client.
    pub fn set(&mut self, value: T) {
        self.value = value;
        self.generation += 1;
    }

    /// Mutates the value in place; counts as a change regardless of whether
    /// the closure actually modified anything.
    pub fn update(&mut self, f: impl FnOnce(&mut T)) {
        f(&mut self.value);
        self.generation += 1;
    }

    /// Registers a callback run synchronously after every successful
    /// [`SyncedField::apply`], in registration order. Used to recompute
    /// derived state that depends on the freshly committed value.
    pub fn on_applied(&mut self, f: impl Fn(&T) + Send + 'static) {
        self.observers.push(Box::new(f));
    }

    /// Serializes the current value unconditionally (full snapshots).
    pub fn write_full(&self, packet: &mut Packet) {
        packet.pack(&self.value);
    }

    /// Whether this field is dirty for that specific client.
    pub fn is_dirty_for(&self, identity: &Identity) -> bool {
        self.synced.get(identity).copied().unwrap_or(0) != self.generation
    }

    /// Serializes the value and records the client as synced at the current
    /// generation.
    pub fn write_delta(&mut self, packet: &mut Packet, identity: &Identity) {
        self.write_full(packet);
        self.mark_synced(identity);
    }

    /// Records the client as having received the current value without
    /// serializing anything (full snapshot bookkeeping).
    pub fn mark_synced(&mut self, identity: &Identity) {
        self.synced.insert(*identity, self.generation);
    }

    /// Decodes into the backing value, then runs the on-applied observers.
    pub fn apply(&mut self, packet: &mut Packet) -> Result<(), PacketError> {
        self.value = packet.read()?;
        for observer in &self.observers {
            observer(&self.value);
        }
        Ok(())
    }

    /// Drops per-client state for a departed client.
    pub fn forget(&mut self, identity: &Identity) {
        self.synced.remove(identity);
    }
}

impl<T: Wire> Deref for SyncedField<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

/// Object-safe view of a [`SyncedField`], so a [`FieldSet`] can hold fields
/// of mixed value types behind one index space.
pub trait ErasedField: Any + Send {
    fn write_full(&self, packet: &mut Packet);
    fn is_dirty_for(&self, identity: &Identity) -> bool;
    fn write_delta(&mut self, packet: &mut Packet, identity: &Identity);
    fn mark_synced(&mut self, identity: &Identity);
    fn apply(&mut self, packet: &mut Packet) -> Result<(), PacketError>;
    fn forget(&mut self, identity: &Identity);
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Wire + Send + 'static> ErasedField for SyncedField<T> {
    fn write_full(&self, packet: &mut Packet) {
        SyncedField::write_full(self, packet);
    }

    fn is_dirty_for(&self, identity: &Identity) -> bool {
        SyncedField::is_dirty_for(self, identity)
    }

    fn write_delta(&mut self, packet: &mut Packet, identity: &Identity) {
        SyncedField::write_delta(self, packet, identity);
    }

    fn mark_synced(&mut self, identity: &Identity) {
        SyncedField::mark_synced(self, identity);
    }

    fn apply(&mut self, packet: &mut Packet) -> Result<(), PacketError> {
        SyncedField::apply(self, packet)
    }

    fn forget(&mut self, identity: &Identity) {
        SyncedField::forget(self, identity);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// An ordered, index-addressed collection of tracked fields.
///
/// Delta groups on the wire are `u8 entry count` followed by
/// `(u8 field index, payload)` entries — every entry carries its own index so
/// a receiver can stay aligned even when a sender skipped fields for this
/// destination. Full groups are positional: every field, in order, no
/// indices.
#[derive(Default)]
pub struct FieldSet {
    fields: Vec<Box<dyn ErasedField>>,
}

impl FieldSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field, returning its index.
    ///
    /// # Panics
    /// Panics if more than 255 fields are registered; the wire form indexes
    /// fields with a single byte.
    pub fn register<T: Wire + Send + 'static>(&mut self, initial: T) -> FieldIndex {
        assert!(
            self.fields.len() < usize::from(u8::MAX),
            "a field set is limited to 255 fields"
        );
        self.fields.push(Box::new(SyncedField::new(initial)));
        (self.fields.len() - 1) as FieldIndex
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field<T: Wire + Send + 'static>(&self, index: FieldIndex) -> Option<&SyncedField<T>> {
        self.fields
            .get(usize::from(index))
            .and_then(|f| f.as_any().downcast_ref())
    }

    pub fn field_mut<T: Wire + Send + 'static>(
        &mut self,
        index: FieldIndex,
    ) -> Option<&mut SyncedField<T>> {
        self.fields
            .get_mut(usize::from(index))
            .and_then(|f| f.as_any_mut().downcast_mut())
    }

    /// Current value of a field, if the index exists and the type matches.
    pub fn get<T: Wire + Send + 'static>(&self, index: FieldIndex) -> Option<&T> {
        self.field::<T>(index).map(|f| f.get())
    }

    /// Sets a field's value, marking it changed for every client. Returns
    /// false if the index does not exist or holds a different type.
    pub fn set<T: Wire + Send + 'static>(&mut self, index: FieldIndex, value: T) -> bool {
        match self.field_mut::<T>(index) {
            Some(field) => {
                field.set(value);
                true
            }
            None => false,
        }
    }

    /// Attaches an on-applied observer to a field. Returns false if the index
    /// does not exist or holds a different type.
    pub fn on_applied<T: Wire + Send + 'static>(
        &mut self,
        index: FieldIndex,
        f: impl Fn(&T) + Send + 'static,
    ) -> bool {
        match self.field_mut::<T>(index) {
            Some(field) => {
                field.on_applied(f);
                true
            }
            None => false,
        }
    }

    pub fn mark_all_synced(&mut self, identity: &Identity) {
        for field in &mut self.fields {
            field.mark_synced(identity);
        }
    }

    pub fn forget(&mut self, identity: &Identity) {
        for field in &mut self.fields {
            field.forget(identity);
        }
    }

    pub fn dirty_count_for(&self, identity: &Identity) -> usize {
        self.fields
            .iter()
            .filter(|f| f.is_dirty_for(identity))
            .count()
    }

    /// Writes every field, in order, with no framing (full snapshots).
    pub fn write_all_full(&self, packet: &mut Packet) {
        for field in &self.fields {
            field.write_full(packet);
        }
    }

    /// Reads every field, in order (full snapshots).
    pub fn apply_all_full(&mut self, packet: &mut Packet) -> Result<(), PacketError> {
        for field in &mut self.fields {
            field.apply(packet)?;
        }
        Ok(())
    }

    /// Writes the delta group for one destination: only the fields dirty for
    /// that client, each prefixed with its index, behind a u8 entry count
    /// that is reserved first and rewritten once known. Returns the entry
    /// count so the caller can trim a zero-delta record entirely.
    pub fn write_dirty(
        &mut self,
        packet: &mut Packet,
        identity: &Identity,
    ) -> Result<u8, PacketError> {
        let count_slot = packet.reserve(1);
        let mut count: u8 = 0;
        for (index, field) in self.fields.iter_mut().enumerate() {
            if !field.is_dirty_for(identity) {
                continue;
            }
            packet.pack(&(index as FieldIndex));
            field.write_delta(packet, identity);
            count += 1;
        }
        packet.pack_at(count_slot, &count)?;
        Ok(count)
    }

    /// Applies a delta group written by [`FieldSet::write_dirty`].
    pub fn apply_dirty(&mut self, packet: &mut Packet) -> Result<(), FieldError> {
        let count: u8 = packet.read()?;
        for _ in 0..count {
            let index: FieldIndex = packet.read()?;
            let field_count = self.fields.len();
            let field = self.fields.get_mut(usize::from(index)).ok_or(
                FieldError::UnknownIndex {
                    index,
                    count: field_count,
                },
            )?;
            field.apply(packet)?;
        }
        Ok(())
    }
}
