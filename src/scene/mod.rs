//! Scene replication: full snapshots, per-client delta packs, and the
//! out-of-band watched-event channel.
//!
//! A `Scene` is owned by exactly one simulation thread and is not internally
//! locked; network reception hands inbound packets to that thread through
//! queues rather than touching scene state directly. Within one packet a
//! receiver applies scene-level fields, then object deltas, then watched
//! events, matching sender intent.

pub mod error;
pub mod registry;
pub mod replica;
pub mod watched_event;

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use log::{debug, warn};

use crate::field::FieldSet;
use crate::identity::Identity;
use crate::packet::Packet;
use crate::protocol::MessageKind;
use crate::types::{ClassId, Sid, UpdateCount, SID_NONE};
use crate::wrapping_number::{sequence_greater_than, sequence_less_than};

use error::SceneError;
use registry::ClassRegistry;
use replica::{Replica, SyncMode};
use watched_event::WatchedEvent;

/// Sid range used when rehoming locally created entities out of the way of
/// network-owned ones.
const LOCAL_SID_BASE: Sid = 0x8000_0000;

/// Application callback boundary. Fire-and-forget notifications; return
/// values cannot influence the replication layer.
pub trait SceneObserver {
    fn entity_created(&mut self, _sid: Sid) {}
    fn entity_removed(&mut self, _sid: Sid) {}
    fn plan_changed(&mut self, _sid: Sid, _plan: i16) {}
    /// A client crossed the configured lost-packet threshold. The recovery
    /// action (typically an [`MessageKind::AskFullUpdate`] request) is the
    /// consumer's to take.
    fn resync_needed(&mut self, _identity: &Identity, _lost: u32) {}
}

/// Observer that ignores everything.
pub struct NullObserver;

impl SceneObserver for NullObserver {}

/// Scene-layer tunables.
#[derive(Debug, Clone)]
pub struct SceneConfig {
    /// Rejected-packet count per client at which `resync_needed` fires.
    pub lost_packet_threshold: u32,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            lost_packet_threshold: 5,
        }
    }
}

/// Per-client synchronization record.
struct ClientSync {
    last_acked: UpdateCount,
    events: VecDeque<WatchedEvent>,
    lost_packets: u32,
    resync_flagged: bool,
}

impl ClientSync {
    fn new(last_acked: UpdateCount) -> Self {
        Self {
            last_acked,
            events: VecDeque::new(),
            lost_packets: 0,
            resync_flagged: false,
        }
    }
}

/// The server-authoritative (or client-mirrored) collection of replicated
/// entities, plus everything needed to sync it per client.
pub struct Scene {
    name: String,
    fields: FieldSet,
    entities: BTreeMap<Sid, Box<dyn Replica>>,
    update_count: UpdateCount,
    synced: HashMap<Identity, ClientSync>,
    locally_created: HashSet<Sid>,
    next_local_sid: Sid,
    config: SceneConfig,
}

impl Scene {
    pub fn new(name: impl Into<String>, config: SceneConfig) -> Self {
        Self {
            name: name.into(),
            fields: FieldSet::new(),
            entities: BTreeMap::new(),
            update_count: 0,
            synced: HashMap::new(),
            locally_created: HashSet::new(),
            next_local_sid: LOCAL_SID_BASE,
            config,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Scene-level tracked fields.
    pub fn fields(&self) -> &FieldSet {
        &self.fields
    }

    pub fn fields_mut(&mut self) -> &mut FieldSet {
        &mut self.fields
    }

    pub fn update_count(&self) -> UpdateCount {
        self.update_count
    }

    /// Bumps the update count; call once per simulation tick. Only ever
    /// moves forward (mod 2^16).
    pub fn advance(&mut self) {
        self.update_count = self.update_count.wrapping_add(1);
    }

    // Entities

    /// Inserts a network-owned entity under the given sid.
    pub fn insert(&mut self, sid: Sid, entity: Box<dyn Replica>) {
        self.locally_created.remove(&sid);
        self.entities.insert(sid, entity);
    }

    /// Inserts an entity created by this host alone. If a network entity
    /// later arrives under the same sid, the local one is rehomed to a
    /// fresh id rather than clobbered.
    pub fn insert_local(&mut self, sid: Sid, entity: Box<dyn Replica>) {
        self.locally_created.insert(sid);
        self.entities.insert(sid, entity);
    }

    /// Inserts a locally created entity under a freshly allocated sid.
    pub fn create_local(&mut self, entity: Box<dyn Replica>) -> Sid {
        let sid = self.alloc_local_sid();
        self.insert_local(sid, entity);
        sid
    }

    pub fn remove(&mut self, sid: Sid) -> Option<Box<dyn Replica>> {
        self.locally_created.remove(&sid);
        self.entities.remove(&sid)
    }

    pub fn entity(&self, sid: Sid) -> Option<&dyn Replica> {
        self.entities.get(&sid).map(|e| e.as_ref())
    }

    pub fn entity_mut(&mut self, sid: Sid) -> Option<&mut (dyn Replica + 'static)> {
        self.entities.get_mut(&sid).map(|e| e.as_mut())
    }

    pub fn contains(&self, sid: Sid) -> bool {
        self.entities.contains_key(&sid)
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Sid, &dyn Replica)> {
        self.entities.iter().map(|(sid, e)| (*sid, e.as_ref()))
    }

    fn alloc_local_sid(&mut self) -> Sid {
        loop {
            let sid = self.next_local_sid;
            self.next_local_sid = self.next_local_sid.wrapping_add(1);
            if sid != SID_NONE && !self.entities.contains_key(&sid) {
                return sid;
            }
        }
    }

    // Per-client sync lifecycle

    /// Starts syncing an identity. Every currently tracked field is marked
    /// synced for it, so the first delta pack carries only what changes
    /// after this point; initial state travels in a full snapshot.
    pub fn begin_sync(&mut self, identity: Identity) {
        self.fields.mark_all_synced(&identity);
        for entity in self.entities.values_mut() {
            entity.fields_mut().mark_all_synced(&identity);
        }
        self.synced
            .entry(identity)
            .or_insert_with(|| ClientSync::new(self.update_count));
    }

    /// Stops syncing an identity and drops all per-client field state.
    pub fn end_sync(&mut self, identity: &Identity) {
        self.synced.remove(identity);
        self.fields.forget(identity);
        for entity in self.entities.values_mut() {
            entity.fields_mut().forget(identity);
        }
    }

    pub fn is_syncing(&self, identity: &Identity) -> bool {
        self.synced.contains_key(identity)
    }

    // Full snapshots

    /// Writes a complete snapshot: update count, scene name, every scene
    /// field, then every [`SyncMode::Full`] entity in full.
    ///
    /// With a target identity, per-client bookkeeping is updated as though
    /// that client had acknowledged everything written (visibility filters
    /// also apply). Without one, the snapshot is destination-agnostic.
    pub fn pack_full(
        &mut self,
        target: Option<&Identity>,
        packet: &mut Packet,
    ) -> Result<(), SceneError> {
        MessageKind::SceneFull.write(packet);
        packet.pack(&self.update_count);
        packet.pack(&self.name);
        self.fields.write_all_full(packet);
        if let Some(identity) = target {
            self.fields.mark_all_synced(identity);
        }

        let count_slot = packet.reserve(4);
        let mut count: u32 = 0;
        for (sid, entity) in self.entities.iter_mut() {
            if entity.sync_mode() != SyncMode::Full {
                continue;
            }
            if let Some(identity) = target {
                if !entity.visible_to(identity) {
                    continue;
                }
            }
            write_header(packet, *sid, entity.as_ref());
            entity.fields().write_all_full(packet);
            if let Some(identity) = target {
                entity.fields_mut().mark_all_synced(identity);
            }
            count += 1;
        }
        packet.pack_at(count_slot, &count)?;

        if let Some(identity) = target {
            if let Some(sync) = self.synced.get_mut(identity) {
                sync.last_acked = self.update_count;
                sync.lost_packets = 0;
                sync.resync_flagged = false;
            }
        }
        Ok(())
    }

    /// Applies a full snapshot, adopting the sender's update count and scene
    /// name, materializing unknown entities through the registry, and
    /// removing network-owned [`SyncMode::Full`] entities the snapshot no
    /// longer contains.
    pub fn apply_full(
        &mut self,
        packet: &mut Packet,
        registry: &ClassRegistry,
        observer: &mut dyn SceneObserver,
    ) -> Result<(), SceneError> {
        expect_kind(packet, MessageKind::SceneFull, "scene full")?;
        let update_count: UpdateCount = packet.read()?;
        let name: String = packet.read()?;
        self.name = name;
        self.update_count = update_count;
        self.fields.apply_all_full(packet)?;

        let count: u32 = packet.read()?;
        let mut seen: HashSet<Sid> = HashSet::new();
        for _ in 0..count {
            let header = read_header(packet)?;
            self.materialize(&header, registry, observer)?;
            if let Some(entity) = self.entities.get_mut(&header.sid) {
                entity.fields_mut().apply_all_full(packet)?;
            }
            seen.insert(header.sid);
        }

        let stale: Vec<Sid> = self
            .entities
            .iter()
            .filter(|(sid, entity)| {
                entity.sync_mode() == SyncMode::Full
                    && !seen.contains(sid)
                    && !self.locally_created.contains(sid)
            })
            .map(|(sid, _)| *sid)
            .collect();
        for sid in stale {
            self.entities.remove(&sid);
            observer.entity_removed(sid);
        }
        Ok(())
    }

    // Delta packs

    /// Writes the incremental update for one client: the
    /// `{last_acked, current}` update-count range, dirty-only scene fields,
    /// then per entity only the fields dirty for this client. An entity that
    /// ends up contributing zero deltas is trimmed back out of the buffer
    /// instead of being sent as an empty record.
    pub fn pack_delta(
        &mut self,
        identity: &Identity,
        packet: &mut Packet,
    ) -> Result<(), SceneError> {
        let Some(sync) = self.synced.get(identity) else {
            return Err(SceneError::UnknownClient);
        };
        let last_acked = sync.last_acked;

        MessageKind::SceneDelta.write(packet);
        packet.pack(&last_acked);
        packet.pack(&self.update_count);
        packet.pack(&self.name);
        self.fields.write_dirty(packet, identity)?;

        let count_slot = packet.reserve(4);
        let mut count: u32 = 0;
        for (sid, entity) in self.entities.iter_mut() {
            if entity.sync_mode() == SyncMode::Local {
                continue;
            }
            if !entity.visible_to(identity) {
                continue;
            }
            let entry_start = packet.len();
            write_header(packet, *sid, entity.as_ref());
            let wrote = entity.fields_mut().write_dirty(packet, identity)?;
            if wrote == 0 {
                packet.shrink(packet.len() - entry_start)?;
            } else {
                count += 1;
            }
        }
        packet.pack_at(count_slot, &count)?;

        if let Some(sync) = self.synced.get_mut(identity) {
            sync.last_acked = self.update_count;
        }
        Ok(())
    }

    /// Applies an incremental update.
    ///
    /// The declared `{last, now}` range must bracket the local update count
    /// in wrap-around order; otherwise the packet is rejected as
    /// [`SceneError::StalePacket`] without mutating anything. On acceptance
    /// the local count advances to `now`.
    pub fn apply_delta(
        &mut self,
        packet: &mut Packet,
        registry: &ClassRegistry,
        observer: &mut dyn SceneObserver,
    ) -> Result<(), SceneError> {
        expect_kind(packet, MessageKind::SceneDelta, "scene delta")?;
        let last: UpdateCount = packet.read()?;
        let now: UpdateCount = packet.read()?;
        let name: String = packet.read()?;
        if name != self.name {
            return Err(SceneError::WrongScene {
                expected: self.name.clone(),
                got: name,
            });
        }
        if sequence_greater_than(last, self.update_count)
            || sequence_less_than(now, self.update_count)
        {
            return Err(SceneError::StalePacket {
                last,
                now,
                local: self.update_count,
            });
        }
        self.update_count = now;

        self.fields.apply_dirty(packet)?;

        let count: u32 = packet.read()?;
        for _ in 0..count {
            let header = read_header(packet)?;
            self.materialize(&header, registry, observer)?;
            if let Some(entity) = self.entities.get_mut(&header.sid) {
                entity.fields_mut().apply_dirty(packet)?;
            }
        }
        Ok(())
    }

    /// Ensures an entity exists under `header.sid` with the declared class.
    ///
    /// Absent: constructed through the registry. Present under a different
    /// class: destroyed and recreated. Present but locally created: the
    /// local entity is first rehomed to a fresh sid so the network one can
    /// take its place.
    fn materialize(
        &mut self,
        header: &ObjectHeader,
        registry: &ClassRegistry,
        observer: &mut dyn SceneObserver,
    ) -> Result<(), SceneError> {
        enum Action {
            Keep,
            Create,
            Recreate,
            Rehome,
        }

        let action = match self.entities.get(&header.sid) {
            None => Action::Create,
            Some(_) if self.locally_created.contains(&header.sid) => Action::Rehome,
            Some(existing) if existing.class_id() != header.class_id => Action::Recreate,
            Some(_) => Action::Keep,
        };

        match action {
            Action::Keep => {
                if let Some(entity) = self.entities.get_mut(&header.sid) {
                    if entity.plan() != header.plan {
                        entity.set_plan(header.plan);
                        observer.plan_changed(header.sid, header.plan);
                    }
                }
                return Ok(());
            }
            Action::Recreate => {
                self.entities.remove(&header.sid);
                observer.entity_removed(header.sid);
            }
            Action::Rehome => {
                let fresh = self.alloc_local_sid();
                if let Some(local) = self.entities.remove(&header.sid) {
                    self.entities.insert(fresh, local);
                }
                self.locally_created.remove(&header.sid);
                self.locally_created.insert(fresh);
                warn!(
                    "locally created entity {} rehomed to {} to make way for a network entity",
                    header.sid, fresh
                );
            }
            Action::Create => {}
        }

        let mut entity = registry.create(header.class_id)?;
        entity.set_plan(header.plan);
        self.entities.insert(header.sid, entity);
        observer.entity_created(header.sid);
        Ok(())
    }

    // Watched events

    /// Queues a creation event (with a full field snapshot of the entity as
    /// it stands now) for every currently synced client.
    pub fn watch_created(&mut self, sid: Sid) -> Result<(), SceneError> {
        let Some(entity) = self.entities.get(&sid) else {
            return Err(SceneError::UnknownObject { sid });
        };
        let mut scratch = Packet::new();
        entity.fields().write_all_full(&mut scratch);
        let event = WatchedEvent::Created {
            sid,
            class_id: entity.class_id(),
            plan: entity.plan(),
            snapshot: scratch.into_bytes(),
        };
        self.queue_event_all(event);
        Ok(())
    }

    /// Queues a deletion event for every currently synced client.
    pub fn watch_deleted(&mut self, sid: Sid) {
        self.queue_event_all(WatchedEvent::Deleted { sid });
    }

    /// Queues a delete-everything event for every currently synced client.
    pub fn watch_delete_all(&mut self) {
        self.queue_event_all(WatchedEvent::delete_all());
    }

    /// Queues a signal event for every currently synced client.
    pub fn watch_signaled(&mut self, sid: Sid, code: i8) {
        self.queue_event_all(WatchedEvent::Signaled { sid, code });
    }

    fn queue_event_all(&mut self, event: WatchedEvent) {
        for sync in self.synced.values_mut() {
            sync.events.push_back(event.clone());
        }
    }

    /// Queues an event for one client only.
    pub fn queue_event_for(
        &mut self,
        identity: &Identity,
        event: WatchedEvent,
    ) -> Result<(), SceneError> {
        match self.synced.get_mut(identity) {
            Some(sync) => {
                sync.events.push_back(event);
                Ok(())
            }
            None => Err(SceneError::UnknownClient),
        }
    }

    pub fn pending_events(&self, identity: &Identity) -> usize {
        self.synced
            .get(identity)
            .map(|sync| sync.events.len())
            .unwrap_or(0)
    }

    /// Drains one client's event queue into a packet, preserving order.
    pub fn pack_events(
        &mut self,
        identity: &Identity,
        packet: &mut Packet,
    ) -> Result<(), SceneError> {
        let Some(sync) = self.synced.get_mut(identity) else {
            return Err(SceneError::UnknownClient);
        };
        MessageKind::WatchedEvents.write(packet);
        let count = u16::try_from(sync.events.len()).unwrap_or(u16::MAX);
        packet.pack(&count);
        for _ in 0..count {
            if let Some(event) = sync.events.pop_front() {
                event.write(packet);
            }
        }
        Ok(())
    }

    /// Applies a watched-events message, in order and idempotently.
    pub fn apply_events(
        &mut self,
        packet: &mut Packet,
        registry: &ClassRegistry,
        observer: &mut dyn SceneObserver,
    ) -> Result<(), SceneError> {
        expect_kind(packet, MessageKind::WatchedEvents, "watched events")?;
        let count: u16 = packet.read()?;
        for _ in 0..count {
            let event = WatchedEvent::read(packet)?;
            self.apply_event(event, registry, observer)?;
        }
        Ok(())
    }

    fn apply_event(
        &mut self,
        event: WatchedEvent,
        registry: &ClassRegistry,
        observer: &mut dyn SceneObserver,
    ) -> Result<(), SceneError> {
        match event {
            WatchedEvent::Deleted { sid } if sid == SID_NONE => {
                let all: Vec<Sid> = self.entities.keys().copied().collect();
                for sid in all {
                    self.entities.remove(&sid);
                    observer.entity_removed(sid);
                }
                self.locally_created.clear();
            }
            WatchedEvent::Deleted { sid } => {
                if self.remove(sid).is_some() {
                    observer.entity_removed(sid);
                }
            }
            WatchedEvent::Created {
                sid,
                class_id,
                plan,
                snapshot,
            } => {
                let header = ObjectHeader {
                    sid,
                    class_id,
                    plan,
                    mode: SyncMode::Full,
                };
                self.materialize(&header, registry, observer)?;
                if let Some(entity) = self.entities.get_mut(&sid) {
                    let mut payload = Packet::from_bytes(snapshot);
                    entity.fields_mut().apply_all_full(&mut payload)?;
                }
            }
            WatchedEvent::Signaled { sid, code } => match self.entities.get_mut(&sid) {
                Some(entity) => entity.on_signal(code),
                None => debug!("signal {code} for absent entity {sid} ignored"),
            },
        }
        Ok(())
    }

    // Loss accounting

    /// Records one rejected (stale or unparseable) packet from a peer.
    /// Crossing the configured threshold fires
    /// [`SceneObserver::resync_needed`] once; the counter keeps climbing
    /// until [`Scene::mark_resynced`].
    pub fn record_rejection(&mut self, identity: &Identity, observer: &mut dyn SceneObserver) {
        let threshold = self.config.lost_packet_threshold;
        let Some(sync) = self.synced.get_mut(identity) else {
            return;
        };
        sync.lost_packets += 1;
        if sync.lost_packets >= threshold && !sync.resync_flagged {
            sync.resync_flagged = true;
            observer.resync_needed(identity, sync.lost_packets);
        }
    }

    pub fn lost_packets(&self, identity: &Identity) -> u32 {
        self.synced
            .get(identity)
            .map(|sync| sync.lost_packets)
            .unwrap_or(0)
    }

    /// Resets a peer's loss accounting after a successful full resync.
    pub fn mark_resynced(&mut self, identity: &Identity) {
        if let Some(sync) = self.synced.get_mut(identity) {
            sync.lost_packets = 0;
            sync.resync_flagged = false;
            sync.last_acked = self.update_count;
        }
    }

    /// Writes the message a lossy receiver sends to ask for a fresh full
    /// snapshot.
    pub fn pack_full_request(packet: &mut Packet) {
        MessageKind::AskFullUpdate.write(packet);
    }
}

struct ObjectHeader {
    sid: Sid,
    class_id: ClassId,
    plan: i16,
    #[allow(dead_code)]
    mode: SyncMode,
}

fn write_header(packet: &mut Packet, sid: Sid, entity: &dyn Replica) {
    packet.pack(&sid);
    packet.pack(&entity.class_id());
    packet.pack(&entity.plan());
    packet.pack(&entity.sync_mode().wire());
}

fn read_header(packet: &mut Packet) -> Result<ObjectHeader, SceneError> {
    let sid: Sid = packet.read()?;
    let class_id: ClassId = packet.read()?;
    let plan: i16 = packet.read()?;
    let mode = SyncMode::from_wire(packet.read()?)?;
    Ok(ObjectHeader {
        sid,
        class_id,
        plan,
        mode,
    })
}

fn expect_kind(
    packet: &mut Packet,
    expected: MessageKind,
    label: &'static str,
) -> Result<(), SceneError> {
    let kind = MessageKind::read(packet)?;
    if kind != expected {
        return Err(SceneError::UnexpectedMessage { expected: label });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::registry::ClassRegistry;
    use super::replica::{Replica, SyncMode};
    use super::{NullObserver, Scene, SceneConfig, SceneError};
    use crate::field::FieldSet;
    use crate::identity::Identity;
    use crate::packet::Packet;
    use crate::types::{ClassId, Sid};
    use std::net::SocketAddr;

    const PROBE_CLASS: ClassId = 11;

    struct Probe {
        fields: FieldSet,
        plan: i16,
    }

    impl Probe {
        fn boxed() -> Box<dyn Replica> {
            let mut fields = FieldSet::new();
            fields.register(0u32); // hp
            fields.register(0.0f32); // heading
            Box::new(Self { fields, plan: 0 })
        }
    }

    impl Replica for Probe {
        fn class_id(&self) -> ClassId {
            PROBE_CLASS
        }

        fn plan(&self) -> i16 {
            self.plan
        }

        fn set_plan(&mut self, plan: i16) {
            self.plan = plan;
        }

        fn fields(&self) -> &FieldSet {
            &self.fields
        }

        fn fields_mut(&mut self) -> &mut FieldSet {
            &mut self.fields
        }
    }

    fn registry() -> ClassRegistry {
        let mut registry = ClassRegistry::new();
        registry.register(PROBE_CLASS, "probe", Probe::boxed);
        registry
    }

    fn ident(port: u16) -> Identity {
        format!("127.0.0.1:{port}")
            .parse::<SocketAddr>()
            .unwrap()
            .into()
    }

    fn scene_at(update_count: u16) -> Scene {
        let mut scene = Scene::new("arena", SceneConfig::default());
        for _ in 0..update_count {
            scene.advance();
        }
        scene
    }

    #[test]
    fn stale_delta_is_rejected_without_mutation() {
        let client = ident(1);
        // a sender whose delta covers the old range {50, 90}
        let mut old_server = scene_at(50);
        old_server.begin_sync(client);
        for _ in 0..40 {
            old_server.advance();
        }
        let mut sent = Packet::new();
        old_server.pack_delta(&client, &mut sent).unwrap();

        let mut receiver = scene_at(100);
        let result = receiver.apply_delta(&mut sent, &registry(), &mut NullObserver);
        assert!(matches!(
            result,
            Err(SceneError::StalePacket { last: 50, now: 90, local: 100 })
        ));
        assert_eq!(receiver.update_count(), 100);
    }

    #[test]
    fn bracketing_delta_advances_local_count() {
        let client = ident(1);
        let mut server = scene_at(90);
        server.begin_sync(client);
        for _ in 0..60 {
            server.advance();
        }
        let mut sent = Packet::new();
        server.pack_delta(&client, &mut sent).unwrap();

        let mut receiver = scene_at(100);
        receiver
            .apply_delta(&mut sent, &registry(), &mut NullObserver)
            .unwrap();
        assert_eq!(receiver.update_count(), 150);
    }

    #[test]
    fn zero_delta_entities_are_trimmed() {
        let client = ident(1);
        let mut server = Scene::new("arena", SceneConfig::default());
        server.insert(1, Probe::boxed());
        server.insert(2, Probe::boxed());
        server.begin_sync(client);

        // nothing changed since begin_sync: the pack carries zero entities
        let mut quiet = Packet::new();
        server.pack_delta(&client, &mut quiet).unwrap();

        // one field of one entity changed: exactly one entity entry
        server.advance();
        if let Some(entity) = server.entity_mut(1) {
            entity.fields_mut().set::<u32>(0, 55);
        }
        let mut busy = Packet::new();
        server.pack_delta(&client, &mut busy).unwrap();

        // quiet: tag(2) + last(2) + now(2) + name(4+5) + scene group(1) + count(4)
        assert_eq!(quiet.len(), 20);
        // busy adds one header (4+4+2+1) + group(1) + entry(1+4)
        assert_eq!(busy.len(), 20 + 11 + 6);
    }

    #[test]
    fn locally_created_entity_is_rehomed_on_collision() {
        let client = ident(1);
        let server_identity = ident(9);
        let mut server = Scene::new("arena", SceneConfig::default());
        server.begin_sync(client);
        server.advance();
        server.insert(7, Probe::boxed());
        if let Some(entity) = server.entity_mut(7) {
            entity.fields_mut().set::<u32>(0, 99);
        }
        let mut sent = Packet::new();
        server.pack_delta(&client, &mut sent).unwrap();

        let mut receiver = Scene::new("arena", SceneConfig::default());
        receiver.begin_sync(server_identity);
        receiver.insert_local(7, Probe::boxed());

        receiver
            .apply_delta(&mut sent, &registry(), &mut NullObserver)
            .unwrap();

        // both survive: the network entity under sid 7, the local one rehomed
        assert_eq!(receiver.entity_count(), 2);
        let network_hp = receiver
            .entity(7)
            .and_then(|e| e.fields().get::<u32>(0))
            .copied();
        assert_eq!(network_hp, Some(99));
    }

    #[test]
    fn delete_all_event_clears_the_scene() {
        let peer = ident(9);
        let mut scene = Scene::new("arena", SceneConfig::default());
        scene.begin_sync(peer);
        scene.insert(1, Probe::boxed());
        scene.insert(2, Probe::boxed());
        scene.watch_delete_all();

        let mut packet = Packet::new();
        scene.pack_events(&peer, &mut packet).unwrap();

        // apply on a mirror holding the same entities
        let mut mirror = Scene::new("arena", SceneConfig::default());
        mirror.insert(1, Probe::boxed());
        mirror.insert(2, Probe::boxed());
        mirror
            .apply_events(&mut packet, &registry(), &mut NullObserver)
            .unwrap();
        assert_eq!(mirror.entity_count(), 0);
    }

    #[test]
    fn resync_fires_once_at_threshold() {
        struct CountingObserver {
            fired: u32,
        }
        impl super::SceneObserver for CountingObserver {
            fn resync_needed(&mut self, _identity: &Identity, _lost: u32) {
                self.fired += 1;
            }
        }

        let peer = ident(9);
        let mut scene = Scene::new(
            "arena",
            SceneConfig {
                lost_packet_threshold: 3,
            },
        );
        scene.begin_sync(peer);
        let mut observer = CountingObserver { fired: 0 };
        for _ in 0..5 {
            scene.record_rejection(&peer, &mut observer);
        }
        assert_eq!(observer.fired, 1);
        assert_eq!(scene.lost_packets(&peer), 5);

        scene.mark_resynced(&peer);
        assert_eq!(scene.lost_packets(&peer), 0);
    }
}
