//! End-to-end server/client replication: full snapshot, minimal delta,
//! watched events, and lossy-client recovery through a full-update request.

use std::net::SocketAddr;

use scenesync::{
    ClassId, ClassRegistry, FieldSet, Identity, MessageKind, NullObserver, Packet, Replica, Scene,
    SceneConfig, SceneError, SceneObserver, Sid,
};

const SHIP_CLASS: ClassId = 3;

struct Ship {
    fields: FieldSet,
    plan: i16,
}

impl Ship {
    const HULL: u8 = 0;
    const HEADING: u8 = 1;
    const CALLSIGN: u8 = 2;

    fn boxed() -> Box<dyn Replica> {
        let mut fields = FieldSet::new();
        fields.register(100u32);
        fields.register(0.0f32);
        fields.register(String::new());
        Box::new(Self { fields, plan: 0 })
    }
}

impl Replica for Ship {
    fn class_id(&self) -> ClassId {
        SHIP_CLASS
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
    registry.register(SHIP_CLASS, "ship", Ship::boxed);
    registry
}

fn ident(port: u16) -> Identity {
    format!("10.0.0.1:{port}")
        .parse::<SocketAddr>()
        .unwrap()
        .into()
}

#[derive(Default)]
struct Recorder {
    created: Vec<Sid>,
    removed: Vec<Sid>,
    plans: Vec<(Sid, i16)>,
    resyncs: Vec<(Identity, u32)>,
}

impl SceneObserver for Recorder {
    fn entity_created(&mut self, sid: Sid) {
        self.created.push(sid);
    }

    fn entity_removed(&mut self, sid: Sid) {
        self.removed.push(sid);
    }

    fn plan_changed(&mut self, sid: Sid, plan: i16) {
        self.plans.push((sid, plan));
    }

    fn resync_needed(&mut self, identity: &Identity, lost: u32) {
        self.resyncs.push((*identity, lost));
    }
}

fn hull_of(scene: &Scene, sid: Sid) -> Option<u32> {
    scene
        .entity(sid)
        .and_then(|e| e.fields().get::<u32>(Ship::HULL))
        .copied()
}

#[test]
fn full_snapshot_then_minimal_delta() {
    let viewer = ident(4000);
    let mut server = Scene::new("arena", SceneConfig::default());
    server.insert(7, Ship::boxed());
    if let Some(ship) = server.entity_mut(7) {
        ship.fields_mut().set::<u32>(Ship::HULL, 80);
        ship.fields_mut().set::<f32>(Ship::HEADING, 1.5);
        ship.fields_mut()
            .set::<String>(Ship::CALLSIGN, String::from("red-5"));
        ship.set_plan(2);
    }
    server.begin_sync(viewer);

    let mut client = Scene::new("lobby", SceneConfig::default());
    let mut recorder = Recorder::default();

    // full snapshot brings the client up to date, adopting the scene name
    let mut snapshot = Packet::new();
    server.pack_full(Some(&viewer), &mut snapshot).unwrap();
    client
        .apply_full(&mut snapshot, &registry(), &mut recorder)
        .unwrap();

    assert_eq!(client.name(), "arena");
    assert_eq!(recorder.created, vec![7]);
    assert_eq!(hull_of(&client, 7), Some(80));
    assert_eq!(
        client.entity(7).map(|e| e.plan()),
        Some(2)
    );

    // one field changes; the delta carries that field and nothing else
    server.advance();
    if let Some(ship) = server.entity_mut(7) {
        ship.fields_mut().set::<u32>(Ship::HULL, 55);
    }
    let mut delta = Packet::new();
    server.pack_delta(&viewer, &mut delta).unwrap();

    // tag(2) update range(4) name(4+5) scene group(1) count(4)
    // + header(11) + entity group(1) + one entry(1 + 4)
    assert_eq!(delta.len(), 37);

    client
        .apply_delta(&mut delta, &registry(), &mut recorder)
        .unwrap();
    assert_eq!(hull_of(&client, 7), Some(55));
    assert_eq!(client.update_count(), server.update_count());

    // a second delta with nothing changed carries zero entities
    server.advance();
    let mut quiet = Packet::new();
    server.pack_delta(&viewer, &mut quiet).unwrap();
    assert_eq!(quiet.len(), 20);
    client
        .apply_delta(&mut quiet, &registry(), &mut recorder)
        .unwrap();
}

#[test]
fn replayed_delta_is_rejected_and_state_untouched() {
    let viewer = ident(4001);
    let mut server = Scene::new("arena", SceneConfig::default());
    server.insert(1, Ship::boxed());
    server.begin_sync(viewer);

    let mut client = Scene::new("lobby", SceneConfig::default());
    let mut snapshot = Packet::new();
    server.pack_full(Some(&viewer), &mut snapshot).unwrap();
    client
        .apply_full(&mut snapshot, &registry(), &mut NullObserver)
        .unwrap();

    server.advance();
    if let Some(ship) = server.entity_mut(1) {
        ship.fields_mut().set::<u32>(Ship::HULL, 10);
    }
    let mut delta = Packet::new();
    server.pack_delta(&viewer, &mut delta).unwrap();
    let replay_bytes = delta.as_bytes().to_vec();

    client
        .apply_delta(&mut delta, &registry(), &mut NullObserver)
        .unwrap();
    assert_eq!(hull_of(&client, 1), Some(10));

    // roll hull forward so a replay would visibly regress it if accepted
    server.advance();
    if let Some(ship) = server.entity_mut(1) {
        ship.fields_mut().set::<u32>(Ship::HULL, 20);
    }
    let mut next = Packet::new();
    server.pack_delta(&viewer, &mut next).unwrap();
    client
        .apply_delta(&mut next, &registry(), &mut NullObserver)
        .unwrap();
    assert_eq!(hull_of(&client, 1), Some(20));

    let mut replay = Packet::from_bytes(replay_bytes);
    let result = client.apply_delta(&mut replay, &registry(), &mut NullObserver);
    assert!(matches!(result, Err(SceneError::StalePacket { .. })));
    assert_eq!(hull_of(&client, 1), Some(20));
}

#[test]
fn unknown_class_aborts_the_apply() {
    let viewer = ident(4002);
    let mut server = Scene::new("arena", SceneConfig::default());
    server.insert(1, Ship::boxed());
    server.begin_sync(viewer);

    let mut snapshot = Packet::new();
    server.pack_full(Some(&viewer), &mut snapshot).unwrap();

    // a registry that has never heard of ships
    let empty = ClassRegistry::new();
    let mut client = Scene::new("lobby", SceneConfig::default());
    let result = client.apply_full(&mut snapshot, &empty, &mut NullObserver);
    assert!(matches!(
        result,
        Err(SceneError::UnknownClass { class_id: SHIP_CLASS })
    ));
}

#[test]
fn watched_events_create_and_destroy_across_the_wire() {
    let viewer = ident(4003);
    let mut server = Scene::new("arena", SceneConfig::default());
    server.begin_sync(viewer);

    let mut client = Scene::new("arena", SceneConfig::default());
    let mut recorder = Recorder::default();

    // creation event carries a snapshot of the entity as it stands
    server.insert(12, Ship::boxed());
    if let Some(ship) = server.entity_mut(12) {
        ship.fields_mut().set::<u32>(Ship::HULL, 64);
    }
    server.watch_created(12).unwrap();
    server.watch_signaled(12, -3);
    server.watch_deleted(12);

    let mut packet = Packet::new();
    server.pack_events(&viewer, &mut packet).unwrap();
    assert_eq!(server.pending_events(&viewer), 0);

    client
        .apply_events(&mut packet, &registry(), &mut recorder)
        .unwrap();

    // created with its snapshot applied, then removed again, in order
    assert_eq!(recorder.created, vec![12]);
    assert_eq!(recorder.removed, vec![12]);
    assert_eq!(client.entity_count(), 0);
}

#[test]
fn lossy_client_recovers_through_a_full_update_request() {
    let viewer = ident(4004);
    let threshold = 3u32;
    let mut server = Scene::new(
        "arena",
        SceneConfig {
            lost_packet_threshold: threshold,
        },
    );
    server.insert(5, Ship::boxed());
    server.begin_sync(viewer);

    let mut client = Scene::new(
        "arena",
        SceneConfig {
            lost_packet_threshold: threshold,
        },
    );
    let server_identity = ident(1);
    client.begin_sync(server_identity);

    let mut snapshot = Packet::new();
    server.pack_full(Some(&viewer), &mut snapshot).unwrap();
    client
        .apply_full(&mut snapshot, &registry(), &mut NullObserver)
        .unwrap();

    // deltas keep getting lost; each loss shows up as a stale rejection of
    // the delta that finally does arrive
    let mut recorder = Recorder::default();
    for _ in 0..threshold {
        client.record_rejection(&server_identity, &mut recorder);
    }
    assert_eq!(recorder.resyncs, vec![(server_identity, threshold)]);

    // the recovery round trip: client asks, server answers with a snapshot
    let mut request = Packet::new();
    Scene::pack_full_request(&mut request);
    assert_eq!(
        MessageKind::read(&mut request).unwrap(),
        MessageKind::AskFullUpdate
    );

    let mut fresh = Packet::new();
    server.pack_full(Some(&viewer), &mut fresh).unwrap();
    client
        .apply_full(&mut fresh, &registry(), &mut NullObserver)
        .unwrap();
    client.mark_resynced(&server_identity);
    assert_eq!(client.lost_packets(&server_identity), 0);

    // further rejections only fire the observer after crossing again
    client.record_rejection(&server_identity, &mut recorder);
    assert_eq!(recorder.resyncs.len(), 1);
}
