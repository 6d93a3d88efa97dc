use scenesync::{Packet, PacketError};

#[test]
fn truncated_packet_fails_partway_and_stays_invalid() {
    let mut original = Packet::new();
    original.pack(&7u16);
    original.pack(&String::from("arena"));
    original.pack(&123_456u32);

    // simulate a datagram cut short in flight
    let bytes = original.as_bytes();
    let mut received = Packet::from_bytes(bytes[..bytes.len() - 2].to_vec());

    // everything before the cut extracts normally
    assert_eq!(received.read::<u16>().unwrap(), 7);
    assert_eq!(received.read::<String>().unwrap(), "arena");

    // the cut field fails with the exact shortfall
    assert!(matches!(
        received.read::<u32>(),
        Err(PacketError::UnexpectedEnd {
            offset: 11,
            wanted: 4,
            len: 13,
        })
    ));
    assert!(!received.is_valid());

    // sticky: even a one-byte read now refuses
    assert!(matches!(
        received.read::<u8>(),
        Err(PacketError::Invalidated)
    ));
}

#[test]
fn revalidate_allows_recovery_at_a_chosen_cursor() {
    let mut packet = Packet::new();
    packet.pack(&1u8);
    packet.pack(&2u8);

    assert!(packet.read::<u64>().is_err());
    assert!(!packet.is_valid());

    packet.revalidate();
    packet.set_read_cursor(1).unwrap();
    assert_eq!(packet.read::<u8>().unwrap(), 2);
    assert!(packet.is_valid());
}

#[test]
fn clear_resets_buffer_cursor_and_validity() {
    let mut packet = Packet::new();
    packet.pack(&9u32);
    let _ = packet.read::<u64>();
    assert!(!packet.is_valid());

    packet.clear();
    assert!(packet.is_valid());
    assert!(packet.is_empty());
    assert_eq!(packet.read_cursor(), 0);
}

#[test]
fn cursor_cannot_be_set_past_the_end() {
    let mut packet = Packet::new();
    packet.pack(&1u8);
    assert!(matches!(
        packet.set_read_cursor(5),
        Err(PacketError::CursorOutOfBounds { pos: 5, len: 1 })
    ));
}
