//! End-to-end fragmentation and reassembly.

use bush_crypto::{KeyPair, SymmetricKey};
use bush_upackets::{
    estimate_encrypted_size, estimate_fragment_count, CapacityError, EncryptionScheme, Fragment,
    NoBodyKeys, ReassemblyError, UPackets, UPacketsConfig, UPacketsError,
};
use bush_wire::{
    DataPacket, DropPacket, EngagePacket, Identity, LossPacket, MissEntry, Packet, PingPacket,
};
use bytes::Bytes;
use rand::seq::SliceRandom;
use rand::{thread_rng, RngCore};
use std::collections::HashMap;

struct Node {
    master: KeyPair,
    session: KeyPair,
}

impl Node {
    fn new() -> Self {
        Self {
            master: KeyPair::generate(),
            session: KeyPair::generate(),
        }
    }

    fn identity(&self, destination: &KeyPair, timestamp: u64) -> Identity {
        Identity::new(
            self.master.address(),
            destination.address(),
            self.master.endorse(self.session.public_key()).unwrap(),
            timestamp,
        )
    }
}

fn engine() -> UPackets {
    UPackets::new(UPacketsConfig::default()).unwrap()
}

fn random_body(size: usize) -> Bytes {
    let mut body = vec![0u8; size];
    thread_rng().fill_bytes(&mut body);
    Bytes::from(body)
}

fn body_key(scheme: EncryptionScheme, receiver: &KeyPair, shared: &SymmetricKey) -> Vec<u8> {
    match scheme {
        EncryptionScheme::Ec => receiver.public_key().to_bytes().to_vec(),
        EncryptionScheme::Symmetric => shared.as_bytes().to_vec(),
        EncryptionScheme::None => Vec::new(),
    }
}

const SCHEMES: [EncryptionScheme; 3] = [
    EncryptionScheme::Ec,
    EncryptionScheme::Symmetric,
    EncryptionScheme::None,
];

/// Feed `fragments` in order; every call but the last must report incomplete
fn feed_all(
    engine: &UPackets,
    fragments: &[Bytes],
    receiver: &KeyPair,
    keys: &HashMap<String, SymmetricKey>,
) -> Packet {
    let (last, rest) = fragments.split_last().unwrap();
    for fragment in rest {
        assert!(engine.feed(fragment, receiver, keys).unwrap().is_none());
    }
    engine.feed(last, receiver, keys).unwrap().unwrap()
}

#[tokio::test]
async fn test_any_permutation_reassembles() {
    let sender = Node::new();
    let receiver = KeyPair::generate();
    let shared = SymmetricKey::from_bytes([0x5A; 32]);
    let mut keys = HashMap::new();
    keys.insert(sender.master.address().to_hex(), shared.clone());

    for scheme in SCHEMES {
        let mut packet: Packet =
            DataPacket::new(sender.identity(&receiver, 1_000), "Sync", random_body(3000))
                .unwrap()
                .into();
        let engine = engine();
        let fragments = engine
            .fragment(
                scheme,
                &mut packet,
                &sender.session,
                receiver.public_key(),
                &body_key(scheme, &receiver, &shared),
            )
            .await
            .unwrap();
        assert!(fragments.len() > 5, "{scheme}");

        let in_order = feed_all(&engine, &fragments, &receiver, &keys);
        assert_eq!(in_order, packet, "{scheme} in order");

        let mut reversed = fragments.clone();
        reversed.reverse();
        assert_eq!(feed_all(&engine, &reversed, &receiver, &keys), packet);

        for _ in 0..5 {
            let mut shuffled = fragments.clone();
            shuffled.shuffle(&mut thread_rng());
            assert_eq!(
                feed_all(&engine, &shuffled, &receiver, &keys),
                packet,
                "{scheme} shuffled"
            );
        }
        assert_eq!(engine.pending(), 0);
    }
}

#[tokio::test]
async fn test_interleaved_packets_do_not_mix() {
    let alice = Node::new();
    let bob = Node::new();
    let receiver = KeyPair::generate();
    let engine = engine();

    let mut packets: Vec<Packet> = vec![
        DataPacket::new(alice.identity(&receiver, 7), "A", random_body(1500))
            .unwrap()
            .into(),
        DataPacket::new(alice.identity(&receiver, 8), "A", random_body(1700))
            .unwrap()
            .into(),
        DataPacket::new(bob.identity(&receiver, 7), "B", random_body(1600))
            .unwrap()
            .into(),
        PingPacket::new(bob.identity(&receiver, 9)).into(),
    ];

    let mut wire = Vec::new();
    for (packet, sender) in packets.iter_mut().zip([&alice, &alice, &bob, &bob]) {
        let fragments = engine
            .fragment(
                EncryptionScheme::Ec,
                packet,
                &sender.session,
                receiver.public_key(),
                &receiver.public_key().to_bytes(),
            )
            .await
            .unwrap();
        wire.extend(fragments);
    }
    wire.shuffle(&mut thread_rng());

    let mut received = Vec::new();
    for fragment in &wire {
        if let Some(packet) = engine.feed(fragment, &receiver, &NoBodyKeys).unwrap() {
            received.push(packet);
        }
    }

    assert_eq!(received.len(), packets.len());
    for packet in &packets {
        assert!(received.contains(packet));
    }
    assert_eq!(engine.pending(), 0);
}

#[tokio::test]
async fn test_control_packets_roundtrip() {
    let sender = Node::new();
    let receiver = KeyPair::generate();
    let engine = engine();

    let mut packets: Vec<Packet> = vec![
        DropPacket::new(sender.identity(&receiver, 1), 2).into(),
        LossPacket::new(
            sender.identity(&receiver, 2),
            &[1; 8],
            vec![MissEntry::Range { begin: 3, end: 40 }, MissEntry::Unique(44)],
        )
        .unwrap()
        .into(),
        EngagePacket::new(sender.identity(&receiver, 3), &[1; 16], &[2; 16], None)
            .unwrap()
            .into(),
    ];

    for packet in packets.iter_mut() {
        let fragments = engine
            .fragment(
                EncryptionScheme::None,
                packet,
                &sender.session,
                receiver.public_key(),
                &[],
            )
            .await
            .unwrap();
        assert_eq!(fragments.len(), 1);
        let parsed = engine
            .feed(&fragments[0], &receiver, &NoBodyKeys)
            .unwrap()
            .unwrap();
        assert_eq!(&parsed, packet);
    }
}

#[tokio::test]
async fn test_capacity_rejection_down_to_one_byte() {
    let sender = Node::new();
    let receiver = KeyPair::generate();

    for max in [1usize, 100, 447] {
        let engine = UPackets::new(UPacketsConfig {
            max_fragment_size: max,
            ..Default::default()
        })
        .unwrap();
        let mut packet: Packet = DataPacket::new(sender.identity(&receiver, 5), "X", random_body(10))
            .unwrap()
            .into();

        let err = engine
            .fragment(
                EncryptionScheme::None,
                &mut packet,
                &sender.session,
                receiver.public_key(),
                &[],
            )
            .await
            .unwrap_err();
        assert!(
            matches!(
                err,
                UPacketsError::Capacity(CapacityError::FragmentTooLarge { .. })
            ),
            "max {max}: {err}"
        );
    }

    // A 304-byte data header encrypts to 433 bytes, 448 with the micro-header
    let engine = UPackets::new(UPacketsConfig {
        max_fragment_size: 448,
        ..Default::default()
    })
    .unwrap();
    let mut packet: Packet = DataPacket::new(sender.identity(&receiver, 5), "X", random_body(10))
        .unwrap()
        .into();
    let fragments = engine
        .fragment(
            EncryptionScheme::None,
            &mut packet,
            &sender.session,
            receiver.public_key(),
            &[],
        )
        .await
        .unwrap();
    assert_eq!(fragments[0].len(), 448);
}

#[tokio::test]
async fn test_missing_symmetric_key_keeps_entry() {
    let sender = Node::new();
    let receiver = KeyPair::generate();
    let shared = SymmetricKey::from_bytes([0x11; 32]);
    let engine = engine();

    let mut packet: Packet = DataPacket::new(sender.identity(&receiver, 77), "Secret", random_body(900))
        .unwrap()
        .into();
    let fragments = engine
        .fragment(
            EncryptionScheme::Symmetric,
            &mut packet,
            &sender.session,
            receiver.public_key(),
            shared.as_bytes(),
        )
        .await
        .unwrap();

    let empty: HashMap<String, SymmetricKey> = HashMap::new();
    let (last, rest) = fragments.split_last().unwrap();
    for fragment in rest {
        assert!(engine.feed(fragment, &receiver, &empty).unwrap().is_none());
    }

    let err = engine.feed(last, &receiver, &empty).unwrap_err();
    assert!(err.is_retryable());
    let correlation = match err {
        UPacketsError::Reassembly(ReassemblyError::MissingBodyKey {
            master_address,
            correlation,
        }) => {
            assert_eq!(master_address, sender.master.address().to_hex());
            correlation
        }
        other => panic!("unexpected error {other}"),
    };
    assert_eq!(engine.pending(), 1);

    // Still missing: nothing consumed
    assert!(engine
        .try_complete(&correlation, &receiver, &empty)
        .unwrap_err()
        .is_retryable());
    assert_eq!(engine.pending(), 1);

    let mut keys = HashMap::new();
    keys.insert(sender.master.address().to_hex(), shared);
    let parsed = engine
        .try_complete(&correlation, &receiver, &keys)
        .unwrap()
        .unwrap();
    assert_eq!(parsed, packet);
    assert_eq!(engine.pending(), 0);
}

#[tokio::test]
async fn test_conflicting_headers_deliver_endorsed_packet() {
    let sender = Node::new();
    let mallory = Node::new();
    let receiver = KeyPair::generate();
    let shared = SymmetricKey::from_bytes([0x22; 32]);

    for scheme in [EncryptionScheme::Ec, EncryptionScheme::None] {
        let engine = engine();
        let body = random_body(1500);
        let mut genuine: Packet = DataPacket::new(sender.identity(&receiver, 55), "Put", body.clone())
            .unwrap()
            .into();
        let fragments = engine
            .fragment(
                scheme,
                &mut genuine,
                &sender.session,
                receiver.public_key(),
                &body_key(scheme, &receiver, &shared),
            )
            .await
            .unwrap();

        // Same master address and timestamp, so the same canonical id
        let claimed = Identity::new(
            sender.master.address(),
            receiver.address(),
            mallory.master.endorse(mallory.session.public_key()).unwrap(),
            55,
        );
        let mut forged: Packet = DataPacket::new(claimed, "Put", random_body(1500))
            .unwrap()
            .into();
        let forged = engine
            .fragment(
                scheme,
                &mut forged,
                &mallory.session,
                receiver.public_key(),
                &body_key(scheme, &receiver, &shared),
            )
            .await
            .unwrap();

        let err = engine.feed(&forged[0], &receiver, &NoBodyKeys).unwrap_err();
        assert_eq!(err, UPacketsError::Packet(bush_wire::PacketError::MasterSignature));
        assert_eq!(engine.pending(), 0);

        let (header, bodies) = fragments.split_first().unwrap();
        for fragment in &bodies[..2] {
            assert!(engine.feed(fragment, &receiver, &NoBodyKeys).unwrap().is_none());
        }
        assert!(engine.feed(&forged[0], &receiver, &NoBodyKeys).is_err());
        assert!(engine.feed(header, &receiver, &NoBodyKeys).unwrap().is_none());
        assert!(engine.feed(&forged[0], &receiver, &NoBodyKeys).is_err());

        let delivered = feed_all(&engine, &bodies[2..], &receiver, &HashMap::new());
        assert_eq!(delivered, genuine);
        assert_eq!(engine.pending(), 0);
    }
}

#[tokio::test]
async fn test_corrupted_body_fails_checksum_and_clears_entry() {
    let sender = Node::new();
    let receiver = KeyPair::generate();
    let engine = engine();

    let mut packet: Packet = DataPacket::new(sender.identity(&receiver, 31), "Put", random_body(1200))
        .unwrap()
        .into();
    let fragments = engine
        .fragment(
            EncryptionScheme::None,
            &mut packet,
            &sender.session,
            receiver.public_key(),
            &[],
        )
        .await
        .unwrap();

    let (last_fragment, rest) = fragments.split_last().unwrap();
    let mut tampered = last_fragment.to_vec();
    let last = tampered.len() - 1;
    tampered[last] ^= 0xFF;

    for fragment in rest {
        assert!(engine.feed(fragment, &receiver, &NoBodyKeys).unwrap().is_none());
    }
    let err = engine.feed(&tampered, &receiver, &NoBodyKeys).unwrap_err();
    assert_eq!(
        err,
        UPacketsError::Packet(bush_wire::PacketError::ChecksumMismatch)
    );
    assert_eq!(engine.pending(), 0);
}

#[test]
fn test_sizing_is_deterministic() {
    assert_eq!(
        estimate_fragment_count(EncryptionScheme::None, &[0u8; 2637], 550),
        5
    );
    assert_eq!(
        estimate_fragment_count(EncryptionScheme::Ec, &[0u8; 1007], 505),
        2
    );
    assert_eq!(estimate_encrypted_size(EncryptionScheme::Ec, 511), 512);
    assert_eq!(estimate_encrypted_size(EncryptionScheme::Ec, 512), 528);
    assert_eq!(estimate_encrypted_size(EncryptionScheme::Symmetric, 511), 511);
}

#[test]
fn test_short_fragment_rejected() {
    let receiver = KeyPair::generate();
    let err = engine()
        .feed(&[1, 2, 3], &receiver, &NoBodyKeys)
        .unwrap_err();
    assert_eq!(
        err,
        UPacketsError::Reassembly(ReassemblyError::ShortFragment(3))
    );
}

#[tokio::test]
async fn test_fragments_respect_max_size() {
    let sender = Node::new();
    let receiver = KeyPair::generate();
    let engine = engine();

    let mut packet: Packet = DataPacket::new(sender.identity(&receiver, 3), "Big", random_body(10_000))
        .unwrap()
        .into();
    let fragments = engine
        .fragment(
            EncryptionScheme::Ec,
            &mut packet,
            &sender.session,
            receiver.public_key(),
            &receiver.public_key().to_bytes(),
        )
        .await
        .unwrap();

    assert!(fragments.iter().all(|f| f.len() <= 550));
    let indices: Vec<u32> = fragments
        .iter()
        .map(|f| Fragment::decode(f).unwrap().index)
        .collect();
    let expected: Vec<u32> = (0..fragments.len() as u32).collect();
    assert_eq!(indices, expected);
}
