//! End-to-end exchanges between two peers, byte buffers in between.

use scenewire_codec::{compress_quat, decompress_quat, WireReader, WireWriter};
use scenewire_protocol::catalog::components::{component_type, CompressedTransformComponent};
use scenewire_protocol::catalog::{Component, QuantizationSpace};
use scenewire_protocol::content::encode_content_list;
use scenewire_protocol::handshake::negotiate_version;
use scenewire_protocol::{
    ComponentEntry, ComponentRegistry, ContentMessage, Introduction, IntroductionReply,
    LargeAssetProtocol, MemoryScene, Message, MessageBuffer, NamedTransaction, PayloadLayout,
    ProbeReply, ReplyCode, ReplyTracker, Role, SceneStore, Session, Transaction,
    TransactionReply,
};
use scenewire_shared::{UnitQuat, Vec3, MIN_PROTOCOL_VERSION, PROTOCOL_VERSION};
use std::time::{Duration, Instant};

const UNKNOWN_TYPE: u32 = 9999;

fn send(message: &Message) -> Vec<u8> {
    message.to_bytes().expect("encodable message")
}

fn receive(bytes: &[u8], registry: &ComponentRegistry) -> Message {
    let (message, used) = Message::from_bytes(bytes, registry).expect("decodable message");
    assert_eq!(used, bytes.len(), "message left trailing bytes");
    message
}

#[test]
fn named_transaction_round_trip_with_reply() {
    let registry = ComponentRegistry::default();
    let name = Component::Name("Cube".into()).modify(&[7]).unwrap();
    let sent = Message::NamedTransaction(NamedTransaction::new(
        42,
        vec![ContentMessage::CreateEntities(vec![7, 8]), name.clone()],
    ));

    let Message::NamedTransaction(tx) = receive(&send(&sent), &registry) else {
        panic!("expected a named transaction");
    };
    assert_eq!(tx.id, 42);
    assert_eq!(tx.messages.len(), 2);
    assert_eq!(tx.messages[0], ContentMessage::CreateEntities(vec![7, 8]));
    assert_eq!(tx.messages[1], name);

    let mut scene = MemoryScene::default();
    let reply = scene.apply_named(&tx);
    assert_eq!(reply, TransactionReply { id: 42, code: ReplyCode::ACCEPT });
    assert_eq!(
        scene.component(7, component_type::NAME),
        Some(Component::Name("Cube".into()))
    );

    let echoed = receive(&send(&Message::TransactionReply(reply)), &registry);
    assert_eq!(echoed, Message::TransactionReply(reply));
}

#[test]
fn unknown_component_type_is_skipped() {
    let entries = vec![
        ComponentEntry {
            entity: 1,
            payload: vec![0xA, 0xB, 0xC],
        },
        ComponentEntry {
            entity: 2,
            payload: vec![0xD, 0xE, 0xF],
        },
    ];
    let messages = vec![
        ContentMessage::ModifyComponent {
            component_type: UNKNOWN_TYPE,
            entries: entries.clone(),
        },
        ContentMessage::DeleteEntities(vec![5, 6]),
    ];
    let bytes = send(&Message::Transaction(Transaction::new(messages.clone())));

    // A receiver that knows the type sees the block as sent.
    let mut aware = ComponentRegistry::default();
    aware.register(UNKNOWN_TYPE, PayloadLayout::Fixed(3));
    assert_eq!(
        receive(&bytes, &aware),
        Message::Transaction(Transaction::new(messages))
    );

    // One that does not skips it by size and still reads the sibling.
    let Message::Transaction(tx) = receive(&bytes, &ComponentRegistry::default()) else {
        panic!("expected a transaction");
    };
    assert_eq!(
        tx.messages,
        vec![
            ContentMessage::UnrecognizedComponent {
                component_type: UNKNOWN_TYPE,
                message_size: 4 + 2 * (4 + 3),
            },
            ContentMessage::DeleteEntities(vec![5, 6]),
        ]
    );

    // Forwarding drops the skipped block.
    let mut w = WireWriter::new();
    encode_content_list(&mut w, &tx.messages).unwrap();
    let mut r = WireReader::new(w.as_slice());
    assert_eq!(r.read_u32().unwrap(), 1);
}

#[test]
fn identity_rotation_survives_compression() {
    let q = decompress_quat(compress_quat(UnitQuat::IDENTITY));
    assert!(q.angle_to(UnitQuat::IDENTITY) < 0.5f32.to_radians());

    let space = QuantizationSpace {
        index: 0,
        min: Vec3::new(-10.0, -10.0, -10.0),
        max: Vec3::new(10.0, 10.0, 10.0),
    };
    let component = Component::CompressedTransform(CompressedTransformComponent::compress(
        Vec3::new(1.0, 2.0, 3.0),
        UnitQuat::IDENTITY,
        1.0,
        &space,
    ));
    let payload = component.encode_payload().unwrap();
    assert_eq!(payload.len(), CompressedTransformComponent::SIZE);
    let Some(Component::CompressedTransform(decoded)) =
        Component::decode(component_type::COMPRESSED_TRANSFORM, &payload).unwrap()
    else {
        panic!("expected a compressed transform");
    };
    let transform = decoded.to_transform(&space);
    assert!(transform.rotation.angle_to(UnitQuat::IDENTITY) < 0.5f32.to_radians());
    assert!(transform.position.distance(Vec3::new(1.0, 2.0, 3.0)) < 1e-3);
}

#[test]
fn full_session_over_a_split_stream() {
    let registry = ComponentRegistry::default();
    let mut client = Session::new(Role::Initiator);
    let mut node = Session::new(Role::Responder);
    let mut node_rx = MessageBuffer::new(1 << 16);
    let mut client_rx = MessageBuffer::new(1 << 16);
    let mut tracker = ReplyTracker::new(Duration::from_secs(5));
    let mut scene = MemoryScene::default();
    let start = Instant::now();

    let intro = Message::Introduction(Introduction::new(PROTOCOL_VERSION, "viewer", false));
    client.outbound(&intro).unwrap();
    node_rx.extend(&send(&intro));
    let received = node_rx.next_message(&registry).unwrap().unwrap();
    node.inbound(&received).unwrap();

    let version =
        negotiate_version(node.peer_version().unwrap(), MIN_PROTOCOL_VERSION, PROTOCOL_VERSION)
            .unwrap();
    let reply = Message::IntroductionReply(IntroductionReply {
        protocol_version: version,
        session_name: "lab".into(),
        large_asset_protocol: LargeAssetProtocol::Ws,
        large_asset_ports: vec![50001],
    });
    node.outbound(&reply).unwrap();
    client_rx.extend(&send(&reply));
    client
        .inbound(&client_rx.next_message(&registry).unwrap().unwrap())
        .unwrap();
    assert!(client.is_established() && node.is_established());

    let id = tracker.register(start);
    let tx = Message::NamedTransaction(NamedTransaction::new(
        id,
        vec![ContentMessage::CreateEntities(vec![1])],
    ));
    client.outbound(&tx).unwrap();
    let bytes = send(&tx);
    let (head, tail) = bytes.split_at(bytes.len() / 2);
    node_rx.extend(head);
    assert!(node_rx.next_message(&registry).unwrap().is_none());
    node_rx.extend(tail);
    let Some(Message::NamedTransaction(received)) = node_rx.next_message(&registry).unwrap()
    else {
        panic!("expected a named transaction");
    };

    let answer = Message::TransactionReply(scene.apply_named(&received));
    node.outbound(&answer).unwrap();
    client_rx.extend(&send(&answer));
    let Some(Message::TransactionReply(reply)) = client_rx.next_message(&registry).unwrap()
    else {
        panic!("expected a reply");
    };
    let resolved = tracker.resolve(reply, start).unwrap();
    assert!(resolved.code.is_accept());
    assert_eq!(tracker.pending(), 0);
}

#[test]
fn probe_exchange_closes_both_ends() {
    let registry = ComponentRegistry::empty();
    let mut client = Session::new(Role::Initiator);
    let mut node = Session::new(Role::Responder);

    client.outbound(&Message::Probe).unwrap();
    node.inbound(&receive(&send(&Message::Probe), &registry)).unwrap();

    let reply = Message::ProbeReply(ProbeReply::new("lab").with_icon(vec![1, 2, 3]));
    node.outbound(&reply).unwrap();
    client.inbound(&receive(&send(&reply), &registry)).unwrap();
    assert!(client.is_closed() && node.is_closed());
    assert!(node
        .outbound(&Message::Transaction(Transaction::default()))
        .is_err());
}
